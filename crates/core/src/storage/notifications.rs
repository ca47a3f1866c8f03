//! Notification storage operations
//!
//! Rows are persisted before any live push is attempted, so offline users
//! catch up on their next fetch.

use rusqlite::{params, Connection};
use tracing::instrument;
use uuid::Uuid;

use super::parse::{parse_datetime, parse_uuid};
use crate::error::Result;
use crate::models::Notification;

pub struct NotificationStore<'a> {
    conn: &'a Connection,
}

impl<'a> NotificationStore<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Persist one notification
    #[instrument(skip(self, notification), fields(user_id = %notification.user_id))]
    pub fn create(&self, notification: &Notification) -> Result<()> {
        self.conn.execute(
            "INSERT INTO notifications (id, user_id, title, body, link, is_read, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                notification.id.to_string(),
                notification.user_id.to_string(),
                notification.title,
                notification.body,
                notification.link,
                notification.is_read as i32,
                notification.created_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// A user's notifications, newest first
    #[instrument(skip(self))]
    pub fn list_for_user(&self, user_id: Uuid, limit: u32) -> Result<Vec<Notification>> {
        let limit = limit.clamp(1, 200);
        let mut stmt = self.conn.prepare(
            "SELECT id, user_id, title, body, link, is_read, created_at
             FROM notifications WHERE user_id = ?1
             ORDER BY created_at DESC, id DESC
             LIMIT ?2",
        )?;

        let notifications = stmt
            .query_map(params![user_id.to_string(), limit], |row| {
                Ok(Notification {
                    id: parse_uuid(&row.get::<_, String>(0)?)?,
                    user_id: parse_uuid(&row.get::<_, String>(1)?)?,
                    title: row.get(2)?,
                    body: row.get(3)?,
                    link: row.get(4)?,
                    is_read: row.get::<_, i32>(5)? != 0,
                    created_at: parse_datetime(&row.get::<_, String>(6)?)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(notifications)
    }

    /// Count of unread notifications for a user
    pub fn unread_count(&self, user_id: Uuid) -> Result<u64> {
        let count: u64 = self.conn.query_row(
            "SELECT COUNT(*) FROM notifications WHERE user_id = ?1 AND is_read = 0",
            params![user_id.to_string()],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    /// Mark selected notifications read. Only the owner's rows change.
    #[instrument(skip(self, ids), fields(user_id = %user_id, count = ids.len()))]
    pub fn mark_read(&self, user_id: Uuid, ids: &[Uuid]) -> Result<u64> {
        let mut updated = 0u64;
        let mut stmt = self
            .conn
            .prepare("UPDATE notifications SET is_read = 1 WHERE user_id = ?1 AND id = ?2")?;
        for id in ids {
            updated += stmt.execute(params![user_id.to_string(), id.to_string()])? as u64;
        }
        Ok(updated)
    }

    /// Mark everything read for a user
    #[instrument(skip(self))]
    pub fn mark_all_read(&self, user_id: Uuid) -> Result<u64> {
        let updated = self.conn.execute(
            "UPDATE notifications SET is_read = 1 WHERE user_id = ?1 AND is_read = 0",
            params![user_id.to_string()],
        )?;
        Ok(updated as u64)
    }
}
