//! Allocation storage operations

use chrono::NaiveDate;
use rusqlite::{params, Connection};
use tracing::instrument;
use uuid::Uuid;

use super::parse::{parse_date, parse_date_opt, parse_datetime, parse_uuid, OptionalExt};
use crate::error::Result;
use crate::models::Allocation;

pub struct AllocationStore<'a> {
    conn: &'a Connection,
}

impl<'a> AllocationStore<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    fn row_to_allocation(
        row: &rusqlite::Row<'_>,
    ) -> std::result::Result<Allocation, rusqlite::Error> {
        Ok(Allocation {
            id: parse_uuid(&row.get::<_, String>(0)?)?,
            student_id: parse_uuid(&row.get::<_, String>(1)?)?,
            room_id: parse_uuid(&row.get::<_, String>(2)?)?,
            start_date: parse_date(&row.get::<_, String>(3)?)?,
            end_date: parse_date_opt(row.get::<_, Option<String>>(4)?)?,
            is_active: row.get::<_, i32>(5)? != 0,
            created_at: parse_datetime(&row.get::<_, String>(6)?)?,
        })
    }

    /// Insert a new allocation row
    #[instrument(skip(self, allocation), fields(student_id = %allocation.student_id, room_id = %allocation.room_id))]
    pub fn create(&self, allocation: &Allocation) -> Result<()> {
        self.conn.execute(
            "INSERT INTO allocations (id, student_id, room_id, start_date, end_date, is_active, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                allocation.id.to_string(),
                allocation.student_id.to_string(),
                allocation.room_id.to_string(),
                allocation.start_date.to_string(),
                allocation.end_date.map(|d| d.to_string()),
                allocation.is_active as i32,
                allocation.created_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// Find allocation by ID
    #[instrument(skip(self))]
    pub fn find_by_id(&self, id: Uuid) -> Result<Option<Allocation>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, student_id, room_id, start_date, end_date, is_active, created_at \
             FROM allocations WHERE id = ?1",
        )?;

        let allocation = stmt
            .query_row(params![id.to_string()], Self::row_to_allocation)
            .optional()?;

        Ok(allocation)
    }

    /// The student's current active allocation, if any
    #[instrument(skip(self))]
    pub fn find_active_for_student(&self, student_id: Uuid) -> Result<Option<Allocation>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, student_id, room_id, start_date, end_date, is_active, created_at \
             FROM allocations WHERE student_id = ?1 AND is_active = 1",
        )?;

        let allocation = stmt
            .query_row(params![student_id.to_string()], Self::row_to_allocation)
            .optional()?;

        Ok(allocation)
    }

    /// Count active allocations for a room
    pub fn count_active_for_room(&self, room_id: Uuid) -> Result<u32> {
        let count: u32 = self.conn.query_row(
            "SELECT COUNT(*) FROM allocations WHERE room_id = ?1 AND is_active = 1",
            params![room_id.to_string()],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    /// Deactivate every active allocation a student holds.
    ///
    /// Returns the rooms those allocations pointed to, so callers can
    /// recompute their status.
    #[instrument(skip(self))]
    pub fn deactivate_for_student(&self, student_id: Uuid) -> Result<Vec<Uuid>> {
        let mut stmt = self.conn.prepare(
            "SELECT room_id FROM allocations WHERE student_id = ?1 AND is_active = 1",
        )?;
        let rooms = stmt
            .query_map(params![student_id.to_string()], |row| {
                parse_uuid(&row.get::<_, String>(0)?)
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        self.conn.execute(
            "UPDATE allocations SET is_active = 0 WHERE student_id = ?1 AND is_active = 1",
            params![student_id.to_string()],
        )?;
        Ok(rooms)
    }

    /// Mark an allocation vacated
    #[instrument(skip(self))]
    pub fn deactivate(&self, allocation_id: Uuid, end_date: NaiveDate) -> Result<()> {
        self.conn.execute(
            "UPDATE allocations SET is_active = 0, end_date = ?1 WHERE id = ?2",
            params![end_date.to_string(), allocation_id.to_string()],
        )?;
        Ok(())
    }
}
