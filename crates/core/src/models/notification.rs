//! In-app notification model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A persisted in-app notification.
///
/// Rows are written before any push is attempted, so a user who was
/// offline still sees the notification on next fetch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub body: Option<String>,
    pub link: Option<String>,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

impl Notification {
    pub fn new(user_id: Uuid, title: String, body: Option<String>, link: Option<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            title,
            body,
            link,
            is_read: false,
            created_at: Utc::now(),
        }
    }
}
