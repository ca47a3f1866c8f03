//! Staff reference entity

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Hostel staff member (cleaners, security, maintenance)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Staff {
    pub id: Uuid,
    pub name: String,
    pub role: String,
    pub phone: Option<String>,
    pub shift: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Staff {
    pub fn new(name: String, role: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            name,
            role,
            phone: None,
            shift: None,
            created_at: Utc::now(),
        }
    }
}
