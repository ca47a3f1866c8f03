//! Student reference entity

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A resident's student record, linked 1:1 to a user account.
///
/// No derived state lives here; rooms and bills reference students by id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Student {
    pub id: Uuid,
    pub user_id: Uuid,
    pub guardian_name: Option<String>,
    pub guardian_phone: Option<String>,
    pub address: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Student {
    pub fn new(user_id: Uuid) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            guardian_name: None,
            guardian_phone: None,
            address: None,
            created_at: Utc::now(),
        }
    }
}

/// Student joined with user identity for list views
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StudentInfo {
    pub student: Student,
    pub email: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone: Option<String>,
}
