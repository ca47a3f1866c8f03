//! Student-to-room allocation model

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Links a student to a room for an interval.
///
/// Allocations are deactivated on vacate, never physically deleted; a
/// student has at most one active allocation at any time (enforced inside
/// the allocate transaction).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Allocation {
    pub id: Uuid,
    pub student_id: Uuid,
    pub room_id: Uuid,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl Allocation {
    pub fn new(student_id: Uuid, room_id: Uuid, start_date: NaiveDate) -> Self {
        Self {
            id: Uuid::new_v4(),
            student_id,
            room_id,
            start_date,
            end_date: None,
            is_active: true,
            created_at: Utc::now(),
        }
    }
}
