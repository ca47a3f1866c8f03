//! Complaint models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ComplaintStatus {
    Open,
    InProgress,
    Resolved,
}

impl ComplaintStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ComplaintStatus::Open => "Open",
            ComplaintStatus::InProgress => "InProgress",
            ComplaintStatus::Resolved => "Resolved",
        }
    }
}

/// A complaint filed by a student
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Complaint {
    pub id: Uuid,
    pub student_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub status: ComplaintStatus,
    pub assigned_staff_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl Complaint {
    pub fn new(student_id: Uuid, title: String, description: Option<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            student_id,
            title,
            description,
            status: ComplaintStatus::Open,
            assigned_staff_id: None,
            created_at: Utc::now(),
        }
    }
}
