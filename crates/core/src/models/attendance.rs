//! Attendance models

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Attendance is taken twice a day
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AttendanceSession {
    Day,
    Night,
}

impl AttendanceSession {
    pub fn as_str(&self) -> &'static str {
        match self {
            AttendanceSession::Day => "Day",
            AttendanceSession::Night => "Night",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AttendanceStatus {
    Present,
    Absent,
}

impl AttendanceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AttendanceStatus::Present => "Present",
            AttendanceStatus::Absent => "Absent",
        }
    }
}

/// One mark for (student, date, session). Re-marking upserts the status.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttendanceMark {
    pub student_id: Uuid,
    pub status: AttendanceStatus,
}

/// Per-student per-day aggregate for the monthly summary view
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttendanceSummaryRow {
    pub student_id: Uuid,
    pub date: NaiveDate,
    pub present_day: u32,
    pub absent_day: u32,
    pub present_night: u32,
    pub absent_night: u32,
    pub student_name: String,
}
