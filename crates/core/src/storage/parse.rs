//! Database value parsing utilities
//!
//! Provides error-safe parsing of stored values.

use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::Error as SqlError;
use uuid::Uuid;

use crate::error::Error;
use crate::models::{BillStatus, ComplaintStatus, DerivedStatus, Role, RoomStatus};

fn conversion_failure<E>(e: E) -> SqlError
where
    E: std::error::Error + Send + Sync + 'static,
{
    SqlError::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e))
}

/// Parse a UUID from a database string column
pub fn parse_uuid(s: &str) -> Result<Uuid, SqlError> {
    Uuid::parse_str(s).map_err(conversion_failure)
}

/// Parse an optional UUID from a database string column
pub fn parse_uuid_opt(s: Option<String>) -> Result<Option<Uuid>, SqlError> {
    s.map(|s| parse_uuid(&s)).transpose()
}

/// Parse a DateTime from an RFC3339 string
pub fn parse_datetime(s: &str) -> Result<DateTime<Utc>, SqlError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(conversion_failure)
}

/// Parse an optional DateTime from an RFC3339 string
pub fn parse_datetime_opt(s: Option<String>) -> Result<Option<DateTime<Utc>>, SqlError> {
    s.map(|s| parse_datetime(&s)).transpose()
}

/// Parse a calendar date from a `YYYY-MM-DD` string
pub fn parse_date(s: &str) -> Result<NaiveDate, SqlError> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(conversion_failure)
}

/// Parse an optional calendar date
pub fn parse_date_opt(s: Option<String>) -> Result<Option<NaiveDate>, SqlError> {
    s.map(|s| parse_date(&s)).transpose()
}

/// Conversion error for a stored enum column holding an unknown value
fn invalid_enum(column: &str, value: &str) -> SqlError {
    SqlError::FromSqlConversionFailure(
        0,
        rusqlite::types::Type::Text,
        format!("unrecognized {} '{}'", column, value).into(),
    )
}

/// Decode the stored three-valued room status column
pub fn room_status_from_str(s: &str) -> Result<RoomStatus, SqlError> {
    match s {
        "Maintenance" => Ok(RoomStatus::Maintenance),
        "Occupied" => Ok(RoomStatus::Derived(DerivedStatus::Occupied)),
        "Vacant" => Ok(RoomStatus::Derived(DerivedStatus::Vacant)),
        other => Err(invalid_enum("room status", other)),
    }
}

pub fn bill_status_from_str(s: &str) -> Result<BillStatus, SqlError> {
    match s {
        "PAID" => Ok(BillStatus::Paid),
        "PARTIAL" => Ok(BillStatus::Partial),
        "UNPAID" => Ok(BillStatus::Unpaid),
        other => Err(invalid_enum("bill status", other)),
    }
}

pub fn role_from_str(s: &str) -> Result<Role, SqlError> {
    match s {
        "Admin" => Ok(Role::Admin),
        "Warden" => Ok(Role::Warden),
        "Student" => Ok(Role::Student),
        other => Err(invalid_enum("role", other)),
    }
}

pub fn complaint_status_from_str(s: &str) -> Result<ComplaintStatus, SqlError> {
    match s {
        "InProgress" => Ok(ComplaintStatus::InProgress),
        "Resolved" => Ok(ComplaintStatus::Resolved),
        "Open" => Ok(ComplaintStatus::Open),
        other => Err(invalid_enum("complaint status", other)),
    }
}

/// Translate a unique-constraint violation into a user-actionable Conflict.
///
/// Any other database failure passes through unchanged.
pub fn map_constraint(err: SqlError, conflict_msg: &str) -> Error {
    if let SqlError::SqliteFailure(e, _) = &err {
        if e.code == rusqlite::ErrorCode::ConstraintViolation {
            return Error::Conflict(conflict_msg.to_string());
        }
    }
    Error::Database(err)
}

/// Extension trait for converting rusqlite Results to Option
pub trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>, SqlError>;
}

impl<T> OptionalExt<T> for Result<T, SqlError> {
    fn optional(self) -> Result<Option<T>, SqlError> {
        match self {
            Ok(v) => Ok(Some(v)),
            Err(SqlError::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_room_status_decoding() {
        assert_eq!(
            room_status_from_str("Maintenance").unwrap(),
            RoomStatus::Maintenance
        );
        assert_eq!(room_status_from_str("Occupied").unwrap(), RoomStatus::OCCUPIED);
        assert_eq!(room_status_from_str("Vacant").unwrap(), RoomStatus::VACANT);
        // Unknown values fail the row instead of degrading silently
        assert!(room_status_from_str("???").is_err());
    }

    #[test]
    fn test_unknown_enum_values_rejected() {
        assert!(role_from_str("Superuser").is_err());
        assert_eq!(role_from_str("Admin").unwrap(), Role::Admin);
        assert!(bill_status_from_str("REFUNDED").is_err());
        assert!(complaint_status_from_str("Closed").is_err());
    }

    #[test]
    fn test_date_parsing() {
        assert!(parse_date("2025-10-01").is_ok());
        assert!(parse_date("01/10/2025").is_err());
    }
}
