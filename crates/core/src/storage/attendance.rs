//! Attendance storage operations

use chrono::NaiveDate;
use rusqlite::{params, Connection};
use tracing::instrument;
use uuid::Uuid;

use super::parse::{parse_date, parse_uuid};
use crate::error::Result;
use crate::models::{AttendanceMark, AttendanceSession, AttendanceSummaryRow};

pub struct AttendanceStore<'a> {
    conn: &'a Connection,
}

impl<'a> AttendanceStore<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Record marks for one (date, session). Re-marking replaces the
    /// stored status for that key.
    #[instrument(skip(self, marks), fields(date = %date, session = session.as_str(), count = marks.len()))]
    pub fn mark(
        &self,
        date: NaiveDate,
        session: AttendanceSession,
        marks: &[AttendanceMark],
    ) -> Result<u32> {
        let mut stmt = self.conn.prepare(
            "INSERT INTO attendance (student_id, date, session, status) VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(student_id, date, session) DO UPDATE SET status = excluded.status",
        )?;
        let mut written = 0;
        for mark in marks {
            stmt.execute(params![
                mark.student_id.to_string(),
                date.to_string(),
                session.as_str(),
                mark.status.as_str(),
            ])?;
            written += 1;
        }
        Ok(written)
    }

    /// Monthly per-student per-day aggregate. Scoped to one student when
    /// `student_id` is given (the student self-view).
    #[instrument(skip(self))]
    pub fn summary(&self, month: &str, student_id: Option<Uuid>) -> Result<Vec<AttendanceSummaryRow>> {
        let scope = if student_id.is_some() {
            "AND a.student_id = ?2"
        } else {
            ""
        };
        let sql = format!(
            "SELECT a.student_id,
                    a.date,
                    SUM(a.session = 'Day' AND a.status = 'Present'),
                    SUM(a.session = 'Day' AND a.status = 'Absent'),
                    SUM(a.session = 'Night' AND a.status = 'Present'),
                    SUM(a.session = 'Night' AND a.status = 'Absent'),
                    TRIM(COALESCE(u.first_name, '') || ' ' || COALESCE(u.last_name, ''))
             FROM attendance a
             LEFT JOIN students s ON s.id = a.student_id
             LEFT JOIN users u ON u.id = s.user_id
             WHERE substr(a.date, 1, 7) = ?1 {}
             GROUP BY a.student_id, a.date
             ORDER BY a.date DESC",
            scope
        );
        let mut stmt = self.conn.prepare(&sql)?;

        let map_row = |row: &rusqlite::Row<'_>| {
            Ok(AttendanceSummaryRow {
                student_id: parse_uuid(&row.get::<_, String>(0)?)?,
                date: parse_date(&row.get::<_, String>(1)?)?,
                present_day: row.get(2)?,
                absent_day: row.get(3)?,
                present_night: row.get(4)?,
                absent_night: row.get(5)?,
                student_name: row.get(6)?,
            })
        };

        let rows = match student_id {
            Some(sid) => stmt
                .query_map(params![month, sid.to_string()], map_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?,
            None => stmt
                .query_map(params![month], map_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?,
        };

        Ok(rows)
    }
}
