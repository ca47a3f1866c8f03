//! Complaint storage operations

use rusqlite::{params, Connection};
use tracing::instrument;
use uuid::Uuid;

use super::parse::{
    complaint_status_from_str, parse_datetime, parse_uuid, parse_uuid_opt, OptionalExt,
};
use crate::error::Result;
use crate::models::{Complaint, ComplaintStatus};

pub struct ComplaintStore<'a> {
    conn: &'a Connection,
}

impl<'a> ComplaintStore<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    fn row_to_complaint(
        row: &rusqlite::Row<'_>,
    ) -> std::result::Result<Complaint, rusqlite::Error> {
        Ok(Complaint {
            id: parse_uuid(&row.get::<_, String>(0)?)?,
            student_id: parse_uuid(&row.get::<_, String>(1)?)?,
            title: row.get(2)?,
            description: row.get(3)?,
            status: complaint_status_from_str(&row.get::<_, String>(4)?)?,
            assigned_staff_id: parse_uuid_opt(row.get::<_, Option<String>>(5)?)?,
            created_at: parse_datetime(&row.get::<_, String>(6)?)?,
        })
    }

    const COLUMNS: &'static str =
        "id, student_id, title, description, status, assigned_staff_id, created_at";

    /// File a complaint
    #[instrument(skip(self, complaint), fields(student_id = %complaint.student_id))]
    pub fn create(&self, complaint: &Complaint) -> Result<()> {
        self.conn.execute(
            "INSERT INTO complaints (id, student_id, title, description, status, assigned_staff_id, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                complaint.id.to_string(),
                complaint.student_id.to_string(),
                complaint.title,
                complaint.description,
                complaint.status.as_str(),
                complaint.assigned_staff_id.map(|s| s.to_string()),
                complaint.created_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// Find complaint by ID
    #[instrument(skip(self))]
    pub fn find_by_id(&self, id: Uuid) -> Result<Option<Complaint>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM complaints WHERE id = ?1",
            Self::COLUMNS
        ))?;

        let complaint = stmt
            .query_row(params![id.to_string()], Self::row_to_complaint)
            .optional()?;

        Ok(complaint)
    }

    /// All complaints, newest first
    #[instrument(skip(self))]
    pub fn list(&self) -> Result<Vec<Complaint>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM complaints ORDER BY created_at DESC",
            Self::COLUMNS
        ))?;

        let complaints = stmt
            .query_map([], Self::row_to_complaint)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(complaints)
    }

    /// One student's complaints, newest first
    #[instrument(skip(self))]
    pub fn list_for_student(&self, student_id: Uuid) -> Result<Vec<Complaint>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM complaints WHERE student_id = ?1 ORDER BY created_at DESC",
            Self::COLUMNS
        ))?;

        let complaints = stmt
            .query_map(params![student_id.to_string()], Self::row_to_complaint)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(complaints)
    }

    /// Update status and staff assignment
    #[instrument(skip(self))]
    pub fn update(
        &self,
        complaint_id: Uuid,
        status: ComplaintStatus,
        assigned_staff_id: Option<Uuid>,
    ) -> Result<()> {
        self.conn.execute(
            "UPDATE complaints SET status = ?1, assigned_staff_id = ?2 WHERE id = ?3",
            params![
                status.as_str(),
                assigned_staff_id.map(|s| s.to_string()),
                complaint_id.to_string()
            ],
        )?;
        Ok(())
    }
}
