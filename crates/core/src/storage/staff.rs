//! Staff storage operations

use rusqlite::{params, Connection};
use tracing::instrument;
use uuid::Uuid;

use super::parse::{parse_datetime, parse_uuid, OptionalExt};
use crate::error::Result;
use crate::models::Staff;

pub struct StaffStore<'a> {
    conn: &'a Connection,
}

impl<'a> StaffStore<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    fn row_to_staff(row: &rusqlite::Row<'_>) -> std::result::Result<Staff, rusqlite::Error> {
        Ok(Staff {
            id: parse_uuid(&row.get::<_, String>(0)?)?,
            name: row.get(1)?,
            role: row.get(2)?,
            phone: row.get(3)?,
            shift: row.get(4)?,
            created_at: parse_datetime(&row.get::<_, String>(5)?)?,
        })
    }

    /// Add a staff member
    #[instrument(skip(self, staff), fields(name = %staff.name))]
    pub fn create(&self, staff: &Staff) -> Result<()> {
        self.conn.execute(
            "INSERT INTO staff (id, name, role, phone, shift, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                staff.id.to_string(),
                staff.name,
                staff.role,
                staff.phone,
                staff.shift,
                staff.created_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// Find staff member by ID
    #[instrument(skip(self))]
    pub fn find_by_id(&self, id: Uuid) -> Result<Option<Staff>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, name, role, phone, shift, created_at FROM staff WHERE id = ?1",
        )?;

        let staff = stmt
            .query_row(params![id.to_string()], Self::row_to_staff)
            .optional()?;

        Ok(staff)
    }

    /// List all staff ordered by name
    pub fn list(&self) -> Result<Vec<Staff>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, name, role, phone, shift, created_at FROM staff ORDER BY name")?;

        let staff = stmt
            .query_map([], Self::row_to_staff)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(staff)
    }

    /// Replace a staff member's fields
    #[instrument(skip(self, staff), fields(staff_id = %staff.id))]
    pub fn update(&self, staff: &Staff) -> Result<()> {
        self.conn.execute(
            "UPDATE staff SET name = ?1, role = ?2, phone = ?3, shift = ?4 WHERE id = ?5",
            params![
                staff.name,
                staff.role,
                staff.phone,
                staff.shift,
                staff.id.to_string()
            ],
        )?;
        Ok(())
    }

    /// Remove a staff member
    #[instrument(skip(self))]
    pub fn delete(&self, staff_id: Uuid) -> Result<()> {
        self.conn.execute(
            "DELETE FROM staff WHERE id = ?1",
            params![staff_id.to_string()],
        )?;
        Ok(())
    }
}
