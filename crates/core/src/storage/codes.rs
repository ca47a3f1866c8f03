//! Registration code storage operations

use rusqlite::{params, Connection};
use tracing::instrument;
use uuid::Uuid;

use super::parse::{map_constraint, parse_datetime, parse_uuid, role_from_str, OptionalExt};
use crate::error::Result;
use crate::models::RegistrationCode;

pub struct CodeStore<'a> {
    conn: &'a Connection,
}

impl<'a> CodeStore<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    fn row_to_code(
        row: &rusqlite::Row<'_>,
    ) -> std::result::Result<RegistrationCode, rusqlite::Error> {
        Ok(RegistrationCode {
            id: parse_uuid(&row.get::<_, String>(0)?)?,
            role: role_from_str(&row.get::<_, String>(1)?)?,
            code: row.get(2)?,
            is_active: row.get::<_, i32>(3)? != 0,
            created_at: parse_datetime(&row.get::<_, String>(4)?)?,
        })
    }

    /// Store a new code. Collision on the code string fails with Conflict
    /// so the caller can regenerate and retry.
    #[instrument(skip(self, code), fields(role = %code.role))]
    pub fn create(&self, code: &RegistrationCode) -> Result<()> {
        self.conn
            .execute(
                "INSERT INTO registration_codes (id, role, code, is_active, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    code.id.to_string(),
                    code.role.display_name(),
                    code.code,
                    code.is_active as i32,
                    code.created_at.to_rfc3339(),
                ],
            )
            .map_err(|e| map_constraint(e, "Registration code collision"))?;
        Ok(())
    }

    /// Find an active code by its string
    #[instrument(skip(self))]
    pub fn find_active(&self, code: &str) -> Result<Option<RegistrationCode>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, role, code, is_active, created_at \
             FROM registration_codes WHERE code = ?1 AND is_active = 1",
        )?;

        let found = stmt
            .query_row(params![code], Self::row_to_code)
            .optional()?;

        Ok(found)
    }

    /// Active codes, newest first
    pub fn list_active(&self) -> Result<Vec<RegistrationCode>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, role, code, is_active, created_at \
             FROM registration_codes WHERE is_active = 1 ORDER BY created_at DESC",
        )?;

        let codes = stmt
            .query_map([], Self::row_to_code)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(codes)
    }

    /// Delete a code
    #[instrument(skip(self))]
    pub fn delete(&self, code_id: Uuid) -> Result<()> {
        self.conn.execute(
            "DELETE FROM registration_codes WHERE id = ?1",
            params![code_id.to_string()],
        )?;
        Ok(())
    }
}
