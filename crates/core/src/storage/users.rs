//! User and session storage operations

use chrono::Utc;
use rusqlite::{params, Connection};
use tracing::instrument;
use uuid::Uuid;

use super::parse::{
    map_constraint, parse_datetime, parse_datetime_opt, parse_uuid, role_from_str, OptionalExt,
};
use crate::error::Result;
use crate::models::{Role, Session, User};

pub struct UserStore<'a> {
    conn: &'a Connection,
}

impl<'a> UserStore<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    fn row_to_user(row: &rusqlite::Row<'_>) -> std::result::Result<User, rusqlite::Error> {
        Ok(User {
            id: parse_uuid(&row.get::<_, String>(0)?)?,
            role: role_from_str(&row.get::<_, String>(1)?)?,
            email: row.get(2)?,
            password_hash: row.get(3)?,
            first_name: row.get(4)?,
            last_name: row.get(5)?,
            phone: row.get(6)?,
            is_active: row.get::<_, i32>(7)? != 0,
            created_at: parse_datetime(&row.get::<_, String>(8)?)?,
            last_login: parse_datetime_opt(row.get::<_, Option<String>>(9)?)?,
        })
    }

    const COLUMNS: &'static str = "id, role, email, password_hash, first_name, last_name, \
         phone, is_active, created_at, last_login";

    /// Create a new user. Duplicate email fails with Conflict.
    #[instrument(skip(self, user), fields(email = %user.email, role = %user.role))]
    pub fn create(&self, user: &User) -> Result<()> {
        self.conn
            .execute(
                "INSERT INTO users (id, role, email, password_hash, first_name, last_name, \
                 phone, is_active, created_at, last_login)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                params![
                    user.id.to_string(),
                    user.role.display_name(),
                    user.email,
                    user.password_hash,
                    user.first_name,
                    user.last_name,
                    user.phone,
                    user.is_active as i32,
                    user.created_at.to_rfc3339(),
                    user.last_login.map(|t| t.to_rfc3339()),
                ],
            )
            .map_err(|e| map_constraint(e, "Email already used"))?;
        Ok(())
    }

    /// Find user by ID
    #[instrument(skip(self))]
    pub fn find_by_id(&self, id: Uuid) -> Result<Option<User>> {
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT {} FROM users WHERE id = ?1", Self::COLUMNS))?;

        let user = stmt
            .query_row(params![id.to_string()], Self::row_to_user)
            .optional()?;

        Ok(user)
    }

    /// Find user by email
    #[instrument(skip(self))]
    pub fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM users WHERE email = ?1",
            Self::COLUMNS
        ))?;

        let user = stmt
            .query_row(params![email], Self::row_to_user)
            .optional()?;

        Ok(user)
    }

    /// Count users regardless of role (admin seeding check)
    pub fn count(&self) -> Result<u64> {
        let count: u64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))?;
        Ok(count)
    }

    /// IDs of all active users holding one of the given roles
    pub fn ids_with_roles(&self, roles: &[Role]) -> Result<Vec<Uuid>> {
        let mut ids = Vec::new();
        let mut stmt = self
            .conn
            .prepare("SELECT id FROM users WHERE role = ?1 AND is_active = 1")?;
        for role in roles {
            let found = stmt
                .query_map(params![role.display_name()], |row| {
                    parse_uuid(&row.get::<_, String>(0)?)
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            ids.extend(found);
        }
        Ok(ids)
    }

    /// Update last login time
    pub fn update_last_login(&self, user_id: Uuid) -> Result<()> {
        self.conn.execute(
            "UPDATE users SET last_login = ?1 WHERE id = ?2",
            params![Utc::now().to_rfc3339(), user_id.to_string()],
        )?;
        Ok(())
    }

    /// Create a session
    #[instrument(skip(self, session), fields(user_id = %session.user_id))]
    pub fn create_session(&self, session: &Session) -> Result<()> {
        self.conn.execute(
            "INSERT INTO sessions (id, user_id, created_at, expires_at) VALUES (?1, ?2, ?3, ?4)",
            params![
                session.id.to_string(),
                session.user_id.to_string(),
                session.created_at.to_rfc3339(),
                session.expires_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// Find valid session
    #[instrument(skip(self))]
    pub fn find_valid_session(&self, session_id: Uuid) -> Result<Option<Session>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, user_id, created_at, expires_at FROM sessions \
             WHERE id = ?1 AND expires_at > ?2",
        )?;

        let now = Utc::now().to_rfc3339();
        let session = stmt
            .query_row(params![session_id.to_string(), now], |row| {
                Ok(Session {
                    id: parse_uuid(&row.get::<_, String>(0)?)?,
                    user_id: parse_uuid(&row.get::<_, String>(1)?)?,
                    created_at: parse_datetime(&row.get::<_, String>(2)?)?,
                    expires_at: parse_datetime(&row.get::<_, String>(3)?)?,
                })
            })
            .optional()?;

        Ok(session)
    }

    /// Delete session
    pub fn delete_session(&self, session_id: Uuid) -> Result<()> {
        self.conn.execute(
            "DELETE FROM sessions WHERE id = ?1",
            params![session_id.to_string()],
        )?;
        Ok(())
    }

    /// Clean up expired sessions
    pub fn cleanup_expired_sessions(&self) -> Result<u64> {
        let count = self.conn.execute(
            "DELETE FROM sessions WHERE expires_at < ?1",
            params![Utc::now().to_rfc3339()],
        )?;
        Ok(count as u64)
    }
}
