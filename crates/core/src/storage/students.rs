//! Student storage operations

use rusqlite::{params, Connection};
use tracing::instrument;
use uuid::Uuid;

use super::parse::{map_constraint, parse_datetime, parse_uuid, OptionalExt};
use crate::error::Result;
use crate::models::{Student, StudentInfo};

pub struct StudentStore<'a> {
    conn: &'a Connection,
}

impl<'a> StudentStore<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    fn row_to_student(row: &rusqlite::Row<'_>) -> std::result::Result<Student, rusqlite::Error> {
        Ok(Student {
            id: parse_uuid(&row.get::<_, String>(0)?)?,
            user_id: parse_uuid(&row.get::<_, String>(1)?)?,
            guardian_name: row.get(2)?,
            guardian_phone: row.get(3)?,
            address: row.get(4)?,
            created_at: parse_datetime(&row.get::<_, String>(5)?)?,
        })
    }

    /// Create a student record. One record per user.
    #[instrument(skip(self, student), fields(user_id = %student.user_id))]
    pub fn create(&self, student: &Student) -> Result<()> {
        self.conn
            .execute(
                "INSERT INTO students (id, user_id, guardian_name, guardian_phone, address, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    student.id.to_string(),
                    student.user_id.to_string(),
                    student.guardian_name,
                    student.guardian_phone,
                    student.address,
                    student.created_at.to_rfc3339(),
                ],
            )
            .map_err(|e| map_constraint(e, "Student record already exists for this user"))?;
        Ok(())
    }

    /// Find student by ID
    #[instrument(skip(self))]
    pub fn find_by_id(&self, id: Uuid) -> Result<Option<Student>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, user_id, guardian_name, guardian_phone, address, created_at \
             FROM students WHERE id = ?1",
        )?;

        let student = stmt
            .query_row(params![id.to_string()], Self::row_to_student)
            .optional()?;

        Ok(student)
    }

    /// Find the student record backing a user account
    #[instrument(skip(self))]
    pub fn find_by_user(&self, user_id: Uuid) -> Result<Option<Student>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, user_id, guardian_name, guardian_phone, address, created_at \
             FROM students WHERE user_id = ?1",
        )?;

        let student = stmt
            .query_row(params![user_id.to_string()], Self::row_to_student)
            .optional()?;

        Ok(student)
    }

    /// All student IDs (batch bill generation)
    pub fn list_ids(&self) -> Result<Vec<Uuid>> {
        let mut stmt = self.conn.prepare("SELECT id FROM students")?;
        let ids = stmt
            .query_map([], |row| parse_uuid(&row.get::<_, String>(0)?))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(ids)
    }

    /// List all students with their user identity
    #[instrument(skip(self))]
    pub fn list(&self) -> Result<Vec<StudentInfo>> {
        let mut stmt = self.conn.prepare(
            "SELECT s.id, s.user_id, s.guardian_name, s.guardian_phone, s.address, s.created_at,
                    u.email, u.first_name, u.last_name, u.phone
             FROM students s
             INNER JOIN users u ON u.id = s.user_id
             ORDER BY u.first_name, u.last_name",
        )?;

        let students = stmt
            .query_map([], |row| {
                Ok(StudentInfo {
                    student: Self::row_to_student(row)?,
                    email: row.get(6)?,
                    first_name: row.get(7)?,
                    last_name: row.get(8)?,
                    phone: row.get(9)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(students)
    }
}
