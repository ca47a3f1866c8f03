//! SQLite storage layer for Dorma

mod allocations;
mod attendance;
mod billing;
mod codes;
mod complaints;
mod migrations;
mod notifications;
mod parse;
mod rooms;
mod staff;
mod students;
mod traits;
mod users;

use rusqlite::Connection;
use std::path::Path;
use tracing::instrument;
use uuid::Uuid;

use crate::billing::BillingEngine;
use crate::error::Result;
use crate::models::{Notification, Role, Session, Student, StudentInfo, User};
use crate::occupancy::OccupancyEngine;

pub use allocations::AllocationStore;
pub use attendance::AttendanceStore;
pub use billing::BillingStore;
pub use codes::CodeStore;
pub use complaints::ComplaintStore;
pub use notifications::NotificationStore;
pub use rooms::RoomStore;
pub use staff::StaffStore;
pub use students::StudentStore;
pub use traits::{NotificationRepository, Storage, StudentRepository, UserRepository};
pub use users::UserStore;

/// Main database handle
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open or create database at the given path
    #[instrument(skip(path), fields(path = %path.as_ref().display()))]
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA foreign_keys = ON")?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    /// Open in-memory database (for testing)
    #[instrument]
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON")?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    /// Initialize database schema via migrations
    fn init(&self) -> Result<()> {
        migrations::run_migrations(&self.conn)?;
        Ok(())
    }

    /// Get current schema version
    pub fn schema_version(&self) -> u32 {
        self.conn
            .query_row("SELECT MAX(version) FROM schema_migrations", [], |row| {
                row.get(0)
            })
            .unwrap_or(0)
    }

    /// Get user store
    pub fn users(&self) -> UserStore<'_> {
        UserStore::new(&self.conn)
    }

    /// Get student store
    pub fn students(&self) -> StudentStore<'_> {
        StudentStore::new(&self.conn)
    }

    /// Get room hierarchy store
    pub fn rooms(&self) -> RoomStore<'_> {
        RoomStore::new(&self.conn)
    }

    /// Get allocation store
    pub fn allocations(&self) -> AllocationStore<'_> {
        AllocationStore::new(&self.conn)
    }

    /// Get the raw billing store (bills, payments, fee structures)
    pub fn bills(&self) -> BillingStore<'_> {
        BillingStore::new(&self.conn)
    }

    /// Get attendance store
    pub fn attendance(&self) -> AttendanceStore<'_> {
        AttendanceStore::new(&self.conn)
    }

    /// Get complaint store
    pub fn complaints(&self) -> ComplaintStore<'_> {
        ComplaintStore::new(&self.conn)
    }

    /// Get staff store
    pub fn staff(&self) -> StaffStore<'_> {
        StaffStore::new(&self.conn)
    }

    /// Get notification store
    pub fn notifications(&self) -> NotificationStore<'_> {
        NotificationStore::new(&self.conn)
    }

    /// Get registration code store
    pub fn codes(&self) -> CodeStore<'_> {
        CodeStore::new(&self.conn)
    }

    /// Occupancy engine: the only writer of derived room status
    pub fn occupancy(&self) -> OccupancyEngine<'_> {
        OccupancyEngine::new(&self.conn)
    }

    /// Billing engine: bills and the payment ledger
    pub fn billing(&self) -> BillingEngine<'_> {
        BillingEngine::new(&self.conn)
    }
}

// Implement repository traits for Database
// This enables using Database through the trait interface

impl UserRepository for Database {
    fn create_user(&self, user: &User) -> Result<()> {
        self.users().create(user)
    }

    fn find_user_by_id(&self, id: Uuid) -> Result<Option<User>> {
        self.users().find_by_id(id)
    }

    fn find_user_by_email(&self, email: &str) -> Result<Option<User>> {
        self.users().find_by_email(email)
    }

    fn update_last_login(&self, user_id: Uuid) -> Result<()> {
        self.users().update_last_login(user_id)
    }

    fn count_users(&self) -> Result<u64> {
        self.users().count()
    }

    fn ids_with_roles(&self, roles: &[Role]) -> Result<Vec<Uuid>> {
        self.users().ids_with_roles(roles)
    }

    fn create_session(&self, session: &Session) -> Result<()> {
        self.users().create_session(session)
    }

    fn find_valid_session(&self, session_id: Uuid) -> Result<Option<Session>> {
        self.users().find_valid_session(session_id)
    }

    fn delete_session(&self, session_id: Uuid) -> Result<()> {
        self.users().delete_session(session_id)
    }

    fn cleanup_expired_sessions(&self) -> Result<u64> {
        self.users().cleanup_expired_sessions()
    }
}

impl StudentRepository for Database {
    fn create_student(&self, student: &Student) -> Result<()> {
        self.students().create(student)
    }

    fn find_student_by_id(&self, id: Uuid) -> Result<Option<Student>> {
        self.students().find_by_id(id)
    }

    fn find_student_by_user(&self, user_id: Uuid) -> Result<Option<Student>> {
        self.students().find_by_user(user_id)
    }

    fn list_students(&self) -> Result<Vec<StudentInfo>> {
        self.students().list()
    }
}

impl NotificationRepository for Database {
    fn create_notification(&self, notification: &Notification) -> Result<()> {
        self.notifications().create(notification)
    }

    fn list_notifications(&self, user_id: Uuid, limit: u32) -> Result<Vec<Notification>> {
        self.notifications().list_for_user(user_id, limit)
    }

    fn unread_count(&self, user_id: Uuid) -> Result<u64> {
        self.notifications().unread_count(user_id)
    }

    fn mark_read(&self, user_id: Uuid, ids: &[Uuid]) -> Result<u64> {
        self.notifications().mark_read(user_id, ids)
    }

    fn mark_all_read(&self, user_id: Uuid) -> Result<u64> {
        self.notifications().mark_all_read(user_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dorma.db");

        let user = User::new(Role::Admin, "admin@dorm.test".to_string(), "hash".to_string());
        {
            let db = Database::open(&path).unwrap();
            assert!(db.schema_version() > 0);
            db.create_user(&user).unwrap();
        }

        let db = Database::open(&path).unwrap();
        let found = db.find_user_by_email("admin@dorm.test").unwrap().unwrap();
        assert_eq!(found.id, user.id);
        assert_eq!(found.role, Role::Admin);
    }

    #[test]
    fn test_migrations_are_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dorma.db");

        let first = Database::open(&path).unwrap().schema_version();
        let second = Database::open(&path).unwrap().schema_version();
        assert_eq!(first, second);
    }
}
