//! Storage repository traits
//!
//! These traits define the storage interface, allowing for different
//! implementations (SQLite, mock, future network backend).

use uuid::Uuid;

use crate::error::Result;
use crate::models::{Notification, Role, Session, Student, StudentInfo, User};

/// User repository operations
pub trait UserRepository {
    /// Create a new user
    fn create_user(&self, user: &User) -> Result<()>;

    /// Find user by ID
    fn find_user_by_id(&self, id: Uuid) -> Result<Option<User>>;

    /// Find user by email
    fn find_user_by_email(&self, email: &str) -> Result<Option<User>>;

    /// Update user's last login time
    fn update_last_login(&self, user_id: Uuid) -> Result<()>;

    /// Count all users
    fn count_users(&self) -> Result<u64>;

    /// IDs of active users holding one of the given roles
    fn ids_with_roles(&self, roles: &[Role]) -> Result<Vec<Uuid>>;

    /// Create a session
    fn create_session(&self, session: &Session) -> Result<()>;

    /// Find a valid (non-expired) session
    fn find_valid_session(&self, session_id: Uuid) -> Result<Option<Session>>;

    /// Delete a session
    fn delete_session(&self, session_id: Uuid) -> Result<()>;

    /// Clean up expired sessions
    fn cleanup_expired_sessions(&self) -> Result<u64>;
}

/// Student repository operations
pub trait StudentRepository {
    /// Create a student record
    fn create_student(&self, student: &Student) -> Result<()>;

    /// Find student by ID
    fn find_student_by_id(&self, id: Uuid) -> Result<Option<Student>>;

    /// Find the student record backing a user account
    fn find_student_by_user(&self, user_id: Uuid) -> Result<Option<Student>>;

    /// List all students with user identity
    fn list_students(&self) -> Result<Vec<StudentInfo>>;
}

/// Notification repository operations
pub trait NotificationRepository {
    /// Persist a notification
    fn create_notification(&self, notification: &Notification) -> Result<()>;

    /// A user's notifications, newest first
    fn list_notifications(&self, user_id: Uuid, limit: u32) -> Result<Vec<Notification>>;

    /// Count of unread notifications
    fn unread_count(&self, user_id: Uuid) -> Result<u64>;

    /// Mark selected notifications read
    fn mark_read(&self, user_id: Uuid, ids: &[Uuid]) -> Result<u64>;

    /// Mark everything read for a user
    fn mark_all_read(&self, user_id: Uuid) -> Result<u64>;
}

/// Combined storage interface
///
/// Provides access to the account-facing repository operations.
/// Implementations may be backed by SQLite, mocks, or network.
pub trait Storage: UserRepository + StudentRepository + NotificationRepository {}

// Blanket implementation: any type implementing all traits implements Storage
impl<T> Storage for T where T: UserRepository + StudentRepository + NotificationRepository {}
