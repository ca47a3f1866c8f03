//! User, role and session models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Account roles in priority order (highest to lowest)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum Role {
    /// Full control over the hostel
    Admin = 3,
    /// Day-to-day operations: rooms, allocations, billing, attendance
    Warden = 2,
    /// Resident: own bills, own attendance, complaints
    Student = 1,
}

impl Role {
    pub fn display_name(&self) -> &'static str {
        match self {
            Role::Admin => "Admin",
            Role::Warden => "Warden",
            Role::Student => "Student",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

/// A user account
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub role: Role,
    pub email: String,
    pub password_hash: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub last_login: Option<DateTime<Utc>>,
}

impl User {
    pub fn new(role: Role, email: String, password_hash: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            role,
            email,
            password_hash,
            first_name: None,
            last_name: None,
            phone: None,
            is_active: true,
            created_at: Utc::now(),
            last_login: None,
        }
    }

    /// "First Last", falling back to the email local part
    pub fn display_name(&self) -> String {
        let full = format!(
            "{} {}",
            self.first_name.as_deref().unwrap_or(""),
            self.last_name.as_deref().unwrap_or("")
        );
        let full = full.trim();
        if full.is_empty() {
            self.email
                .split('@')
                .next()
                .unwrap_or(&self.email)
                .to_string()
        } else {
            full.to_string()
        }
    }
}

/// Active session for a logged-in user
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: Uuid,
    pub user_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Session {
    pub fn new(user_id: Uuid, duration_hours: i64) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            user_id,
            created_at: now,
            expires_at: now + chrono::Duration::hours(duration_hours),
        }
    }

    pub fn is_valid(&self) -> bool {
        Utc::now() < self.expires_at
    }
}

/// The authenticated principal acting on a request.
///
/// Resolved by the session layer; the engines trust it fully.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Actor {
    pub user_id: Uuid,
    pub role: Role,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_ordering() {
        assert!(Role::Admin > Role::Warden);
        assert!(Role::Warden > Role::Student);
    }

    #[test]
    fn test_display_name_fallback() {
        let user = User::new(Role::Student, "amal@example.com".into(), "hash".into());
        assert_eq!(user.display_name(), "amal");

        let mut named = user.clone();
        named.first_name = Some("Amal".into());
        named.last_name = Some("Perera".into());
        assert_eq!(named.display_name(), "Amal Perera");
    }

    #[test]
    fn test_session_validity() {
        let session = Session::new(Uuid::new_v4(), 24);
        assert!(session.is_valid());
    }
}
