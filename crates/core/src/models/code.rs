//! Role-based registration codes

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::Role;

/// A single-role registration code handed out by an Admin.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistrationCode {
    pub id: Uuid,
    pub role: Role,
    pub code: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl RegistrationCode {
    pub fn new(role: Role) -> Self {
        Self {
            id: Uuid::new_v4(),
            role,
            code: generate_code(role),
            is_active: true,
            created_at: Utc::now(),
        }
    }
}

/// `ROLE-XXXXXX` with an uppercase alphanumeric suffix
fn generate_code(role: Role) -> String {
    const ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
    let mut rng = rand::thread_rng();
    let suffix: String = (0..6)
        .map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())] as char)
        .collect();
    format!("{}-{}", role.display_name().to_uppercase(), suffix)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_code_shape() {
        let code = RegistrationCode::new(Role::Warden);
        assert!(code.code.starts_with("WARDEN-"));
        assert_eq!(code.code.len(), "WARDEN-".len() + 6);
        assert!(code.is_active);
    }
}
