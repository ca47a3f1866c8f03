//! Credential checks and the login-first handshake helpers
//!
//! Passwords are argon2 hashes. These functions speak `dorma_core::Error`
//! so the server can map failures onto wire error codes uniformly.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use dorma_core::{
    Database, Error, Result, Role, Session, Student, StudentRepository, User, UserRepository,
};

/// Hash a password for storage
pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();
    let hash = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| Error::Authentication(format!("Password hashing failed: {}", e)))?;
    Ok(hash.to_string())
}

/// Verify a password against a stored hash
pub fn verify_password(password: &str, stored_hash: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(stored_hash) else {
        return false;
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok()
}

/// Password login. Creates a session on success.
#[instrument(skip(storage, password))]
pub fn login<S: UserRepository>(
    storage: &S,
    email: &str,
    password: &str,
    session_hours: i64,
) -> Result<(User, Session)> {
    let user = storage
        .find_user_by_email(email)?
        .filter(|u| u.is_active)
        .ok_or_else(|| Error::Authentication("Invalid credentials".into()))?;

    if !verify_password(password, &user.password_hash) {
        warn!(email = %email, "password verification failed");
        return Err(Error::Authentication("Invalid credentials".into()));
    }

    storage.update_last_login(user.id)?;
    let session = Session::new(user.id, session_hours);
    storage.create_session(&session)?;
    info!(user_id = %user.id, role = %user.role, "user logged in");
    Ok((user, session))
}

/// Resume an existing session by token
#[instrument(skip(storage))]
pub fn resume<S: UserRepository>(storage: &S, token: Uuid) -> Result<(User, Session)> {
    let session = storage
        .find_valid_session(token)?
        .ok_or_else(|| Error::Authentication("Session expired".into()))?;
    let user = storage
        .find_user_by_id(session.user_id)?
        .filter(|u| u.is_active)
        .ok_or_else(|| Error::Authentication("Account disabled".into()))?;
    Ok((user, session))
}

/// Redeem a registration code and create the account.
///
/// The code fixes the role; a Student code also creates the student
/// record so the account is immediately allocatable.
#[instrument(skip(db, password))]
pub fn register(
    db: &Database,
    code: &str,
    email: &str,
    password: &str,
    first_name: Option<String>,
    last_name: Option<String>,
) -> Result<User> {
    let code = db
        .codes()
        .find_active(code)?
        .ok_or_else(|| Error::Authentication("Invalid registration code".into()))?;

    let mut user = User::new(code.role, email.to_string(), hash_password(password)?);
    user.first_name = first_name;
    user.last_name = last_name;
    db.create_user(&user)?;

    if code.role == Role::Student {
        db.create_student(&Student::new(user.id))?;
    }

    info!(user_id = %user.id, role = %user.role, "account registered");
    Ok(user)
}

#[cfg(test)]
mod tests {
    use super::*;
    use dorma_core::RegistrationCode;

    fn db_with_user(email: &str, password: &str) -> Database {
        let db = Database::open_in_memory().unwrap();
        let user = User::new(
            Role::Admin,
            email.to_string(),
            hash_password(password).unwrap(),
        );
        db.create_user(&user).unwrap();
        db
    }

    #[test]
    fn test_login_and_resume() {
        let db = db_with_user("admin@dorm.test", "hunter2");

        let (user, session) = login(&db, "admin@dorm.test", "hunter2", 24).unwrap();
        assert_eq!(user.role, Role::Admin);

        let (resumed, _) = resume(&db, session.id).unwrap();
        assert_eq!(resumed.id, user.id);
    }

    #[test]
    fn test_wrong_password_rejected() {
        let db = db_with_user("admin@dorm.test", "hunter2");
        let err = login(&db, "admin@dorm.test", "wrong", 24).unwrap_err();
        assert!(matches!(err, Error::Authentication(_)));

        let err = login(&db, "nobody@dorm.test", "hunter2", 24).unwrap_err();
        assert!(matches!(err, Error::Authentication(_)));
    }

    #[test]
    fn test_register_student_via_code() {
        let db = Database::open_in_memory().unwrap();
        let code = RegistrationCode::new(Role::Student);
        db.codes().create(&code).unwrap();

        let user = register(&db, &code.code, "s@dorm.test", "pw", None, None).unwrap();
        assert_eq!(user.role, Role::Student);
        assert!(db.find_student_by_user(user.id).unwrap().is_some());

        let err = register(&db, "STUDENT-XXXXXX", "t@dorm.test", "pw", None, None).unwrap_err();
        assert!(matches!(err, Error::Authentication(_)));
    }
}
