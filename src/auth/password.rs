//! Password hashing and verification.

use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, SaltString};
use argon2::Argon2;
use std::sync::LazyLock;
use thiserror::Error;

/// Stand-in hash for sign-ins naming an account that does not exist.
static UNKNOWN_USER_HASH: LazyLock<Option<String>> =
    LazyLock::new(|| Argon2Passwords.hash("unknown-user").ok());

#[derive(Debug, Error)]
pub enum PasswordError {
    #[error("failed to hash password: {0}")]
    Hash(argon2::password_hash::Error),
    #[error("stored password hash is not a valid PHC string: {0}")]
    InvalidHash(argon2::password_hash::Error),
    #[error("password verification failed: {0}")]
    Verify(argon2::password_hash::Error),
}

/// Checks a raw password against a stored hash.
pub trait PasswordVerifier: Send + Sync {
    fn matches(&self, raw: &str, stored_hash: &str) -> Result<bool, PasswordError>;
}

/// Argon2id with default parameters, stored as PHC strings.
#[derive(Debug, Clone, Copy, Default)]
pub struct Argon2Passwords;

impl Argon2Passwords {
    pub fn hash(&self, raw: &str) -> Result<String, PasswordError> {
        let salt = SaltString::generate(&mut OsRng);
        let hash = Argon2::default()
            .hash_password(raw.as_bytes(), &salt)
            .map_err(PasswordError::Hash)?;
        Ok(hash.to_string())
    }

    /// Spend one full verification on `raw` without checking it against any
    /// account. The sign-in path for unknown usernames calls this.
    pub fn verify_unknown_user(&self, raw: &str) {
        if let Some(hash) = UNKNOWN_USER_HASH.as_deref() {
            let _ = self.matches(raw, hash);
        }
    }
}

impl PasswordVerifier for Argon2Passwords {
    fn matches(&self, raw: &str, stored_hash: &str) -> Result<bool, PasswordError> {
        use argon2::PasswordVerifier as _;

        let parsed = PasswordHash::new(stored_hash).map_err(PasswordError::InvalidHash)?;
        match Argon2::default().verify_password(raw.as_bytes(), &parsed) {
            Ok(()) => Ok(true),
            Err(argon2::password_hash::Error::Password) => Ok(false),
            Err(e) => Err(PasswordError::Verify(e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_and_verify() {
        let passwords = Argon2Passwords;
        let hash = passwords.hash("correct horse").unwrap();

        assert!(hash.starts_with("$argon2id$"));
        assert!(passwords.matches("correct horse", &hash).unwrap());
        assert!(!passwords.matches("battery staple", &hash).unwrap());
    }

    #[test]
    fn test_same_password_gets_distinct_salts() {
        let passwords = Argon2Passwords;
        assert_ne!(
            passwords.hash("secret").unwrap(),
            passwords.hash("secret").unwrap()
        );
    }

    #[test]
    fn test_unknown_user_hash_matches_real_parameters() {
        let real = Argon2Passwords.hash("secret").unwrap();
        let real = PasswordHash::new(&real).unwrap();
        let stand_in = UNKNOWN_USER_HASH.as_deref().unwrap();
        let stand_in = PasswordHash::new(stand_in).unwrap();

        assert_eq!(real.algorithm, stand_in.algorithm);
        assert_eq!(real.version, stand_in.version);
        assert_eq!(real.params, stand_in.params);

        // Never panics, whatever the input
        Argon2Passwords.verify_unknown_user("unknown-user");
        Argon2Passwords.verify_unknown_user("");
    }

    #[test]
    fn test_invalid_stored_hash() {
        assert!(matches!(
            Argon2Passwords.matches("secret", "not-a-phc-string"),
            Err(PasswordError::InvalidHash(_))
        ));
    }
}
