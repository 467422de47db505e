// Password hashing using Argon2id
// Decision: Default Argon2 parameters
// Decision: Passwords shorter than MIN_PASSWORD_LENGTH are refused before hashing

use anyhow::{bail, Result};
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};

pub const MIN_PASSWORD_LENGTH: usize = 8;

/// Reject passwords too short to be accepted for a new or changed account.
pub fn check_password_strength(password: &str) -> Result<()> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        bail!(
            "Password must be at least {} characters",
            MIN_PASSWORD_LENGTH
        );
    }
    Ok(())
}

pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("Failed to hash password: {}", e))?;
    Ok(hash.to_string())
}

/// Verify a password against a stored hash. A malformed hash is an error,
/// a mismatch is `Ok(false)`.
pub fn verify_password(password: &str, hash: &str) -> Result<bool> {
    let parsed = PasswordHash::new(hash)
        .map_err(|e| anyhow::anyhow!("Failed to parse password hash: {}", e))?;

    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_and_verify() {
        let hash = hash_password("till-drawer-42").unwrap();
        assert!(hash.starts_with("$argon2id$"));
        assert!(verify_password("till-drawer-42", &hash).unwrap());
        assert!(!verify_password("till-drawer-43", &hash).unwrap());
    }

    #[test]
    fn test_salted_hashes_differ() {
        let a = hash_password("same-password").unwrap();
        let b = hash_password("same-password").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_malformed_hash_is_error() {
        assert!(verify_password("anything", "not-a-hash").is_err());
    }

    #[test]
    fn test_password_strength() {
        assert!(check_password_strength("short").is_err());
        assert!(check_password_strength("12345678").is_ok());
    }
}
