//! Argon2id password hashing and the password strength rule.
//!
//! Hashes are stored as PHC strings so algorithm parameters and salt travel
//! with the hash.

use argon2::Argon2;
use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};

/// Upper bound on accepted password length; hashing cost grows with input.
pub const MAX_PASSWORD_LENGTH: usize = 128;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum PasswordRuleError {
    #[error("Password must be at least {0} characters long")]
    TooShort(usize),
    #[error("Password must be at most {} characters long", MAX_PASSWORD_LENGTH)]
    TooLong,
}

/// Hash a plaintext password using Argon2id with a random salt.
///
/// # Errors
///
/// Returns an error if the hasher rejects the input.
pub fn hash_password(password: &str) -> Result<String, argon2::password_hash::Error> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default().hash_password(password.as_bytes(), &salt)?;
    Ok(hash.to_string())
}

/// Verify a plaintext password against a stored PHC hash.
///
/// Returns `Ok(false)` on mismatch; `Err` only when the stored hash is unusable.
///
/// # Errors
///
/// Returns an error if `hash` is not a valid PHC string.
pub fn verify_password(password: &str, hash: &str) -> Result<bool, argon2::password_hash::Error> {
    let parsed = PasswordHash::new(hash)?;
    match Argon2::default().verify_password(password.as_bytes(), &parsed) {
        Ok(()) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(e) => Err(e),
    }
}

/// Enforce the minimum (and maximum) password length, counted in characters.
///
/// # Errors
///
/// Returns the violated rule.
pub fn validate_strength(password: &str, min_length: usize) -> Result<(), PasswordRuleError> {
    let len = password.chars().count();
    if len < min_length {
        return Err(PasswordRuleError::TooShort(min_length));
    }
    if len > MAX_PASSWORD_LENGTH {
        return Err(PasswordRuleError::TooLong);
    }
    Ok(())
}

#[cfg(test)]
#[path = "password_test.rs"]
mod tests;
