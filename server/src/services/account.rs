//! Account registration and credential checks.
//!
//! E-mail addresses are normalized (trimmed, lower-cased) before every
//! insert and lookup, so uniqueness is effectively case-insensitive.

use sqlx::{PgPool, Row};
use uuid::Uuid;

use super::password::{self, PasswordRuleError};
use super::role::Role;

#[derive(Debug, thiserror::Error)]
pub enum AccountError {
    #[error("invalid email")]
    InvalidEmail,
    #[error(transparent)]
    WeakPassword(#[from] PasswordRuleError),
    #[error("an account with this email already exists")]
    EmailTaken,
    #[error("invalid email or password")]
    InvalidCredentials,
    #[error("password hashing failed: {0}")]
    Hash(String),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

#[must_use]
pub fn normalize_email(email: &str) -> Option<String> {
    let normalized = email.trim().to_ascii_lowercase();
    let mut parts = normalized.split('@');
    let (Some(local), Some(domain), None) = (parts.next(), parts.next(), parts.next()) else {
        return None;
    };
    if local.is_empty() || domain.is_empty() || normalized.chars().any(char::is_whitespace) {
        return None;
    }
    Some(normalized)
}

/// Register a new account with the default `user` role.
///
/// Returns the new user's id and normalized e-mail.
///
/// # Errors
///
/// [`AccountError::InvalidEmail`], [`AccountError::WeakPassword`] or
/// [`AccountError::EmailTaken`] for rejected input.
pub async fn sign_up(
    pool: &PgPool,
    email: &str,
    plain_password: &str,
    min_password_length: usize,
) -> Result<(Uuid, String), AccountError> {
    let email = normalize_email(email).ok_or(AccountError::InvalidEmail)?;
    password::validate_strength(plain_password, min_password_length)?;
    let hash = password::hash_password(plain_password).map_err(|e| AccountError::Hash(e.to_string()))?;

    let mut tx = pool.begin().await?;
    let inserted = sqlx::query("INSERT INTO users (email, password_hash) VALUES ($1, $2) RETURNING id")
        .bind(&email)
        .bind(&hash)
        .fetch_one(&mut *tx)
        .await;
    let user_id: Uuid = match inserted {
        Ok(row) => row.get("id"),
        Err(sqlx::Error::Database(db)) if db.is_unique_violation() => return Err(AccountError::EmailTaken),
        Err(e) => return Err(e.into()),
    };

    sqlx::query("INSERT INTO profiles (user_id, role) VALUES ($1, $2)")
        .bind(user_id)
        .bind(Role::User.as_str())
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;

    tracing::info!(%user_id, "account created");
    Ok((user_id, email))
}

/// Check an e-mail/password pair. Unknown e-mail and wrong password are
/// indistinguishable to the caller.
///
/// Returns the user's id and normalized e-mail.
///
/// # Errors
///
/// [`AccountError::InvalidCredentials`] when the pair does not match.
pub async fn authenticate(pool: &PgPool, email: &str, plain_password: &str) -> Result<(Uuid, String), AccountError> {
    let email = normalize_email(email).ok_or(AccountError::InvalidCredentials)?;
    let row = sqlx::query("SELECT id, password_hash FROM users WHERE email = $1")
        .bind(&email)
        .fetch_optional(pool)
        .await?
        .ok_or(AccountError::InvalidCredentials)?;

    let stored: String = row.get("password_hash");
    let matches = password::verify_password(plain_password, &stored).map_err(|e| {
        tracing::error!(error = %e, "stored password hash is unusable");
        AccountError::InvalidCredentials
    })?;
    if !matches {
        return Err(AccountError::InvalidCredentials);
    }
    Ok((row.get("id"), email))
}

/// Look up a user id by (normalized) e-mail.
///
/// # Errors
///
/// Returns a database error if the lookup fails.
pub async fn find_user_id(pool: &PgPool, email: &str) -> Result<Option<Uuid>, AccountError> {
    let Some(email) = normalize_email(email) else {
        return Ok(None);
    };
    let id = sqlx::query_scalar("SELECT id FROM users WHERE email = $1")
        .bind(email)
        .fetch_optional(pool)
        .await?;
    Ok(id)
}

/// Replace the password of `user_id`.
///
/// # Errors
///
/// [`AccountError::WeakPassword`] if the new password breaks the rule.
pub async fn set_password(
    pool: &PgPool,
    user_id: Uuid,
    plain_password: &str,
    min_password_length: usize,
) -> Result<(), AccountError> {
    password::validate_strength(plain_password, min_password_length)?;
    let hash = password::hash_password(plain_password).map_err(|e| AccountError::Hash(e.to_string()))?;
    sqlx::query("UPDATE users SET password_hash = $2 WHERE id = $1")
        .bind(user_id)
        .bind(hash)
        .execute(pool)
        .await?;
    tracing::info!(%user_id, "password updated");
    Ok(())
}

#[cfg(test)]
#[path = "account_test.rs"]
mod tests;
