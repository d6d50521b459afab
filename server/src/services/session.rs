//! Session token management.
//!
//! ARCHITECTURE
//! ============
//! Sessions are opaque 32-byte hex tokens stored server side with an expiry.
//! A token only proves identity; the role is resolved separately from the
//! profile table (see `services::auth`) so a role change takes effect on the
//! next request without reissuing tokens.

use std::fmt::Write;
use std::time::Duration;

use rand::Rng;
use serde::Serialize;
use sqlx::{PgPool, Row};
use time::OffsetDateTime;
use uuid::Uuid;

use super::role::Role;

pub(crate) fn bytes_to_hex(bytes: &[u8]) -> String {
    let mut s = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        let _ = write!(s, "{b:02x}");
    }
    s
}

/// Generate a cryptographically random 32-byte hex token.
#[must_use]
pub fn generate_token() -> String {
    let bytes: [u8; 32] = rand::rng().random();
    bytes_to_hex(&bytes)
}

/// Identity behind a valid, unexpired session token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionRecord {
    pub user_id: Uuid,
    pub email: String,
}

/// Authenticated user with a resolved role, as exposed to handlers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionUser {
    pub id: Uuid,
    pub email: String,
    pub role: Role,
}

/// Create a session for the given user, returning the token.
///
/// # Errors
///
/// Returns a database error if the insert fails.
pub async fn create_session(pool: &PgPool, user_id: Uuid, ttl: Duration) -> Result<String, sqlx::Error> {
    let token = generate_token();
    let expires_at = OffsetDateTime::now_utc() + ttl;
    sqlx::query("INSERT INTO sessions (token, user_id, expires_at) VALUES ($1, $2, $3)")
        .bind(&token)
        .bind(user_id)
        .bind(expires_at)
        .execute(pool)
        .await?;
    Ok(token)
}

/// Validate a session token and return the associated identity.
///
/// # Errors
///
/// Returns a database error if the lookup fails.
pub async fn validate_session(pool: &PgPool, token: &str) -> Result<Option<SessionRecord>, sqlx::Error> {
    let row = sqlx::query(
        r"SELECT u.id, u.email
          FROM sessions s
          JOIN users u ON u.id = s.user_id
          WHERE s.token = $1 AND s.expires_at > now()",
    )
    .bind(token)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(|r| SessionRecord { user_id: r.get("id"), email: r.get("email") }))
}

/// Delete a session by token. Deleting an unknown token is not an error.
///
/// # Errors
///
/// Returns a database error if the delete fails.
pub async fn delete_session(pool: &PgPool, token: &str) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM sessions WHERE token = $1")
        .bind(token)
        .execute(pool)
        .await?;
    Ok(())
}

/// Delete every session of `user_id` except `keep_token`.
///
/// # Errors
///
/// Returns a database error if the delete fails.
pub async fn delete_other_sessions(pool: &PgPool, user_id: Uuid, keep_token: &str) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("DELETE FROM sessions WHERE user_id = $1 AND token <> $2")
        .bind(user_id)
        .bind(keep_token)
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}

/// Remove expired sessions. Called once at startup.
///
/// # Errors
///
/// Returns a database error if the delete fails.
pub async fn purge_expired(pool: &PgPool) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("DELETE FROM sessions WHERE expires_at <= now()")
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}

#[cfg(test)]
#[path = "session_test.rs"]
mod tests;
