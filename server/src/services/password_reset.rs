//! Password reset by e-mailed one-time code.
//!
//! DESIGN
//! ======
//! A reset request stores only the SHA-256 of a six-character code drawn
//! from an alphabet without look-alike glyphs. Codes expire after 15 minutes
//! and are burned after five wrong guesses. Requesting a new code invalidates
//! any outstanding one for the same address.
//!
//! Unknown addresses get the same success response as known ones so the
//! endpoint cannot be used to enumerate accounts.

use rand::Rng;
use sha2::{Digest, Sha256};
use sqlx::PgPool;
use uuid::Uuid;

use super::account::{self, AccountError};
use super::mailer::{MailError, Mailer};
use super::session;

const CODE_LEN: usize = 6;
const CODE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";
const MAX_FAILED_ATTEMPTS: i32 = 5;
const RESET_SUBJECT: &str = "Your GrantFinder password reset code";
const RESET_TEMPLATE: &str = include_str!("../../templates/password_reset.html");

#[derive(Debug, thiserror::Error)]
pub enum PasswordResetError {
    #[error("invalid email")]
    InvalidEmail,
    #[error("invalid code")]
    InvalidCode,
    #[error("expired or incorrect code")]
    VerificationFailed,
    #[error("Passwords do not match.")]
    PasswordMismatch,
    #[error(transparent)]
    Account(#[from] AccountError),
    #[error(transparent)]
    Delivery(#[from] MailError),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

#[must_use]
pub fn normalize_code(code: &str) -> Option<String> {
    let normalized = code.trim().to_ascii_uppercase();
    if normalized.len() != CODE_LEN || !normalized.bytes().all(|b| CODE_ALPHABET.contains(&b)) {
        return None;
    }
    Some(normalized)
}

#[must_use]
pub fn generate_reset_code() -> String {
    let mut rng = rand::rng();
    (0..CODE_LEN)
        .map(|_| CODE_ALPHABET[rng.random_range(0..CODE_ALPHABET.len())] as char)
        .collect()
}

#[must_use]
pub fn hash_reset_code(code: &str) -> String {
    session::bytes_to_hex(&Sha256::digest(code.as_bytes()))
}

/// Fill the reset template. Caller-supplied text is HTML-escaped.
#[must_use]
pub fn render_reset_email(email: &str, code: &str, reset_url: &str) -> String {
    RESET_TEMPLATE
        .replace("{{EMAIL}}", &html_escape(email))
        .replace("{{CODE}}", code)
        .replace("{{RESET_URL}}", &html_escape(reset_url))
}

fn html_escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

fn reset_url(base_url: Option<&str>) -> String {
    format!("{}/reset-password", base_url.unwrap_or(""))
}

// =============================================================================
// REQUEST
// =============================================================================

/// Issue a reset code for `email` and send it.
///
/// Succeeds without doing anything when no account matches. When `mailer`
/// is `None` the code is stored but not delivered.
///
/// # Errors
///
/// [`PasswordResetError::InvalidEmail`] for a malformed address,
/// [`PasswordResetError::Delivery`] if the provider rejects the message.
pub async fn request_password_reset(
    pool: &PgPool,
    mailer: Option<&dyn Mailer>,
    email: &str,
    base_url: Option<&str>,
) -> Result<(), PasswordResetError> {
    let email = account::normalize_email(email).ok_or(PasswordResetError::InvalidEmail)?;
    if account::find_user_id(pool, &email).await?.is_none() {
        tracing::info!("password reset requested for unknown address");
        return Ok(());
    }

    let code = issue_code(pool, &email).await?;
    match mailer {
        Some(mailer) => send_code(mailer, &email, &code, base_url).await,
        None => {
            tracing::warn!("email delivery not configured; reset code not sent");
            Ok(())
        }
    }
}

async fn issue_code(pool: &PgPool, email: &str) -> Result<String, PasswordResetError> {
    sqlx::query("DELETE FROM password_reset_codes WHERE email = $1 AND consumed_at IS NULL")
        .bind(email)
        .execute(pool)
        .await?;

    let code = generate_reset_code();
    sqlx::query("INSERT INTO password_reset_codes (email, code_hash) VALUES ($1, $2)")
        .bind(email)
        .bind(hash_reset_code(&code))
        .execute(pool)
        .await?;
    Ok(code)
}

/// Remove consumed, burned and expired codes. Called once at startup.
///
/// # Errors
///
/// Returns a database error if the delete fails.
pub async fn purge_stale_codes(pool: &PgPool) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("DELETE FROM password_reset_codes WHERE consumed_at IS NOT NULL OR expires_at <= now()")
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}

pub(crate) async fn send_code(
    mailer: &dyn Mailer,
    email: &str,
    code: &str,
    base_url: Option<&str>,
) -> Result<(), PasswordResetError> {
    let html = render_reset_email(email, code, &reset_url(base_url));
    mailer.send_html(email, RESET_SUBJECT, &html).await?;
    tracing::info!("password reset code sent");
    Ok(())
}

// =============================================================================
// VERIFY
// =============================================================================

/// Consume the newest live code for `email` if `code` matches it.
///
/// Returns the account's user id and normalized e-mail; the caller then
/// starts a session.
///
/// # Errors
///
/// [`PasswordResetError::VerificationFailed`] for a wrong, expired, burned
/// or missing code.
pub async fn verify_otp(pool: &PgPool, email: &str, code: &str) -> Result<(Uuid, String), PasswordResetError> {
    let email = account::normalize_email(email).ok_or(PasswordResetError::InvalidEmail)?;
    let code = normalize_code(code).ok_or(PasswordResetError::InvalidCode)?;

    let consumed: Option<i64> = sqlx::query_scalar(
        r"UPDATE password_reset_codes
          SET consumed_at = now()
          WHERE id = (
              SELECT id FROM password_reset_codes
              WHERE email = $1 AND consumed_at IS NULL AND expires_at > now()
              ORDER BY created_at DESC
              LIMIT 1
          )
          AND code_hash = $2
          RETURNING id",
    )
    .bind(&email)
    .bind(hash_reset_code(&code))
    .fetch_optional(pool)
    .await?;

    if consumed.is_none() {
        sqlx::query(
            r"UPDATE password_reset_codes
              SET attempts = attempts + 1,
                  consumed_at = CASE WHEN attempts + 1 >= $2 THEN now() ELSE consumed_at END
              WHERE id = (
                  SELECT id FROM password_reset_codes
                  WHERE email = $1 AND consumed_at IS NULL AND expires_at > now()
                  ORDER BY created_at DESC
                  LIMIT 1
              )",
        )
        .bind(&email)
        .bind(MAX_FAILED_ATTEMPTS)
        .execute(pool)
        .await?;
        return Err(PasswordResetError::VerificationFailed);
    }

    let user_id = account::find_user_id(pool, &email)
        .await?
        .ok_or(PasswordResetError::VerificationFailed)?;
    tracing::info!(%user_id, "reset code verified");
    Ok((user_id, email))
}

// =============================================================================
// UPDATE
// =============================================================================

pub(crate) fn ensure_passwords_match(password: &str, confirm: Option<&str>) -> Result<(), PasswordResetError> {
    match confirm {
        Some(confirm) if confirm != password => Err(PasswordResetError::PasswordMismatch),
        _ => Ok(()),
    }
}

/// Set a new password for the signed-in user and revoke every other session.
///
/// Returns the number of sessions revoked.
///
/// # Errors
///
/// [`PasswordResetError::PasswordMismatch`] before any database access when
/// `confirm` differs; [`PasswordResetError::Account`] for a weak password.
pub async fn update_password(
    pool: &PgPool,
    user_id: Uuid,
    current_token: &str,
    new_password: &str,
    confirm: Option<&str>,
    min_password_length: usize,
) -> Result<u64, PasswordResetError> {
    ensure_passwords_match(new_password, confirm)?;
    account::set_password(pool, user_id, new_password, min_password_length).await?;
    let revoked = session::delete_other_sessions(pool, user_id, current_token).await?;
    tracing::info!(%user_id, revoked, "other sessions revoked after password change");
    Ok(revoked)
}

#[cfg(test)]
#[path = "password_reset_test.rs"]
mod tests;
