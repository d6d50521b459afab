//! Auth routes: sign-up, sign-in, sign-out, password reset.

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use serde::Deserialize;
use time::Duration;

use super::error::ApiError;
use super::guard::{AuthUser, SESSION_COOKIE};
use crate::config::Config;
use crate::services::auth::{self as auth_svc, SignedIn};
use crate::services::session::SessionUser;
use crate::services::{account, password_reset};
use crate::state::AppState;

/// Readable by page scripts; tells the front end the user signed out on
/// purpose rather than having an expired session.
pub const SIGNED_OUT_COOKIE: &str = "signed_out";

const RESET_REQUESTED_MESSAGE: &str = "If an account exists for that email, a reset code has been sent.";

// =============================================================================
// COOKIES
// =============================================================================

fn session_cookie(token: String, secure: bool, ttl: std::time::Duration) -> Cookie<'static> {
    let max_age = Duration::seconds(i64::try_from(ttl.as_secs()).unwrap_or(i64::MAX));
    Cookie::build((SESSION_COOKIE, token))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(secure)
        .max_age(max_age)
        .build()
}

fn expired_cookie(name: &'static str, secure: bool, http_only: bool) -> Cookie<'static> {
    Cookie::build((name, ""))
        .path("/")
        .http_only(http_only)
        .same_site(SameSite::Lax)
        .secure(secure)
        .max_age(Duration::ZERO)
        .build()
}

fn signed_out_cookie(secure: bool) -> Cookie<'static> {
    Cookie::build((SIGNED_OUT_COOKIE, "1"))
        .path("/")
        .http_only(false)
        .same_site(SameSite::Lax)
        .secure(secure)
        .build()
}

/// Session cookie set, signed-out flag cleared.
fn signed_in_jar(config: &Config, token: String) -> CookieJar {
    let secure = config.cookie_secure;
    CookieJar::new()
        .add(session_cookie(token, secure, config.session_ttl))
        .add(expired_cookie(SIGNED_OUT_COOKIE, secure, false))
}

/// Session cookie cleared, signed-out flag set.
fn signed_out_jar(config: &Config) -> CookieJar {
    let secure = config.cookie_secure;
    CookieJar::new()
        .add(expired_cookie(SESSION_COOKIE, secure, true))
        .add(signed_out_cookie(secure))
}

fn limiter_key(email: &str) -> String {
    account::normalize_email(email).unwrap_or_else(|| email.trim().to_ascii_lowercase())
}

// =============================================================================
// HANDLERS
// =============================================================================

#[derive(Deserialize)]
pub struct CredentialsBody {
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub confirm_password: Option<String>,
}

/// `POST /api/auth/signup` — create an account and sign it in.
pub async fn signup(
    State(state): State<AppState>,
    Json(body): Json<CredentialsBody>,
) -> Result<impl IntoResponse, ApiError> {
    password_reset::ensure_passwords_match(&body.password, body.confirm_password.as_deref())?;
    let (user_id, email) =
        account::sign_up(&state.pool, &body.email, &body.password, state.config.password_min_length).await?;
    let SignedIn { user, token } = auth_svc::start_session(&state.pool, state.config.session_ttl, user_id, email).await?;
    Ok((StatusCode::CREATED, signed_in_jar(&state.config, token), Json(user)))
}

/// `POST /api/auth/signin` — verify credentials and start a session.
pub async fn signin(
    State(state): State<AppState>,
    Json(body): Json<CredentialsBody>,
) -> Result<impl IntoResponse, ApiError> {
    let key = limiter_key(&body.email);
    state.auth_limiter.check_and_record(&key)?;

    let SignedIn { user, token } =
        auth_svc::sign_in(&state.pool, state.config.session_ttl, &body.email, &body.password).await?;
    state.auth_limiter.clear(&key);
    Ok((signed_in_jar(&state.config, token), Json(user)))
}

/// `POST /api/auth/signout` — delete session, clear cookie, set the flag.
pub async fn signout(State(state): State<AppState>, auth: AuthUser) -> Result<impl IntoResponse, ApiError> {
    auth_svc::sign_out(&state.pool, &auth.token).await?;
    tracing::info!(user_id = %auth.user.id, "signed out");
    Ok((signed_out_jar(&state.config), StatusCode::NO_CONTENT))
}

/// `GET /api/auth/me` — return current user.
pub async fn me(auth: AuthUser) -> Json<SessionUser> {
    Json(auth.user)
}

#[derive(Deserialize)]
pub struct ResetRequestBody {
    pub email: String,
}

/// `POST /api/auth/password-reset` — e-mail a reset code.
///
/// Answers the same way whether or not the account exists.
pub async fn request_password_reset(
    State(state): State<AppState>,
    Json(body): Json<ResetRequestBody>,
) -> Result<Json<serde_json::Value>, ApiError> {
    state.auth_limiter.check_and_record(&limiter_key(&body.email))?;
    password_reset::request_password_reset(
        &state.pool,
        state.mailer.as_deref(),
        &body.email,
        state.config.public_base_url.as_deref(),
    )
    .await?;
    Ok(Json(serde_json::json!({ "ok": true, "message": RESET_REQUESTED_MESSAGE })))
}

#[derive(Deserialize)]
pub struct VerifyOtpBody {
    pub email: String,
    pub code: String,
}

/// `POST /api/auth/verify-otp` — exchange a reset code for a session.
pub async fn verify_otp(
    State(state): State<AppState>,
    Json(body): Json<VerifyOtpBody>,
) -> Result<impl IntoResponse, ApiError> {
    let key = limiter_key(&body.email);
    state.auth_limiter.check_and_record(&key)?;

    let (user_id, email) = password_reset::verify_otp(&state.pool, &body.email, &body.code).await?;
    let SignedIn { user, token } = auth_svc::start_session(&state.pool, state.config.session_ttl, user_id, email).await?;
    state.auth_limiter.clear(&key);
    Ok((signed_in_jar(&state.config, token), Json(user)))
}

#[derive(Deserialize)]
pub struct UpdatePasswordBody {
    pub password: String,
    #[serde(default)]
    pub confirm_password: Option<String>,
}

/// `POST /api/auth/update-password` — set a new password for the current
/// user and sign out every other session.
pub async fn update_password(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(body): Json<UpdatePasswordBody>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let revoked = password_reset::update_password(
        &state.pool,
        auth.user.id,
        &auth.token,
        &body.password,
        body.confirm_password.as_deref(),
        state.config.password_min_length,
    )
    .await?;
    Ok(Json(serde_json::json!({ "ok": true, "revoked_sessions": revoked })))
}

#[cfg(test)]
#[path = "auth_test.rs"]
mod tests;
