//! Route guard: session and role checks for handlers.
//!
//! DESIGN
//! ======
//! The decision itself is the pure function [`decide`]. The extractors
//! [`AuthUser`] and [`AdminUser`] resolve the session, ask [`decide`], and
//! turn a refusal into a response that suits the caller:
//!
//! - browsers (an `Accept` header naming `text/html`) get `303 See Other`
//!   to `/signin` when signed out, or to `/` when the role is wrong;
//! - API callers get `401` or `403` with a JSON error body.
//!
//! The session token is read from the `session_token` cookie, falling back
//! to an `Authorization: Bearer` header for the CLI.

use axum::extract::{FromRef, FromRequestParts};
use axum::http::header::{ACCEPT, AUTHORIZATION};
use axum::http::request::Parts;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Redirect, Response};
use axum_extra::extract::cookie::CookieJar;

use super::error::ApiError;
use crate::services::auth;
use crate::services::role::Role;
use crate::services::session::SessionUser;
use crate::state::AppState;

pub const SESSION_COOKIE: &str = "session_token";
pub const SIGNIN_PATH: &str = "/signin";
pub const HOME_PATH: &str = "/";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Authenticated,
    Role(Role),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardDecision {
    Allow,
    Unauthenticated,
    Forbidden,
}

impl GuardDecision {
    /// Where a browser is sent when refused.
    #[must_use]
    pub fn redirect_target(self) -> Option<&'static str> {
        match self {
            Self::Allow => None,
            Self::Unauthenticated => Some(SIGNIN_PATH),
            Self::Forbidden => Some(HOME_PATH),
        }
    }
}

#[must_use]
pub fn decide(session: Option<&SessionUser>, access: Access) -> GuardDecision {
    match (session, access) {
        (None, _) => GuardDecision::Unauthenticated,
        (Some(user), Access::Role(required)) if user.role != required => GuardDecision::Forbidden,
        (Some(_), _) => GuardDecision::Allow,
    }
}

// =============================================================================
// REQUEST HELPERS
// =============================================================================

pub(crate) fn session_token(headers: &HeaderMap) -> Option<String> {
    let jar = CookieJar::from_headers(headers);
    if let Some(cookie) = jar.get(SESSION_COOKIE)
        && !cookie.value().is_empty()
    {
        return Some(cookie.value().to_owned());
    }

    headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_owned)
}

pub(crate) fn prefers_html(headers: &HeaderMap) -> bool {
    headers
        .get(ACCEPT)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|accept| accept.contains("text/html"))
}

// =============================================================================
// REJECTION
// =============================================================================

#[derive(Debug)]
pub enum GuardRejection {
    Redirect(&'static str),
    Api(ApiError),
}

impl GuardRejection {
    fn refused(decision: GuardDecision, headers: &HeaderMap) -> Self {
        if prefers_html(headers)
            && let Some(target) = decision.redirect_target()
        {
            return Self::Redirect(target);
        }
        match decision {
            GuardDecision::Forbidden => Self::Api(ApiError::new(StatusCode::FORBIDDEN, "Admin role required")),
            GuardDecision::Unauthenticated | GuardDecision::Allow => {
                Self::Api(ApiError::new(StatusCode::UNAUTHORIZED, "Sign in required"))
            }
        }
    }
}

impl IntoResponse for GuardRejection {
    fn into_response(self) -> Response {
        match self {
            Self::Redirect(target) => Redirect::to(target).into_response(),
            Self::Api(err) => err.into_response(),
        }
    }
}

// =============================================================================
// EXTRACTORS
// =============================================================================

/// Authenticated user extracted from the session cookie or bearer token.
/// Use as a handler parameter to require authentication.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user: SessionUser,
    pub token: String,
}

/// Authenticated user holding the `admin` role.
#[derive(Debug, Clone)]
pub struct AdminUser(pub AuthUser);

async fn guard(parts: &Parts, state: &AppState, access: Access) -> Result<AuthUser, GuardRejection> {
    let resolved = match session_token(&parts.headers) {
        Some(token) => auth::current_user(&state.pool, &token)
            .await
            .map_err(|e| GuardRejection::Api(ApiError::internal(&e)))?
            .map(|user| AuthUser { user, token }),
        None => None,
    };

    match decide(resolved.as_ref().map(|a| &a.user), access) {
        GuardDecision::Allow => resolved.ok_or_else(|| GuardRejection::refused(GuardDecision::Unauthenticated, &parts.headers)),
        refused => Err(GuardRejection::refused(refused, &parts.headers)),
    }
}

impl<S> FromRequestParts<S> for AuthUser
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = GuardRejection;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        guard(parts, &AppState::from_ref(state), Access::Authenticated).await
    }
}

impl<S> FromRequestParts<S> for AdminUser
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = GuardRejection;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        guard(parts, &AppState::from_ref(state), Access::Role(Role::Admin))
            .await
            .map(Self)
    }
}

#[cfg(test)]
#[path = "guard_test.rs"]
mod tests;
