//! Sign-in orchestration and the session/role state machine.
//!
//! DESIGN
//! ======
//! A sign-in moves through three phases:
//!
//! ```text
//! Unauthenticated --session_started--> RolePending --role_resolved--> Resolved
//!        ^                                  |                            |
//!        +-----------role_failed------------+                            |
//!        +-----------------------signed_out------------------------------+
//! ```
//!
//! The role is read from the profile table after the session exists. If that
//! lookup fails for any reason the new session is revoked immediately (forced
//! sign-out) and the caller sees an error. There is no retry.
//!
//! The same rule applies on every authenticated request: a session whose role
//! can no longer be resolved is deleted and treated as absent.

use std::time::Duration;

use sqlx::PgPool;
use uuid::Uuid;

use super::account::{self, AccountError};
use super::role::{self, Role, RoleError};
use super::session::{self, SessionUser};

// =============================================================================
// STATE MACHINE
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthPhase {
    Unauthenticated,
    RolePending { user_id: Uuid, token: String },
    Resolved { user_id: Uuid, token: String, role: Role },
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid auth transition: {event} while {from}")]
pub struct TransitionError {
    pub from: &'static str,
    pub event: &'static str,
}

impl AuthPhase {
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Unauthenticated => "unauthenticated",
            Self::RolePending { .. } => "role_pending",
            Self::Resolved { .. } => "resolved",
        }
    }

    /// A session was issued for `user_id`.
    ///
    /// # Errors
    ///
    /// Only valid from [`AuthPhase::Unauthenticated`].
    pub fn session_started(self, user_id: Uuid, token: String) -> Result<Self, TransitionError> {
        match self {
            Self::Unauthenticated => Ok(Self::RolePending { user_id, token }),
            other => Err(other.reject("session_started")),
        }
    }

    /// The role lookup succeeded.
    ///
    /// # Errors
    ///
    /// Only valid from [`AuthPhase::RolePending`].
    pub fn role_resolved(self, role: Role) -> Result<Self, TransitionError> {
        match self {
            Self::RolePending { user_id, token } => Ok(Self::Resolved { user_id, token, role }),
            other => Err(other.reject("role_resolved")),
        }
    }

    /// The role lookup failed. Returns the unauthenticated phase and the
    /// token that must be revoked.
    ///
    /// # Errors
    ///
    /// Only valid from [`AuthPhase::RolePending`].
    pub fn role_failed(self) -> Result<(Self, String), TransitionError> {
        match self {
            Self::RolePending { token, .. } => Ok((Self::Unauthenticated, token)),
            other => Err(other.reject("role_failed")),
        }
    }

    /// Explicit sign-out; valid from any phase.
    #[must_use]
    pub fn signed_out(self) -> Self {
        Self::Unauthenticated
    }

    /// Convert a resolved phase into the handler-facing sign-in result.
    ///
    /// # Errors
    ///
    /// Only valid from [`AuthPhase::Resolved`].
    pub fn into_signed_in(self, email: String) -> Result<SignedIn, TransitionError> {
        match self {
            Self::Resolved { user_id, token, role } => Ok(SignedIn { user: SessionUser { id: user_id, email, role }, token }),
            other => Err(other.reject("into_signed_in")),
        }
    }

    fn reject(&self, event: &'static str) -> TransitionError {
        TransitionError { from: self.name(), event }
    }
}

// =============================================================================
// ERRORS
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error(transparent)]
    Account(#[from] AccountError),
    #[error("could not resolve account role; signed out")]
    RoleLookupFailed(#[source] RoleError),
    #[error(transparent)]
    Transition(#[from] TransitionError),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Result of a successful sign-in.
#[derive(Debug, Clone)]
pub struct SignedIn {
    pub user: SessionUser,
    pub token: String,
}

// =============================================================================
// OPERATIONS
// =============================================================================

/// Verify credentials, issue a session and resolve its role.
///
/// # Errors
///
/// [`AuthError::Account`] for bad credentials, [`AuthError::RoleLookupFailed`]
/// when the role cannot be resolved (the session is revoked first).
pub async fn sign_in(pool: &PgPool, ttl: Duration, email: &str, password: &str) -> Result<SignedIn, AuthError> {
    let (user_id, email) = account::authenticate(pool, email, password).await?;
    start_session(pool, ttl, user_id, email).await
}

/// Issue a session for an already-verified user and resolve its role.
///
/// Shared by password sign-in and OTP verification.
///
/// # Errors
///
/// [`AuthError::RoleLookupFailed`] when the role cannot be resolved.
pub async fn start_session(pool: &PgPool, ttl: Duration, user_id: Uuid, email: String) -> Result<SignedIn, AuthError> {
    let token = session::create_session(pool, user_id, ttl).await?;
    let phase = AuthPhase::Unauthenticated.session_started(user_id, token)?;

    match role::fetch_role(pool, user_id).await {
        Ok(role) => {
            let signed_in = phase.role_resolved(role)?.into_signed_in(email)?;
            tracing::info!(user_id = %signed_in.user.id, role = %signed_in.user.role, "signed in");
            Ok(signed_in)
        }
        Err(e) => {
            let (_, token) = phase.role_failed()?;
            tracing::warn!(%user_id, error = %e, "role lookup failed; revoking session");
            if let Err(revoke_err) = session::delete_session(pool, &token).await {
                tracing::error!(%user_id, error = %revoke_err, "failed to revoke session after role lookup failure");
            }
            Err(AuthError::RoleLookupFailed(e))
        }
    }
}

/// Resolve the user behind `token`, or `None` if the session is absent,
/// expired, or its role can no longer be resolved (in which case the session
/// is deleted).
///
/// # Errors
///
/// Returns a database error if a lookup fails outright.
pub async fn current_user(pool: &PgPool, token: &str) -> Result<Option<SessionUser>, AuthError> {
    let Some(record) = session::validate_session(pool, token).await? else {
        return Ok(None);
    };

    match role::fetch_role(pool, record.user_id).await {
        Ok(role) => Ok(Some(SessionUser { id: record.user_id, email: record.email, role })),
        Err(RoleError::Database(e)) => Err(AuthError::Database(e)),
        Err(e) => {
            tracing::warn!(user_id = %record.user_id, error = %e, "role no longer resolvable; signing out");
            session::delete_session(pool, token).await?;
            Ok(None)
        }
    }
}

/// Revoke `token`. Idempotent.
///
/// # Errors
///
/// Returns a database error if the delete fails.
pub async fn sign_out(pool: &PgPool, token: &str) -> Result<(), AuthError> {
    session::delete_session(pool, token).await?;
    Ok(())
}

#[cfg(test)]
#[path = "auth_test.rs"]
mod tests;
