//! HTTP error translation.
//!
//! Every handler returns `Result<_, ApiError>`. Service errors convert via
//! `From`, choosing a status and a user-facing message. Database and other
//! internal failures are logged here and rendered as a generic message.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use crate::rate_limit::RateLimitError;
use crate::services::account::AccountError;
use crate::services::auth::AuthError;
use crate::services::export::ExportError;
use crate::services::grant::GrantError;
use crate::services::password_reset::PasswordResetError;
use crate::services::role::RoleError;

const INTERNAL_MESSAGE: &str = "An internal error occurred";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    #[must_use]
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self { status, message: message.into() }
    }

    #[must_use]
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    /// Log `err` and hide it behind a generic 500.
    #[must_use]
    pub fn internal(err: &dyn std::fmt::Display) -> Self {
        tracing::error!(error = %err, "request failed");
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, INTERNAL_MESSAGE)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(serde_json::json!({ "error": self.message }))).into_response()
    }
}

impl From<AccountError> for ApiError {
    fn from(err: AccountError) -> Self {
        match err {
            AccountError::InvalidEmail | AccountError::WeakPassword(_) => Self::bad_request(err.to_string()),
            AccountError::EmailTaken => Self::new(StatusCode::CONFLICT, err.to_string()),
            AccountError::InvalidCredentials => Self::new(StatusCode::UNAUTHORIZED, err.to_string()),
            AccountError::Hash(_) | AccountError::Database(_) => Self::internal(&err),
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::Account(inner) => inner.into(),
            AuthError::RoleLookupFailed(_) => Self::new(StatusCode::UNAUTHORIZED, err.to_string()),
            AuthError::Transition(_) | AuthError::Database(_) => Self::internal(&err),
        }
    }
}

impl From<PasswordResetError> for ApiError {
    fn from(err: PasswordResetError) -> Self {
        match err {
            PasswordResetError::InvalidEmail | PasswordResetError::InvalidCode | PasswordResetError::PasswordMismatch => {
                Self::bad_request(err.to_string())
            }
            PasswordResetError::VerificationFailed => Self::new(StatusCode::UNAUTHORIZED, err.to_string()),
            PasswordResetError::Account(inner) => inner.into(),
            PasswordResetError::Delivery(_) => {
                tracing::error!(error = %err, "reset email not delivered");
                Self::new(StatusCode::BAD_GATEWAY, "Could not send the reset email. Try again later.")
            }
            PasswordResetError::Database(_) => Self::internal(&err),
        }
    }
}

impl From<GrantError> for ApiError {
    fn from(err: GrantError) -> Self {
        match err {
            GrantError::Validation(message) => Self::bad_request(message),
            GrantError::NotFound(_) => Self::new(StatusCode::NOT_FOUND, err.to_string()),
            GrantError::Database(_) => Self::internal(&err),
        }
    }
}

impl From<RoleError> for ApiError {
    fn from(err: RoleError) -> Self {
        match err {
            RoleError::UserNotFound(_) => Self::new(StatusCode::NOT_FOUND, err.to_string()),
            RoleError::SelfDemotion => Self::new(StatusCode::FORBIDDEN, err.to_string()),
            RoleError::UnknownRole(_) => Self::bad_request(err.to_string()),
            RoleError::ProfileMissing(_) | RoleError::Database(_) => Self::internal(&err),
        }
    }
}

impl From<ExportError> for ApiError {
    fn from(err: ExportError) -> Self {
        Self::internal(&err)
    }
}

impl From<RateLimitError> for ApiError {
    fn from(err: RateLimitError) -> Self {
        Self::new(StatusCode::TOO_MANY_REQUESTS, err.to_string())
    }
}

#[cfg(test)]
#[path = "error_test.rs"]
mod tests;
