//! Shared application state.
//!
//! DESIGN
//! ======
//! `AppState` is injected into Axum handlers via the `State` extractor.
//! It holds the database pool, the loaded configuration, the optional
//! outbound mailer and the in-memory limiter for credential endpoints.
//! There is no other process-wide mutable state: sessions and roles live in
//! Postgres and are resolved per request.

use std::sync::Arc;

use sqlx::PgPool;

use crate::config::Config;
use crate::rate_limit::RateLimiter;
use crate::services::mailer::Mailer;

/// Shared application state, injected into Axum handlers via State extractor.
/// Clone is required by Axum; all inner fields are cheap to clone.
#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub config: Arc<Config>,
    /// `None` when `RESEND_API_KEY`/`RESEND_FROM` are not configured.
    pub mailer: Option<Arc<dyn Mailer>>,
    /// Per-address limiter for sign-in and password-reset attempts.
    pub auth_limiter: RateLimiter,
}

impl AppState {
    #[must_use]
    pub fn new(pool: PgPool, config: Config, mailer: Option<Arc<dyn Mailer>>) -> Self {
        let auth_limiter = RateLimiter::new(config.auth_rate_limit, config.auth_rate_window);
        Self { pool, config: Arc::new(config), mailer, auth_limiter }
    }
}

// =============================================================================
// TEST HELPERS
// =============================================================================


#[cfg(test)]
#[path = "state_test.rs"]
mod tests;
