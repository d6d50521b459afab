//! Router assembly.
//!
//! SYSTEM CONTEXT
//! ==============
//! This module binds every HTTP endpoint under a single Axum router. All
//! routes are JSON APIs under `/api` plus the `/healthz` probe; access checks
//! are carried by the extractor each handler takes (see `guard`).

pub mod admin;
pub mod auth;
pub mod error;
pub mod grants;
pub mod guard;

use axum::Router;
use axum::http::StatusCode;
use axum::routing::{get, post, put};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Full application router.
pub fn app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/auth/signup", post(auth::signup))
        .route("/api/auth/signin", post(auth::signin))
        .route("/api/auth/signout", post(auth::signout))
        .route("/api/auth/me", get(auth::me))
        .route("/api/auth/password-reset", post(auth::request_password_reset))
        .route("/api/auth/verify-otp", post(auth::verify_otp))
        .route("/api/auth/update-password", post(auth::update_password))
        .route("/api/grants", get(grants::list).post(grants::create))
        .route("/api/grants/summary", get(grants::summary))
        .route("/api/grants/export", get(grants::export_file))
        .route("/api/grants/import", post(grants::import))
        .route(
            "/api/grants/{id}",
            get(grants::get_one).put(grants::update).delete(grants::delete),
        )
        .route(
            "/api/grants/{id}/details",
            get(grants::get_details).put(grants::save_details),
        )
        .route("/api/admin/users", get(admin::list_users))
        .route("/api/admin/users/{id}/role", put(admin::set_role))
        .route("/healthz", get(healthz))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

async fn healthz() -> StatusCode {
    StatusCode::OK
}

#[cfg(test)]
#[path = "mod_test.rs"]
mod tests;
