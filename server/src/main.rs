mod config;
mod db;
mod rate_limit;
mod routes;
mod services;
mod state;

use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use crate::services::mailer::{Mailer, ResendMailer};

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = config::Config::from_env().expect("invalid configuration");
    let pool = db::init_pool(&config).await.expect("database init failed");

    match services::session::purge_expired(&pool).await {
        Ok(purged) => tracing::info!(purged, "expired sessions purged"),
        Err(e) => tracing::warn!(error = %e, "expired session purge failed"),
    }
    match services::password_reset::purge_stale_codes(&pool).await {
        Ok(purged) => tracing::info!(purged, "stale reset codes purged"),
        Err(e) => tracing::warn!(error = %e, "reset code purge failed"),
    }

    // Password reset still works without e-mail; codes are just not delivered.
    let mailer: Option<Arc<dyn Mailer>> = match &config.email {
        Some(email) => {
            tracing::info!(from = %email.from, "email delivery enabled");
            Some(Arc::new(ResendMailer::new(email)))
        }
        None => {
            tracing::warn!("RESEND_API_KEY/RESEND_FROM not set; reset codes will not be emailed");
            None
        }
    };

    let port = config.port;
    let state = state::AppState::new(pool, config, mailer);
    let app = routes::app(state);
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{port}"))
        .await
        .expect("failed to bind");

    tracing::info!(%port, "grantfinder listening");
    axum::serve(listener, app).await.expect("server failed");
}
