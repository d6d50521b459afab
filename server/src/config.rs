//! Runtime configuration.
//!
//! SYSTEM CONTEXT
//! ==============
//! Startup loads `.env` (if present) via `dotenvy`, then builds a [`Config`]
//! from process environment variables. Only `DATABASE_URL` is required;
//! every other knob has a default so a local run needs a single variable.

use std::time::Duration;

const DEFAULT_PORT: u16 = 3000;
const DEFAULT_DB_MAX_CONNECTIONS: u32 = 5;
const DEFAULT_SESSION_TTL_HOURS: u64 = 168;
const DEFAULT_PASSWORD_MIN_LENGTH: usize = 8;
const DEFAULT_AUTH_RATE_LIMIT: usize = 10;
const DEFAULT_AUTH_RATE_WINDOW_SECS: u64 = 60;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} is required")]
    Missing(&'static str),
    #[error("{key} has an invalid value: {value:?}")]
    Invalid { key: &'static str, value: String },
}

/// Outbound e-mail settings. Present only when both variables are set.
#[derive(Debug, Clone)]
pub struct EmailConfig {
    pub api_key: String,
    pub from: String,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub port: u16,
    pub db_max_connections: u32,
    pub session_ttl: Duration,
    pub password_min_length: usize,
    /// Whether auth cookies carry the `Secure` attribute.
    pub cookie_secure: bool,
    /// Externally visible origin, used in password-reset e-mails.
    pub public_base_url: Option<String>,
    pub email: Option<EmailConfig>,
    /// Max sign-in / reset attempts per e-mail address per window.
    pub auth_rate_limit: usize,
    pub auth_rate_window: Duration,
}

impl Config {
    /// Load configuration from process environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if `DATABASE_URL` is missing, `PORT` is malformed or
    /// `AUTH_RATE_LIMIT` is zero.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup.
    ///
    /// # Errors
    ///
    /// Same as [`Config::from_env`].
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database_url = lookup("DATABASE_URL")
            .filter(|v| !v.trim().is_empty())
            .ok_or(ConfigError::Missing("DATABASE_URL"))?;

        let port = match lookup("PORT") {
            Some(raw) => raw
                .trim()
                .parse::<u16>()
                .map_err(|_| ConfigError::Invalid { key: "PORT", value: raw.clone() })?,
            None => DEFAULT_PORT,
        };

        let public_base_url = lookup("PUBLIC_BASE_URL")
            .map(|v| v.trim().trim_end_matches('/').to_owned())
            .filter(|v| !v.is_empty());

        let cookie_secure = lookup("COOKIE_SECURE")
            .as_deref()
            .and_then(parse_bool)
            .unwrap_or_else(|| {
                public_base_url
                    .as_deref()
                    .is_some_and(|url| url.starts_with("https://"))
            });

        let email = match (lookup("RESEND_API_KEY"), lookup("RESEND_FROM")) {
            (Some(api_key), Some(from)) if !api_key.trim().is_empty() && !from.trim().is_empty() => {
                Some(EmailConfig { api_key, from })
            }
            _ => None,
        };

        // A zero budget would lock every account out of sign-in and reset.
        let auth_rate_limit = parse_or(&lookup, "AUTH_RATE_LIMIT", DEFAULT_AUTH_RATE_LIMIT);
        if auth_rate_limit == 0 {
            return Err(ConfigError::Invalid { key: "AUTH_RATE_LIMIT", value: "0".to_owned() });
        }

        let session_ttl_hours = parse_or(&lookup, "SESSION_TTL_HOURS", DEFAULT_SESSION_TTL_HOURS);
        let auth_rate_window_secs = parse_or(&lookup, "AUTH_RATE_WINDOW_SECS", DEFAULT_AUTH_RATE_WINDOW_SECS);

        Ok(Self {
            database_url,
            port,
            db_max_connections: parse_or(&lookup, "DB_MAX_CONNECTIONS", DEFAULT_DB_MAX_CONNECTIONS),
            session_ttl: Duration::from_secs(session_ttl_hours.saturating_mul(3600)),
            password_min_length: parse_or(&lookup, "PASSWORD_MIN_LENGTH", DEFAULT_PASSWORD_MIN_LENGTH),
            cookie_secure,
            public_base_url,
            email,
            auth_rate_limit,
            auth_rate_window: Duration::from_secs(auth_rate_window_secs),
        })
    }
}

/// Parse a boolean flag: `1/true/yes/on` or `0/false/no/off`, case-insensitive.
pub(crate) fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> T
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    lookup(key)
        .and_then(|v| v.trim().parse::<T>().ok())
        .unwrap_or(default)
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
