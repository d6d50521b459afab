//! Domain services used by the HTTP routes.
//!
//! ARCHITECTURE
//! ============
//! Service modules own business logic and persistence concerns so route
//! handlers can stay focused on protocol translation and auth plumbing.

pub mod account;
pub mod auth;
pub mod export;
pub mod filter;
pub mod grant;
pub mod grant_details;
pub mod mailer;
pub mod password;
pub mod password_reset;
pub mod role;
pub mod session;
pub mod summary;
