//! Shared HTTP authorization checks
//!
//! Pure functions plus the settings lookup for the cron secret. The
//! booking service wraps these in axum extractors and handlers.

pub mod auth;

pub use auth::{
    authorize_admin, bearer_token, is_admin, session_cookie, verify_cron_secret, AuthError,
};
