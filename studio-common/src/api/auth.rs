//! Admin gate and cron shared-secret checks
//!
//! Sessions themselves are issued by the storefront login flow; this
//! module only decides what a resolved session may do, and whether a
//! reminder trigger call carries the configured secret.

use sha2::{Digest, Sha256};

use crate::models::Session;

#[cfg(feature = "sqlx")]
use sqlx::SqlitePool;

/// Settings key holding the cron secret when it is not configured
/// through the environment or TOML file
pub const CRON_SECRET_SETTING: &str = "cron_secret";

/// Name of the cookie carrying the session token
pub const SESSION_COOKIE: &str = "session";

// ========================================
// Error Types
// ========================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// No session, or the session expired
    NoSession,

    /// Valid session without admin rights
    Forbidden { email: String },

    /// Cron call without a secret, or with the wrong one
    InvalidSecret,

    /// No cron secret configured anywhere; every trigger call is rejected
    SecretNotConfigured,

    /// Database error loading the cron secret
    DatabaseError(String),
}

impl std::fmt::Display for AuthError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuthError::NoSession => write!(f, "Admin session required"),
            AuthError::Forbidden { .. } => write!(f, "Admin access required"),
            AuthError::InvalidSecret => write!(f, "Invalid cron secret"),
            AuthError::SecretNotConfigured => write!(f, "Cron secret not configured"),
            AuthError::DatabaseError(err) => write!(f, "Database error: {}", err),
        }
    }
}

impl std::error::Error for AuthError {}

// ========================================
// Token Extraction
// ========================================

/// Token from an `Authorization: Bearer <token>` header value
///
/// # Examples
///
/// ```
/// use studio_common::api::bearer_token;
///
/// assert_eq!(bearer_token("Bearer abc123"), Some("abc123"));
/// assert_eq!(bearer_token("bearer  abc123 "), Some("abc123"));
/// assert_eq!(bearer_token("Basic abc123"), None);
/// assert_eq!(bearer_token("Bearer "), None);
/// ```
pub fn bearer_token(header_value: &str) -> Option<&str> {
    let (scheme, token) = header_value.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}

/// Session token from a `Cookie` header value
///
/// # Examples
///
/// ```
/// use studio_common::api::session_cookie;
///
/// assert_eq!(session_cookie("theme=dark; session=tok-1"), Some("tok-1"));
/// assert_eq!(session_cookie("sessionid=x"), None);
/// ```
pub fn session_cookie(cookie_header: &str) -> Option<&str> {
    cookie_header
        .split(';')
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .map(|(_, value)| value.trim())
        .filter(|value| !value.is_empty())
}

// ========================================
// Admin Gate
// ========================================

/// Whether a session may use admin endpoints
///
/// True when the login flow flagged the session as admin, or when its
/// email appears in the allowlist (case-insensitive). `allowlist` entries
/// are expected lower-cased, as produced by
/// [`crate::config::parse_email_list`].
pub fn is_admin(session: &Session, allowlist: &[String]) -> bool {
    if session.is_admin {
        return true;
    }
    let email = session.email.trim().to_lowercase();
    allowlist.iter().any(|allowed| *allowed == email)
}

/// Admin gate: `Ok` only for a resolved session with admin rights
///
/// Both refusals surface as 403; 401 belongs to the cron secret check.
pub fn authorize_admin(session: Option<&Session>, allowlist: &[String]) -> Result<(), AuthError> {
    match session {
        None => Err(AuthError::NoSession),
        Some(session) if is_admin(session, allowlist) => Ok(()),
        Some(session) => Err(AuthError::Forbidden {
            email: session.email.clone(),
        }),
    }
}

// ========================================
// Cron Secret
// ========================================

/// Check a trigger call's secret against the configured one
///
/// Both sides are hashed before comparison so the comparison time does
/// not depend on where the strings first differ or on their lengths.
pub fn verify_cron_secret(provided: Option<&str>, configured: Option<&str>) -> Result<(), AuthError> {
    let configured = match configured.filter(|s| !s.is_empty()) {
        Some(secret) => secret,
        None => return Err(AuthError::SecretNotConfigured),
    };
    let provided = provided.ok_or(AuthError::InvalidSecret)?;

    let expected = Sha256::digest(configured.as_bytes());
    let actual = Sha256::digest(provided.as_bytes());

    let diff = expected
        .iter()
        .zip(actual.iter())
        .fold(0u8, |acc, (a, b)| acc | (a ^ b));

    if diff == 0 {
        Ok(())
    } else {
        Err(AuthError::InvalidSecret)
    }
}

/// Load the cron secret stored in the settings table, if any
#[cfg(feature = "sqlx")]
pub async fn load_cron_secret(db: &SqlitePool) -> Result<Option<String>, AuthError> {
    let result: Option<(String,)> = sqlx::query_as("SELECT value FROM settings WHERE key = ?")
        .bind(CRON_SECRET_SETTING)
        .fetch_optional(db)
        .await
        .map_err(|e| AuthError::DatabaseError(e.to_string()))?;

    Ok(result
        .map(|(value,)| value.trim().to_string())
        .filter(|value| !value.is_empty()))
}

// ========================================
// Tests
// ========================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    fn session(email: &str, is_admin: bool) -> Session {
        Session {
            token: "tok".to_string(),
            email: email.to_string(),
            is_admin,
            expires_at: Utc::now() + Duration::hours(1),
        }
    }

    #[test]
    fn test_admin_flag_grants_access() {
        assert!(is_admin(&session("anyone@example.com", true), &[]));
    }

    #[test]
    fn test_allowlist_is_case_insensitive() {
        let allowlist = vec!["owner@studio.com".to_string()];
        assert!(is_admin(&session("Owner@Studio.COM", false), &allowlist));
        assert!(!is_admin(&session("client@example.com", false), &allowlist));
    }

    #[test]
    fn test_authorize_admin_outcomes() {
        let allowlist = vec!["owner@studio.com".to_string()];

        assert_eq!(authorize_admin(None, &allowlist), Err(AuthError::NoSession));
        assert_eq!(
            authorize_admin(Some(&session("client@example.com", false)), &allowlist),
            Err(AuthError::Forbidden {
                email: "client@example.com".to_string()
            })
        );
        assert!(authorize_admin(Some(&session("owner@studio.com", false)), &allowlist).is_ok());
    }

    #[test]
    fn test_cron_secret_match() {
        assert!(verify_cron_secret(Some("s3cret"), Some("s3cret")).is_ok());
    }

    #[test]
    fn test_cron_secret_mismatch() {
        assert_eq!(
            verify_cron_secret(Some("s3cret!"), Some("s3cret")),
            Err(AuthError::InvalidSecret)
        );
        assert_eq!(verify_cron_secret(None, Some("s3cret")), Err(AuthError::InvalidSecret));
        assert_eq!(verify_cron_secret(Some(""), Some("s3cret")), Err(AuthError::InvalidSecret));
    }

    #[test]
    fn test_unconfigured_secret_rejects_everything() {
        assert_eq!(
            verify_cron_secret(Some("anything"), None),
            Err(AuthError::SecretNotConfigured)
        );
        assert_eq!(
            verify_cron_secret(Some(""), Some("")),
            Err(AuthError::SecretNotConfigured)
        );
    }

    #[test]
    fn test_cookie_parsing_ignores_other_cookies() {
        assert_eq!(session_cookie("session=abc"), Some("abc"));
        assert_eq!(session_cookie("a=1;session=abc;b=2"), Some("abc"));
        assert_eq!(session_cookie("session="), None);
        assert_eq!(session_cookie(""), None);
    }
}
