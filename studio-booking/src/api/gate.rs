//! Request gates for admin and cron endpoints
//!
//! Implemented as extractors: a handler that takes [`AdminSession`] or
//! [`CronAuthorized`] is rejected before its body is read.

use axum::{
    async_trait,
    extract::{FromRequestParts, Query},
    http::{header, request::Parts, HeaderMap},
};
use std::collections::HashMap;
use studio_common::api::{
    auth::load_cron_secret, authorize_admin, bearer_token, session_cookie, verify_cron_secret,
    AuthError,
};
use studio_common::models::Session;
use studio_common::time::now;
use tracing::warn;

use crate::{db, ApiError, AppState};

/// Header carrying the cron secret as an alternative to `Authorization`
pub const CRON_SECRET_HEADER: &str = "x-cron-secret";

fn header_str<'a>(headers: &'a HeaderMap, name: impl header::AsHeaderName) -> Option<&'a str> {
    headers.get(name).and_then(|value| value.to_str().ok())
}

/// Session token from `Authorization: Bearer` or the session cookie
fn session_token(headers: &HeaderMap) -> Option<&str> {
    header_str(headers, header::AUTHORIZATION)
        .and_then(bearer_token)
        .or_else(|| header_str(headers, header::COOKIE).and_then(session_cookie))
}

/// A resolved, unexpired session that passed the admin check
#[derive(Debug, Clone)]
pub struct AdminSession(pub Session);

#[async_trait]
impl FromRequestParts<AppState> for AdminSession {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let session = match session_token(&parts.headers) {
            Some(token) => db::sessions::find_active(&state.db, token, now()).await?,
            None => None,
        };

        authorize_admin(session.as_ref(), &state.config.admin_emails).map_err(|e| {
            match &e {
                AuthError::Forbidden { email } => {
                    warn!("Admin endpoint {} refused for {}", parts.uri.path(), email)
                }
                AuthError::NoSession => {
                    warn!("Admin endpoint {} called without a valid session", parts.uri.path())
                }
                _ => {}
            }
            ApiError::from(e)
        })?;

        session
            .map(AdminSession)
            .ok_or_else(|| AuthError::NoSession.into())
    }
}

/// Marker for a reminder trigger call carrying the configured secret
#[derive(Debug, Clone, Copy)]
pub struct CronAuthorized;

#[async_trait]
impl FromRequestParts<AppState> for CronAuthorized {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let query = Query::<HashMap<String, String>>::try_from_uri(&parts.uri)
            .map(|Query(params)| params)
            .unwrap_or_default();

        let provided = header_str(&parts.headers, header::AUTHORIZATION)
            .and_then(bearer_token)
            .or_else(|| header_str(&parts.headers, CRON_SECRET_HEADER))
            .or_else(|| query.get("secret").map(String::as_str));

        let configured = match &state.config.cron_secret {
            Some(secret) => Some(secret.clone()),
            None => load_cron_secret(&state.db).await?,
        };

        verify_cron_secret(provided, configured.as_deref()).map_err(|e| {
            warn!("Rejected reminder trigger on {}: {}", parts.uri.path(), e);
            ApiError::from(e)
        })?;

        Ok(CronAuthorized)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_session_token_prefers_bearer() {
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, HeaderValue::from_static("session=from-cookie"));
        assert_eq!(session_token(&headers), Some("from-cookie"));

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer from-header"));
        assert_eq!(session_token(&headers), Some("from-header"));
    }

    #[test]
    fn test_session_token_absent() {
        let mut headers = HeaderMap::new();
        assert_eq!(session_token(&headers), None);

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Basic abc"));
        assert_eq!(session_token(&headers), None);
    }
}
