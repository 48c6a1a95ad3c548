//! Error types for the booking HTTP surface
//!
//! Every handler returns [`ApiResult`]; the body is always
//! `{success: false, error, code, ...}`.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Value};
use studio_common::api::AuthError;
use thiserror::Error;
use tracing::error;

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Request shape rejected (400)
    #[error("{message}")]
    Validation {
        message: String,
        missing_fields: Vec<String>,
        invalid_fields: Vec<String>,
    },

    /// Missing or wrong cron secret (401)
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// No session, or a session without admin rights (403)
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Resource not found (404)
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Conflict (409) - e.g., slot already taken
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Internal server error (500)
    #[error("Internal server error: {0}")]
    Internal(String),

    /// studio-common error, mapped by variant
    #[error(transparent)]
    Common(#[from] studio_common::Error),
}

impl ApiError {
    /// Plain 400 without field lists
    pub fn bad_request(message: impl Into<String>) -> Self {
        ApiError::Validation {
            message: message.into(),
            missing_fields: Vec::new(),
            invalid_fields: Vec::new(),
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::Forbidden { .. } | AuthError::NoSession => {
                ApiError::Forbidden(err.to_string())
            }
            AuthError::DatabaseError(msg) => ApiError::Internal(msg),
            AuthError::InvalidSecret | AuthError::SecretNotConfigured => {
                ApiError::Unauthorized(err.to_string())
            }
        }
    }
}

fn body(error: String, code: &str) -> serde_json::Map<String, Value> {
    let mut map = serde_json::Map::new();
    map.insert("success".to_string(), Value::Bool(false));
    map.insert("error".to_string(), Value::String(error));
    map.insert("code".to_string(), Value::String(code.to_string()));
    map
}

fn internal(details: String) -> Response {
    error!("Request failed: {}", details);
    let mut map = body("Internal server error".to_string(), "INTERNAL_ERROR");
    map.insert("details".to_string(), Value::String(details));
    (StatusCode::INTERNAL_SERVER_ERROR, Json(Value::Object(map))).into_response()
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        use studio_common::Error as Common;

        let (status, map) = match self {
            ApiError::Validation {
                message,
                missing_fields,
                invalid_fields,
            } => {
                let mut map = body(message, "VALIDATION_ERROR");
                if !missing_fields.is_empty() {
                    map.insert("missing_fields".to_string(), json!(missing_fields));
                }
                if !invalid_fields.is_empty() {
                    map.insert("invalid_fields".to_string(), json!(invalid_fields));
                }
                (StatusCode::BAD_REQUEST, map)
            }
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, body(msg, "UNAUTHORIZED")),
            ApiError::Forbidden(msg) => (StatusCode::FORBIDDEN, body(msg, "FORBIDDEN")),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, body(msg, "NOT_FOUND")),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, body(msg, "CONFLICT")),
            ApiError::Internal(msg) => return internal(msg),
            ApiError::Common(err) => match err {
                Common::NotFound(what) => (
                    StatusCode::NOT_FOUND,
                    body(format!("{} not found", what), "NOT_FOUND"),
                ),
                Common::Conflict(msg) => (StatusCode::CONFLICT, body(msg, "CONFLICT")),
                Common::InvalidInput(msg) => {
                    (StatusCode::BAD_REQUEST, body(msg, "VALIDATION_ERROR"))
                }
                e @ Common::InvalidTimestamp { .. } => {
                    (StatusCode::BAD_REQUEST, body(e.to_string(), "INVALID_TIMESTAMP"))
                }
                e @ Common::IllegalTransition { .. } => {
                    (StatusCode::BAD_REQUEST, body(e.to_string(), "ILLEGAL_TRANSITION"))
                }
                other => return internal(other.to_string()),
            },
        };

        (status, Json(Value::Object(map))).into_response()
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;
