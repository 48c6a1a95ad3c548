//! Common error types for the studio services

use thiserror::Error;

use crate::models::ConsultationStatus;

/// Common result type for studio operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types across studio services
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation error (wraps sqlx::Error)
    #[cfg(feature = "sqlx")]
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Requested resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Requested time slot overlaps an active consultation
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Invalid user input or request parameter
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Timestamp string that does not parse as RFC 3339
    #[error("Invalid timestamp for {field}: {value:?}")]
    InvalidTimestamp { field: String, value: String },

    /// Status change not permitted by the consultation transition table
    #[error("Cannot change consultation status from {from} to {to}")]
    IllegalTransition {
        from: ConsultationStatus,
        to: ConsultationStatus,
    },

    /// Internal server error
    #[error("Internal error: {0}")]
    Internal(String),
}
