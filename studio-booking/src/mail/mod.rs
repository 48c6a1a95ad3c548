//! Outbound mail transports
//!
//! The notifier only sees [`MailTransport`]; the process picks the SMTP
//! relay when one is configured and the logging transport otherwise.

pub mod log;
pub mod smtp;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

pub use self::log::LogTransport;
pub use self::smtp::SmtpTransport;

/// A fully rendered message ready for delivery
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutgoingEmail {
    pub to: String,
    pub subject: String,
    pub html: String,
    pub text: String,
}

/// Delivery acknowledgement from the transport
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MailReceipt {
    pub message_id: String,
}

#[derive(Debug, Error)]
pub enum MailError {
    #[error("Invalid address {address:?}: {reason}")]
    InvalidAddress { address: String, reason: String },

    #[error("Failed to build message: {0}")]
    Build(String),

    #[error("Transport error: {0}")]
    Transport(String),
}

/// Single-attempt mail delivery
#[async_trait]
pub trait MailTransport: Send + Sync {
    /// Short name logged at startup
    fn name(&self) -> &'static str;

    async fn send(&self, email: &OutgoingEmail) -> Result<MailReceipt, MailError>;
}
