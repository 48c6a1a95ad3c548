//! Logging transport used when no SMTP relay is configured

use async_trait::async_trait;
use tracing::info;
use uuid::Uuid;

use super::{MailError, MailReceipt, MailTransport, OutgoingEmail};

/// Logs each message instead of delivering it
#[derive(Debug, Clone, Default)]
pub struct LogTransport;

#[async_trait]
impl MailTransport for LogTransport {
    fn name(&self) -> &'static str {
        "log"
    }

    async fn send(&self, email: &OutgoingEmail) -> Result<MailReceipt, MailError> {
        let message_id = format!("log-{}", Uuid::new_v4());
        info!(
            to = %email.to,
            subject = %email.subject,
            message_id = %message_id,
            "Email not delivered (no SMTP relay configured)"
        );
        Ok(MailReceipt { message_id })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_log_transport_returns_unique_ids() {
        let email = OutgoingEmail {
            to: "a@b.com".to_string(),
            subject: "Hello".to_string(),
            html: "<p>Hi</p>".to_string(),
            text: "Hi".to_string(),
        };

        let first = LogTransport.send(&email).await.unwrap();
        let second = LogTransport.send(&email).await.unwrap();
        assert!(first.message_id.starts_with("log-"));
        assert_ne!(first.message_id, second.message_id);
    }
}
