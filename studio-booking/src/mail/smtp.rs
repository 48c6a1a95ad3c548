//! SMTP relay transport (lettre, tokio + rustls)

use async_trait::async_trait;
use lettre::message::{Mailbox, MultiPart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Address, AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use studio_common::config::SmtpConfig;
use studio_common::Error;
use tracing::debug;
use uuid::Uuid;

use super::{MailError, MailReceipt, MailTransport, OutgoingEmail};

/// Port that speaks TLS from the first byte; everything else upgrades with STARTTLS
const IMPLICIT_TLS_PORT: u16 = 465;

pub struct SmtpTransport {
    relay: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
    message_id_domain: String,
}

impl SmtpTransport {
    /// Build the relay from configuration
    ///
    /// Fails when no host is configured or the sender address is invalid.
    pub fn from_config(config: &SmtpConfig) -> studio_common::Result<Self> {
        let host = config
            .host
            .as_deref()
            .filter(|h| !h.trim().is_empty())
            .ok_or_else(|| Error::Config("SMTP host is not configured".to_string()))?;

        let builder = if config.port == IMPLICIT_TLS_PORT {
            AsyncSmtpTransport::<Tokio1Executor>::relay(host)
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(host)
        }
        .map_err(|e| Error::Config(format!("Invalid SMTP relay {}: {}", host, e)))?
        .port(config.port);

        let builder = match (&config.username, &config.password) {
            (Some(username), Some(password)) => {
                builder.credentials(Credentials::new(username.clone(), password.clone()))
            }
            _ => builder,
        };

        let address: Address = config.from_email.parse().map_err(|e| {
            Error::Config(format!("Invalid sender address {}: {}", config.from_email, e))
        })?;
        let message_id_domain = address.domain().to_string();

        Ok(Self {
            relay: builder.build(),
            from: Mailbox::new(Some(config.from_name.clone()), address),
            message_id_domain,
        })
    }

    fn build_message(&self, email: &OutgoingEmail, message_id: &str) -> Result<Message, MailError> {
        let to: Mailbox = email.to.parse().map_err(|e: lettre::address::AddressError| {
            MailError::InvalidAddress {
                address: email.to.clone(),
                reason: e.to_string(),
            }
        })?;

        Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(email.subject.clone())
            .message_id(Some(message_id.to_string()))
            .multipart(MultiPart::alternative_plain_html(
                email.text.clone(),
                email.html.clone(),
            ))
            .map_err(|e| MailError::Build(e.to_string()))
    }
}

#[async_trait]
impl MailTransport for SmtpTransport {
    fn name(&self) -> &'static str {
        "smtp"
    }

    async fn send(&self, email: &OutgoingEmail) -> Result<MailReceipt, MailError> {
        let message_id = format!("<{}@{}>", Uuid::new_v4(), self.message_id_domain);
        let message = self.build_message(email, &message_id)?;

        let response = self
            .relay
            .send(message)
            .await
            .map_err(|e| MailError::Transport(e.to_string()))?;

        debug!(code = %response.code(), message_id = %message_id, "SMTP relay accepted message");

        Ok(MailReceipt { message_id })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use studio_common::config::AppConfig;

    fn configured() -> SmtpConfig {
        let mut smtp = AppConfig::default().smtp;
        smtp.host = Some("smtp.example.com".to_string());
        smtp.from_email = "bookings@studio.example".to_string();
        smtp
    }

    #[tokio::test]
    async fn test_requires_host() {
        let smtp = AppConfig::default().smtp;
        assert!(SmtpTransport::from_config(&smtp).is_err());
    }

    #[tokio::test]
    async fn test_rejects_invalid_sender() {
        let mut smtp = configured();
        smtp.from_email = "not an address".to_string();
        assert!(SmtpTransport::from_config(&smtp).is_err());
    }

    #[tokio::test]
    async fn test_builds_multipart_message() {
        let transport = SmtpTransport::from_config(&configured()).unwrap();
        let email = OutgoingEmail {
            to: "client@example.com".to_string(),
            subject: "Booked".to_string(),
            html: "<p>See you soon</p>".to_string(),
            text: "See you soon".to_string(),
        };

        let message = transport.build_message(&email, "<id@studio.example>").unwrap();
        let raw = String::from_utf8(message.formatted()).unwrap();
        assert!(raw.contains("Message-ID: <id@studio.example>"));
        assert!(raw.contains("multipart/alternative"));
        assert_eq!(transport.message_id_domain, "studio.example");
    }

    #[tokio::test]
    async fn test_invalid_recipient_is_reported() {
        let transport = SmtpTransport::from_config(&configured()).unwrap();
        let email = OutgoingEmail {
            to: "nobody".to_string(),
            subject: "x".to_string(),
            html: String::new(),
            text: String::new(),
        };
        assert!(matches!(
            transport.build_message(&email, "<id@x>"),
            Err(MailError::InvalidAddress { .. })
        ));
    }
}
