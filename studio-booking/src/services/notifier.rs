//! Notification composer
//!
//! Renders a template, hands it to the injected [`MailTransport`] once and
//! records the attempt. Delivery problems come back as a
//! [`NotificationOutcome`] rather than an error: a notification never
//! undoes or fails the state change that triggered it.

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use std::sync::Arc;
use studio_common::config::AppConfig;
use studio_common::models::{ConsultationDetails, ConsultationEmail, DeliveryStatus, EmailType};
use studio_common::time::now;
use tracing::{info, warn};
use uuid::Uuid;

use super::templates::{render_admin, render_client, AdminEvent, RenderedEmail, TemplateContext};
use crate::db;
use crate::mail::{MailTransport, OutgoingEmail};

/// Result of one notification attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotificationOutcome {
    Sent { message_id: String },
    Failed { error: String },
    /// Nothing to send to (no admin notification address configured)
    Skipped { reason: String },
}

impl NotificationOutcome {
    pub fn is_sent(&self) -> bool {
        matches!(self, NotificationOutcome::Sent { .. })
    }
}

#[derive(Clone)]
pub struct Notifier {
    db: SqlitePool,
    mailer: Arc<dyn MailTransport>,
    config: Arc<AppConfig>,
}

impl Notifier {
    pub fn new(db: SqlitePool, mailer: Arc<dyn MailTransport>, config: Arc<AppConfig>) -> Self {
        Self { db, mailer, config }
    }

    fn context<'a>(
        &'a self,
        details: &'a ConsultationDetails,
        previous_start: Option<DateTime<Utc>>,
    ) -> TemplateContext<'a> {
        TemplateContext {
            details,
            studio_name: &self.config.studio_name,
            site_url: &self.config.site_url,
            timezone: &self.config.schedule.timezone,
            offset: self.config.schedule.display_offset(),
            previous_start,
        }
    }

    async fn deliver(&self, to: &str, rendered: &RenderedEmail) -> NotificationOutcome {
        let email = OutgoingEmail {
            to: to.to_string(),
            subject: rendered.subject.clone(),
            html: rendered.html.clone(),
            text: rendered.text.clone(),
        };

        match self.mailer.send(&email).await {
            Ok(receipt) => NotificationOutcome::Sent {
                message_id: receipt.message_id,
            },
            Err(e) => NotificationOutcome::Failed {
                error: e.to_string(),
            },
        }
    }

    /// Send a client-facing email and append it to the audit log
    ///
    /// `previous_start` is only used by the reschedule template.
    pub async fn send_client_email(
        &self,
        email_type: EmailType,
        details: &ConsultationDetails,
        previous_start: Option<DateTime<Utc>>,
    ) -> NotificationOutcome {
        let rendered = render_client(email_type, &self.context(details, previous_start));
        let recipient = details.client.email.clone();
        let consultation_id = &details.consultation.id;

        let outcome = self.deliver(&recipient, &rendered).await;

        let (status, message_id, error_message) = match &outcome {
            NotificationOutcome::Sent { message_id } => {
                info!(
                    consultation_id = %consultation_id,
                    email_type = %email_type,
                    "Sent {} email",
                    email_type
                );
                (DeliveryStatus::Sent, Some(message_id.clone()), None)
            }
            NotificationOutcome::Failed { error } => {
                warn!(
                    consultation_id = %consultation_id,
                    email_type = %email_type,
                    "Failed to send {} email: {}",
                    email_type,
                    error
                );
                (DeliveryStatus::Failed, None, Some(error.clone()))
            }
            NotificationOutcome::Skipped { .. } => return outcome,
        };

        let audit = ConsultationEmail {
            id: Uuid::new_v4().to_string(),
            consultation_id: consultation_id.clone(),
            email_type,
            recipient,
            subject: rendered.subject,
            sent_at: now(),
            status,
            error_message,
            message_id,
            scheduled_start_at: Some(details.consultation.start_at),
        };

        match db::emails::insert(&self.db, &audit).await {
            Ok(true) => {}
            Ok(false) => warn!(
                consultation_id = %consultation_id,
                "Duplicate {} for the same start was delivered; audit row not written",
                email_type
            ),
            Err(e) => warn!(
                consultation_id = %consultation_id,
                "Failed to record {} email in audit log: {}",
                email_type,
                e
            ),
        }

        outcome
    }

    /// Notify studio staff; logged through tracing only
    pub async fn notify_admin(
        &self,
        event: AdminEvent,
        details: &ConsultationDetails,
        previous_start: Option<DateTime<Utc>>,
    ) -> NotificationOutcome {
        let recipient = match &self.config.admin_notification_email {
            Some(address) => address.clone(),
            None => {
                return NotificationOutcome::Skipped {
                    reason: "no admin notification address configured".to_string(),
                }
            }
        };

        let rendered = render_admin(event, &self.context(details, previous_start));
        let outcome = self.deliver(&recipient, &rendered).await;

        match &outcome {
            NotificationOutcome::Sent { message_id } => info!(
                consultation_id = %details.consultation.id,
                event = event.as_str(),
                message_id = %message_id,
                "Sent admin notification"
            ),
            NotificationOutcome::Failed { error } => warn!(
                consultation_id = %details.consultation.id,
                event = event.as_str(),
                "Failed to send admin notification: {}",
                error
            ),
            NotificationOutcome::Skipped { .. } => {}
        }

        outcome
    }
}
