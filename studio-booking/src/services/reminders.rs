//! Scheduled reminder trigger
//!
//! An external scheduler calls the cron endpoints; each call scans one
//! window and sends at most one reminder of its kind per consultation
//! start. The batch runs sequentially.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::SqlitePool;
use studio_common::models::EmailType;
use studio_common::Result;
use tracing::{debug, info, warn};

use super::lifecycle::LifecycleService;
use super::notifier::{NotificationOutcome, Notifier};
use crate::db;

/// Reminder kinds and their firing windows
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReminderWindow {
    DayBefore,
    HourBefore,
}

impl ReminderWindow {
    pub fn email_type(&self) -> EmailType {
        match self {
            ReminderWindow::DayBefore => EmailType::Reminder24h,
            ReminderWindow::HourBefore => EmailType::Reminder1h,
        }
    }

    /// Hours of upcoming consultations to scan
    pub fn lookahead_hours(&self) -> i64 {
        match self {
            ReminderWindow::DayBefore => 25,
            ReminderWindow::HourBefore => 2,
        }
    }

    /// Inclusive hours-until range in which the reminder fires
    pub fn bounds(&self) -> (f64, f64) {
        match self {
            ReminderWindow::DayBefore => (23.0, 25.0),
            ReminderWindow::HourBefore => (0.5, 1.5),
        }
    }

    pub fn contains(&self, hours_until: f64) -> bool {
        let (low, high) = self.bounds();
        (low..=high).contains(&hours_until)
    }
}

/// Batch result returned to the scheduler
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReminderSummary {
    pub success: bool,
    pub emails_sent: u32,
    pub skipped: u32,
    pub errors: u32,
    pub total_processed: u32,
}

fn hours_until(start_at: DateTime<Utc>, at: DateTime<Utc>) -> f64 {
    (start_at - at).num_seconds() as f64 / 3600.0
}

/// Send every due reminder of `window` as of `at`
///
/// Only a failure to list upcoming consultations fails the batch; per-item
/// problems are counted in `errors`.
pub async fn run_reminders(
    lifecycle: &LifecycleService,
    notifier: &Notifier,
    pool: &SqlitePool,
    window: ReminderWindow,
    at: DateTime<Utc>,
) -> Result<ReminderSummary> {
    let email_type = window.email_type();
    let upcoming = lifecycle
        .upcoming_consultations(window.lookahead_hours(), at)
        .await?;

    let mut summary = ReminderSummary {
        success: true,
        ..Default::default()
    };

    for item in &upcoming {
        summary.total_processed += 1;

        let hours = hours_until(item.start_at, at);
        if !window.contains(hours) {
            debug!(consultation_id = %item.id, hours_until = hours, "Outside {} window", email_type);
            summary.skipped += 1;
            continue;
        }

        match db::emails::reminder_already_sent(pool, &item.id, email_type, item.start_at).await {
            Ok(true) => {
                summary.skipped += 1;
                continue;
            }
            Ok(false) => {}
            Err(e) => {
                warn!(consultation_id = %item.id, "Reminder history lookup failed: {}", e);
                summary.errors += 1;
                continue;
            }
        }

        let details = match lifecycle.get_consultation(&item.id).await {
            Ok(details) => details,
            Err(e) => {
                warn!(consultation_id = %item.id, "Could not load consultation for reminder: {}", e);
                summary.errors += 1;
                continue;
            }
        };

        match notifier.send_client_email(email_type, &details, None).await {
            NotificationOutcome::Sent { .. } => summary.emails_sent += 1,
            NotificationOutcome::Failed { .. } => summary.errors += 1,
            NotificationOutcome::Skipped { .. } => summary.skipped += 1,
        }
    }

    info!(
        "{} batch: {} sent, {} skipped, {} errors of {}",
        email_type, summary.emails_sent, summary.skipped, summary.errors, summary.total_processed
    );

    Ok(summary)
}
