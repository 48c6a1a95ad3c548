//! Integration tests for the reminder trigger and notification audit log

mod common;

use chrono::Duration;
use common::*;
use studio_booking::db;
use studio_booking::services::lifecycle::RescheduleRequest;
use studio_booking::services::templates::AdminEvent;
use studio_booking::services::{run_reminders, NotificationOutcome, ReminderWindow};
use studio_common::models::{ConsultationStatus, DeliveryStatus, EmailType};
use studio_common::time::now;

async fn run(ctx: &TestContext, window: ReminderWindow) -> studio_booking::services::ReminderSummary {
    run_reminders(&ctx.lifecycle(), &ctx.notifier(), &ctx.pool, window, now())
        .await
        .unwrap()
}

#[tokio::test]
async fn test_day_before_reminder_sent_once() {
    let ctx = TestContext::new().await;
    let details = book(&ctx, "ada@example.com", now() + Duration::hours(24)).await;

    let first = run(&ctx, ReminderWindow::DayBefore).await;
    assert!(first.success);
    assert_eq!(first.emails_sent, 1);
    assert_eq!(first.total_processed, 1);
    assert_eq!(first.errors, 0);

    let second = run(&ctx, ReminderWindow::DayBefore).await;
    assert_eq!(second.emails_sent, 0);
    assert_eq!(second.skipped, 1);

    let sent = ctx.mailer.sent_to("ada@example.com");
    assert_eq!(sent.len(), 1);
    assert!(sent[0].subject.starts_with("Reminder: your consultation is tomorrow"));

    let log = db::emails::list_for_consultation(&ctx.pool, &details.consultation.id)
        .await
        .unwrap();
    assert_eq!(log.len(), 1);
    assert_eq!(log[0].email_type, EmailType::Reminder24h);
    assert_eq!(log[0].status, DeliveryStatus::Sent);
    assert!(log[0].message_id.is_some());
    let stored = ctx
        .lifecycle()
        .get_consultation(&details.consultation.id)
        .await
        .unwrap();
    assert_eq!(log[0].scheduled_start_at, Some(stored.consultation.start_at));
}

#[tokio::test]
async fn test_consultations_outside_window_are_skipped() {
    let ctx = TestContext::new().await;
    book(&ctx, "ada@example.com", now() + Duration::hours(10)).await;

    let summary = run(&ctx, ReminderWindow::DayBefore).await;
    assert_eq!(summary.total_processed, 1);
    assert_eq!(summary.skipped, 1);
    assert_eq!(summary.emails_sent, 0);
    assert!(ctx.mailer.sent().is_empty());

    // Beyond the 25 hour lookahead the consultation is not even listed
    let ctx = TestContext::new().await;
    book(&ctx, "ada@example.com", now() + Duration::hours(30)).await;
    let summary = run(&ctx, ReminderWindow::DayBefore).await;
    assert_eq!(summary.total_processed, 0);
}

#[tokio::test]
async fn test_hour_before_reminder() {
    let ctx = TestContext::new().await;
    let details = book(&ctx, "ada@example.com", now() + Duration::minutes(40)).await;
    book(&ctx, "grace@example.com", now() + Duration::minutes(105)).await;

    let summary = run(&ctx, ReminderWindow::HourBefore).await;
    assert_eq!(summary.total_processed, 2);
    assert_eq!(summary.emails_sent, 1);
    assert_eq!(summary.skipped, 1);

    let sent = ctx.mailer.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].to, "ada@example.com");
    assert!(sent[0].subject.starts_with("Starting soon"));

    let log = db::emails::list_for_consultation(&ctx.pool, &details.consultation.id)
        .await
        .unwrap();
    assert_eq!(log[0].email_type, EmailType::Reminder1h);
}

#[tokio::test]
async fn test_kinds_are_tracked_separately() {
    let ctx = TestContext::new().await;
    let details = book(&ctx, "ada@example.com", now() + Duration::minutes(60)).await;

    // A day-before reminder logged for the same start must not block the 1h one
    ctx.notifier()
        .send_client_email(EmailType::Reminder24h, &details, None)
        .await;

    let summary = run(&ctx, ReminderWindow::HourBefore).await;
    assert_eq!(summary.emails_sent, 1);
}

#[tokio::test]
async fn test_transport_failure_counts_error_and_logs_failed_row() {
    let ctx = TestContext::new().await;
    let details = book(&ctx, "ada@example.com", now() + Duration::hours(24)).await;
    ctx.mailer.set_failing(true);

    let summary = run(&ctx, ReminderWindow::DayBefore).await;
    assert!(summary.success);
    assert_eq!(summary.errors, 1);
    assert_eq!(summary.emails_sent, 0);

    let log = db::emails::list_for_consultation(&ctx.pool, &details.consultation.id)
        .await
        .unwrap();
    assert_eq!(log.len(), 1);
    assert_eq!(log[0].status, DeliveryStatus::Failed);
    assert!(log[0]
        .error_message
        .as_deref()
        .unwrap_or_default()
        .contains("relay unavailable"));

    // A failed attempt does not count as sent; the next run retries
    ctx.mailer.set_failing(false);
    let retry = run(&ctx, ReminderWindow::DayBefore).await;
    assert_eq!(retry.emails_sent, 1);
}

#[tokio::test]
async fn test_reschedule_rearms_reminder_after_confirmation() {
    let ctx = TestContext::new().await;
    let details = book(&ctx, "ada@example.com", now() + Duration::hours(24)).await;
    let id = details.consultation.id.clone();

    assert_eq!(run(&ctx, ReminderWindow::DayBefore).await.emails_sent, 1);

    let new_start = now() + Duration::hours(24) + Duration::minutes(30);
    ctx.lifecycle()
        .reschedule_consultation(
            &id,
            RescheduleRequest {
                start_at: new_start,
                end_at: new_start + Duration::minutes(60),
                duration_minutes: 60,
                notes: None,
            },
        )
        .await
        .unwrap();
    ctx.lifecycle()
        .update_status(&id, ConsultationStatus::Confirmed, None)
        .await
        .unwrap();

    assert_eq!(run(&ctx, ReminderWindow::DayBefore).await.emails_sent, 1);
    assert_eq!(ctx.mailer.sent_to("ada@example.com").len(), 2);
}

#[tokio::test]
async fn test_client_email_outcomes() {
    let ctx = TestContext::new().await;
    let details = book(&ctx, "ada@example.com", now() + Duration::hours(48)).await;
    let notifier = ctx.notifier();

    let sent = notifier
        .send_client_email(EmailType::Confirmation, &details, None)
        .await;
    assert!(sent.is_sent());

    ctx.mailer.set_failing(true);
    let failed = notifier
        .send_client_email(EmailType::Cancellation, &details, None)
        .await;
    assert!(matches!(failed, NotificationOutcome::Failed { .. }));

    let log = db::emails::list_for_consultation(&ctx.pool, &details.consultation.id)
        .await
        .unwrap();
    let kinds: Vec<_> = log.iter().map(|e| (e.email_type, e.status)).collect();
    assert_eq!(
        kinds,
        vec![
            (EmailType::Confirmation, DeliveryStatus::Sent),
            (EmailType::Cancellation, DeliveryStatus::Failed),
        ]
    );
}

#[tokio::test]
async fn test_admin_notification_goes_to_configured_address() {
    let ctx = TestContext::new().await;
    let details = book(&ctx, "ada@example.com", now() + Duration::hours(48)).await;

    let outcome = ctx
        .notifier()
        .notify_admin(AdminEvent::Booked, &details, None)
        .await;
    assert!(outcome.is_sent());

    let sent = ctx.mailer.sent_to(NOTIFY_EMAIL);
    assert_eq!(sent.len(), 1);
    assert!(sent[0].subject.starts_with("New consultation booked"));

    // Admin notifications are not part of the client audit log
    let log = db::emails::list_for_consultation(&ctx.pool, &details.consultation.id)
        .await
        .unwrap();
    assert!(log.is_empty());
}

#[tokio::test]
async fn test_admin_notification_skipped_without_address() {
    let mut config = test_config();
    config.admin_notification_email = None;
    let ctx = TestContext::with_config(config).await;
    let details = book(&ctx, "ada@example.com", now() + Duration::hours(48)).await;

    let outcome = ctx
        .notifier()
        .notify_admin(AdminEvent::Cancelled, &details, None)
        .await;
    assert!(matches!(outcome, NotificationOutcome::Skipped { .. }));
    assert!(ctx.mailer.sent().is_empty());
}
