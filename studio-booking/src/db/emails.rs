//! Email audit log (append-only)

use chrono::{DateTime, Utc};
use sqlx::{Row, Sqlite};
use studio_common::models::{ConsultationEmail, DeliveryStatus, EmailType};
use studio_common::time::to_db_timestamp;
use studio_common::Result;

use super::{optional_timestamp, timestamp};

/// Append one audit row
///
/// Returns `false` when the row duplicates an already-sent reminder for
/// the same scheduled start (rejected by the partial unique index).
pub async fn insert<'e, E>(executor: E, email: &ConsultationEmail) -> Result<bool>
where
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    let result = sqlx::query(
        r#"
        INSERT INTO consultation_emails (
            id, consultation_id, email_type, recipient, subject, sent_at, status,
            error_message, message_id, scheduled_start_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&email.id)
    .bind(&email.consultation_id)
    .bind(email.email_type.as_str())
    .bind(&email.recipient)
    .bind(&email.subject)
    .bind(to_db_timestamp(&email.sent_at))
    .bind(email.status.as_str())
    .bind(&email.error_message)
    .bind(&email.message_id)
    .bind(email.scheduled_start_at.as_ref().map(to_db_timestamp))
    .execute(executor)
    .await;

    match result {
        Ok(_) => Ok(true),
        Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => Ok(false),
        Err(e) => Err(e.into()),
    }
}

/// Whether a reminder of `email_type` was already delivered for this start
pub async fn reminder_already_sent<'e, E>(
    executor: E,
    consultation_id: &str,
    email_type: EmailType,
    scheduled_start_at: DateTime<Utc>,
) -> Result<bool>
where
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    let exists: bool = sqlx::query_scalar(
        r#"
        SELECT EXISTS(
            SELECT 1 FROM consultation_emails
            WHERE consultation_id = ? AND email_type = ? AND scheduled_start_at = ?
              AND status = 'sent'
        )
        "#,
    )
    .bind(consultation_id)
    .bind(email_type.as_str())
    .bind(to_db_timestamp(&scheduled_start_at))
    .fetch_one(executor)
    .await?;

    Ok(exists)
}

/// Audit rows for one consultation, oldest first
pub async fn list_for_consultation<'e, E>(
    executor: E,
    consultation_id: &str,
) -> Result<Vec<ConsultationEmail>>
where
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    let rows = sqlx::query(
        r#"
        SELECT id, consultation_id, email_type, recipient, subject, sent_at, status,
               error_message, message_id, scheduled_start_at
        FROM consultation_emails
        WHERE consultation_id = ?
        ORDER BY sent_at ASC, rowid ASC
        "#,
    )
    .bind(consultation_id)
    .fetch_all(executor)
    .await?;

    rows.iter()
        .map(|row| {
            let email_type: String = row.try_get("email_type")?;
            let status: String = row.try_get("status")?;
            Ok(ConsultationEmail {
                id: row.try_get("id")?,
                consultation_id: row.try_get("consultation_id")?,
                email_type: email_type.parse::<EmailType>()?,
                recipient: row.try_get("recipient")?,
                subject: row.try_get("subject")?,
                sent_at: timestamp(row, "sent_at")?,
                status: status.parse::<DeliveryStatus>()?,
                error_message: row.try_get("error_message")?,
                message_id: row.try_get("message_id")?,
                scheduled_start_at: optional_timestamp(row, "scheduled_start_at")?,
            })
        })
        .collect()
}
