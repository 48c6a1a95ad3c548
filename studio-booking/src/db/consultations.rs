//! Consultation persistence
//!
//! Status-changing updates are conditional on the status the caller read
//! (`WHERE status = ?`), so two admins racing on the same consultation
//! cannot both apply a transition. A `false` return means the row was
//! missing or had already moved on.

use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, Sqlite};
use studio_common::models::{
    AdminOverviewRow, Consultation, ConsultationStatus, PackageSnapshot, UpcomingConsultation,
};
use studio_common::schedule::BookedSlot;
use studio_common::time::to_db_timestamp;
use studio_common::{Error, Result};

use super::{string_list, timestamp};

const CONSULTATION_COLUMNS: &str = "id, client_id, package_id, start_at, end_at, duration_minutes, \
     status, notes, admin_notes, meeting_link, cancellation_reason, package_name, \
     package_description, package_duration_minutes, package_price_cents, package_features, \
     created_at, updated_at";

fn status(row: &SqliteRow) -> Result<ConsultationStatus> {
    let raw: String = row.try_get("status")?;
    raw.parse()
}

fn consultation_from_row(row: &SqliteRow) -> Result<Consultation> {
    let package_id: Option<String> = row.try_get("package_id")?;
    let package_name: Option<String> = row.try_get("package_name")?;

    let package = match (package_id.clone(), package_name) {
        (Some(id), Some(name)) => Some(PackageSnapshot {
            id,
            name,
            description: row.try_get("package_description")?,
            duration_minutes: row
                .try_get::<Option<i64>, _>("package_duration_minutes")?
                .unwrap_or_default(),
            price_cents: row
                .try_get::<Option<i64>, _>("package_price_cents")?
                .unwrap_or_default(),
            features: string_list(row, "package_features")?,
        }),
        _ => None,
    };

    Ok(Consultation {
        id: row.try_get("id")?,
        client_id: row.try_get("client_id")?,
        package_id,
        start_at: timestamp(row, "start_at")?,
        end_at: timestamp(row, "end_at")?,
        duration_minutes: row.try_get("duration_minutes")?,
        status: status(row)?,
        notes: row.try_get("notes")?,
        admin_notes: row.try_get("admin_notes")?,
        meeting_link: row.try_get("meeting_link")?,
        cancellation_reason: row.try_get("cancellation_reason")?,
        package,
        created_at: timestamp(row, "created_at")?,
        updated_at: timestamp(row, "updated_at")?,
    })
}

pub async fn insert<'e, E>(executor: E, consultation: &Consultation) -> Result<()>
where
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    let snapshot = consultation.package.as_ref();
    let features = snapshot
        .map(|p| serde_json::to_string(&p.features))
        .transpose()
        .map_err(|e| Error::Internal(format!("Failed to encode package features: {}", e)))?;

    sqlx::query(
        r#"
        INSERT INTO consultations (
            id, client_id, package_id, start_at, end_at, duration_minutes, status,
            notes, admin_notes, meeting_link, cancellation_reason,
            package_name, package_description, package_duration_minutes,
            package_price_cents, package_features, created_at, updated_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&consultation.id)
    .bind(&consultation.client_id)
    .bind(&consultation.package_id)
    .bind(to_db_timestamp(&consultation.start_at))
    .bind(to_db_timestamp(&consultation.end_at))
    .bind(consultation.duration_minutes)
    .bind(consultation.status.as_str())
    .bind(&consultation.notes)
    .bind(&consultation.admin_notes)
    .bind(&consultation.meeting_link)
    .bind(&consultation.cancellation_reason)
    .bind(snapshot.map(|p| p.name.clone()))
    .bind(snapshot.and_then(|p| p.description.clone()))
    .bind(snapshot.map(|p| p.duration_minutes))
    .bind(snapshot.map(|p| p.price_cents))
    .bind(features)
    .bind(to_db_timestamp(&consultation.created_at))
    .bind(to_db_timestamp(&consultation.updated_at))
    .execute(executor)
    .await?;

    Ok(())
}

pub async fn find_by_id<'e, E>(executor: E, id: &str) -> Result<Option<Consultation>>
where
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    let sql = format!("SELECT {} FROM consultations WHERE id = ?", CONSULTATION_COLUMNS);
    let row = sqlx::query(&sql).bind(id).fetch_optional(executor).await?;
    row.as_ref().map(consultation_from_row).transpose()
}

/// Move a consultation to a new time and mark it rescheduled
///
/// `notes` replaces the client notes only when supplied.
#[allow(clippy::too_many_arguments)]
pub async fn update_schedule<'e, E>(
    executor: E,
    id: &str,
    expected: ConsultationStatus,
    start_at: DateTime<Utc>,
    end_at: DateTime<Utc>,
    duration_minutes: i64,
    notes: Option<&str>,
    updated_at: DateTime<Utc>,
) -> Result<bool>
where
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    let result = sqlx::query(
        r#"
        UPDATE consultations SET
            start_at = ?, end_at = ?, duration_minutes = ?,
            notes = COALESCE(?, notes),
            status = ?, updated_at = ?
        WHERE id = ? AND status = ?
        "#,
    )
    .bind(to_db_timestamp(&start_at))
    .bind(to_db_timestamp(&end_at))
    .bind(duration_minutes)
    .bind(notes)
    .bind(ConsultationStatus::Rescheduled.as_str())
    .bind(to_db_timestamp(&updated_at))
    .bind(id)
    .bind(expected.as_str())
    .execute(executor)
    .await?;

    Ok(result.rows_affected() > 0)
}

pub async fn update_cancellation<'e, E>(
    executor: E,
    id: &str,
    expected: ConsultationStatus,
    reason: &str,
    notes: Option<&str>,
    updated_at: DateTime<Utc>,
) -> Result<bool>
where
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    let result = sqlx::query(
        r#"
        UPDATE consultations SET
            status = ?, cancellation_reason = ?,
            notes = COALESCE(?, notes),
            updated_at = ?
        WHERE id = ? AND status = ?
        "#,
    )
    .bind(ConsultationStatus::Cancelled.as_str())
    .bind(reason)
    .bind(notes)
    .bind(to_db_timestamp(&updated_at))
    .bind(id)
    .bind(expected.as_str())
    .execute(executor)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Plain status change; `meeting_link` is stored when supplied
pub async fn update_status<'e, E>(
    executor: E,
    id: &str,
    expected: ConsultationStatus,
    next: ConsultationStatus,
    meeting_link: Option<&str>,
    updated_at: DateTime<Utc>,
) -> Result<bool>
where
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    let result = sqlx::query(
        r#"
        UPDATE consultations SET
            status = ?, meeting_link = COALESCE(?, meeting_link), updated_at = ?
        WHERE id = ? AND status = ?
        "#,
    )
    .bind(next.as_str())
    .bind(meeting_link)
    .bind(to_db_timestamp(&updated_at))
    .bind(id)
    .bind(expected.as_str())
    .execute(executor)
    .await?;

    Ok(result.rows_affected() > 0)
}

pub async fn set_admin_notes<'e, E>(
    executor: E,
    id: &str,
    admin_notes: Option<&str>,
    updated_at: DateTime<Utc>,
) -> Result<bool>
where
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    let result = sqlx::query("UPDATE consultations SET admin_notes = ?, updated_at = ? WHERE id = ?")
        .bind(admin_notes)
        .bind(to_db_timestamp(&updated_at))
        .bind(id)
        .execute(executor)
        .await?;

    Ok(result.rows_affected() > 0)
}

/// Back-office listing, newest start first
pub async fn list_overview<'e, E>(executor: E) -> Result<Vec<AdminOverviewRow>>
where
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    let rows = sqlx::query(
        r#"
        SELECT id, start_at, end_at, duration_minutes, status, notes, admin_notes,
               meeting_link, cancellation_reason, created_at, client_id, client_email,
               client_first_name, client_last_name, client_phone, client_company,
               package_id, package_name
        FROM admin_consultation_overview
        ORDER BY start_at DESC
        "#,
    )
    .fetch_all(executor)
    .await?;

    rows.iter()
        .map(|row| {
            Ok(AdminOverviewRow {
                id: row.try_get("id")?,
                start_at: timestamp(row, "start_at")?,
                end_at: timestamp(row, "end_at")?,
                duration_minutes: row.try_get("duration_minutes")?,
                status: status(row)?,
                notes: row.try_get("notes")?,
                admin_notes: row.try_get("admin_notes")?,
                meeting_link: row.try_get("meeting_link")?,
                cancellation_reason: row.try_get("cancellation_reason")?,
                created_at: timestamp(row, "created_at")?,
                client_id: row.try_get("client_id")?,
                client_email: row.try_get("client_email")?,
                client_first_name: row.try_get("client_first_name")?,
                client_last_name: row.try_get("client_last_name")?,
                client_phone: row.try_get("client_phone")?,
                client_company: row.try_get("client_company")?,
                package_id: row.try_get("package_id")?,
                package_name: row.try_get("package_name")?,
            })
        })
        .collect()
}

/// Scheduled or confirmed consultations starting in `[from, until]`
pub async fn list_upcoming<'e, E>(
    executor: E,
    from: DateTime<Utc>,
    until: DateTime<Utc>,
) -> Result<Vec<UpcomingConsultation>>
where
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    let rows = sqlx::query(
        r#"
        SELECT c.id, cl.email AS client_email, cl.first_name AS client_first_name,
               cl.last_name AS client_last_name, c.start_at, c.meeting_link,
               COALESCE(c.package_name, p.name) AS package_name
        FROM consultations c
        JOIN clients cl ON cl.id = c.client_id
        LEFT JOIN consultation_packages p ON p.id = c.package_id
        WHERE c.status IN ('scheduled', 'confirmed')
          AND c.start_at >= ? AND c.start_at <= ?
        ORDER BY c.start_at ASC
        "#,
    )
    .bind(to_db_timestamp(&from))
    .bind(to_db_timestamp(&until))
    .fetch_all(executor)
    .await?;

    rows.iter()
        .map(|row| {
            Ok(UpcomingConsultation {
                id: row.try_get("id")?,
                client_email: row.try_get("client_email")?,
                client_first_name: row.try_get("client_first_name")?,
                client_last_name: row.try_get("client_last_name")?,
                start_at: timestamp(row, "start_at")?,
                package_name: row.try_get("package_name")?,
                meeting_link: row.try_get("meeting_link")?,
            })
        })
        .collect()
}

/// `(status, created_at)` of every consultation, for statistics
pub async fn list_status_created<'e, E>(
    executor: E,
) -> Result<Vec<(ConsultationStatus, DateTime<Utc>)>>
where
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    let rows = sqlx::query("SELECT status, created_at FROM consultations")
        .fetch_all(executor)
        .await?;

    rows.iter()
        .map(|row| Ok((status(row)?, timestamp(row, "created_at")?)))
        .collect()
}

/// Slot-occupying consultations that overlap `[window_start, window_end)`
pub async fn list_blocking<'e, E>(
    executor: E,
    window_start: DateTime<Utc>,
    window_end: DateTime<Utc>,
    exclude_id: Option<&str>,
) -> Result<Vec<BookedSlot>>
where
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    let rows = sqlx::query(
        r#"
        SELECT start_at, end_at, status
        FROM consultations
        WHERE start_at < ? AND end_at > ?
          AND status NOT IN ('cancelled', 'completed')
          AND (? IS NULL OR id != ?)
        ORDER BY start_at ASC
        "#,
    )
    .bind(to_db_timestamp(&window_end))
    .bind(to_db_timestamp(&window_start))
    .bind(exclude_id)
    .bind(exclude_id)
    .fetch_all(executor)
    .await?;

    rows.iter()
        .map(|row| {
            Ok(BookedSlot {
                start_at: timestamp(row, "start_at")?,
                end_at: timestamp(row, "end_at")?,
                status: status(row)?,
            })
        })
        .collect()
}
