//! Client persistence
//!
//! One row per email address. Emails are trimmed and lower-cased before
//! every lookup and write.

use sqlx::sqlite::SqliteRow;
use sqlx::{Row, Sqlite, SqliteConnection};
use studio_common::models::Client;
use studio_common::time::{now, to_db_timestamp};
use studio_common::Result;
use uuid::Uuid;

use super::{non_blank, timestamp};

/// Identity and profile fields supplied with a booking
#[derive(Debug, Clone, Default)]
pub struct ClientProfile {
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: Option<String>,
    pub company: Option<String>,
    pub project_details: Option<String>,
    pub budget_range: Option<String>,
    pub timeline: Option<String>,
    pub referral_source: Option<String>,
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn client_from_row(row: &SqliteRow) -> Result<Client> {
    Ok(Client {
        id: row.try_get("id")?,
        email: row.try_get("email")?,
        first_name: row.try_get("first_name")?,
        last_name: row.try_get("last_name")?,
        phone: row.try_get("phone")?,
        company: row.try_get("company")?,
        project_details: row.try_get("project_details")?,
        budget_range: row.try_get("budget_range")?,
        timeline: row.try_get("timeline")?,
        referral_source: row.try_get("referral_source")?,
        created_at: timestamp(row, "created_at")?,
        updated_at: timestamp(row, "updated_at")?,
    })
}

const CLIENT_COLUMNS: &str = "id, email, first_name, last_name, phone, company, project_details, \
     budget_range, timeline, referral_source, created_at, updated_at";

pub async fn find_by_id<'e, E>(executor: E, id: &str) -> Result<Option<Client>>
where
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    let sql = format!("SELECT {} FROM clients WHERE id = ?", CLIENT_COLUMNS);
    let row = sqlx::query(&sql).bind(id).fetch_optional(executor).await?;
    row.as_ref().map(client_from_row).transpose()
}

pub async fn find_by_email<'e, E>(executor: E, email: &str) -> Result<Option<Client>>
where
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    let sql = format!("SELECT {} FROM clients WHERE email = ?", CLIENT_COLUMNS);
    let row = sqlx::query(&sql)
        .bind(normalize_email(email))
        .fetch_optional(executor)
        .await?;
    row.as_ref().map(client_from_row).transpose()
}

/// Overwrite `target` with `supplied` when it carries a non-blank value
fn merge_field(target: &mut Option<String>, supplied: Option<&str>) {
    if let Some(value) = non_blank(supplied) {
        *target = Some(value);
    }
}

/// Find the client by email and merge the profile over it, or insert a new one
///
/// Supplied blank fields never erase stored values. Runs on the caller's
/// connection so it can share a transaction with the consultation insert.
pub async fn upsert(conn: &mut SqliteConnection, profile: &ClientProfile) -> Result<Client> {
    let email = normalize_email(&profile.email);
    let stamp = now();

    if let Some(mut client) = find_by_email(&mut *conn, &email).await? {
        if let Some(first_name) = non_blank(Some(&profile.first_name)) {
            client.first_name = first_name;
        }
        if let Some(last_name) = non_blank(Some(&profile.last_name)) {
            client.last_name = last_name;
        }
        merge_field(&mut client.phone, profile.phone.as_deref());
        merge_field(&mut client.company, profile.company.as_deref());
        merge_field(&mut client.project_details, profile.project_details.as_deref());
        merge_field(&mut client.budget_range, profile.budget_range.as_deref());
        merge_field(&mut client.timeline, profile.timeline.as_deref());
        merge_field(&mut client.referral_source, profile.referral_source.as_deref());
        client.updated_at = stamp;

        sqlx::query(
            r#"
            UPDATE clients SET
                first_name = ?, last_name = ?, phone = ?, company = ?,
                project_details = ?, budget_range = ?, timeline = ?, referral_source = ?,
                updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&client.first_name)
        .bind(&client.last_name)
        .bind(&client.phone)
        .bind(&client.company)
        .bind(&client.project_details)
        .bind(&client.budget_range)
        .bind(&client.timeline)
        .bind(&client.referral_source)
        .bind(to_db_timestamp(&client.updated_at))
        .bind(&client.id)
        .execute(&mut *conn)
        .await?;

        return Ok(client);
    }

    let client = Client {
        id: Uuid::new_v4().to_string(),
        email,
        first_name: profile.first_name.trim().to_string(),
        last_name: profile.last_name.trim().to_string(),
        phone: non_blank(profile.phone.as_deref()),
        company: non_blank(profile.company.as_deref()),
        project_details: non_blank(profile.project_details.as_deref()),
        budget_range: non_blank(profile.budget_range.as_deref()),
        timeline: non_blank(profile.timeline.as_deref()),
        referral_source: non_blank(profile.referral_source.as_deref()),
        created_at: stamp,
        updated_at: stamp,
    };

    sqlx::query(
        r#"
        INSERT INTO clients (
            id, email, first_name, last_name, phone, company, project_details,
            budget_range, timeline, referral_source, created_at, updated_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&client.id)
    .bind(&client.email)
    .bind(&client.first_name)
    .bind(&client.last_name)
    .bind(&client.phone)
    .bind(&client.company)
    .bind(&client.project_details)
    .bind(&client.budget_range)
    .bind(&client.timeline)
    .bind(&client.referral_source)
    .bind(to_db_timestamp(&client.created_at))
    .bind(to_db_timestamp(&client.updated_at))
    .execute(&mut *conn)
    .await?;

    Ok(client)
}

pub async fn count<'e, E>(executor: E) -> Result<i64>
where
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM clients")
        .fetch_one(executor)
        .await?;
    Ok(count)
}
