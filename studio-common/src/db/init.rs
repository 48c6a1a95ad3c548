//! Database initialization
//!
//! Creates the SQLite file on first run, applies connection pragmas,
//! creates every table with `CREATE TABLE IF NOT EXISTS`, runs versioned
//! migrations, then creates indexes and the admin overview view.

use crate::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::path::Path;
use std::time::Duration;
use tracing::info;

/// Busy timeout applied to every pool
pub const BUSY_TIMEOUT_MS: i64 = 5000;

/// Open (creating if needed) the database file and bring the schema current
pub async fn init_database(db_path: &Path) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    // Set per connection; a PRAGMA run through the pool reaches only one of them.
    // WAL allows concurrent readers alongside the single writer.
    let options = SqliteConnectOptions::new()
        .filename(db_path)
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .foreign_keys(true)
        .busy_timeout(Duration::from_millis(BUSY_TIMEOUT_MS as u64));

    let pool = SqlitePoolOptions::new()
        .max_connections(10)
        .min_connections(1)
        .connect_with(options)
        .await?;

    if newly_created {
        info!("Initialized new database: {}", db_path.display());
    } else {
        info!("Opened existing database: {}", db_path.display());
    }

    init_schema(&pool).await?;

    Ok(pool)
}

/// Single-connection in-memory database with the full schema
///
/// Every connection to `sqlite::memory:` is a separate database, so the
/// pool is capped at one connection.
pub async fn init_memory_database() -> Result<SqlitePool> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await?;

    init_schema(&pool).await?;

    Ok(pool)
}

/// Apply pragmas, tables, migrations, indexes and views (idempotent)
pub async fn init_schema(pool: &SqlitePool) -> Result<()> {
    sqlx::query("PRAGMA foreign_keys = ON")
        .execute(pool)
        .await?;

    let pragma_sql = format!("PRAGMA busy_timeout = {}", BUSY_TIMEOUT_MS);
    sqlx::query(&pragma_sql).execute(pool).await?;

    create_schema_version_table(pool).await?;
    create_settings_table(pool).await?;
    create_sessions_table(pool).await?;
    create_clients_table(pool).await?;
    create_consultation_packages_table(pool).await?;
    create_consultations_table(pool).await?;
    create_consultation_emails_table(pool).await?;

    // Migrations add columns to databases created by older builds; indexes
    // below reference those columns
    crate::db::migrations::run_migrations(pool).await?;

    create_indexes(pool).await?;
    create_admin_overview_view(pool).await?;

    Ok(())
}

async fn create_schema_version_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Create the settings table
///
/// Stores runtime key-value settings such as `cron_secret`.
pub async fn create_settings_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS settings (
            key TEXT PRIMARY KEY,
            value TEXT,
            updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Create the sessions table
///
/// Rows are written by the storefront login flow; the booking service
/// only reads them.
pub async fn create_sessions_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS sessions (
            token TEXT PRIMARY KEY,
            email TEXT NOT NULL,
            is_admin INTEGER NOT NULL DEFAULT 0,
            expires_at TEXT NOT NULL,
            created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn create_clients_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS clients (
            id TEXT PRIMARY KEY,
            email TEXT NOT NULL UNIQUE,
            first_name TEXT NOT NULL,
            last_name TEXT NOT NULL,
            phone TEXT,
            company TEXT,
            project_details TEXT,
            budget_range TEXT,
            timeline TEXT,
            referral_source TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn create_consultation_packages_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS consultation_packages (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            description TEXT,
            duration_minutes INTEGER NOT NULL CHECK (duration_minutes BETWEEN 15 AND 480),
            price_cents INTEGER NOT NULL CHECK (price_cents >= 0),
            is_active INTEGER NOT NULL DEFAULT 1,
            features TEXT NOT NULL DEFAULT '[]',
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Create the consultations table
///
/// `package_*` columns hold the package as it was when the consultation
/// was booked, so later catalog edits do not rewrite history.
pub async fn create_consultations_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS consultations (
            id TEXT PRIMARY KEY,
            client_id TEXT NOT NULL REFERENCES clients(id),
            package_id TEXT REFERENCES consultation_packages(id),
            start_at TEXT NOT NULL,
            end_at TEXT NOT NULL,
            duration_minutes INTEGER NOT NULL,
            status TEXT NOT NULL DEFAULT 'scheduled'
                CHECK (status IN ('scheduled', 'confirmed', 'completed', 'cancelled', 'rescheduled')),
            notes TEXT,
            admin_notes TEXT,
            meeting_link TEXT,
            cancellation_reason TEXT,
            package_name TEXT,
            package_description TEXT,
            package_duration_minutes INTEGER,
            package_price_cents INTEGER,
            package_features TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            CHECK (end_at > start_at)
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Create the append-only email audit log
pub async fn create_consultation_emails_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS consultation_emails (
            id TEXT PRIMARY KEY,
            consultation_id TEXT NOT NULL REFERENCES consultations(id),
            email_type TEXT NOT NULL
                CHECK (email_type IN ('confirmation', 'reminder_24h', 'reminder_1h',
                                      'reschedule', 'cancellation', 'follow_up')),
            recipient TEXT NOT NULL,
            subject TEXT NOT NULL,
            sent_at TEXT NOT NULL,
            status TEXT NOT NULL DEFAULT 'sent' CHECK (status IN ('sent', 'failed')),
            error_message TEXT,
            message_id TEXT,
            scheduled_start_at TEXT
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_indexes(pool: &SqlitePool) -> Result<()> {
    let statements = [
        "CREATE INDEX IF NOT EXISTS idx_consultations_start_at ON consultations(start_at)",
        "CREATE INDEX IF NOT EXISTS idx_consultations_status ON consultations(status)",
        "CREATE INDEX IF NOT EXISTS idx_consultations_client_id ON consultations(client_id)",
        "CREATE INDEX IF NOT EXISTS idx_consultation_emails_consultation_id \
            ON consultation_emails(consultation_id)",
        "CREATE INDEX IF NOT EXISTS idx_sessions_expires_at ON sessions(expires_at)",
        // At most one successful reminder of each kind per scheduled start
        "CREATE UNIQUE INDEX IF NOT EXISTS idx_consultation_emails_reminder_once \
            ON consultation_emails(consultation_id, email_type, scheduled_start_at) \
            WHERE status = 'sent' AND email_type IN ('reminder_24h', 'reminder_1h')",
    ];

    for sql in statements {
        sqlx::query(sql).execute(pool).await?;
    }

    Ok(())
}

/// Create the flattened back-office listing view
///
/// The package name prefers the booking-time snapshot and falls back to
/// the live catalog row.
pub async fn create_admin_overview_view(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE VIEW IF NOT EXISTS admin_consultation_overview AS
        SELECT
            c.id,
            c.start_at,
            c.end_at,
            c.duration_minutes,
            c.status,
            c.notes,
            c.admin_notes,
            c.meeting_link,
            c.cancellation_reason,
            c.created_at,
            c.client_id,
            cl.email AS client_email,
            cl.first_name AS client_first_name,
            cl.last_name AS client_last_name,
            cl.phone AS client_phone,
            cl.company AS client_company,
            c.package_id,
            COALESCE(c.package_name, p.name) AS package_name
        FROM consultations c
        JOIN clients cl ON cl.id = c.client_id
        LEFT JOIN consultation_packages p ON p.id = c.package_id
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Read one setting
pub async fn get_setting(pool: &SqlitePool, key: &str) -> Result<Option<String>> {
    let value: Option<Option<String>> =
        sqlx::query_scalar("SELECT value FROM settings WHERE key = ?")
            .bind(key)
            .fetch_optional(pool)
            .await?;

    Ok(value.flatten())
}

/// Insert or overwrite one setting
pub async fn set_setting(pool: &SqlitePool, key: &str, value: &str) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO settings (key, value, updated_at) VALUES (?, ?, CURRENT_TIMESTAMP)
        ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = CURRENT_TIMESTAMP
        "#,
    )
    .bind(key)
    .bind(value)
    .execute(pool)
    .await?;

    Ok(())
}
