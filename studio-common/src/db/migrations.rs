//! Database schema migrations
//!
//! Versioned, idempotent upgrades tracked in `schema_version`. Fresh
//! databases already get the current columns from `CREATE TABLE`, so every
//! migration checks `pragma_table_info` before altering anything.
//!
//! # Migration Guidelines
//!
//! 1. Never modify an existing migration; add a new one
//! 2. Prefer `ALTER TABLE ... ADD COLUMN` so data is preserved
//! 3. Bump [`CURRENT_SCHEMA_VERSION`] with every new migration

use crate::Result;
use sqlx::SqlitePool;
use tracing::{info, warn};

/// Current schema version
pub const CURRENT_SCHEMA_VERSION: i32 = 2;

/// Latest applied version, 0 when nothing was recorded
pub async fn get_schema_version(pool: &SqlitePool) -> Result<i32> {
    let table_exists: bool = sqlx::query_scalar(
        r#"
        SELECT EXISTS(
            SELECT 1 FROM sqlite_master
            WHERE type='table' AND name='schema_version'
        )
        "#,
    )
    .fetch_one(pool)
    .await?;

    if !table_exists {
        return Ok(0);
    }

    let version: Option<i32> =
        sqlx::query_scalar("SELECT version FROM schema_version ORDER BY version DESC LIMIT 1")
            .fetch_optional(pool)
            .await?;

    Ok(version.unwrap_or(0))
}

async fn set_schema_version(pool: &SqlitePool, version: i32) -> Result<()> {
    sqlx::query("INSERT OR IGNORE INTO schema_version (version) VALUES (?)")
        .bind(version)
        .execute(pool)
        .await?;

    Ok(())
}

/// Run all pending migrations
pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    let current_version = get_schema_version(pool).await?;

    if current_version == CURRENT_SCHEMA_VERSION {
        info!("Database schema is up to date (v{})", current_version);
        return Ok(());
    }

    if current_version > CURRENT_SCHEMA_VERSION {
        warn!(
            "Database schema version ({}) is newer than code version ({})",
            current_version, CURRENT_SCHEMA_VERSION
        );
        return Ok(());
    }

    info!(
        "Running database migrations: v{} -> v{}",
        current_version, CURRENT_SCHEMA_VERSION
    );

    if current_version < 1 {
        migrate_v1(pool).await?;
        set_schema_version(pool, 1).await?;
        info!("Migration v1 completed");
    }

    if current_version < 2 {
        migrate_v2(pool).await?;
        set_schema_version(pool, 2).await?;
        info!("Migration v2 completed");
    }

    Ok(())
}

async fn table_exists(pool: &SqlitePool, table: &str) -> Result<bool> {
    let exists: bool = sqlx::query_scalar(
        "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type='table' AND name = ?)",
    )
    .bind(table)
    .fetch_one(pool)
    .await?;

    Ok(exists)
}

async fn column_exists(pool: &SqlitePool, table: &str, column: &str) -> Result<bool> {
    let count: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM pragma_table_info(?) WHERE name = ?")
            .bind(table)
            .bind(column)
            .fetch_one(pool)
            .await?;

    Ok(count > 0)
}

/// Add `column` unless present; tolerates a concurrent initializer adding it first
async fn add_column(pool: &SqlitePool, table: &str, column: &str, sql_type: &str) -> Result<bool> {
    if column_exists(pool, table, column).await? {
        return Ok(false);
    }

    let sql = format!("ALTER TABLE {} ADD COLUMN {} {}", table, column, sql_type);
    match sqlx::query(&sql).execute(pool).await {
        Ok(_) => {
            info!("  Added {}.{}", table, column);
            Ok(true)
        }
        Err(sqlx::Error::Database(db_err)) if db_err.message().contains("duplicate column") => {
            Ok(false)
        }
        Err(e) => Err(e.into()),
    }
}

/// Migration v1: package snapshot columns on consultations
///
/// Older databases referenced the live package row only. Existing
/// consultations are backfilled from the catalog as it stands now.
async fn migrate_v1(pool: &SqlitePool) -> Result<()> {
    info!("Running migration v1: package snapshot columns on consultations");

    if !table_exists(pool, "consultations").await? {
        info!("  consultations table doesn't exist yet - skipping migration");
        return Ok(());
    }

    let columns = [
        ("package_name", "TEXT"),
        ("package_description", "TEXT"),
        ("package_duration_minutes", "INTEGER"),
        ("package_price_cents", "INTEGER"),
        ("package_features", "TEXT"),
    ];

    let mut added = false;
    for (column, sql_type) in columns {
        added |= add_column(pool, "consultations", column, sql_type).await?;
    }

    if added {
        let backfilled = sqlx::query(
            r#"
            UPDATE consultations SET
                package_name = (SELECT p.name FROM consultation_packages p WHERE p.id = consultations.package_id),
                package_description = (SELECT p.description FROM consultation_packages p WHERE p.id = consultations.package_id),
                package_duration_minutes = (SELECT p.duration_minutes FROM consultation_packages p WHERE p.id = consultations.package_id),
                package_price_cents = (SELECT p.price_cents FROM consultation_packages p WHERE p.id = consultations.package_id),
                package_features = (SELECT p.features FROM consultation_packages p WHERE p.id = consultations.package_id)
            WHERE package_id IS NOT NULL AND package_name IS NULL
            "#,
        )
        .execute(pool)
        .await?
        .rows_affected();

        info!("  Backfilled package snapshot on {} consultations", backfilled);
    }

    Ok(())
}

/// Migration v2: delivery details on the email audit log
///
/// Adds `message_id` and `scheduled_start_at`. Rows written before this
/// migration keep a NULL scheduled start and never block a reminder.
async fn migrate_v2(pool: &SqlitePool) -> Result<()> {
    info!("Running migration v2: message_id and scheduled_start_at on consultation_emails");

    if !table_exists(pool, "consultation_emails").await? {
        info!("  consultation_emails table doesn't exist yet - skipping migration");
        return Ok(());
    }

    add_column(pool, "consultation_emails", "message_id", "TEXT").await?;
    add_column(pool, "consultation_emails", "scheduled_start_at", "TEXT").await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn setup_test_db() -> SqlitePool {
        SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap()
    }

    async fn create_version_table(pool: &SqlitePool) {
        sqlx::query(
            "CREATE TABLE schema_version (version INTEGER PRIMARY KEY, applied_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP)",
        )
        .execute(pool)
        .await
        .unwrap();
    }

    /// Consultation and package tables as created before snapshots existed
    async fn create_legacy_tables(pool: &SqlitePool) {
        sqlx::query(
            r#"
            CREATE TABLE consultation_packages (
                id TEXT PRIMARY KEY, name TEXT NOT NULL, description TEXT,
                duration_minutes INTEGER NOT NULL, price_cents INTEGER NOT NULL,
                is_active INTEGER NOT NULL DEFAULT 1, features TEXT NOT NULL DEFAULT '[]',
                created_at TEXT NOT NULL, updated_at TEXT NOT NULL
            )
            "#,
        )
        .execute(pool)
        .await
        .unwrap();

        sqlx::query(
            r#"
            CREATE TABLE consultations (
                id TEXT PRIMARY KEY, client_id TEXT NOT NULL, package_id TEXT,
                start_at TEXT NOT NULL, end_at TEXT NOT NULL, duration_minutes INTEGER NOT NULL,
                status TEXT NOT NULL, notes TEXT, admin_notes TEXT, meeting_link TEXT,
                cancellation_reason TEXT, created_at TEXT NOT NULL, updated_at TEXT NOT NULL
            )
            "#,
        )
        .execute(pool)
        .await
        .unwrap();

        sqlx::query(
            r#"
            CREATE TABLE consultation_emails (
                id TEXT PRIMARY KEY, consultation_id TEXT NOT NULL, email_type TEXT NOT NULL,
                recipient TEXT NOT NULL, subject TEXT NOT NULL, sent_at TEXT NOT NULL,
                status TEXT NOT NULL, error_message TEXT
            )
            "#,
        )
        .execute(pool)
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn test_get_schema_version_no_table() {
        let pool = setup_test_db().await;
        assert_eq!(get_schema_version(&pool).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_set_and_get_schema_version() {
        let pool = setup_test_db().await;
        create_version_table(&pool).await;

        set_schema_version(&pool, 1).await.unwrap();
        set_schema_version(&pool, 2).await.unwrap();
        set_schema_version(&pool, 2).await.unwrap();

        assert_eq!(get_schema_version(&pool).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_migrations_skip_missing_tables() {
        let pool = setup_test_db().await;
        create_version_table(&pool).await;

        run_migrations(&pool).await.unwrap();
        assert_eq!(get_schema_version(&pool).await.unwrap(), CURRENT_SCHEMA_VERSION);
    }

    #[tokio::test]
    async fn test_v1_backfills_package_snapshot() {
        let pool = setup_test_db().await;
        create_version_table(&pool).await;
        create_legacy_tables(&pool).await;

        sqlx::query(
            "INSERT INTO consultation_packages VALUES ('pkg-1', 'Mix Review', NULL, 60, 15000, 1, '[\"Stems\"]', 't', 't')",
        )
        .execute(&pool)
        .await
        .unwrap();
        sqlx::query(
            "INSERT INTO consultations (id, client_id, package_id, start_at, end_at, duration_minutes, status, created_at, updated_at) \
             VALUES ('c-1', 'cl-1', 'pkg-1', '2030-01-01T10:00:00.000Z', '2030-01-01T11:00:00.000Z', 60, 'scheduled', 't', 't')",
        )
        .execute(&pool)
        .await
        .unwrap();

        run_migrations(&pool).await.unwrap();

        let (name, price, features): (Option<String>, Option<i64>, Option<String>) = sqlx::query_as(
            "SELECT package_name, package_price_cents, package_features FROM consultations WHERE id = 'c-1'",
        )
        .fetch_one(&pool)
        .await
        .unwrap();

        assert_eq!(name.as_deref(), Some("Mix Review"));
        assert_eq!(price, Some(15000));
        assert_eq!(features.as_deref(), Some("[\"Stems\"]"));
    }

    #[tokio::test]
    async fn test_v2_adds_audit_columns() {
        let pool = setup_test_db().await;
        create_version_table(&pool).await;
        create_legacy_tables(&pool).await;

        run_migrations(&pool).await.unwrap();

        assert!(column_exists(&pool, "consultation_emails", "message_id").await.unwrap());
        assert!(column_exists(&pool, "consultation_emails", "scheduled_start_at").await.unwrap());
    }

    #[tokio::test]
    async fn test_migrations_idempotent() {
        let pool = setup_test_db().await;
        create_version_table(&pool).await;
        create_legacy_tables(&pool).await;

        run_migrations(&pool).await.unwrap();
        migrate_v1(&pool).await.unwrap();
        migrate_v2(&pool).await.unwrap();
        run_migrations(&pool).await.unwrap();

        assert_eq!(get_schema_version(&pool).await.unwrap(), CURRENT_SCHEMA_VERSION);
    }
}
