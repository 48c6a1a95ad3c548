//! Database initialization on disk and in memory

use studio_common::db::{
    get_schema_version, get_setting, init_database, init_memory_database, set_setting,
    CURRENT_SCHEMA_VERSION,
};

async fn object_exists(pool: &sqlx::SqlitePool, kind: &str, name: &str) -> bool {
    sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type = ? AND name = ?)")
        .bind(kind)
        .bind(name)
        .fetch_one(pool)
        .await
        .unwrap()
}

#[tokio::test]
async fn test_database_created_when_missing() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("nested").join("studio.db");

    let pool = init_database(&db_path).await.unwrap();

    assert!(db_path.exists(), "Database file was not created");
    assert_eq!(get_schema_version(&pool).await.unwrap(), CURRENT_SCHEMA_VERSION);
}

#[tokio::test]
async fn test_existing_database_reopens() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("studio.db");

    let first = init_database(&db_path).await.unwrap();
    set_setting(&first, "cron_secret", "abc").await.unwrap();
    first.close().await;

    let second = init_database(&db_path).await.unwrap();
    assert_eq!(
        get_setting(&second, "cron_secret").await.unwrap().as_deref(),
        Some("abc")
    );
}

#[tokio::test]
async fn test_wal_mode_enabled_on_disk() {
    let dir = tempfile::tempdir().unwrap();
    let pool = init_database(&dir.path().join("studio.db")).await.unwrap();

    let mode: String = sqlx::query_scalar("PRAGMA journal_mode")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(mode.to_lowercase(), "wal");
}

#[tokio::test]
async fn test_schema_objects_present() {
    let pool = init_memory_database().await.unwrap();

    for table in [
        "schema_version",
        "settings",
        "sessions",
        "clients",
        "consultation_packages",
        "consultations",
        "consultation_emails",
    ] {
        assert!(object_exists(&pool, "table", table).await, "missing table {}", table);
    }
    assert!(object_exists(&pool, "view", "admin_consultation_overview").await);
    assert!(object_exists(&pool, "index", "idx_consultation_emails_reminder_once").await);
}

#[tokio::test]
async fn test_init_is_idempotent() {
    let pool = init_memory_database().await.unwrap();
    studio_common::db::init_schema(&pool).await.unwrap();
    studio_common::db::init_schema(&pool).await.unwrap();

    let versions: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM schema_version")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(versions, CURRENT_SCHEMA_VERSION as i64);
}

#[tokio::test]
async fn test_foreign_keys_enforced() {
    let pool = init_memory_database().await.unwrap();

    let result = sqlx::query(
        "INSERT INTO consultations (id, client_id, start_at, end_at, duration_minutes, status, created_at, updated_at) \
         VALUES ('c-1', 'missing-client', '2030-01-01T10:00:00.000Z', '2030-01-01T11:00:00.000Z', 60, 'scheduled', 'x', 'x')",
    )
    .execute(&pool)
    .await;

    assert!(result.is_err(), "consultation without client must be rejected");
}

#[tokio::test]
async fn test_end_must_follow_start() {
    let pool = init_memory_database().await.unwrap();
    sqlx::query(
        "INSERT INTO clients (id, email, first_name, last_name, created_at, updated_at) \
         VALUES ('cl-1', 'a@b.com', 'A', 'B', 'x', 'x')",
    )
    .execute(&pool)
    .await
    .unwrap();

    let result = sqlx::query(
        "INSERT INTO consultations (id, client_id, start_at, end_at, duration_minutes, status, created_at, updated_at) \
         VALUES ('c-1', 'cl-1', '2030-01-01T11:00:00.000Z', '2030-01-01T10:00:00.000Z', 60, 'scheduled', 'x', 'x')",
    )
    .execute(&pool)
    .await;

    assert!(result.is_err());
}

#[tokio::test]
async fn test_reminder_unique_index_allows_failed_retries() {
    let pool = init_memory_database().await.unwrap();
    sqlx::query(
        "INSERT INTO clients (id, email, first_name, last_name, created_at, updated_at) \
         VALUES ('cl-1', 'a@b.com', 'A', 'B', 'x', 'x')",
    )
    .execute(&pool)
    .await
    .unwrap();
    sqlx::query(
        "INSERT INTO consultations (id, client_id, start_at, end_at, duration_minutes, status, created_at, updated_at) \
         VALUES ('c-1', 'cl-1', '2030-01-01T10:00:00.000Z', '2030-01-01T11:00:00.000Z', 60, 'scheduled', 'x', 'x')",
    )
    .execute(&pool)
    .await
    .unwrap();

    let insert = |id: &'static str, status: &'static str| {
        sqlx::query(
            "INSERT INTO consultation_emails (id, consultation_id, email_type, recipient, subject, sent_at, status, scheduled_start_at) \
             VALUES (?, 'c-1', 'reminder_24h', 'a@b.com', 's', 'x', ?, '2030-01-01T10:00:00.000Z')",
        )
        .bind(id)
        .bind(status)
    };

    insert("e-1", "failed").execute(&pool).await.unwrap();
    insert("e-2", "failed").execute(&pool).await.unwrap();
    insert("e-3", "sent").execute(&pool).await.unwrap();
    assert!(insert("e-4", "sent").execute(&pool).await.is_err());
}
