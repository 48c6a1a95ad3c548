//! Session lookup
//!
//! The storefront login flow owns this table; the booking service only
//! resolves tokens to sessions.

use chrono::{DateTime, Utc};
use sqlx::{Row, Sqlite};
use studio_common::models::Session;
use studio_common::time::to_db_timestamp;
use studio_common::Result;

use super::timestamp;

/// Unexpired session for `token`, if any
pub async fn find_active<'e, E>(
    executor: E,
    token: &str,
    now: DateTime<Utc>,
) -> Result<Option<Session>>
where
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    let row = sqlx::query(
        "SELECT token, email, is_admin, expires_at FROM sessions WHERE token = ? AND expires_at > ?",
    )
    .bind(token)
    .bind(to_db_timestamp(&now))
    .fetch_optional(executor)
    .await?;

    row.map(|row| {
        let is_admin: i64 = row.try_get("is_admin")?;
        Ok(Session {
            token: row.try_get("token")?,
            email: row.try_get("email")?,
            is_admin: is_admin != 0,
            expires_at: timestamp(&row, "expires_at")?,
        })
    })
    .transpose()
}

/// Store a session (login flow and test fixtures)
pub async fn insert<'e, E>(executor: E, session: &Session) -> Result<()>
where
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    sqlx::query("INSERT INTO sessions (token, email, is_admin, expires_at) VALUES (?, ?, ?, ?)")
        .bind(&session.token)
        .bind(&session.email)
        .bind(session.is_admin as i64)
        .bind(to_db_timestamp(&session.expires_at))
        .execute(executor)
        .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use studio_common::db::init_memory_database;
    use studio_common::time::now;

    #[tokio::test]
    async fn test_expired_sessions_are_ignored() {
        let pool = init_memory_database().await.unwrap();
        let current = now();

        insert(
            &pool,
            &Session {
                token: "live".to_string(),
                email: "owner@studio.com".to_string(),
                is_admin: true,
                expires_at: current + Duration::hours(1),
            },
        )
        .await
        .unwrap();
        insert(
            &pool,
            &Session {
                token: "stale".to_string(),
                email: "owner@studio.com".to_string(),
                is_admin: true,
                expires_at: current - Duration::minutes(1),
            },
        )
        .await
        .unwrap();

        let live = find_active(&pool, "live", current).await.unwrap().unwrap();
        assert!(live.is_admin);
        assert!(find_active(&pool, "stale", current).await.unwrap().is_none());
        assert!(find_active(&pool, "missing", current).await.unwrap().is_none());
    }
}
