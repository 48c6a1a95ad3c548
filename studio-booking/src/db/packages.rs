//! Consultation package catalog

use sqlx::sqlite::SqliteRow;
use sqlx::{Row, Sqlite};
use studio_common::models::ConsultationPackage;
use studio_common::time::to_db_timestamp;
use studio_common::{Error, Result};

use super::{string_list, timestamp};

fn package_from_row(row: &SqliteRow) -> Result<ConsultationPackage> {
    let is_active: i64 = row.try_get("is_active")?;
    Ok(ConsultationPackage {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        description: row.try_get("description")?,
        duration_minutes: row.try_get("duration_minutes")?,
        price_cents: row.try_get("price_cents")?,
        is_active: is_active != 0,
        features: string_list(row, "features")?,
        created_at: timestamp(row, "created_at")?,
        updated_at: timestamp(row, "updated_at")?,
    })
}

/// Active packages, cheapest first
pub async fn list_active<'e, E>(executor: E) -> Result<Vec<ConsultationPackage>>
where
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    let rows = sqlx::query(
        r#"
        SELECT id, name, description, duration_minutes, price_cents, is_active, features,
               created_at, updated_at
        FROM consultation_packages
        WHERE is_active = 1
        ORDER BY price_cents ASC, name ASC
        "#,
    )
    .fetch_all(executor)
    .await?;

    rows.iter().map(package_from_row).collect()
}

pub async fn find_by_id<'e, E>(executor: E, id: &str) -> Result<Option<ConsultationPackage>>
where
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    let row = sqlx::query(
        r#"
        SELECT id, name, description, duration_minutes, price_cents, is_active, features,
               created_at, updated_at
        FROM consultation_packages
        WHERE id = ?
        "#,
    )
    .bind(id)
    .fetch_optional(executor)
    .await?;

    row.as_ref().map(package_from_row).transpose()
}

pub async fn insert<'e, E>(executor: E, package: &ConsultationPackage) -> Result<()>
where
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    let features = serde_json::to_string(&package.features)
        .map_err(|e| Error::Internal(format!("Failed to encode features: {}", e)))?;

    sqlx::query(
        r#"
        INSERT INTO consultation_packages (
            id, name, description, duration_minutes, price_cents, is_active, features,
            created_at, updated_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&package.id)
    .bind(&package.name)
    .bind(&package.description)
    .bind(package.duration_minutes)
    .bind(package.price_cents)
    .bind(package.is_active as i64)
    .bind(features)
    .bind(to_db_timestamp(&package.created_at))
    .bind(to_db_timestamp(&package.updated_at))
    .execute(executor)
    .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use studio_common::db::init_memory_database;
    use studio_common::time::now;

    fn package(id: &str, price_cents: i64, is_active: bool) -> ConsultationPackage {
        ConsultationPackage {
            id: id.to_string(),
            name: format!("Package {}", id),
            description: None,
            duration_minutes: 60,
            price_cents,
            is_active,
            features: vec!["Stem review".to_string()],
            created_at: now(),
            updated_at: now(),
        }
    }

    #[tokio::test]
    async fn test_list_active_orders_by_price() {
        let pool = init_memory_database().await.unwrap();
        insert(&pool, &package("pricey", 30000, true)).await.unwrap();
        insert(&pool, &package("cheap", 5000, true)).await.unwrap();
        insert(&pool, &package("retired", 1000, false)).await.unwrap();

        let active = list_active(&pool).await.unwrap();
        let ids: Vec<&str> = active.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["cheap", "pricey"]);
        assert_eq!(active[0].features, vec!["Stem review".to_string()]);
    }

    #[tokio::test]
    async fn test_find_inactive_package_by_id() {
        let pool = init_memory_database().await.unwrap();
        insert(&pool, &package("retired", 1000, false)).await.unwrap();

        let found = find_by_id(&pool, "retired").await.unwrap().unwrap();
        assert!(!found.is_active);
        assert!(find_by_id(&pool, "missing").await.unwrap().is_none());
    }
}
