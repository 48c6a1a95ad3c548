//! Persistence gateway for the booking service
//!
//! Typed queries over the schema created by `studio_common::db`. Rows are
//! mapped by hand with `Row::get`; timestamps go through
//! `studio_common::time` so stored text stays fixed-width RFC 3339.

pub mod clients;
pub mod consultations;
pub mod emails;
pub mod packages;
pub mod sessions;

use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use studio_common::time::from_db_timestamp;
use studio_common::Result;

/// Read a required timestamp column
pub(crate) fn timestamp(row: &SqliteRow, column: &str) -> Result<DateTime<Utc>> {
    let raw: String = row.try_get(column)?;
    from_db_timestamp(column, &raw)
}

/// Read a nullable timestamp column
pub(crate) fn optional_timestamp(row: &SqliteRow, column: &str) -> Result<Option<DateTime<Utc>>> {
    let raw: Option<String> = row.try_get(column)?;
    raw.map(|value| from_db_timestamp(column, &value)).transpose()
}

/// Decode a JSON string array column; NULL reads as empty
pub(crate) fn string_list(row: &SqliteRow, column: &str) -> Result<Vec<String>> {
    let raw: Option<String> = row.try_get(column)?;
    match raw {
        Some(json) if !json.trim().is_empty() => serde_json::from_str(&json).map_err(|e| {
            studio_common::Error::Internal(format!("Malformed JSON in {}: {}", column, e))
        }),
        _ => Ok(Vec::new()),
    }
}

/// Trimmed value, or `None` when absent or blank
pub(crate) fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}
