//! Timestamp utilities
//!
//! Every timestamp arriving from an external caller passes through
//! [`parse_timestamp`] so malformed input fails with
//! [`Error::InvalidTimestamp`] instead of reaching a comparison.

use chrono::{DateTime, Datelike, Duration, NaiveTime, SecondsFormat, TimeZone, Utc};

use crate::{Error, Result};

/// Get current UTC timestamp
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Parse an RFC 3339 / ISO-8601 timestamp supplied for `field`
///
/// # Examples
///
/// ```
/// use studio_common::time::parse_timestamp;
///
/// let ts = parse_timestamp("start_at", "2030-05-01T15:00:00+02:00").unwrap();
/// assert_eq!(ts.to_rfc3339(), "2030-05-01T13:00:00+00:00");
///
/// assert!(parse_timestamp("start_at", "next tuesday").is_err());
/// ```
pub fn parse_timestamp(field: &str, value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value.trim())
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| Error::InvalidTimestamp {
            field: field.to_string(),
            value: value.to_string(),
        })
}

/// Format a timestamp for storage
///
/// Fixed width (millisecond precision, `Z` suffix) so that string
/// comparison in SQL matches chronological order.
pub fn to_db_timestamp(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Parse a timestamp read back from the database
pub fn from_db_timestamp(column: &str, value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| Error::Internal(format!("Failed to parse {}: {}", column, e)))
}

/// Monday 00:00 UTC of the week containing `at`
pub fn start_of_week(at: DateTime<Utc>) -> DateTime<Utc> {
    let days_from_monday = at.weekday().num_days_from_monday() as i64;
    let date = at.date_naive() - Duration::days(days_from_monday);
    Utc.from_utc_datetime(&date.and_time(NaiveTime::default()))
}

/// First day of the month containing `at`, 00:00 UTC
pub fn start_of_month(at: DateTime<Utc>) -> DateTime<Utc> {
    let date = at.date_naive().with_day(1).unwrap_or(at.date_naive());
    Utc.from_utc_datetime(&date.and_time(NaiveTime::default()))
}
