//! Human-readable date, time, duration and price formatting
//!
//! Used for email bodies and calendar descriptions. All display functions
//! take the studio's display offset explicitly; nothing reads the host
//! time zone.

use chrono::{DateTime, FixedOffset, Utc};

/// Long date, e.g. `Friday, March 14, 2025`
///
/// # Examples
///
/// ```
/// use chrono::FixedOffset;
/// use studio_common::human_time::format_display_date;
/// use studio_common::time::parse_timestamp;
///
/// let ts = parse_timestamp("start_at", "2025-03-14T18:30:00Z").unwrap();
/// let utc = FixedOffset::east_opt(0).unwrap();
/// assert_eq!(format_display_date(&ts, &utc), "Friday, March 14, 2025");
/// ```
pub fn format_display_date(dt: &DateTime<Utc>, offset: &FixedOffset) -> String {
    dt.with_timezone(offset).format("%A, %B %-d, %Y").to_string()
}

/// 12-hour clock time, e.g. `2:30 PM`
pub fn format_display_time(dt: &DateTime<Utc>, offset: &FixedOffset) -> String {
    dt.with_timezone(offset).format("%-I:%M %p").to_string()
}

/// Date and time joined, e.g. `Friday, March 14, 2025 at 2:30 PM`
pub fn format_display_datetime(dt: &DateTime<Utc>, offset: &FixedOffset) -> String {
    format!(
        "{} at {}",
        format_display_date(dt, offset),
        format_display_time(dt, offset)
    )
}

/// Duration in words: `45 minutes`, `1 hour`, `1 hour 30 minutes`
///
/// # Examples
///
/// ```
/// use studio_common::human_time::human_duration;
///
/// assert_eq!(human_duration(30), "30 minutes");
/// assert_eq!(human_duration(60), "1 hour");
/// assert_eq!(human_duration(150), "2 hours 30 minutes");
/// ```
pub fn human_duration(minutes: i64) -> String {
    let hours = minutes / 60;
    let mins = minutes % 60;

    let hour_part = match hours {
        0 => None,
        1 => Some("1 hour".to_string()),
        h => Some(format!("{} hours", h)),
    };
    let minute_part = match mins {
        0 => None,
        1 => Some("1 minute".to_string()),
        m => Some(format!("{} minutes", m)),
    };

    match (hour_part, minute_part) {
        (Some(h), Some(m)) => format!("{} {}", h, m),
        (Some(h), None) => h,
        (None, Some(m)) => m,
        (None, None) => "0 minutes".to_string(),
    }
}

/// Integer cents as dollars, e.g. `$1,250.00`
pub fn format_price(cents: i64) -> String {
    let negative = cents < 0;
    let cents = cents.abs();
    let dollars = (cents / 100).to_string();

    let mut grouped = String::with_capacity(dollars.len() + dollars.len() / 3);
    for (i, ch) in dollars.chars().enumerate() {
        if i > 0 && (dollars.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    format!(
        "{}${}.{:02}",
        if negative { "-" } else { "" },
        grouped,
        cents % 100
    )
}
