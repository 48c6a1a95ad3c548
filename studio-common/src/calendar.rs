//! Calendar deep links and iCalendar bodies for consultations
//!
//! Produces the three "add to calendar" targets offered to clients:
//! Google Calendar render URL, Outlook compose URL and an RFC 5545 ICS
//! document with a single one-hour-before alarm.

use chrono::{DateTime, Utc};

use crate::human_time::{format_price, human_duration};
use crate::models::{Consultation, PackageSnapshot};

const GOOGLE_RENDER_URL: &str = "https://calendar.google.com/calendar/render";
const OUTLOOK_COMPOSE_URL: &str = "https://outlook.live.com/calendar/0/deeplink/compose";
const ICS_PRODID: &str = "-//Studio Bookings//Consultations//EN";

/// Event data shared by every calendar target
#[derive(Debug, Clone, PartialEq)]
pub struct CalendarEvent {
    pub uid: String,
    pub title: String,
    pub description: String,
    pub location: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl CalendarEvent {
    /// Build the event for a consultation
    ///
    /// The description lists package name, duration, description and
    /// features (from the booking-time snapshot) followed by client notes.
    pub fn for_consultation(consultation: &Consultation, studio_name: &str) -> Self {
        let title = match &consultation.package {
            Some(package) => format!("{} - {}", package.name, studio_name),
            None => format!("Consultation - {}", studio_name),
        };

        let location = consultation
            .meeting_link
            .clone()
            .unwrap_or_else(|| "Online (meeting link to follow)".to_string());

        Self {
            uid: consultation.id.clone(),
            title,
            description: consultation_description(consultation),
            location,
            start: consultation.start_at,
            end: consultation.end_at,
        }
    }
}

fn consultation_description(consultation: &Consultation) -> String {
    let mut lines = Vec::new();

    match &consultation.package {
        Some(PackageSnapshot {
            name,
            description,
            features,
            price_cents,
            ..
        }) => {
            lines.push(format!("Package: {}", name));
            lines.push(format!(
                "Duration: {}",
                human_duration(consultation.duration_minutes)
            ));
            lines.push(format!("Price: {}", format_price(*price_cents)));
            if let Some(description) = description.as_deref().filter(|d| !d.trim().is_empty()) {
                lines.push(String::new());
                lines.push(description.to_string());
            }
            if !features.is_empty() {
                lines.push(String::new());
                lines.push("Includes:".to_string());
                lines.extend(features.iter().map(|f| format!("- {}", f)));
            }
        }
        None => {
            lines.push(format!(
                "Duration: {}",
                human_duration(consultation.duration_minutes)
            ));
        }
    }

    if let Some(notes) = consultation.notes.as_deref().filter(|n| !n.trim().is_empty()) {
        lines.push(String::new());
        lines.push(format!("Your notes: {}", notes));
    }

    lines.join("\n")
}

/// Compact UTC form used by Google Calendar and ICS, e.g. `20300101T100000Z`
pub fn compact_timestamp(dt: &DateTime<Utc>) -> String {
    dt.format("%Y%m%dT%H%M%SZ").to_string()
}

/// Google Calendar "render" deep link
///
/// # Examples
///
/// ```
/// use studio_common::calendar::{google_calendar_url, CalendarEvent};
/// use studio_common::time::parse_timestamp;
///
/// let event = CalendarEvent {
///     uid: "abc".to_string(),
///     title: "Mix review".to_string(),
///     description: String::new(),
///     location: "Studio A".to_string(),
///     start: parse_timestamp("start", "2030-01-01T10:00:00Z").unwrap(),
///     end: parse_timestamp("end", "2030-01-01T11:00:00Z").unwrap(),
/// };
/// let url = google_calendar_url(&event, "UTC");
/// assert!(url.contains("dates=20300101T100000Z%2F20300101T110000Z"));
/// assert!(url.contains("text=Mix%20review"));
/// ```
pub fn google_calendar_url(event: &CalendarEvent, timezone: &str) -> String {
    let dates = format!(
        "{}/{}",
        compact_timestamp(&event.start),
        compact_timestamp(&event.end)
    );

    let params = [
        ("action", "TEMPLATE"),
        ("text", event.title.as_str()),
        ("dates", dates.as_str()),
        ("details", event.description.as_str()),
        ("location", event.location.as_str()),
        ("ctz", timezone),
    ];

    format!("{}?{}", GOOGLE_RENDER_URL, encode_query(&params))
}

/// Outlook.com compose deep link
pub fn outlook_calendar_url(event: &CalendarEvent) -> String {
    let start = event.start.to_rfc3339();
    let end = event.end.to_rfc3339();

    let params = [
        ("path", "/calendar/action/compose"),
        ("rru", "addevent"),
        ("subject", event.title.as_str()),
        ("startdt", start.as_str()),
        ("enddt", end.as_str()),
        ("body", event.description.as_str()),
        ("location", event.location.as_str()),
    ];

    format!("{}?{}", OUTLOOK_COMPOSE_URL, encode_query(&params))
}

fn encode_query(params: &[(&str, &str)]) -> String {
    params
        .iter()
        .map(|(key, value)| format!("{}={}", key, urlencoding::encode(value)))
        .collect::<Vec<_>>()
        .join("&")
}

/// Escape text per RFC 5545 §3.3.11
///
/// Backslash, semicolon and comma are backslash-escaped; newlines become
/// the two-character sequence `\n`.
pub fn escape_ics_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    while let Some(ch) = chars.next() {
        match ch {
            '\\' => out.push_str("\\\\"),
            ';' => out.push_str("\\;"),
            ',' => out.push_str("\\,"),
            '\r' => {
                if chars.peek() == Some(&'\n') {
                    chars.next();
                }
                out.push_str("\\n");
            }
            '\n' => out.push_str("\\n"),
            other => out.push(other),
        }
    }
    out
}

/// Longest content line, in octets, before folding (RFC 5545 §3.1)
pub const ICS_LINE_LIMIT: usize = 75;

/// Fold one content line into CRLF + space continuations
///
/// Every physical line, the leading space included, stays within
/// [`ICS_LINE_LIMIT`] octets. Splits fall on UTF-8 character boundaries.
///
/// # Examples
///
/// ```
/// use studio_common::calendar::fold_ics_line;
///
/// assert_eq!(fold_ics_line("SUMMARY:short"), "SUMMARY:short");
///
/// let folded = fold_ics_line(&format!("DESCRIPTION:{}", "x".repeat(100)));
/// assert!(folded.split("\r\n").all(|line| line.len() <= 75));
/// assert_eq!(folded.replace("\r\n ", ""), format!("DESCRIPTION:{}", "x".repeat(100)));
/// ```
pub fn fold_ics_line(line: &str) -> String {
    if line.len() <= ICS_LINE_LIMIT {
        return line.to_string();
    }

    let mut out = String::with_capacity(line.len() + line.len() / ICS_LINE_LIMIT * 3);
    let mut width = 0;
    for ch in line.chars() {
        let len = ch.len_utf8();
        if width + len > ICS_LINE_LIMIT {
            out.push_str("\r\n ");
            width = 1;
        }
        out.push(ch);
        width += len;
    }
    out
}

/// Render an iCalendar document for `event`
///
/// `uid_domain` qualifies the event UID (`<uid>@<uid_domain>`) and
/// `stamp` becomes DTSTAMP. Lines are folded and CRLF-terminated.
pub fn ics_document(event: &CalendarEvent, uid_domain: &str, stamp: DateTime<Utc>) -> String {
    let lines = [
        "BEGIN:VCALENDAR".to_string(),
        "VERSION:2.0".to_string(),
        format!("PRODID:{}", ICS_PRODID),
        "CALSCALE:GREGORIAN".to_string(),
        "METHOD:PUBLISH".to_string(),
        "BEGIN:VEVENT".to_string(),
        format!("UID:{}@{}", event.uid, uid_domain),
        format!("DTSTAMP:{}", compact_timestamp(&stamp)),
        format!("DTSTART:{}", compact_timestamp(&event.start)),
        format!("DTEND:{}", compact_timestamp(&event.end)),
        format!("SUMMARY:{}", escape_ics_text(&event.title)),
        format!("DESCRIPTION:{}", escape_ics_text(&event.description)),
        format!("LOCATION:{}", escape_ics_text(&event.location)),
        "STATUS:CONFIRMED".to_string(),
        "SEQUENCE:0".to_string(),
        "BEGIN:VALARM".to_string(),
        "TRIGGER:-PT1H".to_string(),
        "ACTION:DISPLAY".to_string(),
        format!("DESCRIPTION:{}", escape_ics_text(&format!("Reminder: {}", event.title))),
        "END:VALARM".to_string(),
        "END:VEVENT".to_string(),
        "END:VCALENDAR".to_string(),
    ];

    lines.iter().fold(String::new(), |mut body, line| {
        body.push_str(&fold_ics_line(line));
        body.push_str("\r\n");
        body
    })
}
