//! Request shape validation
//!
//! Bodies are read as raw bytes and decoded here so that malformed JSON
//! and missing fields both produce the same 400 body.

use axum::body::Bytes;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use studio_common::schedule::{is_valid_duration, MAX_DURATION_MINUTES, MIN_DURATION_MINUTES};
use studio_common::time::parse_timestamp;

use crate::{ApiError, ApiResult};

/// Decode a JSON body; an empty body decodes as `{}`
pub fn parse_json<T: DeserializeOwned>(body: &Bytes) -> ApiResult<T> {
    let raw: &[u8] = if body.iter().all(u8::is_ascii_whitespace) {
        b"{}"
    } else {
        &body[..]
    };
    serde_json::from_slice(raw).map_err(|e| ApiError::bad_request(format!("Invalid JSON body: {}", e)))
}

/// Collects field problems so one response can report all of them
#[derive(Debug, Default)]
pub struct FieldCheck {
    missing: Vec<String>,
    invalid: Vec<String>,
    messages: Vec<String>,
}

impl FieldCheck {
    pub fn new() -> Self {
        Self::default()
    }

    /// Present and non-blank, trimmed
    pub fn required<'a>(&mut self, name: &str, value: Option<&'a str>) -> Option<&'a str> {
        match value.map(str::trim).filter(|v| !v.is_empty()) {
            Some(v) => Some(v),
            None => {
                self.missing(name);
                None
            }
        }
    }

    pub fn missing(&mut self, name: &str) {
        self.missing.push(name.to_string());
    }

    pub fn require_number(&mut self, name: &str, value: Option<i64>) -> Option<i64> {
        if value.is_none() {
            self.missing(name);
        }
        value
    }

    pub fn invalid(&mut self, name: &str, message: impl Into<String>) {
        self.invalid.push(name.to_string());
        self.messages.push(message.into());
    }

    /// Required RFC 3339 timestamp
    pub fn timestamp(&mut self, name: &str, value: Option<&str>) -> Option<DateTime<Utc>> {
        let raw = self.required(name, value)?;
        match parse_timestamp(name, raw) {
            Ok(ts) => Some(ts),
            Err(e) => {
                self.invalid(name, e.to_string());
                None
            }
        }
    }

    pub fn email(&mut self, name: &str, value: Option<&str>) -> Option<String> {
        let raw = self.required(name, value)?;
        if raw.contains('@') {
            Some(raw.to_string())
        } else {
            self.invalid(name, format!("{} must be a valid email address", name));
            None
        }
    }

    pub fn duration(&mut self, name: &str, value: Option<i64>) -> Option<i64> {
        let minutes = self.require_number(name, value)?;
        if is_valid_duration(minutes) {
            Some(minutes)
        } else {
            self.invalid(
                name,
                format!(
                    "{} must be between {} and {}",
                    name, MIN_DURATION_MINUTES, MAX_DURATION_MINUTES
                ),
            );
            None
        }
    }

    /// `end > start` and `start` strictly after `at`
    pub fn window(
        &mut self,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
        at: DateTime<Utc>,
    ) {
        if let (Some(start), Some(end)) = (start, end) {
            if end <= start {
                self.invalid("end_at", "end_at must be after start_at");
            }
        }
        if let Some(start) = start {
            if start <= at {
                self.invalid("start_at", "start_at must be in the future");
            }
        }
    }

    /// 400 if anything was recorded
    pub fn finish(self) -> ApiResult<()> {
        if !self.missing.is_empty() {
            let mut message = format!("Missing required fields: {}", self.missing.join(", "));
            if !self.messages.is_empty() {
                message = format!("{}; {}", message, self.messages.join("; "));
            }
            return Err(ApiError::Validation {
                message,
                missing_fields: self.missing,
                invalid_fields: self.invalid,
            });
        }
        if !self.invalid.is_empty() {
            return Err(ApiError::Validation {
                message: self.messages.join("; "),
                missing_fields: Vec::new(),
                invalid_fields: self.invalid,
            });
        }
        Ok(())
    }
}

/// Unwrap a value that [`FieldCheck::finish`] already vouched for
pub fn checked<T>(value: Option<T>, name: &str) -> ApiResult<T> {
    value.ok_or_else(|| ApiError::Internal(format!("{} missing after validation", name)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use serde::Deserialize;
    use studio_common::time::now;

    #[derive(Debug, Deserialize)]
    struct Body {
        name: Option<String>,
    }

    #[test]
    fn test_parse_json_empty_body() {
        let body: Body = parse_json(&Bytes::from_static(b"  ")).unwrap();
        assert!(body.name.is_none());
    }

    #[test]
    fn test_parse_json_malformed() {
        let err = parse_json::<Body>(&Bytes::from_static(b"{not json")).unwrap_err();
        assert!(matches!(err, ApiError::Validation { .. }));
    }

    #[test]
    fn test_missing_fields_collected() {
        let mut check = FieldCheck::new();
        check.required("client_email", None);
        check.required("client_first_name", Some("   "));
        check.required("client_last_name", Some("B"));

        match check.finish() {
            Err(ApiError::Validation {
                missing_fields,
                invalid_fields,
                message,
            }) => {
                assert_eq!(missing_fields, vec!["client_email", "client_first_name"]);
                assert!(invalid_fields.is_empty());
                assert!(message.contains("client_email"));
            }
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn test_window_rules() {
        let at = now();
        let start = at + Duration::days(1);

        let mut check = FieldCheck::new();
        check.window(Some(start), Some(start), at);
        match check.finish() {
            Err(ApiError::Validation { message, invalid_fields, .. }) => {
                assert_eq!(invalid_fields, vec!["end_at"]);
                assert!(message.contains("end_at must be after start_at"));
            }
            other => panic!("expected validation error, got {:?}", other),
        }

        let mut check = FieldCheck::new();
        check.window(Some(at - Duration::hours(1)), Some(at), at);
        assert!(check.finish().is_err());

        let mut check = FieldCheck::new();
        check.window(Some(start), Some(start + Duration::minutes(30)), at);
        assert!(check.finish().is_ok());
    }

    #[test]
    fn test_email_and_duration() {
        let mut check = FieldCheck::new();
        assert!(check.email("client_email", Some("no-at-sign")).is_none());
        assert!(check.duration("duration_minutes", Some(10)).is_none());
        assert_eq!(check.duration("duration_minutes", Some(30)), Some(30));

        match check.finish() {
            Err(ApiError::Validation { invalid_fields, .. }) => {
                assert_eq!(invalid_fields, vec!["client_email", "duration_minutes"]);
            }
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn test_bad_timestamp_is_invalid_not_missing() {
        let mut check = FieldCheck::new();
        assert!(check.timestamp("start_at", Some("next tuesday")).is_none());
        match check.finish() {
            Err(ApiError::Validation { missing_fields, invalid_fields, .. }) => {
                assert!(missing_fields.is_empty());
                assert_eq!(invalid_fields, vec!["start_at"]);
            }
            other => panic!("expected validation error, got {:?}", other),
        }
    }
}
