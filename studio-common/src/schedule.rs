//! Consultation time-slot helpers
//!
//! Pure functions over `DateTime<Utc>` and minute durations: end-time
//! computation, half-open overlap checks and lazy enumeration of free
//! slots inside business hours.

use chrono::{DateTime, Duration, FixedOffset, NaiveDate, NaiveTime, Offset, TimeZone, Utc};
use crate::models::{Consultation, ConsultationStatus};

/// Spacing between candidate slot starts
pub const SLOT_INTERVAL_MINUTES: i64 = 30;

/// Shortest bookable consultation
pub const MIN_DURATION_MINUTES: i64 = 15;

/// Longest bookable consultation
pub const MAX_DURATION_MINUTES: i64 = 480;

/// Whether `minutes` is a schedulable consultation length
pub fn is_valid_duration(minutes: i64) -> bool {
    (MIN_DURATION_MINUTES..=MAX_DURATION_MINUTES).contains(&minutes)
}

/// Time range already taken by an existing consultation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BookedSlot {
    pub start_at: DateTime<Utc>,
    pub end_at: DateTime<Utc>,
    pub status: ConsultationStatus,
}

impl From<&Consultation> for BookedSlot {
    fn from(c: &Consultation) -> Self {
        Self {
            start_at: c.start_at,
            end_at: c.end_at,
            status: c.status,
        }
    }
}

/// Compute the end of a consultation starting at `start`
///
/// # Examples
///
/// ```
/// use studio_common::schedule::compute_end_time;
/// use studio_common::time::parse_timestamp;
///
/// let start = parse_timestamp("start_at", "2030-03-01T10:00:00Z").unwrap();
/// let end = compute_end_time(start, 90);
/// assert_eq!((end - start).num_minutes(), 90);
/// ```
pub fn compute_end_time(start: DateTime<Utc>, duration_minutes: i64) -> DateTime<Utc> {
    start + Duration::minutes(duration_minutes)
}

/// Half-open interval overlap: `[a_start, a_end)` against `[b_start, b_end)`
pub fn overlaps(
    a_start: DateTime<Utc>,
    a_end: DateTime<Utc>,
    b_start: DateTime<Utc>,
    b_end: DateTime<Utc>,
) -> bool {
    a_start < b_end && a_end > b_start
}

/// Check a candidate window against existing consultations
///
/// Cancelled and completed consultations never block a slot.
pub fn is_slot_available(
    candidate_start: DateTime<Utc>,
    candidate_end: DateTime<Utc>,
    existing: &[BookedSlot],
) -> bool {
    !existing.iter().any(|booked| {
        booked.status.blocks_slot()
            && overlaps(candidate_start, candidate_end, booked.start_at, booked.end_at)
    })
}

/// Daily bookable window, expressed in local wall-clock time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BusinessHours {
    pub start: NaiveTime,
    pub end: NaiveTime,
    pub utc_offset: FixedOffset,
}

impl Default for BusinessHours {
    fn default() -> Self {
        Self {
            start: NaiveTime::from_hms_opt(10, 0, 0).unwrap_or_default(),
            end: NaiveTime::from_hms_opt(18, 0, 0).unwrap_or_default(),
            utc_offset: Utc.fix(),
        }
    }
}

impl BusinessHours {
    /// UTC bounds of the window on `date`, or `None` if the window is empty
    pub fn bounds_on(&self, date: NaiveDate) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
        let open = self
            .utc_offset
            .from_local_datetime(&date.and_time(self.start))
            .single()?
            .with_timezone(&Utc);
        let close = self
            .utc_offset
            .from_local_datetime(&date.and_time(self.end))
            .single()?
            .with_timezone(&Utc);
        (close > open).then_some((open, close))
    }
}

/// Lazy iterator over free slot starts on one day
///
/// Created by [`available_slots`]. Holds only borrowed input; calling
/// [`available_slots`] again restarts the enumeration from scratch.
#[derive(Debug, Clone)]
pub struct AvailableSlots<'a> {
    next_start: DateTime<Utc>,
    close: DateTime<Utc>,
    duration: Duration,
    existing: &'a [BookedSlot],
}

impl Iterator for AvailableSlots<'_> {
    type Item = DateTime<Utc>;

    fn next(&mut self) -> Option<Self::Item> {
        while self.next_start + self.duration <= self.close {
            let candidate = self.next_start;
            self.next_start += Duration::minutes(SLOT_INTERVAL_MINUTES);
            if is_slot_available(candidate, candidate + self.duration, self.existing) {
                return Some(candidate);
            }
        }
        None
    }
}

/// Enumerate bookable start times on `date`
///
/// Candidates are spaced [`SLOT_INTERVAL_MINUTES`] apart from the opening
/// time; a candidate is yielded only if the whole consultation ends by
/// closing time and does not overlap an active booking.
///
/// # Examples
///
/// ```
/// use chrono::NaiveDate;
/// use studio_common::schedule::{available_slots, BusinessHours};
///
/// let date = NaiveDate::from_ymd_opt(2030, 6, 3).unwrap();
/// let slots: Vec<_> = available_slots(date, 60, &[], &BusinessHours::default()).collect();
///
/// // 10:00 .. 17:00 every half hour
/// assert_eq!(slots.len(), 15);
/// ```
pub fn available_slots<'a>(
    date: NaiveDate,
    duration_minutes: i64,
    existing: &'a [BookedSlot],
    hours: &BusinessHours,
) -> AvailableSlots<'a> {
    let (open, close) = hours
        .bounds_on(date)
        .unwrap_or_else(|| {
            let midnight = Utc.from_utc_datetime(&date.and_time(NaiveTime::default()));
            (midnight, midnight)
        });

    AvailableSlots {
        next_start: open,
        close,
        duration: Duration::minutes(duration_minutes.max(1)),
        existing,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::parse_timestamp;

    fn ts(s: &str) -> DateTime<Utc> {
        parse_timestamp("test", s).unwrap()
    }

    fn booked(start: &str, end: &str, status: ConsultationStatus) -> BookedSlot {
        BookedSlot {
            start_at: ts(start),
            end_at: ts(end),
            status,
        }
    }

    #[test]
    fn test_compute_end_time_adds_duration() {
        let start = ts("2030-01-01T23:30:00Z");
        for d in [15, 30, 45, 60, 480] {
            assert_eq!((compute_end_time(start, d) - start).num_minutes(), d);
        }
        // Crosses midnight
        assert_eq!(compute_end_time(start, 60), ts("2030-01-02T00:30:00Z"));
    }

    #[test]
    fn test_empty_list_is_available() {
        assert!(is_slot_available(
            ts("2030-01-01T10:00:00Z"),
            ts("2030-01-01T11:00:00Z"),
            &[]
        ));
    }

    #[test]
    fn test_overlapping_windows_are_rejected() {
        let existing = [booked(
            "2030-01-01T10:00:00Z",
            "2030-01-01T11:00:00Z",
            ConsultationStatus::Scheduled,
        )];

        // Starts inside
        assert!(!is_slot_available(ts("2030-01-01T10:30:00Z"), ts("2030-01-01T11:30:00Z"), &existing));
        // Ends inside
        assert!(!is_slot_available(ts("2030-01-01T09:30:00Z"), ts("2030-01-01T10:15:00Z"), &existing));
        // Contains
        assert!(!is_slot_available(ts("2030-01-01T09:00:00Z"), ts("2030-01-01T12:00:00Z"), &existing));
        // Contained
        assert!(!is_slot_available(ts("2030-01-01T10:15:00Z"), ts("2030-01-01T10:45:00Z"), &existing));
    }

    #[test]
    fn test_adjacent_windows_are_available() {
        let existing = [booked(
            "2030-01-01T10:00:00Z",
            "2030-01-01T11:00:00Z",
            ConsultationStatus::Confirmed,
        )];

        assert!(is_slot_available(ts("2030-01-01T11:00:00Z"), ts("2030-01-01T12:00:00Z"), &existing));
        assert!(is_slot_available(ts("2030-01-01T09:00:00Z"), ts("2030-01-01T10:00:00Z"), &existing));
    }

    #[test]
    fn test_cancelled_and_completed_never_block() {
        for status in [ConsultationStatus::Cancelled, ConsultationStatus::Completed] {
            let existing = [booked("2030-01-01T10:00:00Z", "2030-01-01T11:00:00Z", status)];
            assert!(is_slot_available(
                ts("2030-01-01T10:00:00Z"),
                ts("2030-01-01T11:00:00Z"),
                &existing
            ));
        }
    }

    #[test]
    fn test_rescheduled_blocks() {
        let existing = [booked(
            "2030-01-01T10:00:00Z",
            "2030-01-01T11:00:00Z",
            ConsultationStatus::Rescheduled,
        )];
        assert!(!is_slot_available(ts("2030-01-01T10:00:00Z"), ts("2030-01-01T10:30:00Z"), &existing));
    }

    #[test]
    fn test_available_slots_fit_before_close() {
        let date = NaiveDate::from_ymd_opt(2030, 1, 1).unwrap();
        let hours = BusinessHours::default();
        let slots: Vec<_> = available_slots(date, 90, &[], &hours).collect();

        assert_eq!(slots.first().copied(), Some(ts("2030-01-01T10:00:00Z")));
        assert_eq!(slots.last().copied(), Some(ts("2030-01-01T16:30:00Z")));
        assert!(slots
            .iter()
            .all(|s| compute_end_time(*s, 90) <= ts("2030-01-01T18:00:00Z")));
    }

    #[test]
    fn test_available_slots_skip_booked_time() {
        let date = NaiveDate::from_ymd_opt(2030, 1, 1).unwrap();
        let existing = [
            booked("2030-01-01T11:00:00Z", "2030-01-01T12:00:00Z", ConsultationStatus::Scheduled),
            booked("2030-01-01T14:00:00Z", "2030-01-01T15:00:00Z", ConsultationStatus::Cancelled),
        ];
        let slots: Vec<_> =
            available_slots(date, 60, &existing, &BusinessHours::default()).collect();

        assert!(!slots.contains(&ts("2030-01-01T10:30:00Z")));
        assert!(!slots.contains(&ts("2030-01-01T11:00:00Z")));
        assert!(!slots.contains(&ts("2030-01-01T11:30:00Z")));
        assert!(slots.contains(&ts("2030-01-01T10:00:00Z")));
        assert!(slots.contains(&ts("2030-01-01T12:00:00Z")));
        // Cancelled booking frees its slot
        assert!(slots.contains(&ts("2030-01-01T14:00:00Z")));
    }

    #[test]
    fn test_available_slots_is_restartable() {
        let date = NaiveDate::from_ymd_opt(2030, 1, 1).unwrap();
        let hours = BusinessHours::default();
        let first: Vec<_> = available_slots(date, 30, &[], &hours).collect();
        let second: Vec<_> = available_slots(date, 30, &[], &hours).collect();
        assert_eq!(first, second);
        assert_eq!(first.len(), 16);
    }

    #[test]
    fn test_business_hours_respect_offset() {
        let hours = BusinessHours {
            start: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
            end: NaiveTime::from_hms_opt(10, 0, 0).unwrap(),
            utc_offset: FixedOffset::west_opt(5 * 3600).unwrap(),
        };
        let date = NaiveDate::from_ymd_opt(2030, 1, 1).unwrap();
        let slots: Vec<_> = available_slots(date, 30, &[], &hours).collect();
        assert_eq!(slots, vec![ts("2030-01-01T14:00:00Z"), ts("2030-01-01T14:30:00Z")]);
    }

    #[test]
    fn test_inverted_business_hours_yield_nothing() {
        let hours = BusinessHours {
            start: NaiveTime::from_hms_opt(18, 0, 0).unwrap(),
            end: NaiveTime::from_hms_opt(10, 0, 0).unwrap(),
            utc_offset: FixedOffset::east_opt(0).unwrap(),
        };
        let date = NaiveDate::from_ymd_opt(2030, 1, 1).unwrap();
        assert_eq!(available_slots(date, 30, &[], &hours).count(), 0);
    }

    #[test]
    fn test_duration_bounds() {
        assert!(!is_valid_duration(14));
        assert!(is_valid_duration(15));
        assert!(is_valid_duration(480));
        assert!(!is_valid_duration(481));
    }
}
