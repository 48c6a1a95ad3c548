//! Consultation lifecycle service
//!
//! Owns the status transition table: every status change goes through
//! [`LifecycleService::transition`], whichever endpoint asked for it.

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use sqlx::{Sqlite, SqlitePool, Transaction};
use studio_common::models::{
    AdminOverviewRow, Consultation, ConsultationDetails, ConsultationPackage, ConsultationStats,
    ConsultationStatus, PackageSnapshot, UpcomingConsultation,
};
use studio_common::schedule::{
    available_slots, compute_end_time, is_slot_available, is_valid_duration, BookedSlot,
    BusinessHours,
    MAX_DURATION_MINUTES, MIN_DURATION_MINUTES,
};
use studio_common::time::{now, start_of_month, start_of_week};
use studio_common::{Error, Result};
use tracing::info;
use uuid::Uuid;

use crate::db;
pub use crate::db::clients::ClientProfile;

/// Booking request after shape validation
#[derive(Debug, Clone)]
pub struct NewConsultation {
    pub client: ClientProfile,
    pub package_id: Option<String>,
    pub start_at: DateTime<Utc>,
    pub end_at: DateTime<Utc>,
    pub duration_minutes: i64,
    pub notes: Option<String>,
}

#[derive(Debug, Clone)]
pub struct RescheduleRequest {
    pub start_at: DateTime<Utc>,
    pub end_at: DateTime<Utc>,
    pub duration_minutes: i64,
    pub notes: Option<String>,
}

#[derive(Debug, Clone)]
pub struct CancelRequest {
    pub reason: String,
    pub notes: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewPackage {
    pub name: String,
    pub description: Option<String>,
    pub duration_minutes: i64,
    pub price_cents: i64,
    pub features: Vec<String>,
    pub is_active: bool,
}

/// Result of a reschedule, with the start it replaced
#[derive(Debug, Clone)]
pub struct Rescheduled {
    pub details: ConsultationDetails,
    pub previous_start: DateTime<Utc>,
}

/// Free bookable window on a given day
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct OpenSlot {
    pub start_at: DateTime<Utc>,
    pub end_at: DateTime<Utc>,
}

fn validate_window(start_at: DateTime<Utc>, end_at: DateTime<Utc>, duration_minutes: i64) -> Result<()> {
    if end_at <= start_at {
        return Err(Error::InvalidInput("end_at must be after start_at".to_string()));
    }
    if !is_valid_duration(duration_minutes) {
        return Err(Error::InvalidInput(format!(
            "duration_minutes must be between {} and {}",
            MIN_DURATION_MINUTES, MAX_DURATION_MINUTES
        )));
    }
    Ok(())
}

#[derive(Clone)]
pub struct LifecycleService {
    db: SqlitePool,
}

impl LifecycleService {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    /// Reject status changes the transition table does not allow
    pub fn transition(from: ConsultationStatus, to: ConsultationStatus) -> Result<()> {
        if from.can_transition_to(to) {
            Ok(())
        } else {
            Err(Error::IllegalTransition { from, to })
        }
    }

    // ========================================
    // Packages
    // ========================================

    pub async fn list_active_packages(&self) -> Result<Vec<ConsultationPackage>> {
        db::packages::list_active(&self.db).await
    }

    pub async fn create_package(&self, input: NewPackage) -> Result<ConsultationPackage> {
        let name = input.name.trim().to_string();
        if name.is_empty() {
            return Err(Error::InvalidInput("name is required".to_string()));
        }
        if !is_valid_duration(input.duration_minutes) {
            return Err(Error::InvalidInput(format!(
                "duration_minutes must be between {} and {}",
                MIN_DURATION_MINUTES, MAX_DURATION_MINUTES
            )));
        }
        if input.price_cents < 0 {
            return Err(Error::InvalidInput("price_cents must not be negative".to_string()));
        }

        let stamp = now();
        let package = ConsultationPackage {
            id: Uuid::new_v4().to_string(),
            name,
            description: db::non_blank(input.description.as_deref()),
            duration_minutes: input.duration_minutes,
            price_cents: input.price_cents,
            is_active: input.is_active,
            features: input
                .features
                .iter()
                .map(|f| f.trim())
                .filter(|f| !f.is_empty())
                .map(str::to_string)
                .collect(),
            created_at: stamp,
            updated_at: stamp,
        };

        db::packages::insert(&self.db, &package).await?;
        info!(package_id = %package.id, "Created consultation package {}", package.name);

        Ok(package)
    }

    // ========================================
    // Clients and consultations
    // ========================================

    /// Transaction holding the write lock from its first statement
    ///
    /// Overlap checks and the writes they guard must not interleave with
    /// another writer.
    async fn begin_write(&self) -> Result<Transaction<'static, Sqlite>> {
        Ok(self.db.begin_with("BEGIN IMMEDIATE").await?)
    }

    /// Insert or merge a client outside of a booking
    pub async fn get_or_create_client(&self, profile: &ClientProfile) -> Result<studio_common::models::Client> {
        let mut tx = self.begin_write().await?;
        let client = db::clients::upsert(&mut *tx, profile).await?;
        tx.commit().await?;
        Ok(client)
    }

    /// Book a consultation
    ///
    /// Client upsert, package lookup, overlap check and insert share one
    /// transaction; any failure leaves no trace of either write.
    pub async fn create_consultation(&self, input: NewConsultation) -> Result<ConsultationDetails> {
        validate_window(input.start_at, input.end_at, input.duration_minutes)?;

        let mut tx = self.begin_write().await?;

        let client = db::clients::upsert(&mut *tx, &input.client).await?;

        let package = match input.package_id.as_deref() {
            Some(package_id) => {
                let package = db::packages::find_by_id(&mut *tx, package_id)
                    .await?
                    .filter(|p| p.is_active)
                    .ok_or_else(|| Error::NotFound(format!("Package {}", package_id)))?;
                Some(PackageSnapshot::from(&package))
            }
            None => None,
        };

        let blocking =
            db::consultations::list_blocking(&mut *tx, input.start_at, input.end_at, None).await?;
        if !is_slot_available(input.start_at, input.end_at, &blocking) {
            return Err(Error::Conflict(
                "The requested time overlaps an existing consultation".to_string(),
            ));
        }

        let stamp = now();
        let consultation = Consultation {
            id: Uuid::new_v4().to_string(),
            client_id: client.id.clone(),
            package_id: package.as_ref().map(|p| p.id.clone()),
            start_at: input.start_at,
            end_at: input.end_at,
            duration_minutes: input.duration_minutes,
            status: ConsultationStatus::Scheduled,
            notes: db::non_blank(input.notes.as_deref()),
            admin_notes: None,
            meeting_link: None,
            cancellation_reason: None,
            package,
            created_at: stamp,
            updated_at: stamp,
        };

        db::consultations::insert(&mut *tx, &consultation).await?;
        tx.commit().await?;

        info!(
            consultation_id = %consultation.id,
            client_id = %client.id,
            "Booked consultation for {}",
            consultation.start_at
        );

        Ok(ConsultationDetails {
            consultation,
            client,
        })
    }

    pub async fn get_consultation(&self, id: &str) -> Result<ConsultationDetails> {
        let consultation = db::consultations::find_by_id(&self.db, id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("Consultation {}", id)))?;
        let client = db::clients::find_by_id(&self.db, &consultation.client_id)
            .await?
            .ok_or_else(|| {
                Error::Internal(format!("Consultation {} references a missing client", id))
            })?;

        Ok(ConsultationDetails {
            consultation,
            client,
        })
    }

    async fn current_status(&self, id: &str) -> Result<ConsultationStatus> {
        db::consultations::find_by_id(&self.db, id)
            .await?
            .map(|c| c.status)
            .ok_or_else(|| Error::NotFound(format!("Consultation {}", id)))
    }

    /// Explain why a conditional update touched no row
    async fn lost_update(&self, id: &str, expected: ConsultationStatus, to: ConsultationStatus) -> Error {
        match self.current_status(id).await {
            Ok(actual) if actual != expected => match Self::transition(actual, to) {
                Err(e) => e,
                Ok(()) => Error::Conflict(format!("Consultation {} was modified concurrently", id)),
            },
            Ok(_) => Error::Conflict(format!("Consultation {} was modified concurrently", id)),
            Err(e) => e,
        }
    }

    /// Move a consultation to a new window
    ///
    /// Status check, overlap check and update share one write transaction,
    /// so two reschedules into the same free slot cannot both succeed.
    pub async fn reschedule_consultation(&self, id: &str, request: RescheduleRequest) -> Result<Rescheduled> {
        validate_window(request.start_at, request.end_at, request.duration_minutes)?;

        let mut tx = self.begin_write().await?;

        let current = db::consultations::find_by_id(&mut *tx, id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("Consultation {}", id)))?;
        Self::transition(current.status, ConsultationStatus::Rescheduled)?;

        let blocking = db::consultations::list_blocking(
            &mut *tx,
            request.start_at,
            request.end_at,
            Some(id),
        )
        .await?;
        if !is_slot_available(request.start_at, request.end_at, &blocking) {
            return Err(Error::Conflict(
                "The requested time overlaps an existing consultation".to_string(),
            ));
        }

        let updated = db::consultations::update_schedule(
            &mut *tx,
            id,
            current.status,
            request.start_at,
            request.end_at,
            request.duration_minutes,
            db::non_blank(request.notes.as_deref()).as_deref(),
            now(),
        )
        .await?;
        if !updated {
            return Err(Error::Conflict(format!(
                "Consultation {} was modified concurrently",
                id
            )));
        }
        tx.commit().await?;

        info!(
            consultation_id = %id,
            "Rescheduled consultation from {} to {}",
            current.start_at,
            request.start_at
        );

        Ok(Rescheduled {
            details: self.get_consultation(id).await?,
            previous_start: current.start_at,
        })
    }

    pub async fn cancel_consultation(&self, id: &str, request: CancelRequest) -> Result<ConsultationDetails> {
        let current = self.current_status(id).await?;
        Self::transition(current, ConsultationStatus::Cancelled)?;

        let updated = db::consultations::update_cancellation(
            &self.db,
            id,
            current,
            request.reason.trim(),
            db::non_blank(request.notes.as_deref()).as_deref(),
            now(),
        )
        .await?;
        if !updated {
            return Err(self.lost_update(id, current, ConsultationStatus::Cancelled).await);
        }

        info!(consultation_id = %id, "Cancelled consultation");
        self.get_consultation(id).await
    }

    /// Confirm or complete a consultation
    ///
    /// Rescheduling and cancelling carry extra data and have their own
    /// operations.
    pub async fn update_status(
        &self,
        id: &str,
        next: ConsultationStatus,
        meeting_link: Option<&str>,
    ) -> Result<ConsultationDetails> {
        if !matches!(next, ConsultationStatus::Confirmed | ConsultationStatus::Completed) {
            return Err(Error::InvalidInput(format!(
                "status must be confirmed or completed, got {}",
                next
            )));
        }

        let current = self.current_status(id).await?;
        Self::transition(current, next)?;

        let meeting_link = db::non_blank(meeting_link);
        let updated = db::consultations::update_status(
            &self.db,
            id,
            current,
            next,
            meeting_link.as_deref(),
            now(),
        )
        .await?;
        if !updated {
            return Err(self.lost_update(id, current, next).await);
        }

        info!(consultation_id = %id, "Consultation status {} -> {}", current, next);
        self.get_consultation(id).await
    }

    /// Overwrite staff notes; blank text clears them
    pub async fn set_admin_notes(&self, id: &str, text: &str) -> Result<ConsultationDetails> {
        let notes = db::non_blank(Some(text));
        let updated =
            db::consultations::set_admin_notes(&self.db, id, notes.as_deref(), now()).await?;
        if !updated {
            return Err(Error::NotFound(format!("Consultation {}", id)));
        }
        self.get_consultation(id).await
    }

    pub async fn get_admin_notes(&self, id: &str) -> Result<Option<String>> {
        Ok(self.get_consultation(id).await?.consultation.admin_notes)
    }

    // ========================================
    // Read models
    // ========================================

    pub async fn admin_overview(&self) -> Result<Vec<AdminOverviewRow>> {
        db::consultations::list_overview(&self.db).await
    }

    /// Scheduled or confirmed consultations starting within `hours_ahead` of `at`
    pub async fn upcoming_consultations(
        &self,
        hours_ahead: i64,
        at: DateTime<Utc>,
    ) -> Result<Vec<UpcomingConsultation>> {
        db::consultations::list_upcoming(&self.db, at, at + Duration::hours(hours_ahead)).await
    }

    /// Dashboard counts, reduced in memory from every `(status, created_at)`
    pub async fn statistics(&self, at: DateTime<Utc>) -> Result<ConsultationStats> {
        let rows = db::consultations::list_status_created(&self.db).await?;
        let week_start = start_of_week(at);
        let month_start = start_of_month(at);

        let stats = rows
            .iter()
            .fold(ConsultationStats::default(), |mut stats, (status, created_at)| {
                stats.total += 1;
                match status {
                    ConsultationStatus::Scheduled => stats.scheduled += 1,
                    ConsultationStatus::Confirmed => stats.confirmed += 1,
                    ConsultationStatus::Completed => stats.completed += 1,
                    ConsultationStatus::Cancelled => stats.cancelled += 1,
                    ConsultationStatus::Rescheduled => stats.rescheduled += 1,
                }
                if *created_at >= week_start {
                    stats.this_week += 1;
                }
                if *created_at >= month_start {
                    stats.this_month += 1;
                }
                stats
            });

        Ok(stats)
    }

    /// Slot-occupying consultations overlapping the UTC day `date`
    pub async fn existing_for_day(&self, date: NaiveDate) -> Result<Vec<BookedSlot>> {
        let day_start = date.and_time(NaiveTime::default()).and_utc();
        db::consultations::list_blocking(&self.db, day_start, day_start + Duration::days(1), None)
            .await
    }

    /// Bookable windows on `date` that start after `at`
    pub async fn open_slots(
        &self,
        date: NaiveDate,
        duration_minutes: i64,
        hours: &BusinessHours,
        at: DateTime<Utc>,
    ) -> Result<Vec<OpenSlot>> {
        if !is_valid_duration(duration_minutes) {
            return Err(Error::InvalidInput(format!(
                "duration_minutes must be between {} and {}",
                MIN_DURATION_MINUTES, MAX_DURATION_MINUTES
            )));
        }

        // Local business hours may straddle a UTC midnight, so query by the
        // window itself rather than by UTC day
        let (open, close) = match hours.bounds_on(date) {
            Some(bounds) => bounds,
            None => return Ok(Vec::new()),
        };
        let existing = db::consultations::list_blocking(&self.db, open, close, None).await?;

        Ok(available_slots(date, duration_minutes, &existing, hours)
            .filter(|start| *start > at)
            .map(|start_at| OpenSlot {
                start_at,
                end_at: compute_end_time(start_at, duration_minutes),
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transition_table() {
        use ConsultationStatus::*;

        for from in [Scheduled, Confirmed, Rescheduled] {
            for to in [Confirmed, Rescheduled, Cancelled, Completed] {
                assert!(LifecycleService::transition(from, to).is_ok(), "{} -> {}", from, to);
            }
        }
        for from in [Cancelled, Completed] {
            for to in ConsultationStatus::ALL {
                assert!(matches!(
                    LifecycleService::transition(from, to),
                    Err(Error::IllegalTransition { .. })
                ));
            }
        }
    }

    #[test]
    fn test_validate_window() {
        let start = now() + Duration::days(1);
        assert!(validate_window(start, start + Duration::minutes(30), 30).is_ok());

        let err = validate_window(start, start, 30).unwrap_err();
        assert!(err.to_string().contains("end_at must be after start_at"));

        assert!(validate_window(start, start + Duration::minutes(10), 10).is_err());
        assert!(validate_window(start, start + Duration::hours(9), 540).is_err());
    }
}
