//! Consultation domain models shared by the studio services
//!
//! Row types mirror the SQLite schema created by [`crate::db::init`].
//! Timestamps are `DateTime<Utc>` in memory and fixed-width RFC 3339
//! text in the database (see [`crate::time::to_db_timestamp`]).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ========================================
// Consultation Status
// ========================================

/// Lifecycle status of a consultation
///
/// `Cancelled` and `Completed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConsultationStatus {
    Scheduled,
    Confirmed,
    Completed,
    Cancelled,
    Rescheduled,
}

impl ConsultationStatus {
    pub const ALL: [ConsultationStatus; 5] = [
        ConsultationStatus::Scheduled,
        ConsultationStatus::Confirmed,
        ConsultationStatus::Completed,
        ConsultationStatus::Cancelled,
        ConsultationStatus::Rescheduled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ConsultationStatus::Scheduled => "scheduled",
            ConsultationStatus::Confirmed => "confirmed",
            ConsultationStatus::Completed => "completed",
            ConsultationStatus::Cancelled => "cancelled",
            ConsultationStatus::Rescheduled => "rescheduled",
        }
    }

    /// No further lifecycle transition is permitted out of a terminal status
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ConsultationStatus::Cancelled | ConsultationStatus::Completed
        )
    }

    /// Whether a consultation in this status occupies its time slot
    pub fn blocks_slot(&self) -> bool {
        !self.is_terminal()
    }

    /// Statuses reachable from this one
    pub fn allowed_transitions(&self) -> &'static [ConsultationStatus] {
        match self {
            ConsultationStatus::Scheduled
            | ConsultationStatus::Confirmed
            | ConsultationStatus::Rescheduled => &[
                ConsultationStatus::Confirmed,
                ConsultationStatus::Rescheduled,
                ConsultationStatus::Cancelled,
                ConsultationStatus::Completed,
            ],
            ConsultationStatus::Cancelled | ConsultationStatus::Completed => &[],
        }
    }

    pub fn can_transition_to(&self, next: ConsultationStatus) -> bool {
        self.allowed_transitions().contains(&next)
    }
}

impl fmt::Display for ConsultationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConsultationStatus {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "scheduled" => Ok(ConsultationStatus::Scheduled),
            "confirmed" => Ok(ConsultationStatus::Confirmed),
            "completed" => Ok(ConsultationStatus::Completed),
            "cancelled" => Ok(ConsultationStatus::Cancelled),
            "rescheduled" => Ok(ConsultationStatus::Rescheduled),
            other => Err(crate::Error::InvalidInput(format!(
                "Unknown consultation status: {}",
                other
            ))),
        }
    }
}

// ========================================
// Email Types
// ========================================

/// Kind of client-facing email recorded in the audit log
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EmailType {
    #[serde(rename = "confirmation")]
    Confirmation,
    #[serde(rename = "reminder_24h")]
    Reminder24h,
    #[serde(rename = "reminder_1h")]
    Reminder1h,
    #[serde(rename = "reschedule")]
    Reschedule,
    #[serde(rename = "cancellation")]
    Cancellation,
    #[serde(rename = "follow_up")]
    FollowUp,
}

impl EmailType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EmailType::Confirmation => "confirmation",
            EmailType::Reminder24h => "reminder_24h",
            EmailType::Reminder1h => "reminder_1h",
            EmailType::Reschedule => "reschedule",
            EmailType::Cancellation => "cancellation",
            EmailType::FollowUp => "follow_up",
        }
    }

    pub fn is_reminder(&self) -> bool {
        matches!(self, EmailType::Reminder24h | EmailType::Reminder1h)
    }
}

impl fmt::Display for EmailType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EmailType {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "confirmation" => Ok(EmailType::Confirmation),
            "reminder_24h" => Ok(EmailType::Reminder24h),
            "reminder_1h" => Ok(EmailType::Reminder1h),
            "reschedule" => Ok(EmailType::Reschedule),
            "cancellation" => Ok(EmailType::Cancellation),
            "follow_up" => Ok(EmailType::FollowUp),
            other => Err(crate::Error::InvalidInput(format!(
                "Unknown email type: {}",
                other
            ))),
        }
    }
}

/// Outcome recorded for one email attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryStatus {
    Sent,
    Failed,
}

impl DeliveryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeliveryStatus::Sent => "sent",
            DeliveryStatus::Failed => "failed",
        }
    }
}

impl FromStr for DeliveryStatus {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sent" => Ok(DeliveryStatus::Sent),
            "failed" => Ok(DeliveryStatus::Failed),
            other => Err(crate::Error::InvalidInput(format!(
                "Unknown delivery status: {}",
                other
            ))),
        }
    }
}

// ========================================
// Rows
// ========================================

/// Contact record, one per email address
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Client {
    pub id: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: Option<String>,
    pub company: Option<String>,
    pub project_details: Option<String>,
    pub budget_range: Option<String>,
    pub timeline: Option<String>,
    pub referral_source: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Client {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
            .trim()
            .to_string()
    }
}

/// Catalog entry for a priced, fixed-duration consultation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsultationPackage {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub duration_minutes: i64,
    pub price_cents: i64,
    pub is_active: bool,
    pub features: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Package details copied onto a consultation when it is booked
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PackageSnapshot {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub duration_minutes: i64,
    pub price_cents: i64,
    pub features: Vec<String>,
}

impl From<&ConsultationPackage> for PackageSnapshot {
    fn from(package: &ConsultationPackage) -> Self {
        Self {
            id: package.id.clone(),
            name: package.name.clone(),
            description: package.description.clone(),
            duration_minutes: package.duration_minutes,
            price_cents: package.price_cents,
            features: package.features.clone(),
        }
    }
}

/// A scheduled meeting with a client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Consultation {
    pub id: String,
    pub client_id: String,
    pub package_id: Option<String>,
    pub start_at: DateTime<Utc>,
    pub end_at: DateTime<Utc>,
    pub duration_minutes: i64,
    pub status: ConsultationStatus,
    pub notes: Option<String>,
    pub admin_notes: Option<String>,
    pub meeting_link: Option<String>,
    pub cancellation_reason: Option<String>,
    pub package: Option<PackageSnapshot>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Consultation together with its client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsultationDetails {
    #[serde(flatten)]
    pub consultation: Consultation,
    pub client: Client,
}

/// Audit record of one notification attempt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsultationEmail {
    pub id: String,
    pub consultation_id: String,
    pub email_type: EmailType,
    pub recipient: String,
    pub subject: String,
    pub sent_at: DateTime<Utc>,
    pub status: DeliveryStatus,
    pub error_message: Option<String>,
    pub message_id: Option<String>,
    pub scheduled_start_at: Option<DateTime<Utc>>,
}

/// Flattened back-office listing row (`admin_consultation_overview` view)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdminOverviewRow {
    pub id: String,
    pub start_at: DateTime<Utc>,
    pub end_at: DateTime<Utc>,
    pub duration_minutes: i64,
    pub status: ConsultationStatus,
    pub notes: Option<String>,
    pub admin_notes: Option<String>,
    pub meeting_link: Option<String>,
    pub cancellation_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub client_id: String,
    pub client_email: String,
    pub client_first_name: String,
    pub client_last_name: String,
    pub client_phone: Option<String>,
    pub client_company: Option<String>,
    pub package_id: Option<String>,
    pub package_name: Option<String>,
}

/// Minimal summary consumed by the reminder trigger
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpcomingConsultation {
    pub id: String,
    pub client_email: String,
    pub client_first_name: String,
    pub client_last_name: String,
    pub start_at: DateTime<Utc>,
    pub package_name: Option<String>,
    pub meeting_link: Option<String>,
}

/// Aggregate counts for the admin dashboard
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsultationStats {
    pub total: i64,
    pub scheduled: i64,
    pub confirmed: i64,
    pub completed: i64,
    pub cancelled: i64,
    pub rescheduled: i64,
    pub this_week: i64,
    pub this_month: i64,
}

/// Session resolved from the login flow's session store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub token: String,
    pub email: String,
    pub is_admin: bool,
    pub expires_at: DateTime<Utc>,
}
