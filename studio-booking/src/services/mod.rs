//! Booking domain services
//!
//! Handlers stay thin: they validate shape, call into [`lifecycle`], then
//! hand the committed result to [`notifier`].

pub mod lifecycle;
pub mod notifier;
pub mod reminders;
pub mod templates;

pub use lifecycle::LifecycleService;
pub use notifier::{NotificationOutcome, Notifier};
pub use reminders::{run_reminders, ReminderSummary, ReminderWindow};
