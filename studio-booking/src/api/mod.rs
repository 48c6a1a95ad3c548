//! HTTP API handlers for studio-booking

pub mod admin;
pub mod consultations;
pub mod cron;
pub mod gate;
pub mod health;
pub mod notes;
pub mod packages;
pub mod validation;

pub use admin::{admin_overview, admin_stats};
pub use consultations::{
    availability, cancel_consultation, consultation_ics, create_consultation, get_consultation,
    reschedule_consultation, update_status,
};
pub use cron::{day_before_reminders, hour_before_reminders};
pub use gate::{AdminSession, CronAuthorized};
pub use health::health_routes;
pub use notes::{get_admin_notes, set_admin_notes};
pub use packages::{create_package, list_packages};
