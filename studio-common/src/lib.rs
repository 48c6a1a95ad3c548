//! # Studio Common Library
//!
//! Shared code for the studio consultation services including:
//! - Database schema, migrations and row models
//! - Configuration loading (CLI > ENV > TOML > defaults)
//! - Consultation scheduling helpers (overlap checks, slot enumeration)
//! - Calendar link and iCalendar generation
//! - Display formatting for dates, times and durations
//! - Admin and cron authorization checks

pub mod api;
pub mod calendar;
pub mod config;
#[cfg(feature = "sqlx")]
pub mod db;
pub mod error;
pub mod human_time;
pub mod models;
pub mod schedule;
pub mod time;

pub use error::{Error, Result};
pub use models::{ConsultationStatus, EmailType};
