//! studio-booking library - consultation booking service
//!
//! HTTP surface, lifecycle service, notification composer and reminder
//! trigger for studio consultations.

use axum::Router;
use sqlx::SqlitePool;
use std::sync::Arc;
use studio_common::config::AppConfig;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub mod api;
pub mod db;
pub mod error;
pub mod mail;
pub mod services;

pub use error::{ApiError, ApiResult};

use mail::MailTransport;
use services::{LifecycleService, Notifier};

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool
    pub db: SqlitePool,
    /// Resolved configuration
    pub config: Arc<AppConfig>,
    /// Outbound mail transport (SMTP, log, or a test double)
    pub mailer: Arc<dyn MailTransport>,
}

impl AppState {
    pub fn new(db: SqlitePool, config: Arc<AppConfig>, mailer: Arc<dyn MailTransport>) -> Self {
        Self { db, config, mailer }
    }

    pub fn lifecycle(&self) -> LifecycleService {
        LifecycleService::new(self.db.clone())
    }

    pub fn notifier(&self) -> Notifier {
        Notifier::new(self.db.clone(), self.mailer.clone(), self.config.clone())
    }
}

/// Build application router
///
/// Admin and cron gates are extractors on the individual handlers, so
/// public and protected routes share one router.
pub fn build_router(state: AppState) -> Router {
    use axum::routing::{get, post};

    Router::new()
        .merge(api::health_routes())
        .route(
            "/consultation-packages",
            get(api::list_packages).post(api::create_package),
        )
        .route("/consultations", post(api::create_consultation))
        .route("/consultations/availability", get(api::availability))
        .route("/consultations/:id", get(api::get_consultation))
        .route("/consultations/:id/calendar.ics", get(api::consultation_ics))
        .route("/consultations/:id/reschedule", post(api::reschedule_consultation))
        .route("/consultations/:id/cancel", post(api::cancel_consultation))
        .route("/consultations/:id/status", post(api::update_status))
        .route(
            "/consultations/:id/notes",
            get(api::get_admin_notes).post(api::set_admin_notes),
        )
        .route("/admin/consultations", get(api::admin_overview))
        .route("/admin/consultations/stats", get(api::admin_stats))
        .route(
            "/cron/24h-reminders",
            get(api::day_before_reminders).post(api::day_before_reminders),
        )
        .route(
            "/cron/1h-reminders",
            get(api::hour_before_reminders).post(api::hour_before_reminders),
        )
        .layer(TraceLayer::new_for_http())
        // Booking form is posted from the storefront origin
        .layer(CorsLayer::permissive())
        .with_state(state)
}
