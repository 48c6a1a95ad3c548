//! Shared fixtures for studio-booking integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{header, Request},
};
use chrono::{DateTime, Duration, DurationRound, Utc};
use http_body_util::BodyExt;
use serde_json::Value;
use sqlx::SqlitePool;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use studio_booking::mail::{MailError, MailReceipt, MailTransport, OutgoingEmail};
use studio_booking::services::lifecycle::{ClientProfile, NewConsultation};
use studio_booking::services::{LifecycleService, Notifier};
use studio_booking::AppState;
use studio_common::config::AppConfig;
use studio_common::models::{ConsultationDetails, ConsultationPackage, Session};
use studio_common::time::now;

pub const ADMIN_EMAIL: &str = "owner@studio.test";
pub const NOTIFY_EMAIL: &str = "alerts@studio.test";
pub const CRON_SECRET: &str = "test-cron-secret";

pub const ADMIN_TOKEN: &str = "admin-token";
pub const FLAGGED_TOKEN: &str = "flagged-token";
pub const CLIENT_TOKEN: &str = "client-token";

/// Transport that records every message and can be told to fail
#[derive(Default)]
pub struct RecordingTransport {
    sent: Mutex<Vec<OutgoingEmail>>,
    failing: AtomicBool,
}

impl RecordingTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn sent(&self) -> Vec<OutgoingEmail> {
        self.sent.lock().unwrap().clone()
    }

    pub fn sent_to(&self, address: &str) -> Vec<OutgoingEmail> {
        self.sent().into_iter().filter(|e| e.to == address).collect()
    }

    pub fn clear(&self) {
        self.sent.lock().unwrap().clear();
    }
}

#[async_trait]
impl MailTransport for RecordingTransport {
    fn name(&self) -> &'static str {
        "recording"
    }

    async fn send(&self, email: &OutgoingEmail) -> Result<MailReceipt, MailError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(MailError::Transport("relay unavailable".to_string()));
        }
        let mut sent = self.sent.lock().unwrap();
        sent.push(email.clone());
        Ok(MailReceipt {
            message_id: format!("<test-{}@studio.test>", sent.len()),
        })
    }
}

pub fn test_config() -> AppConfig {
    AppConfig {
        studio_name: "Test Studio".to_string(),
        site_url: "https://studio.test".to_string(),
        admin_emails: vec![ADMIN_EMAIL.to_string()],
        admin_notification_email: Some(NOTIFY_EMAIL.to_string()),
        cron_secret: Some(CRON_SECRET.to_string()),
        ..AppConfig::default()
    }
}

pub async fn setup_pool() -> SqlitePool {
    studio_common::db::init_memory_database()
        .await
        .expect("Should create in-memory database")
}

pub struct TestContext {
    pub pool: SqlitePool,
    pub mailer: Arc<RecordingTransport>,
    pub state: AppState,
}

impl TestContext {
    pub async fn new() -> Self {
        Self::with_config(test_config()).await
    }

    pub async fn with_config(config: AppConfig) -> Self {
        let pool = setup_pool().await;
        let mailer = RecordingTransport::new();
        let transport: Arc<dyn MailTransport> = mailer.clone();
        let state = AppState::new(pool.clone(), Arc::new(config), transport);

        seed_sessions(&pool).await;

        Self {
            pool,
            mailer,
            state,
        }
    }

    pub fn app(&self) -> axum::Router {
        studio_booking::build_router(self.state.clone())
    }

    pub fn lifecycle(&self) -> LifecycleService {
        self.state.lifecycle()
    }

    pub fn notifier(&self) -> Notifier {
        self.state.notifier()
    }
}

/// One allowlisted session, one flagged-admin session, one plain client
async fn seed_sessions(pool: &SqlitePool) {
    let expires_at = now() + Duration::hours(2);
    let sessions = [
        (ADMIN_TOKEN, "Owner@Studio.test", false),
        (FLAGGED_TOKEN, "staff@studio.test", true),
        (CLIENT_TOKEN, "client@example.com", false),
    ];
    for (token, email, is_admin) in sessions {
        studio_booking::db::sessions::insert(
            pool,
            &Session {
                token: token.to_string(),
                email: email.to_string(),
                is_admin,
                expires_at,
            },
        )
        .await
        .unwrap();
    }
}

/// Whole hour `hours` from now
pub fn hours_from_now(hours: i64) -> DateTime<Utc> {
    (now() + Duration::hours(hours))
        .duration_trunc(Duration::hours(1))
        .unwrap()
}

pub fn profile(email: &str, first_name: &str) -> ClientProfile {
    ClientProfile {
        email: email.to_string(),
        first_name: first_name.to_string(),
        last_name: "Client".to_string(),
        ..ClientProfile::default()
    }
}

pub fn booking(email: &str, start_at: DateTime<Utc>, minutes: i64) -> NewConsultation {
    NewConsultation {
        client: profile(email, "Ada"),
        package_id: None,
        start_at,
        end_at: start_at + Duration::minutes(minutes),
        duration_minutes: minutes,
        notes: Some("Mixing questions".to_string()),
    }
}

pub async fn book(ctx: &TestContext, email: &str, start_at: DateTime<Utc>) -> ConsultationDetails {
    ctx.lifecycle()
        .create_consultation(booking(email, start_at, 60))
        .await
        .unwrap()
}

pub async fn seed_package(pool: &SqlitePool, id: &str, name: &str, active: bool) -> ConsultationPackage {
    let stamp = now();
    let package = ConsultationPackage {
        id: id.to_string(),
        name: name.to_string(),
        description: Some("Detailed feedback on one track".to_string()),
        duration_minutes: 60,
        price_cents: 15000,
        is_active: active,
        features: vec!["Stem review".to_string(), "Written notes".to_string()],
        created_at: stamp,
        updated_at: stamp,
    };
    studio_booking::db::packages::insert(pool, &package)
        .await
        .unwrap();
    package
}

// ========================================
// HTTP helpers
// ========================================

pub fn request(method: &str, uri: &str, token: Option<&str>, body: Option<&Value>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    match body {
        Some(json) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

pub async fn read_json(response: axum::response::Response) -> Value {
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("Should read body")
        .to_bytes();
    serde_json::from_slice(&bytes).expect("Should parse JSON")
}

pub async fn read_text(response: axum::response::Response) -> String {
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("Should read body")
        .to_bytes();
    String::from_utf8(bytes.to_vec()).expect("Should be UTF-8")
}
