//! Consultation endpoints
//!
//! Every mutating handler validates shape, delegates to the lifecycle
//! service, then notifies. Notification results never change the
//! response status.

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::HashMap;
use studio_common::calendar::{google_calendar_url, ics_document, outlook_calendar_url, CalendarEvent};
use studio_common::models::{ConsultationDetails, ConsultationStatus, EmailType};
use studio_common::time::now;

use super::gate::AdminSession;
use super::validation::{checked, parse_json, FieldCheck};
use crate::db;
use crate::services::lifecycle::{CancelRequest, ClientProfile, NewConsultation, RescheduleRequest};
use crate::services::templates::AdminEvent;
use crate::{ApiResult, AppState};

// ========================================
// Request bodies
// ========================================

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct CreateConsultationBody {
    pub client_email: Option<String>,
    pub client_first_name: Option<String>,
    pub client_last_name: Option<String>,
    pub client_phone: Option<String>,
    pub client_company: Option<String>,
    pub project_details: Option<String>,
    pub budget_range: Option<String>,
    pub timeline: Option<String>,
    pub referral_source: Option<String>,
    pub package_id: Option<String>,
    pub start_at: Option<String>,
    pub end_at: Option<String>,
    pub duration_minutes: Option<i64>,
    pub notes: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct RescheduleBody {
    pub start_at: Option<String>,
    pub end_at: Option<String>,
    pub duration_minutes: Option<i64>,
    pub notes: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct CancelBody {
    pub reason: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct StatusBody {
    pub status: Option<String>,
    pub meeting_link: Option<String>,
}

/// `{success: true, consultation, message}`
#[derive(Debug, Serialize)]
pub struct ConsultationResponse {
    pub success: bool,
    pub consultation: ConsultationDetails,
    pub message: String,
}

impl ConsultationResponse {
    fn new(consultation: ConsultationDetails, message: &str) -> Json<Self> {
        Json(Self {
            success: true,
            consultation,
            message: message.to_string(),
        })
    }
}

#[derive(Debug, Serialize)]
pub struct CalendarLinks {
    pub google: String,
    pub outlook: String,
    pub ics: String,
}

fn calendar_links(state: &AppState, details: &ConsultationDetails) -> CalendarLinks {
    let event = CalendarEvent::for_consultation(&details.consultation, &state.config.studio_name);
    CalendarLinks {
        google: google_calendar_url(&event, &state.config.schedule.timezone),
        outlook: outlook_calendar_url(&event),
        ics: format!("/consultations/{}/calendar.ics", details.consultation.id),
    }
}

// ========================================
// Handlers
// ========================================

/// POST /consultations
///
/// Public booking endpoint. 201 on success, 409 when the slot is taken.
pub async fn create_consultation(
    State(state): State<AppState>,
    body: Bytes,
) -> ApiResult<(StatusCode, Json<ConsultationResponse>)> {
    let body: CreateConsultationBody = parse_json(&body)?;
    let at = now();

    let mut check = FieldCheck::new();
    let email = check.email("client_email", body.client_email.as_deref());
    let first_name = check.required("client_first_name", body.client_first_name.as_deref());
    let last_name = check.required("client_last_name", body.client_last_name.as_deref());
    let start_at = check.timestamp("start_at", body.start_at.as_deref());
    let end_at = check.timestamp("end_at", body.end_at.as_deref());
    let duration = check.duration("duration_minutes", body.duration_minutes);
    check.window(start_at, end_at, at);
    let first_name = first_name.map(str::to_string);
    let last_name = last_name.map(str::to_string);
    check.finish()?;

    let input = NewConsultation {
        client: ClientProfile {
            email: checked(email, "client_email")?,
            first_name: checked(first_name, "client_first_name")?,
            last_name: checked(last_name, "client_last_name")?,
            phone: body.client_phone,
            company: body.client_company,
            project_details: body.project_details,
            budget_range: body.budget_range,
            timeline: body.timeline,
            referral_source: body.referral_source,
        },
        package_id: body
            .package_id
            .map(|id| id.trim().to_string())
            .filter(|id| !id.is_empty()),
        start_at: checked(start_at, "start_at")?,
        end_at: checked(end_at, "end_at")?,
        duration_minutes: checked(duration, "duration_minutes")?,
        notes: body.notes,
    };

    let details = state.lifecycle().create_consultation(input).await?;

    let notifier = state.notifier();
    notifier
        .send_client_email(EmailType::Confirmation, &details, None)
        .await;
    notifier.notify_admin(AdminEvent::Booked, &details, None).await;

    Ok((
        StatusCode::CREATED,
        ConsultationResponse::new(details, "Consultation booked successfully"),
    ))
}

/// GET /consultations/availability?date=YYYY-MM-DD&duration_minutes=N
pub async fn availability(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> ApiResult<Json<serde_json::Value>> {
    let mut check = FieldCheck::new();

    let date = check.required("date", params.get("date").map(String::as_str)).and_then(|raw| {
        match NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
            Ok(date) => Some(date),
            Err(_) => {
                check.invalid("date", "date must be formatted YYYY-MM-DD");
                None
            }
        }
    });

    let duration = match params.get("duration_minutes") {
        Some(raw) => match raw.trim().parse::<i64>() {
            Ok(minutes) => check.duration("duration_minutes", Some(minutes)),
            Err(_) => {
                check.invalid("duration_minutes", "duration_minutes must be an integer");
                None
            }
        },
        None => check.require_number("duration_minutes", None),
    };
    check.finish()?;

    let date = checked(date, "date")?;
    let duration = checked(duration, "duration_minutes")?;
    let hours = state.config.schedule.business_hours();

    let slots = state
        .lifecycle()
        .open_slots(date, duration, &hours, now())
        .await?;

    Ok(Json(json!({
        "success": true,
        "date": date.format("%Y-%m-%d").to_string(),
        "duration_minutes": duration,
        "timezone": state.config.schedule.timezone,
        "slots": slots,
    })))
}

/// GET /consultations/:id
pub async fn get_consultation(
    _admin: AdminSession,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<serde_json::Value>> {
    let details = state.lifecycle().get_consultation(&id).await?;
    let emails = db::emails::list_for_consultation(&state.db, &id).await?;
    let calendar = calendar_links(&state, &details);

    Ok(Json(json!({
        "success": true,
        "consultation": details,
        "calendar": calendar,
        "emails": emails,
    })))
}

/// GET /consultations/:id/calendar.ics
pub async fn consultation_ics(
    _admin: AdminSession,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Response> {
    let details = state.lifecycle().get_consultation(&id).await?;
    let event = CalendarEvent::for_consultation(&details.consultation, &state.config.studio_name);
    let ics = ics_document(&event, state.config.site_domain(), now());

    Ok((
        [
            (header::CONTENT_TYPE, "text/calendar; charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"consultation-{}.ics\"", id),
            ),
        ],
        ics,
    )
        .into_response())
}

/// POST /consultations/:id/reschedule
pub async fn reschedule_consultation(
    _admin: AdminSession,
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Bytes,
) -> ApiResult<Json<ConsultationResponse>> {
    let body: RescheduleBody = parse_json(&body)?;

    let mut check = FieldCheck::new();
    let start_at = check.timestamp("start_at", body.start_at.as_deref());
    let end_at = check.timestamp("end_at", body.end_at.as_deref());
    let duration = check.duration("duration_minutes", body.duration_minutes);
    check.window(start_at, end_at, now());
    check.finish()?;

    let request = RescheduleRequest {
        start_at: checked(start_at, "start_at")?,
        end_at: checked(end_at, "end_at")?,
        duration_minutes: checked(duration, "duration_minutes")?,
        notes: body.notes,
    };

    let rescheduled = state.lifecycle().reschedule_consultation(&id, request).await?;
    let previous = Some(rescheduled.previous_start);

    let notifier = state.notifier();
    notifier
        .send_client_email(EmailType::Reschedule, &rescheduled.details, previous)
        .await;
    notifier
        .notify_admin(AdminEvent::Rescheduled, &rescheduled.details, previous)
        .await;

    Ok(ConsultationResponse::new(
        rescheduled.details,
        "Consultation rescheduled successfully",
    ))
}

/// POST /consultations/:id/cancel
pub async fn cancel_consultation(
    _admin: AdminSession,
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Bytes,
) -> ApiResult<Json<ConsultationResponse>> {
    let body: CancelBody = parse_json(&body)?;

    let mut check = FieldCheck::new();
    let reason = check
        .required("reason", body.reason.as_deref())
        .map(str::to_string);
    check.finish()?;

    let request = CancelRequest {
        reason: checked(reason, "reason")?,
        notes: body.notes,
    };

    let details = state.lifecycle().cancel_consultation(&id, request).await?;

    let notifier = state.notifier();
    notifier
        .send_client_email(EmailType::Cancellation, &details, None)
        .await;
    notifier
        .notify_admin(AdminEvent::Cancelled, &details, None)
        .await;

    Ok(ConsultationResponse::new(
        details,
        "Consultation cancelled successfully",
    ))
}

/// POST /consultations/:id/status
///
/// Confirm or complete. Completing sends the follow-up email.
pub async fn update_status(
    _admin: AdminSession,
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Bytes,
) -> ApiResult<Json<ConsultationResponse>> {
    let body: StatusBody = parse_json(&body)?;

    let mut check = FieldCheck::new();
    let status = check
        .required("status", body.status.as_deref())
        .and_then(|raw| match raw.parse::<ConsultationStatus>() {
            Ok(status @ (ConsultationStatus::Confirmed | ConsultationStatus::Completed)) => {
                Some(status)
            }
            _ => {
                check.invalid("status", "status must be confirmed or completed");
                None
            }
        });
    check.finish()?;
    let status = checked(status, "status")?;

    let details = state
        .lifecycle()
        .update_status(&id, status, body.meeting_link.as_deref())
        .await?;

    if status == ConsultationStatus::Completed {
        state
            .notifier()
            .send_client_email(EmailType::FollowUp, &details, None)
            .await;
    }

    let message = match status {
        ConsultationStatus::Completed => "Consultation marked as completed",
        _ => "Consultation confirmed",
    };
    Ok(ConsultationResponse::new(details, message))
}
