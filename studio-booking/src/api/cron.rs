//! Reminder trigger endpoints
//!
//! Called by an external scheduler with the cron secret. GET and POST
//! behave the same.

use axum::{extract::State, Json};
use studio_common::time::now;

use super::gate::CronAuthorized;
use crate::services::{run_reminders, ReminderSummary, ReminderWindow};
use crate::{ApiResult, AppState};

async fn trigger(state: &AppState, window: ReminderWindow) -> ApiResult<Json<ReminderSummary>> {
    let summary = run_reminders(
        &state.lifecycle(),
        &state.notifier(),
        &state.db,
        window,
        now(),
    )
    .await?;

    Ok(Json(summary))
}

/// GET|POST /cron/24h-reminders
pub async fn day_before_reminders(
    _cron: CronAuthorized,
    State(state): State<AppState>,
) -> ApiResult<Json<ReminderSummary>> {
    trigger(&state, ReminderWindow::DayBefore).await
}

/// GET|POST /cron/1h-reminders
pub async fn hour_before_reminders(
    _cron: CronAuthorized,
    State(state): State<AppState>,
) -> ApiResult<Json<ReminderSummary>> {
    trigger(&state, ReminderWindow::HourBefore).await
}
