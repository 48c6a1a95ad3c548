//! Back-office listings

use axum::{extract::State, Json};
use serde_json::{json, Value};
use studio_common::time::now;

use super::gate::AdminSession;
use crate::{ApiResult, AppState};

/// GET /admin/consultations
///
/// Every consultation with client and package name, newest start first.
pub async fn admin_overview(
    _admin: AdminSession,
    State(state): State<AppState>,
) -> ApiResult<Json<Value>> {
    let consultations = state.lifecycle().admin_overview().await?;

    Ok(Json(json!({
        "success": true,
        "count": consultations.len(),
        "consultations": consultations,
    })))
}

/// GET /admin/consultations/stats
pub async fn admin_stats(
    _admin: AdminSession,
    State(state): State<AppState>,
) -> ApiResult<Json<Value>> {
    let stats = state.lifecycle().statistics(now()).await?;

    Ok(Json(json!({
        "success": true,
        "stats": stats,
    })))
}
