//! Consultation package catalog endpoints

use axum::{body::Bytes, extract::State, http::StatusCode, Json};
use serde::Deserialize;
use serde_json::{json, Value};

use super::gate::AdminSession;
use super::validation::{checked, parse_json, FieldCheck};
use crate::services::lifecycle::NewPackage;
use crate::{ApiResult, AppState};

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct CreatePackageBody {
    pub name: Option<String>,
    pub description: Option<String>,
    pub duration_minutes: Option<i64>,
    pub price_cents: Option<i64>,
    pub features: Vec<String>,
    pub is_active: Option<bool>,
}

/// GET /consultation-packages
///
/// Active packages, cheapest first.
pub async fn list_packages(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    let packages = state.lifecycle().list_active_packages().await?;

    Ok(Json(json!({
        "success": true,
        "packages": packages,
    })))
}

/// POST /consultation-packages
pub async fn create_package(
    _admin: AdminSession,
    State(state): State<AppState>,
    body: Bytes,
) -> ApiResult<(StatusCode, Json<Value>)> {
    let body: CreatePackageBody = parse_json(&body)?;

    let mut check = FieldCheck::new();
    let name = check.required("name", body.name.as_deref()).map(str::to_string);
    let duration = check.duration("duration_minutes", body.duration_minutes);
    let price = check.require_number("price_cents", body.price_cents);
    if matches!(price, Some(cents) if cents < 0) {
        check.invalid("price_cents", "price_cents must not be negative");
    }
    check.finish()?;

    let package = state
        .lifecycle()
        .create_package(NewPackage {
            name: checked(name, "name")?,
            description: body.description,
            duration_minutes: checked(duration, "duration_minutes")?,
            price_cents: checked(price, "price_cents")?,
            features: body.features,
            is_active: body.is_active.unwrap_or(true),
        })
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "package": package,
            "message": "Package created successfully",
        })),
    ))
}
