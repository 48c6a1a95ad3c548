//! Staff notes on a consultation
//!
//! Only `admin_notes` is read or written here; the client's own `notes`
//! are left alone.

use axum::{
    body::Bytes,
    extract::{Path, State},
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};

use super::consultations::ConsultationResponse;
use super::gate::AdminSession;
use super::validation::{parse_json, FieldCheck};
use crate::{ApiResult, AppState};

/// Longest accepted admin note, in characters
pub const MAX_ADMIN_NOTES_CHARS: usize = 5000;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct NotesBody {
    pub admin_notes: Option<String>,
}

/// GET /consultations/:id/notes
pub async fn get_admin_notes(
    _admin: AdminSession,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Value>> {
    let admin_notes = state.lifecycle().get_admin_notes(&id).await?;

    Ok(Json(json!({
        "success": true,
        "consultation_id": id,
        "admin_notes": admin_notes,
    })))
}

/// POST /consultations/:id/notes
///
/// Overwrites; an empty string clears the notes.
pub async fn set_admin_notes(
    _admin: AdminSession,
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Bytes,
) -> ApiResult<Json<ConsultationResponse>> {
    let body: NotesBody = parse_json(&body)?;

    let mut check = FieldCheck::new();
    match &body.admin_notes {
        None => check.missing("admin_notes"),
        Some(text) if text.chars().count() > MAX_ADMIN_NOTES_CHARS => check.invalid(
            "admin_notes",
            format!("admin_notes must be at most {} characters", MAX_ADMIN_NOTES_CHARS),
        ),
        Some(_) => {}
    }
    check.finish()?;

    let text = body.admin_notes.unwrap_or_default();
    let details = state.lifecycle().set_admin_notes(&id, &text).await?;

    Ok(Json(ConsultationResponse {
        success: true,
        consultation: details,
        message: "Admin notes updated".to_string(),
    }))
}
