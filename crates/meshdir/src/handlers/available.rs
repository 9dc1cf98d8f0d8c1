//! domain availability endpoint handler.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;

use meshdir_db::IdentityStore;
use meshdir_types::Label;

use super::{ApiError, ResultExt};
use crate::AppState;

/// response for an availability check.
#[derive(Debug, Serialize)]
pub struct AvailableResponse {
    /// whether the label can be claimed.
    pub available: bool,
    /// human-readable verdict.
    pub message: &'static str,
}

/// status code for "not available". clients treat 209 as an
/// availability sentinel; it is non-standard and deliberate.
fn unavailable_status() -> StatusCode {
    StatusCode::from_u16(209).expect("209 is inside the valid status range")
}

/// GET /available/{label} - check whether a label can be claimed.
///
/// order: syntax, reserved set, ownership. 200 when available, 209
/// otherwise.
pub async fn available(
    State(state): State<AppState>,
    Path(label): Path<String>,
) -> Result<Response, ApiError> {
    let label = label.to_lowercase();

    let available = match Label::parse(&label) {
        Err(_) => false,
        Ok(label) if label.is_reserved() => false,
        Ok(label) => state
            .db
            .get_by_domain(label.as_str())
            .await
            .map_internal()?
            .is_none(),
    };

    let (status, message) = if available {
        (StatusCode::OK, "Domain name is available.")
    } else {
        (unavailable_status(), "Domain name is not available.")
    };

    Ok((status, Json(AvailableResponse { available, message })).into_response())
}
