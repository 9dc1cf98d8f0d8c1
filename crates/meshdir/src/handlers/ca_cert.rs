//! root certificate endpoint handler.

use axum::{
    extract::State,
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};

use super::ApiError;
use crate::AppState;

/// GET /ca-cert - the root certificate as plain pem text.
pub async fn ca_certificate(State(state): State<AppState>) -> Result<Response, ApiError> {
    let ca = state
        .ca
        .as_ref()
        .ok_or_else(|| ApiError::unavailable("certificate authority is not initialized"))?;

    Ok((
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        ca.ca_certificate_pem().to_string(),
    )
        .into_response())
}
