//! health check endpoint handler

use std::time::Duration;

use axum::{
    Json,
    extract::State,
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::Serialize;
use tokio::time::timeout;

use meshdir_db::IdentityStore;

use crate::AppState;

/// health check response body
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    status: &'static str,
}

/// content-Type for health check responses per RFC 8040
const HEALTH_CONTENT_TYPE: &str = "application/health+json; charset=utf-8";

/// timeout for each store ping
const PING_TIMEOUT: Duration = Duration::from_secs(1);

/// GET /health - health check endpoint
///
/// pings the identity database and the ephemeral store, each with a
/// 1-second timeout. returns 200 `{"status": "pass"}` when both answer,
/// 500 `{"status": "fail"}` otherwise.
pub async fn health(State(state): State<AppState>) -> Response {
    let db_ok = matches!(timeout(PING_TIMEOUT, state.db.ping()).await, Ok(Ok(())));
    let store_ok = matches!(timeout(PING_TIMEOUT, state.ephemeral.ping()).await, Ok(Ok(())));

    let (status_code, health_status) = if db_ok && store_ok {
        (StatusCode::OK, "pass")
    } else {
        (StatusCode::INTERNAL_SERVER_ERROR, "fail")
    };

    (
        status_code,
        [(header::CONTENT_TYPE, HEALTH_CONTENT_TYPE)],
        Json(HealthResponse {
            status: health_status,
        }),
    )
        .into_response()
}
