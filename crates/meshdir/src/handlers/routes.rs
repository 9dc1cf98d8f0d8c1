//! route lease endpoints: public read, signature-authed write and
//! delete.

use axum::{
    Json,
    body::Bytes,
    extract::{Path, State},
    http::HeaderMap,
};
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use meshdir_db::IdentityStore;
use meshdir_types::{RouteInput, UserId};

use super::{ApiError, OptionExt, ResultExt, require_signature};
use crate::AppState;

/// request body for route registration.
///
/// `routes` stays optional here: an absent or empty list is a 400,
/// while bad values inside a route travel on to the validator, whose
/// failures are answered with the legacy 500.
#[derive(Debug, Deserialize)]
pub struct RegisterRoutesRequest {
    /// the batch of routes to register.
    #[serde(default)]
    pub routes: Option<Vec<RouteInput>>,
}

/// GET /routes/{user_id} - current live routes for a user.
pub async fn get_routes(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let user_id = UserId::new(user_id);
    let routes = state
        .routes
        .get_routes(&user_id)
        .await
        .map_internal()?
        .or_not_found("No routes found.")?;

    Ok(Json(json!({ "routes": routes })))
}

/// POST /routes/{user_id}/{signature} - replace the caller's leases.
///
/// the batch is grouped by source; each group wholly replaces that
/// source's prior lease. other sources' leases and ttls are untouched.
pub async fn register_routes(
    State(state): State<AppState>,
    Path((user_id, signature)): Path<(String, String)>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<serde_json::Value>, ApiError> {
    let user_id = UserId::new(user_id);
    let record = require_signature(&state, &headers, "routes", &user_id, &signature).await?;

    let request: RegisterRoutesRequest = serde_json::from_slice(&body)
        .map_err(|_| ApiError::bad_request("invalid JSON request body"))?;

    let inputs = match request.routes {
        Some(routes) if !routes.is_empty() => routes,
        _ => return Err(ApiError::bad_request("routes are required")),
    };

    // validation failures land here as 500, not 400; clients depend on
    // the current behavior
    let stored = state
        .routes
        .register(&user_id, inputs)
        .await
        .map_err(ApiError::internal)?;

    state.activity.update(&user_id).await.map_internal()?;
    state
        .db
        .touch_route_registration(&user_id)
        .await
        .map_internal()?;

    debug!(user_id = %user_id, routes = stored.len(), "routes registered");

    Ok(Json(json!({
        "message": "Routes registered.",
        "routes": stored,
        "domain": record.domain_name,
    })))
}

/// DELETE /routes/{user_id}/{signature} - drop every lease for the
/// caller.
pub async fn delete_routes(
    State(state): State<AppState>,
    Path((user_id, signature)): Path<(String, String)>,
    headers: HeaderMap,
) -> Result<Json<serde_json::Value>, ApiError> {
    let user_id = UserId::new(user_id);
    require_signature(&state, &headers, "routes-delete", &user_id, &signature).await?;

    state.routes.delete_routes(&user_id).await.map_internal()?;

    debug!(user_id = %user_id, "routes deleted");

    Ok(Json(json!({ "message": "Routes deleted." })))
}
