//! online status endpoint handler.

use axum::{
    Json,
    extract::{Path, State},
};
use chrono::{DateTime, Utc};
use serde::Serialize;

use meshdir_db::IdentityStore;
use meshdir_types::UserId;

use super::{ApiError, OptionExt, ResultExt};
use crate::AppState;

/// response for a status read.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    /// whether the last heartbeat is within the online threshold.
    pub online: bool,
    /// the last heartbeat, if any.
    pub last_seen_online: Option<DateTime<Utc>>,
}

/// GET /status/{user_id} - derived online status.
///
/// a user is online iff their last heartbeat is within the configured
/// threshold (default 120 s); a missing timestamp means offline.
pub async fn status(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<StatusResponse>, ApiError> {
    let user_id = UserId::new(user_id);
    let record = state
        .db
        .get_by_id(&user_id)
        .await
        .map_internal()?
        .or_not_found("User not found.")?;

    Ok(Json(StatusResponse {
        online: record.is_online(state.config.online_threshold_secs),
        last_seen_online: record.last_seen_online,
    }))
}
