//! heartbeat endpoint handler.

use axum::{
    Json,
    extract::{Path, State},
    http::HeaderMap,
};
use serde_json::json;

use meshdir_db::IdentityStore;
use meshdir_types::UserId;

use super::{ApiError, ResultExt, require_signature};
use crate::AppState;

/// POST /heartbeat/{user_id}/{signature} - mark the caller as seen.
pub async fn heartbeat(
    State(state): State<AppState>,
    Path((user_id, signature)): Path<(String, String)>,
    headers: HeaderMap,
) -> Result<Json<serde_json::Value>, ApiError> {
    let user_id = UserId::new(user_id);
    require_signature(&state, &headers, "heartbeat", &user_id, &signature).await?;

    let last_seen_online = state.db.touch_heartbeat(&user_id).await.map_internal()?;

    Ok(Json(json!({
        "message": "Heartbeat received.",
        "lastSeenOnline": last_seen_online,
    })))
}
