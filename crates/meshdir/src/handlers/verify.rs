//! signature verification endpoint handler.
//!
//! always answers 200; the body distinguishes a verified caller, a
//! failed verification and an unknown user. bad-format and mismatch
//! share the `{"valid": false}` body so the distinction never leaks.

use axum::{
    Json,
    extract::{Path, State},
};
use serde_json::json;

use super::{ApiError, ResultExt};
use crate::AppState;
use crate::auth::{self, AuthOutcome};
use meshdir_types::UserId;

/// GET /verify/{user_id}/{signature} - check a signature over the user
/// id.
pub async fn verify(
    State(state): State<AppState>,
    Path((user_id, signature)): Path<(String, String)>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let user_id = UserId::new(user_id);
    let outcome = auth::authenticate(&state.db, &user_id, &signature)
        .await
        .map_internal()?;

    let body = match outcome {
        AuthOutcome::Authenticated(record) => json!({
            "serverDomain": record.server_domain,
            "domainName": record.domain_name,
        }),
        AuthOutcome::BadFormat | AuthOutcome::Mismatch => json!({ "valid": false }),
        AuthOutcome::UnknownUser => json!({ "error": "unknown user" }),
    };

    Ok(Json(body))
}
