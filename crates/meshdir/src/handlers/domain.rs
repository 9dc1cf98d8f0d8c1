//! domain record endpoints: public read plus token-authed registration
//! and deletion.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, warn};

use meshdir_db::IdentityStore;
use meshdir_types::{DomainPublicKey, IdentityPatch, Label, UserId};

use super::{ApiError, ResultExt, ServiceAuthContext};
use crate::AppState;

/// status code for "user not found" on this endpoint. 280 is a
/// deliberate out-of-band code that clients already depend on.
fn user_not_found_status() -> StatusCode {
    StatusCode::from_u16(280).expect("280 is inside the valid status range")
}

/// GET /domain/{user_id} - read a user's domain record.
pub async fn get_domain(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Response, ApiError> {
    let user_id = UserId::new(user_id);
    let record = state.db.get_by_id(&user_id).await.map_internal()?;

    match record {
        Some(record) => Ok((
            StatusCode::OK,
            Json(json!({
                "domainName": record.domain_name,
                "serverDomain": record.server_domain,
                "publicKey": record.public_key,
            })),
        )
            .into_response()),
        None => Ok((
            user_not_found_status(),
            Json(json!({ "error": "User not found." })),
        )
            .into_response()),
    }
}

/// request body for domain registration.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterDomainRequest {
    /// the label to claim; lowercased at the boundary.
    pub domain_name: String,
    /// the key that will authenticate subsequent mutations.
    pub public_key: String,
    /// informational parent domain.
    #[serde(default)]
    pub server_domain: Option<String>,
}

/// response for a successful registration.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterDomainResponse {
    /// confirmation message.
    pub message: &'static str,
    /// the claimed label.
    pub domain_name: Label,
}

/// POST /domain - claim a label and bind a public key (token-authed).
pub async fn register_domain(
    State(state): State<AppState>,
    auth: ServiceAuthContext,
    Json(request): Json<RegisterDomainRequest>,
) -> Result<(StatusCode, Json<RegisterDomainResponse>), ApiError> {
    let label = Label::parse(&request.domain_name.to_lowercase())
        .map_err(|e| ApiError::bad_request(e.to_string()))?;
    if label.is_reserved() {
        return Err(ApiError::bad_request("Domain name is not available."));
    }

    let public_key = DomainPublicKey::from_text(&request.public_key)
        .map_err(|e| ApiError::bad_request(format!("invalid public key: {e}")))?;

    let patch = IdentityPatch {
        domain_name: Some(label.clone()),
        public_key: Some(public_key),
        server_domain: request.server_domain,
        ..Default::default()
    };

    match state.db.upsert(&auth.user_id, patch).await {
        Ok(_) => {}
        Err(meshdir_db::Error::DomainNotOwned(l)) => {
            return Err(ApiError::conflict(format!(
                "domain '{l}' is not owned by this user"
            )));
        }
        Err(e) => return Err(ApiError::internal(e)),
    }

    if let Err(e) = state.audit.assigned(&label, &auth.user_id).await {
        warn!(error = %e, "failed to append domain assignment audit line");
    }

    info!(user_id = %auth.user_id, domain = %label, "domain registered");

    Ok((
        StatusCode::OK,
        Json(RegisterDomainResponse {
            message: "Domain registered.",
            domain_name: label,
        }),
    ))
}

/// DELETE /domain - delete the record and everything hanging off it
/// (token-authed).
pub async fn delete_domain(
    State(state): State<AppState>,
    auth: ServiceAuthContext,
) -> Result<Json<serde_json::Value>, ApiError> {
    let record = state
        .db
        .get_by_id(&auth.user_id)
        .await
        .map_internal()?
        .ok_or_else(|| ApiError::not_found("User not found."))?;

    state
        .routes
        .delete_routes(&auth.user_id)
        .await
        .map_internal()?;
    state.activity.remove(&auth.user_id).await.map_internal()?;
    state.db.delete(&auth.user_id).await.map_internal()?;

    info!(
        user_id = %auth.user_id,
        domain = record.domain_name.as_ref().map(|l| l.as_str()).unwrap_or(""),
        "domain record deleted"
    );

    Ok(Json(json!({ "message": "Domain deleted." })))
}
