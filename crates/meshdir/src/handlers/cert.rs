//! leaf certificate issuance endpoint handler.

use axum::{
    Json,
    extract::{Path, State},
    http::HeaderMap,
};
use serde::Deserialize;
use serde_json::json;
use tracing::info;

use meshdir_ca::CaError;
use meshdir_types::UserId;

use super::{ApiError, require_signature};
use crate::AppState;

/// request body for certificate signing.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignCertificateRequest {
    /// pem-encoded pkcs#10 csr.
    #[serde(default)]
    pub csr: Option<String>,
    /// caller's public ip, added to the san list when present.
    #[serde(default)]
    pub public_ip: Option<String>,
}

/// POST /cert/{user_id}/{signature} - sign a short-lived leaf
/// certificate.
///
/// the csr's subject common name must equal the authenticated user id.
/// the csr's embedded key is deliberately not compared to the stored
/// ed25519 key: authentication and tls use separate key systems.
pub async fn sign_certificate(
    State(state): State<AppState>,
    Path((user_id, signature)): Path<(String, String)>,
    headers: HeaderMap,
    body: axum::body::Bytes,
) -> Result<Json<serde_json::Value>, ApiError> {
    let user_id = UserId::new(user_id);
    require_signature(&state, &headers, "cert", &user_id, &signature).await?;

    let request: SignCertificateRequest = serde_json::from_slice(&body)
        .map_err(|_| ApiError::bad_request("invalid JSON request body"))?;

    let csr = request
        .csr
        .filter(|c| !c.is_empty())
        .ok_or_else(|| ApiError::bad_request("csr is required"))?;

    let ca = state
        .ca
        .as_ref()
        .ok_or_else(|| ApiError::unavailable("certificate authority is not initialized"))?;

    let server_domain = Some(state.config.server_domain.as_str()).filter(|d| !d.is_empty());

    let issued = ca
        .sign_csr(&csr, user_id.as_str(), server_domain, request.public_ip.as_deref())
        .map_err(|e| {
            if e.is_client_error() {
                ApiError::bad_request(e.to_string())
            } else if matches!(e, CaError::Uninitialized) {
                ApiError::unavailable(e.to_string())
            } else {
                ApiError::internal(e)
            }
        })?;

    info!(
        user_id = %user_id,
        expires_at = %issued.not_after,
        "leaf certificate issued"
    );

    Ok(Json(json!({
        "certificate": issued.certificate_pem,
        "expiresAt": issued.not_after,
        "caCertificate": ca.ca_certificate_pem(),
    })))
}
