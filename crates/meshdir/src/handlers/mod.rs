//! http handlers for meshdir api endpoints.

mod admin;
mod available;
mod ca_cert;
mod cert;
mod domain;
mod error;
mod health;
mod heartbeat;
mod resolve;
mod routes;
mod status;
mod token_auth;
mod verify;

pub use admin::admin_cleanup;
pub use available::available;
pub use ca_cert::ca_certificate;
pub use cert::sign_certificate;
pub use domain::{delete_domain, get_domain, register_domain};
pub use error::{ApiError, OptionExt, ResultExt};
pub use health::health;
pub use heartbeat::heartbeat;
pub use resolve::resolve;
pub use routes::{delete_routes, get_routes, register_routes};
pub use status::status;
pub use token_auth::ServiceAuthContext;
pub use verify::verify;

use axum::http::HeaderMap;
use tracing::warn;

use meshdir_types::{IdentityRecord, UserId};

use crate::AppState;
use crate::auth::{self, AuthOutcome};

/// response message for a denied signature; bad-format and mismatch are
/// indistinguishable on the wire.
const AUTH_DENIED: &str = "authentication failed";

/// authenticate a path-embedded signature or fail the request.
///
/// unknown users map to 404, denials to 401 with one generic message.
/// the denial detail (bad format vs cryptographic mismatch) goes to the
/// log only.
pub(crate) async fn require_signature(
    state: &AppState,
    headers: &HeaderMap,
    endpoint: &'static str,
    user_id: &UserId,
    signature: &str,
) -> Result<IdentityRecord, ApiError> {
    let outcome = auth::authenticate(&state.db, user_id, signature)
        .await
        .map_internal()?;

    match outcome {
        AuthOutcome::Authenticated(record) => Ok(record),
        AuthOutcome::UnknownUser => Err(ApiError::not_found("User not found.")),
        AuthOutcome::BadFormat => {
            log_denied(headers, endpoint, user_id, "malformed signature");
            Err(ApiError::unauthorized(AUTH_DENIED))
        }
        AuthOutcome::Mismatch => {
            log_denied(headers, endpoint, user_id, "signature mismatch");
            Err(ApiError::unauthorized(AUTH_DENIED))
        }
    }
}

fn log_denied(headers: &HeaderMap, endpoint: &str, user_id: &UserId, reason: &str) {
    let client_addr = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown");
    let user_agent = headers
        .get(axum::http::header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown");

    warn!(
        client_addr,
        user_agent,
        endpoint,
        user_id = %user_id,
        reason,
        "authentication denied"
    );
}
