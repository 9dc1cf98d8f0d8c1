//! bearer token authentication for the administrative surface.
//!
//! two token shapes are accepted on `POST /domain`, `DELETE /domain`
//! and `POST /admin/cleanup`:
//!
//! - `"<service key>;<user id>"` - the preshared service key followed by
//!   the user the call acts for; compared in constant time
//! - anything else is handed to the configured identity-provider
//!   verifier (an external collaborator; absent in the default wiring)

use axum::{
    extract::FromRequestParts,
    http::{StatusCode, header::AUTHORIZATION, request::Parts},
};
use subtle::ConstantTimeEq;

use meshdir_types::UserId;

use crate::AppState;

/// how the caller authenticated.
#[derive(Debug, Clone)]
pub enum TokenMethod {
    /// preshared service key.
    ServiceKey,
    /// identity-provider token.
    IdentityToken,
}

/// context for token-authenticated admin requests.
#[derive(Debug, Clone)]
pub struct ServiceAuthContext {
    /// the user the call acts for.
    pub user_id: UserId,
    /// which path authenticated the caller.
    pub method: TokenMethod,
}

/// error type for token authentication failures.
#[derive(Debug)]
pub enum TokenAuthError {
    /// missing Authorization header.
    MissingHeader,
    /// invalid Authorization header format.
    InvalidHeader,
    /// token rejected.
    InvalidCredentials,
}

impl TokenAuthError {
    fn message(&self) -> &str {
        match self {
            Self::MissingHeader => "missing Authorization header",
            Self::InvalidHeader => "invalid Authorization header format",
            Self::InvalidCredentials => "invalid credentials",
        }
    }
}

impl axum::response::IntoResponse for TokenAuthError {
    fn into_response(self) -> axum::response::Response {
        (StatusCode::UNAUTHORIZED, self.message().to_string()).into_response()
    }
}

/// parse a Bearer token from the Authorization header.
fn parse_bearer_token(header_value: &str) -> Option<&str> {
    header_value.strip_prefix("Bearer ").map(str::trim)
}

impl FromRequestParts<AppState> for ServiceAuthContext {
    type Rejection = TokenAuthError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let auth_header = parts
            .headers
            .get(AUTHORIZATION)
            .ok_or(TokenAuthError::MissingHeader)?
            .to_str()
            .map_err(|_| TokenAuthError::InvalidHeader)?;

        let token = parse_bearer_token(auth_header).ok_or(TokenAuthError::InvalidHeader)?;

        // the service-key form carries the acting user after a semicolon
        if let Some((key, user_id)) = token.split_once(';') {
            let expected = state
                .config
                .service_api_key
                .as_deref()
                .filter(|k| !k.is_empty())
                .ok_or(TokenAuthError::InvalidCredentials)?;

            if key.as_bytes().ct_eq(expected.as_bytes()).into() {
                if user_id.is_empty() {
                    return Err(TokenAuthError::InvalidCredentials);
                }
                return Ok(ServiceAuthContext {
                    user_id: UserId::new(user_id),
                    method: TokenMethod::ServiceKey,
                });
            }
            return Err(TokenAuthError::InvalidCredentials);
        }

        // identity-provider token path
        if let Some(verifier) = &state.token_verifier {
            if let Some(user_id) = verifier.verify(token).await {
                return Ok(ServiceAuthContext {
                    user_id,
                    method: TokenMethod::IdentityToken,
                });
            }
        }

        Err(TokenAuthError::InvalidCredentials)
    }
}
