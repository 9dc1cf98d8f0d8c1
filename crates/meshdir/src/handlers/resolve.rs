//! label resolution endpoint handler.
//!
//! the read path edge proxies hit before forwarding traffic: label in,
//! current route list out.

use axum::{
    Json,
    extract::{Path, State},
};
use chrono::{DateTime, Utc};
use serde::Serialize;

use meshdir_db::IdentityStore;
use meshdir_types::{Label, Route, UserId};

use super::{ApiError, OptionExt, ResultExt};
use crate::AppState;

/// response for a label resolution.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolveResponse {
    /// the owning user.
    pub user_id: UserId,
    /// the resolved label.
    pub domain_name: Option<Label>,
    /// informational parent domain.
    pub server_domain: Option<String>,
    /// current live routes; may be empty.
    pub routes: Vec<Route>,
    /// minimum remaining lease ttl in seconds; `-2` when no lease.
    pub routes_ttl: i64,
    /// the owner's last heartbeat.
    pub last_seen_online: Option<DateTime<Utc>>,
}

/// GET /resolve/v2/{label} - resolve a label to its live routes.
pub async fn resolve(
    State(state): State<AppState>,
    Path(label): Path<String>,
) -> Result<Json<ResolveResponse>, ApiError> {
    let label = label.to_lowercase();
    let (user_id, record) = state
        .db
        .get_by_domain(&label)
        .await
        .map_internal()?
        .or_not_found("Domain not found.")?;

    let routes = state
        .routes
        .get_routes(&user_id)
        .await
        .map_internal()?
        .unwrap_or_default();
    let routes_ttl = state.routes.get_routes_ttl(&user_id).await.map_internal()?;

    Ok(Json(ResolveResponse {
        user_id,
        domain_name: record.domain_name,
        server_domain: record.server_domain,
        routes,
        routes_ttl,
        last_seen_online: record.last_seen_online,
    }))
}
