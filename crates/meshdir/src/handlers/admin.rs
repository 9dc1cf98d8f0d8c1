//! administrative endpoints.

use axum::{Json, extract::State};
use tracing::info;

use super::{ApiError, ResultExt, ServiceAuthContext};
use crate::AppState;
use crate::cleanup::{CleanupController, CleanupReport};

/// POST /admin/cleanup - run an on-demand cleanup pass (token-authed).
pub async fn admin_cleanup(
    State(state): State<AppState>,
    auth: ServiceAuthContext,
) -> Result<Json<CleanupReport>, ApiError> {
    info!(user_id = %auth.user_id, "on-demand cleanup requested");

    let controller = CleanupController::new(
        state.db.clone(),
        state.activity.clone(),
        state.audit.clone(),
        state.config.inactive_domain_days,
    );

    let report = controller.run().await.map_internal()?;
    Ok(Json(report))
}
