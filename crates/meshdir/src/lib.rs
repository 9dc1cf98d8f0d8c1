//! meshdir library - HTTP handlers and application setup.
//!
//! meshdir is the control plane of a mesh routing network: it maps
//! subdomain labels to the live route leases advertised by their
//! owners, reclaims labels whose owners have gone silent, and runs a
//! private certificate authority issuing short-lived tls certificates
//! for the advertised endpoints.

pub mod activity;
pub mod audit;
pub mod auth;
pub mod cleanup;
pub mod cli;
pub mod handlers;
pub mod route_store;

use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    Router,
    routing::{get, post},
};

use meshdir_ca::CertificateAuthority;
use meshdir_db::{EphemeralStore, MeshdirDb};
use meshdir_types::{Config, UserId};

use activity::ActivityTracker;
use audit::AuditLog;
use route_store::RouteStore;

/// verifier for identity-provider bearer tokens.
///
/// the identity provider is an external collaborator; deployments plug
/// in an implementation, tests and the default wiring run without one
/// (only the preshared service key is accepted then).
#[async_trait]
pub trait IdentityTokenVerifier: Send + Sync {
    /// resolve a bearer token to the user it belongs to, or `None`.
    async fn verify(&self, token: &str) -> Option<UserId>;
}

/// application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    /// identity registry.
    pub db: MeshdirDb,
    /// ephemeral store backing leases and activity.
    pub ephemeral: Arc<dyn EphemeralStore>,
    /// route lease store; owns the in-process known-sources set.
    pub routes: RouteStore,
    /// activity tracker facade.
    pub activity: ActivityTracker,
    /// certificate authority; `None` until bootstrapped.
    pub ca: Option<Arc<CertificateAuthority>>,
    /// append-only domain event log.
    pub audit: AuditLog,
    /// optional identity-provider token verifier.
    pub token_verifier: Option<Arc<dyn IdentityTokenVerifier>>,
    /// server configuration.
    pub config: Config,
}

/// create the axum application with all routes.
pub async fn create_app(
    db: MeshdirDb,
    ephemeral: Arc<dyn EphemeralStore>,
    ca: Option<Arc<CertificateAuthority>>,
    token_verifier: Option<Arc<dyn IdentityTokenVerifier>>,
    config: Config,
) -> Router {
    let routes = RouteStore::new(ephemeral.clone(), config.routes_ttl_secs);
    let activity = ActivityTracker::new(ephemeral.clone());
    let audit = AuditLog::new(config.domain_log_path.clone());

    let state = AppState {
        db,
        ephemeral,
        routes,
        activity,
        ca,
        audit,
        token_verifier,
        config,
    };

    Router::new()
        .route("/health", get(handlers::health))
        .route("/available/{label}", get(handlers::available))
        .route(
            "/domain",
            post(handlers::register_domain).delete(handlers::delete_domain),
        )
        .route("/domain/{user_id}", get(handlers::get_domain))
        .route("/verify/{user_id}/{signature}", get(handlers::verify))
        .route("/status/{user_id}", get(handlers::status))
        .route("/resolve/v2/{label}", get(handlers::resolve))
        .route("/routes/{user_id}", get(handlers::get_routes))
        .route(
            "/routes/{user_id}/{signature}",
            post(handlers::register_routes).delete(handlers::delete_routes),
        )
        .route("/heartbeat/{user_id}/{signature}", post(handlers::heartbeat))
        .route("/cert/{user_id}/{signature}", post(handlers::sign_certificate))
        .route("/ca-cert", get(handlers::ca_certificate))
        .route("/admin/cleanup", post(handlers::admin_cleanup))
        .with_state(state)
}
