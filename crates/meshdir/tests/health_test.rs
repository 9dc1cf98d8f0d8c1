//! integration tests for the `/health` endpoint
//!
//! the endpoint pings the identity database and the ephemeral store.

use std::sync::Arc;

use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use meshdir::create_app;
use meshdir_db::{MemoryStore, MeshdirDb};
use meshdir_types::Config;
use serde::Deserialize;
use tower::ServiceExt;

/// response from the `/health` endpoint
#[derive(Debug, Deserialize)]
struct HealthResponse {
    status: String,
}

#[tokio::test]
async fn test_health_endpoint_returns_pass() {
    let db = MeshdirDb::new_in_memory()
        .await
        .expect("failed to create in-memory database");
    let store = Arc::new(MemoryStore::new());
    let dir = tempfile::tempdir().unwrap();
    let config = Config {
        server_domain: "mesh.example.com".to_string(),
        domain_log_path: dir.path().join("domain-events.log"),
        ..Default::default()
    };

    let app = create_app(db, store, None, None, config).await;

    let request = Request::builder()
        .method("GET")
        .uri("/health")
        .body(Body::empty())
        .expect("failed to build request");

    let response = app.oneshot(request).await.expect("request failed");

    assert_eq!(response.status(), StatusCode::OK);

    let content_type = response
        .headers()
        .get("content-type")
        .expect("should have content-type header")
        .to_str()
        .expect("content-type should be valid string");
    assert!(
        content_type.contains("application/health+json"),
        "content-type should be application/health+json, got: {}",
        content_type
    );

    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("failed to read body");
    let health_response: HealthResponse =
        serde_json::from_slice(&body).expect("failed to parse response");

    assert_eq!(health_response.status, "pass");
}
