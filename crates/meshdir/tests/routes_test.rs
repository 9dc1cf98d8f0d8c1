//! integration tests for the route lease endpoints
//!
//! exercises registration, per-source replacement, expiry, the legacy
//! 500 on validation failures and the resolve read path.

use std::sync::Arc;

use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode},
};
use ed25519_dalek::{Signer, SigningKey};
use meshdir::create_app;
use meshdir_db::{IdentityStore, MemoryStore, MeshdirDb};
use meshdir_types::{Config, DomainPublicKey, IdentityPatch, Label, UserId};
use rand::rngs::OsRng;
use serde_json::{Value, json};
use tower::ServiceExt;

struct Fixture {
    app: Router,
    db: MeshdirDb,
    key: SigningKey,
    _dir: tempfile::TempDir,
}

async fn setup_with_ttl(ttl_secs: u64) -> Fixture {
    let db = MeshdirDb::new_in_memory().await.unwrap();
    let store = Arc::new(MemoryStore::new());
    let dir = tempfile::tempdir().unwrap();
    let config = Config {
        server_domain: "mesh.example.com".to_string(),
        routes_ttl_secs: ttl_secs,
        domain_log_path: dir.path().join("domain-events.log"),
        ..Default::default()
    };
    let app = create_app(db.clone(), store, None, None, config).await;

    let key = SigningKey::generate(&mut OsRng);
    db.upsert(
        &UserId::new("u1"),
        IdentityPatch {
            domain_name: Some(Label::parse("alice").unwrap()),
            public_key: Some(DomainPublicKey::from_verifying_key(&key.verifying_key())),
            ..Default::default()
        },
    )
    .await
    .unwrap();

    Fixture {
        app,
        db,
        key,
        _dir: dir,
    }
}

async fn setup() -> Fixture {
    setup_with_ttl(600).await
}

fn sign(key: &SigningKey, user_id: &str) -> String {
    hex::encode(key.sign(user_id.as_bytes()).to_bytes())
}

fn route(ip: &str, port: u16, source: &str) -> Value {
    json!({ "ip": ip, "port": port, "priority": 1, "source": source })
}

async fn post_routes(f: &Fixture, user_id: &str, sig: &str, body: Value) -> (StatusCode, Value) {
    let response = f
        .app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(format!("/routes/{user_id}/{sig}"))
                .header("content-type", "application/json")
                .body(Body::from(serde_json::to_vec(&body).unwrap()))
                .unwrap(),
        )
        .await
        .unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
}

async fn get_json(app: &Router, uri: &str) -> (StatusCode, Value) {
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("GET")
                .uri(uri)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
}

#[tokio::test]
async fn test_register_and_get_routes() {
    let f = setup().await;
    let sig = sign(&f.key, "u1");

    let (status, body) = post_routes(
        &f,
        "u1",
        &sig,
        json!({ "routes": [route("10.77.0.100", 443, "agent")] }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Routes registered.");
    assert_eq!(body["domain"], "alice");
    assert_eq!(body["routes"][0]["ip"], "10.77.0.100");

    let (status, body) = get_json(&f.app, "/routes/u1").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["routes"].as_array().unwrap().len(), 1);

    // registration touched the identity timestamps
    let record = f.db.get_by_id(&UserId::new("u1")).await.unwrap().unwrap();
    assert!(record.last_route_registration.is_some());
}

#[tokio::test]
async fn test_register_replaces_same_source() {
    let f = setup().await;
    let sig = sign(&f.key, "u1");

    post_routes(
        &f,
        "u1",
        &sig,
        json!({ "routes": [route("10.77.0.100", 443, "agent")] }),
    )
    .await;
    post_routes(
        &f,
        "u1",
        &sig,
        json!({ "routes": [route("2.2.2.2", 443, "agent")] }),
    )
    .await;

    let (_, body) = get_json(&f.app, "/routes/u1").await;
    let routes = body["routes"].as_array().unwrap();
    assert_eq!(routes.len(), 1);
    assert_eq!(routes[0]["ip"], "2.2.2.2");
}

#[tokio::test]
async fn test_register_keeps_other_sources() {
    let f = setup().await;
    let sig = sign(&f.key, "u1");

    post_routes(
        &f,
        "u1",
        &sig,
        json!({ "routes": [route("10.0.0.1", 443, "agent"), route("10.0.0.2", 443, "tunnel")] }),
    )
    .await;
    post_routes(
        &f,
        "u1",
        &sig,
        json!({ "routes": [route("10.0.0.9", 443, "agent")] }),
    )
    .await;

    let (_, body) = get_json(&f.app, "/routes/u1").await;
    let ips: Vec<&str> = body["routes"]
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["ip"].as_str().unwrap())
        .collect();
    assert!(ips.contains(&"10.0.0.9"));
    assert!(ips.contains(&"10.0.0.2"));
    assert!(!ips.contains(&"10.0.0.1"));
}

#[tokio::test]
async fn test_register_validation_failure_answers_legacy_500() {
    let f = setup().await;
    let sig = sign(&f.key, "u1");

    // port out of range
    let (status, _) = post_routes(
        &f,
        "u1",
        &sig,
        json!({ "routes": [route("10.0.0.1", 0, "agent")] }),
    )
    .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);

    // bad ip literal
    let (status, _) = post_routes(
        &f,
        "u1",
        &sig,
        json!({ "routes": [{ "ip": "2001::db8::1", "port": 443, "priority": 1, "source": "agent" }] }),
    )
    .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);

    // a route without a source rejects the whole batch
    let (status, _) = post_routes(
        &f,
        "u1",
        &sig,
        json!({ "routes": [
            route("10.0.0.1", 443, "agent"),
            { "ip": "10.0.0.2", "port": 443, "priority": 1 }
        ] }),
    )
    .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    let (status, _) = get_json(&f.app, "/routes/u1").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_register_missing_or_empty_routes_answers_400() {
    let f = setup().await;
    let sig = sign(&f.key, "u1");

    let (status, _) = post_routes(&f, "u1", &sig, json!({ "routes": [] })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = post_routes(&f, "u1", &sig, json!({})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_register_auth_failures() {
    let f = setup().await;

    // unknown user
    let (status, _) = post_routes(
        &f,
        "ghost",
        &sign(&f.key, "ghost"),
        json!({ "routes": [route("10.0.0.1", 443, "agent")] }),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // signature from the wrong key
    let other = SigningKey::generate(&mut OsRng);
    let (status, _) = post_routes(
        &f,
        "u1",
        &sign(&other, "u1"),
        json!({ "routes": [route("10.0.0.1", 443, "agent")] }),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    // unparseable signature
    let (status, _) = post_routes(
        &f,
        "u1",
        "zz-not-hex",
        json!({ "routes": [route("10.0.0.1", 443, "agent")] }),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_delete_routes_idempotent() {
    let f = setup().await;
    let sig = sign(&f.key, "u1");

    post_routes(
        &f,
        "u1",
        &sig,
        json!({ "routes": [route("10.0.0.1", 443, "agent")] }),
    )
    .await;

    for _ in 0..2 {
        let response = f
            .app
            .clone()
            .oneshot(
                Request::builder()
                    .method("DELETE")
                    .uri(format!("/routes/u1/{sig}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    let (status, _) = get_json(&f.app, "/routes/u1").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_resolve_returns_routes_and_ttl() {
    let f = setup().await;
    let sig = sign(&f.key, "u1");

    post_routes(
        &f,
        "u1",
        &sig,
        json!({ "routes": [route("10.77.0.100", 443, "agent")] }),
    )
    .await;

    let (status, body) = get_json(&f.app, "/resolve/v2/alice").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["userId"], "u1");
    assert_eq!(body["domainName"], "alice");
    assert_eq!(body["routes"].as_array().unwrap().len(), 1);
    let ttl = body["routesTtl"].as_i64().unwrap();
    assert!(ttl > 0 && ttl <= 600, "routesTtl should be a live ttl: {ttl}");

    // the label is lowercased at the boundary
    let (status, _) = get_json(&f.app, "/resolve/v2/ALICE").await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_resolve_unknown_label_answers_404() {
    let f = setup().await;
    let (status, _) = get_json(&f.app, "/resolve/v2/nobody").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_resolve_without_routes_has_sentinel_ttl() {
    let f = setup().await;

    let (status, body) = get_json(&f.app, "/resolve/v2/alice").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["routes"].as_array().unwrap().len(), 0);
    assert_eq!(body["routesTtl"], -2);
}

#[tokio::test]
async fn test_lease_expiry_end_to_end() {
    // ROUTES_TTL_SECONDS=2: register, wait past expiry, observe absence
    let f = setup_with_ttl(2).await;
    let sig = sign(&f.key, "u1");

    post_routes(
        &f,
        "u1",
        &sig,
        json!({ "routes": [route("10.0.0.1", 443, "agent")] }),
    )
    .await;

    let (status, _) = get_json(&f.app, "/routes/u1").await;
    assert_eq!(status, StatusCode::OK);

    tokio::time::sleep(std::time::Duration::from_secs(3)).await;

    let (status, _) = get_json(&f.app, "/routes/u1").await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, body) = get_json(&f.app, "/resolve/v2/alice").await;
    assert_eq!(body["routesTtl"], -2);
}
