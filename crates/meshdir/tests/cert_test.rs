//! integration tests for `/cert/{user_id}/{sig}` and `/ca-cert`
//!
//! end to end: an ed25519 key authenticates the caller, a csr carries a
//! separate tls key, and the issued leaf binds the csr's common name to
//! the user id. the two key systems are deliberately never compared.

use std::sync::Arc;

use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode},
};
use ed25519_dalek::{Signer, SigningKey};
use meshdir::create_app;
use meshdir_ca::CertificateAuthority;
use meshdir_db::{IdentityStore, MemoryStore, MeshdirDb};
use meshdir_types::{CaConfig, Config, DomainPublicKey, IdentityPatch, Label, UserId};
use rand::rngs::OsRng;
use rcgen::{CertificateParams, DnType, KeyPair};
use serde_json::{Value, json};
use tower::ServiceExt;
use x509_parser::prelude::*;

struct Fixture {
    app: Router,
    key: SigningKey,
    _dir: tempfile::TempDir,
}

async fn setup(with_ca: bool) -> Fixture {
    let db = MeshdirDb::new_in_memory().await.unwrap();
    let store = Arc::new(MemoryStore::new());
    let dir = tempfile::tempdir().unwrap();
    let config = Config {
        server_domain: "mesh.example.com".to_string(),
        domain_log_path: dir.path().join("domain-events.log"),
        ca: CaConfig {
            cert_path: dir.path().join("ca-cert.pem"),
            key_path: dir.path().join("ca-key.pem"),
            ..Default::default()
        },
        ..Default::default()
    };

    let ca = if with_ca {
        Some(Arc::new(
            CertificateAuthority::bootstrap(&config.ca).await.unwrap(),
        ))
    } else {
        None
    };

    let app = create_app(db.clone(), store, ca, None, config).await;

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
        key,
        _dir: dir,
    }
}

fn sign(key: &SigningKey, user_id: &str) -> String {
    hex::encode(key.sign(user_id.as_bytes()).to_bytes())
}

/// a csr for the given common name, signed with its own fresh tls key.
fn make_csr(common_name: &str) -> String {
    let tls_key = KeyPair::generate().unwrap();
    let mut params = CertificateParams::default();
    params
        .distinguished_name
        .push(DnType::CommonName, common_name);
    params.serialize_request(&tls_key).unwrap().pem().unwrap()
}

async fn post_cert(f: &Fixture, user_id: &str, sig: &str, body: Value) -> (StatusCode, Value) {
    let response = f
        .app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(format!("/cert/{user_id}/{sig}"))
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

fn parse_pem_cert(pem: &str) -> Vec<u8> {
    let (_, parsed) = x509_parser::pem::parse_x509_pem(pem.as_bytes()).unwrap();
    parsed.contents
}

#[tokio::test]
async fn test_issue_certificate_end_to_end() {
    let f = setup(true).await;
    let sig = sign(&f.key, "u1");

    let (status, body) = post_cert(
        &f,
        "u1",
        &sig,
        json!({ "csr": make_csr("u1"), "publicIp": "203.0.113.9" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let cert_pem = body["certificate"].as_str().unwrap();
    let ca_pem = body["caCertificate"].as_str().unwrap();
    assert!(cert_pem.contains("BEGIN CERTIFICATE"));
    assert!(ca_pem.contains("BEGIN CERTIFICATE"));
    assert!(!body["expiresAt"].is_null());

    let der = parse_pem_cert(cert_pem);
    let (_, cert) = parse_x509_certificate(&der).unwrap();

    // subject common name is the authenticated user id
    let cn = cert
        .subject()
        .iter_common_name()
        .next()
        .unwrap()
        .as_str()
        .unwrap();
    assert_eq!(cn, "u1");

    // san carries the configured wildcard, nip.io and the public ip
    let san = cert.subject_alternative_name().unwrap().unwrap();
    let dns_names: Vec<&str> = san
        .value
        .general_names
        .iter()
        .filter_map(|n| match n {
            GeneralName::DNSName(d) => Some(*d),
            _ => None,
        })
        .collect();
    assert_eq!(dns_names, vec!["*.mesh.example.com", "*.nip.io"]);
    assert!(
        san.value
            .general_names
            .iter()
            .any(|n| matches!(n, GeneralName::IPAddress(_)))
    );

    // validity is the default 72 hours
    let lifetime =
        cert.validity().not_after.timestamp() - cert.validity().not_before.timestamp();
    assert_eq!(lifetime, 72 * 3600);
}

#[tokio::test]
async fn test_cn_mismatch_answers_400() {
    let f = setup(true).await;
    let sig = sign(&f.key, "u1");

    let (status, body) = post_cert(&f, "u1", &sig, json!({ "csr": make_csr("u2") })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let message = body["error"].as_str().unwrap();
    assert!(message.contains("u1") && message.contains("u2"));
}

#[tokio::test]
async fn test_missing_or_malformed_csr_answers_400() {
    let f = setup(true).await;
    let sig = sign(&f.key, "u1");

    let (status, _) = post_cert(&f, "u1", &sig, json!({})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = post_cert(&f, "u1", &sig, json!({ "csr": "garbage" })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_cert_auth_failures() {
    let f = setup(true).await;

    let other = SigningKey::generate(&mut OsRng);
    let (status, _) = post_cert(
        &f,
        "u1",
        &sign(&other, "u1"),
        json!({ "csr": make_csr("u1") }),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = post_cert(
        &f,
        "ghost",
        &sign(&other, "ghost"),
        json!({ "csr": make_csr("ghost") }),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_uninitialized_ca_answers_503() {
    let f = setup(false).await;
    let sig = sign(&f.key, "u1");

    let (status, _) = post_cert(&f, "u1", &sig, json!({ "csr": make_csr("u1") })).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_ca_cert_endpoint() {
    let f = setup(true).await;

    let response = f
        .app
        .clone()
        .oneshot(
            Request::builder()
                .method("GET")
                .uri("/ca-cert")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let content_type = response
        .headers()
        .get("content-type")
        .unwrap()
        .to_str()
        .unwrap();
    assert!(content_type.starts_with("text/plain"));
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    assert!(
        String::from_utf8(bytes.to_vec())
            .unwrap()
            .contains("BEGIN CERTIFICATE")
    );
}

#[tokio::test]
async fn test_ca_cert_endpoint_uninitialized_answers_503() {
    let f = setup(false).await;

    let response = f
        .app
        .clone()
        .oneshot(
            Request::builder()
                .method("GET")
                .uri("/ca-cert")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}
