//! configuration types for meshdir.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// main configuration for meshdir.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// parent domain under which subdomain labels live; also the first
    /// wildcard entry on issued certificates.
    pub server_domain: String,

    /// address to bind the http server to.
    pub listen_addr: String,

    /// ephemeral store url.
    pub redis_url: String,

    /// identity database configuration.
    pub database: DatabaseConfig,

    /// route lease ttl in seconds. one lease per `(user, source)`.
    pub routes_ttl_secs: u64,

    /// days of silence before a label is reclaimed.
    pub inactive_domain_days: i64,

    /// heartbeat age in seconds below which a user counts as online.
    pub online_threshold_secs: u64,

    /// path of the append-only domain event log.
    pub domain_log_path: PathBuf,

    /// daily cleanup schedule, `M H * * *` cron subset.
    pub cleanup_schedule: String,

    /// certificate authority configuration.
    pub ca: CaConfig,

    /// preshared key for the token-authenticated admin surface.
    pub service_api_key: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_domain: String::new(),
            listen_addr: "0.0.0.0:8192".to_string(),
            redis_url: "redis://127.0.0.1:6379".to_string(),
            database: DatabaseConfig::default(),
            routes_ttl_secs: 600,
            inactive_domain_days: 30,
            online_threshold_secs: 120,
            domain_log_path: PathBuf::from("logs/domain-events.log"),
            cleanup_schedule: "0 3 * * *".to_string(),
            ca: CaConfig::default(),
            service_api_key: None,
        }
    }
}

/// identity database configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// database type: "sqlite" or "postgres".
    pub db_type: String,

    /// database connection string or file path.
    pub connection_string: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            db_type: "sqlite".to_string(),
            connection_string: "meshdir.sqlite".to_string(),
        }
    }
}

/// certificate authority configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CaConfig {
    /// path of the pem-encoded root certificate.
    pub cert_path: PathBuf,

    /// path of the pem-encoded root private key.
    pub key_path: PathBuf,

    /// leaf certificate validity in hours.
    pub validity_hours: u64,

    /// root subject common name.
    pub common_name: String,

    /// root subject organization.
    pub organization: String,

    /// root subject organizational unit.
    pub organizational_unit: String,
}

impl Default for CaConfig {
    fn default() -> Self {
        Self {
            cert_path: PathBuf::from("ca-cert.pem"),
            key_path: PathBuf::from("ca-key.pem"),
            validity_hours: 72,
            common_name: "meshdir".to_string(),
            organization: "meshdir".to_string(),
            organizational_unit: "routing".to_string(),
        }
    }
}
