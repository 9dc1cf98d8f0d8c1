//! the `serve` subcommand - runs the control plane server.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Args;
use color_eyre::eyre::{Context, Result, bail};
use tokio::net::TcpListener;
use tracing::{Level, info};
use tracing_subscriber::FmtSubscriber;

use meshdir_ca::CertificateAuthority;
use meshdir_db::{EphemeralStore, MeshdirDb, RedisStore};
use meshdir_types::{CaConfig, Config, DatabaseConfig};

use crate::activity::ActivityTracker;
use crate::audit::AuditLog;
use crate::cleanup::{CleanupController, DailySchedule};

/// run the meshdir control plane server
#[derive(Args, Debug)]
pub struct ServeCommand {
    /// parent domain served to clients and stamped on certificates
    #[arg(long, env = "SERVER_DOMAIN")]
    server_domain: String,

    /// ephemeral store url
    #[arg(long, default_value = "redis://127.0.0.1:6379", env = "REDIS_URL")]
    redis_url: String,

    /// identity database url (sqlite:// or postgres://)
    #[arg(long, env = "DATABASE_URL")]
    database_url: Option<String>,

    /// address to listen on
    #[arg(long, default_value = "0.0.0.0:8192", env = "MESHDIR_LISTEN_ADDR")]
    listen_addr: String,

    /// route lease ttl in seconds
    #[arg(
        long,
        default_value_t = 600,
        env = "ROUTES_TTL_SECONDS",
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    routes_ttl_seconds: u64,

    /// days of silence before a label is reclaimed
    #[arg(long, default_value_t = 30, env = "INACTIVE_DOMAIN_DAYS")]
    inactive_domain_days: i64,

    /// path of the append-only domain event log
    #[arg(long, default_value = "logs/domain-events.log", env = "DOMAIN_LOG_PATH")]
    domain_log_path: PathBuf,

    /// daily cleanup schedule (`M H * * *` cron subset)
    #[arg(long, default_value = "0 3 * * *", env = "CLEANUP_CRON_SCHEDULE")]
    cleanup_cron_schedule: String,

    /// path of the ca root certificate
    #[arg(long, default_value = "ca-cert.pem", env = "CA_CERT_PATH")]
    ca_cert_path: PathBuf,

    /// path of the ca root private key
    #[arg(long, default_value = "ca-key.pem", env = "CA_KEY_PATH")]
    ca_key_path: PathBuf,

    /// leaf certificate validity in hours
    #[arg(long, default_value_t = 72, env = "CERT_VALIDITY_HOURS")]
    cert_validity_hours: u64,

    /// preshared key for the token-authenticated admin surface
    #[arg(long, env = "SERVICE_API_KEY")]
    service_api_key: Option<String>,

    /// log level
    #[arg(long, default_value = "info", env = "MESHDIR_LOG_LEVEL")]
    log_level: String,
}

impl ServeCommand {
    /// convert cli arguments into a Config struct
    fn into_config(self) -> Result<Config> {
        let database = database_config(self.database_url)?;

        Ok(Config {
            server_domain: self.server_domain,
            listen_addr: self.listen_addr,
            redis_url: self.redis_url,
            database,
            routes_ttl_secs: self.routes_ttl_seconds,
            inactive_domain_days: self.inactive_domain_days,
            domain_log_path: self.domain_log_path,
            cleanup_schedule: self.cleanup_cron_schedule,
            ca: CaConfig {
                cert_path: self.ca_cert_path,
                key_path: self.ca_key_path,
                validity_hours: self.cert_validity_hours,
                ..Default::default()
            },
            service_api_key: self.service_api_key,
            ..Default::default()
        })
    }

    /// run the serve command
    pub async fn run(self) -> Result<()> {
        init_logging(&self.log_level)?;

        info!("starting meshdir...");

        let config = self.into_config()?;

        // an unparseable schedule is a configuration mistake; fail now,
        // not at 03:00
        let schedule = DailySchedule::parse(&config.cleanup_schedule)
            .map_err(|e| color_eyre::eyre::eyre!("invalid CLEANUP_CRON_SCHEDULE: {e}"))?;

        info!("Server domain: {}", config.server_domain);
        info!("Listen address: {}", config.listen_addr);
        info!("Database: {}", config.database.connection_string);
        info!("Ephemeral store: {}", config.redis_url);

        ensure_sqlite_dir(&config.database)?;

        let db = MeshdirDb::new(&config.database)
            .await
            .context("failed to initialize identity database")?;
        info!("Identity database initialized");

        let ephemeral: Arc<dyn EphemeralStore> = Arc::new(
            RedisStore::connect(&config.redis_url)
                .await
                .context("failed to connect to ephemeral store")?,
        );
        info!("Ephemeral store connected");

        let ca = CertificateAuthority::bootstrap(&config.ca)
            .await
            .context("failed to bootstrap certificate authority")?;
        let ca = Arc::new(ca);
        info!("Certificate authority ready");

        let controller = CleanupController::new(
            db.clone(),
            ActivityTracker::new(ephemeral.clone()),
            AuditLog::new(config.domain_log_path.clone()),
            config.inactive_domain_days,
        );
        controller.spawn_scheduler(schedule);

        let app = crate::create_app(db, ephemeral, Some(ca), None, config.clone()).await;

        let listener = TcpListener::bind(&config.listen_addr)
            .await
            .with_context(|| format!("failed to bind {}", config.listen_addr))?;
        info!("meshdir listening on {}", config.listen_addr);

        axum::serve(listener, app)
            .await
            .context("server terminated")?;

        Ok(())
    }
}

/// initialize the global tracing subscriber
pub(crate) fn init_logging(log_level: &str) -> Result<()> {
    let level = match log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}

/// build the database config from an optional url
pub(crate) fn database_config(database_url: Option<String>) -> Result<DatabaseConfig> {
    match database_url {
        Some(url) if url.starts_with("postgres://") => Ok(DatabaseConfig {
            db_type: "postgres".to_string(),
            connection_string: url,
        }),
        Some(url) => {
            if let Some(path) = url.strip_prefix("sqlite://") {
                Ok(DatabaseConfig {
                    db_type: "sqlite".to_string(),
                    connection_string: path.to_string(),
                })
            } else {
                bail!("database URL must start with sqlite:// or postgres://");
            }
        }
        None => Ok(DatabaseConfig::default()),
    }
}

/// ensure the parent directory of a sqlite database exists
pub(crate) fn ensure_sqlite_dir(database: &DatabaseConfig) -> Result<()> {
    if database.db_type == "sqlite" {
        let db_path = std::path::Path::new(&database.connection_string);
        if let Some(parent) = db_path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            info!("Creating database directory: {:?}", parent);
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create database directory: {:?}", parent))?;
        }
    }
    Ok(())
}
