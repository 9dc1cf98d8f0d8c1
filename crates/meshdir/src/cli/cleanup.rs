//! the `cleanup` subcommand - one on-demand cleanup pass.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Args;
use color_eyre::eyre::{Context, Result};
use tracing::info;

use meshdir_db::{EphemeralStore, MeshdirDb, RedisStore};

use crate::activity::ActivityTracker;
use crate::audit::AuditLog;
use crate::cleanup::CleanupController;

/// run one inactive-domain cleanup pass and exit
#[derive(Args, Debug)]
pub struct CleanupCommand {
    /// ephemeral store url
    #[arg(long, default_value = "redis://127.0.0.1:6379", env = "REDIS_URL")]
    redis_url: String,

    /// identity database url (sqlite:// or postgres://)
    #[arg(long, env = "DATABASE_URL")]
    database_url: Option<String>,

    /// days of silence before a label is reclaimed
    #[arg(long, default_value_t = 30, env = "INACTIVE_DOMAIN_DAYS")]
    inactive_domain_days: i64,

    /// path of the append-only domain event log
    #[arg(long, default_value = "logs/domain-events.log", env = "DOMAIN_LOG_PATH")]
    domain_log_path: PathBuf,

    /// log level
    #[arg(long, default_value = "info", env = "MESHDIR_LOG_LEVEL")]
    log_level: String,
}

impl CleanupCommand {
    /// run the cleanup command
    pub async fn run(self) -> Result<()> {
        super::serve::init_logging(&self.log_level)?;

        let database = super::serve::database_config(self.database_url)?;
        super::serve::ensure_sqlite_dir(&database)?;

        let db = MeshdirDb::new(&database)
            .await
            .context("failed to initialize identity database")?;

        let ephemeral: Arc<dyn EphemeralStore> = Arc::new(
            RedisStore::connect(&self.redis_url)
                .await
                .context("failed to connect to ephemeral store")?,
        );

        let controller = CleanupController::new(
            db,
            ActivityTracker::new(ephemeral),
            AuditLog::new(self.domain_log_path),
            self.inactive_domain_days,
        );

        let report = controller.run().await.context("cleanup pass failed")?;

        info!(
            released = report.released_count,
            domains = ?report.domains,
            "cleanup pass finished"
        );
        println!("released {} domain(s)", report.released_count);
        for domain in &report.domains {
            println!("  {domain}");
        }

        Ok(())
    }
}
