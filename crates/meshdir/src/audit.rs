//! append-only domain event log.
//!
//! human-readable lines recording label assignment and release, one
//! event per line:
//!
//! ```text
//! 2026-03-01T03:00:02.114Z ASSIGNED alice to u-1f3c
//! 2026-04-02T03:00:01.008Z RELEASED alice from u-1f3c (inactive 31 days)
//! ```

use std::io;
use std::path::PathBuf;

use chrono::{SecondsFormat, Utc};
use tokio::io::AsyncWriteExt;

use meshdir_types::{Label, UserId};

/// writer for the domain event log.
#[derive(Debug, Clone)]
pub struct AuditLog {
    path: PathBuf,
}

impl AuditLog {
    /// create a writer; the file and its parent directory are created
    /// on first append.
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// record a label assignment.
    pub async fn assigned(&self, label: &Label, user_id: &UserId) -> io::Result<()> {
        self.append(format!(
            "{} ASSIGNED {} to {}",
            timestamp(),
            label,
            user_id
        ))
        .await
    }

    /// record a label release after inactivity.
    pub async fn released(
        &self,
        label: &Label,
        user_id: &UserId,
        inactive_days: i64,
    ) -> io::Result<()> {
        self.append(format!(
            "{} RELEASED {} from {} (inactive {} days)",
            timestamp(),
            label,
            user_id,
            inactive_days
        ))
        .await
    }

    async fn append(&self, line: String) -> io::Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(format!("{line}\n").as_bytes()).await?;
        Ok(())
    }
}

fn timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}
