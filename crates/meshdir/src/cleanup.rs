//! inactive domain cleanup.
//!
//! reclaims subdomain labels whose owners have gone silent: scans the
//! activity tracker for users past the inactivity threshold and, for
//! each one independently, writes a release line to the audit log,
//! clears the domain assignment and drops the tracker entry. a failure
//! for one user never aborts the others, and re-running a pass releases
//! nothing new.
//!
//! runs daily at the configured local time and on demand through the
//! admin endpoint or the `meshdir cleanup` subcommand.

use chrono::{NaiveDateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

use meshdir_db::{IdentityStore, MeshdirDb};
use meshdir_types::UserId;

use crate::activity::ActivityTracker;
use crate::audit::AuditLog;

const DAY_MILLIS: i64 = 86_400_000;

/// outcome of one cleanup pass.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CleanupReport {
    /// how many labels were released.
    pub released_count: usize,
    /// the released labels.
    pub domains: Vec<String>,
}

/// errors from schedule parsing.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ScheduleError {
    /// not a five-field cron expression.
    #[error("schedule must have five fields")]
    WrongFieldCount,

    /// the minute field is not a number below 60.
    #[error("invalid minute field: '{0}'")]
    InvalidMinute(String),

    /// the hour field is not a number below 24.
    #[error("invalid hour field: '{0}'")]
    InvalidHour(String),

    /// day/month/weekday fields other than `*` are not supported; the
    /// full cron grammar belongs to an external scheduler.
    #[error("unsupported schedule field: '{0}'")]
    UnsupportedField(String),
}

/// a daily `M H * * *` schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DailySchedule {
    /// hour of day, local time.
    pub hour: u32,
    /// minute of hour.
    pub minute: u32,
}

impl DailySchedule {
    /// parse the `M H * * *` subset of cron.
    pub fn parse(s: &str) -> Result<Self, ScheduleError> {
        let fields: Vec<&str> = s.split_whitespace().collect();
        if fields.len() != 5 {
            return Err(ScheduleError::WrongFieldCount);
        }
        let minute: u32 = fields[0]
            .parse()
            .ok()
            .filter(|m| *m < 60)
            .ok_or_else(|| ScheduleError::InvalidMinute(fields[0].to_string()))?;
        let hour: u32 = fields[1]
            .parse()
            .ok()
            .filter(|h| *h < 24)
            .ok_or_else(|| ScheduleError::InvalidHour(fields[1].to_string()))?;
        for field in &fields[2..] {
            if *field != "*" {
                return Err(ScheduleError::UnsupportedField(field.to_string()));
            }
        }
        Ok(Self { hour, minute })
    }

    /// time until the next occurrence after `now`.
    fn duration_from(&self, now: NaiveDateTime) -> std::time::Duration {
        let today = now.date().and_hms_opt(self.hour, self.minute, 0);
        let target = match today {
            Some(t) if t > now => t,
            // past today's slot (or an unrepresentable one): tomorrow
            _ => now.date().succ_opt().unwrap_or(now.date()).and_hms_opt(self.hour, self.minute, 0)
                .unwrap_or(now),
        };
        (target - now).to_std().unwrap_or_default()
    }
}

/// reclaims labels from silent owners.
#[derive(Clone)]
pub struct CleanupController {
    db: MeshdirDb,
    activity: ActivityTracker,
    audit: AuditLog,
    inactive_days: i64,
}

impl CleanupController {
    /// create a controller.
    pub fn new(
        db: MeshdirDb,
        activity: ActivityTracker,
        audit: AuditLog,
        inactive_days: i64,
    ) -> Self {
        Self {
            db,
            activity,
            audit,
            inactive_days,
        }
    }

    /// run one cleanup pass.
    pub async fn run(&self) -> Result<CleanupReport, meshdir_db::Error> {
        let ids = self.activity.get_inactive_since(self.inactive_days).await?;
        debug!(candidates = ids.len(), "cleanup pass starting");

        let mut domains = Vec::new();
        for user_id in ids {
            match self.release_one(&user_id).await {
                Ok(Some(label)) => domains.push(label),
                Ok(None) => {}
                // one user's failure must not abort the others
                Err(e) => {
                    warn!(user_id = %user_id, error = %e, "failed to release domain");
                }
            }
        }

        if !domains.is_empty() {
            info!(released = domains.len(), "cleanup pass released domains");
        }

        Ok(CleanupReport {
            released_count: domains.len(),
            domains,
        })
    }

    /// release one user's label; `None` when there is nothing to do.
    async fn release_one(&self, user_id: &UserId) -> Result<Option<String>, meshdir_db::Error> {
        let record = self.db.get_by_id(user_id).await?;
        let label = match record.and_then(|r| r.domain_name) {
            Some(label) => label,
            // a tracker entry without an assignment is just stale
            None => {
                self.activity.remove(user_id).await?;
                return Ok(None);
            }
        };

        let inactive_days = match self.activity.get_timestamp(user_id).await? {
            Some(ts) => (Utc::now().timestamp_millis() - ts) / DAY_MILLIS,
            None => self.inactive_days,
        };

        self.audit
            .released(&label, user_id, inactive_days)
            .await
            .map_err(|e| meshdir_db::Error::Store(format!("audit log append failed: {e}")))?;

        self.db.clear_domain_assignment(user_id).await?;
        self.activity.remove(user_id).await?;

        Ok(Some(label.to_string()))
    }

    /// spawn the daily background task.
    ///
    /// sleeps until the next occurrence of the schedule, runs a pass,
    /// and repeats until the returned handle is dropped.
    pub fn spawn_scheduler(self, schedule: DailySchedule) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            info!(
                hour = schedule.hour,
                minute = schedule.minute,
                inactive_days = self.inactive_days,
                "starting cleanup scheduler"
            );

            loop {
                let wait = schedule.duration_from(chrono::Local::now().naive_local());
                debug!(seconds = wait.as_secs(), "cleanup sleeping until next run");
                tokio::time::sleep(wait).await;

                match self.run().await {
                    Ok(report) if report.released_count > 0 => {
                        info!(
                            released = report.released_count,
                            domains = ?report.domains,
                            "scheduled cleanup completed"
                        );
                    }
                    Ok(_) => debug!("scheduled cleanup completed, nothing to release"),
                    Err(e) => warn!(error = %e, "scheduled cleanup failed"),
                }
            }
        })
    }
}
