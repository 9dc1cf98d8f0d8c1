//! activity tracking for registered domains.
//!
//! a thin facade over the ephemeral store's sorted set: member is the
//! user id, score is the last activity time in milliseconds. updated on
//! every successful route registration; drained by the cleanup
//! controller.

use std::sync::Arc;

use chrono::Utc;

use meshdir_db::{EphemeralStore, Result, ScoreBound};
use meshdir_types::UserId;

/// the sorted set holding `(user id, last activity millis)`.
const ACTIVITY_SET: &str = "domains:activity";

const DAY_MILLIS: i64 = 86_400_000;

/// tracks when each user last registered routes.
#[derive(Clone)]
pub struct ActivityTracker {
    store: Arc<dyn EphemeralStore>,
}

impl ActivityTracker {
    /// create a tracker over the given store.
    pub fn new(store: Arc<dyn EphemeralStore>) -> Self {
        Self { store }
    }

    /// overwrite the user's entry with the current time.
    pub async fn update(&self, user_id: &UserId) -> Result<()> {
        let now = Utc::now().timestamp_millis();
        self.store
            .zadd(ACTIVITY_SET, user_id.as_str(), now as f64)
            .await
    }

    /// users whose last activity is at least `days` days ago.
    pub async fn get_inactive_since(&self, days: i64) -> Result<Vec<UserId>> {
        let cutoff = Utc::now().timestamp_millis() - days * DAY_MILLIS;
        let members = self
            .store
            .zrange_by_score(ACTIVITY_SET, ScoreBound::NegInf, ScoreBound::Incl(cutoff as f64))
            .await?;
        Ok(members.into_iter().map(UserId::new).collect())
    }

    /// users active within the last `days` days.
    pub async fn get_active_since(&self, days: i64) -> Result<Vec<UserId>> {
        let cutoff = Utc::now().timestamp_millis() - days * DAY_MILLIS;
        let members = self
            .store
            .zrange_by_score(ACTIVITY_SET, ScoreBound::Excl(cutoff as f64), ScoreBound::PosInf)
            .await?;
        Ok(members.into_iter().map(UserId::new).collect())
    }

    /// drop the user's entry.
    pub async fn remove(&self, user_id: &UserId) -> Result<()> {
        self.store.zrem(ACTIVITY_SET, user_id.as_str()).await
    }

    /// the user's last activity in milliseconds, if tracked.
    pub async fn get_timestamp(&self, user_id: &UserId) -> Result<Option<i64>> {
        let score = self.store.zscore(ACTIVITY_SET, user_id.as_str()).await?;
        Ok(score.map(|s| s as i64))
    }
}
