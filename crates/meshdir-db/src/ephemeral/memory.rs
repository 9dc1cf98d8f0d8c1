//! in-memory ephemeral store for tests and development.
//!
//! mirrors the backing server's observable semantics: per-key expiry
//! checked lazily on access, sorted sets ordered by score then member.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::sync::Mutex;

use super::{EphemeralStore, ScoreBound};
use crate::Result;

#[derive(Debug, Clone)]
struct Entry {
    value: String,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_expired(&self, now: Instant) -> bool {
        matches!(self.expires_at, Some(at) if at <= now)
    }
}

#[derive(Debug, Default)]
struct Inner {
    kv: HashMap<String, Entry>,
    zsets: HashMap<String, HashMap<String, f64>>,
}

/// in-process ephemeral store.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryStore {
    /// create an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl EphemeralStore for MemoryStore {
    async fn ping(&self) -> Result<()> {
        Ok(())
    }

    async fn set_many_with_ttl(&self, entries: &[(String, String)], ttl_secs: u64) -> Result<()> {
        let mut inner = self.inner.lock().await;
        let expires_at = Some(Instant::now() + Duration::from_secs(ttl_secs));
        for (key, value) in entries {
            inner.kv.insert(
                key.clone(),
                Entry {
                    value: value.clone(),
                    expires_at,
                },
            );
        }
        Ok(())
    }

    async fn get_many(&self, keys: &[String]) -> Result<Vec<Option<String>>> {
        let mut inner = self.inner.lock().await;
        let now = Instant::now();
        let mut values = Vec::with_capacity(keys.len());
        for key in keys {
            let expired = inner.kv.get(key).map(|e| e.is_expired(now));
            if expired == Some(true) {
                inner.kv.remove(key);
            }
            values.push(inner.kv.get(key).map(|e| e.value.clone()));
        }
        Ok(values)
    }

    async fn delete(&self, keys: &[String]) -> Result<u64> {
        let mut inner = self.inner.lock().await;
        let now = Instant::now();
        let mut removed = 0;
        for key in keys {
            if let Some(entry) = inner.kv.remove(key) {
                if !entry.is_expired(now) {
                    removed += 1;
                }
            }
        }
        Ok(removed)
    }

    async fn ttl(&self, key: &str) -> Result<i64> {
        let mut inner = self.inner.lock().await;
        let now = Instant::now();
        let expired = inner.kv.get(key).map(|e| e.is_expired(now));
        if expired == Some(true) {
            inner.kv.remove(key);
        }
        match inner.kv.get(key) {
            None => Ok(-2),
            Some(Entry {
                expires_at: None, ..
            }) => Ok(-1),
            Some(Entry {
                expires_at: Some(at),
                ..
            }) => {
                let remaining = at.saturating_duration_since(now);
                // round up so a freshly set ttl reads back whole
                let mut secs = remaining.as_secs() as i64;
                if remaining.subsec_nanos() > 0 {
                    secs += 1;
                }
                Ok(secs)
            }
        }
    }

    async fn zadd(&self, set: &str, member: &str, score: f64) -> Result<()> {
        let mut inner = self.inner.lock().await;
        inner
            .zsets
            .entry(set.to_string())
            .or_default()
            .insert(member.to_string(), score);
        Ok(())
    }

    async fn zscore(&self, set: &str, member: &str) -> Result<Option<f64>> {
        let inner = self.inner.lock().await;
        Ok(inner.zsets.get(set).and_then(|z| z.get(member).copied()))
    }

    async fn zrange_by_score(
        &self,
        set: &str,
        min: ScoreBound,
        max: ScoreBound,
    ) -> Result<Vec<String>> {
        let inner = self.inner.lock().await;
        let Some(zset) = inner.zsets.get(set) else {
            return Ok(Vec::new());
        };
        let mut members: Vec<(&String, f64)> = zset
            .iter()
            .filter(|&(_, &score)| min.allows_min(score) && max.allows_max(score))
            .map(|(member, &score)| (member, score))
            .collect();
        members.sort_by(|a, b| {
            a.1.partial_cmp(&b.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.0.cmp(b.0))
        });
        Ok(members.into_iter().map(|(m, _)| m.clone()).collect())
    }

    async fn zrem(&self, set: &str, member: &str) -> Result<()> {
        let mut inner = self.inner.lock().await;
        if let Some(zset) = inner.zsets.get_mut(set) {
            zset.remove(member);
        }
        Ok(())
    }
}
