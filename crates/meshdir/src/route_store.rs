//! route lease storage.
//!
//! each `(user, source)` pair owns one lease: the key
//! `routes:{user}:{source}` holding a json array of routes with the
//! configured ttl. a register call from source `S` wholly replaces the
//! prior lease from `S` and leaves other sources' leases - and their
//! ttls - untouched. absence of refresh silently expires a lease.
//!
//! the store keeps an in-process set of source tags it has seen,
//! populated lazily as sources register. a fresh process does not
//! enumerate the backend with wildcard scans; it self-heals as sources
//! refresh on their ttl/2 cadence. slightly stale knowledge is the
//! accepted price for never walking the shared key space.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::warn;

use meshdir_db::EphemeralStore;
use meshdir_types::{Route, RouteError, RouteInput, UserId};

/// ttl sentinel for "no lease exists".
pub const TTL_NONE: i64 = -2;

/// errors from route lease operations.
#[derive(Debug, thiserror::Error)]
pub enum RouteStoreError {
    /// a route in the batch failed validation; the whole batch is
    /// rejected.
    #[error(transparent)]
    Validation(#[from] RouteError),

    /// the ephemeral store failed.
    #[error(transparent)]
    Store(#[from] meshdir_db::Error),

    /// a lease failed to serialize.
    #[error("failed to encode lease: {0}")]
    Encode(String),
}

/// per-source route leases in the ephemeral store.
#[derive(Clone)]
pub struct RouteStore {
    store: Arc<dyn EphemeralStore>,
    ttl_secs: u64,
    known_sources: Arc<RwLock<BTreeSet<String>>>,
}

impl RouteStore {
    /// create a store; constructed once at boot so the known-sources
    /// set spans the process lifetime.
    pub fn new(store: Arc<dyn EphemeralStore>, ttl_secs: u64) -> Self {
        Self {
            store,
            ttl_secs,
            known_sources: Arc::new(RwLock::new(BTreeSet::new())),
        }
    }

    fn lease_key(user_id: &UserId, source: &str) -> String {
        format!("routes:{}:{}", user_id, source)
    }

    /// the source tags this process has seen register.
    pub async fn known_sources(&self) -> Vec<String> {
        self.known_sources.read().await.iter().cloned().collect()
    }

    /// validate and store a batch of routes.
    ///
    /// the batch is grouped by source; within a group duplicates by
    /// `(ip, port, scheme, type, domain)` collapse last-wins. every
    /// group is written in one pipelined batch so the expiry windows of
    /// this call's leases are aligned. returns the deduplicated routes
    /// as stored.
    pub async fn register(
        &self,
        user_id: &UserId,
        inputs: Vec<RouteInput>,
    ) -> Result<Vec<Route>, RouteStoreError> {
        let mut routes = Vec::with_capacity(inputs.len());
        for input in inputs {
            routes.push(input.validate()?);
        }

        // group by source, preserving first-seen group order and
        // deduplicating last-wins within each group
        let mut group_order: Vec<String> = Vec::new();
        let mut groups: HashMap<String, Vec<Route>> = HashMap::new();
        for route in routes {
            if !groups.contains_key(&route.source) {
                group_order.push(route.source.clone());
            }
            let group = groups.entry(route.source.clone()).or_default();
            match group.iter().position(|r| r.dedup_key() == route.dedup_key()) {
                Some(idx) => group[idx] = route,
                None => group.push(route),
            }
        }

        let mut entries = Vec::with_capacity(group_order.len());
        for source in &group_order {
            let group = &groups[source];
            let value = serde_json::to_string(group)
                .map_err(|e| RouteStoreError::Encode(e.to_string()))?;
            entries.push((Self::lease_key(user_id, source), value));
        }

        self.store.set_many_with_ttl(&entries, self.ttl_secs).await?;

        {
            let mut known = self.known_sources.write().await;
            for source in &group_order {
                known.insert(source.clone());
            }
        }

        Ok(group_order
            .into_iter()
            .flat_map(|source| groups[&source].clone())
            .collect())
    }

    /// all live routes for a user across known sources, or `None` when
    /// every lease is absent or expired.
    pub async fn get_routes(
        &self,
        user_id: &UserId,
    ) -> Result<Option<Vec<Route>>, RouteStoreError> {
        let keys = self.user_keys(user_id).await;
        if keys.is_empty() {
            return Ok(None);
        }

        let values = self.store.get_many(&keys).await?;
        let mut routes = Vec::new();
        let mut any_present = false;
        for (key, value) in keys.iter().zip(values) {
            let Some(value) = value else { continue };
            any_present = true;
            match serde_json::from_str::<Vec<Route>>(&value) {
                Ok(lease) => routes.extend(lease),
                Err(e) => {
                    warn!(key = %key, error = %e, "skipping unparseable lease");
                }
            }
        }

        if any_present { Ok(Some(routes)) } else { Ok(None) }
    }

    /// delete every source lease for a user. idempotent.
    pub async fn delete_routes(&self, user_id: &UserId) -> Result<(), RouteStoreError> {
        let keys = self.user_keys(user_id).await;
        if keys.is_empty() {
            return Ok(());
        }
        self.store.delete(&keys).await?;
        Ok(())
    }

    /// the minimum positive ttl across the user's leases, or
    /// [`TTL_NONE`] when no lease exists.
    pub async fn get_routes_ttl(&self, user_id: &UserId) -> Result<i64, RouteStoreError> {
        let keys = self.user_keys(user_id).await;
        let mut min_ttl: Option<i64> = None;
        for key in &keys {
            let ttl = self.store.ttl(key).await?;
            if ttl > 0 {
                min_ttl = Some(min_ttl.map_or(ttl, |m| m.min(ttl)));
            }
        }
        Ok(min_ttl.unwrap_or(TTL_NONE))
    }

    async fn user_keys(&self, user_id: &UserId) -> Vec<String> {
        self.known_sources
            .read()
            .await
            .iter()
            .map(|source| Self::lease_key(user_id, source))
            .collect()
    }
}
