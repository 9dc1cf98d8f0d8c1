//! ephemeral store client.
//!
//! route leases and the activity tracker live in an external in-memory
//! key-value server offering per-key ttl, multi-key reads and sorted
//! sets by score. [`RedisStore`] talks to a real server; [`MemoryStore`]
//! is a faithful in-process stand-in for tests and development.

mod memory;
mod redis_store;

pub use memory::MemoryStore;
pub use redis_store::RedisStore;

use async_trait::async_trait;

use crate::Result;

/// one bound of a score range query.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ScoreBound {
    /// negative infinity.
    NegInf,
    /// positive infinity.
    PosInf,
    /// inclusive bound.
    Incl(f64),
    /// exclusive bound.
    Excl(f64),
}

impl ScoreBound {
    /// whether `score` lies on the allowed side when self is a minimum.
    pub(crate) fn allows_min(&self, score: f64) -> bool {
        match *self {
            ScoreBound::NegInf => true,
            ScoreBound::PosInf => false,
            ScoreBound::Incl(v) => score >= v,
            ScoreBound::Excl(v) => score > v,
        }
    }

    /// whether `score` lies on the allowed side when self is a maximum.
    pub(crate) fn allows_max(&self, score: f64) -> bool {
        match *self {
            ScoreBound::NegInf => false,
            ScoreBound::PosInf => true,
            ScoreBound::Incl(v) => score <= v,
            ScoreBound::Excl(v) => score < v,
        }
    }
}

/// the ephemeral store operations meshdir relies on.
///
/// ttl semantics follow the backing server: [`EphemeralStore::ttl`]
/// returns `-2` for a missing key and `-1` for a key without expiry.
#[async_trait]
pub trait EphemeralStore: Send + Sync {
    /// verify connectivity.
    async fn ping(&self) -> Result<()>;

    /// atomically write every entry with the same ttl, in one batch, so
    /// expiry windows across the entries are aligned.
    async fn set_many_with_ttl(&self, entries: &[(String, String)], ttl_secs: u64) -> Result<()>;

    /// fetch several keys in one round trip. absent or expired keys
    /// come back as `None` in position.
    async fn get_many(&self, keys: &[String]) -> Result<Vec<Option<String>>>;

    /// delete keys; returns how many existed.
    async fn delete(&self, keys: &[String]) -> Result<u64>;

    /// remaining ttl of a key in seconds; `-2` if missing, `-1` if the
    /// key has no expiry.
    async fn ttl(&self, key: &str) -> Result<i64>;

    /// insert or overwrite a member's score in a sorted set.
    async fn zadd(&self, set: &str, member: &str, score: f64) -> Result<()>;

    /// get a member's score.
    async fn zscore(&self, set: &str, member: &str) -> Result<Option<f64>>;

    /// members whose score falls within the bounds, ascending by score.
    async fn zrange_by_score(
        &self,
        set: &str,
        min: ScoreBound,
        max: ScoreBound,
    ) -> Result<Vec<String>>;

    /// remove a member from a sorted set.
    async fn zrem(&self, set: &str, member: &str) -> Result<()>;
}
