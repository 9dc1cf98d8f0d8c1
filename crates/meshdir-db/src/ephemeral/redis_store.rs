//! redis-backed ephemeral store.

use std::time::Duration;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use tokio::time::timeout;

use super::{EphemeralStore, ScoreBound};
use crate::{Error, Result};

/// default deadline for a single store call; exhaustion surfaces as a
/// 500 at the handler boundary rather than starving the handler.
const OP_TIMEOUT: Duration = Duration::from_secs(3);

/// ephemeral store client backed by a redis server.
#[derive(Clone)]
pub struct RedisStore {
    manager: ConnectionManager,
}

impl RedisStore {
    /// connect to the server; the connection manager reconnects on
    /// failure and is cheap to clone per call.
    pub async fn connect(url: &str) -> Result<Self> {
        let client = redis::Client::open(url).map_err(Error::from)?;
        let manager = ConnectionManager::new(client).await.map_err(Error::from)?;
        Ok(Self { manager })
    }

    async fn run<T: redis::FromRedisValue>(&self, cmd: redis::Cmd) -> Result<T> {
        let mut conn = self.manager.clone();
        match timeout(OP_TIMEOUT, cmd.query_async::<T>(&mut conn)).await {
            Ok(result) => result.map_err(Error::from),
            Err(_) => Err(Error::Timeout),
        }
    }

    fn format_bound(bound: ScoreBound) -> String {
        match bound {
            ScoreBound::NegInf => "-inf".to_string(),
            ScoreBound::PosInf => "+inf".to_string(),
            ScoreBound::Incl(v) => format_score(v),
            ScoreBound::Excl(v) => format!("({}", format_score(v)),
        }
    }
}

/// scores are millisecond timestamps; emit them without an exponent.
fn format_score(v: f64) -> String {
    if v.fract() == 0.0 {
        format!("{:.0}", v)
    } else {
        format!("{}", v)
    }
}

#[async_trait]
impl EphemeralStore for RedisStore {
    async fn ping(&self) -> Result<()> {
        let _: String = self.run(redis::cmd("PING")).await?;
        Ok(())
    }

    async fn set_many_with_ttl(&self, entries: &[(String, String)], ttl_secs: u64) -> Result<()> {
        if entries.is_empty() {
            return Ok(());
        }
        let mut pipe = redis::pipe();
        pipe.atomic();
        for (key, value) in entries {
            pipe.cmd("SET")
                .arg(key)
                .arg(value)
                .arg("EX")
                .arg(ttl_secs)
                .ignore();
        }
        let mut conn = self.manager.clone();
        match timeout(OP_TIMEOUT, pipe.query_async::<()>(&mut conn)).await {
            Ok(result) => result.map_err(Error::from),
            Err(_) => Err(Error::Timeout),
        }
    }

    async fn get_many(&self, keys: &[String]) -> Result<Vec<Option<String>>> {
        if keys.is_empty() {
            return Ok(Vec::new());
        }
        let mut cmd = redis::cmd("MGET");
        for key in keys {
            cmd.arg(key);
        }
        self.run(cmd).await
    }

    async fn delete(&self, keys: &[String]) -> Result<u64> {
        if keys.is_empty() {
            return Ok(0);
        }
        let mut cmd = redis::cmd("DEL");
        for key in keys {
            cmd.arg(key);
        }
        self.run(cmd).await
    }

    async fn ttl(&self, key: &str) -> Result<i64> {
        let mut cmd = redis::cmd("TTL");
        cmd.arg(key);
        self.run(cmd).await
    }

    async fn zadd(&self, set: &str, member: &str, score: f64) -> Result<()> {
        let mut cmd = redis::cmd("ZADD");
        cmd.arg(set).arg(score).arg(member);
        let _: i64 = self.run(cmd).await?;
        Ok(())
    }

    async fn zscore(&self, set: &str, member: &str) -> Result<Option<f64>> {
        let mut cmd = redis::cmd("ZSCORE");
        cmd.arg(set).arg(member);
        self.run(cmd).await
    }

    async fn zrange_by_score(
        &self,
        set: &str,
        min: ScoreBound,
        max: ScoreBound,
    ) -> Result<Vec<String>> {
        let mut cmd = redis::cmd("ZRANGEBYSCORE");
        cmd.arg(set)
            .arg(Self::format_bound(min))
            .arg(Self::format_bound(max));
        self.run(cmd).await
    }

    async fn zrem(&self, set: &str, member: &str) -> Result<()> {
        let mut cmd = redis::cmd("ZREM");
        cmd.arg(set).arg(member);
        let _: i64 = self.run(cmd).await?;
        Ok(())
    }
}
