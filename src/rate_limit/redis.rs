use super::lua_scripts::PINNED_WINDOW_SCRIPT;
use super::store::{CounterStore, Expiry, Hit};
use crate::error::Result;
use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use redis::{aio::ConnectionManager, Script};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, error};

/// How the increment batch is sent to Redis
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchMode {
    /// `INCR`, `PEXPIRE NX` and `PEXPIRETIME` in one pipeline (Redis/Valkey 7+)
    #[default]
    Pipeline,
    /// One Lua script, for servers without `NX` expiry options
    Script,
}

/// Redis-backed counter store
///
/// The connection manager multiplexes and reconnects on its own, so the
/// store is shared by cloning rather than behind a lock.
#[derive(Clone)]
pub struct RedisCounterStore {
    /// Redis connection manager
    connection: ConnectionManager,
    /// Batch mode to use
    mode: BatchMode,
    script: Script,
}

impl RedisCounterStore {
    /// Connect to Redis
    pub async fn connect(redis_url: &str, mode: BatchMode) -> Result<Self> {
        let client = redis::Client::open(redis_url)?;
        let connection = ConnectionManager::new(client).await?;

        Ok(Self::from_connection(connection, mode))
    }

    /// Wrap an existing connection manager
    pub fn from_connection(connection: ConnectionManager, mode: BatchMode) -> Self {
        Self {
            connection,
            mode,
            script: Script::new(PINNED_WINDOW_SCRIPT),
        }
    }

    async fn hit_pipelined(&self, key: &str, window: Duration) -> Result<Hit> {
        let mut connection = self.connection.clone();

        let (count, _applied, expire_time): (i64, i64, i64) = redis::pipe()
            .incr(key, 1)
            .cmd("PEXPIRE")
            .arg(key)
            .arg(window_millis(window))
            .arg("NX")
            .cmd("PEXPIRETIME")
            .arg(key)
            .query_async(&mut connection)
            .await?;

        let expiry =
            Expiry::from_sentinel(expire_time, |ms| Utc.timestamp_millis_opt(ms).single());

        Ok(Hit { count, expiry })
    }

    async fn hit_scripted(&self, key: &str, window: Duration) -> Result<Hit> {
        let mut connection = self.connection.clone();

        let (count, expire_time): (i64, i64) = self
            .script
            .key(key)
            .arg(window_millis(window))
            .invoke_async(&mut connection)
            .await?;

        let expiry =
            Expiry::from_sentinel(expire_time, |ms| Utc.timestamp_millis_opt(ms).single());

        Ok(Hit { count, expiry })
    }
}

#[async_trait]
impl CounterStore for RedisCounterStore {
    async fn hit(&self, key: &str, window: Duration) -> Result<Hit> {
        let result = match self.mode {
            BatchMode::Pipeline => self.hit_pipelined(key, window).await,
            BatchMode::Script => self.hit_scripted(key, window).await,
        };

        match &result {
            Ok(hit) => debug!(key, count = hit.count, expiry = ?hit.expiry, "Counted hit"),
            Err(e) => error!(key, error = %e, "Redis error while counting hit"),
        }

        result
    }

    async fn ping(&self) -> Result<()> {
        let mut connection = self.connection.clone();
        redis::cmd("PING")
            .query_async::<_, String>(&mut connection)
            .await?;
        Ok(())
    }
}

/// Window length in whole milliseconds, at least one
fn window_millis(window: Duration) -> u64 {
    (window.as_millis() as u64).max(1)
}
