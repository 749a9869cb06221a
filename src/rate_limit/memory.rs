use super::store::{window_end, CounterStore, Expiry, Hit};
use crate::error::{LimiterError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Clone, Copy)]
struct Counter {
    count: i64,
    expires_at: Option<DateTime<Utc>>,
}

/// In-process counter store
///
/// Follows the same contract as the Redis store: a counter is created at 1
/// with its expiry pinned, later hits leave the expiry alone, and a counter
/// whose expiry has passed is treated as absent. Only useful when a single
/// process does all the limiting.
#[derive(Clone, Default)]
pub struct MemoryCounterStore {
    counters: Arc<DashMap<String, Counter>>,
}

impl MemoryCounterStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Write a counter with no expiry, as an outside writer would
    pub fn seed(&self, key: &str, count: i64) {
        self.counters.insert(
            key.to_string(),
            Counter {
                count,
                expires_at: None,
            },
        );
    }

    /// Current value of a live counter
    pub fn get(&self, key: &str) -> Option<i64> {
        let now = Utc::now();
        self.counters
            .get(key)
            .filter(|c| c.expires_at.map_or(true, |at| at > now))
            .map(|c| c.count)
    }

    /// Drop counters whose window has passed, returning how many went
    pub fn purge_expired(&self) -> usize {
        if self.is_empty() {
            return 0;
        }

        let now = Utc::now();
        let before = self.counters.len();
        self.counters
            .retain(|_, c| c.expires_at.map_or(true, |at| at > now));
        let purged = before.saturating_sub(self.counters.len());

        if purged > 0 {
            debug!(purged, "Purged expired counters");
        }
        purged
    }

    /// Number of stored counters, expired ones included until purged
    pub fn len(&self) -> usize {
        self.counters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counters.is_empty()
    }
}

#[async_trait]
impl CounterStore for MemoryCounterStore {
    async fn hit(&self, key: &str, window: Duration) -> Result<Hit> {
        let now = Utc::now();
        let fresh_expiry = window_end(now, window)?;

        // The entry guard holds the shard lock, making the batch atomic per key
        let mut counter = self.counters.entry(key.to_string()).or_insert(Counter {
            count: 0,
            expires_at: None,
        });

        if counter.expires_at.is_some_and(|at| at <= now) {
            counter.count = 0;
            counter.expires_at = None;
        }

        // Same as INCR on a counter at i64::MAX: refuse and leave it untouched
        counter.count = counter.count.checked_add(1).ok_or_else(|| {
            LimiterError::Reply(format!("Counter {} would overflow on increment", key))
        })?;
        let expires_at = *counter.expires_at.get_or_insert(fresh_expiry);

        Ok(Hit {
            count: counter.count,
            expiry: Expiry::At(expires_at),
        })
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}
