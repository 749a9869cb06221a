use crate::error::{LimiterError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use std::time::Duration;

/// Expiry of a counter as reported back by the store
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expiry {
    /// The counter is dropped at this instant
    At(DateTime<Utc>),
    /// The key exists but carries no expiry
    Persistent,
    /// The key vanished before its expiry could be read
    Missing,
}

impl Expiry {
    /// Decode a Redis `PEXPIRETIME`/`PTTL`-style reply where -1 means no
    /// expiry and -2 means no key
    pub(crate) fn from_sentinel(
        value: i64,
        to_instant: impl FnOnce(i64) -> Option<DateTime<Utc>>,
    ) -> Self {
        match value {
            -1 => Expiry::Persistent,
            v if v < 0 => Expiry::Missing,
            v => to_instant(v).map(Expiry::At).unwrap_or(Expiry::Missing),
        }
    }
}

/// Result of one increment batch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Hit {
    /// Counter value after the increment
    pub count: i64,
    pub expiry: Expiry,
}

/// Shared store holding one counter per identity.
///
/// `hit` runs three steps as one round trip: increment the counter
/// (creating it at 1), set its expiry to `window` only if none is set, then
/// read the expiry back. Each step is atomic on its own; the batch as a whole
/// is not a transaction.
#[async_trait]
pub trait CounterStore: Send + Sync {
    async fn hit(&self, key: &str, window: Duration) -> Result<Hit>;

    /// Check that the store is reachable
    async fn ping(&self) -> Result<()>;
}

/// Window length as a signed delta for wall-clock arithmetic
pub(crate) fn window_delta(window: Duration) -> Result<ChronoDuration> {
    ChronoDuration::from_std(window)
        .map_err(|e| LimiterError::Config(format!("Window {:?} out of range: {}", window, e)))
}

/// End of a window starting at `start`, or an error if it is not representable
pub(crate) fn window_end(start: DateTime<Utc>, window: Duration) -> Result<DateTime<Utc>> {
    start
        .checked_add_signed(window_delta(window)?)
        .ok_or_else(|| LimiterError::Config(format!("Window {:?} ends out of range", window)))
}
