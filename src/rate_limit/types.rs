use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

/// Snapshot of one identity's window, taken right after a hit was counted.
///
/// All decision methods are pure; an `Info` never talks to the store again.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Info {
    /// Hits in the current window, including the one that produced this snapshot
    hits: i64,
    /// Allowed hits per window
    limit: i64,
    /// When the store drops the window's counter
    expires_at: DateTime<Utc>,
}

impl Info {
    /// Create a new snapshot
    pub fn new(hits: i64, limit: i64, expires_at: DateTime<Utc>) -> Self {
        Self {
            hits,
            limit,
            expires_at,
        }
    }

    /// Whether the window's allowance is used up.
    ///
    /// The hit that lands exactly on the limit is still admitted.
    pub fn is_exceeded(&self) -> bool {
        self.hits > self.limit
    }

    /// Hits left in the current window, never negative
    pub fn remaining(&self) -> i64 {
        (self.limit - self.hits).max(0)
    }

    /// Time until the window resets, measured from now.
    ///
    /// Zero or negative once the window has lapsed on the wall clock.
    pub fn resets_in(&self) -> Duration {
        self.resets_in_at(Utc::now())
    }

    /// Time until the window resets, measured from `now`
    pub fn resets_in_at(&self, now: DateTime<Utc>) -> Duration {
        self.expires_at - now
    }

    /// Whole seconds until reset, rounded up and clamped at zero
    pub fn retry_after_secs(&self) -> u64 {
        let millis = self.resets_in().num_milliseconds();
        if millis <= 0 {
            0
        } else {
            (millis as u64).div_ceil(1000)
        }
    }

    pub fn limit(&self) -> i64 {
        self.limit
    }

    pub fn hits(&self) -> i64 {
        self.hits
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }
}
