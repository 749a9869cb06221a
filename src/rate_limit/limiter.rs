use super::identity::{Identity, KeyBuilder};
use super::store::{window_end, CounterStore, Expiry};
use super::types::Info;
use crate::error::{LimiterError, Result};
use chrono::Utc;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Fixed-window rate limiter
///
/// Holds no per-identity state; every counter lives in the store, so any
/// number of tasks or processes can share one limiter configuration.
#[derive(Clone)]
pub struct RateLimiter {
    store: Arc<dyn CounterStore>,
    /// Hits allowed per window
    rate: i64,
    /// Length of a window, pinned at its first hit
    window: Duration,
    keys: KeyBuilder,
}

impl RateLimiter {
    /// Create a limiter. Performs no I/O and no validation; `rate` and
    /// `window` are expected to be positive.
    pub fn new(store: Arc<dyn CounterStore>, rate: i64, window: Duration) -> Self {
        Self {
            store,
            rate,
            window,
            keys: KeyBuilder::default(),
        }
    }

    /// Namespace every store key with `prefix`
    pub fn with_key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.keys = KeyBuilder::new(prefix);
        self
    }

    /// Count one hit for `identity` and report the window's state.
    ///
    /// Store errors are returned as-is; there is no retry and no timeout
    /// here. Dropping the future cancels the call, but a hit the store
    /// already applied stays counted.
    pub async fn check<I: Identity + ?Sized>(&self, identity: &I) -> Result<Info> {
        let key = self.keys.key(identity);
        let started = Instant::now();

        let hit = match self.store.hit(&key, self.window).await {
            Ok(hit) => hit,
            Err(e) => {
                crate::metrics::record_store_error();
                return Err(e);
            }
        };

        // INCR never yields less than one; anything else means the key holds foreign data
        if hit.count < 1 {
            crate::metrics::record_store_error();
            return Err(LimiterError::Reply(format!(
                "Counter {} returned {} after increment",
                key, hit.count
            )));
        }

        let expires_at = match hit.expiry {
            Expiry::At(at) => at,
            fallback => {
                warn!(
                    key = %key,
                    expiry = ?fallback,
                    "Counter has no readable expiry, assuming a fresh window"
                );
                window_end(Utc::now(), self.window)?
            }
        };

        let info = Info::new(hit.count, self.rate, expires_at);
        crate::metrics::record_check(info.is_exceeded(), started.elapsed().as_secs_f64());

        if info.is_exceeded() {
            warn!(key = %key, hits = info.hits(), limit = self.rate, "Rate limit exceeded");
        } else {
            debug!(
                key = %key,
                hits = info.hits(),
                remaining = info.remaining(),
                "Rate limit check passed"
            );
        }

        Ok(info)
    }

    /// Check that the store is reachable
    pub async fn ping(&self) -> Result<()> {
        self.store.ping().await
    }

    pub fn rate(&self) -> i64 {
        self.rate
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    pub fn key_prefix(&self) -> &str {
        self.keys.prefix()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rate_limit::memory::MemoryCounterStore;
    use crate::rate_limit::store::Hit;
    use async_trait::async_trait;
    use std::net::IpAddr;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn memory_limiter(rate: i64, window: Duration) -> (RateLimiter, MemoryCounterStore) {
        let store = MemoryCounterStore::new();
        let limiter = RateLimiter::new(Arc::new(store.clone()), rate, window);
        (limiter, store)
    }

    /// Store that answers with a fixed reply and counts calls
    struct ScriptedStore {
        reply: std::result::Result<Hit, fn() -> LimiterError>,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl CounterStore for ScriptedStore {
        async fn hit(&self, _key: &str, _window: Duration) -> Result<Hit> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match &self.reply {
                Ok(hit) => Ok(*hit),
                Err(make) => Err(make()),
            }
        }

        async fn ping(&self) -> Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_first_check_is_admitted() {
        let (limiter, _) = memory_limiter(1, Duration::from_secs(60));

        let info = limiter.check("203.0.113.9").await.unwrap();
        assert_eq!(info.hits(), 1);
        assert!(!info.is_exceeded());
        assert_eq!(info.remaining(), 0);
    }

    #[tokio::test]
    async fn test_scenario_rate_three_per_minute() {
        let (limiter, _) = memory_limiter(3, Duration::from_secs(60));
        let ip: IpAddr = "137.70.0.1".parse().unwrap();

        for expected in 1..=3 {
            let info = limiter.check(&ip).await.unwrap();
            assert_eq!(info.hits(), expected);
            assert!(!info.is_exceeded(), "call {} should be admitted", expected);
        }

        let info = limiter.check(&ip).await.unwrap();
        assert_eq!(info.hits(), 4);
        assert!(info.is_exceeded());
        assert_eq!(info.remaining(), 0);
        assert_eq!(info.limit(), 3);
    }

    #[tokio::test]
    async fn test_expiry_pinned_across_burst() {
        let (limiter, _) = memory_limiter(100, Duration::from_secs(60));

        let mut expiries = Vec::new();
        for _ in 0..5 {
            expiries.push(limiter.check("burst").await.unwrap().expires_at());
            tokio::time::sleep(Duration::from_millis(5)).await;
        }

        assert!(expiries.windows(2).all(|w| w[0] == w[1]));
    }

    #[tokio::test]
    async fn test_new_window_after_expiry() {
        let (limiter, _) = memory_limiter(2, Duration::from_millis(50));

        let first = limiter.check("k").await.unwrap();
        limiter.check("k").await.unwrap();
        assert!(limiter.check("k").await.unwrap().is_exceeded());

        tokio::time::sleep(Duration::from_millis(80)).await;

        let fresh = limiter.check("k").await.unwrap();
        assert_eq!(fresh.hits(), 1);
        assert!(fresh.expires_at() > first.expires_at());
    }

    #[tokio::test]
    async fn test_preseeded_counter() {
        let (limiter, store) = memory_limiter(3, Duration::from_secs(60));
        store.seed("137.70.0.1", 3);

        let before = Utc::now();
        let info = limiter.check("137.70.0.1").await.unwrap();
        assert_eq!(info.hits(), 4);
        assert!(info.is_exceeded());

        let resets = info.resets_in_at(before);
        assert!(resets >= chrono::Duration::seconds(59));
        assert!(resets <= chrono::Duration::seconds(61));
    }

    #[tokio::test]
    async fn test_identities_are_separate() {
        let (limiter, _) = memory_limiter(1, Duration::from_secs(60));

        limiter.check("10.0.0.1").await.unwrap();
        assert!(limiter.check("10.0.0.1").await.unwrap().is_exceeded());
        assert!(!limiter.check("10.0.0.2").await.unwrap().is_exceeded());
    }

    #[tokio::test]
    async fn test_key_prefix_is_applied() {
        let (limiter, store) = memory_limiter(5, Duration::from_secs(60));
        let limiter = limiter.with_key_prefix("limiter:");

        limiter.check("10.0.0.1").await.unwrap();
        assert_eq!(store.get("limiter:10.0.0.1"), Some(1));
        assert_eq!(store.get("10.0.0.1"), None);
        assert_eq!(limiter.key_prefix(), "limiter:");
    }

    #[tokio::test]
    async fn test_keeps_counting_past_limit() {
        let (limiter, store) = memory_limiter(1, Duration::from_secs(60));

        for _ in 0..5 {
            limiter.check("k").await.unwrap();
        }
        assert_eq!(store.get("k"), Some(5));
    }

    #[tokio::test]
    async fn test_missing_expiry_falls_back_to_window() {
        let store = ScriptedStore {
            reply: Ok(Hit {
                count: 2,
                expiry: Expiry::Persistent,
            }),
            calls: AtomicUsize::new(0),
        };
        let limiter = RateLimiter::new(Arc::new(store), 5, Duration::from_secs(30));

        let before = Utc::now();
        let info = limiter.check("k").await.unwrap();
        assert_eq!(info.hits(), 2);
        assert!(info.expires_at() >= before + chrono::Duration::seconds(30));
    }

    #[tokio::test]
    async fn test_store_error_is_not_retried() {
        let store = Arc::new(ScriptedStore {
            reply: Err(|| {
                LimiterError::from(redis::RedisError::from((
                    redis::ErrorKind::IoError,
                    "connection reset",
                )))
            }),
            calls: AtomicUsize::new(0),
        });
        let limiter = RateLimiter::new(store.clone(), 5, Duration::from_secs(30));

        let result = limiter.check("k").await;
        assert!(matches!(result, Err(LimiterError::Store(_))));
        assert_eq!(store.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_non_positive_count_is_rejected() {
        let store = ScriptedStore {
            reply: Ok(Hit {
                count: -3,
                expiry: Expiry::Missing,
            }),
            calls: AtomicUsize::new(0),
        };
        let limiter = RateLimiter::new(Arc::new(store), 5, Duration::from_secs(30));

        assert!(matches!(
            limiter.check("k").await,
            Err(LimiterError::Reply(_))
        ));
    }

    #[tokio::test]
    async fn test_huge_window_does_not_panic() {
        let (limiter, _) = memory_limiter(3, Duration::from_millis(9_000_000_000_000_000));

        let result = limiter.check("10.0.0.1").await;
        assert!(matches!(result, Err(LimiterError::Config(_))));
    }

    #[tokio::test]
    async fn test_huge_window_fallback_does_not_panic() {
        let store = ScriptedStore {
            reply: Ok(Hit {
                count: 1,
                expiry: Expiry::Missing,
            }),
            calls: AtomicUsize::new(0),
        };
        let limiter = RateLimiter::new(
            Arc::new(store),
            3,
            Duration::from_millis(9_000_000_000_000_000),
        );

        assert!(matches!(
            limiter.check("k").await,
            Err(LimiterError::Config(_))
        ));
    }

    #[tokio::test]
    async fn test_string_and_ip_identities_share_a_window() {
        let (limiter, store) = memory_limiter(5, Duration::from_secs(60));
        let ip: IpAddr = "::ffff:10.0.0.1".parse().unwrap();

        limiter.check(&ip).await.unwrap();
        let info = limiter.check("::ffff:10.0.0.1").await.unwrap();

        assert_eq!(info.hits(), 2);
        assert_eq!(store.get("10.0.0.1"), Some(2));
    }

    #[tokio::test]
    async fn test_concurrent_checks_count_exactly() {
        let (limiter, store) = memory_limiter(10, Duration::from_secs(60));

        let results = futures::future::join_all((0..25).map(|_| limiter.check("shared"))).await;
        let exceeded = results
            .into_iter()
            .map(|r| r.unwrap())
            .filter(|info| info.is_exceeded())
            .count();

        assert_eq!(exceeded, 15);
        assert_eq!(store.get("shared"), Some(25));
    }
}
