//! Fixed-window rate limiting
//!
//! Every identity gets one counter in a shared store. The first hit of a
//! window creates the counter at 1 and pins its expiry to `now + window`;
//! later hits only increment it. When the store drops the counter the next
//! hit starts a new window.
//!
//! # Backends
//!
//! - **Redis / Valkey**: one pipelined round trip (`INCR`, `PEXPIRE NX`,
//!   `PEXPIRETIME`), or a Lua script for servers without `NX`
//! - **Memory**: in-process counters for single-instance deployments and tests
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use window_limiter::rate_limit::{BatchMode, RateLimiter, RedisCounterStore};
//!
//! #[tokio::main]
//! async fn main() -> window_limiter::error::Result<()> {
//!     let store = RedisCounterStore::connect("redis://localhost:6379", BatchMode::Pipeline).await?;
//!     let limiter = RateLimiter::new(Arc::new(store), 3, Duration::from_secs(60));
//!
//!     let info = limiter.check("137.70.0.1").await?;
//!     if info.is_exceeded() {
//!         println!("retry in {}s", info.retry_after_secs());
//!     }
//!     Ok(())
//! }
//! ```

pub mod identity;
pub mod limiter;
pub mod lua_scripts;
pub mod memory;
pub mod middleware;
pub mod redis;
pub mod store;
pub mod types;

// Re-export commonly used types
pub use identity::{Identity, KeyBuilder};
pub use limiter::RateLimiter;
pub use memory::MemoryCounterStore;
pub use middleware::{
    add_rate_limit_headers, check_with_timeout, rate_limit_middleware, RateLimitState,
};
pub use self::redis::{BatchMode, RedisCounterStore};
pub use store::{CounterStore, Expiry, Hit};
pub use types::Info;
