pub mod api;
pub mod config;
pub mod error;
pub mod metrics;
pub mod rate_limit;

use crate::config::{LimiterConfig, StoreBackend};
use crate::error::{LimiterError, Result};
use crate::metrics::MetricsService;
use crate::rate_limit::{
    CounterStore, MemoryCounterStore, RateLimitState, RateLimiter, RedisCounterStore,
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// How often the memory backend drops lapsed counters
const PURGE_INTERVAL: Duration = Duration::from_secs(30);

/// Connect the configured counter store and build the limiter
pub async fn build_limiter(config: &LimiterConfig) -> Result<RateLimiter> {
    let store: Arc<dyn CounterStore> = match config.store.backend {
        StoreBackend::Redis => {
            info!(url = %config.store.url, mode = ?config.store.mode, "Connecting to Redis");
            Arc::new(RedisCounterStore::connect(&config.store.url, config.store.mode).await?)
        }
        StoreBackend::Memory => {
            warn!("Using in-memory counters; limits are not shared between instances");
            let store = MemoryCounterStore::new();
            spawn_purger(store.clone());
            Arc::new(store)
        }
    };

    Ok(
        RateLimiter::new(store, config.limit.rate, config.limit.window())
            .with_key_prefix(config.limit.key_prefix.clone()),
    )
}

fn spawn_purger(store: MemoryCounterStore) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(PURGE_INTERVAL);
        loop {
            interval.tick().await;
            store.purge_expired();
        }
    });
}

/// Initialize the limiter service
pub async fn init_server(config: LimiterConfig) -> Result<()> {
    // Validate configuration
    config.validate()?;

    info!("Starting rate limiter");
    info!(
        rate = config.limit.rate,
        window_ms = config.limit.window_ms,
        "Limiting every identity"
    );

    let limiter = build_limiter(&config).await?;
    if let Err(e) = limiter.ping().await {
        warn!(error = %e, "Counter store did not answer ping, checks will fail until it does");
    }

    let metrics = MetricsService::new()?;
    let state = RateLimitState::new(limiter, config.server.timeout());
    let app = api::build_router(state, Some(metrics));

    // Bind and serve
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(LimiterError::Io)?;

    info!("Server listening on {}", addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .map_err(|e| LimiterError::Internal(format!("Server error: {}", e)))?;

    Ok(())
}

/// Initialize tracing/logging
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "window_limiter=debug,tower_http=debug".into()),
        )
        .with_target(false)
        .compact()
        .init();
}
