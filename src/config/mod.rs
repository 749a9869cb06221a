use crate::error::{LimiterError, Result};
use crate::rate_limit::BatchMode;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Longest accepted window: one year
pub const MAX_WINDOW_MS: u64 = 365 * 24 * 60 * 60 * 1000;

/// Main limiter service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimiterConfig {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,
    /// Counter store configuration
    #[serde(default)]
    pub store: StoreConfig,
    /// Limit applied to every identity
    pub limit: LimitConfig,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Server host address
    #[serde(default = "default_host")]
    pub host: String,
    /// Server port
    #[serde(default = "default_port")]
    pub port: u16,
    /// Upper bound on one check, store round trip included
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

/// Which counter store backs the limiter
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    #[default]
    Redis,
    /// In-process counters, only correct for a single instance
    Memory,
}

/// Counter store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default)]
    pub backend: StoreBackend,
    /// Redis connection URL
    #[serde(default = "default_redis_url")]
    pub url: String,
    /// How the increment batch is sent
    #[serde(default)]
    pub mode: BatchMode,
}

/// Rate limit configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimitConfig {
    /// Maximum hits per window
    pub rate: i64,
    /// Window length in milliseconds
    pub window_ms: u64,
    /// Prepended to every store key
    #[serde(default)]
    pub key_prefix: String,
}

impl LimitConfig {
    /// Get the window as a Duration
    pub fn window(&self) -> Duration {
        Duration::from_millis(self.window_ms)
    }
}

impl ServerConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_timeout_ms() -> u64 {
    250
}

fn default_redis_url() -> String {
    "redis://127.0.0.1:6379".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            timeout_ms: default_timeout_ms(),
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::default(),
            url: default_redis_url(),
            mode: BatchMode::default(),
        }
    }
}

impl LimiterConfig {
    /// Load configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| LimiterError::Config(format!("Failed to read config file: {}", e)))?;

        Self::from_yaml(&content)
    }

    /// Parse configuration from YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml)
            .map_err(|e| LimiterError::Config(format!("Failed to parse config: {}", e)))
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.limit.rate <= 0 {
            return Err(LimiterError::Config(
                "Rate limit rate must be > 0".to_string(),
            ));
        }
        if self.limit.window_ms == 0 {
            return Err(LimiterError::Config(
                "Rate limit window must be > 0".to_string(),
            ));
        }
        if self.limit.window_ms > MAX_WINDOW_MS {
            return Err(LimiterError::Config(format!(
                "Rate limit window must be <= {}ms, got {}ms",
                MAX_WINDOW_MS, self.limit.window_ms
            )));
        }
        if self.server.timeout_ms == 0 {
            return Err(LimiterError::Config(
                "Server timeout must be > 0".to_string(),
            ));
        }

        if self.store.backend == StoreBackend::Redis
            && !self.store.url.starts_with("redis://")
            && !self.store.url.starts_with("rediss://")
            && !self.store.url.starts_with("unix://")
        {
            return Err(LimiterError::Config(format!(
                "Store URL must start with redis://, rediss:// or unix://, got: {}",
                self.store.url
            )));
        }

        Ok(())
    }

    /// Create a default configuration for testing
    pub fn default_config() -> Self {
        Self {
            server: ServerConfig::default(),
            store: StoreConfig {
                backend: StoreBackend::Memory,
                ..StoreConfig::default()
            },
            limit: LimitConfig {
                rate: 3,
                window_ms: 60_000,
                key_prefix: String::new(),
            },
        }
    }
}
