//! # Configuration
//!
//! Tunables for the factory and the backends it creates. Every struct has
//! a `Default` matching production values and `with_*` builders.
//!
//! ```rust
//! use std::time::Duration;
//! use mufs::{MufsConfig, PoolConfig};
//!
//! let config = MufsConfig::default()
//!     .with_pool(PoolConfig::default().with_max_connections(2))
//!     .with_temp_dir("/var/tmp/mufs");
//! assert_eq!(config.pool.max_connections, 2);
//! assert_eq!(config.cache.ttl, Duration::from_secs(300));
//! ```

use std::path::PathBuf;
use std::time::Duration;

/// Top-level configuration owned by a [`ResourceFactory`](crate::ResourceFactory).
#[derive(Debug, Clone, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct MufsConfig {
    /// Resolved-handle cache.
    pub cache: CacheConfig,
    /// FTP connection pools.
    pub pool: PoolConfig,
    /// URL backend client.
    pub http: HttpConfig,
    /// Where temporary resources are created. `None` means the platform
    /// temp directory.
    pub temp_dir: Option<PathBuf>,
}

impl MufsConfig {
    /// Replace the cache settings.
    pub fn with_cache(mut self, cache: CacheConfig) -> Self {
        self.cache = cache;
        self
    }

    /// Replace the pool settings.
    pub fn with_pool(mut self, pool: PoolConfig) -> Self {
        self.pool = pool;
        self
    }

    /// Replace the HTTP settings.
    pub fn with_http(mut self, http: HttpConfig) -> Self {
        self.http = http;
        self
    }

    /// Create temporary resources under `dir`.
    pub fn with_temp_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.temp_dir = Some(dir.into());
        self
    }

    /// The effective temporary directory.
    pub fn temp_dir(&self) -> PathBuf {
        self.temp_dir.clone().unwrap_or_else(std::env::temp_dir)
    }
}

/// Resolved-handle cache settings.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct CacheConfig {
    /// Maximum number of cached entries.
    pub capacity: usize,
    /// Entries unused for this long are evicted.
    pub ttl: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            capacity: 1024,
            ttl: Duration::from_secs(5 * 60),
        }
    }
}

impl CacheConfig {
    /// Set the entry capacity.
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    /// Set the idle time-to-live.
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }
}

/// Per-host connection pool settings.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct PoolConfig {
    /// Initial high-water mark.
    pub max_connections: usize,
    /// Attempts before [`MufsError::PoolExhausted`](crate::MufsError::PoolExhausted).
    pub max_attempts: u32,
    /// Sleep between attempts.
    pub retry_delay: Duration,
    /// TCP connect timeout.
    pub connect_timeout: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_connections: 8,
            max_attempts: 50,
            retry_delay: Duration::from_millis(100),
            connect_timeout: Duration::from_secs(10),
        }
    }
}

impl PoolConfig {
    /// Set the initial high-water mark (at least 1).
    pub fn with_max_connections(mut self, max: usize) -> Self {
        self.max_connections = max.max(1);
        self
    }

    /// Set the attempt bound.
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts;
        self
    }

    /// Set the retry sleep.
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    /// Set the connect timeout.
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }
}

/// URL backend settings.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct HttpConfig {
    /// Connect timeout for each request.
    pub connect_timeout: Duration,
    /// `User-Agent` header value.
    pub user_agent: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            user_agent: "Mozilla/5.0 (compatible; mufs)".to_string(),
        }
    }
}

impl HttpConfig {
    /// Set the connect timeout.
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set the user agent.
    pub fn with_user_agent(mut self, agent: impl Into<String>) -> Self {
        self.user_agent = agent.into();
        self
    }
}
