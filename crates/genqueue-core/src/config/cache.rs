//! Result cache configuration.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Where generation results are kept for reuse.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheBackend {
    /// Process-local, lost on restart.
    #[default]
    Memory,
    /// Shared between server instances.
    Redis,
}

impl fmt::Display for CacheBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Memory => "memory",
            Self::Redis => "redis",
        })
    }
}

/// Result cache configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Cache backend.
    pub provider: CacheBackend,
    /// How long a generation result stays reusable, in seconds.
    pub result_ttl_seconds: u64,
    /// Redis backend settings.
    pub redis: RedisCacheConfig,
    /// In-memory backend settings.
    pub memory: MemoryCacheConfig,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            provider: CacheBackend::default(),
            result_ttl_seconds: default_result_ttl(),
            redis: RedisCacheConfig::default(),
            memory: MemoryCacheConfig::default(),
        }
    }
}

impl CacheConfig {
    /// Result lifetime as a [`Duration`].
    pub fn result_ttl(&self) -> Duration {
        Duration::from_secs(self.result_ttl_seconds)
    }
}

/// Redis backend configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedisCacheConfig {
    /// Redis connection URL.
    #[serde(default = "default_redis_url")]
    pub url: String,
    /// Namespace prepended to every key.
    #[serde(default = "default_key_prefix")]
    pub key_prefix: String,
}

impl RedisCacheConfig {
    /// Connection URL with any password replaced by `****`.
    pub fn redacted_url(&self) -> String {
        super::redact_url(&self.url)
    }
}

impl Default for RedisCacheConfig {
    fn default() -> Self {
        Self {
            url: default_redis_url(),
            key_prefix: default_key_prefix(),
        }
    }
}

/// In-memory backend configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryCacheConfig {
    /// Entry count at which the least useful results are evicted.
    #[serde(default = "default_max_entries")]
    pub max_entries: u64,
    /// Hard cap on any entry's lifetime, in seconds.
    #[serde(default = "default_max_entry_ttl")]
    pub max_entry_ttl_seconds: u64,
}

impl Default for MemoryCacheConfig {
    fn default() -> Self {
        Self {
            max_entries: default_max_entries(),
            max_entry_ttl_seconds: default_max_entry_ttl(),
        }
    }
}

fn default_result_ttl() -> u64 {
    3600
}

fn default_redis_url() -> String {
    "redis://localhost:6379".to_string()
}

fn default_key_prefix() -> String {
    "genqueue:".to_string()
}

fn default_max_entries() -> u64 {
    10_000
}

fn default_max_entry_ttl() -> u64 {
    86_400
}
