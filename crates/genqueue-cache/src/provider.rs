//! Backend selection for the result cache.

use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use genqueue_core::config::{CacheBackend, CacheConfig};
use genqueue_core::error::AppError;
use genqueue_core::result::AppResult;
use genqueue_core::traits::cache::CacheProvider;

/// Handle to the configured cache backend. Cheap to clone.
#[derive(Debug, Clone)]
pub struct CacheManager {
    provider: Arc<dyn CacheProvider>,
}

impl CacheManager {
    /// Open the backend named in the configuration.
    pub async fn connect(config: &CacheConfig) -> AppResult<Self> {
        let provider: Arc<dyn CacheProvider> = match config.provider {
            #[cfg(feature = "memory")]
            CacheBackend::Memory => Arc::new(crate::memory::MemoryCacheProvider::new(&config.memory)),
            #[cfg(feature = "redis-backend")]
            CacheBackend::Redis => {
                Arc::new(crate::redis::RedisCacheProvider::connect(&config.redis).await?)
            }
            #[allow(unreachable_patterns)]
            other => {
                return Err(AppError::configuration(format!(
                    "Cache backend '{other}' is not compiled into this build"
                )));
            }
        };

        info!(backend = provider.name(), "Result cache backend ready");
        Ok(Self { provider })
    }

    /// Wrap an already constructed backend.
    pub fn from_provider(provider: Arc<dyn CacheProvider>) -> Self {
        Self { provider }
    }

    /// Name of the active backend.
    pub fn backend(&self) -> &'static str {
        self.provider.name()
    }

    pub(crate) async fn read(&self, key: &str) -> AppResult<Option<String>> {
        self.provider.get(key).await
    }

    pub(crate) async fn write(&self, key: &str, value: &str, ttl: Duration) -> AppResult<()> {
        self.provider.put(key, value, ttl).await
    }

    pub(crate) async fn evict(&self, key: &str) -> AppResult<bool> {
        self.provider.remove(key).await
    }

    /// Check that the backend is reachable.
    pub async fn ping(&self) -> AppResult<bool> {
        self.provider.ping().await
    }
}
