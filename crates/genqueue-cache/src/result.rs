//! Generation result cache.

use std::time::Duration;

use chrono::Utc;
use tracing::{debug, warn};

use genqueue_core::error::{AppError, ErrorKind};
use genqueue_core::result::AppResult;
use genqueue_entity::generation::{CacheMetadata, CachedGeneration};
use genqueue_entity::job::GenerationParams;

use crate::keys;
use crate::provider::CacheManager;

/// Stores generation results under request fingerprints.
///
/// Provider errors are returned to the caller; an entry that no longer
/// deserializes is dropped and reported as a miss.
#[derive(Debug, Clone)]
pub struct ResultCache {
    cache: CacheManager,
    ttl: Duration,
}

impl ResultCache {
    /// Wrap a cache manager with the given entry lifetime.
    pub fn new(cache: CacheManager, ttl: Duration) -> Self {
        Self { cache, ttl }
    }

    /// Fingerprint of a request, used as the lookup key.
    pub fn fingerprint(model_id: &str, user_id: &str, params: &GenerationParams) -> String {
        keys::fingerprint(model_id, user_id, params)
    }

    /// Look up a previously stored result.
    pub async fn get(&self, fingerprint: &str) -> AppResult<Option<CachedGeneration>> {
        let key = keys::generation_result(fingerprint);
        let Some(raw) = self.cache.read(&key).await? else {
            return Ok(None);
        };

        match serde_json::from_str::<CachedGeneration>(&raw) {
            Ok(entry) => {
                debug!(fingerprint, model_id = %entry.metadata.model_id, "Result cache hit");
                Ok(Some(entry))
            }
            Err(e) => {
                warn!(fingerprint, error = %e, "Discarding unreadable cache entry");
                self.cache.evict(&key).await?;
                Ok(None)
            }
        }
    }

    /// Store a result with its generation metadata.
    pub async fn put(
        &self,
        fingerprint: &str,
        result: serde_json::Value,
        model_id: &str,
        generation_time_ms: i64,
        cost_credits: i64,
    ) -> AppResult<()> {
        let entry = CachedGeneration {
            result,
            metadata: CacheMetadata {
                model_id: model_id.to_string(),
                generation_time_ms,
                cost_credits,
                quality_score: None,
                cached_at: Utc::now(),
            },
        };
        let raw = serde_json::to_string(&entry).map_err(|e| {
            AppError::with_source(ErrorKind::Serialization, "Failed to encode cache entry", e)
        })?;
        self.cache
            .write(&keys::generation_result(fingerprint), &raw, self.ttl)
            .await
    }

    /// Check that the underlying provider is reachable.
    pub async fn health_check(&self) -> AppResult<bool> {
        self.cache.ping().await
    }
}
