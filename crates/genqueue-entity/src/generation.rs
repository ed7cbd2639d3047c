//! Cached generation results.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A generation result as stored in the result cache.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedGeneration {
    /// Opaque payload returned by the backend.
    pub result: serde_json::Value,
    /// Bookkeeping recorded alongside the payload.
    pub metadata: CacheMetadata,
}

/// Metadata stored with a cached result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheMetadata {
    /// Model that produced the result.
    pub model_id: String,
    /// Wall time of the backend call.
    pub generation_time_ms: i64,
    /// Credits the original request cost.
    pub cost_credits: i64,
    /// Reserved for a future quality signal.
    pub quality_score: Option<f64>,
    /// When the entry was written.
    pub cached_at: DateTime<Utc>,
}
