//! Storage backend behind the generation result cache.

use std::time::Duration;

use async_trait::async_trait;

use crate::result::AppResult;

/// Key-value backend holding serialized generation results.
///
/// Values are opaque text. Implementations own key namespacing and must
/// stop returning an entry once its TTL has elapsed.
#[async_trait]
pub trait CacheProvider: Send + Sync + std::fmt::Debug + 'static {
    /// Short backend name used in logs.
    fn name(&self) -> &'static str;

    /// Read an entry; `None` when absent or expired.
    async fn get(&self, key: &str) -> AppResult<Option<String>>;

    /// Write an entry that expires after `ttl`.
    async fn put(&self, key: &str, value: &str, ttl: Duration) -> AppResult<()>;

    /// Drop an entry. Returns whether it was present.
    async fn remove(&self, key: &str) -> AppResult<bool>;

    /// Check that the backend is reachable.
    async fn ping(&self) -> AppResult<bool>;
}
