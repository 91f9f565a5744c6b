//! Cache provider trait for the durable session store.

use std::time::Duration;

use async_trait::async_trait;

use crate::result::AppResult;

/// Trait for durable cache backends (Redis or in-memory).
///
/// All values are strings (JSON). The provider is responsible for key
/// prefixing and TTL enforcement.
#[async_trait]
pub trait CacheProvider: Send + Sync + std::fmt::Debug + 'static {
    /// Get a value by key. Returns `None` if the key does not exist or has expired.
    async fn get(&self, key: &str) -> AppResult<Option<String>>;

    /// Set a value with a TTL.
    async fn set(&self, key: &str, value: &str, ttl: Duration) -> AppResult<()>;

    /// Set several keys atomically: either every entry becomes visible or none does.
    async fn set_many(&self, entries: &[(String, String, Duration)]) -> AppResult<()>;

    /// Delete a key. Deleting a missing key is not an error.
    async fn delete(&self, key: &str) -> AppResult<()>;

    /// Delete several keys atomically. Returns how many existed.
    async fn delete_many(&self, keys: &[String]) -> AppResult<u64>;

    /// Check whether a key exists.
    async fn exists(&self, key: &str) -> AppResult<bool>;

    /// List keys matching a glob-style pattern (only a trailing `*` is
    /// required to be supported). Returned keys do not carry the prefix.
    async fn keys(&self, pattern: &str) -> AppResult<Vec<String>>;

    /// Check that the backend is reachable.
    async fn health_check(&self) -> AppResult<bool>;
}
