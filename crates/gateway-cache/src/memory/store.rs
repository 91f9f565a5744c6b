//! In-memory durable store using the moka crate.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use moka::Expiry;
use moka::future::Cache;
use tokio::sync::RwLock;
use tracing::debug;

use gateway_core::config::cache::MemoryCacheConfig;
use gateway_core::result::AppResult;
use gateway_core::traits::cache::CacheProvider;

/// A stored value together with its own time-to-live.
#[derive(Debug, Clone)]
struct StoredValue {
    value: Arc<str>,
    ttl: Duration,
    expires_at: Instant,
}

impl StoredValue {
    fn new(value: &str, ttl: Duration) -> Self {
        Self {
            value: Arc::from(value),
            ttl,
            expires_at: Instant::now() + ttl,
        }
    }

    fn is_live(&self) -> bool {
        Instant::now() < self.expires_at
    }
}

/// Per-entry expiry policy: every write sets the TTL it was given.
struct PerEntryTtl;

impl Expiry<String, StoredValue> for PerEntryTtl {
    fn expire_after_create(
        &self,
        _key: &String,
        value: &StoredValue,
        _created_at: Instant,
    ) -> Option<Duration> {
        Some(value.ttl)
    }

    fn expire_after_update(
        &self,
        _key: &String,
        value: &StoredValue,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        Some(value.ttl)
    }
}

/// In-memory durable store for single-node deployments and tests.
///
/// Multi-key writes and deletes take the write side of a gate that single-key
/// reads share, so readers never observe half of a `set_many`.
#[derive(Debug, Clone)]
pub struct MemoryCacheProvider {
    /// The underlying moka cache.
    cache: Cache<String, StoredValue>,
    /// Serializes multi-key operations against readers.
    gate: Arc<RwLock<()>>,
}

impl MemoryCacheProvider {
    /// Create a new in-memory store from configuration.
    pub fn new(config: &MemoryCacheConfig) -> Self {
        let cache = Cache::builder()
            .max_capacity(config.max_capacity)
            .expire_after(PerEntryTtl)
            .build();

        Self {
            cache,
            gate: Arc::new(RwLock::new(())),
        }
    }

    async fn live(&self, key: &str) -> Option<StoredValue> {
        self.cache.get(key).await.filter(StoredValue::is_live)
    }
}

impl Default for MemoryCacheProvider {
    fn default() -> Self {
        Self::new(&MemoryCacheConfig::default())
    }
}

#[async_trait]
impl CacheProvider for MemoryCacheProvider {
    async fn get(&self, key: &str) -> AppResult<Option<String>> {
        let _read = self.gate.read().await;
        Ok(self.live(key).await.map(|v| v.value.to_string()))
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> AppResult<()> {
        let _read = self.gate.read().await;
        self.cache
            .insert(key.to_string(), StoredValue::new(value, ttl))
            .await;
        Ok(())
    }

    async fn set_many(&self, entries: &[(String, String, Duration)]) -> AppResult<()> {
        let _write = self.gate.write().await;
        for (key, value, ttl) in entries {
            self.cache
                .insert(key.clone(), StoredValue::new(value, *ttl))
                .await;
        }
        Ok(())
    }

    async fn delete(&self, key: &str) -> AppResult<()> {
        let _read = self.gate.read().await;
        self.cache.invalidate(key).await;
        Ok(())
    }

    async fn delete_many(&self, keys: &[String]) -> AppResult<u64> {
        let _write = self.gate.write().await;
        let mut removed = 0u64;
        for key in keys {
            if let Some(value) = self.cache.remove(key).await {
                if value.is_live() {
                    removed += 1;
                }
            }
        }
        Ok(removed)
    }

    async fn exists(&self, key: &str) -> AppResult<bool> {
        let _read = self.gate.read().await;
        Ok(self.live(key).await.is_some())
    }

    async fn keys(&self, pattern: &str) -> AppResult<Vec<String>> {
        let _read = self.gate.read().await;
        let matches = |key: &str| match pattern.strip_suffix('*') {
            Some(prefix) => key.starts_with(prefix),
            None => key == pattern,
        };

        let mut found: Vec<String> = self
            .cache
            .iter()
            .filter(|(key, value)| value.is_live() && matches(key.as_str()))
            .map(|(key, _)| key.to_string())
            .collect();
        found.sort();

        debug!(pattern, count = found.len(), "Listed keys");
        Ok(found)
    }

    async fn health_check(&self) -> AppResult<bool> {
        Ok(true)
    }
}
