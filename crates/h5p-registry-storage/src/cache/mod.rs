//! Cache primitive contract and the default in-process implementation
//!
//! The registry only assumes atomic get/set/delete per key; it never assumes
//! cross-key transactions. Values are JSON so heterogeneous results
//! (booleans, strings, metadata records, listings) share one primitive.

pub mod key;

use async_trait::async_trait;
use moka::future::Cache;
use serde_json::Value;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

/// Result type alias for cache operations
pub type CacheResult<T> = std::result::Result<T, CacheError>;

/// Future producing a value for [`KeyValueCache::wrap`] on a cache miss
pub type Producer<'a> = Pin<Box<dyn Future<Output = CacheResult<Value>> + Send + 'a>>;

/// Cache-layer error types
#[derive(Error, Debug)]
pub enum CacheError {
    /// The cache backend failed
    #[error("Cache backend error: {0}")]
    Backend(String),

    /// A cached value could not be (de)serialized
    #[error("Cache serialization error: {0}")]
    Serialization(String),
}

/// Key-value cache contract
///
/// Implementations must provide atomic get/set/delete per key. Entries may
/// expire at any time; callers must treat every `get` miss as "recompute".
#[async_trait]
pub trait KeyValueCache: Send + Sync {
    /// Fetch a cached value
    async fn get(&self, key: &str) -> CacheResult<Option<Value>>;

    /// Store a value
    ///
    /// `ttl` is advisory; implementations with a cache-wide expiry policy may
    /// ignore it.
    async fn set(&self, key: &str, value: Value, ttl: Option<Duration>) -> CacheResult<()>;

    /// Remove a single key
    async fn delete(&self, key: &str) -> CacheResult<()>;

    /// Remove every entry
    async fn reset(&self) -> CacheResult<()>;

    /// Get-or-compute-and-store
    async fn wrap(
        &self,
        key: &str,
        ttl: Option<Duration>,
        producer: Producer<'_>,
    ) -> CacheResult<Value> {
        if let Some(hit) = self.get(key).await? {
            return Ok(hit);
        }
        let value = producer.await?;
        self.set(key, value.clone(), ttl).await?;
        Ok(value)
    }
}

/// Snapshot of cache effectiveness counters
#[derive(Debug, Clone, Copy)]
pub struct CacheStats {
    /// Lookups answered from the cache
    pub hits: u64,
    /// Lookups that fell through to the producer
    pub misses: u64,
    /// Approximate number of live entries
    pub entry_count: u64,
}

impl CacheStats {
    /// Calculate hit rate
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// In-process [`KeyValueCache`] backed by [`moka`]
///
/// Expiry is a cache-wide policy set at construction; the per-entry `ttl`
/// hint on [`set`](KeyValueCache::set) is ignored.
pub struct MokaCache {
    inner: Cache<String, Value>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl MokaCache {
    /// Create a cache bounded to `max_capacity` entries with no expiry
    pub fn with_capacity(max_capacity: u64) -> Self {
        Self::new(max_capacity, None)
    }

    /// Create a cache bounded to `max_capacity` entries, expiring entries
    /// `time_to_live` after insertion
    pub fn new(max_capacity: u64, time_to_live: Option<Duration>) -> Self {
        let mut builder = Cache::builder().max_capacity(max_capacity);
        if let Some(ttl) = time_to_live {
            builder = builder.time_to_live(ttl);
        }
        Self {
            inner: builder.build(),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Snapshot the hit/miss counters
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entry_count: self.inner.entry_count(),
        }
    }
}

#[async_trait]
impl KeyValueCache for MokaCache {
    async fn get(&self, key: &str) -> CacheResult<Option<Value>> {
        match self.inner.get(key).await {
            Some(value) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                debug!(key, "cache hit");
                Ok(Some(value))
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                debug!(key, "cache miss");
                Ok(None)
            }
        }
    }

    async fn set(&self, key: &str, value: Value, _ttl: Option<Duration>) -> CacheResult<()> {
        self.inner.insert(key.to_string(), value).await;
        Ok(())
    }

    async fn delete(&self, key: &str) -> CacheResult<()> {
        self.inner.invalidate(key).await;
        Ok(())
    }

    async fn reset(&self) -> CacheResult<()> {
        self.inner.invalidate_all();
        Ok(())
    }
}
