//! Statistics snapshot cache
//!
//! One slot, last write wins. The default backend keeps the snapshot in the
//! event store next to the counters so every process sharing the store sees
//! the same snapshot; the moka backend keeps it in process memory.

use async_trait::async_trait;
use holocron_core::keys::STATISTICS_CACHE_KEY;
use holocron_core::{
    CacheBackend, CacheConfig, CachedStatistics, HolocronError, Result, SharedEventStore,
};
use moka::future::Cache;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Storage for the wrapped statistics snapshot
#[async_trait]
pub trait SnapshotCache: Send + Sync + std::fmt::Debug {
    /// Cache key of the slot
    fn key(&self) -> &str;

    /// Lifetime of a written snapshot
    fn ttl(&self) -> Duration;

    /// Read the snapshot, `None` when absent or expired
    async fn get(&self) -> Result<Option<CachedStatistics>>;

    /// Overwrite the snapshot
    async fn put(&self, snapshot: &CachedStatistics) -> Result<()>;

    /// Drop the snapshot
    async fn invalidate(&self) -> Result<()>;
}

/// Snapshot cache shared by the aggregator and the read path
pub type SharedSnapshotCache = Arc<dyn SnapshotCache>;

/// Build the cache selected by `config`
pub fn create_snapshot_cache(config: &CacheConfig, store: SharedEventStore) -> SharedSnapshotCache {
    match config.backend {
        CacheBackend::Store => Arc::new(StoreSnapshotCache::new(store, config.ttl())),
        CacheBackend::Memory => Arc::new(MokaSnapshotCache::new(config.ttl())),
    }
}

/// Snapshot serialized as JSON into the event store
#[derive(Debug, Clone)]
pub struct StoreSnapshotCache {
    store: SharedEventStore,
    key: String,
    ttl: Duration,
}

impl StoreSnapshotCache {
    pub fn new(store: SharedEventStore, ttl: Duration) -> Self {
        Self {
            store,
            key: STATISTICS_CACHE_KEY.to_string(),
            ttl,
        }
    }
}

#[async_trait]
impl SnapshotCache for StoreSnapshotCache {
    fn key(&self) -> &str {
        &self.key
    }

    fn ttl(&self) -> Duration {
        self.ttl
    }

    async fn get(&self) -> Result<Option<CachedStatistics>> {
        let Some(raw) = self.store.get(&self.key).await? else {
            return Ok(None);
        };

        serde_json::from_str(&raw).map(Some).map_err(|e| {
            HolocronError::cache(format!("Unreadable snapshot at '{}': {}", self.key, e))
        })
    }

    async fn put(&self, snapshot: &CachedStatistics) -> Result<()> {
        let raw = serde_json::to_string(snapshot)?;
        self.store.set_ex(&self.key, &raw, self.ttl).await?;
        debug!(key = %self.key, bytes = raw.len(), "Snapshot cached");
        Ok(())
    }

    async fn invalidate(&self) -> Result<()> {
        self.store.del(&self.key).await?;
        Ok(())
    }
}

/// Snapshot held in an in-process moka cache
#[derive(Debug, Clone)]
pub struct MokaSnapshotCache {
    cache: Cache<String, CachedStatistics>,
    key: String,
    ttl: Duration,
}

impl MokaSnapshotCache {
    pub fn new(ttl: Duration) -> Self {
        let cache = Cache::builder().max_capacity(1).time_to_live(ttl).build();

        Self {
            cache,
            key: STATISTICS_CACHE_KEY.to_string(),
            ttl,
        }
    }
}

#[async_trait]
impl SnapshotCache for MokaSnapshotCache {
    fn key(&self) -> &str {
        &self.key
    }

    fn ttl(&self) -> Duration {
        self.ttl
    }

    async fn get(&self) -> Result<Option<CachedStatistics>> {
        Ok(self.cache.get(&self.key).await)
    }

    async fn put(&self, snapshot: &CachedStatistics) -> Result<()> {
        self.cache.insert(self.key.clone(), snapshot.clone()).await;
        Ok(())
    }

    async fn invalidate(&self) -> Result<()> {
        self.cache.invalidate(&self.key).await;
        Ok(())
    }
}
