//! Statistics read path
//!
//! Serves the cached snapshot and falls back to a synchronous calculation
//! when the slot is empty.

use super::aggregator::StatisticsAggregator;
use crate::cache::SharedSnapshotCache;
use holocron_core::{CacheInfo, CachedStatistics, Result};
use tracing::{info, warn};

/// Read access to the latest statistics
#[derive(Debug, Clone)]
pub struct StatisticsService {
    aggregator: StatisticsAggregator,
    cache: SharedSnapshotCache,
}

impl StatisticsService {
    pub fn new(aggregator: StatisticsAggregator) -> Self {
        let cache = aggregator.cache().clone();
        Self { aggregator, cache }
    }

    /// Aggregator used for cache-miss fallbacks
    pub fn aggregator(&self) -> &StatisticsAggregator {
        &self.aggregator
    }

    /// Latest statistics, from the cache when present.
    ///
    /// On a miss the statistics are computed now; the aggregator re-populates
    /// the cache and the returned wrapper is marked `cache_miss` with a zero
    /// calculation time. A cache read error counts as a miss. Aggregation
    /// errors propagate.
    pub async fn get_latest_statistics(&self) -> Result<CachedStatistics> {
        match self.cache.get().await {
            Ok(Some(cached)) => {
                info!(cache_key = self.cache.key(), "Statistics served from cache");
                return Ok(cached);
            }
            Ok(None) => {
                warn!(cache_key = self.cache.key(), "Statistics cache miss, calculating now");
            }
            Err(e) => {
                warn!(
                    cache_key = self.cache.key(),
                    error = %e,
                    "Statistics cache unreadable, calculating now"
                );
            }
        }

        let data = self.aggregator.calculate_statistics().await?;
        Ok(CachedStatistics::miss(data))
    }

    /// Describe the cache slot without computing anything
    pub async fn cache_info(&self) -> CacheInfo {
        let cached = match self.cache.get().await {
            Ok(cached) => cached,
            Err(e) => {
                warn!(error = %e, "Statistics cache unreadable");
                None
            }
        };

        CacheInfo {
            is_cached: cached.is_some(),
            cache_key: self.cache.key().to_string(),
            cache_ttl_seconds: self.cache.ttl().as_secs(),
            cached_at: cached.as_ref().map(|c| c.cached_at),
            calculated_at: cached.as_ref().map(|c| c.calculated_at),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{MokaSnapshotCache, SnapshotCache, StoreSnapshotCache};
    use holocron_core::{AnalyticsConfig, EventStore, HolocronError, SharedEventStore, Statistics};
    use holocron_infra::MemoryStore;
    use std::sync::Arc;
    use std::time::Duration;

    fn service_with_store_cache() -> (Arc<MemoryStore>, StatisticsService) {
        let store = Arc::new(MemoryStore::new());
        let shared: SharedEventStore = store.clone();
        let cache = Arc::new(StoreSnapshotCache::new(
            shared.clone(),
            Duration::from_secs(3600),
        ));
        let aggregator = StatisticsAggregator::new(shared, cache, &AnalyticsConfig::default());
        (store, StatisticsService::new(aggregator))
    }

    #[tokio::test]
    async fn test_miss_computes_and_populates() {
        let (_store, service) = service_with_store_cache();

        let first = service.get_latest_statistics().await.unwrap();
        assert!(first.cache_miss);
        assert_eq!(first.calculation_time_ms, 0.0);
        assert_eq!(first.data.total_searches, 0);

        let second = service.get_latest_statistics().await.unwrap();
        assert!(!second.cache_miss);
        assert_eq!(second.data, first.data);
    }

    #[tokio::test]
    async fn test_hit_is_returned_verbatim() {
        let (_store, service) = service_with_store_cache();
        let mut stats = Statistics::empty();
        stats.total_searches = 42;
        let snapshot = CachedStatistics::computed(stats, 3.25);
        service.cache.put(&snapshot).await.unwrap();

        let served = service.get_latest_statistics().await.unwrap();
        assert_eq!(served, snapshot);
    }

    #[tokio::test]
    async fn test_unreadable_cache_counts_as_miss() {
        let (store, service) = service_with_store_cache();
        store
            .set_ex("statistics:latest", "garbage", Duration::from_secs(60))
            .await
            .unwrap();

        let served = service.get_latest_statistics().await.unwrap();
        assert!(served.cache_miss);

        // The fallback calculation overwrote the corrupt slot
        assert!(service.cache.get().await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_outage_on_miss_propagates() {
        let (store, service) = service_with_store_cache();
        store.set_available(false);

        assert!(matches!(
            service.get_latest_statistics().await,
            Err(HolocronError::StoreUnavailable { .. })
        ));
    }

    #[tokio::test]
    async fn test_memory_cache_survives_store_outage() {
        let store = Arc::new(MemoryStore::new());
        let shared: SharedEventStore = store.clone();
        let cache = Arc::new(MokaSnapshotCache::new(Duration::from_secs(3600)));
        let aggregator = StatisticsAggregator::new(shared, cache, &AnalyticsConfig::default());
        let service = StatisticsService::new(aggregator);

        service.aggregator().calculate_statistics().await.unwrap();
        store.set_available(false);

        let served = service.get_latest_statistics().await.unwrap();
        assert!(!served.cache_miss);
    }

    #[tokio::test]
    async fn test_cache_info() {
        let (_store, service) = service_with_store_cache();

        let info = service.cache_info().await;
        assert!(!info.is_cached);
        assert_eq!(info.cache_key, "statistics:latest");
        assert_eq!(info.cache_ttl_seconds, 3600);
        assert!(info.cached_at.is_none());

        service.aggregator().calculate_statistics().await.unwrap();
        let info = service.cache_info().await;
        assert!(info.is_cached);
        assert!(info.cached_at.is_some());
        assert_eq!(info.cached_at, info.calculated_at);
    }

    #[tokio::test]
    async fn test_cache_info_never_computes() {
        let (store, service) = service_with_store_cache();
        service.cache_info().await;
        assert!(store.is_empty());
    }
}
