//! Statistics aggregator
//!
//! Derives the statistics snapshot from the raw event store counters and
//! writes the wrapped result into the snapshot cache.

use crate::cache::SharedSnapshotCache;
use holocron_core::store::parse_counter;
use holocron_core::{
    keys, round2, AnalyticsConfig, CachedStatistics, PopularHour, Result, SearchType,
    SharedEventStore, Statistics, TermMetadata, TopQuery,
};
use std::collections::BTreeMap;
use std::time::Instant;
use tracing::{debug, info};

/// Computes statistics snapshots from the event store
#[derive(Debug, Clone)]
pub struct StatisticsAggregator {
    store: SharedEventStore,
    cache: SharedSnapshotCache,
    top_queries_limit: usize,
    per_type_limit: usize,
}

impl StatisticsAggregator {
    /// Creates an aggregator reading `store` and writing `cache`
    pub fn new(store: SharedEventStore, cache: SharedSnapshotCache, config: &AnalyticsConfig) -> Self {
        Self {
            store,
            cache,
            top_queries_limit: config.top_queries_limit,
            per_type_limit: config.per_type_limit,
        }
    }

    /// Snapshot cache this aggregator writes to
    pub fn cache(&self) -> &SharedSnapshotCache {
        &self.cache
    }

    /// Computes statistics from the current counters and caches them
    ///
    /// # Returns
    ///
    /// Returns the unwrapped statistics. Any store error propagates and
    /// nothing is cached in that case.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use holocron_serve::analytics::StatisticsAggregator;
    ///
    /// # async fn example(aggregator: StatisticsAggregator) -> holocron_core::Result<()> {
    /// let stats = aggregator.calculate_statistics().await?;
    /// println!("{} searches", stats.total_searches);
    /// # Ok(())
    /// # }
    /// ```
    pub async fn calculate_statistics(&self) -> Result<Statistics> {
        let started = Instant::now();

        let searches_by_type = self.searches_by_type().await?;
        let total_searches: u64 = searches_by_type.values().sum();

        let stats = Statistics {
            top_queries: self.top_queries(total_searches).await?,
            average_response_time: self.average_response_time().await?,
            popular_hours: self.popular_hours().await?,
            total_searches,
            searches_by_type,
        };

        let calculation_time_ms = round2(started.elapsed().as_secs_f64() * 1000.0);
        self.cache
            .put(&CachedStatistics::computed(stats.clone(), calculation_time_ms))
            .await?;

        info!(
            calculation_time_ms,
            cache_key = self.cache.key(),
            total_searches,
            "Statistics calculated and cached"
        );

        Ok(stats)
    }

    /// Counter value for every tracked type, zero when absent
    async fn searches_by_type(&self) -> Result<BTreeMap<SearchType, u64>> {
        let mut by_type = BTreeMap::new();
        for search_type in SearchType::ALL {
            let key = keys::type_count(search_type);
            let count = parse_counter(&key, self.store.get(&key).await?)?;
            by_type.insert(search_type, count);
        }
        Ok(by_type)
    }

    /// Most searched terms across all types with their share of all searches
    async fn top_queries(&self, total_searches: u64) -> Result<Vec<TopQuery>> {
        if total_searches == 0 {
            return Ok(Vec::new());
        }

        let stop = self.per_type_limit as isize - 1;
        let mut merged: Vec<(String, u64)> = Vec::new();
        for search_type in SearchType::ALL {
            let ranked = self
                .store
                .zrevrange_with_scores(&keys::top_terms(search_type), 0, stop)
                .await?;
            merged.extend(ranked.into_iter().map(|(term, score)| (term, score.max(0.0) as u64)));
        }

        // Stable: equal counts keep type order, then rank order within a type
        merged.sort_by(|a, b| b.1.cmp(&a.1));
        merged.truncate(self.top_queries_limit);

        Ok(merged
            .into_iter()
            .map(|(term, count)| TopQuery {
                term,
                count,
                percentage: round2(count as f64 / total_searches as f64 * 100.0),
            })
            .collect())
    }

    /// Mean latency over every logged search of every term
    async fn average_response_time(&self) -> Result<f64> {
        let mut total_time: u64 = 0;
        let mut total_count: u64 = 0;

        for search_type in SearchType::ALL {
            let terms = self
                .store
                .zrevrange_with_scores(&keys::top_terms(search_type), 0, -1)
                .await?;

            for (term, _) in terms {
                let fields = self
                    .store
                    .hgetall(&keys::term_meta(search_type, &term))
                    .await?;
                let meta = TermMetadata::from_fields(&fields);

                if meta.total_response_time_ms == 0 || meta.count == 0 {
                    debug!(search_type = %search_type, term = %term, "Skipping term without latency data");
                    continue;
                }
                total_time += meta.total_response_time_ms;
                total_count += meta.count;
            }
        }

        if total_count == 0 {
            return Ok(0.0);
        }
        Ok(round2(total_time as f64 / total_count as f64))
    }

    /// Non-empty hour buckets, busiest first
    async fn popular_hours(&self) -> Result<Vec<PopularHour>> {
        let mut hours = Vec::new();
        for (hour, key) in keys::all_hours() {
            let count = parse_counter(&key, self.store.get(&key).await?)?;
            if count > 0 {
                hours.push(PopularHour { hour, count });
            }
        }

        // Stable: ties stay in hour order
        hours.sort_by(|a, b| b.count.cmp(&a.count));
        Ok(hours)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{SnapshotCache, StoreSnapshotCache};
    use holocron_core::{EventStore, HolocronError};
    use holocron_infra::MemoryStore;
    use std::sync::Arc;
    use std::time::Duration;

    fn setup() -> (Arc<MemoryStore>, StatisticsAggregator) {
        let store = Arc::new(MemoryStore::new());
        let shared: SharedEventStore = store.clone();
        let cache = Arc::new(StoreSnapshotCache::new(
            shared.clone(),
            Duration::from_secs(3600),
        ));
        let aggregator = StatisticsAggregator::new(shared, cache, &AnalyticsConfig::default());
        (store, aggregator)
    }

    async fn seed_term(store: &MemoryStore, search_type: SearchType, term: &str, count: u64) {
        for _ in 0..count {
            store
                .zincr_by(&keys::top_terms(search_type), term, 1.0)
                .await
                .unwrap();
            store.incr(&keys::type_count(search_type)).await.unwrap();
        }
    }

    #[tokio::test]
    async fn test_empty_store() {
        let (_store, aggregator) = setup();
        let stats = aggregator.calculate_statistics().await.unwrap();

        assert_eq!(stats.total_searches, 0);
        assert_eq!(stats.average_response_time, 0.0);
        assert!(stats.top_queries.is_empty());
        assert!(stats.popular_hours.is_empty());
        assert_eq!(stats.searches_by_type.get(&SearchType::People), Some(&0));
        assert_eq!(stats.searches_by_type.get(&SearchType::Movies), Some(&0));
    }

    #[tokio::test]
    async fn test_result_is_cached_as_hit() {
        let (store, aggregator) = setup();
        seed_term(&store, SearchType::People, "Luke", 2).await;

        let stats = aggregator.calculate_statistics().await.unwrap();
        let cached = aggregator.cache().get().await.unwrap().unwrap();

        assert_eq!(cached.data, stats);
        assert!(!cached.cache_miss);
        assert_eq!(cached.calculated_at, cached.cached_at);
        assert!(cached.calculation_time_ms >= 0.0);
    }

    #[tokio::test]
    async fn test_top_queries_merge_across_types() {
        let (store, aggregator) = setup();
        seed_term(&store, SearchType::People, "Luke", 4).await;
        seed_term(&store, SearchType::Movies, "A New Hope", 3).await;
        seed_term(&store, SearchType::People, "Leia", 2).await;
        seed_term(&store, SearchType::Movies, "Empire", 1).await;

        let stats = aggregator.calculate_statistics().await.unwrap();
        let terms: Vec<&str> = stats.top_queries.iter().map(|q| q.term.as_str()).collect();
        assert_eq!(terms, vec!["Luke", "A New Hope", "Leia", "Empire"]);
        assert_eq!(stats.top_queries[0].percentage, 40.0);
        assert_eq!(stats.top_queries[3].percentage, 10.0);
    }

    #[tokio::test]
    async fn test_top_queries_ties_keep_type_order() {
        let (store, aggregator) = setup();
        seed_term(&store, SearchType::Movies, "Jedi", 1).await;
        seed_term(&store, SearchType::People, "Yoda", 1).await;

        let stats = aggregator.calculate_statistics().await.unwrap();
        let terms: Vec<&str> = stats.top_queries.iter().map(|q| q.term.as_str()).collect();
        assert_eq!(terms, vec!["Yoda", "Jedi"]);
    }

    #[tokio::test]
    async fn test_top_queries_capped() {
        let (store, aggregator) = setup();
        for (i, term) in ["a", "b", "c", "d", "e", "f", "g"].iter().enumerate() {
            seed_term(&store, SearchType::People, term, 10 - i as u64).await;
        }
        seed_term(&store, SearchType::Movies, "m", 9).await;

        let stats = aggregator.calculate_statistics().await.unwrap();
        let counts: Vec<u64> = stats.top_queries.iter().map(|q| q.count).collect();
        assert_eq!(counts, vec![10, 9, 9, 8, 7]);
        assert_eq!(stats.top_queries[1].term, "b");
        assert_eq!(stats.top_queries[2].term, "m");
    }

    #[tokio::test]
    async fn test_average_skips_terms_without_latency() {
        let (store, aggregator) = setup();
        seed_term(&store, SearchType::People, "Luke", 2).await;
        seed_term(&store, SearchType::People, "Han", 1).await;

        let luke = keys::term_meta(SearchType::People, "Luke");
        store.hincr_by(&luke, "count", 2).await.unwrap();
        store.hincr_by(&luke, "total_response_time", 301).await.unwrap();

        let han = keys::term_meta(SearchType::People, "Han");
        store.hincr_by(&han, "count", 1).await.unwrap();
        store.hset(&han, "total_response_time", "0").await.unwrap();

        let stats = aggregator.calculate_statistics().await.unwrap();
        assert_eq!(stats.average_response_time, 150.5);
    }

    #[tokio::test]
    async fn test_average_rounds_to_two_places() {
        let (store, aggregator) = setup();
        seed_term(&store, SearchType::Movies, "Clones", 3).await;
        let meta = keys::term_meta(SearchType::Movies, "Clones");
        store.hincr_by(&meta, "count", 3).await.unwrap();
        store.hincr_by(&meta, "total_response_time", 100).await.unwrap();

        let stats = aggregator.calculate_statistics().await.unwrap();
        assert_eq!(stats.average_response_time, 33.33);
    }

    #[tokio::test]
    async fn test_average_rounds_decimal_tie_up() {
        let (store, aggregator) = setup();
        seed_term(&store, SearchType::People, "Lando", 200).await;
        let meta = keys::term_meta(SearchType::People, "Lando");
        store.hincr_by(&meta, "count", 200).await.unwrap();
        store.hincr_by(&meta, "total_response_time", 201).await.unwrap();

        let stats = aggregator.calculate_statistics().await.unwrap();
        assert_eq!(stats.average_response_time, 1.01);
    }

    #[tokio::test]
    async fn test_popular_hours_sorted_with_stable_ties() {
        let (store, aggregator) = setup();
        for (hour, count) in [(3u32, 2u32), (9, 5), (14, 2), (22, 1)] {
            for _ in 0..count {
                store.incr(&keys::hour(hour)).await.unwrap();
            }
        }

        let stats = aggregator.calculate_statistics().await.unwrap();
        assert_eq!(
            stats.popular_hours,
            vec![
                PopularHour { hour: 9, count: 5 },
                PopularHour { hour: 3, count: 2 },
                PopularHour { hour: 14, count: 2 },
                PopularHour { hour: 22, count: 1 },
            ]
        );
    }

    #[tokio::test]
    async fn test_store_outage_propagates_and_skips_cache() {
        let (store, aggregator) = setup();
        store.set_available(false);

        let result = aggregator.calculate_statistics().await;
        assert!(matches!(result, Err(HolocronError::StoreUnavailable { .. })));

        store.set_available(true);
        assert!(aggregator.cache().get().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_garbage_counter_fails_aggregation() {
        let (store, aggregator) = setup();
        store
            .set_ex(&keys::hour(5), "lots", Duration::from_secs(60))
            .await
            .unwrap();

        let result = aggregator.calculate_statistics().await;
        assert!(matches!(result, Err(HolocronError::AggregationFailed { .. })));
    }

    #[tokio::test]
    async fn test_idempotent_without_writes() {
        let (store, aggregator) = setup();
        seed_term(&store, SearchType::People, "Luke", 3).await;
        seed_term(&store, SearchType::Movies, "Empire", 1).await;

        let first = aggregator.calculate_statistics().await.unwrap();
        let second = aggregator.calculate_statistics().await.unwrap();
        assert_eq!(first, second);
    }
}
