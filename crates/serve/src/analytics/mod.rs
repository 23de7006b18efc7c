//! Search analytics
//!
//! # Architecture
//!
//! - `logger`: writes one search event into the event store counters
//! - `aggregator`: derives the statistics snapshot and caches it
//! - `statistics`: read path serving the cached snapshot with a compute fallback
//! - `job`: recompute job with retry, backoff and per-attempt timeout
//! - `scheduler`: timer driving the job in the background
//!
//! The logger swallows store failures; the aggregator propagates them; the
//! job turns them into bounded retries and a terminal failure record.

pub mod aggregator;
pub mod job;
pub mod logger;
pub mod scheduler;
pub mod statistics;

pub use aggregator::StatisticsAggregator;
pub use job::{
    JobFailure, JobFailureHandler, JobOutcome, LoggingFailureHandler, RecomputeJob, Recompute,
    RetryPolicy,
};
pub use logger::SearchLogger;
pub use scheduler::{SchedulerHandle, SchedulerStats, StatisticsScheduler};
pub use statistics::StatisticsService;

use crate::cache::create_snapshot_cache;
use holocron_core::{HolocronConfig, JobConfig, SharedEventStore};
use std::sync::Arc;

/// Logger and statistics services sharing one store and one snapshot cache
#[derive(Debug, Clone)]
pub struct AnalyticsServices {
    pub store: SharedEventStore,
    pub logger: SearchLogger,
    pub statistics: StatisticsService,
}

impl AnalyticsServices {
    /// Wire every component from configuration
    pub fn from_config(store: SharedEventStore, config: &HolocronConfig) -> Self {
        let cache = create_snapshot_cache(&config.cache, store.clone());
        let aggregator = StatisticsAggregator::new(store.clone(), cache, &config.analytics);

        Self {
            logger: SearchLogger::new(store.clone(), &config.analytics),
            statistics: StatisticsService::new(aggregator),
            store,
        }
    }

    /// Recompute job bound to this aggregator
    pub fn recompute_job(&self, config: &JobConfig) -> RecomputeJob {
        let aggregator = Arc::new(self.statistics.aggregator().clone());
        RecomputeJob::new(aggregator, RetryPolicy::from(config))
    }

    /// Scheduler for the recompute job, not yet started
    pub fn scheduler(&self, config: &JobConfig) -> StatisticsScheduler {
        StatisticsScheduler::new(self.recompute_job(config), config.interval())
            .run_on_startup(config.run_on_startup)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use holocron_infra::MemoryStore;

    #[tokio::test]
    async fn test_services_share_the_store() {
        let store: SharedEventStore = Arc::new(MemoryStore::new());
        let services = AnalyticsServices::from_config(store, &HolocronConfig::default());

        services.logger.log_search("movies", "Return of the Jedi", 1, 120).await;
        let job = services.recompute_job(&JobConfig::default());
        assert!(job.run().await.is_completed());

        let latest = services.statistics.get_latest_statistics().await.unwrap();
        assert!(!latest.cache_miss);
        assert_eq!(latest.data.total_searches, 1);
        assert_eq!(latest.data.average_response_time, 120.0);
    }
}
