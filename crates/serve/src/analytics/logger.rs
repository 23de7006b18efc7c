//! Search event logger
//!
//! Records one completed search into the event store counters. Logging is
//! best effort: store failures are reported through tracing and never reach
//! the caller, so an analytics outage cannot fail a user-facing search.

use chrono::SecondsFormat;
use holocron_core::{
    keys, AnalyticsConfig, HolocronError, Result, SearchEvent, SearchType, SharedEventStore,
    TermCasing,
};
use std::time::Duration;
use tracing::{error, info};

/// Writes search events into the event store
#[derive(Debug, Clone)]
pub struct SearchLogger {
    store: SharedEventStore,
    retention: Duration,
    casing: TermCasing,
}

impl SearchLogger {
    /// Creates a logger writing to `store`
    pub fn new(store: SharedEventStore, config: &AnalyticsConfig) -> Self {
        Self {
            store,
            retention: config.retention(),
            casing: config.term_casing,
        }
    }

    /// Logs a completed search. Never fails.
    ///
    /// # Arguments
    ///
    /// * `search_type` - `people` or `movies`, matched case-insensitively.
    ///   An unknown type is reported and dropped.
    /// * `term` - The search term as typed
    /// * `results_count` - Number of results the search returned
    /// * `response_time_ms` - How long the search took
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use holocron_serve::analytics::SearchLogger;
    ///
    /// # async fn example(logger: SearchLogger) {
    /// logger.log_search("people", "Luke Skywalker", 1, 245).await;
    /// # }
    /// ```
    pub async fn log_search(
        &self,
        search_type: &str,
        term: &str,
        results_count: u64,
        response_time_ms: u64,
    ) {
        match search_type.parse::<SearchType>() {
            Ok(search_type) => {
                let event = SearchEvent::new(search_type, term, results_count, response_time_ms);
                self.log_event(&event).await;
            }
            Err(e) => {
                error!(
                    error = %e,
                    search_type,
                    term,
                    "Failed to log search"
                );
            }
        }
    }

    /// Log a completed search event. Never fails.
    pub async fn log_event(&self, event: &SearchEvent) {
        match self.record(event).await {
            Ok(count) => {
                info!(
                    search_type = %event.search_type,
                    term = %self.casing.apply(&event.term),
                    count,
                    response_time_ms = event.response_time_ms,
                    "Search logged"
                );
            }
            Err(e) => {
                error!(
                    error = %e,
                    search_type = %event.search_type,
                    term = %event.term,
                    "Failed to log search"
                );
            }
        }
    }

    /// Apply every counter update for `event`, returning the term's running count.
    ///
    /// Updates are independent store commands; a failure part way leaves the
    /// earlier ones applied.
    pub async fn record(&self, event: &SearchEvent) -> Result<i64> {
        let response_time = i64::try_from(event.response_time_ms).map_err(|_| {
            HolocronError::validation(format!(
                "response time {}ms is out of range",
                event.response_time_ms
            ))
        })?;
        let store = &self.store;
        let term = self.casing.apply(&event.term);
        let search_type = event.search_type;

        let top_key = keys::top_terms(search_type);
        store.zincr_by(&top_key, &term, 1.0).await?;
        store.expire(&top_key, self.retention).await?;

        let meta_key = keys::term_meta(search_type, &term);
        let count = store.hincr_by(&meta_key, keys::META_COUNT, 1).await?;
        store
            .hincr_by(
                &meta_key,
                keys::META_TOTAL_RESPONSE_TIME,
                response_time,
            )
            .await?;
        store
            .hset(
                &meta_key,
                keys::META_LAST_SEARCHED,
                &event.observed_at.to_rfc3339_opts(SecondsFormat::Millis, true),
            )
            .await?;
        store
            .hset(
                &meta_key,
                keys::META_RESULTS_COUNT,
                &event.result_count.to_string(),
            )
            .await?;
        store.expire(&meta_key, self.retention).await?;

        let hour_key = keys::hour(event.local_hour());
        store.incr(&hour_key).await?;
        store.expire(&hour_key, self.retention).await?;

        let type_key = keys::type_count(search_type);
        store.incr(&type_key).await?;
        store.expire(&type_key, self.retention).await?;

        Ok(count)
    }
}
