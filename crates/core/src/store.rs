//! Event store contract
//!
//! The analytics counters live in a key/value server offering strings,
//! hashes and sorted sets with per-key expiry. Backends implement
//! [`EventStore`]; everything above this layer only sees the trait.

use crate::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

/// Key/value store with sorted sets, hashes, counters and TTLs
#[async_trait]
pub trait EventStore: Send + Sync + std::fmt::Debug {
    /// Short backend name for diagnostics
    fn backend_name(&self) -> &'static str;

    /// Increment `member` in the sorted set at `key`, returning the new score
    async fn zincr_by(&self, key: &str, member: &str, delta: f64) -> Result<f64>;

    /// Members between `start` and `stop` (inclusive) ordered by descending score.
    ///
    /// Negative indices count from the end, so `(0, -1)` is the whole set.
    /// Equal scores are ordered by member, descending.
    async fn zrevrange_with_scores(
        &self,
        key: &str,
        start: isize,
        stop: isize,
    ) -> Result<Vec<(String, f64)>>;

    /// Increment an integer hash field, returning the new value
    async fn hincr_by(&self, key: &str, field: &str, delta: i64) -> Result<i64>;

    /// Set a hash field
    async fn hset(&self, key: &str, field: &str, value: &str) -> Result<()>;

    /// All fields of a hash; empty when the key is absent
    async fn hgetall(&self, key: &str) -> Result<HashMap<String, String>>;

    /// Increment an integer string value, returning the new value
    async fn incr(&self, key: &str) -> Result<i64>;

    /// Read a string value
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Write a string value that expires after `ttl`
    async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> Result<()>;

    /// Reset the expiry of an existing key. Returns false when the key is absent.
    async fn expire(&self, key: &str, ttl: Duration) -> Result<bool>;

    /// Remaining lifetime of a key, `None` when absent or persistent
    async fn ttl(&self, key: &str) -> Result<Option<Duration>>;

    /// Remove a key. Returns false when the key was absent.
    async fn del(&self, key: &str) -> Result<bool>;

    /// Remove every key
    async fn flush(&self) -> Result<()>;

    /// Round-trip check
    async fn ping(&self) -> Result<()>;
}

/// Store handle shared by the logger, aggregator and caches
pub type SharedEventStore = Arc<dyn EventStore>;

/// Parse an integer counter read back from the store
pub fn parse_counter(key: &str, raw: Option<String>) -> Result<u64> {
    match raw {
        None => Ok(0),
        Some(value) => value.trim().parse::<i64>().map(|v| v.max(0) as u64).map_err(|e| {
            crate::HolocronError::aggregation(format!(
                "Counter '{}' holds non-integer value '{}': {}",
                key, value, e
            ))
        }),
    }
}
