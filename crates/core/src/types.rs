//! Common types used throughout Holocron

use crate::{HolocronError, Result};
use chrono::{DateTime, Local, Timelike, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;

/// Kind of entity a search was run against
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchType {
    People,
    Movies,
}

impl SearchType {
    /// Every tracked type, in aggregation order
    pub const ALL: [SearchType; 2] = [SearchType::People, SearchType::Movies];

    /// Key segment for this type
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::People => "people",
            Self::Movies => "movies",
        }
    }
}

impl fmt::Display for SearchType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SearchType {
    type Err = HolocronError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "people" => Ok(Self::People),
            "movies" => Ok(Self::Movies),
            other => Err(HolocronError::validation(format!(
                "Unknown search type: {}",
                other
            ))),
        }
    }
}

/// How search terms are folded before they become aggregation keys
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TermCasing {
    /// "Luke" and "luke" are tracked separately
    #[default]
    Preserve,
    /// Terms are lowercased
    Lowercase,
}

impl TermCasing {
    /// Apply the policy to a raw term
    pub fn apply(&self, term: &str) -> String {
        match self {
            Self::Preserve => term.to_string(),
            Self::Lowercase => term.to_lowercase(),
        }
    }
}

/// One completed search, as reported by the request layer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchEvent {
    pub search_type: SearchType,
    pub term: String,
    pub result_count: u64,
    pub response_time_ms: u64,
    pub observed_at: DateTime<Utc>,
}

impl SearchEvent {
    /// Create an event observed now
    pub fn new<S: Into<String>>(
        search_type: SearchType,
        term: S,
        result_count: u64,
        response_time_ms: u64,
    ) -> Self {
        Self {
            search_type,
            term: term.into(),
            result_count,
            response_time_ms,
            observed_at: Utc::now(),
        }
    }

    /// Override the observation time
    pub fn observed_at(mut self, at: DateTime<Utc>) -> Self {
        self.observed_at = at;
        self
    }

    /// Hour of day in the service-local timezone
    pub fn local_hour(&self) -> u32 {
        self.observed_at.with_timezone(&Local).hour()
    }
}

/// Per-term metadata hash
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TermMetadata {
    pub count: u64,
    pub total_response_time_ms: u64,
    pub last_searched_at: Option<DateTime<Utc>>,
    pub last_result_count: Option<u64>,
}

impl TermMetadata {
    /// Build from raw hash fields. Unparseable numeric fields read as zero.
    pub fn from_fields(fields: &HashMap<String, String>) -> Self {
        let number = |name: &str| {
            fields
                .get(name)
                .and_then(|v| v.trim().parse::<u64>().ok())
                .unwrap_or(0)
        };

        Self {
            count: number(crate::keys::META_COUNT),
            total_response_time_ms: number(crate::keys::META_TOTAL_RESPONSE_TIME),
            last_searched_at: fields
                .get(crate::keys::META_LAST_SEARCHED)
                .and_then(|v| DateTime::parse_from_rfc3339(v).ok())
                .map(|dt| dt.with_timezone(&Utc)),
            last_result_count: fields
                .get(crate::keys::META_RESULTS_COUNT)
                .and_then(|v| v.parse().ok()),
        }
    }

    /// Mean latency for this term
    pub fn average_response_time(&self) -> Option<f64> {
        if self.count == 0 {
            None
        } else {
            Some(self.total_response_time_ms as f64 / self.count as f64)
        }
    }
}

/// One entry of the top queries list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopQuery {
    pub term: String,
    pub count: u64,
    pub percentage: f64,
}

/// Searches observed during one hour of the day
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PopularHour {
    pub hour: u32,
    pub count: u64,
}

/// Aggregated search statistics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Statistics {
    pub top_queries: Vec<TopQuery>,
    pub average_response_time: f64,
    pub popular_hours: Vec<PopularHour>,
    pub total_searches: u64,
    pub searches_by_type: BTreeMap<SearchType, u64>,
}

impl Statistics {
    /// Statistics for an empty store
    pub fn empty() -> Self {
        Self {
            top_queries: Vec::new(),
            average_response_time: 0.0,
            popular_hours: Vec::new(),
            total_searches: 0,
            searches_by_type: SearchType::ALL.iter().map(|t| (*t, 0)).collect(),
        }
    }
}

/// Statistics wrapped with calculation and caching metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedStatistics {
    pub data: Statistics,
    pub calculated_at: DateTime<Utc>,
    pub calculation_time_ms: f64,
    pub cached_at: DateTime<Utc>,
    pub cache_miss: bool,
}

impl CachedStatistics {
    /// Wrap freshly computed statistics for the cache
    pub fn computed(data: Statistics, calculation_time_ms: f64) -> Self {
        let now = Utc::now();
        Self {
            data,
            calculated_at: now,
            calculation_time_ms,
            cached_at: now,
            cache_miss: false,
        }
    }

    /// Wrap statistics computed synchronously after a cache miss
    pub fn miss(data: Statistics) -> Self {
        let now = Utc::now();
        Self {
            data,
            calculated_at: now,
            calculation_time_ms: 0.0,
            cached_at: now,
            cache_miss: true,
        }
    }
}

/// Operational view of the snapshot cache slot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheInfo {
    pub is_cached: bool,
    pub cache_key: String,
    pub cache_ttl_seconds: u64,
    pub cached_at: Option<DateTime<Utc>>,
    pub calculated_at: Option<DateTime<Utc>>,
}

/// Round half-up to two decimal places
///
/// The scaled value is first cut to 15 significant digits, so decimal ties
/// such as `1.005` (stored as `1.00499999...`) round up.
///
/// # Examples
///
/// ```
/// use holocron_core::round2;
///
/// assert_eq!(round2(1.005), 1.01);
/// assert_eq!(round2(200.0 / 3.0), 66.67);
/// ```
pub fn round2(value: f64) -> f64 {
    if !value.is_finite() {
        return value;
    }
    let scaled = value * 100.0;
    let scaled = format!("{:.14e}", scaled).parse::<f64>().unwrap_or(scaled);
    scaled.round() / 100.0
}
