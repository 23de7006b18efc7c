//! Configuration types for Holocron

use crate::{types::TermCasing, HolocronError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use url::Url;

/// Environment variable prefix for overrides, e.g. `HOLOCRON__JOB__TRIES=5`
pub const ENV_PREFIX: &str = "HOLOCRON";

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HolocronConfig {
    /// Version of the configuration schema
    pub version: String,
    /// Event store connection
    pub store: StoreConfig,
    /// Search logging and aggregation
    pub analytics: AnalyticsConfig,
    /// Statistics snapshot cache
    pub cache: CacheConfig,
    /// Scheduled recompute job
    pub job: JobConfig,
    /// HTTP server
    pub server: ServerSettings,
    /// Logging configuration
    pub logging: LoggingConfig,
}

impl Default for HolocronConfig {
    fn default() -> Self {
        Self {
            version: "1.0".to_string(),
            store: StoreConfig::default(),
            analytics: AnalyticsConfig::default(),
            cache: CacheConfig::default(),
            job: JobConfig::default(),
            server: ServerSettings::default(),
            logging: LoggingConfig::default(),
        }
    }
}

/// Which event store backend to use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    /// Process-local store, lost on restart
    Memory,
    /// Redis server at `redis_url`
    Redis,
}

/// Event store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub backend: StoreBackend,
    pub redis_url: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::Memory,
            redis_url: "redis://127.0.0.1:6379/0".to_string(),
        }
    }
}

/// Search logging and aggregation settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyticsConfig {
    /// Days a counter survives after its most recent write
    pub retention_days: u64,
    /// Whether terms are case-folded before counting
    pub term_casing: TermCasing,
    /// Length of the merged top queries list
    pub top_queries_limit: usize,
    /// Terms fetched from each type's ranking before merging
    pub per_type_limit: usize,
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            retention_days: 30,
            term_casing: TermCasing::Preserve,
            top_queries_limit: 5,
            per_type_limit: 5,
        }
    }
}

impl AnalyticsConfig {
    /// Counter retention window
    pub fn retention(&self) -> Duration {
        Duration::from_secs(self.retention_days * 24 * 60 * 60)
    }
}

/// Where the statistics snapshot is cached
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheBackend {
    /// Alongside the counters in the event store
    Store,
    /// In-process cache
    Memory,
}

/// Snapshot cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub backend: CacheBackend,
    pub ttl_seconds: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            backend: CacheBackend::Store,
            ttl_seconds: 3600,
        }
    }
}

impl CacheConfig {
    /// Snapshot time to live
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_seconds)
    }
}

/// Scheduled recompute job configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct JobConfig {
    /// Run the job on a timer while serving
    pub enabled: bool,
    /// Seconds between runs
    pub interval_seconds: u64,
    /// Total attempts per run
    pub tries: u32,
    /// Per-attempt execution limit in seconds
    pub timeout_seconds: u64,
    /// Delay before each retry, indexed by attempt
    pub backoff_seconds: Vec<u64>,
    /// Run once immediately instead of waiting a full interval
    pub run_on_startup: bool,
}

impl Default for JobConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_seconds: 300,
            tries: 3,
            timeout_seconds: 120,
            backoff_seconds: vec![10, 30, 60],
            run_on_startup: true,
        }
    }
}

impl JobConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_seconds)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }

    pub fn backoff(&self) -> Vec<Duration> {
        self.backoff_seconds
            .iter()
            .map(|s| Duration::from_secs(*s))
            .collect()
    }
}

/// HTTP server settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    pub cors_enabled: bool,
    pub max_request_size: usize,
    /// Requests per minute accepted on the API routes
    pub throttle_per_minute: u32,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8000,
            cors_enabled: true,
            max_request_size: 64 * 1024,
            throttle_per_minute: 1000,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level
    pub level: String,
    /// Output format: "text" or "json"
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "text".to_string(),
        }
    }
}

impl HolocronConfig {
    /// Load configuration from an optional file plus `HOLOCRON__*` environment overrides
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder();

        if let Some(path) = path {
            if !path.exists() {
                return Err(HolocronError::not_found(format!(
                    "Configuration file not found: {:?}",
                    path
                )));
            }
            builder = builder.add_source(config::File::from(path));
        }

        let settings = builder
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("job.backoff_seconds"),
            )
            .build()?;

        let config: HolocronConfig = settings.try_deserialize()?;
        tracing::debug!(?path, "Configuration loaded");
        Ok(config)
    }

    /// Load configuration from a file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;

        // Try YAML first, then JSON
        match serde_yaml::from_str(&content) {
            Ok(config) => Ok(config),
            Err(_) => {
                let config = serde_json::from_str(&content)?;
                Ok(config)
            }
        }
    }

    /// Save configuration to a file
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = serde_yaml::to_string(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.store.backend == StoreBackend::Redis {
            let url = Url::parse(&self.store.redis_url)?;
            if url.scheme() != "redis" && url.scheme() != "rediss" {
                return Err(HolocronError::validation(
                    "Redis URL must use redis or rediss scheme",
                ));
            }
        }

        if self.analytics.retention_days == 0 {
            return Err(HolocronError::validation(
                "Retention must be at least one day",
            ));
        }
        if self.analytics.top_queries_limit == 0 || self.analytics.per_type_limit == 0 {
            return Err(HolocronError::validation(
                "Top query limits must be positive",
            ));
        }

        if self.cache.ttl_seconds == 0 {
            return Err(HolocronError::validation("Cache TTL must be positive"));
        }

        if self.job.tries == 0 {
            return Err(HolocronError::validation("Job must allow at least one try"));
        }
        if self.job.interval_seconds == 0 || self.job.timeout_seconds == 0 {
            return Err(HolocronError::validation(
                "Job interval and timeout must be positive",
            ));
        }
        if self.job.backoff_seconds.is_empty() {
            return Err(HolocronError::validation(
                "Job backoff table cannot be empty",
            ));
        }

        if self.server.throttle_per_minute == 0 {
            return Err(HolocronError::validation(
                "Throttle must allow at least one request per minute",
            ));
        }

        Ok(())
    }
}
