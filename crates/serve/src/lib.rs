//! Holocron Serve Library
//!
//! Search logging, statistics aggregation and caching, the scheduled
//! recompute job and the HTTP API in front of them.

use holocron_core::ServerSettings;

pub mod analytics;
pub mod api;
pub mod cache;
pub mod handlers;
pub mod middleware;
pub mod server;

pub use analytics::{
    AnalyticsServices, JobOutcome, RecomputeJob, RetryPolicy, SchedulerHandle, SearchLogger,
    StatisticsAggregator, StatisticsScheduler, StatisticsService,
};
pub use handlers::*;
pub use server::*;

/// Server version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// HTTP server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub cors_enabled: bool,
    pub max_request_size: usize,
    pub throttle_per_minute: u32,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::from(&ServerSettings::default())
    }
}

impl From<&ServerSettings> for ServerConfig {
    fn from(settings: &ServerSettings) -> Self {
        Self {
            host: settings.host.clone(),
            port: settings.port,
            cors_enabled: settings.cors_enabled,
            max_request_size: settings.max_request_size,
            throttle_per_minute: settings.throttle_per_minute,
        }
    }
}
