//! Holocron Core Library
//!
//! Core types for the Holocron search analytics service: the search event
//! and statistics model, the event store key layout and the [`EventStore`]
//! contract every backend implements.

pub mod config;
pub mod error;
pub mod keys;
pub mod store;
pub mod types;

// Re-export commonly used types
pub use config::{
    AnalyticsConfig, CacheBackend, CacheConfig, HolocronConfig, JobConfig, LoggingConfig,
    ServerSettings, StoreBackend, StoreConfig,
};
pub use error::{HolocronError, Result};
pub use store::{EventStore, SharedEventStore};
pub use types::{
    round2, CacheInfo, CachedStatistics, PopularHour, SearchEvent, SearchType, Statistics,
    TermCasing, TermMetadata, TopQuery,
};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = env!("CARGO_PKG_NAME");
pub const DESCRIPTION: &str = env!("CARGO_PKG_DESCRIPTION");

/// Get version info as a formatted string
pub fn version_info() -> String {
    format!("{} v{} - {}", NAME, VERSION, DESCRIPTION)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_library_exports() {
        let _: Result<()> = Ok(());
        let _config = HolocronConfig::default();
        let _stats = Statistics::empty();
    }

    #[test]
    fn test_version_info() {
        let info = version_info();
        assert!(info.contains("holocron-core"));
        assert!(info.contains("v"));
    }
}
