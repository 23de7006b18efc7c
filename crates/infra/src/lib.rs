//! Holocron Infrastructure Library
//!
//! Event store backends and logging setup. The in-memory store is always
//! available; the Redis backend is compiled in with the `redis` feature.

use holocron_core::{HolocronError, Result, SharedEventStore, StoreBackend, StoreConfig};
use std::sync::Arc;

pub mod logger;
pub mod memory_store;
#[cfg(feature = "redis")]
pub mod redis_store;

pub use logger::*;
pub use memory_store::MemoryStore;
#[cfg(feature = "redis")]
pub use redis_store::RedisStore;

/// Infrastructure version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Open the event store selected by `config`
pub async fn connect_store(config: &StoreConfig) -> Result<SharedEventStore> {
    tracing::info!(backend = ?config.backend, "Opening event store v{}", VERSION);

    match config.backend {
        StoreBackend::Memory => Ok(Arc::new(MemoryStore::new())),
        #[cfg(feature = "redis")]
        StoreBackend::Redis => Ok(Arc::new(RedisStore::connect(&config.redis_url).await?)),
        #[cfg(not(feature = "redis"))]
        StoreBackend::Redis => Err(HolocronError::validation(
            "Redis backend requested but holocron was built without the `redis` feature",
        )),
    }
}

/// Health check for the event store
pub async fn health_check(store: &SharedEventStore) -> HealthStatus {
    let started = tokio::time::Instant::now();
    let result = store.ping().await;

    HealthStatus {
        backend: store.backend_name(),
        store_accessible: result.is_ok(),
        latency_ms: started.elapsed().as_millis() as u64,
        error: result.err().map(|e: HolocronError| e.to_string()),
    }
}

/// Health status for infrastructure components
#[derive(Debug, Clone)]
pub struct HealthStatus {
    pub backend: &'static str,
    pub store_accessible: bool,
    pub latency_ms: u64,
    pub error: Option<String>,
}

impl HealthStatus {
    pub fn is_healthy(&self) -> bool {
        self.store_accessible
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_connect_memory_store() {
        let store = connect_store(&StoreConfig::default()).await.unwrap();
        assert_eq!(store.backend_name(), "memory");
        assert!(store.ping().await.is_ok());
    }

    #[cfg(not(feature = "redis"))]
    #[tokio::test]
    async fn test_redis_backend_requires_feature() {
        let config = StoreConfig {
            backend: StoreBackend::Redis,
            ..Default::default()
        };
        assert!(matches!(
            connect_store(&config).await,
            Err(HolocronError::Validation { .. })
        ));
    }

    #[tokio::test]
    async fn test_health_check() {
        let memory = Arc::new(MemoryStore::new());
        let store: SharedEventStore = memory.clone();

        let status = health_check(&store).await;
        assert!(status.is_healthy());
        assert_eq!(status.backend, "memory");
        assert!(status.error.is_none());

        memory.set_available(false);
        let status = health_check(&store).await;
        assert!(!status.is_healthy());
        assert!(status.error.is_some());
    }
}
