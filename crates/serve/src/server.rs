//! Server module for the Holocron serve crate

use crate::analytics::AnalyticsServices;
use crate::api::create_routes;
use crate::handlers::AppState;
use crate::middleware::create_rate_limiter;
use crate::ServerConfig;
use axum::{
    http::{
        header::{ACCEPT, CONTENT_TYPE},
        Method,
    },
    Router,
};
use holocron_core::{HolocronError, Result};
use std::future::Future;
use std::net::SocketAddr;
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    limit::RequestBodyLimitLayer,
    trace::TraceLayer,
};

/// Holocron HTTP server
pub struct HolocronServer {
    config: ServerConfig,
    app: Router,
}

impl HolocronServer {
    /// Create a new server instance
    pub fn new(config: ServerConfig, analytics: AnalyticsServices) -> Result<Self> {
        let app = create_app(&config, analytics)?;
        Ok(Self { config, app })
    }

    /// Start the server and run until `shutdown` resolves
    pub async fn start_with_shutdown<F>(self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = format!("{}:{}", self.config.host, self.config.port);
        let socket_addr: SocketAddr = addr
            .parse()
            .map_err(|e| HolocronError::validation(format!("Invalid address {}: {}", addr, e)))?;

        tracing::info!("Starting Holocron server on {}", addr);

        let listener = tokio::net::TcpListener::bind(socket_addr)
            .await
            .map_err(|e| HolocronError::network(format!("Failed to bind to {}: {}", addr, e)))?;

        axum::serve(listener, self.app)
            .with_graceful_shutdown(shutdown)
            .await
            .map_err(|e| HolocronError::network(format!("Server error: {}", e)))?;

        tracing::info!("Server stopped");
        Ok(())
    }

    /// Start the server and run until the process is interrupted
    pub async fn start(self) -> Result<()> {
        self.start_with_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "Failed to listen for shutdown signal");
            }
        })
        .await
    }

    /// Get the server configuration
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// The router with every layer applied
    pub fn router(&self) -> Router {
        self.app.clone()
    }
}

/// Create the Axum application with middleware
pub fn create_app(config: &ServerConfig, analytics: AnalyticsServices) -> Result<Router> {
    let limiter = create_rate_limiter(config.throttle_per_minute)?;
    let state = AppState::new(analytics, limiter);

    let mut app = create_routes(state).layer(
        ServiceBuilder::new()
            .layer(TraceLayer::new_for_http())
            .layer(RequestBodyLimitLayer::new(config.max_request_size)),
    );

    if config.cors_enabled {
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods([Method::GET, Method::POST])
            .allow_headers([ACCEPT, CONTENT_TYPE]);

        app = app.layer(cors);
    }

    Ok(app)
}

/// Server builder for configuration
pub struct ServerBuilder {
    config: ServerConfig,
}

impl ServerBuilder {
    /// Create a new server builder
    pub fn new() -> Self {
        Self {
            config: ServerConfig::default(),
        }
    }

    /// Start from an existing configuration
    pub fn from_config(config: ServerConfig) -> Self {
        Self { config }
    }

    /// Set the host address
    pub fn host<S: Into<String>>(mut self, host: S) -> Self {
        self.config.host = host.into();
        self
    }

    /// Set the port
    pub fn port(mut self, port: u16) -> Self {
        self.config.port = port;
        self
    }

    /// Enable or disable CORS
    pub fn cors(mut self, enabled: bool) -> Self {
        self.config.cors_enabled = enabled;
        self
    }

    /// Set maximum request size
    pub fn max_request_size(mut self, size: usize) -> Self {
        self.config.max_request_size = size;
        self
    }

    /// Set the API throttle
    pub fn throttle_per_minute(mut self, per_minute: u32) -> Self {
        self.config.throttle_per_minute = per_minute;
        self
    }

    /// Build the server around `analytics`
    pub fn build(self, analytics: AnalyticsServices) -> Result<HolocronServer> {
        HolocronServer::new(self.config, analytics)
    }
}

impl Default for ServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use holocron_core::{HolocronConfig, SharedEventStore};
    use holocron_infra::MemoryStore;
    use std::sync::Arc;

    fn analytics() -> AnalyticsServices {
        let store: SharedEventStore = Arc::new(MemoryStore::new());
        AnalyticsServices::from_config(store, &HolocronConfig::default())
    }

    #[test]
    fn test_server_builder() {
        let builder = ServerBuilder::new()
            .host("0.0.0.0")
            .port(8080)
            .cors(false)
            .max_request_size(1024)
            .throttle_per_minute(10);

        assert_eq!(builder.config.host, "0.0.0.0");
        assert_eq!(builder.config.port, 8080);
        assert!(!builder.config.cors_enabled);
        assert_eq!(builder.config.max_request_size, 1024);
        assert_eq!(builder.config.throttle_per_minute, 10);

        let server = builder.build(analytics()).unwrap();
        assert_eq!(server.config().port, 8080);
    }

    #[test]
    fn test_zero_throttle_rejected() {
        let result = ServerBuilder::new().throttle_per_minute(0).build(analytics());
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_invalid_address() {
        let server = ServerBuilder::new()
            .host("not an address")
            .build(analytics())
            .unwrap();
        let result = server.start_with_shutdown(async {}).await;
        assert!(matches!(result, Err(HolocronError::Validation { .. })));
    }
}
