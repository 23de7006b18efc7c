//! Error handling for Holocron core library

use thiserror::Error;

/// Result type alias for Holocron operations
pub type Result<T> = std::result::Result<T, HolocronError>;

/// Main error type for Holocron operations
#[derive(Error, Debug)]
pub enum HolocronError {
    /// IO-related errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML serialization/deserialization errors
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    /// URL parsing errors
    #[error("URL error: {0}")]
    Url(#[from] url::ParseError),

    /// Generic errors
    #[error("Generic error: {0}")]
    Generic(#[from] anyhow::Error),

    /// The event store could not be reached or rejected the command
    #[error("Store unavailable: {message}")]
    StoreUnavailable { message: String },

    /// A collection command was applied to a key holding another type
    #[error("Wrong type for key '{key}': expected {expected}")]
    WrongType { key: String, expected: String },

    /// Statistics could not be derived from the stored counters
    #[error("Aggregation failed: {message}")]
    AggregationFailed { message: String },

    /// Snapshot cache errors
    #[error("Cache error: {message}")]
    Cache { message: String },

    /// Timeout errors
    #[error("Operation timed out: {operation}")]
    Timeout { operation: String },

    /// Resource not found errors
    #[error("Resource not found: {resource}")]
    NotFound { resource: String },

    /// Validation errors
    #[error("Validation error: {message}")]
    Validation { message: String },

    /// Network connectivity errors
    #[error("Network error: {message}")]
    Network { message: String },
}

impl HolocronError {
    /// Create a store unavailable error
    pub fn store_unavailable<S: Into<String>>(message: S) -> Self {
        Self::StoreUnavailable {
            message: message.into(),
        }
    }

    /// Create a wrong type error
    pub fn wrong_type<K: Into<String>, E: Into<String>>(key: K, expected: E) -> Self {
        Self::WrongType {
            key: key.into(),
            expected: expected.into(),
        }
    }

    /// Create an aggregation error
    pub fn aggregation<S: Into<String>>(message: S) -> Self {
        Self::AggregationFailed {
            message: message.into(),
        }
    }

    /// Create a cache error
    pub fn cache<S: Into<String>>(message: S) -> Self {
        Self::Cache {
            message: message.into(),
        }
    }

    /// Create a timeout error
    pub fn timeout<S: Into<String>>(operation: S) -> Self {
        Self::Timeout {
            operation: operation.into(),
        }
    }

    /// Create a not found error
    pub fn not_found<S: Into<String>>(resource: S) -> Self {
        Self::NotFound {
            resource: resource.into(),
        }
    }

    /// Create a validation error
    pub fn validation<S: Into<String>>(message: S) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Create a network error
    pub fn network<S: Into<String>>(message: S) -> Self {
        Self::Network {
            message: message.into(),
        }
    }

    /// Check if the error is worth another attempt
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::StoreUnavailable { .. }
                | Self::Io(_)
                | Self::Network { .. }
                | Self::Timeout { .. }
                | Self::AggregationFailed { .. }
                | Self::Cache { .. }
                | Self::Generic(_)
        )
    }

    /// Check if the error means the work no longer has anything to operate on
    pub fn is_missing_resource(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Get error category for logging/metrics
    pub fn category(&self) -> &'static str {
        match self {
            Self::Io(_) => "io",
            Self::Json(_) | Self::Yaml(_) => "serialization",
            Self::Config(_) => "config",
            Self::Url(_) => "url",
            Self::Generic(_) => "generic",
            Self::StoreUnavailable { .. } | Self::WrongType { .. } => "store",
            Self::AggregationFailed { .. } => "aggregation",
            Self::Cache { .. } => "cache",
            Self::Timeout { .. } => "timeout",
            Self::NotFound { .. } => "not_found",
            Self::Validation { .. } => "validation",
            Self::Network { .. } => "network",
        }
    }
}
