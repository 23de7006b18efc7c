//! Logging infrastructure for Holocron
//!
//! Centralized tracing subscriber setup. Level and format come from the
//! `logging` config section and may be overridden with `HOLOCRON_LOG_*`
//! environment variables.

use holocron_core::{HolocronError, LoggingConfig, Result};
use std::str::FromStr;
use tracing::Level;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// Logger configuration
#[derive(Debug, Clone)]
pub struct LoggerConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
    /// Whether to use JSON format
    pub json_format: bool,
    /// Whether to include timestamps
    pub with_timestamps: bool,
    /// Whether to include file/line information
    pub with_file_info: bool,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json_format: false,
            with_timestamps: true,
            with_file_info: false,
        }
    }
}

impl From<&LoggingConfig> for LoggerConfig {
    fn from(config: &LoggingConfig) -> Self {
        Self {
            level: config.level.clone(),
            json_format: config.format.eq_ignore_ascii_case("json"),
            ..Default::default()
        }
    }
}

impl LoggerConfig {
    /// Apply `HOLOCRON_LOG_*` overrides on top of this configuration
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides(|name| std::env::var(name).ok())
    }

    fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(level) = lookup("HOLOCRON_LOG_LEVEL") {
            self.level = level;
        }
        if let Some(json) = lookup("HOLOCRON_LOG_JSON").and_then(|v| v.parse().ok()) {
            self.json_format = json;
        }
        if let Some(ts) = lookup("HOLOCRON_LOG_TIMESTAMPS").and_then(|v| v.parse().ok()) {
            self.with_timestamps = ts;
        }
        if let Some(info) = lookup("HOLOCRON_LOG_FILE_INFO").and_then(|v| v.parse().ok()) {
            self.with_file_info = info;
        }
        self
    }
}

/// Initialize the global logger with the given configuration
pub fn init_logger(config: LoggerConfig) -> Result<()> {
    let level = LogLevel::parse(&config.level)?;

    // RUST_LOG directives win over the configured level
    let env_filter = EnvFilter::builder()
        .with_default_directive(level.into())
        .from_env_lossy();
    let env_filter = ["hyper=warn", "h2=warn", "redis=warn"]
        .iter()
        .filter_map(|d| d.parse().ok())
        .fold(env_filter, |filter, directive| filter.add_directive(directive));

    let fmt_layer = if config.json_format {
        fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(true)
            .with_file(config.with_file_info)
            .with_line_number(config.with_file_info)
            .boxed()
    } else {
        let layer = fmt::layer()
            .with_target(true)
            .with_file(config.with_file_info)
            .with_line_number(config.with_file_info);

        if config.with_timestamps {
            layer.boxed()
        } else {
            layer.without_time().boxed()
        }
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .try_init()
        .map_err(|e| HolocronError::validation(format!("Failed to initialize logger: {}", e)))?;

    tracing::info!("Logger initialized with level: {}", config.level);
    Ok(())
}

/// Initialize logger for testing (reduces noise)
pub fn init_test_logger() -> Result<()> {
    let config = LoggerConfig {
        level: "warn".to_string(),
        with_timestamps: false,
        ..Default::default()
    };

    // Ignore errors if already initialized
    let _ = init_logger(config);
    Ok(())
}

/// Create a logger configuration from environment variables alone
pub fn logger_config_from_env() -> LoggerConfig {
    LoggerConfig::default().with_env_overrides()
}

/// Log level utilities
pub struct LogLevel;

impl LogLevel {
    /// Parse log level from string
    pub fn parse(level: &str) -> Result<Level> {
        Level::from_str(level).map_err(|e| {
            HolocronError::validation(format!("Invalid log level '{}': {}", level, e))
        })
    }

    /// Get all available log levels
    pub fn all_levels() -> Vec<&'static str> {
        vec!["trace", "debug", "info", "warn", "error"]
    }

    /// Check if a log level string is valid
    pub fn is_valid(level: &str) -> bool {
        Self::all_levels().contains(&level.to_lowercase().as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_logger_config_default() {
        let config = LoggerConfig::default();
        assert_eq!(config.level, "info");
        assert!(!config.json_format);
        assert!(config.with_timestamps);
        assert!(!config.with_file_info);
    }

    #[test]
    fn test_from_logging_section() {
        let section = LoggingConfig {
            level: "debug".to_string(),
            format: "JSON".to_string(),
        };
        let config = LoggerConfig::from(&section);
        assert_eq!(config.level, "debug");
        assert!(config.json_format);
    }

    #[test]
    fn test_overrides() {
        let vars: HashMap<&str, &str> = [
            ("HOLOCRON_LOG_LEVEL", "trace"),
            ("HOLOCRON_LOG_JSON", "true"),
            ("HOLOCRON_LOG_TIMESTAMPS", "not-a-bool"),
        ]
        .into_iter()
        .collect();

        let config = LoggerConfig::default()
            .with_overrides(|name| vars.get(name).map(|v| v.to_string()));
        assert_eq!(config.level, "trace");
        assert!(config.json_format);
        assert!(config.with_timestamps);
    }

    #[test]
    fn test_log_level_parse() {
        assert!(LogLevel::parse("info").is_ok());
        assert!(LogLevel::parse("debug").is_ok());
        assert!(LogLevel::parse("invalid").is_err());
    }

    #[test]
    fn test_log_level_validation() {
        assert!(LogLevel::is_valid("info"));
        assert!(LogLevel::is_valid("ERROR"));
        assert!(!LogLevel::is_valid("invalid"));
    }

    #[test]
    fn test_init_rejects_bad_level() {
        let config = LoggerConfig {
            level: "loud".to_string(),
            ..Default::default()
        };
        assert!(init_logger(config).is_err());
    }

    #[tokio::test]
    async fn test_init_test_logger() {
        assert!(init_test_logger().is_ok());
        assert!(init_test_logger().is_ok());
    }
}
