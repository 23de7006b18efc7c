//! HTTP handlers for the Holocron serve crate

use crate::analytics::AnalyticsServices;
use crate::middleware::SharedRateLimiter;
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use chrono::{DateTime, Utc};
use holocron_core::{CacheInfo, CachedStatistics, SearchEvent, SearchType};
use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;

/// Shortest accepted search term, after trimming
pub const MIN_TERM_CHARS: usize = 2;
/// Longest accepted search term, after trimming
pub const MAX_TERM_CHARS: usize = 100;

/// Application state shared across handlers
#[derive(Debug, Clone)]
pub struct AppState {
    pub analytics: AnalyticsServices,
    pub limiter: SharedRateLimiter,
}

impl AppState {
    pub fn new(analytics: AnalyticsServices, limiter: SharedRateLimiter) -> Self {
        Self { analytics, limiter }
    }
}

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Request body failed validation
    #[error("{0}")]
    InvalidRequest(String),
    /// The statistics read path failed
    #[error("{0}")]
    Statistics(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            ApiError::InvalidRequest(msg) => {
                (StatusCode::UNPROCESSABLE_ENTITY, json!({ "error": msg }))
            }
            ApiError::Statistics(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({ "error": "Failed to fetch statistics", "message": msg }),
            ),
        };

        (status, Json(body)).into_response()
    }
}

/// Completed search reported by the search layer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogSearchRequest {
    #[serde(rename = "type")]
    pub search_type: String,
    pub term: String,
    #[serde(default)]
    pub results_count: u64,
    #[serde(default)]
    pub response_time_ms: u64,
}

impl LogSearchRequest {
    /// Check the request and turn it into an event observed now
    pub fn into_event(self) -> Result<SearchEvent, ApiError> {
        let search_type: SearchType = self
            .search_type
            .parse()
            .map_err(|e: holocron_core::HolocronError| ApiError::InvalidRequest(e.to_string()))?;

        let term = self.term.trim();
        let chars = term.chars().count();
        if !(MIN_TERM_CHARS..=MAX_TERM_CHARS).contains(&chars) {
            return Err(ApiError::InvalidRequest(format!(
                "Search term must be between {} and {} characters",
                MIN_TERM_CHARS, MAX_TERM_CHARS
            )));
        }

        Ok(SearchEvent::new(
            search_type,
            term,
            self.results_count,
            self.response_time_ms,
        ))
    }
}

/// Acknowledgement for a logged search
#[derive(Debug, Serialize, Deserialize)]
pub struct LogSearchResponse {
    pub status: String,
    pub search_type: SearchType,
    pub term: String,
}

/// Store health report
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub store: String,
    pub latency_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub timestamp: DateTime<Utc>,
}

/// `GET /api/statistics`
pub async fn handle_statistics(
    State(state): State<AppState>,
) -> Result<Json<CachedStatistics>, ApiError> {
    state
        .analytics
        .statistics
        .get_latest_statistics()
        .await
        .map(Json)
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to fetch statistics");
            ApiError::Statistics(e.to_string())
        })
}

/// `GET /api/statistics/cache`
pub async fn handle_cache_info(State(state): State<AppState>) -> Json<CacheInfo> {
    Json(state.analytics.statistics.cache_info().await)
}

/// `POST /api/searches`
///
/// Logging is best effort: once the body validates the answer is 202 even
/// when the store is down.
pub async fn handle_log_search(
    State(state): State<AppState>,
    Json(request): Json<LogSearchRequest>,
) -> Result<(StatusCode, Json<LogSearchResponse>), ApiError> {
    let event = request.into_event()?;
    state.analytics.logger.log_event(&event).await;

    Ok((
        StatusCode::ACCEPTED,
        Json(LogSearchResponse {
            status: "accepted".to_string(),
            search_type: event.search_type,
            term: event.term,
        }),
    ))
}

/// `GET /health`
pub async fn handle_health(State(state): State<AppState>) -> impl IntoResponse {
    let health = holocron_infra::health_check(&state.analytics.store).await;
    let status = if health.is_healthy() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status,
        Json(HealthResponse {
            status: if health.is_healthy() { "healthy" } else { "unhealthy" }.to_string(),
            version: crate::VERSION.to_string(),
            store: health.backend.to_string(),
            latency_ms: health.latency_ms,
            error: health.error,
            timestamp: Utc::now(),
        }),
    )
}
