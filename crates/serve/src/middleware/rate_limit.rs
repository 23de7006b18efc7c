//! Request throttling
//!
//! A single process-wide governor limiter shared by every throttled route.

use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use governor::{
    clock::{Clock, DefaultClock},
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter,
};
use holocron_core::{HolocronError, Result};
use serde_json::json;
use std::{num::NonZeroU32, sync::Arc};

/// Rate limiter state shared across requests
pub type SharedRateLimiter = Arc<RateLimiter<NotKeyed, InMemoryState, DefaultClock>>;

/// Creates a limiter admitting `per_minute` requests per minute
///
/// The whole quota is available as a burst and refills evenly over the minute.
///
/// # Arguments
///
/// * `per_minute` - Requests allowed per minute, at least one
///
/// # Returns
///
/// Returns the shared limiter, or a validation error when `per_minute` is zero
///
/// # Examples
///
/// ```
/// use holocron_serve::middleware::create_rate_limiter;
///
/// let limiter = create_rate_limiter(60).unwrap();
/// assert!(limiter.check().is_ok());
/// assert!(create_rate_limiter(0).is_err());
/// ```
pub fn create_rate_limiter(per_minute: u32) -> Result<SharedRateLimiter> {
    let per_minute = NonZeroU32::new(per_minute).ok_or_else(|| {
        HolocronError::validation("Throttle must allow at least one request per minute")
    })?;

    Ok(Arc::new(RateLimiter::direct(Quota::per_minute(per_minute))))
}

/// Reject requests over the limit with 429 and a `retry-after` header
pub async fn rate_limit_middleware(
    State(limiter): State<SharedRateLimiter>,
    request: Request,
    next: Next,
) -> Response {
    match limiter.check() {
        Ok(_) => next.run(request).await,
        Err(not_until) => {
            let retry_after = not_until
                .wait_time_from(DefaultClock::default().now())
                .as_secs()
                .max(1);

            tracing::warn!(
                retry_after,
                path = %request.uri().path(),
                "Rate limit exceeded"
            );

            (
                StatusCode::TOO_MANY_REQUESTS,
                [
                    ("retry-after", retry_after.to_string()),
                    ("x-ratelimit-remaining", "0".to_string()),
                ],
                Json(json!({ "error": "Too many requests" })),
            )
                .into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_limit_rejected() {
        assert!(create_rate_limiter(0).is_err());
    }

    #[test]
    fn test_burst_then_reject() {
        let limiter = create_rate_limiter(3).unwrap();
        assert!(limiter.check().is_ok());
        assert!(limiter.check().is_ok());
        assert!(limiter.check().is_ok());
        assert!(limiter.check().is_err());
    }
}
