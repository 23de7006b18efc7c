//! API routes for the Holocron serve crate

use crate::handlers::{
    handle_cache_info, handle_health, handle_log_search, handle_statistics, AppState,
};
use crate::middleware::rate_limit_middleware;
use axum::{
    middleware,
    routing::{get, post},
    Router,
};

/// All routes. The `/api` routes share one throttle; `/health` is never throttled.
pub fn create_routes(state: AppState) -> Router {
    let throttled = Router::new()
        .route("/api/statistics", get(handle_statistics))
        .route("/api/statistics/cache", get(handle_cache_info))
        .route("/api/searches", post(handle_log_search))
        .route_layer(middleware::from_fn_with_state(
            state.limiter.clone(),
            rate_limit_middleware,
        ));

    Router::new()
        .route("/health", get(handle_health))
        .merge(throttled)
        .with_state(state)
}
