//! Integration tests for the statistics and search logging endpoints
//!
//! Requests are driven through the fully layered router with `oneshot`
//! against an in-memory event store.

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use holocron_core::{HolocronConfig, SharedEventStore};
use holocron_infra::MemoryStore;
use holocron_serve::{create_app, AnalyticsServices, ServerConfig};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

struct TestApp {
    store: Arc<MemoryStore>,
    analytics: AnalyticsServices,
    router: Router,
}

fn create_test_app_with(config: ServerConfig) -> TestApp {
    let store = Arc::new(MemoryStore::new());
    let shared: SharedEventStore = store.clone();
    let analytics = AnalyticsServices::from_config(shared, &HolocronConfig::default());
    let router = create_app(&config, analytics.clone()).unwrap();

    TestApp {
        store,
        analytics,
        router,
    }
}

fn create_test_app() -> TestApp {
    create_test_app_with(ServerConfig::default())
}

async fn make_get_request(router: Router, uri: &str) -> (StatusCode, Value) {
    let response = router
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();

    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&body).unwrap_or(Value::Null))
}

async fn make_post_request(router: Router, uri: &str, body: Value) -> (StatusCode, Value) {
    let response = router
        .oneshot(
            Request::builder()
                .uri(uri)
                .method("POST")
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();

    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&body).unwrap_or(Value::Null))
}

async fn log(router: &Router, search_type: &str, term: &str, response_time_ms: u64) {
    let (status, _) = make_post_request(
        router.clone(),
        "/api/searches",
        json!({
            "type": search_type,
            "term": term,
            "results_count": 1,
            "response_time_ms": response_time_ms,
        }),
    )
    .await;
    assert_eq!(status, StatusCode::ACCEPTED);
}

#[tokio::test]
async fn test_statistics_on_empty_store_is_a_miss() {
    let app = create_test_app();

    let (status, body) = make_get_request(app.router.clone(), "/api/statistics").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["cache_miss"], true);
    assert_eq!(body["calculation_time_ms"], 0.0);
    assert_eq!(body["data"]["total_searches"], 0);
    assert_eq!(body["data"]["average_response_time"], 0.0);
    assert_eq!(body["data"]["top_queries"], json!([]));
    assert_eq!(
        body["data"]["searches_by_type"],
        json!({ "people": 0, "movies": 0 })
    );

    let (_, body) = make_get_request(app.router.clone(), "/api/statistics").await;
    assert_eq!(body["cache_miss"], false);
}

#[tokio::test]
async fn test_logged_searches_show_up_in_statistics() {
    let app = create_test_app();
    log(&app.router, "people", "Luke", 250).await;
    log(&app.router, "people", "Leia", 180).await;
    log(&app.router, "people", "Luke", 200).await;
    log(&app.router, "movies", "A New Hope", 90).await;

    let (status, body) = make_get_request(app.router.clone(), "/api/statistics").await;
    assert_eq!(status, StatusCode::OK);

    let data = &body["data"];
    assert_eq!(data["total_searches"], 4);
    assert_eq!(data["searches_by_type"]["people"], 3);
    assert_eq!(data["searches_by_type"]["movies"], 1);
    assert_eq!(data["top_queries"][0]["term"], "Luke");
    assert_eq!(data["top_queries"][0]["count"], 2);
    assert_eq!(data["top_queries"][0]["percentage"], 50.0);
    assert_eq!(data["average_response_time"], 180.0);

    let hours = data["popular_hours"].as_array().unwrap();
    assert_eq!(hours.len(), 1);
    assert_eq!(hours[0]["count"], 4);
    assert!(hours[0]["hour"].is_u64());
}

#[tokio::test]
async fn test_log_search_validation() {
    let app = create_test_app();

    let (status, body) = make_post_request(
        app.router.clone(),
        "/api/searches",
        json!({ "type": "people", "term": "L", "results_count": 0, "response_time_ms": 5 }),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["error"].as_str().unwrap().contains("between 2 and 100"));

    let (status, _) = make_post_request(
        app.router.clone(),
        "/api/searches",
        json!({ "type": "planets", "term": "Hoth" }),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    assert!(app.store.is_empty());
}

#[tokio::test]
async fn test_logging_outage_still_accepts_search() {
    let app = create_test_app();
    app.store.set_available(false);

    let (status, body) = make_post_request(
        app.router.clone(),
        "/api/searches",
        json!({ "type": "movies", "term": "Empire", "results_count": 1, "response_time_ms": 40 }),
    )
    .await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(body["status"], "accepted");
    assert_eq!(body["search_type"], "movies");
}

#[tokio::test]
async fn test_statistics_outage_returns_500() {
    let app = create_test_app();
    app.store.set_available(false);

    let (status, body) = make_get_request(app.router.clone(), "/api/statistics").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "Failed to fetch statistics");
    assert!(body["message"].as_str().unwrap().contains("unavailable"));
}

#[tokio::test]
async fn test_cache_info_endpoint() {
    let app = create_test_app();

    let (status, body) = make_get_request(app.router.clone(), "/api/statistics/cache").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["is_cached"], false);
    assert_eq!(body["cache_key"], "statistics:latest");
    assert_eq!(body["cache_ttl_seconds"], 3600);
    assert!(body["cached_at"].is_null());

    app.analytics
        .statistics
        .aggregator()
        .calculate_statistics()
        .await
        .unwrap();

    let (_, body) = make_get_request(app.router.clone(), "/api/statistics/cache").await;
    assert_eq!(body["is_cached"], true);
    assert!(body["cached_at"].is_string());
    assert_eq!(body["cached_at"], body["calculated_at"]);
}

#[tokio::test]
async fn test_health_reflects_store() {
    let app = create_test_app();

    let (status, body) = make_get_request(app.router.clone(), "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["store"], "memory");

    app.store.set_available(false);
    let (status, body) = make_get_request(app.router.clone(), "/health").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["status"], "unhealthy");
}

#[tokio::test]
async fn test_throttle_rejects_excess_requests() {
    let app = create_test_app_with(ServerConfig {
        throttle_per_minute: 2,
        ..Default::default()
    });

    for _ in 0..2 {
        let (status, _) = make_get_request(app.router.clone(), "/api/statistics/cache").await;
        assert_eq!(status, StatusCode::OK);
    }

    let response = app
        .router
        .clone()
        .oneshot(
            Request::builder()
                .uri("/api/statistics")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    assert!(response.headers().contains_key("retry-after"));

    // Health checks bypass the throttle
    let (status, _) = make_get_request(app.router.clone(), "/health").await;
    assert_eq!(status, StatusCode::OK);
}
