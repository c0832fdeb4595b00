//! Shared test helpers for API integration tests.
#![allow(dead_code)]

use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use chrono::{DateTime, TimeZone, Utc};
use http_body_util::BodyExt;
use orderline_analytics::service::AnalyticsService;
use orderline_channel::pg_channel::PgEventChannel;
use orderline_core::channel::{ANALYTICS_QUEUE, EventPublisher, NOTIFICATIONS_QUEUE};
use orderline_core::clock::Clock;
use orderline_orders::application::pipeline::OrderPipeline;
use orderline_orders::application::publish::PublishMode;
use orderline_store::memory_cache::MemoryCache;
use orderline_store::pg_health::PgHealthCheck;
use orderline_store::pg_metric_repository::PgMetricRepository;
use orderline_store::pg_order_repository::PgOrderRepository;
use orderline_test_support::{FixedClock, StaticHealthCheck};
use sqlx::PgPool;
use tower::ServiceExt;

use orderline_api::app::{analytics_router, order_router, worker_router};
use orderline_api::metrics::PipelineMetrics;
use orderline_api::state::{AnalyticsAppState, HealthProbes, OrderAppState, WorkerAppState};

/// Fixed timestamp used across all integration tests.
pub fn fixed_now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 1, 15, 10, 0, 0).unwrap()
}

pub fn fixed_clock() -> Arc<dyn Clock> {
    Arc::new(FixedClock(fixed_now()))
}

/// Order service router over a real store, an in-memory cache and the
/// given publisher. Uses the same route structure as the `order-api` binary.
pub fn build_order_app(
    pool: PgPool,
    publisher: Arc<dyn EventPublisher>,
    mode: PublishMode,
) -> Router {
    let pipeline = OrderPipeline::new(
        Arc::new(PgOrderRepository::new(pool.clone())),
        Arc::new(MemoryCache::new()),
        publisher,
        fixed_clock(),
        mode,
    );
    let metrics = PipelineMetrics::new().unwrap().with_channel(
        Arc::new(PgEventChannel::new(pool.clone())),
        &[ANALYTICS_QUEUE, NOTIFICATIONS_QUEUE],
    );
    let state = OrderAppState {
        pipeline,
        health: HealthProbes::new("order-service")
            .with("database", Arc::new(PgHealthCheck::new(pool)))
            .with("cache", Arc::new(StaticHealthCheck::healthy()))
            .with("mq", Arc::new(StaticHealthCheck::healthy())),
        metrics: Arc::new(metrics),
    };
    order_router(state)
}

/// Analytics service router over a real metric store.
pub fn build_analytics_app(pool: PgPool) -> (Router, AnalyticsService) {
    let analytics = AnalyticsService::new(
        Arc::new(PgMetricRepository::new(pool.clone())),
        Arc::new(MemoryCache::new()),
        fixed_clock(),
    );
    let state = AnalyticsAppState {
        analytics: analytics.clone(),
        health: HealthProbes::new("analytics-service")
            .with("database", Arc::new(PgHealthCheck::new(pool))),
        metrics: Arc::new(PipelineMetrics::new().unwrap()),
    };
    (analytics_router(state), analytics)
}

/// Notification worker router over the given probes and metrics.
pub fn build_worker_app(health: HealthProbes, metrics: PipelineMetrics) -> Router {
    worker_router(WorkerAppState {
        health,
        metrics: Arc::new(metrics),
    })
}

/// A valid order request body.
pub fn order_body(quantity: i32, total_amount: f64) -> serde_json::Value {
    serde_json::json!({
        "customer_id": "customer-123",
        "product_id": "product-456",
        "quantity": quantity,
        "total_amount": total_amount,
    })
}

/// Send a POST request with a raw body and return the response.
pub async fn post_raw(app: Router, uri: &str, body: Vec<u8>) -> (StatusCode, serde_json::Value) {
    let request = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let body_bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json: serde_json::Value = serde_json::from_slice(&body_bytes).unwrap();

    (status, json)
}

/// Send a POST request with a JSON body and return the response.
pub async fn post_json(
    app: Router,
    uri: &str,
    body: &serde_json::Value,
) -> (StatusCode, serde_json::Value) {
    post_raw(app, uri, serde_json::to_vec(body).unwrap()).await
}

/// Send a GET request and return the response.
pub async fn get_json(app: Router, uri: &str) -> (StatusCode, serde_json::Value) {
    let request = Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let body_bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json: serde_json::Value = serde_json::from_slice(&body_bytes).unwrap();

    (status, json)
}

/// Send a GET request and return the status, content type and raw body.
pub async fn get_text(app: Router, uri: &str) -> (StatusCode, String, String) {
    let request = Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let content_type = response
        .headers()
        .get("content-type")
        .map(|value| value.to_str().unwrap().to_owned())
        .unwrap_or_default();
    let body_bytes = response.into_body().collect().await.unwrap().to_bytes();

    (status, content_type, String::from_utf8(body_bytes.to_vec()).unwrap())
}

/// Value of the sample of `name` carrying every label in `labels`.
pub fn sample(text: &str, name: &str, labels: &[(&str, &str)]) -> Option<i64> {
    text.lines()
        .filter(|line| line.starts_with(&format!("{name}{{")))
        .find(|line| {
            labels
                .iter()
                .all(|(key, value)| line.contains(&format!("{key}=\"{value}\"")))
        })
        .and_then(|line| line.rsplit(' ').next())
        .and_then(|value| value.parse().ok())
}
