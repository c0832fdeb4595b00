//! Router assembly for each process.

use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::routes;
use crate::state::{AnalyticsAppState, OrderAppState, WorkerAppState};

/// Routes of the order service.
pub fn order_router(state: OrderAppState) -> Router {
    // TODO: Replace CorsLayer::permissive() with restricted origins for production.
    Router::new()
        .merge(routes::health::router())
        .merge(routes::metrics::router())
        .nest("/orders", routes::orders::router())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Routes of the analytics service.
pub fn analytics_router(state: AnalyticsAppState) -> Router {
    Router::new()
        .merge(routes::health::router())
        .merge(routes::metrics::router())
        .nest("/analytics", routes::analytics::router())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Health and metrics endpoints of the notification worker.
pub fn worker_router(state: WorkerAppState) -> Router {
    Router::new()
        .merge(routes::health::router())
        .merge(routes::metrics::router())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
