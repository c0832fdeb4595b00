//! Prometheus scrape endpoint.

use std::sync::Arc;

use axum::extract::{FromRef, State};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::{Router, routing::get};
use tracing::error;

use crate::metrics::PipelineMetrics;

/// GET /metrics
async fn scrape(State(metrics): State<Arc<PipelineMetrics>>) -> Response {
    metrics.refresh().await;
    match metrics.encode() {
        Ok(body) => ([(header::CONTENT_TYPE, prometheus::TEXT_FORMAT)], body).into_response(),
        Err(e) => {
            error!(error = %e, "failed to encode metrics");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

/// Returns the metrics router for any state that carries a registry.
pub fn router<S>() -> Router<S>
where
    S: Clone + Send + Sync + 'static,
    Arc<PipelineMetrics>: FromRef<S>,
{
    Router::new().route("/metrics", get(scrape))
}
