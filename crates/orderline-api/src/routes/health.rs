//! Health check endpoint.

use std::collections::BTreeMap;

use axum::extract::{FromRef, State};
use axum::http::StatusCode;
use axum::{Json, Router, routing::get};
use serde::Serialize;
use tracing::warn;

use crate::state::HealthProbes;

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// `healthy` when every probe passed, `degraded` otherwise.
    pub status: &'static str,
    /// Reporting service.
    pub service: &'static str,
    /// Service version.
    pub version: &'static str,
    /// Probe name to `healthy` or `unhealthy: <reason>`.
    pub checks: BTreeMap<&'static str, String>,
}

/// GET /health
async fn health_check(State(probes): State<HealthProbes>) -> (StatusCode, Json<HealthResponse>) {
    let mut checks = BTreeMap::new();
    let mut degraded = false;

    for (name, probe) in &probes.checks {
        let outcome = match probe.check().await {
            Ok(()) => "healthy".to_owned(),
            Err(e) => {
                warn!(service = probes.service, check = name, error = %e, "health check failed");
                degraded = true;
                format!("unhealthy: {e}")
            }
        };
        checks.insert(*name, outcome);
    }

    let (status_code, status) = if degraded {
        (StatusCode::SERVICE_UNAVAILABLE, "degraded")
    } else {
        (StatusCode::OK, "healthy")
    };

    (
        status_code,
        Json(HealthResponse {
            status,
            service: probes.service,
            version: env!("CARGO_PKG_VERSION"),
            checks,
        }),
    )
}

/// Returns the health check router for any state that carries probes.
pub fn router<S>() -> Router<S>
where
    S: Clone + Send + Sync + 'static,
    HealthProbes: FromRef<S>,
{
    Router::new().route("/health", get(health_check))
}
