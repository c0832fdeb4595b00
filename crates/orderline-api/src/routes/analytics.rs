//! Routes for the analytics summary.

use axum::extract::State;
use axum::{Json, Router, routing::get};
use orderline_core::metric::AnalyticsSummary;
use tracing::instrument;

use crate::error::ApiError;
use crate::state::AnalyticsAppState;

/// GET /analytics/summary
#[instrument(skip(state))]
async fn get_summary(
    State(state): State<AnalyticsAppState>,
) -> Result<Json<AnalyticsSummary>, ApiError> {
    let summary = state.analytics.get_summary().await?;
    Ok(Json(summary))
}

/// Returns the analytics router.
pub fn router() -> Router<AnalyticsAppState> {
    Router::new().route("/summary", get(get_summary))
}
