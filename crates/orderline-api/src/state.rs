//! Shared application state.

use std::sync::Arc;

use axum::extract::FromRef;
use orderline_analytics::service::AnalyticsService;
use orderline_core::health::HealthCheck;
use orderline_orders::application::pipeline::OrderPipeline;

use crate::metrics::PipelineMetrics;

/// The dependencies a service reports on under `GET /health`.
#[derive(Clone)]
pub struct HealthProbes {
    /// Name reported in the health body.
    pub service: &'static str,
    /// Named probes, reported in order.
    pub checks: Vec<(&'static str, Arc<dyn HealthCheck>)>,
}

impl HealthProbes {
    /// A service with no probes yet.
    #[must_use]
    pub fn new(service: &'static str) -> Self {
        Self {
            service,
            checks: Vec::new(),
        }
    }

    /// Adds a named probe.
    #[must_use]
    pub fn with(mut self, name: &'static str, check: Arc<dyn HealthCheck>) -> Self {
        self.checks.push((name, check));
        self
    }
}

/// State of the order service.
#[derive(Clone)]
pub struct OrderAppState {
    /// Order creation and reads.
    pub pipeline: OrderPipeline,
    /// Store, cache and channel probes.
    pub health: HealthProbes,
    /// Queue gauges for both consumer queues.
    pub metrics: Arc<PipelineMetrics>,
}

impl FromRef<OrderAppState> for HealthProbes {
    fn from_ref(state: &OrderAppState) -> Self {
        state.health.clone()
    }
}

impl FromRef<OrderAppState> for Arc<PipelineMetrics> {
    fn from_ref(state: &OrderAppState) -> Self {
        Arc::clone(&state.metrics)
    }
}

/// State of the analytics service.
#[derive(Clone)]
pub struct AnalyticsAppState {
    /// Summary queries.
    pub analytics: AnalyticsService,
    /// Store, cache and channel probes.
    pub health: HealthProbes,
    /// Consumer counters and analytics queue gauges.
    pub metrics: Arc<PipelineMetrics>,
}

impl FromRef<AnalyticsAppState> for HealthProbes {
    fn from_ref(state: &AnalyticsAppState) -> Self {
        state.health.clone()
    }
}

impl FromRef<AnalyticsAppState> for Arc<PipelineMetrics> {
    fn from_ref(state: &AnalyticsAppState) -> Self {
        Arc::clone(&state.metrics)
    }
}

/// State of the notification worker, which serves only operational routes.
#[derive(Clone)]
pub struct WorkerAppState {
    /// Channel probe.
    pub health: HealthProbes,
    /// Consumer counters and notification queue gauges.
    pub metrics: Arc<PipelineMetrics>,
}

impl FromRef<WorkerAppState> for HealthProbes {
    fn from_ref(state: &WorkerAppState) -> Self {
        state.health.clone()
    }
}

impl FromRef<WorkerAppState> for Arc<PipelineMetrics> {
    fn from_ref(state: &WorkerAppState) -> Self {
        Arc::clone(&state.metrics)
    }
}
