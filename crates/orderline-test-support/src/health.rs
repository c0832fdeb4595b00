//! Test health probes.

use async_trait::async_trait;
use orderline_core::error::PipelineError;
use orderline_core::health::HealthCheck;

/// A probe with a fixed outcome.
#[derive(Debug, Clone)]
pub struct StaticHealthCheck {
    failure: Option<String>,
}

impl StaticHealthCheck {
    /// A probe that always passes.
    #[must_use]
    pub fn healthy() -> Self {
        Self { failure: None }
    }

    /// A probe that always fails with `reason`.
    #[must_use]
    pub fn failing(reason: &str) -> Self {
        Self {
            failure: Some(reason.to_owned()),
        }
    }
}

#[async_trait]
impl HealthCheck for StaticHealthCheck {
    async fn check(&self) -> Result<(), PipelineError> {
        match &self.failure {
            None => Ok(()),
            Some(reason) => Err(PipelineError::Transport(reason.clone())),
        }
    }
}
