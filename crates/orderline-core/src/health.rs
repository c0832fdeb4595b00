//! Health probe abstraction.

use async_trait::async_trait;

use crate::error::PipelineError;

/// A dependency whose liveness can be probed independently of the others.
#[async_trait]
pub trait HealthCheck: Send + Sync {
    /// Returns `Ok(())` when the dependency is reachable.
    async fn check(&self) -> Result<(), PipelineError>;
}
