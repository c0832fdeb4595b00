//! Liveness probe for a PostgreSQL pool.

use async_trait::async_trait;
use sqlx::PgPool;

use orderline_core::error::PipelineError;
use orderline_core::health::HealthCheck;

/// Probes a pool with `SELECT 1`.
#[derive(Debug, Clone)]
pub struct PgHealthCheck {
    pool: PgPool,
}

impl PgHealthCheck {
    /// Creates a probe over `pool`.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl HealthCheck for PgHealthCheck {
    async fn check(&self) -> Result<(), PipelineError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map(|_| ())
            .map_err(|e| PipelineError::Persistence(e.to_string()))
    }
}
