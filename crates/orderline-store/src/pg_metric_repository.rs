//! `PostgreSQL` implementation of the `MetricRepository` trait.

use async_trait::async_trait;
use rust_decimal::Decimal;
use sqlx::{PgPool, Row};

use orderline_core::error::PipelineError;
use orderline_core::metric::{AggregateMetric, MetricTotals};
use orderline_core::repository::MetricRepository;

use crate::sql_error::persistence;

/// PostgreSQL-backed, append-only metric store.
#[derive(Debug, Clone)]
pub struct PgMetricRepository {
    pool: PgPool,
}

impl PgMetricRepository {
    /// Creates a new `PgMetricRepository`.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MetricRepository for PgMetricRepository {
    async fn append(&self, metric: &AggregateMetric) -> Result<i64, PipelineError> {
        let row = sqlx::query(
            "INSERT INTO order_metrics (order_id, customer_id, product_id, quantity, total_amount, processed_at) \
             VALUES ($1, $2, $3, $4, $5, $6) RETURNING id",
        )
        .bind(metric.order_id)
        .bind(&metric.customer_id)
        .bind(&metric.product_id)
        .bind(metric.quantity)
        .bind(metric.total_amount)
        .bind(metric.processed_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| persistence("failed to save order metric", &e))?;
        row.try_get("id")
            .map_err(|e| persistence("failed to read metric id", &e))
    }

    async fn totals(&self) -> Result<MetricTotals, PipelineError> {
        let row = sqlx::query(
            "SELECT COUNT(*) AS count, COALESCE(SUM(total_amount), 0) AS revenue FROM order_metrics",
        )
        .fetch_one(&self.pool)
        .await
        .map_err(|e| persistence("failed to compute metric totals", &e))?;
        let count: i64 = row
            .try_get("count")
            .map_err(|e| persistence("failed to read count", &e))?;
        let revenue: Decimal = row
            .try_get("revenue")
            .map_err(|e| persistence("failed to read revenue", &e))?;
        Ok(MetricTotals { count, revenue })
    }
}
