//! Test metric repository.

use std::sync::Mutex;

use async_trait::async_trait;
use orderline_core::error::PipelineError;
use orderline_core::metric::{AggregateMetric, MetricTotals};
use orderline_core::repository::MetricRepository;

/// An in-memory append-only metric store. Can be told to fail a number of
/// appends first.
#[derive(Debug, Default)]
pub struct InMemoryMetricRepository {
    rows: Mutex<Vec<AggregateMetric>>,
    failures_left: Mutex<usize>,
}

impl InMemoryMetricRepository {
    /// Creates an empty repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty repository whose first `failures` appends fail.
    #[must_use]
    pub fn failing_first(failures: usize) -> Self {
        Self {
            rows: Mutex::new(Vec::new()),
            failures_left: Mutex::new(failures),
        }
    }

    /// Returns a snapshot of every appended row.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn rows(&self) -> Vec<AggregateMetric> {
        self.rows.lock().unwrap().clone()
    }
}

#[async_trait]
impl MetricRepository for InMemoryMetricRepository {
    async fn append(&self, metric: &AggregateMetric) -> Result<i64, PipelineError> {
        {
            let mut failures_left = self.failures_left.lock().unwrap();
            if *failures_left > 0 {
                *failures_left -= 1;
                return Err(PipelineError::Persistence("connection refused".into()));
            }
        }
        let mut rows = self.rows.lock().unwrap();
        rows.push(metric.clone());
        Ok(i64::try_from(rows.len()).unwrap_or(i64::MAX))
    }

    async fn totals(&self) -> Result<MetricTotals, PipelineError> {
        let rows = self.rows.lock().unwrap();
        Ok(MetricTotals {
            count: i64::try_from(rows.len()).unwrap_or(i64::MAX),
            revenue: rows.iter().map(|row| row.total_amount).sum(),
        })
    }
}
