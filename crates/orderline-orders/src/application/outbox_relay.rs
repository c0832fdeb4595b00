//! Background delivery of outbox records to the event channel.

use std::sync::Arc;
use std::time::Duration;

use orderline_core::channel::EventPublisher;
use orderline_core::clock::Clock;
use orderline_core::error::PipelineError;
use orderline_core::repository::OutboxRepository;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::application::publish::publish_order_created;

/// Records fetched per relay pass.
pub const DEFAULT_BATCH_SIZE: i64 = 100;

/// Outcome of one relay pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RelayReport {
    /// Records published and marked.
    pub published: usize,
    /// Records whose publish failed and stay pending.
    pub failed: usize,
}

/// Polls the outbox and publishes pending records in creation order.
#[derive(Clone)]
pub struct OutboxRelay {
    outbox: Arc<dyn OutboxRepository>,
    publisher: Arc<dyn EventPublisher>,
    clock: Arc<dyn Clock>,
    poll_interval: Duration,
    batch_size: i64,
}

impl OutboxRelay {
    /// Creates a relay that polls every `poll_interval`.
    #[must_use]
    pub fn new(
        outbox: Arc<dyn OutboxRepository>,
        publisher: Arc<dyn EventPublisher>,
        clock: Arc<dyn Clock>,
        poll_interval: Duration,
    ) -> Self {
        Self {
            outbox,
            publisher,
            clock,
            poll_interval,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }

    /// Overrides the batch size.
    #[must_use]
    pub fn with_batch_size(mut self, batch_size: i64) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Publishes one batch of pending records.
    ///
    /// Stops at the first publish failure so that records keep their
    /// creation order on the channel; the failed record is retried on the
    /// next pass.
    ///
    /// # Errors
    ///
    /// Returns `PipelineError::Persistence` if the outbox cannot be read or
    /// updated.
    pub async fn relay_once(&self) -> Result<RelayReport, PipelineError> {
        let mut report = RelayReport::default();
        for record in self.outbox.fetch_unpublished(self.batch_size).await? {
            match publish_order_created(self.publisher.as_ref(), &record.event).await {
                Ok(_) => {
                    self.outbox
                        .mark_published(record.id, self.clock.now())
                        .await?;
                    report.published += 1;
                }
                Err(e) => {
                    warn!(
                        outbox_id = %record.id,
                        order_id = %record.order_id,
                        attempts = record.attempts + 1,
                        error = %e,
                        "outbox publish failed"
                    );
                    self.outbox.record_failure(record.id, &e.to_string()).await?;
                    report.failed += 1;
                    break;
                }
            }
        }
        Ok(report)
    }

    /// Runs relay passes until `shutdown` is cancelled.
    ///
    /// A full batch is followed immediately by another pass; otherwise the
    /// relay sleeps for the poll interval.
    pub async fn run(&self, shutdown: CancellationToken) {
        info!(interval = ?self.poll_interval, "outbox relay started");
        let full_batch = usize::try_from(self.batch_size).unwrap_or(usize::MAX);
        loop {
            let backlog = match self.relay_once().await {
                Ok(report) => {
                    if report.published > 0 {
                        info!(published = report.published, "outbox records relayed");
                    }
                    report.failed == 0 && report.published >= full_batch
                }
                Err(e) => {
                    error!(error = %e, "outbox relay pass failed");
                    false
                }
            };
            if shutdown.is_cancelled() {
                break;
            }
            if backlog {
                continue;
            }
            tokio::select! {
                () = shutdown.cancelled() => break,
                () = tokio::time::sleep(self.poll_interval) => {}
            }
        }
        info!("outbox relay stopped");
    }
}
