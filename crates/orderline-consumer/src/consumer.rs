//! Sequential consumer loop with prefetch one.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use orderline_core::channel::{Delivery, MessageSource, NackAction};
use orderline_core::error::PipelineError;
use orderline_core::event::OrderCreatedEvent;
use orderline_core::handler::EventHandler;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::policy::{DeliveryPolicy, ParseFailureAction};

/// Upper bound on the pause after a channel failure.
const MAX_RECONNECT_DELAY: Duration = Duration::from_secs(5);

/// How one delivery was settled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Handled and acknowledged.
    Acked,
    /// Undecodable and discarded.
    Dropped,
    /// Handler failed; returned to the queue.
    Requeued,
    /// Moved to dead-letter storage.
    DeadLettered,
}

/// Running totals of settled deliveries.
#[derive(Debug, Default)]
pub struct ConsumerStats {
    acked: AtomicU64,
    dropped: AtomicU64,
    requeued: AtomicU64,
    dead_lettered: AtomicU64,
}

/// Point-in-time copy of [`ConsumerStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub acked: u64,
    pub dropped: u64,
    pub requeued: u64,
    pub dead_lettered: u64,
}

impl ConsumerStats {
    fn record(&self, outcome: Outcome) {
        let counter = match outcome {
            Outcome::Acked => &self.acked,
            Outcome::Dropped => &self.dropped,
            Outcome::Requeued => &self.requeued,
            Outcome::DeadLettered => &self.dead_lettered,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Reads every counter.
    #[must_use]
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            acked: self.acked.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            requeued: self.requeued.load(Ordering::Relaxed),
            dead_lettered: self.dead_lettered.load(Ordering::Relaxed),
        }
    }
}

/// Pause after consecutive channel failures: starts at the poll interval
/// and doubles up to [`MAX_RECONNECT_DELAY`].
#[derive(Debug, Clone, Copy)]
struct ReconnectBackoff {
    base: Duration,
    current: Duration,
}

impl ReconnectBackoff {
    fn new(base: Duration) -> Self {
        Self {
            base,
            current: base,
        }
    }

    fn next_delay(&mut self) -> Duration {
        let delay = self.current;
        self.current = (self.current * 2).min(MAX_RECONNECT_DELAY);
        delay
    }

    fn reset(&mut self) {
        self.current = self.base;
    }
}

/// Drains one queue into one handler, one message at a time.
#[derive(Clone)]
pub struct Consumer {
    source: Arc<dyn MessageSource>,
    handler: Arc<dyn EventHandler>,
    policy: DeliveryPolicy,
    poll_interval: Duration,
    stats: Arc<ConsumerStats>,
}

impl Consumer {
    /// Creates a consumer that polls an empty queue every `poll_interval`.
    #[must_use]
    pub fn new(
        source: Arc<dyn MessageSource>,
        handler: Arc<dyn EventHandler>,
        policy: DeliveryPolicy,
        poll_interval: Duration,
    ) -> Self {
        Self {
            source,
            handler,
            policy,
            poll_interval,
            stats: Arc::new(ConsumerStats::default()),
        }
    }

    /// Shared handle on this consumer's counters.
    #[must_use]
    pub fn stats(&self) -> Arc<ConsumerStats> {
        Arc::clone(&self.stats)
    }

    /// Leases, handles and settles the next message.
    ///
    /// Returns `Ok(None)` when the queue is empty.
    ///
    /// # Errors
    ///
    /// Returns `PipelineError::Transport` if the channel fails. Handler and
    /// decode failures are settled, not returned.
    pub async fn process_next(&self) -> Result<Option<Outcome>, PipelineError> {
        let Some(delivery) = self.source.receive().await? else {
            return Ok(None);
        };
        debug!(
            queue = self.source.queue(),
            delivery_tag = delivery.delivery_tag,
            delivery_count = delivery.delivery_count,
            "message received"
        );

        let outcome = match OrderCreatedEvent::from_json(&delivery.body) {
            Ok(event) => self.handle(&delivery, &event).await?,
            Err(e) => self.reject_unparseable(&delivery, &e).await?,
        };
        self.stats.record(outcome);
        Ok(Some(outcome))
    }

    async fn handle(
        &self,
        delivery: &Delivery,
        event: &OrderCreatedEvent,
    ) -> Result<Outcome, PipelineError> {
        match self.handler.handle(event).await {
            Ok(()) => {
                self.source.ack(delivery).await?;
                info!(
                    handler = self.handler.name(),
                    order_id = %event.order_id,
                    redelivered = delivery.redelivered(),
                    "event processed"
                );
                Ok(Outcome::Acked)
            }
            Err(e) if self.policy.exhausted(delivery.delivery_count) => {
                error!(
                    handler = self.handler.name(),
                    order_id = %event.order_id,
                    delivery_count = delivery.delivery_count,
                    error = %e,
                    "event failed too many times, dead-lettering"
                );
                let reason = format!(
                    "handler failed after {} deliveries: {e}",
                    delivery.delivery_count
                );
                self.source.dead_letter(delivery, &reason).await?;
                Ok(Outcome::DeadLettered)
            }
            Err(e) => {
                warn!(
                    handler = self.handler.name(),
                    order_id = %event.order_id,
                    delivery_count = delivery.delivery_count,
                    error = %e,
                    "event handling failed, requeueing"
                );
                self.source.nack(delivery, NackAction::Requeue).await?;
                Ok(Outcome::Requeued)
            }
        }
    }

    async fn reject_unparseable(
        &self,
        delivery: &Delivery,
        cause: &PipelineError,
    ) -> Result<Outcome, PipelineError> {
        warn!(
            queue = self.source.queue(),
            delivery_tag = delivery.delivery_tag,
            action = ?self.policy.on_parse_failure,
            error = %cause,
            "undecodable message"
        );
        match self.policy.on_parse_failure {
            ParseFailureAction::Drop => {
                self.source.nack(delivery, NackAction::Drop).await?;
                Ok(Outcome::Dropped)
            }
            ParseFailureAction::DeadLetter => {
                self.source
                    .dead_letter(delivery, &cause.to_string())
                    .await?;
                Ok(Outcome::DeadLettered)
            }
        }
    }

    /// Processes messages until `shutdown` is cancelled.
    ///
    /// Cancellation is observed between messages, so a handler that has
    /// started always finishes and settles its delivery.
    pub async fn run(&self, shutdown: CancellationToken) {
        info!(
            queue = self.source.queue(),
            handler = self.handler.name(),
            "consumer started"
        );
        let mut backoff = ReconnectBackoff::new(self.poll_interval);
        while !shutdown.is_cancelled() {
            let pause = match self.process_next().await {
                Ok(Some(_)) => {
                    backoff.reset();
                    continue;
                }
                Ok(None) => {
                    backoff.reset();
                    self.poll_interval
                }
                Err(e) => {
                    error!(queue = self.source.queue(), error = %e, "channel failure");
                    backoff.next_delay()
                }
            };
            tokio::select! {
                () = shutdown.cancelled() => break,
                () = tokio::time::sleep(pause) => {}
            }
        }
        info!(queue = self.source.queue(), "consumer stopped");
    }
}
