//! Prometheus metrics served under `GET /metrics`.
//!
//! Names follow `orderline_<area>_<metric>`. Values are read from their
//! sources when scraped: consumer counters from [`ConsumerStats`], queue
//! gauges from the Postgres event channel.

use std::sync::Arc;

use orderline_channel::pg_channel::PgEventChannel;
use orderline_consumer::consumer::ConsumerStats;
use parking_lot::Mutex;
use prometheus::{Encoder, IntCounterVec, IntGaugeVec, Opts, Registry, TextEncoder};
use tracing::warn;

/// Per-process registry and the sources it reads on each scrape.
pub struct PipelineMetrics {
    registry: Registry,
    settled: IntCounterVec,
    queue_depth: IntGaugeVec,
    dead_letters: IntGaugeVec,
    channel: Option<Arc<PgEventChannel>>,
    queues: Vec<&'static str>,
    consumers: Vec<(&'static str, Arc<ConsumerStats>)>,
    // Serializes counter catch-up between concurrent scrapes.
    sync: Mutex<()>,
}

impl PipelineMetrics {
    /// Registers every metric family on a fresh registry.
    ///
    /// # Errors
    ///
    /// Returns `prometheus::Error` if a family cannot be created or registered.
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let settled = IntCounterVec::new(
            Opts::new(
                "orderline_consumer_messages_total",
                "Messages settled by a consumer, by outcome",
            ),
            &["queue", "outcome"],
        )?;
        let queue_depth = IntGaugeVec::new(
            Opts::new(
                "orderline_queue_depth",
                "Messages waiting in or leased from a queue",
            ),
            &["queue"],
        )?;
        let dead_letters = IntGaugeVec::new(
            Opts::new(
                "orderline_queue_dead_letters",
                "Messages moved to dead-letter storage",
            ),
            &["queue"],
        )?;

        registry.register(Box::new(settled.clone()))?;
        registry.register(Box::new(queue_depth.clone()))?;
        registry.register(Box::new(dead_letters.clone()))?;

        Ok(Self {
            registry,
            settled,
            queue_depth,
            dead_letters,
            channel: None,
            queues: Vec::new(),
            consumers: Vec::new(),
            sync: Mutex::new(()),
        })
    }

    /// Reports depth and dead-letter count of `queues` from `channel`.
    #[must_use]
    pub fn with_channel(mut self, channel: Arc<PgEventChannel>, queues: &[&'static str]) -> Self {
        self.channel = Some(channel);
        self.queues.extend_from_slice(queues);
        self
    }

    /// Reports the settle counters of the consumer draining `queue`.
    #[must_use]
    pub fn with_consumer(mut self, queue: &'static str, stats: Arc<ConsumerStats>) -> Self {
        self.consumers.push((queue, stats));
        self
    }

    /// Brings every family up to date with its source.
    ///
    /// Channel failures leave the previous gauge values in place.
    pub async fn refresh(&self) {
        self.sync_consumers();

        let Some(channel) = &self.channel else {
            return;
        };
        for &queue in &self.queues {
            match channel.queue_depth(queue).await {
                Ok(depth) => self.queue_depth.with_label_values(&[queue]).set(depth),
                Err(e) => warn!(queue, error = %e, "failed to read queue depth"),
            }
            match channel.dead_letter_count(queue).await {
                Ok(count) => self.dead_letters.with_label_values(&[queue]).set(count),
                Err(e) => warn!(queue, error = %e, "failed to read dead-letter count"),
            }
        }
    }

    fn sync_consumers(&self) {
        let _guard = self.sync.lock();
        for (queue, stats) in &self.consumers {
            let snapshot = stats.snapshot();
            for (outcome, total) in [
                ("acked", snapshot.acked),
                ("dropped", snapshot.dropped),
                ("requeued", snapshot.requeued),
                ("dead_lettered", snapshot.dead_lettered),
            ] {
                let counter = self.settled.with_label_values(&[*queue, outcome]);
                let seen = counter.get();
                if total > seen {
                    counter.inc_by(total - seen);
                }
            }
        }
    }

    /// Renders the registry in the Prometheus text format.
    ///
    /// # Errors
    ///
    /// Returns `prometheus::Error` if encoding fails.
    pub fn encode(&self) -> Result<String, prometheus::Error> {
        let encoder = TextEncoder::new();
        let families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&families, &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fresh_registry_renders_without_consumers() {
        let metrics = PipelineMetrics::new().unwrap();

        metrics.refresh().await;
        let text = metrics.encode().unwrap();

        assert!(!text.contains("orderline_consumer_messages_total{"));
    }

    #[tokio::test]
    async fn test_registered_consumer_reports_zero_before_traffic() {
        // Arrange
        let stats = Arc::new(ConsumerStats::default());
        let metrics = PipelineMetrics::new()
            .unwrap()
            .with_consumer("analytics.orders", stats);

        // Act
        metrics.refresh().await;
        let text = metrics.encode().unwrap();

        // Assert
        let acked = text
            .lines()
            .find(|line| {
                line.starts_with("orderline_consumer_messages_total{")
                    && line.contains("outcome=\"acked\"")
                    && line.contains("queue=\"analytics.orders\"")
            })
            .unwrap();
        assert!(acked.ends_with(" 0"));
    }
}
