//! Metric recording and summary computation.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use orderline_core::cache::Cache;
use orderline_core::clock::Clock;
use orderline_core::error::PipelineError;
use orderline_core::event::OrderCreatedEvent;
use orderline_core::handler::EventHandler;
use orderline_core::metric::{AggregateMetric, AnalyticsSummary};
use orderline_core::repository::MetricRepository;
use tracing::{debug, warn};

/// Cache key of the analytics summary.
pub const SUMMARY_CACHE_KEY: &str = "analytics:summary";

/// How long a computed summary stays cached.
pub const SUMMARY_CACHE_TTL: Duration = Duration::from_secs(5 * 60);

/// Records processed orders and answers summary queries.
#[derive(Clone)]
pub struct AnalyticsService {
    metrics: Arc<dyn MetricRepository>,
    cache: Arc<dyn Cache>,
    clock: Arc<dyn Clock>,
    /// Bumped on every recorded metric; a summary computed across a bump is
    /// not written back to the cache.
    generation: Arc<AtomicU64>,
}

impl AnalyticsService {
    /// Assembles the service from its collaborators.
    #[must_use]
    pub fn new(
        metrics: Arc<dyn MetricRepository>,
        cache: Arc<dyn Cache>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            metrics,
            cache,
            clock,
            generation: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Appends a metric row for `event` and invalidates the cached summary.
    ///
    /// Redelivered events are appended again.
    ///
    /// # Errors
    ///
    /// Returns `PipelineError::Handler` if the metric cannot be stored.
    pub async fn process_order_created(
        &self,
        event: &OrderCreatedEvent,
    ) -> Result<(), PipelineError> {
        let metric = AggregateMetric::from_event(event, self.clock.now());
        let id = self
            .metrics
            .append(&metric)
            .await
            .map_err(|e| PipelineError::Handler(format!("failed to record metric: {e}")))?;
        debug!(order_id = %event.order_id, metric_id = id, "metric recorded");

        self.generation.fetch_add(1, Ordering::AcqRel);
        if let Err(e) = self.cache.delete(SUMMARY_CACHE_KEY).await {
            warn!(error = %e, "failed to invalidate analytics summary");
        }
        Ok(())
    }

    /// Returns the summary over every recorded metric, cache first.
    ///
    /// # Errors
    ///
    /// Returns `PipelineError::Persistence` if the totals cannot be read.
    pub async fn get_summary(&self) -> Result<AnalyticsSummary, PipelineError> {
        match self.cache.get(SUMMARY_CACHE_KEY).await {
            Ok(Some(raw)) => match serde_json::from_str(&raw) {
                Ok(summary) => return Ok(summary),
                Err(e) => warn!(error = %e, "discarding undecodable cached summary"),
            },
            Ok(None) => {}
            Err(e) => warn!(error = %e, "analytics summary cache read failed"),
        }

        let generation = self.generation.load(Ordering::Acquire);
        let totals = self.metrics.totals().await?;
        let summary = AnalyticsSummary::from_totals(totals, self.clock.now());
        self.write_back(&summary, generation).await;
        Ok(summary)
    }

    /// Caches `summary` unless a metric was recorded since `generation` was
    /// read. A metric recorded while the write is in flight removes it again.
    async fn write_back(&self, summary: &AnalyticsSummary, generation: u64) {
        if self.generation.load(Ordering::Acquire) != generation {
            debug!("metrics changed while computing summary, not caching it");
            return;
        }
        let raw = match serde_json::to_string(summary) {
            Ok(raw) => raw,
            Err(e) => {
                warn!(error = %e, "analytics summary encode failed");
                return;
            }
        };
        if let Err(e) = self
            .cache
            .set(SUMMARY_CACHE_KEY, &raw, SUMMARY_CACHE_TTL)
            .await
        {
            warn!(error = %e, "analytics summary cache write failed");
            return;
        }
        if self.generation.load(Ordering::Acquire) != generation {
            if let Err(e) = self.cache.delete(SUMMARY_CACHE_KEY).await {
                warn!(error = %e, "failed to drop stale analytics summary");
            }
        }
    }
}

#[async_trait]
impl EventHandler for AnalyticsService {
    fn name(&self) -> &'static str {
        "analytics"
    }

    async fn handle(&self, event: &OrderCreatedEvent) -> Result<(), PipelineError> {
        self.process_order_created(event).await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use chrono::{TimeZone, Utc};
    use orderline_consumer::consumer::{Consumer, Outcome};
    use orderline_consumer::policy::DeliveryPolicy;
    use orderline_core::channel::{
        ANALYTICS_QUEUE, EventPublisher, ORDER_CREATED_ROUTING_KEY, ORDERS_EXCHANGE,
        OutboundMessage,
    };
    use orderline_core::event::ORDER_CREATED_EVENT_TYPE;
    use orderline_core::metric::MetricTotals;
    use orderline_core::order::{NewOrder, Order};
    use orderline_store::memory_cache::MemoryCache;
    use orderline_test_support::{
        FailingCache, FixedClock, InMemoryEventChannel, InMemoryMetricRepository,
    };
    use rust_decimal::Decimal;
    use uuid::Uuid;

    fn event(cents: i64) -> OrderCreatedEvent {
        OrderCreatedEvent::from(&Order::place(
            Uuid::new_v4(),
            NewOrder {
                customer_id: "customer-123".to_owned(),
                product_id: "product-456".to_owned(),
                quantity: 2,
                total_amount: Decimal::new(cents, 2),
            },
            Utc.with_ymd_and_hms(2026, 1, 15, 10, 0, 0).unwrap(),
        ))
    }

    fn clock() -> Arc<FixedClock> {
        Arc::new(FixedClock(
            Utc.with_ymd_and_hms(2026, 1, 15, 12, 0, 0).unwrap(),
        ))
    }

    #[tokio::test]
    async fn test_process_order_created_appends_metric() {
        // Arrange
        let metrics = Arc::new(InMemoryMetricRepository::new());
        let service = AnalyticsService::new(metrics.clone(), Arc::new(MemoryCache::new()), clock());
        let event = event(9999);

        // Act
        service.process_order_created(&event).await.unwrap();

        // Assert
        let rows = metrics.rows();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].order_id, event.order_id);
        assert_eq!(rows[0].quantity, 2);
        assert_eq!(rows[0].total_amount, Decimal::new(9999, 2));
        assert_eq!(rows[0].processed_at, clock().0);
    }

    #[tokio::test]
    async fn test_process_order_created_maps_store_failure_to_handler_error() {
        // Arrange
        let metrics = Arc::new(InMemoryMetricRepository::failing_first(1));
        let service = AnalyticsService::new(metrics.clone(), Arc::new(MemoryCache::new()), clock());

        // Act
        let result = service.process_order_created(&event(100)).await;

        // Assert
        assert!(matches!(result, Err(PipelineError::Handler(_))));
        assert!(metrics.rows().is_empty());
    }

    #[tokio::test]
    async fn test_get_summary_is_idempotent_without_new_events() {
        // Arrange
        let metrics = Arc::new(InMemoryMetricRepository::new());
        let service = AnalyticsService::new(metrics, Arc::new(MemoryCache::new()), clock());
        for cents in [1000, 2000, 3000] {
            service.process_order_created(&event(cents)).await.unwrap();
        }

        // Act
        let first = service.get_summary().await.unwrap();
        let second = service.get_summary().await.unwrap();

        // Assert
        assert_eq!(first, second);
        assert_eq!(first.total_orders, 3);
        assert_eq!(first.total_revenue, Decimal::new(6000, 2));
        assert_eq!(first.average_order_size, Decimal::new(2000, 2));
    }

    #[tokio::test]
    async fn test_get_summary_is_cached_until_next_event() {
        // Arrange
        let metrics = Arc::new(InMemoryMetricRepository::new());
        let cache = Arc::new(MemoryCache::new());
        let service = AnalyticsService::new(metrics, cache.clone(), clock());
        service.process_order_created(&event(1000)).await.unwrap();

        // Act
        let before = service.get_summary().await.unwrap();
        let cached = cache.get(SUMMARY_CACHE_KEY).await.unwrap();
        service.process_order_created(&event(9999)).await.unwrap();
        let invalidated = cache.get(SUMMARY_CACHE_KEY).await.unwrap();
        let after = service.get_summary().await.unwrap();

        // Assert
        assert!(cached.is_some());
        assert!(invalidated.is_none());
        assert_eq!(after.total_orders, before.total_orders + 1);
        assert_eq!(after.total_revenue - before.total_revenue, Decimal::new(9999, 2));
    }

    #[tokio::test]
    async fn test_get_summary_works_without_cache() {
        // Arrange
        let service = AnalyticsService::new(
            Arc::new(InMemoryMetricRepository::new()),
            Arc::new(FailingCache),
            clock(),
        );

        // Act
        service.process_order_created(&event(500)).await.unwrap();
        let summary = service.get_summary().await.unwrap();

        // Assert
        assert_eq!(summary.total_orders, 1);
        assert_eq!(summary.average_order_size, Decimal::new(500, 2));
    }

    #[tokio::test]
    async fn test_get_summary_on_empty_store_is_zero() {
        // Arrange
        let service = AnalyticsService::new(
            Arc::new(InMemoryMetricRepository::new()),
            Arc::new(MemoryCache::new()),
            clock(),
        );

        // Act
        let summary = service.get_summary().await.unwrap();

        // Assert
        assert_eq!(summary.total_orders, 0);
        assert_eq!(summary.total_revenue, Decimal::ZERO);
        assert_eq!(summary.average_order_size, Decimal::ZERO);
    }

    /// Stores the metric, then reports failure once, as when the process
    /// dies between the write and the acknowledgement.
    struct FailAfterWrite {
        inner: AnalyticsService,
        failures_left: Mutex<u32>,
    }

    #[async_trait]
    impl EventHandler for FailAfterWrite {
        fn name(&self) -> &'static str {
            "fail-after-write"
        }

        async fn handle(&self, event: &OrderCreatedEvent) -> Result<(), PipelineError> {
            self.inner.handle(event).await?;
            let mut failures_left = self.failures_left.lock().unwrap();
            if *failures_left > 0 {
                *failures_left -= 1;
                return Err(PipelineError::Handler("lost acknowledgement".into()));
            }
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_redelivery_after_failure_duplicates_metric_rows() {
        // Arrange
        let channel = InMemoryEventChannel::with_order_topology();
        let metrics = Arc::new(InMemoryMetricRepository::new());
        let service = AnalyticsService::new(metrics.clone(), Arc::new(MemoryCache::new()), clock());
        let event = event(9999);
        channel.publish(order_created_message(&event)).await.unwrap();
        let consumer = Consumer::new(
            Arc::new(channel.source(ANALYTICS_QUEUE)),
            Arc::new(FailAfterWrite {
                inner: service.clone(),
                failures_left: Mutex::new(1),
            }),
            DeliveryPolicy::default(),
            Duration::from_millis(5),
        );

        // Act
        let first = consumer.process_next().await.unwrap();
        let second = consumer.process_next().await.unwrap();

        // Assert
        assert_eq!(first, Some(Outcome::Requeued));
        assert_eq!(second, Some(Outcome::Acked));
        // No deduplication: the same order is counted twice.
        let rows = metrics.rows();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].order_id, event.order_id);
        assert_eq!(rows[1].order_id, event.order_id);
        assert_eq!(service.get_summary().await.unwrap().total_orders, 2);
    }

    fn order_created_message(event: &OrderCreatedEvent) -> OutboundMessage {
        OutboundMessage::persistent_json(
            ORDERS_EXCHANGE,
            ORDER_CREATED_ROUTING_KEY,
            ORDER_CREATED_EVENT_TYPE,
            event.to_json().unwrap(),
        )
    }

    /// Reads the totals immediately but takes a while to return them, so a
    /// metric can be recorded while a summary is being computed.
    struct SlowTotals {
        inner: InMemoryMetricRepository,
        delay: Duration,
    }

    #[async_trait]
    impl MetricRepository for SlowTotals {
        async fn append(&self, metric: &AggregateMetric) -> Result<i64, PipelineError> {
            self.inner.append(metric).await
        }

        async fn totals(&self) -> Result<MetricTotals, PipelineError> {
            let totals = self.inner.totals().await?;
            tokio::time::sleep(self.delay).await;
            Ok(totals)
        }
    }

    #[tokio::test]
    async fn test_summary_computed_across_new_metric_is_not_cached() {
        // Arrange
        let metrics = Arc::new(SlowTotals {
            inner: InMemoryMetricRepository::new(),
            delay: Duration::from_millis(50),
        });
        let service = AnalyticsService::new(metrics, Arc::new(MemoryCache::new()), clock());
        let reader = service.clone();
        let in_flight = tokio::spawn(async move { reader.get_summary().await });
        tokio::time::sleep(Duration::from_millis(10)).await;

        // Act
        service.process_order_created(&event(2500)).await.unwrap();
        let stale = in_flight.await.unwrap().unwrap();
        let fresh = service.get_summary().await.unwrap();

        // Assert
        assert_eq!(stale.total_orders, 0);
        assert_eq!(fresh.total_orders, 1);
        assert_eq!(fresh.total_revenue, Decimal::new(2500, 2));
    }
}
