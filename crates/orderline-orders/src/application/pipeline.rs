//! The producer side of the order pipeline.

use std::sync::Arc;
use std::time::Duration;

use orderline_core::cache::Cache;
use orderline_core::channel::EventPublisher;
use orderline_core::clock::Clock;
use orderline_core::command::Command;
use orderline_core::error::PipelineError;
use orderline_core::event::OrderCreatedEvent;
use orderline_core::order::{Order, Page};
use orderline_core::repository::OrderRepository;
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::application::order_cache::OrderCache;
use crate::application::publish::{PublishMode, publish_order_created};
use crate::domain::commands::CreateOrder;

/// Creates and reads orders.
///
/// The order store is the system of record. The cache and the event channel
/// are advisory: their failures are logged and never reach the caller.
#[derive(Clone)]
pub struct OrderPipeline {
    orders: Arc<dyn OrderRepository>,
    cache: OrderCache,
    publisher: Arc<dyn EventPublisher>,
    clock: Arc<dyn Clock>,
    mode: PublishMode,
}

impl OrderPipeline {
    /// Assembles a pipeline from its collaborators.
    #[must_use]
    pub fn new(
        orders: Arc<dyn OrderRepository>,
        cache: Arc<dyn Cache>,
        publisher: Arc<dyn EventPublisher>,
        clock: Arc<dyn Clock>,
        mode: PublishMode,
    ) -> Self {
        Self {
            orders,
            cache: OrderCache::new(cache),
            publisher,
            clock,
            mode,
        }
    }

    /// Overrides how long orders stay cached.
    #[must_use]
    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache = self.cache.with_ttl(ttl);
        self
    }

    /// How this pipeline publishes events.
    #[must_use]
    pub fn publish_mode(&self) -> PublishMode {
        self.mode
    }

    /// Validates and stores a new order, then announces it.
    ///
    /// Returns as soon as the store write succeeds. In detached mode the
    /// event is published on a spawned task whose outcome is only logged.
    ///
    /// # Errors
    ///
    /// Returns `PipelineError::Validation` for bad input (nothing is written)
    /// and `PipelineError::Persistence` if the store write fails.
    pub async fn create_order(&self, command: &CreateOrder) -> Result<Order, PipelineError> {
        command.request.validate()?;

        let order = Order::place(command.order_id, command.request.clone(), self.clock.now());
        let event = OrderCreatedEvent::from(&order);

        match self.mode {
            PublishMode::Detached => self.orders.insert(&order).await?,
            PublishMode::Outbox => self.orders.insert_with_outbox(&order, &event).await?,
        }
        info!(
            order_id = %order.id,
            command_type = command.command_type(),
            correlation_id = %command.correlation_id(),
            publish_mode = %self.mode,
            "order created"
        );

        self.cache.put(&order).await;

        if self.mode == PublishMode::Detached {
            self.spawn_publish(event);
        }
        Ok(order)
    }

    /// Reads an order, preferring the cache.
    ///
    /// # Errors
    ///
    /// Returns `PipelineError::NotFound` for an unknown id and
    /// `PipelineError::Persistence` if the store read fails.
    pub async fn get_order(&self, id: Uuid) -> Result<Order, PipelineError> {
        if let Some(order) = self.cache.get(id).await {
            debug!(order_id = %id, "order cache hit");
            return Ok(order);
        }
        debug!(order_id = %id, "order cache miss");

        let order = self
            .orders
            .find_by_id(id)
            .await?
            .ok_or(PipelineError::NotFound(id))?;
        self.cache.put(&order).await;
        Ok(order)
    }

    /// Lists orders newest first. Never served from the cache.
    ///
    /// # Errors
    ///
    /// Returns `PipelineError::Persistence` if the store read fails.
    pub async fn list_orders(&self, page: Page) -> Result<Vec<Order>, PipelineError> {
        self.orders.list(page).await
    }

    fn spawn_publish(&self, event: OrderCreatedEvent) {
        let publisher = Arc::clone(&self.publisher);
        tokio::spawn(async move {
            match publish_order_created(publisher.as_ref(), &event).await {
                Ok(queues) => debug!(order_id = %event.order_id, queues, "OrderCreated published"),
                Err(e) => error!(
                    order_id = %event.order_id,
                    error = %e,
                    "failed to publish OrderCreated, event lost"
                ),
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::time::Duration;

    use super::*;
    use chrono::{TimeZone, Utc};
    use orderline_core::channel::OutboundMessage;
    use orderline_core::order::{NewOrder, OrderStatus};
    use orderline_core::repository::OutboxRepository;
    use orderline_store::memory_cache::MemoryCache;
    use orderline_test_support::{
        FailingCache, FailingOrderRepository, FailingPublisher, FixedClock,
        InMemoryOrderRepository, RecordingPublisher,
    };
    use rust_decimal::Decimal;

    struct Harness {
        repo: Arc<InMemoryOrderRepository>,
        cache: Arc<MemoryCache>,
        publisher: Arc<RecordingPublisher>,
        pipeline: OrderPipeline,
    }

    fn harness(mode: PublishMode) -> Harness {
        let repo = Arc::new(InMemoryOrderRepository::new());
        let cache = Arc::new(MemoryCache::new());
        let publisher = Arc::new(RecordingPublisher::new());
        let clock = FixedClock(Utc.with_ymd_and_hms(2026, 1, 15, 10, 0, 0).unwrap());
        let pipeline = OrderPipeline::new(
            repo.clone(),
            cache.clone(),
            publisher.clone(),
            Arc::new(clock),
            mode,
        );
        Harness {
            repo,
            cache,
            publisher,
            pipeline,
        }
    }

    fn valid_request() -> NewOrder {
        NewOrder {
            customer_id: "customer-123".to_owned(),
            product_id: "product-456".to_owned(),
            quantity: 2,
            total_amount: Decimal::new(9999, 2),
        }
    }

    fn command(request: NewOrder) -> CreateOrder {
        CreateOrder::new(Uuid::new_v4(), request)
    }

    async fn wait_for_published(publisher: &RecordingPublisher, count: usize) -> Vec<OutboundMessage> {
        for _ in 0..200 {
            let published = publisher.published();
            if published.len() >= count {
                return published;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("expected {count} published messages");
    }

    #[tokio::test]
    async fn test_create_order_assigns_fresh_id_and_pending_status() {
        // Arrange
        let h = harness(PublishMode::Detached);
        let mut seen = HashSet::new();

        for _ in 0..5 {
            // Act
            let order = h.pipeline.create_order(&command(valid_request())).await.unwrap();

            // Assert
            assert!(seen.insert(order.id), "id reused: {}", order.id);
            assert!(!order.id.is_nil());
            assert_eq!(order.status, OrderStatus::Pending);
            assert_eq!(order.created_at, order.updated_at);
        }
        assert_eq!(h.repo.orders().len(), 5);
    }

    #[tokio::test]
    async fn test_create_order_publishes_order_created_detached() {
        // Arrange
        let h = harness(PublishMode::Detached);

        // Act
        let order = h.pipeline.create_order(&command(valid_request())).await.unwrap();

        // Assert
        let published = wait_for_published(&h.publisher, 1).await;
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].routing_key, "order.created");
        let event = OrderCreatedEvent::from_json(&published[0].body).unwrap();
        assert_eq!(event.order_id, order.id);
        assert_eq!(event.total_amount, Decimal::new(9999, 2));
        assert_eq!(event.event_type, "OrderCreated");
    }

    #[tokio::test]
    async fn test_create_order_rejects_invalid_requests_without_writing() {
        // Arrange
        let h = harness(PublishMode::Detached);
        let invalid = [
            NewOrder {
                customer_id: String::new(),
                ..valid_request()
            },
            NewOrder {
                product_id: " ".to_owned(),
                ..valid_request()
            },
            NewOrder {
                quantity: 0,
                ..valid_request()
            },
            NewOrder {
                total_amount: Decimal::ZERO,
                ..valid_request()
            },
        ];

        for request in invalid {
            // Act
            let result = h.pipeline.create_order(&command(request)).await;

            // Assert
            assert!(matches!(result, Err(PipelineError::Validation { .. })));
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(h.repo.orders().is_empty());
        assert!(h.cache.is_empty());
        assert!(h.publisher.published().is_empty());
    }

    #[tokio::test]
    async fn test_create_order_surfaces_store_failure() {
        // Arrange
        let cache = Arc::new(MemoryCache::new());
        let publisher = Arc::new(RecordingPublisher::new());
        let pipeline = OrderPipeline::new(
            Arc::new(FailingOrderRepository),
            cache.clone(),
            publisher.clone(),
            Arc::new(FixedClock(Utc::now())),
            PublishMode::Detached,
        );

        // Act
        let result = pipeline.create_order(&command(valid_request())).await;

        // Assert
        assert!(matches!(result, Err(PipelineError::Persistence(_))));
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(cache.is_empty());
        assert!(publisher.published().is_empty());
    }

    #[tokio::test]
    async fn test_create_order_succeeds_when_cache_and_channel_are_down() {
        // Arrange
        let repo = Arc::new(InMemoryOrderRepository::new());
        let pipeline = OrderPipeline::new(
            repo.clone(),
            Arc::new(FailingCache),
            Arc::new(FailingPublisher),
            Arc::new(FixedClock(Utc::now())),
            PublishMode::Detached,
        );

        // Act
        let order = pipeline.create_order(&command(valid_request())).await.unwrap();
        let read = pipeline.get_order(order.id).await.unwrap();

        // Assert
        assert_eq!(read, order);
        assert_eq!(repo.orders().len(), 1);
        assert_eq!(repo.find_calls(), 1);
    }

    #[tokio::test]
    async fn test_read_after_write_returns_created_order() {
        // Arrange
        let h = harness(PublishMode::Detached);
        let created = h.pipeline.create_order(&command(valid_request())).await.unwrap();

        // Act
        let read = h.pipeline.get_order(created.id).await.unwrap();

        // Assert
        assert_eq!(read, created);
        assert_eq!(h.repo.find_calls(), 0, "served from cache");
    }

    #[tokio::test]
    async fn test_get_order_reads_through_once_then_serves_from_cache() {
        // Arrange
        let h = harness(PublishMode::Detached);
        let order = Order::place(Uuid::new_v4(), valid_request(), Utc::now());
        h.repo.insert(&order).await.unwrap();

        // Act
        let first = h.pipeline.get_order(order.id).await.unwrap();
        let second = h.pipeline.get_order(order.id).await.unwrap();

        // Assert
        assert_eq!(first, order);
        assert_eq!(second, order);
        assert_eq!(h.repo.find_calls(), 1);
        assert_eq!(h.cache.len(), 1);
    }

    #[tokio::test]
    async fn test_get_order_reads_through_after_eviction() {
        // Arrange
        let h = harness(PublishMode::Detached);
        let created = h.pipeline.create_order(&command(valid_request())).await.unwrap();
        OrderCache::new(h.cache.clone()).invalidate(created.id).await;

        // Act
        let read = h.pipeline.get_order(created.id).await.unwrap();
        let again = h.pipeline.get_order(created.id).await.unwrap();

        // Assert
        assert_eq!(read, created);
        assert_eq!(again, created);
        assert_eq!(h.repo.find_calls(), 1);
    }

    #[tokio::test]
    async fn test_cache_ttl_override_expires_created_order() {
        // Arrange
        let h = harness(PublishMode::Detached);
        let pipeline = h.pipeline.clone().with_cache_ttl(Duration::from_millis(1));
        let created = pipeline.create_order(&command(valid_request())).await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;

        // Act
        let read = pipeline.get_order(created.id).await.unwrap();

        // Assert
        assert_eq!(read, created);
        assert_eq!(h.repo.find_calls(), 1, "expired entry read through");
    }

    #[tokio::test]
    #[tracing_test::traced_test]
    async fn test_create_order_logs_command_type_and_correlation() {
        // Arrange
        let h = harness(PublishMode::Detached);
        let command = command(valid_request());

        // Act
        let order = h.pipeline.create_order(&command).await.unwrap();

        // Assert
        assert!(logs_contain("order created"));
        assert!(logs_contain("orders.create_order"));
        assert!(logs_contain(&command.correlation_id.to_string()));
        assert!(logs_contain(&order.id.to_string()));
    }

    #[tokio::test]
    async fn test_get_order_unknown_id_is_not_found() {
        // Arrange
        let h = harness(PublishMode::Detached);
        let id = Uuid::new_v4();

        // Act
        let result = h.pipeline.get_order(id).await;

        // Assert
        match result {
            Err(PipelineError::NotFound(missing)) => assert_eq!(missing, id),
            other => panic!("expected NotFound, got {other:?}"),
        }
        assert!(h.cache.is_empty());
    }

    #[tokio::test]
    async fn test_list_orders_returns_most_recent_first() {
        // Arrange
        let h = harness(PublishMode::Detached);
        let mut created = Vec::new();
        for _ in 0..3 {
            created.push(h.pipeline.create_order(&command(valid_request())).await.unwrap());
        }

        // Act
        let page = h
            .pipeline
            .list_orders(Page::clamped(Some(1), Some(0)))
            .await
            .unwrap();

        // Assert
        assert_eq!(page.len(), 1);
        assert_eq!(page[0].id, created[2].id);
        assert_eq!(h.repo.find_calls(), 0);
    }

    #[tokio::test]
    async fn test_outbox_mode_writes_outbox_instead_of_publishing() {
        // Arrange
        let h = harness(PublishMode::Outbox);

        // Act
        let order = h.pipeline.create_order(&command(valid_request())).await.unwrap();

        // Assert
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(h.publisher.published().is_empty());
        let pending = h.repo.fetch_unpublished(10).await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].order_id, order.id);
        assert_eq!(h.pipeline.publish_mode(), PublishMode::Outbox);
    }
}
