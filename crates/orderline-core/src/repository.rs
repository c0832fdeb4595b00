//! Storage abstractions for orders, the outbox and analytics metrics.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::PipelineError;
use crate::event::OrderCreatedEvent;
use crate::metric::{AggregateMetric, MetricTotals};
use crate::order::{Order, Page};

/// System of record for orders.
#[async_trait]
pub trait OrderRepository: Send + Sync {
    /// Inserts a new order. An existing id is rejected, never overwritten.
    async fn insert(&self, order: &Order) -> Result<(), PipelineError>;

    /// Inserts a new order together with its outbox record, atomically.
    async fn insert_with_outbox(
        &self,
        order: &Order,
        event: &OrderCreatedEvent,
    ) -> Result<(), PipelineError>;

    /// Point lookup. `Ok(None)` when the id is unknown.
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Order>, PipelineError>;

    /// Orders by creation time, newest first.
    async fn list(&self, page: Page) -> Result<Vec<Order>, PipelineError>;
}

/// A pending or delivered outbox entry.
#[derive(Debug, Clone, PartialEq)]
pub struct OutboxRecord {
    /// Outbox row identifier.
    pub id: Uuid,
    /// The order the event describes.
    pub order_id: Uuid,
    /// Event discriminator.
    pub event_type: String,
    /// The event to relay.
    pub event: OrderCreatedEvent,
    /// Relay attempts so far.
    pub attempts: i32,
    /// When the record was written.
    pub created_at: DateTime<Utc>,
}

/// Relay-side access to the transactional outbox.
#[async_trait]
pub trait OutboxRepository: Send + Sync {
    /// Oldest unpublished records first.
    async fn fetch_unpublished(&self, limit: i64) -> Result<Vec<OutboxRecord>, PipelineError>;

    /// Marks a record as relayed.
    async fn mark_published(&self, id: Uuid, at: DateTime<Utc>) -> Result<(), PipelineError>;

    /// Records a failed relay attempt; the record stays pending.
    async fn record_failure(&self, id: Uuid, error: &str) -> Result<(), PipelineError>;
}

/// Append-only store of processed order events.
#[async_trait]
pub trait MetricRepository: Send + Sync {
    /// Appends a metric row and returns its identifier. No deduplication.
    async fn append(&self, metric: &AggregateMetric) -> Result<i64, PipelineError>;

    /// Count and sum across every row.
    async fn totals(&self) -> Result<MetricTotals, PipelineError>;
}
