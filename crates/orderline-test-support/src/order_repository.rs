//! Test order repositories — `OrderRepository` and `OutboxRepository`
//! implementations for tests.

use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use orderline_core::error::PipelineError;
use orderline_core::event::OrderCreatedEvent;
use orderline_core::order::{Order, Page};
use orderline_core::repository::{OrderRepository, OutboxRecord, OutboxRepository};
use uuid::Uuid;

#[derive(Debug, Clone)]
struct OutboxEntry {
    record: OutboxRecord,
    published_at: Option<DateTime<Utc>>,
    last_error: Option<String>,
}

/// An in-memory order store with an outbox. Counts point lookups so tests
/// can observe whether a read went through to the store.
#[derive(Debug, Default)]
pub struct InMemoryOrderRepository {
    orders: Mutex<Vec<Order>>,
    outbox: Mutex<Vec<OutboxEntry>>,
    find_calls: AtomicUsize,
}

impl InMemoryOrderRepository {
    /// Creates an empty repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of `find_by_id` calls so far.
    pub fn find_calls(&self) -> usize {
        self.find_calls.load(Ordering::SeqCst)
    }

    /// Returns a snapshot of every stored order in insertion order.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn orders(&self) -> Vec<Order> {
        self.orders.lock().unwrap().clone()
    }

    /// Returns the ids of outbox records already marked published.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn published_outbox_ids(&self) -> Vec<Uuid> {
        self.outbox
            .lock()
            .unwrap()
            .iter()
            .filter(|entry| entry.published_at.is_some())
            .map(|entry| entry.record.id)
            .collect()
    }

    /// Returns the last relay error recorded against an outbox record.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn last_outbox_error(&self, id: Uuid) -> Option<String> {
        self.outbox
            .lock()
            .unwrap()
            .iter()
            .find(|entry| entry.record.id == id)
            .and_then(|entry| entry.last_error.clone())
    }

    fn insert_locked(orders: &mut Vec<Order>, order: &Order) -> Result<(), PipelineError> {
        if orders.iter().any(|existing| existing.id == order.id) {
            return Err(PipelineError::Persistence(format!(
                "order {} already exists",
                order.id
            )));
        }
        orders.push(order.clone());
        Ok(())
    }
}

#[async_trait]
impl OrderRepository for InMemoryOrderRepository {
    async fn insert(&self, order: &Order) -> Result<(), PipelineError> {
        Self::insert_locked(&mut self.orders.lock().unwrap(), order)
    }

    async fn insert_with_outbox(
        &self,
        order: &Order,
        event: &OrderCreatedEvent,
    ) -> Result<(), PipelineError> {
        let mut orders = self.orders.lock().unwrap();
        let mut outbox = self.outbox.lock().unwrap();
        Self::insert_locked(&mut orders, order)?;
        outbox.push(OutboxEntry {
            record: OutboxRecord {
                id: Uuid::now_v7(),
                order_id: order.id,
                event_type: event.event_type.clone(),
                event: event.clone(),
                attempts: 0,
                created_at: order.created_at,
            },
            published_at: None,
            last_error: None,
        });
        Ok(())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Order>, PipelineError> {
        self.find_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .orders
            .lock()
            .unwrap()
            .iter()
            .find(|order| order.id == id)
            .cloned())
    }

    async fn list(&self, page: Page) -> Result<Vec<Order>, PipelineError> {
        // Later insertions win timestamp ties, matching the store's sequence
        // tiebreak.
        let mut orders: Vec<Order> = self.orders.lock().unwrap().iter().rev().cloned().collect();
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        let offset = usize::try_from(page.offset).unwrap_or(usize::MAX);
        let limit = usize::try_from(page.limit).unwrap_or(0);
        Ok(orders.into_iter().skip(offset).take(limit).collect())
    }
}

#[async_trait]
impl OutboxRepository for InMemoryOrderRepository {
    async fn fetch_unpublished(&self, limit: i64) -> Result<Vec<OutboxRecord>, PipelineError> {
        let limit = usize::try_from(limit).unwrap_or(0);
        Ok(self
            .outbox
            .lock()
            .unwrap()
            .iter()
            .filter(|entry| entry.published_at.is_none())
            .take(limit)
            .map(|entry| entry.record.clone())
            .collect())
    }

    async fn mark_published(&self, id: Uuid, at: DateTime<Utc>) -> Result<(), PipelineError> {
        if let Some(entry) = self
            .outbox
            .lock()
            .unwrap()
            .iter_mut()
            .find(|entry| entry.record.id == id)
        {
            entry.record.attempts += 1;
            entry.published_at = Some(at);
        }
        Ok(())
    }

    async fn record_failure(&self, id: Uuid, error: &str) -> Result<(), PipelineError> {
        if let Some(entry) = self
            .outbox
            .lock()
            .unwrap()
            .iter_mut()
            .find(|entry| entry.record.id == id)
        {
            entry.record.attempts += 1;
            entry.last_error = Some(error.to_owned());
        }
        Ok(())
    }
}

/// An order repository that always returns a persistence error. Useful for
/// testing error-handling paths.
#[derive(Debug)]
pub struct FailingOrderRepository;

#[async_trait]
impl OrderRepository for FailingOrderRepository {
    async fn insert(&self, _order: &Order) -> Result<(), PipelineError> {
        Err(PipelineError::Persistence("connection refused".into()))
    }

    async fn insert_with_outbox(
        &self,
        _order: &Order,
        _event: &OrderCreatedEvent,
    ) -> Result<(), PipelineError> {
        Err(PipelineError::Persistence("connection refused".into()))
    }

    async fn find_by_id(&self, _id: Uuid) -> Result<Option<Order>, PipelineError> {
        Err(PipelineError::Persistence("connection refused".into()))
    }

    async fn list(&self, _page: Page) -> Result<Vec<Order>, PipelineError> {
        Err(PipelineError::Persistence("connection refused".into()))
    }
}
