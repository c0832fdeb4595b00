//! `PostgreSQL` implementation of the `OrderRepository` and
//! `OutboxRepository` traits.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{FromRow, PgPool, Postgres, Transaction};
use uuid::Uuid;

use orderline_core::error::PipelineError;
use orderline_core::event::OrderCreatedEvent;
use orderline_core::order::{Order, OrderStatus, Page};
use orderline_core::repository::{OrderRepository, OutboxRecord, OutboxRepository};

use crate::sql_error::{is_unique_violation, persistence};

const ORDER_COLUMNS: &str =
    "id, customer_id, product_id, quantity, total_amount, status, created_at, updated_at";

#[derive(Debug, FromRow)]
struct OrderRow {
    id: Uuid,
    customer_id: String,
    product_id: String,
    quantity: i32,
    total_amount: Decimal,
    status: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<OrderRow> for Order {
    type Error = PipelineError;

    fn try_from(row: OrderRow) -> Result<Self, Self::Error> {
        let status: OrderStatus = row
            .status
            .parse()
            .map_err(|e: PipelineError| PipelineError::Persistence(e.to_string()))?;
        Ok(Self {
            id: row.id,
            customer_id: row.customer_id,
            product_id: row.product_id,
            quantity: row.quantity,
            total_amount: row.total_amount,
            status,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, FromRow)]
struct OutboxRow {
    id: Uuid,
    order_id: Uuid,
    event_type: String,
    payload: serde_json::Value,
    attempts: i32,
    created_at: DateTime<Utc>,
}

impl TryFrom<OutboxRow> for OutboxRecord {
    type Error = PipelineError;

    fn try_from(row: OutboxRow) -> Result<Self, Self::Error> {
        let event: OrderCreatedEvent = serde_json::from_value(row.payload).map_err(|e| {
            PipelineError::Persistence(format!("outbox payload {} is corrupt: {e}", row.id))
        })?;
        Ok(Self {
            id: row.id,
            order_id: row.order_id,
            event_type: row.event_type,
            event,
            attempts: row.attempts,
            created_at: row.created_at,
        })
    }
}

/// PostgreSQL-backed order repository.
#[derive(Debug, Clone)]
pub struct PgOrderRepository {
    pool: PgPool,
}

impl PgOrderRepository {
    /// Creates a new `PgOrderRepository`.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn insert_in(
        tx: &mut Transaction<'_, Postgres>,
        order: &Order,
    ) -> Result<(), PipelineError> {
        sqlx::query(
            "INSERT INTO orders (id, customer_id, product_id, quantity, total_amount, status, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(order.id)
        .bind(&order.customer_id)
        .bind(&order.product_id)
        .bind(order.quantity)
        .bind(order.total_amount)
        .bind(order.status.as_str())
        .bind(order.created_at)
        .bind(order.updated_at)
        .execute(&mut **tx)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                PipelineError::Persistence(format!("order {} already exists", order.id))
            } else {
                persistence("failed to insert order", &e)
            }
        })?;
        Ok(())
    }
}

#[async_trait]
impl OrderRepository for PgOrderRepository {
    async fn insert(&self, order: &Order) -> Result<(), PipelineError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| persistence("failed to begin transaction", &e))?;
        Self::insert_in(&mut tx, order).await?;
        tx.commit()
            .await
            .map_err(|e| persistence("failed to commit order", &e))
    }

    async fn insert_with_outbox(
        &self,
        order: &Order,
        event: &OrderCreatedEvent,
    ) -> Result<(), PipelineError> {
        let payload = serde_json::to_value(event)
            .map_err(|e| PipelineError::Persistence(format!("outbox serialization failed: {e}")))?;

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| persistence("failed to begin transaction", &e))?;
        Self::insert_in(&mut tx, order).await?;
        sqlx::query(
            "INSERT INTO outbox_events (id, order_id, event_type, payload, created_at) \
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(Uuid::now_v7())
        .bind(order.id)
        .bind(&event.event_type)
        .bind(payload)
        .bind(order.created_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| persistence("failed to insert outbox record", &e))?;
        tx.commit()
            .await
            .map_err(|e| persistence("failed to commit order", &e))
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Order>, PipelineError> {
        let row: Option<OrderRow> =
            sqlx::query_as(&format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1"))
                .bind(id)
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| persistence("failed to load order", &e))?;
        row.map(Order::try_from).transpose()
    }

    async fn list(&self, page: Page) -> Result<Vec<Order>, PipelineError> {
        let rows: Vec<OrderRow> = sqlx::query_as(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders ORDER BY created_at DESC, seq DESC LIMIT $1 OFFSET $2"
        ))
        .bind(page.limit)
        .bind(page.offset)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| persistence("failed to list orders", &e))?;
        rows.into_iter().map(Order::try_from).collect()
    }
}

#[async_trait]
impl OutboxRepository for PgOrderRepository {
    async fn fetch_unpublished(&self, limit: i64) -> Result<Vec<OutboxRecord>, PipelineError> {
        let rows: Vec<OutboxRow> = sqlx::query_as(
            "SELECT id, order_id, event_type, payload, attempts, created_at \
             FROM outbox_events WHERE published_at IS NULL \
             ORDER BY created_at, id LIMIT $1",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| persistence("failed to fetch outbox", &e))?;
        rows.into_iter().map(OutboxRecord::try_from).collect()
    }

    async fn mark_published(&self, id: Uuid, at: DateTime<Utc>) -> Result<(), PipelineError> {
        sqlx::query("UPDATE outbox_events SET published_at = $2, attempts = attempts + 1 WHERE id = $1")
            .bind(id)
            .bind(at)
            .execute(&self.pool)
            .await
            .map_err(|e| persistence("failed to mark outbox record published", &e))?;
        Ok(())
    }

    async fn record_failure(&self, id: Uuid, error: &str) -> Result<(), PipelineError> {
        sqlx::query(
            "UPDATE outbox_events SET attempts = attempts + 1, last_error = $2 WHERE id = $1",
        )
        .bind(id)
        .bind(error)
        .execute(&self.pool)
        .await
        .map_err(|e| persistence("failed to record outbox failure", &e))?;
        Ok(())
    }
}
