//! `PostgreSQL` implementation of the consuming side of the event channel.

use std::time::Duration;

use async_trait::async_trait;
use sqlx::{FromRow, PgPool};

use orderline_core::channel::{Delivery, MessageSource, NackAction};
use orderline_core::error::PipelineError;

use crate::sql_error::transport;

#[derive(Debug, FromRow)]
struct DeliveryRow {
    delivery_tag: i64,
    queue_name: String,
    routing_key: String,
    event_type: String,
    body: Vec<u8>,
    delivery_count: i32,
}

impl From<DeliveryRow> for Delivery {
    fn from(row: DeliveryRow) -> Self {
        Self {
            delivery_tag: row.delivery_tag,
            queue: row.queue_name,
            routing_key: row.routing_key,
            event_type: row.event_type,
            body: row.body,
            delivery_count: row.delivery_count.unsigned_abs(),
        }
    }
}

/// Reader on one durable queue.
///
/// Deliveries are leased with `FOR UPDATE SKIP LOCKED`, so several readers
/// on the same queue never receive the same message concurrently.
#[derive(Debug, Clone)]
pub struct PgQueueSource {
    pool: PgPool,
    queue: String,
    lease: Duration,
}

impl PgQueueSource {
    /// Creates a reader on `queue`.
    #[must_use]
    pub fn new(pool: PgPool, queue: &str, lease: Duration) -> Self {
        Self {
            pool,
            queue: queue.to_owned(),
            lease,
        }
    }

    fn unknown_tag(&self, delivery: &Delivery) -> PipelineError {
        PipelineError::Transport(format!(
            "unknown delivery tag {} on queue `{}`",
            delivery.delivery_tag, self.queue
        ))
    }
}

#[async_trait]
impl MessageSource for PgQueueSource {
    fn queue(&self) -> &str {
        &self.queue
    }

    async fn receive(&self) -> Result<Option<Delivery>, PipelineError> {
        let row: Option<DeliveryRow> = sqlx::query_as(
            "UPDATE channel_messages \
             SET delivery_count = delivery_count + 1, \
                 leased_until = NOW() + make_interval(secs => $2) \
             WHERE delivery_tag = ( \
                 SELECT delivery_tag FROM channel_messages \
                 WHERE queue_name = $1 AND (leased_until IS NULL OR leased_until < NOW()) \
                 ORDER BY delivery_tag \
                 FOR UPDATE SKIP LOCKED \
                 LIMIT 1) \
             RETURNING delivery_tag, queue_name, routing_key, event_type, body, delivery_count",
        )
        .bind(&self.queue)
        .bind(self.lease.as_secs_f64())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| transport("failed to receive message", &e))?;
        Ok(row.map(Delivery::from))
    }

    async fn ack(&self, delivery: &Delivery) -> Result<(), PipelineError> {
        let result =
            sqlx::query("DELETE FROM channel_messages WHERE delivery_tag = $1 AND queue_name = $2")
                .bind(delivery.delivery_tag)
                .bind(&self.queue)
                .execute(&self.pool)
                .await
                .map_err(|e| transport("failed to ack message", &e))?;
        if result.rows_affected() == 0 {
            return Err(self.unknown_tag(delivery));
        }
        Ok(())
    }

    async fn nack(&self, delivery: &Delivery, action: NackAction) -> Result<(), PipelineError> {
        let sql = match action {
            NackAction::Requeue => {
                "UPDATE channel_messages SET leased_until = NULL \
                 WHERE delivery_tag = $1 AND queue_name = $2"
            }
            NackAction::Drop => {
                "DELETE FROM channel_messages WHERE delivery_tag = $1 AND queue_name = $2"
            }
        };
        let result = sqlx::query(sql)
            .bind(delivery.delivery_tag)
            .bind(&self.queue)
            .execute(&self.pool)
            .await
            .map_err(|e| transport("failed to nack message", &e))?;
        if result.rows_affected() == 0 {
            return Err(self.unknown_tag(delivery));
        }
        Ok(())
    }

    async fn dead_letter(&self, delivery: &Delivery, reason: &str) -> Result<(), PipelineError> {
        let result = sqlx::query(
            "WITH moved AS ( \
                 DELETE FROM channel_messages WHERE delivery_tag = $1 AND queue_name = $2 \
                 RETURNING queue_name, delivery_tag, routing_key, event_type, content_type, body, delivery_count) \
             INSERT INTO channel_dead_letters \
                 (queue_name, original_delivery_tag, routing_key, event_type, content_type, body, delivery_count, reason) \
             SELECT queue_name, delivery_tag, routing_key, event_type, content_type, body, delivery_count, $3 \
             FROM moved",
        )
        .bind(delivery.delivery_tag)
        .bind(&self.queue)
        .bind(reason)
        .execute(&self.pool)
        .await
        .map_err(|e| transport("failed to dead-letter message", &e))?;
        if result.rows_affected() == 0 {
            return Err(self.unknown_tag(delivery));
        }
        Ok(())
    }
}
