//! `PostgreSQL` implementation of the publishing side of the event channel.

use std::collections::BTreeSet;
use std::time::Duration;

use async_trait::async_trait;
use sqlx::PgPool;
use tracing::{debug, warn};

use orderline_core::channel::{EventPublisher, OutboundMessage};
use orderline_core::error::PipelineError;
use orderline_core::health::HealthCheck;

use crate::pg_queue_source::PgQueueSource;
use crate::sql_error::transport;
use crate::topic::topic_matches;

/// Durable topic exchange stored in `PostgreSQL`.
#[derive(Debug, Clone)]
pub struct PgEventChannel {
    pool: PgPool,
}

impl PgEventChannel {
    /// Creates a new `PgEventChannel`.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Declares a durable topic exchange.
    ///
    /// # Errors
    ///
    /// Returns `PipelineError::Transport` if the declaration fails.
    pub async fn declare_exchange(&self, name: &str) -> Result<(), PipelineError> {
        sqlx::query("INSERT INTO channel_exchanges (name) VALUES ($1) ON CONFLICT (name) DO NOTHING")
            .bind(name)
            .execute(&self.pool)
            .await
            .map_err(|e| transport("failed to declare exchange", &e))?;
        Ok(())
    }

    /// Declares a durable queue.
    ///
    /// # Errors
    ///
    /// Returns `PipelineError::Transport` if the declaration fails.
    pub async fn declare_queue(&self, name: &str) -> Result<(), PipelineError> {
        sqlx::query("INSERT INTO channel_queues (name) VALUES ($1) ON CONFLICT (name) DO NOTHING")
            .bind(name)
            .execute(&self.pool)
            .await
            .map_err(|e| transport("failed to declare queue", &e))?;
        Ok(())
    }

    /// Binds `queue` to `exchange` under `binding_key`.
    ///
    /// # Errors
    ///
    /// Returns `PipelineError::Transport` if either side is undeclared.
    pub async fn bind_queue(
        &self,
        queue: &str,
        exchange: &str,
        binding_key: &str,
    ) -> Result<(), PipelineError> {
        sqlx::query(
            "INSERT INTO channel_bindings (queue_name, exchange_name, binding_key) \
             VALUES ($1, $2, $3) ON CONFLICT DO NOTHING",
        )
        .bind(queue)
        .bind(exchange)
        .bind(binding_key)
        .execute(&self.pool)
        .await
        .map_err(|e| transport("failed to bind queue", &e))?;
        Ok(())
    }

    /// Opens a consumer handle on `queue`, leasing each delivery for `lease`.
    #[must_use]
    pub fn source(&self, queue: &str, lease: Duration) -> PgQueueSource {
        PgQueueSource::new(self.pool.clone(), queue, lease)
    }

    /// Number of messages waiting in, or leased from, `queue`.
    ///
    /// # Errors
    ///
    /// Returns `PipelineError::Transport` if the count fails.
    pub async fn queue_depth(&self, queue: &str) -> Result<i64, PipelineError> {
        sqlx::query_scalar("SELECT COUNT(*) FROM channel_messages WHERE queue_name = $1")
            .bind(queue)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| transport("failed to count queue", &e))
    }

    /// Number of messages moved out of `queue` into dead-letter storage.
    ///
    /// # Errors
    ///
    /// Returns `PipelineError::Transport` if the count fails.
    pub async fn dead_letter_count(&self, queue: &str) -> Result<i64, PipelineError> {
        sqlx::query_scalar("SELECT COUNT(*) FROM channel_dead_letters WHERE queue_name = $1")
            .bind(queue)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| transport("failed to count dead letters", &e))
    }
}

#[async_trait]
impl EventPublisher for PgEventChannel {
    async fn publish(&self, message: OutboundMessage) -> Result<usize, PipelineError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| transport("failed to begin publish", &e))?;

        let declared: bool =
            sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM channel_exchanges WHERE name = $1)")
                .bind(&message.exchange)
                .fetch_one(&mut *tx)
                .await
                .map_err(|e| transport("failed to look up exchange", &e))?;
        if !declared {
            return Err(PipelineError::Transport(format!(
                "exchange `{}` is not declared",
                message.exchange
            )));
        }

        let bindings: Vec<(String, String)> = sqlx::query_as(
            "SELECT queue_name, binding_key FROM channel_bindings WHERE exchange_name = $1",
        )
        .bind(&message.exchange)
        .fetch_all(&mut *tx)
        .await
        .map_err(|e| transport("failed to load bindings", &e))?;

        // A queue bound under several matching keys still gets one copy.
        let queues: BTreeSet<String> = bindings
            .into_iter()
            .filter(|(_, key)| topic_matches(key, &message.routing_key))
            .map(|(queue, _)| queue)
            .collect();

        for queue in &queues {
            sqlx::query(
                "INSERT INTO channel_messages \
                 (queue_name, exchange_name, routing_key, event_type, content_type, body, persistent) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7)",
            )
            .bind(queue)
            .bind(&message.exchange)
            .bind(&message.routing_key)
            .bind(&message.event_type)
            .bind(&message.content_type)
            .bind(&message.body)
            .bind(message.persistent)
            .execute(&mut *tx)
            .await
            .map_err(|e| transport("failed to enqueue message", &e))?;
        }

        tx.commit()
            .await
            .map_err(|e| transport("failed to commit publish", &e))?;

        if queues.is_empty() {
            warn!(
                exchange = %message.exchange,
                routing_key = %message.routing_key,
                "message unroutable, no queue bound"
            );
        } else {
            debug!(
                exchange = %message.exchange,
                routing_key = %message.routing_key,
                queues = queues.len(),
                "message routed"
            );
        }
        Ok(queues.len())
    }
}

#[async_trait]
impl HealthCheck for PgEventChannel {
    async fn check(&self) -> Result<(), PipelineError> {
        sqlx::query("SELECT 1 FROM channel_exchanges LIMIT 1")
            .execute(&self.pool)
            .await
            .map(|_| ())
            .map_err(|e| transport("event channel unreachable", &e))
    }
}
