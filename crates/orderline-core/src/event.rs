//! Order lifecycle events exchanged over the event channel.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::PipelineError;
use crate::order::{Order, OrderStatus};

/// Discriminator stamped on every [`OrderCreatedEvent`] body.
pub const ORDER_CREATED_EVENT_TYPE: &str = "OrderCreated";

/// Snapshot of an order at the moment it was created.
///
/// Carries no identity of its own; consumers that want to deduplicate key on
/// `order_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderCreatedEvent {
    /// The created order.
    pub order_id: Uuid,
    /// Customer reference.
    pub customer_id: String,
    /// Product reference.
    pub product_id: String,
    /// Number of units.
    pub quantity: i32,
    /// Order total.
    #[serde(with = "rust_decimal::serde::float")]
    pub total_amount: Decimal,
    /// Status at creation (always `pending`).
    pub status: OrderStatus,
    /// Creation timestamp of the order.
    pub created_at: DateTime<Utc>,
    /// Event type discriminator.
    #[serde(default)]
    pub event_type: String,
}

impl From<&Order> for OrderCreatedEvent {
    fn from(order: &Order) -> Self {
        Self {
            order_id: order.id,
            customer_id: order.customer_id.clone(),
            product_id: order.product_id.clone(),
            quantity: order.quantity,
            total_amount: order.total_amount,
            status: order.status,
            created_at: order.created_at,
            event_type: ORDER_CREATED_EVENT_TYPE.to_owned(),
        }
    }
}

impl OrderCreatedEvent {
    /// Serializes the event to its JSON wire body, stamping the discriminator.
    ///
    /// # Errors
    ///
    /// Returns `PipelineError::Transport` if serialization fails.
    pub fn to_json(&self) -> Result<Vec<u8>, PipelineError> {
        let mut stamped = self.clone();
        ORDER_CREATED_EVENT_TYPE.clone_into(&mut stamped.event_type);
        serde_json::to_vec(&stamped)
            .map_err(|e| PipelineError::Transport(format!("event serialization failed: {e}")))
    }

    /// Decodes a JSON wire body.
    ///
    /// A missing discriminator is tolerated; a different one is not.
    ///
    /// # Errors
    ///
    /// Returns `PipelineError::Parse` for malformed bodies or foreign event types.
    pub fn from_json(body: &[u8]) -> Result<Self, PipelineError> {
        let event: Self =
            serde_json::from_slice(body).map_err(|e| PipelineError::Parse(e.to_string()))?;
        if !event.event_type.is_empty() && event.event_type != ORDER_CREATED_EVENT_TYPE {
            return Err(PipelineError::Parse(format!(
                "unexpected event type `{}`",
                event.event_type
            )));
        }
        Ok(event)
    }
}
