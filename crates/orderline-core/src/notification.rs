//! Customer notifications raised by the notification consumer.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::PipelineError;
use crate::event::OrderCreatedEvent;

/// Delivery channel of a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    /// Order confirmation e-mail.
    Email,
}

/// A notification about to be sent to a customer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    /// The order the notification is about.
    pub order_id: Uuid,
    /// Customer reference of the recipient.
    pub recipient: String,
    /// Delivery channel.
    pub kind: NotificationKind,
    /// Subject line.
    pub subject: String,
    /// Message text.
    pub body: String,
    /// When the notification was produced.
    pub sent_at: DateTime<Utc>,
}

impl Notification {
    /// Order-confirmation notification for a freshly created order.
    #[must_use]
    pub fn order_created(event: &OrderCreatedEvent, sent_at: DateTime<Utc>) -> Self {
        let amount: Decimal = event.total_amount.round_dp(2);
        Self {
            order_id: event.order_id,
            recipient: event.customer_id.clone(),
            kind: NotificationKind::Email,
            subject: format!("Order {} received", event.order_id),
            body: format!(
                "We received your order of {} x {} totalling {amount}.",
                event.quantity, event.product_id
            ),
            sent_at,
        }
    }
}

/// Where notifications end up.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    /// Sends one notification.
    async fn send(&self, notification: &Notification) -> Result<(), PipelineError>;
}
