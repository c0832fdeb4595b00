//! Publishing order events onto the channel.

use std::fmt;
use std::str::FromStr;

use orderline_core::channel::{
    EventPublisher, ORDER_CREATED_ROUTING_KEY, ORDERS_EXCHANGE, OutboundMessage,
};
use orderline_core::error::PipelineError;
use orderline_core::event::{ORDER_CREATED_EVENT_TYPE, OrderCreatedEvent};

/// How the pipeline gets an `OrderCreated` event onto the channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PublishMode {
    /// Publish on a detached task after the store write. A channel outage
    /// loses the event.
    #[default]
    Detached,
    /// Write an outbox record in the order's transaction and let the
    /// [`crate::application::outbox_relay::OutboxRelay`] deliver it.
    Outbox,
}

impl FromStr for PublishMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "detached" => Ok(Self::Detached),
            "outbox" => Ok(Self::Outbox),
            other => Err(format!(
                "unknown publish mode `{other}`, expected `detached` or `outbox`"
            )),
        }
    }
}

impl fmt::Display for PublishMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Detached => "detached",
            Self::Outbox => "outbox",
        })
    }
}

/// Wire envelope of an `OrderCreated` event.
///
/// # Errors
///
/// Returns `PipelineError::Transport` if the event cannot be serialized.
pub fn order_created_message(event: &OrderCreatedEvent) -> Result<OutboundMessage, PipelineError> {
    Ok(OutboundMessage::persistent_json(
        ORDERS_EXCHANGE,
        ORDER_CREATED_ROUTING_KEY,
        ORDER_CREATED_EVENT_TYPE,
        event.to_json()?,
    ))
}

/// Publishes an `OrderCreated` event to the orders exchange.
///
/// # Errors
///
/// Returns `PipelineError::Transport` if serialization or the channel fails.
pub async fn publish_order_created(
    publisher: &dyn EventPublisher,
    event: &OrderCreatedEvent,
) -> Result<usize, PipelineError> {
    publisher.publish(order_created_message(event)?).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use orderline_core::channel::JSON_CONTENT_TYPE;
    use orderline_core::order::{NewOrder, Order};
    use rust_decimal::Decimal;
    use uuid::Uuid;

    #[test]
    fn test_publish_mode_parses_known_values() {
        assert_eq!("detached".parse::<PublishMode>(), Ok(PublishMode::Detached));
        assert_eq!(" Outbox ".parse::<PublishMode>(), Ok(PublishMode::Outbox));
        assert!("kafka".parse::<PublishMode>().is_err());
        assert_eq!(PublishMode::default(), PublishMode::Detached);
    }

    #[test]
    fn test_order_created_message_envelope() {
        let order = Order::place(
            Uuid::new_v4(),
            NewOrder {
                customer_id: "customer-123".to_owned(),
                product_id: "product-456".to_owned(),
                quantity: 2,
                total_amount: Decimal::new(9999, 2),
            },
            Utc.with_ymd_and_hms(2026, 1, 15, 10, 0, 0).unwrap(),
        );

        let message = order_created_message(&OrderCreatedEvent::from(&order)).unwrap();

        assert_eq!(message.exchange, "orders");
        assert_eq!(message.routing_key, "order.created");
        assert_eq!(message.event_type, "OrderCreated");
        assert_eq!(message.content_type, JSON_CONTENT_TYPE);
        assert!(message.persistent);
        let decoded = OrderCreatedEvent::from_json(&message.body).unwrap();
        assert_eq!(decoded.order_id, order.id);
    }
}
