//! Commands for the order pipeline.

use orderline_core::command::Command;
use orderline_core::order::NewOrder;
use uuid::Uuid;

/// Command to place a new order.
#[derive(Debug, Clone)]
pub struct CreateOrder {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// The identifier the new order will carry.
    pub order_id: Uuid,
    /// The client-supplied attributes.
    pub request: NewOrder,
}

impl CreateOrder {
    /// Wraps a client request, assigning a fresh order id.
    #[must_use]
    pub fn new(correlation_id: Uuid, request: NewOrder) -> Self {
        Self {
            correlation_id,
            order_id: Uuid::new_v4(),
            request,
        }
    }
}

impl Command for CreateOrder {
    fn command_type(&self) -> &'static str {
        "orders.create_order"
    }

    fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    fn request() -> NewOrder {
        NewOrder {
            customer_id: "customer-123".to_owned(),
            product_id: "product-456".to_owned(),
            quantity: 1,
            total_amount: Decimal::ONE,
        }
    }

    #[test]
    fn test_new_assigns_distinct_order_ids() {
        let correlation_id = Uuid::new_v4();

        let first = CreateOrder::new(correlation_id, request());
        let second = CreateOrder::new(correlation_id, request());

        assert_ne!(first.order_id, second.order_id);
        assert_eq!(first.correlation_id(), correlation_id);
        assert_eq!(first.command_type(), "orders.create_order");
    }
}
