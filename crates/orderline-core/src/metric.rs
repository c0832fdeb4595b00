//! Derived analytics records.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::event::OrderCreatedEvent;

/// One row per processed `OrderCreated` event. Append-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateMetric {
    /// The order the event described.
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
    /// When the consumer processed the event.
    pub processed_at: DateTime<Utc>,
}

impl AggregateMetric {
    /// Builds the metric row for an event processed at `processed_at`.
    #[must_use]
    pub fn from_event(event: &OrderCreatedEvent, processed_at: DateTime<Utc>) -> Self {
        Self {
            order_id: event.order_id,
            customer_id: event.customer_id.clone(),
            product_id: event.product_id.clone(),
            quantity: event.quantity,
            total_amount: event.total_amount,
            processed_at,
        }
    }
}

/// Raw totals over every stored metric row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MetricTotals {
    /// Number of rows.
    pub count: i64,
    /// Sum of `total_amount`.
    pub revenue: Decimal,
}

/// Summary computed on demand from [`MetricTotals`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyticsSummary {
    /// Number of processed order events.
    pub total_orders: i64,
    /// Sum of order totals.
    #[serde(with = "rust_decimal::serde::float")]
    pub total_revenue: Decimal,
    /// Mean order total, rounded to cents. Zero when there are no orders.
    #[serde(with = "rust_decimal::serde::float")]
    pub average_order_size: Decimal,
    /// When the summary was computed.
    pub last_updated: DateTime<Utc>,
}

impl AnalyticsSummary {
    /// Derives count, sum and average from raw totals.
    #[must_use]
    pub fn from_totals(totals: MetricTotals, computed_at: DateTime<Utc>) -> Self {
        let average_order_size = if totals.count == 0 {
            Decimal::ZERO
        } else {
            (totals.revenue / Decimal::from(totals.count)).round_dp(2)
        };
        Self {
            total_orders: totals.count,
            total_revenue: totals.revenue,
            average_order_size,
            last_updated: computed_at,
        }
    }
}
