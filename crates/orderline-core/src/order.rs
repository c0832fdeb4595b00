//! The order record and its lifecycle.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, SubsecRound, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::PipelineError;

/// Default page size for order listings.
pub const DEFAULT_PAGE_LIMIT: i64 = 10;

/// Largest page size a caller may request.
pub const MAX_PAGE_LIMIT: i64 = 100;

/// Lifecycle status of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    /// Newly created, awaiting confirmation.
    Pending,
    /// Accepted for fulfillment.
    Confirmed,
    /// Withdrawn. Terminal.
    Cancelled,
}

impl OrderStatus {
    /// Wire and storage representation.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Confirmed => "confirmed",
            Self::Cancelled => "cancelled",
        }
    }

    /// Whether moving from `self` to `next` keeps the lifecycle monotonic.
    #[must_use]
    pub fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Confirmed | Self::Cancelled) | (Self::Confirmed, Self::Cancelled)
        )
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "confirmed" => Ok(Self::Confirmed),
            "cancelled" => Ok(Self::Cancelled),
            other => Err(PipelineError::validation(
                "status",
                format!("unknown order status `{other}`"),
            )),
        }
    }
}

/// The attributes a client supplies when placing an order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewOrder {
    /// Customer reference.
    pub customer_id: String,
    /// Product reference.
    pub product_id: String,
    /// Number of units.
    pub quantity: i32,
    /// Order total.
    #[serde(with = "rust_decimal::serde::float")]
    pub total_amount: Decimal,
}

impl NewOrder {
    /// Checks every input constraint, reporting the first offending field.
    ///
    /// # Errors
    ///
    /// Returns `PipelineError::Validation` naming the field that failed.
    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.customer_id.trim().is_empty() {
            return Err(PipelineError::validation("customer_id", "is required"));
        }
        if self.product_id.trim().is_empty() {
            return Err(PipelineError::validation("product_id", "is required"));
        }
        if self.quantity <= 0 {
            return Err(PipelineError::validation(
                "quantity",
                "must be greater than 0",
            ));
        }
        if self.total_amount <= Decimal::ZERO {
            return Err(PipelineError::validation(
                "total_amount",
                "must be greater than 0",
            ));
        }
        Ok(())
    }
}

/// An order as held by the system of record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    /// Opaque identifier, assigned once at creation.
    pub id: Uuid,
    /// Customer reference.
    pub customer_id: String,
    /// Product reference.
    pub product_id: String,
    /// Number of units.
    pub quantity: i32,
    /// Order total.
    #[serde(with = "rust_decimal::serde::float")]
    pub total_amount: Decimal,
    /// Lifecycle status.
    pub status: OrderStatus,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last modification timestamp.
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// Builds a pending order from validated input.
    ///
    /// Timestamps are truncated to microseconds, the precision of the store,
    /// so that cached and stored copies compare equal.
    #[must_use]
    pub fn place(id: Uuid, request: NewOrder, now: DateTime<Utc>) -> Self {
        let now = now.trunc_subsecs(6);
        Self {
            id,
            customer_id: request.customer_id,
            product_id: request.product_id,
            quantity: request.quantity,
            total_amount: request.total_amount,
            status: OrderStatus::Pending,
            created_at: now,
            updated_at: now,
        }
    }

    /// Moves the order to `next`, refusing transitions that go backwards.
    ///
    /// # Errors
    ///
    /// Returns `PipelineError::Validation` on a non-monotonic transition.
    pub fn transition_to(
        &mut self,
        next: OrderStatus,
        now: DateTime<Utc>,
    ) -> Result<(), PipelineError> {
        if !self.status.can_transition_to(next) {
            return Err(PipelineError::validation(
                "status",
                format!("cannot move from {} to {next}", self.status),
            ));
        }
        self.status = next;
        self.updated_at = now.trunc_subsecs(6);
        Ok(())
    }
}

/// A clamped limit/offset window over the order listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    /// Maximum number of rows, in `[1, MAX_PAGE_LIMIT]`.
    pub limit: i64,
    /// Rows to skip, never negative.
    pub offset: i64,
}

impl Page {
    /// Clamps raw caller input into a valid window.
    ///
    /// A missing or non-positive limit falls back to [`DEFAULT_PAGE_LIMIT`].
    #[must_use]
    pub fn clamped(limit: Option<i64>, offset: Option<i64>) -> Self {
        let limit = match limit {
            Some(l) if l > 0 => l.min(MAX_PAGE_LIMIT),
            _ => DEFAULT_PAGE_LIMIT,
        };
        let offset = offset.unwrap_or(0).max(0);
        Self { limit, offset }
    }
}

impl Default for Page {
    fn default() -> Self {
        Self::clamped(None, None)
    }
}
