//! Orderline Store — storage adapters.
//!
//! PostgreSQL implementations of the order, outbox and metric repositories,
//! plus the two cache backends.

pub mod memory_cache;
pub mod pg_cache;
pub mod pg_health;
pub mod pg_metric_repository;
pub mod pg_order_repository;

mod sql_error;
