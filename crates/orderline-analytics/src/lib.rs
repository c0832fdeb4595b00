//! Orderline Analytics — the aggregate consumer.
//!
//! Appends one metric row per `OrderCreated` event and serves a
//! cache-aside summary computed from every row.

pub mod service;
