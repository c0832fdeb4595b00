//! Orderline — the order pipeline.
//!
//! Validates order requests, writes them to the system of record, keeps a
//! cache-aside copy, and announces every new order on the event channel.

pub mod application;
pub mod domain;
