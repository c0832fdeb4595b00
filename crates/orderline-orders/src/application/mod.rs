//! Application layer for the order pipeline.

pub mod order_cache;
pub mod outbox_relay;
pub mod pipeline;
pub mod publish;
