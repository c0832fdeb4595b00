//! Orderline Notification — the notification consumer.
//!
//! Turns every `OrderCreated` event into a customer notification. There is
//! no idempotency key, so a redelivered event notifies twice.

pub mod service;
pub mod sink;
