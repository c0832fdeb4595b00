//! Orderline Consumer — the at-least-once delivery loop.
//!
//! A consumer leases one message at a time from its queue, decodes it,
//! hands it to an [`orderline_core::handler::EventHandler`], and settles the
//! delivery according to a [`policy::DeliveryPolicy`]:
//!
//! * decoded and handled: acknowledged;
//! * undecodable: dropped or dead-lettered;
//! * handler failure: requeued until the attempt ceiling, then dead-lettered.

pub mod consumer;
pub mod policy;
