//! Orderline Channel — the durable event channel between the order producer
//! and its consumers.
//!
//! Messages are published to a named topic exchange and copied into every
//! queue whose binding key matches the routing key. Each queue is drained by
//! exactly one consumer group: a delivery is leased to one reader, and stays
//! in the queue until it is acknowledged, dropped, or dead-lettered. A lease
//! that expires without an acknowledgement makes the message visible again,
//! so delivery is at-least-once.

pub mod pg_channel;
pub mod pg_queue_source;
pub mod topic;
pub mod topology;

mod sql_error;
