//! Requests that change pipeline state.

use uuid::Uuid;

/// A state-changing request accepted by a service.
///
/// `command_type` and `correlation_id` are attached to the log line the
/// service writes when the command is carried out.
pub trait Command: Send + Sync + std::fmt::Debug {
    /// Dotted name such as `orders.create_order`.
    fn command_type(&self) -> &'static str;

    /// Identifier carried from the HTTP request through every log line.
    fn correlation_id(&self) -> Uuid;
}
