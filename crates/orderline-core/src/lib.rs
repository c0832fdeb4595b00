//! Orderline Core — shared domain abstractions.
//!
//! This crate defines the order model, the events exchanged between the
//! producer and its consumers, and the traits every infrastructure adapter
//! implements. It contains no infrastructure code.

pub mod cache;
pub mod channel;
pub mod clock;
pub mod command;
pub mod error;
pub mod event;
pub mod handler;
pub mod health;
pub mod metric;
pub mod notification;
pub mod order;
pub mod repository;
