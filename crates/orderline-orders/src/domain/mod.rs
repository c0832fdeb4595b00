//! Domain layer for the order pipeline.

pub mod commands;
