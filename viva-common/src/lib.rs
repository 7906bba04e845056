//! # Viva Common Library
//!
//! Shared code for the viva pipeline services including:
//! - Message envelope types and wire codec
//! - Queue transport (AMQP broker wrapper with reconnect)
//! - Common error types
//! - Configuration loading

pub mod config;
pub mod error;
pub mod message;
pub mod queue;

pub use error::{Error, Result};
