//! Common error types for the viva pipeline services

use thiserror::Error;

/// Common result type for viva operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types across the viva services
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation error (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Broker connection or channel error (wraps lapin::Error)
    #[error("Broker error: {0}")]
    Broker(#[from] lapin::Error),

    /// Malformed message envelope or payload
    #[error("Decode error: {0}")]
    Decode(#[from] crate::message::DecodeError),

    /// Message serialization error
    #[error("Encode error: {0}")]
    Encode(#[from] serde_json::Error),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Requested resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Submission has no extracted text to process
    #[error("Missing content: {0}")]
    MissingContent(String),

    /// A job for this id is already in flight
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}
