//! Common error types for OLPS

use thiserror::Error;

/// Common result type for OLPS operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types across OLPS microservices
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation error (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Document body serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Requested resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid user input, request parameter, or reference
    #[error("Validation error: {0}")]
    Validation(String),

    /// Request conflicts with existing state (duplicate key, concurrent edit)
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Request payload exceeds a configured limit
    #[error("Payload too large: {0}")]
    PayloadTooLarge(String),

    /// Internal server error
    #[error("Internal error: {0}")]
    Internal(String),
}
