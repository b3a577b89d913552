//! Common error types for photosort

use thiserror::Error;

/// Common result type for photosort operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types shared across photosort crates
#[derive(Error, Debug)]
pub enum Error {
    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Malformed or empty reference table input
    #[error("Reference load error: {0}")]
    ReferenceLoad(String),

    /// Invalid user input or request parameter
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}
