//! Error types and handling for Wardrobe
//!
//! Errors of the embedding layer: configuration, I/O and metrics. Errors from
//! the core pass through unchanged in [`Error::Core`].

use thiserror::Error;

/// Main result type used throughout the crate
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the Wardrobe service and CLI
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Errors raised by the core engine
    #[error(transparent)]
    Core(#[from] wardrobe_core::Error),

    /// Invalid command line or command input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// I/O errors from std
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Prometheus metrics errors
    #[error("Metrics error: {0}")]
    Metrics(#[from] prometheus::Error),
}

impl Error {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an invalid input error
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Check if this error is caused by the caller's input rather than the environment
    pub fn is_client_error(&self) -> bool {
        matches!(self, Error::InvalidInput(_) | Error::Config(_) | Error::Core(_) | Error::Json(_))
    }
}
