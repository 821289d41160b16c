//! Error types for the collector framework.

use thiserror::Error;

/// Result type alias using [`CollectorError`].
pub type Result<T> = std::result::Result<T, CollectorError>;

/// Errors that can occur in the collector framework.
#[derive(Error, Debug)]
pub enum CollectorError {
    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Configuration file not found.
    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: String },

    /// Configuration validation error.
    #[error("Configuration validation failed: {0}")]
    ConfigValidation(String),

    /// The sink could not be reached.
    #[error("Failed to submit measurements for {host}: {message}")]
    Submit { host: String, message: String },

    /// The sink answered with a non-success status.
    #[error("Sink rejected measurements for {host}: HTTP {status}: {body}")]
    Rejected {
        host: String,
        status: u16,
        body: String,
    },

    /// The sink failed its health check.
    #[error("Sink is not healthy: {0}")]
    Unhealthy(String),

    /// HTTP client error.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Worker error.
    #[error("Worker error: {0}")]
    Worker(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl CollectorError {
    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a configuration validation error.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::ConfigValidation(msg.into())
    }

    /// Create a worker error.
    pub fn worker(msg: impl Into<String>) -> Self {
        Self::Worker(msg.into())
    }
}

impl From<iioflux_common::Error> for CollectorError {
    fn from(err: iioflux_common::Error) -> Self {
        match err {
            iioflux_common::Error::Io(e) => Self::Io(e),
            other => Self::Config(other.to_string()),
        }
    }
}
