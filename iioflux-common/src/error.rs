use thiserror::Error;

/// Common error type for iioflux components.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid secret '{name}': {message}")]
    Secret { name: String, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias using iioflux's Error.
pub type Result<T> = std::result::Result<T, Error>;
