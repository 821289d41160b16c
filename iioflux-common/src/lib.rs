//! iioflux Common Library
//!
//! Shared types and utilities for the iioflux collector:
//!
//! - [`measurement`] - Measurement data model (`Measurement`, host tag, timestamps)
//! - [`lineproto`] - InfluxDB line protocol encoding
//! - [`config`] - Configuration loading (JSON5 or YAML) and common sections
//! - [`secrets`] - Overlay of secret files onto a configuration tree
//! - [`error`] - Error types

pub mod config;
pub mod error;
pub mod lineproto;
pub mod measurement;
pub mod secrets;

// Re-export commonly used types at the crate root
pub use config::{
    ConfigFormat, InfluxDbConfig, LogFormat, LoggingConfig, load_config, load_value,
};
pub use error::{Error, Result};
pub use lineproto::{encode_batch, encode_line};
pub use measurement::{HOST_TAG, Measurement, local_now};
pub use secrets::{overlay_secret, overlay_secrets_dir};

/// Initialize tracing with the given configuration.
///
/// `RUST_LOG` takes precedence over the configured level. Supports two
/// output formats:
/// - `LogFormat::Text` (default): Human-readable text format
/// - `LogFormat::Json`: Structured JSON format for log aggregation systems
pub fn init_tracing(config: &LoggingConfig) -> Result<()> {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    let level = config.level_filter()?;
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::default().add_directive(level.into()));

    match config.format {
        LogFormat::Text => {
            tracing_subscriber::registry()
                .with(fmt::layer())
                .with(filter)
                .try_init()
                .map_err(|e| Error::Config(format!("Failed to initialize tracing: {}", e)))?;
        }
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(fmt::layer().json())
                .with(filter)
                .try_init()
                .map_err(|e| Error::Config(format!("Failed to initialize tracing: {}", e)))?;
        }
    }

    Ok(())
}
