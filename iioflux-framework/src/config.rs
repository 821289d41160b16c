//! Configuration traits and utilities.

use std::path::Path;

use iioflux_common::{InfluxDbConfig, LoggingConfig};
use serde::de::DeserializeOwned;

use crate::args::CollectorArgs;
use crate::error::{CollectorError, Result};

/// Trait for collector configuration types.
///
/// Implement this trait for the collector's configuration struct to get
/// loading (JSON5 or YAML, with secrets overlay), CLI/environment overrides
/// and validation.
///
/// # Example
///
/// ```ignore
/// use serde::Deserialize;
/// use iioflux_framework::{CollectorConfig, InfluxDbConfig, LoggingConfig};
///
/// #[derive(Debug, Deserialize)]
/// pub struct MyConfig {
///     pub influxdb: InfluxDbConfig,
///     pub logging: LoggingConfig,
///     pub hosts: Vec<HostConfig>,
/// }
///
/// impl CollectorConfig for MyConfig {
///     fn logging(&self) -> &LoggingConfig { &self.logging }
///     fn logging_mut(&mut self) -> &mut LoggingConfig { &mut self.logging }
///     fn influxdb(&self) -> &InfluxDbConfig { &self.influxdb }
///     fn influxdb_mut(&mut self) -> &mut InfluxDbConfig { &mut self.influxdb }
///
///     fn validate(&self) -> Result<()> {
///         if self.hosts.is_empty() {
///             return Err(CollectorError::validation("At least one host required"));
///         }
///         Ok(())
///     }
/// }
/// ```
pub trait CollectorConfig: Sized + DeserializeOwned {
    /// Get the logging configuration.
    fn logging(&self) -> &LoggingConfig;

    /// Get the logging configuration for overriding.
    fn logging_mut(&mut self) -> &mut LoggingConfig;

    /// Get the InfluxDB configuration.
    fn influxdb(&self) -> &InfluxDbConfig;

    /// Get the InfluxDB configuration for overriding.
    fn influxdb_mut(&mut self) -> &mut InfluxDbConfig;

    /// Apply collector-specific CLI overrides.
    fn apply_args(&mut self, _args: &CollectorArgs) {}

    /// Validate the collector-specific part of the configuration.
    ///
    /// Logging and InfluxDB sections are validated by [`from_args`](Self::from_args).
    fn validate(&self) -> Result<()> {
        Ok(())
    }

    /// Load configuration from a file path, merging secrets if a directory is given.
    ///
    /// Does not validate; see [`from_args`](Self::from_args).
    fn load(path: impl AsRef<Path>, secrets_dir: Option<&Path>) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(CollectorError::ConfigNotFound {
                path: path.display().to_string(),
            });
        }

        Ok(iioflux_common::load_config(path, secrets_dir)?)
    }

    /// Load, override from CLI/environment, then validate.
    fn from_args(args: &CollectorArgs) -> Result<Self> {
        let mut config = Self::load(&args.config, args.secrets_dir.as_deref())?;

        if let Some(level) = &args.log_level {
            config.logging_mut().level = level.clone();
        }
        args.influxdb.apply(config.influxdb_mut());
        config.apply_args(args);

        config
            .logging()
            .level_filter()
            .map_err(|e| CollectorError::validation(e.to_string()))?;
        config
            .influxdb()
            .validate()
            .map_err(|e| CollectorError::validation(e.to_string()))?;
        config.validate()?;

        Ok(config)
    }
}
