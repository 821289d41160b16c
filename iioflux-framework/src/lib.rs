//! iioflux Collector Framework
//!
//! Plumbing shared by collectors that poll a source and write to InfluxDB.
//!
//! # Overview
//!
//! This framework provides:
//! - [`CollectorArgs`] for common CLI argument parsing
//! - [`CollectorConfig`] trait for configuration loading, overrides and validation
//! - [`CollectorRunner`] for managing the collector lifecycle (startup, signals, exit)
//! - [`Scheduler`] and [`StopToken`] for interruptible polling
//! - [`MeasurementSink`] and its InfluxDB implementation [`InfluxWriter`]
//!
//! # Example
//!
//! ```ignore
//! use iioflux_framework::{CollectorArgs, CollectorConfig, CollectorRunner};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let args = CollectorArgs::parse_with_default("collector.json5");
//!     let config = MyConfig::from_args(&args)?;
//!
//!     let runner = CollectorRunner::new("collector", config).await?;
//!     let work = my_loop(runner.sink(), runner.scheduler());
//!
//!     runner.run(work).await?;
//!     Ok(())
//! }
//! ```

mod args;
mod config;
mod error;
mod runner;
mod scheduler;
mod shutdown;
mod sink;

pub use args::{CollectorArgs, InfluxDbArgs};
pub use config::CollectorConfig;
pub use error::{CollectorError, Result};
pub use runner::CollectorRunner;
pub use scheduler::{DEFAULT_GRANULARITY, Scheduler};
pub use shutdown::{StopToken, spawn_signal_listener};
pub use sink::{HealthStatus, InfluxWriter, MeasurementSink};

// Re-export commonly used types from iioflux-common
pub use iioflux_common::{
    HOST_TAG, InfluxDbConfig, LogFormat, LoggingConfig, Measurement, local_now,
};
