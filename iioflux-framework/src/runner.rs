//! Collector runner for lifecycle management.

use std::fmt::Display;
use std::future::Future;

use tokio::task::JoinHandle;

use iioflux_common::init_tracing;

use crate::config::CollectorConfig;
use crate::error::{CollectorError, Result};
use crate::scheduler::Scheduler;
use crate::shutdown::{StopToken, spawn_signal_listener};
use crate::sink::InfluxWriter;

/// Runner that manages the lifecycle of the collector.
///
/// Handles:
/// - Logging initialization
/// - InfluxDB writer creation and health check
/// - SIGINT/SIGTERM handling through a [`StopToken`]
/// - Reporting the outcome of the polling loop
///
/// # Example
///
/// ```ignore
/// use iioflux_framework::{CollectorArgs, CollectorConfig, CollectorRunner};
///
/// #[tokio::main]
/// async fn main() -> anyhow::Result<()> {
///     let args = CollectorArgs::parse_with_default("iioflux.json5");
///     let config = MyConfig::from_args(&args)?;
///
///     let runner = CollectorRunner::new("iioflux", config).await?;
///     let sink = runner.sink();
///     let scheduler = runner.scheduler();
///
///     runner.run(poll_forever(sink, scheduler)).await?;
///     Ok(())
/// }
/// ```
pub struct CollectorRunner<C: CollectorConfig> {
    name: String,
    version: String,
    config: C,
    sink: InfluxWriter,
    token: StopToken,
    signals: Option<JoinHandle<()>>,
}

impl<C: CollectorConfig> CollectorRunner<C> {
    /// Create a new runner.
    ///
    /// This will:
    /// 1. Initialize logging from the (already overridden) configuration
    /// 2. Create the InfluxDB writer and check the server's health
    /// 3. Install the signal handler
    pub async fn new(name: impl Into<String>, config: C) -> Result<Self> {
        init_tracing(config.logging())
            .map_err(|e| CollectorError::config(format!("Failed to initialize logging: {}", e)))?;

        let mut runner = Self::with_sink(name, InfluxWriter::new(config.influxdb())?, config);

        tracing::info!(
            collector = %runner.name,
            version = %runner.version,
            "Starting collector"
        );

        runner.sink.ensure_healthy().await?;
        runner.signals = Some(spawn_signal_listener(runner.token.clone()));

        Ok(runner)
    }

    /// Create a runner around an existing writer.
    ///
    /// Neither logging nor signal handling is installed, and the writer is not
    /// contacted.
    pub fn with_sink(name: impl Into<String>, sink: InfluxWriter, config: C) -> Self {
        Self {
            name: name.into(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            config,
            sink,
            token: StopToken::new(),
            signals: None,
        }
    }

    /// Get the collector name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get the collector version.
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Get a reference to the configuration.
    pub fn config(&self) -> &C {
        &self.config
    }

    /// Get a clone of the InfluxDB writer.
    pub fn sink(&self) -> InfluxWriter {
        self.sink.clone()
    }

    /// Get a handle to the stop flag set by the signal handler.
    pub fn stop_token(&self) -> StopToken {
        self.token.clone()
    }

    /// Get a scheduler observing this runner's stop flag.
    pub fn scheduler(&self) -> Scheduler {
        Scheduler::new(self.token.clone())
    }

    /// Drive the collector's work to completion.
    ///
    /// The work is expected to return once a stop was requested. An error
    /// from the work is logged and returned as [`CollectorError::Worker`].
    pub async fn run<F, E>(self, work: F) -> Result<()>
    where
        F: Future<Output = std::result::Result<(), E>>,
        E: Display,
    {
        tracing::info!(collector = %self.name, "Collector running");

        let outcome = work.await;

        if let Some(signals) = &self.signals {
            signals.abort();
        }

        match outcome {
            Ok(()) => {
                tracing::info!(collector = %self.name, "Quitting");
                Ok(())
            }
            Err(e) => {
                tracing::error!(collector = %self.name, error = %e, "Collector failed");
                Err(CollectorError::worker(e.to_string()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use iioflux_common::{InfluxDbConfig, LoggingConfig};
    use serde::Deserialize;

    #[derive(Debug, Default, Deserialize)]
    struct TestConfig {
        influxdb: InfluxDbConfig,
        logging: LoggingConfig,
    }

    impl CollectorConfig for TestConfig {
        fn logging(&self) -> &LoggingConfig {
            &self.logging
        }

        fn logging_mut(&mut self) -> &mut LoggingConfig {
            &mut self.logging
        }

        fn influxdb(&self) -> &InfluxDbConfig {
            &self.influxdb
        }

        fn influxdb_mut(&mut self) -> &mut InfluxDbConfig {
            &mut self.influxdb
        }
    }

    fn runner() -> CollectorRunner<TestConfig> {
        let config = TestConfig::default();
        let sink = InfluxWriter::new(config.influxdb()).unwrap();
        CollectorRunner::with_sink("test", sink, config)
    }

    #[tokio::test]
    async fn test_run_success() {
        let runner = runner();
        assert_eq!(runner.name(), "test");

        let result = runner.run(async { Ok::<(), String>(()) }).await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_run_failure_is_worker_error() {
        let runner = runner();

        let result = runner
            .run(async { Err::<(), _>("sensor went away") })
            .await;
        match result {
            Err(CollectorError::Worker(msg)) => assert_eq!(msg, "sensor went away"),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_scheduler_shares_stop_token() {
        let runner = runner();
        let scheduler = runner.scheduler();

        assert!(!scheduler.stop_requested());
        runner.stop_token().request_stop();
        assert!(scheduler.stop_requested());
    }
}
