//! The submission loop.
//!
//! Every tick polls each host in configuration order and hands the host's
//! whole snapshot to the sink in one call. Between ticks the loop sleeps on
//! the scheduler; a stop request observed there ends the loop. A tick is never
//! interrupted halfway.

use std::time::Duration;

use thiserror::Error;
use tracing::{debug, info};

use iioflux_framework::{CollectorError, MeasurementSink, Scheduler};

use crate::host::HostPoller;
use crate::sensor::{SensorError, SensorSource};

/// Errors that end the submission loop.
#[derive(Debug, Error)]
pub enum SubmitError {
    #[error("Host '{host}': failed to read {device}/{channel}/{attribute}: {source}")]
    Read {
        host: String,
        device: String,
        channel: String,
        attribute: String,
        #[source]
        source: SensorError,
    },

    #[error("Host '{host}': {device}/{channel}/{attribute} is not a number: {value:?}")]
    InvalidValue {
        host: String,
        device: String,
        channel: String,
        attribute: String,
        value: String,
    },

    #[error(transparent)]
    Sink(#[from] CollectorError),
}

/// Loop lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Running,
    /// Terminal.
    Stopping,
}

/// Polls hosts and submits their measurements until stopped.
pub struct Submitter<S, K> {
    hosts: Vec<HostPoller<S>>,
    sink: K,
    interval: Duration,
    state: LoopState,
}

impl<S: SensorSource, K: MeasurementSink> Submitter<S, K> {
    /// Create a loop over `hosts`, ticking every `interval`.
    pub fn new(hosts: Vec<HostPoller<S>>, sink: K, interval: Duration) -> Self {
        Self {
            hosts,
            sink,
            interval,
            state: LoopState::Running,
        }
    }

    /// Current state.
    pub fn state(&self) -> LoopState {
        self.state
    }

    /// Hosts, in polling order.
    pub fn hosts(&self) -> &[HostPoller<S>] {
        &self.hosts
    }

    /// Poll every host once and submit its measurements.
    ///
    /// Returns the number of measurements submitted. The first read, parse or
    /// sink failure aborts the tick.
    pub async fn tick(&mut self) -> Result<usize, SubmitError> {
        let mut submitted = 0;

        for host in &mut self.hosts {
            let measurements = host.snapshot().await?;
            self.sink.submit(host.name(), &measurements).await?;

            debug!(host = host.name(), measurements = measurements.len(), "Submitted host");
            submitted += measurements.len();
        }

        Ok(submitted)
    }

    /// Tick, then sleep, until the scheduler observes a stop request.
    pub async fn run(&mut self, scheduler: &Scheduler) -> Result<(), SubmitError> {
        info!(
            interval_secs = self.interval.as_secs_f64(),
            hosts = self.hosts.len(),
            "Going to poll"
        );

        while self.state == LoopState::Running {
            let submitted = self.tick().await?;
            debug!(submitted, "Tick complete");

            if !scheduler.sleep(self.interval).await {
                info!("Stop requested, leaving polling loop");
                self.state = LoopState::Stopping;
            }
        }

        Ok(())
    }
}
