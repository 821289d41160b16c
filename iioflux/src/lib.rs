//! Submit Linux IIO sensor measurements into InfluxDB.
//!
//! The collector connects to one or more sensor hosts, binds logical device
//! names to physical devices once, and then periodically reads every bound
//! device's channels, resolves each channel to a number and writes one
//! measurement per device to InfluxDB.
//!
//! # Measurements
//!
//! ```text
//! <binding name>,host=<host name> <channel id>=<value>,... <timestamp>
//! ```
//!
//! Channel values are derived from the channel's `raw`, `input`, `offset` and
//! `scale` attributes, see [`resolver`].

pub mod config;
pub mod host;
pub mod matcher;
pub mod resolver;
pub mod sensor;
pub mod snapshot;
pub mod submitter;

pub use config::{DeviceBinding, HostConfig, IiofluxConfig};
pub use host::{BoundDevice, HostPoller};
pub use submitter::{LoopState, SubmitError, Submitter};
