//! Configuration for the iioflux collector.

use std::collections::{BTreeMap, HashSet};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use iioflux_common::config::number_or_string;
use iioflux_framework::{
    CollectorArgs, CollectorConfig, CollectorError, InfluxDbConfig, LoggingConfig,
};

use crate::sensor::{SensorError, SensorUri};

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("At least one host must be configured")]
    NoHosts,
    #[error("Host name cannot be empty")]
    EmptyHostName,
    #[error("Host '{0}' is configured more than once")]
    DuplicateHost(String),
    #[error("Host '{host}': device name cannot be empty")]
    EmptyDeviceName { host: String },
    #[error("Host '{host}': {source}")]
    InvalidUri {
        host: String,
        #[source]
        source: SensorError,
    },
    #[error("interval_secs must be greater than zero")]
    ZeroInterval,
}

/// Complete collector configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IiofluxConfig {
    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// InfluxDB connection settings
    #[serde(default)]
    pub influxdb: InfluxDbConfig,

    /// Seconds between two polls of all hosts
    #[serde(default = "default_interval_secs", deserialize_with = "number_or_string")]
    pub interval_secs: u64,

    /// Sensor hosts, polled in this order
    pub hosts: Vec<HostConfig>,
}

fn default_interval_secs() -> u64 {
    60
}

/// A host exposing IIO devices.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostConfig {
    /// Host name, used as the `host` tag
    pub name: String,

    /// Connection URI: `local:` or `ip:<host>[:<port>]`
    #[serde(alias = "remote")]
    pub uri: String,

    /// Network I/O timeout in milliseconds
    #[serde(default = "default_timeout_ms", deserialize_with = "number_or_string")]
    pub timeout_ms: u64,

    /// Devices to report, in this order
    #[serde(default)]
    pub devices: Vec<DeviceBinding>,
}

fn default_timeout_ms() -> u64 {
    5000
}

/// A logical device name bound to a physical device by attribute values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceBinding {
    /// Measurement name
    pub name: String,

    /// Attribute values the device must expose, e.g. `{ name: "bme280" }`
    #[serde(rename = "match", default)]
    pub predicate: BTreeMap<String, String>,
}

impl IiofluxConfig {
    /// Polling interval.
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    /// Validate hosts, bindings and interval.
    pub fn check(&self) -> Result<(), ConfigError> {
        if self.hosts.is_empty() {
            return Err(ConfigError::NoHosts);
        }
        if self.interval_secs == 0 {
            return Err(ConfigError::ZeroInterval);
        }

        let mut seen = HashSet::new();
        for host in &self.hosts {
            if host.name.is_empty() {
                return Err(ConfigError::EmptyHostName);
            }
            if !seen.insert(host.name.as_str()) {
                return Err(ConfigError::DuplicateHost(host.name.clone()));
            }
            host.sensor_uri()?;

            if host.devices.iter().any(|d| d.name.is_empty()) {
                return Err(ConfigError::EmptyDeviceName {
                    host: host.name.clone(),
                });
            }
        }

        Ok(())
    }
}

impl HostConfig {
    /// Parsed connection URI.
    pub fn sensor_uri(&self) -> Result<SensorUri, ConfigError> {
        self.uri
            .parse::<SensorUri>()
            .map_err(|source| ConfigError::InvalidUri {
                host: self.name.clone(),
                source,
            })
    }

    /// Network I/O timeout.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl CollectorConfig for IiofluxConfig {
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

    fn apply_args(&mut self, args: &CollectorArgs) {
        if let Some(interval) = args.interval_secs {
            self.interval_secs = interval;
        }
    }

    fn validate(&self) -> iioflux_framework::Result<()> {
        self.check()
            .map_err(|e| CollectorError::validation(e.to_string()))
    }
}
