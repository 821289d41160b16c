//! Per-host polling state.

use tracing::{info, warn};

use iioflux_common::Measurement;

use crate::config::{DeviceBinding, HostConfig};
use crate::matcher::find_device;
use crate::sensor::{DeviceInfo, SensorSource};
use crate::snapshot::build_snapshot;
use crate::submitter::SubmitError;

/// A binding resolved to a physical device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoundDevice {
    /// Logical name, used as measurement name.
    pub name: String,
    /// The matched device.
    pub device: DeviceInfo,
}

/// A host connection with its bindings resolved.
///
/// Bindings are resolved once, when the poller is created. A binding that
/// matches no device is dropped with a warning and never retried.
#[derive(Debug)]
pub struct HostPoller<S> {
    name: String,
    source: S,
    devices: Vec<BoundDevice>,
}

impl<S: SensorSource> HostPoller<S> {
    /// Resolve `bindings` against the devices `source` lists.
    pub fn new(name: impl Into<String>, bindings: &[DeviceBinding], source: S) -> Self {
        let name = name.into();
        let mut devices = Vec::with_capacity(bindings.len());

        for binding in bindings {
            match find_device(&binding.predicate, source.devices()) {
                Some(device) => devices.push(BoundDevice {
                    name: binding.name.clone(),
                    device: device.clone(),
                }),
                None => warn!(
                    host = %name,
                    device = %binding.name,
                    predicate = ?binding.predicate,
                    "Could not find device"
                ),
            }
        }

        info!(
            host = %name,
            devices = ?devices.iter().map(|d| d.name.as_str()).collect::<Vec<_>>(),
            "Loaded devices"
        );

        Self {
            name,
            source,
            devices,
        }
    }

    /// Create a poller for a configured host.
    pub fn from_config(host: &HostConfig, source: S) -> Self {
        Self::new(host.name.clone(), &host.devices, source)
    }

    /// Host name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Resolved bindings, in configuration order.
    pub fn devices(&self) -> &[BoundDevice] {
        &self.devices
    }

    /// Build this tick's measurements.
    pub async fn snapshot(&mut self) -> Result<Vec<Measurement>, SubmitError> {
        build_snapshot(&self.name, &self.devices, &mut self.source).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sensor::MemorySource;

    fn binding(name: &str, pairs: &[(&str, &str)]) -> DeviceBinding {
        DeviceBinding {
            name: name.to_string(),
            predicate: pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }

    fn source() -> MemorySource {
        MemorySource::new()
            .with_device(DeviceInfo::new("iio:device0").with_name("bme280"))
            .with_device(DeviceInfo::new("iio:device1").with_name("ads1015"))
            .with_value("iio:device0", "temp", "input", "21.5")
            .with_value("iio:device1", "voltage0", "raw", "1000")
    }

    #[test]
    fn test_bindings_resolved_in_order() {
        let poller = HostPoller::new(
            "attic",
            &[
                binding("adc", &[("name", "ads1015")]),
                binding("climate", &[("id", "iio:device0")]),
            ],
            source(),
        );

        assert_eq!(poller.name(), "attic");
        let bound: Vec<_> = poller
            .devices()
            .iter()
            .map(|d| (d.name.as_str(), d.device.id.as_str()))
            .collect();
        assert_eq!(bound, [("adc", "iio:device1"), ("climate", "iio:device0")]);
    }

    #[tokio::test]
    async fn test_missing_binding_dropped() {
        let mut poller = HostPoller::new(
            "attic",
            &[
                binding("climate", &[("name", "bme280")]),
                binding("light", &[("name", "tsl2591")]),
            ],
            source(),
        );
        assert_eq!(poller.devices().len(), 1);

        let snapshot = poller.snapshot().await.unwrap();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].name, "climate");
        assert_eq!(snapshot[0].fields["temp"], 21.5);
    }

    #[test]
    fn test_same_device_bound_twice() {
        let poller = HostPoller::new(
            "attic",
            &[binding("a", &[]), binding("b", &[("name", "bme280")])],
            source(),
        );
        assert_eq!(poller.devices()[0].device, poller.devices()[1].device);
    }
}
