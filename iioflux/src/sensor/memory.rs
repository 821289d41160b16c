//! In-memory sensor source.
//!
//! Holds a fixed device list and a table of attribute values that can be
//! changed (or removed) through any clone while a poller owns the source.

use std::collections::HashMap;
use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use super::{ChannelInfo, DeviceInfo, Result, SensorError, SensorSource};

type Key = (String, String, bool, String);

#[derive(Debug, Default)]
struct Shared {
    values: Mutex<HashMap<Key, String>>,
    reads: AtomicUsize,
}

/// Sensor source backed by a value table.
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    devices: Vec<DeviceInfo>,
    shared: Arc<Shared>,
}

impl MemorySource {
    /// Create an empty source.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a device. Channels already on it keep their attributes, without
    /// values.
    pub fn with_device(mut self, device: DeviceInfo) -> Self {
        self.devices.push(device);
        self
    }

    /// Add an input channel attribute with its value, creating the device and
    /// channel when needed.
    pub fn with_value(self, device: &str, channel: &str, attribute: &str, value: &str) -> Self {
        self.with_channel_value(device, ChannelInfo::input(channel), attribute, value)
    }

    /// Like [`with_value`](Self::with_value), for any channel direction.
    pub fn with_channel_value(
        mut self,
        device: &str,
        channel: ChannelInfo,
        attribute: &str,
        value: &str,
    ) -> Self {
        let index = match self.devices.iter().position(|d| d.id == device) {
            Some(index) => index,
            None => {
                self.devices.push(DeviceInfo::new(device));
                self.devices.len() - 1
            }
        };
        let target = &mut self.devices[index];

        let output = channel.output;
        let id = channel.id.clone();
        let existing = target
            .channels
            .iter_mut()
            .find(|c| c.id == id && c.output == output);
        match existing {
            Some(c) => c.add_attribute(attribute, attribute),
            None => target
                .channels
                .push(channel.with_attribute(attribute)),
        }

        self.set_value(device, &id, output, attribute, value);
        self
    }

    /// Change the value of an input channel attribute.
    pub fn set(&self, device: &str, channel: &str, attribute: &str, value: &str) {
        self.set_value(device, channel, false, attribute, value);
    }

    /// Forget the value of an input channel attribute; reading it then fails.
    pub fn remove(&self, device: &str, channel: &str, attribute: &str) {
        if let Ok(mut values) = self.shared.values.lock() {
            values.remove(&key(device, channel, false, attribute));
        }
    }

    /// Number of attribute reads served so far, across clones.
    pub fn reads(&self) -> usize {
        self.shared.reads.load(Ordering::Relaxed)
    }

    fn set_value(&self, device: &str, channel: &str, output: bool, attribute: &str, value: &str) {
        if let Ok(mut values) = self.shared.values.lock() {
            values.insert(key(device, channel, output, attribute), value.to_string());
        }
    }
}

fn key(device: &str, channel: &str, output: bool, attribute: &str) -> Key {
    (
        device.to_string(),
        channel.to_string(),
        output,
        attribute.to_string(),
    )
}

impl SensorSource for MemorySource {
    fn devices(&self) -> &[DeviceInfo] {
        &self.devices
    }

    async fn read_channel_attribute(
        &mut self,
        device: &DeviceInfo,
        channel: &ChannelInfo,
        attribute: &str,
    ) -> Result<String> {
        if !channel.has_attribute(attribute) {
            return Err(SensorError::UnknownAttribute {
                device: device.id.clone(),
                channel: channel.id.clone(),
                attribute: attribute.to_string(),
            });
        }

        self.shared.reads.fetch_add(1, Ordering::Relaxed);

        let value = self
            .shared
            .values
            .lock()
            .ok()
            .and_then(|values| {
                values
                    .get(&key(&device.id, &channel.id, channel.output, attribute))
                    .cloned()
            });

        value.ok_or_else(|| SensorError::Io {
            context: format!("{}/{}/{}", device.id, channel.id, attribute),
            source: io::Error::new(io::ErrorKind::NotFound, "no such attribute value"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_values_shared_between_clones() {
        let mut source = MemorySource::new()
            .with_device(DeviceInfo::new("iio:device0").with_name("bme280"))
            .with_value("iio:device0", "temp", "input", "21500");
        let handle = source.clone();

        let device = source.devices()[0].clone();
        assert_eq!(device.name.as_deref(), Some("bme280"));
        let channel = device.channels[0].clone();

        let value = source
            .read_channel_attribute(&device, &channel, "input")
            .await
            .unwrap();
        assert_eq!(value, "21500");

        handle.set("iio:device0", "temp", "input", "22000");
        let value = source
            .read_channel_attribute(&device, &channel, "input")
            .await
            .unwrap();
        assert_eq!(value, "22000");
        assert_eq!(handle.reads(), 2);

        handle.remove("iio:device0", "temp", "input");
        let err = source
            .read_channel_attribute(&device, &channel, "input")
            .await
            .unwrap_err();
        assert!(matches!(err, SensorError::Io { .. }));
    }

    #[test]
    fn test_builder_groups_attributes() {
        let source = MemorySource::new()
            .with_value("iio:device0", "voltage0", "raw", "10")
            .with_value("iio:device0", "voltage0", "scale", "0.5")
            .with_channel_value("iio:device0", ChannelInfo::output("voltage0"), "raw", "1")
            .with_value("iio:device1", "temp", "input", "20");

        let devices = source.devices();
        assert_eq!(devices.len(), 2);
        assert_eq!(devices[0].channels.len(), 2);
        assert_eq!(
            devices[0].channels[0].attribute_names().collect::<Vec<_>>(),
            ["raw", "scale"]
        );
        assert!(devices[0].channels[1].output);
    }
}
