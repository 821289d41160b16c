//! Building one tick's measurements for a host.

use std::collections::BTreeMap;

use tracing::debug;

use iioflux_common::{HOST_TAG, Measurement, local_now};

use crate::host::BoundDevice;
use crate::resolver::{OPERATIONS, resolve};
use crate::sensor::{ChannelInfo, DeviceInfo, SensorSource};
use crate::submitter::SubmitError;

/// Parse an attribute value as read from a device.
///
/// Values may carry a trailing NUL and surrounding whitespace.
pub fn parse_value(text: &str) -> Option<f64> {
    text.trim_matches(|c: char| c == '\0' || c.is_whitespace())
        .parse()
        .ok()
}

/// Read and parse the recognized attributes a channel exposes.
async fn read_channel<S: SensorSource>(
    host: &str,
    device: &DeviceInfo,
    channel: &ChannelInfo,
    source: &mut S,
) -> Result<BTreeMap<String, f64>, SubmitError> {
    let mut values = BTreeMap::new();

    for (attribute, _) in OPERATIONS {
        if !channel.has_attribute(attribute) {
            continue;
        }

        let text = source
            .read_channel_attribute(device, channel, attribute)
            .await
            .map_err(|e| SubmitError::Read {
                host: host.to_string(),
                device: device.id.clone(),
                channel: channel.id.clone(),
                attribute: attribute.to_string(),
                source: e,
            })?;

        let value = parse_value(&text).ok_or_else(|| SubmitError::InvalidValue {
            host: host.to_string(),
            device: device.id.clone(),
            channel: channel.id.clone(),
            attribute: attribute.to_string(),
            value: text.clone(),
        })?;

        values.insert(attribute.to_string(), value);
    }

    Ok(values)
}

/// Build one measurement per bound device, all sharing one timestamp.
///
/// Measurements are named after the binding, tagged with the host name and
/// carry one field per channel. Every call reads live values.
pub async fn build_snapshot<S: SensorSource>(
    host: &str,
    devices: &[BoundDevice],
    source: &mut S,
) -> Result<Vec<Measurement>, SubmitError> {
    let timestamp = local_now();
    let mut measurements = Vec::with_capacity(devices.len());

    for bound in devices {
        let mut measurement = Measurement::new(&bound.name, timestamp).with_tag(HOST_TAG, host);

        for channel in &bound.device.channels {
            let attributes = read_channel(host, &bound.device, channel, source).await?;
            let value = resolve(&attributes);

            debug!(host, device = %bound.name, channel = %channel.id, value, "Resolved channel");
            measurement = measurement.with_field(&channel.id, value);
        }

        measurements.push(measurement);
    }

    Ok(measurements)
}
