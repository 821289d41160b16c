//! Local IIO devices through sysfs.
//!
//! Each device is a directory `iio:deviceN` holding a `name` file, an
//! optional `label` file and one file per channel attribute, named
//! `{in|out}_{channel}_{attribute}`. A channel exists when it has a `raw` or
//! `input` file. Attributes may also be shared by every channel of a type,
//! e.g. `in_voltage_scale` for `voltage0`, `voltage1`, ...

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use tracing::debug;

use super::{ChannelInfo, DeviceInfo, Result, SensorError, SensorSource};

/// Where the kernel exposes IIO devices.
pub const DEFAULT_ROOT: &str = "/sys/bus/iio/devices";

const DEVICE_PREFIX: &str = "iio:device";

/// Devices found under a sysfs root.
#[derive(Debug, Clone)]
pub struct SysfsContext {
    root: PathBuf,
    devices: Vec<DeviceInfo>,
}

impl SysfsContext {
    /// Scan `root` for IIO devices.
    pub fn open(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        let entries = std::fs::read_dir(&root).map_err(|source| SensorError::Io {
            context: root.display().to_string(),
            source,
        })?;

        let mut found: Vec<(u32, String)> = Vec::new();
        for entry in entries.flatten() {
            let dir_name = entry.file_name().to_string_lossy().to_string();
            let Some(index) = dir_name
                .strip_prefix(DEVICE_PREFIX)
                .and_then(|n| n.parse::<u32>().ok())
            else {
                continue;
            };
            if entry.path().is_dir() {
                found.push((index, dir_name));
            }
        }
        found.sort();

        let mut devices = Vec::with_capacity(found.len());
        for (_, id) in found {
            devices.push(scan_device(&root.join(&id), id)?);
        }

        debug!(root = %root.display(), devices = devices.len(), "Scanned sysfs");
        Ok(Self { root, devices })
    }

    /// Devices found when scanning.
    pub fn devices(&self) -> &[DeviceInfo] {
        &self.devices
    }

    /// Read one channel attribute file.
    pub async fn read_channel_attribute(
        &self,
        device: &DeviceInfo,
        channel: &ChannelInfo,
        attribute: &str,
    ) -> Result<String> {
        let file = channel
            .attribute_file(attribute)
            .ok_or_else(|| SensorError::UnknownAttribute {
                device: device.id.clone(),
                channel: channel.id.clone(),
                attribute: attribute.to_string(),
            })?;

        let path = self.root.join(&device.id).join(file);
        tokio::fs::read_to_string(&path)
            .await
            .map_err(|source| SensorError::Io {
                context: path.display().to_string(),
                source,
            })
    }
}

impl SensorSource for SysfsContext {
    fn devices(&self) -> &[DeviceInfo] {
        SysfsContext::devices(self)
    }

    async fn read_channel_attribute(
        &mut self,
        device: &DeviceInfo,
        channel: &ChannelInfo,
        attribute: &str,
    ) -> Result<String> {
        SysfsContext::read_channel_attribute(self, device, channel, attribute).await
    }
}

/// Read a small text file, trimmed. Missing or unreadable files yield `None`.
fn read_trimmed(path: &Path) -> Option<String> {
    std::fs::read_to_string(path)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Leading alphabetic part of a channel id: `voltage0` -> `voltage`.
fn channel_type(id: &str) -> &str {
    let end = id
        .find(|c: char| !c.is_ascii_alphabetic())
        .unwrap_or(id.len());
    &id[..end]
}

fn scan_device(dir: &Path, id: String) -> Result<DeviceInfo> {
    let entries = std::fs::read_dir(dir).map_err(|source| SensorError::Io {
        context: dir.display().to_string(),
        source,
    })?;

    // (output, rest-after-direction-prefix, file name)
    let mut files: Vec<(bool, String, String)> = Vec::new();
    for entry in entries.flatten() {
        if !entry.path().is_file() {
            continue;
        }
        let file_name = entry.file_name().to_string_lossy().to_string();
        let (output, rest) = if let Some(rest) = file_name.strip_prefix("in_") {
            (false, rest.to_string())
        } else if let Some(rest) = file_name.strip_prefix("out_") {
            (true, rest.to_string())
        } else {
            continue;
        };
        files.push((output, rest, file_name));
    }

    // Channels are declared by their value files.
    let mut channels: BTreeMap<(bool, String), ChannelInfo> = BTreeMap::new();
    for (output, rest, _) in &files {
        let id = rest
            .strip_suffix("_raw")
            .or_else(|| rest.strip_suffix("_input"));
        if let Some(id) = id.filter(|id| !id.is_empty()) {
            let channel = if *output {
                ChannelInfo::output(id)
            } else {
                ChannelInfo::input(id)
            };
            channels.entry((*output, id.to_string())).or_insert(channel);
        }
    }

    let mut shared: Vec<(bool, String, String, String)> = Vec::new();
    for (output, rest, file_name) in &files {
        // Longest channel id that prefixes the file owns it.
        let owner = channels
            .keys()
            .filter(|(o, id)| o == output && rest.starts_with(&format!("{}_", id)))
            .max_by_key(|(_, id)| id.len())
            .cloned();

        match owner {
            Some(key) => {
                let attribute = &rest[key.1.len() + 1..];
                if let Some(channel) = channels.get_mut(&key) {
                    channel.add_attribute(attribute, file_name.as_str());
                }
            }
            None => {
                if let Some((kind, attribute)) = rest.split_once('_') {
                    shared.push((*output, kind.to_string(), attribute.to_string(), file_name.clone()));
                }
            }
        }
    }

    for (output, kind, attribute, file_name) in shared {
        for ((o, id), channel) in channels.iter_mut() {
            if *o == output && channel_type(id) == kind && !channel.has_attribute(&attribute) {
                channel.add_attribute(attribute.as_str(), file_name.as_str());
            }
        }
    }

    Ok(DeviceInfo {
        name: read_trimmed(&dir.join("name")),
        label: read_trimmed(&dir.join("label")),
        channels: channels.into_values().collect(),
        id,
    })
}
