//! Sensor connections.
//!
//! A host is reached through a URI:
//!
//! ```text
//! local:               sysfs tree at /sys/bus/iio/devices
//! local:/some/root     sysfs-like tree at another root
//! ip:<host>[:<port>]   iiod daemon over TCP (default port 30431)
//! ```
//!
//! Both backends list their devices once when connecting. Attribute values are
//! always read live.

pub mod iiod;
#[cfg(test)]
pub(crate) mod memory;
pub mod sysfs;

use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

pub use iiod::IiodClient;
#[cfg(test)]
pub(crate) use memory::MemorySource;
pub use sysfs::SysfsContext;

/// Errors raised by sensor connections.
#[derive(Debug, Error)]
pub enum SensorError {
    #[error("Invalid sensor URI '{uri}': {reason}")]
    InvalidUri { uri: String, reason: String },

    #[error("I/O error on {context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Timed out during {0}")]
    Timeout(String),

    #[error("Remote error {errno} during {operation}")]
    Remote { operation: String, errno: i64 },

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Invalid context description: {0}")]
    Xml(String),

    #[error("Channel '{channel}' of device '{device}' has no attribute '{attribute}'")]
    UnknownAttribute {
        device: String,
        channel: String,
        attribute: String,
    },
}

/// Result type alias using [`SensorError`].
pub type Result<T> = std::result::Result<T, SensorError>;

/// Read access to the identifying attributes of a device.
pub trait Introspect {
    /// Value of attribute `key`, if the device exposes it.
    fn attribute(&self, key: &str) -> Option<&str>;
}

/// A channel of a device and the attributes it exposes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelInfo {
    /// Channel id, e.g. `voltage0` or `temp`.
    pub id: String,
    /// Whether this is an output channel.
    pub output: bool,
    /// Attribute name to backend file name.
    attributes: BTreeMap<String, String>,
}

impl ChannelInfo {
    /// Create an input channel without attributes.
    pub fn input(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            output: false,
            attributes: BTreeMap::new(),
        }
    }

    /// Create an output channel without attributes.
    pub fn output(id: impl Into<String>) -> Self {
        Self {
            output: true,
            ..Self::input(id)
        }
    }

    /// Add an attribute whose file name equals its name.
    pub fn with_attribute(self, name: impl Into<String>) -> Self {
        let name = name.into();
        self.with_attribute_file(name.clone(), name)
    }

    /// Add an attribute backed by `filename`.
    pub fn with_attribute_file(mut self, name: impl Into<String>, filename: impl Into<String>) -> Self {
        self.add_attribute(name, filename);
        self
    }

    pub(crate) fn add_attribute(&mut self, name: impl Into<String>, filename: impl Into<String>) {
        self.attributes.insert(name.into(), filename.into());
    }

    /// Whether the channel exposes attribute `name`.
    pub fn has_attribute(&self, name: &str) -> bool {
        self.attributes.contains_key(name)
    }

    /// Backend file name of attribute `name`.
    pub fn attribute_file(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    /// Names of all exposed attributes, sorted.
    pub fn attribute_names(&self) -> impl Iterator<Item = &str> {
        self.attributes.keys().map(String::as_str)
    }

    /// Direction keyword used by iiod.
    pub fn direction(&self) -> &'static str {
        if self.output { "OUTPUT" } else { "INPUT" }
    }
}

/// A physical sensor device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
    /// Device id, e.g. `iio:device0`.
    pub id: String,
    /// Driver-provided name, e.g. `bme280`.
    pub name: Option<String>,
    /// Optional user-assigned label.
    pub label: Option<String>,
    /// Channels in declaration order.
    pub channels: Vec<ChannelInfo>,
}

impl DeviceInfo {
    /// Create a device without name, label or channels.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: None,
            label: None,
            channels: Vec::new(),
        }
    }

    /// Set the driver name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Set the label.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Append a channel.
    pub fn with_channel(mut self, channel: ChannelInfo) -> Self {
        self.channels.push(channel);
        self
    }
}

impl Introspect for DeviceInfo {
    fn attribute(&self, key: &str) -> Option<&str> {
        match key {
            "id" => Some(&self.id),
            "name" => self.name.as_deref(),
            "label" => self.label.as_deref(),
            _ => None,
        }
    }
}

/// A connection to a host's sensors.
pub trait SensorSource: Send {
    /// Devices listed when the connection was made.
    fn devices(&self) -> &[DeviceInfo];

    /// Read the current value of one channel attribute, as text.
    fn read_channel_attribute(
        &mut self,
        device: &DeviceInfo,
        channel: &ChannelInfo,
        attribute: &str,
    ) -> impl Future<Output = Result<String>> + Send;
}

/// Parsed sensor URI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SensorUri {
    /// Local sysfs tree.
    Local(PathBuf),
    /// iiod daemon.
    Network { host: String, port: u16 },
}

impl FromStr for SensorUri {
    type Err = SensorError;

    fn from_str(uri: &str) -> Result<Self> {
        let invalid = |reason: &str| SensorError::InvalidUri {
            uri: uri.to_string(),
            reason: reason.to_string(),
        };

        let (scheme, rest) = uri
            .split_once(':')
            .ok_or_else(|| invalid("expected '<scheme>:<address>'"))?;

        match scheme {
            "local" => {
                let root = if rest.is_empty() {
                    PathBuf::from(sysfs::DEFAULT_ROOT)
                } else {
                    PathBuf::from(rest)
                };
                Ok(SensorUri::Local(root))
            }
            "ip" => {
                if rest.is_empty() {
                    return Err(invalid("missing host"));
                }
                let (host, port) = split_host_port(rest).map_err(|reason| invalid(&reason))?;
                Ok(SensorUri::Network { host, port })
            }
            other => Err(invalid(&format!(
                "unsupported scheme '{}' (use local: or ip:)",
                other
            ))),
        }
    }
}

/// Split `host[:port]`, accepting bracketed IPv6 addresses.
fn split_host_port(address: &str) -> std::result::Result<(String, u16), String> {
    let parse_port = |port: &str| {
        port.parse::<u16>()
            .map_err(|_| format!("invalid port '{}'", port))
    };

    if let Some(rest) = address.strip_prefix('[') {
        let (host, tail) = rest
            .split_once(']')
            .ok_or_else(|| "unterminated '['".to_string())?;
        let port = match tail.strip_prefix(':') {
            Some(port) => parse_port(port)?,
            None if tail.is_empty() => iiod::DEFAULT_PORT,
            None => return Err(format!("unexpected '{}' after address", tail)),
        };
        return Ok((host.to_string(), port));
    }

    match address.rsplit_once(':') {
        // A bare IPv6 address has several colons and no port.
        Some((host, _)) if host.contains(':') => Ok((address.to_string(), iiod::DEFAULT_PORT)),
        Some((host, port)) if !host.is_empty() => Ok((host.to_string(), parse_port(port)?)),
        Some(_) => Err("missing host".to_string()),
        None => Ok((address.to_string(), iiod::DEFAULT_PORT)),
    }
}

impl fmt::Display for SensorUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SensorUri::Local(root) => write!(f, "local:{}", root.display()),
            SensorUri::Network { host, port } if host.contains(':') => {
                write!(f, "ip:[{}]:{}", host, port)
            }
            SensorUri::Network { host, port } => write!(f, "ip:{}:{}", host, port),
        }
    }
}

/// A connected sensor backend, chosen by URI scheme.
#[derive(Debug)]
pub enum SensorContext {
    Local(SysfsContext),
    Network(IiodClient),
}

impl SensorContext {
    /// Connect to `uri` and list its devices.
    ///
    /// `timeout` bounds every network operation; it is unused for sysfs.
    pub async fn connect(uri: &SensorUri, timeout: Duration) -> Result<Self> {
        match uri {
            SensorUri::Local(root) => Ok(SensorContext::Local(SysfsContext::open(root)?)),
            SensorUri::Network { host, port } => Ok(SensorContext::Network(
                IiodClient::connect(host, *port, timeout).await?,
            )),
        }
    }
}

impl SensorSource for SensorContext {
    fn devices(&self) -> &[DeviceInfo] {
        match self {
            SensorContext::Local(ctx) => ctx.devices(),
            SensorContext::Network(ctx) => ctx.devices(),
        }
    }

    async fn read_channel_attribute(
        &mut self,
        device: &DeviceInfo,
        channel: &ChannelInfo,
        attribute: &str,
    ) -> Result<String> {
        match self {
            SensorContext::Local(ctx) => ctx.read_channel_attribute(device, channel, attribute).await,
            SensorContext::Network(ctx) => {
                ctx.read_channel_attribute(device, channel, attribute).await
            }
        }
    }
}
