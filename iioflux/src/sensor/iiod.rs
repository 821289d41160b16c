//! Remote IIO devices through the iiod text protocol.
//!
//! Commands are single lines terminated by `\r\n`. Every answer starts with a
//! decimal length line; a negative value is an errno. The payload of that
//! length follows, then a newline.
//!
//! ```text
//! > PRINT
//! < 1234
//! < <?xml ...><context>...</context>
//! > READ iio:device0 INPUT temp raw
//! < 4
//! < 200\0
//! ```

use std::collections::BTreeMap;
use std::time::Duration;

use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tracing::{debug, info};

use super::{ChannelInfo, DeviceInfo, Result, SensorError, SensorSource};

/// Port iiod listens on.
pub const DEFAULT_PORT: u16 = 30431;

/// Upper bound on a single answer, protecting against garbage length lines.
const MAX_PAYLOAD: usize = 16 * 1024 * 1024;

/// Connection to an iiod daemon.
#[derive(Debug)]
pub struct IiodClient {
    address: String,
    stream: BufReader<TcpStream>,
    timeout: Duration,
    devices: Vec<DeviceInfo>,
}

impl IiodClient {
    /// Connect to `host:port` and fetch the context description.
    pub async fn connect(host: &str, port: u16, timeout: Duration) -> Result<Self> {
        let address = format!("{}:{}", host, port);

        let stream = tokio::time::timeout(timeout, TcpStream::connect((host, port)))
            .await
            .map_err(|_| SensorError::Timeout(format!("connect to {}", address)))?
            .map_err(|source| SensorError::Io {
                context: address.clone(),
                source,
            })?;
        stream.set_nodelay(true).map_err(|source| SensorError::Io {
            context: address.clone(),
            source,
        })?;

        let mut client = Self {
            address,
            stream: BufReader::new(stream),
            timeout,
            devices: Vec::new(),
        };

        let xml = client.command("PRINT").await?;
        let xml = String::from_utf8_lossy(&xml);
        client.devices = parse_context(&xml)?;

        info!(
            address = %client.address,
            devices = client.devices.len(),
            "Connected to iiod"
        );
        Ok(client)
    }

    /// Devices listed when connecting.
    pub fn devices(&self) -> &[DeviceInfo] {
        &self.devices
    }

    /// Read one channel attribute.
    pub async fn read_channel_attribute(
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

        let command = format!(
            "READ {} {} {} {}",
            device.id,
            channel.direction(),
            channel.id,
            attribute
        );
        let value = self.command(&command).await?;

        Ok(String::from_utf8_lossy(&value).into_owned())
    }

    /// Send one command and return its payload, bounded by the timeout.
    async fn command(&mut self, command: &str) -> Result<Vec<u8>> {
        let timeout = self.timeout;
        tokio::time::timeout(timeout, self.exchange(command))
            .await
            .map_err(|_| SensorError::Timeout(command.to_string()))?
    }

    async fn exchange(&mut self, command: &str) -> Result<Vec<u8>> {
        debug!(address = %self.address, command, "iiod command");

        let io_error = |source| SensorError::Io {
            context: format!("{} ({})", self.address, command),
            source,
        };

        let stream = self.stream.get_mut();
        stream
            .write_all(format!("{}\r\n", command).as_bytes())
            .await
            .map_err(io_error)?;
        stream.flush().await.map_err(io_error)?;

        let mut line = String::new();
        let read = self.stream.read_line(&mut line).await.map_err(io_error)?;
        if read == 0 {
            return Err(SensorError::Protocol(format!(
                "connection closed by {} during {}",
                self.address, command
            )));
        }

        let length: i64 = line.trim().parse().map_err(|_| {
            SensorError::Protocol(format!("unexpected answer to {}: {:?}", command, line.trim()))
        })?;
        if length < 0 {
            return Err(SensorError::Remote {
                operation: command.to_string(),
                errno: -length,
            });
        }

        let length = usize::try_from(length)
            .ok()
            .filter(|&l| l <= MAX_PAYLOAD)
            .ok_or_else(|| SensorError::Protocol(format!("answer to {} too large: {}", command, length)))?;

        let mut payload = vec![0u8; length];
        self.stream.read_exact(&mut payload).await.map_err(io_error)?;

        let mut terminator = [0u8; 1];
        self.stream.read_exact(&mut terminator).await.map_err(io_error)?;
        if terminator[0] != b'\n' {
            return Err(SensorError::Protocol(format!(
                "missing terminator after answer to {}",
                command
            )));
        }

        Ok(payload)
    }
}

impl SensorSource for IiodClient {
    fn devices(&self) -> &[DeviceInfo] {
        IiodClient::devices(self)
    }

    async fn read_channel_attribute(
        &mut self,
        device: &DeviceInfo,
        channel: &ChannelInfo,
        attribute: &str,
    ) -> Result<String> {
        IiodClient::read_channel_attribute(self, device, channel, attribute).await
    }
}

fn xml_error(e: impl std::fmt::Display) -> SensorError {
    SensorError::Xml(e.to_string())
}

fn attributes_of(element: &BytesStart<'_>) -> Result<BTreeMap<String, String>> {
    let mut attributes = BTreeMap::new();
    for attr in element.attributes() {
        let attr = attr.map_err(xml_error)?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = attr.unescape_value().map_err(xml_error)?.into_owned();
        attributes.insert(key, value);
    }
    Ok(attributes)
}

/// Parse the context description returned by `PRINT`.
///
/// Only devices, their channels and the channels' attributes are kept.
pub fn parse_context(xml: &str) -> Result<Vec<DeviceInfo>> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut devices = Vec::new();
    let mut device: Option<DeviceInfo> = None;
    let mut channel: Option<ChannelInfo> = None;

    loop {
        let (element, empty) = match reader.read_event().map_err(xml_error)? {
            Event::Start(e) => (e, false),
            Event::Empty(e) => (e, true),
            Event::End(e) => {
                match e.name().as_ref() {
                    b"channel" => {
                        if let (Some(c), Some(d)) = (channel.take(), device.as_mut()) {
                            d.channels.push(c);
                        }
                    }
                    b"device" => {
                        if let Some(d) = device.take() {
                            devices.push(d);
                        }
                    }
                    _ => {}
                }
                continue;
            }
            Event::Eof => break,
            _ => continue,
        };

        match element.name().as_ref() {
            b"device" => {
                let mut attrs = attributes_of(&element)?;
                let id = attrs
                    .remove("id")
                    .ok_or_else(|| xml_error("device without id"))?;
                let parsed = DeviceInfo {
                    id,
                    name: attrs.remove("name"),
                    label: attrs.remove("label"),
                    channels: Vec::new(),
                };
                if empty {
                    devices.push(parsed);
                } else {
                    device = Some(parsed);
                }
            }
            b"channel" => {
                let Some(current) = device.as_mut() else {
                    return Err(xml_error("channel outside of a device"));
                };
                let mut attrs = attributes_of(&element)?;
                let id = attrs
                    .remove("id")
                    .ok_or_else(|| xml_error(format!("channel without id in {}", current.id)))?;
                let parsed = if attrs.get("type").map(String::as_str) == Some("output") {
                    ChannelInfo::output(id)
                } else {
                    ChannelInfo::input(id)
                };
                if empty {
                    current.channels.push(parsed);
                } else {
                    channel = Some(parsed);
                }
            }
            b"attribute" => {
                // Device-level attributes are not channel values.
                if let Some(current) = channel.as_mut() {
                    let mut attrs = attributes_of(&element)?;
                    if let Some(name) = attrs.remove("name") {
                        let filename = attrs.remove("filename").unwrap_or_else(|| name.clone());
                        current.add_attribute(name, filename);
                    }
                }
            }
            _ => {}
        }
    }

    Ok(devices)
}
