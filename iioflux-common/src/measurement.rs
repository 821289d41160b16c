use std::collections::BTreeMap;

use chrono::{DateTime, FixedOffset, Local};

/// Tag key carrying the name of the sensor host a measurement came from.
pub const HOST_TAG: &str = "host";

/// One timestamped, tagged record of channel values for one device.
///
/// Built fresh on every polling tick and never mutated once handed to a sink.
#[derive(Debug, Clone, PartialEq)]
pub struct Measurement {
    /// Measurement name (the logical device name from configuration).
    pub name: String,

    /// Instant of the poll, with the local UTC offset preserved.
    pub timestamp: DateTime<FixedOffset>,

    /// Tag set; always contains [`HOST_TAG`] when built by the collector.
    pub tags: BTreeMap<String, String>,

    /// Channel id to computed value.
    pub fields: BTreeMap<String, f64>,
}

impl Measurement {
    /// Create an empty measurement at the given instant.
    pub fn new(name: impl Into<String>, timestamp: DateTime<FixedOffset>) -> Self {
        Self {
            name: name.into(),
            timestamp,
            tags: BTreeMap::new(),
            fields: BTreeMap::new(),
        }
    }

    /// Add a tag to this measurement.
    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }

    /// Add a field to this measurement. A later field with the same key wins.
    pub fn with_field(mut self, key: impl Into<String>, value: f64) -> Self {
        self.fields.insert(key.into(), value);
        self
    }

    /// The host tag, if set.
    pub fn host(&self) -> Option<&str> {
        self.tags.get(HOST_TAG).map(String::as_str)
    }
}

/// Current local time with its UTC offset.
pub fn local_now() -> DateTime<FixedOffset> {
    Local::now().fixed_offset()
}
