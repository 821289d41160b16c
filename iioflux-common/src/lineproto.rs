//! InfluxDB line protocol encoding.
//!
//! ```text
//! temp,host=h1 value=1.8 1700000000000000000
//! ```
//!
//! Timestamps are written in nanoseconds; writers must send `precision=ns`.

use std::fmt::Write as _;

use tracing::warn;

use crate::measurement::Measurement;

/// Precision query value matching the timestamps produced here.
pub const PRECISION: &str = "ns";

/// Encode one measurement as a single line (without trailing newline).
///
/// Returns `None` when the measurement has no writable field: InfluxDB
/// rejects points without fields, and non-finite floats cannot be written.
pub fn encode_line(measurement: &Measurement) -> Option<String> {
    let mut fields = String::new();
    for (key, value) in &measurement.fields {
        if !value.is_finite() {
            warn!(
                measurement = %measurement.name,
                field = %key,
                value = %value,
                "Dropping non-finite field"
            );
            continue;
        }
        if !fields.is_empty() {
            fields.push(',');
        }
        let _ = write!(fields, "{}={}", escape_key(key), value);
    }

    if fields.is_empty() {
        warn!(measurement = %measurement.name, "Measurement yielded zero fields, skipping");
        return None;
    }

    let mut line = escape_measurement(&measurement.name);
    for (key, value) in &measurement.tags {
        // Empty tag values are not representable.
        if value.is_empty() {
            continue;
        }
        let _ = write!(line, ",{}={}", escape_key(key), escape_key(value));
    }
    line.push(' ');
    line.push_str(&fields);

    match measurement.timestamp.timestamp_nanos_opt() {
        Some(ns) => {
            let _ = write!(line, " {}", ns);
        }
        None => {
            // Out of the i64 nanosecond range: let the server assign the time.
            warn!(measurement = %measurement.name, "Timestamp out of range, omitting");
        }
    }

    Some(line)
}

/// Encode a batch, one line per writable measurement.
///
/// Returns the request body and the number of lines it contains.
pub fn encode_batch(measurements: &[Measurement]) -> (String, usize) {
    let mut body = String::new();
    let mut lines = 0;

    for line in measurements.iter().filter_map(encode_line) {
        body.push_str(&line);
        body.push('\n');
        lines += 1;
    }

    (body, lines)
}

/// Escape a measurement name (commas and spaces).
fn escape_measurement(s: &str) -> String {
    escape(s, &[',', ' '])
}

/// Escape a tag key, tag value or field key (commas, equals signs, spaces).
fn escape_key(s: &str) -> String {
    escape(s, &[',', '=', ' '])
}

/// Line protocol has no escape for line breaks, so they are dropped.
fn escape(s: &str, special: &[char]) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '\n' | '\r' => {}
            c if special.contains(&c) => {
                out.push('\\');
                out.push(c);
            }
            c => out.push(c),
        }
    }
    out
}
