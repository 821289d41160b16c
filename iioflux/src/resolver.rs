//! Channel value resolution.
//!
//! A channel's value is derived from whichever of its `raw`, `input`,
//! `offset` and `scale` attributes are present, applied in that order to an
//! accumulator starting at zero.

use std::collections::BTreeMap;

/// How an attribute combines with the accumulator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    /// `c = v`
    Replace,
    /// `c = c + v`
    Add,
    /// `c = c * v`
    Multiply,
}

impl Operation {
    /// Apply to accumulator `c` with attribute value `v`.
    pub fn apply(self, c: f64, v: f64) -> f64 {
        match self {
            Operation::Replace => v,
            Operation::Add => c + v,
            Operation::Multiply => c * v,
        }
    }
}

/// Recognized attributes, in application order.
///
/// Raw reading first, then zero-offset correction, then scaling to physical
/// units. Reordering changes every reported value.
pub const OPERATIONS: [(&str, Operation); 4] = [
    ("raw", Operation::Replace),
    ("input", Operation::Replace),
    ("offset", Operation::Add),
    ("scale", Operation::Multiply),
];

/// Whether `key` takes part in resolution.
pub fn is_recognized(key: &str) -> bool {
    OPERATIONS.iter().any(|(name, _)| *name == key)
}

/// Resolve a channel's value from its parsed attributes.
///
/// Unrecognized keys are ignored. No recognized key yields `0.0`.
pub fn resolve(attributes: &BTreeMap<String, f64>) -> f64 {
    OPERATIONS
        .iter()
        .fold(0.0, |c, (key, operation)| match attributes.get(*key) {
            Some(&v) => operation.apply(c, v),
            None => c,
        })
}
