//! Binding logical device names to physical devices.

use std::collections::BTreeMap;

use crate::sensor::Introspect;

/// Whether `candidate` exposes every `(key, value)` of `predicate`.
pub fn matches<D: Introspect>(predicate: &BTreeMap<String, String>, candidate: &D) -> bool {
    predicate
        .iter()
        .all(|(key, value)| candidate.attribute(key) == Some(value.as_str()))
}

/// First candidate, in listed order, that satisfies `predicate`.
///
/// An empty predicate matches the first candidate.
pub fn find_device<'a, D: Introspect>(
    predicate: &BTreeMap<String, String>,
    candidates: &'a [D],
) -> Option<&'a D> {
    candidates.iter().find(|candidate| matches(predicate, *candidate))
}
