//! Secrets overlay.
//!
//! A secrets directory holds one file per value. The file name is a
//! dot-separated path into the configuration tree, so a file named
//! `influxdb.token` overlays `config["influxdb"]["token"]`. This matches how
//! Kubernetes and Docker mount secrets as files.

use std::path::Path;

use serde_json::{Map, Value};

use crate::error::{Error, Result};

/// Overlay every secret file found in `dir` onto `config`.
///
/// Hidden entries (names starting with `.`, such as the `..data` links of a
/// Kubernetes secret volume) and non-files are ignored. Returns the number of
/// secrets applied.
pub fn overlay_secrets_dir(config: &mut Value, dir: impl AsRef<Path>) -> Result<usize> {
    let dir = dir.as_ref();
    let mut entries: Vec<_> = std::fs::read_dir(dir)
        .map_err(|e| {
            Error::Config(format!(
                "Failed to read secrets directory '{}': {}",
                dir.display(),
                e
            ))
        })?
        .collect::<std::io::Result<_>>()?;

    // Apply in name order so nested paths overlay deterministically.
    entries.sort_by_key(|entry| entry.file_name());

    let mut applied = 0;
    for entry in entries {
        let name = entry.file_name().to_string_lossy().to_string();
        if name.starts_with('.') {
            continue;
        }
        // Follows symlinks, so mounted secrets resolve to their targets.
        if !entry.path().is_file() {
            continue;
        }

        let content = std::fs::read_to_string(entry.path())?;
        overlay_secret(config, &name, content.trim_end_matches(['\r', '\n']))?;
        tracing::debug!(secret = %name, "Applied secret");
        applied += 1;
    }

    Ok(applied)
}

/// Set the value at the dot-separated `path` to the string `value`.
///
/// Intermediate objects are created as needed. A non-object value standing
/// in the way of the path is an error rather than being silently replaced.
pub fn overlay_secret(config: &mut Value, path: &str, value: &str) -> Result<()> {
    let segments: Vec<&str> = path.split('.').collect();
    if segments.iter().any(|s| s.is_empty()) {
        return Err(Error::Secret {
            name: path.to_string(),
            message: "empty path segment".to_string(),
        });
    }

    let mut node = config;
    for segment in &segments[..segments.len() - 1] {
        if node.is_null() {
            *node = Value::Object(Map::new());
        }
        let Value::Object(map) = node else {
            return Err(Error::Secret {
                name: path.to_string(),
                message: format!("'{}' is not an object", segment),
            });
        };
        node = map
            .entry(segment.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
    }

    if node.is_null() {
        *node = Value::Object(Map::new());
    }
    let Value::Object(map) = node else {
        return Err(Error::Secret {
            name: path.to_string(),
            message: "parent is not an object".to_string(),
        });
    };

    let leaf = segments[segments.len() - 1];
    map.insert(leaf.to_string(), Value::String(value.to_string()));

    Ok(())
}
