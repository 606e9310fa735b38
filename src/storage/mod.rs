//! JSON file helpers.
//!
//! Trader pool files and the reference catalog are plain JSON on disk. Pool
//! files are watched by modification time, so callers also need a cheap
//! way to read that.

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::Path;
use std::time::SystemTime;
use tracing::debug;

/// Load and deserialize a JSON file.
pub fn load_json<T: DeserializeOwned>(path: impl AsRef<Path>) -> Result<T> {
    let path = path.as_ref();
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let value = serde_json::from_str(&json)
        .with_context(|| format!("Failed to parse {}", path.display()))?;
    debug!(path = %path.display(), "JSON file loaded");
    Ok(value)
}

/// Serialize `value` as pretty JSON to `path`.
pub fn save_json<T: Serialize>(value: &T, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    let json = serde_json::to_string_pretty(value).context("Failed to serialise JSON")?;
    std::fs::write(path, json).with_context(|| format!("Failed to write {}", path.display()))?;
    debug!(path = %path.display(), "JSON file saved");
    Ok(())
}

/// Modification time of a file.
pub fn last_modified(path: impl AsRef<Path>) -> Result<SystemTime> {
    let path = path.as_ref();
    std::fs::metadata(path)
        .and_then(|m| m.modified())
        .with_context(|| format!("Failed to stat {}", path.display()))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
