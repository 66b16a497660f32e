//! Atomic file writes for cache indexes, blobs and the retry queue.
//!
//! Every write lands in a temp file next to the target and is renamed into
//! place, so a crash mid-write leaves the previous contents intact.

use std::fs;
use std::io::Write;
use std::path::Path;
use std::process;

use anyhow::{Context, Result};
use serde::{de::DeserializeOwned, Serialize};

/// Read and parse a JSON file. Returns `None` if the file doesn't exist.
pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    if !path.exists() {
        return Ok(None);
    }

    let contents = fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let data = serde_json::from_str(&contents)
        .with_context(|| format!("Failed to parse {}", path.display()))?;

    Ok(Some(data))
}

pub fn write_json<T: Serialize>(path: &Path, data: &T) -> Result<()> {
    let contents = serde_json::to_vec_pretty(data).context("Failed to serialize data")?;
    write_bytes(path, &contents)
}

pub fn write_bytes(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory {}", parent.display()))?;
    }

    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| anyhow::anyhow!("Invalid file path: {}", path.display()))?;
    let temp_path = path.with_file_name(format!("{}.{}.tmp", file_name, process::id()));

    let mut file = fs::File::create(&temp_path)
        .with_context(|| format!("Failed to create {}", temp_path.display()))?;
    file.write_all(bytes)
        .with_context(|| format!("Failed to write {}", temp_path.display()))?;
    file.sync_all()
        .with_context(|| format!("Failed to sync {}", temp_path.display()))?;
    drop(file);

    fs::rename(&temp_path, path).with_context(|| {
        let _ = fs::remove_file(&temp_path);
        format!("Failed to move {} into place", path.display())
    })?;
    Ok(())
}
