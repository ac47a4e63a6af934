//! Durable writes for `.phasegate/` state.
//!
//! Each write lands in a `.phasegate-*.tmp` sibling, is fsynced, then renamed
//! over the target. Readers see the old file or the new one, never a prefix.

use crate::error::Result;
use serde::Serialize;
use std::io::Write;
use std::path::Path;

fn replace_file(path: &Path, data: &[u8]) -> Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir)?;

    let mut tmp = tempfile::Builder::new()
        .prefix(".phasegate-")
        .suffix(".tmp")
        .tempfile_in(dir)?;
    tmp.write_all(data)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

/// Pretty JSON with a trailing newline, so hand edits and diffs stay clean.
pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let mut data = serde_json::to_vec_pretty(value)?;
    data.push(b'\n');
    replace_file(path, &data)
}

pub fn write_yaml<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let data = serde_yaml::to_string(value)?;
    replace_file(path, data.as_bytes())
}

/// Like [`write_json`] but leaves an existing file alone. Returns whether it
/// wrote.
pub fn create_json<T: Serialize>(path: &Path, value: &T) -> Result<bool> {
    if path.exists() {
        return Ok(false);
    }
    write_json(path, value)?;
    Ok(true)
}
