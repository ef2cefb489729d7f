//! Atomic write primitives
//!
//! Uses temp→rename pattern to ensure no partial writes

use crate::errors::{io_error, Result};
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};

/// Temp file next to `target`, so the rename stays on one filesystem
fn temp_path_for(target: &Path) -> PathBuf {
    let mut name = target
        .file_name()
        .map(OsString::from)
        .unwrap_or_else(|| OsString::from("idsync"));
    name.push(".tmp");
    target.with_file_name(name)
}

fn ensure_parent(target: &Path) -> Result<()> {
    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent).map_err(|e| io_error("create_dir", parent, e))?;
    }
    Ok(())
}

/// Atomically write bytes to a file
pub fn atomic_write(target: &Path, content: &[u8]) -> Result<()> {
    ensure_parent(target)?;
    let temp_path = temp_path_for(target);
    fs::write(&temp_path, content).map_err(|e| io_error("write_temp", &temp_path, e))?;
    fs::rename(&temp_path, target).map_err(|e| io_error("rename_temp", target, e))?;
    Ok(())
}

/// Atomically replace `target` with a copy of `source`.
///
/// Returns the number of bytes copied.
pub fn atomic_copy(source: &Path, target: &Path) -> Result<u64> {
    ensure_parent(target)?;
    let temp_path = temp_path_for(target);
    let copied = fs::copy(source, &temp_path).map_err(|e| io_error("copy_temp", source, e))?;
    fs::rename(&temp_path, target).map_err(|e| io_error("rename_temp", target, e))?;
    Ok(copied)
}
