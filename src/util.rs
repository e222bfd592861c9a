// src/util.rs

use anyhow::{Context, Result};
use std::path::Path;

/// Read a UTF-8 file into a String with a clear error message.
///
/// Used for user script files passed to `vizexec run`.
pub fn read_to_string(path: &Path) -> Result<String> {
    std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read file {:?}", path))
}

/// Ensure a directory exists (create it if missing).
///
/// This is used when:
/// - creating the storage root
/// - initialising project scaffolding
pub fn ensure_dir(path: &Path) -> Result<()> {
    std::fs::create_dir_all(path)
        .with_context(|| format!("Failed to create directory {:?}", path))
}

/// Write `contents` to `path`, naming the file in the error.
pub fn write_file(path: &Path, contents: impl AsRef<[u8]>) -> Result<()> {
    std::fs::write(path, contents).with_context(|| format!("Failed to write {:?}", path))
}
