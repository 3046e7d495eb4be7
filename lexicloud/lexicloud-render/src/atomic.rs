//! Atomic artifact writes.

use lexicloud_core::error::{LexiError, Result};
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;

/// Write `bytes` to `path` through a temporary file in the same directory,
/// so readers never observe a partial artifact.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir).map_err(|e| LexiError::io_write(path, e))?;

    let mut tmp = NamedTempFile::new_in(dir).map_err(|e| LexiError::io_write(path, e))?;
    tmp.write_all(bytes).map_err(|e| LexiError::io_write(path, e))?;
    tmp.as_file().sync_all().map_err(|e| LexiError::io_write(path, e))?;
    tmp.persist(path).map_err(|e| LexiError::io_write(path, e.error))?;
    Ok(())
}
