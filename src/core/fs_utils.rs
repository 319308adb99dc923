//! Filesystem helpers: atomic publication of files and JSON read/write.
//!
//! Every persisted file goes through `write_atomic`: the bytes land in a
//! same-directory temporary file carrying the process id, are flushed, and
//! are renamed over the target. On POSIX filesystems the rename is atomic,
//! so readers observe either the old state or the new state, never a
//! partially written file.

use std::fs::{self, File};
use std::io::Write;
use std::path::Path;

use serde::de::DeserializeOwned;
use serde::Serialize;

use super::errors::PoolError;
use super::Result;

/// Write `bytes` to `path` atomically (write-temp-then-rename).
///
/// The parent directory must already exist. A unique per-process temp name
/// keeps concurrent writers of the same target from clobbering each other's
/// in-flight files; whichever rename lands last wins, and content-addressed
/// callers only ever race on byte-identical content.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| PoolError::corruption(path, "target path has no file name"))?;
    let parent = path
        .parent()
        .ok_or_else(|| PoolError::corruption(path, "target path has no parent directory"))?;

    let tmp = parent.join(format!(".{}.{}.tmp", file_name, std::process::id()));
    {
        let mut file = File::create(&tmp).map_err(|e| PoolError::io(&tmp, e))?;
        file.write_all(bytes).map_err(|e| PoolError::io(&tmp, e))?;
        file.sync_all().map_err(|e| PoolError::io(&tmp, e))?;
    }

    if let Err(e) = fs::rename(&tmp, path) {
        let _ = fs::remove_file(&tmp);
        return Err(PoolError::io(path, e));
    }
    Ok(())
}

/// Create a directory and all parents; an already-existing directory is
/// success (idempotent across concurrent processes).
pub fn ensure_dir(path: &Path) -> Result<()> {
    fs::create_dir_all(path).map_err(|e| PoolError::io(path, e))
}

/// Serialize `value` as two-space-indented JSON and publish it atomically.
pub fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let mut bytes = serde_json::to_vec_pretty(value)
        .map_err(|e| PoolError::corruption(path, format!("failed to serialize JSON: {e}")))?;
    bytes.push(b'\n');
    write_atomic(path, &bytes)
}

/// Read and parse a JSON file. A missing file surfaces as `Io`; malformed
/// content surfaces as `Corruption` naming the offending path.
pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let bytes = fs::read(path).map_err(|e| PoolError::io(path, e))?;
    serde_json::from_slice(&bytes)
        .map_err(|e| PoolError::corruption(path, format!("malformed JSON: {e}")))
}

/// Read a source file as UTF-8 text, stripping a UTF-8 BOM if present.
pub fn read_source_file(path: &Path) -> Result<String> {
    let mut content = fs::read_to_string(path).map_err(|e| PoolError::io(path, e))?;
    if content.starts_with('\u{FEFF}') {
        content = content.trim_start_matches('\u{FEFF}').to_string();
    }
    Ok(content)
}
