//! JSON snapshot load/save.
//!
//! Stores are tolerant of their backing file being absent, empty or
//! malformed: all three load as the empty default (malformed content is
//! logged). Only genuine IO failures are reported. The credential lease is
//! the exception and uses the strict [`load_json`], because it has no
//! meaningful empty value.

use std::io;
use std::path::Path;

use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::warn;

use super::atomic::write_atomic;

/// Errors that can occur during snapshot operations.
#[derive(Debug, Error)]
pub enum SnapshotError {
    /// IO error during file operations.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type for snapshot operations.
pub type Result<T> = std::result::Result<T, SnapshotError>;

impl SnapshotError {
    /// Returns true if the underlying error is a missing file.
    pub fn is_not_found(&self) -> bool {
        matches!(self, SnapshotError::Io(e) if e.kind() == io::ErrorKind::NotFound)
    }
}

/// Serializes `value` as pretty JSON and replaces `path` atomically.
pub fn save_json_atomic<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let bytes = serde_json::to_vec_pretty(value)?;
    write_atomic(path, &bytes)?;
    Ok(())
}

/// Loads and deserializes `path`.
///
/// # Errors
///
/// Returns an error if the file can't be read or the JSON is malformed.
pub fn load_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let bytes = std::fs::read(path)?;
    Ok(serde_json::from_slice(&bytes)?)
}

/// Loads `path`, returning `None` if the file doesn't exist.
///
/// Other errors (malformed JSON, permissions) are propagated.
pub fn try_load_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    match load_json(path) {
        Ok(value) => Ok(Some(value)),
        Err(e) if e.is_not_found() => Ok(None),
        Err(e) => Err(e),
    }
}

/// Loads `path`, treating a missing, empty or malformed file as `T::default()`.
///
/// # Errors
///
/// Returns an error only for IO failures other than "not found".
pub fn load_json_or_default<T: DeserializeOwned + Default>(path: &Path) -> io::Result<T> {
    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(T::default()),
        Err(e) => return Err(e),
    };

    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }

    match serde_json::from_slice(&bytes) {
        Ok(value) => Ok(value),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Malformed state file, treating as empty");
            Ok(T::default())
        }
    }
}
