//! Atomic whole-file replacement.
//!
//! Both file and directory fsyncs are required: renaming a file updates the
//! directory entry, and without an fsync on the directory that entry may not
//! survive a power loss even if the file contents were synced.

use std::ffi::OsString;
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// Syncs a file's contents and metadata to disk.
pub fn fsync_file(file: &File) -> io::Result<()> {
    file.sync_all()
}

/// Syncs a directory so that entries created or renamed in it are durable.
///
/// # Errors
///
/// Returns an error if the path doesn't exist or if the fsync system call fails.
pub fn fsync_dir(dir_path: &Path) -> io::Result<()> {
    let dir = OpenOptions::new().read(true).open(dir_path)?;
    dir.sync_all()
}

/// Returns the temp path used while replacing `path` (`<path>.tmp`).
pub fn temp_path(path: &Path) -> PathBuf {
    let mut name: OsString = path.as_os_str().to_owned();
    name.push(".tmp");
    PathBuf::from(name)
}

/// Replaces the contents of `path` with `bytes` atomically.
///
/// 1. Write to `<path>.tmp`
/// 2. fsync the temp file
/// 3. Rename over `<path>`
/// 4. fsync the parent directory
///
/// The parent directory is created if missing.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let parent = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(parent)?;

    let tmp_path = temp_path(path);
    {
        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&tmp_path)?;
        file.write_all(bytes)?;
        fsync_file(&file)?;
    }

    std::fs::rename(&tmp_path, path)?;
    fsync_dir(parent)?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn write_atomic_replaces_contents() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("queue.json");

        write_atomic(&path, b"first").unwrap();
        write_atomic(&path, b"second").unwrap();

        assert_eq!(std::fs::read(&path).unwrap(), b"second");
        assert!(!temp_path(&path).exists());
    }

    #[test]
    fn write_atomic_creates_missing_parent() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("state").join("token.json");

        write_atomic(&path, b"{}").unwrap();

        assert!(path.exists());
    }

    #[test]
    fn stale_temp_file_does_not_affect_target() {
        // A crash between write and rename leaves only the temp file behind.
        let dir = tempdir().unwrap();
        let path = dir.path().join("queue.json");
        write_atomic(&path, b"committed").unwrap();
        std::fs::write(temp_path(&path), b"half-writ").unwrap();

        assert_eq!(std::fs::read(&path).unwrap(), b"committed");

        write_atomic(&path, b"next").unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"next");
    }

    #[test]
    fn temp_path_appends_suffix() {
        assert_eq!(
            temp_path(Path::new("/var/lib/x/sent_invoices.json")),
            PathBuf::from("/var/lib/x/sent_invoices.json.tmp")
        );
    }

    #[test]
    fn fsync_dir_fails_on_nonexistent() {
        let result = fsync_dir(Path::new("/nonexistent/path/that/does/not/exist"));
        assert!(result.is_err());
    }
}
