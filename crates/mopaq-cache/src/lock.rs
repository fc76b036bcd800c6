//! Cross-process lock over the cache directory
//!
//! The lock is a file created with exclusive-create semantics; whoever
//! creates it holds the lock until the file is removed. Stale lock files
//! left behind by a crashed process have to be removed by hand.

use crate::error::{CacheError, CacheResult};
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Name of the lock file inside the cache directory
pub const LOCK_FILE_NAME: &str = ".lockfile";

/// Held lock on a cache directory, released on drop
#[derive(Debug)]
pub struct CacheLock {
    /// The lock file handle (kept open to hold the lock).
    _file: File,
    /// Path to the lock file.
    path: PathBuf,
}

impl CacheLock {
    /// Acquire the lock on `dir`, trying `attempts` times `retry` apart
    pub fn acquire(dir: &Path, attempts: u32, retry: Duration) -> CacheResult<Self> {
        let path = dir.join(LOCK_FILE_NAME);

        for attempt in 1..=attempts {
            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(file) => return Ok(Self { _file: file, path }),
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                    if attempt < attempts {
                        std::thread::sleep(retry);
                    }
                }
                Err(e) => return Err(CacheError::Io(e)),
            }
        }

        Err(CacheError::LockTimeout { path, attempts })
    }

    /// Path of the lock file
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for CacheLock {
    fn drop(&mut self) {
        // Remove the lock file on drop to release the lock.
        let _ = std::fs::remove_file(&self.path);
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_acquire_and_release() {
        let dir = tempfile::tempdir().expect("Test operation should succeed");
        let lock = CacheLock::acquire(dir.path(), 1, Duration::ZERO)
            .expect("Test operation should succeed");
        assert!(lock.path().exists());

        let lock_path = lock.path().to_path_buf();
        drop(lock);
        assert!(!lock_path.exists());
    }

    #[test]
    fn test_contention_times_out() {
        let dir = tempfile::tempdir().expect("Test operation should succeed");
        let _held = CacheLock::acquire(dir.path(), 1, Duration::ZERO)
            .expect("Test operation should succeed");

        let err = CacheLock::acquire(dir.path(), 3, Duration::from_millis(1))
            .expect_err("Should time out");
        assert!(matches!(err, CacheError::LockTimeout { attempts: 3, .. }));
    }

    #[test]
    fn test_waits_for_release() {
        let dir = tempfile::tempdir().expect("Test operation should succeed");
        let held = CacheLock::acquire(dir.path(), 1, Duration::ZERO)
            .expect("Test operation should succeed");

        let path = dir.path().to_path_buf();
        let waiter = std::thread::spawn(move || {
            CacheLock::acquire(&path, 500, Duration::from_millis(10)).map(|_| ())
        });
        std::thread::sleep(Duration::from_millis(30));
        drop(held);

        assert!(waiter.join().expect("thread panicked").is_ok());
    }

    #[test]
    fn test_missing_directory_is_io_error() {
        let dir = tempfile::tempdir().expect("Test operation should succeed");
        let missing = dir.path().join("nope");
        let err = CacheLock::acquire(&missing, 5, Duration::ZERO).expect_err("Should fail");
        assert!(matches!(err, CacheError::Io(_)));
    }
}
