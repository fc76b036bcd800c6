//! Error types for cache operations

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur during cache operations
#[derive(Debug, Error)]
pub enum CacheError {
    /// Invalid cache configuration
    #[error("Invalid cache configuration: {0}")]
    InvalidConfiguration(String),

    /// Key would not fit in a file name
    #[error("Cache key of {len} bytes exceeds the {max}-byte file name limit")]
    KeyTooLong {
        /// Encoded key length
        len: usize,
        /// Configured limit
        max: usize,
    },

    /// Lock file still held after every attempt
    #[error("Lock timeout after {attempts} attempts: {}", path.display())]
    LockTimeout {
        /// Lock file location
        path: PathBuf,
        /// Attempts made
        attempts: u32,
    },

    /// Fewer bytes reached disk than were written
    #[error("Short write to {}: {written} of {expected} bytes", path.display())]
    ShortWrite {
        /// Entry location
        path: PathBuf,
        /// Bytes found on disk
        written: u64,
        /// Bytes that should have been written
        expected: u64,
    },

    /// IO error during cache operations
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for cache operations
pub type CacheResult<T> = Result<T, CacheError>;
