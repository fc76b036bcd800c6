//! Configuration for the result cache

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Result cache configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Directory holding entries and the lock file
    pub cache_dir: PathBuf,
    /// Attempts to create the lock file before giving up
    pub lock_attempts: u32,
    /// Pause between lock attempts
    pub lock_retry: Duration,
    /// Longest entry file name the filesystem accepts
    pub max_file_name_len: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            cache_dir: PathBuf::from("./cache"),
            lock_attempts: 100,
            lock_retry: Duration::from_millis(10),
            max_file_name_len: 255,
        }
    }
}

impl CacheConfig {
    /// Create a new cache configuration with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the cache directory
    pub fn with_cache_dir(mut self, cache_dir: impl Into<PathBuf>) -> Self {
        self.cache_dir = cache_dir.into();
        self
    }

    /// Set lock attempts and the pause between them
    pub fn with_lock_policy(mut self, attempts: u32, retry: Duration) -> Self {
        self.lock_attempts = attempts;
        self.lock_retry = retry;
        self
    }

    /// Set the file name length limit
    pub fn with_max_file_name_len(mut self, len: usize) -> Self {
        self.max_file_name_len = len;
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.cache_dir.as_os_str().is_empty() {
            return Err("cache_dir must not be empty".to_string());
        }

        if self.lock_attempts == 0 {
            return Err("lock_attempts must be greater than 0".to_string());
        }

        if self.max_file_name_len == 0 {
            return Err("max_file_name_len must be greater than 0".to_string());
        }

        Ok(())
    }
}
