//! On-disk result cache shared between runs and processes
//!
//! Entries are flat files in one directory, named by [`CacheKey`]. Every read
//! and write happens under the directory's [`CacheLock`]. A hit refreshes the
//! entry's modification time so external cleanup can evict by recency.
//!
//! Each entry is framed: a 4-byte magic, the payload length as a
//! little-endian `u64`, the SHA-256 of the payload, then the payload itself.
//! An entry whose frame does not check out is a miss.
//!
//! Lookups never fail: lock timeouts, I/O errors and overlong keys are logged
//! and reported as misses.

use crate::{
    config::CacheConfig,
    error::{CacheError, CacheResult},
    key::CacheKey,
    lock::CacheLock,
    stats::{AtomicCacheStats, CacheStats},
};
use sha2::{Digest, Sha256};
use std::{
    fs::{self, File, OpenOptions},
    io::{ErrorKind, Read, Write},
    path::{Path, PathBuf},
    time::SystemTime,
};
use tracing::{debug, warn};

/// Leading bytes of every entry
pub const ENTRY_MAGIC: [u8; 4] = *b"MQC1";

/// Magic, payload length and payload digest
pub const ENTRY_HEADER_SIZE: usize = 4 + 8 + 32;

/// Content-addressed store of recompressed file payloads
#[derive(Debug)]
pub struct ResultCache {
    config: CacheConfig,
    stats: AtomicCacheStats,
}

impl ResultCache {
    /// Open the cache, creating its directory if needed
    pub fn open(config: CacheConfig) -> CacheResult<Self> {
        config
            .validate()
            .map_err(CacheError::InvalidConfiguration)?;

        // Ensure cache directory exists
        fs::create_dir_all(&config.cache_dir)?;

        Ok(Self {
            config,
            stats: AtomicCacheStats::default(),
        })
    }

    /// Configuration in use
    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Cache directory
    pub fn dir(&self) -> &Path {
        &self.config.cache_dir
    }

    /// Counters since the cache was opened
    pub fn stats(&self) -> CacheStats {
        self.stats.snapshot()
    }

    fn key(&self, path: &str, content: &[u8]) -> CacheResult<CacheKey> {
        CacheKey::new(path, content, self.config.max_file_name_len)
    }

    fn entry_path(&self, key: &CacheKey) -> PathBuf {
        self.config.cache_dir.join(key.file_name())
    }

    fn lock(&self) -> CacheResult<CacheLock> {
        CacheLock::acquire(
            &self.config.cache_dir,
            self.config.lock_attempts,
            self.config.lock_retry,
        )
    }

    /// Stored bytes for `path` with original `content`, or `None` on a miss
    pub fn get(&self, path: &str, content: &[u8]) -> Option<Vec<u8>> {
        match self.try_get(path, content) {
            Ok(Some(data)) => {
                self.stats.record_hit();
                debug!("Cache hit: {path}");
                Some(data)
            }
            Ok(None) => {
                self.stats.record_miss();
                debug!("Cache miss: {path}");
                None
            }
            Err(e) => {
                self.stats.record_miss();
                self.stats.record_failure();
                warn!("Cache lookup failed for {path}: {e}");
                None
            }
        }
    }

    /// Like [`Self::get`] but surfaces the reason a lookup was abandoned
    pub fn try_get(&self, path: &str, content: &[u8]) -> CacheResult<Option<Vec<u8>>> {
        let key = self.key(path, content)?;
        let entry = self.entry_path(&key);
        let _lock = self.lock()?;

        let mut file = match File::open(&entry) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let mut data = Vec::new();
        file.read_to_end(&mut data)?;
        drop(file);

        let Some(payload) = unframe(&data) else {
            debug!(
                "Ignoring damaged cache entry {} ({} bytes)",
                key,
                data.len()
            );
            return Ok(None);
        };
        let payload = payload.to_vec();

        touch(&entry);
        Ok(Some(payload))
    }

    /// Store `compressed` for `path` with original `content`
    ///
    /// The framed entry is written to a temporary file, its length checked on
    /// disk and then renamed into place; a short write removes the partial
    /// file.
    pub fn put(&self, path: &str, content: &[u8], compressed: &[u8]) -> CacheResult<()> {
        let result = self.try_put(path, content, compressed);
        match &result {
            Ok(()) => self.stats.record_store(),
            Err(_) => self.stats.record_failure(),
        }
        result
    }

    fn try_put(&self, path: &str, content: &[u8], compressed: &[u8]) -> CacheResult<()> {
        let key = self.key(path, content)?;
        let entry = self.entry_path(&key);
        let temp_path = entry.with_extension("tmp");
        let framed = frame(compressed);
        let _lock = self.lock()?;

        let written = {
            let mut file = OpenOptions::new()
                .write(true)
                .create(true)
                .truncate(true)
                .open(&temp_path)?;

            file.write_all(&framed)?;
            file.flush()?;
            file.sync_all()?;
            file.metadata()?.len()
        };

        let expected = framed.len() as u64;
        if written != expected {
            let _ = fs::remove_file(&temp_path);
            return Err(CacheError::ShortWrite {
                path: entry,
                written,
                expected,
            });
        }

        // Atomic rename
        if let Err(e) = fs::rename(&temp_path, &entry) {
            let _ = fs::remove_file(&temp_path);
            return Err(e.into());
        }

        debug!("Cached {path} as {key}");
        Ok(())
    }
}

/// Entry bytes for `payload`
fn frame(payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(ENTRY_HEADER_SIZE + payload.len());
    out.extend_from_slice(&ENTRY_MAGIC);
    out.extend_from_slice(&(payload.len() as u64).to_le_bytes());
    out.extend_from_slice(&Sha256::digest(payload));
    out.extend_from_slice(payload);
    out
}

/// Payload of a well-formed entry
fn unframe(entry: &[u8]) -> Option<&[u8]> {
    if entry.len() < ENTRY_HEADER_SIZE || entry[..4] != ENTRY_MAGIC {
        return None;
    }
    let len = u64::from_le_bytes(entry[4..12].try_into().ok()?);
    let digest = &entry[12..ENTRY_HEADER_SIZE];
    let payload = &entry[ENTRY_HEADER_SIZE..];
    if payload.len() as u64 != len || Sha256::digest(payload).as_slice() != digest {
        return None;
    }
    Some(payload)
}

/// Refresh the modification time of a hit entry
fn touch(path: &Path) {
    let result = OpenOptions::new()
        .write(true)
        .open(path)
        .and_then(|file| file.set_modified(SystemTime::now()));
    if let Err(e) = result {
        debug!("Could not refresh {}: {e}", path.display());
    }
}
