//! Content-addressed result cache for MPQ recompression
//!
//! Recompressing an archive is dominated by the compressor. This crate keeps
//! the packed form of every file on disk, keyed by a digest of the file's
//! original contents and its archive path, so later runs over the same or a
//! related archive can reuse the work.
//!
//! # Features
//!
//! - **Content Addressing**: SHA-256 of the original bytes plus the path
//! - **Cross-Process Locking**: one lock file per cache directory
//! - **Recency Signal**: hits refresh modification times for external eviction
//! - **Soft Failures**: lookups degrade to misses instead of failing a run
//!
//! # Example
//!
//! ```
//! use mopaq_cache::{CacheConfig, ResultCache};
//!
//! let dir = tempfile::tempdir().expect("tempdir");
//! let cache = ResultCache::open(CacheConfig::new().with_cache_dir(dir.path())).expect("open");
//!
//! assert!(cache.get("war3map.j", b"original").is_none());
//! cache.put("war3map.j", b"original", b"packed").expect("put");
//! assert_eq!(cache.get("war3map.j", b"original").as_deref(), Some(&b"packed"[..]));
//! ```

#![warn(missing_docs)]

pub mod config;
pub mod disk_cache;
pub mod error;
pub mod key;
pub mod lock;
pub mod stats;

pub use config::CacheConfig;
pub use disk_cache::ResultCache;
pub use error::{CacheError, CacheResult};
pub use key::CacheKey;
pub use lock::CacheLock;
pub use stats::CacheStats;
