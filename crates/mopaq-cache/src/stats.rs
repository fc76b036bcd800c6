//! Cache hit and store counters

use std::sync::atomic::{AtomicU64, Ordering};

/// Point-in-time view of the cache counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Lookups served from disk
    pub hits: u64,
    /// Lookups with no usable entry
    pub misses: u64,
    /// Entries written
    pub stores: u64,
    /// Lookups or stores abandoned because of an error
    pub failures: u64,
}

impl CacheStats {
    /// Fraction of lookups that hit, 0.0 when there were none
    #[allow(clippy::cast_precision_loss)]
    pub fn hit_ratio(&self) -> f64 {
        let lookups = self.hits + self.misses;
        if lookups == 0 {
            0.0
        } else {
            self.hits as f64 / lookups as f64
        }
    }
}

#[derive(Debug, Default)]
pub(crate) struct AtomicCacheStats {
    hits: AtomicU64,
    misses: AtomicU64,
    stores: AtomicU64,
    failures: AtomicU64,
}

impl AtomicCacheStats {
    #[inline]
    pub(crate) fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn record_store(&self) {
        self.stores.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn record_failure(&self) {
        self.failures.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            stores: self.stores.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
        }
    }
}
