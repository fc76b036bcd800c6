//! Shared state of one recompression run
//!
//! A [`BuildContext`] is created once per run and shared by every worker
//! through an `Arc`. Everything in it is read-only except three pieces, each
//! behind its own lock: the work queue, the output state (writer, cursor,
//! new tables and counters) and the first-error slot.

use crate::config::RecompressConfig;
use crate::error::{RecompressError, RecompressResult};
use crate::queue::{WorkItem, WorkQueue};
use crate::runtime::{RuntimeLock, ThreadRuntime};
use crate::source::SourceArchive;
use mopaq_cache::ResultCache;
use mopaq_formats::archive::{ArchiveTable, BlockFlags, BlockTableEntry};
use mopaq_formats::codec::SectorEncoder;
use mopaq_formats::sector::{pack_file, sector_count};
use std::fs::File;
use std::io::{BufWriter, Write};
use tracing::{debug, error, info, warn};

/// Totals reported at the end of a run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunStats {
    /// Files written to the output archive
    pub files: usize,
    /// Sum of original file sizes
    pub bytes_in: u64,
    /// Sum of emitted payload sizes
    pub bytes_out: u64,
    /// Files served from the result cache
    pub cache_hits: usize,
}

impl RunStats {
    /// Emitted bytes as a percentage of original bytes
    pub fn ratio(&self) -> f64 {
        if self.bytes_in == 0 {
            return 100.0;
        }
        self.bytes_out as f64 * 100.0 / self.bytes_in as f64
    }
}

/// Output archive under construction
pub(crate) struct OutputState {
    pub(crate) writer: BufWriter<File>,
    /// Absolute write position
    pub(crate) cursor: u64,
    /// Absolute position of the reserved header
    pub(crate) header_offset: u64,
    pub(crate) table: ArchiveTable,
    pub(crate) stats: RunStats,
}

impl OutputState {
    /// Current position relative to the header, as stored in the tables
    pub(crate) fn relative_cursor(&self) -> RecompressResult<u32> {
        let relative = self.cursor - self.header_offset;
        u32::try_from(relative).map_err(|_| RecompressError::ArchiveTooLarge(relative))
    }
}

/// Per-file result handed from compression to the output lock
struct Emitted {
    bytes: Vec<u8>,
    normal_size: usize,
    from_cache: bool,
}

/// Explicit build state shared by all workers
pub struct BuildContext<R: ThreadRuntime> {
    source: SourceArchive,
    encoder: SectorEncoder,
    sector_size: usize,
    cache: Option<ResultCache>,
    queue: WorkQueue<R>,
    pub(crate) output: R::Lock<OutputState>,
    failure: R::Lock<Option<RecompressError>>,
}

impl<R: ThreadRuntime> BuildContext<R> {
    pub(crate) fn new(
        runtime: &R,
        config: &RecompressConfig,
        source: SourceArchive,
        cache: Option<ResultCache>,
        paths: Vec<String>,
        output: OutputState,
    ) -> RecompressResult<Self> {
        Ok(Self {
            source,
            encoder: config.encoder(),
            sector_size: mopaq_formats::archive::sector_size(config.shift)?,
            cache,
            queue: WorkQueue::new(runtime, paths),
            output: runtime.create_lock(output),
            failure: runtime.create_lock(None),
        })
    }

    /// Whether some worker has already failed
    pub fn has_failed(&self) -> bool {
        self.failure.acquire().is_some()
    }

    /// Keep the first error; later ones are only logged
    pub(crate) fn record_failure(&self, error: RecompressError) {
        let mut slot = self.failure.acquire();
        if slot.is_none() {
            *slot = Some(error);
        } else {
            debug!("Suppressed later worker error: {error}");
        }
    }

    pub(crate) fn take_failure(&self) -> Option<RecompressError> {
        self.failure.acquire().take()
    }

    /// Drain the queue until it is empty or any worker has failed
    pub(crate) fn work(&self, worker: usize) {
        while !self.has_failed() {
            let Some(item) = self.queue.pop() else {
                break;
            };
            if let Err(e) = self.process(worker, &item) {
                error!("[{worker}] {}: {e}", item.path);
                self.record_failure(e);
                break;
            }
        }
    }

    fn process(&self, worker: usize, item: &WorkItem) -> RecompressResult<()> {
        let emitted = self.compress(&item.path)?;
        self.append(worker, item, &emitted)
    }

    /// Extract and compress outside every lock except the cache's own
    fn compress(&self, path: &str) -> RecompressResult<Emitted> {
        let content = self.source.extract(path)?;

        if let Some(bytes) = self.cache.as_ref().and_then(|cache| cache.get(path, &content)) {
            if offsets_match(&bytes, content.len(), self.sector_size) {
                return Ok(Emitted {
                    bytes,
                    normal_size: content.len(),
                    from_cache: true,
                });
            }
            warn!(
                "Ignoring cached {path}: sector table does not fit {} byte sectors",
                self.sector_size
            );
        }

        let packed = pack_file(&content, self.sector_size, &self.encoder)?;
        if let Some(cache) = &self.cache
            && let Err(e) = cache.put(path, &content, &packed.bytes)
        {
            warn!("Failed to cache {path}: {e}");
        }

        Ok(Emitted {
            bytes: packed.bytes,
            normal_size: content.len(),
            from_cache: false,
        })
    }

    /// Write at the cursor and index the file, all under the output lock
    fn append(&self, worker: usize, item: &WorkItem, emitted: &Emitted) -> RecompressResult<()> {
        let mut guard = self.output.acquire();
        let out = &mut *guard;

        let file_pos = out.relative_cursor()?;
        let compressed_size = u32::try_from(emitted.bytes.len())
            .map_err(|_| RecompressError::ArchiveTooLarge(emitted.bytes.len() as u64))?;
        let normal_size = u32::try_from(emitted.normal_size)
            .map_err(|_| RecompressError::ArchiveTooLarge(emitted.normal_size as u64))?;

        out.writer.write_all(&emitted.bytes)?;

        let archive_path = item.path.replace('/', "\\");
        out.table.insert(
            &archive_path,
            BlockTableEntry {
                file_pos,
                compressed_size,
                normal_size,
                flags: BlockFlags::new(BlockFlags::COMPRESSED).with(BlockFlags::EXISTS),
            },
        )?;

        out.cursor += emitted.bytes.len() as u64;
        out.stats.files += 1;
        out.stats.bytes_in += emitted.normal_size as u64;
        out.stats.bytes_out += emitted.bytes.len() as u64;
        if emitted.from_cache {
            out.stats.cache_hits += 1;
        }

        let ratio = if emitted.normal_size == 0 {
            100.0
        } else {
            emitted.bytes.len() as f64 * 100.0 / emitted.normal_size as f64
        };
        info!(
            "[{worker}] [{}/{}] {archive_path}: {} -> {} bytes ({ratio:.1}%){}",
            item.index,
            self.queue.total(),
            emitted.normal_size,
            emitted.bytes.len(),
            if emitted.from_cache { " (cached)" } else { "" }
        );
        Ok(())
    }
}

/// Whether a cached payload was packed with `sector_size` sectors
///
/// Cache keys cover only path and contents, so an entry written by a run
/// with another sector size is found but unusable.
fn offsets_match(bytes: &[u8], normal_size: usize, sector_size: usize) -> bool {
    let table_len = (sector_count(normal_size, sector_size) + 1) * 4;
    let word = |at: usize| {
        bytes
            .get(at..at + 4)
            .map(|w| u32::from_le_bytes([w[0], w[1], w[2], w[3]]) as usize)
    };
    word(0) == Some(table_len) && word(table_len - 4) == Some(bytes.len())
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_offsets_match_own_packing() {
        let data: Vec<u8> = (0..5000u32).map(|i| (i % 7) as u8).collect();
        let packed = pack_file(&data, 512, &SectorEncoder::default())
            .expect("Test operation should succeed");
        assert!(offsets_match(&packed.bytes, data.len(), 512));
        assert!(!offsets_match(&packed.bytes, data.len(), 4096));
    }

    #[test]
    fn test_offsets_match_empty_file() {
        let packed = pack_file(&[], 512, &SectorEncoder::default())
            .expect("Test operation should succeed");
        assert!(offsets_match(&packed.bytes, 0, 512));
        assert!(!offsets_match(&[], 0, 512));
    }

    #[test]
    fn test_run_stats_ratio() {
        let stats = RunStats {
            files: 2,
            bytes_in: 200,
            bytes_out: 50,
            cache_hits: 0,
        };
        assert!((stats.ratio() - 25.0).abs() < f64::EPSILON);
        assert!((RunStats::default().ratio() - 100.0).abs() < f64::EPSILON);
    }
}
