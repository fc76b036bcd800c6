//! Recompression run: listfile, worker pool and output finalization

use crate::config::RecompressConfig;
use crate::context::{BuildContext, OutputState, RunStats};
use crate::error::{RecompressError, RecompressResult};
use crate::runtime::{OsThreads, RuntimeLock, ThreadRuntime};
use crate::source::SourceArchive;
use mopaq_cache::ResultCache;
use mopaq_formats::archive::{ArchiveHeader, ArchiveTable, HEADER_SIZE};
use mopaq_formats::listfile::ATTRIBUTES_NAME;
use std::fs::File;
use std::io::{BufWriter, Seek, SeekFrom, Write};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

/// Rewrites archives with every file recompressed
///
/// ```no_run
/// use mopaq_recompress::{RecompressConfig, Recompressor};
/// use std::path::Path;
///
/// let recompressor = Recompressor::new(RecompressConfig::new().with_threads(4))?;
/// let stats = recompressor.run(Path::new("in.w3x"), Path::new("out.w3x"))?;
/// println!("{} files, {:.1}%", stats.files, stats.ratio());
/// # Ok::<(), mopaq_recompress::RecompressError>(())
/// ```
#[derive(Debug)]
pub struct Recompressor<R: ThreadRuntime = OsThreads> {
    config: RecompressConfig,
    runtime: R,
}

impl Recompressor<OsThreads> {
    /// Recompressor on operating-system threads
    pub fn new(config: RecompressConfig) -> RecompressResult<Self> {
        Self::with_runtime(config, OsThreads)
    }
}

impl<R: ThreadRuntime + 'static> Recompressor<R> {
    /// Recompressor on an explicit thread runtime
    pub fn with_runtime(config: RecompressConfig, runtime: R) -> RecompressResult<Self> {
        config.validate()?;
        Ok(Self { config, runtime })
    }

    /// Configuration in use
    pub fn config(&self) -> &RecompressConfig {
        &self.config
    }

    /// Recompress the archive at `input` into `output`
    pub fn run(&self, input: &Path, output: &Path) -> RecompressResult<RunStats> {
        let source = SourceArchive::open(input)?;
        self.run_source(source, output)
    }

    /// Recompress an already opened archive into `output`
    ///
    /// On error the output file is left incomplete and must be discarded.
    pub fn run_source(&self, source: SourceArchive, output: &Path) -> RecompressResult<RunStats> {
        let listfile = source.listfile(self.config.listfile.as_deref())?;
        source.check_listfile(&listfile)?;

        let paths: Vec<String> = listfile
            .paths()
            .filter(|path| *path != ATTRIBUTES_NAME)
            .map(str::to_string)
            .collect();
        let table = ArchiveTable::with_capacity(source.table().block_count().max(paths.len()));

        let cache = if self.config.use_cache {
            Some(ResultCache::open(self.config.cache_config())?)
        } else {
            None
        };

        let mut writer = BufWriter::new(File::create(output)?);
        writer.write_all(source.prefix())?;
        writer.write_all(&[0u8; HEADER_SIZE])?;
        let header_offset = source.prefix().len() as u64;
        let state = OutputState {
            writer,
            cursor: header_offset + HEADER_SIZE as u64,
            header_offset,
            table,
            stats: RunStats::default(),
        };

        info!(
            "Recompressing {} files with {} workers",
            paths.len(),
            self.config.threads
        );
        let context = Arc::new(BuildContext::new(
            &self.runtime,
            &self.config,
            source,
            cache,
            paths,
            state,
        )?);

        self.run_workers(&context)?;
        let stats = self.finish(&context)?;

        info!(
            "Wrote {} files: {} -> {} bytes ({:.1}%), {} from cache",
            stats.files,
            stats.bytes_in,
            stats.bytes_out,
            stats.ratio(),
            stats.cache_hits
        );
        Ok(stats)
    }

    /// Spawn `threads - 1` workers, work on the calling thread, join all
    fn run_workers(&self, context: &Arc<BuildContext<R>>) -> RecompressResult<()> {
        let mut handles = Vec::with_capacity(self.config.threads.saturating_sub(1));
        for worker in 1..self.config.threads {
            let shared = Arc::clone(context);
            match self
                .runtime
                .spawn(format!("mpq-worker-{worker}"), move || shared.work(worker))
            {
                Ok(handle) => handles.push((worker, handle)),
                Err(e) => {
                    context.record_failure(e.into());
                    break;
                }
            }
        }

        context.work(0);

        for (worker, handle) in handles {
            if !self.runtime.join(handle) {
                context.record_failure(RecompressError::WorkerPanicked(worker));
            }
        }
        debug!("All workers joined");

        match context.take_failure() {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Append both tables and fill in the reserved header
    fn finish(&self, context: &BuildContext<R>) -> RecompressResult<RunStats> {
        let mut guard = context.output.acquire();
        let out = &mut *guard;

        let hash_table = out.table.hash_table_bytes()?;
        let block_table = out.table.block_table_bytes()?;

        let mut header = ArchiveHeader::new(self.config.shift);
        header.hash_table_pos = out.relative_cursor()?;
        header.block_table_pos = to_u32(u64::from(header.hash_table_pos) + hash_table.len() as u64)?;
        header.archive_size = to_u32(u64::from(header.block_table_pos) + block_table.len() as u64)?;
        header.hash_table_count = to_u32(out.table.hash_table_size() as u64)?;
        header.block_table_count = to_u32(out.table.block_count() as u64)?;

        out.writer.write_all(&hash_table)?;
        out.writer.write_all(&block_table)?;
        out.cursor += (hash_table.len() + block_table.len()) as u64;

        out.writer.seek(SeekFrom::Start(out.header_offset))?;
        out.writer.write_all(&header.to_bytes()?)?;
        out.writer.flush()?;
        out.writer.get_ref().sync_all()?;

        debug!(
            "Header at 0x{:x}: {} hash slots, {} blocks, archive size {}",
            out.header_offset,
            header.hash_table_count,
            header.block_table_count,
            header.archive_size
        );
        Ok(out.stats)
    }
}

fn to_u32(value: u64) -> RecompressResult<u32> {
    u32::try_from(value).map_err(|_| RecompressError::ArchiveTooLarge(value))
}
