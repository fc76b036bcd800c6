//! Multi-threaded recompression of MPQ archives
//!
//! Every named file of a source archive is extracted, whatever codec chain
//! produced it, and re-packed as zopfli-compressed zlib sectors into a new
//! archive with the same hashing and table encryption, so existing readers
//! keep working.
//!
//! # Components
//!
//! - **Source**: memory-mapped source archive, listfile assembly and checks
//! - **Runtime**: spawn/join/lock capabilities behind [`ThreadRuntime`]
//! - **Queue**: the static work queue drained by the workers
//! - **Pipeline**: [`Recompressor`], worker pool and output finalization
//! - **Cache**: optional [`mopaq_cache::ResultCache`] reuse across runs
//!
//! Compression runs in parallel; only the append to the output and the
//! table insert are serialized behind one lock. File order in the output is
//! therefore not deterministic, but every file is reachable by its path.

#![warn(missing_docs)]

pub mod config;
mod context;
pub mod error;
pub mod pipeline;
pub mod queue;
pub mod runtime;
pub mod source;

pub use config::RecompressConfig;
pub use context::RunStats;
pub use error::{RecompressError, RecompressResult};
pub use pipeline::Recompressor;
pub use queue::{WorkItem, WorkQueue};
pub use runtime::{OsThreads, RuntimeLock, ThreadRuntime};
pub use source::SourceArchive;
