//! Error types for recompression runs

use mopaq_cache::CacheError;
use mopaq_formats::{ArchiveError, ListfileError, SectorError};
use thiserror::Error;

/// Errors that abort a recompression run
#[derive(Debug, Error)]
pub enum RecompressError {
    /// Configuration rejected by validation
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Configuration file is not valid TOML for [`crate::RecompressConfig`]
    #[error("Failed to parse configuration: {0}")]
    ConfigParse(#[from] toml::de::Error),

    /// Source archive could not be located or its tables parsed
    #[error("Archive error: {0}")]
    Archive(#[from] ArchiveError),

    /// Packing a file failed
    #[error("Sector error: {0}")]
    Sector(#[from] SectorError),

    /// External listfile could not be read
    #[error("Listfile error: {0}")]
    Listfile(#[from] ListfileError),

    /// Result cache could not be opened
    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),

    /// I/O error on the source or output archive
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Some hash-table slots are not named by any known path
    #[error("Listfile is insufficient: {missing} archive entries have no known name")]
    InsufficientListfile {
        /// Number of unnamed slots
        missing: usize,
    },

    /// A listed path has no block-table entry
    #[error("'{path}' is not present in the source archive")]
    MissingEntry {
        /// Archive path
        path: String,
    },

    /// A file could not be extracted from the source archive
    #[error("Failed to extract '{path}': {source}")]
    Extract {
        /// Archive path
        path: String,
        /// Underlying failure
        #[source]
        source: SectorError,
    },

    /// Output grew past the 32-bit offsets of the format
    #[error("Output archive too large: {0} bytes")]
    ArchiveTooLarge(u64),

    /// A worker thread panicked
    #[error("Worker {0} panicked")]
    WorkerPanicked(usize),
}

/// Result type for recompression
pub type RecompressResult<T> = Result<T, RecompressError>;
