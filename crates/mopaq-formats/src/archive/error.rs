//! Error types for archive operations

use thiserror::Error;

/// Archive operation result type
pub type ArchiveResult<T> = Result<T, ArchiveError>;

/// Errors raised while locating, parsing or building archive tables
#[derive(Debug, Error)]
pub enum ArchiveError {
    /// No header magic at any 512-byte aligned offset
    #[error("Archive header not found")]
    HeaderNotFound,

    /// A table region extends past the end of the archive image
    #[error("Truncated {table}: needs bytes {start}..{end}, image has {available}")]
    Truncated {
        /// Which region was being read
        table: &'static str,
        /// First byte of the region
        start: u64,
        /// One past the last byte of the region
        end: u64,
        /// Length of the archive image
        available: u64,
    },

    /// Sector size exponent out of range
    #[error("Invalid sector shift: {0}")]
    InvalidSectorShift(u16),

    /// Every hash-table slot is occupied
    #[error("Hash table full while inserting '{path}'")]
    HashTableFull {
        /// Path that could not be placed
        path: String,
    },

    /// Block table would exceed the 32-bit index space
    #[error("Block table full: {0} entries")]
    BlockTableFull(usize),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Binary parsing error
    #[error("Binary format error: {0}")]
    BinRead(#[from] binrw::Error),
}
