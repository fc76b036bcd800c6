//! Sector extraction and packing errors

use crate::archive::BlockFlags;
use crate::codec::CodecError;
use thiserror::Error;

/// Errors raised while turning stored payloads into file contents and back
#[derive(Debug, Error)]
pub enum SectorError {
    /// Flag combination this reader does not handle
    #[error("unsupported storage layout: {0}")]
    UnsupportedLayout(BlockFlags),

    /// Stored payload lies outside the archive image
    #[error("stored range {start}..{end} exceeds image of {available} bytes")]
    OutOfBounds {
        /// First byte of the payload
        start: u64,
        /// One past the last byte
        end: u64,
        /// Image length
        available: u64,
    },

    /// Sector-offset table is short, unordered or points past the payload
    #[error("corrupt sector table: {0}")]
    CorruptSectorTable(String),

    /// A sector did not decode to its expected length
    #[error("sector {sector} decoded to {actual} bytes, expected {expected}")]
    SectorSizeMismatch {
        /// Sector index
        sector: usize,
        /// Expected length
        expected: usize,
        /// Produced length
        actual: usize,
    },

    /// The codec chain rejected a sector
    #[error("sector {sector}: {source}")]
    Codec {
        /// Sector index
        sector: usize,
        /// Underlying codec failure
        #[source]
        source: CodecError,
    },

    /// Re-encoding a sector failed
    #[error("encoding failed: {0}")]
    Encode(#[source] CodecError),

    /// Packed output exceeds 32-bit offsets
    #[error("file of {0} bytes is too large to pack")]
    FileTooLarge(usize),
}

/// Result type for sector operations
pub type SectorResult<T> = Result<T, SectorError>;
