//! Codec error types

use super::Codec;
use thiserror::Error;

/// Errors raised while decoding or encoding sector payloads
#[derive(Debug, Error)]
pub enum CodecError {
    /// Compressed payload without even a mask byte
    #[error("empty compressed payload")]
    EmptyPayload,

    /// Mask carries bits outside the supported codec set
    #[error("unsupported compression mask: 0x{0:02X}")]
    UnsupportedMask(u8),

    /// A stage of the decode chain rejected its input
    #[error("{codec} decode failed: {reason}")]
    Decode {
        /// Failing stage
        codec: Codec,
        /// What went wrong
        reason: String,
    },

    /// A stage produced more output than the sector can hold
    #[error("{codec} output exceeds {limit} bytes")]
    OutputLimit {
        /// Failing stage
        codec: Codec,
        /// Expected decompressed length
        limit: usize,
    },

    /// Compression failed
    #[error("compression failed: {0}")]
    Encode(#[from] std::io::Error),
}

impl CodecError {
    pub(crate) fn decode(codec: Codec, reason: impl Into<String>) -> Self {
        Self::Decode {
            codec,
            reason: reason.into(),
        }
    }

    /// The codec stage that failed, if the error came from one
    pub fn codec(&self) -> Option<Codec> {
        match self {
            Self::Decode { codec, .. } | Self::OutputLimit { codec, .. } => Some(*codec),
            _ => None,
        }
    }
}

/// Result type for codec operations
pub type CodecResult<T> = Result<T, CodecError>;
