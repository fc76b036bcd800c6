//! Sector payload codecs
//!
//! A compressed sector starts with a mask byte naming the codecs that
//! produced it. Decoding unwinds them in a fixed order no matter how the
//! bits are arranged: zlib, explode, ADPCM mono, ADPCM stereo, Huffman.
//! Every stage is bounded by the sector's expected length.
//!
//! Encoding always produces a single zlib stream, searched for with zopfli.
//! A sector whose compressed form does not beat the raw bytes by more than
//! the two-byte margin is stored raw, without a mask byte; readers tell the
//! two apart by comparing the stored length with the expected length.
//!
//! ```
//! use mopaq_formats::codec::{SectorEncoder, decode};
//!
//! let sector = b"repetitive data ".repeat(64);
//! let encoder = SectorEncoder::new(5, 15);
//! let stored = encoder.encode(&sector).expect("compression");
//! assert!(stored.len() < sector.len());
//!
//! let restored = decode(&stored, sector.len()).expect("decode");
//! assert_eq!(restored, sector);
//! ```

pub mod adpcm;
mod bits;
pub mod deflate;
pub mod error;
pub mod explode;
pub mod huffman;

pub use error::{CodecError, CodecResult};

use std::borrow::Cow;
use std::fmt;
use std::num::NonZeroU64;

/// A codec that can appear in a sector's compression mask
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Codec {
    /// zlib stream
    Deflate,
    /// PKWARE DCL explode
    Explode,
    /// IMA ADPCM, one channel
    AdpcmMono,
    /// IMA ADPCM, two channels
    AdpcmStereo,
    /// Adaptive Huffman
    Huffman,
}

impl Codec {
    /// Bit of this codec in the compression mask
    pub const fn mask(self) -> u8 {
        match self {
            Self::Huffman => 0x01,
            Self::Deflate => 0x02,
            Self::Explode => 0x08,
            Self::AdpcmMono => 0x40,
            Self::AdpcmStereo => 0x80,
        }
    }

    /// Short lowercase name
    pub const fn name(self) -> &'static str {
        match self {
            Self::Deflate => "zlib",
            Self::Explode => "explode",
            Self::AdpcmMono => "adpcm-mono",
            Self::AdpcmStereo => "adpcm-stereo",
            Self::Huffman => "huffman",
        }
    }
}

impl fmt::Display for Codec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Order in which mask bits are unwound
pub const DECODE_ORDER: [Codec; 5] = [
    Codec::Deflate,
    Codec::Explode,
    Codec::AdpcmMono,
    Codec::AdpcmStereo,
    Codec::Huffman,
];

/// Union of every supported mask bit
pub const SUPPORTED_MASK: u8 = 0x01 | 0x02 | 0x08 | 0x40 | 0x80;

/// Mask byte written in front of zlib-compressed sectors
pub const DEFLATE_MARKER: u8 = 0x02;

/// Decode a masked sector payload into at most `expected_len` bytes
///
/// `payload` includes the leading mask byte.
pub fn decode(payload: &[u8], expected_len: usize) -> CodecResult<Vec<u8>> {
    let Some((&mask, body)) = payload.split_first() else {
        return Err(CodecError::EmptyPayload);
    };
    if mask & !SUPPORTED_MASK != 0 {
        return Err(CodecError::UnsupportedMask(mask));
    }

    let mut data = Cow::Borrowed(body);
    for codec in DECODE_ORDER {
        if mask & codec.mask() == 0 {
            continue;
        }
        let decoded = decode_stage(codec, &data, expected_len)?;
        data = Cow::Owned(decoded);
    }

    Ok(data.into_owned())
}

fn decode_stage(codec: Codec, data: &[u8], limit: usize) -> CodecResult<Vec<u8>> {
    match codec {
        Codec::Deflate => deflate::inflate(data, limit),
        Codec::Explode => explode::explode(data, limit),
        Codec::AdpcmMono => adpcm::decode(data, adpcm::Channels::Mono, limit),
        Codec::AdpcmStereo => adpcm::decode(data, adpcm::Channels::Stereo, limit),
        Codec::Huffman => huffman::decode(data, limit),
    }
}

/// Default zopfli iterations per sector
pub const DEFAULT_ITERATIONS: u64 = 15;

/// Default cap on zopfli block splits per sector
pub const DEFAULT_BLOCK_SPLITTING_MAX: u16 = 15;

/// zopfli-backed sector compressor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SectorEncoder {
    iterations: NonZeroU64,
    block_splitting_max: u16,
}

impl SectorEncoder {
    /// Encoder running `iterations` zopfli passes (at least one) with at
    /// most `block_splitting_max` block splits
    pub fn new(iterations: u64, block_splitting_max: u16) -> Self {
        Self {
            iterations: NonZeroU64::new(iterations).unwrap_or(NonZeroU64::MIN),
            block_splitting_max,
        }
    }

    /// zopfli iterations per sector
    pub fn iterations(&self) -> u64 {
        self.iterations.get()
    }

    /// Block split cap
    pub fn block_splitting_max(&self) -> u16 {
        self.block_splitting_max
    }

    /// Encode one sector, returning either `[0x02, zlib...]` or the raw bytes
    pub fn encode(&self, sector: &[u8]) -> CodecResult<Vec<u8>> {
        let compressed = deflate::deflate(sector, self.iterations, self.block_splitting_max)?;
        if compressed.len() + 2 < sector.len() {
            let mut out = Vec::with_capacity(compressed.len() + 1);
            out.push(DEFLATE_MARKER);
            out.extend_from_slice(&compressed);
            Ok(out)
        } else {
            Ok(sector.to_vec())
        }
    }
}

impl Default for SectorEncoder {
    fn default() -> Self {
        Self::new(DEFAULT_ITERATIONS, DEFAULT_BLOCK_SPLITTING_MAX)
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_compressible_roundtrip() {
        let sector = b"0123456789abcdef".repeat(256);
        let stored = SectorEncoder::default()
            .encode(&sector)
            .expect("Test operation should succeed");

        assert_eq!(stored[0], DEFLATE_MARKER);
        assert!(stored.len() < sector.len());
        assert_eq!(
            decode(&stored, sector.len()).expect("Test operation should succeed"),
            sector
        );
    }

    #[test]
    fn test_encode_incompressible_stays_raw() {
        // xorshift noise does not compress
        let mut state = 0x2545_F491_u32;
        let sector: Vec<u8> = (0..4096)
            .map(|_| {
                state ^= state << 13;
                state ^= state >> 17;
                state ^= state << 5;
                state as u8
            })
            .collect();

        let stored = SectorEncoder::new(1, 15)
            .encode(&sector)
            .expect("Test operation should succeed");
        assert_eq!(stored, sector);
    }

    #[test]
    fn test_tiny_sector_stays_raw() {
        let stored = SectorEncoder::default()
            .encode(b"ab")
            .expect("Test operation should succeed");
        assert_eq!(stored, b"ab");
    }

    #[test]
    fn test_unsupported_mask() {
        let err = decode(&[0x10, 0x00], 16).expect_err("Should reject mask");
        assert!(matches!(err, CodecError::UnsupportedMask(0x10)));
    }

    #[test]
    fn test_empty_payload() {
        assert!(matches!(decode(&[], 16), Err(CodecError::EmptyPayload)));
    }

    #[test]
    fn test_chain_order_zlib_then_explode() {
        // zlib wraps an explode stream; mask 0x0A unwinds zlib first
        let exploded = [0x00, 0x04, 0xC2, 0x88, 0x19, 0xAB, 0x4B, 0xC0, 0x3F];
        let wrapped = deflate::deflate(&exploded, NonZeroU64::MIN, 15)
            .expect("Test operation should succeed");

        let mut payload = vec![0x0A];
        payload.extend_from_slice(&wrapped);
        let out = decode(&payload, 9).expect("Test operation should succeed");
        assert_eq!(out, b"abcabcabc");
    }

    #[test]
    fn test_failing_stage_is_named() {
        let err = decode(&[0x08, 0x05, 0x04], 16).expect_err("Should fail");
        assert_eq!(err.codec(), Some(Codec::Explode));
    }

    #[test]
    fn test_zero_iterations_run_once() {
        let encoder = SectorEncoder::new(0, 3);
        assert_eq!(encoder.iterations(), 1);
        assert_eq!(encoder.block_splitting_max(), 3);

        let sector = b"abcabcabc".repeat(100);
        let stored = encoder.encode(&sector).expect("Test operation should succeed");
        assert_eq!(stored[0], DEFLATE_MARKER);
        assert_eq!(
            decode(&stored, sector.len()).expect("Test operation should succeed"),
            sector
        );
    }

    #[test]
    fn test_default_matches_cli_defaults() {
        let encoder = SectorEncoder::default();
        assert_eq!(encoder.iterations(), 15);
        assert_eq!(encoder.block_splitting_max(), 15);
    }
}
