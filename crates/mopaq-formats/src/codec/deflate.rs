//! zlib stage of the decode chain and the sector compressor
//!
//! Decoding goes through `flate2`. Encoding uses zopfli, which spends
//! iterations searching for a smaller deflate stream that any zlib reader
//! accepts.

use super::Codec;
use super::error::{CodecError, CodecResult};
use flate2::read::ZlibDecoder;
use std::io::Read;
use std::num::NonZeroU64;
use zopfli::{Format, Options};

/// Inflate a zlib stream, refusing to produce more than `limit` bytes
pub fn inflate(data: &[u8], limit: usize) -> CodecResult<Vec<u8>> {
    let mut decoder = ZlibDecoder::new(data);
    let mut decompressed = Vec::with_capacity(limit);

    // Read in chunks to enforce size limit
    let mut buffer = [0u8; 8192];
    loop {
        let bytes_read = decoder
            .read(&mut buffer)
            .map_err(|e| CodecError::decode(Codec::Deflate, e.to_string()))?;

        if bytes_read == 0 {
            break;
        }

        if decompressed.len() + bytes_read > limit {
            return Err(CodecError::OutputLimit {
                codec: Codec::Deflate,
                limit,
            });
        }

        decompressed.extend_from_slice(&buffer[..bytes_read]);
    }

    Ok(decompressed)
}

/// Deflate `data` into a zlib container with zopfli
///
/// `block_splitting_max` of zero lets zopfli split as often as it likes.
pub fn deflate(
    data: &[u8],
    iterations: NonZeroU64,
    block_splitting_max: u16,
) -> CodecResult<Vec<u8>> {
    let options = Options {
        iteration_count: iterations,
        maximum_block_splits: block_splitting_max,
        ..Options::default()
    };

    let mut compressed = Vec::with_capacity(data.len() / 2 + 16);
    zopfli::compress(options, Format::Zlib, data, &mut compressed)?;
    Ok(compressed)
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use flate2::Compression;
    use flate2::write::ZlibEncoder;
    use std::io::Write;

    const FIFTEEN: NonZeroU64 = NonZeroU64::new(15).unwrap();

    #[test]
    fn test_roundtrip() {
        let data = b"the quick brown fox jumps over the lazy dog ".repeat(20);
        let compressed = deflate(&data, FIFTEEN, 15).expect("Test operation should succeed");
        assert!(compressed.len() < data.len());

        let restored = inflate(&compressed, data.len()).expect("Test operation should succeed");
        assert_eq!(restored, data);
    }

    #[test]
    fn test_not_larger_than_zlib_best() {
        let data: Vec<u8> = (0..4096u32)
            .map(|i| b"abcdefgh"[(i * i % 7) as usize] ^ (i / 512) as u8)
            .collect();

        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::best());
        encoder.write_all(&data).expect("Test operation should succeed");
        let zlib = encoder.finish().expect("Test operation should succeed");

        let zopfli = deflate(&data, FIFTEEN, 15).expect("Test operation should succeed");
        assert!(zopfli.len() <= zlib.len(), "{} > {}", zopfli.len(), zlib.len());
        assert_eq!(
            inflate(&zopfli, data.len()).expect("Test operation should succeed"),
            data
        );
    }

    #[test]
    fn test_limit_enforced() {
        let data = vec![0u8; 4096];
        let compressed =
            deflate(&data, NonZeroU64::MIN, 15).expect("Test operation should succeed");

        let err = inflate(&compressed, 100).expect_err("Should exceed limit");
        assert!(matches!(
            err,
            CodecError::OutputLimit {
                codec: Codec::Deflate,
                limit: 100
            }
        ));
    }

    #[test]
    fn test_garbage_rejected() {
        let err = inflate(&[0x12, 0x34, 0x56], 64).expect_err("Should fail on garbage");
        assert_eq!(err.codec(), Some(Codec::Deflate));
    }
}
