//! Stored payload layouts
//!
//! A block-table entry's flags select one of four layouts for the bytes it
//! points at: a single unit or fixed-size sectors, each either stored raw or
//! run through the codec chain. Sectorized compressed files carry a leading
//! table of cumulative sector offsets. Encryption, when present, keys each
//! sector with the file key plus the sector index, and the offset table with
//! the file key minus one.

pub mod error;
pub mod writer;

pub use error::{SectorError, SectorResult};
pub use writer::{PackedFile, pack_file};

use crate::archive::{BlockFlags, BlockTableEntry};
use crate::codec;
use mopaq_crypto::{KeyAdjustment, decrypt_block, file_key, sector_key, sector_table_key};

/// How a file's stored bytes are arranged
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SectorLayout {
    /// Whole file stored verbatim
    SingleUnitRaw,
    /// Fixed-size sectors stored verbatim
    SectorsRaw {
        /// Sector size in bytes
        sector_size: usize,
    },
    /// Whole file as one masked codec payload
    SingleUnitCompressed,
    /// Offset table followed by one payload per sector
    SectorsCompressed {
        /// Sector size in bytes
        sector_size: usize,
    },
}

impl SectorLayout {
    /// Layout for `flags` in an archive with `sector_size` byte sectors
    pub fn select(flags: BlockFlags, sector_size: usize) -> SectorResult<Self> {
        if !flags.contains(BlockFlags::EXISTS) || flags.contains(BlockFlags::IMPLODE) {
            return Err(SectorError::UnsupportedLayout(flags));
        }

        let single_unit = flags.contains(BlockFlags::SINGLE_UNIT);
        let compressed = flags.contains(BlockFlags::COMPRESSED);
        Ok(match (single_unit, compressed) {
            (true, false) => Self::SingleUnitRaw,
            (false, false) => Self::SectorsRaw { sector_size },
            (true, true) => Self::SingleUnitCompressed,
            (false, true) => Self::SectorsCompressed { sector_size },
        })
    }
}

/// Number of sectors holding `len` bytes
#[inline]
pub fn sector_count(len: usize, sector_size: usize) -> usize {
    len.div_ceil(sector_size)
}

/// Stored bytes of `entry` within an image whose header sits at `header_offset`
pub fn stored_range<'a>(
    image: &'a [u8],
    header_offset: usize,
    entry: &BlockTableEntry,
) -> SectorResult<&'a [u8]> {
    let start = header_offset as u64 + u64::from(entry.file_pos);
    let end = start + u64::from(entry.compressed_size);
    let available = image.len() as u64;
    if end > available {
        return Err(SectorError::OutOfBounds {
            start,
            end,
            available,
        });
    }
    Ok(&image[start as usize..end as usize])
}

/// Base key of an encrypted file, `None` when the file is not encrypted
fn base_key(path: &str, entry: &BlockTableEntry) -> Option<u32> {
    if !entry.flags.contains(BlockFlags::ENCRYPTED) {
        return None;
    }
    let adjust = entry
        .flags
        .contains(BlockFlags::KEY_ADJUSTED)
        .then_some(KeyAdjustment {
            file_pos: entry.file_pos,
            normal_size: entry.normal_size,
        });
    Some(file_key(path, adjust))
}

/// Recover the original contents of `path` from its stored bytes
pub fn extract_file(
    path: &str,
    stored: &[u8],
    entry: &BlockTableEntry,
    sector_size: usize,
) -> SectorResult<Vec<u8>> {
    let layout = SectorLayout::select(entry.flags, sector_size)?;
    let normal_size = entry.normal_size as usize;
    if normal_size == 0 {
        return Ok(Vec::new());
    }
    let key = base_key(path, entry);

    match layout {
        SectorLayout::SingleUnitRaw => {
            let mut data = take(stored, normal_size, 0)?.to_vec();
            if let Some(key) = key {
                decrypt_block(&mut data, key);
            }
            Ok(data)
        }
        SectorLayout::SectorsRaw { sector_size } => {
            let raw = take(stored, normal_size, 0)?;
            let mut out = Vec::with_capacity(normal_size);
            for (index, chunk) in raw.chunks(sector_size).enumerate() {
                let start = out.len();
                out.extend_from_slice(chunk);
                if let Some(key) = key {
                    decrypt_block(&mut out[start..], sector_key(key, index as u32));
                }
            }
            Ok(out)
        }
        SectorLayout::SingleUnitCompressed => {
            let mut data = stored.to_vec();
            if let Some(key) = key {
                decrypt_block(&mut data, key);
            }
            if data.len() == normal_size {
                return Ok(data);
            }
            decode_sector(&data, normal_size, 0)
        }
        SectorLayout::SectorsCompressed { sector_size } => {
            extract_sectors(stored, normal_size, sector_size, key)
        }
    }
}

fn take(stored: &[u8], len: usize, sector: usize) -> SectorResult<&[u8]> {
    stored.get(..len).ok_or(SectorError::SectorSizeMismatch {
        sector,
        expected: len,
        actual: stored.len(),
    })
}

fn decode_sector(payload: &[u8], expected: usize, sector: usize) -> SectorResult<Vec<u8>> {
    let decoded =
        codec::decode(payload, expected).map_err(|source| SectorError::Codec { sector, source })?;
    if decoded.len() != expected {
        return Err(SectorError::SectorSizeMismatch {
            sector,
            expected,
            actual: decoded.len(),
        });
    }
    Ok(decoded)
}

/// Read and validate the cumulative offset table of a sectorized file
fn read_offsets(stored: &[u8], count: usize, key: Option<u32>) -> SectorResult<Vec<usize>> {
    let table_len = (count + 1) * 4;
    let Some(table) = stored.get(..table_len) else {
        return Err(SectorError::CorruptSectorTable(format!(
            "{count} sectors need a {table_len}-byte table, payload has {} bytes",
            stored.len()
        )));
    };

    let mut table = table.to_vec();
    if let Some(key) = key {
        decrypt_block(&mut table, sector_table_key(key));
    }

    let offsets: Vec<usize> = table
        .chunks_exact(4)
        .map(|word| u32::from_le_bytes([word[0], word[1], word[2], word[3]]) as usize)
        .collect();

    for (index, pair) in offsets.windows(2).enumerate() {
        if pair[0] > pair[1] {
            return Err(SectorError::CorruptSectorTable(format!(
                "offset {index} ({}) is past offset {} ({})",
                pair[0],
                index + 1,
                pair[1]
            )));
        }
    }
    if let Some(&end) = offsets.last()
        && end > stored.len()
    {
        return Err(SectorError::CorruptSectorTable(format!(
            "final offset {end} exceeds payload of {} bytes",
            stored.len()
        )));
    }

    Ok(offsets)
}

fn extract_sectors(
    stored: &[u8],
    normal_size: usize,
    sector_size: usize,
    key: Option<u32>,
) -> SectorResult<Vec<u8>> {
    let count = sector_count(normal_size, sector_size);
    let offsets = read_offsets(stored, count, key)?;

    let mut out = Vec::with_capacity(normal_size);
    for (index, bounds) in offsets.windows(2).enumerate() {
        let expected = (normal_size - index * sector_size).min(sector_size);

        let mut payload = stored[bounds[0]..bounds[1]].to_vec();
        if let Some(key) = key {
            decrypt_block(&mut payload, sector_key(key, index as u32));
        }

        if payload.len() == expected {
            out.extend_from_slice(&payload);
        } else {
            out.extend_from_slice(&decode_sector(&payload, expected, index)?);
        }
    }

    Ok(out)
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::codec::SectorEncoder;
    use mopaq_crypto::encrypt_block;
    use pretty_assertions::assert_eq;

    const SECTOR: usize = 512;

    fn sample(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i % 7) as u8 * 31 + (i / 97) as u8).collect()
    }

    fn entry(flags: u32, compressed_size: usize, normal_size: usize) -> BlockTableEntry {
        BlockTableEntry {
            file_pos: 0x20,
            compressed_size: compressed_size as u32,
            normal_size: normal_size as u32,
            flags: BlockFlags::new(flags | BlockFlags::EXISTS),
        }
    }

    /// Encrypt a packed sectorized payload in place the way a writer would
    fn encrypt_packed(bytes: &mut [u8], count: usize, key: u32) {
        let table_len = (count + 1) * 4;
        let offsets: Vec<usize> = bytes[..table_len]
            .chunks_exact(4)
            .map(|w| u32::from_le_bytes([w[0], w[1], w[2], w[3]]) as usize)
            .collect();
        for (index, bounds) in offsets.windows(2).enumerate() {
            encrypt_block(&mut bytes[bounds[0]..bounds[1]], sector_key(key, index as u32));
        }
        encrypt_block(&mut bytes[..table_len], sector_table_key(key));
    }

    #[test]
    fn test_layout_selection() {
        let flags = |f: u32| BlockFlags::new(f | BlockFlags::EXISTS);
        assert_eq!(
            SectorLayout::select(flags(BlockFlags::SINGLE_UNIT), SECTOR).unwrap(),
            SectorLayout::SingleUnitRaw
        );
        assert_eq!(
            SectorLayout::select(flags(0), SECTOR).unwrap(),
            SectorLayout::SectorsRaw {
                sector_size: SECTOR
            }
        );
        assert_eq!(
            SectorLayout::select(flags(BlockFlags::SINGLE_UNIT | BlockFlags::COMPRESSED), SECTOR)
                .unwrap(),
            SectorLayout::SingleUnitCompressed
        );
        assert_eq!(
            SectorLayout::select(flags(BlockFlags::COMPRESSED), SECTOR).unwrap(),
            SectorLayout::SectorsCompressed {
                sector_size: SECTOR
            }
        );
    }

    #[test]
    fn test_unsupported_layouts() {
        let missing = BlockFlags::new(BlockFlags::COMPRESSED);
        assert!(matches!(
            SectorLayout::select(missing, SECTOR),
            Err(SectorError::UnsupportedLayout(_))
        ));
        let imploded = BlockFlags::new(BlockFlags::IMPLODE | BlockFlags::EXISTS);
        assert!(matches!(
            SectorLayout::select(imploded, SECTOR),
            Err(SectorError::UnsupportedLayout(_))
        ));
    }

    #[test]
    fn test_sector_count() {
        assert_eq!(sector_count(0, SECTOR), 0);
        assert_eq!(sector_count(3 * SECTOR, SECTOR), 3);
        assert_eq!(sector_count(3 * SECTOR + 1, SECTOR), 4);
    }

    #[test]
    fn test_single_unit_raw_encrypted() {
        let data = sample(100);
        let mut stored = data.clone();
        let key = file_key("dir\\plain.bin", None);
        encrypt_block(&mut stored, key);

        let entry = entry(BlockFlags::SINGLE_UNIT | BlockFlags::ENCRYPTED, 100, 100);
        let out = extract_file("dir\\plain.bin", &stored, &entry, SECTOR)
            .expect("Test operation should succeed");
        assert_eq!(out, data);
    }

    #[test]
    fn test_sectors_raw_with_partial_tail() {
        let data = sample(2 * SECTOR + 77);
        let key = file_key("raw.bin", None);
        let mut stored = data.clone();
        for (index, chunk) in stored.chunks_mut(SECTOR).enumerate() {
            encrypt_block(chunk, sector_key(key, index as u32));
        }

        let entry = entry(BlockFlags::ENCRYPTED, data.len(), data.len());
        let out =
            extract_file("raw.bin", &stored, &entry, SECTOR).expect("Test operation should succeed");
        assert_eq!(out, data);
    }

    #[test]
    fn test_single_unit_compressed() {
        let data = sample(3000);
        let stored = SectorEncoder::default()
            .encode(&data)
            .expect("Test operation should succeed");
        assert_eq!(stored[0], codec::DEFLATE_MARKER);

        let entry = entry(
            BlockFlags::SINGLE_UNIT | BlockFlags::COMPRESSED,
            stored.len(),
            data.len(),
        );
        let out = extract_file("unit.bin", &stored, &entry, SECTOR)
            .expect("Test operation should succeed");
        assert_eq!(out, data);
    }

    #[test]
    fn test_single_unit_compressed_equal_sizes_is_raw() {
        let data = sample(64);
        let entry = entry(BlockFlags::SINGLE_UNIT | BlockFlags::COMPRESSED, 64, 64);
        let out =
            extract_file("unit.bin", &data, &entry, SECTOR).expect("Test operation should succeed");
        assert_eq!(out, data);
    }

    #[test]
    fn test_sectors_compressed_roundtrip_with_key_adjustment() {
        let data = sample(5 * SECTOR + 13);
        let packed = pack_file(&data, SECTOR, &SectorEncoder::new(2, 15))
            .expect("Test operation should succeed");
        let mut stored = packed.bytes.clone();

        let entry = entry(
            BlockFlags::COMPRESSED | BlockFlags::ENCRYPTED | BlockFlags::KEY_ADJUSTED,
            stored.len(),
            data.len(),
        );
        let key = file_key(
            "sound\\intro.wav",
            Some(KeyAdjustment {
                file_pos: entry.file_pos,
                normal_size: entry.normal_size,
            }),
        );
        encrypt_packed(&mut stored, sector_count(data.len(), SECTOR), key);

        let out = extract_file("sound\\intro.wav", &stored, &entry, SECTOR)
            .expect("Test operation should succeed");
        assert_eq!(out, data);
    }

    #[test]
    fn test_corrupt_offsets() {
        let data = sample(2 * SECTOR);
        let mut stored = pack_file(&data, SECTOR, &SectorEncoder::default())
            .expect("Test operation should succeed")
            .bytes;
        // Final offset past the payload
        let bogus = (stored.len() as u32 + 1).to_le_bytes();
        stored[8..12].copy_from_slice(&bogus);

        let entry = entry(BlockFlags::COMPRESSED, stored.len(), data.len());
        let err = extract_file("x", &stored, &entry, SECTOR).expect_err("Should reject table");
        assert!(matches!(err, SectorError::CorruptSectorTable(_)));

        let short = entry;
        let err = extract_file("x", &stored[..6], &short, SECTOR).expect_err("Should reject table");
        assert!(matches!(err, SectorError::CorruptSectorTable(_)));
    }

    #[test]
    fn test_size_mismatch() {
        // One sector whose zlib payload decodes to fewer bytes than promised
        let short = SectorEncoder::default()
            .encode(&[0u8; 200])
            .expect("Test operation should succeed");
        let mut stored = vec![0u8; 8];
        stored[0..4].copy_from_slice(&8u32.to_le_bytes());
        stored[4..8].copy_from_slice(&(8 + short.len() as u32).to_le_bytes());
        stored.extend_from_slice(&short);

        let entry = entry(BlockFlags::COMPRESSED, stored.len(), 300);
        let err = extract_file("x", &stored, &entry, SECTOR).expect_err("Should mismatch");
        assert!(matches!(
            err,
            SectorError::SectorSizeMismatch {
                sector: 0,
                expected: 300,
                actual: 200
            }
        ));
    }

    #[test]
    fn test_codec_failure_names_sector() {
        let mut stored = vec![0u8; 12];
        stored[0..4].copy_from_slice(&12u32.to_le_bytes());
        stored[4..8].copy_from_slice(&(12 + SECTOR as u32).to_le_bytes());
        stored[8..12].copy_from_slice(&(14 + SECTOR as u32).to_le_bytes());
        stored.extend(std::iter::repeat_n(0xAA, SECTOR));
        stored.extend_from_slice(&[0x10, 0x00]);

        let entry = entry(BlockFlags::COMPRESSED, stored.len(), SECTOR + 40);
        let err = extract_file("x", &stored, &entry, SECTOR).expect_err("Should fail");
        assert!(matches!(err, SectorError::Codec { sector: 1, .. }));
    }

    #[test]
    fn test_stored_range_bounds() {
        let image = vec![0u8; 0x100];
        let ok = entry(0, 0x10, 0x10);
        assert_eq!(stored_range(&image, 0x40, &ok).unwrap().len(), 0x10);

        let past = entry(0, 0x100, 0x100);
        assert!(matches!(
            stored_range(&image, 0x40, &past),
            Err(SectorError::OutOfBounds { .. })
        ));
    }

    #[test]
    fn test_empty_file() {
        let entry = entry(BlockFlags::COMPRESSED, 0, 0);
        let out = extract_file("empty", &[], &entry, SECTOR).expect("Test operation should succeed");
        assert!(out.is_empty());
    }
}
