//! Archive header location and layout

use super::error::{ArchiveError, ArchiveResult};
use super::MAX_SECTOR_SHIFT;
use binrw::io::Cursor;
use binrw::{BinRead, BinWrite};

/// Header magic, `MPQ\x1A`
pub const HEADER_MAGIC: [u8; 4] = *b"MPQ\x1a";

/// Serialized header length
pub const HEADER_SIZE: usize = 0x20;

/// Headers start on multiples of this alignment
pub const HEADER_ALIGNMENT: usize = 0x200;

/// Archive header
///
/// Layout (32 bytes, little-endian):
/// - Magic `MPQ\x1A` (4 bytes)
/// - Header size, archive size (4 bytes each)
/// - Format version, sector size exponent (2 bytes each)
/// - Hash-table position, block-table position (4 bytes each)
/// - Hash-table entries, block-table entries (4 bytes each)
///
/// Table positions are relative to the header's own offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, BinRead, BinWrite)]
#[brw(little, magic = b"MPQ\x1a")]
pub struct ArchiveHeader {
    /// Size of the header in bytes
    pub header_size: u32,
    /// Size of the archive from the header to the end of the block table
    pub archive_size: u32,
    /// Format version, 0 for the original layout
    pub version: u16,
    /// Sector size is `512 << shift`
    pub shift: u16,
    /// Hash-table offset from the header
    pub hash_table_pos: u32,
    /// Block-table offset from the header
    pub block_table_pos: u32,
    /// Number of hash-table slots
    pub hash_table_count: u32,
    /// Number of block-table entries
    pub block_table_count: u32,
}

impl ArchiveHeader {
    /// Header for a freshly built archive; positions and counts start at zero
    pub fn new(shift: u16) -> Self {
        Self {
            header_size: HEADER_SIZE as u32,
            archive_size: 0,
            version: 0,
            shift,
            hash_table_pos: 0,
            block_table_pos: 0,
            hash_table_count: 0,
            block_table_count: 0,
        }
    }

    /// Sector size in bytes
    pub fn sector_size(&self) -> ArchiveResult<usize> {
        sector_size(self.shift)
    }

    /// Serialize to the 32-byte on-disk form
    pub fn to_bytes(&self) -> ArchiveResult<[u8; HEADER_SIZE]> {
        let mut buf = [0u8; HEADER_SIZE];
        self.write(&mut Cursor::new(&mut buf[..]))?;
        Ok(buf)
    }
}

/// Sector size for a `shift` exponent
pub fn sector_size(shift: u16) -> ArchiveResult<usize> {
    if shift > MAX_SECTOR_SHIFT {
        return Err(ArchiveError::InvalidSectorShift(shift));
    }
    Ok(512usize << shift)
}

/// Header found inside a larger file image
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocatedHeader {
    /// Byte offset of the header within the image
    pub offset: usize,
    /// Decoded header
    pub header: ArchiveHeader,
}

/// Scan `image` at 512-byte steps for the first archive header
pub fn find_header(image: &[u8]) -> ArchiveResult<LocatedHeader> {
    let mut offset = 0;
    while offset + HEADER_SIZE <= image.len() {
        if image[offset..offset + 4] == HEADER_MAGIC {
            let header =
                ArchiveHeader::read(&mut Cursor::new(&image[offset..offset + HEADER_SIZE]))?;
            return Ok(LocatedHeader { offset, header });
        }
        offset += HEADER_ALIGNMENT;
    }
    Err(ArchiveError::HeaderNotFound)
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn sample() -> ArchiveHeader {
        ArchiveHeader {
            header_size: 0x20,
            archive_size: 0x1234,
            version: 0,
            shift: 3,
            hash_table_pos: 0x1000,
            block_table_pos: 0x1100,
            hash_table_count: 16,
            block_table_count: 4,
        }
    }

    #[test]
    fn test_layout() {
        let bytes = sample().to_bytes().expect("Test operation should succeed");
        assert_eq!(&bytes[0..4], b"MPQ\x1a");
        assert_eq!(&bytes[4..8], &0x20u32.to_le_bytes());
        assert_eq!(&bytes[12..14], &0u16.to_le_bytes());
        assert_eq!(&bytes[14..16], &3u16.to_le_bytes());
        assert_eq!(&bytes[28..32], &4u32.to_le_bytes());
    }

    #[test]
    fn test_find_at_aligned_offset() {
        let mut image = vec![0xEEu8; 0x400];
        let bytes = sample().to_bytes().expect("Test operation should succeed");
        image.extend_from_slice(&bytes);
        image.extend_from_slice(&[0u8; 64]);

        let located = find_header(&image).expect("Test operation should succeed");
        assert_eq!(located.offset, 0x400);
        assert_eq!(located.header, sample());
    }

    #[test]
    fn test_unaligned_magic_ignored() {
        let mut image = vec![0u8; 0x10];
        image.extend_from_slice(&sample().to_bytes().expect("Test operation should succeed"));
        assert!(matches!(find_header(&image), Err(ArchiveError::HeaderNotFound)));
    }

    #[test]
    fn test_short_image() {
        assert!(matches!(find_header(b"MPQ\x1a"), Err(ArchiveError::HeaderNotFound)));
    }

    #[test]
    fn test_sector_size() {
        assert_eq!(sector_size(0).expect("Test operation should succeed"), 512);
        assert_eq!(sector_size(3).expect("Test operation should succeed"), 4096);
        assert_eq!(sector_size(15).expect("Test operation should succeed"), 512 << 15);
        assert!(sector_size(16).is_err());
    }
}
