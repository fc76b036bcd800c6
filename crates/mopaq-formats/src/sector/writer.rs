//! Sectorized re-encoding of whole files

use super::error::{SectorError, SectorResult};
use super::sector_count;
use crate::archive::BlockFlags;
use crate::codec::SectorEncoder;

/// A file ready to be appended to an archive
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackedFile {
    /// Offset table followed by every sector payload
    pub bytes: Vec<u8>,
    /// Storage flags, without [`BlockFlags::EXISTS`]
    pub flags: BlockFlags,
}

impl PackedFile {
    /// Stored length
    pub fn compressed_size(&self) -> usize {
        self.bytes.len()
    }
}

/// Split `data` into `sector_size` sectors and compress each one
///
/// The output opens with `count + 1` little-endian offsets; the first is the
/// table's own length and each later one is the end of a sector. Payload
/// bytes are never encrypted. A zero-length file yields just the 4-byte
/// table.
pub fn pack_file(
    data: &[u8],
    sector_size: usize,
    encoder: &SectorEncoder,
) -> SectorResult<PackedFile> {
    let count = sector_count(data.len(), sector_size);
    let table_len = (count + 1) * 4;

    let mut offsets = Vec::with_capacity(count + 1);
    let mut body = Vec::with_capacity(data.len() / 2);
    offsets.push(table_len);
    for sector in data.chunks(sector_size) {
        let encoded = encoder.encode(sector).map_err(SectorError::Encode)?;
        body.extend_from_slice(&encoded);
        offsets.push(table_len + body.len());
    }

    let total = table_len + body.len();
    if u32::try_from(total).is_err() {
        return Err(SectorError::FileTooLarge(data.len()));
    }

    let mut bytes = Vec::with_capacity(total);
    for offset in offsets {
        bytes.extend_from_slice(&(offset as u32).to_le_bytes());
    }
    bytes.extend_from_slice(&body);

    Ok(PackedFile {
        bytes,
        flags: BlockFlags::new(BlockFlags::COMPRESSED),
    })
}
