//! Encryption keys for archive tables and stored files

use crate::hash::{HashType, hash_string};

/// Name hashed to obtain the hash-table key
pub const HASH_TABLE_NAME: &str = "(hash table)";

/// Name hashed to obtain the block-table key
pub const BLOCK_TABLE_NAME: &str = "(block table)";

/// Key protecting the hash-table region
pub fn hash_table_key() -> u32 {
    hash_string(HASH_TABLE_NAME, HashType::FileKey)
}

/// Key protecting the block-table region
pub fn block_table_key() -> u32 {
    hash_string(BLOCK_TABLE_NAME, HashType::FileKey)
}

/// Final component of an archive path
///
/// Both separators are accepted so listfiles written with forward slashes
/// derive the same key as the canonical backslash form.
pub fn base_name(path: &[u8]) -> &[u8] {
    match path.iter().rposition(|&b| b == b'\\' || b == b'/') {
        Some(pos) => &path[pos + 1..],
        None => path,
    }
}

/// Placement of a file that influences its key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct KeyAdjustment {
    /// Offset of the file relative to the archive header
    pub file_pos: u32,
    /// Uncompressed size of the file
    pub normal_size: u32,
}

/// Base key of a stored file
///
/// The key is the [`HashType::FileKey`] hash of the file's base name. When
/// `adjust` is given (the file carries the key-adjusted flag) the key is
/// further mixed with the file position and size.
pub fn file_key(path: impl AsRef<[u8]>, adjust: Option<KeyAdjustment>) -> u32 {
    let key = hash_string(base_name(path.as_ref()), HashType::FileKey);
    match adjust {
        Some(adj) => key.wrapping_add(adj.file_pos) ^ adj.normal_size,
        None => key,
    }
}

/// Key of sector `index` of a sectorized file
#[inline]
pub fn sector_key(base_key: u32, index: u32) -> u32 {
    base_key.wrapping_add(index)
}

/// Key of the sector-offset table preceding a sectorized file
#[inline]
pub fn sector_table_key(base_key: u32) -> u32 {
    base_key.wrapping_sub(1)
}
