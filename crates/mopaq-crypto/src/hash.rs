//! Case-insensitive path hashing
//!
//! Archive paths are never stored; the hash table identifies a file by three
//! hashes of its path computed with different rows of the key table. The
//! same function with the [`HashType::FileKey`] row derives encryption keys.

use std::fmt;

use crate::table::CryptTable;

/// Row of the key table a hash is computed against
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum HashType {
    /// Initial hash-table slot
    TableOffset = 0,
    /// First stored digest
    NameA = 1,
    /// Second stored digest
    NameB = 2,
    /// Encryption key derivation
    FileKey = 3,
}

impl HashType {
    #[inline]
    const fn row(self) -> usize {
        (self as usize) << 8
    }
}

/// Hash `path` with the given variant using the process-wide key table
///
/// # Examples
///
/// ```
/// use mopaq_crypto::{hash_string, HashType};
///
/// let key = hash_string("(hash table)", HashType::FileKey);
/// assert_eq!(key, 0xC3AF_3770);
/// ```
pub fn hash_string(path: impl AsRef<[u8]>, hash_type: HashType) -> u32 {
    hash_string_with(CryptTable::global(), path.as_ref(), hash_type)
}

/// Hash `path` against an explicit key table
pub fn hash_string_with(table: &CryptTable, path: &[u8], hash_type: HashType) -> u32 {
    let row = hash_type.row();
    let mut seed1: u32 = 0x7FED_7FED;
    let mut seed2: u32 = 0xEEEE_EEEE;

    for &byte in path {
        let ch = u32::from(byte.to_ascii_uppercase());

        seed1 = table.get(row + ch as usize) ^ seed1.wrapping_add(seed2);
        seed2 = ch
            .wrapping_add(seed1)
            .wrapping_add(seed2)
            .wrapping_add(seed2 << 5)
            .wrapping_add(3);
    }

    seed1
}

/// The three hashes that place and identify a path in the hash table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PathHash {
    /// Starting slot before reduction modulo the table size
    pub offset: u32,
    /// First stored digest
    pub name_a: u32,
    /// Second stored digest
    pub name_b: u32,
}

impl PathHash {
    /// Compute all three hashes of `path`
    pub fn of(path: impl AsRef<[u8]>) -> Self {
        let table = CryptTable::global();
        let path = path.as_ref();
        Self {
            offset: hash_string_with(table, path, HashType::TableOffset),
            name_a: hash_string_with(table, path, HashType::NameA),
            name_b: hash_string_with(table, path, HashType::NameB),
        }
    }

    /// Starting slot in a table of `table_size` entries
    ///
    /// `table_size` must be non-zero.
    #[inline]
    pub fn start_slot(&self, table_size: u32) -> u32 {
        self.offset % table_size
    }

    /// Both stored digests packed into one value, `name_a` in the high half
    pub fn digest64(&self) -> u64 {
        (u64::from(self.name_a) << 32) | u64::from(self.name_b)
    }
}

impl fmt::Display for PathHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:08x}:{:08x}:{:08x}",
            self.offset, self.name_a, self.name_b
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_keys() {
        assert_eq!(hash_string("(hash table)", HashType::FileKey), 0xC3AF_3770);
        assert_eq!(hash_string("(block table)", HashType::FileKey), 0xEC83_B3A3);
    }

    #[test]
    fn test_case_insensitive() {
        let lower = PathHash::of("units\\human\\footman.mdx");
        let upper = PathHash::of("UNITS\\HUMAN\\FOOTMAN.MDX");
        assert_eq!(lower, upper);
    }

    #[test]
    fn test_variants_differ() {
        let path = "war3map.j";
        let offset = hash_string(path, HashType::TableOffset);
        let a = hash_string(path, HashType::NameA);
        let b = hash_string(path, HashType::NameB);
        let key = hash_string(path, HashType::FileKey);
        assert_ne!(offset, a);
        assert_ne!(a, b);
        assert_ne!(b, key);
    }

    #[test]
    fn test_separator_is_significant() {
        assert_ne!(PathHash::of("a\\b"), PathHash::of("a/b"));
    }

    #[test]
    fn test_empty_path() {
        assert_eq!(hash_string("", HashType::NameA), 0x7FED_7FED);
    }

    #[test]
    fn test_digest64_packing() {
        let hash = PathHash {
            offset: 1,
            name_a: 0x1122_3344,
            name_b: 0x5566_7788,
        };
        assert_eq!(hash.digest64(), 0x1122_3344_5566_7788);
        assert_eq!(format!("{hash}"), "00000001:11223344:55667788");
    }
}
