//! Hash table and block table
//!
//! The hash table is an open-addressing index from path digests to block
//! rows, probed linearly from `Hash(path, TableOffset) % size`. The block
//! table is append-only per-file metadata. Both are stored as 16-byte
//! little-endian records, each region encrypted with its own fixed key.

use super::error::{ArchiveError, ArchiveResult};
use super::header::LocatedHeader;
use binrw::io::Cursor;
use binrw::{BinRead, BinWrite};
use mopaq_crypto::{PathHash, block_table_key, decrypt_block, encrypt_block, hash_table_key};
use std::fmt;

/// Serialized size of one hash- or block-table record
pub const ENTRY_SIZE: usize = 16;

/// One hash-table slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, BinRead, BinWrite)]
#[brw(little)]
pub struct HashTableEntry {
    /// First path digest
    pub name_a: u32,
    /// Second path digest
    pub name_b: u32,
    /// Locale and platform word, written as zero
    pub locale: u32,
    /// Row in the block table, or [`Self::FREE`] / [`Self::DELETED`]
    pub block_index: u32,
}

impl HashTableEntry {
    /// Slot never used; ends a probe sequence
    pub const FREE: u32 = 0xFFFF_FFFF;

    /// Slot whose file was removed; probed through
    pub const DELETED: u32 = 0xFFFF_FFFE;

    /// Unused slot of a freshly built table
    pub const EMPTY: Self = Self {
        name_a: u32::MAX,
        name_b: u32::MAX,
        locale: u32::MAX,
        block_index: Self::FREE,
    };

    /// Slot has never held a file
    #[inline]
    pub fn is_free(&self) -> bool {
        self.block_index == Self::FREE
    }

    /// Slot held a file that was removed
    #[inline]
    pub fn is_deleted(&self) -> bool {
        self.block_index == Self::DELETED
    }

    /// Slot currently names a file
    #[inline]
    pub fn is_occupied(&self) -> bool {
        !self.is_free() && !self.is_deleted()
    }

    fn matches(&self, hash: &PathHash) -> bool {
        self.is_occupied() && self.name_a == hash.name_a && self.name_b == hash.name_b
    }
}

/// Storage flags of a block-table entry
#[derive(BinRead, BinWrite, Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[brw(little)]
pub struct BlockFlags {
    /// Raw flag word
    pub value: u32,
}

impl BlockFlags {
    /// Legacy PKWARE implode compression (rejected)
    pub const IMPLODE: u32 = 0x0000_0100;

    /// Payload is compressed with the masked codec chain
    pub const COMPRESSED: u32 = 0x0000_0200;

    /// Payload is encrypted with the file key
    pub const ENCRYPTED: u32 = 0x0001_0000;

    /// File key is mixed with position and size
    pub const KEY_ADJUSTED: u32 = 0x0002_0000;

    /// File is stored as one unit rather than in sectors
    pub const SINGLE_UNIT: u32 = 0x0100_0000;

    /// Entry describes a live file
    pub const EXISTS: u32 = 0x8000_0000;

    const NAMES: [(u32, &'static str); 6] = [
        (Self::IMPLODE, "IMPLODE"),
        (Self::COMPRESSED, "COMPRESSED"),
        (Self::ENCRYPTED, "ENCRYPTED"),
        (Self::KEY_ADJUSTED, "KEY_ADJUSTED"),
        (Self::SINGLE_UNIT, "SINGLE_UNIT"),
        (Self::EXISTS, "EXISTS"),
    ];

    /// Flags from a raw word
    pub const fn new(value: u32) -> Self {
        Self { value }
    }

    /// All bits of `flag` are set
    #[inline]
    pub const fn contains(self, flag: u32) -> bool {
        self.value & flag == flag
    }

    /// Copy with `flag` added
    #[inline]
    pub const fn with(self, flag: u32) -> Self {
        Self {
            value: self.value | flag,
        }
    }
}

impl fmt::Display for BlockFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (bit, name) in Self::NAMES {
            if self.value & bit != 0 {
                if !first {
                    f.write_str("|")?;
                }
                f.write_str(name)?;
                first = false;
            }
        }
        let unknown = Self::NAMES
            .iter()
            .fold(self.value, |rest, (bit, _)| rest & !bit);
        if unknown != 0 || first {
            if !first {
                f.write_str("|")?;
            }
            write!(f, "0x{unknown:08X}")?;
        }
        Ok(())
    }
}

/// Per-file metadata row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, BinRead, BinWrite)]
#[brw(little)]
pub struct BlockTableEntry {
    /// Offset of the stored payload relative to the header
    pub file_pos: u32,
    /// Stored payload length
    pub compressed_size: u32,
    /// Decoded file length
    pub normal_size: u32,
    /// Storage flags
    pub flags: BlockFlags,
}

/// Hash table and block table of one archive
#[derive(Debug, Clone)]
pub struct ArchiveTable {
    hash_table: Vec<HashTableEntry>,
    block_table: Vec<BlockTableEntry>,
}

impl ArchiveTable {
    /// Empty build table sized for `expected_entries` files
    ///
    /// The hash table gets the next power of two at or above the entry count
    /// (at least one slot), every slot [`HashTableEntry::EMPTY`].
    pub fn with_capacity(expected_entries: usize) -> Self {
        let size = expected_entries.max(1).next_power_of_two();
        Self {
            hash_table: vec![HashTableEntry::EMPTY; size],
            block_table: Vec::with_capacity(expected_entries),
        }
    }

    /// Decrypt and decode both tables of the archive at `located`
    pub fn parse(image: &[u8], located: &LocatedHeader) -> ArchiveResult<Self> {
        let header = &located.header;

        let mut hash_region = table_region(
            image,
            "hash table",
            located.offset,
            header.hash_table_pos,
            header.hash_table_count,
        )?
        .to_vec();
        decrypt_block(&mut hash_region, hash_table_key());
        let mut cursor = Cursor::new(&hash_region);
        let hash_table = (0..header.hash_table_count)
            .map(|_| HashTableEntry::read(&mut cursor))
            .collect::<Result<Vec<_>, _>>()?;

        let mut block_region = table_region(
            image,
            "block table",
            located.offset,
            header.block_table_pos,
            header.block_table_count,
        )?
        .to_vec();
        decrypt_block(&mut block_region, block_table_key());
        let mut cursor = Cursor::new(&block_region);
        let block_table = (0..header.block_table_count)
            .map(|_| BlockTableEntry::read(&mut cursor))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            hash_table,
            block_table,
        })
    }

    /// Number of hash-table slots
    pub fn hash_table_size(&self) -> usize {
        self.hash_table.len()
    }

    /// Number of block-table rows
    pub fn block_count(&self) -> usize {
        self.block_table.len()
    }

    /// All hash-table slots in order
    pub fn slots(&self) -> &[HashTableEntry] {
        &self.hash_table
    }

    /// All block-table rows in insertion order
    pub fn blocks(&self) -> &[BlockTableEntry] {
        &self.block_table
    }

    /// Slots that currently name a file
    pub fn occupied(&self) -> impl Iterator<Item = &HashTableEntry> {
        self.hash_table.iter().filter(|slot| slot.is_occupied())
    }

    /// Hash-table slot naming `path`
    ///
    /// Probing starts at the path's home slot and stops at the first free
    /// slot or after one full wrap. Deleted slots are skipped.
    pub fn lookup_slot(&self, path: impl AsRef<[u8]>) -> Option<&HashTableEntry> {
        let size = self.hash_table.len();
        if size == 0 {
            return None;
        }

        let hash = PathHash::of(path);
        let start = hash.start_slot(size as u32) as usize;
        for step in 0..size {
            let slot = &self.hash_table[(start + step) % size];
            if slot.is_free() {
                return None;
            }
            if slot.matches(&hash) {
                return Some(slot);
            }
        }
        None
    }

    /// Block-table row of `path`
    pub fn lookup(&self, path: impl AsRef<[u8]>) -> Option<&BlockTableEntry> {
        let slot = self.lookup_slot(path)?;
        self.block_table.get(slot.block_index as usize)
    }

    /// Append `entry` and index it under `path`, returning its block index
    pub fn insert(&mut self, path: &str, entry: BlockTableEntry) -> ArchiveResult<u32> {
        let index = u32::try_from(self.block_table.len())
            .ok()
            .filter(|&index| index < HashTableEntry::DELETED)
            .ok_or(ArchiveError::BlockTableFull(self.block_table.len()))?;

        let size = self.hash_table.len();
        let hash = PathHash::of(path);
        let start = hash.start_slot(size as u32) as usize;

        let slot = (0..size)
            .map(|step| (start + step) % size)
            .find(|&slot| self.hash_table[slot].is_free())
            .ok_or_else(|| ArchiveError::HashTableFull {
                path: path.to_string(),
            })?;

        self.hash_table[slot] = HashTableEntry {
            name_a: hash.name_a,
            name_b: hash.name_b,
            locale: 0,
            block_index: index,
        };
        self.block_table.push(entry);
        Ok(index)
    }

    /// Encrypted hash-table region
    pub fn hash_table_bytes(&self) -> ArchiveResult<Vec<u8>> {
        let mut cursor = Cursor::new(Vec::with_capacity(self.hash_table.len() * ENTRY_SIZE));
        for slot in &self.hash_table {
            slot.write(&mut cursor)?;
        }
        let mut bytes = cursor.into_inner();
        encrypt_block(&mut bytes, hash_table_key());
        Ok(bytes)
    }

    /// Encrypted block-table region
    pub fn block_table_bytes(&self) -> ArchiveResult<Vec<u8>> {
        let mut cursor = Cursor::new(Vec::with_capacity(self.block_table.len() * ENTRY_SIZE));
        for entry in &self.block_table {
            entry.write(&mut cursor)?;
        }
        let mut bytes = cursor.into_inner();
        encrypt_block(&mut bytes, block_table_key());
        Ok(bytes)
    }

    /// Combined length of both serialized regions
    pub fn serialized_len(&self) -> u64 {
        ((self.hash_table.len() + self.block_table.len()) * ENTRY_SIZE) as u64
    }
}

fn table_region<'a>(
    image: &'a [u8],
    table: &'static str,
    base: usize,
    pos: u32,
    count: u32,
) -> ArchiveResult<&'a [u8]> {
    let start = base as u64 + u64::from(pos);
    let end = start + u64::from(count) * ENTRY_SIZE as u64;
    let available = image.len() as u64;
    if end > available {
        return Err(ArchiveError::Truncated {
            table,
            start,
            end,
            available,
        });
    }
    Ok(&image[start as usize..end as usize])
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::archive::header::{ArchiveHeader, HEADER_SIZE};
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    fn entry(n: u32) -> BlockTableEntry {
        BlockTableEntry {
            file_pos: 0x20 + n * 100,
            compressed_size: 90,
            normal_size: 100 + n,
            flags: BlockFlags::new(BlockFlags::COMPRESSED | BlockFlags::EXISTS),
        }
    }

    /// Build an image: header at `offset`, then hash table, then block table
    fn image_for(table: &ArchiveTable, offset: usize) -> Vec<u8> {
        let ht = table.hash_table_bytes().expect("Test operation should succeed");
        let bt = table.block_table_bytes().expect("Test operation should succeed");
        let mut header = ArchiveHeader::new(3);
        header.hash_table_pos = HEADER_SIZE as u32;
        header.block_table_pos = (HEADER_SIZE + ht.len()) as u32;
        header.hash_table_count = table.hash_table_size() as u32;
        header.block_table_count = table.block_count() as u32;
        header.archive_size = (HEADER_SIZE + ht.len() + bt.len()) as u32;

        let mut image = vec![0u8; offset];
        image.extend_from_slice(&header.to_bytes().expect("Test operation should succeed"));
        image.extend_from_slice(&ht);
        image.extend_from_slice(&bt);
        image
    }

    #[test]
    fn test_capacity_rounds_to_power_of_two() {
        assert_eq!(ArchiveTable::with_capacity(0).hash_table_size(), 1);
        assert_eq!(ArchiveTable::with_capacity(5).hash_table_size(), 8);
        assert_eq!(ArchiveTable::with_capacity(8).hash_table_size(), 8);
        assert!(
            ArchiveTable::with_capacity(3)
                .slots()
                .iter()
                .all(|slot| *slot == HashTableEntry::EMPTY)
        );
    }

    #[test]
    fn test_insert_then_lookup() {
        let mut table = ArchiveTable::with_capacity(4);
        let paths = ["war3map.j", "units\\footman.mdx", "(listfile)"];
        for (n, path) in paths.iter().enumerate() {
            let index = table
                .insert(path, entry(n as u32))
                .expect("Test operation should succeed");
            assert_eq!(index, n as u32);
        }

        for (n, path) in paths.iter().enumerate() {
            assert_eq!(table.lookup(path), Some(&entry(n as u32)));
        }
        assert_eq!(table.lookup("UNITS\\FOOTMAN.MDX"), Some(&entry(1)));
        assert_eq!(table.lookup("missing.txt"), None);
        assert_eq!(table.occupied().count(), 3);
    }

    #[test]
    fn test_table_full() {
        let mut table = ArchiveTable::with_capacity(2);
        table.insert("a", entry(0)).expect("Test operation should succeed");
        table.insert("b", entry(1)).expect("Test operation should succeed");

        let err = table.insert("c", entry(2)).expect_err("Should be full");
        assert!(matches!(err, ArchiveError::HashTableFull { ref path } if path == "c"));
        assert_eq!(table.block_count(), 2);
        // A full table still answers misses after one wrap
        assert_eq!(table.lookup("c"), None);
    }

    #[test]
    fn test_deleted_slots_probed_through() {
        let home = PathHash::of("second").start_slot(4) as usize;

        // Tombstone in the home slot, the live entry one past it
        let mut tombstoned = ArchiveTable::with_capacity(4);
        tombstoned.hash_table[home] = HashTableEntry {
            block_index: HashTableEntry::DELETED,
            ..HashTableEntry::EMPTY
        };
        tombstoned.hash_table[(home + 1) % 4] = HashTableEntry {
            name_a: PathHash::of("second").name_a,
            name_b: PathHash::of("second").name_b,
            locale: 0,
            block_index: 0,
        };
        tombstoned.block_table.push(entry(7));

        assert_eq!(tombstoned.lookup("second"), Some(&entry(7)));
        assert_eq!(tombstoned.occupied().count(), 1);
    }

    #[test]
    fn test_parse_serialized_tables() {
        let mut table = ArchiveTable::with_capacity(3);
        table.insert("a.txt", entry(0)).expect("Test operation should succeed");
        table.insert("dir\\b.txt", entry(1)).expect("Test operation should succeed");

        let image = image_for(&table, 0x200);
        let located = crate::archive::find_header(&image).expect("Test operation should succeed");
        assert_eq!(located.offset, 0x200);

        let parsed = ArchiveTable::parse(&image, &located).expect("Test operation should succeed");
        assert_eq!(parsed.slots(), table.slots());
        assert_eq!(parsed.blocks(), table.blocks());
        assert_eq!(parsed.lookup("dir\\b.txt"), Some(&entry(1)));
    }

    #[test]
    fn test_regions_are_encrypted() {
        let table = ArchiveTable::with_capacity(1);
        let bytes = table.hash_table_bytes().expect("Test operation should succeed");
        assert_eq!(bytes.len(), ENTRY_SIZE);
        assert_ne!(bytes, vec![0xFF; ENTRY_SIZE]);
    }

    #[test]
    fn test_truncated_region() {
        let mut table = ArchiveTable::with_capacity(2);
        table.insert("a.txt", entry(0)).expect("Test operation should succeed");
        let mut image = image_for(&table, 0);
        image.truncate(image.len() - 1);

        let located = crate::archive::find_header(&image).expect("Test operation should succeed");
        let err = ArchiveTable::parse(&image, &located).expect_err("Should be truncated");
        assert!(matches!(
            err,
            ArchiveError::Truncated {
                table: "block table",
                ..
            }
        ));
    }

    #[test]
    fn test_flags_display() {
        let flags = BlockFlags::new(BlockFlags::COMPRESSED | BlockFlags::EXISTS);
        assert_eq!(flags.to_string(), "COMPRESSED|EXISTS");
        assert_eq!(BlockFlags::new(0).to_string(), "0x00000000");
        assert_eq!(BlockFlags::new(0x4).to_string(), "0x00000004");
        assert!(flags.contains(BlockFlags::EXISTS));
        assert!(!flags.contains(BlockFlags::ENCRYPTED));
        assert!(flags.with(BlockFlags::ENCRYPTED).contains(BlockFlags::ENCRYPTED));
    }

    proptest! {
        #[test]
        fn prop_every_inserted_path_is_found(
            names in proptest::collection::hash_set("[a-z]{1,8}(\\\\[a-z]{1,8}){0,2}\\.[a-z]{3}", 1..64)
        ) {
            let names: Vec<String> = names.into_iter().collect();
            let mut table = ArchiveTable::with_capacity(names.len());
            for (n, name) in names.iter().enumerate() {
                let index = table.insert(name, entry(n as u32)).expect("Test operation should succeed");
                prop_assert_eq!(index as usize, n);
            }
            for (n, name) in names.iter().enumerate() {
                prop_assert_eq!(table.lookup(name), Some(&entry(n as u32)));
            }
        }
    }
}
