//! Archive header, hash table and block table
//!
//! An archive is located by scanning for its header at 512-byte aligned
//! offsets; everything it points to is relative to that offset. The two
//! tables are encrypted with keys derived from their names.
//!
//! ```
//! use mopaq_formats::archive::{ArchiveTable, BlockFlags, BlockTableEntry};
//!
//! let mut table = ArchiveTable::with_capacity(2);
//! let entry = BlockTableEntry {
//!     file_pos: 0x20,
//!     compressed_size: 10,
//!     normal_size: 12,
//!     flags: BlockFlags::new(BlockFlags::COMPRESSED | BlockFlags::EXISTS),
//! };
//! table.insert("war3map.j", entry).expect("insert");
//! assert_eq!(table.lookup("WAR3MAP.J"), Some(&entry));
//! ```

pub mod error;
pub mod header;
pub mod table;

pub use error::{ArchiveError, ArchiveResult};
pub use header::{
    ArchiveHeader, HEADER_ALIGNMENT, HEADER_MAGIC, HEADER_SIZE, LocatedHeader, find_header,
    sector_size,
};
pub use table::{ArchiveTable, BlockFlags, BlockTableEntry, ENTRY_SIZE, HashTableEntry};

/// Largest accepted sector size exponent
pub const MAX_SECTOR_SHIFT: u16 = 15;
