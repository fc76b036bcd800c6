//! Archive tables, sector codecs and listfiles for MPQ archives
//!
#![allow(clippy::cast_possible_wrap)] // Intentional for binary operations
#![allow(clippy::cast_lossless)] // Sometimes clearer than From
#![allow(clippy::uninlined_format_args)] // Backwards compatibility
#![allow(clippy::cast_precision_loss)] // Ratio reporting
#![allow(clippy::redundant_closure_for_method_calls)] // Iterator chains
#![allow(clippy::return_self_not_must_use)] // Builder patterns
//! This crate reads and writes the on-disk structures of MPQ archives:
//!
//! - **Archive**: header location, hash table and block table, both encrypted
//! - **Codec**: the masked decode chain (zlib, explode, ADPCM, Huffman) and
//!   the zopfli-backed zlib sector encoder
//! - **Sector**: the four stored-payload layouts and the sectorized writer
//! - **Listfile**: path tokens and digest-keyed path sets
//!
//! # Design Principles
//!
//! - **Symmetric Operations**: every table that is parsed can be serialized
//! - **Bounded Decoding**: every codec stage is capped at the expected length
//! - **Explicit Layouts**: storage flags map onto one tagged layout enum

#![warn(missing_docs)]

pub mod archive;
pub mod codec;
pub mod listfile;
pub mod sector;

pub use archive::{
    ArchiveError, ArchiveHeader, ArchiveResult, ArchiveTable, BlockFlags, BlockTableEntry,
    HashTableEntry, LocatedHeader, find_header,
};
pub use codec::{Codec, CodecError, CodecResult, SectorEncoder};
pub use listfile::{Listfile, ListfileError, ListfileResult, PathTokens};
pub use sector::{PackedFile, SectorError, SectorLayout, SectorResult, extract_file, pack_file};
