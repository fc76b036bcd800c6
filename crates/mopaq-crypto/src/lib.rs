//! Cryptographic primitives of the MPQ archive format
//!
//! This crate provides the key table, path hashing and block cipher that
//! MPQ readers use to locate files and to protect the archive tables.
//!
//! # Components
//!
//! - **Key table**: 0x500 words from a fixed generator, built once per process
//! - **Hashing**: case-insensitive path hashes in four variants
//! - **Encryption**: word-oriented stream cipher for tables and file data
//! - **Key derivation**: table keys and per-file / per-sector keys
//!
//! # Examples
//!
//! ## Locating a path
//!
//! ```
//! use mopaq_crypto::PathHash;
//!
//! let hash = PathHash::of("war3map.j");
//! let slot = hash.start_slot(1024);
//! assert!(slot < 1024);
//! ```
//!
//! ## Decrypting a table region
//!
//! ```
//! use mopaq_crypto::{decrypt_block, encrypt_block, hash_table_key};
//!
//! let mut region = vec![0xFFu8; 32];
//! encrypt_block(&mut region, hash_table_key());
//! decrypt_block(&mut region, hash_table_key());
//! assert!(region.iter().all(|&b| b == 0xFF));
//! ```

#![warn(missing_docs)]

pub mod cipher;
pub mod file_key;
pub mod hash;
pub mod table;

pub use cipher::{decrypt_block, decrypt_block_with, encrypt_block, encrypt_block_with};
pub use file_key::{
    KeyAdjustment, base_name, block_table_key, file_key, hash_table_key, sector_key,
    sector_table_key,
};
pub use hash::{HashType, PathHash, hash_string, hash_string_with};
pub use table::CryptTable;
