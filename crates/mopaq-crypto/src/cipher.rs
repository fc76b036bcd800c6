//! Word-oriented stream cipher protecting tables and file data
//!
//! The cipher runs over little-endian 32-bit words. Each word is XORed with
//! a keystream value derived from the key and a running seed. The key
//! evolves by a fixed rotate/complement step; the seed evolves from the
//! plaintext word, so encryption feeds the input word back and decryption
//! feeds the output word back. Both directions must keep that asymmetry to
//! interoperate with other readers.
//!
//! Bytes past the last whole word are left untouched.
//!
//! ## Usage
//!
//! ```rust
//! use mopaq_crypto::{decrypt_block, encrypt_block};
//!
//! let mut data = *b"sixteen byte msg";
//! encrypt_block(&mut data, 0xC3AF_3770);
//! assert_ne!(&data, b"sixteen byte msg");
//! decrypt_block(&mut data, 0xC3AF_3770);
//! assert_eq!(&data, b"sixteen byte msg");
//! ```

use crate::table::{CIPHER_ROW, CryptTable};

const INITIAL_SEED: u32 = 0xEEEE_EEEE;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Encrypt,
    Decrypt,
}

/// Encrypt `data` in place with `key`
pub fn encrypt_block(data: &mut [u8], key: u32) {
    apply(CryptTable::global(), data, key, Direction::Encrypt);
}

/// Decrypt `data` in place with `key`
pub fn decrypt_block(data: &mut [u8], key: u32) {
    apply(CryptTable::global(), data, key, Direction::Decrypt);
}

/// Encrypt `data` in place against an explicit key table
pub fn encrypt_block_with(table: &CryptTable, data: &mut [u8], key: u32) {
    apply(table, data, key, Direction::Encrypt);
}

/// Decrypt `data` in place against an explicit key table
pub fn decrypt_block_with(table: &CryptTable, data: &mut [u8], key: u32) {
    apply(table, data, key, Direction::Decrypt);
}

fn apply(table: &CryptTable, data: &mut [u8], mut key: u32, direction: Direction) {
    let mut seed = INITIAL_SEED;

    for chunk in data.chunks_exact_mut(4) {
        seed = seed.wrapping_add(table.get(CIPHER_ROW + (key & 0xFF) as usize));

        let input = u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
        let output = input ^ key.wrapping_add(seed);

        key = ((!key) << 0x15).wrapping_add(0x1111_1111) | (key >> 0x0B);

        let plain = match direction {
            Direction::Encrypt => input,
            Direction::Decrypt => output,
        };
        seed = plain
            .wrapping_add(seed)
            .wrapping_add(seed << 5)
            .wrapping_add(3);

        chunk.copy_from_slice(&output.to_le_bytes());
    }
}
