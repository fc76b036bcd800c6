//! Shared key table used by every hash and cipher operation
//!
//! The table holds 0x500 words generated by a fixed linear-congruential
//! generator. It is split into five 256-word rows: rows 0-3 feed the four
//! [`HashType`](crate::HashType) variants and row 4 feeds the block cipher.

use std::sync::OnceLock;

/// Number of 32-bit words in the key table
pub const TABLE_SIZE: usize = 0x500;

/// Offset of the row used by the block cipher
pub const CIPHER_ROW: usize = 0x400;

const LCG_SEED: u32 = 0x0010_0001;
const LCG_MODULUS: u32 = 0x002A_AAAB;

static GLOBAL_TABLE: OnceLock<CryptTable> = OnceLock::new();

/// Precomputed key table
#[derive(Clone)]
pub struct CryptTable {
    words: [u32; TABLE_SIZE],
}

impl CryptTable {
    /// Generate the table from the constant seed
    ///
    /// The result is identical on every call. Most callers want
    /// [`CryptTable::global`] instead, which builds it once per process.
    pub fn build() -> Self {
        let mut words = [0u32; TABLE_SIZE];
        let mut seed = LCG_SEED;

        for index1 in 0..0x100 {
            let mut index2 = index1;
            for _ in 0..5 {
                seed = next_seed(seed);
                let high = (seed & 0xFFFF) << 0x10;

                seed = next_seed(seed);
                let low = seed & 0xFFFF;

                words[index2] = high | low;
                index2 += 0x100;
            }
        }

        Self { words }
    }

    /// Process-wide table, generated on first use and read-only afterwards
    pub fn global() -> &'static Self {
        GLOBAL_TABLE.get_or_init(Self::build)
    }

    /// Word at `index`
    #[inline]
    pub fn get(&self, index: usize) -> u32 {
        self.words[index]
    }

    /// All words of the table
    pub fn words(&self) -> &[u32; TABLE_SIZE] {
        &self.words
    }
}

impl std::fmt::Debug for CryptTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CryptTable")
            .field("first", &format_args!("{:08X}", self.words[0]))
            .field("len", &TABLE_SIZE)
            .finish()
    }
}

#[inline]
fn next_seed(seed: u32) -> u32 {
    // 125 * 0x2AAAAA + 3 stays well below u32::MAX
    (seed * 125 + 3) % LCG_MODULUS
}
