//! PKWARE Data Compression Library "explode" stage
//!
//! The stream opens with two header bytes: the literal mode (0 for raw
//! 8-bit literals, 1 for Huffman-coded literals) and the dictionary size in
//! bits (4 to 6). After that a single flag bit selects a literal or a
//! length/distance match. All codes are fixed canonical Huffman codes read
//! least-significant bit first with inverted bits.
//!
//! The length value 519 marks the end of the stream. Streams that simply run
//! out of input end with the bytes produced so far.

use super::Codec;
use super::bits::BitReader;
use super::error::{CodecError, CodecResult};
use std::sync::OnceLock;

const MAX_BITS: usize = 13;
const END_OF_STREAM: u32 = 519;

/// Code lengths of the 256 literal codes, run-length packed
const LITERAL_LENGTHS: [u8; 98] = [
    11, 124, 8, 7, 28, 7, 188, 13, 76, 4, 10, 8, 12, 10, 12, 10, 8, 23, 8, 9, 7, 6, 7, 8, 7, 6, 55,
    8, 23, 24, 12, 11, 7, 9, 11, 12, 6, 7, 22, 5, 7, 24, 6, 11, 9, 6, 7, 22, 7, 11, 38, 7, 9, 8, 25,
    11, 8, 11, 9, 12, 8, 12, 5, 38, 5, 38, 5, 11, 7, 5, 6, 21, 6, 10, 53, 8, 7, 24, 10, 27, 44, 253,
    253, 253, 252, 252, 252, 13, 12, 45, 12, 45, 12, 61, 12, 45, 44, 173,
];

/// Code lengths of the 16 length codes
const LENGTH_LENGTHS: [u8; 6] = [2, 35, 36, 53, 38, 23];

/// Code lengths of the 64 distance codes
const DISTANCE_LENGTHS: [u8; 7] = [2, 20, 53, 230, 247, 151, 248];

const LENGTH_BASE: [u32; 16] = [3, 2, 4, 5, 6, 7, 8, 9, 10, 12, 16, 24, 40, 72, 136, 264];
const LENGTH_EXTRA: [u32; 16] = [0, 0, 0, 0, 0, 0, 0, 0, 1, 2, 3, 4, 5, 6, 7, 8];

/// Canonical Huffman decoding table
struct HuffmanCode {
    count: [u16; MAX_BITS + 1],
    symbol: Vec<u16>,
}

impl HuffmanCode {
    /// Build from run-length packed code lengths
    ///
    /// Each packed byte holds a code length in its low nibble and a repeat
    /// count minus one in its high nibble.
    fn from_packed(packed: &[u8]) -> Self {
        let lengths: Vec<usize> = packed
            .iter()
            .flat_map(|&rep| std::iter::repeat_n(usize::from(rep & 0x0F), usize::from(rep >> 4) + 1))
            .collect();

        let mut count = [0u16; MAX_BITS + 1];
        for &len in &lengths {
            count[len] += 1;
        }

        let mut offsets = [0usize; MAX_BITS + 1];
        for len in 1..MAX_BITS {
            offsets[len + 1] = offsets[len] + usize::from(count[len]);
        }

        let mut symbol = vec![0u16; lengths.len()];
        for (sym, &len) in lengths.iter().enumerate() {
            if len != 0 {
                symbol[offsets[len]] = sym as u16;
                offsets[len] += 1;
            }
        }

        Self { count, symbol }
    }

    fn decode(&self, bits: &mut BitReader<'_>) -> Option<Result<u32, CodecError>> {
        let mut code: i32 = 0;
        let mut first: i32 = 0;
        let mut index: i32 = 0;

        for len in 1..=MAX_BITS {
            code |= (bits.bit()? ^ 1) as i32;
            let count = i32::from(self.count[len]);
            if code - count < first {
                let slot = (index + (code - first)) as usize;
                return Some(Ok(u32::from(self.symbol[slot])));
            }
            index += count;
            first += count;
            first <<= 1;
            code <<= 1;
        }

        Some(Err(CodecError::decode(Codec::Explode, "invalid Huffman code")))
    }
}

struct Codes {
    literal: HuffmanCode,
    length: HuffmanCode,
    distance: HuffmanCode,
}

fn codes() -> &'static Codes {
    static CODES: OnceLock<Codes> = OnceLock::new();
    CODES.get_or_init(|| Codes {
        literal: HuffmanCode::from_packed(&LITERAL_LENGTHS),
        length: HuffmanCode::from_packed(&LENGTH_LENGTHS),
        distance: HuffmanCode::from_packed(&DISTANCE_LENGTHS),
    })
}

/// Explode `data`, producing at most `limit` bytes
pub fn explode(data: &[u8], limit: usize) -> CodecResult<Vec<u8>> {
    let &[literal_mode, dict_bits, ..] = data else {
        return Err(CodecError::decode(Codec::Explode, "missing stream header"));
    };
    if literal_mode > 1 {
        return Err(CodecError::decode(
            Codec::Explode,
            format!("invalid literal mode {literal_mode}"),
        ));
    }
    if !(4..=6).contains(&dict_bits) {
        return Err(CodecError::decode(
            Codec::Explode,
            format!("invalid dictionary size {dict_bits}"),
        ));
    }

    let codes = codes();
    let mut bits = BitReader::new(&data[2..]);
    let mut out = Vec::with_capacity(limit);

    // Input exhaustion at any point ends the stream
    while out.len() < limit {
        let Some(flag) = bits.bit() else { break };

        if flag == 1 {
            let Some(symbol) = codes.length.decode(&mut bits) else { break };
            let symbol = symbol? as usize;
            let Some(extra) = bits.bits(LENGTH_EXTRA[symbol]) else { break };
            let len = LENGTH_BASE[symbol] + extra;
            if len == END_OF_STREAM {
                break;
            }

            let dist_extra = if len == 2 { 2 } else { u32::from(dict_bits) };
            let Some(high) = codes.distance.decode(&mut bits) else { break };
            let Some(low) = bits.bits(dist_extra) else { break };
            let dist = ((high? << dist_extra) + low + 1) as usize;

            if dist > out.len() {
                return Err(CodecError::decode(
                    Codec::Explode,
                    format!("distance {dist} reaches before start of output"),
                ));
            }

            let copy = (len as usize).min(limit - out.len());
            let start = out.len() - dist;
            // Overlapping copies repeat the most recent bytes
            for i in 0..copy {
                let byte = out[start + i];
                out.push(byte);
            }
        } else {
            let literal = if literal_mode == 1 {
                match codes.literal.decode(&mut bits) {
                    Some(symbol) => symbol?,
                    None => break,
                }
            } else {
                match bits.bits(8) {
                    Some(byte) => byte,
                    None => break,
                }
            };
            out.push(literal as u8);
        }
    }

    if out.is_empty() {
        return Err(CodecError::decode(Codec::Explode, "stream produced no output"));
    }

    Ok(out)
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_code_tables_are_complete() {
        let codes = codes();
        assert_eq!(codes.literal.symbol.len(), 256);
        assert_eq!(codes.length.symbol.len(), 16);
        assert_eq!(codes.distance.symbol.len(), 64);
    }

    #[test]
    fn test_raw_literals_then_exhaustion() {
        let out = explode(&[0x00, 0x04, 0x82, 0x08, 0x01], 16).expect("Test operation should succeed");
        assert_eq!(out, b"AB");
    }

    #[test]
    fn test_match_and_end_marker() {
        let data = [0x00, 0x04, 0xC2, 0x88, 0x19, 0xAB, 0x4B, 0xC0, 0x3F];
        let out = explode(&data, 64).expect("Test operation should succeed");
        assert_eq!(out, b"abcabcabc");
    }

    #[test]
    fn test_output_bounded_by_limit() {
        let data = [0x00, 0x04, 0xC2, 0x88, 0x19, 0xAB, 0x4B, 0xC0, 0x3F];
        let out = explode(&data, 5).expect("Test operation should succeed");
        assert_eq!(out, b"abcab");
    }

    #[test]
    fn test_bad_header() {
        assert!(explode(&[0x02, 0x04, 0x00], 16).is_err());
        assert!(explode(&[0x00, 0x07, 0x00], 16).is_err());
        assert!(explode(&[0x00], 16).is_err());
    }

    #[test]
    fn test_empty_output_is_error() {
        let err = explode(&[0x00, 0x04], 16).expect_err("Should reject empty output");
        assert_eq!(err.codec(), Some(Codec::Explode));
    }
}
