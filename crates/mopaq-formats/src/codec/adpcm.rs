//! 4-bit IMA ADPCM stage for mono and stereo audio sectors
//!
//! Layout: one ignored byte, one bit-shift byte, then an initial 16-bit
//! sample per channel, then one byte per sample. Bytes with the high bit set
//! are control codes rather than samples.

use super::Codec;
use super::error::{CodecError, CodecResult};

const INITIAL_STEP_INDEX: usize = 0x2C;
const MAX_STEP_INDEX: usize = 0x58;

const STEP_SIZES: [i32; 89] = [
    7, 8, 9, 10, 11, 12, 13, 14, 16, 17, 19, 21, 23, 25, 28, 31, 34, 37, 41, 45, 50, 55, 60, 66, 73,
    80, 88, 97, 107, 118, 130, 143, 157, 173, 190, 209, 230, 253, 279, 307, 337, 371, 408, 449, 494,
    544, 598, 658, 724, 796, 876, 963, 1060, 1166, 1282, 1411, 1552, 1707, 1878, 2066, 2272, 2499,
    2749, 3024, 3327, 3660, 4026, 4428, 4871, 5358, 5894, 6484, 7132, 7845, 8630, 9493, 10442,
    11487, 12635, 13899, 15289, 16818, 18500, 20350, 22385, 24623, 27086, 29794, 32767,
];

const NEXT_STEP: [isize; 32] = [
    -1, 0, -1, 4, -1, 2, -1, 6, -1, 1, -1, 5, -1, 3, -1, 7, -1, 1, -1, 5, -1, 3, -1, 7, -1, 2, -1,
    4, -1, 6, -1, 8,
];

/// Number of interleaved channels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channels {
    /// One channel
    Mono = 1,
    /// Two interleaved channels
    Stereo = 2,
}

impl Channels {
    fn codec(self) -> Codec {
        match self {
            Self::Mono => Codec::AdpcmMono,
            Self::Stereo => Codec::AdpcmStereo,
        }
    }
}

/// Bounded little-endian sample sink
struct SampleWriter {
    out: Vec<u8>,
    limit: usize,
}

impl SampleWriter {
    /// Append a sample; `false` once the output is full
    fn push(&mut self, sample: i16) -> bool {
        if self.out.len() + 2 > self.limit {
            return false;
        }
        self.out.extend_from_slice(&sample.to_le_bytes());
        true
    }
}

fn decode_sample(predicted: i32, encoded: u8, step: i32, shift: u32) -> i32 {
    let mut difference = step.checked_shr(shift).unwrap_or(0);
    for bit in 0..6 {
        if encoded & (1 << bit) != 0 {
            difference += step >> bit;
        }
    }

    if encoded & 0x40 != 0 {
        (predicted - difference).max(i32::from(i16::MIN))
    } else {
        (predicted + difference).min(i32::from(i16::MAX))
    }
}

fn next_step_index(index: usize, encoded: u8) -> usize {
    let next = index as isize + NEXT_STEP[usize::from(encoded & 0x1F)];
    next.clamp(0, (STEP_SIZES.len() - 1) as isize) as usize
}

/// Decode ADPCM `data` into 16-bit PCM of at most `limit` bytes
pub fn decode(data: &[u8], channels: Channels, limit: usize) -> CodecResult<Vec<u8>> {
    let codec = channels.codec();
    let count = channels as usize;

    if data.len() < 2 {
        return Err(CodecError::decode(codec, "missing stream header"));
    }
    let shift = u32::from(data[1]);
    let mut input = data[2..].iter().copied();

    let mut writer = SampleWriter {
        out: Vec::with_capacity(limit),
        limit,
    };
    let mut predicted = [0i32; 2];
    let mut step_index = [INITIAL_STEP_INDEX; 2];

    for slot in predicted.iter_mut().take(count) {
        let (Some(lo), Some(hi)) = (input.next(), input.next()) else {
            return finish(writer.out, codec);
        };
        let initial = i16::from_le_bytes([lo, hi]);
        *slot = i32::from(initial);
        if !writer.push(initial) {
            return finish(writer.out, codec);
        }
    }

    let mut channel = count - 1;
    for encoded in input {
        channel = (channel + 1) % count;

        if encoded & 0x80 != 0 {
            match encoded & 0x7F {
                // Repeat the previous sample
                0 => {
                    step_index[channel] = step_index[channel].saturating_sub(1);
                    if !writer.push(predicted[channel] as i16) {
                        break;
                    }
                }
                1 => {
                    step_index[channel] = (step_index[channel] + 8).min(MAX_STEP_INDEX);
                    channel = (channel + 1) % count;
                }
                2 => channel = (channel + 1) % count,
                // 3 and every unassigned code lower the step index
                _ => {
                    step_index[channel] = step_index[channel].saturating_sub(8);
                    channel = (channel + 1) % count;
                }
            }
        } else {
            let index = step_index[channel];
            predicted[channel] =
                decode_sample(predicted[channel], encoded, STEP_SIZES[index], shift);
            if !writer.push(predicted[channel] as i16) {
                break;
            }
            step_index[channel] = next_step_index(index, encoded);
        }
    }

    finish(writer.out, codec)
}

fn finish(out: Vec<u8>, codec: Codec) -> CodecResult<Vec<u8>> {
    if out.is_empty() {
        Err(CodecError::decode(codec, "stream produced no samples"))
    } else {
        Ok(out)
    }
}
