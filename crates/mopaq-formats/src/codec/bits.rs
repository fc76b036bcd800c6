//! Least-significant-bit-first reader shared by the bitstream codecs

/// Reads bit fields from a byte slice, low bits of each byte first
pub(crate) struct BitReader<'a> {
    data: &'a [u8],
    pos: usize,
    buffer: u32,
    available: u32,
}

impl<'a> BitReader<'a> {
    pub(crate) fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            pos: 0,
            buffer: 0,
            available: 0,
        }
    }

    /// Next `count` bits (at most 16), or `None` once the input is exhausted
    pub(crate) fn bits(&mut self, count: u32) -> Option<u32> {
        debug_assert!(count <= 16);
        while self.available < count {
            let byte = *self.data.get(self.pos)?;
            self.pos += 1;
            self.buffer |= u32::from(byte) << self.available;
            self.available += 8;
        }

        let value = self.buffer & ((1u32 << count) - 1);
        self.buffer >>= count;
        self.available -= count;
        Some(value)
    }

    #[inline]
    pub(crate) fn bit(&mut self) -> Option<u32> {
        self.bits(1)
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_lsb_first() {
        let mut reader = BitReader::new(&[0b1010_0110, 0xFF]);
        assert_eq!(reader.bit(), Some(0));
        assert_eq!(reader.bit(), Some(1));
        assert_eq!(reader.bits(2), Some(0b01));
        assert_eq!(reader.bits(8), Some(0xFA));
        assert_eq!(reader.bits(4), Some(0xF));
        assert_eq!(reader.bit(), None);
    }

    #[test]
    fn test_zero_width_read() {
        let mut reader = BitReader::new(&[]);
        assert_eq!(reader.bits(0), Some(0));
        assert_eq!(reader.bit(), None);
    }
}
