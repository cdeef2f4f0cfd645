//! MSB-first bit packing with JPEG byte stuffing.

/// Packs bits MSB-first; every emitted `0xFF` is followed by a stuffed `0x00`.
///
/// The output vector is retained across frames so steady-state encoding does
/// not reallocate.
#[derive(Debug, Default)]
pub struct BitWriter {
    buffer: Vec<u8>,
    acc: u32,
    bits: u8,
}

impl BitWriter {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buffer: Vec::with_capacity(capacity),
            acc: 0,
            bits: 0,
        }
    }

    /// Clear state but keep the allocation.
    pub fn reset(&mut self) {
        self.buffer.clear();
        self.acc = 0;
        self.bits = 0;
    }

    /// Write the low `count` bits of `value` (count ≤ 16).
    #[inline]
    pub fn write_bits(&mut self, value: u32, count: u8) {
        debug_assert!(count <= 16);
        if count == 0 {
            return;
        }
        let mask = (1u32 << count) - 1;
        self.acc = (self.acc << count) | (value & mask);
        self.bits += count;
        while self.bits >= 8 {
            self.bits -= 8;
            let byte = (self.acc >> self.bits) as u8;
            self.push_stuffed(byte);
        }
        // Drop consumed high bits so the accumulator never overflows.
        self.acc &= (1u32 << self.bits) - 1;
    }

    #[inline]
    fn push_stuffed(&mut self, byte: u8) {
        self.buffer.push(byte);
        if byte == 0xFF {
            self.buffer.push(0x00);
        }
    }

    /// Pad the final partial byte with 1-bits.
    pub fn flush(&mut self) {
        if self.bits > 0 {
            let pad = 8 - self.bits;
            self.write_bits((1u32 << pad) - 1, pad);
        }
    }

    /// Append a marker verbatim (no stuffing); call after [`flush`](Self::flush).
    pub fn write_marker(&mut self, marker: u8) {
        debug_assert_eq!(self.bits, 0);
        self.buffer.extend_from_slice(&[0xFF, marker]);
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buffer
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty() && self.bits == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_msb_first_packing() {
        let mut w = BitWriter::default();
        w.write_bits(0b101, 3);
        w.write_bits(0b00001, 5);
        assert_eq!(w.as_bytes(), &[0b1010_0001]);
    }

    #[test]
    fn test_ff_is_stuffed() {
        let mut w = BitWriter::default();
        w.write_bits(0xFF, 8);
        w.write_bits(0x12, 8);
        assert_eq!(w.as_bytes(), &[0xFF, 0x00, 0x12]);
    }

    #[test]
    fn test_padding_uses_ones() {
        let mut w = BitWriter::default();
        w.write_bits(0b0, 1);
        w.flush();
        assert_eq!(w.as_bytes(), &[0b0111_1111]);
    }

    #[test]
    fn test_padding_that_produces_ff_is_stuffed() {
        let mut w = BitWriter::default();
        w.write_bits(0b111, 3);
        w.flush();
        assert_eq!(w.as_bytes(), &[0xFF, 0x00]);
    }

    #[test]
    fn test_reset_keeps_capacity() {
        let mut w = BitWriter::with_capacity(64);
        w.write_bits(0xABCD, 16);
        w.reset();
        assert!(w.is_empty());
        assert!(w.buffer.capacity() >= 64);
    }
}
