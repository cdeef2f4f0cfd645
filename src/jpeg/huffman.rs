//! Canonical Huffman code tables for the four standard baseline tables.

use once_cell::sync::Lazy;

use super::Component;
use super::tables::{
    AC_CHROMA_BITS, AC_CHROMA_VALS, AC_LUMA_BITS, AC_LUMA_VALS, DC_CHROMA_BITS, DC_CHROMA_VALS,
    DC_LUMA_BITS, DC_LUMA_VALS,
};

/// Huffman code: (code, length in bits).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HuffCode {
    pub code: u16,
    pub length: u8,
}

/// Symbol → code lookup for one table.
#[derive(Debug, Clone)]
pub struct HuffTable {
    codes: [HuffCode; 256],
}

impl HuffTable {
    /// Build canonical codes from a DHT-style `bits`/`vals` pair.
    pub fn from_counts(bits: &[u8; 16], vals: &[u8]) -> Self {
        let mut codes = [HuffCode::default(); 256];
        let mut code = 0u16;
        let mut val_idx = 0usize;

        for (length, &count) in bits.iter().enumerate() {
            for _ in 0..count {
                if let Some(&symbol) = vals.get(val_idx) {
                    codes[symbol as usize] = HuffCode {
                        code,
                        length: (length + 1) as u8,
                    };
                    val_idx += 1;
                }
                code += 1;
            }
            code <<= 1;
        }

        Self { codes }
    }

    #[inline]
    pub fn code(&self, symbol: u8) -> HuffCode {
        self.codes[symbol as usize]
    }
}

/// DC and AC tables for one table class.
pub struct TablePair {
    pub dc: HuffTable,
    pub ac: HuffTable,
}

static LUMA: Lazy<TablePair> = Lazy::new(|| TablePair {
    dc: HuffTable::from_counts(&DC_LUMA_BITS, &DC_LUMA_VALS),
    ac: HuffTable::from_counts(&AC_LUMA_BITS, &AC_LUMA_VALS),
});

static CHROMA: Lazy<TablePair> = Lazy::new(|| TablePair {
    dc: HuffTable::from_counts(&DC_CHROMA_BITS, &DC_CHROMA_VALS),
    ac: HuffTable::from_counts(&AC_CHROMA_BITS, &AC_CHROMA_VALS),
});

/// Tables for a component: luma for Y, the shared chroma pair for Cb and Cr.
pub fn tables_for(component: Component) -> &'static TablePair {
    if component.is_luma() { &LUMA } else { &CHROMA }
}

/// Magnitude category (number of bits needed for `value`).
#[inline]
pub fn category(value: i32) -> u8 {
    let abs = value.unsigned_abs();
    (32 - abs.leading_zeros()) as u8
}

/// Additional bits for `value`: the value itself when positive, the
/// one's complement when negative, masked to its category.
#[inline]
pub fn magnitude_bits(value: i32) -> (u32, u8) {
    let cat = category(value);
    if cat == 0 {
        return (0, 0);
    }
    let raw = if value < 0 { value - 1 } else { value } as u32;
    (raw & ((1u32 << cat) - 1), cat)
}
