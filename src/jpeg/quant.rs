//! Quality-scaled quantization tables.
//!
//! The same [`QuantTables`] value feeds the compute kernels (natural order) and
//! the DQT header segment (zigzag order), so the decoder always dequantizes
//! with exactly the divisors the kernels used.

use super::tables::{STD_CHROMINANCE_QUANT, STD_LUMINANCE_QUANT, ZIGZAG};

/// Standard JPEG quality scaling: `q < 50 ? 5000 / q : 200 - 2q`, at least 1.
///
/// `quality` is clamped to 1..=100 first.
pub fn quality_scale(quality: u8) -> u32 {
    let q = quality.clamp(1, 100) as u32;
    let scale = if q < 50 { 5000 / q } else { 200 - 2 * q };
    scale.max(1)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuantTables {
    pub quality: u8,
    /// Luma divisors, natural order.
    pub luma: [u16; 64],
    /// Chroma divisors, natural order.
    pub chroma: [u16; 64],
}

impl QuantTables {
    pub fn for_quality(quality: u8) -> Self {
        let scale = quality_scale(quality);
        let build = |base: &[u8; 64]| {
            let mut out = [0u16; 64];
            for (o, &b) in out.iter_mut().zip(base.iter()) {
                *o = ((b as u32 * scale + 50) / 100).clamp(1, 255) as u16;
            }
            out
        };
        Self {
            quality: quality.clamp(1, 100),
            luma: build(&STD_LUMINANCE_QUANT),
            chroma: build(&STD_CHROMINANCE_QUANT),
        }
    }

    /// Divisors for a table id (0 luma, 1 chroma).
    pub fn table(&self, id: u8) -> &[u16; 64] {
        if id == 0 { &self.luma } else { &self.chroma }
    }

    /// Table in zigzag order, as written to DQT.
    pub fn zigzag(&self, id: u8) -> [u8; 64] {
        let natural = self.table(id);
        let mut out = [0u8; 64];
        for (k, &n) in ZIGZAG.iter().enumerate() {
            out[k] = natural[n] as u8;
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scale_branch_boundary() {
        assert_eq!(quality_scale(1), 5000);
        assert_eq!(quality_scale(50), 100);
        assert_eq!(quality_scale(51), 98);
        assert_eq!(quality_scale(99), 2);
        // 200 - 200 = 0, lifted to the minimum.
        assert_eq!(quality_scale(100), 1);
        assert_eq!(quality_scale(0), 5000);
    }

    #[test]
    fn test_quality_50_is_base_table() {
        let t = QuantTables::for_quality(50);
        assert_eq!(t.luma[0], 16);
        assert_eq!(t.chroma[0], 17);
        assert_eq!(t.luma[63], 99);
    }

    #[test]
    fn test_extremes_stay_in_range() {
        let low = QuantTables::for_quality(1);
        assert!(low.luma.iter().all(|&v| v == 255 || (1..=255).contains(&v)));
        assert_eq!(low.luma[0], 255);
        let high = QuantTables::for_quality(100);
        assert!(high.luma.iter().chain(high.chroma.iter()).all(|&v| v == 1));
    }

    #[test]
    fn test_zigzag_output() {
        let t = QuantTables::for_quality(50);
        let z = t.zigzag(0);
        assert_eq!(z[0], 16);
        assert_eq!(z[1], 11); // natural 1
        assert_eq!(z[2], 12); // natural 8
    }
}
