//! # Baseline JPEG Core
//!
//! Everything the CPU side needs to turn a quantized coefficient buffer into a
//! standalone baseline JPEG: the Annex K tables, quality scaling, the fixed
//! header, the block layout shared with the compute kernels, and the entropy
//! coder.
//!
//! ## Block Layout
//!
//! Coefficients are stored MCU-interleaved. Each MCU holds its luma blocks in
//! raster order, then one Cb block, then one Cr block; each block is 64
//! values in natural (row-major) order.
//!
//! | Mode | Luma sampling | MCU size | Blocks per MCU |
//! |------|---------------|----------|----------------|
//! | 4:4:4 | 1×1 | 8×8 | 3 |
//! | 4:2:2 | 2×1 | 16×8 | 4 |
//! | 4:2:0 | 2×2 | 16×16 | 6 |

use std::{fmt, str::FromStr};

use crate::error::PipelineError;

pub mod bitstream;
pub mod entropy;
pub mod header;
pub mod huffman;
pub mod layout;
pub mod quant;
pub mod tables;

pub use entropy::{BlockTrace, EntropyEncoder};
pub use header::{HEADER_LEN, HeaderCache};
pub use layout::{FrameLayout, MAX_DIMENSION};
pub use quant::{QuantTables, quality_scale};

/// Chroma subsampling mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Subsampling {
    S444,
    S422,
    S420,
}

impl Subsampling {
    pub const ALL: [Subsampling; 3] = [Subsampling::S444, Subsampling::S422, Subsampling::S420];

    /// Luma sampling factors `(h, v)`; chroma is always 1×1.
    pub const fn luma_factors(self) -> (u32, u32) {
        match self {
            Subsampling::S444 => (1, 1),
            Subsampling::S422 => (2, 1),
            Subsampling::S420 => (2, 2),
        }
    }

    /// MCU size in pixels, which is also the surface alignment.
    pub const fn mcu_size(self) -> (u32, u32) {
        let (h, v) = self.luma_factors();
        (8 * h, 8 * v)
    }

    pub const fn luma_blocks_per_mcu(self) -> usize {
        let (h, v) = self.luma_factors();
        (h * v) as usize
    }

    pub const fn blocks_per_mcu(self) -> usize {
        self.luma_blocks_per_mcu() + 2
    }

    pub const fn index(self) -> usize {
        match self {
            Subsampling::S444 => 0,
            Subsampling::S422 => 1,
            Subsampling::S420 => 2,
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Subsampling::S444 => "4:4:4",
            Subsampling::S422 => "4:2:2",
            Subsampling::S420 => "4:2:0",
        }
    }
}

impl fmt::Display for Subsampling {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Subsampling {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "444" | "4:4:4" => Ok(Subsampling::S444),
            "422" | "4:2:2" => Ok(Subsampling::S422),
            "420" | "4:2:0" => Ok(Subsampling::S420),
            _ => Err(PipelineError::validation(
                "subsampling",
                "expected 444, 422 or 420",
                s,
            )),
        }
    }
}

/// Image component, in scan order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Component {
    Y,
    Cb,
    Cr,
}

impl Component {
    pub const ALL: [Component; 3] = [Component::Y, Component::Cb, Component::Cr];

    pub const fn index(self) -> usize {
        match self {
            Component::Y => 0,
            Component::Cb => 1,
            Component::Cr => 2,
        }
    }

    /// Table selector: 0 for luma, 1 for both chroma channels.
    pub const fn table_id(self) -> u8 {
        match self {
            Component::Y => 0,
            Component::Cb | Component::Cr => 1,
        }
    }

    pub const fn is_luma(self) -> bool {
        matches!(self, Component::Y)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_geometry() {
        assert_eq!(Subsampling::S444.mcu_size(), (8, 8));
        assert_eq!(Subsampling::S422.mcu_size(), (16, 8));
        assert_eq!(Subsampling::S420.mcu_size(), (16, 16));
        assert_eq!(Subsampling::S420.blocks_per_mcu(), 6);
        assert_eq!(Subsampling::S422.blocks_per_mcu(), 4);
        assert_eq!(Subsampling::S444.blocks_per_mcu(), 3);
    }

    #[test]
    fn test_parse_subsampling() {
        assert_eq!("420".parse::<Subsampling>().unwrap(), Subsampling::S420);
        assert_eq!("4:2:2".parse::<Subsampling>().unwrap(), Subsampling::S422);
        assert_eq!(" 444 ".parse::<Subsampling>().unwrap(), Subsampling::S444);
        assert!("411".parse::<Subsampling>().is_err());
    }

    #[test]
    fn test_chroma_shares_tables() {
        assert_eq!(Component::Cb.table_id(), Component::Cr.table_id());
        assert_ne!(Component::Y.table_id(), Component::Cb.table_id());
    }
}
