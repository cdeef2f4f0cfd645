//! Geometry of the coefficient buffer for one frame.

use super::{Component, Subsampling};
use crate::error::{PipelineError, PipelineResult};

pub const BLOCK_LEN: usize = 64;

/// Largest width or height a baseline SOF0 segment can carry.
pub const MAX_DIMENSION: u32 = u16::MAX as u32;

/// Block-interleaved layout for a block-aligned surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FrameLayout {
    pub width: u32,
    pub height: u32,
    pub subsampling: Subsampling,
    pub mcus_x: u32,
    pub mcus_y: u32,
}

impl FrameLayout {
    /// Fails when the dimensions are zero, exceed [`MAX_DIMENSION`] or are not
    /// multiples of the MCU size.
    pub fn new(width: u32, height: u32, subsampling: Subsampling) -> PipelineResult<Self> {
        if width > MAX_DIMENSION || height > MAX_DIMENSION {
            return Err(PipelineError::validation(
                "surface",
                format!("at most {} pixels per side", MAX_DIMENSION),
                format!("{}x{}", width, height),
            ));
        }
        let (mw, mh) = subsampling.mcu_size();
        if width == 0 || height == 0 || width % mw != 0 || height % mh != 0 {
            return Err(PipelineError::validation(
                "surface",
                format!("positive multiple of {}x{} for {}", mw, mh, subsampling),
                format!("{}x{}", width, height),
            ));
        }
        Ok(Self {
            width,
            height,
            subsampling,
            mcus_x: width / mw,
            mcus_y: height / mh,
        })
    }

    pub fn mcu_count(&self) -> usize {
        self.mcus_x as usize * self.mcus_y as usize
    }

    pub fn blocks_per_mcu(&self) -> usize {
        self.subsampling.blocks_per_mcu()
    }

    pub fn total_blocks(&self) -> usize {
        self.mcu_count() * self.blocks_per_mcu()
    }

    /// Number of `i32` coefficients the compute stage writes.
    pub fn coefficient_len(&self) -> usize {
        self.total_blocks() * BLOCK_LEN
    }

    /// Dispatch grid: one workgroup per MCU.
    pub fn dispatch_groups(&self) -> [u32; 3] {
        [self.mcus_x, self.mcus_y, 1]
    }

    /// Block slots inside an MCU that belong to `component`.
    pub fn block_range(&self, component: Component) -> std::ops::Range<usize> {
        let luma = self.subsampling.luma_blocks_per_mcu();
        match component {
            Component::Y => 0..luma,
            Component::Cb => luma..luma + 1,
            Component::Cr => luma + 1..luma + 2,
        }
    }

    /// Component owning block `slot` of an MCU.
    pub fn component_of(&self, slot: usize) -> Component {
        let luma = self.subsampling.luma_blocks_per_mcu();
        if slot < luma {
            Component::Y
        } else if slot == luma {
            Component::Cb
        } else {
            Component::Cr
        }
    }
}
