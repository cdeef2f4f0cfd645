// SPDX-License-Identifier: MIT
//! # Surface Plan Computation
//!
//! Turns (source size, output scale, block alignment) into the three sizes the
//! resample step needs:
//!
//! 1. **input**: the frame as rendered
//! 2. **scaled**: `floor(input × scale)`, at least 1px per axis
//! 3. **out**: `scaled` fitted to the alignment grid
//!
//! All computations are O(1). Plans are plain `Copy` values so callers can cache
//! them by size and compare them cheaply between frames.

use std::fmt;

/// Represents a 2D size with width and height in pixels.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Size {
    pub w: u32,
    pub h: u32,
}

impl Size {
    pub const fn new(w: u32, h: u32) -> Self {
        Self { w, h }
    }

    /// Number of pixels covered by this size.
    pub fn area(self) -> usize {
        self.w as usize * self.h as usize
    }

    /// True when both axes are multiples of `align`.
    pub fn is_aligned_to(self, align: Size) -> bool {
        align.w != 0 && align.h != 0 && self.w % align.w == 0 && self.h % align.h == 0
    }
}

/// Complete surface plan computed from input parameters.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SurfacePlan {
    /// Original frame dimensions
    pub input: Size,
    /// Requested output scale in (0, 1]
    pub scale: f32,
    /// Dimensions after resampling, before block alignment
    pub scaled: Size,
    /// Final block-aligned dimensions
    pub out: Size,
}

impl SurfacePlan {
    /// The source can be consumed as-is: no resample and no edge fitting.
    pub fn is_passthrough(&self) -> bool {
        self.scaled == self.input && self.out == self.input
    }

    /// A filtered resize is required before fitting.
    pub fn needs_resample(&self) -> bool {
        self.scaled != self.input
    }
}

/// Reasons a plan cannot be built.
#[derive(Debug, Clone, PartialEq)]
pub enum PlanError {
    EmptyInput,
    ScaleOutOfRange(f32),
    ZeroAlignment,
}

impl fmt::Display for PlanError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlanError::EmptyInput => write!(f, "Input surface has a zero dimension"),
            PlanError::ScaleOutOfRange(s) => write!(f, "Output scale {} is outside (0, 1]", s),
            PlanError::ZeroAlignment => write!(f, "Block alignment must be non-zero"),
        }
    }
}

impl std::error::Error for PlanError {}

/// Compute a surface plan.
///
/// # Arguments
/// * `input` - Source frame dimensions
/// * `scale` - Output scale, must satisfy `0 < scale <= 1`
/// * `align` - Block granularity per axis (8 or 16)
///
/// # Returns
/// A plan whose `out` size is always positive and a multiple of `align`.
pub fn build_plan(input: Size, scale: f32, align: Size) -> Result<SurfacePlan, PlanError> {
    if input.w == 0 || input.h == 0 {
        return Err(PlanError::EmptyInput);
    }
    // Written this way so NaN is rejected too.
    if !(scale > 0.0 && scale <= 1.0) {
        return Err(PlanError::ScaleOutOfRange(scale));
    }
    if align.w == 0 || align.h == 0 {
        return Err(PlanError::ZeroAlignment);
    }

    let scaled = if scale == 1.0 {
        input
    } else {
        Size {
            w: scale_dim(input.w, scale),
            h: scale_dim(input.h, scale),
        }
    };
    let out = Size {
        w: align_dim(scaled.w, align.w),
        h: align_dim(scaled.h, align.h),
    };

    Ok(SurfacePlan {
        input,
        scale,
        scaled,
        out,
    })
}

fn scale_dim(dim: u32, scale: f32) -> u32 {
    ((dim as f64 * scale as f64).floor() as u32).max(1)
}

/// Round down to the grid; anything under one unit becomes exactly one unit.
fn align_dim(dim: u32, align: u32) -> u32 {
    let down = dim / align * align;
    if down == 0 { align } else { down }
}
