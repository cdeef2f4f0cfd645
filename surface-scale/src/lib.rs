// SPDX-License-Identifier: MIT
//! # surface-scale: Block-Aligned Surface Preparation
//!
//! This crate computes and executes the resample step that sits in front of the
//! JPEG compute stage. A rendered frame is scaled by an output factor and then
//! fitted to the block grid of the active chroma subsampling mode, so the
//! compute kernels never see a partial 8×8 block or a partial MCU.
//!
//! ## Key Components
//!
//! - [`plan`]: Pure size arithmetic (scale, floor, align, clamp)
//! - [`cpu`]: RGBA resampling via fast_image_resize plus clamp-to-edge fitting
//!
//! ## Alignment Rule
//!
//! The scaled size is rounded *down* to the alignment so the output never grows
//! past the requested scale. A dimension smaller than one alignment unit is
//! padded up to exactly one unit instead. Padding repeats the last row/column
//! (clamp-to-edge), which keeps the seam identical from frame to frame.
//!
//! ## Usage Example
//!
//! ```rust
//! use surface_scale::plan::{build_plan, Size};
//!
//! let plan = build_plan(Size { w: 1920, h: 1080 }, 0.5, Size { w: 16, h: 16 }).unwrap();
//! assert_eq!(plan.scaled, Size { w: 960, h: 540 });
//! assert_eq!(plan.out, Size { w: 960, h: 528 });
//! ```

pub mod cpu;
pub mod plan;
