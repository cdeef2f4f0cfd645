// SPDX-License-Identifier: MIT
// CPU resampler built on fast_image_resize (SIMD-accelerated).
// RGBA8 in → RGBA8 out, written straight into caller-provided buffers.

use fast_image_resize as fir;
use fir::images::{TypedImage, TypedImageRef};
use fir::pixels::U8x4;
use fir::{ResizeOptions, Resizer};

use crate::plan::{Size, SurfacePlan};

#[derive(Debug)]
pub enum ScaleError {
    SourceTooSmall { needed: usize, got: usize },
    BufferTooSmall { needed: usize, got: usize },
    Fir(fir::ResizeError),
    ImageBuf(fir::ImageBufferError),
}

impl From<fir::ResizeError> for ScaleError { fn from(e: fir::ResizeError) -> Self { Self::Fir(e) } }
impl From<fir::ImageBufferError> for ScaleError { fn from(e: fir::ImageBufferError) -> Self { Self::ImageBuf(e) } }

impl std::fmt::Display for ScaleError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScaleError::SourceTooSmall { needed, got } => {
                write!(f, "Source buffer too small: need {} bytes, got {}", needed, got)
            }
            ScaleError::BufferTooSmall { needed, got } => {
                write!(f, "Output buffer too small: need {} bytes, got {}", needed, got)
            }
            ScaleError::Fir(e) => write!(f, "Fast image resize error: {}", e),
            ScaleError::ImageBuf(e) => write!(f, "Image buffer error: {}", e),
        }
    }
}

impl std::error::Error for ScaleError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ScaleError::Fir(e) => Some(e),
            ScaleError::ImageBuf(e) => Some(e),
            _ => None,
        }
    }
}

fn rgba_len(size: Size) -> usize {
    size.area() * 4
}

/// Bilinear resize of a tightly packed RGBA8 image.
/// `dst` must hold at least `dst_size.w * dst_size.h * 4` bytes.
pub fn scale_rgba_cpu(
    resizer: &mut Resizer,
    src_rgba: &[u8],
    src_size: Size,
    dst: &mut [u8],
    dst_size: Size,
) -> Result<(), ScaleError> {
    let src_len = rgba_len(src_size);
    if src_rgba.len() < src_len {
        return Err(ScaleError::SourceTooSmall { needed: src_len, got: src_rgba.len() });
    }
    let dst_len = rgba_len(dst_size);
    if dst.len() < dst_len {
        return Err(ScaleError::BufferTooSmall { needed: dst_len, got: dst.len() });
    }

    let src_view = TypedImageRef::<U8x4>::from_buffer(src_size.w, src_size.h, &src_rgba[..src_len])?;
    let mut dst_image = TypedImage::<U8x4>::from_buffer(dst_size.w, dst_size.h, &mut dst[..dst_len])?;

    // Alpha is ignored downstream; skip premultiplication.
    let opts = ResizeOptions::new()
        .resize_alg(fir::ResizeAlg::Convolution(fir::FilterType::Bilinear))
        .use_alpha(false);
    resizer.resize_typed::<U8x4>(&src_view, &mut dst_image, &opts)?;
    Ok(())
}

/// Copy `src` into `dst`, cropping extra pixels and repeating the last
/// row/column where `dst` is larger.
pub fn fit_clamp_to_edge(
    src_rgba: &[u8],
    src_size: Size,
    dst: &mut [u8],
    dst_size: Size,
) -> Result<(), ScaleError> {
    let src_len = rgba_len(src_size);
    if src_rgba.len() < src_len || src_size.w == 0 || src_size.h == 0 {
        return Err(ScaleError::SourceTooSmall { needed: src_len.max(4), got: src_rgba.len() });
    }
    let dst_len = rgba_len(dst_size);
    if dst.len() < dst_len {
        return Err(ScaleError::BufferTooSmall { needed: dst_len, got: dst.len() });
    }

    let src_row = src_size.w as usize * 4;
    let dst_row = dst_size.w as usize * 4;
    let copy_w = src_size.w.min(dst_size.w) as usize;

    for y in 0..dst_size.h as usize {
        let sy = y.min(src_size.h as usize - 1);
        let s = &src_rgba[sy * src_row..sy * src_row + src_row];
        let d = &mut dst[y * dst_row..(y + 1) * dst_row];
        d[..copy_w * 4].copy_from_slice(&s[..copy_w * 4]);
        if copy_w < dst_size.w as usize {
            let last = [s[src_row - 4], s[src_row - 3], s[src_row - 2], s[src_row - 1]];
            for px in d[copy_w * 4..].chunks_exact_mut(4) {
                px.copy_from_slice(&last);
            }
        }
    }
    Ok(())
}

/// Run a full plan: optional resample into `scratch`, then fit into `dst`.
///
/// `scratch` is grown on demand and can be reused across frames.
pub fn apply_plan(
    resizer: &mut Resizer,
    src_rgba: &[u8],
    plan: &SurfacePlan,
    scratch: &mut Vec<u8>,
    dst: &mut [u8],
) -> Result<(), ScaleError> {
    if plan.needs_resample() {
        let len = rgba_len(plan.scaled);
        if scratch.len() < len {
            scratch.resize(len, 0);
        }
        scale_rgba_cpu(resizer, src_rgba, plan.input, &mut scratch[..len], plan.scaled)?;
        fit_clamp_to_edge(&scratch[..len], plan.scaled, dst, plan.out)
    } else {
        fit_clamp_to_edge(src_rgba, plan.input, dst, plan.out)
    }
}
