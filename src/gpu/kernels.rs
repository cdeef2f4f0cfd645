//! Compute kernels of the JPEG stage.
//!
//! One workgroup per MCU. A dispatch handles a single component: the luma
//! variant fills the Y blocks of every MCU, the chroma variants fill the Cb or
//! Cr block. Workgroups are spread over the rayon pool; each one writes a
//! disjoint slice of the output, and the per-block math has a fixed
//! evaluation order, so results are bit-identical from run to run.

use once_cell::sync::Lazy;
use rayon::prelude::*;

use super::ShaderVariant;
use super::command::DispatchConstants;
use crate::error::{PipelineError, PipelineResult};
use crate::jpeg::entropy::{AC_LIMIT, DC_MAX, DC_MIN};
use crate::jpeg::layout::{BLOCK_LEN, FrameLayout};
use crate::jpeg::Component;

/// `DCT_MATRIX[u][x] = C(u)/2 · cos((2x+1)uπ/16)`, `C(0) = 1/√2`.
static DCT_MATRIX: Lazy<[[f32; 8]; 8]> = Lazy::new(|| {
    let mut m = [[0f32; 8]; 8];
    for (u, row) in m.iter_mut().enumerate() {
        let c = if u == 0 { std::f64::consts::FRAC_1_SQRT_2 } else { 1.0 };
        for (x, v) in row.iter_mut().enumerate() {
            let angle = ((2 * x + 1) * u) as f64 * std::f64::consts::PI / 16.0;
            *v = (0.5 * c * angle.cos()) as f32;
        }
    }
    m
});

/// BT.601 full-range RGB → YCbCr.
#[inline]
pub fn rgb_to_ycbcr(r: f32, g: f32, b: f32) -> (f32, f32, f32) {
    let y = 0.299 * r + 0.587 * g + 0.114 * b;
    let cb = -0.168_736 * r - 0.331_264 * g + 0.5 * b + 128.0;
    let cr = 0.5 * r - 0.418_688 * g - 0.081_312 * b + 128.0;
    (y, cb, cr)
}

/// Separable 8×8 forward DCT on level-shifted samples (row-major).
pub fn forward_dct(input: &[f32; 64]) -> [f32; 64] {
    let m = &*DCT_MATRIX;
    let mut rows = [0f32; 64];
    for y in 0..8 {
        for u in 0..8 {
            let mut acc = 0f32;
            for x in 0..8 {
                acc += m[u][x] * input[y * 8 + x];
            }
            rows[y * 8 + u] = acc;
        }
    }
    let mut out = [0f32; 64];
    for v in 0..8 {
        for u in 0..8 {
            let mut acc = 0f32;
            for y in 0..8 {
                acc += m[v][y] * rows[y * 8 + u];
            }
            out[v * 8 + u] = acc;
        }
    }
    out
}

/// Divide, round half away from zero, clamp to the baseline range.
pub fn quantize(coefficients: &[f32; 64], divisors: &[u16; 64], out: &mut [i32]) {
    for (i, (&c, &q)) in coefficients.iter().zip(divisors.iter()).enumerate() {
        let v = (c / q as f32).round() as i32;
        out[i] = if i == 0 {
            v.clamp(DC_MIN, DC_MAX)
        } else {
            v.clamp(-AC_LIMIT, AC_LIMIT)
        };
    }
}

/// Validate a dispatch and return the layout it addresses.
pub fn validate_dispatch(
    variant: ShaderVariant,
    pixel_len: usize,
    constants: &DispatchConstants,
    groups: [u32; 3],
    output_len: usize,
) -> PipelineResult<FrameLayout> {
    let layout = FrameLayout::new(constants.width, constants.height, variant.subsampling)?;
    let expected_pixels = constants.width as usize * constants.height as usize * 4;
    if pixel_len != expected_pixels {
        return Err(PipelineError::contract(
            "dispatch source texture bytes",
            expected_pixels,
            pixel_len,
        ));
    }
    let needed_groups = layout.dispatch_groups();
    if groups[0] < needed_groups[0] || groups[1] < needed_groups[1] || groups[2] == 0 {
        return Err(PipelineError::contract(
            "dispatch workgroups",
            layout.mcu_count(),
            groups[0] as usize * groups[1] as usize * groups[2] as usize,
        ));
    }
    if output_len < layout.coefficient_len() {
        return Err(PipelineError::contract(
            "coefficient buffer length",
            layout.coefficient_len(),
            output_len,
        ));
    }
    Ok(layout)
}

/// Execute one component dispatch over `rgba` into `output`.
pub fn encode_component(
    variant: ShaderVariant,
    rgba: &[u8],
    constants: &DispatchConstants,
    groups: [u32; 3],
    output: &mut [i32],
) -> PipelineResult<()> {
    let layout = validate_dispatch(variant, rgba.len(), constants, groups, output.len())?;
    let per_mcu = layout.blocks_per_mcu() * BLOCK_LEN;
    let slots = layout.block_range(variant.component);
    let (h, v) = variant.subsampling.luma_factors();
    let (mcu_w, mcu_h) = variant.subsampling.mcu_size();
    let stride = layout.width as usize * 4;

    output[..layout.coefficient_len()]
        .par_chunks_mut(per_mcu)
        .enumerate()
        .for_each(|(m, mcu)| {
            let x0 = (m as u32 % layout.mcus_x * mcu_w) as usize;
            let y0 = (m as u32 / layout.mcus_x * mcu_h) as usize;
            let mut samples = [0f32; 64];

            for (i, slot) in slots.clone().enumerate() {
                match variant.component {
                    Component::Y => {
                        let bx = x0 + (i % h as usize) * 8;
                        let by = y0 + (i / h as usize) * 8;
                        for y in 0..8 {
                            for x in 0..8 {
                                let p = (by + y) * stride + (bx + x) * 4;
                                let (luma, _, _) = rgb_to_ycbcr(
                                    rgba[p] as f32,
                                    rgba[p + 1] as f32,
                                    rgba[p + 2] as f32,
                                );
                                samples[y * 8 + x] = luma - 128.0;
                            }
                        }
                    }
                    Component::Cb | Component::Cr => {
                        let area = (h * v) as f32;
                        for cy in 0..8 {
                            for cx in 0..8 {
                                let (mut r, mut g, mut b) = (0f32, 0f32, 0f32);
                                for dy in 0..v as usize {
                                    for dx in 0..h as usize {
                                        let px = x0 + cx * h as usize + dx;
                                        let py = y0 + cy * v as usize + dy;
                                        let p = py * stride + px * 4;
                                        r += rgba[p] as f32;
                                        g += rgba[p + 1] as f32;
                                        b += rgba[p + 2] as f32;
                                    }
                                }
                                let (_, cb, cr) = rgb_to_ycbcr(r / area, g / area, b / area);
                                let c = if variant.component == Component::Cb { cb } else { cr };
                                samples[cy * 8 + cx] = c - 128.0;
                            }
                        }
                    }
                }

                let coefficients = forward_dct(&samples);
                let block = &mut mcu[slot * BLOCK_LEN..(slot + 1) * BLOCK_LEN];
                quantize(&coefficients, &constants.quant, block);
            }
        });

    Ok(())
}
