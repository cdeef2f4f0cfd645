//! Sequential Huffman entropy coding of a coefficient snapshot.
//!
//! Blocks are visited in buffer order, which is already JPEG interleaved
//! scan order (MCU raster, then Y blocks, Cb, Cr within the MCU). The three
//! DC predictors start at zero on every call; nothing carries over between
//! frames.

use super::bitstream::BitWriter;
use super::header::EOI;
use super::huffman::{TablePair, category, magnitude_bits, tables_for};
use super::layout::{BLOCK_LEN, FrameLayout};
use super::tables::ZIGZAG;
use super::Component;
use crate::error::{PipelineError, PipelineResult};

const EOB: u8 = 0x00;
const ZRL: u8 = 0xF0;

/// Baseline range of a quantized DC coefficient.
pub const DC_MIN: i32 = -1024;
pub const DC_MAX: i32 = 1023;
/// Largest AC magnitude with a baseline size category (10).
pub const AC_LIMIT: i32 = 1023;

/// Reject coefficients the baseline Huffman tables cannot represent.
///
/// A DC outside `DC_MIN..=DC_MAX` or an AC beyond `±AC_LIMIT` would overflow
/// its size category into the run nibble and emit a wrong symbol.
pub fn check_baseline_range(coefficients: &[i32]) -> PipelineResult<()> {
    for (index, &value) in coefficients.iter().enumerate() {
        let (in_range, limit) = if index % BLOCK_LEN == 0 {
            let limit = if value < 0 { DC_MIN.unsigned_abs() } else { DC_MAX as u32 };
            ((DC_MIN..=DC_MAX).contains(&value), limit)
        } else {
            (value.unsigned_abs() <= AC_LIMIT as u32, AC_LIMIT as u32)
        };
        if !in_range {
            return Err(PipelineError::contract(
                format!("coefficient {} magnitude", index),
                limit as usize,
                value.unsigned_abs() as usize,
            )
            .with_context(format!("block {} holds {}", index / BLOCK_LEN, value)));
        }
    }
    Ok(())
}

/// DC bookkeeping for one block, collected by [`EntropyEncoder::encode_traced`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockTrace {
    pub index: usize,
    pub component: Component,
    pub dc: i32,
    pub dc_delta: i32,
}

#[derive(Debug, Default)]
pub struct EntropyEncoder {
    writer: BitWriter,
}

impl EntropyEncoder {
    pub fn new() -> Self {
        Self {
            writer: BitWriter::with_capacity(64 * 1024),
        }
    }

    /// Encode a full frame. The returned payload ends with EOI.
    ///
    /// # Panics
    ///
    /// When `coefficients.len()` disagrees with `layout`, or a coefficient is
    /// outside the range [`check_baseline_range`] accepts. The compute and
    /// entropy stages must never drift apart silently.
    pub fn encode(&mut self, coefficients: &[i32], layout: &FrameLayout) -> &[u8] {
        self.run(coefficients, layout, None);
        self.writer.as_bytes()
    }

    /// Like [`encode`](Self::encode), also returning one trace entry per block.
    pub fn encode_traced(
        &mut self,
        coefficients: &[i32],
        layout: &FrameLayout,
    ) -> (Vec<u8>, Vec<BlockTrace>) {
        let mut trace = Vec::with_capacity(layout.total_blocks());
        self.run(coefficients, layout, Some(&mut trace));
        (self.writer.as_bytes().to_vec(), trace)
    }

    fn run(
        &mut self,
        coefficients: &[i32],
        layout: &FrameLayout,
        mut trace: Option<&mut Vec<BlockTrace>>,
    ) {
        assert_eq!(
            coefficients.len(),
            layout.coefficient_len(),
            "coefficient buffer does not match {}x{} {}",
            layout.width,
            layout.height,
            layout.subsampling
        );

        self.writer.reset();
        let mut prev_dc = [0i32; 3];
        let per_mcu = layout.blocks_per_mcu();

        for (index, block) in coefficients.chunks_exact(BLOCK_LEN).enumerate() {
            let component = layout.component_of(index % per_mcu);
            let slot = &mut prev_dc[component.index()];
            let dc = block[0];
            let dc_delta = dc - *slot;
            *slot = dc;

            encode_block(&mut self.writer, block, dc_delta, tables_for(component));

            if let Some(t) = trace.as_deref_mut() {
                t.push(BlockTrace {
                    index,
                    component,
                    dc,
                    dc_delta,
                });
            }
        }

        self.writer.flush();
        self.writer.write_marker(EOI);
    }
}

/// Emit one block: DC delta, then AC run/size symbols with ZRL and EOB.
fn encode_block(writer: &mut BitWriter, block: &[i32], dc_delta: i32, tables: &TablePair) {
    let dc_cat = category(dc_delta);
    assert!(dc_cat <= 11, "DC delta {} out of baseline range", dc_delta);
    let code = tables.dc.code(dc_cat);
    writer.write_bits(code.code as u32, code.length);
    let (bits, len) = magnitude_bits(dc_delta);
    writer.write_bits(bits, len);

    let mut run = 0u8;
    for &natural in &ZIGZAG[1..] {
        let ac = block[natural];
        if ac == 0 {
            run += 1;
            continue;
        }
        while run >= 16 {
            let zrl = tables.ac.code(ZRL);
            writer.write_bits(zrl.code as u32, zrl.length);
            run -= 16;
        }
        let cat = category(ac);
        assert!(cat <= 10, "AC {} out of baseline range", ac);
        let code = tables.ac.code((run << 4) | cat);
        writer.write_bits(code.code as u32, code.length);
        let (bits, len) = magnitude_bits(ac);
        writer.write_bits(bits, len);
        run = 0;
    }

    if run > 0 {
        let eob = tables.ac.code(EOB);
        writer.write_bits(eob.code as u32, eob.length);
    }
}
