//! Properties of the entropy-coded payload.

mod common;

use std::sync::Arc;

use common::frames;
use gpujpeg_stream::gpu::{GpuDevice, ImmediateDevice};
use gpujpeg_stream::jpeg::layout::BLOCK_LEN;
use gpujpeg_stream::jpeg::{EntropyEncoder, FrameLayout, HEADER_LEN, quality_scale};
use gpujpeg_stream::{EncodeParams, Subsampling, SyncBackend};

/// Every 0xFF in the scan data must be followed by a stuffed 0x00.
fn assert_stuffed(payload: &[u8]) {
    assert!(payload.ends_with(&[0xFF, 0xD9]));
    let scan = &payload[..payload.len() - 2];
    for (i, &byte) in scan.iter().enumerate() {
        if byte == 0xFF {
            assert_eq!(scan.get(i + 1), Some(&0x00), "unstuffed 0xFF at offset {}", i);
        }
    }
}

#[test]
fn noisy_frames_are_byte_stuffed() {
    let device: Arc<dyn GpuDevice> = Arc::new(ImmediateDevice::new());
    let mut seen_ff = false;
    let cases = [
        (1, Subsampling::S444),
        (2, Subsampling::S422),
        (3, Subsampling::S420),
    ];
    for (seed, subsampling) in cases {
        let mut backend = SyncBackend::new(device.clone(), frames::noise(64, 64, seed)).unwrap();
        let params = EncodeParams {
            quality: 100,
            output_scale: 1.0,
            subsampling,
        };
        let result = backend.encode_next(&params).unwrap();
        let payload = &result.bits[HEADER_LEN..];
        seen_ff |= payload[..payload.len() - 2].contains(&0xFF);
        assert_stuffed(payload);
        backend.shutdown().unwrap();
    }
    assert!(seen_ff, "noise at q100 should produce at least one 0xFF byte");
}

#[test]
fn dc_prediction_restarts_every_frame() {
    let layout = FrameLayout::new(32, 16, Subsampling::S420).unwrap();
    let mut coefficients = vec![0i32; layout.coefficient_len()];
    for (i, block) in coefficients.chunks_exact_mut(BLOCK_LEN).enumerate() {
        block[0] = 10 + i as i32 * 3;
        block[5] = if i % 2 == 0 { -4 } else { 0 };
    }

    let mut encoder = EntropyEncoder::new();
    let (first_bytes, first) = encoder.encode_traced(&coefficients, &layout);
    let (second_bytes, second) = encoder.encode_traced(&coefficients, &layout);

    assert_eq!(first_bytes, second_bytes);
    for trace in [&first, &second] {
        assert_eq!(trace.len(), layout.total_blocks());
        assert_eq!(trace[0].dc_delta, trace[0].dc);
        // Chroma predictors start at zero too.
        let first_cb = trace.iter().find(|t| !t.component.is_luma()).unwrap();
        assert_eq!(first_cb.dc_delta, first_cb.dc);
    }
}

#[test]
fn dc_deltas_chain_within_a_component() {
    let layout = FrameLayout::new(24, 8, Subsampling::S444).unwrap();
    let mut coefficients = vec![0i32; layout.coefficient_len()];
    let dcs = [5, -7, 100, 3, 3, 3, -1024, 1023, 0];
    for (block, dc) in coefficients.chunks_exact_mut(BLOCK_LEN).zip(dcs) {
        block[0] = dc;
    }
    let (_, trace) = EntropyEncoder::new().encode_traced(&coefficients, &layout);

    let mut previous = [0i32; 3];
    for t in trace {
        let c = t.component.index();
        assert_eq!(t.dc_delta, t.dc - previous[c]);
        previous[c] = t.dc;
    }
}

#[test]
fn quality_scale_branches_at_fifty() {
    assert_eq!(quality_scale(1), 5000);
    assert_eq!(quality_scale(50), 100);
    assert_eq!(quality_scale(51), 98);
    assert_eq!(quality_scale(100), 1);
}
