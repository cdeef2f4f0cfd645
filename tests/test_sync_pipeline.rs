//! Synchronous backend against both software devices.

mod common;

use std::sync::Arc;

use common::frames;
use common::recording::{Event, RecordingDevice};
use gpujpeg_stream::gpu::{GpuDevice, ImmediateDevice, QueueKind, QueuedDevice};
use gpujpeg_stream::jpeg::HEADER_LEN;
use gpujpeg_stream::{EncodeParams, Subsampling, SyncBackend};

fn params(quality: u8, output_scale: f32, subsampling: Subsampling) -> EncodeParams {
    EncodeParams {
        quality,
        output_scale,
        subsampling,
    }
}

#[test]
fn every_mode_decodes_to_the_surface_size() {
    for subsampling in Subsampling::ALL {
        let device: Arc<dyn GpuDevice> = Arc::new(ImmediateDevice::new());
        let mut backend = SyncBackend::new(device, frames::checkerboard(64, 48, 8)).unwrap();
        let result = backend
            .encode_next(&params(85, 1.0, subsampling))
            .unwrap();
        assert_eq!((result.width, result.height), (64, 48), "{}", subsampling);
        assert_eq!(result.header_size, HEADER_LEN);

        let decoded = image::load_from_memory(result.jpeg_bytes()).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (64, 48), "{}", subsampling);
        backend.shutdown().unwrap();
    }
}

#[test]
fn header_length_does_not_depend_on_quality() {
    let device: Arc<dyn GpuDevice> = Arc::new(ImmediateDevice::new());
    let mut backend = SyncBackend::new(device, frames::solid(32, 32, [40, 80, 120])).unwrap();
    for quality in [1, 50, 51, 100] {
        let result = backend
            .encode_next(&params(quality, 1.0, Subsampling::S420))
            .unwrap();
        assert_eq!(result.header_size, HEADER_LEN, "q{}", quality);
        assert!(result.data_size >= 2);
    }
    assert_eq!(backend.encoder().header_builds(), 4);
    backend.shutdown().unwrap();
}

#[test]
fn header_is_cached_across_identical_frames() {
    let device: Arc<dyn GpuDevice> = Arc::new(ImmediateDevice::new());
    let mut backend = SyncBackend::new(device, frames::checkerboard(32, 32, 4)).unwrap();
    let p = params(70, 1.0, Subsampling::S422);
    for _ in 0..4 {
        backend.encode_next(&p).unwrap();
    }
    assert_eq!(backend.encoder().header_builds(), 1);
    backend.shutdown().unwrap();
}

#[test]
fn half_scale_is_aligned_and_no_larger_than_half() {
    let device: Arc<dyn GpuDevice> = Arc::new(ImmediateDevice::new());
    let mut backend = SyncBackend::new(device, frames::checkerboard(100, 60, 10)).unwrap();
    for subsampling in Subsampling::ALL {
        let (mw, mh) = subsampling.mcu_size();
        let result = backend
            .encode_next(&params(75, 0.5, subsampling))
            .unwrap();
        assert_eq!(result.width % mw, 0);
        assert_eq!(result.height % mh, 0);
        assert!(result.width <= 50 && result.height <= 30);
        let decoded = image::load_from_memory(result.jpeg_bytes()).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (result.width, result.height));
    }
    assert_eq!(backend.encoder().surface_rebuilds(), 2);
    backend.shutdown().unwrap();
}

#[test]
fn sync_backend_uses_one_direct_submission_per_frame() {
    let inner: Arc<dyn GpuDevice> = Arc::new(QueuedDevice::new().unwrap());
    let recording = Arc::new(RecordingDevice::new(inner));
    let device: Arc<dyn GpuDevice> = recording.clone();
    let mut backend = SyncBackend::new(device.clone(), frames::checkerboard(32, 32, 8)).unwrap();
    for _ in 0..3 {
        backend
            .encode_next(&params(85, 1.0, Subsampling::S420))
            .unwrap();
    }
    backend.shutdown().unwrap();

    assert_eq!(recording.submits(QueueKind::Compute), 0);
    assert_eq!(recording.submits(QueueKind::Direct), 3);
    let events = recording.events();
    for pair in events.chunks(2) {
        assert!(matches!(pair[0], Event::Submit { queue: QueueKind::Direct, .. }));
        assert!(matches!(pair[1], Event::Wait { ok: true, .. }));
    }
    assert_eq!(device.stats().live_resources(), 0);
}
