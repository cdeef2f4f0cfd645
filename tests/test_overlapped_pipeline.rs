//! Overlapped backend: cross-queue ordering, shutdown and result sharing.

mod common;

use std::sync::Arc;

use common::recording::{Event, RecordingDevice};
use common::{frames, wait};
use gpujpeg_stream::gpu::{CommandList, GpuDevice, ImmediateDevice, QueueKind, QueuedDevice};
use gpujpeg_stream::{
    EncodeParams, JpegEncoder, OverlappedBackend, ParamsHandle, PipelineError, Subsampling,
    SyncBackend,
};

fn recording_device() -> (Arc<RecordingDevice>, Arc<dyn GpuDevice>) {
    let inner: Arc<dyn GpuDevice> = Arc::new(QueuedDevice::new().unwrap());
    let recording = Arc::new(RecordingDevice::new(inner));
    let device: Arc<dyn GpuDevice> = recording.clone();
    (recording, device)
}

#[test]
fn copies_never_run_ahead_of_compute() {
    let (recording, device) = recording_device();
    let backend = OverlappedBackend::start_bounded(
        device.clone(),
        frames::noise(48, 32, 7),
        ParamsHandle::default(),
        12,
    )
    .unwrap();
    wait::until_stopped(&backend);
    let stats = backend.stats();
    backend.shutdown().unwrap();

    assert_eq!(stats.frames_encoded, 12);
    assert!(recording.violations().is_empty(), "{:?}", recording.violations());

    // Per frame: compute submit, compute wait, direct submit, direct wait.
    let events = recording.events();
    assert_eq!(events.len(), 12 * 4);
    for frame in events.chunks(4) {
        assert!(matches!(frame[0], Event::Submit { queue: QueueKind::Compute, label: "compute", .. }));
        assert!(matches!(frame[1], Event::Wait { queue: QueueKind::Compute, ok: true, .. }));
        assert!(matches!(
            frame[2],
            Event::Submit { queue: QueueKind::Direct, label: "copy-present", .. }
        ));
        assert!(matches!(frame[3], Event::Wait { queue: QueueKind::Direct, ok: true, .. }));
    }
    assert_eq!(device.stats().presents, 12);
}

#[test]
fn unwaited_readback_is_flagged() {
    let (recording, device) = recording_device();
    let mut encoder = JpegEncoder::new(device.clone()).unwrap();
    let mut source = frames::solid(16, 16, [4, 5, 6]);
    let frame = source.acquire(device.as_ref(), 0).unwrap();
    let prepared = encoder.prepare(&frame, &EncodeParams::default(), 0).unwrap();

    let mut compute = CommandList::new("compute");
    prepared.record_compute(&mut compute);
    let mut readback = CommandList::new("copy-present");
    prepared.record_readback(&mut readback);

    let computed = device.submit(QueueKind::Compute, compute).unwrap();
    let copied = device.submit(QueueKind::Direct, readback).unwrap();
    device.wait(QueueKind::Compute, computed).unwrap();
    device.wait(QueueKind::Direct, copied).unwrap();

    assert_eq!(recording.violations().len(), 1, "{:?}", recording.violations());
    encoder.release().unwrap();
    source.release(device.as_ref());
}

#[test]
fn shutdown_joins_and_releases_everything() {
    let (_, device) = recording_device();
    let backend = OverlappedBackend::start(
        device.clone(),
        frames::checkerboard(64, 64, 8),
        ParamsHandle::default(),
    )
    .unwrap();
    wait::until_encoded(&backend, 3);
    assert!(backend.is_running());
    backend.shutdown().unwrap();

    assert_eq!(device.stats().live_resources(), 0);
}

#[test]
fn dropping_the_backend_also_stops_it() {
    let (_, device) = recording_device();
    {
        let backend = OverlappedBackend::start(
            device.clone(),
            frames::solid(32, 32, [1, 2, 3]),
            ParamsHandle::default(),
        )
        .unwrap();
        wait::until_encoded(&backend, 1);
    }
    assert_eq!(device.stats().live_resources(), 0);
}

#[test]
fn matches_the_sync_backend_byte_for_byte() {
    let params = EncodeParams {
        quality: 80,
        output_scale: 1.0,
        subsampling: Subsampling::S422,
    };

    let sync_device: Arc<dyn GpuDevice> = Arc::new(ImmediateDevice::new());
    let mut sync = SyncBackend::new(sync_device, frames::checkerboard(48, 24, 6)).unwrap();
    let expected = sync.encode_next(&params).unwrap();
    sync.shutdown().unwrap();

    let (_, device) = recording_device();
    let backend = OverlappedBackend::start_bounded(
        device,
        frames::checkerboard(48, 24, 6),
        ParamsHandle::new(params),
        2,
    )
    .unwrap();
    wait::until_stopped(&backend);
    let latest = backend.latest().unwrap();
    backend.shutdown().unwrap();

    assert_eq!(latest.frame_index, 1);
    assert_eq!(latest.bits, expected.bits);
}

#[test]
fn quality_changes_apply_to_later_frames() {
    let (_, device) = recording_device();
    let params = ParamsHandle::new(EncodeParams {
        quality: 95,
        ..EncodeParams::default()
    });
    let backend =
        OverlappedBackend::start(device, frames::noise(64, 64, 3), params.clone()).unwrap();
    wait::until_encoded(&backend, 1);
    let before = backend.latest().unwrap().data_size;

    params.set_quality(5);
    let target = backend.stats().frames_encoded + 3;
    wait::until_encoded(&backend, target);
    let after = backend.latest().unwrap().data_size;
    backend.shutdown().unwrap();

    assert!(after < before, "q5 payload {} should be smaller than q95 {}", after, before);
}

#[test]
fn out_of_range_params_do_not_stop_the_loop() {
    let (_, device) = recording_device();
    let params = ParamsHandle::default();
    let backend =
        OverlappedBackend::start(device, frames::checkerboard(64, 64, 8), params.clone()).unwrap();
    wait::until_encoded(&backend, 1);

    params.set(EncodeParams {
        quality: 0,
        output_scale: 2.0,
        subsampling: Subsampling::S444,
    });
    let target = backend.stats().frames_encoded + 3;
    wait::until_encoded(&backend, target);
    assert!(backend.is_running());
    let latest = backend.latest().unwrap();
    let stats = backend.stats();
    backend.shutdown().unwrap();

    assert!(stats.frames_encoded >= target);
    assert_eq!(stats.frames_dropped, 0);
    assert_eq!((latest.width, latest.height), (64, 64));
}

#[test]
fn single_queue_device_is_rejected() {
    let device: Arc<dyn GpuDevice> = Arc::new(ImmediateDevice::new());
    let err = OverlappedBackend::start(
        device.clone(),
        frames::solid(16, 16, [0, 0, 0]),
        ParamsHandle::default(),
    )
    .err()
    .unwrap();
    assert!(matches!(err, PipelineError::Init { .. }));
    assert_eq!(device.stats().live_resources(), 0);
}
