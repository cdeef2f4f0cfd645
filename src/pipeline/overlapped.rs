//! # Overlapped Backend
//!
//! A background loop that keeps producing frames on a dual-queue device.
//!
//! ## Threading Model
//!
//! - **`jpeg-encode-loop`**: owns the encoder, the frame source and the
//!   present targets; runs until the active flag is cleared
//! - **`copy-recorder`**: scoped helper spawned once per iteration; records the
//!   readback copy, the copy to the slot's present target and the present,
//!   while the loop thread records the compute list
//! - **Consumers**: any thread; read the latest result through
//!   [`OverlappedBackend::latest`] or [`OverlappedBackend::with_latest`]
//!
//! ## Per-Iteration Ordering
//!
//! ```text
//! acquire ─ prepare ─┬─ record compute ─ submit(Compute) ─ wait ─┬─ submit(Direct) ─ wait ─ finish ─ store
//!                    └─ record copy/present (copy-recorder) ──── join
//! ```
//!
//! The direct list reads the slot's coefficient buffer, so it is submitted
//! only after the compute fence covering that buffer has been waited on.
//! Slots alternate by frame parity. Nothing is destroyed before the device
//! has drained.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};

use tracing::{debug, error, info, warn};

use super::result::{EncodeResult, LatestResult, PipelineStats, StatsSnapshot};
use crate::config::ParamsHandle;
use crate::encoder::{JpegEncoder, PreparedFrame, SLOT_COUNT};
use crate::error::{ErrorSeverity, PipelineError, PipelineResult, Retryable, classify};
use crate::frame::FrameSource;
use crate::gpu::{CommandList, GpuDevice, QueueKind, TextureDesc, TextureId};

#[derive(Debug, Default)]
struct Shared {
    active: AtomicBool,
    latest: LatestResult,
    stats: PipelineStats,
}

pub struct OverlappedBackend {
    shared: Arc<Shared>,
    worker: Option<JoinHandle<PipelineResult<()>>>,
}

impl OverlappedBackend {
    /// Start the loop; it runs until [`shutdown`](Self::shutdown).
    pub fn start(
        device: Arc<dyn GpuDevice>,
        source: Box<dyn FrameSource>,
        params: ParamsHandle,
    ) -> PipelineResult<Self> {
        Self::spawn(device, source, params, None)
    }

    /// Start the loop and stop it on its own after `frames` iterations.
    pub fn start_bounded(
        device: Arc<dyn GpuDevice>,
        source: Box<dyn FrameSource>,
        params: ParamsHandle,
        frames: u64,
    ) -> PipelineResult<Self> {
        Self::spawn(device, source, params, Some(frames))
    }

    fn spawn(
        device: Arc<dyn GpuDevice>,
        source: Box<dyn FrameSource>,
        params: ParamsHandle,
        limit: Option<u64>,
    ) -> PipelineResult<Self> {
        if !device.supports_async_queues() {
            return Err(PipelineError::init(
                "overlapped backend",
                format!("device '{}' has a single queue", device.name()),
            )
            .with_recovery_suggestion("Use the sync backend on this device"));
        }

        // Shader compilation failures surface here, before any thread exists.
        let encoder = JpegEncoder::new(device.clone())?;

        let shared = Arc::new(Shared::default());
        shared.active.store(true, Ordering::Release);

        let mut worker = EncodeLoop {
            device,
            encoder,
            source,
            params,
            shared: shared.clone(),
            present_targets: [None; SLOT_COUNT],
            limit,
        };

        let handle = thread::Builder::new()
            .name("jpeg-encode-loop".to_string())
            .spawn(move || worker.run())
            .map_err(|e| PipelineError::external("std::thread", e))?;

        info!(bounded = ?limit, "overlapped backend started");
        Ok(Self {
            shared,
            worker: Some(handle),
        })
    }

    pub fn is_running(&self) -> bool {
        self.shared.active.load(Ordering::Acquire)
            && self.worker.as_ref().is_some_and(|w| !w.is_finished())
    }

    pub fn latest(&self) -> Option<EncodeResult> {
        self.shared.latest.snapshot()
    }

    pub fn with_latest<R>(&self, f: impl FnOnce(Option<&EncodeResult>) -> R) -> R {
        self.shared.latest.with_latest(f)
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.shared.stats.snapshot()
    }

    /// Clear the active flag and join the loop.
    ///
    /// Returns once every GPU resource the loop created has been released.
    /// A fatal error that stopped the loop early is returned here.
    pub fn shutdown(mut self) -> PipelineResult<()> {
        self.stop()
    }

    fn stop(&mut self) -> PipelineResult<()> {
        self.shared.active.store(false, Ordering::Release);
        let Some(handle) = self.worker.take() else {
            return Ok(());
        };
        match handle.join() {
            Ok(result) => result,
            Err(_) => Err(PipelineError::state(
                "running",
                "join jpeg-encode-loop",
                "encode loop panicked",
            )
            .with_severity(ErrorSeverity::Fatal)),
        }
    }
}

impl Drop for OverlappedBackend {
    fn drop(&mut self) {
        if let Err(e) = self.stop() {
            warn!(error = %e, "overlapped backend stopped with an error");
        }
    }
}

struct EncodeLoop {
    device: Arc<dyn GpuDevice>,
    encoder: JpegEncoder,
    source: Box<dyn FrameSource>,
    params: ParamsHandle,
    shared: Arc<Shared>,
    /// Per-slot present texture and the extent it was created with.
    present_targets: [Option<((u32, u32), TextureId)>; SLOT_COUNT],
    limit: Option<u64>,
}

impl EncodeLoop {
    fn run(&mut self) -> PipelineResult<()> {
        let outcome = self.drive();
        self.shared.active.store(false, Ordering::Release);

        // Teardown order: drain the device, then free.
        let released = self.encoder.release();
        let device = self.device.as_ref();
        for target in self.present_targets.iter_mut() {
            if let Some((_, id)) = target.take() {
                device.destroy_texture(id);
            }
        }
        self.source.release(device);

        let stats = self.shared.stats.snapshot();
        info!(
            encoded = stats.frames_encoded,
            dropped = stats.frames_dropped,
            "overlapped backend stopped"
        );
        outcome.and(released)
    }

    fn drive(&mut self) -> PipelineResult<()> {
        let mut frame_index: u64 = 0;
        let mut consecutive_failures: usize = 0;

        while self.shared.active.load(Ordering::Acquire) {
            if self.limit.is_some_and(|limit| frame_index >= limit) {
                break;
            }
            self.shared.stats.record_iteration();

            match self.iteration(frame_index) {
                Ok(result) => {
                    consecutive_failures = 0;
                    self.shared.latest.store(result);
                    self.shared.stats.record_encoded();
                }
                Err(e) if classify::is_transient(&e) => {
                    consecutive_failures += 1;
                    self.shared.stats.record_dropped();
                    warn!(frame = frame_index, error = %e, "frame dropped");
                    if e.max_retries().is_some_and(|max| consecutive_failures > max) {
                        error!(error = %e, failures = consecutive_failures, "giving up");
                        return Err(e.with_metadata(
                            "consecutive_failures",
                            consecutive_failures.to_string(),
                        ));
                    }
                }
                Err(e) => {
                    error!(frame = frame_index, error = %e, "encode loop stopped");
                    return Err(e);
                }
            }
            frame_index += 1;
        }
        Ok(())
    }

    /// The slot's present texture, recreated when the output extent changes.
    ///
    /// The last list that used this slot was waited on in an earlier
    /// iteration, so the old texture is idle when it is destroyed.
    fn present_target(&mut self, slot: usize, width: u32, height: u32) -> PipelineResult<TextureId> {
        match self.present_targets[slot].take() {
            Some((size, id)) if size == (width, height) => {
                self.present_targets[slot] = Some((size, id));
                return Ok(id);
            }
            Some((_, stale)) => self.device.destroy_texture(stale),
            None => {}
        }
        let id = self.device.create_texture(TextureDesc { width, height })?;
        debug!(slot, width, height, "created present target");
        self.present_targets[slot] = Some(((width, height), id));
        Ok(id)
    }

    fn iteration(&mut self, frame_index: u64) -> PipelineResult<EncodeResult> {
        let frame = self.source.acquire(self.device.as_ref(), frame_index)?;
        let params = self.params.get();
        let prepared = self.encoder.prepare(&frame, &params, frame_index)?;
        let target = self.present_target(prepared.slot, prepared.layout.width, prepared.layout.height)?;

        let direct = self.record_and_compute(&prepared, target)?;

        let fence = self.device.submit(QueueKind::Direct, direct)?;
        self.device.wait(QueueKind::Direct, fence)?;

        let result = self.encoder.finish(&prepared)?;
        debug!(
            frame = frame_index,
            slot = prepared.slot,
            bytes = result.bits.len(),
            "encoded frame"
        );
        Ok(result)
    }

    /// Fork the copy recording, run compute to completion, join.
    fn record_and_compute(
        &self,
        prepared: &PreparedFrame,
        target: TextureId,
    ) -> PipelineResult<CommandList> {
        let device = self.device.as_ref();
        thread::scope(|scope| -> PipelineResult<CommandList> {
            let recorder = thread::Builder::new()
                .name("copy-recorder".to_string())
                .spawn_scoped(scope, move || {
                    let mut list = CommandList::new("copy-present");
                    prepared.record_readback(&mut list);
                    list.copy_texture(prepared.surface.texture, target)
                        .present(target);
                    list
                })
                .map_err(|e| PipelineError::external("std::thread", e))?;

            let mut compute = CommandList::new("compute");
            prepared.record_compute(&mut compute);
            let computed = device
                .submit(QueueKind::Compute, compute)
                .and_then(|value| device.wait(QueueKind::Compute, value));

            let direct = recorder.join().map_err(|_| {
                PipelineError::state("recording", "join copy-recorder", "recorder thread panicked")
                    .with_severity(ErrorSeverity::Fatal)
            })?;
            computed?;
            Ok(direct)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EncodeParams;
    use crate::frame::{StillImage, SyntheticScene};
    use crate::gpu::{ImmediateDevice, QueuedDevice};
    use crate::jpeg::Subsampling;
    use std::time::{Duration, Instant};

    fn wait_for(backend: &OverlappedBackend, frames: u64) {
        let deadline = Instant::now() + Duration::from_secs(20);
        while backend.stats().frames_encoded < frames && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(2));
        }
    }

    #[test]
    fn test_requires_async_queues() {
        let device: Arc<dyn GpuDevice> = Arc::new(ImmediateDevice::new());
        let source = Box::new(StillImage::solid(16, 16, [0, 0, 0]).unwrap());
        let err = OverlappedBackend::start(device, source, ParamsHandle::default());
        assert!(matches!(err, Err(PipelineError::Init { .. })));
    }

    #[test]
    fn test_bounded_run_encodes_every_frame() {
        let device: Arc<dyn GpuDevice> = Arc::new(QueuedDevice::new().unwrap());
        let source = Box::new(SyntheticScene::new(64, 48).unwrap());
        let backend =
            OverlappedBackend::start_bounded(device.clone(), source, ParamsHandle::default(), 5)
                .unwrap();
        wait_for(&backend, 5);
        let stats = backend.stats();
        backend.shutdown().unwrap();
        assert_eq!(stats.frames_encoded, 5);
        assert_eq!(stats.frames_dropped, 0);
        let device_stats = device.stats();
        assert_eq!(device_stats.presents, 5);
        assert_eq!(device_stats.live_resources(), 0);
    }

    #[test]
    fn test_params_are_read_every_frame() {
        let device: Arc<dyn GpuDevice> = Arc::new(QueuedDevice::new().unwrap());
        let source = Box::new(StillImage::checkerboard(64, 64, 8).unwrap());
        let params = ParamsHandle::new(EncodeParams {
            quality: 90,
            output_scale: 1.0,
            subsampling: Subsampling::S444,
        });
        let backend = OverlappedBackend::start(device.clone(), source, params.clone()).unwrap();
        wait_for(&backend, 1);
        params.set_output_scale(0.5);
        let deadline = Instant::now() + Duration::from_secs(20);
        while backend.with_latest(|r| r.map(|r| r.width)) != Some(32) && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(2));
        }
        assert_eq!(backend.latest().map(|r| (r.width, r.height)), Some((32, 32)));

        // Back to full size: both present targets are rebuilt again.
        params.set_output_scale(1.0);
        let deadline = Instant::now() + Duration::from_secs(20);
        while backend.with_latest(|r| r.map(|r| r.width)) != Some(64) && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(2));
        }
        let target = backend.stats().frames_encoded + 2;
        wait_for(&backend, target);
        assert!(backend.is_running());
        assert_eq!(backend.stats().frames_dropped, 0);
        assert_eq!(backend.latest().map(|r| r.width), Some(64));
        backend.shutdown().unwrap();
        assert_eq!(device.stats().live_resources(), 0);
    }
}
