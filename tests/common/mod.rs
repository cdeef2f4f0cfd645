//! Common test utilities and helpers for the encoder tests
//!
//! - `frames`: frame sources with known content
//! - `recording`: a device wrapper that checks cross-queue ordering
//! - `flaky`: a device wrapper that injects failures

#![allow(dead_code)]

/// Frame sources with predictable pixels
pub mod frames {
    use gpujpeg_stream::frame::{FrameSource, StillImage};

    pub fn checkerboard(width: u32, height: u32, cell: u32) -> Box<dyn FrameSource> {
        Box::new(StillImage::checkerboard(width, height, cell).unwrap())
    }

    pub fn solid(width: u32, height: u32, rgb: [u8; 3]) -> Box<dyn FrameSource> {
        Box::new(StillImage::solid(width, height, rgb).unwrap())
    }

    /// Deterministic pseudo-random pixels; maximizes high-frequency content.
    pub fn noise_pixels(width: u32, height: u32, seed: u32) -> Vec<u8> {
        let mut state = seed.max(1);
        let mut rgba = Vec::with_capacity(width as usize * height as usize * 4);
        for _ in 0..width * height {
            for _ in 0..3 {
                state ^= state << 13;
                state ^= state >> 17;
                state ^= state << 5;
                rgba.push((state >> 24) as u8);
            }
            rgba.push(255);
        }
        rgba
    }

    pub fn noise(width: u32, height: u32, seed: u32) -> Box<dyn FrameSource> {
        Box::new(StillImage::from_rgba(width, height, noise_pixels(width, height, seed)).unwrap())
    }
}

/// Instrumented device that records every submission and wait
pub mod recording {
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    use gpujpeg_stream::PipelineResult;
    use gpujpeg_stream::gpu::{
        BufferDesc, BufferId, Command, CommandList, DeviceStats, FenceValue, GpuDevice,
        PipelineId, QueueKind, ShaderVariant, TextureDesc, TextureId,
    };

    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum Event {
        Submit {
            queue: QueueKind,
            label: &'static str,
            value: FenceValue,
        },
        Wait {
            queue: QueueKind,
            value: FenceValue,
            ok: bool,
        },
    }

    #[derive(Debug, Default)]
    struct Log {
        events: Vec<Event>,
        /// Compute fence value of the last dispatch that wrote each buffer.
        written_at: HashMap<BufferId, FenceValue>,
        waited: HashMap<QueueKind, FenceValue>,
        violations: Vec<String>,
    }

    /// Forwards to an inner device and checks that a direct-queue copy never
    /// reads a buffer whose producing dispatch has not been waited on.
    pub struct RecordingDevice {
        inner: Arc<dyn GpuDevice>,
        log: Mutex<Log>,
    }

    impl RecordingDevice {
        pub fn new(inner: Arc<dyn GpuDevice>) -> Self {
            Self {
                inner,
                log: Mutex::new(Log::default()),
            }
        }

        pub fn events(&self) -> Vec<Event> {
            self.log.lock().unwrap().events.clone()
        }

        pub fn violations(&self) -> Vec<String> {
            self.log.lock().unwrap().violations.clone()
        }

        pub fn submits(&self, queue: QueueKind) -> usize {
            self.events()
                .iter()
                .filter(|e| matches!(e, Event::Submit { queue: q, .. } if *q == queue))
                .count()
        }
    }

    impl GpuDevice for RecordingDevice {
        fn name(&self) -> &str {
            "recording"
        }

        fn supports_async_queues(&self) -> bool {
            self.inner.supports_async_queues()
        }

        fn create_texture(&self, desc: TextureDesc) -> PipelineResult<TextureId> {
            self.inner.create_texture(desc)
        }

        fn create_buffer(&self, desc: BufferDesc) -> PipelineResult<BufferId> {
            self.inner.create_buffer(desc)
        }

        fn create_pipeline(&self, variant: ShaderVariant) -> PipelineResult<PipelineId> {
            self.inner.create_pipeline(variant)
        }

        fn write_texture(&self, texture: TextureId, rgba: &[u8]) -> PipelineResult<()> {
            self.inner.write_texture(texture, rgba)
        }

        fn submit(&self, queue: QueueKind, list: CommandList) -> PipelineResult<FenceValue> {
            let label = list.label;
            let commands = list.commands.clone();
            let value = self.inner.submit(queue, list)?;

            let mut guard = self.log.lock().unwrap();
            let log = &mut *guard;
            let waited_compute = log.waited.get(&QueueKind::Compute).copied().unwrap_or(0);
            for command in &commands {
                match queue {
                    QueueKind::Compute => {
                        if let Some(output) = command.writes_buffer() {
                            log.written_at.insert(output, value);
                        }
                    }
                    QueueKind::Direct => {
                        let Some(src) = command.reads_buffer() else {
                            continue;
                        };
                        if let Some(&produced) = log.written_at.get(&src) {
                            if produced > waited_compute {
                                log.violations.push(format!(
                                    "direct read of {:?} submitted before compute fence {} (waited {})",
                                    src, produced, waited_compute
                                ));
                            }
                        }
                    }
                }
            }
            // A present must follow a copy into the same texture in the same list.
            for (i, command) in commands.iter().enumerate() {
                if let Command::Present { texture } = command {
                    let copied = commands[..i]
                        .iter()
                        .any(|c| matches!(c, Command::CopyTexture { dst, .. } if dst == texture));
                    if !copied {
                        log.violations
                            .push(format!("present of {:?} without a preceding copy", texture));
                    }
                }
            }
            log.events.push(Event::Submit {
                queue,
                label,
                value,
            });
            Ok(value)
        }

        fn wait(&self, queue: QueueKind, value: FenceValue) -> PipelineResult<()> {
            let result = self.inner.wait(queue, value);
            let mut guard = self.log.lock().unwrap();
            let log = &mut *guard;
            if result.is_ok() {
                let waited = log.waited.entry(queue).or_insert(0);
                *waited = (*waited).max(value);
            }
            log.events.push(Event::Wait {
                queue,
                value,
                ok: result.is_ok(),
            });
            result
        }

        fn wait_idle(&self) -> PipelineResult<()> {
            self.inner.wait_idle()
        }

        fn read_buffer(&self, buffer: BufferId, out: &mut Vec<i32>) -> PipelineResult<()> {
            self.inner.read_buffer(buffer, out)
        }

        fn destroy_texture(&self, texture: TextureId) {
            self.inner.destroy_texture(texture)
        }

        fn destroy_buffer(&self, buffer: BufferId) {
            self.inner.destroy_buffer(buffer)
        }

        fn destroy_pipeline(&self, pipeline: PipelineId) {
            self.inner.destroy_pipeline(pipeline)
        }

        fn stats(&self) -> DeviceStats {
            self.inner.stats()
        }
    }
}

/// Fault-injecting device
pub mod flaky {
    use std::collections::HashSet;
    use std::sync::Arc;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    use gpujpeg_stream::gpu::{
        BufferDesc, BufferId, CommandList, DeviceStats, FenceValue, GpuDevice, PipelineId,
        QueueKind, ShaderVariant, TextureDesc, TextureId,
    };
    use gpujpeg_stream::{PipelineError, PipelineResult};

    /// Wraps a device and fails chosen operations.
    ///
    /// Submission ordinals count every `submit` call across both queues,
    /// starting at 0.
    pub struct FlakyDevice {
        inner: Arc<dyn GpuDevice>,
        submits: AtomicUsize,
        pipelines: AtomicUsize,
        failing_submits: Mutex<HashSet<usize>>,
        lost_after: Mutex<Option<usize>>,
        pipeline_limit: Mutex<Option<usize>>,
        truncate_readback: AtomicBool,
        corrupt_readback: Mutex<Option<i32>>,
    }

    impl FlakyDevice {
        pub fn new(inner: Arc<dyn GpuDevice>) -> Self {
            Self {
                inner,
                submits: AtomicUsize::new(0),
                pipelines: AtomicUsize::new(0),
                failing_submits: Mutex::new(HashSet::new()),
                lost_after: Mutex::new(None),
                pipeline_limit: Mutex::new(None),
                truncate_readback: AtomicBool::new(false),
                corrupt_readback: Mutex::new(None),
            }
        }

        /// Fail the submissions with these ordinals with a dispatch error.
        pub fn fail_submits(self, ordinals: impl IntoIterator<Item = usize>) -> Self {
            self.failing_submits.lock().unwrap().extend(ordinals);
            self
        }

        /// Every submission from ordinal `n` on reports a lost device.
        pub fn lose_device_after(self, n: usize) -> Self {
            *self.lost_after.lock().unwrap() = Some(n);
            self
        }

        /// Only `n` pipelines compile; the rest fail.
        pub fn limit_pipelines(self, n: usize) -> Self {
            *self.pipeline_limit.lock().unwrap() = Some(n);
            self
        }

        /// Drop the last block from every readback.
        pub fn truncate_readback(self) -> Self {
            self.truncate_readback.store(true, Ordering::SeqCst);
            self
        }

        /// Overwrite the first AC coefficient of every readback with `value`.
        pub fn corrupt_readback(self, value: i32) -> Self {
            *self.corrupt_readback.lock().unwrap() = Some(value);
            self
        }

        pub fn submit_count(&self) -> usize {
            self.submits.load(Ordering::SeqCst)
        }
    }

    impl GpuDevice for FlakyDevice {
        fn name(&self) -> &str {
            "flaky"
        }

        fn supports_async_queues(&self) -> bool {
            self.inner.supports_async_queues()
        }

        fn create_texture(&self, desc: TextureDesc) -> PipelineResult<TextureId> {
            self.inner.create_texture(desc)
        }

        fn create_buffer(&self, desc: BufferDesc) -> PipelineResult<BufferId> {
            self.inner.create_buffer(desc)
        }

        fn create_pipeline(&self, variant: ShaderVariant) -> PipelineResult<PipelineId> {
            let n = self.pipelines.fetch_add(1, Ordering::SeqCst);
            if self.pipeline_limit.lock().unwrap().is_some_and(|limit| n >= limit) {
                return Err(PipelineError::init(
                    variant.entry_point(),
                    "injected compile failure",
                ));
            }
            self.inner.create_pipeline(variant)
        }

        fn write_texture(&self, texture: TextureId, rgba: &[u8]) -> PipelineResult<()> {
            self.inner.write_texture(texture, rgba)
        }

        fn submit(&self, queue: QueueKind, list: CommandList) -> PipelineResult<FenceValue> {
            let n = self.submits.fetch_add(1, Ordering::SeqCst);
            if self.lost_after.lock().unwrap().is_some_and(|after| n >= after) {
                return Err(PipelineError::device_lost(queue.to_string(), "injected removal"));
            }
            if self.failing_submits.lock().unwrap().contains(&n) {
                return Err(PipelineError::dispatch(list.label, "injected fault"));
            }
            self.inner.submit(queue, list)
        }

        fn wait(&self, queue: QueueKind, value: FenceValue) -> PipelineResult<()> {
            self.inner.wait(queue, value)
        }

        fn wait_idle(&self) -> PipelineResult<()> {
            self.inner.wait_idle()
        }

        fn read_buffer(&self, buffer: BufferId, out: &mut Vec<i32>) -> PipelineResult<()> {
            self.inner.read_buffer(buffer, out)?;
            if self.truncate_readback.load(Ordering::SeqCst) {
                let len = out.len().saturating_sub(64);
                out.truncate(len);
            }
            if let Some(value) = *self.corrupt_readback.lock().unwrap() {
                if let Some(ac) = out.get_mut(1) {
                    *ac = value;
                }
            }
            Ok(())
        }

        fn destroy_texture(&self, texture: TextureId) {
            self.inner.destroy_texture(texture)
        }

        fn destroy_buffer(&self, buffer: BufferId) {
            self.inner.destroy_buffer(buffer)
        }

        fn destroy_pipeline(&self, pipeline: PipelineId) {
            self.inner.destroy_pipeline(pipeline)
        }

        fn stats(&self) -> DeviceStats {
            self.inner.stats()
        }
    }
}

/// Polling helpers for the background loop
pub mod wait {
    use std::thread;
    use std::time::{Duration, Instant};

    use gpujpeg_stream::OverlappedBackend;

    pub fn until_encoded(backend: &OverlappedBackend, frames: u64) {
        let deadline = Instant::now() + Duration::from_secs(30);
        while backend.stats().frames_encoded < frames && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(2));
        }
    }

    pub fn until_stopped(backend: &OverlappedBackend) {
        let deadline = Instant::now() + Duration::from_secs(30);
        while backend.is_running() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(2));
        }
    }
}
