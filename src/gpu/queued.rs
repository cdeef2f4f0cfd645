//! Dual-queue device with timeline fences.
//!
//! ## Threading Model
//!
//! - **Queue workers**: one thread per [`QueueKind`], draining an unbounded
//!   crossbeam channel of command lists in submission order
//! - **Submitters**: any thread; `submit` assigns the next fence value and
//!   enqueues under the queue's lock so values and execution order agree
//! - **Waiters**: block on the queue's [`Fence`] until the value is reached
//!
//! Both workers share one [`Executor`], so a copy on `Direct` observes the
//! results of a dispatch on `Compute` once the compute fence has been waited.

use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};

use crossbeam_channel::{Sender, unbounded};
use tracing::{debug, warn};

use super::executor::Executor;
use super::fence::Fence;
use super::{
    BufferDesc, BufferId, CommandList, DeviceStats, FenceValue, GpuDevice, PipelineId, QueueKind,
    ShaderVariant, TextureDesc, TextureId,
};
use crate::error::{PipelineError, PipelineResult};

struct Job {
    value: FenceValue,
    list: CommandList,
}

struct SubmitState {
    sender: Option<Sender<Job>>,
    last: FenceValue,
}

struct Queue {
    kind: QueueKind,
    submit: Mutex<SubmitState>,
    fence: Arc<Fence>,
    worker: Option<JoinHandle<()>>,
}

impl Queue {
    fn spawn(kind: QueueKind, executor: Arc<Executor>) -> PipelineResult<Self> {
        let (tx, rx) = unbounded::<Job>();
        let fence = Arc::new(Fence::new());
        let worker_fence = fence.clone();
        let worker = thread::Builder::new()
            .name(format!("gpu-{}-queue", kind))
            .spawn(move || {
                for job in rx.iter() {
                    let result = executor.execute(&job.list);
                    if let Err(e) = &result {
                        warn!(queue = %kind, value = job.value, error = %e, "command list failed");
                    }
                    worker_fence.signal(job.value, result);
                }
                worker_fence.mark_lost(format!("{} queue shut down", kind));
            })
            .map_err(|e| PipelineError::init("queue worker", e.to_string()))?;

        Ok(Self {
            kind,
            submit: Mutex::new(SubmitState {
                sender: Some(tx),
                last: 0,
            }),
            fence,
            worker: Some(worker),
        })
    }

    fn lock(&self) -> MutexGuard<'_, SubmitState> {
        self.submit.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn submit(&self, list: CommandList) -> PipelineResult<FenceValue> {
        let mut state = self.lock();
        let value = state.last + 1;
        let sender = state.sender.as_ref().ok_or_else(|| {
            PipelineError::device_lost(self.kind.to_string(), "device is shutting down")
        })?;
        sender.send(Job { value, list }).map_err(|_| {
            PipelineError::device_lost(self.kind.to_string(), "queue worker is gone")
        })?;
        state.last = value;
        Ok(value)
    }

    fn last_submitted(&self) -> FenceValue {
        self.lock().last
    }

    fn shutdown(&mut self) {
        self.lock().sender.take();
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                warn!(queue = %self.kind, "queue worker panicked");
                self.fence.mark_lost("queue worker panicked");
            }
        }
    }
}

/// Second-generation model: independent `Compute` and `Direct` queues.
pub struct QueuedDevice {
    executor: Arc<Executor>,
    compute: Queue,
    direct: Queue,
}

impl QueuedDevice {
    pub fn new() -> PipelineResult<Self> {
        let executor = Arc::new(Executor::new());
        let compute = Queue::spawn(QueueKind::Compute, executor.clone())?;
        let direct = Queue::spawn(QueueKind::Direct, executor.clone())?;
        debug!("queued device started");
        Ok(Self {
            executor,
            compute,
            direct,
        })
    }

    fn queue(&self, kind: QueueKind) -> &Queue {
        match kind {
            QueueKind::Compute => &self.compute,
            QueueKind::Direct => &self.direct,
        }
    }

    /// Highest completed fence value on `kind`.
    pub fn completed(&self, kind: QueueKind) -> FenceValue {
        self.queue(kind).fence.completed()
    }
}

impl GpuDevice for QueuedDevice {
    fn name(&self) -> &str {
        "queued"
    }

    fn supports_async_queues(&self) -> bool {
        true
    }

    fn create_texture(&self, desc: TextureDesc) -> PipelineResult<TextureId> {
        self.executor.create_texture(desc)
    }

    fn create_buffer(&self, desc: BufferDesc) -> PipelineResult<BufferId> {
        self.executor.create_buffer(desc)
    }

    fn create_pipeline(&self, variant: ShaderVariant) -> PipelineResult<PipelineId> {
        debug!(entry = %variant.entry_point(), "compiling pipeline");
        Ok(self.executor.create_pipeline(variant))
    }

    fn write_texture(&self, texture: TextureId, rgba: &[u8]) -> PipelineResult<()> {
        self.executor.write_texture(texture, rgba)
    }

    fn submit(&self, queue: QueueKind, list: CommandList) -> PipelineResult<FenceValue> {
        self.queue(queue).submit(list)
    }

    fn wait(&self, queue: QueueKind, value: FenceValue) -> PipelineResult<()> {
        self.queue(queue).fence.wait(&queue.to_string(), value)
    }

    fn wait_idle(&self) -> PipelineResult<()> {
        for q in [&self.compute, &self.direct] {
            q.fence.wait_drained(&q.kind.to_string(), q.last_submitted())?;
        }
        Ok(())
    }

    fn read_buffer(&self, buffer: BufferId, out: &mut Vec<i32>) -> PipelineResult<()> {
        self.executor.read_buffer(buffer, out)
    }

    fn destroy_texture(&self, texture: TextureId) {
        self.executor.destroy_texture(texture)
    }

    fn destroy_buffer(&self, buffer: BufferId) {
        self.executor.destroy_buffer(buffer)
    }

    fn destroy_pipeline(&self, pipeline: PipelineId) {
        self.executor.destroy_pipeline(pipeline)
    }

    fn stats(&self) -> DeviceStats {
        self.executor.stats()
    }
}

impl Drop for QueuedDevice {
    fn drop(&mut self) {
        // Workers drain what is queued before exiting.
        self.compute.shutdown();
        self.direct.shutdown();
    }
}
