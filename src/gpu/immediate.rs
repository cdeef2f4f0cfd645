//! Single-queue device: command lists run to completion inside `submit`.

use std::sync::atomic::{AtomicU64, Ordering};

use tracing::debug;

use super::executor::Executor;
use super::{
    BufferDesc, BufferId, CommandList, DeviceStats, FenceValue, GpuDevice, PipelineId, QueueKind,
    ShaderVariant, TextureDesc, TextureId,
};
use crate::error::PipelineResult;

/// First-generation model: one implicit queue, all [`QueueKind`]s alias it.
#[derive(Default)]
pub struct ImmediateDevice {
    executor: Executor,
    fence: AtomicU64,
}

impl ImmediateDevice {
    pub fn new() -> Self {
        Self::default()
    }
}

impl GpuDevice for ImmediateDevice {
    fn name(&self) -> &str {
        "immediate"
    }

    fn supports_async_queues(&self) -> bool {
        false
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

    fn submit(&self, _queue: QueueKind, list: CommandList) -> PipelineResult<FenceValue> {
        let value = self.fence.fetch_add(1, Ordering::AcqRel) + 1;
        self.executor.execute(&list)?;
        Ok(value)
    }

    // Work already finished in submit.
    fn wait(&self, _queue: QueueKind, _value: FenceValue) -> PipelineResult<()> {
        Ok(())
    }

    fn wait_idle(&self) -> PipelineResult<()> {
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
