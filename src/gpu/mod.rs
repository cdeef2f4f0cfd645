//! # GPU Compute Backend Interface
//!
//! The pipeline and the entropy stage are written once against [`GpuDevice`].
//! A device owns textures (RGBA8 surfaces), buffers (`i32` coefficient or
//! staging storage) and compiled pipelines, and executes [`CommandList`]s on
//! one or more queues, reporting completion through per-queue fence values.
//!
//! ## Devices
//!
//! - [`ImmediateDevice`]: one queue, work executes inside `submit`
//! - [`QueuedDevice`]: independent `Compute` and `Direct` queues, each drained
//!   by its own worker thread, with timeline fences
//!
//! Both share the same [`executor`] and [`kernels`], so a given input produces
//! bit-identical coefficients on either device.
//!
//! ## Lifetime Rules
//!
//! Destroying a resource that a submitted, unwaited command list references is
//! a caller bug. Owners call [`GpuDevice::wait_idle`] before releasing.

use std::fmt;
use std::sync::Arc;

use crate::config::DeviceKind;
use crate::error::PipelineResult;
use crate::jpeg::{Component, Subsampling};

pub mod command;
pub mod executor;
pub mod fence;
pub mod immediate;
pub mod kernels;
pub mod queued;

pub use command::{Command, CommandList, DispatchConstants};
pub use immediate::ImmediateDevice;
pub use queued::QueuedDevice;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TextureId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BufferId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PipelineId(pub u64);

/// Monotonic per-queue completion counter; 0 means "nothing submitted".
pub type FenceValue = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueueKind {
    Compute,
    Direct,
}

impl fmt::Display for QueueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            QueueKind::Compute => "compute",
            QueueKind::Direct => "direct",
        })
    }
}

/// One compiled compute program: a subsampling mode and the component it writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ShaderVariant {
    pub subsampling: Subsampling,
    pub component: Component,
}

impl ShaderVariant {
    /// All nine variants, mode-major.
    pub fn all() -> impl Iterator<Item = ShaderVariant> {
        Subsampling::ALL.into_iter().flat_map(|subsampling| {
            Component::ALL.into_iter().map(move |component| ShaderVariant {
                subsampling,
                component,
            })
        })
    }

    pub fn entry_point(&self) -> String {
        format!("encode_{:?}_{}", self.component, self.subsampling.label().replace(':', ""))
            .to_lowercase()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextureDesc {
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferUsage {
    /// Written by dispatches
    Storage,
    /// CPU-readable copy target
    Readback,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferDesc {
    /// Length in `i32` elements
    pub len: usize,
    pub usage: BufferUsage,
}

/// Counters exposed for diagnostics and leak checks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeviceStats {
    pub submissions: u64,
    pub dispatches: u64,
    pub presents: u64,
    pub live_textures: usize,
    pub live_buffers: usize,
    pub live_pipelines: usize,
}

impl DeviceStats {
    pub fn live_resources(&self) -> usize {
        self.live_textures + self.live_buffers + self.live_pipelines
    }
}

/// Capability interface of a compute device.
pub trait GpuDevice: Send + Sync {
    fn name(&self) -> &str;

    /// True when `Compute` and `Direct` are independent queues.
    fn supports_async_queues(&self) -> bool;

    fn create_texture(&self, desc: TextureDesc) -> PipelineResult<TextureId>;

    fn create_buffer(&self, desc: BufferDesc) -> PipelineResult<BufferId>;

    /// Compile a shader variant. Failure is an initialization error.
    fn create_pipeline(&self, variant: ShaderVariant) -> PipelineResult<PipelineId>;

    /// Upload tightly packed RGBA8 pixels; the length must match the texture.
    fn write_texture(&self, texture: TextureId, rgba: &[u8]) -> PipelineResult<()>;

    fn submit(&self, queue: QueueKind, list: CommandList) -> PipelineResult<FenceValue>;

    /// Block until `value` on `queue` has completed; reports its failure if any.
    fn wait(&self, queue: QueueKind, value: FenceValue) -> PipelineResult<()>;

    /// Block until every queue has drained.
    fn wait_idle(&self) -> PipelineResult<()>;

    /// Map a readback buffer and copy its contents into `out`.
    fn read_buffer(&self, buffer: BufferId, out: &mut Vec<i32>) -> PipelineResult<()>;

    fn destroy_texture(&self, texture: TextureId);

    fn destroy_buffer(&self, buffer: BufferId);

    fn destroy_pipeline(&self, pipeline: PipelineId);

    fn stats(&self) -> DeviceStats;
}

/// Open the software device selected by configuration.
pub fn open_device(kind: DeviceKind) -> PipelineResult<Arc<dyn GpuDevice>> {
    let device: Arc<dyn GpuDevice> = match kind {
        DeviceKind::Immediate => Arc::new(ImmediateDevice::new()),
        DeviceKind::Queued => Arc::new(QueuedDevice::new()?),
    };
    Ok(device)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_device_capabilities() {
        assert!(!open_device(DeviceKind::Immediate).unwrap().supports_async_queues());
        assert!(open_device(DeviceKind::Queued).unwrap().supports_async_queues());
    }

    #[test]
    fn test_nine_variants() {
        let all: Vec<_> = ShaderVariant::all().collect();
        assert_eq!(all.len(), 9);
        assert_eq!(all[0].entry_point(), "encode_y_444");
        assert_eq!(all[8].entry_point(), "encode_cr_420");
    }
}
