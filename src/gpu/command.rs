//! Recorded command lists.
//!
//! Recording is pure data: a list can be built on any thread and handed to
//! [`GpuDevice::submit`](super::GpuDevice::submit) later.

use surface_scale::plan::SurfacePlan;

use super::{BufferId, PipelineId, TextureId};

/// Root constants of a JPEG dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchConstants {
    pub width: u32,
    pub height: u32,
    /// Divisors for the dispatched component, natural order.
    pub quant: [u16; 64],
}

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Scale and fit `src` into `dst` according to `plan`.
    Resample {
        src: TextureId,
        dst: TextureId,
        plan: SurfacePlan,
    },
    /// Run one component of the JPEG compute stage.
    Dispatch {
        pipeline: PipelineId,
        source: TextureId,
        output: BufferId,
        constants: DispatchConstants,
        groups: [u32; 3],
    },
    CopyBuffer {
        src: BufferId,
        dst: BufferId,
    },
    /// Copy pixels; `dst` adopts the extent of `src`.
    CopyTexture {
        src: TextureId,
        dst: TextureId,
    },
    Present {
        texture: TextureId,
    },
}

impl Command {
    /// Buffer this command writes, if any.
    pub fn writes_buffer(&self) -> Option<BufferId> {
        match self {
            Command::Dispatch { output, .. } => Some(*output),
            Command::CopyBuffer { dst, .. } => Some(*dst),
            _ => None,
        }
    }

    /// Buffer this command reads, if any.
    pub fn reads_buffer(&self) -> Option<BufferId> {
        match self {
            Command::CopyBuffer { src, .. } => Some(*src),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CommandList {
    pub label: &'static str,
    pub commands: Vec<Command>,
}

impl CommandList {
    pub fn new(label: &'static str) -> Self {
        Self {
            label,
            commands: Vec::new(),
        }
    }

    pub fn push(&mut self, command: Command) -> &mut Self {
        self.commands.push(command);
        self
    }

    pub fn resample(&mut self, src: TextureId, dst: TextureId, plan: SurfacePlan) -> &mut Self {
        self.push(Command::Resample { src, dst, plan })
    }

    pub fn dispatch(
        &mut self,
        pipeline: PipelineId,
        source: TextureId,
        output: BufferId,
        constants: DispatchConstants,
        groups: [u32; 3],
    ) -> &mut Self {
        self.push(Command::Dispatch {
            pipeline,
            source,
            output,
            constants,
            groups,
        })
    }

    pub fn copy_buffer(&mut self, src: BufferId, dst: BufferId) -> &mut Self {
        self.push(Command::CopyBuffer { src, dst })
    }

    pub fn copy_texture(&mut self, src: TextureId, dst: TextureId) -> &mut Self {
        self.push(Command::CopyTexture { src, dst })
    }

    pub fn present(&mut self, texture: TextureId) -> &mut Self {
        self.push(Command::Present { texture })
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    pub fn dispatch_count(&self) -> usize {
        self.commands
            .iter()
            .filter(|c| matches!(c, Command::Dispatch { .. }))
            .count()
    }
}
