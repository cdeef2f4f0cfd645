//! Surface preparation: scale the frame and fit it to the MCU grid.
//!
//! When the scale is 1 and the frame is already aligned, the frame texture
//! itself is used and nothing is recorded. Otherwise a cached surface texture
//! of the aligned size receives a `Resample` command. The cache is keyed by
//! size and only rebuilt when the effective size changes.

use surface_scale::plan::{Size, SurfacePlan, build_plan};
use tracing::debug;

use crate::error::PipelineResult;
use crate::frame::Frame;
use crate::gpu::{CommandList, GpuDevice, TextureDesc, TextureId};
use crate::jpeg::Subsampling;

/// A block-aligned, GPU-readable view of the frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PreparedSurface {
    pub texture: TextureId,
    pub width: u32,
    pub height: u32,
    pub source: TextureId,
    pub plan: SurfacePlan,
}

impl PreparedSurface {
    /// True when the surface is the frame texture itself.
    pub fn aliases_source(&self) -> bool {
        self.texture == self.source
    }

    /// Record the resample step, if one is needed.
    pub fn record(&self, list: &mut CommandList) {
        if !self.aliases_source() {
            list.resample(self.source, self.texture, self.plan);
        }
    }
}

#[derive(Debug, Default)]
pub struct SurfacePreparation {
    cached: Option<(Size, TextureId)>,
    rebuilds: u64,
}

impl SurfacePreparation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_valid_surface(
        &mut self,
        device: &dyn GpuDevice,
        frame: &Frame,
        output_scale: f32,
        subsampling: Subsampling,
    ) -> PipelineResult<PreparedSurface> {
        let (aw, ah) = subsampling.mcu_size();
        let plan = build_plan(
            Size::new(frame.width, frame.height),
            output_scale,
            Size::new(aw, ah),
        )?;

        if plan.is_passthrough() {
            return Ok(PreparedSurface {
                texture: frame.texture,
                width: frame.width,
                height: frame.height,
                source: frame.texture,
                plan,
            });
        }

        let texture = match self.cached {
            Some((size, id)) if size == plan.out => id,
            _ => {
                // Only reached between frames, after the previous frame was waited on.
                if let Some((_, old)) = self.cached.take() {
                    device.destroy_texture(old);
                }
                let id = device.create_texture(TextureDesc {
                    width: plan.out.w,
                    height: plan.out.h,
                })?;
                self.rebuilds += 1;
                debug!(width = plan.out.w, height = plan.out.h, "rebuilt prepared surface");
                self.cached = Some((plan.out, id));
                id
            }
        };

        Ok(PreparedSurface {
            texture,
            width: plan.out.w,
            height: plan.out.h,
            source: frame.texture,
            plan,
        })
    }

    /// How many times the surface texture was (re)created.
    pub fn rebuilds(&self) -> u64 {
        self.rebuilds
    }

    pub fn release(&mut self, device: &dyn GpuDevice) {
        if let Some((_, id)) = self.cached.take() {
            device.destroy_texture(id);
        }
    }
}
