//! # JPEG Encoder
//!
//! [`JpegEncoder`] owns every GPU resource the pipeline needs: the nine
//! compiled shader variants, the cached prepared surface and two frame slots
//! (coefficient buffer plus readback buffer each). Backends drive it through
//! four steps:
//!
//! 1. [`prepare`](JpegEncoder::prepare): validate parameters, fit the surface,
//!    grow the slot, derive the quant tables
//! 2. [`PreparedFrame::record_compute`]: resample (if any) and three dispatches
//! 3. [`PreparedFrame::record_readback`]: coefficient buffer → readback buffer
//! 4. [`finish`](JpegEncoder::finish): map the readback buffer, entropy code,
//!    prepend the header
//!
//! The quant tables computed in step 1 feed both the dispatch constants and
//! the DQT segment, so the decoder dequantizes with the divisors the kernels
//! used.
//!
//! ## Resource Lifetime
//!
//! [`release`](JpegEncoder::release) waits for the device to go idle before
//! destroying anything. `Drop` calls it, so an encoder can never free a
//! buffer that an in-flight command list still references.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::config::EncodeParams;
use crate::error::{PipelineError, PipelineResult};
use crate::frame::Frame;
use crate::gpu::{
    BufferDesc, BufferId, BufferUsage, CommandList, DispatchConstants, GpuDevice, PipelineId,
    QueueKind, ShaderVariant,
};
use crate::jpeg::entropy::check_baseline_range;
use crate::jpeg::{Component, EntropyEncoder, FrameLayout, HeaderCache, QuantTables};
use crate::pipeline::EncodeResult;
use crate::surface::{PreparedSurface, SurfacePreparation};

pub const SLOT_COUNT: usize = 2;

#[derive(Debug, Default)]
struct FrameSlot {
    coefficients: Option<BufferId>,
    staging: Option<BufferId>,
    capacity: usize,
}

impl FrameSlot {
    fn ensure(&mut self, device: &dyn GpuDevice, len: usize) -> PipelineResult<(BufferId, BufferId)> {
        if let (Some(c), Some(s)) = (self.coefficients, self.staging) {
            if self.capacity >= len {
                return Ok((c, s));
            }
        }
        self.destroy(device);
        let coefficients = device.create_buffer(BufferDesc {
            len,
            usage: BufferUsage::Storage,
        })?;
        let staging = match device.create_buffer(BufferDesc {
            len,
            usage: BufferUsage::Readback,
        }) {
            Ok(id) => id,
            Err(e) => {
                device.destroy_buffer(coefficients);
                return Err(e);
            }
        };
        self.coefficients = Some(coefficients);
        self.staging = Some(staging);
        self.capacity = len;
        Ok((coefficients, staging))
    }

    fn destroy(&mut self, device: &dyn GpuDevice) {
        if let Some(id) = self.coefficients.take() {
            device.destroy_buffer(id);
        }
        if let Some(id) = self.staging.take() {
            device.destroy_buffer(id);
        }
        self.capacity = 0;
    }
}

/// Everything needed to record and finish one frame.
#[derive(Debug, Clone)]
pub struct PreparedFrame {
    pub frame_index: u64,
    pub slot: usize,
    pub layout: FrameLayout,
    pub surface: PreparedSurface,
    pub quant: QuantTables,
    pipelines: [PipelineId; 3],
    coefficients: BufferId,
    staging: BufferId,
}

impl PreparedFrame {
    /// Resample (if needed) and one dispatch per component.
    pub fn record_compute(&self, list: &mut CommandList) {
        self.surface.record(list);
        for component in Component::ALL {
            let constants = DispatchConstants {
                width: self.layout.width,
                height: self.layout.height,
                quant: *self.quant.table(component.table_id()),
            };
            list.dispatch(
                self.pipelines[component.index()],
                self.surface.texture,
                self.coefficients,
                constants,
                self.layout.dispatch_groups(),
            );
        }
    }

    /// Copy the coefficient buffer into the CPU-readable slot buffer.
    pub fn record_readback(&self, list: &mut CommandList) {
        list.copy_buffer(self.coefficients, self.staging);
    }

    pub fn coefficient_buffer(&self) -> BufferId {
        self.coefficients
    }
}

pub struct JpegEncoder {
    device: Arc<dyn GpuDevice>,
    pipelines: HashMap<ShaderVariant, PipelineId>,
    surface: SurfacePreparation,
    slots: [FrameSlot; SLOT_COUNT],
    headers: HeaderCache,
    entropy: EntropyEncoder,
    readback: Vec<i32>,
    released: bool,
}

impl JpegEncoder {
    /// Compile every shader variant. Any failure is an initialization error
    /// and leaves no resources behind.
    pub fn new(device: Arc<dyn GpuDevice>) -> PipelineResult<Self> {
        let mut pipelines = HashMap::new();
        for variant in ShaderVariant::all() {
            match device.create_pipeline(variant) {
                Ok(id) => {
                    pipelines.insert(variant, id);
                }
                Err(e) => {
                    for id in pipelines.values() {
                        device.destroy_pipeline(*id);
                    }
                    return Err(PipelineError::init(
                        format!("shader {}", variant.entry_point()),
                        e.to_string(),
                    )
                    .with_recovery_suggestion("Check that the device supports compute pipelines"));
                }
            }
        }
        info!(device = device.name(), pipelines = pipelines.len(), "jpeg encoder initialized");

        Ok(Self {
            device,
            pipelines,
            surface: SurfacePreparation::new(),
            slots: Default::default(),
            headers: HeaderCache::default(),
            entropy: EntropyEncoder::new(),
            readback: Vec::new(),
            released: false,
        })
    }

    pub fn device(&self) -> &Arc<dyn GpuDevice> {
        &self.device
    }

    fn pipeline(&self, variant: ShaderVariant) -> PipelineResult<PipelineId> {
        self.pipelines
            .get(&variant)
            .copied()
            .ok_or_else(|| PipelineError::init(variant.entry_point(), "pipeline not compiled"))
    }

    /// Resolve surface, slot and tables for one frame.
    pub fn prepare(
        &mut self,
        frame: &Frame,
        params: &EncodeParams,
        frame_index: u64,
    ) -> PipelineResult<PreparedFrame> {
        if self.released {
            return Err(PipelineError::state(
                "released",
                "prepare",
                "encoder resources were already released",
            ));
        }
        params.validate()?;

        let surface = self.surface.get_valid_surface(
            self.device.as_ref(),
            frame,
            params.output_scale,
            params.subsampling,
        )?;
        let layout = FrameLayout::new(surface.width, surface.height, params.subsampling)?;

        let slot = (frame_index % SLOT_COUNT as u64) as usize;
        let (coefficients, staging) =
            self.slots[slot].ensure(self.device.as_ref(), layout.coefficient_len())?;

        let mut pipelines = [PipelineId(0); 3];
        for component in Component::ALL {
            pipelines[component.index()] = self.pipeline(ShaderVariant {
                subsampling: params.subsampling,
                component,
            })?;
        }

        debug!(
            frame_index,
            slot,
            width = layout.width,
            height = layout.height,
            quality = params.quality,
            mode = %params.subsampling,
            "prepared frame"
        );

        Ok(PreparedFrame {
            frame_index,
            slot,
            layout,
            surface,
            quant: QuantTables::for_quality(params.quality),
            pipelines,
            coefficients,
            staging,
        })
    }

    /// Map the readback buffer and produce the JPEG.
    ///
    /// Must only be called after the list recorded by
    /// [`PreparedFrame::record_readback`] has been waited on.
    pub fn finish(&mut self, prepared: &PreparedFrame) -> PipelineResult<EncodeResult> {
        self.device.read_buffer(prepared.staging, &mut self.readback)?;
        let layout = prepared.layout;
        let needed = layout.coefficient_len();
        if self.readback.len() < needed {
            return Err(PipelineError::contract(
                "readback coefficient count",
                needed,
                self.readback.len(),
            ));
        }

        let coefficients = &self.readback[..needed];
        check_baseline_range(coefficients)?;
        let payload = self.entropy.encode(coefficients, &layout);
        let header =
            self.headers
                .get(&prepared.quant, layout.subsampling, layout.width, layout.height);

        let mut bits = Vec::with_capacity(header.len() + payload.len());
        bits.extend_from_slice(header);
        bits.extend_from_slice(payload);

        Ok(EncodeResult {
            header_size: header.len(),
            data_size: payload.len(),
            bits,
            width: layout.width,
            height: layout.height,
            frame_index: prepared.frame_index,
        })
    }

    /// Synchronous encode: one submission, one wait, on the caller's thread.
    pub fn encode(
        &mut self,
        frame: &Frame,
        params: &EncodeParams,
        frame_index: u64,
    ) -> PipelineResult<EncodeResult> {
        let prepared = self.prepare(frame, params, frame_index)?;
        let mut list = CommandList::new("encode");
        prepared.record_compute(&mut list);
        prepared.record_readback(&mut list);
        let fence = self.device.submit(QueueKind::Direct, list)?;
        self.device.wait(QueueKind::Direct, fence)?;
        self.finish(&prepared)
    }

    pub fn surface_rebuilds(&self) -> u64 {
        self.surface.rebuilds()
    }

    pub fn header_builds(&self) -> u64 {
        self.headers.builds()
    }

    /// Wait for the device to go idle, then destroy every owned resource.
    pub fn release(&mut self) -> PipelineResult<()> {
        if self.released {
            return Ok(());
        }
        self.released = true;
        let idle = self.device.wait_idle();
        if let Err(e) = &idle {
            warn!(error = %e, "device did not drain cleanly before release");
        }

        let device = self.device.as_ref();
        for slot in &mut self.slots {
            slot.destroy(device);
        }
        self.surface.release(device);
        for (_, id) in self.pipelines.drain() {
            device.destroy_pipeline(id);
        }
        debug!("jpeg encoder released");
        idle
    }
}

impl Drop for JpegEncoder {
    fn drop(&mut self) {
        if let Err(e) = self.release() {
            warn!(error = %e, "jpeg encoder release failed during drop");
        }
    }
}
