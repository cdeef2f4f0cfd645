//! Synchronous backend: one frame per call, fully serialized on the caller.
//!
//! Prepare → dispatch → wait → readback → entropy → result, with a single
//! submission to the direct queue. Works on every device.

use std::sync::Arc;

use tracing::{debug, info, warn};

use super::result::{EncodeResult, LatestResult, PipelineStats, StatsSnapshot};
use crate::config::EncodeParams;
use crate::encoder::JpegEncoder;
use crate::error::{PipelineResult, classify};
use crate::frame::FrameSource;
use crate::gpu::GpuDevice;

pub struct SyncBackend {
    encoder: JpegEncoder,
    source: Box<dyn FrameSource>,
    latest: LatestResult,
    stats: PipelineStats,
    next_index: u64,
}

impl SyncBackend {
    pub fn new(device: Arc<dyn GpuDevice>, source: Box<dyn FrameSource>) -> PipelineResult<Self> {
        let encoder = JpegEncoder::new(device)?;
        let (w, h) = source.size();
        info!(width = w, height = h, "sync backend ready");
        Ok(Self {
            encoder,
            source,
            latest: LatestResult::new(),
            stats: PipelineStats::default(),
            next_index: 0,
        })
    }

    /// Acquire and encode the next frame.
    ///
    /// A transient failure abandons the frame: the previous result stays
    /// visible and the error is returned so the caller can decide to go on.
    pub fn encode_next(&mut self, params: &EncodeParams) -> PipelineResult<EncodeResult> {
        let index = self.next_index;
        self.next_index += 1;
        self.stats.record_iteration();

        let outcome = self
            .source
            .acquire(self.encoder.device().as_ref(), index)
            .and_then(|frame| self.encoder.encode(&frame, params, index));

        match outcome {
            Ok(result) => {
                debug!(frame = index, bytes = result.bits.len(), "encoded frame");
                self.stats.record_encoded();
                self.latest.store(result.clone());
                Ok(result)
            }
            Err(e) => {
                if classify::is_transient(&e) {
                    self.stats.record_dropped();
                    warn!(frame = index, error = %e, "frame dropped");
                }
                Err(e)
            }
        }
    }

    pub fn latest(&self) -> Option<EncodeResult> {
        self.latest.snapshot()
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    pub fn encoder(&self) -> &JpegEncoder {
        &self.encoder
    }

    /// Wait for the device, then release the encoder and the source.
    pub fn shutdown(mut self) -> PipelineResult<()> {
        let released = self.encoder.release();
        self.source.release(self.encoder.device().as_ref());
        info!(encoded = self.stats.snapshot().frames_encoded, "sync backend stopped");
        released
    }
}
