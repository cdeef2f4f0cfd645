//! Per-frame encode parameters and a shared handle for live adjustment.

use std::sync::{Arc, Mutex, MutexGuard};

use crate::error::{PipelineError, PipelineResult};
use crate::jpeg::Subsampling;

pub const MIN_QUALITY: u8 = 1;
pub const MAX_QUALITY: u8 = 100;
/// Lowest scale reachable through the interactive setters.
pub const MIN_INTERACTIVE_SCALE: f32 = 0.1;

/// Parameters read fresh for every frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EncodeParams {
    pub quality: u8,
    pub output_scale: f32,
    pub subsampling: Subsampling,
}

impl Default for EncodeParams {
    fn default() -> Self {
        Self {
            quality: 85,
            output_scale: 1.0,
            subsampling: Subsampling::S420,
        }
    }
}

impl EncodeParams {
    pub fn validate(&self) -> PipelineResult<()> {
        if !(MIN_QUALITY..=MAX_QUALITY).contains(&self.quality) {
            return Err(PipelineError::validation(
                "quality",
                "1..=100",
                self.quality.to_string(),
            ));
        }
        if !(self.output_scale > 0.0 && self.output_scale <= 1.0) {
            return Err(PipelineError::validation(
                "output_scale",
                "(0, 1]",
                self.output_scale.to_string(),
            ));
        }
        Ok(())
    }

    /// Pull quality and scale into the ranges the interactive setters allow.
    pub fn clamped(self) -> Self {
        Self {
            quality: clamp_quality(self.quality as i32),
            output_scale: clamp_scale(self.output_scale),
            subsampling: self.subsampling,
        }
    }
}

fn clamp_quality(quality: i32) -> u8 {
    quality.clamp(MIN_QUALITY as i32, MAX_QUALITY as i32) as u8
}

fn clamp_scale(scale: f32) -> f32 {
    let scale = if scale.is_nan() { 1.0 } else { scale };
    scale.clamp(MIN_INTERACTIVE_SCALE, 1.0)
}

/// Shared, lock-protected parameters.
///
/// Every setter clamps, so a running loop never sees parameters that would
/// fail validation. The encode loop calls
/// [`ParamsHandle::get`] once per frame and works on the copy.
#[derive(Debug, Clone, Default)]
pub struct ParamsHandle {
    inner: Arc<Mutex<EncodeParams>>,
}

impl ParamsHandle {
    pub fn new(params: EncodeParams) -> Self {
        Self {
            inner: Arc::new(Mutex::new(params.clamped())),
        }
    }

    // A poisoned lock still holds plain-old-data, so keep using it.
    fn lock(&self) -> MutexGuard<'_, EncodeParams> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Snapshot of the current parameters.
    pub fn get(&self) -> EncodeParams {
        *self.lock()
    }

    pub fn set(&self, params: EncodeParams) {
        *self.lock() = params.clamped();
    }

    pub fn set_quality(&self, quality: i32) {
        self.lock().quality = clamp_quality(quality);
    }

    pub fn set_output_scale(&self, scale: f32) {
        self.lock().output_scale = clamp_scale(scale);
    }

    pub fn set_subsampling(&self, subsampling: Subsampling) {
        self.lock().subsampling = subsampling;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_setters_clamp() {
        let handle = ParamsHandle::new(EncodeParams::default());
        handle.set_quality(0);
        assert_eq!(handle.get().quality, 1);
        handle.set_quality(250);
        assert_eq!(handle.get().quality, 100);

        handle.set_output_scale(0.01);
        assert_eq!(handle.get().output_scale, MIN_INTERACTIVE_SCALE);
        handle.set_output_scale(f32::NAN);
        assert_eq!(handle.get().output_scale, 1.0);
    }

    #[test]
    fn test_set_clamps_whole_params() {
        let handle = ParamsHandle::default();
        handle.set(EncodeParams {
            quality: 0,
            output_scale: 1.5,
            subsampling: Subsampling::S422,
        });
        let params = handle.get();
        assert_eq!(params.quality, MIN_QUALITY);
        assert_eq!(params.output_scale, 1.0);
        assert_eq!(params.subsampling, Subsampling::S422);
        assert!(params.validate().is_ok());

        handle.set(EncodeParams {
            output_scale: 0.0,
            ..params
        });
        assert_eq!(handle.get().output_scale, MIN_INTERACTIVE_SCALE);
    }

    #[test]
    fn test_clones_share_state() {
        let a = ParamsHandle::default();
        let b = a.clone();
        b.set_subsampling(Subsampling::S444);
        assert_eq!(a.get().subsampling, Subsampling::S444);
    }

    #[test]
    fn test_validate() {
        assert!(EncodeParams::default().validate().is_ok());
        let bad = EncodeParams {
            output_scale: 0.0,
            ..EncodeParams::default()
        };
        assert!(bad.validate().is_err());
    }
}
