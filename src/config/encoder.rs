//! # Encoder Configuration
//!
//! Common interface between the CLI and the library. Holds everything needed to
//! build a device, pick a backend and drive it for a number of frames.
//!
//! ## Configuration Parameters
//!
//! | Parameter | Type | Range | Description |
//! |-----------|------|-------|-------------|
//! | `quality` | `u8` | 1-100 | JPEG quality factor |
//! | `output_scale` | `f32` | (0, 1] | Resample factor applied before encoding |
//! | `subsampling` | `Subsampling` | 444/422/420 | Chroma subsampling mode |
//! | `backend` | `BackendKind` | sync/overlapped | Orchestration strategy |
//! | `device` | `DeviceKind` | immediate/queued | Software GPU device model |
//! | `frames` | `u32` | ≥ 1 | Number of frames to encode |
//! | `output_dir` | `Option<PathBuf>` | writable dir | Where numbered stills go |
//!
//! ## Examples
//!
//! ```rust
//! use gpujpeg_stream::config::EncoderConfig;
//!
//! let config = EncoderConfig::default();
//! assert!(config.validate().is_ok());
//! let params = config.to_params();
//! assert_eq!(params.quality, 85);
//! ```

use std::{fmt, path::PathBuf, str::FromStr};

use crate::config::params::EncodeParams;
use crate::error::{PipelineError, PipelineResult};
use crate::jpeg::Subsampling;

/// Which orchestration strategy drives the encoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    /// One submission per frame on the caller's thread
    Sync,
    /// Background loop with separate compute and direct queues
    Overlapped,
}

/// Which software device model executes command lists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceKind {
    /// Single queue, work runs at submit time
    Immediate,
    /// One worker thread per queue with timeline fences
    Queued,
}

impl FromStr for BackendKind {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "sync" | "synchronous" => Ok(Self::Sync),
            "overlapped" | "async" => Ok(Self::Overlapped),
            _ => Err(PipelineError::validation(
                "backend",
                "expected sync or overlapped",
                s,
            )),
        }
    }
}

impl FromStr for DeviceKind {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "immediate" => Ok(Self::Immediate),
            "queued" => Ok(Self::Queued),
            _ => Err(PipelineError::validation(
                "device",
                "expected immediate or queued",
                s,
            )),
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Sync => "sync",
            Self::Overlapped => "overlapped",
        })
    }
}

impl fmt::Display for DeviceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Immediate => "immediate",
            Self::Queued => "queued",
        })
    }
}

/// Configuration for an encoding run.
#[derive(Debug, Clone)]
pub struct EncoderConfig {
    /// JPEG quality, 1 (smallest) to 100 (best).
    pub quality: u8,

    /// Output scale applied to the frame source before block alignment.
    pub output_scale: f32,

    /// Chroma subsampling mode.
    pub subsampling: Subsampling,

    pub backend: BackendKind,

    pub device: DeviceKind,

    /// Frames to encode before stopping.
    pub frames: u32,

    /// Directory for numbered `.jpg` stills; nothing is written when `None`.
    pub output_dir: Option<PathBuf>,
}

impl Default for EncoderConfig {
    /// Default values:
    /// - `quality`: 85
    /// - `output_scale`: 1.0 (no resample)
    /// - `subsampling`: 4:2:0
    /// - `backend`: sync
    /// - `device`: queued
    /// - `frames`: 1
    fn default() -> Self {
        Self {
            quality: 85,
            output_scale: 1.0,
            subsampling: Subsampling::S420,
            backend: BackendKind::Sync,
            device: DeviceKind::Queued,
            frames: 1,
            output_dir: None,
        }
    }
}

impl EncoderConfig {
    /// Validates the configuration parameters.
    pub fn validate(&self) -> PipelineResult<()> {
        if !(1..=100).contains(&self.quality) {
            return Err(PipelineError::config(
                "quality",
                self.quality.to_string(),
                "must be between 1 and 100",
            ));
        }
        if !(self.output_scale > 0.0 && self.output_scale <= 1.0) {
            return Err(PipelineError::config(
                "output_scale",
                self.output_scale.to_string(),
                "must be in (0, 1]",
            ));
        }
        if self.frames == 0 {
            return Err(PipelineError::config(
                "frames",
                "0",
                "must encode at least one frame",
            ));
        }
        if self.backend == BackendKind::Overlapped && self.device == DeviceKind::Immediate {
            return Err(PipelineError::config(
                "backend",
                "overlapped",
                "requires a device with separate compute and direct queues",
            )
            .with_recovery_suggestion("Use --device queued or --backend sync"));
        }
        Ok(())
    }

    /// Per-frame parameters derived from this configuration.
    pub fn to_params(&self) -> EncodeParams {
        EncodeParams {
            quality: self.quality,
            output_scale: self.output_scale,
            subsampling: self.subsampling,
        }
    }
}
