//! # GPU JPEG Streaming Encoder
//!
//! Real-time baseline JPEG encoding split across a GPU compute stage and a CPU
//! entropy stage, with a synchronous backend and an overlapped dual-queue
//! backend that keeps producing frames in the background.
//!
//! ## Architecture
//!
//! The library is organized into several key modules:
//! - `gpu`: compute backend interface, command lists, fences and two software devices
//! - `surface`: scale and fit each frame to the MCU grid
//! - `jpeg`: tables, header assembly, bit writer and the entropy stage
//! - `encoder`: the explicit encoder object that owns every GPU resource
//! - `pipeline`: sync and overlapped backends, latest-result sharing, stats
//! - `frame`: frame sources (still images, synthetic scene)
//! - `config`: configuration and live-adjustable encode parameters
//!
//! ## Features
//!
//! - **Three subsampling modes**: 4:4:4, 4:2:2 and 4:2:0, each a fixed shader set
//! - **Header caching**: the 607-byte header is rebuilt only when quality, mode or size change
//! - **Overlapped queues**: compute and copy/present recorded on separate threads,
//!   ordered by timeline fences
//! - **Wait-before-free**: resources are released only after the device drains
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use gpujpeg_stream::config::EncodeParams;
//! use gpujpeg_stream::frame::StillImage;
//! use gpujpeg_stream::gpu::{GpuDevice, ImmediateDevice};
//! use gpujpeg_stream::pipeline::SyncBackend;
//!
//! # fn main() -> Result<(), gpujpeg_stream::PipelineError> {
//! let device: Arc<dyn GpuDevice> = Arc::new(ImmediateDevice::new());
//! let source = Box::new(StillImage::checkerboard(64, 64, 8)?);
//! let mut backend = SyncBackend::new(device, source)?;
//!
//! let result = backend.encode_next(&EncodeParams::default())?;
//! assert_eq!((result.width, result.height), (64, 64));
//! assert_eq!(&result.jpeg_bytes()[..2], &[0xFF, 0xD8]);
//!
//! backend.shutdown()?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod encoder;
pub mod error;
pub mod frame;
pub mod gpu;
pub mod jpeg;
pub mod pipeline;
pub mod surface;

/// Re-export error types for convenience
pub use error::{HasRecoverySuggestion, HasSeverity, PipelineError, PipelineResult, Retryable};

pub use config::{BackendKind, DeviceKind, EncodeParams, EncoderConfig, ParamsHandle};
pub use encoder::{JpegEncoder, PreparedFrame};
pub use jpeg::Subsampling;
pub use pipeline::{EncodeResult, OverlappedBackend, SyncBackend};
