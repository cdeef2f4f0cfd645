//! Encoding backends and result sharing.
//!
//! - [`SyncBackend`]: caller-driven, one submission per frame, any device
//! - [`OverlappedBackend`]: background loop on a dual-queue device

pub mod overlapped;
pub mod result;
pub mod sync;

pub use overlapped::OverlappedBackend;
pub use result::{EncodeResult, LatestResult, PipelineStats, StatsSnapshot};
pub use sync::SyncBackend;
