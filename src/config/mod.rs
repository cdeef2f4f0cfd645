//! # Configuration Module
//!
//! Startup configuration ([`EncoderConfig`]) and the per-frame parameters
//! ([`EncodeParams`]) that input handling may change while a backend runs.

pub mod encoder;
pub mod params;

pub use encoder::{BackendKind, DeviceKind, EncoderConfig};
pub use params::{EncodeParams, ParamsHandle};
