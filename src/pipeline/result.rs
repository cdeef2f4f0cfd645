//! Encoded frames and the single-slot hand-off between producer and consumers.

use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};

use serde_json::{Value, json};

use crate::error::{PipelineError, PipelineResult};

/// One encoded frame: header followed by the entropy-coded payload and EOI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodeResult {
    pub bits: Vec<u8>,
    pub header_size: usize,
    /// Payload length including the trailing EOI marker.
    pub data_size: usize,
    pub width: u32,
    pub height: u32,
    pub frame_index: u64,
}

impl EncodeResult {
    /// The complete baseline JPEG file.
    pub fn jpeg_bytes(&self) -> &[u8] {
        let end = (self.header_size + self.data_size).min(self.bits.len());
        &self.bits[..end]
    }

    pub fn payload(&self) -> &[u8] {
        let end = (self.header_size + self.data_size).min(self.bits.len());
        &self.bits[self.header_size.min(end)..end]
    }

    /// Write the bytes verbatim as a standalone `.jpg`.
    pub fn save_jpeg(&self, path: impl AsRef<Path>) -> PipelineResult<()> {
        let path = path.as_ref();
        fs::write(path, self.jpeg_bytes()).map_err(|e| {
            PipelineError::io("save_jpeg", e).with_path(path.display().to_string())
        })
    }

    pub fn summary(&self) -> Value {
        json!({
            "frame": self.frame_index,
            "width": self.width,
            "height": self.height,
            "header_size": self.header_size,
            "data_size": self.data_size,
        })
    }
}

/// Most recent result, overwritten by every successful encode.
///
/// The lock is held only while moving a result in or cloning it out, never
/// across a device wait.
#[derive(Debug, Default)]
pub struct LatestResult {
    slot: Mutex<Option<EncodeResult>>,
}

impl LatestResult {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Option<EncodeResult>> {
        self.slot.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn store(&self, result: EncodeResult) {
        *self.lock() = Some(result);
    }

    pub fn snapshot(&self) -> Option<EncodeResult> {
        self.lock().clone()
    }

    /// Borrow the latest result without cloning the bytes.
    pub fn with_latest<R>(&self, f: impl FnOnce(Option<&EncodeResult>) -> R) -> R {
        let guard = self.lock();
        f(guard.as_ref())
    }
}

/// Loop counters.
#[derive(Debug, Default)]
pub struct PipelineStats {
    encoded: AtomicU64,
    dropped: AtomicU64,
    iterations: AtomicU64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub frames_encoded: u64,
    pub frames_dropped: u64,
    pub iterations: u64,
}

impl PipelineStats {
    pub fn record_iteration(&self) {
        self.iterations.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_encoded(&self) {
        self.encoded.fetch_add(1, Ordering::Release);
    }

    pub fn record_dropped(&self) {
        self.dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            frames_encoded: self.encoded.load(Ordering::Acquire),
            frames_dropped: self.dropped.load(Ordering::Relaxed),
            iterations: self.iterations.load(Ordering::Relaxed),
        }
    }
}

impl StatsSnapshot {
    pub fn to_json(&self) -> Value {
        json!({
            "frames_encoded": self.frames_encoded,
            "frames_dropped": self.frames_dropped,
            "iterations": self.iterations,
        })
    }
}
