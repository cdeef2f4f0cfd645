//! Timeline fence shared between a queue worker and waiting threads.

use std::collections::BTreeMap;
use std::sync::{Condvar, Mutex, MutexGuard};

use crate::error::{PipelineError, PipelineResult};

#[derive(Debug, Default)]
struct FenceState {
    completed: u64,
    failures: BTreeMap<u64, PipelineError>,
    lost: Option<String>,
}

/// Monotonic completion counter with failure slots.
///
/// The worker calls [`Fence::signal`] once per submitted value, in order.
/// A failed value stores its error; the first waiter that covers it takes the
/// error, later waiters see plain completion. If the worker disappears,
/// [`Fence::mark_lost`] wakes everyone and unfinished waits report
/// `DeviceLost` instead of blocking forever.
#[derive(Debug, Default)]
pub struct Fence {
    state: Mutex<FenceState>,
    cond: Condvar,
}

impl Fence {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, FenceState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn completed(&self) -> u64 {
        self.lock().completed
    }

    pub fn signal(&self, value: u64, result: PipelineResult<()>) {
        let mut state = self.lock();
        if let Err(e) = result {
            state.failures.insert(value, e);
        }
        state.completed = state.completed.max(value);
        drop(state);
        self.cond.notify_all();
    }

    pub fn mark_lost(&self, reason: impl Into<String>) {
        self.lock().lost = Some(reason.into());
        self.cond.notify_all();
    }

    fn wait_reached<'a>(
        &'a self,
        queue: &str,
        value: u64,
    ) -> PipelineResult<MutexGuard<'a, FenceState>> {
        let mut state = self.lock();
        while state.completed < value {
            if let Some(reason) = &state.lost {
                return Err(PipelineError::device_lost(queue, reason.clone())
                    .with_metadata("fence_value", value.to_string()));
            }
            state = self.cond.wait(state).unwrap_or_else(|e| e.into_inner());
        }
        Ok(state)
    }

    /// Wait until `value` completed without claiming failures.
    pub fn wait_drained(&self, queue: &str, value: u64) -> PipelineResult<()> {
        self.wait_reached(queue, value).map(|_| ())
    }

    /// Wait until `value` completed; returns the first unclaimed failure ≤ `value`.
    pub fn wait(&self, queue: &str, value: u64) -> PipelineResult<()> {
        let mut state = self.wait_reached(queue, value)?;
        let failed = state.failures.range(..=value).next().map(|(k, _)| *k);
        match failed.and_then(|k| state.failures.remove(&k)) {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}
