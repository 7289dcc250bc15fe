// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Progress reporting and cancellation handles.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::state::RunState;

/// Receives run progress.
///
/// Calls are serialized and `fraction` never decreases within a run. A slow
/// sink slows the run down.
pub trait ProgressSink: Send + Sync {
    fn report(&self, state: RunState, fraction: f64);
}

/// Sink that drops every report.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn report(&self, _state: RunState, _fraction: f64) {}
}

impl<F> ProgressSink for F
where
    F: Fn(RunState, f64) + Send + Sync,
{
    fn report(&self, state: RunState, fraction: f64) {
        self(state, fraction)
    }
}

/// Cooperative cancellation flag shared between a caller and a run.
#[derive(Debug, Default, Clone)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}
