// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Run guard: the checkpoint handed to every stage.
//!
//! Combines the cancel token, the wall-clock deadline and the memory budget,
//! and maps per-unit progress of the current stage into its band of the
//! overall fraction. Stages charge the budget per unit through
//! [`Checkpoint::charge`], so the ceiling also holds inside a stage.

use std::sync::atomic::{AtomicU64, AtomicU8, AtomicUsize, Ordering};
use std::sync::{Mutex, OnceLock};
use std::time::{Duration, Instant};

use bimclash_core::Checkpoint;

use crate::progress::{CancelToken, ProgressSink};
use crate::state::{ResourceExceeded, RunState};

/// Smallest fraction increment forwarded to the sink mid-stage.
const REPORT_STEP: f64 = 0.001;

const STAGES: [RunState; 3] = [RunState::Indexing, RunState::Detecting, RunState::Prescribing];

/// Why the guard stopped the run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Stop {
    Cancelled,
    Exceeded(ResourceExceeded),
}

/// Accounted working-set estimate against an optional ceiling.
#[derive(Debug)]
pub struct MemoryBudget {
    ceiling: Option<u64>,
    used: AtomicU64,
}

impl MemoryBudget {
    pub fn new(ceiling: Option<u64>) -> Self {
        Self {
            ceiling,
            used: AtomicU64::new(0),
        }
    }

    /// Add `bytes` to the estimate. Returns `false` once the ceiling is crossed.
    pub fn charge(&self, bytes: u64) -> bool {
        let used = self.used.fetch_add(bytes, Ordering::Relaxed).saturating_add(bytes);
        self.ceiling.map_or(true, |ceiling| used <= ceiling)
    }

    /// Return `bytes` of freed working set to the budget.
    pub fn release(&self, bytes: u64) {
        let _ = self
            .used
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |used| Some(used.saturating_sub(bytes)));
    }

    pub fn used(&self) -> u64 {
        self.used.load(Ordering::Relaxed)
    }

    pub fn ceiling(&self) -> Option<u64> {
        self.ceiling
    }
}

pub struct RunGuard<'a> {
    cancel: &'a CancelToken,
    sink: &'a dyn ProgressSink,
    deadline: Option<(Instant, Duration)>,
    memory: MemoryBudget,
    stop: OnceLock<Stop>,
    stage: AtomicU8,
    total: AtomicUsize,
    done: AtomicUsize,
    /// Last reported fraction, as f64 bits
    reported: AtomicU64,
    report_lock: Mutex<()>,
}

impl<'a> RunGuard<'a> {
    pub fn new(
        cancel: &'a CancelToken,
        sink: &'a dyn ProgressSink,
        timeout: Option<Duration>,
        memory_ceiling: Option<u64>,
    ) -> Self {
        Self {
            cancel,
            sink,
            deadline: timeout.map(|limit| (Instant::now() + limit, limit)),
            memory: MemoryBudget::new(memory_ceiling),
            stop: OnceLock::new(),
            stage: AtomicU8::new(0),
            total: AtomicUsize::new(0),
            done: AtomicUsize::new(0),
            reported: AtomicU64::new(0.0f64.to_bits()),
            report_lock: Mutex::new(()),
        }
    }

    /// Enter a processing stage and report its band start.
    pub fn enter(&self, state: RunState) {
        if let Some(slot) = STAGES.iter().position(|&s| s == state) {
            self.stage.store(slot as u8, Ordering::Release);
        }
        self.total.store(0, Ordering::Release);
        self.done.store(0, Ordering::Release);
        self.publish(state, state.band().0, true);
    }

    /// Report the band end of a fully processed stage.
    pub fn finish(&self, state: RunState) {
        self.publish(state, state.band().1, true);
    }

    /// Give back the estimate of a structure the run has dropped.
    pub fn release(&self, bytes: usize) {
        self.memory.release(bytes as u64);
    }

    pub fn memory_used(&self) -> u64 {
        self.memory.used()
    }

    /// Why the run stopped, if it did.
    pub fn stopped(&self) -> Option<&Stop> {
        self.stop.get()
    }

    /// Re-check cancel and deadline without processing a unit.
    pub fn check(&self) -> Option<&Stop> {
        self.proceed();
        self.stopped()
    }

    pub fn last_reported(&self) -> f64 {
        f64::from_bits(self.reported.load(Ordering::Acquire))
    }

    fn halt(&self, stop: Stop) {
        if self.stop.set(stop.clone()).is_ok() {
            tracing::warn!(reason = ?stop, "Stopping run");
        }
    }

    fn current_stage(&self) -> RunState {
        STAGES[self.stage.load(Ordering::Acquire) as usize]
    }

    fn publish(&self, state: RunState, fraction: f64, force: bool) {
        let fraction = fraction.clamp(0.0, 1.0);
        let last = self.last_reported();
        if fraction <= last || (!force && fraction - last < REPORT_STEP) {
            return;
        }
        let _lock = self.report_lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        // Re-read under the lock; another worker may have reported further.
        if fraction <= self.last_reported() {
            return;
        }
        self.reported.store(fraction.to_bits(), Ordering::Release);
        self.sink.report(state, fraction);
    }
}

impl Checkpoint for RunGuard<'_> {
    fn proceed(&self) -> bool {
        if self.stop.get().is_some() {
            return false;
        }
        if self.cancel.is_cancelled() {
            self.halt(Stop::Cancelled);
            return false;
        }
        if let Some((deadline, limit)) = self.deadline {
            if Instant::now() >= deadline {
                self.halt(Stop::Exceeded(ResourceExceeded::WallClock {
                    limit_ms: limit.as_millis() as u64,
                }));
                return false;
            }
        }
        true
    }

    fn begin(&self, units: usize) {
        self.total.store(units, Ordering::Release);
        self.done.store(0, Ordering::Release);
    }

    fn advance(&self, units: usize) {
        let done = self.done.fetch_add(units, Ordering::AcqRel) + units;
        let total = self.total.load(Ordering::Acquire);
        if total == 0 {
            return;
        }
        let state = self.current_stage();
        let (start, end) = state.band();
        let share = (done as f64 / total as f64).min(1.0);
        self.publish(state, start + (end - start) * share, false);
    }

    /// Charge `bytes` against the memory ceiling, stopping the run when crossed.
    fn charge(&self, bytes: usize) -> bool {
        if self.memory.charge(bytes as u64) {
            return true;
        }
        if let Some(ceiling) = self.memory.ceiling() {
            self.halt(Stop::Exceeded(ResourceExceeded::Memory {
                limit_bytes: ceiling,
                estimated_bytes: self.memory.used(),
            }));
        }
        false
    }
}
