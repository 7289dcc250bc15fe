// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Pipeline orchestration: index, detect, prescribe.

use std::mem::size_of;
use std::sync::Arc;
use std::time::Instant;

use bimclash_core::{Checkpoint, Conflict, RawElement, RawGeometry};
use bimclash_detect::detect;
use bimclash_geometry::{normalize_elements, ElementTable, SpatialIndex, PAIR_BYTES};
use bimclash_rules::{Prescription, PrescriptiveEngine, RuleTable, SuccessHistory};

use crate::cache::{cache_key, ResultCache};
use crate::config::PipelineConfig;
use crate::error::{Error, Result};
use crate::guard::{RunGuard, Stop};
use crate::progress::{CancelToken, NoProgress, ProgressSink};
use crate::report::{RunReport, RunSummary, SeverityCounts};
use crate::state::{RunState, RunStatus, StateMachine};

/// Per-run collaborators: cancellation, progress and result cache.
#[derive(Clone)]
pub struct RunControl {
    pub cancel: CancelToken,
    pub progress: Arc<dyn ProgressSink>,
    pub cache: Option<Arc<dyn ResultCache>>,
}

impl Default for RunControl {
    fn default() -> Self {
        Self {
            cancel: CancelToken::new(),
            progress: Arc::new(NoProgress),
            cache: None,
        }
    }
}

impl RunControl {
    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn with_progress(mut self, progress: Arc<dyn ProgressSink>) -> Self {
        self.progress = progress;
        self
    }

    pub fn with_cache(mut self, cache: Arc<dyn ResultCache>) -> Self {
        self.cache = Some(cache);
        self
    }
}

/// Results accumulated while stages run.
#[derive(Default)]
struct Partial {
    summary: RunSummary,
    conflicts: Vec<Conflict>,
    solutions: Vec<Prescription>,
}

/// Clash analysis pipeline with its own worker pool.
pub struct Pipeline {
    config: PipelineConfig,
    engine: PrescriptiveEngine,
    pool: rayon::ThreadPool,
}

impl Pipeline {
    /// Validate configuration and start the worker pool.
    pub fn new(config: PipelineConfig, rules: RuleTable) -> Result<Self> {
        config.limits.validate()?;
        config.detection.validate()?;
        let engine = PrescriptiveEngine::new(rules, config.costs.clone(), config.engine)?;
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(config.limits.worker_threads)
            .thread_name(|i| format!("bimclash-worker-{i}"))
            .build()
            .map_err(|e| Error::Workers(e.to_string()))?;

        tracing::debug!(worker_threads = config.limits.worker_threads, rules = engine.rules().len(), "Pipeline ready");
        Ok(Self { config, engine, pool })
    }

    /// Pipeline with default configuration and the built-in rule library.
    pub fn with_defaults() -> Result<Self> {
        Self::new(PipelineConfig::default(), RuleTable::builtin())
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn engine(&self) -> &PrescriptiveEngine {
        &self.engine
    }

    /// Content key of a run over `elements`.
    pub fn model_version(&self, elements: &[RawElement], history: &SuccessHistory) -> Result<String> {
        cache_key(
            self.config.unit,
            elements,
            &self.engine.rules().to_records(),
            &self.config.detection,
            self.engine.config(),
            self.engine.costs(),
            history,
        )
    }

    /// Run the whole pipeline over one model version, blocking the caller.
    ///
    /// Cancellation and resource limits do not produce `Err`: the report
    /// carries a `Cancelled` or `Failed` status with whatever was computed
    /// so far and `complete = false`.
    pub fn run(&self, elements: &[RawElement], history: &SuccessHistory, control: &RunControl) -> Result<RunReport> {
        let start = Instant::now();
        let model_version = self.model_version(elements, history)?;

        if let Some(report) = self.cached(&model_version, control) {
            return Ok(report);
        }

        tracing::info!(
            model_version = %model_version,
            elements = elements.len(),
            worker_threads = self.pool.current_num_threads(),
            "Starting clash analysis"
        );

        let limits = &self.config.limits;
        let guard = RunGuard::new(
            &control.cancel,
            control.progress.as_ref(),
            limits.timeout(),
            limits.memory_ceiling_bytes,
        );
        let mut machine = StateMachine::default();
        let mut partial = Partial::default();
        partial.summary.elements_received = elements.len();

        let stop = self
            .pool
            .install(|| self.execute(elements, history, &guard, &mut machine, &mut partial))?;

        let (status, complete) = match stop {
            None => (RunStatus::Completed, true),
            Some(Stop::Cancelled) => (RunStatus::Cancelled, false),
            Some(Stop::Exceeded(reason)) => (RunStatus::Failed { reason }, false),
        };
        machine.advance(status.state())?;

        let Partial {
            mut summary,
            conflicts,
            solutions,
        } = partial;
        summary.conflicts_by_severity = SeverityCounts::tally(&conflicts);
        summary.elapsed_ms = start.elapsed().as_millis() as u64;

        let report = RunReport {
            model_version,
            status,
            complete,
            conflicts,
            solutions,
            summary,
        };

        if report.complete {
            tracing::info!(
                conflicts = report.conflicts.len(),
                solutions = report.summary.solutions_generated,
                skipped_elements = report.summary.skipped_elements.len(),
                skipped_pairs = report.summary.skipped_pairs.len(),
                elapsed_ms = report.summary.elapsed_ms,
                "Clash analysis complete"
            );
            self.store(&report, control);
        } else {
            tracing::warn!(
                status = ?report.status,
                conflicts = report.conflicts.len(),
                solutions = report.summary.solutions_generated,
                memory_estimate_bytes = guard.memory_used(),
                elapsed_ms = report.summary.elapsed_ms,
                "Clash analysis stopped early; results are partial"
            );
        }
        Ok(report)
    }

    /// Runs the stages in order. Returns why the run stopped, or `None` when
    /// every stage finished.
    fn execute(
        &self,
        elements: &[RawElement],
        history: &SuccessHistory,
        guard: &RunGuard<'_>,
        machine: &mut StateMachine,
        partial: &mut Partial,
    ) -> Result<Option<Stop>> {
        // Indexing
        machine.advance(RunState::Indexing)?;
        guard.enter(RunState::Indexing);
        if !guard.charge(elements.iter().map(raw_bytes).sum()) {
            return Ok(halted(guard));
        }

        let stage = Instant::now();
        let normalized = normalize_elements(elements, self.config.unit, guard);
        partial.summary.elements_processed = normalized.elements.len();
        partial.summary.skipped_elements = normalized.skipped;
        if !normalized.complete {
            return Ok(halted(guard));
        }

        let table = ElementTable::from_elements(normalized.elements)?;
        if !guard.charge(table.approx_bytes()) {
            return Ok(halted(guard));
        }
        let index = SpatialIndex::build(&table, &self.config.detection.index_config())?;
        let stats = index.stats();
        partial.summary.index = Some(stats);
        if !guard.charge(index.approx_bytes()) {
            return Ok(halted(guard));
        }
        tracing::info!(
            elements = table.len(),
            cells = stats.cells,
            cell_size = stats.cell_size,
            elapsed_ms = stage.elapsed().as_millis() as u64,
            "Indexing stage complete"
        );
        guard.finish(RunState::Indexing);
        if let Some(stop) = guard.check() {
            return Ok(Some(stop.clone()));
        }

        // Detecting: pairs and new conflicts are charged as they are kept.
        machine.advance(RunState::Detecting)?;
        guard.enter(RunState::Detecting);
        let detection = detect(&table, &index, &self.config.detection, guard);
        partial.summary.candidate_pairs = detection.candidate_pairs;
        partial.summary.skipped_pairs = detection.skipped_pairs;
        partial.conflicts = detection.conflicts;
        guard.release(detection.candidate_pairs * PAIR_BYTES);
        if !detection.complete {
            return Ok(halted(guard));
        }
        guard.finish(RunState::Detecting);
        if let Some(stop) = guard.check() {
            return Ok(Some(stop.clone()));
        }

        // Prescribing
        machine.advance(RunState::Prescribing)?;
        guard.enter(RunState::Prescribing);
        let prescriptions = self
            .engine
            .prescribe_all(&partial.conflicts, &table, history, guard);
        partial.summary.solutions_generated = prescriptions.solution_count();
        partial.solutions = prescriptions.items;
        if !prescriptions.complete {
            return Ok(halted(guard));
        }
        guard.finish(RunState::Prescribing);
        Ok(None)
    }

    fn cached(&self, key: &str, control: &RunControl) -> Option<RunReport> {
        let cache = control.cache.as_ref()?;
        let json = cache.get(key)?;
        match serde_json::from_str::<RunReport>(&json) {
            Ok(mut report) if report.complete => {
                report.summary.from_cache = true;
                tracing::debug!(model_version = %key, "Serving run report from cache");
                control.progress.report(RunState::Completed, 1.0);
                Some(report)
            }
            Ok(_) => {
                tracing::warn!(model_version = %key, "Ignoring cached report of an incomplete run");
                None
            }
            Err(e) => {
                tracing::warn!(model_version = %key, error = %e, "Unreadable cached report, recomputing");
                None
            }
        }
    }

    fn store(&self, report: &RunReport, control: &RunControl) {
        let Some(cache) = control.cache.as_ref() else {
            return;
        };
        match serde_json::to_string(report) {
            Ok(json) => {
                tracing::debug!(model_version = %report.model_version, size = json.len(), "Cached run report");
                cache.put(&report.model_version, json);
            }
            Err(e) => tracing::warn!(error = %e, "Failed to serialize run report for caching"),
        }
    }
}

/// A stage only stops early through the guard, so a reason is always set.
fn halted(guard: &RunGuard<'_>) -> Option<Stop> {
    Some(guard.stopped().cloned().unwrap_or(Stop::Cancelled))
}

fn raw_bytes(raw: &RawElement) -> usize {
    let geometry = match &raw.geometry {
        RawGeometry::Vertices { points } => points.len() * size_of::<[f64; 3]>(),
        RawGeometry::Box { .. } | RawGeometry::Placed { .. } => 0,
    };
    size_of::<RawElement>() + raw.id.as_str().len() + geometry
}
