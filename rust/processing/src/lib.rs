// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! # BimClash Processing
//!
//! Runs one model version through the whole analysis as a single batch job:
//!
//! 1. **Indexing**: normalize raw geometry, build the element table and the
//!    spatial grid
//! 2. **Detecting**: evaluate candidate pairs and deduplicate conflicts
//! 3. **Prescribing**: rank remediation candidates for every conflict
//!
//! The job runs on a dedicated worker pool. Progress is reported as a
//! non-decreasing fraction and cancellation is observed once per processing
//! unit. A wall-clock limit and a memory ceiling end the run with a `Failed`
//! status and partial results flagged incomplete. The memory estimate grows
//! as candidate pairs, conflicts and prescriptions are kept, so the ceiling
//! holds in the middle of a stage too.
//!
//! ```rust,no_run
//! use bimclash_core::{Category, Discipline, RawElement};
//! use bimclash_processing::{Pipeline, RunControl};
//! use bimclash_rules::SuccessHistory;
//!
//! let pipeline = Pipeline::with_defaults()?;
//! let elements = vec![
//!     RawElement::boxed("beam", Discipline::Structural, Category::Beam, [0.0; 3], [10.0; 3]),
//!     RawElement::boxed("duct", Discipline::Mechanical, Category::Duct, [5.0; 3], [15.0; 3]),
//! ];
//! let report = pipeline.run(&elements, &SuccessHistory::new(), &RunControl::default())?;
//! assert_eq!(report.conflicts.len(), 1);
//! # Ok::<(), bimclash_processing::Error>(())
//! ```

pub mod cache;
pub mod config;
pub mod error;
pub mod guard;
pub mod pipeline;
pub mod progress;
pub mod report;
pub mod runner;
pub mod state;

pub use cache::{cache_key, InMemoryCache, ResultCache};
pub use config::{PipelineConfig, RunLimits};
pub use error::{Error, Result};
pub use pipeline::{Pipeline, RunControl};
pub use progress::{CancelToken, NoProgress, ProgressSink};
pub use report::{RunReport, RunSummary, SeverityCounts};
pub use runner::RunHandle;
pub use state::{ResourceExceeded, RunState, RunStatus, StateMachine};
