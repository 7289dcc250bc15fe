// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! BimClash Prescriptive Rules Engine
//!
//! Turns conflicts into ranked remediation candidates. Rule templates match on
//! conflict type, discipline pair (in either order) and severity range; their
//! cost and time formulas are evaluated against the conflict's geometry and a
//! [`CostBook`]. Confidence blends each template's base weight with its
//! feedback-derived success rate.
//!
//! ```rust,ignore
//! let engine = PrescriptiveEngine::default();
//! let solutions = engine.prescribe(&conflict, &elements, &SuccessHistory::new());
//! assert!(!solutions.is_empty());
//! ```

pub mod context;
pub mod costs;
pub mod engine;
pub mod error;
pub mod feedback;
pub mod formula;
pub mod table;

pub use context::FormulaContext;
pub use costs::CostBook;
pub use engine::{
    analysis_confidence, blend_confidence, EngineConfig, Prescription, Prescriptions,
    PrescriptiveEngine, ProjectBaseline,
};
pub use error::{Error, Result};
pub use feedback::{Feedback, SuccessHistory, SuccessRecord};
pub use formula::{Expr, Formula, Function};
pub use table::{CompiledTemplate, RuleTable};
