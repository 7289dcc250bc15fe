// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! # BimClash Core
//!
//! Shared data model for BIM clash analysis.
//!
//! ## Overview
//!
//! This crate defines the records that flow through the clash pipeline:
//!
//! - **Elements**: discrete model elements with an axis-aligned bounding box
//!   in millimetres, a [`Discipline`] and a [`Category`]
//! - **Conflicts**: deduplicated clashes between elements, keyed by
//!   [`ConflictKey`] and ordered by [`Severity`]
//! - **Solutions**: ranked remediation candidates produced by the rules engine
//! - **Rule templates**: externally authored records the rules engine matches
//!   conflicts against
//!
//! Every record is a closed, tagged type and round-trips through plain JSON.
//! Identifiers of conflicts and solutions are content digests, so the same
//! input always produces the same identifiers.
//!
//! ## Quick Start
//!
//! ```rust
//! use bimclash_core::{BoundingBox, Category, Discipline, Element, ElementId};
//!
//! let beam = Element::new(
//!     ElementId::new("beam-1"),
//!     Discipline::Structural,
//!     Category::Beam,
//!     BoundingBox::new([0.0, 0.0, 0.0], [6000.0, 300.0, 500.0]),
//! );
//! assert_eq!(beam.bounds.volume(), 6000.0 * 300.0 * 500.0);
//! ```

pub mod bounds;
pub mod conflict;
pub mod control;
pub mod digest;
pub mod element;
pub mod error;
pub mod rule;
pub mod solution;

pub use bounds::BoundingBox;
pub use conflict::{
    Conflict, ConflictId, ConflictKey, ConflictStatus, ConflictType, DisciplinePair, Severity,
};
pub use control::{Checkpoint, Unbounded};
pub use element::{Category, Discipline, Element, ElementId, LengthUnit, RawElement, RawGeometry};
pub use error::{Error, Result};
pub use rule::{DisciplineSelector, RuleTemplate, SeverityRange};
pub use solution::{ImpactAssessment, ImpactLevel, SolutionCandidate, SolutionId, SolutionType};
