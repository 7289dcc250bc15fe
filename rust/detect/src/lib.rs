// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! BimClash Clash Detector
//!
//! Evaluates the candidate pairs of a [`SpatialIndex`](bimclash_geometry::SpatialIndex)
//! against discipline clearance tolerances, classifies each hit as a
//! collision, clearance violation or duplicate, grades its severity and
//! merges the results into a deduplicated conflict set.
//!
//! ```rust,no_run
//! use bimclash_core::{BoundingBox, Category, Discipline, Element, ElementId, Unbounded};
//! use bimclash_detect::{detect, DetectionConfig};
//! use bimclash_geometry::{ElementTable, SpatialIndex};
//!
//! let elements = vec![
//!     Element::new(ElementId::new("beam"), Discipline::Structural, Category::Beam,
//!         BoundingBox::new([0.0; 3], [10.0; 3])),
//!     Element::new(ElementId::new("duct"), Discipline::Mechanical, Category::Duct,
//!         BoundingBox::new([5.0; 3], [15.0; 3])),
//! ];
//! let config = DetectionConfig::default();
//! let table = ElementTable::from_elements(elements)?;
//! let index = SpatialIndex::build(&table, &config.index_config())?;
//! let detection = detect(&table, &index, &config, &Unbounded);
//! assert_eq!(detection.conflicts.len(), 1);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod classify;
pub mod config;
pub mod detector;
pub mod error;
pub mod set;
pub mod severity;

pub use classify::{classify_pair, Finding, PairOutcome, PairSkipReason, SkippedPair};
pub use config::{ClearanceEntry, ClearanceTable, DetectionConfig};
pub use detector::{detect, redetect, Detection};
pub use error::{Error, Result};
pub use set::{ConflictSet, MergeOutcome, MergeStats};
pub use severity::{SeverityInputs, SeverityModel, SeverityWeights};
