// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! BimClash Geometry Indexer
//!
//! Normalizes raw element geometry into millimetre bounding boxes and builds a
//! grid-based spatial index that enumerates candidate element pairs without
//! false negatives.

pub mod error;
pub mod index;
pub mod normalize;
pub mod table;

pub use error::{Error, Result};
pub use index::{CandidatePairs, IndexConfig, IndexStats, SpatialIndex, PAIR_BYTES};
pub use normalize::{normalize_element, normalize_elements, Normalized, SkipReason, SkippedElement};
pub use table::ElementTable;
