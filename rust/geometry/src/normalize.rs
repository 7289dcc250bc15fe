// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Geometry normalization
//!
//! Turns each raw element geometry into a world-space bounding box in
//! millimetres. This is a bounding-volume approximation: the box spans the
//! true extents of the underlying representation, nothing finer.
//!
//! Elements that do not resolve to a finite, non-degenerate box are excluded
//! and reported as skipped; a bad element never fails the batch.

use bimclash_core::{
    BoundingBox, Checkpoint, Element, ElementId, LengthUnit, RawElement, RawGeometry,
};
use nalgebra::{Matrix4, Point3};
use rayon::prelude::*;
use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};

/// Why an element was left out of the element table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum SkipReason {
    /// A coordinate or transform entry is NaN or infinite
    NonFinite,
    /// Zero or negative extent along `axis` (0 = x)
    Degenerate { axis: usize },
    /// Vertex geometry without any vertex
    NoVertices,
    /// The id already belongs to an earlier element
    DuplicateId,
}

/// Diagnostic for an excluded element.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedElement {
    pub id: ElementId,
    #[serde(flatten)]
    pub reason: SkipReason,
}

/// Outcome of normalizing a batch.
#[derive(Debug, Clone, Default)]
pub struct Normalized {
    /// Accepted elements, in input order
    pub elements: Vec<Element>,
    /// Excluded elements, in input order
    pub skipped: Vec<SkippedElement>,
    /// `false` when the checkpoint stopped the batch early
    pub complete: bool,
}

/// Normalize a single element to a millimetre bounding box.
pub fn normalize_element(raw: &RawElement, unit: LengthUnit) -> Result<Element, SkipReason> {
    let scale = unit.to_millimeters();
    let bounds = match &raw.geometry {
        RawGeometry::Box { min, max } => BoundingBox::new(scaled(*min, scale), scaled(*max, scale)),
        RawGeometry::Vertices { points } => {
            if points.is_empty() {
                return Err(SkipReason::NoVertices);
            }
            let mut bounds = BoundingBox::empty();
            for point in points {
                if point.iter().any(|v| !v.is_finite()) {
                    return Err(SkipReason::NonFinite);
                }
                bounds.expand(scaled(*point, scale));
            }
            bounds
        }
        RawGeometry::Placed { min, max, transform } => placed_bounds(*min, *max, transform, scale)?,
    };

    if !bounds.is_finite() {
        return Err(SkipReason::NonFinite);
    }
    if let Some(axis) = bounds.degenerate_axis() {
        return Err(SkipReason::Degenerate { axis });
    }

    Ok(Element {
        id: raw.id.clone(),
        discipline: raw.discipline,
        category: raw.category,
        bounds,
        level: raw.level.clone(),
        cost_class: raw.cost_class.clone(),
        model: raw.model.clone(),
    })
}

/// Normalize a batch in parallel, preserving input order.
///
/// The checkpoint is polled once per element. Later occurrences of a repeated
/// id are skipped so every accepted id is unique.
pub fn normalize_elements(
    raw: &[RawElement],
    unit: LengthUnit,
    checkpoint: &impl Checkpoint,
) -> Normalized {
    checkpoint.begin(raw.len());
    let outcomes: Vec<Option<Result<Element, SkipReason>>> = raw
        .par_iter()
        .map(|element| {
            if !checkpoint.proceed() {
                return None;
            }
            let outcome = normalize_element(element, unit);
            checkpoint.advance(1);
            Some(outcome)
        })
        .collect();

    let mut normalized = Normalized {
        elements: Vec::with_capacity(raw.len()),
        skipped: Vec::new(),
        complete: true,
    };
    let mut seen: FxHashSet<&ElementId> = FxHashSet::default();

    for (element, outcome) in raw.iter().zip(outcomes) {
        let Some(outcome) = outcome else {
            normalized.complete = false;
            continue;
        };
        if !seen.insert(&element.id) {
            normalized.skipped.push(SkippedElement {
                id: element.id.clone(),
                reason: SkipReason::DuplicateId,
            });
            continue;
        }
        match outcome {
            Ok(element) => normalized.elements.push(element),
            Err(reason) => normalized.skipped.push(SkippedElement {
                id: element.id.clone(),
                reason,
            }),
        }
    }

    if !normalized.skipped.is_empty() {
        tracing::warn!(
            skipped = normalized.skipped.len(),
            accepted = normalized.elements.len(),
            "Elements excluded during normalization"
        );
    }

    normalized
}

#[inline]
fn scaled(point: [f64; 3], scale: f64) -> [f64; 3] {
    [point[0] * scale, point[1] * scale, point[2] * scale]
}

/// World-space box of a transformed local box (all eight corners).
fn placed_bounds(
    min: [f64; 3],
    max: [f64; 3],
    transform: &[f64; 16],
    scale: f64,
) -> Result<BoundingBox, SkipReason> {
    if transform.iter().any(|v| !v.is_finite()) {
        return Err(SkipReason::NonFinite);
    }
    let matrix = Matrix4::from_column_slice(transform);
    let mut bounds = BoundingBox::empty();

    for corner in 0..8 {
        let local = Point3::new(
            if corner & 1 == 0 { min[0] } else { max[0] },
            if corner & 2 == 0 { min[1] } else { max[1] },
            if corner & 4 == 0 { min[2] } else { max[2] },
        );
        let world = matrix.transform_point(&local);
        bounds.expand(scaled([world.x, world.y, world.z], scale));
    }

    Ok(bounds)
}
