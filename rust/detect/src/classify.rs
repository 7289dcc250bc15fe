// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Classification of a single candidate pair.

use bimclash_core::{
    Conflict, ConflictKey, ConflictType, DisciplinePair, Element, ElementId, Severity,
};
use serde::{Deserialize, Serialize};

use crate::config::DetectionConfig;
use crate::severity::SeverityInputs;

/// Why a candidate pair produced neither a conflict nor a clean result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PairSkipReason {
    /// A box has NaN or infinite coordinates
    NonFinite,
    /// A box has no positive extent on some axis
    Degenerate,
    /// The boxes only touch: the intersection region has no volume and the
    /// pair requires no clearance
    ZeroVolumeContact,
}

/// Diagnostic for a skipped pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedPair {
    pub elements: [ElementId; 2],
    pub reason: PairSkipReason,
}

/// A conflict found for one pair, before merging.
#[derive(Debug, Clone, PartialEq)]
pub struct Finding {
    pub key: ConflictKey,
    pub severity: Severity,
    pub magnitude: f64,
    pub disciplines: DisciplinePair,
    pub description: String,
}

impl Finding {
    /// Footprint of the conflict this finding becomes, for memory accounting.
    pub fn approx_bytes(&self) -> usize {
        std::mem::size_of::<Conflict>()
            + self.description.len()
            + self
                .key
                .elements()
                .iter()
                .map(|id| std::mem::size_of::<ElementId>() + id.as_str().len())
                .sum::<usize>()
    }

    pub fn into_conflict(self) -> Conflict {
        Conflict::new(
            &self.key,
            self.severity,
            self.magnitude,
            self.disciplines,
            self.description,
        )
    }
}

/// Result of evaluating one candidate pair.
#[derive(Debug, Clone, PartialEq)]
pub enum PairOutcome {
    Conflict(Finding),
    Skipped(SkippedPair),
    /// Self pair, filtered same-discipline or same-model pair, or no conflict
    Clear,
}

/// Classify a candidate pair.
///
/// Duplicates are checked before the same-discipline filter: they are
/// same-trade modelling errors by nature. In cross-model mode a pair from a
/// single source model is never a finding, duplicates included.
pub fn classify_pair(a: &Element, b: &Element, config: &DetectionConfig) -> PairOutcome {
    if a.id == b.id || (config.cross_model_only && !a.is_cross_model(b)) {
        return PairOutcome::Clear;
    }
    let skipped = |reason| {
        PairOutcome::Skipped(SkippedPair {
            elements: ordered_ids(a, b),
            reason,
        })
    };
    if !a.bounds.is_finite() || !b.bounds.is_finite() {
        return skipped(PairSkipReason::NonFinite);
    }
    if !a.bounds.is_valid() || !b.bounds.is_valid() {
        return skipped(PairSkipReason::Degenerate);
    }

    let disciplines = DisciplinePair::new(a.discipline, b.discipline);
    let tolerance = config.clearance.tolerance(disciplines);
    let overlap = a.bounds.overlap_volume(&b.bounds);

    let (conflict_type, magnitude) = if a.category == b.category
        && a.bounds.corner_deviation(&b.bounds) <= config.duplicate_epsilon
    {
        (ConflictType::Duplicate, a.bounds.corner_deviation(&b.bounds))
    } else if disciplines.is_intra() && !config.check_intra_discipline {
        return PairOutcome::Clear;
    } else if overlap > 0.0 {
        (ConflictType::Collision, overlap)
    } else {
        let gap = a.bounds.gap(&b.bounds);
        if gap > tolerance {
            return PairOutcome::Clear;
        }
        if gap == 0.0 && tolerance == 0.0 {
            return skipped(PairSkipReason::ZeroVolumeContact);
        }
        (ConflictType::ClearanceViolation, gap)
    };

    let inputs = SeverityInputs {
        conflict_type,
        magnitude,
        smaller_volume: a.bounds.volume().min(b.bounds.volume()),
        tolerance,
        criticality: disciplines.criticality(),
        load_bearing: a.is_load_bearing() || b.is_load_bearing(),
    };
    let severity = config.severity.grade(&inputs, overlap);

    PairOutcome::Conflict(Finding {
        key: ConflictKey::new(vec![a.id.clone(), b.id.clone()], conflict_type),
        severity,
        magnitude,
        disciplines,
        description: describe(conflict_type, a, b),
    })
}

fn ordered_ids(a: &Element, b: &Element) -> [ElementId; 2] {
    if a.id <= b.id {
        [a.id.clone(), b.id.clone()]
    } else {
        [b.id.clone(), a.id.clone()]
    }
}

fn describe(conflict_type: ConflictType, a: &Element, b: &Element) -> String {
    let (first, second) = if a.id <= b.id { (a, b) } else { (b, a) };
    let verb = match conflict_type {
        ConflictType::Collision => "collides with",
        ConflictType::ClearanceViolation => "violates clearance to",
        ConflictType::Duplicate => "duplicates",
        ConflictType::Unknown => "conflicts with",
    };
    format!(
        "{} {} ({}) {} {} {} ({})",
        first.category.name(),
        first.id,
        first.discipline.name(),
        verb,
        second.category.name(),
        second.id,
        second.discipline.name()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ClearanceTable;
    use approx::assert_relative_eq;
    use bimclash_core::{BoundingBox, Category, Discipline};

    fn element(id: &str, discipline: Discipline, category: Category, min: [f64; 3], max: [f64; 3]) -> Element {
        Element::new(ElementId::new(id), discipline, category, BoundingBox::new(min, max))
    }

    fn finding(outcome: PairOutcome) -> Finding {
        match outcome {
            PairOutcome::Conflict(finding) => finding,
            other => panic!("expected a conflict, got {other:?}"),
        }
    }

    #[test]
    fn overlapping_boxes_collide() {
        let a = element("a", Discipline::Structural, Category::Beam, [0.0; 3], [10.0; 3]);
        let b = element("b", Discipline::Mechanical, Category::Duct, [5.0; 3], [15.0; 3]);
        let found = finding(classify_pair(&a, &b, &DetectionConfig::default()));
        assert_eq!(found.key.conflict_type(), ConflictType::Collision);
        assert_relative_eq!(found.magnitude, 125.0);
        assert_eq!(found.description, "beam a (structural) collides with duct b (mechanical)");
    }

    #[test]
    fn gap_within_tolerance_is_a_clearance_violation() {
        let a = element("a", Discipline::Plumbing, Category::Pipe, [0.0; 3], [100.0; 3]);
        let b = element("b", Discipline::Electrical, Category::CableTray, [150.0, 0.0, 0.0], [250.0, 100.0, 100.0]);
        let config = DetectionConfig::default().with_clearance(ClearanceTable::uniform(100.0));
        let found = finding(classify_pair(&a, &b, &config));
        assert_eq!(found.key.conflict_type(), ConflictType::ClearanceViolation);
        assert_relative_eq!(found.magnitude, 50.0);

        let tight = DetectionConfig::default().with_clearance(ClearanceTable::uniform(49.0));
        assert_eq!(classify_pair(&a, &b, &tight), PairOutcome::Clear);
    }

    #[test]
    fn duplicates_bypass_the_discipline_filter() {
        let a = element("a", Discipline::Mechanical, Category::Duct, [0.0; 3], [10.0; 3]);
        let b = element("b", Discipline::Mechanical, Category::Duct, [0.2; 3], [10.1; 3]);
        let found = finding(classify_pair(&a, &b, &DetectionConfig::default()));
        assert_eq!(found.key.conflict_type(), ConflictType::Duplicate);
        assert_relative_eq!(found.magnitude, 0.2, epsilon = 1e-9);
    }

    #[test]
    fn same_discipline_pairs_need_the_intra_flag() {
        let a = element("a", Discipline::Mechanical, Category::Duct, [0.0; 3], [10.0; 3]);
        let b = element("b", Discipline::Mechanical, Category::Equipment, [5.0; 3], [15.0; 3]);
        assert_eq!(classify_pair(&a, &b, &DetectionConfig::default()), PairOutcome::Clear);

        let config = DetectionConfig::default().with_intra_discipline(true);
        let found = finding(classify_pair(&a, &b, &config));
        assert_eq!(found.key.conflict_type(), ConflictType::Collision);
    }

    #[test]
    fn cross_model_mode_drops_pairs_within_one_model() {
        let beam = element("a", Discipline::Structural, Category::Beam, [0.0; 3], [10.0; 3]).with_model("structure");
        let duct = element("b", Discipline::Mechanical, Category::Duct, [5.0; 3], [15.0; 3]);
        let config = DetectionConfig::default().with_cross_model_only(true);

        assert_eq!(classify_pair(&beam, &duct.clone().with_model("structure"), &config), PairOutcome::Clear);
        let found = finding(classify_pair(&beam, &duct.clone().with_model("mep"), &config));
        assert_eq!(found.key.conflict_type(), ConflictType::Collision);
        // Untagged elements form their own model.
        assert!(matches!(classify_pair(&beam, &duct, &config), PairOutcome::Conflict(_)));
        let copy = element("c", Discipline::Structural, Category::Beam, [0.0; 3], [10.0; 3]).with_model("structure");
        assert_eq!(classify_pair(&beam, &copy, &config), PairOutcome::Clear);
    }

    #[test]
    fn touching_without_clearance_is_skipped() {
        let a = element("a", Discipline::Structural, Category::Slab, [0.0; 3], [10.0; 3]);
        let b = element("b", Discipline::Plumbing, Category::Pipe, [10.0, 0.0, 0.0], [20.0, 10.0, 10.0]);
        match classify_pair(&b, &a, &DetectionConfig::default()) {
            PairOutcome::Skipped(skip) => {
                assert_eq!(skip.reason, PairSkipReason::ZeroVolumeContact);
                assert_eq!(skip.elements[0].as_str(), "a");
            }
            other => panic!("expected skip, got {other:?}"),
        }
    }

    #[test]
    fn nan_geometry_is_skipped() {
        let a = element("a", Discipline::Structural, Category::Beam, [f64::NAN, 0.0, 0.0], [10.0; 3]);
        let b = element("b", Discipline::Mechanical, Category::Duct, [5.0; 3], [15.0; 3]);
        assert!(matches!(
            classify_pair(&a, &b, &DetectionConfig::default()),
            PairOutcome::Skipped(SkippedPair { reason: PairSkipReason::NonFinite, .. })
        ));
    }

    #[test]
    fn severity_is_deterministic() {
        let a = element("a", Discipline::Structural, Category::Column, [0.0; 3], [10.0; 3]);
        let b = element("b", Discipline::Mechanical, Category::Duct, [2.0; 3], [12.0; 3]);
        let config = DetectionConfig::default();
        assert_eq!(classify_pair(&a, &b, &config), classify_pair(&b, &a, &config));
    }
}
