// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Detection pass over a spatial index.

use bimclash_core::{Checkpoint, Conflict};
use bimclash_geometry::{ElementTable, SpatialIndex};
use rayon::prelude::*;

use crate::classify::{classify_pair, PairOutcome, SkippedPair};
use crate::config::DetectionConfig;
use crate::set::{ConflictSet, MergeStats};

/// Pairs evaluated per parallel batch; bounds the outcome buffer.
const EVAL_CHUNK: usize = 4 * 1024;

/// Result of a detection pass.
#[derive(Debug, Clone, Default)]
pub struct Detection {
    /// Sorted by severity descending, then detection order
    pub conflicts: Vec<Conflict>,
    pub skipped_pairs: Vec<SkippedPair>,
    /// Candidate pairs produced by the index, possibly a partial count
    pub candidate_pairs: usize,
    /// Candidate pairs actually evaluated
    pub evaluated_pairs: usize,
    pub merge: MergeStats,
    /// `false` when the checkpoint stopped enumeration or evaluation early
    pub complete: bool,
}

/// Detect conflicts among the elements of `table`.
pub fn detect(
    table: &ElementTable,
    index: &SpatialIndex,
    config: &DetectionConfig,
    checkpoint: &impl Checkpoint,
) -> Detection {
    run(ConflictSet::new(), table, index, config, checkpoint)
}

/// Re-run detection for a model version that already has conflicts.
///
/// Existing conflicts keep their identity and lifecycle status; they are
/// only touched when the new magnitude or severity differs.
pub fn redetect(
    existing: Vec<Conflict>,
    table: &ElementTable,
    index: &SpatialIndex,
    config: &DetectionConfig,
    checkpoint: &impl Checkpoint,
) -> Detection {
    run(ConflictSet::from_existing(existing), table, index, config, checkpoint)
}

fn run(
    mut set: ConflictSet,
    table: &ElementTable,
    index: &SpatialIndex,
    config: &DetectionConfig,
    checkpoint: &impl Checkpoint,
) -> Detection {
    let start = std::time::Instant::now();
    let candidates = index.candidate_pairs(checkpoint);
    let candidate_pairs = candidates.len();
    tracing::debug!(candidate_pairs, complete = candidates.complete, "Evaluating candidate pairs");

    let mut skipped_pairs = Vec::new();
    let mut evaluated_pairs = 0;
    let mut complete = candidates.complete;

    if complete {
        checkpoint.begin(candidate_pairs);
        for chunk in candidates.pairs.chunks(EVAL_CHUNK) {
            // Evaluation is independent per pair; outcomes come back in pair order.
            let outcomes: Vec<Option<PairOutcome>> = chunk
                .par_iter()
                .map(|&(a, b)| {
                    if !checkpoint.proceed() {
                        return None;
                    }
                    let outcome = match (table.get(a), table.get(b)) {
                        (Some(a), Some(b)) => classify_pair(a, b, config),
                        _ => PairOutcome::Clear,
                    };
                    checkpoint.advance(1);
                    Some(outcome)
                })
                .collect();

            // Single-writer merge; only new conflicts grow the set.
            for outcome in outcomes {
                let Some(outcome) = outcome else {
                    complete = false;
                    continue;
                };
                evaluated_pairs += 1;
                match outcome {
                    PairOutcome::Conflict(finding) => {
                        if set.get(&finding.key).is_none() && !checkpoint.charge(finding.approx_bytes()) {
                            complete = false;
                            break;
                        }
                        set.merge(finding);
                    }
                    PairOutcome::Skipped(skip) => skipped_pairs.push(skip),
                    PairOutcome::Clear => {}
                }
            }
            if !complete {
                break;
            }
        }
    }

    let merge = set.stats();
    let conflicts = set.into_sorted();

    if !skipped_pairs.is_empty() {
        tracing::warn!(skipped_pairs = skipped_pairs.len(), "Candidate pairs skipped");
    }
    tracing::info!(
        candidate_pairs,
        evaluated_pairs,
        conflicts = conflicts.len(),
        created = merge.created,
        updated = merge.updated,
        complete,
        elapsed_ms = start.elapsed().as_millis() as u64,
        "Detection pass complete"
    );

    Detection {
        conflicts,
        skipped_pairs,
        candidate_pairs,
        evaluated_pairs,
        merge,
        complete,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ClearanceTable;
    use approx::assert_relative_eq;
    use bimclash_core::{
        BoundingBox, Category, ConflictStatus, ConflictType, Discipline, Element, ElementId, Unbounded,
    };
    use bimclash_geometry::PAIR_BYTES;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn element(id: &str, discipline: Discipline, category: Category, min: [f64; 3], max: [f64; 3]) -> Element {
        Element::new(ElementId::new(id), discipline, category, BoundingBox::new(min, max))
    }

    fn run_detect(elements: Vec<Element>, config: &DetectionConfig) -> Detection {
        let table = ElementTable::from_elements(elements).unwrap();
        let index = SpatialIndex::build(&table, &config.index_config()).unwrap();
        detect(&table, &index, config, &Unbounded)
    }

    #[test]
    fn overlapping_cross_discipline_boxes() {
        let detection = run_detect(
            vec![
                element("s", Discipline::Structural, Category::Beam, [0.0; 3], [10.0; 3]),
                element("m", Discipline::Mechanical, Category::Duct, [5.0; 3], [15.0; 3]),
            ],
            &DetectionConfig::default(),
        );
        assert!(detection.complete);
        assert_eq!(detection.conflicts.len(), 1);
        assert_eq!(detection.conflicts[0].conflict_type, ConflictType::Collision);
        assert_relative_eq!(detection.conflicts[0].magnitude, 125.0);
    }

    #[test]
    fn clearance_violation_within_tolerance() {
        let config = DetectionConfig::default().with_clearance(
            ClearanceTable::default().with(Discipline::Mechanical, Discipline::Electrical, 100.0),
        );
        let detection = run_detect(
            vec![
                element("m", Discipline::Mechanical, Category::Duct, [0.0; 3], [500.0; 3]),
                element("e", Discipline::Electrical, Category::CableTray, [550.0, 0.0, 0.0], [900.0, 500.0, 500.0]),
            ],
            &config,
        );
        assert_eq!(detection.conflicts.len(), 1);
        assert_eq!(detection.conflicts[0].conflict_type, ConflictType::ClearanceViolation);
        assert_relative_eq!(detection.conflicts[0].magnitude, 50.0);
    }

    #[test]
    fn redetect_is_idempotent_and_preserves_status() {
        let elements = vec![
            element("s", Discipline::Structural, Category::Column, [0.0; 3], [10.0; 3]),
            element("p", Discipline::Plumbing, Category::Pipe, [8.0; 3], [20.0; 3]),
            element("e", Discipline::Electrical, Category::CableTray, [9.0; 3], [30.0; 3]),
        ];
        let config = DetectionConfig::default();
        let table = ElementTable::from_elements(elements).unwrap();
        let index = SpatialIndex::build(&table, &config.index_config()).unwrap();

        let first = detect(&table, &index, &config, &Unbounded);
        let mut existing = first.conflicts.clone();
        existing[0].transition(ConflictStatus::Acknowledged).unwrap();

        let second = redetect(existing, &table, &index, &config, &Unbounded);
        assert_eq!(second.merge.created, 0);
        assert_eq!(second.merge.updated, 0);
        assert_eq!(second.merge.unchanged, first.conflicts.len());
        assert_eq!(second.conflicts.len(), first.conflicts.len());
        assert_eq!(second.conflicts[0].status, ConflictStatus::Acknowledged);
    }

    #[test]
    fn stopped_checkpoint_marks_detection_incomplete() {
        struct Stop;
        impl Checkpoint for Stop {
            fn proceed(&self) -> bool {
                false
            }
        }

        let config = DetectionConfig::default();
        let table = ElementTable::from_elements(vec![
            element("s", Discipline::Structural, Category::Beam, [0.0; 3], [10.0; 3]),
            element("m", Discipline::Mechanical, Category::Duct, [5.0; 3], [15.0; 3]),
        ])
        .unwrap();
        let index = SpatialIndex::build(&table, &config.index_config()).unwrap();
        let detection = detect(&table, &index, &config, &Stop);
        assert!(!detection.complete);
        assert!(detection.conflicts.is_empty());
        assert_eq!(detection.evaluated_pairs, 0);
    }

    /// Accepts charges up to a byte budget, then stops.
    struct Budget {
        budget: usize,
        charged: AtomicUsize,
    }

    impl Checkpoint for Budget {
        fn proceed(&self) -> bool {
            self.charged.load(Ordering::Relaxed) <= self.budget
        }

        fn charge(&self, bytes: usize) -> bool {
            self.charged.fetch_add(bytes, Ordering::Relaxed) + bytes <= self.budget
        }
    }

    /// Alternating beams and ducts that all overlap one another.
    fn dense(count: usize) -> Vec<Element> {
        (0..count)
            .map(|i| {
                let offset = i as f64 * 3.0;
                let (discipline, category) = if i % 2 == 0 {
                    (Discipline::Structural, Category::Beam)
                } else {
                    (Discipline::Mechanical, Category::Duct)
                };
                element(&format!("e{i}"), discipline, category, [offset; 3], [offset + 10_000.0; 3])
            })
            .collect()
    }

    #[test]
    fn conflict_charges_stop_detection_at_the_budget() {
        let config = DetectionConfig::default();
        let table = ElementTable::from_elements(dense(200)).unwrap();
        let index = SpatialIndex::build(&table, &config.index_config()).unwrap();
        let full = detect(&table, &index, &config, &Unbounded);
        assert!(full.complete);
        assert_eq!(full.conflicts.len(), 100 * 100);

        // Room for every pair, then a few hundred conflicts.
        let budget = full.candidate_pairs * PAIR_BYTES + 300 * full.conflicts[0].approx_bytes();
        let checkpoint = Budget {
            budget,
            charged: AtomicUsize::new(0),
        };
        let partial = detect(&table, &index, &config, &checkpoint);
        assert!(!partial.complete);
        assert_eq!(partial.candidate_pairs, full.candidate_pairs);
        // Conflict sizes differ by a few bytes with the id lengths.
        assert!((250..=350).contains(&partial.conflicts.len()));
        assert!(partial.evaluated_pairs < full.evaluated_pairs);
    }

    #[test]
    fn cross_model_mode_reports_only_federated_pairs() {
        let config = DetectionConfig::default().with_cross_model_only(true);
        let detection = run_detect(
            vec![
                element("s1", Discipline::Structural, Category::Beam, [0.0; 3], [10.0; 3]).with_model("structure"),
                element("m1", Discipline::Mechanical, Category::Duct, [5.0; 3], [15.0; 3]).with_model("structure"),
                element("m2", Discipline::Mechanical, Category::Duct, [5.5; 3], [15.5; 3]).with_model("mep"),
            ],
            &config,
        );
        assert!(detection.complete);
        let mut found: Vec<(Vec<&str>, ConflictType)> = detection
            .conflicts
            .iter()
            .map(|c| (c.elements.iter().map(ElementId::as_str).collect(), c.conflict_type))
            .collect();
        found.sort();
        // The same duct modelled twice across models is a duplicate; s1/m1
        // share a model and are not compared.
        assert_eq!(
            found,
            vec![
                (vec!["m1", "m2"], ConflictType::Duplicate),
                (vec!["m2", "s1"], ConflictType::Collision),
            ]
        );
    }
}
