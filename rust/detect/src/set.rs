// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Deduplicating conflict set.
//!
//! The set is the only place conflicts are created or updated. It is written
//! by a single merge step after parallel pair evaluation, so it needs no
//! locking. Its key index must always agree with its entries; a mismatch is a
//! bug and panics.

use bimclash_core::{Conflict, ConflictKey};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::classify::Finding;

/// What a merge did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    Created,
    /// Magnitude or severity changed
    Updated,
    Unchanged,
}

/// Merge counters for one detection pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeStats {
    pub created: usize,
    pub updated: usize,
    pub unchanged: usize,
}

impl MergeStats {
    fn record(&mut self, outcome: MergeOutcome) {
        match outcome {
            MergeOutcome::Created => self.created += 1,
            MergeOutcome::Updated => self.updated += 1,
            MergeOutcome::Unchanged => self.unchanged += 1,
        }
    }
}

/// Conflicts keyed by (sorted element ids, conflict type), in insertion order.
#[derive(Debug, Default)]
pub struct ConflictSet {
    index: FxHashMap<ConflictKey, usize>,
    conflicts: Vec<Conflict>,
    stats: MergeStats,
}

impl ConflictSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the set with conflicts from an earlier run of the same model
    /// version.
    ///
    /// # Panics
    ///
    /// If two seeded conflicts share a key.
    pub fn from_existing(existing: impl IntoIterator<Item = Conflict>) -> Self {
        let mut set = Self::new();
        for conflict in existing {
            let key = conflict.key();
            assert!(
                !set.index.contains_key(&key),
                "duplicate conflict key in seed: {}",
                conflict.id
            );
            set.index.insert(key, set.conflicts.len());
            set.conflicts.push(conflict);
        }
        set
    }

    /// Insert a finding, or update the existing conflict with its key when
    /// magnitude or severity strictly differ. Status is preserved.
    pub fn merge(&mut self, finding: Finding) -> MergeOutcome {
        let outcome = match self.index.get(&finding.key) {
            Some(&slot) => {
                let existing = &mut self.conflicts[slot];
                assert!(
                    existing.conflict_type == finding.key.conflict_type()
                        && existing.elements.as_slice() == finding.key.elements(),
                    "conflict set index out of sync for {}",
                    existing.id
                );
                if existing.magnitude != finding.magnitude || existing.severity != finding.severity {
                    existing.magnitude = finding.magnitude;
                    existing.severity = finding.severity;
                    existing.description = finding.description;
                    MergeOutcome::Updated
                } else {
                    MergeOutcome::Unchanged
                }
            }
            None => {
                self.index.insert(finding.key.clone(), self.conflicts.len());
                self.conflicts.push(finding.into_conflict());
                MergeOutcome::Created
            }
        };
        self.stats.record(outcome);
        outcome
    }

    pub fn get(&self, key: &ConflictKey) -> Option<&Conflict> {
        self.index.get(key).map(|&slot| &self.conflicts[slot])
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.conflicts.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.conflicts.is_empty()
    }

    pub fn stats(&self) -> MergeStats {
        self.stats
    }

    /// Conflicts sorted by severity (highest first), then insertion order.
    pub fn into_sorted(self) -> Vec<Conflict> {
        assert_eq!(
            self.index.len(),
            self.conflicts.len(),
            "conflict set index out of sync"
        );
        let mut conflicts = self.conflicts;
        conflicts.sort_by(|a, b| b.severity.cmp(&a.severity));
        conflicts
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bimclash_core::{ConflictStatus, ConflictType, Discipline, DisciplinePair, ElementId, Severity};

    fn finding(a: &str, b: &str, severity: Severity, magnitude: f64) -> Finding {
        Finding {
            key: ConflictKey::new(vec![ElementId::new(a), ElementId::new(b)], ConflictType::Collision),
            severity,
            magnitude,
            disciplines: DisciplinePair::new(Discipline::Structural, Discipline::Mechanical),
            description: format!("{a} collides with {b}"),
        }
    }

    #[test]
    fn same_key_is_never_created_twice() {
        let mut set = ConflictSet::new();
        assert_eq!(set.merge(finding("a", "b", Severity::High, 10.0)), MergeOutcome::Created);
        assert_eq!(set.merge(finding("b", "a", Severity::High, 10.0)), MergeOutcome::Unchanged);
        assert_eq!(set.merge(finding("a", "b", Severity::Critical, 10.0)), MergeOutcome::Updated);
        assert_eq!(set.len(), 1);
        assert_eq!(
            set.stats(),
            MergeStats {
                created: 1,
                updated: 1,
                unchanged: 1
            }
        );
    }

    #[test]
    fn updates_keep_lifecycle_status() {
        let mut seeded = finding("a", "b", Severity::Low, 1.0).into_conflict();
        seeded.transition(ConflictStatus::Acknowledged).unwrap();
        let mut set = ConflictSet::from_existing(vec![seeded]);

        set.merge(finding("a", "b", Severity::Medium, 2.0));
        let conflict = set.get(&finding("a", "b", Severity::Low, 0.0).key).unwrap();
        assert_eq!(conflict.status, ConflictStatus::Acknowledged);
        assert_eq!(conflict.severity, Severity::Medium);
    }

    #[test]
    fn sorted_by_severity_then_insertion() {
        let mut set = ConflictSet::new();
        set.merge(finding("a", "b", Severity::Low, 1.0));
        set.merge(finding("c", "d", Severity::High, 1.0));
        set.merge(finding("e", "f", Severity::Low, 1.0));
        set.merge(finding("g", "h", Severity::High, 1.0));
        let order: Vec<_> = set.into_sorted().into_iter().map(|c| c.elements[0].to_string()).collect();
        assert_eq!(order, vec!["c", "g", "a", "e"]);
    }

    #[test]
    #[should_panic(expected = "duplicate conflict key")]
    fn duplicate_seed_panics() {
        let conflict = finding("a", "b", Severity::Low, 1.0).into_conflict();
        ConflictSet::from_existing(vec![conflict.clone(), conflict]);
    }
}
