// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Run report handed back to collaborators.

use bimclash_core::{Conflict, Severity};
use bimclash_detect::SkippedPair;
use bimclash_geometry::{IndexStats, SkippedElement};
use bimclash_rules::Prescription;
use serde::{Deserialize, Serialize};

use crate::state::RunStatus;

/// Conflict counts per severity grade.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeverityCounts {
    pub low: usize,
    pub medium: usize,
    pub high: usize,
    pub critical: usize,
}

impl SeverityCounts {
    pub fn tally(conflicts: &[Conflict]) -> Self {
        let mut counts = Self::default();
        for conflict in conflicts {
            match conflict.severity {
                Severity::Low => counts.low += 1,
                Severity::Medium => counts.medium += 1,
                Severity::High => counts.high += 1,
                Severity::Critical => counts.critical += 1,
            }
        }
        counts
    }

    pub fn total(&self) -> usize {
        self.low + self.medium + self.high + self.critical
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub elements_received: usize,
    pub elements_processed: usize,
    pub skipped_elements: Vec<SkippedElement>,
    pub skipped_pairs: Vec<SkippedPair>,
    pub candidate_pairs: usize,
    pub conflicts_by_severity: SeverityCounts,
    pub solutions_generated: usize,
    pub elapsed_ms: u64,
    /// Set when the report was served from the result cache
    pub from_cache: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index: Option<IndexStats>,
}

/// Outcome of one pipeline run over one model version.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    /// Content key of the run's inputs
    pub model_version: String,
    pub status: RunStatus,
    /// `false` when the element set was not exhaustively checked
    pub complete: bool,
    /// Severity descending, then detection order
    pub conflicts: Vec<Conflict>,
    /// Ranked candidates, in conflict order
    pub solutions: Vec<Prescription>,
    pub summary: RunSummary,
}

impl RunReport {
    /// Ranked candidates of one conflict.
    pub fn solutions_for(&self, conflict: &Conflict) -> Option<&Prescription> {
        self.solutions.iter().find(|p| p.conflict_id == conflict.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bimclash_core::{ConflictKey, ConflictType, Discipline, DisciplinePair, ElementId};

    fn conflict(a: &str, b: &str, severity: Severity) -> Conflict {
        let key = ConflictKey::new(vec![ElementId::new(a), ElementId::new(b)], ConflictType::Collision);
        Conflict::new(
            &key,
            severity,
            1.0,
            DisciplinePair::new(Discipline::Structural, Discipline::Mechanical),
            "test",
        )
    }

    #[test]
    fn tally_counts_every_conflict() {
        let conflicts = vec![
            conflict("a", "b", Severity::High),
            conflict("a", "c", Severity::High),
            conflict("b", "c", Severity::Low),
        ];
        let counts = SeverityCounts::tally(&conflicts);
        assert_eq!(counts.high, 2);
        assert_eq!(counts.low, 1);
        assert_eq!(counts.total(), 3);
    }
}
