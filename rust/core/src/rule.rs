// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Rule template records.
//!
//! Templates are authored outside the core and handed to the rules engine as
//! read-only configuration. Formulas stay as source text here; the rules
//! engine compiles them when a table is loaded.

use serde::{Deserialize, Serialize};

use crate::conflict::{ConflictType, DisciplinePair, Severity};
use crate::element::Discipline;
use crate::error::{Error, Result};
use crate::solution::SolutionType;

/// One side of a template's discipline predicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisciplineSelector {
    #[default]
    Any,
    #[serde(untagged)]
    Is(Discipline),
}

impl DisciplineSelector {
    #[inline]
    pub fn accepts(self, discipline: Discipline) -> bool {
        match self {
            DisciplineSelector::Any => true,
            DisciplineSelector::Is(d) => d == discipline,
        }
    }

    #[inline]
    pub fn is_specific(self) -> bool {
        matches!(self, DisciplineSelector::Is(_))
    }
}

/// Inclusive severity range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SeverityRange {
    pub min: Severity,
    pub max: Severity,
}

impl SeverityRange {
    pub const ALL: SeverityRange = SeverityRange {
        min: Severity::Low,
        max: Severity::Critical,
    };

    pub const fn new(min: Severity, max: Severity) -> Self {
        Self { min, max }
    }

    pub const fn exactly(severity: Severity) -> Self {
        Self {
            min: severity,
            max: severity,
        }
    }

    #[inline]
    pub fn contains(&self, severity: Severity) -> bool {
        self.min <= severity && severity <= self.max
    }

    /// Number of severities excluded by the range (0 for the full range).
    #[inline]
    pub fn narrowness(&self) -> u8 {
        3 - (self.max.level() - self.min.level())
    }
}

impl Default for SeverityRange {
    fn default() -> Self {
        Self::ALL
    }
}

fn default_weight() -> f64 {
    0.5
}

/// Externally authored remediation template.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleTemplate {
    pub id: String,
    pub conflict_type: ConflictType,
    /// Discipline predicate, matched against the conflict's pair in either order
    #[serde(default)]
    pub disciplines: [DisciplineSelector; 2],
    #[serde(default)]
    pub severity: SeverityRange,
    pub solution_type: SolutionType,
    pub description: String,
    /// Cost formula source
    pub cost_formula: String,
    /// Schedule impact formula source (days)
    pub time_formula: String,
    /// Static confidence weight in [0, 1]
    #[serde(default = "default_weight")]
    pub base_confidence: f64,
    /// Feedback-derived success aggregate in [0, 1]
    #[serde(default = "default_weight")]
    pub historical_success: f64,
}

impl RuleTemplate {
    /// Whether the discipline selectors accept the pair, in either order.
    pub fn accepts_disciplines(&self, pair: DisciplinePair) -> bool {
        let [a, b] = self.disciplines;
        (a.accepts(pair.first()) && b.accepts(pair.second()))
            || (a.accepts(pair.second()) && b.accepts(pair.first()))
    }

    /// Match specificity: concrete discipline selectors plus severity narrowness.
    pub fn specificity(&self) -> u8 {
        let selectors = self.disciplines.iter().filter(|s| s.is_specific()).count() as u8;
        selectors + self.severity.narrowness()
    }

    /// Check the record's numeric and range invariants.
    pub fn validate(&self) -> Result<()> {
        let invalid = |reason: &str| Error::InvalidTemplate {
            id: self.id.clone(),
            reason: reason.to_string(),
        };

        if self.id.trim().is_empty() {
            return Err(invalid("empty id"));
        }
        if self.severity.min > self.severity.max {
            return Err(invalid("severity range min exceeds max"));
        }
        if !(0.0..=1.0).contains(&self.base_confidence) {
            return Err(invalid("base_confidence outside [0, 1]"));
        }
        if !(0.0..=1.0).contains(&self.historical_success) {
            return Err(invalid("historical_success outside [0, 1]"));
        }
        if self.solution_type == SolutionType::ManualReview {
            return Err(invalid("manual review is reserved for unmatched conflicts"));
        }
        Ok(())
    }
}
