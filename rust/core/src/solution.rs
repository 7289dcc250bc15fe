// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Remediation candidates produced by the rules engine.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::conflict::ConflictId;
use crate::digest::short_id;

/// Kind of remediation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SolutionType {
    Reroute,
    Resize,
    Relocate,
    MaterialSubstitution,
    ManualReview,
}

/// Solution identifier (digest of conflict id and template id).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SolutionId(String);

impl SolutionId {
    pub fn derive(conflict: &ConflictId, template: Option<&str>) -> Self {
        Self(short_id(
            "S",
            [conflict.as_str(), template.unwrap_or("manual-review")],
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SolutionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Coarse impact bucket relative to the project baseline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImpactLevel {
    Low,
    Medium,
    High,
}

/// Human-readable impact summary of a candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImpactAssessment {
    pub cost: ImpactLevel,
    pub time: ImpactLevel,
    pub overall: ImpactLevel,
}

/// A ranked remediation candidate for one conflict.
///
/// Candidates are immutable once created: feedback only influences the
/// confidence of future candidates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SolutionCandidate {
    pub id: SolutionId,
    pub conflict_id: ConflictId,
    /// Rule template the candidate was instantiated from
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template_id: Option<String>,
    pub solution_type: SolutionType,
    pub description: String,
    /// Currency-agnostic cost; absent when it cannot be estimated
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimated_cost: Option<f64>,
    /// Schedule impact in days; absent when it cannot be estimated
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimated_days: Option<f64>,
    /// Confidence in [0, 1]
    pub confidence: f64,
    /// 1 = best among siblings
    pub rank: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub impact: Option<ImpactAssessment>,
}

impl SolutionCandidate {
    /// The mandatory fallback when no rule template matches.
    pub fn manual_review(conflict_id: &ConflictId, description: impl Into<String>) -> Self {
        Self {
            id: SolutionId::derive(conflict_id, None),
            conflict_id: conflict_id.clone(),
            template_id: None,
            solution_type: SolutionType::ManualReview,
            description: description.into(),
            estimated_cost: None,
            estimated_days: None,
            confidence: 0.0,
            rank: 1,
            impact: None,
        }
    }
}
