// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Severity grading.
//!
//! A weighted score in `[0, 1]` built from the relative magnitude of the
//! conflict, the criticality of the disciplines involved and whether either
//! element carries load. The score is mapped to a [`Severity`] through three
//! ascending thresholds. Every input is a plain number, so equal inputs always
//! grade the same.

use bimclash_core::{ConflictType, Severity};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Highest value of `DisciplinePair::criticality`.
const MAX_CRITICALITY: f64 = 2.0;

/// Clearance violations reach at most this relative magnitude.
const CLEARANCE_CEILING: f64 = 0.5;

/// Relative weight of each score component.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SeverityWeights {
    pub magnitude: f64,
    pub criticality: f64,
    pub load_bearing: f64,
}

impl Default for SeverityWeights {
    fn default() -> Self {
        Self {
            magnitude: 0.6,
            criticality: 0.25,
            load_bearing: 0.15,
        }
    }
}

/// Score weights plus the `[medium, high, critical]` lower bounds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SeverityModel {
    #[serde(default)]
    pub weights: SeverityWeights,
    #[serde(default = "default_thresholds")]
    pub thresholds: [f64; 3],
}

fn default_thresholds() -> [f64; 3] {
    [0.25, 0.5, 0.75]
}

impl Default for SeverityModel {
    fn default() -> Self {
        Self {
            weights: SeverityWeights::default(),
            thresholds: default_thresholds(),
        }
    }
}

/// Everything severity depends on.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SeverityInputs {
    pub conflict_type: ConflictType,
    /// Overlap volume, gap or deviation, in the conflict's magnitude unit
    pub magnitude: f64,
    /// Volume of the smaller element (mm³)
    pub smaller_volume: f64,
    /// Required clearance for the pair (mm)
    pub tolerance: f64,
    /// `DisciplinePair::criticality`
    pub criticality: u8,
    pub load_bearing: bool,
}

impl SeverityModel {
    pub fn validate(&self) -> Result<()> {
        let [medium, high, critical] = self.thresholds;
        if !(0.0..=1.0).contains(&medium) || medium > high || high > critical || critical > 1.0 {
            return Err(Error::InvalidSeverityModel(format!(
                "thresholds must ascend within [0, 1], got {:?}",
                self.thresholds
            )));
        }
        let w = self.weights;
        if [w.magnitude, w.criticality, w.load_bearing]
            .iter()
            .any(|v| !v.is_finite() || *v < 0.0)
        {
            return Err(Error::InvalidSeverityModel(
                "weights must be non-negative".into(),
            ));
        }
        Ok(())
    }

    /// Relative magnitude in `[0, 1]`.
    ///
    /// Collisions and duplicates compare the overlap with the smaller
    /// element's volume; clearance violations compare the intrusion into the
    /// tolerance zone, capped below a full collision.
    pub fn relative_magnitude(inputs: &SeverityInputs, overlap_volume: f64) -> f64 {
        let ratio = match inputs.conflict_type {
            ConflictType::Collision | ConflictType::Duplicate => {
                if inputs.smaller_volume > 0.0 {
                    overlap_volume / inputs.smaller_volume
                } else {
                    0.0
                }
            }
            ConflictType::ClearanceViolation => {
                if inputs.tolerance > 0.0 {
                    CLEARANCE_CEILING * (inputs.tolerance - inputs.magnitude) / inputs.tolerance
                } else {
                    0.0
                }
            }
            ConflictType::Unknown => 0.0,
        };
        if ratio.is_finite() {
            ratio.clamp(0.0, 1.0)
        } else {
            0.0
        }
    }

    /// Weighted score in `[0, 1]`.
    pub fn score(&self, inputs: &SeverityInputs, overlap_volume: f64) -> f64 {
        let w = self.weights;
        let total = w.magnitude + w.criticality + w.load_bearing;
        if total <= 0.0 {
            return 0.0;
        }
        let raw = w.magnitude * Self::relative_magnitude(inputs, overlap_volume)
            + w.criticality * (inputs.criticality as f64 / MAX_CRITICALITY).min(1.0)
            + w.load_bearing * if inputs.load_bearing { 1.0 } else { 0.0 };
        (raw / total).clamp(0.0, 1.0)
    }

    /// Grade a conflict.
    pub fn grade(&self, inputs: &SeverityInputs, overlap_volume: f64) -> Severity {
        if inputs.conflict_type == ConflictType::Unknown {
            return Severity::Low;
        }
        let score = self.score(inputs, overlap_volume);
        let [medium, high, critical] = self.thresholds;
        if score >= critical {
            Severity::Critical
        } else if score >= high {
            Severity::High
        } else if score >= medium {
            Severity::Medium
        } else {
            Severity::Low
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn collision(overlap: f64, criticality: u8, load_bearing: bool) -> (SeverityInputs, f64) {
        (
            SeverityInputs {
                conflict_type: ConflictType::Collision,
                magnitude: overlap,
                smaller_volume: 1000.0,
                tolerance: 0.0,
                criticality,
                load_bearing,
            },
            overlap,
        )
    }

    #[test]
    fn full_structural_overlap_is_critical() {
        let model = SeverityModel::default();
        let (inputs, overlap) = collision(1000.0, 2, true);
        assert_relative_eq!(model.score(&inputs, overlap), 1.0);
        assert_eq!(model.grade(&inputs, overlap), Severity::Critical);
    }

    #[test]
    fn grade_is_monotonic_in_magnitude() {
        let model = SeverityModel::default();
        let mut previous = Severity::Low;
        for step in 0..=10 {
            let (inputs, overlap) = collision(step as f64 * 100.0, 1, false);
            let grade = model.grade(&inputs, overlap);
            assert!(grade >= previous);
            previous = grade;
        }
    }

    #[test]
    fn clearance_intrusion_scales_with_gap() {
        let inputs = |gap: f64| SeverityInputs {
            conflict_type: ConflictType::ClearanceViolation,
            magnitude: gap,
            smaller_volume: 1000.0,
            tolerance: 100.0,
            criticality: 0,
            load_bearing: false,
        };
        assert_relative_eq!(SeverityModel::relative_magnitude(&inputs(0.0), 0.0), 0.5);
        assert_relative_eq!(SeverityModel::relative_magnitude(&inputs(50.0), 0.0), 0.25);
        assert_relative_eq!(SeverityModel::relative_magnitude(&inputs(100.0), 0.0), 0.0);
    }

    #[test]
    fn unordered_thresholds_are_rejected() {
        let model = SeverityModel {
            thresholds: [0.5, 0.25, 0.75],
            ..SeverityModel::default()
        };
        assert!(model.validate().is_err());
        assert!(SeverityModel::default().validate().is_ok());
    }
}
