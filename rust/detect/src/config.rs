// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Detection configuration.

use bimclash_core::{Discipline, DisciplinePair};
use bimclash_geometry::IndexConfig;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::severity::SeverityModel;

/// Default duplicate-detection epsilon (mm).
pub const DEFAULT_DUPLICATE_EPSILON: f64 = 1.0;

/// Required clearance for one discipline pair.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClearanceEntry {
    pub disciplines: DisciplinePair,
    /// Minimum gap in millimetres
    pub tolerance: f64,
}

/// Symmetric per-discipline-pair clearance tolerances with a fallback.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ClearanceTable {
    /// Tolerance for pairs without an entry
    #[serde(default)]
    pub default_tolerance: f64,
    #[serde(default)]
    pub entries: Vec<ClearanceEntry>,
}

impl ClearanceTable {
    /// Table with a single tolerance for every pair.
    pub fn uniform(tolerance: f64) -> Self {
        Self {
            default_tolerance: tolerance,
            entries: Vec::new(),
        }
    }

    /// Set the tolerance for `a`/`b` (either order), replacing any earlier value.
    pub fn with(mut self, a: Discipline, b: Discipline, tolerance: f64) -> Self {
        let disciplines = DisciplinePair::new(a, b);
        match self.entries.iter_mut().find(|e| e.disciplines == disciplines) {
            Some(entry) => entry.tolerance = tolerance,
            None => self.entries.push(ClearanceEntry {
                disciplines,
                tolerance,
            }),
        }
        self
    }

    /// Tolerance for a discipline pair, in millimetres.
    pub fn tolerance(&self, pair: DisciplinePair) -> f64 {
        self.entries
            .iter()
            .rev()
            .find(|e| e.disciplines == pair)
            .map_or(self.default_tolerance, |e| e.tolerance)
    }

    /// Largest tolerance any pair can get.
    pub fn max_tolerance(&self) -> f64 {
        self.entries
            .iter()
            .map(|e| e.tolerance)
            .fold(self.default_tolerance, f64::max)
    }

    fn validate(&self) -> Result<()> {
        let check = |pair: String, value: f64| {
            if value.is_finite() && value >= 0.0 {
                Ok(())
            } else {
                Err(Error::InvalidTolerance { pair, value })
            }
        };
        check("default".into(), self.default_tolerance)?;
        for entry in &self.entries {
            check(entry.disciplines.to_string(), entry.tolerance)?;
        }
        Ok(())
    }
}

/// Clash detector settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionConfig {
    #[serde(default)]
    pub clearance: ClearanceTable,
    /// Maximum corner deviation (mm) for two same-category elements to be duplicates
    #[serde(default = "default_epsilon")]
    pub duplicate_epsilon: f64,
    /// Also report conflicts between elements of the same discipline
    #[serde(default)]
    pub check_intra_discipline: bool,
    /// Federated mode: only report pairs whose elements come from different
    /// source models
    #[serde(default)]
    pub cross_model_only: bool,
    #[serde(default)]
    pub severity: SeverityModel,
    /// Grid cell edge override (mm)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cell_size: Option<f64>,
}

fn default_epsilon() -> f64 {
    DEFAULT_DUPLICATE_EPSILON
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            clearance: ClearanceTable::default(),
            duplicate_epsilon: DEFAULT_DUPLICATE_EPSILON,
            check_intra_discipline: false,
            cross_model_only: false,
            severity: SeverityModel::default(),
            cell_size: None,
        }
    }
}

impl DetectionConfig {
    pub fn with_clearance(mut self, clearance: ClearanceTable) -> Self {
        self.clearance = clearance;
        self
    }

    pub fn with_duplicate_epsilon(mut self, epsilon: f64) -> Self {
        self.duplicate_epsilon = epsilon;
        self
    }

    pub fn with_intra_discipline(mut self, enabled: bool) -> Self {
        self.check_intra_discipline = enabled;
        self
    }

    pub fn with_cross_model_only(mut self, enabled: bool) -> Self {
        self.cross_model_only = enabled;
        self
    }

    /// Reject configurations that could not produce meaningful results.
    pub fn validate(&self) -> Result<()> {
        self.clearance.validate()?;
        if !self.duplicate_epsilon.is_finite() || self.duplicate_epsilon < 0.0 {
            return Err(Error::InvalidEpsilon(self.duplicate_epsilon));
        }
        self.severity.validate()
    }

    /// Index settings that keep every clearance candidate reachable.
    ///
    /// Each box is inflated by half the largest tolerance, so two boxes whose
    /// gap is within tolerance have touching inflated boxes. The duplicate
    /// epsilon never needs a margin: duplicates overlap.
    pub fn index_config(&self) -> IndexConfig {
        let mut config = IndexConfig::default().with_margin(self.clearance.max_tolerance() / 2.0);
        config.cell_size = self.cell_size;
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tolerance_lookup_is_symmetric() {
        let table = ClearanceTable::uniform(10.0)
            .with(Discipline::Structural, Discipline::Mechanical, 100.0)
            .with(Discipline::Mechanical, Discipline::Structural, 150.0);
        assert_eq!(table.entries.len(), 1);
        assert_eq!(
            table.tolerance(DisciplinePair::new(Discipline::Mechanical, Discipline::Structural)),
            150.0
        );
        assert_eq!(
            table.tolerance(DisciplinePair::new(Discipline::Plumbing, Discipline::Electrical)),
            10.0
        );
        assert_eq!(table.max_tolerance(), 150.0);
    }

    #[test]
    fn index_margin_is_half_the_largest_tolerance() {
        let config = DetectionConfig::default()
            .with_clearance(ClearanceTable::default().with(Discipline::Plumbing, Discipline::Electrical, 80.0));
        assert_eq!(config.index_config().margin, 40.0);
    }

    #[test]
    fn negative_values_are_rejected() {
        let config = DetectionConfig::default().with_clearance(ClearanceTable::uniform(-1.0));
        assert!(matches!(config.validate(), Err(Error::InvalidTolerance { .. })));
        let config = DetectionConfig::default().with_duplicate_epsilon(f64::NAN);
        assert!(matches!(config.validate(), Err(Error::InvalidEpsilon(_))));
    }

    #[test]
    fn deserializes_with_defaults() {
        let config: DetectionConfig = serde_json::from_str(
            r#"{"clearance": {"entries": [{"disciplines": ["mechanical", "structural"], "tolerance": 50}]}}"#,
        )
        .unwrap();
        assert_eq!(config.duplicate_epsilon, DEFAULT_DUPLICATE_EPSILON);
        assert!(!config.check_intra_discipline);
        assert!(!config.cross_model_only);
        assert_eq!(
            config.clearance.tolerance(DisciplinePair::new(Discipline::Structural, Discipline::Mechanical)),
            50.0
        );
    }
}
