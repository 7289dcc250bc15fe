// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Unit costs, rates and adjustment factors available to formulas.

use std::collections::BTreeMap;

use bimclash_core::{Category, Severity};
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::{Error, Result};

/// Cost data shared by every formula evaluation.
///
/// Maps are ordered so the serialized book is canonical.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CostBook {
    /// Cost per cubic metre, by lowercase cost class
    #[serde(default = "default_unit_costs", deserialize_with = "lowercase_classes")]
    pub unit_costs: BTreeMap<String, f64>,
    /// Labour cost per hour
    #[serde(default = "default_labor_rate")]
    pub labor_rate: f64,
    /// Equipment cost per hour
    #[serde(default = "default_equipment_rate")]
    pub equipment_rate: f64,
    /// Flat material transport cost
    #[serde(default = "default_transport_cost")]
    pub transport_cost: f64,
    /// Cost multiplier by category (1.0 when absent)
    #[serde(default = "default_cost_factors")]
    pub cost_factors: BTreeMap<Category, f64>,
    /// Schedule multiplier by category (1.0 when absent)
    #[serde(default = "default_time_factors")]
    pub time_factors: BTreeMap<Category, f64>,
}

fn default_unit_costs() -> BTreeMap<String, f64> {
    // Steel at 2.5 per kg and 7850 kg/m³.
    BTreeMap::from([
        ("concrete".to_string(), 500.0),
        ("steel".to_string(), 19_625.0),
    ])
}

/// Class names are case-insensitive; two spellings of one class are an error.
fn lowercase_classes<'de, D>(deserializer: D) -> std::result::Result<BTreeMap<String, f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let listed = BTreeMap::<String, f64>::deserialize(deserializer)?;
    let mut classes = BTreeMap::new();
    for (class, cost) in listed {
        if classes.insert(class.to_lowercase(), cost).is_some() {
            return Err(serde::de::Error::custom(format!(
                "unit cost class '{class}' is listed more than once"
            )));
        }
    }
    Ok(classes)
}

fn default_labor_rate() -> f64 {
    45.0
}

fn default_equipment_rate() -> f64 {
    75.0
}

fn default_transport_cost() -> f64 {
    150.0
}

fn default_cost_factors() -> BTreeMap<Category, f64> {
    BTreeMap::from([
        (Category::Beam, 1.2),
        (Category::Column, 1.5),
        (Category::Wall, 0.8),
        (Category::Slab, 1.1),
        (Category::Door, 0.6),
        (Category::Window, 0.7),
    ])
}

fn default_time_factors() -> BTreeMap<Category, f64> {
    BTreeMap::from([
        (Category::Beam, 1.1),
        (Category::Column, 1.3),
        (Category::Wall, 0.9),
        (Category::Slab, 1.2),
        (Category::Door, 0.7),
        (Category::Window, 0.8),
    ])
}

impl Default for CostBook {
    fn default() -> Self {
        Self {
            unit_costs: default_unit_costs(),
            labor_rate: default_labor_rate(),
            equipment_rate: default_equipment_rate(),
            transport_cost: default_transport_cost(),
            cost_factors: default_cost_factors(),
            time_factors: default_time_factors(),
        }
    }
}

impl CostBook {
    pub fn with_unit_cost(mut self, class: impl Into<String>, cost: f64) -> Self {
        self.unit_costs.insert(class.into().to_lowercase(), cost);
        self
    }

    /// Cost per m³ of a class; class names are case-insensitive.
    pub fn unit_cost(&self, class: &str) -> Option<f64> {
        self.unit_costs.get(&class.to_lowercase()).copied()
    }

    pub fn cost_factor(&self, category: Category) -> f64 {
        self.cost_factors.get(&category).copied().unwrap_or(1.0)
    }

    pub fn time_factor(&self, category: Category) -> f64 {
        self.time_factors.get(&category).copied().unwrap_or(1.0)
    }

    /// Multiplier applied for conflict severity.
    pub fn severity_factor(severity: Severity) -> f64 {
        match severity {
            Severity::Low => 0.8,
            Severity::Medium => 1.0,
            Severity::High => 1.3,
            Severity::Critical => 1.6,
        }
    }

    pub fn validate(&self) -> Result<()> {
        let rates = [
            ("labor_rate", self.labor_rate),
            ("equipment_rate", self.equipment_rate),
            ("transport_cost", self.transport_cost),
        ];
        let classes = self.unit_costs.iter().map(|(k, v)| (k.as_str(), *v));
        let factors = self
            .cost_factors
            .iter()
            .chain(self.time_factors.iter())
            .map(|(k, v)| (k.name(), *v));

        for (name, value) in rates.into_iter().chain(classes).chain(factors) {
            if !value.is_finite() || value < 0.0 {
                return Err(Error::InvalidConfig(format!(
                    "cost book entry '{name}' must be a non-negative number, got {value}"
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn class_lookup_ignores_case() {
        let book = CostBook::default().with_unit_cost("Timber", 800.0);
        assert_eq!(book.unit_cost("CONCRETE"), Some(500.0));
        assert_eq!(book.unit_cost("timber"), Some(800.0));
        assert_eq!(book.unit_cost("unobtainium"), None);
    }

    #[test]
    fn unlisted_categories_use_neutral_factors() {
        let book = CostBook::default();
        assert_eq!(book.cost_factor(Category::Column), 1.5);
        assert_eq!(book.cost_factor(Category::Duct), 1.0);
        assert_eq!(book.time_factor(Category::Pipe), 1.0);
    }

    #[test]
    fn json_classes_are_case_insensitive() {
        let book: CostBook = serde_json::from_str(r#"{"unit_costs": {"Concrete": 500, "STEEL": 19625}}"#).unwrap();
        assert_eq!(book.unit_cost("concrete"), Some(500.0));
        assert_eq!(book.unit_cost("Steel"), Some(19_625.0));
        assert!(book.unit_costs.keys().all(|k| k == &k.to_lowercase()));

        let back: CostBook = serde_json::from_str(&serde_json::to_string(&book).unwrap()).unwrap();
        assert_eq!(back, book);

        let clash = serde_json::from_str::<CostBook>(r#"{"unit_costs": {"Steel": 1, "steel": 2}}"#);
        assert!(clash.is_err());
    }

    #[test]
    fn book_round_trips_through_json() {
        let book = CostBook::default();
        let json = serde_json::to_string(&book).unwrap();
        let back: CostBook = serde_json::from_str(&json).unwrap();
        assert_eq!(back, book);
        assert!(back.validate().is_ok());
    }
}
