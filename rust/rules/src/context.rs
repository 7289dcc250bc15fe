// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Variables bound for formula evaluation.

use bimclash_core::{Conflict, ConflictType, Element};
use rustc_hash::FxHashMap;

use crate::costs::CostBook;

const MM3_PER_M3: f64 = 1.0e9;
const MM_PER_M: f64 = 1.0e3;

/// Named values visible to a formula.
#[derive(Debug, Clone, Default)]
pub struct FormulaContext {
    vars: FxHashMap<String, f64>,
}

impl FormulaContext {
    pub fn set(&mut self, name: &str, value: f64) {
        self.vars.insert(name.to_string(), value);
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.vars.get(name).copied()
    }

    pub fn is_bound(&self, name: &str) -> bool {
        self.vars.contains_key(name)
    }

    /// Bind the variables for one conflict.
    ///
    /// Always bound: `magnitude`, `severity` (1-4), `severity_factor`,
    /// `elements`, `labor_rate`, `equipment_rate`, `transport_cost`,
    /// `project_cost`, `project_days`.
    ///
    /// Bound when every involved element is known: `volume_m3`,
    /// `overlap_m3`, `gap_mm`, `max_length_m`, `min_section_m`,
    /// `cost_factor`, `time_factor`.
    ///
    /// `unit_cost` (per m³, averaged) is bound only when every involved
    /// element has a cost class listed in the book.
    pub fn for_conflict(
        conflict: &Conflict,
        elements: &[&Element],
        book: &CostBook,
        baseline: (f64, f64),
    ) -> Self {
        let mut ctx = Self::default();
        ctx.set("magnitude", conflict.magnitude);
        ctx.set("severity", conflict.severity.level() as f64);
        ctx.set("severity_factor", CostBook::severity_factor(conflict.severity));
        ctx.set("elements", conflict.elements.len() as f64);
        ctx.set("labor_rate", book.labor_rate);
        ctx.set("equipment_rate", book.equipment_rate);
        ctx.set("transport_cost", book.transport_cost);
        ctx.set("project_cost", baseline.0);
        ctx.set("project_days", baseline.1);

        if elements.is_empty() || elements.len() != conflict.elements.len() {
            return ctx;
        }

        let count = elements.len() as f64;
        let volume: f64 = elements.iter().map(|e| e.bounds.volume()).sum();
        let max_length = elements.iter().map(|e| e.bounds.max_extent()).fold(0.0, f64::max);
        let min_section = elements
            .iter()
            .map(|e| e.bounds.min_extent())
            .fold(f64::INFINITY, f64::min);
        ctx.set("volume_m3", volume / MM3_PER_M3);
        ctx.set("max_length_m", max_length / MM_PER_M);
        ctx.set("min_section_m", min_section / MM_PER_M);
        ctx.set(
            "cost_factor",
            elements.iter().map(|e| book.cost_factor(e.category)).sum::<f64>() / count,
        );
        ctx.set(
            "time_factor",
            elements.iter().map(|e| book.time_factor(e.category)).sum::<f64>() / count,
        );

        let (overlap, gap) = match elements {
            [a, b] => (a.bounds.overlap_volume(&b.bounds), a.bounds.gap(&b.bounds)),
            _ if conflict.conflict_type == ConflictType::Collision => (conflict.magnitude, 0.0),
            _ => (0.0, 0.0),
        };
        ctx.set("overlap_m3", overlap / MM3_PER_M3);
        ctx.set("gap_mm", gap);

        let unit_costs: Option<Vec<f64>> = elements
            .iter()
            .map(|e| e.cost_class.as_deref().and_then(|class| book.unit_cost(class)))
            .collect();
        if let Some(costs) = unit_costs {
            ctx.set("unit_cost", costs.iter().sum::<f64>() / count);
        }

        ctx
    }
}
