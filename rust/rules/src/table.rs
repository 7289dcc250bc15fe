// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Validated rule table.

use bimclash_core::{
    Conflict, ConflictType, Discipline, DisciplineSelector, RuleTemplate, Severity, SeverityRange,
    SolutionType,
};
use rustc_hash::FxHashSet;

use crate::error::{Error, Result};
use crate::formula::Formula;

/// A template with its formulas compiled.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledTemplate {
    pub template: RuleTemplate,
    pub cost: Formula,
    pub time: Formula,
}

impl CompiledTemplate {
    pub fn compile(template: RuleTemplate) -> Result<Self> {
        let wrap = |source: Error| Error::Template {
            id: template.id.clone(),
            source: Box::new(source),
        };
        template.validate().map_err(|e| wrap(e.into()))?;
        let cost = Formula::parse(&template.cost_formula).map_err(wrap)?;
        let time = Formula::parse(&template.time_formula).map_err(wrap)?;
        Ok(Self { template, cost, time })
    }

    /// Type, severity and (symmetric) discipline predicate.
    pub fn matches(&self, conflict: &Conflict) -> bool {
        let t = &self.template;
        t.conflict_type == conflict.conflict_type
            && t.severity.contains(conflict.severity)
            && t.accepts_disciplines(conflict.disciplines)
    }
}

/// Ordered collection of compiled templates with unique ids.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RuleTable {
    templates: Vec<CompiledTemplate>,
}

impl RuleTable {
    pub fn new(templates: Vec<RuleTemplate>) -> Result<Self> {
        let mut seen = FxHashSet::default();
        let mut compiled = Vec::with_capacity(templates.len());
        for template in templates {
            if !seen.insert(template.id.clone()) {
                return Err(Error::DuplicateTemplate(template.id));
            }
            compiled.push(CompiledTemplate::compile(template)?);
        }
        Ok(Self { templates: compiled })
    }

    /// Load a JSON array of templates.
    pub fn from_json(json: &str) -> Result<Self> {
        let templates: Vec<RuleTemplate> = serde_json::from_str(json)?;
        Self::new(templates)
    }

    /// Default remediation library.
    pub fn builtin() -> Self {
        Self::new(builtin_templates()).expect("built-in rule library is valid")
    }

    pub fn templates(&self) -> impl Iterator<Item = &RuleTemplate> {
        self.templates.iter().map(|c| &c.template)
    }

    pub fn matching<'a>(&'a self, conflict: &'a Conflict) -> impl Iterator<Item = &'a CompiledTemplate> {
        self.templates.iter().filter(move |c| c.matches(conflict))
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }

    /// Raw template records, for serialization and cache keys.
    pub fn to_records(&self) -> Vec<RuleTemplate> {
        self.templates().cloned().collect()
    }
}

#[allow(clippy::too_many_arguments)]
fn template(
    id: &str,
    conflict_type: ConflictType,
    disciplines: [DisciplineSelector; 2],
    severity: SeverityRange,
    solution_type: SolutionType,
    description: &str,
    cost_formula: &str,
    time_formula: &str,
    base_confidence: f64,
) -> RuleTemplate {
    RuleTemplate {
        id: id.to_string(),
        conflict_type,
        disciplines,
        severity,
        solution_type,
        description: description.to_string(),
        cost_formula: cost_formula.to_string(),
        time_formula: time_formula.to_string(),
        base_confidence,
        historical_success: 0.5,
    }
}

fn builtin_templates() -> Vec<RuleTemplate> {
    use ConflictType::*;
    use DisciplineSelector::{Any, Is};
    use SolutionType::*;

    let structural = [Is(Discipline::Structural), Is(Discipline::Structural)];
    let service_through_structure = [Is(Discipline::Structural), Any];
    let any = [Any, Any];
    let minor = SeverityRange::new(Severity::Low, Severity::Medium);
    let major = SeverityRange::new(Severity::High, Severity::Critical);

    vec![
        template(
            "collision.structural.relocate",
            Collision,
            structural,
            SeverityRange::ALL,
            Relocate,
            "Relocate the structural member to clear the intersection",
            "volume_m3 * unit_cost * 0.12 + labor_rate * 24 * cost_factor * severity_factor",
            "5 * time_factor * severity_factor",
            0.9,
        ),
        template(
            "collision.structural.resize",
            Collision,
            structural,
            SeverityRange::ALL,
            Resize,
            "Adjust the member position or section size",
            "volume_m3 * unit_cost * 0.18 + labor_rate * 40 * cost_factor * severity_factor",
            "9 * time_factor * severity_factor",
            0.7,
        ),
        template(
            "collision.structural.redesign",
            Collision,
            structural,
            major,
            Resize,
            "Redesign the local structural system",
            "volume_m3 * unit_cost * 0.35 + (labor_rate + equipment_rate) * 80 * cost_factor * severity_factor",
            "15 * time_factor * severity_factor",
            0.6,
        ),
        template(
            "collision.service.reroute",
            Collision,
            service_through_structure,
            SeverityRange::ALL,
            Reroute,
            "Reroute the service run around the structural member",
            "overlap_m3 * unit_cost + max_length_m * transport_cost / 10 + labor_rate * 8 * cost_factor * severity_factor",
            "max(1, ceil(max_length_m / 10)) * time_factor * severity_factor",
            0.85,
        ),
        template(
            "collision.service.opening",
            Collision,
            service_through_structure,
            minor,
            Resize,
            "Provide a sleeve or opening through the structural element",
            "overlap_m3 * unit_cost * 3 + labor_rate * 12 + equipment_rate * 4",
            "2 * time_factor * severity_factor",
            0.8,
        ),
        template(
            "collision.generic.relocate",
            Collision,
            any,
            SeverityRange::ALL,
            Relocate,
            "Relocate one of the conflicting elements",
            "overlap_m3 * unit_cost + labor_rate * 10 * cost_factor * severity_factor",
            "3 * time_factor * severity_factor",
            0.8,
        ),
        template(
            "collision.generic.modify",
            Collision,
            any,
            SeverityRange::ALL,
            Resize,
            "Modify element geometry to resolve the conflict",
            "overlap_m3 * unit_cost * 1.5 + labor_rate * 14 * cost_factor * severity_factor",
            "4 * time_factor * severity_factor",
            0.7,
        ),
        template(
            "clearance.spacing",
            ClearanceViolation,
            any,
            SeverityRange::ALL,
            Relocate,
            "Optimize spacing between the elements",
            "labor_rate * 4 * cost_factor * severity_factor + transport_cost",
            "1 * time_factor * severity_factor",
            0.9,
        ),
        template(
            "clearance.resize",
            ClearanceViolation,
            any,
            SeverityRange::ALL,
            Resize,
            "Resize elements to restore the required clearance",
            "min_section_m * max_length_m * 0.1 * unit_cost + labor_rate * 12 * cost_factor * severity_factor",
            "2 * time_factor * severity_factor",
            0.75,
        ),
        template(
            "clearance.compact_product",
            ClearanceViolation,
            [Any, Is(Discipline::Mechanical)],
            minor,
            MaterialSubstitution,
            "Substitute a more compact product to gain clearance",
            "volume_m3 * unit_cost * 0.2 + labor_rate * 6",
            "3 * time_factor",
            0.6,
        ),
        template(
            "duplicate.remove",
            Duplicate,
            any,
            SeverityRange::ALL,
            Relocate,
            "Delete the duplicate element or move it to its intended position",
            "labor_rate * 0.5",
            "0.25",
            0.95,
        ),
    ]
}
