// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Prescriptive engine: matching, estimation, confidence and ranking.
//!
//! [`PrescriptiveEngine::prescribe`] is a pure function of the conflict, its
//! elements, the rule table, the cost book and the success history. It never
//! returns an empty list: a conflict no template matches gets a single
//! manual-review candidate.

use std::cmp::Ordering;

use bimclash_core::{
    Checkpoint, Conflict, ConflictId, Element, ImpactAssessment, ImpactLevel, Severity,
    SolutionCandidate, SolutionId,
};
use bimclash_geometry::ElementTable;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::context::FormulaContext;
use crate::costs::CostBook;
use crate::error::{Error, Result};
use crate::feedback::SuccessHistory;
use crate::table::{CompiledTemplate, RuleTable};

/// Reference project size for impact bucketing.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProjectBaseline {
    pub cost: f64,
    pub days: f64,
    /// Share of the baseline above which impact is medium
    pub medium_share: f64,
    /// Share of the baseline above which impact is high
    pub high_share: f64,
}

impl Default for ProjectBaseline {
    fn default() -> Self {
        Self {
            cost: 100_000.0,
            days: 60.0,
            medium_share: 0.1,
            high_share: 0.2,
        }
    }
}

impl ProjectBaseline {
    fn level(&self, value: f64, baseline: f64) -> ImpactLevel {
        if value > baseline * self.high_share {
            ImpactLevel::High
        } else if value > baseline * self.medium_share {
            ImpactLevel::Medium
        } else {
            ImpactLevel::Low
        }
    }

    /// Impact buckets for an estimate; overall is the worse of the two.
    pub fn assess(&self, cost: f64, days: f64) -> ImpactAssessment {
        let cost = self.level(cost, self.cost);
        let time = self.level(days, self.days);
        ImpactAssessment {
            cost,
            time,
            overall: cost.max(time),
        }
    }
}

/// Engine tunables.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Weight of historical success against base confidence, in [0, 1]
    #[serde(default = "default_blend_ratio")]
    pub blend_ratio: f64,
    #[serde(default)]
    pub baseline: ProjectBaseline,
}

fn default_blend_ratio() -> f64 {
    0.5
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            blend_ratio: default_blend_ratio(),
            baseline: ProjectBaseline::default(),
        }
    }
}

impl EngineConfig {
    pub fn with_blend_ratio(mut self, ratio: f64) -> Self {
        self.blend_ratio = ratio;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.blend_ratio) {
            return Err(Error::InvalidConfig(format!(
                "blend_ratio must be within [0, 1], got {}",
                self.blend_ratio
            )));
        }
        let b = self.baseline;
        if !(b.cost > 0.0 && b.days > 0.0 && b.cost.is_finite() && b.days.is_finite()) {
            return Err(Error::InvalidConfig("project baseline must be positive".into()));
        }
        if !(0.0 <= b.medium_share && b.medium_share <= b.high_share) {
            return Err(Error::InvalidConfig(
                "impact shares must satisfy 0 <= medium <= high".into(),
            ));
        }
        Ok(())
    }
}

/// `(1 - w) * base + w * historical`, clamped to [0, 1].
pub fn blend_confidence(base: f64, historical: f64, ratio: f64) -> f64 {
    let value = (1.0 - ratio) * base + ratio * historical;
    if value.is_finite() {
        value.clamp(0.0, 1.0)
    } else {
        0.0
    }
}

/// Confidence in the analysis of one conflict, in [0, 1].
///
/// Weighs how many candidates were found (saturating at three), their mean
/// confidence and how clear-cut the conflict's severity grade is.
pub fn analysis_confidence(severity: Severity, solutions: &[SolutionCandidate]) -> f64 {
    if solutions.is_empty() {
        return 0.0;
    }
    let count = solutions.len() as f64;
    let coverage = (count / 3.0).min(1.0);
    let mean = solutions.iter().map(|s| s.confidence).sum::<f64>() / count;
    let grading = match severity {
        Severity::Critical | Severity::High => 0.9,
        Severity::Medium => 0.8,
        Severity::Low => 0.7,
    };
    (0.3 * coverage + 0.4 * mean + 0.3 * grading).clamp(0.0, 1.0)
}

/// Ranked candidates for one conflict.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prescription {
    pub conflict_id: ConflictId,
    pub solutions: Vec<SolutionCandidate>,
    /// See [`analysis_confidence`]
    #[serde(default)]
    pub analysis_confidence: f64,
}

impl Prescription {
    pub fn new(conflict: &Conflict, solutions: Vec<SolutionCandidate>) -> Self {
        Self {
            conflict_id: conflict.id.clone(),
            analysis_confidence: analysis_confidence(conflict.severity, &solutions),
            solutions,
        }
    }

    /// Rough heap footprint, for memory accounting.
    pub fn approx_bytes(&self) -> usize {
        std::mem::size_of::<Self>()
            + self.conflict_id.as_str().len()
            + self
                .solutions
                .iter()
                .map(|s| std::mem::size_of::<SolutionCandidate>() + s.id.as_str().len() + s.description.len())
                .sum::<usize>()
    }
}

/// Result of prescribing a batch of conflicts.
#[derive(Debug, Clone, Default)]
pub struct Prescriptions {
    /// In conflict order; conflicts not reached are absent
    pub items: Vec<Prescription>,
    /// `false` when the checkpoint stopped the batch early
    pub complete: bool,
}

impl Prescriptions {
    pub fn solution_count(&self) -> usize {
        self.items.iter().map(|p| p.solutions.len()).sum()
    }
}

/// Rule table, cost book and tunables bundled for prescription.
#[derive(Debug, Clone)]
pub struct PrescriptiveEngine {
    rules: RuleTable,
    costs: CostBook,
    config: EngineConfig,
}

impl Default for PrescriptiveEngine {
    fn default() -> Self {
        Self {
            rules: RuleTable::builtin(),
            costs: CostBook::default(),
            config: EngineConfig::default(),
        }
    }
}

struct Ranked {
    candidate: SolutionCandidate,
    specificity: u8,
}

impl PrescriptiveEngine {
    pub fn new(rules: RuleTable, costs: CostBook, config: EngineConfig) -> Result<Self> {
        config.validate()?;
        costs.validate()?;
        Ok(Self {
            rules,
            costs,
            config,
        })
    }

    pub fn rules(&self) -> &RuleTable {
        &self.rules
    }

    pub fn costs(&self) -> &CostBook {
        &self.costs
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Ranked candidates for one conflict; never empty.
    ///
    /// `elements` are the conflict's elements; when any is missing the
    /// geometry-derived formula variables stay unbound.
    pub fn prescribe(
        &self,
        conflict: &Conflict,
        elements: &[&Element],
        history: &SuccessHistory,
    ) -> Vec<SolutionCandidate> {
        let baseline = self.config.baseline;
        let ctx = FormulaContext::for_conflict(conflict, elements, &self.costs, (baseline.cost, baseline.days));

        let mut ranked: Vec<Ranked> = self
            .rules
            .matching(conflict)
            .map(|compiled| self.instantiate(conflict, compiled, &ctx, history))
            .collect();

        if ranked.is_empty() {
            return vec![SolutionCandidate::manual_review(
                &conflict.id,
                format!(
                    "No remediation rule matches this {} between {}; review manually",
                    conflict.conflict_type.name(),
                    conflict.disciplines
                ),
            )];
        }

        ranked.sort_by(compare);
        ranked
            .into_iter()
            .enumerate()
            .map(|(i, mut r)| {
                r.candidate.rank = i as u32 + 1;
                r.candidate
            })
            .collect()
    }

    /// Prescribe every conflict in parallel, keeping conflict order.
    ///
    /// The checkpoint is polled once per conflict and charged with each
    /// prescription's footprint.
    pub fn prescribe_all(
        &self,
        conflicts: &[Conflict],
        table: &ElementTable,
        history: &SuccessHistory,
        checkpoint: &impl Checkpoint,
    ) -> Prescriptions {
        let start = std::time::Instant::now();
        checkpoint.begin(conflicts.len());
        let results: Vec<Option<Prescription>> = conflicts
            .par_iter()
            .map(|conflict| {
                if !checkpoint.proceed() {
                    return None;
                }
                let elements: Vec<&Element> =
                    conflict.elements.iter().filter_map(|id| table.by_id(id)).collect();
                let prescription = Prescription::new(conflict, self.prescribe(conflict, &elements, history));
                if !checkpoint.charge(prescription.approx_bytes()) {
                    return None;
                }
                checkpoint.advance(1);
                Some(prescription)
            })
            .collect();

        let complete = results.iter().all(Option::is_some);
        let items: Vec<Prescription> = results.into_iter().flatten().collect();
        let prescriptions = Prescriptions { items, complete };

        tracing::info!(
            conflicts = conflicts.len(),
            prescribed = prescriptions.items.len(),
            solutions = prescriptions.solution_count(),
            complete,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Prescription pass complete"
        );
        prescriptions
    }

    fn instantiate(
        &self,
        conflict: &Conflict,
        compiled: &CompiledTemplate,
        ctx: &FormulaContext,
        history: &SuccessHistory,
    ) -> Ranked {
        let template = &compiled.template;
        let estimated_cost = compiled.cost.eval(ctx).map(|v| v.max(0.0));
        let estimated_days = compiled.time.eval(ctx).map(|v| v.max(0.0));
        let historical = history.rate(&template.id).unwrap_or(template.historical_success);
        let confidence = blend_confidence(template.base_confidence, historical, self.config.blend_ratio);
        let impact = match (estimated_cost, estimated_days) {
            (Some(cost), Some(days)) => Some(self.config.baseline.assess(cost, days)),
            _ => None,
        };

        Ranked {
            candidate: SolutionCandidate {
                id: SolutionId::derive(&conflict.id, Some(&template.id)),
                conflict_id: conflict.id.clone(),
                template_id: Some(template.id.clone()),
                solution_type: template.solution_type,
                description: template.description.clone(),
                estimated_cost,
                estimated_days,
                confidence,
                rank: 0,
                impact,
            },
            specificity: template.specificity(),
        }
    }
}

/// Missing estimates sort after present ones.
fn missing_last(a: Option<f64>, b: Option<f64>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.total_cmp(&b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

fn compare(a: &Ranked, b: &Ranked) -> Ordering {
    let (x, y) = (&a.candidate, &b.candidate);
    y.confidence
        .total_cmp(&x.confidence)
        .then_with(|| b.specificity.cmp(&a.specificity))
        .then_with(|| missing_last(x.estimated_cost, y.estimated_cost))
        .then_with(|| missing_last(x.estimated_days, y.estimated_days))
        .then_with(|| x.template_id.cmp(&y.template_id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feedback::Feedback;
    use approx::assert_relative_eq;
    use bimclash_core::{
        BoundingBox, Category, ConflictKey, ConflictType, Discipline, DisciplinePair,
        DisciplineSelector, ElementId, RuleTemplate, Severity, SeverityRange, SolutionType,
    };

    fn rule(id: &str, base: f64, cost: &str, severity: SeverityRange, disciplines: [DisciplineSelector; 2]) -> RuleTemplate {
        RuleTemplate {
            id: id.into(),
            conflict_type: ConflictType::Collision,
            disciplines,
            severity,
            solution_type: SolutionType::Reroute,
            description: format!("apply {id}"),
            cost_formula: cost.into(),
            time_formula: "2".into(),
            base_confidence: base,
            historical_success: 0.5,
        }
    }

    fn conflict(severity: Severity) -> Conflict {
        let key = ConflictKey::new(vec![ElementId::new("a"), ElementId::new("b")], ConflictType::Collision);
        Conflict::new(
            &key,
            severity,
            125.0,
            DisciplinePair::new(Discipline::Structural, Discipline::Mechanical),
            "a collides with b",
        )
    }

    fn elements(class: Option<&str>) -> Vec<Element> {
        let make = |id: &str, d, c, min, max| {
            let e = Element::new(ElementId::new(id), d, c, BoundingBox::new([min; 3], [max; 3]));
            match class {
                Some(class) => e.with_cost_class(class),
                None => e,
            }
        };
        vec![
            make("a", Discipline::Structural, Category::Beam, 0.0, 10.0),
            make("b", Discipline::Mechanical, Category::Duct, 5.0, 15.0),
        ]
    }

    fn engine(rules: Vec<RuleTemplate>) -> PrescriptiveEngine {
        PrescriptiveEngine::new(RuleTable::new(rules).unwrap(), CostBook::default(), EngineConfig::default()).unwrap()
    }

    #[test]
    fn unmatched_conflict_gets_manual_review() {
        let engine = engine(vec![]);
        let elements = elements(None);
        let refs: Vec<&Element> = elements.iter().collect();
        let solutions = engine.prescribe(&conflict(Severity::High), &refs, &SuccessHistory::new());

        assert_eq!(solutions.len(), 1);
        assert_eq!(solutions[0].solution_type, SolutionType::ManualReview);
        assert_eq!(solutions[0].confidence, 0.0);
        assert_eq!(solutions[0].rank, 1);
        assert!(solutions[0].estimated_cost.is_none());
        assert!(solutions[0].estimated_days.is_none());
    }

    #[test]
    fn ranking_order() {
        use DisciplineSelector::{Any, Is};
        let engine = engine(vec![
            rule("z-cheap", 0.8, "100", SeverityRange::ALL, [Any, Any]),
            rule("b-pricey", 0.8, "500", SeverityRange::ALL, [Any, Any]),
            rule("a-specific", 0.8, "900", SeverityRange::ALL, [Is(Discipline::Mechanical), Any]),
            rule("top", 0.9, "5000", SeverityRange::ALL, [Any, Any]),
            rule("unpriced", 0.8, "unit_cost * 2", SeverityRange::ALL, [Any, Any]),
            rule("a-tie", 0.8, "100", SeverityRange::ALL, [Any, Any]),
        ]);
        let elements = elements(None);
        let refs: Vec<&Element> = elements.iter().collect();
        let solutions = engine.prescribe(&conflict(Severity::Medium), &refs, &SuccessHistory::new());

        let order: Vec<_> = solutions.iter().map(|s| s.template_id.clone().unwrap()).collect();
        assert_eq!(order, vec!["top", "a-specific", "a-tie", "z-cheap", "b-pricey", "unpriced"]);
        let ranks: Vec<_> = solutions.iter().map(|s| s.rank).collect();
        assert_eq!(ranks, vec![1, 2, 3, 4, 5, 6]);
        assert!(solutions.windows(2).all(|w| w[0].confidence >= w[1].confidence));
    }

    #[test]
    fn missing_cost_class_omits_cost() {
        let engine = engine(vec![rule(
            "r",
            0.8,
            "volume_m3 * unit_cost",
            SeverityRange::ALL,
            [DisciplineSelector::Any, DisciplineSelector::Any],
        )]);
        let history = SuccessHistory::new();

        let bare = elements(None);
        let refs: Vec<&Element> = bare.iter().collect();
        let solution = &engine.prescribe(&conflict(Severity::Low), &refs, &history)[0];
        assert!(solution.estimated_cost.is_none());
        assert_eq!(solution.estimated_days, Some(2.0));
        assert!(solution.impact.is_none());

        let priced = elements(Some("concrete"));
        let refs: Vec<&Element> = priced.iter().collect();
        let solution = &engine.prescribe(&conflict(Severity::Low), &refs, &history)[0];
        assert_relative_eq!(solution.estimated_cost.unwrap(), 2.0e-6 * 500.0);
        assert!(solution.impact.is_some());
    }

    #[test]
    fn negative_estimates_clamp_to_zero() {
        let engine = engine(vec![rule("r", 0.5, "10 - 50", SeverityRange::ALL, [DisciplineSelector::Any; 2])]);
        let solution = &engine.prescribe(&conflict(Severity::Low), &[], &SuccessHistory::new())[0];
        assert_eq!(solution.estimated_cost, Some(0.0));
    }

    #[test]
    fn confidence_blends_history() {
        let engine = engine(vec![rule("r", 0.9, "1", SeverityRange::ALL, [DisciplineSelector::Any; 2])]);
        let no_history = &engine.prescribe(&conflict(Severity::Low), &[], &SuccessHistory::new())[0];
        assert_relative_eq!(no_history.confidence, 0.7);

        let history = SuccessHistory::from_feedback(&[Feedback {
            template_id: "r".into(),
            rating: Some(1),
            selected: false,
        }]);
        let with_history = &engine.prescribe(&conflict(Severity::Low), &[], &history)[0];
        assert_relative_eq!(with_history.confidence, 0.5 * 0.9 + 0.5 / 3.0);
    }

    #[test]
    fn analysis_confidence_weighs_coverage_and_severity() {
        let high = conflict(Severity::High);
        let review = Prescription::new(&high, vec![SolutionCandidate::manual_review(&high.id, "review")]);
        assert_relative_eq!(review.analysis_confidence, 0.3 / 3.0 + 0.3 * 0.9);

        let engine = engine(vec![
            rule("a", 0.6, "1", SeverityRange::ALL, [DisciplineSelector::Any; 2]),
            rule("b", 0.6, "1", SeverityRange::ALL, [DisciplineSelector::Any; 2]),
            rule("c", 0.6, "1", SeverityRange::ALL, [DisciplineSelector::Any; 2]),
            rule("d", 0.6, "1", SeverityRange::ALL, [DisciplineSelector::Any; 2]),
        ]);
        let low = conflict(Severity::Low);
        let ranked = Prescription::new(&low, engine.prescribe(&low, &[], &SuccessHistory::new()));
        // Blended confidence is 0.5 * 0.6 + 0.5 * 0.5 for every candidate.
        assert_relative_eq!(ranked.analysis_confidence, 0.3 + 0.4 * 0.55 + 0.3 * 0.7);
        assert_eq!(analysis_confidence(Severity::Low, &[]), 0.0);
    }

    #[test]
    fn impact_buckets_follow_baseline() {
        let baseline = ProjectBaseline::default();
        let impact = baseline.assess(25_000.0, 3.0);
        assert_eq!(impact.cost, ImpactLevel::High);
        assert_eq!(impact.time, ImpactLevel::Low);
        assert_eq!(impact.overall, ImpactLevel::High);
        assert_eq!(baseline.assess(10_001.0, 6.5).time, ImpactLevel::Medium);
    }

    #[test]
    fn blend_ratio_must_be_a_share() {
        let config = EngineConfig::default().with_blend_ratio(1.5);
        assert!(PrescriptiveEngine::new(RuleTable::default(), CostBook::default(), config).is_err());
    }

    #[test]
    fn builtin_library_prescribes_service_clash() {
        let engine = PrescriptiveEngine::default();
        let elements = elements(Some("steel"));
        let refs: Vec<&Element> = elements.iter().collect();
        let solutions = engine.prescribe(&conflict(Severity::Medium), &refs, &SuccessHistory::new());
        assert!(solutions.iter().any(|s| s.solution_type == SolutionType::Reroute));
        assert!(solutions.iter().all(|s| s.estimated_cost.is_some()));
    }
}
