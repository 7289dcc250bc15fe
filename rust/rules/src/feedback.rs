// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Historical success aggregation from solution feedback.
//!
//! Feedback is collected outside the engine; this module only folds it into
//! per-template success rates that the engine reads.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Ratings at or above this count as a success.
pub const POSITIVE_RATING: u8 = 4;

/// One piece of feedback on an applied or proposed solution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Feedback {
    pub template_id: String,
    /// Effectiveness rating, 1-5
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rating: Option<u8>,
    /// The team adopted the suggested solution
    #[serde(default)]
    pub selected: bool,
}

impl Feedback {
    pub fn is_positive(&self) -> bool {
        self.selected || self.rating.is_some_and(|r| r >= POSITIVE_RATING)
    }
}

/// Positive and total feedback counts for one template.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuccessRecord {
    pub positive: u32,
    pub total: u32,
}

impl SuccessRecord {
    /// Laplace-smoothed success rate: `(positive + 1) / (total + 2)`.
    pub fn rate(&self) -> f64 {
        (self.positive as f64 + 1.0) / (self.total as f64 + 2.0)
    }
}

/// Feedback counts per template id.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SuccessHistory {
    records: BTreeMap<String, SuccessRecord>,
}

impl SuccessHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, feedback: &Feedback) {
        let entry = self.records.entry(feedback.template_id.clone()).or_default();
        entry.total = entry.total.saturating_add(1);
        if feedback.is_positive() {
            entry.positive = entry.positive.saturating_add(1);
        }
    }

    pub fn from_feedback<'a>(feedback: impl IntoIterator<Item = &'a Feedback>) -> Self {
        let mut history = Self::new();
        for item in feedback {
            history.record(item);
        }
        history
    }

    /// Success rate in `[0, 1]`, or `None` without any feedback.
    pub fn rate(&self, template_id: &str) -> Option<f64> {
        self.records.get(template_id).map(SuccessRecord::rate)
    }

    pub fn get(&self, template_id: &str) -> Option<SuccessRecord> {
        self.records.get(template_id).copied()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn feedback(rating: Option<u8>, selected: bool) -> Feedback {
        Feedback {
            template_id: "t".into(),
            rating,
            selected,
        }
    }

    #[test]
    fn positivity() {
        assert!(feedback(Some(4), false).is_positive());
        assert!(feedback(None, true).is_positive());
        assert!(feedback(Some(2), true).is_positive());
        assert!(!feedback(Some(3), false).is_positive());
        assert!(!feedback(None, false).is_positive());
    }

    #[test]
    fn smoothed_rate() {
        let history = SuccessHistory::from_feedback(&[
            feedback(Some(5), false),
            feedback(Some(1), false),
            feedback(None, true),
        ]);
        assert_relative_eq!(history.rate("t").unwrap(), 3.0 / 5.0);
        assert_eq!(history.rate("other"), None);
    }
}
