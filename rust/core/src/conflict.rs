// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Conflict records produced by clash detection.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::digest::short_id;
use crate::element::{Discipline, ElementId};
use crate::error::{Error, Result};

/// Kind of conflict between elements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictType {
    /// Bounding volumes overlap
    Collision,
    /// Bounding volumes are closer than the required clearance
    ClearanceViolation,
    /// Two elements of the same category occupy the same volume
    Duplicate,
    /// Imported conflict of an unrecognised kind
    #[serde(other)]
    Unknown,
}

impl ConflictType {
    pub const fn name(self) -> &'static str {
        match self {
            ConflictType::Collision => "collision",
            ConflictType::ClearanceViolation => "clearance_violation",
            ConflictType::Duplicate => "duplicate",
            ConflictType::Unknown => "unknown",
        }
    }
}

/// Ordinal conflict severity, `Low < Medium < High < Critical`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub const ALL: [Severity; 4] = [
        Severity::Low,
        Severity::Medium,
        Severity::High,
        Severity::Critical,
    ];

    /// 1-based ordinal (`Low` = 1).
    #[inline]
    pub const fn level(self) -> u8 {
        match self {
            Severity::Low => 1,
            Severity::Medium => 2,
            Severity::High => 3,
            Severity::Critical => 4,
        }
    }
}

/// Lifecycle of a conflict once it has been reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictStatus {
    #[default]
    Detected,
    Acknowledged,
    Resolved,
    Ignored,
}

impl ConflictStatus {
    /// Whether the lifecycle allows moving from `self` to `next`.
    pub const fn can_transition(self, next: ConflictStatus) -> bool {
        use ConflictStatus::*;
        matches!(
            (self, next),
            (Detected, Acknowledged)
                | (Detected, Resolved)
                | (Detected, Ignored)
                | (Acknowledged, Resolved)
                | (Acknowledged, Ignored)
                | (Resolved, Detected)
                | (Ignored, Detected)
        )
    }
}

/// Unordered discipline pair, stored in canonical (sorted) order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "[Discipline; 2]")]
pub struct DisciplinePair(Discipline, Discipline);

impl From<[Discipline; 2]> for DisciplinePair {
    fn from([a, b]: [Discipline; 2]) -> Self {
        Self::new(a, b)
    }
}

impl DisciplinePair {
    pub fn new(a: Discipline, b: Discipline) -> Self {
        if a <= b {
            Self(a, b)
        } else {
            Self(b, a)
        }
    }

    #[inline]
    pub const fn first(&self) -> Discipline {
        self.0
    }

    #[inline]
    pub const fn second(&self) -> Discipline {
        self.1
    }

    #[inline]
    pub fn contains(&self, discipline: Discipline) -> bool {
        self.0 == discipline || self.1 == discipline
    }

    #[inline]
    pub fn is_intra(&self) -> bool {
        self.0 == self.1
    }

    /// Highest criticality of the two disciplines.
    #[inline]
    pub fn criticality(&self) -> u8 {
        self.0.criticality().max(self.1.criticality())
    }
}

impl fmt::Display for DisciplinePair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.0.name(), self.1.name())
    }
}

/// Deduplication key: sorted element ids plus conflict type.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ConflictKey {
    elements: Vec<ElementId>,
    conflict_type: ConflictType,
}

impl ConflictKey {
    pub fn new(mut elements: Vec<ElementId>, conflict_type: ConflictType) -> Self {
        elements.sort();
        elements.dedup();
        Self {
            elements,
            conflict_type,
        }
    }

    pub fn elements(&self) -> &[ElementId] {
        &self.elements
    }

    pub fn conflict_type(&self) -> ConflictType {
        self.conflict_type
    }

    /// Deterministic identifier derived from the key.
    pub fn conflict_id(&self) -> ConflictId {
        let parts = std::iter::once(self.conflict_type.name())
            .chain(self.elements.iter().map(ElementId::as_str));
        ConflictId(short_id("C", parts))
    }
}

/// Conflict identifier (digest of its [`ConflictKey`]).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConflictId(String);

impl ConflictId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConflictId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A detected conflict.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conflict {
    pub id: ConflictId,
    pub conflict_type: ConflictType,
    pub severity: Severity,
    /// Involved elements, sorted
    pub elements: Vec<ElementId>,
    /// Overlap volume (mm³) for collisions, gap (mm) for clearance
    /// violations, corner deviation (mm) for duplicates
    pub magnitude: f64,
    pub disciplines: DisciplinePair,
    #[serde(default)]
    pub status: ConflictStatus,
    pub description: String,
}

impl Conflict {
    /// Build a conflict; the id and element order come from the key.
    pub fn new(
        key: &ConflictKey,
        severity: Severity,
        magnitude: f64,
        disciplines: DisciplinePair,
        description: impl Into<String>,
    ) -> Self {
        Self {
            id: key.conflict_id(),
            conflict_type: key.conflict_type(),
            severity,
            elements: key.elements().to_vec(),
            magnitude,
            disciplines,
            status: ConflictStatus::Detected,
            description: description.into(),
        }
    }

    /// Recompute the deduplication key from the record.
    pub fn key(&self) -> ConflictKey {
        ConflictKey::new(self.elements.clone(), self.conflict_type)
    }

    /// Rough heap footprint, for memory accounting.
    pub fn approx_bytes(&self) -> usize {
        std::mem::size_of::<Self>()
            + self.id.as_str().len()
            + self.description.len()
            + self
                .elements
                .iter()
                .map(|id| std::mem::size_of::<ElementId>() + id.as_str().len())
                .sum::<usize>()
    }

    /// Move the conflict through its lifecycle.
    pub fn transition(&mut self, next: ConflictStatus) -> Result<()> {
        if !self.status.can_transition(next) {
            return Err(Error::InvalidTransition {
                id: self.id.clone(),
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        Ok(())
    }
}
