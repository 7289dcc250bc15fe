// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Result cache collaborator.
//!
//! Reports are cached as JSON text under a content-addressed key. The
//! pipeline only reads and writes through [`ResultCache`]; where the text is
//! kept is up to the caller.

use std::sync::Mutex;

use bimclash_core::{LengthUnit, RawElement, RuleTemplate};
use bimclash_detect::DetectionConfig;
use bimclash_rules::{CostBook, EngineConfig, SuccessHistory};
use rustc_hash::FxHashMap;
use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::error::Result;

/// Key-value store for serialized run reports.
pub trait ResultCache: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn put(&self, key: &str, report_json: String);
}

/// Process-local cache, mainly for tests and embedding.
#[derive(Debug, Default)]
pub struct InMemoryCache {
    entries: Mutex<FxHashMap<String, String>>,
}

impl InMemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ResultCache for InMemoryCache {
    fn get(&self, key: &str) -> Option<String> {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(key)
            .cloned()
    }

    fn put(&self, key: &str, report_json: String) {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(key.to_string(), report_json);
    }
}

/// Everything that determines a run's output.
#[derive(Serialize)]
struct KeyMaterial<'a> {
    unit: LengthUnit,
    elements: &'a [RawElement],
    rules: &'a [RuleTemplate],
    detection: &'a DetectionConfig,
    engine: &'a EngineConfig,
    costs: &'a CostBook,
    history: &'a SuccessHistory,
}

/// SHA-256 of the canonical JSON of a run's inputs, hex encoded.
///
/// Resource limits are excluded: they decide whether a run completes, not
/// what a completed run contains.
pub fn cache_key(
    unit: LengthUnit,
    elements: &[RawElement],
    rules: &[RuleTemplate],
    detection: &DetectionConfig,
    engine: &EngineConfig,
    costs: &CostBook,
    history: &SuccessHistory,
) -> Result<String> {
    let material = KeyMaterial {
        unit,
        elements,
        rules,
        detection,
        engine,
        costs,
        history,
    };
    let bytes = serde_json::to_vec(&material)?;
    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    Ok(hex::encode(hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use bimclash_core::{Category, Discipline};
    use bimclash_rules::RuleTable;

    fn key(elements: &[RawElement], detection: &DetectionConfig) -> String {
        cache_key(
            LengthUnit::Millimeter,
            elements,
            &RuleTable::builtin().to_records(),
            detection,
            &EngineConfig::default(),
            &CostBook::default(),
            &SuccessHistory::new(),
        )
        .unwrap()
    }

    #[test]
    fn key_is_stable_and_input_sensitive() {
        let elements = vec![RawElement::boxed(
            "a",
            Discipline::Structural,
            Category::Beam,
            [0.0; 3],
            [1.0; 3],
        )];
        let detection = DetectionConfig::default();
        let first = key(&elements, &detection);
        assert_eq!(first.len(), 64);
        assert_eq!(first, key(&elements, &detection));
        assert_ne!(first, key(&elements, &detection.clone().with_intra_discipline(true)));
        assert_ne!(first, key(&[], &detection));
    }

    #[test]
    fn in_memory_roundtrip() {
        let cache = InMemoryCache::new();
        assert!(cache.get("k").is_none());
        cache.put("k", "{}".into());
        assert_eq!(cache.get("k").as_deref(), Some("{}"));
        assert_eq!(cache.len(), 1);
    }
}
