// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Dense element table addressed by slot number.

use bimclash_core::{Element, ElementId};
use rustc_hash::FxHashMap;

use crate::error::{Error, Result};

/// Normalized elements stored contiguously, with an id lookup.
///
/// Slots are `u32` to keep index buckets compact.
#[derive(Debug, Clone, Default)]
pub struct ElementTable {
    elements: Vec<Element>,
    slots: FxHashMap<ElementId, u32>,
}

impl ElementTable {
    /// Build a table; ids must be unique.
    pub fn from_elements(elements: Vec<Element>) -> Result<Self> {
        let mut slots = FxHashMap::default();
        slots.reserve(elements.len());
        for (slot, element) in elements.iter().enumerate() {
            if slots.insert(element.id.clone(), slot as u32).is_some() {
                return Err(Error::DuplicateId(element.id.clone()));
            }
        }
        Ok(Self { elements, slots })
    }

    #[inline]
    pub fn get(&self, slot: u32) -> Option<&Element> {
        self.elements.get(slot as usize)
    }

    #[inline]
    pub fn slot_of(&self, id: &ElementId) -> Option<u32> {
        self.slots.get(id).copied()
    }

    pub fn by_id(&self, id: &ElementId) -> Option<&Element> {
        self.slot_of(id).and_then(|slot| self.get(slot))
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.elements.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (u32, &Element)> {
        self.elements.iter().enumerate().map(|(slot, e)| (slot as u32, e))
    }

    pub fn elements(&self) -> &[Element] {
        &self.elements
    }

    /// Rough heap footprint, for memory accounting.
    pub fn approx_bytes(&self) -> usize {
        let per_element = std::mem::size_of::<Element>() + 64;
        self.elements.len() * per_element
            + self.slots.len() * (std::mem::size_of::<(ElementId, u32)>() + 32)
    }
}
