// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Spatial index for candidate pair enumeration.
//!
//! A uniform hash grid: each element is registered in every cubic cell its
//! margin-inflated box overlaps. Two elements whose inflated boxes touch
//! always share at least one cell, so scanning cell buckets finds every such
//! pair. Each pair is emitted only from its *owner cell* (the componentwise
//! maximum of the two elements' lowest cells), which lies in both cell ranges
//! and is unique, so buckets can be scanned in parallel without a shared
//! visited set.
//!
//! Elements that would span more than `max_cells_per_element` cells are kept
//! out of the grid and tested against every other element instead.
//!
//! Enumeration polls a [`Checkpoint`] once per element row of a bucket and
//! charges every row of pairs it keeps, so a dense model can be stopped long
//! before its quadratic pair list is built.

use std::mem::size_of;

use bimclash_core::{BoundingBox, Checkpoint};
use rayon::prelude::*;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::table::ElementTable;

type Cell = (i64, i64, i64);

/// Default cap on the number of cells a single element may occupy.
pub const DEFAULT_MAX_CELLS: usize = 512;

/// Cell size used when no element is available to derive one from.
const FALLBACK_CELL_SIZE: f64 = 1000.0;

/// Accounted size of one candidate pair.
pub const PAIR_BYTES: usize = size_of::<(u32, u32)>();

/// Index build parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IndexConfig {
    /// Grid cell edge in millimetres; derived from element sizes when `None`
    #[serde(default)]
    pub cell_size: Option<f64>,
    /// Every box is inflated by this much (mm) before insertion
    #[serde(default)]
    pub margin: f64,
    #[serde(default = "default_max_cells")]
    pub max_cells_per_element: usize,
}

fn default_max_cells() -> usize {
    DEFAULT_MAX_CELLS
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            cell_size: None,
            margin: 0.0,
            max_cells_per_element: DEFAULT_MAX_CELLS,
        }
    }
}

impl IndexConfig {
    pub fn with_margin(mut self, margin: f64) -> Self {
        self.margin = margin;
        self
    }

    pub fn with_cell_size(mut self, cell_size: f64) -> Self {
        self.cell_size = Some(cell_size);
        self
    }

    fn validate(&self) -> Result<()> {
        if !self.margin.is_finite() || self.margin < 0.0 {
            return Err(Error::InvalidConfig(format!(
                "margin must be a non-negative finite length, got {}",
                self.margin
            )));
        }
        if let Some(size) = self.cell_size {
            if !size.is_finite() || size <= 0.0 {
                return Err(Error::InvalidConfig(format!(
                    "cell size must be a positive finite length, got {size}"
                )));
            }
        }
        if self.max_cells_per_element == 0 {
            return Err(Error::InvalidConfig(
                "max_cells_per_element must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

/// Summary of an index, for logs and run reports.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IndexStats {
    pub cell_size: f64,
    pub margin: f64,
    /// Occupied grid cells
    pub cells: usize,
    /// Total bucket entries across cells
    pub entries: usize,
    /// Elements kept out of the grid
    pub oversized: usize,
}

/// Outcome of one enumeration pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CandidatePairs {
    /// Slot pairs `(a, b)` with `a < b`, sorted ascending
    pub pairs: Vec<(u32, u32)>,
    /// `false` when the checkpoint stopped enumeration early
    pub complete: bool,
}

impl CandidatePairs {
    #[inline]
    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}

#[derive(Debug, Clone, Copy)]
struct CellRange {
    lo: Cell,
    hi: Cell,
}

impl CellRange {
    fn count(&self) -> u128 {
        let span = |lo: i64, hi: i64| (hi as i128 - lo as i128 + 1).max(0) as u128;
        span(self.lo.0, self.hi.0)
            .saturating_mul(span(self.lo.1, self.hi.1))
            .saturating_mul(span(self.lo.2, self.hi.2))
    }

    fn cells(&self) -> impl Iterator<Item = Cell> + '_ {
        (self.lo.0..=self.hi.0).flat_map(move |x| {
            (self.lo.1..=self.hi.1)
                .flat_map(move |y| (self.lo.2..=self.hi.2).map(move |z| (x, y, z)))
        })
    }
}

/// Uniform grid over the inflated element boxes of an [`ElementTable`].
#[derive(Debug)]
pub struct SpatialIndex {
    cell_size: f64,
    margin: f64,
    max_cells: usize,
    grid: FxHashMap<Cell, Vec<u32>>,
    boxes: Vec<BoundingBox>,
    ranges: Vec<CellRange>,
    oversized: Vec<u32>,
}

impl SpatialIndex {
    /// Build the index over every element of `table`.
    pub fn build(table: &ElementTable, config: &IndexConfig) -> Result<Self> {
        config.validate()?;

        let boxes: Vec<BoundingBox> = table
            .elements()
            .iter()
            .map(|element| element.bounds.inflated(config.margin))
            .collect();
        let cell_size = config.cell_size.unwrap_or_else(|| auto_cell_size(&boxes));

        let mut index = Self {
            cell_size,
            margin: config.margin,
            max_cells: config.max_cells_per_element,
            grid: FxHashMap::default(),
            ranges: Vec::with_capacity(boxes.len()),
            boxes: Vec::new(),
            oversized: Vec::new(),
        };

        for (slot, bounds) in boxes.iter().enumerate() {
            let range = index.cell_range(bounds);
            index.ranges.push(range);
            if range.count() > index.max_cells as u128 {
                index.oversized.push(slot as u32);
                continue;
            }
            for cell in range.cells() {
                index.grid.entry(cell).or_default().push(slot as u32);
            }
        }
        index.boxes = boxes;

        let stats = index.stats();
        tracing::debug!(
            cell_size = stats.cell_size,
            cells = stats.cells,
            entries = stats.entries,
            oversized = stats.oversized,
            "Spatial index built"
        );

        Ok(index)
    }

    #[inline]
    pub fn cell_size(&self) -> f64 {
        self.cell_size
    }

    #[inline]
    pub fn margin(&self) -> f64 {
        self.margin
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.boxes.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.boxes.is_empty()
    }

    /// Every slot pair `(a, b)` with `a < b` whose inflated boxes touch.
    ///
    /// When the checkpoint stops the pass, the pairs of fully scanned rows
    /// are kept and the result is flagged incomplete.
    pub fn candidate_pairs(&self, checkpoint: &impl Checkpoint) -> CandidatePairs {
        let buckets: Vec<(&Cell, &Vec<u32>)> = self.grid.iter().collect();

        let grid_pairs: Vec<(Vec<(u32, u32)>, bool)> = buckets
            .par_iter()
            .map(|&(cell, slots)| self.bucket_pairs(cell, slots, checkpoint))
            .collect();
        let oversized_pairs: Vec<(Vec<(u32, u32)>, bool)> = self
            .oversized
            .par_iter()
            .map(|&big| self.oversized_pairs(big, checkpoint))
            .collect();

        let mut complete = true;
        let mut pairs = Vec::new();
        for (rows, finished) in grid_pairs.into_iter().chain(oversized_pairs) {
            pairs.extend(rows);
            complete &= finished;
        }

        pairs.par_sort_unstable();
        pairs.dedup();
        CandidatePairs { pairs, complete }
    }

    /// Pairs owned by one bucket, and whether every row was scanned. A row
    /// whose charge is refused is dropped.
    fn bucket_pairs(&self, cell: &Cell, slots: &[u32], checkpoint: &impl Checkpoint) -> (Vec<(u32, u32)>, bool) {
        let mut local = Vec::new();
        for (i, &a) in slots.iter().enumerate() {
            if !checkpoint.proceed() {
                return (local, false);
            }
            let before = local.len();
            for &b in &slots[i + 1..] {
                if self.owner_cell(a, b) == *cell && self.boxes[a as usize].touches(&self.boxes[b as usize]) {
                    local.push(ordered(a, b));
                }
            }
            if !checkpoint.charge((local.len() - before) * PAIR_BYTES) {
                local.truncate(before);
                return (local, false);
            }
        }
        (local, true)
    }

    /// Oversized elements are tested against every slot; a pair of two
    /// oversized elements is emitted by the higher slot only.
    fn oversized_pairs(&self, big: u32, checkpoint: &impl Checkpoint) -> (Vec<(u32, u32)>, bool) {
        if !checkpoint.proceed() {
            return (Vec::new(), false);
        }
        let local: Vec<(u32, u32)> = (0..self.boxes.len() as u32)
            .filter(|&other| other != big && !(self.is_oversized(other) && other < big))
            .filter(|&other| self.boxes[big as usize].touches(&self.boxes[other as usize]))
            .map(|other| ordered(big, other))
            .collect();
        if checkpoint.charge(local.len() * PAIR_BYTES) {
            (local, true)
        } else {
            (Vec::new(), false)
        }
    }

    /// Slots whose inflated boxes touch `bounds`, sorted ascending.
    pub fn query(&self, bounds: &BoundingBox) -> Vec<u32> {
        let range = self.cell_range(bounds);
        let mut hits: Vec<u32> = if range.count() > self.max_cells as u128 {
            (0..self.boxes.len() as u32)
                .filter(|&slot| !self.is_oversized(slot))
                .filter(|&slot| self.boxes[slot as usize].touches(bounds))
                .collect()
        } else {
            range
                .cells()
                .filter_map(|cell| self.grid.get(&cell))
                .flatten()
                .copied()
                .filter(|&slot| self.boxes[slot as usize].touches(bounds))
                .collect()
        };
        hits.extend(
            self.oversized
                .iter()
                .copied()
                .filter(|&slot| self.boxes[slot as usize].touches(bounds)),
        );
        hits.sort_unstable();
        hits.dedup();
        hits
    }

    pub fn stats(&self) -> IndexStats {
        IndexStats {
            cell_size: self.cell_size,
            margin: self.margin,
            cells: self.grid.len(),
            entries: self.grid.values().map(Vec::len).sum(),
            oversized: self.oversized.len(),
        }
    }

    /// Rough heap footprint, for memory accounting.
    pub fn approx_bytes(&self) -> usize {
        let stats = self.stats();
        stats.cells * (std::mem::size_of::<(Cell, Vec<u32>)>() + 16)
            + stats.entries * std::mem::size_of::<u32>()
            + self.boxes.len()
                * (std::mem::size_of::<BoundingBox>() + std::mem::size_of::<CellRange>())
            + self.oversized.len() * std::mem::size_of::<u32>()
    }

    #[inline]
    fn cell_of(&self, x: f64, y: f64, z: f64) -> Cell {
        (
            (x / self.cell_size).floor() as i64,
            (y / self.cell_size).floor() as i64,
            (z / self.cell_size).floor() as i64,
        )
    }

    fn cell_range(&self, bounds: &BoundingBox) -> CellRange {
        CellRange {
            lo: self.cell_of(bounds.min[0], bounds.min[1], bounds.min[2]),
            hi: self.cell_of(bounds.max[0], bounds.max[1], bounds.max[2]),
        }
    }

    #[inline]
    fn owner_cell(&self, a: u32, b: u32) -> Cell {
        let (ra, rb) = (self.ranges[a as usize].lo, self.ranges[b as usize].lo);
        (ra.0.max(rb.0), ra.1.max(rb.1), ra.2.max(rb.2))
    }

    fn is_oversized(&self, slot: u32) -> bool {
        self.oversized.binary_search(&slot).is_ok()
    }
}

#[inline]
fn ordered(a: u32, b: u32) -> (u32, u32) {
    if a < b {
        (a, b)
    } else {
        (b, a)
    }
}

/// Mean of the largest box extents, never below one millimetre.
fn auto_cell_size(boxes: &[BoundingBox]) -> f64 {
    if boxes.is_empty() {
        return FALLBACK_CELL_SIZE;
    }
    let mean = boxes.iter().map(BoundingBox::max_extent).sum::<f64>() / boxes.len() as f64;
    if mean.is_finite() {
        mean.max(1.0)
    } else {
        FALLBACK_CELL_SIZE
    }
}
