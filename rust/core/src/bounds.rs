// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Axis-aligned bounding boxes in model millimetres.

use serde::{Deserialize, Serialize};

/// Axis-aligned bounding box.
///
/// Coordinates are millimetres in the shared model coordinate system. A box
/// is only meaningful once [`BoundingBox::is_valid`] holds; the geometry
/// indexer never lets an invalid box into an element table.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    /// Minimum corner
    pub min: [f64; 3],
    /// Maximum corner
    pub max: [f64; 3],
}

impl BoundingBox {
    /// Create a box from its two corners.
    #[inline]
    pub const fn new(min: [f64; 3], max: [f64; 3]) -> Self {
        Self { min, max }
    }

    /// Create the empty accumulator used by [`BoundingBox::expand`].
    pub fn empty() -> Self {
        Self {
            min: [f64::MAX; 3],
            max: [f64::MIN; 3],
        }
    }

    /// Grow the box to include a point.
    #[inline]
    pub fn expand(&mut self, point: [f64; 3]) {
        for axis in 0..3 {
            self.min[axis] = self.min[axis].min(point[axis]);
            self.max[axis] = self.max[axis].max(point[axis]);
        }
    }

    /// All coordinates are finite.
    #[inline]
    pub fn is_finite(&self) -> bool {
        self.min.iter().chain(self.max.iter()).all(|v| v.is_finite())
    }

    /// First axis on which `min < max` does not hold, if any.
    pub fn degenerate_axis(&self) -> Option<usize> {
        (0..3).find(|&axis| !(self.min[axis] < self.max[axis]))
    }

    /// Finite and strictly positive extent on all three axes.
    #[inline]
    pub fn is_valid(&self) -> bool {
        self.is_finite() && self.degenerate_axis().is_none()
    }

    /// Extent along each axis.
    #[inline]
    pub fn dimensions(&self) -> [f64; 3] {
        [
            self.max[0] - self.min[0],
            self.max[1] - self.min[1],
            self.max[2] - self.min[2],
        ]
    }

    /// Volume in cubic millimetres.
    #[inline]
    pub fn volume(&self) -> f64 {
        let [dx, dy, dz] = self.dimensions();
        dx * dy * dz
    }

    /// Largest extent.
    #[inline]
    pub fn max_extent(&self) -> f64 {
        let [dx, dy, dz] = self.dimensions();
        dx.max(dy).max(dz)
    }

    /// Smallest extent.
    #[inline]
    pub fn min_extent(&self) -> f64 {
        let [dx, dy, dz] = self.dimensions();
        dx.min(dy).min(dz)
    }

    /// Centre point.
    #[inline]
    pub fn center(&self) -> [f64; 3] {
        [
            (self.min[0] + self.max[0]) / 2.0,
            (self.min[1] + self.max[1]) / 2.0,
            (self.min[2] + self.max[2]) / 2.0,
        ]
    }

    /// Box grown by `margin` on every side.
    #[inline]
    pub fn inflated(&self, margin: f64) -> Self {
        Self {
            min: [self.min[0] - margin, self.min[1] - margin, self.min[2] - margin],
            max: [self.max[0] + margin, self.max[1] + margin, self.max[2] + margin],
        }
    }

    /// Closed-interval overlap test (touching boxes overlap).
    #[inline]
    pub fn touches(&self, other: &Self) -> bool {
        (0..3).all(|axis| self.min[axis] <= other.max[axis] && other.min[axis] <= self.max[axis])
    }

    /// Intersection region, or `None` when the boxes are disjoint.
    ///
    /// Touching boxes yield a region with zero extent on at least one axis.
    pub fn intersection(&self, other: &Self) -> Option<Self> {
        if !self.touches(other) {
            return None;
        }
        let mut min = [0.0; 3];
        let mut max = [0.0; 3];
        for axis in 0..3 {
            min[axis] = self.min[axis].max(other.min[axis]);
            max[axis] = self.max[axis].min(other.max[axis]);
        }
        Some(Self { min, max })
    }

    /// Volume of the intersection region (zero for disjoint or touching boxes).
    pub fn overlap_volume(&self, other: &Self) -> f64 {
        self.intersection(other).map_or(0.0, |region| region.volume().max(0.0))
    }

    /// Euclidean distance between the closest points of two boxes.
    ///
    /// Zero when the boxes touch or overlap.
    pub fn gap(&self, other: &Self) -> f64 {
        let mut sum = 0.0;
        for axis in 0..3 {
            let d = (other.min[axis] - self.max[axis])
                .max(self.min[axis] - other.max[axis])
                .max(0.0);
            sum += d * d;
        }
        sum.sqrt()
    }

    /// Largest per-coordinate difference between the corners of two boxes.
    pub fn corner_deviation(&self, other: &Self) -> f64 {
        let mut deviation: f64 = 0.0;
        for axis in 0..3 {
            deviation = deviation
                .max((self.min[axis] - other.min[axis]).abs())
                .max((self.max[axis] - other.max[axis]).abs());
        }
        deviation
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn cube(min: f64, max: f64) -> BoundingBox {
        BoundingBox::new([min; 3], [max; 3])
    }

    #[test]
    fn overlap_volume_of_offset_cubes() {
        let a = cube(0.0, 10.0);
        let b = cube(5.0, 15.0);
        assert_relative_eq!(a.overlap_volume(&b), 125.0);
        assert_relative_eq!(b.overlap_volume(&a), 125.0);
    }

    #[test]
    fn touching_boxes_have_zero_volume_region() {
        let a = cube(0.0, 10.0);
        let b = BoundingBox::new([10.0, 0.0, 0.0], [20.0, 10.0, 10.0]);
        assert!(a.touches(&b));
        let region = a.intersection(&b).unwrap();
        assert_eq!(region.degenerate_axis(), Some(0));
        assert_eq!(a.overlap_volume(&b), 0.0);
        assert_eq!(a.gap(&b), 0.0);
    }

    #[test]
    fn gap_along_one_axis_and_diagonal() {
        let a = cube(0.0, 10.0);
        let b = BoundingBox::new([60.0, 0.0, 0.0], [70.0, 10.0, 10.0]);
        assert_relative_eq!(a.gap(&b), 50.0);

        let c = BoundingBox::new([13.0, 14.0, 0.0], [20.0, 20.0, 10.0]);
        assert_relative_eq!(a.gap(&c), 5.0);
    }

    #[test]
    fn validity_rejects_flat_and_nan_boxes() {
        assert!(cube(0.0, 1.0).is_valid());
        assert!(!BoundingBox::new([0.0, 0.0, 0.0], [1.0, 0.0, 1.0]).is_valid());
        assert!(!BoundingBox::new([f64::NAN, 0.0, 0.0], [1.0, 1.0, 1.0]).is_valid());
        assert!(!BoundingBox::empty().is_valid());
    }

    #[test]
    fn expand_accumulates_points() {
        let mut bounds = BoundingBox::empty();
        bounds.expand([1.0, -2.0, 3.0]);
        bounds.expand([-1.0, 2.0, 0.0]);
        assert_eq!(bounds.min, [-1.0, -2.0, 0.0]);
        assert_eq!(bounds.max, [1.0, 2.0, 3.0]);
    }

    #[test]
    fn corner_deviation_is_max_abs_difference() {
        let a = cube(0.0, 10.0);
        let b = BoundingBox::new([0.2, 0.0, -0.1], [10.0, 10.3, 10.0]);
        assert_relative_eq!(a.corner_deviation(&b), 0.3, epsilon = 1e-9);
    }
}
