// Copyright 2025 the Canopy Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Ray-cast input and the segment culling shared by all backends.

use crate::types::{Aabb2D, Scalar, Vec2};

/// Ray-cast input data.
///
/// The ray extends from `p1` to `p1 + max_fraction * (p2 - p1)`.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct RayCastInput<T> {
    /// Start point.
    pub p1: Vec2<T>,
    /// Point the fraction is measured against.
    pub p2: Vec2<T>,
    /// Portion of `p1 → p2` to cast along.
    pub max_fraction: T,
}

impl<T: Scalar> RayCastInput<T> {
    /// Create an input covering the full segment `p1 → p2`.
    pub fn new(p1: Vec2<T>, p2: Vec2<T>) -> Self {
        Self {
            p1,
            p2,
            max_fraction: T::from_f32(1.0),
        }
    }

    /// The point at `fraction` along `p1 → p2`.
    pub fn point_at(&self, fraction: T) -> Vec2<T> {
        self.p1.add(self.p2.sub(self.p1).scale(fraction))
    }
}

/// What a backend should do after handing a candidate to the ray visitor.
#[derive(Copy, Clone, Debug, PartialEq)]
pub(crate) enum RayStep {
    Continue,
    Stop,
}

/// Per-cast state: the (possibly clipped) segment and the separating axis.
///
/// The axis is left unnormalized; both sides of the separation test scale by
/// the same length so the sign is unaffected.
#[derive(Copy, Clone, Debug)]
pub(crate) struct RaySegment<T> {
    input: RayCastInput<T>,
    axis: Vec2<T>,
    abs_axis: Vec2<T>,
    bounds: Aabb2D<T>,
}

impl<T: Scalar> RaySegment<T> {
    pub(crate) fn new(input: &RayCastInput<T>) -> Self {
        let r = input.p2.sub(input.p1);
        assert!(
            r.dot(r) > T::zero(),
            "ray cast requires distinct end points"
        );
        let axis = r.perp();
        let mut segment = Self {
            input: *input,
            axis,
            abs_axis: axis.abs(),
            bounds: Aabb2D::new(input.p1.x, input.p1.y, input.p1.x, input.p1.y),
        };
        segment.clip(input.max_fraction);
        segment
    }

    /// Current bounding box of the remaining segment.
    pub(crate) fn bounds(&self) -> Aabb2D<T> {
        self.bounds
    }

    /// The input handed to the visitor for the next candidate.
    pub(crate) fn input(&self) -> &RayCastInput<T> {
        &self.input
    }

    /// Whether the segment can be proven to miss `aabb`.
    pub(crate) fn misses(&self, aabb: &Aabb2D<T>) -> bool {
        if !aabb.overlaps(&self.bounds) {
            return true;
        }
        // |dot(v, p1 - c)| - dot(|v|, h) > 0 means the line separates the box.
        let c = aabb.center();
        let h = aabb.extents();
        let separation = T::sub(
            T::abs(self.axis.dot(self.input.p1.sub(c))),
            self.abs_axis.dot(h),
        );
        separation > T::zero()
    }

    /// Apply the value returned by a ray visitor.
    pub(crate) fn apply(&mut self, value: T) -> RayStep {
        if value == T::zero() {
            return RayStep::Stop;
        }
        if value > T::zero() {
            self.clip(value);
        }
        RayStep::Continue
    }

    fn clip(&mut self, max_fraction: T) {
        self.input.max_fraction = max_fraction;
        let t = self.input.point_at(max_fraction);
        let p1 = self.input.p1;
        self.bounds = Aabb2D::new(
            T::min(p1.x, t.x),
            T::min(p1.y, t.y),
            T::max(p1.x, t.x),
            T::max(p1.y, t.y),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn misses_boxes_off_the_line() {
        let input = RayCastInput::new(Vec2::new(0.0_f32, 0.0), Vec2::new(10.0, 10.0));
        let seg = RaySegment::new(&input);
        // Inside the segment bounds but clear of the diagonal.
        assert!(seg.misses(&Aabb2D::new(7.0, 0.0, 9.0, 2.0)));
        // Straddles the diagonal.
        assert!(!seg.misses(&Aabb2D::new(4.0, 4.0, 6.0, 6.0)));
        // Beyond the end of the segment.
        assert!(seg.misses(&Aabb2D::new(11.0, 11.0, 12.0, 12.0)));
    }

    #[test]
    fn apply_clips_and_stops() {
        let input = RayCastInput::new(Vec2::new(0.0_f64, 0.0), Vec2::new(10.0, 0.0));
        let mut seg = RaySegment::new(&input);
        let far = Aabb2D::new(8.0, -1.0, 9.0, 1.0);
        assert!(!seg.misses(&far));

        assert_eq!(seg.apply(0.5), RayStep::Continue);
        assert_eq!(seg.input().max_fraction, 0.5);
        assert!(seg.misses(&far));

        // Negative values leave the segment untouched.
        assert_eq!(seg.apply(-1.0), RayStep::Continue);
        assert_eq!(seg.bounds(), Aabb2D::new(0.0, 0.0, 5.0, 0.0));

        assert_eq!(seg.apply(0.0), RayStep::Stop);
    }

    #[test]
    fn point_at_interpolates() {
        let input = RayCastInput::new(Vec2::new(1.0_f32, 2.0), Vec2::new(3.0, 6.0));
        assert_eq!(input.point_at(0.5), Vec2::new(2.0, 4.0));
    }
}
