// Copyright 2025 the Canopy Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Primitive geometry types and helpers.

use core::cmp::Ordering;
use core::fmt::Debug;

/// Axis-aligned bounding box in 2D.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Aabb2D<T> {
    /// Minimum x (left)
    pub min_x: T,
    /// Minimum y (bottom)
    pub min_y: T,
    /// Maximum x (right)
    pub max_x: T,
    /// Maximum y (top)
    pub max_y: T,
}

impl<T> Aabb2D<T> {
    /// Create a new AABB from min/max corners.
    #[inline(always)]
    pub const fn new(min_x: T, min_y: T, max_x: T, max_y: T) -> Self {
        Self {
            min_x,
            min_y,
            max_x,
            max_y,
        }
    }
}

impl<T: Copy + PartialOrd> Aabb2D<T> {
    /// Determines whether this AABB overlaps with another in any way.
    ///
    /// Note that the edge of the AABB is considered to be part of itself, meaning
    /// that two AABBs that share an edge are considered to overlap.
    ///
    /// # Examples
    ///
    /// ```
    /// use canopy_index::Aabb2D;
    ///
    /// let aabb1 = Aabb2D::new(0.0, 0.0, 10.0, 10.0);
    /// let aabb2 = Aabb2D::new(5.0, 5.0, 15.0, 15.0);
    /// assert!(aabb1.overlaps(&aabb2));
    ///
    /// let aabb1 = Aabb2D::new(0.0, 0.0, 10.0, 10.0);
    /// let aabb2 = Aabb2D::new(10.0, 0.0, 20.0, 10.0);
    /// assert!(aabb1.overlaps(&aabb2));
    ///
    /// let aabb1 = Aabb2D::new(0.0, 0.0, 10.0, 10.0);
    /// let aabb2 = Aabb2D::new(11.0, 0.0, 20.0, 10.0);
    /// assert!(!aabb1.overlaps(&aabb2));
    /// ```
    #[inline]
    pub fn overlaps(&self, other: &Self) -> bool {
        self.min_x <= other.max_x
            && self.max_x >= other.min_x
            && self.min_y <= other.max_y
            && self.max_y >= other.min_y
    }

    /// Whether `other` lies entirely inside this AABB (edges included).
    #[inline]
    pub fn contains(&self, other: &Self) -> bool {
        self.min_x <= other.min_x
            && self.min_y <= other.min_y
            && other.max_x <= self.max_x
            && other.max_y <= self.max_y
    }

    /// The smallest AABB enclosing two AABBs.
    #[inline]
    pub fn union(&self, other: Self) -> Self {
        Self {
            min_x: min_t(self.min_x, other.min_x),
            min_y: min_t(self.min_y, other.min_y),
            max_x: max_t(self.max_x, other.max_x),
            max_y: max_t(self.max_y, other.max_y),
        }
    }

    /// Whether the lower bound does not exceed the upper bound on both axes.
    ///
    /// Comparisons against NaN fail, so boxes with NaN coordinates are invalid.
    #[inline]
    pub fn is_valid(&self) -> bool {
        self.min_x <= self.max_x && self.min_y <= self.max_y
    }
}

impl<T: Scalar> Aabb2D<T> {
    /// Create an AABB from origin and size.
    #[inline]
    pub fn from_xywh(x: T, y: T, w: T, h: T) -> Self {
        Self {
            min_x: x,
            min_y: y,
            max_x: T::add(x, w),
            max_y: T::add(y, h),
        }
    }

    /// Center point.
    #[inline]
    pub fn center(&self) -> Vec2<T> {
        Vec2::new(T::mid(self.min_x, self.max_x), T::mid(self.min_y, self.max_y))
    }

    /// Half-widths along each axis.
    #[inline]
    pub fn extents(&self) -> Vec2<T> {
        Vec2::new(
            T::mid(T::zero(), T::sub(self.max_x, self.min_x)),
            T::mid(T::zero(), T::sub(self.max_y, self.min_y)),
        )
    }

    /// Perimeter of the AABB in the scalar's widened accumulator type.
    ///
    /// Inverted boxes contribute zero on the inverted axis.
    #[inline]
    pub fn perimeter(&self) -> T::Acc {
        let w = T::max(T::sub(self.max_x, self.min_x), T::zero());
        let h = T::max(T::sub(self.max_y, self.min_y), T::zero());
        let half = T::widen(w) + T::widen(h);
        half + half
    }

    /// Grow the box by `margin` on every side.
    #[inline]
    pub fn fattened(&self, margin: T) -> Self {
        Self {
            min_x: T::sub(self.min_x, margin),
            min_y: T::sub(self.min_y, margin),
            max_x: T::add(self.max_x, margin),
            max_y: T::add(self.max_y, margin),
        }
    }

    /// Stretch the box along `d`: negative components move the lower bound,
    /// positive components move the upper bound.
    #[inline]
    pub fn extended(&self, d: Vec2<T>) -> Self {
        let mut out = *self;
        if d.x < T::zero() {
            out.min_x = T::add(out.min_x, d.x);
        } else {
            out.max_x = T::add(out.max_x, d.x);
        }
        if d.y < T::zero() {
            out.min_y = T::add(out.min_y, d.y);
        } else {
            out.max_y = T::add(out.max_y, d.y);
        }
        out
    }

    /// The box moved by `-offset`.
    #[inline]
    pub fn shifted(&self, offset: Vec2<T>) -> Self {
        Self {
            min_x: T::sub(self.min_x, offset.x),
            min_y: T::sub(self.min_y, offset.y),
            max_x: T::sub(self.max_x, offset.x),
            max_y: T::sub(self.max_y, offset.y),
        }
    }
}

/// A 2D vector, used for displacements, ray end points and origin shifts.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Vec2<T> {
    /// x component
    pub x: T,
    /// y component
    pub y: T,
}

impl<T> Vec2<T> {
    /// Create a vector from its components.
    #[inline(always)]
    pub const fn new(x: T, y: T) -> Self {
        Self { x, y }
    }
}

impl<T: Scalar> Vec2<T> {
    /// The zero vector.
    #[inline]
    pub fn zero() -> Self {
        Self::new(T::zero(), T::zero())
    }

    /// Component-wise sum.
    #[inline]
    pub fn add(self, other: Self) -> Self {
        Self::new(T::add(self.x, other.x), T::add(self.y, other.y))
    }

    /// Component-wise difference `self - other`.
    #[inline]
    pub fn sub(self, other: Self) -> Self {
        Self::new(T::sub(self.x, other.x), T::sub(self.y, other.y))
    }

    /// Multiply both components by `s`.
    #[inline]
    pub fn scale(self, s: T) -> Self {
        Self::new(T::mul(self.x, s), T::mul(self.y, s))
    }

    /// Dot product.
    #[inline]
    pub fn dot(self, other: Self) -> T {
        T::add(T::mul(self.x, other.x), T::mul(self.y, other.y))
    }

    /// Component-wise absolute value.
    #[inline]
    pub fn abs(self) -> Self {
        Self::new(T::abs(self.x), T::abs(self.y))
    }

    /// The vector rotated a quarter turn counter-clockwise, `(-y, x)`.
    #[inline]
    pub fn perp(self) -> Self {
        Self::new(T::sub(T::zero(), self.y), self.x)
    }
}

/// Numeric scalar abstraction for 2D AABBs used by backends.
///
/// This trait provides the operations required for perimeter metrics, fattening
/// and ray casts, and an associated widened accumulator type for cost sums
/// (f32→f64).
pub trait Scalar: Copy + PartialOrd + Debug {
    /// Widened accumulator type suitable for perimeter/cost computations.
    type Acc: Copy
        + PartialOrd
        + core::ops::Add<Output = Self::Acc>
        + core::ops::Sub<Output = Self::Acc>
        + core::ops::Mul<Output = Self::Acc>
        + core::ops::Div<Output = Self::Acc>
        + Debug;

    /// Add two scalar values.
    fn add(a: Self, b: Self) -> Self;

    /// Subtract two scalar values: a - b.
    fn sub(a: Self, b: Self) -> Self;

    /// Multiply two scalar values.
    fn mul(a: Self, b: Self) -> Self;

    /// Absolute value.
    fn abs(v: Self) -> Self;

    /// Zero value for the scalar type.
    fn zero() -> Self;

    /// Max of the two scalar values.
    fn max(a: Self, b: Self) -> Self;

    /// Min of the two scalar values.
    fn min(a: Self, b: Self) -> Self;

    /// Midpoint between a and b.
    fn mid(a: Self, b: Self) -> Self;

    /// Convert an `f32` constant to the scalar type.
    fn from_f32(v: f32) -> Self;

    /// Convert a scalar to the accumulator type.
    fn widen(v: Self) -> Self::Acc;
}

impl Scalar for f32 {
    type Acc = f64;

    #[inline]
    fn add(a: Self, b: Self) -> Self {
        a + b
    }

    #[inline]
    fn sub(a: Self, b: Self) -> Self {
        a - b
    }

    #[inline]
    fn mul(a: Self, b: Self) -> Self {
        a * b
    }

    #[inline]
    fn abs(v: Self) -> Self {
        if v < 0.0 { -v } else { v }
    }

    #[inline(always)]
    fn zero() -> Self {
        0.0
    }

    #[inline]
    fn max(a: Self, b: Self) -> Self {
        Self::max(a, b)
    }

    #[inline]
    fn min(a: Self, b: Self) -> Self {
        Self::min(a, b)
    }

    #[inline]
    fn mid(a: Self, b: Self) -> Self {
        0.5 * (a + b)
    }

    #[inline(always)]
    fn from_f32(v: f32) -> Self {
        v
    }

    #[inline]
    fn widen(v: Self) -> Self::Acc {
        v as f64
    }
}

impl Scalar for f64 {
    type Acc = Self;

    #[inline]
    fn add(a: Self, b: Self) -> Self {
        a + b
    }

    #[inline]
    fn sub(a: Self, b: Self) -> Self {
        a - b
    }

    #[inline]
    fn mul(a: Self, b: Self) -> Self {
        a * b
    }

    #[inline]
    fn abs(v: Self) -> Self {
        if v < 0.0 { -v } else { v }
    }

    #[inline(always)]
    fn zero() -> Self {
        0.0
    }

    #[inline]
    fn max(a: Self, b: Self) -> Self {
        Self::max(a, b)
    }

    #[inline]
    fn min(a: Self, b: Self) -> Self {
        Self::min(a, b)
    }

    #[inline]
    fn mid(a: Self, b: Self) -> Self {
        0.5 * (a + b)
    }

    #[inline]
    fn from_f32(v: f32) -> Self {
        Self::from(v)
    }

    #[inline(always)]
    fn widen(v: Self) -> Self::Acc {
        v
    }
}

/// Helper alias for the widened accumulator type `Scalar::Acc` associated with a `T: Scalar`.
pub type ScalarAcc<T> = <T as Scalar>::Acc;

pub(crate) fn min_t<T: PartialOrd + Copy>(a: T, b: T) -> T {
    match a.partial_cmp(&b) {
        Some(Ordering::Greater) => b,
        _ => a,
    }
}

pub(crate) fn max_t<T: PartialOrd + Copy>(a: T, b: T) -> T {
    match a.partial_cmp(&b) {
        Some(Ordering::Less) => b,
        _ => a,
    }
}

#[cfg(feature = "kurbo")]
mod kurbo_interop {
    use super::{Aabb2D, Vec2};

    impl From<kurbo::Rect> for Aabb2D<f64> {
        fn from(r: kurbo::Rect) -> Self {
            let r = r.abs();
            Self::new(r.x0, r.y0, r.x1, r.y1)
        }
    }

    impl From<Aabb2D<f64>> for kurbo::Rect {
        fn from(a: Aabb2D<f64>) -> Self {
            Self::new(a.min_x, a.min_y, a.max_x, a.max_y)
        }
    }

    impl From<kurbo::Vec2> for Vec2<f64> {
        fn from(v: kurbo::Vec2) -> Self {
            Self::new(v.x, v.y)
        }
    }

    impl From<kurbo::Point> for Vec2<f64> {
        fn from(p: kurbo::Point) -> Self {
            Self::new(p.x, p.y)
        }
    }

    impl From<Vec2<f64>> for kurbo::Vec2 {
        fn from(v: Vec2<f64>) -> Self {
            Self::new(v.x, v.y)
        }
    }
}
