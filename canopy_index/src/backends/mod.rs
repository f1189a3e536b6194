// Copyright 2025 the Canopy Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Backend implementations of [`SpatialIndex`][crate::SpatialIndex].
//!
//! - `tree`: dynamic AABB tree with perimeter-cost insertion and rotations (aliases: `DynamicTreeF32`, `DynamicTreeF64`).
//! - `flatvec`: flat vector with linear scans (small, simple, a reference for tests).
//! - `grid` (feature `backend_grid`): uniform grid with configurable cell size.
//!
//! Insertion cost note
//! -------------------
//! The tree chooses where to attach a new leaf by walking down from the root and
//! comparing, at each branch, the cost of pairing the leaf with the whole branch
//!
//! `cost = 2 * perimeter(branch ∪ leaf)`
//!
//! against the cheapest cost of descending into either child, which includes the
//! growth inherited by every ancestor. Perimeter is used instead of area so that
//! thin boxes are not treated as free. Accumulators are widened (`f32`→`f64`)
//! for robust comparisons.

pub(crate) mod flatvec;
#[cfg(feature = "backend_grid")]
pub(crate) mod grid;
pub(crate) mod tree;

pub use flatvec::FlatVec;
#[cfg(feature = "backend_grid")]
pub use grid::{Grid, GridF32, GridF64, GridScalar};
pub use tree::{DynamicTree, DynamicTreeF32, DynamicTreeF64};
