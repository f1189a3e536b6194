// Copyright 2025 the Canopy Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

// After you edit the crate's doc comment, run this command, then check README.md for any missing links
// cargo rdme --workspace-project=canopy_index --heading-base-level=0

//! Canopy Index: an incremental 2D spatial index over fat AABBs.
//!
//! Canopy Index is the storage layer of a broad phase. It keeps one *proxy* per
//! collidable object and answers overlap and ray queries against them.
//!
//! - Insert, move, and remove axis-aligned bounding boxes (AABBs) with user data.
//! - Boxes are stored *fattened*: grown by a margin, and stretched along the
//!   direction of travel when they move, so small motions leave the structure alone.
//! - Query by intersecting rectangle or by ray, through visitors that may stop early.
//! - Shift the world origin for large worlds, and inspect structural quality.
//!
//! It is generic over the scalar type `T` (`f32` or `f64`) and does not depend on any
//! geometry crate. Higher layers (like a broad phase) compute world-space AABBs and
//! feed them here through the [`SpatialIndex`] trait.
//!
//! Backends are pluggable via that trait so you can swap the spatial strategy without
//! API churn. The default backend is a dynamic AABB tree. Additional backends include a
//! uniform grid (feature `backend_grid`) and a flat vector (linear scan).
//!
//! ## Features
//!
//! - `backend_grid` *(default)*: enables a uniform grid backend backed by `hashbrown`.
//! - `kurbo`: conversions between [`Aabb2D<f64>`] / [`Vec2<f64>`] and `kurbo` types.
//! - `serde`: `Serialize`/`Deserialize` for [`Aabb2D`], [`Vec2`] and [`Fattening`].
//!
//! # Example
//!
//! ```rust
//! use canopy_index::{Aabb2D, DynamicTree, SpatialIndex, Vec2};
//!
//! let mut tree: DynamicTree<f32, u32> = DynamicTree::new();
//! let a = tree.insert(Aabb2D::new(0.0, 0.0, 1.0, 1.0), 1);
//! let _b = tree.insert(Aabb2D::new(0.5, 0.5, 1.5, 1.5), 2);
//!
//! // Moving within the fat AABB leaves the tree untouched.
//! assert!(!tree.move_proxy(a, Aabb2D::new(0.05, 0.0, 1.05, 1.0), Vec2::new(0.05, 0.0)));
//!
//! // Query a small box inside both proxies.
//! let mut hits = Vec::new();
//! tree.query(Aabb2D::new(0.9, 0.9, 1.0, 1.0), |id| {
//!     hits.push(tree.user_data(id).unwrap());
//!     true
//! });
//! hits.sort();
//! assert_eq!(hits, [1, 2]);
//! ```
//!
//! With the `backend_grid` feature enabled (default), you can also use a uniform grid backend:
//!
//! ```rust
//! # #[cfg(feature = "backend_grid")]
//! # {
//! use canopy_index::{Aabb2D, SpatialIndex, backends::GridF32};
//!
//! // Use a grid backend (f32) with a 16-unit cell size.
//! let mut grid: GridF32<u32> = GridF32::new(16.0);
//! let _k = grid.insert(Aabb2D::new(0.0, 0.0, 10.0, 10.0), 1);
//!
//! let mut count = 0;
//! grid.query(Aabb2D::new(5.0, 5.0, 5.0, 5.0), |_| {
//!     count += 1;
//!     true
//! });
//! assert_eq!(count, 1);
//! # }
//! ```
//!
//! ## Choosing a backend
//!
//! - `DynamicTree` (default): good general-purpose index when distribution is irregular and
//!   proxies move every step. Queries are `O(log n)` plus output size.
//! - `GridF32`/`GridF64` *(feature `backend_grid`)*: uniform grid with configurable
//!   cell size. A good fit when proxies are of similar size and roughly uniformly spread.
//! - `FlatVec`: simplest and smallest, linear scans. Good for very small sets and as a
//!   reference in tests.
//!
//! ### Float semantics
//!
//! This crate assumes no NaNs for coordinates. Debug builds assert that inserted and
//! moved boxes are valid. Perimeter metrics use widened accumulators to reduce precision
//! pitfalls.

#![no_std]

extern crate alloc;

pub mod backends;
mod index;
mod ray;
mod types;

pub use backends::DynamicTree;
pub use index::{Fattening, ProxyId, SpatialIndex};
pub use ray::RayCastInput;
pub use types::{Aabb2D, Scalar, ScalarAcc, Vec2};

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec::Vec;

    fn drive<I: SpatialIndex<f32, u32>>(mut index: I) {
        let a = index.insert(Aabb2D::new(0.0, 0.0, 1.0, 1.0), 1);
        let b = index.insert(Aabb2D::new(0.5, 0.5, 1.5, 1.5), 2);
        let c = index.insert(Aabb2D::new(10.0, 10.0, 11.0, 11.0), 3);
        assert_eq!(index.len(), 3);

        let mut hits = Vec::new();
        index.query(index.fat_aabb(a), |id| {
            hits.push(id);
            true
        });
        hits.sort_unstable();
        assert_eq!(hits, [a, b]);

        index.remove(b);
        assert_eq!(index.user_data(b), None);
        assert_eq!(index.user_data(c), Some(3));
        assert!(index.move_proxy(c, Aabb2D::new(0.0, 0.0, 1.0, 1.0), Vec2::new(-10.0, -10.0)));
        assert!(index.fat_aabb(c).contains(&Aabb2D::new(0.0, 0.0, 1.0, 1.0)));
        assert_eq!(index.len(), 2);
    }

    #[test]
    fn every_backend_honors_the_contract() {
        drive(DynamicTree::<f32, u32>::new());
        drive(backends::FlatVec::<f32, u32>::new());
        #[cfg(feature = "backend_grid")]
        drive(backends::GridF32::<u32>::new(4.0));
    }
}
