// Copyright 2025 the Canopy Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

// After you edit the crate's doc comment, run this command, then check README.md for any missing links
// cargo rdme --workspace-project=canopy_broad_phase --heading-base-level=0

//! Canopy Broad Phase: find the pairs of moving objects whose bounds overlap.
//!
//! A physics step usually starts by narrowing the `n²` possible object pairs down
//! to the few whose bounding boxes actually overlap. This crate keeps one *proxy*
//! per object in a [`canopy_index`] spatial index and tracks which proxies moved.
//! A pairing pass queries the index only for moved proxies, sorts the candidates,
//! drops duplicates and self pairs, and hands each distinct pair to a callback.
//!
//! - Proxies are stored with fattened AABBs, so small motions stay cheap.
//! - Passes may be split over several workers, each owning a cache-line aligned
//!   [`WorkerScratch`] slot and a disjoint range of the move buffer.
//! - Destroyed proxies are tombstoned in the move buffer and never reported.
//!
//! # Example
//!
//! ```rust
//! use canopy_broad_phase::BroadPhase;
//! use canopy_index::{Aabb2D, Vec2};
//!
//! const BALL: u32 = 1;
//! const WALL: u32 = 2;
//!
//! let mut broad_phase: BroadPhase<f32, u32> = BroadPhase::new();
//! let ball = broad_phase.create_proxy(Aabb2D::new(0.0, 0.0, 1.0, 1.0), BALL);
//! let _wall = broad_phase.create_proxy(Aabb2D::new(0.5, 0.5, 1.5, 1.5), WALL);
//!
//! let mut pairs = Vec::new();
//! broad_phase.update_pairs(&mut |a: u32, b: u32| pairs.push((a.min(b), a.max(b))));
//! assert_eq!(pairs, [(BALL, WALL)]);
//!
//! // Moves are buffered; the next pass reports the pair again.
//! broad_phase.move_proxy(ball, Aabb2D::new(0.1, 0.0, 1.1, 1.0), Vec2::new(0.1, 0.0));
//! assert_eq!(broad_phase.update_pairs(&mut |_: u32, _: u32| {}), 1);
//! ```
//!
//! # Splitting a pass
//!
//! ```rust
//! use canopy_broad_phase::{BroadPhase, BroadPhaseConfig};
//! use canopy_index::Aabb2D;
//!
//! let config = BroadPhaseConfig::default().with_workers(2);
//! let mut broad_phase: BroadPhase<f32, u32> = BroadPhase::with_config(config).unwrap();
//! for i in 0..8 {
//!     broad_phase.create_proxy(Aabb2D::from_xywh(i as f32 * 0.5, 0.0, 1.0, 1.0), i);
//! }
//!
//! let (pass, slots) = broad_phase.pair_pass();
//! let half = pass.move_count() / 2;
//! let mut count = 0;
//! pass.update_pairs(&mut slots[0], 0..half, &mut |_: u32, _: u32| count += 1);
//! pass.update_pairs(&mut slots[1], half..pass.move_count(), &mut |_: u32, _: u32| count += 1);
//! broad_phase.reset_move_buffer();
//! assert!(count >= 7);
//! ```
//!
//! ## Features
//!
//! - `backend_grid` *(default)*: forwards to `canopy_index/backend_grid`.
//! - `serde`: `Serialize`/`Deserialize` for [`BroadPhaseConfig`].

mod broad_phase;
mod callback;
mod config;
mod error;
mod move_buffer;
mod pass;
mod scratch;

pub use broad_phase::BroadPhase;
pub use callback::{Pair, PairCallback};
pub use config::{BroadPhaseConfig, MAX_WORKERS};
pub use error::BroadPhaseError;
pub use pass::PairPass;
pub use scratch::WorkerScratch;
