// Copyright 2025 the Canopy Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The pairing engine.

use core::fmt;
use core::marker::PhantomData;
use core::ops::Range;
use std::thread;

use canopy_index::{
    Aabb2D, DynamicTree, ProxyId, RayCastInput, Scalar, ScalarAcc, SpatialIndex, Vec2,
};

use crate::callback::PairCallback;
use crate::config::BroadPhaseConfig;
use crate::error::BroadPhaseError;
use crate::move_buffer::MoveBuffer;
use crate::pass::PairPass;
use crate::scratch::WorkerScratch;

/// Broad-phase pairing engine over a [`SpatialIndex`].
///
/// Clients create one proxy per collidable object and move it every step. The
/// engine remembers which proxies moved and, on [`update_pairs`](Self::update_pairs),
/// reports each pair of proxies whose fat AABBs overlap and at least one of
/// which moved.
///
/// The index defaults to a [`DynamicTree`].
pub struct BroadPhase<T: Scalar, U: Copy, I: SpatialIndex<T, U> = DynamicTree<T, U>> {
    index: I,
    moves: MoveBuffer,
    scratch: Vec<WorkerScratch>,
    _marker: PhantomData<fn() -> (T, U)>,
}

impl<T: Scalar, U: Copy, I: SpatialIndex<T, U>> fmt::Debug for BroadPhase<T, U, I> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BroadPhase")
            .field("proxy_count", &self.index.len())
            .field("move_count", &self.moves.len())
            .field("workers", &self.scratch.len())
            .finish_non_exhaustive()
    }
}

impl<T: Scalar, U: Copy> Default for BroadPhase<T, U> {
    fn default() -> Self {
        Self::from_parts(DynamicTree::new(), &BroadPhaseConfig::default())
    }
}

impl<T: Scalar, U: Copy> BroadPhase<T, U> {
    /// Create an engine over a dynamic tree with the default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an engine over a dynamic tree fattened per `config`.
    ///
    /// Node storage is reserved for `config.initial_move_capacity` proxies.
    pub fn with_config(config: BroadPhaseConfig<T>) -> Result<Self, BroadPhaseError> {
        config.validate()?;
        let mut tree = DynamicTree::with_fattening(config.fattening);
        tree.reserve(config.initial_move_capacity);
        Ok(Self::from_parts(tree, &config))
    }
}

impl<T: Scalar, U: Copy, I: SpatialIndex<T, U>> BroadPhase<T, U, I> {
    /// Create an engine over a caller-built index.
    ///
    /// The index keeps the fattening parameters it was built with, so
    /// `config.fattening` is neither checked nor applied; configure the
    /// index itself (for example with `Grid::with_fattening`). Entries
    /// already in the index count as proxies but are not buffered as moved.
    pub fn with_index(index: I, config: BroadPhaseConfig<T>) -> Result<Self, BroadPhaseError> {
        config.validate_workers()?;
        Ok(Self::from_parts(index, &config))
    }

    fn from_parts(index: I, config: &BroadPhaseConfig<T>) -> Self {
        log::debug!(
            "broad phase created: {} worker slots, {} proxies",
            config.workers,
            index.len()
        );
        Self {
            index,
            moves: MoveBuffer::with_capacity(config.initial_move_capacity),
            scratch: (0..config.workers)
                .map(|_| WorkerScratch::with_capacity(config.initial_pair_capacity))
                .collect(),
            _marker: PhantomData,
        }
    }

    /// Create a proxy for `aabb` and buffer it as moved.
    ///
    /// No pairs are reported until the next pairing pass.
    pub fn create_proxy(&mut self, aabb: Aabb2D<T>, user_data: U) -> ProxyId {
        let id = self.index.insert(aabb, user_data);
        self.moves.push(id);
        id
    }

    /// Destroy a proxy, dropping it from the move buffer and the index.
    ///
    /// # Panics
    ///
    /// Panics if `id` is not live.
    pub fn destroy_proxy(&mut self, id: ProxyId) {
        self.moves.unbuffer(id);
        self.index.remove(id);
    }

    /// Move a proxy to `aabb`, having travelled by `displacement`, and buffer it.
    ///
    /// The proxy is buffered even when its fat AABB still contains `aabb`.
    /// Returns whether the stored fat AABB was replaced.
    ///
    /// # Panics
    ///
    /// Panics if `id` is not live.
    pub fn move_proxy(&mut self, id: ProxyId, aabb: Aabb2D<T>, displacement: Vec2<T>) -> bool {
        let enlarged = self.index.move_proxy(id, aabb, displacement);
        self.moves.push(id);
        enlarged
    }

    /// Buffer a proxy as moved without changing its bounds.
    ///
    /// # Panics
    ///
    /// Panics if `id` is not live.
    pub fn touch_proxy(&mut self, id: ProxyId) {
        assert!(
            self.index.user_data(id).is_some(),
            "proxy {id:?} is not live"
        );
        self.moves.push(id);
    }

    /// Run a single-worker pass over the whole move buffer, then clear it.
    ///
    /// Returns the number of distinct pairs handed to `callback`.
    pub fn update_pairs<C: PairCallback<U>>(&mut self, callback: &mut C) -> usize {
        let all = 0..self.moves.len();
        self.update_pairs_range(0, all, callback)
    }

    /// Run a pass over `range` of the move buffer using worker slot `worker`.
    ///
    /// The move buffer is cleared only when `range` covers all of it;
    /// otherwise call [`reset_move_buffer`](Self::reset_move_buffer) once
    /// every range has been processed.
    ///
    /// # Panics
    ///
    /// Panics if `worker` is not below [`workers`](Self::workers) or if
    /// `range` does not lie within the move buffer.
    pub fn update_pairs_range<C: PairCallback<U>>(
        &mut self,
        worker: usize,
        range: Range<usize>,
        callback: &mut C,
    ) -> usize {
        let full = range == (0..self.moves.len());
        let (pass, slots) = self.pair_pass();
        let slot_count = slots.len();
        let scratch = slots
            .get_mut(worker)
            .unwrap_or_else(|| panic!("worker slot {worker} is out of range for {slot_count} slots"));
        let reported = pass.update_pairs(scratch, range, callback);
        if full {
            self.moves.clear();
        }
        reported
    }

    /// Split the engine into a shared pass view and the worker slots.
    ///
    /// Hand each worker one slot and a disjoint range of
    /// `0..pass.move_count()`, then call
    /// [`reset_move_buffer`](Self::reset_move_buffer) when all are done.
    pub fn pair_pass(&mut self) -> (PairPass<'_, T, U, I>, &mut [WorkerScratch]) {
        (
            PairPass::new(&self.index, self.moves.as_slice()),
            &mut self.scratch,
        )
    }

    /// Partition the move buffer over `workers` scoped threads and run a pass.
    ///
    /// Each thread takes one worker slot and one contiguous range. The move
    /// buffer is reset afterwards. A pair whose proxies were buffered in
    /// different ranges can be reported by more than one thread. Returns the
    /// total number of pairs reported.
    ///
    /// # Panics
    ///
    /// Panics if `workers` is zero or exceeds [`workers`](Self::workers), and
    /// resumes any panic raised by a worker.
    pub fn update_pairs_parallel<C>(&mut self, workers: usize, callback: &C) -> usize
    where
        C: Fn(U, U) + Sync,
        I: Sync,
    {
        assert!(
            (1..=self.scratch.len()).contains(&workers),
            "{workers} workers requested but {} worker slots exist",
            self.scratch.len()
        );
        let (pass, slots) = self.pair_pass();
        let count = pass.move_count();
        let chunk = count.div_ceil(workers).max(1);
        let pass = &pass;

        let reported = thread::scope(|s| {
            let handles: Vec<_> = slots
                .iter_mut()
                .take(workers)
                .enumerate()
                .map(|(worker, scratch)| {
                    let range = (worker * chunk).min(count)..((worker + 1) * chunk).min(count);
                    s.spawn(move || {
                        log::trace!("worker {worker} pairing moves {range:?}");
                        let mut callback = callback;
                        pass.update_pairs(scratch, range, &mut callback)
                    })
                })
                .collect();
            handles
                .into_iter()
                .map(|handle| {
                    handle
                        .join()
                        .unwrap_or_else(|panic| std::panic::resume_unwind(panic))
                })
                .sum::<usize>()
        });

        self.reset_move_buffer();
        reported
    }

    /// Drop every buffered move.
    pub fn reset_move_buffer(&mut self) {
        log::debug!("move buffer reset, {} records dropped", self.moves.len());
        self.moves.clear();
    }

    /// Whether the fat AABBs of two live proxies overlap.
    pub fn test_overlap(&self, a: ProxyId, b: ProxyId) -> bool {
        self.index.fat_aabb(a).overlaps(&self.index.fat_aabb(b))
    }

    /// Visit every proxy whose fat AABB overlaps `aabb`; return `false` to stop.
    pub fn query<F: FnMut(ProxyId) -> bool>(&self, aabb: Aabb2D<T>, visitor: F) {
        self.index.query(aabb, visitor);
    }

    /// Cast a ray against the fat AABBs.
    ///
    /// The visitor returns the new maximum fraction: `0` terminates the cast,
    /// a positive value clips the ray, a negative value ignores the proxy.
    pub fn ray_cast<F: FnMut(&RayCastInput<T>, ProxyId) -> T>(
        &self,
        input: &RayCastInput<T>,
        visitor: F,
    ) {
        self.index.ray_cast(input, visitor);
    }

    /// The fat AABB stored for a live proxy.
    ///
    /// # Panics
    ///
    /// Panics if `id` is not live.
    pub fn fat_aabb(&self, id: ProxyId) -> Aabb2D<T> {
        self.index.fat_aabb(id)
    }

    /// User data of a proxy, or `None` if `id` is not live.
    pub fn user_data(&self, id: ProxyId) -> Option<U> {
        self.index.user_data(id)
    }

    /// Number of live proxies.
    pub fn proxy_count(&self) -> usize {
        self.index.len()
    }

    /// Number of records in the move buffer, tombstones included.
    pub fn move_count(&self) -> usize {
        self.moves.len()
    }

    /// Number of worker scratch slots.
    pub fn workers(&self) -> usize {
        self.scratch.len()
    }

    /// Height of the index structure.
    pub fn tree_height(&self) -> usize {
        self.index.height()
    }

    /// Largest height difference between siblings in the index structure.
    pub fn tree_balance(&self) -> usize {
        self.index.max_balance()
    }

    /// Ratio of summed node perimeters to the root perimeter.
    pub fn tree_quality(&self) -> ScalarAcc<T> {
        self.index.area_ratio()
    }

    /// Move the world origin; all stored geometry is translated by `-new_origin`.
    pub fn shift_origin(&mut self, new_origin: Vec2<T>) {
        log::debug!("shifting broad phase origin by {new_origin:?}");
        self.index.shift_origin(new_origin);
    }

    /// The underlying index.
    pub fn index(&self) -> &I {
        &self.index
    }
}

impl<T: Scalar, U: Copy> BroadPhase<T, U> {
    /// Rebuild the dynamic tree bottom-up from its current leaves.
    pub fn rebuild(&mut self) {
        self.index.rebuild_bottom_up();
    }
}
