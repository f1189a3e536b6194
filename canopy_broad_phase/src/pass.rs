// Copyright 2025 the Canopy Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! A read-only view of the engine for running pairing work.

use core::fmt;
use core::marker::PhantomData;
use core::ops::Range;

use canopy_index::{ProxyId, Scalar, SpatialIndex};

use crate::callback::{Pair, PairCallback};
use crate::scratch::WorkerScratch;

/// Shared view of a [`BroadPhase`](crate::BroadPhase) during a pairing pass.
///
/// Obtained from [`BroadPhase::pair_pass`](crate::BroadPhase::pair_pass)
/// together with the worker slots. The view is `Sync` whenever the index is,
/// so several workers can run [`update_pairs`](Self::update_pairs) on
/// disjoint ranges at once, each with its own slot. The engine stays borrowed
/// for as long as the view lives, so proxies cannot be created, moved or
/// destroyed mid-pass.
pub struct PairPass<'a, T, U, I> {
    index: &'a I,
    moves: &'a [Option<ProxyId>],
    _marker: PhantomData<fn() -> (T, U)>,
}

impl<T, U, I> fmt::Debug for PairPass<'_, T, U, I> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PairPass")
            .field("move_count", &self.moves.len())
            .finish_non_exhaustive()
    }
}

impl<'a, T: Scalar, U: Copy, I: SpatialIndex<T, U>> PairPass<'a, T, U, I> {
    pub(crate) fn new(index: &'a I, moves: &'a [Option<ProxyId>]) -> Self {
        Self {
            index,
            moves,
            _marker: PhantomData,
        }
    }

    /// Number of records in the move buffer, tombstones included.
    pub fn move_count(&self) -> usize {
        self.moves.len()
    }

    /// Find and report the pairs of the moved proxies in `range`.
    ///
    /// Every live proxy recorded in `moves[range]` is queried against the
    /// index with its fat AABB. The resulting candidates are sorted and each
    /// distinct pair is handed to `callback` once, as the user data of the
    /// lower handle followed by that of the higher. Returns the number of
    /// pairs reported.
    ///
    /// # Panics
    ///
    /// Panics if `range` does not lie within the move buffer.
    pub fn update_pairs<C: PairCallback<U>>(
        &self,
        scratch: &mut WorkerScratch,
        range: Range<usize>,
        callback: &mut C,
    ) -> usize {
        assert!(
            range.start <= range.end && range.end <= self.moves.len(),
            "pair range {range:?} is outside the move buffer of {} records",
            self.moves.len()
        );

        scratch.begin();
        for record in &self.moves[range.clone()] {
            // Destroyed since it was buffered.
            let Some(id) = *record else {
                continue;
            };
            scratch.set_query_proxy(Some(id));
            self.index
                .query(self.index.fat_aabb(id), |found| scratch.record(found));
        }
        scratch.set_query_proxy(None);
        scratch.sort();

        let mut reported = 0_usize;
        let mut previous: Option<Pair> = None;
        for &pair in scratch.pairs() {
            if previous == Some(pair) {
                continue;
            }
            previous = Some(pair);
            callback.add_pair(self.live_user_data(pair.a), self.live_user_data(pair.b));
            reported += 1;
        }

        log::trace!(
            "pairing pass over moves {range:?}: {} candidates, {reported} pairs",
            scratch.pairs().len()
        );
        reported
    }

    fn live_user_data(&self, id: ProxyId) -> U {
        self.index
            .user_data(id)
            .expect("paired proxies stay live for the whole pass")
    }
}
