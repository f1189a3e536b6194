// Copyright 2025 the Canopy Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Engine configuration.

use canopy_index::{Fattening, Scalar};

use crate::error::BroadPhaseError;

/// Upper bound on concurrent pairing workers, and so on scratch slots.
pub const MAX_WORKERS: usize = 16;

/// Construction parameters for a [`BroadPhase`](crate::BroadPhase).
///
/// `Default` yields the classic constants: a margin of `0.1`, a displacement
/// multiplier of `2`, a single worker, room for 16 buffered moves and 16 pairs.
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(
    feature = "serde",
    serde(
        default,
        bound(
            serialize = "T: serde::Serialize",
            deserialize = "T: Scalar + serde::Deserialize<'de>"
        )
    )
)]
pub struct BroadPhaseConfig<T> {
    /// How proxies are fattened by the index the engine builds.
    pub fattening: Fattening<T>,
    /// Number of worker scratch slots, in `1..=MAX_WORKERS`.
    pub workers: usize,
    /// Initial capacity of the move buffer.
    pub initial_move_capacity: usize,
    /// Initial capacity of every worker's pair buffer.
    pub initial_pair_capacity: usize,
}

impl<T: Scalar> Default for BroadPhaseConfig<T> {
    fn default() -> Self {
        Self {
            fattening: Fattening::default(),
            workers: 1,
            initial_move_capacity: 16,
            initial_pair_capacity: 16,
        }
    }
}

impl<T: Scalar> BroadPhaseConfig<T> {
    /// Check the configuration without building anything.
    pub fn validate(&self) -> Result<(), BroadPhaseError> {
        self.validate_workers()?;
        if !self.fattening.is_valid() {
            return Err(BroadPhaseError::InvalidFattening);
        }
        Ok(())
    }

    /// Check the worker count alone; a caller-built index owns its fattening.
    pub(crate) fn validate_workers(&self) -> Result<(), BroadPhaseError> {
        if (1..=MAX_WORKERS).contains(&self.workers) {
            Ok(())
        } else {
            Err(BroadPhaseError::InvalidWorkerCount(self.workers))
        }
    }

    /// Same configuration with `workers` scratch slots.
    #[must_use]
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }
}
