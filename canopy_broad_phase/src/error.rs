// Copyright 2025 the Canopy Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use thiserror::Error;

use crate::config::MAX_WORKERS;

/// Reasons a [`BroadPhaseConfig`](crate::BroadPhaseConfig) is rejected.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
pub enum BroadPhaseError {
    /// The worker count must lie in `1..=MAX_WORKERS`.
    #[error("worker count {0} is outside 1..={max}", max = MAX_WORKERS)]
    InvalidWorkerCount(usize),
    /// Fattening parameters must be finite and non-negative.
    #[error("fattening margin and displacement multiplier must be finite and non-negative")]
    InvalidFattening,
}
