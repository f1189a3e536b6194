// Copyright 2025 the Canopy Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Pair reporting.

use canopy_index::ProxyId;

/// Receiver for the distinct overlapping pairs found by a pairing pass.
///
/// Implemented for every `FnMut(U, U)`, so closures work directly. Each
/// call carries the user data of the two proxies, lower handle first.
pub trait PairCallback<U> {
    /// Report one overlapping pair.
    fn add_pair(&mut self, user_a: U, user_b: U);
}

impl<U, F: FnMut(U, U)> PairCallback<U> for F {
    #[inline]
    fn add_pair(&mut self, user_a: U, user_b: U) {
        self(user_a, user_b);
    }
}

/// Two proxies whose fat AABBs overlap, stored with `a < b`.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Pair {
    /// Lower handle.
    pub a: ProxyId,
    /// Higher handle.
    pub b: ProxyId,
}

impl Pair {
    /// Canonical pair for two distinct proxies, in either order.
    #[inline]
    pub fn new(x: ProxyId, y: ProxyId) -> Self {
        debug_assert_ne!(x, y, "a proxy never pairs with itself");
        Self {
            a: x.min(y),
            b: x.max(y),
        }
    }
}
