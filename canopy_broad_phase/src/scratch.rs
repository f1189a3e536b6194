// Copyright 2025 the Canopy Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use canopy_index::ProxyId;

use crate::callback::Pair;

/// Private working memory of one pairing worker.
///
/// Each worker owns exactly one slot for the duration of a pass. Slots are
/// aligned to a cache line so that neighbouring workers never write to the
/// same line.
#[derive(Clone, Debug, Default)]
#[repr(C, align(64))]
pub struct WorkerScratch {
    pairs: Vec<Pair>,
    query_proxy: Option<ProxyId>,
}

impl WorkerScratch {
    pub(crate) fn with_capacity(capacity: usize) -> Self {
        Self {
            pairs: Vec::with_capacity(capacity),
            query_proxy: None,
        }
    }

    /// Candidate pairs gathered by the most recent pass, sorted, duplicates included.
    pub fn pairs(&self) -> &[Pair] {
        &self.pairs
    }

    /// The proxy this worker is currently querying for, if a pass is running.
    pub fn query_proxy(&self) -> Option<ProxyId> {
        self.query_proxy
    }

    pub(crate) fn begin(&mut self) {
        self.pairs.clear();
        self.query_proxy = None;
    }

    pub(crate) fn set_query_proxy(&mut self, id: Option<ProxyId>) {
        self.query_proxy = id;
    }

    /// Record a candidate found while querying for the current proxy.
    ///
    /// Returns `true` so it can be used directly as an index visitor.
    pub(crate) fn record(&mut self, found: ProxyId) -> bool {
        match self.query_proxy {
            Some(query) if query != found => self.pairs.push(Pair::new(query, found)),
            _ => {}
        }
        true
    }

    pub(crate) fn sort(&mut self) {
        self.pairs.sort_unstable();
    }
}
