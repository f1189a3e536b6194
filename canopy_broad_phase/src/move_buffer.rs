// Copyright 2025 the Canopy Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use canopy_index::ProxyId;

/// Proxies that moved (or were created or touched) since the last full pass.
///
/// A proxy may appear more than once. Destroyed proxies leave a `None`
/// tombstone so that indices handed out to workers stay stable.
#[derive(Clone, Debug, Default)]
pub(crate) struct MoveBuffer {
    moves: Vec<Option<ProxyId>>,
}

impl MoveBuffer {
    pub(crate) fn with_capacity(capacity: usize) -> Self {
        Self {
            moves: Vec::with_capacity(capacity),
        }
    }

    pub(crate) fn push(&mut self, id: ProxyId) {
        self.moves.push(Some(id));
    }

    /// Tombstone every record of `id`.
    pub(crate) fn unbuffer(&mut self, id: ProxyId) {
        for record in &mut self.moves {
            if *record == Some(id) {
                *record = None;
            }
        }
    }

    pub(crate) fn clear(&mut self) {
        self.moves.clear();
    }

    pub(crate) fn len(&self) -> usize {
        self.moves.len()
    }

    pub(crate) fn as_slice(&self) -> &[Option<ProxyId>] {
        &self.moves
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use canopy_index::{Aabb2D, DynamicTree, SpatialIndex};

    #[test]
    fn unbuffer_tombstones_every_record() {
        let mut tree: DynamicTree<f32, ()> = DynamicTree::new();
        let a = tree.insert(Aabb2D::new(0.0, 0.0, 1.0, 1.0), ());
        let b = tree.insert(Aabb2D::new(2.0, 0.0, 3.0, 1.0), ());

        let mut buffer = MoveBuffer::with_capacity(4);
        buffer.push(a);
        buffer.push(b);
        buffer.push(a);
        buffer.unbuffer(a);
        assert_eq!(buffer.as_slice(), [None, Some(b), None]);
        assert_eq!(buffer.len(), 3);

        buffer.clear();
        assert_eq!(buffer.len(), 0);
    }
}
