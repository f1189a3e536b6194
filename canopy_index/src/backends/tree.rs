// Copyright 2025 the Canopy Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Dynamic AABB tree: an incrementally balanced binary hierarchy over fat AABBs.
//!
//! Leaves hold proxies; branches hold the union of their two children. Inserting
//! a leaf descends towards the sibling that minimizes the growth in total
//! perimeter, and every ancestor on the way back up is rebalanced with a single
//! rotation when its children's heights differ by more than one. Proxies are
//! stored with a fat AABB (see [`Fattening`]) so that small motions do not touch
//! the structure at all.

use alloc::vec::Vec;
use core::fmt::Debug;

use smallvec::SmallVec;

use crate::index::{Fattening, ProxyId, SpatialIndex};
use crate::ray::{RayCastInput, RaySegment, RayStep};
use crate::types::{Aabb2D, Scalar, ScalarAcc, Vec2};

/// Dynamic AABB tree backend.
///
/// Proxy handles are leaf node indices; node storage is recycled through a free
/// list, so handles are reused after removal.
pub struct DynamicTree<T: Scalar, U: Copy> {
    root: Option<NodeIdx>,
    nodes: Vec<Node<T, U>>,
    free_list: Vec<NodeIdx>,
    leaf_count: usize,
    fattening: Fattening<T>,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
struct NodeIdx(usize);

impl NodeIdx {
    fn of(id: ProxyId) -> Self {
        Self(id.index())
    }

    fn proxy(self) -> ProxyId {
        ProxyId::new(self.0)
    }
}

#[derive(Clone, Debug)]
struct Node<T, U> {
    aabb: Aabb2D<T>,
    parent: Option<NodeIdx>,
    // Leaves are height 0.
    height: u32,
    kind: NodeKind<U>,
}

#[derive(Copy, Clone, Debug)]
enum NodeKind<U> {
    Free,
    Leaf(U),
    Branch(NodeIdx, NodeIdx),
}

// Traversal stack; trees deeper than this spill to the heap.
type Stack = SmallVec<[NodeIdx; 64]>;

impl<T: Scalar, U: Copy> Debug for DynamicTree<T, U> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("DynamicTree")
            .field("leaves", &self.leaf_count)
            .field("nodes", &(self.nodes.len() - self.free_list.len()))
            .field("capacity", &self.nodes.len())
            .field("height", &self.height())
            .field("fattening", &self.fattening)
            .finish_non_exhaustive()
    }
}

impl<T: Scalar, U: Copy> Default for DynamicTree<T, U> {
    fn default() -> Self {
        Self::with_fattening(Fattening::default())
    }
}

impl<T: Scalar, U: Copy> DynamicTree<T, U> {
    /// Create an empty tree with the default fattening parameters.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty tree that fattens proxies with `fattening`.
    pub fn with_fattening(fattening: Fattening<T>) -> Self {
        Self {
            root: None,
            nodes: Vec::new(),
            free_list: Vec::new(),
            leaf_count: 0,
            fattening,
        }
    }

    /// The fattening parameters in use.
    pub fn fattening(&self) -> Fattening<T> {
        self.fattening
    }

    /// Reserve node storage for at least `proxies` additional proxies.
    pub fn reserve(&mut self, proxies: usize) {
        // A full binary tree with n leaves has 2n - 1 nodes.
        self.nodes.reserve(proxies.saturating_mul(2));
    }

    fn node(&self, i: NodeIdx) -> &Node<T, U> {
        &self.nodes[i.0]
    }

    fn node_mut(&mut self, i: NodeIdx) -> &mut Node<T, U> {
        &mut self.nodes[i.0]
    }

    fn children(&self, i: NodeIdx) -> Option<(NodeIdx, NodeIdx)> {
        match self.node(i).kind {
            NodeKind::Branch(c1, c2) => Some((c1, c2)),
            _ => None,
        }
    }

    fn branch_children(&self, i: NodeIdx) -> (NodeIdx, NodeIdx) {
        self.children(i)
            .expect("tree invariant violated: expected a branch node")
    }

    fn leaf(&self, id: ProxyId) -> NodeIdx {
        let i = NodeIdx::of(id);
        assert!(
            matches!(self.nodes.get(i.0).map(|n| n.kind), Some(NodeKind::Leaf(_))),
            "proxy {id:?} is not live"
        );
        i
    }

    fn allocate(&mut self, node: Node<T, U>) -> NodeIdx {
        if let Some(i) = self.free_list.pop() {
            self.nodes[i.0] = node;
            i
        } else {
            // Checked here so that every node index is representable as a proxy id.
            let i = NodeIdx::of(ProxyId::new(self.nodes.len()));
            self.nodes.push(node);
            i
        }
    }

    fn free(&mut self, i: NodeIdx) {
        let node = self.node_mut(i);
        node.kind = NodeKind::Free;
        node.parent = None;
        node.height = 0;
        self.free_list.push(i);
    }

    fn replace_child(&mut self, parent: NodeIdx, old: NodeIdx, new: NodeIdx) {
        let (c1, c2) = self.branch_children(parent);
        self.node_mut(parent).kind = if c1 == old {
            NodeKind::Branch(new, c2)
        } else {
            debug_assert!(c2 == old, "tree invariant violated: child not under parent");
            NodeKind::Branch(c1, new)
        };
    }

    // Recompute a branch's bounds and height from its children.
    fn refit(&mut self, i: NodeIdx) {
        let (c1, c2) = self.branch_children(i);
        let (a, b) = (self.node(c1), self.node(c2));
        let aabb = a.aabb.union(b.aabb);
        let height = 1 + a.height.max(b.height);
        let node = self.node_mut(i);
        node.aabb = aabb;
        node.height = height;
    }

    fn refit_ancestors(&mut self, start: Option<NodeIdx>) {
        let mut cursor = start;
        while let Some(i) = cursor {
            let i = self.balance(i);
            self.refit(i);
            cursor = self.node(i).parent;
        }
    }

    // Cost of pushing a leaf with `aabb` into the subtree at `child`.
    fn descend_cost(&self, child: NodeIdx, aabb: &Aabb2D<T>) -> ScalarAcc<T> {
        let node = self.node(child);
        let grown = node.aabb.union(*aabb).perimeter();
        match node.kind {
            NodeKind::Leaf(_) => grown,
            _ => grown - node.aabb.perimeter(),
        }
    }

    fn insert_leaf(&mut self, leaf: NodeIdx) {
        let Some(root) = self.root else {
            self.root = Some(leaf);
            self.node_mut(leaf).parent = None;
            return;
        };

        let leaf_aabb = self.node(leaf).aabb;
        let mut index = root;
        while let Some((c1, c2)) = self.children(index) {
            let aabb = self.node(index).aabb;
            let area = aabb.perimeter();
            let combined = aabb.union(leaf_aabb).perimeter();

            // Cost of creating a new parent for this node and the new leaf.
            let cost = combined + combined;
            // Minimum cost of pushing the leaf further down the tree.
            let inheritance = (combined - area) + (combined - area);

            let cost1 = self.descend_cost(c1, &leaf_aabb) + inheritance;
            let cost2 = self.descend_cost(c2, &leaf_aabb) + inheritance;

            if cost < cost1 && cost < cost2 {
                break;
            }
            index = if cost1 < cost2 { c1 } else { c2 };
        }

        let sibling = index;
        let old_parent = self.node(sibling).parent;
        let (sibling_aabb, sibling_height) = {
            let n = self.node(sibling);
            (n.aabb, n.height)
        };
        let new_parent = self.allocate(Node {
            aabb: leaf_aabb.union(sibling_aabb),
            parent: old_parent,
            height: sibling_height + 1,
            kind: NodeKind::Branch(sibling, leaf),
        });
        self.node_mut(sibling).parent = Some(new_parent);
        self.node_mut(leaf).parent = Some(new_parent);
        match old_parent {
            Some(p) => self.replace_child(p, sibling, new_parent),
            None => self.root = Some(new_parent),
        }

        self.refit_ancestors(Some(new_parent));
    }

    fn remove_leaf(&mut self, leaf: NodeIdx) {
        if self.root == Some(leaf) {
            self.root = None;
            return;
        }

        let parent = self
            .node(leaf)
            .parent
            .expect("tree invariant violated: non-root leaf without parent");
        let grand_parent = self.node(parent).parent;
        let (c1, c2) = self.branch_children(parent);
        let sibling = if c1 == leaf { c2 } else { c1 };

        self.node_mut(leaf).parent = None;
        self.node_mut(sibling).parent = grand_parent;
        match grand_parent {
            Some(g) => {
                self.replace_child(g, parent, sibling);
                self.free(parent);
                self.refit_ancestors(Some(g));
            }
            None => {
                self.root = Some(sibling);
                self.free(parent);
            }
        }
    }

    // Perform a left or right rotation if node `a` is imbalanced.
    // Returns the index of the subtree root after balancing.
    fn balance(&mut self, a: NodeIdx) -> NodeIdx {
        let Some((b, c)) = self.children(a) else {
            return a;
        };
        if self.node(a).height < 2 {
            return a;
        }
        let hb = i64::from(self.node(b).height);
        let hc = i64::from(self.node(c).height);
        match hc - hb {
            balance if balance > 1 => self.rotate_up(a, c, b, true),
            balance if balance < -1 => self.rotate_up(a, b, c, false),
            _ => a,
        }
    }

    // Lift `pivot` (a child of `a`) into `a`'s place. `a` keeps `kept` and
    // adopts the shorter of the pivot's children; the pivot keeps the taller.
    fn rotate_up(
        &mut self,
        a: NodeIdx,
        pivot: NodeIdx,
        kept: NodeIdx,
        pivot_was_second: bool,
    ) -> NodeIdx {
        let (f, g) = self.branch_children(pivot);
        let (tall, short) = if self.node(f).height > self.node(g).height {
            (f, g)
        } else {
            (g, f)
        };

        let a_parent = self.node(a).parent;
        self.node_mut(pivot).kind = NodeKind::Branch(a, tall);
        self.node_mut(pivot).parent = a_parent;
        self.node_mut(a).parent = Some(pivot);
        match a_parent {
            Some(p) => self.replace_child(p, a, pivot),
            None => self.root = Some(pivot),
        }

        self.node_mut(a).kind = if pivot_was_second {
            NodeKind::Branch(kept, short)
        } else {
            NodeKind::Branch(short, kept)
        };
        self.node_mut(short).parent = Some(a);

        self.refit(a);
        self.refit(pivot);
        pivot
    }

    /// Rebuild an optimal tree from the current leaves.
    ///
    /// This greedily pairs the two subtrees whose union has the smallest
    /// perimeter. It is expensive (cubic in the number of leaves) and meant for
    /// tooling and tests rather than per-step use. Proxy handles are preserved.
    pub fn rebuild_bottom_up(&mut self) {
        let mut roots: Vec<NodeIdx> = Vec::with_capacity(self.leaf_count);
        for i in 0..self.nodes.len() {
            let idx = NodeIdx(i);
            match self.node(idx).kind {
                NodeKind::Leaf(_) => {
                    self.node_mut(idx).parent = None;
                    roots.push(idx);
                }
                NodeKind::Branch(..) => self.free(idx),
                NodeKind::Free => {}
            }
        }

        while roots.len() > 1 {
            let mut best: Option<(ScalarAcc<T>, usize, usize)> = None;
            for i in 0..roots.len() {
                let ai = self.node(roots[i]).aabb;
                for j in (i + 1)..roots.len() {
                    let cost = ai.union(self.node(roots[j]).aabb).perimeter();
                    if best.is_none_or(|(c, ..)| cost < c) {
                        best = Some((cost, i, j));
                    }
                }
            }
            let (_, i, j) = best.expect("at least two roots remain");
            let (c1, c2) = (roots[i], roots[j]);
            let seed = self.node(c1).aabb;
            let parent = self.allocate(Node {
                aabb: seed,
                parent: None,
                height: 0,
                kind: NodeKind::Branch(c1, c2),
            });
            self.refit(parent);
            self.node_mut(c1).parent = Some(parent);
            self.node_mut(c2).parent = Some(parent);
            roots[i] = parent;
            roots.swap_remove(j);
        }

        self.root = roots.first().copied();
        log::debug!(
            "rebuilt dynamic tree: {} leaves, height {}",
            self.leaf_count,
            self.height()
        );
    }

    /// Check the structural invariants of the tree, panicking on the first violation.
    ///
    /// Verifies parent links, heights, enclosing bounds and node accounting.
    pub fn validate(&self) {
        let mut reachable = 0_usize;
        let mut leaves = 0_usize;
        if let Some(root) = self.root {
            assert!(
                self.node(root).parent.is_none(),
                "tree invariant violated: root has a parent"
            );
            let mut stack = Stack::new();
            stack.push(root);
            while let Some(i) = stack.pop() {
                reachable += 1;
                let node = self.node(i);
                match node.kind {
                    NodeKind::Free => panic!("tree invariant violated: free node {i:?} is reachable"),
                    NodeKind::Leaf(_) => {
                        leaves += 1;
                        assert!(node.height == 0, "tree invariant violated: leaf height");
                    }
                    NodeKind::Branch(c1, c2) => {
                        let (a, b) = (self.node(c1), self.node(c2));
                        assert!(
                            a.parent == Some(i) && b.parent == Some(i),
                            "tree invariant violated: broken parent link under {i:?}"
                        );
                        assert!(
                            node.height == 1 + a.height.max(b.height),
                            "tree invariant violated: stale height at {i:?}"
                        );
                        assert!(
                            node.aabb == a.aabb.union(b.aabb),
                            "tree invariant violated: stale bounds at {i:?}"
                        );
                        stack.push(c1);
                        stack.push(c2);
                    }
                }
            }
        }
        assert_eq!(leaves, self.leaf_count, "tree invariant violated: leaf count");
        assert_eq!(
            reachable + self.free_list.len(),
            self.nodes.len(),
            "tree invariant violated: leaked nodes"
        );
    }
}

impl<T: Scalar, U: Copy> SpatialIndex<T, U> for DynamicTree<T, U> {
    fn insert(&mut self, aabb: Aabb2D<T>, user_data: U) -> ProxyId {
        debug_assert!(aabb.is_valid(), "invalid AABB: {aabb:?}");
        let leaf = self.allocate(Node {
            aabb: self.fattening.fat_aabb(&aabb),
            parent: None,
            height: 0,
            kind: NodeKind::Leaf(user_data),
        });
        self.insert_leaf(leaf);
        self.leaf_count += 1;
        leaf.proxy()
    }

    fn remove(&mut self, id: ProxyId) {
        let leaf = self.leaf(id);
        self.remove_leaf(leaf);
        self.free(leaf);
        self.leaf_count -= 1;
    }

    fn move_proxy(&mut self, id: ProxyId, aabb: Aabb2D<T>, displacement: Vec2<T>) -> bool {
        debug_assert!(aabb.is_valid(), "invalid AABB: {aabb:?}");
        let leaf = self.leaf(id);
        if self.node(leaf).aabb.contains(&aabb) {
            return false;
        }
        self.remove_leaf(leaf);
        self.node_mut(leaf).aabb = self.fattening.predicted_aabb(&aabb, displacement);
        self.insert_leaf(leaf);
        true
    }

    fn fat_aabb(&self, id: ProxyId) -> Aabb2D<T> {
        self.node(self.leaf(id)).aabb
    }

    fn user_data(&self, id: ProxyId) -> Option<U> {
        match self.nodes.get(id.index())?.kind {
            NodeKind::Leaf(u) => Some(u),
            _ => None,
        }
    }

    fn query<F: FnMut(ProxyId) -> bool>(&self, aabb: Aabb2D<T>, mut visitor: F) {
        let mut stack = Stack::new();
        stack.extend(self.root);
        while let Some(i) = stack.pop() {
            let node = self.node(i);
            if !node.aabb.overlaps(&aabb) {
                continue;
            }
            match node.kind {
                NodeKind::Leaf(_) => {
                    if !visitor(i.proxy()) {
                        return;
                    }
                }
                NodeKind::Branch(c1, c2) => {
                    stack.push(c1);
                    stack.push(c2);
                }
                NodeKind::Free => unreachable!("tree invariant violated: free node reachable"),
            }
        }
    }

    fn ray_cast<F: FnMut(&RayCastInput<T>, ProxyId) -> T>(
        &self,
        input: &RayCastInput<T>,
        mut visitor: F,
    ) {
        let mut segment = RaySegment::new(input);
        let mut stack = Stack::new();
        stack.extend(self.root);
        while let Some(i) = stack.pop() {
            let node = self.node(i);
            if segment.misses(&node.aabb) {
                continue;
            }
            match node.kind {
                NodeKind::Leaf(_) => {
                    let value = visitor(segment.input(), i.proxy());
                    if segment.apply(value) == RayStep::Stop {
                        return;
                    }
                }
                NodeKind::Branch(c1, c2) => {
                    stack.push(c1);
                    stack.push(c2);
                }
                NodeKind::Free => unreachable!("tree invariant violated: free node reachable"),
            }
        }
    }

    fn shift_origin(&mut self, new_origin: Vec2<T>) {
        for node in &mut self.nodes {
            if !matches!(node.kind, NodeKind::Free) {
                node.aabb = node.aabb.shifted(new_origin);
            }
        }
    }

    fn len(&self) -> usize {
        self.leaf_count
    }

    fn height(&self) -> usize {
        self.root.map_or(0, |r| self.node(r).height as usize)
    }

    fn max_balance(&self) -> usize {
        self.nodes
            .iter()
            .filter_map(|n| match n.kind {
                NodeKind::Branch(c1, c2) => {
                    Some(self.node(c1).height.abs_diff(self.node(c2).height) as usize)
                }
                _ => None,
            })
            .max()
            .unwrap_or(0)
    }

    fn area_ratio(&self) -> ScalarAcc<T> {
        let zero = T::widen(T::zero());
        let Some(root) = self.root else {
            return zero;
        };
        let root_area = self.node(root).aabb.perimeter();
        if root_area <= zero {
            return zero;
        }
        let total = self
            .nodes
            .iter()
            .filter(|n| !matches!(n.kind, NodeKind::Free))
            .fold(zero, |acc, n| acc + n.aabb.perimeter());
        total / root_area
    }
}

/// Dynamic tree over `f32` coordinates.
pub type DynamicTreeF32<U> = DynamicTree<f32, U>;
/// Dynamic tree over `f64` coordinates.
pub type DynamicTreeF64<U> = DynamicTree<f64, U>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::FlatVec;
    use alloc::vec;
    use alloc::vec::Vec;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn unit_box(x: f32, y: f32) -> Aabb2D<f32> {
        Aabb2D::new(x, y, x + 1.0, y + 1.0)
    }

    fn collect_query<I: SpatialIndex<f32, u32>>(index: &I, aabb: Aabb2D<f32>) -> Vec<u32> {
        let mut out = Vec::new();
        index.query(aabb, |id| {
            out.push(index.user_data(id).unwrap());
            true
        });
        out.sort_unstable();
        out
    }

    #[test]
    fn insert_query_remove() {
        let mut tree: DynamicTreeF32<u32> = DynamicTree::new();
        let a = tree.insert(unit_box(0.0, 0.0), 1);
        let b = tree.insert(unit_box(5.0, 5.0), 2);
        let _c = tree.insert(unit_box(0.5, 0.5), 3);
        tree.validate();
        assert_eq!(tree.len(), 3);

        assert_eq!(collect_query(&tree, unit_box(0.2, 0.2)), vec![1, 3]);
        assert_eq!(collect_query(&tree, unit_box(5.5, 5.5)), vec![2]);

        tree.remove(a);
        tree.validate();
        assert_eq!(tree.user_data(a), None);
        assert_eq!(tree.user_data(b), Some(2));
        assert_eq!(collect_query(&tree, unit_box(0.2, 0.2)), vec![3]);
    }

    #[test]
    fn stored_boxes_are_fattened() {
        let mut tree: DynamicTreeF32<u32> = DynamicTree::with_fattening(Fattening {
            margin: 0.5,
            displacement_multiplier: 2.0,
        });
        let id = tree.insert(unit_box(0.0, 0.0), 7);
        assert_eq!(tree.fat_aabb(id), Aabb2D::new(-0.5, -0.5, 1.5, 1.5));
    }

    #[test]
    fn move_within_fat_box_is_a_no_op() {
        let mut tree: DynamicTreeF32<u32> = DynamicTree::new();
        let id = tree.insert(unit_box(0.0, 0.0), 1);
        let before = tree.fat_aabb(id);
        assert!(!tree.move_proxy(id, unit_box(0.05, 0.05), Vec2::new(0.05, 0.05)));
        assert_eq!(tree.fat_aabb(id), before);
    }

    #[test]
    fn move_outside_fat_box_predicts_displacement() {
        let mut tree: DynamicTreeF32<u32> = DynamicTree::with_fattening(Fattening {
            margin: 0.0,
            displacement_multiplier: 2.0,
        });
        let id = tree.insert(unit_box(0.0, 0.0), 1);
        let _other = tree.insert(unit_box(10.0, 0.0), 2);
        assert!(tree.move_proxy(id, unit_box(1.0, 0.0), Vec2::new(1.0, 0.0)));
        assert_eq!(tree.fat_aabb(id), Aabb2D::new(1.0, 0.0, 4.0, 1.0));
        tree.validate();
    }

    #[test]
    #[should_panic(expected = "is not live")]
    fn double_remove_panics() {
        let mut tree: DynamicTreeF32<u32> = DynamicTree::new();
        let id = tree.insert(unit_box(0.0, 0.0), 1);
        tree.remove(id);
        tree.remove(id);
    }

    #[test]
    fn query_halts_when_visitor_returns_false() {
        let mut tree: DynamicTreeF32<u32> = DynamicTree::new();
        for i in 0..16 {
            tree.insert(unit_box(0.0, 0.0), i);
        }
        let mut seen = 0;
        tree.query(unit_box(0.0, 0.0), |_| {
            seen += 1;
            seen < 3
        });
        assert_eq!(seen, 3);
    }

    #[test]
    fn ray_cast_reports_hits_and_clips() {
        let mut tree: DynamicTreeF32<u32> = DynamicTree::with_fattening(Fattening {
            margin: 0.0,
            displacement_multiplier: 0.0,
        });
        let near = tree.insert(Aabb2D::new(2.0, -1.0, 3.0, 1.0), 1);
        let _far = tree.insert(Aabb2D::new(6.0, -1.0, 7.0, 1.0), 2);
        let _off = tree.insert(Aabb2D::new(2.0, 5.0, 3.0, 6.0), 3);

        let input = RayCastInput::new(Vec2::new(0.0, 0.0), Vec2::new(10.0, 0.0));

        let mut hits = Vec::new();
        tree.ray_cast(&input, |sub, id| {
            hits.push(tree.user_data(id).unwrap());
            sub.max_fraction
        });
        hits.sort_unstable();
        assert_eq!(hits, vec![1, 2]);

        // Clipping at the near box hides the far one, whatever the visit order.
        let mut hits = Vec::new();
        tree.ray_cast(&input, |_, id| {
            hits.push(id);
            if id == near { 0.2 } else { -1.0 }
        });
        assert!(hits.contains(&near));
        assert!(hits.len() <= 2);

        // Returning zero stops the cast at the first hit.
        let mut count = 0;
        tree.ray_cast(&input, |_, _| {
            count += 1;
            0.0
        });
        assert_eq!(count, 1);
    }

    #[test]
    fn shift_origin_translates_everything() {
        let mut tree: DynamicTreeF64<u32> = DynamicTree::new();
        let id = tree.insert(Aabb2D::new(100.0, 100.0, 101.0, 101.0), 1);
        let before = tree.fat_aabb(id);
        tree.shift_origin(Vec2::new(100.0, 100.0));
        tree.validate();
        assert_eq!(tree.fat_aabb(id), before.shifted(Vec2::new(100.0, 100.0)));
        let mut hits = 0;
        tree.query(Aabb2D::new(0.5, 0.5, 0.6, 0.6), |_| {
            hits += 1;
            true
        });
        assert_eq!(hits, 1);
    }

    #[test]
    fn stays_balanced_under_sorted_inserts() {
        let mut tree: DynamicTreeF32<u32> = DynamicTree::new();
        for i in 0..1024_u16 {
            tree.insert(unit_box(f32::from(i) * 2.0, 0.0), u32::from(i));
        }
        tree.validate();
        assert!(tree.max_balance() <= 1, "balance {}", tree.max_balance());
        // A balanced binary tree over 1024 leaves has height 10.
        assert!(tree.height() <= 20, "height {}", tree.height());
        assert!(tree.area_ratio() >= 1.0);
    }

    #[test]
    fn empty_tree_metrics() {
        let tree: DynamicTreeF32<u32> = DynamicTree::new();
        assert!(tree.is_empty());
        assert_eq!(tree.height(), 0);
        assert_eq!(tree.max_balance(), 0);
        assert_eq!(tree.area_ratio(), 0.0);
        tree.validate();
    }

    #[test]
    fn rebuild_preserves_proxies() {
        let mut tree: DynamicTreeF32<u32> = DynamicTree::new();
        let ids: Vec<_> = (0..40_u16)
            .map(|i| tree.insert(unit_box(f32::from(i % 7) * 3.0, f32::from(i / 7) * 3.0), u32::from(i)))
            .collect();
        tree.rebuild_bottom_up();
        tree.validate();
        for (i, id) in ids.iter().enumerate() {
            assert_eq!(tree.user_data(*id), Some(u32::try_from(i).unwrap()));
        }
        assert_eq!(collect_query(&tree, unit_box(3.0, 3.0)).len(), 1);
    }

    #[test]
    fn randomized_operations_match_flat_reference() {
        let mut rng = StdRng::seed_from_u64(0x5eed);
        let fattening = Fattening {
            margin: 0.25_f32,
            displacement_multiplier: 2.0,
        };
        let mut tree: DynamicTreeF32<u32> = DynamicTree::with_fattening(fattening);
        let mut flat: FlatVec<f32, u32> = FlatVec::with_fattening(fattening);
        // (tree id, flat id, user data)
        let mut live: Vec<(ProxyId, ProxyId, u32)> = Vec::new();
        let mut next = 0_u32;

        let random_box = |rng: &mut StdRng| -> Aabb2D<f32> {
            let x = rng.gen_range(-50.0..50.0);
            let y = rng.gen_range(-50.0..50.0);
            let w = rng.gen_range(0.1..4.0);
            let h = rng.gen_range(0.1..4.0);
            Aabb2D::new(x, y, x + w, y + h)
        };

        for step in 0..2000 {
            match rng.gen_range(0..10) {
                0..=3 => {
                    let aabb = random_box(&mut rng);
                    live.push((tree.insert(aabb, next), flat.insert(aabb, next), next));
                    next += 1;
                }
                4..=5 if !live.is_empty() => {
                    let (t, f, _) = live.swap_remove(rng.gen_range(0..live.len()));
                    tree.remove(t);
                    flat.remove(f);
                }
                _ if !live.is_empty() => {
                    let (t, f, _) = live[rng.gen_range(0..live.len())];
                    let old = tree.fat_aabb(t);
                    let d = Vec2::new(rng.gen_range(-2.0..2.0), rng.gen_range(-2.0..2.0));
                    let aabb = Aabb2D::new(
                        old.min_x + 0.25 + d.x,
                        old.min_y + 0.25 + d.y,
                        old.max_x - 0.25 + d.x,
                        old.max_y - 0.25 + d.y,
                    );
                    let moved_tree = tree.move_proxy(t, aabb, d);
                    let moved_flat = flat.move_proxy(f, aabb, d);
                    assert_eq!(moved_tree, moved_flat);
                    assert_eq!(tree.fat_aabb(t), flat.fat_aabb(f));
                }
                _ => {}
            }

            if step % 100 == 0 {
                tree.validate();
                let q = random_box(&mut rng);
                assert_eq!(collect_query(&tree, q), collect_query(&flat, q));
            }
        }
        tree.validate();
        assert_eq!(tree.len(), live.len());
        assert_eq!(flat.len(), live.len());
    }
}
