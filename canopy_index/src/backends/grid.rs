// Copyright 2025 the Canopy Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Uniform grid backend for 2D fat AABBs.
//!
//! This backend buckets fat AABBs into fixed-size grid cells and answers
//! queries by touching only the cells overlapping the query primitive. It is
//! intended for workloads with:
//! - moderately uniform spatial density (e.g., particles, tiles, crowds),
//! - proxies that are small compared to the cell size, and
//! - query boxes and rays that are short compared to the full world extent.

use core::fmt::Debug;

use alloc::vec::Vec;

use hashbrown::{HashMap, HashSet};
use smallvec::SmallVec;

use crate::index::{Fattening, ProxyId, Slots, SpatialIndex};
use crate::ray::{RayCastInput, RaySegment, RayStep};
use crate::types::{Aabb2D, Scalar, Vec2};

/// Scalar types supported by the grid backend.
///
/// This is kept separate from [`Scalar`] so that the grid implementation can
/// use type-specific logic for mapping coordinates to cells.
pub trait GridScalar: Scalar {
    /// Map a scalar coordinate to a grid coordinate along one axis.
    ///
    /// The mapping is based on an origin and uniform cell size. Implementations
    /// are expected to be monotonic in `value` for fixed `origin` and
    /// `cell_size`.
    fn cell_coord(value: Self, origin: Self, cell_size: Self) -> i32;
}

impl GridScalar for f32 {
    #[allow(
        clippy::cast_possible_truncation,
        reason = "Grid cell indices are intentionally i32; out-of-range values are saturated."
    )]
    #[inline]
    fn cell_coord(value: Self, origin: Self, cell_size: Self) -> i32 {
        debug_assert!(
            cell_size > 0.0,
            "grid cell_size must be strictly positive (f32)"
        );
        let t = (value - origin) / cell_size;
        let coord = t as i32;

        // Round towards -∞ (the cast above has already truncated).
        if t < 0.0 && (coord as Self) > t {
            coord.saturating_sub(1)
        } else {
            coord
        }
    }
}

impl GridScalar for f64 {
    #[allow(
        clippy::cast_possible_truncation,
        reason = "Grid cell indices are intentionally i32; out-of-range values are saturated."
    )]
    #[inline]
    fn cell_coord(value: Self, origin: Self, cell_size: Self) -> i32 {
        debug_assert!(
            cell_size > 0.0,
            "grid cell_size must be strictly positive (f64)"
        );
        let t = (value - origin) / cell_size;
        let coord = t as i32;

        // Round towards -∞ (the cast above has already truncated).
        if t < 0.0 && (coord as Self) > t {
            coord.saturating_sub(1)
        } else {
            coord
        }
    }
}

type CellKey = (i32, i32);
type CellList = SmallVec<[CellKey; 4]>;

/// Boxes covering more cells than this are kept out of the cell map.
const MAX_COVERED_CELLS: i64 = 64;

/// Uniform grid backend with fixed cell size.
///
/// # Performance
///
/// Proxies should be small relative to `cell_size`. A proxy whose fat AABB
/// covers more than 64 cells is kept in an oversized list that every query
/// scans, and a query box covering more than 64 cells scans every proxy.
/// Neither case allocates per covered cell.
pub struct Grid<T: GridScalar, U: Copy> {
    layout: Layout<T>,
    cells: HashMap<CellKey, Cell>,
    // Proxies too large to register cell by cell.
    oversized: Vec<ProxyId>,
    slots: Slots<SlotEntry<T, U>>,
    fattening: Fattening<T>,
}

#[derive(Copy, Clone, Debug)]
struct Layout<T> {
    cell_size: T,
    origin_x: T,
    origin_y: T,
}

#[derive(Clone, Debug)]
struct SlotEntry<T, U> {
    aabb: Aabb2D<T>,
    user_data: U,
    // Cells currently containing this AABB, or `None` when oversized.
    cells: Option<CellList>,
}

#[derive(Default)]
struct Cell {
    slots: SmallVec<[ProxyId; 8]>,
}

impl<T: GridScalar, U: Copy> Debug for Grid<T, U> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Grid")
            .field("cell_size", &self.layout.cell_size)
            .field("origin_x", &self.layout.origin_x)
            .field("origin_y", &self.layout.origin_y)
            .field("live_slots", &self.slots.len())
            .field("cells", &self.cells.len())
            .field("oversized", &self.oversized.len())
            .field("fattening", &self.fattening)
            .finish_non_exhaustive()
    }
}

impl<T: GridScalar> Layout<T> {
    fn cell_range(&self, min: T, max: T, origin: T) -> (i32, i32) {
        let c0 = T::cell_coord(min, origin, self.cell_size);
        let c1 = T::cell_coord(max, origin, self.cell_size);
        if c0 <= c1 { (c0, c1) } else { (c1, c0) }
    }

    fn cell_bounds(&self, aabb: &Aabb2D<T>) -> ((i32, i32), (i32, i32)) {
        (
            self.cell_range(aabb.min_x, aabb.max_x, self.origin_x),
            self.cell_range(aabb.min_y, aabb.max_y, self.origin_y),
        )
    }

    fn cell_count(&self, aabb: &Aabb2D<T>) -> i64 {
        let ((ix0, ix1), (iy0, iy1)) = self.cell_bounds(aabb);
        (i64::from(ix1) - i64::from(ix0) + 1).saturating_mul(i64::from(iy1) - i64::from(iy0) + 1)
    }

    fn is_oversized(&self, aabb: &Aabb2D<T>) -> bool {
        self.cell_count(aabb) > MAX_COVERED_CELLS
    }

    fn covered_cells(&self, aabb: &Aabb2D<T>) -> Option<CellList> {
        if self.is_oversized(aabb) {
            return None;
        }
        let ((ix0, ix1), (iy0, iy1)) = self.cell_bounds(aabb);
        let mut out = CellList::new();
        for ix in ix0..=ix1 {
            for iy in iy0..=iy1 {
                out.push((ix, iy));
            }
        }
        Some(out)
    }
}

impl<T: GridScalar, U: Copy> Grid<T, U> {
    /// Create a new grid backend with the given cell size and origin at (0, 0).
    pub fn new(cell_size: T) -> Self {
        Self::with_origin(cell_size, T::zero(), T::zero())
    }

    /// Create a new grid backend with the given cell size and origin.
    pub fn with_origin(cell_size: T, origin_x: T, origin_y: T) -> Self {
        debug_assert!(cell_size > T::zero(), "cell_size must be strictly positive");
        Self {
            layout: Layout {
                cell_size,
                origin_x,
                origin_y,
            },
            cells: HashMap::new(),
            oversized: Vec::new(),
            slots: Slots::default(),
            fattening: Fattening::default(),
        }
    }

    /// Replace the fattening parameters used for subsequent inserts and moves.
    pub fn with_fattening(mut self, fattening: Fattening<T>) -> Self {
        self.fattening = fattening;
        self
    }

    fn link(
        cells: &mut HashMap<CellKey, Cell>,
        oversized: &mut Vec<ProxyId>,
        id: ProxyId,
        covered: Option<&CellList>,
    ) {
        let Some(keys) = covered else {
            oversized.push(id);
            return;
        };
        for key in keys {
            cells.entry(*key).or_default().slots.push(id);
        }
    }

    fn unlink(
        cells: &mut HashMap<CellKey, Cell>,
        oversized: &mut Vec<ProxyId>,
        id: ProxyId,
        covered: Option<&CellList>,
    ) {
        let Some(keys) = covered else {
            let pos = oversized
                .iter()
                .position(|&s| s == id)
                .expect("grid invariant violated: oversized slot not listed");
            oversized.swap_remove(pos);
            return;
        };
        for key in keys {
            let cell = cells
                .get_mut(key)
                .expect("grid invariant violated: missing cell while removing slot");

            let pos = cell
                .slots
                .iter()
                .position(|&s| s == id)
                .expect("grid invariant violated: slot not found in expected cell");
            cell.slots.swap_remove(pos);

            if cell.slots.is_empty() {
                // Dropping empty cells keeps the map compact for sparse grids.
                cells.remove(key);
            }
        }
    }

    // Visit each live slot that may overlap `bounds` once.
    fn visit_cells<F: FnMut(ProxyId, &SlotEntry<T, U>) -> bool>(&self, bounds: &Aabb2D<T>, mut f: F) {
        if self.layout.is_oversized(bounds) {
            for (id, entry) in self.slots.iter() {
                if !f(id, entry) {
                    return;
                }
            }
            return;
        }

        let ((ix0, ix1), (iy0, iy1)) = self.layout.cell_bounds(bounds);
        let mut seen: HashSet<ProxyId> = HashSet::new();

        for ix in ix0..=ix1 {
            for iy in iy0..=iy1 {
                let Some(cell) = self.cells.get(&(ix, iy)) else {
                    continue;
                };
                for &id in &cell.slots {
                    if !seen.insert(id) {
                        continue;
                    }
                    if !f(id, self.slots.expect(id)) {
                        return;
                    }
                }
            }
        }
        for &id in &self.oversized {
            if !f(id, self.slots.expect(id)) {
                return;
            }
        }
    }
}

impl<T: GridScalar, U: Copy> SpatialIndex<T, U> for Grid<T, U> {
    fn insert(&mut self, aabb: Aabb2D<T>, user_data: U) -> ProxyId {
        let aabb = self.fattening.fat_aabb(&aabb);
        let cells = self.layout.covered_cells(&aabb);
        let id = self.slots.insert(SlotEntry {
            aabb,
            user_data,
            cells,
        });
        let covered = self.slots.expect(id).cells.as_ref();
        Self::link(&mut self.cells, &mut self.oversized, id, covered);
        id
    }

    fn remove(&mut self, id: ProxyId) {
        let entry = self.slots.remove(id);
        Self::unlink(&mut self.cells, &mut self.oversized, id, entry.cells.as_ref());
    }

    fn move_proxy(&mut self, id: ProxyId, aabb: Aabb2D<T>, displacement: Vec2<T>) -> bool {
        let entry = self.slots.expect_mut(id);
        if entry.aabb.contains(&aabb) {
            return false;
        }

        let fat = self.fattening.predicted_aabb(&aabb, displacement);
        let cells = self.layout.covered_cells(&fat);
        Self::unlink(&mut self.cells, &mut self.oversized, id, entry.cells.as_ref());
        Self::link(&mut self.cells, &mut self.oversized, id, cells.as_ref());
        entry.aabb = fat;
        entry.cells = cells;
        true
    }

    fn fat_aabb(&self, id: ProxyId) -> Aabb2D<T> {
        self.slots.expect(id).aabb
    }

    fn user_data(&self, id: ProxyId) -> Option<U> {
        self.slots.get(id).map(|e| e.user_data)
    }

    fn query<F: FnMut(ProxyId) -> bool>(&self, aabb: Aabb2D<T>, mut visitor: F) {
        self.visit_cells(&aabb, |id, entry| !entry.aabb.overlaps(&aabb) || visitor(id));
    }

    fn ray_cast<F: FnMut(&RayCastInput<T>, ProxyId) -> T>(
        &self,
        input: &RayCastInput<T>,
        mut visitor: F,
    ) {
        let mut segment = RaySegment::new(input);
        let bounds = segment.bounds();
        self.visit_cells(&bounds, |id, entry| {
            segment.misses(&entry.aabb)
                || segment.apply(visitor(segment.input(), id)) == RayStep::Continue
        });
    }

    fn shift_origin(&mut self, new_origin: Vec2<T>) {
        // Cell membership is recomputed rather than shifted so that it always
        // matches what `covered_cells` yields for the stored boxes.
        self.cells.clear();
        self.oversized.clear();
        for (id, entry) in self.slots.iter_mut() {
            entry.aabb = entry.aabb.shifted(new_origin);
            entry.cells = self.layout.covered_cells(&entry.aabb);
            Self::link(&mut self.cells, &mut self.oversized, id, entry.cells.as_ref());
        }
    }

    fn len(&self) -> usize {
        self.slots.len()
    }
}

/// Grid backend over `f32` coordinates.
pub type GridF32<U> = Grid<f32, U>;
/// Grid backend over `f64` coordinates.
pub type GridF64<U> = Grid<f64, U>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::FlatVec;
    use alloc::vec;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn exact() -> Fattening<f32> {
        Fattening {
            margin: 0.0,
            displacement_multiplier: 0.0,
        }
    }

    fn hits<I: SpatialIndex<f32, u32>>(index: &I, aabb: Aabb2D<f32>) -> Vec<u32> {
        let mut out = Vec::new();
        index.query(aabb, |id| {
            out.push(index.user_data(id).unwrap());
            true
        });
        out.sort_unstable();
        out
    }

    #[test]
    fn insert_move_remove_roundtrip_f32() {
        let mut grid: GridF32<u32> = GridF32::new(10.0).with_fattening(exact());

        let id = grid.insert(Aabb2D::new(0.0, 0.0, 10.0, 10.0), 0);
        assert_eq!(hits(&grid, Aabb2D::new(5.0, 5.0, 5.0, 5.0)), vec![0]);

        // Move the AABB; queries should follow.
        assert!(grid.move_proxy(id, Aabb2D::new(20.0, 20.0, 30.0, 30.0), Vec2::zero()));
        assert!(hits(&grid, Aabb2D::new(5.0, 5.0, 5.0, 5.0)).is_empty());
        assert_eq!(hits(&grid, Aabb2D::new(25.0, 25.0, 25.0, 25.0)), vec![0]);

        // Remove and ensure no hits.
        grid.remove(id);
        assert!(hits(&grid, Aabb2D::new(25.0, 25.0, 25.0, 25.0)).is_empty());
        assert!(grid.cells.is_empty());
    }

    #[test]
    fn query_deduplicates_slots() {
        let mut grid: GridF32<u32> = GridF32::new(5.0);

        // This AABB spans multiple cells.
        grid.insert(Aabb2D::new(0.0, 0.0, 20.0, 20.0), 1);

        // Slot 1 should be reported exactly once.
        let mut seen = Vec::new();
        grid.query(Aabb2D::new(2.0, 2.0, 18.0, 18.0), |id| {
            seen.push(id);
            true
        });
        assert_eq!(seen.len(), 1);
    }

    #[test]
    fn negative_coordinates_f64() {
        let mut g64: GridF64<u32> = GridF64::new(10.0);
        g64.insert(Aabb2D::new(-25.0, -25.0, -5.0, -5.0), 3);
        let mut out = Vec::new();
        g64.query(Aabb2D::new(-10.0, -10.0, -10.0, -10.0), |id| {
            out.push(g64.user_data(id).unwrap());
            true
        });
        assert_eq!(out, vec![3]);
    }

    #[test]
    fn ray_cast_crosses_cells() {
        let mut grid: GridF32<u32> = GridF32::new(4.0).with_fattening(exact());
        grid.insert(Aabb2D::new(1.0, -1.0, 2.0, 1.0), 1);
        grid.insert(Aabb2D::new(13.0, -1.0, 14.0, 1.0), 2);
        grid.insert(Aabb2D::new(13.0, 5.0, 14.0, 6.0), 3);

        let input = RayCastInput::new(Vec2::new(0.0, 0.0), Vec2::new(20.0, 0.0));
        let mut out = Vec::new();
        grid.ray_cast(&input, |sub, id| {
            out.push(grid.user_data(id).unwrap());
            sub.max_fraction
        });
        out.sort_unstable();
        assert_eq!(out, vec![1, 2]);
    }

    #[test]
    fn shift_origin_rebuilds_cells() {
        let mut grid: GridF32<u32> = GridF32::new(8.0).with_fattening(exact());
        let id = grid.insert(Aabb2D::new(100.0, 100.0, 101.0, 101.0), 9);
        grid.shift_origin(Vec2::new(96.0, 96.0));
        assert_eq!(grid.fat_aabb(id), Aabb2D::new(4.0, 4.0, 5.0, 5.0));
        assert_eq!(hits(&grid, Aabb2D::new(4.5, 4.5, 4.5, 4.5)), vec![9]);
        assert!(hits(&grid, Aabb2D::new(100.5, 100.5, 100.5, 100.5)).is_empty());
    }

    #[test]
    fn randomized_queries_match_flat_reference() {
        let mut rng = StdRng::seed_from_u64(7);
        let fattening = Fattening::default();
        let mut grid: GridF32<u32> = GridF32::new(6.0).with_fattening(fattening);
        let mut flat: FlatVec<f32, u32> = FlatVec::with_fattening(fattening);
        let mut ids = Vec::new();
        for i in 0..300 {
            let x: f32 = rng.gen_range(-60.0..60.0);
            let y: f32 = rng.gen_range(-60.0..60.0);
            let aabb = Aabb2D::new(x, y, x + rng.gen_range(0.1..9.0), y + rng.gen_range(0.1..9.0));
            ids.push((grid.insert(aabb, i), flat.insert(aabb, i)));
        }
        for (g, f) in ids.iter().step_by(3) {
            grid.remove(*g);
            flat.remove(*f);
        }
        for _ in 0..50 {
            let x: f32 = rng.gen_range(-70.0..70.0);
            let y: f32 = rng.gen_range(-70.0..70.0);
            let q = Aabb2D::new(x, y, x + 12.0, y + 12.0);
            assert_eq!(hits(&grid, q), hits(&flat, q));
        }
    }

    #[test]
    fn huge_boxes_bypass_the_cell_map() {
        let mut grid: GridF32<u32> = GridF32::new(1.0).with_fattening(exact());
        let ground = grid.insert(Aabb2D::new(0.0, 0.0, 20_000.0, 20_000.0), 1);
        let pebble = grid.insert(Aabb2D::new(3.0, 3.0, 3.5, 3.5), 2);
        assert!(grid.cells.len() <= 4, "only the pebble is registered per cell");
        assert_eq!(grid.oversized, vec![ground]);

        assert_eq!(hits(&grid, Aabb2D::new(3.2, 3.2, 3.3, 3.3)), vec![1, 2]);
        assert_eq!(hits(&grid, Aabb2D::new(9_000.0, 9_000.0, 9_001.0, 9_001.0)), vec![1]);
        // A query spanning the whole world scans the slots instead of the cells.
        assert_eq!(hits(&grid, Aabb2D::new(-1.0, -1.0, 30_000.0, 30_000.0)), vec![1, 2]);

        // Shrinking the ground moves it into the cell map, growing the pebble moves it out.
        assert!(grid.move_proxy(ground, Aabb2D::new(-10.0, -10.0, -8.0, -8.0), Vec2::zero()));
        assert!(grid.move_proxy(pebble, Aabb2D::new(-500.0, -500.0, 500.0, 500.0), Vec2::zero()));
        assert_eq!(grid.oversized, vec![pebble]);
        assert_eq!(hits(&grid, Aabb2D::new(-9.5, -9.5, -9.0, -9.0)), vec![1, 2]);

        grid.shift_origin(Vec2::new(1.0, 1.0));
        assert_eq!(grid.oversized, vec![pebble]);
        assert_eq!(hits(&grid, Aabb2D::new(-10.5, -10.5, -10.0, -10.0)), vec![1, 2]);

        grid.remove(pebble);
        grid.remove(ground);
        assert!(grid.cells.is_empty());
        assert!(grid.oversized.is_empty());
    }

    #[test]
    fn mixed_sizes_match_flat_reference() {
        let mut rng = StdRng::seed_from_u64(11);
        let mut grid: GridF32<u32> = GridF32::new(2.0);
        let mut flat: FlatVec<f32, u32> = FlatVec::new();
        for i in 0..200 {
            let x: f32 = rng.gen_range(-50.0..50.0);
            let y: f32 = rng.gen_range(-50.0..50.0);
            let size: f32 = if i % 10 == 0 {
                rng.gen_range(20.0..80.0)
            } else {
                rng.gen_range(0.1..3.0)
            };
            let aabb = Aabb2D::new(x, y, x + size, y + size);
            grid.insert(aabb, i);
            flat.insert(aabb, i);
        }
        for _ in 0..40 {
            let x: f32 = rng.gen_range(-60.0..60.0);
            let y: f32 = rng.gen_range(-60.0..60.0);
            let span: f32 = rng.gen_range(0.5..40.0);
            let q = Aabb2D::new(x, y, x + span, y + span);
            assert_eq!(hits(&grid, q), hits(&flat, q));
        }
    }

    #[test]
    fn cell_coord_saturates() {
        assert_eq!(GridScalar::cell_coord(1e20_f32, 0.0, 1.0), i32::MAX);
        assert_eq!(GridScalar::cell_coord(-1e20_f32, 0.0, 1.0), i32::MIN);
        assert_eq!(GridScalar::cell_coord(1e20_f64, 0.0, 1.0), i32::MAX);
        assert_eq!(GridScalar::cell_coord(-1e20_f64, 0.0, 1.0), i32::MIN);
    }

    #[test]
    fn cell_coord_is_monotonic_f64() {
        // All integers in range of an `i32` can be represented exactly by `f64`. We expect all
        // `cell_coord` to be monotonic in `value`, including at the extremes of what an `i32` can
        // represent.
        for value in [i32::MIN as f64, -1., 0., 1., i32::MAX as f64] {
            assert!(
                GridScalar::cell_coord(value.next_down(), 0.0, 1.0)
                    <= GridScalar::cell_coord(value, 0.0, 1.0)
            );
            assert!(
                GridScalar::cell_coord(value, 0.0, 1.0)
                    <= GridScalar::cell_coord(value.next_up(), 0.0, 1.0)
            );
        }
    }
}
