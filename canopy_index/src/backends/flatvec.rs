// Copyright 2025 the Canopy Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Flat vector backend: every query is a linear scan.

use core::fmt::Debug;

use crate::index::{Fattening, ProxyId, Slots, SpatialIndex};
use crate::ray::{RayCastInput, RaySegment, RayStep};
use crate::types::{Aabb2D, Scalar, Vec2};

/// Linear-scan backend.
///
/// Smallest and simplest; useful for very small proxy counts and as a
/// reference when checking other backends.
pub struct FlatVec<T: Scalar, U: Copy> {
    slots: Slots<Entry<T, U>>,
    fattening: Fattening<T>,
}

#[derive(Clone, Debug)]
struct Entry<T, U> {
    aabb: Aabb2D<T>,
    user_data: U,
}

impl<T: Scalar, U: Copy> Debug for FlatVec<T, U> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("FlatVec")
            .field("len", &self.slots.len())
            .field("fattening", &self.fattening)
            .finish_non_exhaustive()
    }
}

impl<T: Scalar, U: Copy> Default for FlatVec<T, U> {
    fn default() -> Self {
        Self::with_fattening(Fattening::default())
    }
}

impl<T: Scalar, U: Copy> FlatVec<T, U> {
    /// Create an empty backend with the default fattening parameters.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty backend that fattens proxies with `fattening`.
    pub fn with_fattening(fattening: Fattening<T>) -> Self {
        Self {
            slots: Slots::default(),
            fattening,
        }
    }
}

impl<T: Scalar, U: Copy> SpatialIndex<T, U> for FlatVec<T, U> {
    fn insert(&mut self, aabb: Aabb2D<T>, user_data: U) -> ProxyId {
        self.slots.insert(Entry {
            aabb: self.fattening.fat_aabb(&aabb),
            user_data,
        })
    }

    fn remove(&mut self, id: ProxyId) {
        self.slots.remove(id);
    }

    fn move_proxy(&mut self, id: ProxyId, aabb: Aabb2D<T>, displacement: Vec2<T>) -> bool {
        let fattening = self.fattening;
        let entry = self.slots.expect_mut(id);
        if entry.aabb.contains(&aabb) {
            return false;
        }
        entry.aabb = fattening.predicted_aabb(&aabb, displacement);
        true
    }

    fn fat_aabb(&self, id: ProxyId) -> Aabb2D<T> {
        self.slots.expect(id).aabb
    }

    fn user_data(&self, id: ProxyId) -> Option<U> {
        self.slots.get(id).map(|e| e.user_data)
    }

    fn query<F: FnMut(ProxyId) -> bool>(&self, aabb: Aabb2D<T>, mut visitor: F) {
        for (id, entry) in self.slots.iter() {
            if entry.aabb.overlaps(&aabb) && !visitor(id) {
                return;
            }
        }
    }

    fn ray_cast<F: FnMut(&RayCastInput<T>, ProxyId) -> T>(
        &self,
        input: &RayCastInput<T>,
        mut visitor: F,
    ) {
        let mut segment = RaySegment::new(input);
        for (id, entry) in self.slots.iter() {
            if segment.misses(&entry.aabb) {
                continue;
            }
            if segment.apply(visitor(segment.input(), id)) == RayStep::Stop {
                return;
            }
        }
    }

    fn shift_origin(&mut self, new_origin: Vec2<T>) {
        for (_, entry) in self.slots.iter_mut() {
            entry.aabb = entry.aabb.shifted(new_origin);
        }
    }

    fn len(&self) -> usize {
        self.slots.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;
    use alloc::vec::Vec;

    #[test]
    fn query_ray_and_shift() {
        let mut flat: FlatVec<f64, &str> = FlatVec::with_fattening(Fattening {
            margin: 0.0,
            displacement_multiplier: 1.0,
        });
        let a = flat.insert(Aabb2D::new(0.0, 0.0, 1.0, 1.0), "a");
        let _b = flat.insert(Aabb2D::new(3.0, 0.0, 4.0, 1.0), "b");

        let mut hits = Vec::new();
        flat.query(Aabb2D::new(0.5, 0.5, 3.5, 0.6), |id| {
            hits.push(flat.user_data(id).unwrap());
            true
        });
        hits.sort_unstable();
        assert_eq!(hits, vec!["a", "b"]);

        let input = RayCastInput::new(Vec2::new(-1.0, 0.5), Vec2::new(5.0, 0.5));
        let mut rays = Vec::new();
        flat.ray_cast(&input, |_, id| {
            rays.push(id);
            -1.0
        });
        assert_eq!(rays.len(), 2);

        flat.shift_origin(Vec2::new(1.0, 0.0));
        assert_eq!(flat.fat_aabb(a), Aabb2D::new(-1.0, 0.0, 0.0, 1.0));
        assert_eq!(flat.height(), 0);
        assert_eq!(flat.area_ratio(), 0.0);
    }

    #[test]
    fn removed_ids_have_no_user_data() {
        let mut flat: FlatVec<f32, u8> = FlatVec::new();
        let a = flat.insert(Aabb2D::new(0.0, 0.0, 1.0, 1.0), 1);
        flat.remove(a);
        assert!(flat.is_empty());
        assert_eq!(flat.user_data(a), None);
    }
}
