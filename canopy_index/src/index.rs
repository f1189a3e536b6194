// Copyright 2025 the Canopy Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The `SpatialIndex` contract, proxy handles and fattening parameters.

use crate::ray::RayCastInput;
use crate::types::{Aabb2D, Scalar, ScalarAcc, Vec2};

/// Handle for an entry stored in a [`SpatialIndex`].
///
/// Handles are unique among live entries and are recycled after removal.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ProxyId(u32);

impl ProxyId {
    pub(crate) fn new(idx: usize) -> Self {
        Self(u32::try_from(idx).expect("proxy id space exhausted: slot does not fit in 32 bits"))
    }

    /// The slot index behind this handle.
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

/// How stored boxes are enlarged beyond the true bounds handed in by clients.
///
/// A fat AABB is the true AABB grown by `margin` on every side. When a proxy
/// moves out of its fat AABB the new one is additionally stretched by
/// `displacement_multiplier * displacement` in the direction of travel.
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Fattening<T> {
    /// Uniform growth applied on every side.
    pub margin: T,
    /// Scale applied to the displacement when predicting motion.
    pub displacement_multiplier: T,
}

impl<T: Scalar> Default for Fattening<T> {
    fn default() -> Self {
        Self {
            margin: T::from_f32(0.1),
            displacement_multiplier: T::from_f32(2.0),
        }
    }
}

impl<T: Scalar> Fattening<T> {
    /// The fat AABB stored for a freshly inserted proxy.
    #[inline]
    pub fn fat_aabb(&self, aabb: &Aabb2D<T>) -> Aabb2D<T> {
        aabb.fattened(self.margin)
    }

    /// The fat AABB stored for a proxy that left its previous fat AABB.
    #[inline]
    pub fn predicted_aabb(&self, aabb: &Aabb2D<T>, displacement: Vec2<T>) -> Aabb2D<T> {
        aabb.fattened(self.margin)
            .extended(displacement.scale(self.displacement_multiplier))
    }

    /// Whether both parameters are finite and non-negative.
    pub fn is_valid(&self) -> bool {
        let zero = T::zero();
        // `x >= 0` rejects NaN; `x - x == 0` rejects infinities.
        self.margin >= zero
            && self.displacement_multiplier >= zero
            && T::sub(self.margin, self.margin) == zero
            && T::sub(self.displacement_multiplier, self.displacement_multiplier) == zero
    }
}

/// Incremental spatial index over fattened AABBs with per-entry user data.
///
/// Queries are visitor driven. A query visitor returns `true` to keep going and
/// `false` to halt; a ray visitor returns the new maximum fraction (`0`
/// terminates the cast, a positive value clips the ray, a negative value
/// ignores the entry). Visiting order is backend-dependent.
///
/// Operating on a handle that is not live is a contract violation and panics,
/// except for [`user_data`][SpatialIndex::user_data] which returns `None`.
pub trait SpatialIndex<T: Scalar, U: Copy> {
    /// Store `aabb` fattened by the index's margin, returning its handle.
    fn insert(&mut self, aabb: Aabb2D<T>, user_data: U) -> ProxyId;

    /// Remove an entry.
    fn remove(&mut self, id: ProxyId);

    /// Update an entry for new true bounds `aabb` travelling along `displacement`.
    ///
    /// Returns `false` (and changes nothing) when the stored fat AABB still
    /// contains `aabb`; otherwise stores a new predicted fat AABB and returns
    /// `true`.
    fn move_proxy(&mut self, id: ProxyId, aabb: Aabb2D<T>, displacement: Vec2<T>) -> bool;

    /// The stored fat AABB of a live entry.
    fn fat_aabb(&self, id: ProxyId) -> Aabb2D<T>;

    /// The user data of an entry, or `None` if `id` is not live.
    fn user_data(&self, id: ProxyId) -> Option<U>;

    /// Visit entries whose fat AABB overlaps `aabb`.
    fn query<F: FnMut(ProxyId) -> bool>(&self, aabb: Aabb2D<T>, visitor: F);

    /// Visit entries whose fat AABB may be hit by the ray.
    fn ray_cast<F: FnMut(&RayCastInput<T>, ProxyId) -> T>(&self, input: &RayCastInput<T>, visitor: F);

    /// Translate all stored geometry by `-new_origin`.
    fn shift_origin(&mut self, new_origin: Vec2<T>);

    /// Number of live entries.
    fn len(&self) -> usize;

    /// Whether the index holds no entries.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Height of the hierarchy; `0` for flat structures.
    fn height(&self) -> usize {
        0
    }

    /// Largest height difference between sibling subtrees; `0` for flat structures.
    fn max_balance(&self) -> usize {
        0
    }

    /// Sum of node perimeters over the root perimeter; `0` for flat structures.
    fn area_ratio(&self) -> ScalarAcc<T> {
        T::widen(T::zero())
    }
}

/// Shared storage for backends that keep one slot per proxy.
#[derive(Clone, Debug)]
pub(crate) struct Slots<E> {
    entries: alloc::vec::Vec<Option<E>>,
    free_list: alloc::vec::Vec<usize>,
    live: usize,
}

impl<E> Default for Slots<E> {
    fn default() -> Self {
        Self {
            entries: alloc::vec::Vec::new(),
            free_list: alloc::vec::Vec::new(),
            live: 0,
        }
    }
}

impl<E> Slots<E> {
    pub(crate) fn insert(&mut self, entry: E) -> ProxyId {
        self.live += 1;
        if let Some(idx) = self.free_list.pop() {
            self.entries[idx] = Some(entry);
            ProxyId::new(idx)
        } else {
            self.entries.push(Some(entry));
            ProxyId::new(self.entries.len() - 1)
        }
    }

    pub(crate) fn remove(&mut self, id: ProxyId) -> E {
        let entry = self
            .entries
            .get_mut(id.index())
            .and_then(Option::take)
            .unwrap_or_else(|| panic!("proxy {id:?} is not live"));
        self.free_list.push(id.index());
        self.live -= 1;
        entry
    }

    pub(crate) fn get(&self, id: ProxyId) -> Option<&E> {
        self.entries.get(id.index())?.as_ref()
    }

    pub(crate) fn get_mut(&mut self, id: ProxyId) -> Option<&mut E> {
        self.entries.get_mut(id.index())?.as_mut()
    }

    pub(crate) fn expect(&self, id: ProxyId) -> &E {
        self.get(id)
            .unwrap_or_else(|| panic!("proxy {id:?} is not live"))
    }

    pub(crate) fn expect_mut(&mut self, id: ProxyId) -> &mut E {
        self.get_mut(id)
            .unwrap_or_else(|| panic!("proxy {id:?} is not live"))
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = (ProxyId, &E)> + '_ {
        self.entries
            .iter()
            .enumerate()
            .filter_map(|(i, e)| e.as_ref().map(|e| (ProxyId::new(i), e)))
    }

    pub(crate) fn iter_mut(&mut self) -> impl Iterator<Item = (ProxyId, &mut E)> + '_ {
        self.entries
            .iter_mut()
            .enumerate()
            .filter_map(|(i, e)| e.as_mut().map(|e| (ProxyId::new(i), e)))
    }

    pub(crate) fn len(&self) -> usize {
        self.live
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fattening_defaults_and_prediction() {
        let f = Fattening::<f32>::default();
        assert_eq!(f.margin, 0.1);
        assert_eq!(f.displacement_multiplier, 2.0);

        let f = Fattening {
            margin: 1.0_f32,
            displacement_multiplier: 2.0,
        };
        let a = Aabb2D::new(0.0, 0.0, 2.0, 2.0);
        assert_eq!(f.fat_aabb(&a), Aabb2D::new(-1.0, -1.0, 3.0, 3.0));
        assert_eq!(
            f.predicted_aabb(&a, Vec2::new(1.0, -0.5)),
            Aabb2D::new(-1.0, -2.0, 5.0, 3.0)
        );
    }

    #[test]
    fn fattening_validation() {
        assert!(Fattening::<f64>::default().is_valid());
        let bad = [
            Fattening {
                margin: -0.1_f64,
                displacement_multiplier: 1.0,
            },
            Fattening {
                margin: f64::NAN,
                displacement_multiplier: 1.0,
            },
            Fattening {
                margin: 0.1,
                displacement_multiplier: f64::INFINITY,
            },
        ];
        for f in bad {
            assert!(!f.is_valid(), "{f:?} should be rejected");
        }
    }

    #[test]
    fn slots_recycle_ids() {
        let mut slots: Slots<u8> = Slots::default();
        let a = slots.insert(1);
        let b = slots.insert(2);
        assert_eq!(slots.len(), 2);
        assert_eq!(slots.remove(a), 1);
        assert!(slots.get(a).is_none());
        let c = slots.insert(3);
        assert_eq!(c, a);
        assert_eq!(slots.iter().count(), 2);
        assert_eq!(*slots.expect(b), 2);
    }

    #[test]
    #[should_panic(expected = "is not live")]
    fn slots_double_remove_panics() {
        let mut slots: Slots<u8> = Slots::default();
        let a = slots.insert(1);
        let _ = slots.remove(a);
        let _ = slots.remove(a);
    }
}
