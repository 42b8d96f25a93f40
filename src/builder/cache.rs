//! Per-operation apply caches
//!
//! MTBDD operations memoize on `(operation tag, iteration, operand
//! ids)`.  A cache is created for one operation (or one composite
//! operation such as a compositional translation) and dropped
//! afterwards; callers that reuse a cache across passes bump the
//! iteration counter instead of clearing it.

use crate::repr::mtbdd::BddId;
use rustc_hash::FxHashMap;

/// Tags distinguishing operations that share one cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum OpTag {
    And = 1,
    Or,
    Implies,
    Equiv,
    Xor,
    Not,
    Rename,
    Strat,
    StratBool,
    StratTrival,
    FinalStrat,
    Leaves,
    TerminalToConst,
    BoolAnd,
    BoolOr,
    BoolXor,
    BoolImplies,
    BoolBiimp,
    BoolNot,
}

/// Saturating size estimate for a binary product over MTDFAs with
/// `left_states`/`right_states` roots and `sum_aps` atomic
/// propositions; used to pick an initial cache capacity.
pub fn size_estimate_product(left_states: usize, right_states: usize, sum_aps: usize) -> usize {
    const CAP: usize = (i32::MAX / 16) as usize;
    let (big, small) = if left_states >= right_states {
        (left_states, right_states)
    } else {
        (right_states, left_states)
    };
    let base = big / 4 + 1;
    let prod = base
        .saturating_mul(small)
        .saturating_mul(sum_aps.max(1))
        .min(CAP);
    prod.max(1 << 14)
}

/// Saturating size estimate for a unary pass over one MTDFA.
pub fn size_estimate_unary(states: usize, num_aps: usize) -> usize {
    const CAP: usize = (i32::MAX / 16) as usize;
    let base = states / 2 + 1;
    let prod = base.saturating_mul(num_aps.max(1)).min(CAP);
    prod.max(1 << 14)
}

pub struct ApplyCache {
    map: FxHashMap<(u8, u32, u32, u32), u64>,
}

impl ApplyCache {
    pub fn new(capacity_estimate: usize) -> Self {
        ApplyCache {
            map: FxHashMap::with_capacity_and_hasher(
                capacity_estimate.min(1 << 22),
                Default::default(),
            ),
        }
    }

    pub fn reserve(&mut self, capacity_estimate: usize) {
        let want = capacity_estimate.min(1 << 22);
        if self.map.capacity() < want {
            self.map.reserve(want - self.map.len());
        }
    }

    pub fn reset(&mut self) {
        self.map.clear();
    }

    #[inline]
    pub fn get(&self, tag: OpTag, iteration: u32, a: BddId, b: BddId) -> Option<u64> {
        self.map
            .get(&(tag as u8, iteration, a.value(), b.value()))
            .copied()
    }

    #[inline]
    pub fn insert(&mut self, tag: OpTag, iteration: u32, a: BddId, b: BddId, value: u64) {
        self.map
            .insert((tag as u8, iteration, a.value(), b.value()), value);
    }
}

impl Default for ApplyCache {
    fn default() -> Self {
        ApplyCache::new(1 << 14)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn size_estimates_saturate() {
        let cap = (i32::MAX / 16) as usize;
        assert_eq!(size_estimate_product(usize::MAX / 2, 3, 10), cap);
        assert_eq!(size_estimate_product(1, 1, 1), 1 << 14);
        assert_eq!(size_estimate_unary(2, 1), 1 << 14);
        assert_eq!(size_estimate_unary(usize::MAX / 2, 64), cap);
    }

    #[test]
    fn iteration_separates_entries() {
        let mut cache = ApplyCache::default();
        let a = BddId::new(7);
        let b = BddId::new(9);
        cache.insert(OpTag::Rename, 0, a, b, 1);
        cache.insert(OpTag::Rename, 1, a, b, 2);
        assert_eq!(cache.get(OpTag::Rename, 0, a, b), Some(1));
        assert_eq!(cache.get(OpTag::Rename, 1, a, b), Some(2));
        assert_eq!(cache.get(OpTag::Strat, 0, a, b), None);
    }
}
