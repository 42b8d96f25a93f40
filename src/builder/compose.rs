//! Compositional LTLf translation
//!
//! Recursion over the propositional structure of the formula:
//! temporal leaves are translated directly, then combined with n-ary
//! products ordered either by automaton size (a min-heap) or by
//! atomic-proposition affinity.  Intermediate minimization is applied
//! only when the product's AP set is smaller than the sum of its
//! operands': a product over disjoint AP sets can only grow
//! additively, so minimizing it is a net cost.

use crate::builder::cache::{size_estimate_product, size_estimate_unary, ApplyCache};
use crate::builder::manager::DictRef;
use crate::builder::translator::ltlf_to_mtdfa;
use crate::error::Result;
use crate::minimize::minimize_core;
use crate::product::{complement_core, product_core};
use crate::repr::formula::{Formula, Op};
use crate::repr::mtdfa::Mtdfa;
use bit_set::BitSet;
use log::debug;
use std::cmp::Reverse;
use std::collections::BinaryHeap;

struct ComposeData {
    dict: DictRef,
    mincache: ApplyCache,
    minimize_iteration: u32,
    opcache: ApplyCache,
    opcache_iteration: u32,
    simplify_terms: bool,
    fuse_same_bdds: bool,
    want_minimize: bool,
    order_for_aps: bool,
    want_names: bool,
}

impl ComposeData {
    fn trans(&mut self, f: &Formula) -> Result<Mtdfa> {
        ltlf_to_mtdfa(f, &self.dict, self.fuse_same_bdds, self.simplify_terms, false)
    }

    fn product(&mut self, left: &Mtdfa, right: &Mtdfa, op: Op) -> Result<Mtdfa> {
        self.opcache.reserve(size_estimate_product(
            left.num_roots(),
            right.num_roots(),
            left.aps.len() + right.aps.len(),
        ));
        let iteration = self.opcache_iteration;
        self.opcache_iteration += 1;
        product_core(left, right, op, &mut self.opcache, iteration)
    }

    fn minimize(&mut self, dfa: Mtdfa) -> Mtdfa {
        if !self.want_minimize {
            return dfa;
        }
        self.mincache
            .reserve(size_estimate_unary(dfa.num_roots(), dfa.aps.len()));
        minimize_core(&dfa, &mut self.mincache, &mut self.minimize_iteration)
    }
}

// Heap entry ordered by root count, ties broken by insertion order.
struct BySize(usize, u64, Mtdfa);

impl PartialEq for BySize {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0 && self.1 == other.1
    }
}
impl Eq for BySize {}
impl PartialOrd for BySize {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for BySize {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        (self.0, self.1).cmp(&(other.0, other.1))
    }
}

/// Combine by repeatedly producting the two smallest automata.
fn combine_by_size(
    data: &mut ComposeData,
    dfas: Vec<Mtdfa>,
    op: Op,
    minimize: bool,
) -> Result<Mtdfa> {
    let mut seq = 0u64;
    let mut heap: BinaryHeap<Reverse<BySize>> = dfas
        .into_iter()
        .map(|d| {
            seq += 1;
            Reverse(BySize(d.num_roots(), seq, d))
        })
        .collect();
    while heap.len() > 1 {
        let Reverse(BySize(_, _, left)) = heap.pop().expect("heap len checked");
        let Reverse(BySize(_, _, right)) = heap.pop().expect("heap len checked");
        let prod = data.product(&left, &right, op)?;
        // minimizing pays off only when the operands share APs
        let want_min =
            minimize && left.aps.len() + right.aps.len() != prod.aps.len();
        let next = if want_min { data.minimize(prod) } else { prod };
        debug!(
            "compose: {}x{} -> {} states",
            left.num_roots(),
            right.num_roots(),
            next.num_roots()
        );
        seq += 1;
        heap.push(Reverse(BySize(next.num_roots(), seq, next)));
    }
    match heap.pop() {
        Some(Reverse(BySize(_, _, dfa))) => Ok(dfa),
        None => data.trans(&Formula::tt()),
    }
}

/// AP-affinity combination: repeatedly take the smallest automaton
/// and product it with the first later automaton sharing an atomic
/// proposition; automata sharing nothing are combined pairwise at the
/// end without minimization.
fn combine_by_aps(data: &mut ComposeData, f: &Formula, subs: Vec<Mtdfa>, op: Op) -> Result<Mtdfa> {
    let aps = f.atomic_props();
    let ap_index = |ap: &Formula| aps.binary_search_by(|x| x.ap_name().cmp(&ap.ap_name()));
    let mut dfas_and_aps: Vec<(Mtdfa, BitSet)> = Vec::with_capacity(subs.len());
    for dfa in subs {
        let mut apset = BitSet::with_capacity(aps.len());
        for ap in &dfa.aps {
            if let Ok(i) = ap_index(ap) {
                apset.insert(i);
            }
        }
        dfas_and_aps.push((dfa, apset));
    }
    dfas_and_aps.sort_by_key(|(d, _)| d.num_roots());

    let mut independent: Vec<Mtdfa> = Vec::new();
    while dfas_and_aps.len() > 1 {
        let shared = dfas_and_aps
            .iter()
            .skip(1)
            .position(|(_, apset)| !dfas_and_aps[0].1.is_disjoint(apset))
            .map(|p| p + 1);
        let Some(pos) = shared else {
            // no AP in common with anything: defer
            let (dfa, _) = dfas_and_aps.remove(0);
            independent.push(dfa);
            continue;
        };
        let (right, aps_right) = dfas_and_aps.remove(pos);
        let (left, mut aps_left) = dfas_and_aps.remove(0);
        let prod = data.product(&left, &right, op)?;
        let min = data.minimize(prod);
        aps_left.union_with(&aps_right);
        let at = dfas_and_aps.partition_point(|(d, _)| d.num_roots() <= min.num_roots());
        dfas_and_aps.insert(at, (min, aps_left));
    }
    let (last, _) = dfas_and_aps.pop().expect("at least one automaton");
    if independent.is_empty() {
        return Ok(last);
    }
    independent.push(last);
    combine_by_size(data, independent, op, false)
}

fn compose_rec(data: &mut ComposeData, f: &Formula) -> Result<Mtdfa> {
    if f.is_boolean() {
        return data.trans(f);
    }
    match f.kind() {
        Op::True | Op::False | Op::Ap => unreachable!("boolean handled above"),
        Op::Not => {
            let sub = compose_rec(data, &f[0])?;
            data.opcache
                .reserve(size_estimate_unary(sub.num_roots(), sub.aps.len()));
            let iteration = data.opcache_iteration;
            data.opcache_iteration += 1;
            Ok(complement_core(&sub, &mut data.opcache, iteration))
        }
        Op::And | Op::Or if f.size() > 2 => {
            let mut subs = Vec::with_capacity(f.size());
            for sub in f.children() {
                subs.push(compose_rec(data, sub)?);
            }
            if data.order_for_aps {
                combine_by_aps(data, f, subs, f.kind())
            } else {
                combine_by_size(data, subs, f.kind(), data.want_minimize)
            }
        }
        Op::And | Op::Or | Op::Xor | Op::Implies | Op::Equiv => {
            let left = compose_rec(data, &f[0])?;
            let right = compose_rec(data, &f[1])?;
            let prod = data.product(&left, &right, f.kind())?;
            if left.aps.len() + right.aps.len() == prod.aps.len() {
                return Ok(prod);
            }
            Ok(data.minimize(prod))
        }
        Op::U | Op::R | Op::W | Op::M | Op::G | Op::F | Op::X | Op::StrongX => {
            let mut dfa = data.trans(f)?;
            if !data.want_names {
                dfa.names.clear();
            }
            Ok(data.minimize(dfa))
        }
    }
}

/// Translate by composing the automata of the propositional
/// components.  `order_by_aps` selects AP-affinity ordering for n-ary
/// conjunctions and disjunctions instead of the size heap.
pub fn ltlf_to_mtdfa_compose(
    f: &Formula,
    dict: &DictRef,
    minimize: bool,
    order_by_aps: bool,
    keep_names: bool,
    fuse_same_bdds: bool,
    simplify_terms: bool,
) -> Result<Mtdfa> {
    let mut data = ComposeData {
        dict: dict.clone(),
        mincache: ApplyCache::default(),
        minimize_iteration: 0,
        opcache: ApplyCache::default(),
        opcache_iteration: 0,
        simplify_terms,
        fuse_same_bdds,
        want_minimize: minimize,
        order_for_aps: order_by_aps,
        want_names: keep_names,
    };
    let mut dfa = compose_rec(&mut data, f)?;
    if !keep_names {
        dfa.names.clear();
    }
    Ok(dfa)
}
