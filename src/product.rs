//! Boolean combinations of MTDFAs
//!
//! Products run one binary apply per reachable state pair, combining
//! destination pairs into lazily interned pair terminals; the
//! complement is a single-pass polarity flip on every terminal.

use crate::builder::cache::{size_estimate_product, ApplyCache, OpTag};
use crate::builder::manager::{BoolOp, MtBddManager};
use crate::error::{Error, Result};
use crate::repr::formula::{Formula, Op};
use crate::repr::mtbdd::BddId;
use crate::repr::mtdfa::{union_aps, Mtdfa};
use rustc_hash::FxHashMap;
use std::collections::VecDeque;

// Pseudo state indices for the constant sides of a pair.
const FALSE_STATE: u32 = u32::MAX - 1;
const TRUE_STATE: u32 = u32::MAX;

/// Interns reachable state pairs as product states.  Each pair may
/// need up to two terminals (accepting and rejecting); they are
/// created on demand.
#[derive(Default)]
struct PairInterner {
    map: FxHashMap<(u32, u32), PairEntry>,
    todo: VecDeque<(u32, u32)>,
}

struct PairEntry {
    index: u32,
    terminals: [Option<BddId>; 2],
}

impl PairInterner {
    fn leaf_to_state(&self, mgr: &MtBddManager, leaf: BddId) -> (u32, bool) {
        if leaf.is_false() {
            return (FALSE_STATE, false);
        }
        if leaf.is_true() {
            return (TRUE_STATE, true);
        }
        let v = mgr.terminal_value(leaf).expect("product leaf");
        (v / 2, v & 1 == 1)
    }

    fn pair_to_terminal(
        &mut self,
        mgr: &mut MtBddManager,
        left: u32,
        right: u32,
        may_stop: bool,
    ) -> BddId {
        let PairInterner { map, todo } = self;
        let next_index = map.len() as u32;
        let entry = map.entry((left, right)).or_insert_with(|| {
            todo.push_back((left, right));
            PairEntry {
                index: next_index,
                terminals: [None, None],
            }
        });
        let slot = &mut entry.terminals[may_stop as usize];
        match *slot {
            Some(t) => t,
            None => {
                let t = mgr.terminal(2 * entry.index + may_stop as u32);
                *slot = Some(t);
                t
            }
        }
    }

    fn pair_to_terminal_bdd(
        &mut self,
        mgr: &mut MtBddManager,
        left: u32,
        right: u32,
        may_stop: bool,
    ) -> BddId {
        if left == FALSE_STATE && right == FALSE_STATE && !may_stop {
            return BddId::FALSE;
        }
        if left == TRUE_STATE && right == TRUE_STATE && may_stop {
            return BddId::TRUE;
        }
        self.pair_to_terminal(mgr, left, right, may_stop)
    }
}

fn state_bdd_and_name(dfa: &Mtdfa, s: u32) -> (BddId, Option<Formula>) {
    if s == FALSE_STATE {
        return (BddId::FALSE, Some(Formula::ff()));
    }
    if s == TRUE_STATE {
        return (BddId::TRUE, Some(Formula::tt()));
    }
    let name = dfa.names.get(s as usize).cloned();
    (dfa.states[s as usize], name)
}

/// Product under a Boolean connective, sharing the caller's operation
/// cache; used directly by the compositional translator.
pub(crate) fn product_core(
    left: &Mtdfa,
    right: &Mtdfa,
    op: Op,
    cache: &mut ApplyCache,
    iteration: u32,
) -> Result<Mtdfa> {
    if !left.same_dict(right) {
        return Err(Error::DifferentDictionaries);
    }
    let (boolop, tag) = match op {
        Op::And => (BoolOp::And, OpTag::And),
        Op::Or => (BoolOp::Or, OpTag::Or),
        Op::Implies => (BoolOp::Implies, OpTag::Implies),
        Op::Equiv => (BoolOp::Biimp, OpTag::Equiv),
        Op::Xor => (BoolOp::Xor, OpTag::Xor),
        _ => return Err(Error::UnsupportedOperator("product")),
    };

    let dict = left.dict().clone();
    let mgr = &mut *dict.borrow_mut();
    let mut res = Mtdfa::new(&dict);
    let mut pairs = PairInterner::default();
    let want_names =
        left.names.len() == left.num_roots() && right.names.len() == right.num_roots();

    // seeds the work queue with the initial pair
    pairs.pair_to_terminal(mgr, 0, 0, false);
    while let Some((ls, rs)) = pairs.todo.pop_front() {
        let (lb, lname) = state_bdd_and_name(left, ls);
        let (rb, rname) = state_bdd_and_name(right, rs);
        let b = {
            let pairs = &mut pairs;
            mgr.mt_apply2_leaves(lb, rb, boolop, cache, tag, iteration, &mut |m, l, r| {
                // both-constant leaves fold without a pair terminal
                if l.is_const() && r.is_const() {
                    let (lv, rv) = (l.is_true(), r.is_true());
                    let folded = match op {
                        Op::And => lv && rv,
                        Op::Or => lv || rv,
                        Op::Implies => !lv || rv,
                        Op::Equiv => lv == rv,
                        Op::Xor => lv != rv,
                        _ => unreachable!(),
                    };
                    return BddId::from_bool(folded);
                }
                let (lst, lbit) = pairs.leaf_to_state(m, l);
                let (rst, rbit) = pairs.leaf_to_state(m, r);
                let bit = match op {
                    Op::And => lbit && rbit,
                    Op::Or => lbit || rbit,
                    Op::Implies => !lbit || rbit,
                    Op::Equiv => lbit == rbit,
                    Op::Xor => lbit != rbit,
                    _ => unreachable!(),
                };
                pairs.pair_to_terminal_bdd(m, lst, rst, bit)
            })
        };
        res.states.push(b);
        if want_names {
            if let (Some(lf), Some(rf)) = (lname, rname) {
                res.names.push(Formula::binop(op, lf, rf));
            }
        }
    }
    if res.names.len() != res.states.len() {
        res.names.clear();
    }
    res.aps = union_aps(&left.aps, &right.aps);
    Ok(res)
}

fn product_with(left: &Mtdfa, right: &Mtdfa, op: Op) -> Result<Mtdfa> {
    let aps = union_aps(&left.aps, &right.aps);
    let mut cache = ApplyCache::new(size_estimate_product(
        left.num_roots(),
        right.num_roots(),
        aps.len(),
    ));
    product_core(left, right, op, &mut cache, 0)
}

/// Intersection of the two languages.
pub fn product(left: &Mtdfa, right: &Mtdfa) -> Result<Mtdfa> {
    product_with(left, right, Op::And)
}

/// Union of the two languages.
pub fn product_or(left: &Mtdfa, right: &Mtdfa) -> Result<Mtdfa> {
    product_with(left, right, Op::Or)
}

/// Symmetric difference; empty iff the languages agree.
pub fn product_xor(left: &Mtdfa, right: &Mtdfa) -> Result<Mtdfa> {
    product_with(left, right, Op::Xor)
}

pub fn product_xnor(left: &Mtdfa, right: &Mtdfa) -> Result<Mtdfa> {
    product_with(left, right, Op::Equiv)
}

pub fn product_implies(left: &Mtdfa, right: &Mtdfa) -> Result<Mtdfa> {
    product_with(left, right, Op::Implies)
}

/// Complement with the caller's cache; states and BDD structure are
/// preserved, only terminal polarities flip.
pub(crate) fn complement_core(dfa: &Mtdfa, cache: &mut ApplyCache, iteration: u32) -> Mtdfa {
    let dict = dfa.dict().clone();
    let mgr = &mut *dict.borrow_mut();
    let mut res = Mtdfa::new(&dict);
    res.aps = dfa.aps.clone();
    res.set_controllable_variables(dfa.controllable_variables());
    for &b in &dfa.states {
        res.states.push(mgr.mt_apply1(
            b,
            cache,
            OpTag::Not,
            iteration,
            BddId::TRUE,
            BddId::FALSE,
            &mut |_, v| v ^ 1,
        ));
    }
    for name in &dfa.names {
        res.names.push(Formula::not(name.clone()));
    }
    res
}

/// The automaton of the complement language.
pub fn complement(dfa: &Mtdfa) -> Mtdfa {
    let mut cache = ApplyCache::default();
    complement_core(dfa, &mut cache, 0)
}
