//! The LTLf → MTDFA translator
//!
//! For every formula, `ltlf_to_mtbdd` builds the MTBDD describing one
//! step of its language: leaves are terminals `2 * formula_id +
//! may_stop`, where `may_stop` records whether the trace may end on
//! this transition.  The construction loop then turns reachable
//! formulas into MTDFA states, optionally interleaving game solving
//! through the back-propagation arena (the on-the-fly synthesis
//! modes).

use crate::builder::cache::{ApplyCache, OpTag};
use crate::builder::canonical::Canonicalizer;
use crate::builder::manager::{BoolOp, DictRef, MtBddManager};
use crate::error::Result;
use crate::game::encoder::BackpropEncoder;
use crate::ltlf::{ltlf_one_step_sat_rewrite, ltlf_one_step_unsat_rewrite, RealizabilitySimplifier};
use crate::options::{Semantics, SynthesisBackprop};
use crate::repr::formula::{Formula, Op};
use crate::repr::mtbdd::BddId;
use crate::repr::mtdfa::Mtdfa;
use log::debug;
use rustc_hash::{FxHashMap, FxHashSet};
use std::collections::VecDeque;

/// Interning of formulas as consecutive ids and of `(formula,
/// may_stop)` pairs as terminal values.
pub(crate) struct TermRegistry {
    pub int_to_formula: Vec<Formula>,
    formula_to_int: FxHashMap<Formula, u32>,
    canon: Canonicalizer,
    simplify_terms: bool,
}

impl TermRegistry {
    fn new(simplify_terms: bool) -> TermRegistry {
        TermRegistry {
            int_to_formula: Vec::with_capacity(32),
            formula_to_int: FxHashMap::default(),
            canon: Canonicalizer::default(),
            simplify_terms,
        }
    }

    /// Intern a formula, after replacing it by its propositional
    /// equivalence representative.  The first-seen id wins; ids are
    /// never remapped because existing terminals already use them.
    pub fn formula_to_int(&mut self, mgr: &mut MtBddManager, f: &Formula) -> u32 {
        if let Some(&v) = self.formula_to_int.get(f) {
            return v;
        }
        let g = self.canon.representative(mgr, f, self.simplify_terms);
        if g != *f {
            if let Some(&v) = self.formula_to_int.get(&g) {
                self.formula_to_int.insert(f.clone(), v);
                return v;
            }
            // the representative itself may be new when the
            // canonicalizer simplified the formula
            let v = self.int_to_formula.len() as u32;
            self.int_to_formula.push(g.clone());
            self.formula_to_int.insert(g, v);
            self.formula_to_int.insert(f.clone(), v);
            return v;
        }
        let v = self.int_to_formula.len() as u32;
        self.int_to_formula.push(f.clone());
        self.formula_to_int.insert(f.clone(), v);
        v
    }

    pub fn formula_to_terminal(&mut self, mgr: &mut MtBddManager, f: &Formula, may_stop: bool) -> u32 {
        2 * self.formula_to_int(mgr, f) + may_stop as u32
    }

    /// MTBDD of the single terminal for `(f, may_stop)`, short-cut to
    /// the constants for `(⊥, rejecting)` and `(⊤, accepting)`.
    pub fn formula_to_terminal_bdd(
        &mut self,
        mgr: &mut MtBddManager,
        f: &Formula,
        may_stop: bool,
    ) -> BddId {
        if f.is_ff() && !may_stop {
            return BddId::FALSE;
        }
        if f.is_tt() && may_stop {
            return BddId::TRUE;
        }
        let v = self.formula_to_int(mgr, f);
        // the interned formula may have been reduced to ⊤/⊥
        let g = &self.int_to_formula[v as usize];
        if g.is_ff() && !may_stop {
            return BddId::FALSE;
        }
        if g.is_tt() && may_stop {
            return BddId::TRUE;
        }
        mgr.terminal(2 * v + may_stop as u32)
    }

    pub fn terminal_to_formula(&self, value: u32) -> Formula {
        self.int_to_formula[(value / 2) as usize].clone()
    }

    /// Formula and accepting bit of a leaf node.
    pub fn leaf_to_formula(&self, mgr: &MtBddManager, leaf: BddId) -> (Formula, bool) {
        if leaf.is_false() {
            return (Formula::ff(), false);
        }
        if leaf.is_true() {
            return (Formula::tt(), true);
        }
        let v = mgr
            .terminal_value(leaf)
            .expect("leaf_to_formula: not a leaf");
        (self.terminal_to_formula(v), v & 1 == 1)
    }
}

/// Options of the main construction loop.
struct TranslateOpts<'a> {
    fuse_same_bdds: bool,
    detect_empty_univ: bool,
    outvars: Option<&'a [String]>,
    do_backprop: bool,
    realizability: bool,
    preprocess: bool,
    bfs: bool,
}

pub struct LtlfTranslator {
    dict: DictRef,
    registry: TermRegistry,
    formula_to_bdd: FxHashMap<Formula, BddId>,
    cache: ApplyCache,
    iteration: u32,
}

impl LtlfTranslator {
    pub fn new(dict: &DictRef, simplify_terms: bool) -> LtlfTranslator {
        LtlfTranslator {
            dict: dict.clone(),
            registry: TermRegistry::new(simplify_terms),
            formula_to_bdd: FxHashMap::default(),
            cache: ApplyCache::default(),
            iteration: 0,
        }
    }

    fn bump_iteration(&mut self) -> u32 {
        self.iteration += 1;
        self.iteration
    }

    /// Combine two MTBDDs under a Boolean connective: terminals merge
    /// into the terminal of the combined formula, with the accepting
    /// bits combined the same way.
    fn combine2(&mut self, mgr: &mut MtBddManager, op: Op, left: BddId, right: BddId) -> BddId {
        let (boolop, tag) = match op {
            Op::And => (BoolOp::And, OpTag::And),
            Op::Or => (BoolOp::Or, OpTag::Or),
            Op::Implies => (BoolOp::Implies, OpTag::Implies),
            Op::Equiv => (BoolOp::Biimp, OpTag::Equiv),
            Op::Xor => (BoolOp::Xor, OpTag::Xor),
            _ => unreachable!("combine2: {:?} is not a Boolean connective", op),
        };
        let LtlfTranslator {
            registry, cache, ..
        } = self;
        mgr.mt_apply2_leaves(left, right, boolop, cache, tag, 0, &mut |m, l, r| {
            let (lf, lb) = registry.leaf_to_formula(m, l);
            let (rf, rb) = registry.leaf_to_formula(m, r);
            let (res, bit) = match op {
                Op::And => (Formula::and(vec![lf, rf]), lb && rb),
                Op::Or => (Formula::or(vec![lf, rf]), lb || rb),
                Op::Implies => (Formula::implies(lf, rf), !lb || rb),
                Op::Equiv => (Formula::equiv(lf, rf), lb == rb),
                Op::Xor => (Formula::xor(lf, rf), lb != rb),
                _ => unreachable!(),
            };
            registry.formula_to_terminal_bdd(m, &res, bit)
        })
    }

    fn combine_not(&mut self, mgr: &mut MtBddManager, b: BddId) -> BddId {
        let LtlfTranslator {
            registry, cache, ..
        } = self;
        mgr.mt_apply1(
            b,
            cache,
            OpTag::Not,
            0,
            BddId::TRUE,
            BddId::FALSE,
            &mut |m, v| {
                let f = Formula::not(registry.terminal_to_formula(v));
                registry.formula_to_terminal(m, &f, v & 1 == 0)
            },
        )
    }

    /// The one-step MTBDD of a formula.
    pub fn ltlf_to_mtbdd(&mut self, mgr: &mut MtBddManager, f: &Formula) -> BddId {
        if let Some(&hit) = self.formula_to_bdd.get(f) {
            return hit;
        }
        let res = match f.kind() {
            Op::True => BddId::TRUE,
            Op::False => BddId::FALSE,
            Op::Ap => {
                let v = mgr.register_proposition(f);
                mgr.ithvar(v)
            }
            Op::Not => {
                let sub = self.ltlf_to_mtbdd(mgr, &f[0]);
                // purely Boolean subformulas use the plain BDD layer,
                // whose cache entries are long-lived
                if f.is_boolean() {
                    mgr.not(sub)
                } else {
                    self.combine_not(mgr, sub)
                }
            }
            Op::Xor | Op::Implies | Op::Equiv => {
                let left = self.ltlf_to_mtbdd(mgr, &f[0]);
                let right = self.ltlf_to_mtbdd(mgr, &f[1]);
                if f.is_boolean() {
                    let op = match f.kind() {
                        Op::Xor => BoolOp::Xor,
                        Op::Implies => BoolOp::Implies,
                        _ => BoolOp::Biimp,
                    };
                    mgr.apply_bool(op, left, right)
                } else {
                    self.combine2(mgr, f.kind(), left, right)
                }
            }
            Op::And | Op::Or => {
                let mut res = self.ltlf_to_mtbdd(mgr, &f[0]);
                for sub in &f.children()[1..] {
                    let right = self.ltlf_to_mtbdd(mgr, sub);
                    res = self.combine2(mgr, f.kind(), res, right);
                }
                res
            }
            Op::X => self.registry.formula_to_terminal_bdd(mgr, &f[0], true),
            Op::StrongX => self.registry.formula_to_terminal_bdd(mgr, &f[0], false),
            Op::U | Op::W => {
                let f0 = self.ltlf_to_mtbdd(mgr, &f[0]);
                let f1 = self.ltlf_to_mtbdd(mgr, &f[1]);
                let term = self
                    .registry
                    .formula_to_terminal_bdd(mgr, f, f.kind() == Op::W);
                let cont = self.combine2(mgr, Op::And, f0, term);
                self.combine2(mgr, Op::Or, f1, cont)
            }
            Op::R | Op::M => {
                let f0 = self.ltlf_to_mtbdd(mgr, &f[0]);
                let f1 = self.ltlf_to_mtbdd(mgr, &f[1]);
                let term = self
                    .registry
                    .formula_to_terminal_bdd(mgr, f, f.kind() == Op::R);
                let stop = self.combine2(mgr, Op::Or, f0, term);
                self.combine2(mgr, Op::And, f1, stop)
            }
            Op::G => {
                let sub = self.ltlf_to_mtbdd(mgr, &f[0]);
                let term = self.registry.formula_to_terminal_bdd(mgr, f, true);
                self.combine2(mgr, Op::And, sub, term)
            }
            Op::F => {
                let sub = self.ltlf_to_mtbdd(mgr, &f[0]);
                let term = self.registry.formula_to_terminal_bdd(mgr, f, false);
                self.combine2(mgr, Op::Or, sub, term)
            }
        };
        self.formula_to_bdd.insert(f.clone(), res);
        res
    }

    /// Restriction used by the synthesis translations: accepting
    /// terminals become `⊤` (once the play may stop and accept, it
    /// should).
    fn restrict_bdd(&mut self, mgr: &mut MtBddManager, b: BddId, iter: u32) -> BddId {
        let (res, _) = mgr.mt_apply1_synthesis(b, &mut self.cache, OpTag::Strat, iter, &mut |v| {
            if v & 1 == 1 {
                (true, Some(BddId::TRUE))
            } else {
                (false, None)
            }
        });
        res
    }

    /// Game value of `b` under the one-step interpretation: accepting
    /// leaves win, other terminals do not (yet).
    fn restrict_bdd_bool(&mut self, mgr: &mut MtBddManager, b: BddId, iter: u32) -> bool {
        mgr.mt_quantify_to_bool(b, &mut self.cache, OpTag::StratBool, iter, &mut |v| {
            v & 1 == 1
        })
    }

    /// Main construction loop: translate `f` and every reachable
    /// successor formula into MTDFA states, optionally encoding each
    /// state into the back-propagation arena as it is built.
    fn translate(&mut self, mgr: &mut MtBddManager, f: &Formula, opts: &TranslateOpts) -> Result<Mtdfa> {
        let iter = self.bump_iteration();
        let mut dfa = Mtdfa::new(&self.dict);
        dfa.aps = f.atomic_props();

        let mut bdd_to_state: FxHashMap<BddId, u32> = FxHashMap::default();
        let mut terminal_to_state: FxHashMap<u32, u32> = FxHashMap::default();
        let mut states: Vec<BddId> = Vec::new();
        let mut names: Vec<Formula> = Vec::new();
        let mut new_rootnums: Vec<u32> = Vec::new();
        let mut todo: VecDeque<Formula> = VecDeque::new();

        let mut backprop = if opts.do_backprop {
            Some(BackpropEncoder::new(true))
        } else {
            None
        };
        let realsimp = match opts.outvars {
            Some(outvars) if opts.preprocess => Some(RealizabilitySimplifier::new(outvars)),
            _ => None,
        };

        // register the output variables up front (they are needed by
        // the quantification buffer), in formula discovery order
        let mut bddoutvars = BddId::TRUE;
        if let Some(outvars) = opts.outvars {
            let outputs: FxHashSet<Formula> = outvars.iter().map(|s| Formula::ap(s)).collect();
            for ap in collect_aps_in_order(f) {
                if outputs.contains(&ap) {
                    let v = mgr.register_proposition(&ap);
                    let lit = mgr.ithvar(v);
                    bddoutvars = mgr.apply_bool(BoolOp::And, bddoutvars, lit);
                }
            }
            dfa.set_controllable_variables(bddoutvars);
            mgr.mt_quantify_prepare(bddoutvars);
        }

        // reduce to a single state when one of the two leaf polarities
        // never shows up
        let mut has_accepting = false;
        let mut has_rejecting = false;

        todo.push_back(f.clone());
        while let Some(label) = if opts.bfs {
            todo.pop_front()
        } else {
            todo.pop_back()
        } {
            let label_term = self.registry.formula_to_int(mgr, &label);
            if terminal_to_state.contains_key(&label_term) {
                continue;
            }

            let mut b = BddId::FALSE;
            let mut b_done = false;
            if let Some(rs) = &realsimp {
                if !label.is_boolean() {
                    // try one-step realizability first, then one-step
                    // unrealizability on the dual rewrite
                    let g = ltlf_one_step_sat_rewrite(&label);
                    let (g, simpl_map) = rs.simplify(&g);
                    b = self.ltlf_to_mtbdd(mgr, &g);
                    if self.restrict_bdd_bool(mgr, b, iter) {
                        b_done = true;
                        if opts.realizability {
                            b = BddId::TRUE;
                        } else {
                            debug_assert!(!b.is_false());
                            let mut fix = BddId::TRUE;
                            for (ap, is_input, value) in &simpl_map {
                                if *is_input {
                                    continue;
                                }
                                let v = mgr.register_proposition(ap);
                                let lit = if *value { mgr.ithvar(v) } else { mgr.nithvar(v) };
                                fix = mgr.apply_bool(BoolOp::And, fix, lit);
                            }
                            b = mgr.apply_bool(BoolOp::And, b, fix);
                        }
                        if let Some(enc) = backprop.as_mut() {
                            enc.encode_state(mgr, label_term, b, None, &mut new_rootnums, None, false)?;
                        }
                    } else {
                        let g = ltlf_one_step_unsat_rewrite(&label, false);
                        let (g, _) = rs.simplify(&g);
                        let opt = self.ltlf_to_mtbdd(mgr, &g);
                        if !self.restrict_bdd_bool(mgr, opt, iter) {
                            // losing even under the optimistic rewrite
                            b_done = true;
                            b = BddId::FALSE;
                            if let Some(enc) = backprop.as_mut() {
                                enc.encode_state(
                                    mgr,
                                    label_term,
                                    BddId::FALSE,
                                    None,
                                    &mut new_rootnums,
                                    None,
                                    false,
                                )?;
                            }
                        }
                    }
                }
            }
            if !b_done {
                b = self.ltlf_to_mtbdd(mgr, &label);
                if opts.outvars.is_some() {
                    if opts.realizability && label.is_boolean() {
                        b = BddId::from_bool(self.restrict_bdd_bool(mgr, b, iter));
                    } else {
                        b = self.restrict_bdd(mgr, b, iter);
                    }
                    if let Some(enc) = backprop.as_mut() {
                        enc.encode_state(mgr, label_term, b, None, &mut new_rootnums, None, false)?;
                    }
                }
            }

            if opts.fuse_same_bdds {
                if let Some(&existing) = bdd_to_state.get(&b) {
                    terminal_to_state.insert(label_term, existing);
                    continue;
                }
            }
            let n = states.len() as u32;
            bdd_to_state.insert(b, n);
            states.push(b);
            names.push(label);
            terminal_to_state.insert(label_term, n);

            if let Some(enc) = backprop.as_mut() {
                if enc.root_is_determined(0) {
                    debug!("initial state determined after {} states", states.len());
                    break;
                }
                if enc.root_is_determined(label_term) {
                    new_rootnums.clear();
                    continue;
                }
                for root in new_rootnums.drain(..) {
                    todo.push_back(self.registry.int_to_formula[root as usize].clone());
                }
                continue;
            }

            for leaf in mgr.leaves_of(b) {
                if leaf.is_false() {
                    has_rejecting = true;
                    continue;
                }
                if leaf.is_true() {
                    has_accepting = true;
                    continue;
                }
                let term = mgr.terminal_value(leaf).expect("non-const leaf");
                if term & 1 == 1 {
                    has_accepting = true;
                } else {
                    has_rejecting = true;
                }
                if !terminal_to_state.contains_key(&(term / 2)) {
                    todo.push_back(self.registry.terminal_to_formula(term));
                }
            }
        }

        if let Some(enc) = backprop {
            return Ok(self.finalize_backprop(
                mgr,
                dfa,
                enc,
                states,
                names,
                &terminal_to_state,
                opts.realizability,
            ));
        }

        if opts.detect_empty_univ {
            if !has_accepting {
                dfa.states.push(BddId::FALSE);
                dfa.names.push(Formula::ff());
                return Ok(dfa);
            }
            if !has_rejecting {
                dfa.states.push(BddId::TRUE);
                dfa.names.push(Formula::tt());
                return Ok(dfa);
            }
        }

        // terminals currently hold formula ids; remap them to state
        // indices
        for state in states.iter_mut() {
            let LtlfTranslator { cache, .. } = self;
            *state = mgr.mt_apply1(
                *state,
                cache,
                OpTag::Rename,
                iter,
                BddId::FALSE,
                BddId::TRUE,
                &mut |_, v| 2 * terminal_to_state[&(v / 2)] + (v & 1),
            );
        }
        dfa.states = states;
        dfa.names = names;
        Ok(dfa)
    }

    /// Shared tail of the on-the-fly constructions: report
    /// realizability, or rewrite every state through the solved arena
    /// into a strategy automaton.
    #[allow(clippy::too_many_arguments)]
    fn finalize_backprop(
        &mut self,
        mgr: &mut MtBddManager,
        mut dfa: Mtdfa,
        enc: BackpropEncoder,
        mut states: Vec<BddId>,
        names: Vec<Formula>,
        terminal_to_state: &FxHashMap<u32, u32>,
        realizability: bool,
    ) -> Mtdfa {
        // an exhausted frontier with an undetermined initial state is
        // a loss: the remaining plays cycle forever
        let realizable = enc.root_winner(0);
        if realizability {
            if realizable {
                dfa.states.push(BddId::TRUE);
                dfa.names.push(Formula::tt());
            } else {
                dfa.states.push(BddId::FALSE);
                dfa.names.push(Formula::ff());
            }
            return dfa;
        }
        if !realizable {
            dfa.states.push(BddId::FALSE);
            dfa.names.push(Formula::ff());
            return dfa;
        }
        let iter = self.bump_iteration();
        for state in states.iter_mut() {
            let LtlfTranslator { cache, .. } = self;
            *state = mgr.mt_apply1_synthesis_with_choice(
                *state,
                cache,
                OpTag::FinalStrat,
                iter,
                &mut |node, low, high| enc.get_choice(node, low, high),
                &mut |m, v, leaf| {
                    if v & 1 == 1 {
                        return BddId::TRUE;
                    }
                    let t = v / 2;
                    if !enc.root_winner(t) {
                        return BddId::FALSE;
                    }
                    match terminal_to_state.get(&t) {
                        Some(&s) if s != t => m.terminal(2 * s),
                        Some(_) => leaf,
                        // winning but never expanded: not part of the
                        // strategy
                        None => BddId::FALSE,
                    }
                },
            );
        }
        dfa.states = states;
        dfa.names = names;
        dfa
    }

    /// Strict-DFS on-the-fly synthesis: depth-first exploration that
    /// never re-enters an already-built state, recomputing successors
    /// of undetermined states so the descent can continue below them.
    fn synthesis_with_strict_dfs(
        &mut self,
        mgr: &mut MtBddManager,
        f: &Formula,
        outvars: &[String],
        realizability: bool,
        preprocess: bool,
    ) -> Result<Mtdfa> {
        let iter = self.bump_iteration();
        let mut dfa = Mtdfa::new(&self.dict);
        dfa.aps = f.atomic_props();

        let realsimp = RealizabilitySimplifier::new(outvars);
        let mut enc = BackpropEncoder::new(true);
        let mut terminal_to_state: FxHashMap<u32, u32> = FxHashMap::default();
        let mut states: Vec<BddId> = Vec::new();
        let mut names: Vec<Formula> = Vec::new();
        let mut new_rootnums: Vec<u32> = Vec::new();
        let mut old_rootnums: Vec<u32> = Vec::new();
        // stack of MTBDD root numbers; prev entries (state, size)
        // mean: when todo is back to `size`, all successors of
        // `state` have been explored
        let mut todo: Vec<u32> = Vec::new();
        let mut prev: Vec<(u32, usize)> = Vec::new();

        let mut bddoutvars = BddId::TRUE;
        {
            let outputs: FxHashSet<Formula> = outvars.iter().map(|s| Formula::ap(s)).collect();
            for ap in collect_aps_in_order(f) {
                if outputs.contains(&ap) {
                    let v = mgr.register_proposition(&ap);
                    let lit = mgr.ithvar(v);
                    bddoutvars = mgr.apply_bool(BoolOp::And, bddoutvars, lit);
                }
            }
            dfa.set_controllable_variables(bddoutvars);
            mgr.mt_quantify_prepare(bddoutvars);
        }

        prev.push((0, 0));
        todo.push(self.registry.formula_to_int(mgr, f));
        while !todo.is_empty() {
            let Some(&(prev_state, size)) = prev.last() else {
                break;
            };
            // a determined ancestor: drop its pending successors
            if todo.len() >= size && enc.root_is_determined(prev_state) {
                todo.truncate(size);
                prev.pop();
                continue;
            }
            if todo.len() == size {
                // all successors explored without determining
                // prev_state; it cannot be declared losing, because
                // some successors may sit on the path leading here
                prev.pop();
                continue;
            }
            let label_term = match todo.pop() {
                Some(t) => t,
                None => break,
            };
            if terminal_to_state.contains_key(&label_term) {
                continue;
            }
            let label = self.registry.int_to_formula[label_term as usize].clone();

            let mut b = BddId::FALSE;
            let mut b_done = false;
            if preprocess && !label.is_boolean() {
                let g = ltlf_one_step_sat_rewrite(&label);
                let (g, simpl_map) = realsimp.simplify(&g);
                b = self.ltlf_to_mtbdd(mgr, &g);
                if self.restrict_bdd_bool(mgr, b, iter) {
                    b_done = true;
                    if realizability {
                        b = BddId::TRUE;
                    } else {
                        debug_assert!(!b.is_false());
                        let mut fix = BddId::TRUE;
                        for (ap, is_input, value) in &simpl_map {
                            if *is_input {
                                continue;
                            }
                            let v = mgr.register_proposition(ap);
                            let lit = if *value { mgr.ithvar(v) } else { mgr.nithvar(v) };
                            fix = mgr.apply_bool(BoolOp::And, fix, lit);
                        }
                        b = mgr.apply_bool(BoolOp::And, b, fix);
                    }
                    enc.encode_state(
                        mgr,
                        label_term,
                        b,
                        None,
                        &mut new_rootnums,
                        Some(&mut old_rootnums),
                        false,
                    )?;
                } else {
                    let g = ltlf_one_step_unsat_rewrite(&label, false);
                    let (g, _) = realsimp.simplify(&g);
                    let opt = self.ltlf_to_mtbdd(mgr, &g);
                    if !self.restrict_bdd_bool(mgr, opt, iter) {
                        b_done = true;
                        b = BddId::FALSE;
                        enc.encode_state(
                            mgr,
                            label_term,
                            BddId::FALSE,
                            None,
                            &mut new_rootnums,
                            Some(&mut old_rootnums),
                            false,
                        )?;
                    }
                }
            }
            if !b_done {
                b = self.ltlf_to_mtbdd(mgr, &label);
                if realizability && label.is_boolean() {
                    b = BddId::from_bool(self.restrict_bdd_bool(mgr, b, iter));
                } else {
                    b = self.restrict_bdd(mgr, b, iter);
                }
                enc.encode_state(
                    mgr,
                    label_term,
                    b,
                    None,
                    &mut new_rootnums,
                    Some(&mut old_rootnums),
                    true,
                )?;
            }

            let n = states.len() as u32;
            states.push(b);
            names.push(label);
            terminal_to_state.insert(label_term, n);

            if enc.root_is_determined(0) {
                break;
            }
            if enc.root_is_determined(label_term) {
                new_rootnums.clear();
                old_rootnums.clear();
                continue;
            }
            // schedule all successors depth-first
            prev.push((label_term, todo.len()));
            for root in new_rootnums.drain(..) {
                todo.push(root);
            }
            for root in old_rootnums.drain(..) {
                if !terminal_to_state.contains_key(&root) {
                    todo.push(root);
                }
            }
        }
        Ok(self.finalize_backprop(mgr, dfa, enc, states, names, &terminal_to_state, realizability))
    }
}

/// Atomic propositions in left-to-right first-occurrence order.
fn collect_aps_in_order(f: &Formula) -> Vec<Formula> {
    fn rec(f: &Formula, seen: &mut FxHashSet<Formula>, out: &mut Vec<Formula>) {
        if f.is(Op::Ap) {
            if seen.insert(f.clone()) {
                out.push(f.clone());
            }
            return;
        }
        for c in f.children() {
            rec(c, seen, out);
        }
    }
    let mut out = Vec::new();
    rec(f, &mut FxHashSet::default(), &mut out);
    out
}

/// Translate an LTLf formula into an MTDFA.
///
/// With `fuse_same_bdds`, states whose MTBDDs are identical are
/// coalesced on the fly.  With `simplify_terms`, the cheap absorption
/// rewrites run before propositional-equivalence interning.  With
/// `detect_empty_univ`, an automaton in which one leaf polarity never
/// occurs collapses to the single-state `⊥`/`⊤` automaton.
pub fn ltlf_to_mtdfa(
    f: &Formula,
    dict: &DictRef,
    fuse_same_bdds: bool,
    simplify_terms: bool,
    detect_empty_univ: bool,
) -> Result<Mtdfa> {
    let mut translator = LtlfTranslator::new(dict, simplify_terms);
    let mgr = &mut *dict.borrow_mut();
    translator.translate(
        mgr,
        f,
        &TranslateOpts {
            fuse_same_bdds,
            detect_empty_univ,
            outvars: None,
            do_backprop: false,
            realizability: false,
            preprocess: false,
            bfs: true,
        },
    )
}

/// Translate for synthesis: `outvars` are the system's variables, and
/// construction may interleave game solving depending on `backprop`.
///
/// The on-the-fly modes return the strategy automaton of a realizable
/// specification (the single-state `⊥` automaton when unrealizable;
/// with `realizability`, only the `⊤`/`⊥` verdict automaton).
/// `StateRefine` returns the restricted game automaton instead, to be
/// solved by [`crate::game::mtdfa_winning_strategy`] or the region
/// solvers.
#[allow(clippy::too_many_arguments)]
pub fn ltlf_to_mtdfa_for_synthesis(
    f: &Formula,
    dict: &DictRef,
    outvars: &[String],
    backprop: SynthesisBackprop,
    one_step_preprocess: bool,
    realizability: bool,
    fuse_same_bdds: bool,
    simplify_terms: bool,
    semantics: Semantics,
) -> Result<Mtdfa> {
    let mut translator = LtlfTranslator::new(dict, simplify_terms);
    let mgr = &mut *dict.borrow_mut();
    preregister_semantics(mgr, f, outvars, semantics);
    match backprop {
        SynthesisBackprop::DfsStrictNodes => {
            translator.synthesis_with_strict_dfs(mgr, f, outvars, realizability, one_step_preprocess)
        }
        mode => translator.translate(
            mgr,
            f,
            &TranslateOpts {
                fuse_same_bdds,
                detect_empty_univ: false,
                outvars: Some(outvars),
                do_backprop: mode != SynthesisBackprop::StateRefine,
                realizability,
                preprocess: one_step_preprocess,
                bfs: mode != SynthesisBackprop::DfsNodes,
            },
        ),
    }
}

/// Register the formula's variables so that the BDD order matches the
/// chosen semantics: inputs before outputs for Mealy, outputs first
/// for Moore.
pub fn preregister_semantics(
    mgr: &mut MtBddManager,
    f: &Formula,
    outvars: &[String],
    semantics: Semantics,
) {
    let outputs: FxHashSet<Formula> = outvars.iter().map(|s| Formula::ap(s)).collect();
    let aps = collect_aps_in_order(f);
    let (first, second): (Vec<&Formula>, Vec<&Formula>) = match semantics {
        Semantics::Mealy => aps.iter().partition(|ap| !outputs.contains(*ap)),
        Semantics::Moore => aps.iter().partition(|ap| outputs.contains(*ap)),
    };
    for ap in first.into_iter().chain(second) {
        mgr.register_proposition(ap);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::manager::new_dict;
    use crate::repr::parser::parse_ltlf;

    #[test]
    fn constants_translate_to_single_state() {
        let dict = new_dict();
        let t = ltlf_to_mtdfa(&Formula::tt(), &dict, true, true, true).unwrap();
        assert_eq!(t.states, vec![BddId::TRUE]);
        assert!(!t.is_empty());
        let f = ltlf_to_mtdfa(&Formula::ff(), &dict, true, true, true).unwrap();
        assert_eq!(f.states, vec![BddId::FALSE]);
        assert!(f.is_empty());
    }

    #[test]
    fn atom_has_shannon_root() {
        let dict = new_dict();
        let f = parse_ltlf("a").unwrap();
        let dfa = ltlf_to_mtdfa(&f, &dict, true, true, false).unwrap();
        let mgr = dict.borrow();
        let root = dfa.states[0];
        assert!(!mgr.is_leaf(root));
        assert_eq!(mgr.low(root), BddId::FALSE);
        assert_eq!(mgr.high(root), BddId::TRUE);
    }

    #[test]
    fn globally_a_is_one_state_loop() {
        let dict = new_dict();
        let f = parse_ltlf("G a").unwrap();
        let dfa = ltlf_to_mtdfa(&f, &dict, true, true, false).unwrap();
        assert_eq!(dfa.num_roots(), 1);
        let mgr = dict.borrow();
        let root = dfa.states[0];
        assert_eq!(mgr.low(root), BddId::FALSE);
        // high leads back to state 0, accepting
        assert_eq!(mgr.terminal_value(mgr.high(root)), Some(1));
        assert!(!dfa.is_empty());
        let stats = dfa.get_stats(false, false);
        assert_eq!(stats.states, 1);
    }

    #[test]
    fn strong_next_true_needs_two_states() {
        let dict = new_dict();
        let f = parse_ltlf("X[!]1").unwrap();
        let dfa = ltlf_to_mtdfa(&f, &dict, true, true, false).unwrap();
        assert_eq!(dfa.num_roots(), 2);
        let mgr = dict.borrow();
        // initial state unconditionally moves, non-accepting, into
        // the accepting sink
        assert_eq!(mgr.terminal_value(dfa.states[0]), Some(2));
        assert_eq!(dfa.states[1], BddId::TRUE);
    }

    #[test]
    fn until_language() {
        let dict = new_dict();
        let f = parse_ltlf("a U b").unwrap();
        let dfa = ltlf_to_mtdfa(&f, &dict, true, true, false).unwrap();
        let a = Formula::ap("a");
        let b = Formula::ap("b");
        let la = || vec![(a.clone(), true)];
        let lb = || vec![(b.clone(), true)];
        let lnone = Vec::new;
        assert!(dfa.accepts(&[lb()]));
        assert!(dfa.accepts(&[la(), lb()]));
        assert!(dfa.accepts(&[la(), la(), lb()]));
        assert!(!dfa.accepts(&[la()]));
        assert!(!dfa.accepts(&[lnone(), lb()]));
        assert!(!dfa.accepts(&[la(), lnone()]));
    }

    #[test]
    fn fuse_same_bdds_coalesces() {
        let dict = new_dict();
        // F a and (1 U a) produce the same MTBDD
        let f = parse_ltlf("F a | X(1 U a)").unwrap();
        let fused = ltlf_to_mtdfa(&f, &dict, true, true, false).unwrap();
        let unfused = ltlf_to_mtdfa(&f, &dict, false, true, false).unwrap();
        assert!(fused.num_roots() <= unfused.num_roots());
    }

    #[test]
    fn detect_universal_collapse() {
        let dict = new_dict();
        // every nonempty word satisfies this
        let f = parse_ltlf("a | !a").unwrap();
        let dfa = ltlf_to_mtdfa(&f, &dict, true, true, true).unwrap();
        assert_eq!(dfa.states, vec![BddId::TRUE]);
    }

    #[test]
    fn registry_first_seen_id_wins() {
        let dict = new_dict();
        let mut translator = LtlfTranslator::new(&dict, true);
        let mgr = &mut *dict.borrow_mut();
        let f = parse_ltlf("a | (Gb & Fc)").unwrap();
        let g = parse_ltlf("(a | Gb) & (a | Fc)").unwrap();
        let fi = translator.registry.formula_to_int(mgr, &f);
        let gi = translator.registry.formula_to_int(mgr, &g);
        assert_eq!(fi, gi);
        assert_eq!(translator.registry.terminal_to_formula(2 * fi), f);
    }
}
