//! Offline game solving over MTDFAs
//!
//! The reachability game is played on a solved-form MTDFA: the
//! environment picks the uncontrollable variables, the system the
//! controllable ones, and the system wins iff the play reaches an
//! accepting terminal.  Non-terminating plays lose (finite-word
//! semantics).  Three solvers are provided: a global region fixpoint,
//! a lazy work-list region (boolean and three-valued), and node-level
//! back-propagation through the arena.

use crate::builder::cache::{size_estimate_unary, ApplyCache, OpTag};
use crate::error::Result;
use crate::game::adjlist::AdjList;
use crate::game::backprop::BackpropGraph;
use crate::game::encoder::BackpropEncoder;
use crate::repr::dfa::{MealyMachine, MealyEdge};
use crate::repr::formula::Formula;
use crate::repr::mtbdd::BddId;
use crate::repr::mtdfa::Mtdfa;
use crate::repr::trival::Trival;
use log::debug;
use rustc_hash::FxHashMap;
use std::collections::VecDeque;

/// Reverse graph of the sub-automaton reachable from state 0 without
/// crossing accepting terminals.  States that can reach an accepting
/// terminal in one step are recorded as predecessors of state 0,
/// whose own predecessors are never needed.
fn build_reverse_of_reachable_graph(dfa: &Mtdfa) -> AdjList {
    let mgr = dfa.dict().borrow();
    let n = dfa.num_roots();
    let mut reverse = AdjList::new(n, n);
    reverse.new_states(n);

    let mut todo = VecDeque::new();
    let mut seen = vec![false; n];
    let mut seen_local: Vec<i64> = vec![-1; n];
    todo.push_back(0usize);
    seen[0] = true;
    while let Some(src) = todo.pop_front() {
        let mut has_acc = false;
        for leaf in mgr.leaves_of(dfa.states[src]) {
            if leaf.is_false() {
                continue;
            }
            let accepting = leaf.is_true()
                || mgr.terminal_value(leaf).is_some_and(|v| v & 1 == 1);
            if accepting {
                if !has_acc {
                    reverse.new_edge(0, src as u32);
                    has_acc = true;
                }
                continue;
            }
            let dst = (mgr.terminal_value(leaf).expect("non-const leaf") / 2) as usize;
            if dst == 0 {
                continue;
            }
            if seen_local[dst] == src as i64 {
                continue;
            }
            seen_local[dst] = src as i64;
            reverse.new_edge(dst as u32, src as u32);
            if !seen[dst] {
                todo.push_back(dst);
                seen[dst] = true;
            }
        }
    }
    reverse
}

/// Global region fixpoint: re-evaluate every undetermined state until
/// nothing changes.  Terminates in at most `num_roots` passes.
pub fn mtdfa_winning_region(dfa: &Mtdfa) -> Vec<bool> {
    let dict = dfa.dict().clone();
    let mgr = &mut *dict.borrow_mut();
    let mut cache = ApplyCache::new(size_estimate_unary(dfa.num_roots(), dfa.aps.len()));
    mgr.mt_quantify_prepare(dfa.controllable_variables());

    let n = dfa.num_roots();
    let mut winning = vec![false; n];
    let mut iteration = 0;
    loop {
        let mut changed = false;
        for i in 0..n {
            if winning[i] {
                continue;
            }
            // reading `winning` through the cache within one pass is
            // fine: stale values only delay a determination to the
            // next pass
            let win = {
                let winning = &winning;
                mgr.mt_quantify_to_bool(
                    dfa.states[i],
                    &mut cache,
                    OpTag::StratBool,
                    iteration,
                    &mut |v| v & 1 == 1 || winning[(v / 2) as usize],
                )
            };
            if win {
                winning[i] = true;
                changed = true;
            }
        }
        iteration += 1;
        if !changed {
            break;
        }
    }
    winning
}

/// Lazy region: a work list seeded with the predecessors of accepting
/// terminals; stops as soon as state 0 is determined winning.
pub fn mtdfa_winning_region_lazy(dfa: &Mtdfa) -> Vec<bool> {
    let rev = build_reverse_of_reachable_graph(dfa);
    let dict = dfa.dict().clone();
    let mgr = &mut *dict.borrow_mut();
    let mut cache = ApplyCache::new(size_estimate_unary(dfa.num_roots(), dfa.aps.len()));
    mgr.mt_quantify_prepare(dfa.controllable_variables());

    let n = dfa.num_roots();
    let mut winning = vec![false; n];
    let mut seen: Vec<i64> = vec![-1; n];
    let mut todo: VecDeque<u32> = rev.out(0).collect();
    let mut changed: Vec<u32> = Vec::new();

    let mut iteration: u32 = 0;
    'outer: while !todo.is_empty() {
        while let Some(i) = todo.pop_front() {
            let i = i as usize;
            if winning[i] {
                continue;
            }
            let win = {
                let winning = &winning;
                mgr.mt_quantify_to_bool(
                    dfa.states[i],
                    &mut cache,
                    OpTag::StratBool,
                    iteration,
                    &mut |v| v & 1 == 1 || winning[(v / 2) as usize],
                )
            };
            if win {
                winning[i] = true;
                if i == 0 {
                    break 'outer;
                }
                changed.push(i as u32);
            }
        }
        for i in changed.drain(..) {
            for p in rev.out(i) {
                if !winning[p as usize] && seen[p as usize] != iteration as i64 {
                    seen[p as usize] = iteration as i64;
                    todo.push_front(p);
                }
            }
        }
        iteration += 1;
    }
    winning
}

/// Three-valued lazy region: `Maybe` means undetermined; a definite
/// `False` is produced when even the optimistic reading of the
/// undetermined successors loses, enabling negative pruning.
pub fn mtdfa_winning_region_lazy3(dfa: &Mtdfa) -> Vec<Trival> {
    let rev = build_reverse_of_reachable_graph(dfa);
    let dict = dfa.dict().clone();
    let mgr = &mut *dict.borrow_mut();
    let mut cache = ApplyCache::new(size_estimate_unary(dfa.num_roots(), dfa.aps.len()));
    mgr.mt_quantify_prepare(dfa.controllable_variables());

    let n = dfa.num_roots();
    let mut winning: Vec<Trival> = vec![Trival::Maybe; n];
    let mut seen: Vec<i64> = vec![-1; n];
    let mut todo: VecDeque<u32> = rev.out(0).collect();
    let mut changed: Vec<u32> = Vec::new();

    let mut iteration: u32 = 0;
    'outer: while !todo.is_empty() {
        while let Some(i) = todo.pop_front() {
            let i = i as usize;
            if !winning[i].is_maybe() {
                continue;
            }
            let value = {
                let winning = &winning;
                mgr.mt_quantify_to_trival(
                    dfa.states[i],
                    &mut cache,
                    OpTag::StratTrival,
                    iteration,
                    &mut |v| {
                        if v & 1 == 1 {
                            Trival::True
                        } else {
                            winning[(v / 2) as usize]
                        }
                    },
                )
            };
            if !value.is_maybe() {
                winning[i] = value;
                if i == 0 {
                    break 'outer;
                }
                changed.push(i as u32);
            }
        }
        for i in changed.drain(..) {
            for p in rev.out(i) {
                if winning[p as usize].is_maybe() && seen[p as usize] != iteration as i64 {
                    seen[p as usize] = iteration as i64;
                    todo.push_front(p);
                }
            }
        }
        iteration += 1;
    }
    winning
}

fn restrict_as_game_core(dfa: &Mtdfa, winning: Option<&dyn Fn(usize) -> bool>) -> Mtdfa {
    let dict = dfa.dict().clone();
    let mgr = &mut *dict.borrow_mut();
    let mut cache = ApplyCache::new(size_estimate_unary(dfa.num_roots(), dfa.aps.len()));

    let mut res = Mtdfa::new(&dict);
    res.aps = dfa.aps.clone();
    res.set_controllable_variables(dfa.controllable_variables());
    let keep_names = dfa.names.len() == dfa.num_roots();

    // old terminal value (even) -> new terminal value
    let mut term_map: FxHashMap<u32, u32> = FxHashMap::default();
    term_map.insert(0, 0);
    let mut todo: VecDeque<u32> = VecDeque::new();
    todo.push_back(0);
    while let Some(state) = todo.pop_front() {
        let b = {
            let term_map = &mut term_map;
            let todo = &mut todo;
            mgr.mt_apply1_leaves(
                dfa.states[state as usize],
                &mut cache,
                OpTag::Leaves,
                0,
                &mut |m, leaf, value| {
                    let Some(v) = value else { return leaf };
                    if v & 1 == 1 {
                        return BddId::TRUE;
                    }
                    let dst = v / 2;
                    if let Some(winning) = winning {
                        if !winning(dst as usize) {
                            return BddId::FALSE;
                        }
                    }
                    let next = 2 * term_map.len() as u32;
                    let new_term = *term_map.entry(v).or_insert_with(|| {
                        todo.push_back(dst);
                        next
                    });
                    if new_term == v {
                        leaf
                    } else {
                        m.terminal(new_term)
                    }
                },
            )
        };
        res.states.push(b);
        if keep_names {
            res.names.push(dfa.names[state as usize].clone());
        }
    }
    res
}

/// Keep only the part of the automaton reachable without crossing
/// accepting terminals (which become `⊤`); states are renumbered in
/// discovery order.
pub fn mtdfa_restrict_as_game(dfa: &Mtdfa) -> Mtdfa {
    restrict_as_game_core(dfa, None)
}

/// As [`mtdfa_restrict_as_game`], additionally dropping transitions
/// into losing states.
pub fn mtdfa_restrict_as_game_winning(dfa: &Mtdfa, winning: &[bool]) -> Mtdfa {
    restrict_as_game_core(dfa, Some(&|i| winning[i]))
}

/// Three-valued variant: only definitely winning states survive.
pub fn mtdfa_restrict_as_game_winning3(dfa: &Mtdfa, winning: &[Trival]) -> Mtdfa {
    restrict_as_game_core(dfa, Some(&|i| winning[i].is_true()))
}

fn strategy_by_refinement(dfa: &Mtdfa) -> Mtdfa {
    let rev = build_reverse_of_reachable_graph(dfa);
    let dict = dfa.dict().clone();
    let mgr = &mut *dict.borrow_mut();
    let mut cache = ApplyCache::new(size_estimate_unary(dfa.num_roots(), dfa.aps.len()));
    mgr.mt_quantify_prepare(dfa.controllable_variables());

    let mut res = Mtdfa::new(&dict);
    res.aps = dfa.aps.clone();
    res.set_controllable_variables(dfa.controllable_variables());
    res.states = dfa.states.clone();
    res.names = dfa.names.clone();

    let n = res.states.len();
    let mut winning = vec![false; n];
    let mut seen: Vec<i64> = vec![-1; n];
    let mut todo: VecDeque<u32> = rev.out(0).collect();
    let mut changed: Vec<u32> = Vec::new();

    let mut iteration: u32 = 0;
    'outer: while !todo.is_empty() {
        while let Some(i) = todo.pop_front() {
            let i = i as usize;
            // i may have been scheduled before it was known winning
            if winning[i] {
                continue;
            }
            let (rewritten, win) = {
                let winning = &winning;
                mgr.mt_apply1_synthesis(
                    res.states[i],
                    &mut cache,
                    OpTag::Strat,
                    iteration,
                    &mut |v| {
                        if v & 1 == 1 {
                            (true, Some(BddId::TRUE))
                        } else {
                            (winning[(v / 2) as usize], None)
                        }
                    },
                )
            };
            res.states[i] = rewritten;
            if win {
                winning[i] = true;
                if i == 0 {
                    break 'outer;
                }
                changed.push(i as u32);
            }
        }
        for i in changed.drain(..) {
            for p in rev.out(i) {
                if !winning[p as usize] && seen[p as usize] != iteration as i64 {
                    seen[p as usize] = iteration as i64;
                    todo.push_front(p);
                }
            }
        }
        iteration += 1;
    }

    for i in 0..n {
        if !winning[i] {
            res.states[i] = BddId::FALSE;
        }
    }
    res
}

fn strategy_by_backprop(dfa: &Mtdfa) -> Result<Mtdfa> {
    let dict = dfa.dict().clone();
    let outputs = dfa.controllable_variables();
    let mut enc = BackpropEncoder::new(false);
    {
        let mgr = &mut *dict.borrow_mut();
        mgr.mt_quantify_prepare(outputs);
        let mut rootnums = Vec::new();
        for (i, &b) in dfa.states.iter().enumerate() {
            if enc.encode_state(mgr, i as u32, b, None, &mut rootnums, None, false)? {
                break;
            }
            rootnums.clear();
        }
    }
    let mut res = Mtdfa::new(&dict);
    res.set_controllable_variables(outputs);
    if !enc.root_winner(0) {
        res.states.push(BddId::FALSE);
        res.names.push(Formula::ff());
        return Ok(res);
    }
    res.aps = dfa.aps.clone();
    res.names = dfa.names.clone();
    let mgr = &mut *dict.borrow_mut();
    let mut cache = ApplyCache::new(size_estimate_unary(dfa.num_roots(), dfa.aps.len()));
    for &b in &dfa.states {
        let rewritten = mgr.mt_apply1_synthesis_with_choice(
            b,
            &mut cache,
            OpTag::FinalStrat,
            0,
            &mut |node, low, high| enc.get_choice(node, low, high),
            &mut |_, v, leaf| {
                if v & 1 == 1 {
                    return BddId::TRUE;
                }
                if !enc.root_winner(v / 2) {
                    return BddId::FALSE;
                }
                leaf
            },
        );
        res.states.push(rewritten);
    }
    Ok(res)
}

/// Extract a winning strategy as a restricted MTDFA: accepting
/// terminals become `⊤`, losing destinations `⊥`, and (with
/// `backprop`) every system decision node keeps only its chosen
/// child.  An unrealizable game yields the single-state `⊥`
/// automaton.
pub fn mtdfa_winning_strategy(dfa: &Mtdfa, backprop: bool) -> Result<Mtdfa> {
    if backprop {
        strategy_by_backprop(dfa)
    } else {
        Ok(strategy_by_refinement(dfa))
    }
}

/// Convert a strategy MTDFA into a Mealy machine.  Consecutive edges
/// sharing their destination and the controllable projection of their
/// label are merged.
pub fn mtdfa_strategy_to_mealy(strategy: &Mtdfa, labels: bool) -> MealyMachine {
    let dict = strategy.dict().clone();
    let mgr = &mut *dict.borrow_mut();
    let outputs = strategy.controllable_variables();
    mgr.mt_quantify_prepare(outputs);

    let mut mealy = MealyMachine::new(outputs);
    let want_names = labels && strategy.names.len() == strategy.num_roots();
    let mut names: Vec<String> = Vec::new();

    let mut bdd_to_state: FxHashMap<BddId, u32> = FxHashMap::default();
    let mut states: Vec<BddId> = Vec::new();

    // state_index None stands for the accepting sink
    let mut map_state = |mealy: &mut MealyMachine,
                         states: &mut Vec<BddId>,
                         names: &mut Vec<String>,
                         state_index: Option<usize>| {
        let succs = match state_index {
            Some(i) => strategy.states[i],
            None => BddId::TRUE,
        };
        if let Some(&s) = bdd_to_state.get(&succs) {
            return s;
        }
        let s = mealy.new_state();
        bdd_to_state.insert(succs, s);
        states.push(succs);
        if want_names {
            names.push(match state_index {
                Some(i) => strategy.names[i].to_string(),
                None => "1".to_string(),
            });
        }
        s
    };

    map_state(&mut mealy, &mut states, &mut names, Some(0));
    let mut i = 0;
    while i < states.len() {
        let succs = states[i];
        let src = i as u32;
        i += 1;
        if succs.is_false() {
            continue;
        }
        if succs.is_true() {
            mealy.new_edge(src, src, BddId::TRUE);
            continue;
        }
        let mut paths = Vec::new();
        mgr.for_each_path(succs, &mut |lits, leaf| paths.push((lits.to_vec(), leaf)));
        let mut previous_output = BddId::FALSE;
        let mut previous_dst = u32::MAX;
        let mut previous_edge = usize::MAX;
        for (lits, leaf) in paths {
            let dst = match mgr.terminal_value(leaf) {
                Some(v) if v & 1 == 0 => Some((v / 2) as usize),
                // ⊤ and accepting terminals go to the sink
                _ => None,
            };
            let dst_idx = map_state(&mut mealy, &mut states, &mut names, dst);
            let output = mgr.cube_project_controllable(&lits);
            let cond = mgr.cube_of_literals(&lits);
            if previous_dst == dst_idx && previous_output == output {
                let edge: &mut MealyEdge = &mut mealy.edges[previous_edge];
                edge.cond = {
                    use crate::builder::manager::BoolOp;
                    mgr.apply_bool(BoolOp::Or, edge.cond, cond)
                };
                continue;
            }
            previous_edge = mealy.new_edge(src, dst_idx, cond);
            previous_dst = dst_idx;
            previous_output = output;
        }
    }
    if want_names {
        mealy.names = Some(names);
    }
    mealy
}

/// Encode a whole MTDFA into a back-propagation arena; with
/// `early_stop`, encoding stops once the initial state is determined.
pub fn mtdfa_to_backprop(dfa: &Mtdfa, early_stop: bool, preserve_names: bool) -> Result<BackpropGraph> {
    let dict = dfa.dict().clone();
    let mgr = &mut *dict.borrow_mut();
    mgr.mt_quantify_prepare(dfa.controllable_variables());
    let mut enc = BackpropEncoder::new(early_stop);
    let mut rootnums = Vec::new();
    for (i, &b) in dfa.states.iter().enumerate() {
        let name;
        let nameref = if preserve_names {
            name = match dfa.names.get(i) {
                Some(f) => f.to_string(),
                None => format!("state {}", i),
            };
            Some(name.as_str())
        } else {
            None
        };
        let determined = enc.encode_state(mgr, i as u32, b, nameref, &mut rootnums, None, false)?;
        rootnums.clear();
        if determined && early_stop {
            debug!("initial vertex determined after encoding {} states", i + 1);
            break;
        }
    }
    Ok(enc.graph)
}
