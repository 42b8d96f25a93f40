//! Explicit automata: transition graphs and Mealy machines
//!
//! These are the exchange formats of the crate's boundary: an
//! [`Mtdfa`](crate::repr::mtdfa::Mtdfa) can be expanded into a
//! [`DfaGraph`] (and read back with [`dfa_to_mtdfa`]), and a solved
//! strategy is delivered as a [`MealyMachine`].  Serialization to
//! HOA/AIGER is left to external tools; DOT output is provided for
//! inspection.

use crate::builder::manager::{DictRef, MtBddManager};
use crate::error::{Error, Result};
use crate::repr::mtbdd::BddId;
use crate::repr::mtdfa::{escape_dot, Mtdfa};
use rustc_hash::FxHashMap;
use std::io::{self, Write};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DfaEdge {
    pub src: u32,
    pub dst: u32,
    pub cond: BddId,
    pub accepting: bool,
}

/// An explicit deterministic transition graph.  State 0 is initial.
/// With `state_based`, all out-edges of a state share their accepting
/// bit and acceptance is a state property.
pub struct DfaGraph {
    num_states: u32,
    pub state_based: bool,
    pub edges: Vec<DfaEdge>,
    pub names: Option<Vec<String>>,
}

impl DfaGraph {
    pub fn new(state_based: bool) -> DfaGraph {
        DfaGraph {
            num_states: 0,
            state_based,
            edges: Vec::new(),
            names: None,
        }
    }

    pub fn new_state(&mut self) -> u32 {
        let s = self.num_states;
        self.num_states += 1;
        s
    }

    pub fn num_states(&self) -> usize {
        self.num_states as usize
    }

    pub fn new_edge(&mut self, src: u32, dst: u32, cond: BddId, accepting: bool) {
        self.edges.push(DfaEdge {
            src,
            dst,
            cond,
            accepting,
        });
    }

    pub fn out(&self, src: u32) -> impl Iterator<Item = &DfaEdge> {
        self.edges.iter().filter(move |e| e.src == src)
    }

    pub fn state_accepting(&self, s: u32) -> bool {
        self.out(s).any(|e| e.accepting)
    }

    /// Merge edges that share source, destination and accepting bit by
    /// disjoining their conditions.
    pub fn merge_edges(&mut self, mgr: &mut MtBddManager) {
        use crate::builder::manager::BoolOp;
        let mut merged: FxHashMap<(u32, u32, bool), BddId> = FxHashMap::default();
        let mut order = Vec::new();
        for e in &self.edges {
            let key = (e.src, e.dst, e.accepting);
            match merged.get_mut(&key) {
                Some(cond) => *cond = mgr.apply_bool(BoolOp::Or, *cond, e.cond),
                None => {
                    merged.insert(key, e.cond);
                    order.push(key);
                }
            }
        }
        self.edges = order
            .into_iter()
            .map(|(src, dst, accepting)| DfaEdge {
                src,
                dst,
                cond: merged[&(src, dst, accepting)],
                accepting,
            })
            .collect();
    }

    pub fn print_dot(&self, mgr: &MtBddManager, out: &mut dyn Write) -> io::Result<()> {
        writeln!(out, "digraph dfa {{\n  rankdir=LR;\n  node [shape=circle];")?;
        writeln!(out, "  I [label=\"\", style=invis, width=0];\n  I -> 0;")?;
        for s in 0..self.num_states {
            let label = match &self.names {
                Some(n) if (s as usize) < n.len() => escape_dot(&n[s as usize]),
                _ => s.to_string(),
            };
            let peripheries = if self.state_based && self.state_accepting(s) {
                ", peripheries=2"
            } else {
                ""
            };
            writeln!(out, "  {} [label=\"{}\"{}];", s, label, peripheries)?;
        }
        for e in &self.edges {
            writeln!(
                out,
                "  {} -> {} [label=\"{}\"{}];",
                e.src,
                e.dst,
                cond_label(mgr, e.cond),
                if !self.state_based && e.accepting {
                    ", style=bold"
                } else {
                    ""
                }
            )?;
        }
        writeln!(out, "}}")
    }
}

/// Render a guard BDD as a disjunction of cubes for display.
pub(crate) fn cond_label(mgr: &MtBddManager, cond: BddId) -> String {
    if cond.is_true() {
        return "1".to_string();
    }
    if cond.is_false() {
        return "0".to_string();
    }
    let mut cubes = Vec::new();
    mgr.for_each_path(cond, &mut |lits, leaf| {
        if leaf.is_true() {
            let cube: Vec<String> = lits
                .iter()
                .map(|l| {
                    let name = mgr
                        .ap_of_var(l.label())
                        .map(|f| f.to_string())
                        .unwrap_or_else(|| format!("var{}", l.label().value()));
                    if l.polarity() {
                        name
                    } else {
                        format!("!{}", name)
                    }
                })
                .collect();
            cubes.push(if cube.is_empty() {
                "1".to_string()
            } else {
                cube.join(" & ")
            });
        }
    });
    cubes.join(" | ")
}

/// Convert an explicit deterministic, complete DFA back into an MTDFA.
/// The initial state becomes state 0 and accepting `⊤` sinks are
/// folded into the constant.
pub fn dfa_to_mtdfa(graph: &DfaGraph, dict: &DictRef) -> Result<Mtdfa> {
    use crate::builder::manager::BoolOp;
    let mut mgr = dict.borrow_mut();
    let n = graph.num_states() as u32;

    // determinism check: within one source, conditions are disjoint
    for s in 0..n {
        let mut seen = BddId::FALSE;
        for e in graph.out(s) {
            let overlap = mgr.apply_bool(BoolOp::And, seen, e.cond);
            if !overlap.is_false() {
                return Err(Error::NotDeterministic);
            }
            seen = mgr.apply_bool(BoolOp::Or, seen, e.cond);
        }
    }

    // remap: initial state to 0, accepting true-sinks removed
    let mut remap: Vec<Option<u32>> = Vec::with_capacity(n as usize);
    let mut next = 1;
    for i in 0..n {
        if i == 0 {
            remap.push(Some(0));
            continue;
        }
        let sink = graph
            .out(i)
            .any(|e| e.dst == i && e.accepting && e.cond.is_true());
        if sink {
            remap.push(None);
            continue;
        }
        remap.push(Some(next));
        next += 1;
    }

    let mut dfa = Mtdfa::new(dict);
    dfa.states = vec![BddId::FALSE; next as usize];
    for i in 0..n {
        let Some(state) = remap[i as usize] else {
            continue;
        };
        let mut b = BddId::FALSE;
        for e in graph.out(i) {
            let term = match remap[e.dst as usize] {
                None => BddId::TRUE, // accepting sink
                Some(dst) => {
                    let accepting = if graph.state_based {
                        graph.state_accepting(e.dst)
                    } else {
                        e.accepting
                    };
                    mgr.terminal(2 * dst + accepting as u32)
                }
            };
            // guard ∧ terminal: the guard is a plain BDD, so the
            // conjunction grafts the leaf under each satisfying path
            let part = and_guard_leaf(&mut mgr, e.cond, term);
            b = or_disjoint(&mut mgr, b, part);
        }
        dfa.states[state as usize] = b;
    }
    Ok(dfa)
}

/// `guard ∧ leaf` for a plain-BDD guard and an arbitrary leaf.
fn and_guard_leaf(mgr: &mut MtBddManager, guard: BddId, leaf: BddId) -> BddId {
    if guard.is_false() {
        return BddId::FALSE;
    }
    if guard.is_true() {
        return leaf;
    }
    let (var, low, high) = (mgr.var(guard), mgr.low(guard), mgr.high(guard));
    let l = and_guard_leaf(mgr, low, leaf);
    let h = and_guard_leaf(mgr, high, leaf);
    mgr.mk_node(var, l, h)
}

/// Union of MTBDDs with disjoint supports of non-⊥ paths.
fn or_disjoint(mgr: &mut MtBddManager, a: BddId, b: BddId) -> BddId {
    if a.is_false() {
        return b;
    }
    if b.is_false() {
        return a;
    }
    let (la, lb) = (mgr.level(a), mgr.level(b));
    let level = la.min(lb);
    if level == u32::MAX {
        // two non-⊥ leaves on one path would mean the input graph was
        // not deterministic, which was checked beforehand
        unreachable!("or_disjoint: overlapping guards");
    }
    let (a0, a1) = if la == level {
        (mgr.low(a), mgr.high(a))
    } else {
        (a, a)
    };
    let (b0, b1) = if lb == level {
        (mgr.low(b), mgr.high(b))
    } else {
        (b, b)
    };
    let l = or_disjoint(mgr, a0, b0);
    let h = or_disjoint(mgr, a1, b1);
    mgr.mk_node(crate::repr::var_label::VarLabel::new(level), l, h)
}

/// A Mealy machine extracted from a winning strategy.
pub struct MealyMachine {
    num_states: u32,
    pub edges: Vec<MealyEdge>,
    pub names: Option<Vec<String>>,
    /// Cube of the controllable (output) variables.
    pub synthesis_outputs: BddId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MealyEdge {
    pub src: u32,
    pub dst: u32,
    pub cond: BddId,
}

impl MealyMachine {
    pub fn new(synthesis_outputs: BddId) -> MealyMachine {
        MealyMachine {
            num_states: 0,
            edges: Vec::new(),
            names: None,
            synthesis_outputs,
        }
    }

    pub fn new_state(&mut self) -> u32 {
        let s = self.num_states;
        self.num_states += 1;
        s
    }

    pub fn num_states(&self) -> usize {
        self.num_states as usize
    }

    pub fn new_edge(&mut self, src: u32, dst: u32, cond: BddId) -> usize {
        self.edges.push(MealyEdge { src, dst, cond });
        self.edges.len() - 1
    }

    pub fn out(&self, src: u32) -> impl Iterator<Item = &MealyEdge> {
        self.edges.iter().filter(move |e| e.src == src)
    }

    pub fn print_dot(&self, mgr: &MtBddManager, out: &mut dyn Write) -> io::Result<()> {
        writeln!(out, "digraph mealy {{\n  rankdir=LR;\n  node [shape=circle];")?;
        writeln!(out, "  I [label=\"\", style=invis, width=0];\n  I -> 0;")?;
        for s in 0..self.num_states {
            let label = match &self.names {
                Some(n) if (s as usize) < n.len() => escape_dot(&n[s as usize]),
                _ => s.to_string(),
            };
            writeln!(out, "  {} [label=\"{}\"];", s, label)?;
        }
        for e in &self.edges {
            writeln!(
                out,
                "  {} -> {} [label=\"{}\"];",
                e.src,
                e.dst,
                cond_label(mgr, e.cond)
            )?;
        }
        writeln!(out, "}}")
    }
}
