//! Transition-based deterministic finite automata over MTBDDs
//!
//! An [`Mtdfa`] stores one MTBDD root per state: the root-to-leaf paths
//! of `states[i]` are the outgoing transitions of state `i`, and each
//! leaf is either a Boolean constant or a terminal whose value encodes
//! `2 * destination + accepting_bit`.  State 0 is always initial.

use crate::builder::manager::DictRef;
use crate::error::{Error, Result};
use crate::repr::dfa::DfaGraph;
use crate::repr::formula::Formula;
use crate::repr::mtbdd::BddId;
use rustc_hash::{FxHashMap, FxHashSet};
use serde::Serialize;
use std::io::{self, Write};
use std::rc::Rc;

pub struct Mtdfa {
    dict: DictRef,
    /// `states[i]` is the MTBDD of state `i`'s outgoing transitions.
    pub states: Vec<BddId>,
    /// Optional display labels, one per state when non-empty.
    pub names: Vec<Formula>,
    /// Atomic propositions of the automaton, sorted by name.
    pub aps: Vec<Formula>,
    controllable: BddId,
}

/// Statistics returned by [`Mtdfa::get_stats`].
#[derive(Debug, Default, Clone, Serialize)]
pub struct MtdfaStats {
    pub states: usize,
    pub aps: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nodes: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub terminals: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub has_true: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub has_false: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub edges: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub paths: Option<usize>,
}

impl Mtdfa {
    pub fn new(dict: &DictRef) -> Mtdfa {
        Mtdfa {
            dict: dict.clone(),
            states: Vec::new(),
            names: Vec::new(),
            aps: Vec::new(),
            controllable: BddId::TRUE,
        }
    }

    pub fn dict(&self) -> &DictRef {
        &self.dict
    }

    pub fn same_dict(&self, other: &Mtdfa) -> bool {
        Rc::ptr_eq(&self.dict, &other.dict)
    }

    pub fn num_roots(&self) -> usize {
        self.states.len()
    }

    /// Conjunction of the variables owned by the system player.
    pub fn controllable_variables(&self) -> BddId {
        self.controllable
    }

    pub fn set_controllable_variables(&mut self, cube: BddId) {
        self.controllable = cube;
    }

    /// Declare controllable variables by atomic-proposition name.
    pub fn set_controllable_variables_by_names(
        &mut self,
        names: &[String],
        ignore_unregistered: bool,
    ) -> Result<()> {
        let mut vars = Vec::new();
        {
            let mgr = self.dict.borrow();
            for name in names {
                match mgr.var_of_ap(&Formula::ap(name)) {
                    Some(v) => vars.push(v),
                    None if ignore_unregistered => {}
                    None => {
                        return Err(Error::UnsupportedOperator(
                            "controllable proposition is not registered",
                        ))
                    }
                }
            }
        }
        let cube = self.dict.borrow_mut().cube_of_vars(&vars);
        self.controllable = cube;
        Ok(())
    }

    /// True when no accepting leaf occurs in any state's MTBDD.
    pub fn is_empty(&self) -> bool {
        let mgr = self.dict.borrow();
        !self.states.iter().any(|&b| {
            mgr.leaves_of(b).into_iter().any(|leaf| {
                leaf.is_true() || mgr.terminal_value(leaf).is_some_and(|v| v & 1 == 1)
            })
        })
    }

    /// Membership of one finite word.  Each letter assigns the listed
    /// atomic propositions; unlisted ones are false.  The empty word
    /// is never accepted (LTLf traces are non-empty).
    pub fn accepts(&self, word: &[Vec<(Formula, bool)>]) -> bool {
        let mgr = self.dict.borrow();
        let mut current = self.states[0];
        for (pos, letter) in word.iter().enumerate() {
            let mut assign: FxHashMap<u32, bool> = FxHashMap::default();
            for (ap, value) in letter {
                if let Some(v) = mgr.var_of_ap(ap) {
                    assign.insert(v.value(), *value);
                }
            }
            let leaf = mgr.eval(current, &|v| assign.get(&v.value()).copied().unwrap_or(false));
            if leaf.is_false() {
                return false;
            }
            if leaf.is_true() {
                return true;
            }
            let value = mgr.terminal_value(leaf).unwrap();
            if pos + 1 == word.len() {
                return value & 1 == 1;
            }
            current = self.states[(value / 2) as usize];
        }
        false // empty word
    }

    pub fn get_stats(&self, nodes: bool, paths: bool) -> MtdfaStats {
        let mut stats = MtdfaStats {
            states: self.states.len(),
            aps: self.aps.len(),
            ..Default::default()
        };
        let mgr = self.dict.borrow();
        if nodes {
            let counts = mgr.count_nodes(&self.states);
            stats.nodes = Some(counts.nodes);
            stats.terminals = Some(counts.terminals);
            stats.has_true = Some(counts.has_true);
            stats.has_false = Some(counts.has_false);
        }
        if paths {
            let mut edges = 0;
            let mut npaths = 0;
            for &b in &self.states {
                let mut terms = FxHashSet::default();
                mgr.for_each_path(b, &mut |_, leaf| {
                    npaths += 1;
                    terms.insert(leaf);
                });
                edges += terms.len();
            }
            stats.edges = Some(edges);
            stats.paths = Some(npaths);
        }
        stats
    }

    /// Convert to an explicit transition graph.  With `state_based`,
    /// terminal identity is expanded into states so that acceptance
    /// becomes a state property.
    pub fn as_dfa(&self, state_based: bool, labels: bool) -> DfaGraph {
        let mut mgr = self.dict.borrow_mut();
        let want_names = labels && self.names.len() == self.states.len();
        if !state_based {
            let mut graph = DfaGraph::new(false);
            let mut names = if want_names { Some(Vec::new()) } else { None };
            for i in 0..self.states.len() {
                graph.new_state();
                if let Some(n) = names.as_mut() {
                    n.push(self.names[i].to_string());
                }
            }
            let mut true_state = None;
            for (i, &b) in self.states.iter().enumerate() {
                let mut paths = Vec::new();
                mgr.for_each_path(b, &mut |lits, leaf| paths.push((lits.to_vec(), leaf)));
                for (lits, leaf) in paths {
                    let cond = mgr.cube_of_literals(&lits);
                    if leaf.is_true() {
                        let t = *true_state.get_or_insert_with(|| {
                            let t = graph.new_state();
                            if let Some(n) = names.as_mut() {
                                n.push("1".to_string());
                            }
                            t
                        });
                        graph.new_edge(i as u32, t, cond, true);
                    } else {
                        let v = mgr.terminal_value(leaf).unwrap();
                        graph.new_edge(i as u32, v / 2, cond, v & 1 == 1);
                    }
                }
            }
            if let Some(t) = true_state {
                graph.new_edge(t, t, BddId::TRUE, true);
            }
            graph.names = names;
            graph.merge_edges(&mut mgr);
            graph
        } else {
            // state-based: states of the result are the distinct
            // leaves reached, acceptance comes from the leaf's bit
            let mut graph = DfaGraph::new(true);
            let mut names = if want_names { Some(Vec::new()) } else { None };
            let mut leaf_to_state: FxHashMap<BddId, u32> = FxHashMap::default();
            let init = mgr.terminal(0);
            let mut worklist = vec![init];
            leaf_to_state.insert(init, graph.new_state());
            let mut dead_accepting = Vec::new();
            let mut index = 0;
            while index < worklist.len() {
                let src_leaf = worklist[index];
                let src = index as u32;
                index += 1;
                if src_leaf.is_true() {
                    graph.new_edge(src, src, BddId::TRUE, true);
                    if let Some(n) = names.as_mut() {
                        n.push("1".to_string());
                    }
                    continue;
                }
                let value = mgr.terminal_value(src_leaf).unwrap();
                let accepting = value & 1 == 1;
                let state_index = (value / 2) as usize;
                if let Some(n) = names.as_mut() {
                    n.push(self.names[state_index].to_string());
                }
                let mut paths = Vec::new();
                mgr.for_each_path(self.states[state_index], &mut |lits, leaf| {
                    paths.push((lits.to_vec(), leaf))
                });
                let mut has_edge = false;
                for (lits, leaf) in paths {
                    let cond = mgr.cube_of_literals(&lits);
                    let dst = *leaf_to_state.entry(leaf).or_insert_with(|| {
                        worklist.push(leaf);
                        graph.new_state()
                    });
                    graph.new_edge(src, dst, cond, accepting);
                    has_edge = true;
                }
                if accepting && !has_edge {
                    dead_accepting.push(src);
                }
            }
            graph.names = names;
            graph.merge_edges(&mut mgr);
            // only add the ⊥ self-loop after merging
            for s in dead_accepting {
                graph.new_edge(s, s, BddId::FALSE, true);
            }
            graph
        }
    }

    /// Write the automaton in DOT format.  With `state` set, only that
    /// state's MTBDD is rendered.  With `labels`, states are labeled
    /// by their formula names.
    pub fn print_dot(
        &self,
        out: &mut dyn Write,
        state: Option<usize>,
        labels: bool,
    ) -> io::Result<()> {
        let mgr = self.dict.borrow();
        let ns = self.names.len();
        writeln!(out, "digraph mtdfa {{\n  rankdir=TB;\n  node [shape=circle];")?;
        let (statemin, statemax) = match state {
            Some(s) if s < self.states.len() => (s, s + 1),
            _ => (0, self.states.len()),
        };
        let mut edges = String::new();
        if state.is_none() {
            writeln!(
                out,
                "  {{ rank = source; I [label=\"\", style=invis, width=0]; }}"
            )?;
            edges.push_str("  I -> S0 [tooltip=\"initial state\"]\n");
        }
        for i in statemin..statemax {
            let label = if labels && i < ns {
                escape_dot(&self.names[i].to_string())
            } else {
                i.to_string()
            };
            writeln!(
                out,
                "  S{} [shape=box, style=\"filled,rounded\", fillcolor=\"#e9f4fb\", label=\"{}\"];",
                i, label
            )?;
            edges.push_str(&format!(
                "  S{} -> B{} [tooltip=\"[{}]\"];\n",
                i,
                self.states[i].value(),
                i
            ));
        }
        let controllable: FxHashSet<u32> = mgr
            .cube_vars(self.controllable)
            .into_iter()
            .map(|v| v.value())
            .collect();
        // collect the BDD nodes reachable from the printed roots
        let mut seen = FxHashSet::default();
        let mut todo: Vec<BddId> = Vec::new();
        for i in statemin..statemax {
            if seen.insert(self.states[i]) {
                todo.push(self.states[i]);
            }
        }
        while let Some(n) = todo.pop() {
            if n.is_const() {
                writeln!(
                    out,
                    "  B{} [shape=square, style=filled, fillcolor=\"#ffe6cc\", label=\"{}\"{}];",
                    n.value(),
                    n.value(),
                    if n.is_true() { ", peripheries=2" } else { "" }
                )?;
                continue;
            }
            if let Some(t) = mgr.terminal_value(n) {
                let dst = (t / 2) as usize;
                let label = if labels && dst < ns {
                    escape_dot(&self.names[dst].to_string())
                } else {
                    dst.to_string()
                };
                writeln!(
                    out,
                    "  B{} [shape=box, style=\"filled,rounded\", fillcolor=\"#ffe5f1\", label=\"{}\"{}];",
                    n.value(),
                    label,
                    if t & 1 == 1 { ", peripheries=2" } else { "" }
                )?;
                continue;
            }
            let var = mgr.var(n);
            let label = match mgr.ap_of_var(var) {
                Some(ap) => escape_dot(&ap.to_string()),
                None => format!("var{}", var.value()),
            };
            let shape = if controllable.contains(&var.value()) {
                "diamond"
            } else {
                "circle"
            };
            writeln!(
                out,
                "  B{} [shape={}, style=filled, fillcolor=\"#ffffff\", label=\"{}\"];",
                n.value(),
                shape,
                label
            )?;
            let low = mgr.low(n);
            let high = mgr.high(n);
            if seen.insert(low) {
                todo.push(low);
            }
            if seen.insert(high) {
                todo.push(high);
            }
            edges.push_str(&format!(
                "  B{} -> B{} [style=dotted, tooltip=\"{}=0\"];\n  B{} -> B{} [style=filled, tooltip=\"{}=1\"];\n",
                n.value(),
                low.value(),
                label,
                n.value(),
                high.value(),
                label
            ));
        }
        write!(out, "{}", edges)?;
        writeln!(out, "}}")
    }
}

pub(crate) fn escape_dot(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}

/// Sorted union of two AP lists.
pub(crate) fn union_aps(left: &[Formula], right: &[Formula]) -> Vec<Formula> {
    let mut res = Vec::with_capacity(left.len() + right.len());
    let (mut i, mut j) = (0, 0);
    while i < left.len() && j < right.len() {
        match left[i].ap_name().cmp(&right[j].ap_name()) {
            std::cmp::Ordering::Less => {
                res.push(left[i].clone());
                i += 1;
            }
            std::cmp::Ordering::Greater => {
                res.push(right[j].clone());
                j += 1;
            }
            std::cmp::Ordering::Equal => {
                res.push(left[i].clone());
                i += 1;
                j += 1;
            }
        }
    }
    res.extend_from_slice(&left[i..]);
    res.extend_from_slice(&right[j..]);
    res
}
