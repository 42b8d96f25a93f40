//! Encoding MTBDD states into the back-propagation arena
//!
//! Every BDD node of a state's MTBDD becomes a vertex owned by the
//! player controlling its variable; terminals become single-successor
//! vertices linked to the vertex of the destination state, so that
//! determinations can flow from the constants back to the roots while
//! the automaton is still under construction.

use crate::builder::manager::MtBddManager;
use crate::error::Result;
use crate::game::backprop::BackpropGraph;
use crate::repr::mtbdd::BddId;
use rustc_hash::{FxHashMap, FxHashSet};
use std::collections::VecDeque;

pub struct BackpropEncoder {
    pub graph: BackpropGraph,
    rootnum_vertex: FxHashMap<u32, u32>,
    bdd_vertex: FxHashMap<BddId, u32>,
    // nodes already revisited during one recompute_succ encoding
    bdd_seen: FxHashSet<BddId>,
}

impl BackpropEncoder {
    pub fn new(stop_asap: bool) -> BackpropEncoder {
        BackpropEncoder {
            graph: BackpropGraph::new(stop_asap),
            rootnum_vertex: FxHashMap::default(),
            bdd_vertex: FxHashMap::default(),
            bdd_seen: FxHashSet::default(),
        }
    }

    pub fn root_is_determined(&self, root_number: u32) -> bool {
        match self.rootnum_vertex.get(&root_number) {
            Some(&v) => self.graph.is_determined(v),
            None => false,
        }
    }

    /// Winner of a root; an unknown or undetermined root counts as
    /// lost (an unresolved cycle is a loss under finite semantics).
    pub fn root_winner(&self, root_number: u32) -> bool {
        match self.rootnum_vertex.get(&root_number) {
            Some(&v) => self.graph.is_determined(v) && self.graph.winner(v),
            None => false,
        }
    }

    pub fn root_winner_set_if_unknown(&mut self, root_number: u32, winner: bool) -> Result<bool> {
        let v = self.rootnum_vertex[&root_number];
        if self.graph.is_determined(v) {
            return Ok(false);
        }
        self.graph.set_winner(v, winner)
    }

    fn rootnum_to_vertex(
        &mut self,
        t: u32,
        new_rootnums: &mut Vec<u32>,
        old_rootnums: &mut Option<&mut Vec<u32>>,
    ) -> u32 {
        if let Some(&v) = self.rootnum_vertex.get(&t) {
            if let Some(old) = old_rootnums.as_deref_mut() {
                old.push(t);
            }
            return v;
        }
        // owner does not matter: the vertex has a single successor
        let v = self.graph.new_vertex(false);
        self.rootnum_vertex.insert(t, v);
        new_rootnums.push(t);
        v
    }

    #[allow(clippy::too_many_arguments)]
    fn bdd_to_vertex(
        &mut self,
        mgr: &MtBddManager,
        b: BddId,
        recompute: bool,
        named: bool,
        todo: &mut VecDeque<(u32, BddId, BddId)>,
        new_rootnums: &mut Vec<u32>,
        old_rootnums: &mut Option<&mut Vec<u32>>,
    ) -> Result<u32> {
        let existing = self.bdd_vertex.get(&b).copied();
        if let Some(v) = existing {
            if !recompute || b.is_const() {
                return Ok(v);
            }
        }
        if b.is_const() {
            let v = self.graph.new_vertex(false);
            self.graph.set_winner(v, b.is_true())?;
            if named {
                self.graph.set_name(v, if b.is_true() { "true" } else { "false" });
            }
            self.bdd_vertex.insert(b, v);
            return Ok(v);
        }
        if recompute {
            // visit each node only once per encode_state call
            if !self.bdd_seen.insert(b) {
                return Ok(existing.expect("revisited node must be known"));
            }
        }
        if let Some(term) = mgr.terminal_value(b) {
            if recompute {
                if let Some(v) = existing {
                    if term & 1 == 1 {
                        return Ok(v);
                    }
                    return Ok(self.rootnum_to_vertex(term / 2, new_rootnums, old_rootnums));
                }
            }
            if term & 1 == 1 {
                // an accepting terminal is as good as ⊤
                let t = self.bdd_to_vertex(
                    mgr,
                    BddId::TRUE,
                    recompute,
                    named,
                    todo,
                    new_rootnums,
                    old_rootnums,
                )?;
                self.bdd_vertex.insert(b, t);
                return Ok(t);
            }
            let v = self.rootnum_to_vertex(term / 2, new_rootnums, old_rootnums);
            self.bdd_vertex.insert(b, v);
            return Ok(v);
        }
        if let Some(v) = existing {
            if self.graph.is_determined(v) {
                return Ok(v);
            }
            let (_, low, high) = mgr.quantified_low_high(b);
            todo.push_back((v, low, high));
            return Ok(v);
        }
        let (owner, low, high) = mgr.quantified_low_high(b);
        let v = self.graph.new_vertex(owner);
        self.bdd_vertex.insert(b, v);
        todo.push_back((v, low, high));
        Ok(v)
    }

    /// Encode the MTDFA state `root_number` (with transition MTBDD
    /// `mtbdd`) into the arena.  Root numbers found on terminals are
    /// reported through `new_rootnums`/`old_rootnums` depending on
    /// whether their vertex had to be created.
    ///
    /// With `recompute_succ`, the encoding descends through nodes that
    /// were already encoded as long as they are undetermined, so all
    /// undetermined successors are collected again; this is what the
    /// strict-DFS construction needs.
    ///
    /// Returns `Ok(true)` as soon as vertex 0 is determined.
    #[allow(clippy::too_many_arguments)]
    pub fn encode_state(
        &mut self,
        mgr: &MtBddManager,
        root_number: u32,
        mtbdd: BddId,
        name: Option<&str>,
        new_rootnums: &mut Vec<u32>,
        mut old_rootnums: Option<&mut Vec<u32>>,
        recompute_succ: bool,
    ) -> Result<bool> {
        if recompute_succ {
            self.bdd_seen.clear();
        }
        let named = name.is_some();
        let mut todo: VecDeque<(u32, BddId, BddId)> = VecDeque::new();

        let root_vertex = self.rootnum_to_vertex(root_number, new_rootnums, &mut old_rootnums);
        if let Some(n) = name {
            self.graph.set_name(root_vertex, n);
        }
        // link it to the BDD root as the only successor
        let bdd_root = self.bdd_to_vertex(
            mgr,
            mtbdd,
            recompute_succ,
            named,
            &mut todo,
            new_rootnums,
            &mut old_rootnums,
        )?;
        if self.graph.new_edge(root_vertex, bdd_root)? {
            return Ok(true);
        }
        if self.graph.freeze(root_vertex)? {
            return Ok(true);
        }

        while let Some((state, low, high)) = todo.pop_front() {
            if recompute_succ && self.graph.is_frozen(state) {
                debug_assert!(!self.graph.is_determined(state));
                self.bdd_to_vertex(
                    mgr,
                    low,
                    recompute_succ,
                    named,
                    &mut todo,
                    new_rootnums,
                    &mut old_rootnums,
                )?;
                self.bdd_to_vertex(
                    mgr,
                    high,
                    recompute_succ,
                    named,
                    &mut todo,
                    new_rootnums,
                    &mut old_rootnums,
                )?;
                continue;
            }
            let low_vertex = self.bdd_to_vertex(
                mgr,
                low,
                recompute_succ,
                named,
                &mut todo,
                new_rootnums,
                &mut old_rootnums,
            )?;
            if self.graph.new_edge(state, low_vertex)? {
                return Ok(true);
            }
            // if the previous edge determined the source, the other
            // branch cannot matter
            if self.graph.is_determined(state) {
                continue;
            }
            let high_vertex = self.bdd_to_vertex(
                mgr,
                high,
                recompute_succ,
                named,
                &mut todo,
                new_rootnums,
                &mut old_rootnums,
            )?;
            if self.graph.new_edge(state, high_vertex)? {
                return Ok(true);
            }
            if self.graph.freeze(state)? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Chosen child of a system-owned decision node, if the node's
    /// vertex was won by the system.
    pub fn get_choice(&self, node: BddId, low: BddId, high: BddId) -> Option<BddId> {
        let &v = self.bdd_vertex.get(&node)?;
        if !self.graph.is_determined(v) || !self.graph.winner(v) {
            return None;
        }
        let ch = self.graph.choice(v)?;
        if self.bdd_vertex.get(&low) == Some(&ch) {
            Some(low)
        } else {
            debug_assert_eq!(self.bdd_vertex.get(&high), Some(&ch));
            Some(high)
        }
    }
}
