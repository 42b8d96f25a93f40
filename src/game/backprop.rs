//! The back-propagation game arena
//!
//! Vertices are owned by one of the two players; a vertex is
//! *determined* once its winner is known.  Determinations flow
//! backward along the reverse edges: a vertex owned by player `P`
//! wins for `P` as soon as one successor does, and loses for `P` once
//! all its successors are determined against it and no further edges
//! can be added (the vertex is *frozen*).

use crate::error::{Error, Result};
use crate::game::adjlist::AdjList;
use rustc_hash::FxHashMap;
use std::collections::VecDeque;
use std::io::{self, Write};

#[derive(Debug, Clone, Default)]
struct BackpropVertex {
    /// true = system player (controllable variables)
    owner: bool,
    /// number of undetermined out-edges
    counter: u32,
    /// all out-edges have been declared
    frozen: bool,
    determined: bool,
    winner: bool,
    /// for a vertex won by its owner, the successor chosen as strategy
    choice: u32,
}

const NO_CHOICE: u32 = u32::MAX;

pub struct BackpropGraph {
    vertices: Vec<BackpropVertex>,
    reverse: AdjList,
    names: FxHashMap<u32, String>,
    stop_asap: bool,
}

impl BackpropGraph {
    /// With `stop_asap`, [`BackpropGraph::set_winner`] aborts its
    /// propagation as soon as vertex 0 is determined.
    pub fn new(stop_asap: bool) -> BackpropGraph {
        BackpropGraph {
            vertices: Vec::new(),
            reverse: AdjList::new(64, 64),
            names: FxHashMap::default(),
            stop_asap,
        }
    }

    pub fn num_vertices(&self) -> usize {
        self.vertices.len()
    }

    pub fn new_vertex(&mut self, owner: bool) -> u32 {
        let v = self.reverse.new_state();
        self.vertices.push(BackpropVertex {
            owner,
            choice: NO_CHOICE,
            ..Default::default()
        });
        v
    }

    pub fn set_name(&mut self, vertex: u32, name: impl Into<String>) {
        self.names.insert(vertex, name.into());
    }

    pub fn is_determined(&self, vertex: u32) -> bool {
        self.vertices[vertex as usize].determined
    }

    pub fn is_frozen(&self, vertex: u32) -> bool {
        self.vertices[vertex as usize].frozen
    }

    /// Winner of a determined vertex; true for the system player.
    pub fn winner(&self, vertex: u32) -> bool {
        debug_assert!(self.vertices[vertex as usize].determined);
        self.vertices[vertex as usize].winner
    }

    pub fn owner(&self, vertex: u32) -> bool {
        self.vertices[vertex as usize].owner
    }

    /// Strategy choice of a determined, owner-winning vertex.
    pub fn choice(&self, vertex: u32) -> Option<u32> {
        let v = &self.vertices[vertex as usize];
        if v.determined && v.winner == v.owner && v.choice != NO_CHOICE {
            Some(v.choice)
        } else {
            None
        }
    }

    /// Add an edge.  Returns `Ok(true)` when the addition determined
    /// vertex 0.  Edges from a determined source are silently dropped.
    pub fn new_edge(&mut self, src: u32, dst: u32) -> Result<bool> {
        let ss = &self.vertices[src as usize];
        if ss.frozen {
            return Err(Error::FrozenState(src));
        }
        if ss.determined {
            return Ok(false);
        }
        let ds = &self.vertices[dst as usize];
        if !ds.determined {
            // declare an edge for backward propagation
            self.reverse.new_edge(dst, src);
            self.vertices[src as usize].counter += 1;
        } else if self.vertices[src as usize].owner == ds.winner {
            let owner = self.vertices[src as usize].owner;
            return self.set_winner_with_choice(src, owner, dst);
        }
        // other edges cannot influence src
        Ok(false)
    }

    /// Declare that no further out-edges will be added to `vertex`.
    /// A frozen vertex with no undetermined successors loses for its
    /// owner.  Returns `Ok(true)` when vertex 0 became determined.
    pub fn freeze(&mut self, vertex: u32) -> Result<bool> {
        let v = &mut self.vertices[vertex as usize];
        v.frozen = true;
        if !v.determined && v.counter == 0 {
            let loser_owner = v.owner;
            return self.set_winner_with_choice(vertex, !loser_owner, NO_CHOICE);
        }
        Ok(false)
    }

    pub fn set_winner(&mut self, vertex: u32, winner: bool) -> Result<bool> {
        self.set_winner_with_choice(vertex, winner, NO_CHOICE)
    }

    /// Determine a vertex and propagate backward.  Returns `Ok(true)`
    /// when vertex 0 became determined during the propagation.
    fn set_winner_with_choice(&mut self, vertex: u32, winner: bool, choice: u32) -> Result<bool> {
        {
            let v = &mut self.vertices[vertex as usize];
            if v.determined {
                return Err(Error::AlreadyDetermined(vertex));
            }
            v.determined = true;
            v.winner = winner;
            v.choice = choice;
        }
        let mut result = vertex == 0;
        if result && self.stop_asap {
            return Ok(true);
        }
        let mut todo = VecDeque::new();
        todo.push_back(vertex);
        while let Some(s) = todo.pop_front() {
            let mut preds = Vec::new();
            for p in self.reverse.out(s) {
                preds.push(p);
            }
            for p in preds {
                let prev = &mut self.vertices[p as usize];
                if prev.determined {
                    continue;
                }
                let exist_choice = prev.owner == winner;
                prev.counter -= u32::from(!exist_choice);
                if exist_choice || (prev.counter == 0 && prev.frozen) {
                    prev.determined = true;
                    prev.winner = winner;
                    if exist_choice {
                        prev.choice = s;
                    }
                    if p == 0 {
                        if self.stop_asap {
                            return Ok(true);
                        }
                        result = true;
                    }
                    todo.push_back(p);
                }
            }
        }
        Ok(result)
    }

    pub fn print_dot(&self, out: &mut dyn Write) -> io::Result<()> {
        writeln!(out, "digraph backprop {{\n  rankdir=TB;")?;
        for (i, v) in self.vertices.iter().enumerate() {
            let shape = if v.owner { "diamond" } else { "box" };
            let mut style = String::from("filled");
            if !v.owner {
                style.push_str(",rounded");
            }
            if !v.frozen {
                style.push_str(",dashed");
            }
            let fill = if !v.determined {
                "white"
            } else if v.winner {
                "\"#33A02C\""
            } else {
                "\"#E31A1C\""
            };
            let label = match self.names.get(&(i as u32)) {
                Some(n) => crate::repr::mtdfa::escape_dot(n),
                None => i.to_string(),
            };
            writeln!(
                out,
                "  {} [shape={}, style=\"{}\", fillcolor={}, label=\"{}\"];",
                i, shape, style, fill, label
            )?;
        }
        for (i, v) in self.vertices.iter().enumerate() {
            if v.determined && v.winner == v.owner && v.choice != NO_CHOICE {
                writeln!(out, "  {} -> {} [penwidth=2]", i, v.choice)?;
            }
            for p in self.reverse.out(i as u32) {
                let sp = &self.vertices[p as usize];
                if !sp.determined || sp.winner != sp.owner || sp.choice != i as u32 {
                    writeln!(out, "  {} -> {};", p, i)?;
                }
            }
        }
        writeln!(out, "}}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn freeze_with_no_successors_loses_for_owner() {
        let mut g = BackpropGraph::new(false);
        let v = g.new_vertex(true);
        assert!(!g.is_determined(v));
        g.freeze(v).unwrap();
        assert!(g.is_determined(v));
        assert!(!g.winner(v)); // system-owned vertex with no moves loses
    }

    #[test]
    fn owner_wins_through_one_successor() {
        let mut g = BackpropGraph::new(false);
        let root = g.new_vertex(true);
        let win = g.new_vertex(false);
        let lose = g.new_vertex(false);
        g.set_winner(win, true).unwrap();
        g.set_winner(lose, false).unwrap();
        // an edge to a losing vertex does not determine root
        g.new_edge(root, lose).unwrap();
        assert!(!g.is_determined(root));
        // an edge to a winning one does (owner has a choice)
        assert!(g.new_edge(root, win).unwrap());
        assert!(g.winner(root));
        assert_eq!(g.choice(root), Some(win));
    }

    #[test]
    fn counter_propagation_on_all_lost() {
        let mut g = BackpropGraph::new(false);
        let root = g.new_vertex(true);
        let a = g.new_vertex(false);
        let b = g.new_vertex(false);
        g.new_edge(root, a).unwrap();
        g.new_edge(root, b).unwrap();
        g.freeze(root).unwrap();
        g.set_winner(a, false).unwrap();
        assert!(!g.is_determined(root));
        assert!(g.set_winner(b, false).unwrap());
        assert!(g.is_determined(root));
        assert!(!g.winner(root));
    }

    #[test]
    fn protocol_violations() {
        let mut g = BackpropGraph::new(false);
        let v = g.new_vertex(false);
        let w = g.new_vertex(false);
        g.freeze(v).unwrap();
        assert!(matches!(g.new_edge(v, w), Err(Error::FrozenState(_))));
        // freeze determined v (owner env, no succ => system wins)
        assert!(g.winner(v));
        assert!(matches!(g.set_winner(v, false), Err(Error::AlreadyDetermined(_))));
    }

    #[test]
    fn edges_to_determined_same_owner_fold_immediately() {
        let mut g = BackpropGraph::new(false);
        let root = g.new_vertex(false); // env-owned
        let lost = g.new_vertex(true);
        g.set_winner(lost, false).unwrap();
        // env-owned root, successor lost for system: env picks it
        assert!(g.new_edge(root, lost).unwrap());
        assert!(g.is_determined(root));
        assert!(!g.winner(root));
    }
}
