//! The MTBDD manager
//!
//! Owns the node arena, the unique tables, the atomic-proposition
//! registry and the quantification buffer.  The variable order is the
//! numeric order of [`VarLabel`]s: variables are appended in
//! registration order and never reordered, so node ids stay stable for
//! the lifetime of the manager and operation caches keyed by id remain
//! valid across operations.
//!
//! The multi-terminal operations take their leaf behavior as closures,
//! so the mutable state they need (formula interning tables, winning
//! vectors, the backprop arena) is threaded through explicitly instead
//! of living in globals.

use crate::builder::cache::{ApplyCache, OpTag};
use crate::repr::formula::Formula;
use crate::repr::mtbdd::{BddId, MtBddNode};
use crate::repr::trival::Trival;
use crate::repr::var_label::{Literal, VarLabel};
use rustc_hash::{FxHashMap, FxHashSet};
use std::cell::RefCell;
use std::rc::Rc;

/// Shared handle to a manager; MTDFAs keep a clone so that the nodes
/// they reference outlive them.
pub type DictRef = Rc<RefCell<MtBddManager>>;

/// Create a fresh shared manager.
pub fn new_dict() -> DictRef {
    Rc::new(RefCell::new(MtBddManager::new()))
}

/// Boolean connectives understood by the plain-BDD apply and used as
/// constant shortcuts by the multi-terminal apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoolOp {
    And,
    Or,
    Xor,
    Implies,
    Biimp,
}

impl BoolOp {
    fn tag(self) -> OpTag {
        match self {
            BoolOp::And => OpTag::BoolAnd,
            BoolOp::Or => OpTag::BoolOr,
            BoolOp::Xor => OpTag::BoolXor,
            BoolOp::Implies => OpTag::BoolImplies,
            BoolOp::Biimp => OpTag::BoolBiimp,
        }
    }

    fn commutative(self) -> bool {
        !matches!(self, BoolOp::Implies)
    }
}

/// Node and terminal counts reported by [`MtBddManager::count_nodes`].
#[derive(Debug, Default, Clone, Copy)]
pub struct NodeCounts {
    pub nodes: usize,
    pub terminals: usize,
    pub has_false: bool,
    pub has_true: bool,
}

pub struct MtBddManager {
    nodes: Vec<MtBddNode>,
    unique: FxHashMap<(VarLabel, BddId, BddId), BddId>,
    terminal_ids: FxHashMap<u32, BddId>,
    var_to_ap: Vec<Option<Formula>>,
    ap_to_var: FxHashMap<Formula, VarLabel>,
    // long-lived cache for the plain Boolean layer, so that entries
    // survive across translations of shared Boolean subformulas
    bool_cache: ApplyCache,
    // quantification buffer: which variables the system player owns
    quant_vars: Vec<bool>,
    quant_cube: BddId,
}

impl Default for MtBddManager {
    fn default() -> Self {
        MtBddManager::new()
    }
}

impl MtBddManager {
    pub fn new() -> Self {
        MtBddManager {
            nodes: vec![MtBddNode::Const(false), MtBddNode::Const(true)],
            unique: FxHashMap::default(),
            terminal_ids: FxHashMap::default(),
            var_to_ap: Vec::new(),
            ap_to_var: FxHashMap::default(),
            bool_cache: ApplyCache::default(),
            quant_vars: Vec::new(),
            quant_cube: BddId::TRUE,
        }
    }

    //////////////////////////////////////////////////////////////////
    // variable registry
    //////////////////////////////////////////////////////////////////

    pub fn num_vars(&self) -> usize {
        self.var_to_ap.len()
    }

    /// Register an atomic proposition, returning its variable.  The
    /// first registration fixes the variable's place in the order.
    pub fn register_proposition(&mut self, ap: &Formula) -> VarLabel {
        if let Some(&v) = self.ap_to_var.get(ap) {
            return v;
        }
        let v = VarLabel::new(self.var_to_ap.len() as u32);
        self.var_to_ap.push(Some(ap.clone()));
        self.ap_to_var.insert(ap.clone(), v);
        v
    }

    /// Register an anonymous variable (used by the propositional
    /// equivalence encoding for non-Boolean subterms).
    pub fn register_anonymous(&mut self) -> VarLabel {
        let v = VarLabel::new(self.var_to_ap.len() as u32);
        self.var_to_ap.push(None);
        v
    }

    pub fn var_of_ap(&self, ap: &Formula) -> Option<VarLabel> {
        self.ap_to_var.get(ap).copied()
    }

    pub fn ap_of_var(&self, v: VarLabel) -> Option<&Formula> {
        self.var_to_ap.get(v.value_usize()).and_then(|o| o.as_ref())
    }

    //////////////////////////////////////////////////////////////////
    // node construction and access
    //////////////////////////////////////////////////////////////////

    #[inline]
    fn node(&self, b: BddId) -> &MtBddNode {
        &self.nodes[b.value() as usize]
    }

    pub fn is_terminal(&self, b: BddId) -> bool {
        matches!(self.node(b), MtBddNode::Terminal(_))
    }

    /// A leaf is a constant or a terminal.
    pub fn is_leaf(&self, b: BddId) -> bool {
        !matches!(self.node(b), MtBddNode::Decision { .. })
    }

    pub fn terminal_value(&self, b: BddId) -> Option<u32> {
        match self.node(b) {
            MtBddNode::Terminal(v) => Some(*v),
            _ => None,
        }
    }

    pub fn var(&self, b: BddId) -> VarLabel {
        match self.node(b) {
            MtBddNode::Decision { var, .. } => *var,
            _ => panic!("var() on a leaf node"),
        }
    }

    pub fn low(&self, b: BddId) -> BddId {
        match self.node(b) {
            MtBddNode::Decision { low, .. } => *low,
            _ => panic!("low() on a leaf node"),
        }
    }

    pub fn high(&self, b: BddId) -> BddId {
        match self.node(b) {
            MtBddNode::Decision { high, .. } => *high,
            _ => panic!("high() on a leaf node"),
        }
    }

    /// Level of a node in the variable order; leaves sort last.
    #[inline]
    pub fn level(&self, b: BddId) -> u32 {
        match self.node(b) {
            MtBddNode::Decision { var, .. } => var.value(),
            _ => u32::MAX,
        }
    }

    #[inline]
    fn cofactors(&self, b: BddId, level: u32) -> (BddId, BddId) {
        match self.node(b) {
            MtBddNode::Decision { var, low, high } if var.value() == level => (*low, *high),
            _ => (b, b),
        }
    }

    /// Hash-consed decision node; collapses equal children.
    pub fn mk_node(&mut self, var: VarLabel, low: BddId, high: BddId) -> BddId {
        if low == high {
            return low;
        }
        if let Some(&id) = self.unique.get(&(var, low, high)) {
            return id;
        }
        let id = BddId::new(self.nodes.len() as u32);
        self.nodes.push(MtBddNode::Decision { var, low, high });
        self.unique.insert((var, low, high), id);
        id
    }

    /// The MTBDD consisting of the single terminal `value`.
    pub fn terminal(&mut self, value: u32) -> BddId {
        if let Some(&id) = self.terminal_ids.get(&value) {
            return id;
        }
        let id = BddId::new(self.nodes.len() as u32);
        self.nodes.push(MtBddNode::Terminal(value));
        self.terminal_ids.insert(value, id);
        id
    }

    pub fn ithvar(&mut self, v: VarLabel) -> BddId {
        self.mk_node(v, BddId::FALSE, BddId::TRUE)
    }

    pub fn nithvar(&mut self, v: VarLabel) -> BddId {
        self.mk_node(v, BddId::TRUE, BddId::FALSE)
    }

    //////////////////////////////////////////////////////////////////
    // plain Boolean layer
    //////////////////////////////////////////////////////////////////

    /// Classic BDD apply for the Boolean connectives; operands must
    /// not contain multi-terminal leaves.
    pub fn apply_bool(&mut self, op: BoolOp, a: BddId, b: BddId) -> BddId {
        debug_assert!(!self.is_terminal(a) && !self.is_terminal(b));
        if let Some(r) = self.bool_shortcut(op, a, b) {
            return r;
        }
        let (a, b) = if op.commutative() && b < a { (b, a) } else { (a, b) };
        if let Some(hit) = self.bool_cache.get(op.tag(), 0, a, b) {
            return BddId::new(hit as u32);
        }
        let level = self.level(a).min(self.level(b));
        let (a0, a1) = self.cofactors(a, level);
        let (b0, b1) = self.cofactors(b, level);
        let low = self.apply_bool(op, a0, b0);
        let high = self.apply_bool(op, a1, b1);
        let res = self.mk_node(VarLabel::new(level), low, high);
        self.bool_cache.insert(op.tag(), 0, a, b, res.value() as u64);
        res
    }

    fn bool_shortcut(&mut self, op: BoolOp, a: BddId, b: BddId) -> Option<BddId> {
        use BddId as I;
        match op {
            BoolOp::And => match (a, b) {
                (I::FALSE, _) | (_, I::FALSE) => Some(I::FALSE),
                (I::TRUE, x) | (x, I::TRUE) => Some(x),
                _ if a == b => Some(a),
                _ => None,
            },
            BoolOp::Or => match (a, b) {
                (I::TRUE, _) | (_, I::TRUE) => Some(I::TRUE),
                (I::FALSE, x) | (x, I::FALSE) => Some(x),
                _ if a == b => Some(a),
                _ => None,
            },
            BoolOp::Xor => match (a, b) {
                (I::FALSE, x) | (x, I::FALSE) => Some(x),
                (I::TRUE, x) | (x, I::TRUE) => Some(self.not(x)),
                _ if a == b => Some(I::FALSE),
                _ => None,
            },
            BoolOp::Implies => match (a, b) {
                (I::FALSE, _) | (_, I::TRUE) => Some(I::TRUE),
                (I::TRUE, x) => Some(x),
                (x, I::FALSE) => Some(self.not(x)),
                _ if a == b => Some(I::TRUE),
                _ => None,
            },
            BoolOp::Biimp => match (a, b) {
                (I::TRUE, x) | (x, I::TRUE) => Some(x),
                (I::FALSE, x) | (x, I::FALSE) => Some(self.not(x)),
                _ if a == b => Some(I::TRUE),
                _ => None,
            },
        }
    }

    /// Boolean negation; operand must not contain terminals.
    pub fn not(&mut self, a: BddId) -> BddId {
        match *self.node(a) {
            MtBddNode::Const(c) => return BddId::from_bool(!c),
            MtBddNode::Terminal(_) => panic!("not() on a multi-terminal BDD"),
            MtBddNode::Decision { .. } => {}
        }
        if let Some(hit) = self.bool_cache.get(OpTag::BoolNot, 0, a, BddId::FALSE) {
            return BddId::new(hit as u32);
        }
        let (var, low, high) = match *self.node(a) {
            MtBddNode::Decision { var, low, high } => (var, low, high),
            _ => unreachable!(),
        };
        let nlow = self.not(low);
        let nhigh = self.not(high);
        let res = self.mk_node(var, nlow, nhigh);
        self.bool_cache
            .insert(OpTag::BoolNot, 0, a, BddId::FALSE, res.value() as u64);
        res
    }

    /// Conjunction of positive literals for the given variables.
    pub fn cube_of_vars(&mut self, vars: &[VarLabel]) -> BddId {
        let mut sorted: Vec<VarLabel> = vars.to_vec();
        sorted.sort();
        sorted.dedup();
        let mut acc = BddId::TRUE;
        for &v in sorted.iter().rev() {
            acc = self.mk_node(v, BddId::FALSE, acc);
        }
        acc
    }

    /// Variables of a positive cube, in order.
    pub fn cube_vars(&self, cube: BddId) -> Vec<VarLabel> {
        let mut vars = Vec::new();
        let mut b = cube;
        while !b.is_const() {
            match self.node(b) {
                MtBddNode::Decision { var, low, high } if low.is_false() => {
                    vars.push(*var);
                    b = *high;
                }
                _ => panic!("cube_vars: not a positive cube"),
            }
        }
        vars
    }

    /// Build the cube of a path's literals.
    pub fn cube_of_literals(&mut self, lits: &[Literal]) -> BddId {
        let mut acc = BddId::TRUE;
        for &lit in lits.iter().rev() {
            acc = if lit.polarity() {
                self.mk_node(lit.label(), BddId::FALSE, acc)
            } else {
                self.mk_node(lit.label(), acc, BddId::FALSE)
            };
        }
        acc
    }

    /// Keep only the literals of `cube` whose variables are in the
    /// prepared controllable set (existential projection of a cube).
    pub fn cube_project_controllable(&mut self, lits: &[Literal]) -> BddId {
        let kept: Vec<Literal> = lits
            .iter()
            .copied()
            .filter(|l| self.is_controllable(l.label()))
            .collect();
        self.cube_of_literals(&kept)
    }

    /// Follow one assignment down to a leaf.
    pub fn eval(&self, b: BddId, assignment: &dyn Fn(VarLabel) -> bool) -> BddId {
        let mut cur = b;
        loop {
            match self.node(cur) {
                MtBddNode::Decision { var, low, high } => {
                    cur = if assignment(*var) { *high } else { *low };
                }
                _ => return cur,
            }
        }
    }

    //////////////////////////////////////////////////////////////////
    // multi-terminal apply
    //////////////////////////////////////////////////////////////////

    /// Binary apply over MTBDDs.  `op` is used to short-circuit on
    /// Boolean constants (`0 ∧ x = 0`, `1 ∨ x = 1`, `0 → x = 1`,
    /// `x → 1 = 1`) before descending; `leaves` combines two leaf
    /// nodes into an arbitrary MTBDD.
    pub fn mt_apply2_leaves(
        &mut self,
        left: BddId,
        right: BddId,
        op: BoolOp,
        cache: &mut ApplyCache,
        tag: OpTag,
        iteration: u32,
        leaves: &mut dyn FnMut(&mut MtBddManager, BddId, BddId) -> BddId,
    ) -> BddId {
        match op {
            BoolOp::And if left.is_false() || right.is_false() => return BddId::FALSE,
            BoolOp::Or if left.is_true() || right.is_true() => return BddId::TRUE,
            BoolOp::Implies if left.is_false() || right.is_true() => return BddId::TRUE,
            _ => {}
        }
        if self.is_leaf(left) && self.is_leaf(right) {
            return leaves(self, left, right);
        }
        if let Some(hit) = cache.get(tag, iteration, left, right) {
            return BddId::new(hit as u32);
        }
        let level = self.level(left).min(self.level(right));
        let (l0, l1) = self.cofactors(left, level);
        let (r0, r1) = self.cofactors(right, level);
        let low = self.mt_apply2_leaves(l0, r0, op, cache, tag, iteration, leaves);
        let high = self.mt_apply2_leaves(l1, r1, op, cache, tag, iteration, leaves);
        let res = self.mk_node(VarLabel::new(level), low, high);
        cache.insert(tag, iteration, left, right, res.value() as u64);
        res
    }

    /// Unary apply rewriting every terminal value through `map` and
    /// replacing the constants by `false_repl`/`true_repl`.
    pub fn mt_apply1(
        &mut self,
        b: BddId,
        cache: &mut ApplyCache,
        tag: OpTag,
        iteration: u32,
        false_repl: BddId,
        true_repl: BddId,
        map: &mut dyn FnMut(&mut MtBddManager, u32) -> u32,
    ) -> BddId {
        match *self.node(b) {
            MtBddNode::Const(c) => return if c { true_repl } else { false_repl },
            MtBddNode::Terminal(v) => {
                let new = map(self, v);
                return self.terminal(new);
            }
            MtBddNode::Decision { .. } => {}
        }
        if let Some(hit) = cache.get(tag, iteration, b, BddId::FALSE) {
            return BddId::new(hit as u32);
        }
        let (var, low, high) = self.decision(b);
        let l = self.mt_apply1(low, cache, tag, iteration, false_repl, true_repl, map);
        let h = self.mt_apply1(high, cache, tag, iteration, false_repl, true_repl, map);
        let res = self.mk_node(var, l, h);
        cache.insert(tag, iteration, b, BddId::FALSE, res.value() as u64);
        res
    }

    /// Unary apply rewriting every leaf (constant or terminal) into an
    /// arbitrary MTBDD chosen by `map`.
    pub fn mt_apply1_leaves(
        &mut self,
        b: BddId,
        cache: &mut ApplyCache,
        tag: OpTag,
        iteration: u32,
        map: &mut dyn FnMut(&mut MtBddManager, BddId, Option<u32>) -> BddId,
    ) -> BddId {
        match *self.node(b) {
            MtBddNode::Const(_) => return map(self, b, None),
            MtBddNode::Terminal(v) => return map(self, b, Some(v)),
            MtBddNode::Decision { .. } => {}
        }
        if let Some(hit) = cache.get(tag, iteration, b, BddId::FALSE) {
            return BddId::new(hit as u32);
        }
        let (var, low, high) = self.decision(b);
        let l = self.mt_apply1_leaves(low, cache, tag, iteration, map);
        let h = self.mt_apply1_leaves(high, cache, tag, iteration, map);
        let res = self.mk_node(var, l, h);
        cache.insert(tag, iteration, b, BddId::FALSE, res.value() as u64);
        res
    }

    /// Replace the terminal nodes `false_term`/`true_term` by the
    /// Boolean constants; other leaves are kept.
    pub fn mt_terminal_to_const(
        &mut self,
        b: BddId,
        false_term: BddId,
        true_term: BddId,
        cache: &mut ApplyCache,
        iteration: u32,
    ) -> BddId {
        self.mt_apply1_leaves(
            b,
            cache,
            OpTag::TerminalToConst,
            iteration,
            &mut move |_, leaf, _| {
                if leaf == false_term {
                    BddId::FALSE
                } else if leaf == true_term {
                    BddId::TRUE
                } else {
                    leaf
                }
            },
        )
    }

    #[inline]
    fn decision(&self, b: BddId) -> (VarLabel, BddId, BddId) {
        match *self.node(b) {
            MtBddNode::Decision { var, low, high } => (var, low, high),
            _ => unreachable!(),
        }
    }

    //////////////////////////////////////////////////////////////////
    // quantified evaluation (game values)
    //////////////////////////////////////////////////////////////////

    /// Declare the set of controllable variables for the quantified
    /// operations.  Must be called again (or is refreshed lazily) when
    /// variables were registered after the last call.
    pub fn mt_quantify_prepare(&mut self, controllable_cube: BddId) {
        self.quant_cube = controllable_cube;
        self.rebuild_quant_vars();
    }

    fn rebuild_quant_vars(&mut self) {
        let n = self.num_vars();
        self.quant_vars.clear();
        self.quant_vars.resize(n, false);
        for v in self.cube_vars(self.quant_cube) {
            if let Some(slot) = self.quant_vars.get_mut(v.value_usize()) {
                *slot = true;
            }
        }
    }

    /// Variables registered after the last prepare default to
    /// uncontrollable; the buffer is rebuilt when the count changed.
    #[inline]
    fn quant_refresh(&mut self) {
        if self.quant_vars.len() != self.num_vars() {
            self.rebuild_quant_vars();
        }
    }

    #[inline]
    pub fn is_controllable(&self, v: VarLabel) -> bool {
        self.quant_vars.get(v.value_usize()).copied().unwrap_or(false)
    }

    pub fn controllable_cube(&self) -> BddId {
        self.quant_cube
    }

    /// Owner and children of a decision node: `true` when the node's
    /// variable is controlled by the system player.
    pub fn quantified_low_high(&self, b: BddId) -> (bool, BddId, BddId) {
        let (var, low, high) = self.decision(b);
        (self.is_controllable(var), low, high)
    }

    /// Evaluate the game value of `b`: disjunction over controllable
    /// decisions, conjunction over uncontrollable ones, `interp` on
    /// terminal values.
    pub fn mt_quantify_to_bool(
        &mut self,
        b: BddId,
        cache: &mut ApplyCache,
        tag: OpTag,
        iteration: u32,
        interp: &mut dyn FnMut(u32) -> bool,
    ) -> bool {
        self.quant_refresh();
        self.quantify_bool_rec(b, cache, tag, iteration, interp)
    }

    fn quantify_bool_rec(
        &mut self,
        b: BddId,
        cache: &mut ApplyCache,
        tag: OpTag,
        iteration: u32,
        interp: &mut dyn FnMut(u32) -> bool,
    ) -> bool {
        match *self.node(b) {
            MtBddNode::Const(c) => return c,
            MtBddNode::Terminal(v) => return interp(v),
            MtBddNode::Decision { .. } => {}
        }
        if let Some(hit) = cache.get(tag, iteration, b, BddId::FALSE) {
            return hit != 0;
        }
        let (var, low, high) = self.decision(b);
        let l = self.quantify_bool_rec(low, cache, tag, iteration, interp);
        let res = if self.is_controllable(var) {
            l || self.quantify_bool_rec(high, cache, tag, iteration, interp)
        } else {
            l && self.quantify_bool_rec(high, cache, tag, iteration, interp)
        };
        cache.insert(tag, iteration, b, BddId::FALSE, res as u64);
        res
    }

    /// Three-valued variant of [`MtBddManager::mt_quantify_to_bool`].
    pub fn mt_quantify_to_trival(
        &mut self,
        b: BddId,
        cache: &mut ApplyCache,
        tag: OpTag,
        iteration: u32,
        interp: &mut dyn FnMut(u32) -> Trival,
    ) -> Trival {
        self.quant_refresh();
        self.quantify_trival_rec(b, cache, tag, iteration, interp)
    }

    fn quantify_trival_rec(
        &mut self,
        b: BddId,
        cache: &mut ApplyCache,
        tag: OpTag,
        iteration: u32,
        interp: &mut dyn FnMut(u32) -> Trival,
    ) -> Trival {
        match *self.node(b) {
            MtBddNode::Const(c) => return Trival::from(c),
            MtBddNode::Terminal(v) => return interp(v),
            MtBddNode::Decision { .. } => {}
        }
        if let Some(hit) = cache.get(tag, iteration, b, BddId::FALSE) {
            return match hit {
                0 => Trival::False,
                1 => Trival::Maybe,
                _ => Trival::True,
            };
        }
        let (var, low, high) = self.decision(b);
        let l = self.quantify_trival_rec(low, cache, tag, iteration, interp);
        let res = if self.is_controllable(var) {
            if l.is_true() {
                l
            } else {
                l.or(self.quantify_trival_rec(high, cache, tag, iteration, interp))
            }
        } else if l.is_false() {
            l
        } else {
            l.and(self.quantify_trival_rec(high, cache, tag, iteration, interp))
        };
        let enc = match res {
            Trival::False => 0,
            Trival::Maybe => 1,
            Trival::True => 2,
        };
        cache.insert(tag, iteration, b, BddId::FALSE, enc);
        res
    }

    /// Fused leaf rewrite and game evaluation.  `map` returns the
    /// winning status of a terminal and an optional replacement leaf;
    /// the default interpretation keeps the leaf and reads its
    /// accepting bit.  Returns the rewritten root and its game value.
    pub fn mt_apply1_synthesis(
        &mut self,
        b: BddId,
        cache: &mut ApplyCache,
        tag: OpTag,
        iteration: u32,
        map: &mut dyn FnMut(u32) -> (bool, Option<BddId>),
    ) -> (BddId, bool) {
        self.quant_refresh();
        self.synthesis_rec(b, cache, tag, iteration, map)
    }

    fn synthesis_rec(
        &mut self,
        b: BddId,
        cache: &mut ApplyCache,
        tag: OpTag,
        iteration: u32,
        map: &mut dyn FnMut(u32) -> (bool, Option<BddId>),
    ) -> (BddId, bool) {
        match *self.node(b) {
            MtBddNode::Const(c) => return (b, c),
            MtBddNode::Terminal(v) => {
                let (win, repl) = map(v);
                return (repl.unwrap_or(b), win);
            }
            MtBddNode::Decision { .. } => {}
        }
        if let Some(hit) = cache.get(tag, iteration, b, BddId::FALSE) {
            return (BddId::new((hit >> 1) as u32), hit & 1 != 0);
        }
        let (var, low, high) = self.decision(b);
        let (l, lw) = self.synthesis_rec(low, cache, tag, iteration, map);
        let (h, hw) = self.synthesis_rec(high, cache, tag, iteration, map);
        let win = if self.is_controllable(var) {
            lw || hw
        } else {
            lw && hw
        };
        let res = self.mk_node(var, l, h);
        cache.insert(
            tag,
            iteration,
            b,
            BddId::FALSE,
            ((res.value() as u64) << 1) | win as u64,
        );
        (res, win)
    }

    /// Strategy projection: at every controllable decision node for
    /// which `choice` picks a child, the other child is replaced by
    /// `⊥`; every terminal is rewritten through `map` (typically
    /// accepting → `⊤`, losing → `⊥`, winning → renamed terminal).
    #[allow(clippy::type_complexity)]
    pub fn mt_apply1_synthesis_with_choice(
        &mut self,
        b: BddId,
        cache: &mut ApplyCache,
        tag: OpTag,
        iteration: u32,
        choice: &mut dyn FnMut(BddId, BddId, BddId) -> Option<BddId>,
        map: &mut dyn FnMut(&mut MtBddManager, u32, BddId) -> BddId,
    ) -> BddId {
        self.quant_refresh();
        self.with_choice_rec(b, cache, tag, iteration, choice, map)
    }

    #[allow(clippy::type_complexity)]
    fn with_choice_rec(
        &mut self,
        b: BddId,
        cache: &mut ApplyCache,
        tag: OpTag,
        iteration: u32,
        choice: &mut dyn FnMut(BddId, BddId, BddId) -> Option<BddId>,
        map: &mut dyn FnMut(&mut MtBddManager, u32, BddId) -> BddId,
    ) -> BddId {
        match *self.node(b) {
            MtBddNode::Const(_) => return b,
            MtBddNode::Terminal(v) => return map(self, v, b),
            MtBddNode::Decision { .. } => {}
        }
        if let Some(hit) = cache.get(tag, iteration, b, BddId::FALSE) {
            return BddId::new(hit as u32);
        }
        let (var, low, high) = self.decision(b);
        let res = if self.is_controllable(var) {
            match choice(b, low, high) {
                Some(ch) if ch == low => {
                    let l = self.with_choice_rec(low, cache, tag, iteration, choice, map);
                    self.mk_node(var, l, BddId::FALSE)
                }
                Some(_) => {
                    let h = self.with_choice_rec(high, cache, tag, iteration, choice, map);
                    self.mk_node(var, BddId::FALSE, h)
                }
                None => {
                    let l = self.with_choice_rec(low, cache, tag, iteration, choice, map);
                    let h = self.with_choice_rec(high, cache, tag, iteration, choice, map);
                    self.mk_node(var, l, h)
                }
            }
        } else {
            let l = self.with_choice_rec(low, cache, tag, iteration, choice, map);
            let h = self.with_choice_rec(high, cache, tag, iteration, choice, map);
            self.mk_node(var, l, h)
        };
        cache.insert(tag, iteration, b, BddId::FALSE, res.value() as u64);
        res
    }

    //////////////////////////////////////////////////////////////////
    // traversal
    //////////////////////////////////////////////////////////////////

    /// Distinct leaves (constants and terminals) reachable from `b`.
    pub fn leaves_of(&self, b: BddId) -> Vec<BddId> {
        let mut seen = FxHashSet::default();
        let mut todo = vec![b];
        let mut leaves = Vec::new();
        while let Some(n) = todo.pop() {
            if !seen.insert(n) {
                continue;
            }
            match self.node(n) {
                MtBddNode::Decision { low, high, .. } => {
                    todo.push(*low);
                    todo.push(*high);
                }
                _ => leaves.push(n),
            }
        }
        leaves
    }

    /// Iterate the root-to-leaf paths of `b` whose leaf is not `⊥`;
    /// each path is reported as its sequence of literals (ascending
    /// variable order) together with the leaf.
    pub fn for_each_path(&self, b: BddId, f: &mut dyn FnMut(&[Literal], BddId)) {
        let mut path = Vec::new();
        self.path_rec(b, &mut path, f);
    }

    fn path_rec(&self, b: BddId, path: &mut Vec<Literal>, f: &mut dyn FnMut(&[Literal], BddId)) {
        if b.is_false() {
            return;
        }
        match self.node(b) {
            MtBddNode::Decision { var, low, high } => {
                let (var, low, high) = (*var, *low, *high);
                path.push(Literal::new(var, false));
                self.path_rec(low, path, f);
                path.pop();
                path.push(Literal::new(var, true));
                self.path_rec(high, path, f);
                path.pop();
            }
            _ => f(path, b),
        }
    }

    /// Count distinct decision nodes and terminals across `roots`.
    pub fn count_nodes(&self, roots: &[BddId]) -> NodeCounts {
        let mut seen = FxHashSet::default();
        let mut todo: Vec<BddId> = roots.to_vec();
        let mut counts = NodeCounts::default();
        while let Some(n) = todo.pop() {
            if !seen.insert(n) {
                continue;
            }
            match self.node(n) {
                MtBddNode::Decision { low, high, .. } => {
                    counts.nodes += 1;
                    todo.push(*low);
                    todo.push(*high);
                }
                MtBddNode::Terminal(_) => counts.terminals += 1,
                MtBddNode::Const(c) => {
                    if *c {
                        counts.has_true = true;
                    } else {
                        counts.has_false = true;
                    }
                }
            }
        }
        counts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fresh() -> (MtBddManager, VarLabel, VarLabel) {
        let mut mgr = MtBddManager::new();
        let a = mgr.register_proposition(&Formula::ap("a"));
        let b = mgr.register_proposition(&Formula::ap("b"));
        (mgr, a, b)
    }

    #[test]
    fn unique_table_dedups() {
        let (mut mgr, a, _) = fresh();
        let x = mgr.ithvar(a);
        let y = mgr.ithvar(a);
        assert_eq!(x, y);
        assert_eq!(mgr.mk_node(a, x, x), x);
        let t1 = mgr.terminal(7);
        let t2 = mgr.terminal(7);
        assert_eq!(t1, t2);
        assert_ne!(t1, mgr.terminal(8));
    }

    #[test]
    fn boolean_apply() {
        let (mut mgr, a, b) = fresh();
        let va = mgr.ithvar(a);
        let vb = mgr.ithvar(b);
        let and = mgr.apply_bool(BoolOp::And, va, vb);
        let or = mgr.apply_bool(BoolOp::Or, va, vb);
        // De Morgan
        let nand = mgr.not(and);
        let na = mgr.not(va);
        let nb = mgr.not(vb);
        let nor = mgr.apply_bool(BoolOp::Or, na, nb);
        assert_eq!(nand, nor);
        // a -> b  ==  !a | b
        let imp = mgr.apply_bool(BoolOp::Implies, va, vb);
        let alt = mgr.apply_bool(BoolOp::Or, na, vb);
        assert_eq!(imp, alt);
        // xor/biimp duality
        let x = mgr.apply_bool(BoolOp::Xor, va, vb);
        let e = mgr.apply_bool(BoolOp::Biimp, va, vb);
        assert_eq!(mgr.not(x), e);
        assert_ne!(and, or);
    }

    #[test]
    fn mt_apply2_combines_leaves() {
        let (mut mgr, a, _) = fresh();
        let t2 = mgr.terminal(2);
        let t4 = mgr.terminal(4);
        let left = mgr.mk_node(a, t2, BddId::TRUE);
        let right = mgr.mk_node(a, t4, BddId::FALSE);
        let mut cache = ApplyCache::default();
        // combine by adding terminal values; constants act as 0/1
        let res = mgr.mt_apply2_leaves(
            left,
            right,
            BoolOp::Xor, // no constant shortcut
            &mut cache,
            OpTag::Xor,
            0,
            &mut |m, l, r| {
                let lv = m.terminal_value(l).unwrap_or(l.value());
                let rv = m.terminal_value(r).unwrap_or(r.value());
                m.terminal(lv + rv)
            },
        );
        let (_, low, high) = (mgr.var(res), mgr.low(res), mgr.high(res));
        assert_eq!(mgr.terminal_value(low), Some(6));
        assert_eq!(mgr.terminal_value(high), Some(1));
    }

    #[test]
    fn quantify_owner_split() {
        let (mut mgr, a, b) = fresh();
        // a controllable, b uncontrollable
        let va = mgr.ithvar(a);
        let cube = va;
        mgr.mt_quantify_prepare(cube);
        assert!(mgr.is_controllable(a));
        assert!(!mgr.is_controllable(b));

        // f = a <-> b: system can always match b, so ∀b ∃a f holds
        // with order b before a... here order is a < b, so the system
        // picks a first: ∃a ∀b (a <-> b) is false.
        let vb = mgr.ithvar(b);
        let f = mgr.apply_bool(BoolOp::Biimp, va, vb);
        let mut cache = ApplyCache::default();
        assert!(!mgr.mt_quantify_to_bool(f, &mut cache, OpTag::StratBool, 0, &mut |v| v & 1 == 1));

        // g = a | b: choosing a = 1 wins regardless of b.
        let g = mgr.apply_bool(BoolOp::Or, va, vb);
        assert!(mgr.mt_quantify_to_bool(g, &mut cache, OpTag::StratBool, 1, &mut |v| v & 1 == 1));
    }

    #[test]
    fn synthesis_rewrites_and_evaluates() {
        let (mut mgr, a, _) = fresh();
        let acc = mgr.terminal(2 * 5 + 1);
        let rej = mgr.terminal(2 * 6);
        let f = mgr.mk_node(a, rej, acc);
        let va = mgr.ithvar(a);
        mgr.mt_quantify_prepare(va);
        let mut cache = ApplyCache::default();
        let (rewritten, win) =
            mgr.mt_apply1_synthesis(f, &mut cache, OpTag::Strat, 0, &mut |v| {
                if v & 1 == 1 {
                    (true, Some(BddId::TRUE))
                } else {
                    (false, None)
                }
            });
        assert!(win); // a is controllable: pick a=1
        assert_eq!(mgr.high(rewritten), BddId::TRUE);
        assert_eq!(mgr.terminal_value(mgr.low(rewritten)), Some(12));
    }

    #[test]
    fn paths_skip_false() {
        let (mut mgr, a, b) = fresh();
        let t = mgr.terminal(3);
        let inner = mgr.mk_node(b, BddId::FALSE, t);
        let root = mgr.mk_node(a, BddId::TRUE, inner);
        let mut paths = Vec::new();
        mgr.for_each_path(root, &mut |lits, leaf| {
            paths.push((lits.to_vec(), leaf));
        });
        assert_eq!(paths.len(), 2);
        assert_eq!(paths[0].1, BddId::TRUE);
        assert_eq!(paths[1].0.len(), 2);
        assert_eq!(mgr.terminal_value(paths[1].1), Some(3));
    }

    #[test]
    fn cube_round_trip() {
        let (mut mgr, a, b) = fresh();
        let cube = mgr.cube_of_vars(&[b, a]);
        assert_eq!(mgr.cube_vars(cube), vec![a, b]);
    }
}
