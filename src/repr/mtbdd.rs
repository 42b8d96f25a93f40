//! Multi-terminal BDD node representation
//!
//! Nodes live in the append-only arena of a
//! [`MtBddManager`](crate::builder::manager::MtBddManager) and are
//! identified by [`BddId`].  The two Boolean constants occupy the
//! reserved ids 0 (`⊥`) and 1 (`⊤`); every other node is either a
//! decision node or a terminal carrying a `u32` value.  In this crate
//! terminal values encode `2 * state + accepting_bit`.

use crate::repr::var_label::VarLabel;

/// Handle to a node of the MTBDD arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BddId(u32);

impl BddId {
    /// The constant `⊥`.
    pub const FALSE: BddId = BddId(0);
    /// The constant `⊤`.
    pub const TRUE: BddId = BddId(1);

    #[inline]
    pub fn new(v: u32) -> BddId {
        BddId(v)
    }

    #[inline]
    pub fn value(self) -> u32 {
        self.0
    }

    #[inline]
    pub fn from_bool(b: bool) -> BddId {
        if b {
            BddId::TRUE
        } else {
            BddId::FALSE
        }
    }

    #[inline]
    pub fn is_false(self) -> bool {
        self == BddId::FALSE
    }

    #[inline]
    pub fn is_true(self) -> bool {
        self == BddId::TRUE
    }

    #[inline]
    pub fn is_const(self) -> bool {
        self.0 <= 1
    }
}

/// Storage for one MTBDD node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MtBddNode {
    /// `⊥` (id 0) or `⊤` (id 1).
    Const(bool),
    /// A multi-terminal leaf carrying an integer value.
    Terminal(u32),
    /// A decision node; `low` is taken when the variable is 0.
    Decision {
        var: VarLabel,
        low: BddId,
        high: BddId,
    },
}
