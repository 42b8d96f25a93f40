//! Labels for BDD variables
//!
//! The variable order of the MTBDD manager is the numeric order of the
//! labels: variables are numbered in registration order and never
//! reordered, so a label doubles as the level of the decision nodes it
//! appears on.

use std::fmt::{self, Display};

/// A label for each distinct variable in the MTBDD manager.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Copy, PartialOrd, Ord)]
pub struct VarLabel(u32);

impl VarLabel {
    #[inline]
    pub fn new(v: u32) -> VarLabel {
        VarLabel(v)
    }

    #[inline]
    pub fn value(self) -> u32 {
        self.0
    }

    #[inline]
    pub fn value_usize(self) -> usize {
        self.0 as usize
    }
}

impl Display for VarLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.0)
    }
}

/// A variable label together with a truth assignment, as found on a
/// root-to-leaf path of an MTBDD.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Copy, PartialOrd, Ord)]
pub struct Literal {
    label: VarLabel,
    polarity: bool,
}

impl Literal {
    pub fn new(label: VarLabel, polarity: bool) -> Literal {
        Literal { label, polarity }
    }

    #[inline]
    pub fn label(self) -> VarLabel {
        self.label
    }

    #[inline]
    pub fn polarity(self) -> bool {
        self.polarity
    }

    pub fn negated(self) -> Literal {
        Literal::new(self.label, !self.polarity)
    }
}

impl Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.polarity {
            write!(f, "{}", self.label)
        } else {
            write!(f, "!{}", self.label)
        }
    }
}
