//! Configuration enums shared by the library entry points and the
//! command-line front-ends.

use crate::error::Error;
use std::fmt;
use std::str::FromStr;

/// Which translation pipeline to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Translation {
    Direct,
    Compositional,
    /// Direct translation with the synthesis restriction applied to
    /// every state (accepting leaves become `⊤`).
    DirectRestricted,
    DfsOnTheFly,
    DfsStrictOnTheFly,
    BfsOnTheFly,
}

impl FromStr for Translation {
    type Err = Error;
    fn from_str(s: &str) -> Result<Self, Error> {
        match s {
            "direct" => Ok(Translation::Direct),
            "compositional" => Ok(Translation::Compositional),
            "direct-restricted" => Ok(Translation::DirectRestricted),
            "dfs-on-the-fly" => Ok(Translation::DfsOnTheFly),
            "dfs-strict-on-the-fly" => Ok(Translation::DfsStrictOnTheFly),
            "bfs-on-the-fly" => Ok(Translation::BfsOnTheFly),
            _ => Err(Error::Parse {
                position: 0,
                message: format!("unknown translation '{}'", s),
            }),
        }
    }
}

/// Ordering heuristic of the compositional translator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Composition {
    Size,
    Ap,
}

impl FromStr for Composition {
    type Err = Error;
    fn from_str(s: &str) -> Result<Self, Error> {
        match s {
            "size" => Ok(Composition::Size),
            "ap" => Ok(Composition::Ap),
            _ => Err(Error::Parse {
                position: 0,
                message: format!("unknown composition '{}'", s),
            }),
        }
    }
}

/// Granularity of the back-propagation used by the game solver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackpropMode {
    /// arena vertices are BDD nodes
    Nodes,
    /// arena vertices are MTDFA states, evaluated symbolically
    States,
    /// like `States` with the three-valued lattice
    TrivalStates,
}

impl FromStr for BackpropMode {
    type Err = Error;
    fn from_str(s: &str) -> Result<Self, Error> {
        match s {
            "nodes" => Ok(BackpropMode::Nodes),
            "states" => Ok(BackpropMode::States),
            "trival-states" => Ok(BackpropMode::TrivalStates),
            _ => Err(Error::Parse {
                position: 0,
                message: format!("unknown backprop mode '{}'", s),
            }),
        }
    }
}

/// Construction strategy of `ltlf_to_mtdfa_for_synthesis`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SynthesisBackprop {
    /// translate breadth-first, back-propagating on BDD nodes
    BfsNodes,
    /// translate depth-first, back-propagating on BDD nodes
    DfsNodes,
    /// translate fully, then solve by state-level refinement
    StateRefine,
    /// strict depth-first: never re-enter an already-seen state
    DfsStrictNodes,
}

/// Whether uncontrollable variables precede controllable ones in the
/// BDD order (`Mealy`) or the other way around (`Moore`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Semantics {
    #[default]
    Mealy,
    Moore,
}

impl FromStr for Semantics {
    type Err = Error;
    fn from_str(s: &str) -> Result<Self, Error> {
        match s {
            "mealy" | "Mealy" => Ok(Semantics::Mealy),
            "moore" | "Moore" => Ok(Semantics::Moore),
            _ => Err(Error::Parse {
                position: 0,
                message: format!("unknown semantics '{}'", s),
            }),
        }
    }
}

/// Three-way switch for the preprocessing passes (`polarity`,
/// `global-equivalence`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PreprocessChoice {
    #[default]
    Yes,
    No,
    BeforeDecompose,
}

impl PreprocessChoice {
    pub fn enabled(self) -> bool {
        self != PreprocessChoice::No
    }
}

impl FromStr for PreprocessChoice {
    type Err = Error;
    fn from_str(s: &str) -> Result<Self, Error> {
        match s {
            "yes" => Ok(PreprocessChoice::Yes),
            "no" => Ok(PreprocessChoice::No),
            "before-decompose" => Ok(PreprocessChoice::BeforeDecompose),
            _ => Err(Error::Parse {
                position: 0,
                message: format!("unknown choice '{}'", s),
            }),
        }
    }
}

impl fmt::Display for Translation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Translation::Direct => "direct",
            Translation::Compositional => "compositional",
            Translation::DirectRestricted => "direct-restricted",
            Translation::DfsOnTheFly => "dfs-on-the-fly",
            Translation::DfsStrictOnTheFly => "dfs-strict-on-the-fly",
            Translation::BfsOnTheFly => "bfs-on-the-fly",
        };
        write!(f, "{}", name)
    }
}
