//! Core value types: formulas, variable labels, MTBDD nodes, MTDFAs,
//! explicit automata and the three-valued lattice.

pub mod dfa;
pub mod formula;
pub mod mtbdd;
pub mod mtdfa;
pub mod parser;
pub mod trival;
pub mod var_label;

pub use dfa::{dfa_to_mtdfa, DfaGraph, MealyMachine};
pub use formula::{Formula, Op};
pub use mtbdd::BddId;
pub use mtdfa::{Mtdfa, MtdfaStats};
pub use parser::parse_ltlf;
pub use trival::Trival;
pub use var_label::{Literal, VarLabel};
