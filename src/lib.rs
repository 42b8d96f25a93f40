//! rsltlf: symbolic LTLf-to-DFA translation and reactive synthesis
//!
//! This crate translates LTLf (linear temporal logic over finite
//! traces) formulas into transition-based deterministic finite
//! automata whose transition functions are multi-terminal BDDs
//! ([`repr::Mtdfa`]), and solves the induced two-player safety game
//! for reactive synthesis.
//!
//! The main entry points are:
//!
//! - [`builder::ltlf_to_mtdfa`]: direct, one-shot translation;
//! - [`builder::ltlf_to_mtdfa_compose`]: compositional translation
//!   with heap-ordered products and intermediate minimization;
//! - [`builder::ltlf_to_mtdfa_for_synthesis`]: translation
//!   interleaved with game solving, producing a strategy automaton;
//! - [`minimize::minimize_mtdfa`], [`product::product`] and friends:
//!   automaton-level operations;
//! - [`game`]: winning regions, strategies and Mealy extraction.
//!
//! ```
//! use rsltlf::builder::{ltlf_to_mtdfa, new_dict};
//! use rsltlf::repr::parse_ltlf;
//!
//! let dict = new_dict();
//! let f = parse_ltlf("G(req -> X grant)").unwrap();
//! let dfa = ltlf_to_mtdfa(&f, &dict, true, true, false).unwrap();
//! assert!(!dfa.is_empty());
//! ```

pub mod builder;
pub mod error;
pub mod game;
pub mod ltlf;
pub mod minimize;
pub mod options;
pub mod product;
pub mod repr;

pub use error::{Error, Result};
pub use minimize::minimize_mtdfa;
pub use product::{complement, product, product_implies, product_or, product_xnor, product_xor};
