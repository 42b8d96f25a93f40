//! Crate-wide error type

use thiserror::Error;

/// Errors reported by the translation, product, and game layers.
#[derive(Debug, Error)]
pub enum Error {
    /// The parser recognized syntax (regular expressions, PSL operators)
    /// that has no LTLf meaning.
    #[error("not an LTLf formula: {0}")]
    NotLtlFormula(String),

    /// An operation received a formula operator it cannot handle.
    #[error("unsupported operator: {0}")]
    UnsupportedOperator(&'static str),

    /// Two MTDFAs combined in a product do not share a BDD dictionary.
    #[error("MTDFAs do not share their BDD dictionary")]
    DifferentDictionaries,

    /// An out-edge was added to a frozen backprop vertex.
    #[error("backprop graph: cannot add successor to frozen vertex {0}")]
    FrozenState(u32),

    /// A winner was assigned twice to the same backprop vertex.
    #[error("backprop graph: cannot change status of determined vertex {0}")]
    AlreadyDetermined(u32),

    /// Conversion from an explicit DFA requires a deterministic input.
    #[error("input automaton is not deterministic")]
    NotDeterministic,

    /// Formula syntax error.
    #[error("parse error at position {position}: {message}")]
    Parse { position: usize, message: String },
}

pub type Result<T> = std::result::Result<T, Error>;
