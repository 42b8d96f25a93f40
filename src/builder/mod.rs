//! Stateful construction engines: the MTBDD manager, the
//! propositional-equivalence canonicalizer, and the direct and
//! compositional translators.

pub mod cache;
pub(crate) mod canonical;
pub mod compose;
pub mod manager;
pub mod translator;

pub use compose::ltlf_to_mtdfa_compose;
pub use manager::{new_dict, BoolOp, DictRef, MtBddManager};
pub use translator::{ltlf_to_mtdfa, ltlf_to_mtdfa_for_synthesis, preregister_semantics, LtlfTranslator};
