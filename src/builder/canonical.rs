//! Propositional-equivalence canonicalization
//!
//! Formulas whose top-level operator is Boolean are encoded as plain
//! BDDs, with a fresh anonymous variable standing in for every
//! distinct non-Boolean subterm; the first formula associated with a
//! BDD becomes the representative of its equivalence class.  This
//! collapses propositionally equivalent successors before they become
//! distinct MTDFA states.

use crate::builder::manager::{BoolOp, MtBddManager};
use crate::repr::formula::{Formula, Op};
use crate::repr::mtbdd::BddId;
use crate::repr::var_label::VarLabel;
use rustc_hash::{FxHashMap, FxHashSet};

#[derive(Default)]
pub(crate) struct Canonicalizer {
    formula_to_var: FxHashMap<Formula, VarLabel>,
    equiv: FxHashMap<BddId, Formula>,
}

impl Canonicalizer {
    /// Representative of `f`'s propositional-equivalence class.  With
    /// `simplify_terms`, the cheap absorption rewrites
    /// `(α M β) ∧ β ≡ α M β`, `(α R β) ∧ β ≡ α R β`, `Gα ∧ α ≡ Gα`
    /// (dually for `U`/`W`/`F` under `∨`) run to fixpoint first; they
    /// avoid creating terminals that would only later be found
    /// equivalent.
    pub fn representative(
        &mut self,
        mgr: &mut MtBddManager,
        f: &Formula,
        simplify_terms: bool,
    ) -> Formula {
        let mut f = f.clone();
        loop {
            match f.kind() {
                Op::And => {
                    if !simplify_terms {
                        break;
                    }
                    let mut removable = FxHashSet::default();
                    for sub in f.children() {
                        match sub.kind() {
                            Op::M | Op::R => {
                                removable.insert(sub[1].clone());
                            }
                            Op::G => {
                                removable.insert(sub[0].clone());
                            }
                            _ => {}
                        }
                    }
                    if removable.is_empty() {
                        break;
                    }
                    let kept: Vec<Formula> = f
                        .children()
                        .iter()
                        .filter(|s| !removable.contains(*s))
                        .cloned()
                        .collect();
                    if kept.len() == f.size() {
                        break;
                    }
                    f = Formula::and(kept);
                }
                Op::Or => {
                    if !simplify_terms {
                        break;
                    }
                    let mut removable = FxHashSet::default();
                    for sub in f.children() {
                        match sub.kind() {
                            Op::U | Op::W => {
                                removable.insert(sub[1].clone());
                            }
                            Op::F => {
                                removable.insert(sub[0].clone());
                            }
                            _ => {}
                        }
                    }
                    if removable.is_empty() {
                        break;
                    }
                    let kept: Vec<Formula> = f
                        .children()
                        .iter()
                        .filter(|s| !removable.contains(*s))
                        .cloned()
                        .collect();
                    if kept.len() == f.size() {
                        break;
                    }
                    f = Formula::or(kept);
                }
                Op::Not | Op::Xor | Op::Implies | Op::Equiv => break,
                // not a Boolean top-level operator: nothing to collapse
                _ => return f,
            }
        }

        let enc = self.encode(mgr, &f);
        if enc.is_true() {
            f = Formula::tt();
        } else if enc.is_false() {
            f = Formula::ff();
        }
        self.equiv.entry(enc).or_insert_with(|| f.clone()).clone()
    }

    fn bdd_var(&mut self, mgr: &mut MtBddManager, f: &Formula) -> VarLabel {
        if let Some(&v) = self.formula_to_var.get(f) {
            return v;
        }
        let v = if f.is(Op::Ap) {
            mgr.register_proposition(f)
        } else {
            mgr.register_anonymous()
        };
        self.formula_to_var.insert(f.clone(), v);
        v
    }

    // Plain-BDD encoding: anonymous variables stand in for any
    // subformula with a non-Boolean operator.
    fn encode(&mut self, mgr: &mut MtBddManager, f: &Formula) -> BddId {
        match f.kind() {
            Op::True => BddId::TRUE,
            Op::False => BddId::FALSE,
            Op::Ap => {
                let v = self.bdd_var(mgr, f);
                mgr.ithvar(v)
            }
            Op::Not => {
                let sub = &f[0];
                if sub.is_leaf() {
                    // skip one BDD negation
                    return match sub.kind() {
                        Op::True => BddId::FALSE,
                        Op::False => BddId::TRUE,
                        _ => {
                            let v = self.bdd_var(mgr, sub);
                            mgr.nithvar(v)
                        }
                    };
                }
                let enc = self.encode(mgr, sub);
                mgr.not(enc)
            }
            Op::And => {
                let mut res = BddId::TRUE;
                for sub in f.children() {
                    let enc = self.encode(mgr, sub);
                    res = mgr.apply_bool(BoolOp::And, res, enc);
                }
                res
            }
            Op::Or => {
                let mut res = BddId::FALSE;
                for sub in f.children() {
                    let enc = self.encode(mgr, sub);
                    res = mgr.apply_bool(BoolOp::Or, res, enc);
                }
                res
            }
            Op::Xor => {
                let left = self.encode(mgr, &f[0]);
                let right = self.encode(mgr, &f[1]);
                mgr.apply_bool(BoolOp::Xor, left, right)
            }
            Op::Implies => {
                let left = self.encode(mgr, &f[0]);
                let right = self.encode(mgr, &f[1]);
                mgr.apply_bool(BoolOp::Implies, left, right)
            }
            Op::Equiv => {
                let left = self.encode(mgr, &f[0]);
                let right = self.encode(mgr, &f[1]);
                mgr.apply_bool(BoolOp::Biimp, left, right)
            }
            // non-Boolean subterm: opaque variable
            _ => {
                let v = self.bdd_var(mgr, f);
                mgr.ithvar(v)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repr::parser::parse_ltlf;

    fn rep(c: &mut Canonicalizer, mgr: &mut MtBddManager, s: &str) -> Formula {
        c.representative(mgr, &parse_ltlf(s).unwrap(), true)
    }

    #[test]
    fn propositionally_equivalent_formulas_collapse() {
        let mut mgr = MtBddManager::new();
        let mut canon = Canonicalizer::default();
        let a = rep(&mut canon, &mut mgr, "a | (Gb & Fc)");
        let b = rep(&mut canon, &mut mgr, "(a | Gb) & (a | Fc)");
        assert_eq!(a, b);
        // the first-seen formula is the class representative
        assert_eq!(a, parse_ltlf("a | (Gb & Fc)").unwrap());
    }

    #[test]
    fn tautologies_reduce_to_constants() {
        let mut mgr = MtBddManager::new();
        let mut canon = Canonicalizer::default();
        assert!(rep(&mut canon, &mut mgr, "Ga | !Ga").is_tt());
        assert!(rep(&mut canon, &mut mgr, "Fb & !Fb").is_ff());
    }

    #[test]
    fn absorption_rewrites() {
        let mut mgr = MtBddManager::new();
        let mut canon = Canonicalizer::default();
        assert_eq!(
            rep(&mut canon, &mut mgr, "(a U b) | b"),
            parse_ltlf("a U b").unwrap()
        );
        assert_eq!(
            rep(&mut canon, &mut mgr, "(a R b) & b"),
            parse_ltlf("a R b").unwrap()
        );
        assert_eq!(
            rep(&mut canon, &mut mgr, "Ga & a"),
            parse_ltlf("Ga").unwrap()
        );
        assert_eq!(
            rep(&mut canon, &mut mgr, "Fa | a"),
            parse_ltlf("Fa").unwrap()
        );
        // without the flag, only propositional equivalence applies
        let mut canon2 = Canonicalizer::default();
        let f = parse_ltlf("Ga & a").unwrap();
        let r = canon2.representative(&mut mgr, &f, false);
        assert_eq!(r, f);
    }

    #[test]
    fn temporal_top_level_is_untouched() {
        let mut mgr = MtBddManager::new();
        let mut canon = Canonicalizer::default();
        let f = parse_ltlf("G(a | !a)").unwrap();
        assert_eq!(canon.representative(&mut mgr, &f, true), f);
    }
}
