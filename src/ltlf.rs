//! LTLf rewriting toolkit
//!
//! One-step satisfiability/unsatisfiability abstractions used by the
//! on-the-fly solver, the cheap LTLf simplifier behind the
//! `simplify-formula` option, and the polarity-based realizability
//! simplifier used during one-step preprocessing.

use crate::repr::formula::{Formula, Op};
use rustc_hash::FxHashMap;

/// Boolean abstraction of "can `f` be satisfied by stopping after the
/// current step": `X g` holds (the trace may end), `X! g` does not,
/// `F`/`G` reduce to their body, `U`/`R` to their right operand.
pub fn ltlf_one_step_sat_rewrite(f: &Formula) -> Formula {
    if f.is_boolean() {
        return f.clone();
    }
    match f.kind() {
        Op::Ap | Op::True | Op::False => f.clone(),
        Op::X => Formula::tt(),
        Op::StrongX => Formula::ff(),
        Op::G | Op::F => ltlf_one_step_sat_rewrite(&f[0]),
        Op::R | Op::U => ltlf_one_step_sat_rewrite(&f[1]),
        Op::W => Formula::or(vec![
            ltlf_one_step_sat_rewrite(&f[0]),
            ltlf_one_step_sat_rewrite(&f[1]),
        ]),
        Op::M => Formula::and(vec![
            ltlf_one_step_sat_rewrite(&f[0]),
            ltlf_one_step_sat_rewrite(&f[1]),
        ]),
        Op::And | Op::Or | Op::Not | Op::Xor | Op::Equiv | Op::Implies => {
            f.map(|g| ltlf_one_step_sat_rewrite(&g))
        }
    }
}

/// Dual abstraction for one-step unrealizability, with negation
/// threaded through the recursion.
pub fn ltlf_one_step_unsat_rewrite(f: &Formula, negate: bool) -> Formula {
    if f.is_boolean() {
        return if negate { Formula::not(f.clone()) } else { f.clone() };
    }
    match f.kind() {
        Op::Not => ltlf_one_step_unsat_rewrite(&f[0], !negate),
        Op::Ap | Op::True | Op::False => {
            if negate {
                Formula::not(f.clone())
            } else {
                f.clone()
            }
        }
        Op::X | Op::StrongX => Formula::tt(),
        Op::F => {
            if negate {
                // G
                ltlf_one_step_unsat_rewrite(&f[0], true)
            } else {
                Formula::tt()
            }
        }
        Op::G => {
            if negate {
                // F
                Formula::tt()
            } else {
                ltlf_one_step_unsat_rewrite(&f[0], false)
            }
        }
        Op::R | Op::M => {
            if negate {
                // U, W
                Formula::or(vec![
                    ltlf_one_step_unsat_rewrite(&f[0], true),
                    ltlf_one_step_unsat_rewrite(&f[1], true),
                ])
            } else {
                ltlf_one_step_unsat_rewrite(&f[1], false)
            }
        }
        Op::U | Op::W => {
            if negate {
                // R, M
                ltlf_one_step_unsat_rewrite(&f[1], true)
            } else {
                Formula::or(vec![
                    ltlf_one_step_unsat_rewrite(&f[0], false),
                    ltlf_one_step_unsat_rewrite(&f[1], false),
                ])
            }
        }
        Op::Implies => {
            if negate {
                // !(a -> b) == a & !b
                let right = ltlf_one_step_unsat_rewrite(&f[1], true);
                Formula::and(vec![ltlf_one_step_unsat_rewrite(&f[0], false), right])
            } else {
                let right = ltlf_one_step_unsat_rewrite(&f[1], false);
                Formula::or(vec![ltlf_one_step_unsat_rewrite(&f[0], true), right])
            }
        }
        Op::Xor | Op::Equiv => {
            let a = ltlf_one_step_unsat_rewrite(&f[0], false);
            let b = ltlf_one_step_unsat_rewrite(&f[1], false);
            let na = ltlf_one_step_unsat_rewrite(&f[0], true);
            let nb = ltlf_one_step_unsat_rewrite(&f[1], true);
            if (f.kind() == Op::Xor) == negate {
                // equivalence
                Formula::or(vec![
                    Formula::and(vec![a, b]),
                    Formula::and(vec![na, nb]),
                ])
            } else {
                Formula::or(vec![
                    Formula::and(vec![a, nb]),
                    Formula::and(vec![na, b]),
                ])
            }
        }
        Op::And | Op::Or => {
            let children: Vec<Formula> = f
                .children()
                .iter()
                .map(|c| ltlf_one_step_unsat_rewrite(c, negate))
                .collect();
            let op = match (f.kind(), negate) {
                (Op::And, false) | (Op::Or, true) => Op::And,
                _ => Op::Or,
            };
            Formula::multop(op, children)
        }
    }
}

/// Cheap LTLf simplifier: negation pushing with temporal dualization,
/// FG/GF collapsing, grouping of `X`/`X!`/`F`/`G` children of n-ary
/// connectives, implication grouping, and factoring of shared
/// subformulas.  Results are cached per polarity.
#[derive(Default)]
pub struct LtlfSimplifier {
    pos: FxHashMap<Formula, Formula>,
    neg: FxHashMap<Formula, Formula>,
}

// if vec = [Xa, Fb, Fc, Gd, e], match = F, combine = And,
// this returns [F(b & c), Xa, Gd, e]
fn group_op(vec: Vec<Formula>, matched_op: Op, combine: Op) -> Vec<Formula> {
    let mut matched = Vec::new();
    for f in &vec {
        if f.kind() == matched_op {
            matched.push(f[0].clone());
        }
    }
    if matched.len() < 2 {
        return vec;
    }
    let grouped = Formula::unop(matched_op, Formula::multop(combine, matched));
    let mut res = vec![grouped];
    for f in vec {
        if f.kind() != matched_op {
            res.push(f);
        }
    }
    res
}

impl LtlfSimplifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn simplify(&mut self, f: &Formula) -> Formula {
        self.simplify_polarity(f, false)
    }

    pub fn simplify_polarity(&mut self, f: &Formula, negated: bool) -> Formula {
        let cache = if negated { &self.neg } else { &self.pos };
        if let Some(hit) = cache.get(f) {
            return hit.clone();
        }
        let res = self.simplify_aux(f, negated);
        let cache = if negated { &mut self.neg } else { &mut self.pos };
        cache.insert(f.clone(), res.clone());
        res
    }

    fn simplify_aux(&mut self, f: &Formula, negated: bool) -> Formula {
        match f.kind() {
            Op::False => {
                if negated {
                    Formula::tt()
                } else {
                    f.clone()
                }
            }
            Op::True => {
                if negated {
                    Formula::ff()
                } else {
                    f.clone()
                }
            }
            Op::Ap => {
                if negated {
                    Formula::not(f.clone())
                } else {
                    f.clone()
                }
            }
            Op::Not => self.simplify_polarity(&f[0], !negated),
            Op::X | Op::StrongX => {
                let res = self.simplify_polarity(&f[0], negated);
                if negated == (f.kind() == Op::X) {
                    Formula::strong_next(res)
                } else {
                    Formula::next(res)
                }
            }
            Op::F | Op::G => {
                let res = self.simplify_polarity(&f[0], negated);
                // FG and GF prefixes both mean "at the last position"
                // over finite traces
                if (res.is(Op::F) || res.is(Op::G)) && f.kind() != res.kind() {
                    return Formula::globally(Formula::eventually(ltlf_one_step_sat_rewrite(
                        &res[0],
                    )));
                }
                if negated == (f.kind() == Op::F) {
                    Formula::globally(res)
                } else {
                    Formula::eventually(res)
                }
            }
            Op::U | Op::R => {
                let a = self.simplify_polarity(&f[0], negated);
                let b = self.simplify_polarity(&f[1], negated);
                if negated == (f.kind() == Op::U) {
                    Formula::release(a, b)
                } else {
                    Formula::until(a, b)
                }
            }
            Op::W | Op::M => {
                let a = self.simplify_polarity(&f[0], negated);
                let b = self.simplify_polarity(&f[1], negated);
                if negated == (f.kind() == Op::W) {
                    Formula::strong_release(a, b)
                } else {
                    Formula::weak_until(a, b)
                }
            }
            Op::Xor | Op::Equiv => {
                let mut negated = negated;
                let mut left = f[0].clone();
                if left.is(Op::Not) {
                    left = left[0].clone();
                    negated = !negated;
                }
                let mut right = f[1].clone();
                if right.is(Op::Not) {
                    right = right[0].clone();
                    negated = !negated;
                }
                let a = self.simplify_polarity(&left, false);
                let b = self.simplify_polarity(&right, false);
                if negated == (f.kind() == Op::Xor) {
                    Formula::equiv(a, b)
                } else {
                    Formula::xor(a, b)
                }
            }
            Op::Implies => {
                if negated {
                    // !(a -> b)  =  s(a) & s(!b)
                    let left = self.simplify_polarity(&f[0], false);
                    let right = self.simplify_polarity(&f[1], true);
                    return Formula::and(vec![left, right]);
                }
                // !a -> b  =  s(a) | s(b)
                if f[0].is(Op::Not) {
                    let left = self.simplify_polarity(&f[0][0], false);
                    let right = self.simplify_polarity(&f[1], false);
                    return Formula::or(vec![left, right]);
                }
                // boolean operand: prefer the disjunctive form
                if f[0].is_boolean() || f[1].is_boolean() {
                    let left = self.simplify_polarity(&f[0], true);
                    let right = self.simplify_polarity(&f[1], false);
                    return Formula::or(vec![left, right]);
                }
                let left = self.simplify_polarity(&f[0], false);
                let right = self.simplify_polarity(&f[1], false);
                Formula::implies(left, right)
            }
            Op::And | Op::Or => self.simplify_nary(f, negated),
        }
    }

    fn simplify_nary(&mut self, f: &Formula, negated: bool) -> Formula {
        let res: Vec<Formula> = f
            .children()
            .iter()
            .map(|c| self.simplify_polarity(c, negated))
            .collect();
        let mut opos = f.kind();
        if negated {
            opos = if opos == Op::Or { Op::And } else { Op::Or };
        }
        let oneg = if opos == Op::Or { Op::And } else { Op::Or };

        if opos == Op::And {
            // (a -> b1) & (a -> b2) & rest  =  (a -> (b1 & b2)) & rest
            // G(a) & G(b) & GF(c) & GF(d) & rest = G(a & b & F(c & d)) & rest
            let mut implications: FxHashMap<Formula, Vec<Formula>> = FxHashMap::default();
            let mut impl_order = Vec::new();
            let mut in_g = Vec::new();
            let mut in_xs = Vec::new();
            let mut in_xw = Vec::new();
            let mut rest = Vec::new();
            let mut found = false;
            for sub in &res {
                match sub.kind() {
                    Op::Implies => {
                        let bucket = implications.entry(sub[0].clone()).or_insert_with(|| {
                            impl_order.push(sub[0].clone());
                            Vec::new()
                        });
                        bucket.push(sub[1].clone());
                        if bucket.len() == 2 {
                            found = true;
                        }
                    }
                    Op::G => {
                        in_g.push(sub[0].clone());
                        if in_g.len() == 2 {
                            found = true;
                        }
                    }
                    Op::StrongX => {
                        in_xs.push(sub[0].clone());
                        if in_xs.len() == 2 {
                            found = true;
                        }
                    }
                    Op::X => {
                        in_xw.push(sub[0].clone());
                        if in_xw.len() == 2 {
                            found = true;
                        }
                    }
                    _ => rest.push(sub.clone()),
                }
            }
            if found {
                let mut out = Vec::new();
                for a in impl_order {
                    let bs = implications.remove(&a).unwrap();
                    out.push(Formula::implies(a, Formula::and(bs)));
                }
                if !in_g.is_empty() {
                    let in_g = group_op(in_g, Op::F, Op::And);
                    out.push(Formula::globally(Formula::and(in_g)));
                }
                if !in_xs.is_empty() {
                    out.push(Formula::strong_next(Formula::and(in_xs)));
                }
                if !in_xw.is_empty() {
                    out.push(Formula::next(Formula::and(in_xw)));
                }
                out.extend(rest);
                let g = Formula::and(out);
                if &g != f {
                    return self.simplify(&g);
                }
            }
        } else {
            // (a1 -> b) | (a2 -> b) | rest  =  !a1 | !a2 | b | rest
            // F(a) | F(b) | rest  =  F(a | b) | rest
            let mut in_f = Vec::new();
            let mut in_xs = Vec::new();
            let mut in_xw = Vec::new();
            let mut rest = Vec::new();
            let mut found = false;
            for sub in &res {
                match sub.kind() {
                    Op::Implies => {
                        found = true;
                        rest.push(Formula::not(sub[0].clone()));
                        rest.push(sub[1].clone());
                    }
                    Op::F => {
                        in_f.push(sub[0].clone());
                        if in_f.len() == 2 {
                            found = true;
                        }
                    }
                    Op::StrongX => {
                        in_xs.push(sub[0].clone());
                        if in_xs.len() == 2 {
                            found = true;
                        }
                    }
                    Op::X => {
                        in_xw.push(sub[0].clone());
                        if in_xw.len() == 2 {
                            found = true;
                        }
                    }
                    _ => rest.push(sub.clone()),
                }
            }
            if found {
                let mut out = Vec::new();
                if !in_f.is_empty() {
                    let in_f = group_op(in_f, Op::G, Op::Or);
                    out.push(Formula::eventually(Formula::or(in_f)));
                }
                if !in_xs.is_empty() {
                    out.push(Formula::strong_next(Formula::or(in_xs)));
                }
                if !in_xw.is_empty() {
                    out.push(Formula::next(Formula::or(in_xw)));
                }
                out.extend(rest);
                let g = Formula::or(out);
                if &g != f {
                    return self.simplify(&g);
                }
            }
        }

        // Factor the subformula most shared between clauses:
        // (a & b) | (a & c) | rest  =  (a & (b | c)) | rest
        // (a | b) & (a | c) & rest  =  (a | (b & c)) & rest
        let mut count: FxHashMap<Formula, usize> = FxHashMap::default();
        let mut largest = 0;
        let mut largest_sub = None;
        {
            let mut remember = |sub: &Formula| {
                if sub.is_boolean() {
                    return;
                }
                let c = count.entry(sub.clone()).or_insert(0);
                *c += 1;
                if *c > largest {
                    largest = *c;
                    largest_sub = Some(sub.clone());
                }
            };
            for sub in &res {
                if sub.kind() == oneg {
                    for subsub in sub.children() {
                        remember(subsub);
                    }
                } else {
                    remember(sub);
                }
            }
        }
        let Some(largest_sub) = largest_sub.filter(|_| largest >= 2) else {
            return Formula::multop(opos, res);
        };

        let mut simplified_clauses = Vec::new();
        let mut unmodified_clauses = Vec::new();
        for sub in res {
            if sub.kind() == oneg {
                if !sub.children().contains(&largest_sub) {
                    unmodified_clauses.push(sub);
                    continue;
                }
                let subsubs: Vec<Formula> = sub
                    .children()
                    .iter()
                    .filter(|s| **s != largest_sub)
                    .cloned()
                    .collect();
                simplified_clauses.push(Formula::multop(oneg, subsubs));
            } else if sub == largest_sub {
                simplified_clauses.push(if opos == Op::Or {
                    Formula::tt()
                } else {
                    Formula::ff()
                });
            } else {
                unmodified_clauses.push(sub);
            }
        }
        let simp = {
            let clause = Formula::multop(opos, simplified_clauses);
            self.simplify(&clause)
        };
        let rest = {
            let clause = Formula::multop(opos, unmodified_clauses);
            self.simplify(&clause)
        };
        let factored = Formula::multop(oneg, vec![largest_sub, simp]);
        Formula::multop(opos, vec![factored, rest])
    }
}

/// Polarity-based realizability preprocessing: atomic propositions
/// occurring with a single polarity in a Boolean one-step abstraction
/// are fixed to a constant (their favorable value for outputs, the
/// adversarial one for inputs).  The mapping `(ap, is_input, value)`
/// lets callers re-attach fixed outputs to the produced strategy.
pub struct RealizabilitySimplifier {
    outputs: rustc_hash::FxHashSet<Formula>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Polarity {
    Positive,
    Negative,
    Both,
}

impl RealizabilitySimplifier {
    pub fn new(outvars: &[String]) -> Self {
        RealizabilitySimplifier {
            outputs: outvars.iter().map(|s| Formula::ap(s)).collect(),
        }
    }

    pub fn simplify(&self, f: &Formula) -> (Formula, Vec<(Formula, bool, bool)>) {
        let mut polarity: FxHashMap<Formula, Polarity> = FxHashMap::default();
        collect_polarity(f, false, &mut polarity);
        let mut mapping = Vec::new();
        let mut fixes: FxHashMap<Formula, bool> = FxHashMap::default();
        for (ap, pol) in &polarity {
            let pol = match pol {
                Polarity::Positive => true,
                Polarity::Negative => false,
                Polarity::Both => continue,
            };
            let is_input = !self.outputs.contains(ap);
            // outputs take their favorable value, inputs the
            // adversarial one
            let value = if is_input { !pol } else { pol };
            fixes.insert(ap.clone(), value);
            mapping.push((ap.clone(), is_input, value));
        }
        if fixes.is_empty() {
            return (f.clone(), mapping);
        }
        (substitute(f, &fixes), mapping)
    }
}

fn collect_polarity(f: &Formula, negated: bool, polarity: &mut FxHashMap<Formula, Polarity>) {
    match f.kind() {
        Op::Ap => {
            let new = if negated {
                Polarity::Negative
            } else {
                Polarity::Positive
            };
            polarity
                .entry(f.clone())
                .and_modify(|p| {
                    if *p != new {
                        *p = Polarity::Both;
                    }
                })
                .or_insert(new);
        }
        Op::Not => collect_polarity(&f[0], !negated, polarity),
        Op::Implies => {
            collect_polarity(&f[0], !negated, polarity);
            collect_polarity(&f[1], negated, polarity);
        }
        Op::Xor | Op::Equiv => {
            collect_polarity(&f[0], false, polarity);
            collect_polarity(&f[0], true, polarity);
            collect_polarity(&f[1], false, polarity);
            collect_polarity(&f[1], true, polarity);
        }
        _ => {
            for c in f.children() {
                collect_polarity(c, negated, polarity);
            }
        }
    }
}

fn substitute(f: &Formula, fixes: &FxHashMap<Formula, bool>) -> Formula {
    if f.is(Op::Ap) {
        return match fixes.get(f) {
            Some(true) => Formula::tt(),
            Some(false) => Formula::ff(),
            None => f.clone(),
        };
    }
    f.map(|c| substitute(&c, fixes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repr::parser::parse_ltlf;

    fn simp(input: &str) -> Formula {
        LtlfSimplifier::new().simplify(&parse_ltlf(input).unwrap())
    }

    #[test]
    fn one_step_sat() {
        let f = parse_ltlf("G a").unwrap();
        assert_eq!(ltlf_one_step_sat_rewrite(&f), Formula::ap("a"));
        let f = parse_ltlf("a U b").unwrap();
        assert_eq!(ltlf_one_step_sat_rewrite(&f), Formula::ap("b"));
        let f = parse_ltlf("X a").unwrap();
        assert_eq!(ltlf_one_step_sat_rewrite(&f), Formula::tt());
        let f = parse_ltlf("X[!]a & F b").unwrap();
        assert_eq!(ltlf_one_step_sat_rewrite(&f), Formula::ff());
        let f = parse_ltlf("a W b").unwrap();
        assert_eq!(
            ltlf_one_step_sat_rewrite(&f),
            parse_ltlf("a | b").unwrap()
        );
    }

    #[test]
    fn one_step_unsat_threads_negation() {
        let f = parse_ltlf("!F a").unwrap();
        // !F a ≡ G !a, one step: !a
        assert_eq!(
            ltlf_one_step_unsat_rewrite(&f, false),
            parse_ltlf("!a").unwrap()
        );
        let f = parse_ltlf("X a").unwrap();
        assert_eq!(ltlf_one_step_unsat_rewrite(&f, false), Formula::tt());
    }

    #[test]
    fn simplifier_dualizes_negations() {
        assert_eq!(simp("!X!X!a"), parse_ltlf("X[!]X!a").unwrap());
        assert_eq!(simp("X!X!a"), parse_ltlf("XX[!]a").unwrap());
        assert_eq!(
            simp("!(a U (b W (c R (d M e))))"),
            parse_ltlf("!a R (!b M (!c U (!d W !e)))").unwrap()
        );
        assert_eq!(simp("!GFGa"), parse_ltlf("FGF!a").unwrap());
    }

    #[test]
    fn simplifier_groups_and_factors() {
        assert_eq!(simp("(Fa & Fb) | (Fa & Fc)"), parse_ltlf("Fa & F(b | c)").unwrap());
        assert_eq!(simp("!Xa -> b"), parse_ltlf("Xa | b").unwrap());
        assert_eq!(simp("Xa -> !Gb"), parse_ltlf("Xa -> F!b").unwrap());
        assert_eq!(simp("!(Xa -> Gb)"), parse_ltlf("Xa & F!b").unwrap());
        assert_eq!(
            simp("X(a) | X(!b) | Gc | Fd | Fe"),
            parse_ltlf("X(a | !b) | Gc | F(d | e)").unwrap()
        );
        assert_eq!(
            simp("X(a) & X(!b) & Gc & Gd & Fe & Ff"),
            parse_ltlf("X(a & !b) & G(c & d) & Fe & Ff").unwrap()
        );
        assert_eq!(
            simp("X(a) & G(!b) & GFc & GFd & Fe & Ff"),
            parse_ltlf("X(a) & G(!b & F(c & d)) & Fe & Ff").unwrap()
        );
        assert_eq!(simp("!Xa xor Gb"), parse_ltlf("Xa <-> Gb").unwrap());
        assert_eq!(simp("Xa <-> !Gb"), parse_ltlf("Xa xor Gb").unwrap());
    }

    #[test]
    fn realizability_polarity_fixing() {
        let rs = RealizabilitySimplifier::new(&["o".to_string()]);
        // o appears only positively: fixed to true; i only
        // negatively: adversarially fixed to true as well.
        let f = parse_ltlf("o & !i").unwrap();
        let (g, mapping) = rs.simplify(&f);
        assert_eq!(g, Formula::ff());
        assert_eq!(mapping.len(), 2);
        let o_entry = mapping.iter().find(|(ap, _, _)| ap == &Formula::ap("o")).unwrap();
        assert_eq!((o_entry.1, o_entry.2), (false, true));
        let i_entry = mapping.iter().find(|(ap, _, _)| ap == &Formula::ap("i")).unwrap();
        assert_eq!((i_entry.1, i_entry.2), (true, true));
    }

    #[test]
    fn realizability_mixed_polarity_untouched() {
        let rs = RealizabilitySimplifier::new(&["o".to_string()]);
        let f = parse_ltlf("(o -> i) & (i -> o)").unwrap();
        let (g, mapping) = rs.simplify(&f);
        assert_eq!(g, f);
        assert!(mapping.is_empty());
    }
}
