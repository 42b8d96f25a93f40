//! Hash-consed LTLf formulas
//!
//! Formulas are immutable trees interned in a thread-local table:
//! structurally equal formulas are the same allocation, so equality and
//! hashing are by identity.  Constructors apply the usual trivial
//! rewrites (constant folding, double negation, flattening and sorting
//! of n-ary operators) so that syntactically different spellings of the
//! same formula often intern to the same node.

use rustc_hash::{FxHashMap, FxHashSet};
use std::cell::RefCell;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::rc::{Rc, Weak};

/// Operator kinds.  `X` is the weak next (satisfied at the end of the
/// trace), `StrongX` the strong next, `W` weak until, `M` strong
/// release.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Op {
    True,
    False,
    Ap,
    Not,
    And,
    Or,
    Xor,
    Implies,
    Equiv,
    X,
    StrongX,
    F,
    G,
    U,
    R,
    W,
    M,
}

#[derive(Debug)]
pub struct FNode {
    id: u64,
    op: Op,
    name: Option<Rc<str>>,
    children: Box<[Formula]>,
    boolean: bool,
}

/// A hash-consed LTLf formula.  Cheap to clone; compared by identity.
#[derive(Clone)]
pub struct Formula(Rc<FNode>);

impl PartialEq for Formula {
    fn eq(&self, other: &Self) -> bool {
        self.0.id == other.0.id
    }
}
impl Eq for Formula {}

impl Hash for Formula {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.id.hash(state);
    }
}

impl PartialOrd for Formula {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for Formula {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.0.id.cmp(&other.0.id)
    }
}

#[derive(PartialEq, Eq, Hash)]
struct InternKey {
    op: Op,
    name: Option<Rc<str>>,
    children: Vec<u64>,
}

#[derive(Default)]
struct Interner {
    table: FxHashMap<InternKey, Weak<FNode>>,
    next_id: u64,
}

thread_local! {
    static INTERNER: RefCell<Interner> = RefCell::new(Interner::default());
}

fn intern(op: Op, name: Option<Rc<str>>, children: Vec<Formula>) -> Formula {
    let key = InternKey {
        op,
        name: name.clone(),
        children: children.iter().map(|c| c.0.id).collect(),
    };
    INTERNER.with(|cell| {
        let mut interner = cell.borrow_mut();
        if let Some(weak) = interner.table.get(&key) {
            if let Some(node) = weak.upgrade() {
                return Formula(node);
            }
        }
        let boolean = match op {
            Op::True | Op::False | Op::Ap => true,
            Op::X | Op::StrongX | Op::F | Op::G | Op::U | Op::R | Op::W | Op::M => false,
            _ => children.iter().all(|c| c.0.boolean),
        };
        let id = interner.next_id;
        interner.next_id += 1;
        let node = Rc::new(FNode {
            id,
            op,
            name,
            children: children.into_boxed_slice(),
            boolean,
        });
        interner.table.insert(key, Rc::downgrade(&node));
        Formula(node)
    })
}

impl Formula {
    pub fn tt() -> Formula {
        intern(Op::True, None, vec![])
    }

    pub fn ff() -> Formula {
        intern(Op::False, None, vec![])
    }

    pub fn ap(name: &str) -> Formula {
        intern(Op::Ap, Some(Rc::from(name)), vec![])
    }

    pub fn not(f: Formula) -> Formula {
        match f.kind() {
            Op::True => Formula::ff(),
            Op::False => Formula::tt(),
            Op::Not => f[0].clone(),
            _ => intern(Op::Not, None, vec![f]),
        }
    }

    /// n-ary conjunction: flattens nested `And`, removes duplicates and
    /// `⊤`, sorts children, short-circuits on `⊥`.
    pub fn and(children: Vec<Formula>) -> Formula {
        Formula::nary(Op::And, children)
    }

    /// n-ary disjunction, dual of [`Formula::and`].
    pub fn or(children: Vec<Formula>) -> Formula {
        Formula::nary(Op::Or, children)
    }

    fn nary(op: Op, children: Vec<Formula>) -> Formula {
        debug_assert!(op == Op::And || op == Op::Or);
        let absorbing = if op == Op::And { Op::False } else { Op::True };
        let neutral = if op == Op::And { Op::True } else { Op::False };
        let mut flat = Vec::with_capacity(children.len());
        let mut seen = FxHashSet::default();
        let mut todo = children;
        todo.reverse();
        while let Some(c) = todo.pop() {
            let k = c.kind();
            if k == op {
                todo.extend(c.children().iter().rev().cloned());
            } else if k == absorbing {
                return if op == Op::And {
                    Formula::ff()
                } else {
                    Formula::tt()
                };
            } else if k != neutral && seen.insert(c.0.id) {
                flat.push(c);
            }
        }
        flat.sort();
        match flat.len() {
            0 => {
                if op == Op::And {
                    Formula::tt()
                } else {
                    Formula::ff()
                }
            }
            1 => flat.pop().unwrap(),
            _ => intern(op, None, flat),
        }
    }

    pub fn xor(a: Formula, b: Formula) -> Formula {
        if a == b {
            return Formula::ff();
        }
        match (a.kind(), b.kind()) {
            (Op::False, _) => b,
            (_, Op::False) => a,
            (Op::True, _) => Formula::not(b),
            (_, Op::True) => Formula::not(a),
            _ => intern(Op::Xor, None, vec![a, b]),
        }
    }

    pub fn implies(a: Formula, b: Formula) -> Formula {
        if a == b {
            return Formula::tt();
        }
        match (a.kind(), b.kind()) {
            (Op::False, _) | (_, Op::True) => Formula::tt(),
            (Op::True, _) => b,
            (_, Op::False) => Formula::not(a),
            _ => intern(Op::Implies, None, vec![a, b]),
        }
    }

    pub fn equiv(a: Formula, b: Formula) -> Formula {
        if a == b {
            return Formula::tt();
        }
        match (a.kind(), b.kind()) {
            (Op::True, _) => b,
            (_, Op::True) => a,
            (Op::False, _) => Formula::not(b),
            (_, Op::False) => Formula::not(a),
            _ => intern(Op::Equiv, None, vec![a, b]),
        }
    }

    /// Weak next: `X ⊤ = ⊤` (a trace that ends now satisfies it), but
    /// `X ⊥` is not `⊥`.
    pub fn next(f: Formula) -> Formula {
        if f.is_tt() {
            return f;
        }
        intern(Op::X, None, vec![f])
    }

    /// Strong next: `X! ⊥ = ⊥`, but `X! ⊤` still requires a next step.
    pub fn strong_next(f: Formula) -> Formula {
        if f.is_ff() {
            return f;
        }
        intern(Op::StrongX, None, vec![f])
    }

    pub fn eventually(f: Formula) -> Formula {
        match f.kind() {
            Op::True | Op::False | Op::F => f,
            _ => intern(Op::F, None, vec![f]),
        }
    }

    pub fn globally(f: Formula) -> Formula {
        match f.kind() {
            Op::True | Op::False | Op::G => f,
            _ => intern(Op::G, None, vec![f]),
        }
    }

    pub fn until(a: Formula, b: Formula) -> Formula {
        match (a.kind(), b.kind()) {
            (_, Op::True) | (_, Op::False) => b,
            (Op::False, _) => b,
            (Op::True, _) => Formula::eventually(b),
            _ => intern(Op::U, None, vec![a, b]),
        }
    }

    pub fn weak_until(a: Formula, b: Formula) -> Formula {
        match (a.kind(), b.kind()) {
            (_, Op::True) => Formula::tt(),
            (Op::True, _) => Formula::tt(),
            (Op::False, _) => b,
            (_, Op::False) => Formula::globally(a),
            _ => intern(Op::W, None, vec![a, b]),
        }
    }

    pub fn release(a: Formula, b: Formula) -> Formula {
        match (a.kind(), b.kind()) {
            (_, Op::True) | (_, Op::False) => b,
            (Op::True, _) => b,
            (Op::False, _) => Formula::globally(b),
            _ => intern(Op::R, None, vec![a, b]),
        }
    }

    pub fn strong_release(a: Formula, b: Formula) -> Formula {
        match (a.kind(), b.kind()) {
            (Op::False, _) | (_, Op::False) => Formula::ff(),
            (_, Op::True) => Formula::eventually(a),
            (Op::True, _) => b,
            _ => intern(Op::M, None, vec![a, b]),
        }
    }

    /// Build a unary operator by kind; used by the rewriting passes.
    pub fn unop(op: Op, f: Formula) -> Formula {
        match op {
            Op::Not => Formula::not(f),
            Op::X => Formula::next(f),
            Op::StrongX => Formula::strong_next(f),
            Op::F => Formula::eventually(f),
            Op::G => Formula::globally(f),
            _ => unreachable!("unop: {:?} is not unary", op),
        }
    }

    /// Build a binary operator by kind.
    pub fn binop(op: Op, a: Formula, b: Formula) -> Formula {
        match op {
            Op::Xor => Formula::xor(a, b),
            Op::Implies => Formula::implies(a, b),
            Op::Equiv => Formula::equiv(a, b),
            Op::U => Formula::until(a, b),
            Op::R => Formula::release(a, b),
            Op::W => Formula::weak_until(a, b),
            Op::M => Formula::strong_release(a, b),
            Op::And => Formula::and(vec![a, b]),
            Op::Or => Formula::or(vec![a, b]),
            _ => unreachable!("binop: {:?} is not binary", op),
        }
    }

    /// Build an n-ary operator by kind (`And` or `Or`).
    pub fn multop(op: Op, children: Vec<Formula>) -> Formula {
        match op {
            Op::And => Formula::and(children),
            Op::Or => Formula::or(children),
            _ => unreachable!("multop: {:?} is not n-ary", op),
        }
    }

    #[inline]
    pub fn kind(&self) -> Op {
        self.0.op
    }

    #[inline]
    pub fn is(&self, op: Op) -> bool {
        self.0.op == op
    }

    #[inline]
    pub fn is_tt(&self) -> bool {
        self.0.op == Op::True
    }

    #[inline]
    pub fn is_ff(&self) -> bool {
        self.0.op == Op::False
    }

    #[inline]
    pub fn is_leaf(&self) -> bool {
        matches!(self.0.op, Op::True | Op::False | Op::Ap)
    }

    /// True when no temporal operator occurs anywhere in the formula.
    #[inline]
    pub fn is_boolean(&self) -> bool {
        self.0.boolean
    }

    /// Identity of the interned node; stable within one thread.
    #[inline]
    pub fn id(&self) -> u64 {
        self.0.id
    }

    /// Name of an atomic proposition.
    pub fn ap_name(&self) -> Option<&str> {
        self.0.name.as_deref()
    }

    #[inline]
    pub fn children(&self) -> &[Formula] {
        &self.0.children
    }

    #[inline]
    pub fn size(&self) -> usize {
        self.0.children.len()
    }

    /// Rebuild the formula with every direct child mapped through `f`.
    /// Constructors re-apply their trivial rewrites.
    pub fn map(&self, mut f: impl FnMut(Formula) -> Formula) -> Formula {
        match self.kind() {
            Op::True | Op::False | Op::Ap => self.clone(),
            Op::Not | Op::X | Op::StrongX | Op::F | Op::G => {
                Formula::unop(self.kind(), f(self[0].clone()))
            }
            Op::Xor | Op::Implies | Op::Equiv | Op::U | Op::R | Op::W | Op::M => {
                let a = f(self[0].clone());
                let b = f(self[1].clone());
                Formula::binop(self.kind(), a, b)
            }
            Op::And | Op::Or => {
                let children = self.children().iter().map(|c| f(c.clone())).collect();
                Formula::multop(self.kind(), children)
            }
        }
    }

    /// Visit every distinct subformula once, parents before children.
    pub fn for_each_subformula(&self, f: &mut impl FnMut(&Formula)) {
        let mut seen = FxHashSet::default();
        let mut todo = vec![self.clone()];
        while let Some(g) = todo.pop() {
            if !seen.insert(g.id()) {
                continue;
            }
            f(&g);
            todo.extend(g.children().iter().cloned());
        }
    }

    /// All atomic propositions of the formula, sorted by name.
    pub fn atomic_props(&self) -> Vec<Formula> {
        let mut aps = Vec::new();
        self.for_each_subformula(&mut |g| {
            if g.is(Op::Ap) {
                aps.push(g.clone());
            }
        });
        aps.sort_by(|a, b| a.ap_name().cmp(&b.ap_name()));
        aps.dedup();
        aps
    }
}

impl std::ops::Index<usize> for Formula {
    type Output = Formula;
    fn index(&self, i: usize) -> &Formula {
        &self.0.children[i]
    }
}

// Precedence levels used by Display: higher binds tighter.
fn prec(op: Op) -> u8 {
    match op {
        Op::True | Op::False | Op::Ap => 6,
        Op::Not | Op::X | Op::StrongX | Op::F | Op::G => 5,
        Op::U | Op::R | Op::W | Op::M => 4,
        Op::And => 3,
        Op::Or => 2,
        Op::Implies | Op::Equiv | Op::Xor => 1,
    }
}

fn fmt_child(f: &mut fmt::Formatter<'_>, child: &Formula, min_prec: u8) -> fmt::Result {
    if prec(child.kind()) <= min_prec {
        write!(f, "({})", child)
    } else {
        write!(f, "{}", child)
    }
}

impl fmt::Display for Formula {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind() {
            Op::True => write!(f, "1"),
            Op::False => write!(f, "0"),
            Op::Ap => {
                let name = self.ap_name().unwrap_or("?");
                if name
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '_')
                    && !name.is_empty()
                {
                    write!(f, "{}", name)
                } else {
                    write!(f, "\"{}\"", name)
                }
            }
            Op::Not => {
                write!(f, "!")?;
                fmt_child(f, &self[0], 4)
            }
            Op::X | Op::StrongX | Op::F | Op::G => {
                match self.kind() {
                    Op::X => write!(f, "X")?,
                    Op::StrongX => write!(f, "X[!]")?,
                    Op::F => write!(f, "F")?,
                    Op::G => write!(f, "G")?,
                    _ => unreachable!(),
                }
                fmt_child(f, &self[0], 4)
            }
            Op::U | Op::R | Op::W | Op::M => {
                let sym = match self.kind() {
                    Op::U => "U",
                    Op::R => "R",
                    Op::W => "W",
                    Op::M => "M",
                    _ => unreachable!(),
                };
                fmt_child(f, &self[0], 4)?;
                write!(f, " {} ", sym)?;
                fmt_child(f, &self[1], 4)
            }
            Op::And | Op::Or => {
                let sym = if self.is(Op::And) { " & " } else { " | " };
                let own = prec(self.kind());
                for (i, c) in self.children().iter().enumerate() {
                    if i > 0 {
                        write!(f, "{}", sym)?;
                    }
                    fmt_child(f, c, own - 1)?;
                }
                Ok(())
            }
            Op::Implies | Op::Equiv | Op::Xor => {
                let sym = match self.kind() {
                    Op::Implies => " -> ",
                    Op::Equiv => " <-> ",
                    Op::Xor => " xor ",
                    _ => unreachable!(),
                };
                fmt_child(f, &self[0], 1)?;
                write!(f, "{}", sym)?;
                fmt_child(f, &self[1], 1)
            }
        }
    }
}

impl fmt::Debug for Formula {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_consing_identity() {
        let a = Formula::ap("a");
        let b = Formula::ap("b");
        let f1 = Formula::and(vec![a.clone(), b.clone()]);
        let f2 = Formula::and(vec![b.clone(), a.clone()]);
        assert_eq!(f1, f2);
        let f3 = Formula::and(vec![a.clone(), a.clone(), b]);
        assert_eq!(f1, f3);
    }

    #[test]
    fn constant_folding() {
        let a = Formula::ap("a");
        assert_eq!(Formula::and(vec![a.clone(), Formula::tt()]), a);
        assert_eq!(
            Formula::and(vec![a.clone(), Formula::ff()]),
            Formula::ff()
        );
        assert_eq!(Formula::not(Formula::not(a.clone())), a);
        assert_eq!(Formula::implies(Formula::ff(), a.clone()), Formula::tt());
        assert_eq!(Formula::xor(a.clone(), a.clone()), Formula::ff());
        assert_eq!(Formula::until(Formula::tt(), a.clone()),
                   Formula::eventually(a.clone()));
        assert_eq!(Formula::weak_until(a.clone(), Formula::ff()),
                   Formula::globally(a));
    }

    #[test]
    fn weak_and_strong_next_constants() {
        // X 1 folds, X! 1 must not: it still requires a successor step.
        assert_eq!(Formula::next(Formula::tt()), Formula::tt());
        assert!(Formula::strong_next(Formula::tt()).is(Op::StrongX));
        assert_eq!(Formula::strong_next(Formula::ff()), Formula::ff());
        assert!(Formula::next(Formula::ff()).is(Op::X));
    }

    #[test]
    fn booleanness() {
        let a = Formula::ap("a");
        let b = Formula::ap("b");
        assert!(Formula::and(vec![a.clone(), Formula::not(b.clone())]).is_boolean());
        assert!(!Formula::until(a.clone(), b.clone()).is_boolean());
        assert!(!Formula::or(vec![a.clone(), Formula::globally(b)]).is_boolean());
        assert!(a.is_boolean());
    }

    #[test]
    fn atomic_props_sorted() {
        let f = Formula::until(
            Formula::ap("b"),
            Formula::and(vec![Formula::ap("a"), Formula::ap("b")]),
        );
        let aps: Vec<String> = f
            .atomic_props()
            .iter()
            .map(|a| a.ap_name().unwrap().to_string())
            .collect();
        assert_eq!(aps, ["a", "b"]);
    }

    #[test]
    fn display_round_trip_shapes() {
        let a = Formula::ap("a");
        let b = Formula::ap("b");
        let f = Formula::globally(Formula::implies(a, Formula::next(b)));
        assert_eq!(f.to_string(), "G(a -> Xb)");
    }
}
