//! Immutable formula handle: a term plus its variable-versioning map.
//!
//! Formulas exchanged between blocks are *entry-framed*: index 0 of a
//! variable is its value when control enters the consuming block and every
//! other index denotes an intermediate value that is implicitly existential.
//! Block-local path formulas start in the entry frame and advance their
//! [`SsaMap`] with every assignment; [`Formula::rebase`] and
//! [`Formula::lift`] move between the two frames.

use crate::ssa::SsaMap;
use crate::term::Term;
use std::fmt;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Formula {
    term: Arc<Term>,
    ssa: SsaMap,
}

impl Formula {
    pub fn new(term: Term, ssa: SsaMap) -> Self {
        Self {
            term: Arc::new(term),
            ssa,
        }
    }

    /// An entry-framed formula.
    pub fn entry(term: Term) -> Self {
        Self::new(term, SsaMap::new())
    }

    pub fn tt() -> Self {
        Self::entry(Term::tt())
    }

    pub fn ff() -> Self {
        Self::entry(Term::ff())
    }

    #[inline]
    pub fn term(&self) -> &Term {
        &self.term
    }

    #[inline]
    pub fn ssa(&self) -> &SsaMap {
        &self.ssa
    }

    /// Syntactically `true`. A semantic check needs a solver.
    pub fn is_true(&self) -> bool {
        self.term.is_true()
    }

    /// Syntactically `false`. A semantic check needs a solver.
    pub fn is_false(&self) -> bool {
        self.term.is_false()
    }

    /// Conjunction. The result's map is the pointwise maximum.
    pub fn and(&self, other: &Formula) -> Formula {
        Formula::new(
            Term::conj([(*self.term).clone(), (*other.term).clone()]),
            self.ssa.join(&other.ssa),
        )
    }

    /// Conjoin a term that is already instantiated against this map.
    pub fn and_term(&self, term: Term) -> Formula {
        Formula::new(Term::conj([(*self.term).clone(), term]), self.ssa.clone())
    }

    /// Disjunction after SSA unification.
    pub fn or(&self, other: &Formula) -> Formula {
        if self.is_false() {
            return other.clone();
        }
        if other.is_false() {
            return self.clone();
        }
        let (a, b) = Formula::unify(self, other);
        Formula::new(
            Term::disj([(*a.term).clone(), (*b.term).clone()]),
            a.ssa,
        )
    }

    /// Disjunction of many formulas; `false` when empty.
    pub fn disjunction<'a>(formulas: impl IntoIterator<Item = &'a Formula>) -> Formula {
        formulas
            .into_iter()
            .fold(Formula::ff(), |acc, f| acc.or(f))
    }

    /// Bring two formulas to a common map by padding the lagging side with
    /// `v@max = v@own` equalities.
    pub fn unify(a: &Formula, b: &Formula) -> (Formula, Formula) {
        let joined = a.ssa.join(&b.ssa);
        let pad = |f: &Formula| {
            let eqs: Vec<Term> = joined
                .iter()
                .filter(|(var, idx)| f.ssa.index(var) < *idx)
                .map(|(var, idx)| Term::ssa(var, idx).eq(Term::ssa(var, f.ssa.index(var))))
                .collect();
            if eqs.is_empty() {
                Formula::new((*f.term).clone(), joined.clone())
            } else {
                Formula::new(
                    Term::conj(std::iter::once((*f.term).clone()).chain(eqs)),
                    joined.clone(),
                )
            }
        };
        (pad(a), pad(b))
    }

    /// Move an exit-framed formula into the entry frame of the next block:
    /// each variable's current index becomes 0, earlier indices go negative.
    pub fn rebase(&self) -> Formula {
        if self.ssa.is_empty() {
            return self.clone();
        }
        let ssa = &self.ssa;
        Formula::entry(self.term.shift(|v| -ssa.index(v)))
    }

    /// Express an entry-framed formula of the next block in terms of this
    /// block's exit frame `frame`.
    pub fn lift(&self, frame: &SsaMap) -> Formula {
        Formula::new(self.term.shift(|v| frame.index(v)), frame.clone())
    }

    /// Drop the map, declaring the formula entry-framed.
    pub fn into_entry_frame(self) -> Formula {
        Formula {
            term: self.term,
            ssa: SsaMap::new(),
        }
    }

    pub fn simplify(&self) -> Formula {
        Formula::new(self.term.simplify(), self.ssa.clone())
    }
}

impl fmt::Display for Formula {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.term)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::term::Var;

    fn x() -> Var {
        Var::int("x")
    }

    #[test]
    fn test_rebase_moves_current_index_to_zero() {
        let mut ssa = SsaMap::new();
        ssa.bump(&x());
        let f = Formula::new(
            Term::ssa(&x(), 1).eq(Term::ssa(&x(), 0).add(Term::int(1))),
            ssa,
        );
        let r = f.rebase();
        assert!(r.ssa().is_empty());
        assert_eq!(r.to_string(), "(x@0 == (x@-1 + 1))");
    }

    #[test]
    fn test_lift_into_exit_frame() {
        let cond = Formula::entry(Term::var(&x()).gt(Term::int(5)));
        let mut frame = SsaMap::new();
        frame.bump(&x());
        frame.bump(&x());
        let lifted = cond.lift(&frame);
        assert_eq!(lifted.to_string(), "(5 < x@2)");
        assert_eq!(lifted.ssa().index(&x()), 2);
    }

    #[test]
    fn test_or_pads_lagging_side() {
        let mut ssa = SsaMap::new();
        ssa.bump(&x());
        let a = Formula::new(Term::ssa(&x(), 1).eq(Term::int(1)), ssa);
        let b = Formula::entry(Term::ssa(&x(), 0).eq(Term::int(2)));
        let merged = a.or(&b);
        assert_eq!(merged.ssa().index(&x()), 1);
        assert_eq!(
            merged.to_string(),
            "((x@1 == 1) || ((x@0 == 2) && (x@1 == x@0)))"
        );
    }

    #[test]
    fn test_disjunction_of_nothing_is_false() {
        assert!(Formula::disjunction(std::iter::empty()).is_false());
        let t = Formula::tt();
        assert!(Formula::disjunction([&Formula::ff(), &t]).is_true());
    }
}
