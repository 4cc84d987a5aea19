//! Solver contract consumed by the block analyses.

use crate::formula::Formula;
use crate::term::Term;
use crate::{SmtError, SmtResult};

/// Answer of a satisfiability query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SatResult {
    Sat,
    Unsat,
    Unknown,
}

/// A satisfiability backend. Implementations must be usable from worker
/// threads concurrently.
pub trait Solver: Send + Sync {
    /// Short backend name for logs.
    fn name(&self) -> &'static str;

    /// Decide satisfiability of a boolean term.
    fn check(&self, term: &Term) -> SmtResult<SatResult>;

    /// `Ok(true)` iff the formula is unsatisfiable. `Unknown` is an error.
    fn is_unsat(&self, formula: &Formula) -> SmtResult<bool> {
        match self.check(formula.term())? {
            SatResult::Unsat => Ok(true),
            SatResult::Sat => Ok(false),
            SatResult::Unknown => Err(SmtError::Unknown {
                reason: format!("{} returned unknown", self.name()),
            }),
        }
    }

    fn is_sat(&self, formula: &Formula) -> SmtResult<bool> {
        self.is_unsat(formula).map(|unsat| !unsat)
    }

    /// Entailment `a ⊨ b` after bringing both to a common SSA map.
    fn implies(&self, a: &Formula, b: &Formula) -> SmtResult<bool> {
        if b.is_true() || a.is_false() {
            return Ok(true);
        }
        let (a, b) = Formula::unify(a, b);
        self.is_unsat(&a.and_term(b.term().clone().not()))
    }

    /// Semantic equivalence.
    fn equivalent(&self, a: &Formula, b: &Formula) -> SmtResult<bool> {
        if a == b {
            return Ok(true);
        }
        Ok(self.implies(a, b)? && self.implies(b, a)?)
    }
}
