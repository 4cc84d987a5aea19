//! Z3 backend. Each query builds its own solver on the calling thread's
//! context (Z3 contexts are not shared between threads).

use crate::solver::{SatResult, Solver};
use crate::term::{Sort, Term};
use crate::{SmtError, SmtResult};
use tracing::trace;
use z3::ast::{Bool, Dynamic, Int};
use z3::Params;

#[derive(Debug, Clone, Default)]
pub struct Z3Solver {
    /// Per-query timeout in milliseconds.
    pub timeout_ms: Option<u32>,
}

impl Z3Solver {
    pub fn new(timeout_ms: Option<u32>) -> Self {
        Self { timeout_ms }
    }
}

fn encode(term: &Term) -> SmtResult<Dynamic> {
    Ok(match term {
        Term::Bool(b) => Dynamic::from_ast(&Bool::from_bool(*b)),
        Term::Int(n) => Dynamic::from_ast(&Int::from_i64(*n)),
        Term::Var(v) => {
            let name = v.to_string();
            match v.var.sort() {
                Sort::Bool => Dynamic::from_ast(&Bool::new_const(name)),
                Sort::Int => Dynamic::from_ast(&Int::new_const(name)),
            }
        }
        Term::Not(t) => Dynamic::from_ast(&encode_bool(t)?.not()),
        Term::And(ts) => {
            let parts = ts.iter().map(encode_bool).collect::<SmtResult<Vec<_>>>()?;
            Dynamic::from_ast(&Bool::and(&parts))
        }
        Term::Or(ts) => {
            let parts = ts.iter().map(encode_bool).collect::<SmtResult<Vec<_>>>()?;
            Dynamic::from_ast(&Bool::or(&parts))
        }
        Term::Eq(a, b) => {
            let (l, r) = (encode(a)?, encode(b)?);
            if let (Some(li), Some(ri)) = (l.as_int(), r.as_int()) {
                Dynamic::from_ast(&li.eq(&ri))
            } else if let (Some(lb), Some(rb)) = (l.as_bool(), r.as_bool()) {
                Dynamic::from_ast(&lb.eq(&rb))
            } else {
                return Err(SmtError::Unsupported(format!(
                    "equality between incompatible sorts: {term}"
                )));
            }
        }
        Term::Lt(a, b) => Dynamic::from_ast(&encode_int(a)?.lt(&encode_int(b)?)),
        Term::Le(a, b) => Dynamic::from_ast(&encode_int(a)?.le(&encode_int(b)?)),
        Term::Add(ts) => {
            let parts = ts.iter().map(encode_int).collect::<SmtResult<Vec<_>>>()?;
            Dynamic::from_ast(&Int::add(&parts))
        }
        Term::Sub(a, b) => Dynamic::from_ast(&Int::sub(&[encode_int(a)?, encode_int(b)?])),
        Term::Mul(k, t) => Dynamic::from_ast(&Int::mul(&[Int::from_i64(*k), encode_int(t)?])),
    })
}

fn encode_bool(term: &Term) -> SmtResult<Bool> {
    encode(term)?.as_bool().ok_or_else(|| SmtError::SortMismatch {
        expected: Sort::Bool,
        term: term.to_string(),
    })
}

fn encode_int(term: &Term) -> SmtResult<Int> {
    encode(term)?.as_int().ok_or_else(|| SmtError::SortMismatch {
        expected: Sort::Int,
        term: term.to_string(),
    })
}

impl Solver for Z3Solver {
    fn name(&self) -> &'static str {
        "z3"
    }

    fn check(&self, term: &Term) -> SmtResult<SatResult> {
        let solver = z3::Solver::new();
        if let Some(ms) = self.timeout_ms {
            let mut params = Params::new();
            params.set_u32("timeout", ms);
            solver.set_params(&params);
        }
        solver.assert(&encode_bool(term)?);
        let result = match solver.check() {
            z3::SatResult::Sat => SatResult::Sat,
            z3::SatResult::Unsat => SatResult::Unsat,
            z3::SatResult::Unknown => SatResult::Unknown,
        };
        trace!(?result, "z3 check");
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::term::Var;

    #[test]
    fn test_z3_unbounded_arithmetic() {
        let x = Var::int("x");
        let solver = Z3Solver::default();
        let t = Term::var(&x).gt(Term::int(1_000_000));
        assert_eq!(solver.check(&t).unwrap(), SatResult::Sat);
        let u = t.and(Term::var(&x).lt(Term::int(0)));
        assert_eq!(solver.check(&u).unwrap(), SatResult::Unsat);
    }
}
