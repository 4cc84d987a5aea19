//! Formula handles and satisfiability backends for block-summary verification.
//!
//! Block summaries and error conditions travel between blocks as [`Formula`]
//! values: an immutable [`Term`] over SSA-indexed variables plus the
//! variable-versioning map that says which index is "current". Everything a
//! scheduler needs from a solver goes through the [`Solver`] trait; two
//! backends are provided:
//!
//! - [`BoundedSolver`]: backtracking enumeration over a bounded integer range
//!   (always available, no native dependencies).
//! - `Z3Solver`: the Z3 SMT solver, behind the `z3` cargo feature.

pub mod bounded;
pub mod formula;
pub mod solver;
pub mod ssa;
pub mod term;
#[cfg(feature = "z3")]
pub mod z3_backend;

pub use bounded::{BoundedSolver, BoundedSolverConfig};
pub use formula::Formula;
pub use solver::{SatResult, Solver};
pub use ssa::SsaMap;
pub use term::{Sort, SsaVar, Term, Value, Var};
#[cfg(feature = "z3")]
pub use z3_backend::Z3Solver;

use thiserror::Error;

/// Solver and formula construction error.
#[derive(Debug, Error)]
pub enum SmtError {
    #[error("solver could not decide: {reason}")]
    Unknown { reason: String },

    #[error("sort mismatch: expected {expected:?} in '{term}'")]
    SortMismatch { expected: Sort, term: String },

    #[error("unsupported term: {0}")]
    Unsupported(String),

    #[error("Z3 error: {0}")]
    Z3(String),
}

pub type SmtResult<T> = Result<T, SmtError>;
