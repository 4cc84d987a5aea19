//! Reference domain: exact symbolic execution over path formulas.
//!
//! A state carries the strongest postcondition of the paths reaching its
//! location, as an entry-framed [`Formula`] whose SSA map advances with
//! every assignment. Merge joins states at the same location by
//! disjunction; stop is entailment. Precision bounds the path length.

use crate::domain::{AbstractDomain, AbstractState, Action, PrecisionAdjustment};
use crate::{CpaError, CpaResult};
use dss_cfa::{CfaEdge, EdgeOp, NodeId};
use dss_smt::{Formula, SatResult, SmtError, Solver, Term};
use std::fmt;
use std::sync::Arc;
use tracing::trace;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymbolicState {
    location: NodeId,
    path: Formula,
    length: usize,
}

impl SymbolicState {
    pub fn new(location: NodeId, path: Formula) -> Self {
        Self {
            location,
            path,
            length: 0,
        }
    }

    pub fn path(&self) -> &Formula {
        &self.path
    }

    /// Number of edges taken since the seed (longest merged path).
    pub fn length(&self) -> usize {
        self.length
    }
}

impl AbstractState for SymbolicState {
    fn location(&self) -> NodeId {
        self.location
    }
}

impl fmt::Display for SymbolicState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.location, self.path)
    }
}

/// Precision: an optional bound on path length.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PathBound {
    pub max_length: Option<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MergeMode {
    /// Disjoin states at the same location.
    #[default]
    Join,
    /// Keep states apart.
    Sep,
}

#[derive(Debug, Clone, Default)]
pub struct SymbolicConfig {
    pub merge: MergeMode,
    pub path_bound: Option<usize>,
    /// Drop successors whose path formula the solver proves unsatisfiable.
    pub prune_infeasible: bool,
}

pub struct SymbolicDomain {
    solver: Arc<dyn Solver>,
    config: SymbolicConfig,
}

impl SymbolicDomain {
    pub fn new(solver: Arc<dyn Solver>, config: SymbolicConfig) -> Self {
        Self { solver, config }
    }

    pub fn solver(&self) -> &Arc<dyn Solver> {
        &self.solver
    }

    pub fn config(&self) -> &SymbolicConfig {
        &self.config
    }

    /// Strongest postcondition of `path` along `op`, or `None` when the
    /// successor is proven infeasible.
    fn post(&self, path: &Formula, op: &EdgeOp) -> CpaResult<Option<Formula>> {
        Ok(Some(match op {
            EdgeOp::Skip => path.clone(),
            EdgeOp::Assume(cond) => {
                let next = path.and_term(cond.instantiate(path.ssa()));
                if self.config.prune_infeasible
                    && self.solver.check(next.term())? == SatResult::Unsat
                {
                    return Ok(None);
                }
                next
            }
            EdgeOp::Assign { var, value } => {
                let rhs = value.instantiate(path.ssa());
                let mut ssa = path.ssa().clone();
                let idx = ssa.bump(var);
                Formula::new(
                    Term::conj([path.term().clone(), Term::ssa(var, idx).eq(rhs)]),
                    ssa,
                )
            }
            EdgeOp::Havoc(var) => {
                let mut ssa = path.ssa().clone();
                ssa.bump(var);
                Formula::new(path.term().clone(), ssa)
            }
        }))
    }
}

impl fmt::Debug for SymbolicDomain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SymbolicDomain")
            .field("solver", &self.solver.name())
            .field("config", &self.config)
            .finish()
    }
}

impl AbstractDomain for SymbolicDomain {
    type State = SymbolicState;
    type Precision = PathBound;

    fn initial_precision(&self, _location: NodeId) -> PathBound {
        PathBound {
            max_length: self.config.path_bound,
        }
    }

    fn transfer(
        &self,
        state: &SymbolicState,
        _precision: &PathBound,
        edge: &CfaEdge,
    ) -> CpaResult<Vec<SymbolicState>> {
        if edge.from != state.location {
            return Err(CpaError::Transfer {
                edge: edge.id,
                reason: format!("state at {} cannot take an edge from {}", state.location, edge.from),
            });
        }
        let successor = self.post(&state.path, &edge.op)?.map(|path| SymbolicState {
            location: edge.to,
            path,
            length: state.length + 1,
        });
        trace!(edge = %edge, feasible = successor.is_some(), "symbolic transfer");
        Ok(successor.into_iter().collect())
    }

    fn merge(
        &self,
        state: &SymbolicState,
        reached: &SymbolicState,
        _precision: &PathBound,
    ) -> CpaResult<Option<SymbolicState>> {
        if self.config.merge == MergeMode::Sep || state.location != reached.location {
            return Ok(None);
        }
        if entails(self.solver.as_ref(), &state.path, &reached.path)? {
            return Ok(None);
        }
        Ok(Some(SymbolicState {
            location: reached.location,
            path: reached.path.or(&state.path),
            length: reached.length.max(state.length),
        }))
    }

    fn stop(
        &self,
        state: &SymbolicState,
        reached: &[&SymbolicState],
        _precision: &PathBound,
    ) -> CpaResult<bool> {
        for other in reached {
            if *other == state || entails(self.solver.as_ref(), &state.path, &other.path)? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn precision_adjust(
        &self,
        state: SymbolicState,
        precision: PathBound,
    ) -> CpaResult<PrecisionAdjustment<SymbolicState, PathBound>> {
        let action = match precision.max_length {
            Some(bound) if state.length > bound => Action::Break,
            _ => Action::Continue,
        };
        let state = SymbolicState {
            path: state.path.simplify(),
            ..state
        };
        Ok(PrecisionAdjustment {
            state,
            precision,
            action,
        })
    }
}

/// Entailment where an undecided query counts as "not covered".
fn entails(solver: &dyn Solver, a: &Formula, b: &Formula) -> CpaResult<bool> {
    match solver.implies(a, b) {
        Ok(covered) => Ok(covered),
        Err(SmtError::Unknown { .. }) => Ok(false),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dss_cfa::CfaBuilder;
    use dss_smt::{BoundedSolver, Var};

    fn domain(config: SymbolicConfig) -> SymbolicDomain {
        SymbolicDomain::new(Arc::new(BoundedSolver::default()), config)
    }

    #[test]
    fn test_assignment_advances_ssa() {
        let x = Var::int("x");
        let mut b = CfaBuilder::new();
        let n = b.add_nodes(2);
        b.assign(n[0], n[1], &x, Term::var(&x).add(Term::int(1)));
        let cfa = b.build().unwrap();
        let d = domain(SymbolicConfig::default());
        let seed = SymbolicState::new(n[0], Formula::tt());
        let out = d
            .transfer(&seed, &PathBound::default(), &cfa.edges()[0])
            .unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].location(), n[1]);
        assert_eq!(out[0].path().ssa().index(&x), 1);
        assert_eq!(out[0].path().to_string(), "(x@1 == (x@0 + 1))");
    }

    #[test]
    fn test_infeasible_assume_is_pruned() {
        let x = Var::int("x");
        let mut b = CfaBuilder::new();
        let n = b.add_nodes(2);
        b.assume(n[0], n[1], Term::var(&x).gt(Term::int(3)));
        let cfa = b.build().unwrap();
        let seed = SymbolicState::new(n[0], Formula::entry(Term::var(&x).lt(Term::int(0))));

        let pruning = domain(SymbolicConfig {
            prune_infeasible: true,
            ..Default::default()
        });
        let edge = &cfa.edges()[0];
        assert!(pruning
            .transfer(&seed, &PathBound::default(), edge)
            .unwrap()
            .is_empty());
        let lazy = domain(SymbolicConfig::default());
        assert_eq!(
            lazy.transfer(&seed, &PathBound::default(), edge).unwrap().len(),
            1
        );
    }

    #[test]
    fn test_merge_join_and_stop() {
        let x = Var::int("x");
        let n = NodeId::new(1);
        let d = domain(SymbolicConfig::default());
        let p = PathBound::default();
        let a = SymbolicState::new(n, Formula::entry(Term::var(&x).eq(Term::int(1))));
        let b = SymbolicState::new(n, Formula::entry(Term::var(&x).eq(Term::int(2))));

        let merged = d.merge(&b, &a, &p).unwrap().unwrap();
        assert!(d.stop(&a, &[&merged], &p).unwrap());
        assert!(d.stop(&b, &[&merged], &p).unwrap());
        assert!(!d.stop(&b, &[&a], &p).unwrap());
        // already covered: nothing to merge
        assert!(d.merge(&a, &merged, &p).unwrap().is_none());

        let sep = domain(SymbolicConfig {
            merge: MergeMode::Sep,
            ..Default::default()
        });
        assert!(sep.merge(&b, &a, &p).unwrap().is_none());
    }

    #[test]
    fn test_path_bound_breaks() {
        let d = domain(SymbolicConfig {
            path_bound: Some(1),
            ..Default::default()
        });
        let prec = d.initial_precision(NodeId::new(0));
        let mut state = SymbolicState::new(NodeId::new(0), Formula::tt());
        state.length = 2;
        let adj = d.precision_adjust(state, prec).unwrap();
        assert_eq!(adj.action, Action::Break);
    }

    #[test]
    fn test_transfer_rejects_foreign_edge() {
        let mut b = CfaBuilder::new();
        let n = b.add_nodes(3);
        b.skip(n[1], n[2]);
        let cfa = b.build().unwrap();
        let d = domain(SymbolicConfig::default());
        let seed = SymbolicState::new(n[0], Formula::tt());
        assert!(matches!(
            d.transfer(&seed, &PathBound::default(), &cfa.edges()[0]),
            Err(CpaError::Transfer { .. })
        ));
    }
}
