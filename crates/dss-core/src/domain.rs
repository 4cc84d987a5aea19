//! Block-level extension of the abstract-domain contract.

use dss_cfa::NodeId;
use dss_cpa::{AbstractDomain, SymbolicDomain, SymbolicState};
use dss_smt::Formula;

/// Optional features a domain supports, queried once when the scheduler
/// is built.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DomainCapabilities {
    /// States carry exact path formulas, so relaxing an edge and re-checking
    /// the error condition is meaningful.
    pub fault_localization: bool,
}

/// A domain whose states can be seeded from, and summarized into, formulas.
pub trait BlockDomain: AbstractDomain {
    /// State at `location` satisfying the entry-framed `condition`.
    fn initial_state(&self, location: NodeId, condition: &Formula) -> Self::State;

    /// Formula describing `state`, framed by its own SSA map.
    fn state_formula(&self, state: &Self::State) -> Formula;

    fn capabilities(&self) -> DomainCapabilities {
        DomainCapabilities::default()
    }
}

impl BlockDomain for SymbolicDomain {
    fn initial_state(&self, location: NodeId, condition: &Formula) -> SymbolicState {
        SymbolicState::new(location, condition.clone())
    }

    fn state_formula(&self, state: &SymbolicState) -> Formula {
        state.path().clone()
    }

    fn capabilities(&self) -> DomainCapabilities {
        DomainCapabilities {
            fault_localization: true,
        }
    }
}
