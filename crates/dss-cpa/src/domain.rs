//! Operator contract every abstract domain implements.

use crate::CpaResult;
use dss_cfa::{Block, Cfa, CfaEdge, NodeId};
use std::fmt::Debug;

/// Abstract state; knows which location it belongs to.
pub trait AbstractState: Clone + Debug + Send + Sync {
    fn location(&self) -> NodeId;
}

/// Decision of precision adjustment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Continue,
    /// Pause exploration: the predecessor goes back on the waitlist and the
    /// remaining successors of the current pop are dropped.
    Break,
}

#[derive(Debug, Clone)]
pub struct PrecisionAdjustment<S, P> {
    pub state: S,
    pub precision: P,
    pub action: Action,
}

impl<S, P> PrecisionAdjustment<S, P> {
    pub fn keep(state: S, precision: P) -> Self {
        Self {
            state,
            precision,
            action: Action::Continue,
        }
    }
}

/// A pluggable analysis: transfer, merge, stop and precision adjustment.
pub trait AbstractDomain: Send + Sync {
    type State: AbstractState;
    type Precision: Clone + Debug + Send + Sync;

    fn initial_precision(&self, location: NodeId) -> Self::Precision;

    /// Successors of `state` along `edge`. An empty vector is a dead end.
    fn transfer(
        &self,
        state: &Self::State,
        precision: &Self::Precision,
        edge: &CfaEdge,
    ) -> CpaResult<Vec<Self::State>>;

    /// Combine `state` into `reached`. `None` keeps both apart.
    fn merge(
        &self,
        state: &Self::State,
        reached: &Self::State,
        precision: &Self::Precision,
    ) -> CpaResult<Option<Self::State>>;

    /// Whether `state` is covered by the reached states at its location.
    fn stop(
        &self,
        state: &Self::State,
        reached: &[&Self::State],
        precision: &Self::Precision,
    ) -> CpaResult<bool>;

    fn precision_adjust(
        &self,
        state: Self::State,
        precision: Self::Precision,
    ) -> CpaResult<PrecisionAdjustment<Self::State, Self::Precision>> {
        Ok(PrecisionAdjustment::keep(state, precision))
    }
}

/// Graph the engine explores.
pub trait TransitionSystem: Sync {
    fn leaving(&self, node: NodeId) -> impl Iterator<Item = &CfaEdge>;

    /// Topological rank used by [`crate::WaitlistOrder::Topological`].
    fn rank(&self, node: NodeId) -> usize;
}

impl TransitionSystem for Block {
    fn leaving(&self, node: NodeId) -> impl Iterator<Item = &CfaEdge> {
        Block::leaving(self, node)
    }

    fn rank(&self, node: NodeId) -> usize {
        Block::rank(self, node)
    }
}

impl TransitionSystem for Cfa {
    fn leaving(&self, node: NodeId) -> impl Iterator<Item = &CfaEdge> {
        Cfa::leaving(self, node)
    }

    fn rank(&self, node: NodeId) -> usize {
        node.index()
    }
}
