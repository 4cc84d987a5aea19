//! Requests: pending work, validated exactly once against the coordination
//! state on the scheduler thread.

use crate::domain::BlockDomain;
use crate::summary::CoordinationState;
use crate::task::{Direction, Task, TaskContext};
use dss_cfa::{BlockId, NodeId};
use dss_smt::Formula;
use std::fmt;
use thiserror::Error;

#[derive(Debug, Clone)]
pub enum Request {
    /// Analyze `target` forward. Without a source the request is a fresh
    /// propagation seeded with `seed`; with one it re-runs `target` because
    /// the summary from that source reached the given version.
    Forward {
        target: BlockId,
        source: Option<(BlockId, u64)>,
        seed: Formula,
    },
    /// Push `condition`, framed at the exit of `target`, backwards through
    /// `target`. `source` is the successor it came from; `visited` lists
    /// the blocks already traversed, error block first.
    Backward {
        target: BlockId,
        source: Option<BlockId>,
        condition: Formula,
        visited: Vec<BlockId>,
    },
}

/// Why a request was dropped. Not an error: the work is superseded.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Invalidated {
    #[error("fresh propagation to {0} already dispatched")]
    AlreadyPropagated(NodeId),

    #[error("summary {from} -> {target} v{requested} superseded by v{current}")]
    Superseded {
        target: BlockId,
        from: BlockId,
        requested: u64,
        current: u64,
    },

    #[error("no summary {from} -> {target} to refine")]
    MissingSummary { target: BlockId, from: BlockId },

    #[error("unknown block {0}")]
    UnknownBlock(BlockId),
}

impl Request {
    pub fn fresh(target: BlockId, seed: Formula) -> Self {
        Request::Forward {
            target,
            source: None,
            seed,
        }
    }

    pub fn refinement(target: BlockId, source: BlockId, version: u64) -> Self {
        Request::Forward {
            target,
            source: Some((source, version)),
            seed: Formula::tt(),
        }
    }

    pub fn backward(
        target: BlockId,
        source: Option<BlockId>,
        condition: Formula,
        visited: Vec<BlockId>,
    ) -> Self {
        Request::Backward {
            target,
            source,
            condition,
            visited,
        }
    }

    pub fn target(&self) -> BlockId {
        match self {
            Request::Forward { target, .. } | Request::Backward { target, .. } => *target,
        }
    }

    pub fn direction(&self) -> Direction {
        match self {
            Request::Forward { .. } => Direction::Forward,
            Request::Backward { .. } => Direction::Backward,
        }
    }

    /// Validate against the coordination state and build the task. This is
    /// the request's only read of shared state.
    pub fn process<D: BlockDomain>(
        self,
        state: &CoordinationState,
        ctx: &TaskContext<D>,
    ) -> Result<Task<D>, Invalidated> {
        let target = self.target();
        let block = ctx
            .graph
            .get(target)
            .ok_or(Invalidated::UnknownBlock(target))?;
        let summaries = state.summaries();
        let incoming = || {
            let formulas: Vec<&Formula> = summaries
                .incoming(target)
                .map(|(_, e)| &e.formula)
                .collect();
            Formula::disjunction(formulas)
        };

        match self {
            Request::Forward {
                source: None, seed, ..
            } => {
                let key = block.target();
                if state.propagated().contains(key) {
                    return Err(Invalidated::AlreadyPropagated(key));
                }
                Ok(Task {
                    ctx: ctx.clone(),
                    block: target,
                    direction: Direction::Forward,
                    origin: block.entry(),
                    condition: seed.clone(),
                    summary: Formula::tt(),
                    precondition: seed,
                    visited: Vec::new(),
                    propagation_key: Some(key),
                })
            }
            Request::Forward {
                source: Some((source, requested)),
                ..
            } => {
                let current = summaries
                    .version(target, source)
                    .ok_or(Invalidated::MissingSummary {
                        target,
                        from: source,
                    })?;
                if current != requested {
                    return Err(Invalidated::Superseded {
                        target,
                        from: source,
                        requested,
                        current,
                    });
                }
                let condition = incoming();
                Ok(Task {
                    ctx: ctx.clone(),
                    block: target,
                    direction: Direction::Forward,
                    origin: block.entry(),
                    condition: condition.clone(),
                    summary: Formula::tt(),
                    precondition: condition,
                    visited: Vec::new(),
                    propagation_key: None,
                })
            }
            Request::Backward {
                source,
                condition,
                visited,
                ..
            } => {
                // the summary on the edge the condition enters through
                let summary = source
                    .and_then(|s| summaries.get(s, target))
                    .map_or_else(Formula::tt, |e| e.formula.clone());
                let precondition = if summaries.incoming(target).next().is_some() {
                    incoming()
                } else {
                    Formula::tt()
                };
                Ok(Task {
                    ctx: ctx.clone(),
                    block: target,
                    direction: Direction::Backward,
                    origin: block.target(),
                    condition,
                    summary,
                    precondition,
                    visited,
                    propagation_key: None,
                })
            }
        }
    }
}

impl fmt::Display for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Request::Forward {
                target,
                source: None,
                ..
            } => write!(f, "forward {target}"),
            Request::Forward {
                target,
                source: Some((source, version)),
                ..
            } => write!(f, "forward {target} (from {source} v{version})"),
            Request::Backward { target, source, .. } => match source {
                Some(s) => write!(f, "backward {target} (from {s})"),
                None => write!(f, "backward {target}"),
            },
        }
    }
}
