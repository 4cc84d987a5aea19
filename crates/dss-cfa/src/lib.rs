//! Control-flow automata and their decomposition into blocks.
//!
//! A [`Cfa`] is built once with [`CfaBuilder`]; [`decompose`] splits it into
//! an immutable [`BlockGraph`] whose blocks are analyzed independently.

pub mod block;
pub mod cfa;
pub mod decompose;

pub use block::{Block, BlockGraph, BlockId};
pub use cfa::{Cfa, CfaBuilder, CfaEdge, EdgeId, EdgeOp, NodeId};
pub use decompose::decompose;

use thiserror::Error;

/// CFA construction or lookup error.
#[derive(Debug, Error)]
pub enum CfaError {
    #[error("CFA has no entry node")]
    MissingEntry,

    #[error("unknown node {0}")]
    UnknownNode(NodeId),

    #[error("entry {0} is an error location")]
    ErrorAtEntry(NodeId),

    #[error("unknown block {0}")]
    UnknownBlock(BlockId),

    #[error("ill-typed edge {edge}: {reason}")]
    IllTyped { edge: EdgeId, reason: String },
}

pub type CfaResult<T> = Result<T, CfaError>;
