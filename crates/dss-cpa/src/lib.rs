//! Abstract-domain contract and the per-block reachability engine.
//!
//! An [`AbstractDomain`] supplies transfer, merge, stop and precision
//! adjustment; [`Engine`] runs the worklist fixpoint search over any
//! [`TransitionSystem`] (a single block, or a whole CFA). The engine never
//! decides safety: callers inspect the final [`ReachedSet`].

pub mod cancel;
pub mod domain;
pub mod engine;
pub mod reached;
pub mod symbolic;
pub mod waitlist;

pub use cancel::CancellationToken;
pub use domain::{
    AbstractDomain, AbstractState, Action, PrecisionAdjustment, TransitionSystem,
};
pub use engine::{Engine, EngineConfig, EngineStats, RunStatus};
pub use reached::{EntryId, ReachedSet};
pub use symbolic::{MergeMode, PathBound, SymbolicConfig, SymbolicDomain, SymbolicState};
pub use waitlist::{Waitlist, WaitlistOrder};

use dss_cfa::EdgeId;
use dss_smt::SmtError;
use thiserror::Error;

/// Error raised by a domain operator or the engine.
#[derive(Debug, Error)]
pub enum CpaError {
    #[error("solver error: {0}")]
    Smt(#[from] SmtError),

    #[error("transfer failed on edge {edge}: {reason}")]
    Transfer { edge: EdgeId, reason: String },

    #[error("domain error: {0}")]
    Domain(String),
}

pub type CpaResult<T> = Result<T, CpaError>;
