//! Distributed block-summary analysis.
//!
//! A program's CFA is cut into blocks ([`dss_cfa::decompose`]). The
//! [`Scheduler`] analyzes blocks concurrently: forward tasks compute
//! summaries of what reaches each block's exit, backward tasks push error
//! conditions towards the program entry. Summaries live in a versioned
//! table owned by the scheduler thread; tasks only ever see the snapshot
//! they were built from. Task results are published as [`Message`]s to a
//! [`MessageListener`], whose observers decide the [`Verdict`].

pub mod config;
pub mod domain;
pub mod message;
pub mod observer;
pub mod report;
pub mod request;
pub mod scheduler;
pub mod summary;
pub mod task;

pub use config::DssConfig;
pub use domain::{BlockDomain, DomainCapabilities};
pub use dss_cpa::CancellationToken;
pub use message::{Message, MessageError, MessageType, Payload};
pub use observer::{
    ErrorObserver, FaultObserver, MessageListener, MessageObserver, ObserverError, ObserverKind,
    ObserverResult, ResultObserver, StatusObserver,
};
pub use report::{AlgorithmStatus, RunReport, SchedulerStats, Verdict};
pub use request::{Invalidated, Request};
pub use scheduler::{RequestSender, Scheduler};
pub use summary::{AlreadyPropagated, Commit, CoordinationState, SummaryEntry, SummaryTable};
pub use task::{Direction, Followup, Task, TaskContext, TaskError, TaskOutput};

use dss_cfa::BlockId;
use thiserror::Error;

/// Run-level error. A verdict of `Unknown` is not an error.
#[derive(Debug, Error)]
pub enum DssError {
    /// A task failed; the run was stopped.
    #[error("analysis aborted in {block}: {cause}")]
    Aborted { block: BlockId, cause: String },

    #[error(transparent)]
    Observer(ObserverError),

    #[error("failed to build worker pool: {0}")]
    Pool(String),

    #[error("scheduler channel disconnected")]
    Disconnected,
}

pub type DssResult<T> = Result<T, DssError>;
