//! Tasks: self-contained units of block analysis executed on workers.

use crate::config::DssConfig;
use crate::domain::BlockDomain;
use crate::message::Message;
use crate::report::AlgorithmStatus;
use crate::request::Request;
use dss_cfa::{Block, BlockGraph, BlockId, CfaError, EdgeOp, NodeId};
use dss_cpa::{CancellationToken, CpaError, Engine, EngineConfig, EngineStats, RunStatus};
use dss_smt::{Formula, SatResult, SmtError, Solver};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, trace, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Forward,
    Backward,
}

/// Failure inside a task. Surfaces as an ERROR message.
#[derive(Debug, Error)]
pub enum TaskError {
    #[error(transparent)]
    Cpa(#[from] CpaError),

    #[error(transparent)]
    Smt(#[from] SmtError),

    #[error(transparent)]
    Cfa(#[from] CfaError),

    #[error("task panicked: {0}")]
    Panicked(String),
}

/// Shared, read-only collaborators handed to every task.
pub struct TaskContext<D> {
    pub domain: Arc<D>,
    pub solver: Arc<dyn Solver>,
    pub graph: Arc<BlockGraph>,
    pub config: Arc<DssConfig>,
    pub cancel: CancellationToken,
    /// Fault localization is both configured and supported by the domain.
    pub fault_localization: bool,
}

impl<D: BlockDomain> TaskContext<D> {
    pub fn new(
        domain: Arc<D>,
        solver: Arc<dyn Solver>,
        graph: Arc<BlockGraph>,
        config: DssConfig,
    ) -> Self {
        let fault_localization =
            config.fault_localization && domain.capabilities().fault_localization;
        Self {
            domain,
            solver,
            graph,
            config: Arc::new(config),
            cancel: CancellationToken::new(),
            fault_localization,
        }
    }
}

impl<D> Clone for TaskContext<D> {
    fn clone(&self) -> Self {
        Self {
            domain: Arc::clone(&self.domain),
            solver: Arc::clone(&self.solver),
            graph: Arc::clone(&self.graph),
            config: Arc::clone(&self.config),
            cancel: self.cancel.clone(),
            fault_localization: self.fault_localization,
        }
    }
}

/// Continuation produced by a task, applied on the scheduler thread.
#[derive(Debug, Clone)]
pub enum Followup {
    /// Commit `formula` as the summary `source -> target`.
    Summary {
        target: BlockId,
        source: BlockId,
        formula: Formula,
    },
    Request(Request),
}

#[derive(Debug)]
pub struct TaskOutput {
    pub block: BlockId,
    pub followups: Vec<Followup>,
    pub messages: Vec<Message>,
    /// The start condition was infeasible; no search ran.
    pub short_circuited: bool,
    /// Stopped by the cancellation token; nothing else is set.
    pub cancelled: bool,
    pub engine: EngineStats,
}

impl TaskOutput {
    fn new(block: BlockId) -> Self {
        Self {
            block,
            followups: Vec::new(),
            messages: Vec::new(),
            short_circuited: false,
            cancelled: false,
            engine: EngineStats::default(),
        }
    }

    fn cancelled(block: BlockId) -> Self {
        Self {
            cancelled: true,
            ..Self::new(block)
        }
    }
}

/// Result of one engine run over a block.
struct Exploration {
    /// Disjunction of the state formulas at the exit location.
    post: Formula,
    complete: bool,
    stats: EngineStats,
}

pub struct Task<D> {
    pub(crate) ctx: TaskContext<D>,
    pub(crate) block: BlockId,
    pub(crate) direction: Direction,
    pub(crate) origin: NodeId,
    pub(crate) condition: Formula,
    pub(crate) summary: Formula,
    /// Disjunction of the summaries into the block when the task was built.
    pub(crate) precondition: Formula,
    pub(crate) visited: Vec<BlockId>,
    pub(crate) propagation_key: Option<NodeId>,
}

impl<D: BlockDomain> Task<D> {
    pub fn block(&self) -> BlockId {
        self.block
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// Location the inherited condition refers to.
    pub fn origin(&self) -> NodeId {
        self.origin
    }

    pub fn condition(&self) -> &Formula {
        &self.condition
    }

    pub fn summary(&self) -> &Formula {
        &self.summary
    }

    pub fn visited(&self) -> &[BlockId] {
        &self.visited
    }

    /// Location to mark as propagated when this task is dispatched.
    pub fn propagation_key(&self) -> Option<NodeId> {
        self.propagation_key
    }

    pub fn run(&self) -> Result<TaskOutput, TaskError> {
        let block = self.ctx.graph.block(self.block)?;
        if self.ctx.cancel.is_cancelled() {
            return Ok(TaskOutput::cancelled(self.block));
        }
        let mut output = TaskOutput::new(self.block);
        let mut status = AlgorithmStatus::default();

        let start = self.condition.and(&self.summary);
        match self.ctx.solver.check(start.term())? {
            SatResult::Unsat => {
                debug!(block = %self.block, direction = ?self.direction, "start condition infeasible");
                output.short_circuited = true;
                output.messages.push(Message::status(self.block, status));
                return Ok(output);
            }
            SatResult::Unknown => status.precise = false,
            SatResult::Sat => {}
        }

        let done = match self.direction {
            Direction::Forward => self.forward(block, &start, &mut status, &mut output)?,
            Direction::Backward => self.backward(block, &mut status, &mut output)?,
        };
        if !done {
            return Ok(TaskOutput::cancelled(self.block));
        }
        output.messages.push(Message::status(self.block, status));
        Ok(output)
    }

    /// Returns false if cancelled.
    fn forward(
        &self,
        block: &Block,
        start: &Formula,
        status: &mut AlgorithmStatus,
        output: &mut TaskOutput,
    ) -> Result<bool, TaskError> {
        let Some(run) = self.explore(block, start)? else {
            return Ok(false);
        };
        status.sound &= run.complete;
        output.engine = run.stats;

        let feasible = self.ctx.solver.check(run.post.term())?;
        if feasible == SatResult::Unsat {
            debug!(block = %self.block, "block exit unreachable");
            return Ok(true);
        }
        status.precise &= feasible == SatResult::Sat;

        let summary = run.post.rebase().simplify();
        for &successor in block.successors() {
            output.followups.push(Followup::Summary {
                target: successor,
                source: self.block,
                formula: summary.clone(),
            });
        }
        if self.ctx.graph.is_error_location(block.target()) {
            debug!(block = %self.block, location = %block.target(), "error location reachable");
            output.followups.push(Followup::Request(Request::backward(
                self.block,
                None,
                Formula::tt(),
                Vec::new(),
            )));
        }
        Ok(true)
    }

    /// Returns false if cancelled.
    fn backward(
        &self,
        block: &Block,
        status: &mut AlgorithmStatus,
        output: &mut TaskOutput,
    ) -> Result<bool, TaskError> {
        if self.visited.len() >= self.ctx.config.max_backward_depth {
            warn!(block = %self.block, depth = self.visited.len(), "backward depth limit reached");
            status.property_checked = false;
            return Ok(true);
        }
        let Some(run) = self.explore(block, &Formula::tt())? else {
            return Ok(false);
        };
        status.sound &= run.complete;
        output.engine = run.stats;

        let precondition = run.post.and(&self.condition.lift(run.post.ssa()));
        let feasible = self.ctx.solver.check(precondition.term())?;
        if feasible == SatResult::Unsat {
            debug!(block = %self.block, "error condition infeasible in block");
            return Ok(true);
        }
        let condition = precondition.into_entry_frame().simplify();

        let faults = if self.ctx.fault_localization && feasible == SatResult::Sat {
            match self.localize(block)? {
                Some(faults) => faults,
                None => return Ok(false),
            }
        } else {
            Vec::new()
        };
        output
            .messages
            .push(Message::error_condition(self.block, &condition, &faults));

        let mut visited = self.visited.clone();
        visited.push(self.block);
        if self.ctx.graph.is_root(self.block) {
            if feasible == SatResult::Sat {
                visited.reverse();
                output
                    .messages
                    .push(Message::found_result(self.block, true, &visited));
            } else {
                status.property_checked = false;
            }
            return Ok(true);
        }
        status.precise &= feasible == SatResult::Sat;
        for &predecessor in block.predecessors() {
            output.followups.push(Followup::Request(Request::backward(
                predecessor,
                Some(self.block),
                condition.clone(),
                visited.clone(),
            )));
        }
        Ok(true)
    }

    /// Run the engine over `block` from `seed`; `None` if cancelled.
    fn explore(&self, block: &Block, seed: &Formula) -> Result<Option<Exploration>, TaskError> {
        let domain = self.ctx.domain.as_ref();
        let config = EngineConfig {
            order: self.ctx.config.waitlist_order,
            parallel_transfer: self.ctx.config.parallel_transfer,
        };
        let mut engine =
            Engine::new(domain, block, config).with_cancellation(self.ctx.cancel.clone());
        engine.seed(
            domain.initial_state(block.entry(), seed),
            domain.initial_precision(block.entry()),
        );
        let status = engine.run()?;
        if status == RunStatus::Cancelled {
            return Ok(None);
        }
        let at_exit: Vec<Formula> = engine
            .reached()
            .states_at(block.exit_location())
            .into_iter()
            .map(|s| domain.state_formula(s))
            .collect();
        trace!(
            block = %block.id(),
            reached = engine.reached().len(),
            at_exit = at_exit.len(),
            "block explored"
        );
        Ok(Some(Exploration {
            post: Formula::disjunction(&at_exit),
            complete: status == RunStatus::Completed,
            stats: engine.stats().clone(),
        }))
    }

    /// Edges whose relaxation alone makes the error condition infeasible.
    /// An assumption is relaxed to `skip`, an assignment to keeping the old
    /// value. `None` if cancelled.
    fn localize(&self, block: &Block) -> Result<Option<Vec<String>>, TaskError> {
        let mut faults = Vec::new();
        for edge in block.edges() {
            if !matches!(edge.op, EdgeOp::Assume(_) | EdgeOp::Assign { .. }) {
                continue;
            }
            let relaxed = block.with_op(edge.id, EdgeOp::Skip);
            let Some(run) = self.explore(&relaxed, &self.precondition)? else {
                return Ok(None);
            };
            let query = run.post.and(&self.condition.lift(run.post.ssa()));
            match self.ctx.solver.check(query.term())? {
                SatResult::Unsat => faults.push(format!("{}: {} ({})", block.id(), edge.id, edge.op)),
                SatResult::Sat => {}
                SatResult::Unknown => {
                    debug!(block = %block.id(), edge = %edge.id, "fault check undecided, edge kept");
                }
            }
        }
        Ok(Some(faults))
    }
}
