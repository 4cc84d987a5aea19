//! The run loop: owns the coordination state, turns requests into tasks,
//! dispatches them onto a worker pool and folds their results back in.
//!
//! Workers never touch shared state. A task reads everything it needs when
//! it is built on the scheduler thread; its summaries, follow-up requests
//! and messages travel back over a channel and are applied here, in
//! completion order.

use crate::config::DssConfig;
use crate::domain::BlockDomain;
use crate::message::Message;
use crate::observer::{MessageListener, ObserverError};
use crate::report::{AlgorithmStatus, RunReport, SchedulerStats, Verdict};
use crate::request::Request;
use crate::summary::{Commit, CoordinationState};
use crate::task::{Followup, TaskContext, TaskError, TaskOutput};
use crate::{DssError, DssResult};
use dss_cfa::{BlockGraph, BlockId};
use dss_cpa::CancellationToken;
use dss_smt::{Formula, Solver};
use std::collections::VecDeque;
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, trace, warn};

enum Event {
    Submitted(Request),
    Finished {
        block: BlockId,
        result: Result<TaskOutput, TaskError>,
    },
}

/// Handle for submitting requests to a running scheduler from any thread.
#[derive(Clone)]
pub struct RequestSender {
    tx: Sender<Event>,
}

impl RequestSender {
    pub fn submit(&self, request: Request) -> DssResult<()> {
        self.tx
            .send(Event::Submitted(request))
            .map_err(|_| DssError::Disconnected)
    }
}

/// Why the run loop stopped taking new work.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Halt {
    /// No pending requests and nothing in flight.
    Quiescent,
    /// An observer voted to stop.
    Decided,
    Cancelled,
    TimedOut,
}

pub struct Scheduler<D: BlockDomain + 'static> {
    ctx: TaskContext<D>,
    state: CoordinationState,
    listener: MessageListener,
    pool: rayon::ThreadPool,
    tx: Sender<Event>,
    rx: Receiver<Event>,
    pending: VecDeque<Request>,
    in_flight: usize,
    stats: SchedulerStats,
}

impl<D: BlockDomain + 'static> Scheduler<D> {
    pub fn new(
        graph: Arc<BlockGraph>,
        domain: Arc<D>,
        solver: Arc<dyn Solver>,
        config: DssConfig,
    ) -> DssResult<Self> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(config.num_threads)
            .thread_name(|i| format!("dss-worker-{i}"))
            .build()
            .map_err(|e| DssError::Pool(e.to_string()))?;
        let report = config.fault_report.clone();
        let ctx = TaskContext::new(domain, solver, graph, config);
        if ctx.config.fault_localization && !ctx.fault_localization {
            debug!("domain does not support fault localization, disabled");
        }
        let listener = MessageListener::with_defaults(ctx.fault_localization.then_some(report));
        let (tx, rx) = mpsc::channel();
        Ok(Self {
            ctx,
            state: CoordinationState::new(),
            listener,
            pool,
            tx,
            rx,
            pending: VecDeque::new(),
            in_flight: 0,
            stats: SchedulerStats::default(),
        })
    }

    pub fn sender(&self) -> RequestSender {
        RequestSender {
            tx: self.tx.clone(),
        }
    }

    /// Token that stops the run; cancelling it is safe from any thread.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.ctx.cancel.clone()
    }

    /// Register or replace observers before the run starts.
    pub fn listener_mut(&mut self) -> &mut MessageListener {
        &mut self.listener
    }

    pub fn graph(&self) -> &BlockGraph {
        &self.ctx.graph
    }

    /// Analyze the block graph to a verdict. Blocks until every dispatched
    /// task has returned.
    pub fn run(mut self) -> DssResult<RunReport> {
        let started = Instant::now();
        self.state.claim();
        let roots = self.ctx.graph.roots().to_vec();
        info!(
            blocks = self.ctx.graph.len(),
            roots = roots.len(),
            threads = self.pool.current_num_threads(),
            "analysis started"
        );
        for root in roots {
            self.pending.push_back(Request::fresh(root, Formula::tt()));
        }

        let halt = match self.drive(started) {
            Ok(halt) => halt,
            Err(e) => {
                self.ctx.cancel.cancel();
                self.drain();
                return Err(e);
            }
        };
        debug!(?halt, "run loop stopped");
        if halt != Halt::Quiescent {
            self.ctx.cancel.cancel();
        }
        self.drain();

        let fallback = match halt {
            Halt::Quiescent | Halt::Decided => {
                let status = self.listener.status();
                if status.sound && status.property_checked {
                    Verdict::Safe
                } else {
                    Verdict::Unknown {
                        reason: "analysis incomplete".into(),
                    }
                }
            }
            Halt::Cancelled => Verdict::Unknown {
                reason: "cancelled".into(),
            },
            Halt::TimedOut => Verdict::Unknown {
                reason: "timeout".into(),
            },
        };
        let verdict = self.listener.finish(fallback)?;
        let status = self.listener.status();
        self.stats.elapsed = started.elapsed();
        info!(
            %verdict,
            %status,
            dispatched = self.stats.dispatched,
            invalidated = self.stats.invalidated,
            elapsed_ms = self.stats.elapsed.as_millis() as u64,
            "analysis finished"
        );
        Ok(RunReport {
            verdict,
            status,
            stats: self.stats,
            summaries: self.state.into_summaries(),
        })
    }

    fn drive(&mut self, started: Instant) -> DssResult<Halt> {
        let deadline = self.ctx.config.timeout.map(|t| started + t);
        loop {
            if self.ctx.cancel.is_cancelled() {
                return Ok(Halt::Cancelled);
            }
            if deadline.is_some_and(|d| Instant::now() >= d) {
                warn!("analysis timed out");
                return Ok(Halt::TimedOut);
            }
            while let Ok(event) = self.rx.try_recv() {
                if self.handle(event)? {
                    return Ok(Halt::Decided);
                }
            }
            if let Some(request) = self.pending.pop_front() {
                self.dispatch(request);
                continue;
            }
            if self.in_flight == 0 {
                return Ok(Halt::Quiescent);
            }
            match self.rx.recv_timeout(self.ctx.config.poll_interval) {
                Ok(event) => {
                    if self.handle(event)? {
                        return Ok(Halt::Decided);
                    }
                }
                Err(RecvTimeoutError::Timeout) => {}
                // self.tx keeps the channel open
                Err(RecvTimeoutError::Disconnected) => return Err(DssError::Disconnected),
            }
        }
    }

    fn dispatch(&mut self, request: Request) {
        self.stats.requests += 1;
        trace!(%request, "processing request");
        let task = match request.process(&self.state, &self.ctx) {
            Ok(task) => task,
            Err(reason) => {
                self.stats.invalidated += 1;
                debug!(%reason, "request invalidated");
                return;
            }
        };
        if let Some(key) = task.propagation_key() {
            self.state.propagated_mut().insert(key);
        }
        self.in_flight += 1;
        self.stats.dispatched += 1;
        let tx = self.tx.clone();
        self.pool.spawn(move || {
            let block = task.block();
            let result = panic::catch_unwind(AssertUnwindSafe(|| task.run()))
                .unwrap_or_else(|payload| Err(TaskError::Panicked(panic_message(&*payload))));
            // the receiver is gone only once the run has returned
            let _ = tx.send(Event::Finished { block, result });
        });
    }

    /// Apply one event. Returns true if an observer voted to stop.
    fn handle(&mut self, event: Event) -> DssResult<bool> {
        let (block, result) = match event {
            Event::Submitted(request) => {
                self.pending.push_back(request);
                return Ok(false);
            }
            Event::Finished { block, result } => (block, result),
        };
        self.in_flight -= 1;
        let output = match result {
            Ok(output) => output,
            Err(e) => {
                warn!(%block, error = %e, "task failed");
                self.publish(&Message::error(block, &e))?;
                return Ok(false);
            }
        };
        if output.cancelled {
            self.stats.cancelled += 1;
            return Ok(false);
        }
        self.stats.completed += 1;
        trace!(
            %block,
            followups = output.followups.len(),
            messages = output.messages.len(),
            popped = output.engine.popped,
            "task finished"
        );

        for followup in output.followups {
            match followup {
                Followup::Summary {
                    target,
                    source,
                    formula,
                } => self.commit(target, source, formula)?,
                Followup::Request(request) => self.pending.push_back(request),
            }
        }
        let mut stop = false;
        for message in &output.messages {
            stop |= self.publish(message)?;
        }
        Ok(stop)
    }

    fn commit(&mut self, target: BlockId, source: BlockId, formula: Formula) -> DssResult<()> {
        let commit = self.state.summaries_mut().commit(
            target,
            source,
            formula,
            self.ctx.solver.as_ref(),
            self.ctx.config.max_summary_versions,
        );
        match commit {
            Ok(Commit::Updated { version }) => {
                self.stats.summary_updates += 1;
                debug!(%source, %target, version, "summary updated");
                self.pending
                    .push_back(Request::refinement(target, source, version));
            }
            Ok(Commit::Saturated { version }) => {
                warn!(%source, %target, version, "summary keeps changing, not re-propagated");
                self.publish(&Message::status(target, AlgorithmStatus::unsound()))?;
            }
            Ok(Commit::Unchanged) => {
                debug!(%source, %target, "summary unchanged");
            }
            Err(e) => {
                self.publish(&Message::error(source, &e))?;
            }
        }
        Ok(())
    }

    fn publish(&mut self, message: &Message) -> DssResult<bool> {
        match self.listener.publish(message) {
            Ok(stop) => Ok(stop),
            Err(e) => {
                self.ctx.cancel.cancel();
                Err(e.into())
            }
        }
    }

    /// Wait for every in-flight task. Messages of tasks that still complete
    /// are handed to the observers as late messages.
    fn drain(&mut self) {
        while self.in_flight > 0 {
            let event = match self.rx.recv() {
                Ok(event) => event,
                Err(_) => break,
            };
            if let Event::Finished { result, .. } = event {
                self.in_flight -= 1;
                match result {
                    Ok(output) if output.cancelled => self.stats.cancelled += 1,
                    Ok(output) => {
                        self.stats.completed += 1;
                        self.stats.late_messages += output.messages.len();
                        for message in output.messages {
                            self.listener.enqueue_late(message);
                        }
                    }
                    Err(e) => debug!(error = %e, "task failed after the run stopped"),
                }
            }
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

impl From<ObserverError> for DssError {
    fn from(e: ObserverError) -> Self {
        match e {
            ObserverError::Aborted { block, cause } => DssError::Aborted { block, cause },
            other => DssError::Observer(other),
        }
    }
}
