//! Aggregation of task messages into run-level outcomes.
//!
//! Observers are registered with a [`MessageListener`] under their
//! [`ObserverKind`]; messages are delivered to every observer in
//! registration order and any observer may vote to stop the run.

use crate::message::{Message, MessageError, MessageType};
use crate::report::{AlgorithmStatus, Verdict};
use dss_cfa::BlockId;
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::PathBuf;
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ObserverKind {
    Error,
    Status,
    Result,
    FaultLocalization,
}

#[derive(Debug, Error)]
pub enum ObserverError {
    #[error("{block} failed: {cause}")]
    Aborted { block: BlockId, cause: String },

    #[error(transparent)]
    Message(#[from] MessageError),

    #[error("failed to write fault report {}: {source}", path.display())]
    Report {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("listener already finished")]
    Finished,
}

pub type ObserverResult<T> = Result<T, ObserverError>;

pub trait MessageObserver: Send {
    fn kind(&self) -> ObserverKind;

    /// Consume one message. `Ok(true)` votes to stop the run.
    fn process(&mut self, message: &Message) -> ObserverResult<bool>;

    /// Called once when the run ends. `late` holds messages that arrived
    /// after the stop decision.
    fn finish(&mut self, _verdict: &Verdict, _late: &[Message]) -> ObserverResult<()> {
        Ok(())
    }

    fn status(&self) -> Option<AlgorithmStatus> {
        None
    }

    fn verdict(&self) -> Option<Verdict> {
        None
    }
}

/// Fails the run on the first ERROR message.
#[derive(Debug, Default)]
pub struct ErrorObserver;

impl MessageObserver for ErrorObserver {
    fn kind(&self) -> ObserverKind {
        ObserverKind::Error
    }

    fn process(&mut self, message: &Message) -> ObserverResult<bool> {
        if message.kind() != MessageType::Error {
            return Ok(false);
        }
        Err(ObserverError::Aborted {
            block: message.block(),
            cause: message
                .get(crate::message::keys::EXCEPTION)
                .unwrap_or_default()
                .to_string(),
        })
    }
}

/// Per-block status, reduced by conjunction.
#[derive(Debug, Default)]
pub struct StatusObserver {
    per_block: BTreeMap<BlockId, AlgorithmStatus>,
}

impl StatusObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn block_status(&self, block: BlockId) -> Option<AlgorithmStatus> {
        self.per_block.get(&block).copied()
    }

    pub fn reduce(&self) -> AlgorithmStatus {
        self.per_block
            .values()
            .fold(AlgorithmStatus::default(), |acc, s| acc.combine(*s))
    }
}

impl MessageObserver for StatusObserver {
    fn kind(&self) -> ObserverKind {
        ObserverKind::Status
    }

    fn process(&mut self, message: &Message) -> ObserverResult<bool> {
        if message.kind() == MessageType::Status {
            let status = message.algorithm_status()?;
            let entry = self.per_block.entry(message.block()).or_default();
            *entry = entry.combine(status);
        }
        Ok(false)
    }

    fn finish(&mut self, _verdict: &Verdict, _late: &[Message]) -> ObserverResult<()> {
        let status = self.reduce();
        debug!(blocks = self.per_block.len(), %status, "status reduced");
        Ok(())
    }

    fn status(&self) -> Option<AlgorithmStatus> {
        Some(self.reduce())
    }
}

/// Records the first confirmed violation and votes to stop.
#[derive(Debug, Default)]
pub struct ResultObserver {
    violation: Option<Vec<BlockId>>,
}

impl ResultObserver {
    pub fn new() -> Self {
        Self::default()
    }
}

impl MessageObserver for ResultObserver {
    fn kind(&self) -> ObserverKind {
        ObserverKind::Result
    }

    fn process(&mut self, message: &Message) -> ObserverResult<bool> {
        if message.kind() != MessageType::FoundResult || !message.is_violation()? {
            return Ok(false);
        }
        if self.violation.is_none() {
            let visited = message.visited()?;
            info!(block = %message.block(), ?visited, "violation confirmed");
            self.violation = Some(visited);
        }
        Ok(true)
    }

    fn verdict(&self) -> Option<Verdict> {
        self.violation
            .clone()
            .map(|visited| Verdict::Unsafe { visited })
    }
}

/// Collects fault candidates and reports those on the confirmed
/// counterexample.
#[derive(Debug)]
pub struct FaultObserver {
    report: PathBuf,
    faults: BTreeMap<BlockId, BTreeSet<String>>,
    written: Vec<String>,
}

impl FaultObserver {
    pub fn new(report: impl Into<PathBuf>) -> Self {
        Self {
            report: report.into(),
            faults: BTreeMap::new(),
            written: Vec::new(),
        }
    }

    /// Faults collected so far, per block.
    pub fn faults(&self) -> &BTreeMap<BlockId, BTreeSet<String>> {
        &self.faults
    }

    /// Lines written at finish.
    pub fn written(&self) -> &[String] {
        &self.written
    }

    fn collect(&mut self, message: &Message) {
        if message.kind() != MessageType::ErrorCondition {
            return;
        }
        let faults = message.faults();
        if !faults.is_empty() {
            self.faults
                .entry(message.block())
                .or_default()
                .extend(faults);
        }
    }
}

impl MessageObserver for FaultObserver {
    fn kind(&self) -> ObserverKind {
        ObserverKind::FaultLocalization
    }

    fn process(&mut self, message: &Message) -> ObserverResult<bool> {
        self.collect(message);
        Ok(false)
    }

    fn finish(&mut self, verdict: &Verdict, late: &[Message]) -> ObserverResult<()> {
        let Verdict::Unsafe { visited } = verdict else {
            return Ok(());
        };
        for message in late {
            self.collect(message);
        }
        let mut seen = BTreeSet::new();
        let lines: Vec<String> = visited
            .iter()
            .filter(|b| seen.insert(**b))
            .filter_map(|b| self.faults.get(b))
            .flatten()
            .cloned()
            .collect();
        if lines.is_empty() {
            warn!("no fault candidates on the counterexample path");
            return Ok(());
        }
        let mut contents = lines.join("\n");
        contents.push('\n');
        fs::write(&self.report, contents).map_err(|source| ObserverError::Report {
            path: self.report.clone(),
            source,
        })?;
        info!(faults = lines.len(), path = %self.report.display(), "fault report written");
        self.written = lines;
        Ok(())
    }
}

/// Registry of observers keyed by kind, kept in registration order.
#[derive(Default)]
pub struct MessageListener {
    observers: Vec<Box<dyn MessageObserver>>,
    late: Vec<Message>,
    finished: bool,
}

impl MessageListener {
    pub fn new() -> Self {
        Self::default()
    }

    /// Error, status and result observers, plus fault localization when a
    /// report path is given.
    pub fn with_defaults(fault_report: Option<PathBuf>) -> Self {
        let mut listener = Self::new();
        listener.register(Box::new(ErrorObserver));
        listener.register(Box::new(StatusObserver::new()));
        listener.register(Box::new(ResultObserver::new()));
        if let Some(path) = fault_report {
            listener.register(Box::new(FaultObserver::new(path)));
        }
        listener
    }

    /// Register an observer. An observer of the same kind is replaced in
    /// place.
    pub fn register(&mut self, observer: Box<dyn MessageObserver>) {
        let kind = observer.kind();
        match self.observers.iter_mut().find(|o| o.kind() == kind) {
            Some(slot) => *slot = observer,
            None => self.observers.push(observer),
        }
    }

    pub fn get(&self, kind: ObserverKind) -> Option<&dyn MessageObserver> {
        self.observers
            .iter()
            .find(|o| o.kind() == kind)
            .map(|o| o.as_ref())
    }

    pub fn kinds(&self) -> Vec<ObserverKind> {
        self.observers.iter().map(|o| o.kind()).collect()
    }

    /// Deliver a message to every observer; true if any votes to stop.
    pub fn publish(&mut self, message: &Message) -> ObserverResult<bool> {
        let mut stop = false;
        for observer in &mut self.observers {
            stop |= observer.process(message)?;
        }
        Ok(stop)
    }

    /// Queue a message that arrived after the stop decision.
    pub fn enqueue_late(&mut self, message: Message) {
        self.late.push(message);
    }

    pub fn verdict(&self) -> Option<Verdict> {
        self.observers.iter().find_map(|o| o.verdict())
    }

    pub fn status(&self) -> AlgorithmStatus {
        self.observers
            .iter()
            .filter_map(|o| o.status())
            .fold(AlgorithmStatus::default(), AlgorithmStatus::combine)
    }

    /// Run every observer's `finish` once, in registration order. An
    /// observer verdict takes precedence over `fallback`.
    pub fn finish(&mut self, fallback: Verdict) -> ObserverResult<Verdict> {
        if self.finished {
            return Err(ObserverError::Finished);
        }
        self.finished = true;
        let verdict = self.verdict().unwrap_or(fallback);
        let late = std::mem::take(&mut self.late);
        for observer in &mut self.observers {
            observer.finish(&verdict, &late)?;
        }
        Ok(verdict)
    }
}

impl std::fmt::Debug for MessageListener {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessageListener")
            .field("observers", &self.kinds())
            .field("late", &self.late.len())
            .field("finished", &self.finished)
            .finish()
    }
}
