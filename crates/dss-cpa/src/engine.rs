//! Worklist fixpoint search, generic over the abstract domain.
//!
//! One iteration pops an entry, computes its successors along every leaving
//! edge, runs precision adjustment on each, merges it into the reached
//! states at its location and finally checks coverage. Successor handling
//! is sequential; only the transfer step may fan out over rayon and is
//! joined before anything touches the reached set.

use crate::cancel::CancellationToken;
use crate::domain::{AbstractDomain, AbstractState, Action, TransitionSystem};
use crate::reached::{EntryId, ReachedSet};
use crate::waitlist::{Waitlist, WaitlistOrder};
use crate::CpaResult;
use dss_cfa::CfaEdge;
use rayon::prelude::*;
use tracing::{debug, trace};

#[derive(Debug, Clone, Default)]
pub struct EngineConfig {
    pub order: WaitlistOrder,
    /// Compute the successors of one pop in parallel.
    pub parallel_transfer: bool,
}

/// Outcome of [`Engine::run`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    /// The waitlist ran empty.
    Completed,
    /// Precision adjustment asked to stop; the waitlist is not empty.
    Paused,
    Cancelled,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct EngineStats {
    pub popped: usize,
    pub successors: usize,
    pub merges: usize,
    pub covered: usize,
    pub breaks: usize,
    pub max_waitlist: usize,
    waitlist_total: usize,
}

impl EngineStats {
    /// Mean waitlist size observed at pop time.
    pub fn avg_waitlist(&self) -> f64 {
        if self.popped == 0 {
            0.0
        } else {
            self.waitlist_total as f64 / self.popped as f64
        }
    }

    fn record_pop(&mut self, waitlist_len: usize) {
        self.popped += 1;
        self.waitlist_total += waitlist_len;
        self.max_waitlist = self.max_waitlist.max(waitlist_len);
    }
}

pub struct Engine<'a, D: AbstractDomain, T> {
    domain: &'a D,
    system: &'a T,
    config: EngineConfig,
    cancel: CancellationToken,
    reached: ReachedSet<D::State, D::Precision>,
    waitlist: Waitlist,
    stats: EngineStats,
}

impl<'a, D, T> Engine<'a, D, T>
where
    D: AbstractDomain,
    T: TransitionSystem,
{
    pub fn new(domain: &'a D, system: &'a T, config: EngineConfig) -> Self {
        let waitlist = Waitlist::new(config.order);
        Self {
            domain,
            system,
            config,
            cancel: CancellationToken::new(),
            reached: ReachedSet::new(),
            waitlist,
            stats: EngineStats::default(),
        }
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Add an initial element to both the reached set and the waitlist.
    pub fn seed(&mut self, state: D::State, precision: D::Precision) -> EntryId {
        let rank = self.system.rank(state.location());
        let id = self.reached.add(state, precision);
        self.waitlist.push(id, rank);
        id
    }

    /// Explore until the waitlist is empty, a successor asks to break, or
    /// the cancellation token fires. A paused run can be resumed by calling
    /// `run` again.
    pub fn run(&mut self) -> CpaResult<RunStatus> {
        loop {
            if self.cancel.is_cancelled() {
                debug!(reached = self.reached.len(), "engine cancelled");
                return Ok(RunStatus::Cancelled);
            }
            let waiting = self.waitlist.len();
            let Some(id) = self.waitlist.pop() else {
                break;
            };
            let Some((state, precision)) = self
                .reached
                .get(id)
                .map(|(s, p)| (s.clone(), p.clone()))
            else {
                continue;
            };
            self.stats.record_pop(waiting);
            trace!(entry = id, location = %state.location(), waiting, "pop");

            let edges: Vec<&CfaEdge> = self.system.leaving(state.location()).collect();
            let successors = self.transfer_all(&state, &precision, &edges)?;
            for successor in successors {
                self.stats.successors += 1;
                let adjusted = self.domain.precision_adjust(successor, precision.clone())?;
                if adjusted.action == Action::Break {
                    self.stats.breaks += 1;
                    self.waitlist.push(id, self.system.rank(state.location()));
                    debug!(location = %state.location(), "precision adjustment paused the search");
                    return Ok(RunStatus::Paused);
                }
                self.insert(adjusted.state, adjusted.precision)?;
            }
        }
        debug!(
            reached = self.reached.len(),
            popped = self.stats.popped,
            merges = self.stats.merges,
            covered = self.stats.covered,
            max_waitlist = self.stats.max_waitlist,
            avg_waitlist = self.stats.avg_waitlist(),
            "engine completed"
        );
        Ok(RunStatus::Completed)
    }

    fn transfer_all(
        &self,
        state: &D::State,
        precision: &D::Precision,
        edges: &[&CfaEdge],
    ) -> CpaResult<Vec<D::State>> {
        let domain = self.domain;
        if self.config.parallel_transfer && edges.len() > 1 {
            let per_edge = edges
                .par_iter()
                .map(|edge| domain.transfer(state, precision, edge))
                .collect::<CpaResult<Vec<_>>>()?;
            return Ok(per_edge.into_iter().flatten().collect());
        }
        let mut out = Vec::new();
        for edge in edges {
            out.extend(domain.transfer(state, precision, edge)?);
        }
        Ok(out)
    }

    fn insert(&mut self, state: D::State, precision: D::Precision) -> CpaResult<()> {
        let location = state.location();
        let rank = self.system.rank(location);

        for other in self.reached.ids_at(location).to_vec() {
            let Some((reached, _)) = self.reached.get(other) else {
                continue;
            };
            if let Some(merged) = self.domain.merge(&state, reached, &precision)? {
                self.stats.merges += 1;
                self.reached.replace(other, merged, precision.clone());
                self.waitlist.push(other, rank);
            }
        }

        let covered = {
            let at = self.reached.states_at(location);
            self.domain.stop(&state, &at, &precision)?
        };
        if covered {
            self.stats.covered += 1;
        } else {
            let id = self.reached.add(state, precision);
            self.waitlist.push(id, rank);
        }
        Ok(())
    }

    pub fn reached(&self) -> &ReachedSet<D::State, D::Precision> {
        &self.reached
    }

    pub fn waitlist(&self) -> &Waitlist {
        &self.waitlist
    }

    pub fn stats(&self) -> &EngineStats {
        &self.stats
    }
}
