//! Coordination state: the versioned summary table and the set of
//! locations with a dispatched fresh propagation. Owned by the scheduler;
//! every access checks that it happens on the owning thread.

use dss_cfa::{BlockId, NodeId};
use dss_smt::{Formula, SmtError, SmtResult, Solver};
use std::collections::{BTreeMap, BTreeSet};
use std::thread::{self, ThreadId};

#[derive(Debug, Clone)]
pub struct SummaryEntry {
    pub formula: Formula,
    pub version: u64,
}

/// Result of [`SummaryTable::commit`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Commit {
    /// The new formula is equivalent to the stored one.
    Unchanged,
    Updated { version: u64 },
    /// Stored, but refined more often than allowed; not to be re-propagated.
    Saturated { version: u64 },
}

/// Summaries keyed by (target block, source block).
#[derive(Debug, Clone, Default)]
pub struct SummaryTable {
    entries: BTreeMap<(BlockId, BlockId), SummaryEntry>,
}

impl SummaryTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, target: BlockId, source: BlockId) -> Option<&SummaryEntry> {
        self.entries.get(&(target, source))
    }

    pub fn version(&self, target: BlockId, source: BlockId) -> Option<u64> {
        self.get(target, source).map(|e| e.version)
    }

    /// Summaries flowing into `target`, ordered by source.
    pub fn incoming(&self, target: BlockId) -> impl Iterator<Item = (BlockId, &SummaryEntry)> {
        self.entries
            .range((target, BlockId::new(0))..=(target, BlockId::new(u32::MAX)))
            .map(|(&(_, source), entry)| (source, entry))
    }

    pub fn iter(&self) -> impl Iterator<Item = (BlockId, BlockId, &SummaryEntry)> {
        self.entries
            .iter()
            .map(|(&(target, source), entry)| (target, source, entry))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Store `formula` as the summary `source -> target` unless it is
    /// equivalent to the current one. An undecided equivalence check counts
    /// as a change.
    pub fn commit(
        &mut self,
        target: BlockId,
        source: BlockId,
        formula: Formula,
        solver: &dyn Solver,
        max_versions: u64,
    ) -> SmtResult<Commit> {
        let version = match self.entries.get(&(target, source)) {
            Some(entry) => {
                match solver.equivalent(&entry.formula, &formula) {
                    Ok(true) => return Ok(Commit::Unchanged),
                    Ok(false) | Err(SmtError::Unknown { .. }) => {}
                    Err(e) => return Err(e),
                }
                entry.version + 1
            }
            None => 1,
        };
        self.entries
            .insert((target, source), SummaryEntry { formula, version });
        if version > max_versions {
            Ok(Commit::Saturated { version })
        } else {
            Ok(Commit::Updated { version })
        }
    }
}

/// Locations for which a fresh forward propagation was dispatched.
#[derive(Debug, Clone, Default)]
pub struct AlreadyPropagated {
    locations: BTreeSet<NodeId>,
}

impl AlreadyPropagated {
    pub fn contains(&self, location: NodeId) -> bool {
        self.locations.contains(&location)
    }

    /// Returns false if the location was already present.
    pub fn insert(&mut self, location: NodeId) -> bool {
        self.locations.insert(location)
    }

    pub fn len(&self) -> usize {
        self.locations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locations.is_empty()
    }
}

/// The only shared mutable state of a run.
#[derive(Debug)]
pub struct CoordinationState {
    owner: ThreadId,
    summaries: SummaryTable,
    propagated: AlreadyPropagated,
}

impl Default for CoordinationState {
    fn default() -> Self {
        Self::new()
    }
}

impl CoordinationState {
    /// Create state owned by the calling thread.
    pub fn new() -> Self {
        Self {
            owner: thread::current().id(),
            summaries: SummaryTable::new(),
            propagated: AlreadyPropagated::default(),
        }
    }

    /// Move ownership to the calling thread. Requires exclusive access.
    pub fn claim(&mut self) {
        self.owner = thread::current().id();
    }

    #[inline]
    fn check_owner(&self) {
        assert_eq!(
            thread::current().id(),
            self.owner,
            "coordination state accessed off the scheduler thread"
        );
    }

    pub fn summaries(&self) -> &SummaryTable {
        self.check_owner();
        &self.summaries
    }

    pub fn summaries_mut(&mut self) -> &mut SummaryTable {
        self.check_owner();
        &mut self.summaries
    }

    pub fn propagated(&self) -> &AlreadyPropagated {
        self.check_owner();
        &self.propagated
    }

    pub fn propagated_mut(&mut self) -> &mut AlreadyPropagated {
        self.check_owner();
        &mut self.propagated
    }

    /// Give up the state at the end of a run.
    pub fn into_summaries(self) -> SummaryTable {
        self.check_owner();
        self.summaries
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dss_smt::{BoundedSolver, Term, Var};

    fn x_eq(n: i64) -> Formula {
        Formula::entry(Term::var(&Var::int("x")).eq(Term::int(n)))
    }

    #[test]
    fn test_commit_versions() {
        let solver = BoundedSolver::default();
        let mut table = SummaryTable::new();
        let (t, s) = (BlockId::new(1), BlockId::new(0));
        assert_eq!(
            table.commit(t, s, x_eq(1), &solver, 8).unwrap(),
            Commit::Updated { version: 1 }
        );
        // equivalent but structurally different
        let same = Formula::entry(Term::int(1).eq(Term::var(&Var::int("x"))));
        assert_eq!(table.commit(t, s, same, &solver, 8).unwrap(), Commit::Unchanged);
        assert_eq!(
            table.commit(t, s, x_eq(2), &solver, 8).unwrap(),
            Commit::Updated { version: 2 }
        );
        assert_eq!(
            table.commit(t, s, x_eq(3), &solver, 2).unwrap(),
            Commit::Saturated { version: 3 }
        );
        assert_eq!(table.get(t, s).unwrap().formula, x_eq(3));
    }

    #[test]
    fn test_incoming_filters_target() {
        let solver = BoundedSolver::default();
        let mut table = SummaryTable::new();
        table
            .commit(BlockId::new(2), BlockId::new(0), x_eq(0), &solver, 8)
            .unwrap();
        table
            .commit(BlockId::new(2), BlockId::new(1), x_eq(1), &solver, 8)
            .unwrap();
        table
            .commit(BlockId::new(3), BlockId::new(2), x_eq(2), &solver, 8)
            .unwrap();
        let sources: Vec<BlockId> = table.incoming(BlockId::new(2)).map(|(s, _)| s).collect();
        assert_eq!(sources, vec![BlockId::new(0), BlockId::new(1)]);
    }

    #[test]
    fn test_access_from_other_thread_panics() {
        let state = CoordinationState::new();
        let result = std::thread::scope(|scope| {
            scope
                .spawn(|| {
                    let _ = state.summaries();
                })
                .join()
        });
        assert!(result.is_err());
    }
}
