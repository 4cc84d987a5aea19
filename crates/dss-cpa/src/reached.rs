//! Reached set: every (state, precision) pair the search has kept, indexed
//! by location.

use crate::domain::AbstractState;
use dss_cfa::NodeId;
use std::collections::HashMap;

/// Stable handle of a reached entry. Handles are never reused.
pub type EntryId = usize;

#[derive(Debug, Clone)]
pub struct ReachedSet<S, P> {
    entries: Vec<(S, P)>,
    by_location: HashMap<NodeId, Vec<EntryId>>,
}

impl<S, P> Default for ReachedSet<S, P> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
            by_location: HashMap::new(),
        }
    }
}

impl<S: AbstractState, P> ReachedSet<S, P> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, state: S, precision: P) -> EntryId {
        let id = self.entries.len();
        self.by_location
            .entry(state.location())
            .or_default()
            .push(id);
        self.entries.push((state, precision));
        id
    }

    /// Replace the content of an entry in place. The location must not
    /// change.
    pub fn replace(&mut self, id: EntryId, state: S, precision: P) {
        if let Some(entry) = self.entries.get_mut(id) {
            debug_assert_eq!(entry.0.location(), state.location());
            *entry = (state, precision);
        }
    }

    pub fn get(&self, id: EntryId) -> Option<(&S, &P)> {
        self.entries.get(id).map(|(s, p)| (s, p))
    }

    #[inline]
    pub fn contains(&self, id: EntryId) -> bool {
        id < self.entries.len()
    }

    /// Entry ids at `location`, in insertion order.
    pub fn ids_at(&self, location: NodeId) -> &[EntryId] {
        self.by_location
            .get(&location)
            .map_or(&[], Vec::as_slice)
    }

    pub fn states_at(&self, location: NodeId) -> Vec<&S> {
        self.ids_at(location)
            .iter()
            .filter_map(|&id| self.get(id).map(|(s, _)| s))
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (EntryId, &S, &P)> {
        self.entries
            .iter()
            .enumerate()
            .map(|(id, (s, p))| (id, s, p))
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
