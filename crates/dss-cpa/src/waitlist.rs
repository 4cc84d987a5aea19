//! Frontier of the search, holding reached-set handles.

use crate::reached::EntryId;
use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashSet, VecDeque};

/// Pop order of the waitlist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WaitlistOrder {
    /// Breadth-first.
    #[default]
    Fifo,
    /// Depth-first.
    Lifo,
    /// Lowest topological rank first, FIFO among equal ranks.
    Topological,
}

#[derive(Debug)]
enum Frontier {
    Queue(VecDeque<EntryId>),
    Heap(BinaryHeap<Reverse<(usize, u64, EntryId)>>),
}

/// Waitlist of reached entries. An entry is pending at most once; pushing
/// a pending entry again is a no-op.
#[derive(Debug)]
pub struct Waitlist {
    order: WaitlistOrder,
    frontier: Frontier,
    pending: HashSet<EntryId>,
    seq: u64,
}

impl Waitlist {
    pub fn new(order: WaitlistOrder) -> Self {
        let frontier = match order {
            WaitlistOrder::Fifo | WaitlistOrder::Lifo => Frontier::Queue(VecDeque::new()),
            WaitlistOrder::Topological => Frontier::Heap(BinaryHeap::new()),
        };
        Self {
            order,
            frontier,
            pending: HashSet::new(),
            seq: 0,
        }
    }

    pub fn order(&self) -> WaitlistOrder {
        self.order
    }

    /// Returns false if the entry was already pending.
    pub fn push(&mut self, id: EntryId, rank: usize) -> bool {
        if !self.pending.insert(id) {
            return false;
        }
        match &mut self.frontier {
            Frontier::Queue(q) => q.push_back(id),
            Frontier::Heap(h) => {
                h.push(Reverse((rank, self.seq, id)));
                self.seq += 1;
            }
        }
        true
    }

    pub fn pop(&mut self) -> Option<EntryId> {
        let id = match (&mut self.frontier, self.order) {
            (Frontier::Queue(q), WaitlistOrder::Lifo) => q.pop_back(),
            (Frontier::Queue(q), _) => q.pop_front(),
            (Frontier::Heap(h), _) => h.pop().map(|Reverse((_, _, id))| id),
        }?;
        self.pending.remove(&id);
        Some(id)
    }

    #[inline]
    pub fn contains(&self, id: EntryId) -> bool {
        self.pending.contains(&id)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drain(w: &mut Waitlist) -> Vec<EntryId> {
        std::iter::from_fn(|| w.pop()).collect()
    }

    #[test]
    fn test_fifo_and_lifo() {
        let mut fifo = Waitlist::new(WaitlistOrder::Fifo);
        let mut lifo = Waitlist::new(WaitlistOrder::Lifo);
        for id in [3, 1, 2] {
            fifo.push(id, 0);
            lifo.push(id, 0);
        }
        assert_eq!(drain(&mut fifo), vec![3, 1, 2]);
        assert_eq!(drain(&mut lifo), vec![2, 1, 3]);
    }

    #[test]
    fn test_topological_prefers_low_rank() {
        let mut w = Waitlist::new(WaitlistOrder::Topological);
        w.push(10, 2);
        w.push(11, 0);
        w.push(12, 1);
        w.push(13, 0);
        assert_eq!(drain(&mut w), vec![11, 13, 12, 10]);
    }

    #[test]
    fn test_duplicate_push_is_ignored() {
        let mut w = Waitlist::new(WaitlistOrder::Fifo);
        assert!(w.push(1, 0));
        assert!(!w.push(1, 0));
        assert!(w.push(2, 0));
        assert!(w.contains(1));
        assert_eq!(w.len(), 2);
        assert_eq!(drain(&mut w), vec![1, 2]);
        // popped entries may be pushed again
        assert!(w.push(1, 0));
    }
}
