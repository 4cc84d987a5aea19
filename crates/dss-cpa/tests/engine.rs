//! Engine behavior against a toy edge-set domain and the symbolic domain.

use dss_cfa::{decompose, Cfa, CfaBuilder, CfaEdge, EdgeId, NodeId};
use dss_cpa::{
    AbstractDomain, AbstractState, Action, CancellationToken, CpaResult, Engine, EngineConfig,
    PrecisionAdjustment, RunStatus, SymbolicConfig, SymbolicDomain, SymbolicState, WaitlistOrder,
};
use dss_smt::{BoundedSolver, Formula, Solver, Term, Var};
use std::collections::BTreeSet;
use std::sync::Arc;

// ---------------------------------------------------------------------------
// Toy domain: the set of edges taken, joined by union
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
struct Taken {
    at: NodeId,
    edges: BTreeSet<EdgeId>,
}

impl AbstractState for Taken {
    fn location(&self) -> NodeId {
        self.at
    }
}

struct EdgeSets {
    join: bool,
    bound: Option<usize>,
}

impl AbstractDomain for EdgeSets {
    type State = Taken;
    type Precision = Option<usize>;

    fn initial_precision(&self, _location: NodeId) -> Option<usize> {
        self.bound
    }

    fn transfer(&self, state: &Taken, _p: &Option<usize>, edge: &CfaEdge) -> CpaResult<Vec<Taken>> {
        let mut edges = state.edges.clone();
        edges.insert(edge.id);
        Ok(vec![Taken { at: edge.to, edges }])
    }

    fn merge(&self, state: &Taken, reached: &Taken, _p: &Option<usize>) -> CpaResult<Option<Taken>> {
        if !self.join || state.edges.is_subset(&reached.edges) {
            return Ok(None);
        }
        Ok(Some(Taken {
            at: reached.at,
            edges: reached.edges.union(&state.edges).copied().collect(),
        }))
    }

    fn stop(&self, state: &Taken, reached: &[&Taken], _p: &Option<usize>) -> CpaResult<bool> {
        Ok(reached.iter().any(|r| state.edges.is_subset(&r.edges)))
    }

    fn precision_adjust(
        &self,
        state: Taken,
        precision: Option<usize>,
    ) -> CpaResult<PrecisionAdjustment<Taken, Option<usize>>> {
        let action = match precision {
            Some(bound) if state.edges.len() > bound => Action::Break,
            _ => Action::Continue,
        };
        Ok(PrecisionAdjustment {
            state,
            precision,
            action,
        })
    }
}

/// n0 -> {n1, n2} -> n3 -> n4
fn diamond() -> (Cfa, Vec<NodeId>) {
    let x = Var::int("x");
    let mut b = CfaBuilder::new();
    let n = b.add_nodes(5);
    b.assume(n[0], n[1], Term::var(&x).gt(Term::int(0)))
        .assume(n[0], n[2], Term::var(&x).le(Term::int(0)))
        .assign(n[1], n[3], &x, Term::int(1))
        .assign(n[2], n[3], &x, Term::int(2))
        .skip(n[3], n[4]);
    (b.build().unwrap(), n)
}

fn seed(at: NodeId) -> Taken {
    Taken {
        at,
        edges: BTreeSet::new(),
    }
}

// ---------------------------------------------------------------------------
// Worklist mechanics
// ---------------------------------------------------------------------------

#[test]
fn test_merge_replaces_pending_entry() {
    let (cfa, n) = diamond();
    let domain = EdgeSets {
        join: true,
        bound: None,
    };
    let mut engine = Engine::new(&domain, &cfa, EngineConfig::default());
    engine.seed(seed(n[0]), None);
    assert_eq!(engine.run().unwrap(), RunStatus::Completed);

    let stats = engine.stats();
    assert_eq!(stats.popped, 5);
    assert_eq!(stats.merges, 1);
    assert_eq!(stats.covered, 1);
    assert!(stats.avg_waitlist() > 0.0);
    assert!(stats.avg_waitlist() <= stats.max_waitlist as f64);
    let at_join = engine.reached().states_at(n[3]);
    assert_eq!(at_join.len(), 1);
    assert_eq!(at_join[0].edges.len(), 4);
}

#[test]
fn test_sep_keeps_both_paths() {
    let (cfa, n) = diamond();
    let domain = EdgeSets {
        join: false,
        bound: None,
    };
    let mut engine = Engine::new(&domain, &cfa, EngineConfig::default());
    engine.seed(seed(n[0]), None);
    assert_eq!(engine.run().unwrap(), RunStatus::Completed);
    assert_eq!(engine.reached().states_at(n[3]).len(), 2);
    assert_eq!(engine.reached().states_at(n[4]).len(), 2);
}

#[test]
fn test_break_pauses_with_predecessor_waiting() {
    let (cfa, n) = diamond();
    let domain = EdgeSets {
        join: true,
        bound: Some(1),
    };
    let mut engine = Engine::new(&domain, &cfa, EngineConfig::default());
    engine.seed(seed(n[0]), Some(1));
    assert_eq!(engine.run().unwrap(), RunStatus::Paused);
    assert_eq!(engine.stats().breaks, 1);
    // n1 was popped, produced a path of length 2 and went back
    let waiting = engine.waitlist().len();
    assert!(waiting >= 1);
    assert!(engine.reached().states_at(n[3]).is_empty());
}

#[test]
fn test_cancelled_before_start() {
    let (cfa, n) = diamond();
    let domain = EdgeSets {
        join: true,
        bound: None,
    };
    let token = CancellationToken::new();
    token.cancel();
    let mut engine = Engine::new(&domain, &cfa, EngineConfig::default()).with_cancellation(token);
    engine.seed(seed(n[0]), None);
    assert_eq!(engine.run().unwrap(), RunStatus::Cancelled);
    assert_eq!(engine.stats().popped, 0);
}

#[test]
fn test_orders_and_parallel_transfer_reach_same_states() {
    let (cfa, n) = diamond();
    let domain = EdgeSets {
        join: false,
        bound: None,
    };
    let mut sizes = Vec::new();
    for order in [WaitlistOrder::Fifo, WaitlistOrder::Lifo, WaitlistOrder::Topological] {
        for parallel_transfer in [false, true] {
            let config = EngineConfig {
                order,
                parallel_transfer,
            };
            let mut engine = Engine::new(&domain, &cfa, config);
            engine.seed(seed(n[0]), None);
            assert_eq!(engine.run().unwrap(), RunStatus::Completed);
            sizes.push(engine.reached().len());
        }
    }
    assert!(sizes.iter().all(|&s| s == sizes[0]));
}

// ---------------------------------------------------------------------------
// Symbolic domain over a block
// ---------------------------------------------------------------------------

#[test]
fn test_symbolic_post_at_block_exit() {
    let (cfa, n) = diamond();
    let graph = decompose(&cfa).unwrap();
    let block = graph.find(n[0], n[3]).unwrap();
    let solver: Arc<dyn Solver> = Arc::new(BoundedSolver::default());
    let domain = SymbolicDomain::new(solver.clone(), SymbolicConfig::default());

    let mut engine = Engine::new(
        &domain,
        block,
        EngineConfig {
            order: WaitlistOrder::Topological,
            ..Default::default()
        },
    );
    let precision = domain.initial_precision(block.entry());
    engine.seed(SymbolicState::new(block.entry(), Formula::tt()), precision);
    assert_eq!(engine.run().unwrap(), RunStatus::Completed);

    let at_exit = engine.reached().states_at(block.exit_location());
    let post = Formula::disjunction(at_exit.iter().map(|s| s.path())).rebase();
    let x = Var::int("x");
    let expected = Formula::entry(
        Term::var(&x)
            .eq(Term::int(1))
            .or(Term::var(&x).eq(Term::int(2))),
    );
    assert!(solver.implies(&post, &expected).unwrap());
    assert!(solver.is_sat(&post).unwrap());
}

// ---------------------------------------------------------------------------
// Waitlist properties
// ---------------------------------------------------------------------------

mod waitlist_props {
    use dss_cpa::{Waitlist, WaitlistOrder};
    use proptest::prelude::*;
    use std::collections::BTreeSet;

    fn order() -> impl Strategy<Value = WaitlistOrder> {
        prop_oneof![
            Just(WaitlistOrder::Fifo),
            Just(WaitlistOrder::Lifo),
            Just(WaitlistOrder::Topological),
        ]
    }

    proptest! {
        #[test]
        fn test_pops_each_pending_entry_once(
            order in order(),
            pushes in prop::collection::vec((0usize..16, 0usize..8), 0..40),
        ) {
            let mut waitlist = Waitlist::new(order);
            for &(id, rank) in &pushes {
                waitlist.push(id, rank);
            }
            let expected: BTreeSet<usize> = pushes.iter().map(|p| p.0).collect();
            prop_assert_eq!(waitlist.len(), expected.len());
            let mut popped = BTreeSet::new();
            while let Some(id) = waitlist.pop() {
                prop_assert!(popped.insert(id));
            }
            prop_assert_eq!(popped, expected);
            prop_assert!(waitlist.is_empty());
        }

        #[test]
        fn test_topological_pops_by_rank(ranks in prop::collection::vec(0usize..8, 0..30)) {
            let mut waitlist = Waitlist::new(WaitlistOrder::Topological);
            for (id, &rank) in ranks.iter().enumerate() {
                waitlist.push(id, rank);
            }
            let mut last = 0;
            while let Some(id) = waitlist.pop() {
                prop_assert!(ranks[id] >= last);
                last = ranks[id];
            }
        }
    }
}
