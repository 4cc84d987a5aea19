//! Split a CFA into blocks at cut points.
//!
//! Cut points are the program entry, error locations, locations with
//! in-degree other than one and locations without leaving edges. Every other
//! location has exactly one entering edge, so the region between a cut point
//! and the next cut points is a tree; one block is emitted per reachable
//! (cut point, next cut point) pair.

use crate::block::{Block, BlockGraph, BlockId};
use crate::cfa::{Cfa, CfaEdge, EdgeId, NodeId};
use crate::CfaResult;
use smallvec::SmallVec;
use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};
use tracing::debug;

fn is_cut_point(cfa: &Cfa, node: NodeId) -> bool {
    node == cfa.entry()
        || cfa.is_error(node)
        || cfa.in_degree(node) != 1
        || cfa.out_degree(node) == 0
}

/// Decompose `cfa` into an immutable block graph.
pub fn decompose(cfa: &Cfa) -> CfaResult<BlockGraph> {
    let cut_points: Vec<NodeId> = cfa.nodes().filter(|&n| is_cut_point(cfa, n)).collect();
    let mut blocks: Vec<Block> = Vec::new();

    for &start in &cut_points {
        // Tree edge entering each region location, and edges reaching cut points.
        let mut parent: HashMap<NodeId, &CfaEdge> = HashMap::new();
        let mut arrivals: BTreeMap<NodeId, Vec<&CfaEdge>> = BTreeMap::new();
        let mut stack = vec![start];
        while let Some(u) = stack.pop() {
            for e in cfa.leaving(u) {
                if is_cut_point(cfa, e.to) {
                    arrivals.entry(e.to).or_default().push(e);
                } else if !parent.contains_key(&e.to) {
                    parent.insert(e.to, e);
                    stack.push(e.to);
                }
            }
        }

        for (target, entering) in arrivals {
            let mut edge_ids: BTreeSet<EdgeId> = BTreeSet::new();
            for e in entering {
                edge_ids.insert(e.id);
                let mut u = e.from;
                while u != start {
                    match parent.get(&u) {
                        Some(pe) => {
                            edge_ids.insert(pe.id);
                            u = pe.from;
                        }
                        None => break,
                    }
                }
            }
            let id = BlockId::new(blocks.len() as u32);
            let exit = if target == start {
                NodeId::new((cfa.node_count() + blocks.len()) as u32)
            } else {
                target
            };
            blocks.push(build_block(cfa, id, start, target, exit, &edge_ids));
        }
    }

    let mut by_entry: HashMap<NodeId, Vec<BlockId>> = HashMap::new();
    let mut by_target: HashMap<NodeId, Vec<BlockId>> = HashMap::new();
    for b in &blocks {
        by_entry.entry(b.entry).or_default().push(b.id);
        by_target.entry(b.target).or_default().push(b.id);
    }
    for b in &mut blocks {
        b.predecessors = by_target.get(&b.entry).cloned().unwrap_or_default();
        b.successors = by_entry.get(&b.target).cloned().unwrap_or_default();
    }
    let roots = by_entry.get(&cfa.entry()).cloned().unwrap_or_default();

    debug!(
        cut_points = cut_points.len(),
        blocks = blocks.len(),
        roots = roots.len(),
        "decomposed CFA into blocks"
    );
    Ok(BlockGraph {
        blocks,
        roots,
        program_entry: cfa.entry(),
        errors: cfa.error_locations().collect(),
    })
}

fn build_block(
    cfa: &Cfa,
    id: BlockId,
    entry: NodeId,
    target: NodeId,
    exit: NodeId,
    edge_ids: &BTreeSet<EdgeId>,
) -> Block {
    let mut nodes = BTreeSet::from([entry, target]);
    let mut edges = Vec::with_capacity(edge_ids.len());
    let mut leaving: HashMap<NodeId, SmallVec<[usize; 2]>> = HashMap::new();
    for (i, e) in edge_ids.iter().filter_map(|&eid| cfa.edge(eid)).enumerate() {
        nodes.insert(e.from);
        nodes.insert(e.to);
        let mut edge = e.clone();
        if edge.to == target {
            edge.to = exit;
        }
        leaving.entry(edge.from).or_default().push(i);
        edges.push(edge);
    }

    let mut ranks = HashMap::from([(entry, 0usize)]);
    let mut queue = VecDeque::from([entry]);
    while let Some(u) = queue.pop_front() {
        let r = ranks[&u];
        for &i in leaving.get(&u).into_iter().flatten() {
            let v = edges[i].to;
            let next = ranks.get(&v).map_or(r + 1, |&old| old.max(r + 1));
            if ranks.insert(v, next).is_none() {
                queue.push_back(v);
            }
        }
    }

    Block {
        id,
        entry,
        target,
        exit,
        nodes,
        edges,
        leaving,
        ranks,
        predecessors: Vec::new(),
        successors: Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cfa::CfaBuilder;
    use dss_smt::{Term, Var};

    #[test]
    fn test_straight_line_is_one_block() {
        let x = Var::int("x");
        let mut b = CfaBuilder::new();
        let n = b.add_nodes(4);
        b.assign(n[0], n[1], &x, Term::int(0))
            .assign(n[1], n[2], &x, Term::var(&x).add(Term::int(1)))
            .assume(n[2], n[3], Term::var(&x).gt(Term::int(0)));
        let graph = decompose(&b.build().unwrap()).unwrap();
        assert_eq!(graph.len(), 1);
        let block = &graph.blocks()[0];
        assert_eq!((block.entry(), block.target()), (n[0], n[3]));
        assert_eq!(block.edges().len(), 3);
        assert_eq!(graph.roots(), &[block.id()]);
        assert_eq!(block.rank(n[3]), 3);
    }

    #[test]
    fn test_diamond_merges_into_one_block() {
        let x = Var::int("x");
        let mut b = CfaBuilder::new();
        let n = b.add_nodes(5);
        b.assume(n[0], n[1], Term::var(&x).gt(Term::int(0)))
            .assume(n[0], n[2], Term::var(&x).le(Term::int(0)))
            .assign(n[1], n[3], &x, Term::int(1))
            .assign(n[2], n[3], &x, Term::int(2))
            .skip(n[3], n[4]);
        let graph = decompose(&b.build().unwrap()).unwrap();
        // (n0 -> n3) diamond and (n3 -> n4) tail
        assert_eq!(graph.len(), 2);
        let diamond = graph.find(n[0], n[3]).unwrap();
        let tail = graph.find(n[3], n[4]).unwrap();
        assert_eq!(diamond.edges().len(), 4);
        assert_eq!(diamond.successors(), &[tail.id()]);
        assert_eq!(tail.predecessors(), &[diamond.id()]);
        assert!(graph.is_root(diamond.id()));
        assert!(!graph.is_root(tail.id()));
    }

    #[test]
    fn test_loop_body_gets_private_exit() {
        let i = Var::int("i");
        let mut b = CfaBuilder::new();
        let n = b.add_nodes(4);
        b.assign(n[0], n[1], &i, Term::int(0))
            .assume(n[1], n[2], Term::var(&i).lt(Term::int(3)))
            .assign(n[2], n[1], &i, Term::var(&i).add(Term::int(1)))
            .assume(n[1], n[3], Term::var(&i).ge(Term::int(3)));
        let cfa = b.build().unwrap();
        let graph = decompose(&cfa).unwrap();
        assert_eq!(graph.len(), 3);
        let body = graph.find(n[1], n[1]).unwrap();
        assert!(body.is_loop());
        assert_ne!(body.exit_location(), n[1]);
        assert!(body.exit_location().index() >= cfa.node_count());
        assert!(body.leaving(body.exit_location()).next().is_none());
        // the loop body is its own predecessor and successor
        assert!(body.predecessors().contains(&body.id()));
        assert!(body.successors().contains(&body.id()));
    }

    #[test]
    fn test_error_location_is_cut_point() {
        let x = Var::int("x");
        let mut b = CfaBuilder::new();
        let n = b.add_nodes(4);
        b.havoc(n[0], n[1], &x)
            .assume(n[1], n[2], Term::var(&x).gt(Term::int(5)))
            .skip(n[2], n[3])
            .mark_error(n[2]);
        let graph = decompose(&b.build().unwrap()).unwrap();
        assert!(graph.find(n[0], n[2]).is_some());
        assert!(graph.find(n[2], n[3]).is_some());
        assert!(graph.is_error_location(n[2]));
        assert!(!graph.is_error_location(n[3]));
    }
}
