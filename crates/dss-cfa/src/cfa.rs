//! Control-flow automaton: locations connected by operation-labelled edges.

use crate::{CfaError, CfaResult};
use dss_smt::{Sort, Term, Var};
use smallvec::SmallVec;
use std::collections::BTreeSet;
use std::fmt;

/// A CFA location.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u32);

impl NodeId {
    #[inline]
    pub fn new(id: u32) -> Self {
        NodeId(id)
    }

    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "N{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EdgeId(u32);

impl EdgeId {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for EdgeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "e{}", self.0)
    }
}

/// Operation attached to an edge. Terms reference variables at index 0.
#[derive(Debug, Clone, PartialEq)]
pub enum EdgeOp {
    Skip,
    Assume(Term),
    Assign { var: Var, value: Term },
    /// Nondeterministic assignment (program input).
    Havoc(Var),
}

impl fmt::Display for EdgeOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EdgeOp::Skip => write!(f, "skip"),
            EdgeOp::Assume(t) => write!(f, "[{t}]"),
            EdgeOp::Assign { var, value } => write!(f, "{var} := {value}"),
            EdgeOp::Havoc(var) => write!(f, "{var} := nondet"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CfaEdge {
    pub id: EdgeId,
    pub from: NodeId,
    pub to: NodeId,
    pub op: EdgeOp,
}

impl fmt::Display for CfaEdge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}: {}", self.from, self.to, self.op)
    }
}

/// An immutable control-flow automaton.
#[derive(Debug, Clone)]
pub struct Cfa {
    entry: NodeId,
    node_count: u32,
    edges: Vec<CfaEdge>,
    leaving: Vec<SmallVec<[EdgeId; 2]>>,
    entering: Vec<SmallVec<[EdgeId; 2]>>,
    errors: BTreeSet<NodeId>,
}

impl Cfa {
    #[inline]
    pub fn entry(&self) -> NodeId {
        self.entry
    }

    #[inline]
    pub fn node_count(&self) -> usize {
        self.node_count as usize
    }

    pub fn nodes(&self) -> impl Iterator<Item = NodeId> {
        (0..self.node_count).map(NodeId)
    }

    pub fn edges(&self) -> &[CfaEdge] {
        &self.edges
    }

    pub fn edge(&self, id: EdgeId) -> Option<&CfaEdge> {
        self.edges.get(id.index())
    }

    pub fn leaving(&self, node: NodeId) -> impl Iterator<Item = &CfaEdge> {
        self.leaving
            .get(node.index())
            .into_iter()
            .flatten()
            .map(|id| &self.edges[id.index()])
    }

    pub fn in_degree(&self, node: NodeId) -> usize {
        self.entering.get(node.index()).map_or(0, |e| e.len())
    }

    pub fn out_degree(&self, node: NodeId) -> usize {
        self.leaving.get(node.index()).map_or(0, |e| e.len())
    }

    #[inline]
    pub fn is_error(&self, node: NodeId) -> bool {
        self.errors.contains(&node)
    }

    pub fn error_locations(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.errors.iter().copied()
    }
}

/// Incremental CFA construction.
#[derive(Debug, Default)]
pub struct CfaBuilder {
    node_count: u32,
    entry: Option<NodeId>,
    edges: Vec<(NodeId, NodeId, EdgeOp)>,
    errors: BTreeSet<NodeId>,
}

impl CfaBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_node(&mut self) -> NodeId {
        let id = NodeId(self.node_count);
        self.node_count += 1;
        id
    }

    /// Add `n` nodes, the first of which becomes the entry if none is set.
    pub fn add_nodes(&mut self, n: usize) -> Vec<NodeId> {
        let nodes: Vec<NodeId> = (0..n).map(|_| self.add_node()).collect();
        if self.entry.is_none() {
            self.entry = nodes.first().copied();
        }
        nodes
    }

    pub fn set_entry(&mut self, node: NodeId) -> &mut Self {
        self.entry = Some(node);
        self
    }

    pub fn mark_error(&mut self, node: NodeId) -> &mut Self {
        self.errors.insert(node);
        self
    }

    pub fn edge(&mut self, from: NodeId, to: NodeId, op: EdgeOp) -> &mut Self {
        self.edges.push((from, to, op));
        self
    }

    pub fn skip(&mut self, from: NodeId, to: NodeId) -> &mut Self {
        self.edge(from, to, EdgeOp::Skip)
    }

    pub fn assume(&mut self, from: NodeId, to: NodeId, cond: Term) -> &mut Self {
        self.edge(from, to, EdgeOp::Assume(cond))
    }

    pub fn assign(&mut self, from: NodeId, to: NodeId, var: &Var, value: Term) -> &mut Self {
        self.edge(
            from,
            to,
            EdgeOp::Assign {
                var: var.clone(),
                value,
            },
        )
    }

    pub fn havoc(&mut self, from: NodeId, to: NodeId, var: &Var) -> &mut Self {
        self.edge(from, to, EdgeOp::Havoc(var.clone()))
    }

    /// Validate and freeze the automaton.
    pub fn build(self) -> CfaResult<Cfa> {
        let entry = self.entry.ok_or(CfaError::MissingEntry)?;
        let n = self.node_count as usize;
        let known = |node: NodeId| {
            if node.index() < n {
                Ok(node)
            } else {
                Err(CfaError::UnknownNode(node))
            }
        };
        known(entry)?;
        for &node in &self.errors {
            known(node)?;
        }
        // the entry would be reachable without executing any block
        if self.errors.contains(&entry) {
            return Err(CfaError::ErrorAtEntry(entry));
        }

        let mut leaving = vec![SmallVec::new(); n];
        let mut entering = vec![SmallVec::new(); n];
        let mut edges = Vec::with_capacity(self.edges.len());
        for (i, (from, to, op)) in self.edges.into_iter().enumerate() {
            let id = EdgeId(i as u32);
            known(from)?;
            known(to)?;
            check_op(id, &op)?;
            leaving[from.index()].push(id);
            entering[to.index()].push(id);
            edges.push(CfaEdge { id, from, to, op });
        }

        Ok(Cfa {
            entry,
            node_count: self.node_count,
            edges,
            leaving,
            entering,
            errors: self.errors,
        })
    }
}

fn check_op(id: EdgeId, op: &EdgeOp) -> CfaResult<()> {
    match op {
        EdgeOp::Assume(t) if t.sort() != Sort::Bool => Err(CfaError::IllTyped {
            edge: id,
            reason: format!("assumption '{t}' is not boolean"),
        }),
        EdgeOp::Assign { var, value } if value.sort() != var.sort() => Err(CfaError::IllTyped {
            edge: id,
            reason: format!("'{var}' is {:?} but '{value}' is {:?}", var.sort(), value.sort()),
        }),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_and_degrees() {
        let x = Var::int("x");
        let mut b = CfaBuilder::new();
        let n = b.add_nodes(3);
        b.assign(n[0], n[1], &x, Term::int(1))
            .assume(n[1], n[2], Term::var(&x).gt(Term::int(0)))
            .mark_error(n[2]);
        let cfa = b.build().unwrap();
        assert_eq!(cfa.entry(), n[0]);
        assert_eq!(cfa.out_degree(n[0]), 1);
        assert_eq!(cfa.in_degree(n[2]), 1);
        assert!(cfa.is_error(n[2]));
        assert_eq!(cfa.leaving(n[1]).next().unwrap().to, n[2]);
        assert_eq!(cfa.edges()[0].to_string(), "N0 -> N1: x := 1");
    }

    #[test]
    fn test_missing_entry() {
        assert!(matches!(CfaBuilder::new().build(), Err(CfaError::MissingEntry)));
    }

    #[test]
    fn test_unknown_node_rejected() {
        let mut b = CfaBuilder::new();
        let n = b.add_nodes(1);
        b.skip(n[0], NodeId::new(7));
        assert!(matches!(b.build(), Err(CfaError::UnknownNode(_))));
    }

    #[test]
    fn test_error_entry_rejected() {
        let mut b = CfaBuilder::new();
        let n = b.add_nodes(1);
        b.mark_error(n[0]);
        assert!(matches!(b.build(), Err(CfaError::ErrorAtEntry(e)) if e == n[0]));

        let mut b = CfaBuilder::new();
        let n = b.add_nodes(2);
        b.skip(n[0], n[1]).mark_error(n[0]);
        assert!(matches!(b.build(), Err(CfaError::ErrorAtEntry(_))));

        // moving the entry off the error location is fine
        let mut b = CfaBuilder::new();
        let n = b.add_nodes(2);
        b.skip(n[1], n[0]).mark_error(n[0]).set_entry(n[1]);
        assert!(b.build().is_ok());
    }

    #[test]
    fn test_ill_typed_assignment_rejected() {
        let mut b = CfaBuilder::new();
        let n = b.add_nodes(2);
        b.assign(n[0], n[1], &Var::bool("flag"), Term::int(3));
        assert!(matches!(b.build(), Err(CfaError::IllTyped { .. })));
    }
}
