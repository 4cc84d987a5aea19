//! Blocks: CFA regions analyzed as one unit, and the graph connecting them.

use crate::cfa::{CfaEdge, EdgeId, EdgeOp, NodeId};
use crate::{CfaError, CfaResult};
use smallvec::SmallVec;
use std::collections::{BTreeSet, HashMap};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlockId(u32);

impl BlockId {
    #[inline]
    pub fn new(id: u32) -> Self {
        BlockId(id)
    }

    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "B{}", self.0)
    }
}

/// A single-entry, single-target CFA region.
///
/// When the entry is also the target (a loop body), edges entering the
/// target are redirected to a block-local exit location so the search can
/// tell arrivals apart from the seed.
#[derive(Debug, Clone)]
pub struct Block {
    pub(crate) id: BlockId,
    pub(crate) entry: NodeId,
    pub(crate) target: NodeId,
    pub(crate) exit: NodeId,
    pub(crate) nodes: BTreeSet<NodeId>,
    pub(crate) edges: Vec<CfaEdge>,
    pub(crate) leaving: HashMap<NodeId, SmallVec<[usize; 2]>>,
    pub(crate) ranks: HashMap<NodeId, usize>,
    pub(crate) predecessors: Vec<BlockId>,
    pub(crate) successors: Vec<BlockId>,
}

impl Block {
    #[inline]
    pub fn id(&self) -> BlockId {
        self.id
    }

    #[inline]
    pub fn entry(&self) -> NodeId {
        self.entry
    }

    #[inline]
    pub fn target(&self) -> NodeId {
        self.target
    }

    /// Location at which the block's search terminates.
    #[inline]
    pub fn exit_location(&self) -> NodeId {
        self.exit
    }

    #[inline]
    pub fn is_loop(&self) -> bool {
        self.entry == self.target
    }

    /// CFA locations covered by the block (entry and target included).
    pub fn nodes(&self) -> &BTreeSet<NodeId> {
        &self.nodes
    }

    pub fn edges(&self) -> &[CfaEdge] {
        &self.edges
    }

    pub fn leaving(&self, node: NodeId) -> impl Iterator<Item = &CfaEdge> {
        self.leaving
            .get(&node)
            .into_iter()
            .flatten()
            .map(|&i| &self.edges[i])
    }

    /// Topological rank of a location inside the block, 0 at the entry.
    pub fn rank(&self, node: NodeId) -> usize {
        self.ranks.get(&node).copied().unwrap_or(usize::MAX)
    }

    pub fn predecessors(&self) -> &[BlockId] {
        &self.predecessors
    }

    pub fn successors(&self) -> &[BlockId] {
        &self.successors
    }

    /// Copy of the block with the operation of `edge` replaced.
    pub fn with_op(&self, edge: EdgeId, op: EdgeOp) -> Block {
        let mut block = self.clone();
        if let Some(e) = block.edges.iter_mut().find(|e| e.id == edge) {
            e.op = op;
        }
        block
    }
}

impl fmt::Display for Block {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{} -> {}]", self.id, self.entry, self.target)
    }
}

/// Immutable adjacency structure over all blocks of one CFA.
#[derive(Debug, Clone)]
pub struct BlockGraph {
    pub(crate) blocks: Vec<Block>,
    pub(crate) roots: Vec<BlockId>,
    pub(crate) program_entry: NodeId,
    pub(crate) errors: BTreeSet<NodeId>,
}

impl BlockGraph {
    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn get(&self, id: BlockId) -> Option<&Block> {
        self.blocks.get(id.index())
    }

    pub fn block(&self, id: BlockId) -> CfaResult<&Block> {
        self.get(id).ok_or(CfaError::UnknownBlock(id))
    }

    pub fn predecessors(&self, id: BlockId) -> CfaResult<&[BlockId]> {
        self.block(id).map(Block::predecessors)
    }

    pub fn successors(&self, id: BlockId) -> CfaResult<&[BlockId]> {
        self.block(id).map(Block::successors)
    }

    pub fn entry_location(&self, id: BlockId) -> CfaResult<NodeId> {
        self.block(id).map(Block::entry)
    }

    /// Blocks starting at the program entry.
    pub fn roots(&self) -> &[BlockId] {
        &self.roots
    }

    pub fn is_root(&self, id: BlockId) -> bool {
        self.get(id)
            .is_some_and(|b| b.entry == self.program_entry)
    }

    /// Whether `node` is an error location of the decomposed CFA.
    pub fn is_error_location(&self, node: NodeId) -> bool {
        self.errors.contains(&node)
    }

    /// Block spanning `entry` to `target`, if any.
    pub fn find(&self, entry: NodeId, target: NodeId) -> Option<&Block> {
        self.blocks
            .iter()
            .find(|b| b.entry == entry && b.target == target)
    }
}
