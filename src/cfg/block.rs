//! Basic blocks of the control flow graph.

use std::fmt;

use crate::cfg::EdgeId;
use crate::ir::{ItemId, ItemList};

/// A strongly-typed identifier for basic blocks within a control flow graph.
///
/// Ids are assigned densely in creation order and are never reused, even after a
/// block is removed.
///
/// # Thread Safety
///
/// `BlockId` is [`Copy`], [`Send`], and [`Sync`].
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BlockId(pub(crate) u32);

impl BlockId {
    /// Creates a `BlockId` from a raw index value.
    ///
    /// Primarily intended for internal use and testing; normal usage obtains ids
    /// from the graph.
    #[must_use]
    #[inline]
    pub const fn new(index: usize) -> Self {
        BlockId(index as u32)
    }

    /// Returns the raw index value of this block identifier.
    #[must_use]
    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Debug for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BlockId({})", self.0)
    }
}

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "B{}", self.0)
    }
}

/// The terminal behavior of a block, derived from its last opcode and its
/// outgoing edge types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Branchingness {
    /// The block neither branches nor ends the method.
    None,
    /// Control continues unconditionally through a goto edge.
    Goto,
    /// A two-way conditional branch.
    If,
    /// A multi-way switch.
    Switch,
    /// The method returns here.
    Return,
    /// Control leaves exceptionally.
    Throw,
}

/// Where a block's entries live.
///
/// An editable graph owns its entries as per-block segments within the graph's
/// item arena; a read-only view addresses a half-open range of the externally
/// owned list it was built from. All instruction-level queries branch on this.
#[derive(Debug, Clone)]
pub(crate) enum BlockBody {
    /// Editable: the block owns a segment of the graph's arena.
    Owned(ItemList),
    /// View: a half-open range `[begin, end)` into the borrowed IR.
    Range {
        begin: Option<ItemId>,
        end: Option<ItemId>,
    },
}

/// A basic block: a maximal straight-line run of IR entries with an edge list at
/// each end.
///
/// Blocks expose their identity and adjacency here; everything that needs to look
/// inside the entries (first/last instruction, branchingness, ...) lives on
/// [`ControlFlowGraph`](crate::ControlFlowGraph), which owns the item storage.
#[derive(Debug, Clone)]
pub struct Block {
    pub(crate) id: BlockId,
    pub(crate) preds: Vec<EdgeId>,
    pub(crate) succs: Vec<EdgeId>,
    pub(crate) body: BlockBody,
}

impl Block {
    pub(crate) fn new(id: BlockId, body: BlockBody) -> Self {
        Block {
            id,
            preds: Vec::new(),
            succs: Vec::new(),
            body,
        }
    }

    /// Returns this block's identifier.
    #[must_use]
    pub const fn id(&self) -> BlockId {
        self.id
    }

    /// Returns the incoming edges, in insertion order.
    #[must_use]
    pub fn preds(&self) -> &[EdgeId] {
        &self.preds
    }

    /// Returns the outgoing edges, in insertion order.
    #[must_use]
    pub fn succs(&self) -> &[EdgeId] {
        &self.succs
    }

    pub(crate) fn owned_mut(&mut self) -> &mut ItemList {
        match &mut self.body {
            BlockBody::Owned(list) => list,
            BlockBody::Range { .. } => panic!("block {} is not editable", self.id),
        }
    }
}
