//! Typed edges of the control flow graph.
//!
//! Every edge is a directed connection between two blocks, classified by how control
//! gets from one to the other. The classification carries payloads where the flat IR
//! carried marker entries: switch case keys ride on branch edges, catch types and
//! handler priorities ride on throw edges.

use std::fmt;

use crate::cfg::BlockId;
use crate::ir::{CaseKey, TypeRef};

/// A strongly-typed identifier for edges within a control flow graph.
///
/// `EdgeId` wraps an index into the graph's edge arena. Ids are assigned
/// sequentially when edges are created and are never reused after removal, so a
/// stale id held across a deletion is detectable.
///
/// # Thread Safety
///
/// `EdgeId` is [`Copy`], [`Send`], and [`Sync`].
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EdgeId(pub(crate) u32);

impl EdgeId {
    /// Creates an `EdgeId` from a raw index value.
    ///
    /// Primarily intended for internal use and testing; normal usage obtains ids
    /// from [`ControlFlowGraph::add_edge`](crate::ControlFlowGraph::add_edge).
    #[must_use]
    #[inline]
    pub const fn new(index: usize) -> Self {
        EdgeId(index as u32)
    }

    /// Returns the raw index value of this edge identifier.
    #[must_use]
    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Debug for EdgeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EdgeId({})", self.0)
    }
}

impl fmt::Display for EdgeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "e{}", self.0)
    }
}

/// The payload-free classification of an edge, for type-keyed queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EdgeType {
    /// Unconditional control flow.
    Goto,
    /// Taken side of a conditional, or one switch case.
    Branch,
    /// Transition to an exception handler.
    Throw,
    /// Synthetic edge to a synthesized exit block.
    Ghost,
}

/// The kind of control flow represented by an edge, with its payload.
///
/// # Examples
///
/// ```rust
/// use dexflow::{EdgeKind, EdgeType};
///
/// let kind = EdgeKind::Branch { case_key: Some(3) };
/// assert_eq!(kind.ty(), EdgeType::Branch);
/// assert_eq!(kind.case_key(), Some(3));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeKind {
    /// Unconditional control flow: a fall-through or an elided goto.
    ///
    /// In an editable graph no goto instruction exists anymore; the edge is the
    /// only record of the jump.
    Goto,

    /// The taken side of a conditional branch, or one case of a switch.
    ///
    /// `case_key` is present exactly when the branch originates in a multi-way
    /// switch.
    Branch {
        /// The switch case key that selects this edge, if any.
        case_key: Option<CaseKey>,
    },

    /// A potential transfer to an exception handler.
    ///
    /// Every block inside a try region that can throw carries one throw edge per
    /// handler of the region.
    Throw {
        /// The caught type; `None` is a catch-all handler.
        catch_type: Option<TypeRef>,
        /// Handler priority within the region; smaller index is tried first.
        index: u32,
    },

    /// A synthetic edge from an exit candidate to a synthesized ghost exit block.
    Ghost,
}

impl EdgeKind {
    /// Returns the payload-free classification of this kind.
    #[must_use]
    pub const fn ty(&self) -> EdgeType {
        match self {
            EdgeKind::Goto => EdgeType::Goto,
            EdgeKind::Branch { .. } => EdgeType::Branch,
            EdgeKind::Throw { .. } => EdgeType::Throw,
            EdgeKind::Ghost => EdgeType::Ghost,
        }
    }

    /// Returns the switch case key, for branch edges that carry one.
    #[must_use]
    pub const fn case_key(&self) -> Option<CaseKey> {
        match self {
            EdgeKind::Branch { case_key } => *case_key,
            _ => None,
        }
    }

    /// Returns the caught type of a throw edge (`None` for catch-all handlers
    /// and for non-throw edges alike; check [`ty`](Self::ty) to distinguish).
    #[must_use]
    pub const fn catch_type(&self) -> Option<TypeRef> {
        match self {
            EdgeKind::Throw { catch_type, .. } => *catch_type,
            _ => None,
        }
    }

    /// Returns the handler priority of a throw edge.
    #[must_use]
    pub const fn throw_index(&self) -> Option<u32> {
        match self {
            EdgeKind::Throw { index, .. } => Some(*index),
            _ => None,
        }
    }
}

impl fmt::Display for EdgeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EdgeKind::Goto => write!(f, "goto"),
            EdgeKind::Branch { case_key: None } => write!(f, "branch"),
            EdgeKind::Branch {
                case_key: Some(key),
            } => write!(f, "branch {key}"),
            EdgeKind::Throw { catch_type, index } => {
                write!(f, "throw {index}")?;
                if let Some(ty) = catch_type {
                    write!(f, " {ty}")?;
                }
                Ok(())
            }
            EdgeKind::Ghost => write!(f, "ghost"),
        }
    }
}

/// An edge in the control flow graph.
///
/// Edges are owned by the graph's edge arena; blocks hold [`EdgeId`] handles in
/// their predecessor and successor lists. For every live edge, the handle appears
/// exactly once in `src`'s successor list and exactly once in `target`'s
/// predecessor list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Edge {
    pub(crate) src: BlockId,
    pub(crate) target: BlockId,
    pub(crate) kind: EdgeKind,
}

impl Edge {
    pub(crate) const fn new(src: BlockId, target: BlockId, kind: EdgeKind) -> Self {
        Edge { src, target, kind }
    }

    /// Returns the source block of this edge.
    #[must_use]
    pub const fn src(&self) -> BlockId {
        self.src
    }

    /// Returns the target block of this edge.
    #[must_use]
    pub const fn target(&self) -> BlockId {
        self.target
    }

    /// Returns the kind of control flow this edge represents.
    #[must_use]
    pub const fn kind(&self) -> &EdgeKind {
        &self.kind
    }

    /// Returns the payload-free classification of this edge.
    #[must_use]
    pub const fn ty(&self) -> EdgeType {
        self.kind.ty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_edge_kind_classification() {
        assert_eq!(EdgeKind::Goto.ty(), EdgeType::Goto);
        assert_eq!(EdgeKind::Branch { case_key: None }.ty(), EdgeType::Branch);
        assert_eq!(
            EdgeKind::Branch { case_key: Some(7) }.ty(),
            EdgeType::Branch
        );
        assert_eq!(
            EdgeKind::Throw {
                catch_type: None,
                index: 0
            }
            .ty(),
            EdgeType::Throw
        );
        assert_eq!(EdgeKind::Ghost.ty(), EdgeType::Ghost);
    }

    #[test]
    fn test_edge_kind_payloads() {
        assert_eq!(EdgeKind::Branch { case_key: Some(7) }.case_key(), Some(7));
        assert_eq!(EdgeKind::Branch { case_key: None }.case_key(), None);
        assert_eq!(EdgeKind::Goto.case_key(), None);

        let throw = EdgeKind::Throw {
            catch_type: Some(TypeRef(0x20)),
            index: 1,
        };
        assert_eq!(throw.catch_type(), Some(TypeRef(0x20)));
        assert_eq!(throw.throw_index(), Some(1));
        assert_eq!(EdgeKind::Goto.throw_index(), None);
    }

    #[test]
    fn test_edge_accessors() {
        let edge = Edge::new(BlockId::new(0), BlockId::new(3), EdgeKind::Goto);
        assert_eq!(edge.src(), BlockId::new(0));
        assert_eq!(edge.target(), BlockId::new(3));
        assert_eq!(edge.ty(), EdgeType::Goto);
    }
}
