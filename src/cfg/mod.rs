//! Control flow graph construction and analysis.
//!
//! This module provides the graph representation of a method body: basic blocks
//! connected by typed edges, recovered from the linear IR and — for editable
//! graphs — convertible back into one.
//!
//! # Key Components
//!
//! - [`ControlFlowGraph`] - The graph itself, in read-only view or editable form
//! - [`Block`] / [`BlockId`] - Basic blocks and their identifiers
//! - [`Edge`] / [`EdgeKind`] / [`EdgeType`] - Typed, payload-carrying edges
//! - [`Branchingness`] - The derived terminal behavior of a block
//! - [`Dominators`] - Immediate-dominator query results
//!
//! # Edge Types
//!
//! The graph distinguishes four kinds of control flow:
//!
//! - **Goto**: unconditional flow, including fall-throughs and elided jumps
//! - **Branch**: the taken side of a conditional, or one switch case (with key)
//! - **Throw**: a transition to an exception handler (with catch type and
//!   handler priority)
//! - **Ghost**: a synthetic edge to a synthesized exit block
//!
//! # Operating Modes
//!
//! A **view** ([`ControlFlowGraph::view`]) borrows the instruction list and
//! answers structural queries without touching it. The **editable** form
//! ([`ControlFlowGraph::from_ir`]) owns every entry; jump opcodes and positional
//! markers are converted into edges at construction and re-derived at
//! [`linearize`](ControlFlowGraph::linearize) time, so transformations in
//! between never have to keep markers consistent manually.

mod block;
mod build;
mod dominators;
mod edge;
mod exits;
mod graph;
mod linearize;
mod mutate;
mod simplify;

pub use block::{Block, BlockId, Branchingness};
pub use dominators::{DominatorInfo, Dominators};
pub use edge::{Edge, EdgeId, EdgeKind, EdgeType};
pub use graph::ControlFlowGraph;

pub(crate) use block::BlockBody;
pub(crate) use graph::IrSource;
