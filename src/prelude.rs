//! # dexflow Prelude
//!
//! This module provides a convenient prelude for the most commonly used types
//! from the library. Import it to get quick access to the essentials of control
//! flow graph construction and transformation.

// ================================================================================================
// Core Types and Error Handling
// ================================================================================================

/// The main error type for all dexflow operations
pub use crate::Error;

/// The result type used throughout dexflow
pub use crate::Result;

// ================================================================================================
// Main Entry Point
// ================================================================================================

/// The control flow graph, in read-only view or editable form
pub use crate::cfg::ControlFlowGraph;

// ================================================================================================
// Graph Structure
// ================================================================================================

/// Basic blocks and their identifiers
pub use crate::cfg::{Block, BlockId};

/// Typed edges and their classification
pub use crate::cfg::{Edge, EdgeId, EdgeKind, EdgeType};

/// The derived terminal behavior of a block
pub use crate::cfg::Branchingness;

/// Immediate-dominator query results
pub use crate::cfg::{DominatorInfo, Dominators};

// ================================================================================================
// Linear IR
// ================================================================================================

/// The linear instruction list and its stable handles
pub use crate::ir::{IrList, ItemId};

/// Stream entries: opcodes and positional markers
pub use crate::ir::{BranchTarget, CatchMarker, Item, SourcePosition, TryKind, TryMarker};

/// The instruction model
pub use crate::ir::{CaseKey, Instruction, Opcode, Register, TypeRef};
