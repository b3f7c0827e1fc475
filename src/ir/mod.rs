//! The linear instruction IR consumed by the control flow layer.
//!
//! A method body arrives as a flat [`IrList`] of tagged [`Item`]s: opcodes plus
//! positional markers for branch targets, try regions, catch handlers, and source
//! positions. The control flow layer turns the marker information into typed edges
//! and, for editable graphs, re-derives the markers at linearization time.
//!
//! # Key Types
//!
//! - [`IrList`] - The arena-backed linear container with stable [`ItemId`] handles
//! - [`Item`] - One tagged entry of the stream
//! - [`Instruction`] / [`Opcode`] - The instruction model, reduced to the
//!   classification predicates control flow recovery needs

mod instruction;
mod item;
mod list;

pub use instruction::{CaseKey, Instruction, Opcode, Register, TypeRef};
pub use item::{BranchTarget, CatchMarker, Item, SourcePosition, TryKind, TryMarker};
pub use list::{IrList, ItemId, ItemIter};

pub(crate) use list::{ItemArena, ItemList};
