//! Tagged entries of the linear IR.
//!
//! A method body is a flat sequence of [`Item`]s: real instructions interleaved with
//! positional markers — branch targets, try-region delimiters, catch handlers, and
//! source positions. The control flow builder consumes the markers and (in editable
//! mode) deletes them; the linearizer re-creates them from edge information.

use std::fmt;

use crate::ir::{CaseKey, Instruction, ItemId, TypeRef};

/// Which end of a try region a [`TryMarker`] delimits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TryKind {
    /// The first entry of the protected region.
    Start,
    /// Placed directly after the last entry of the protected region.
    End,
}

/// A try-region delimiter.
///
/// Both the start and the end marker point at the head of the catch chain that
/// handles the region, which is how matching start/end pairs are recognized.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TryMarker {
    /// Start or end of the region.
    pub kind: TryKind,
    /// The first [`Item::Catch`] of the handler chain for this region.
    pub catch_start: ItemId,
}

/// A catch handler marker, placed at the head of its handler block.
///
/// Handlers for one try region form a singly linked chain through `next`, in
/// decreasing priority order (the first catch in the chain is tried first).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CatchMarker {
    /// The caught type; `None` is a catch-all.
    pub catch_type: Option<TypeRef>,
    /// The next, lower-priority handler of the same region.
    pub next: Option<ItemId>,
}

/// A branch target marker, placed at the head of the block a branch jumps to.
///
/// `src` points back at the [`Item::Opcode`] entry of the originating branch.
/// A `case_key` of `Some(_)` makes this a multi-target (one case of a switch);
/// `None` is the single target of a goto or conditional branch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BranchTarget {
    /// The branch instruction entry this target belongs to.
    pub src: ItemId,
    /// The switch case key, for multi-targets.
    pub case_key: Option<CaseKey>,
}

/// A source position marker.
///
/// Positions can nest (inlined code keeps the caller's position as `parent`);
/// the control flow layer only ever touches the `parent` pointer, to null it
/// out when the referenced position is deleted along with an unreachable block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourcePosition {
    /// Source line number.
    pub line: u32,
    /// Enclosing position, if this one was produced by inlining.
    pub parent: Option<ItemId>,
}

/// One entry of the linear IR.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Item {
    /// A real instruction.
    Opcode(Instruction),
    /// A branch target marker.
    Target(BranchTarget),
    /// A try-region delimiter.
    Try(TryMarker),
    /// A catch handler marker.
    Catch(CatchMarker),
    /// A source position marker.
    Position(SourcePosition),
}

impl Item {
    /// Returns the instruction if this entry is an opcode.
    #[must_use]
    pub fn insn(&self) -> Option<&Instruction> {
        match self {
            Item::Opcode(insn) => Some(insn),
            _ => None,
        }
    }

    /// Returns a mutable reference to the instruction if this entry is an opcode.
    #[must_use]
    pub fn insn_mut(&mut self) -> Option<&mut Instruction> {
        match self {
            Item::Opcode(insn) => Some(insn),
            _ => None,
        }
    }

    /// Returns `true` if this entry is a real instruction.
    #[must_use]
    pub const fn is_opcode(&self) -> bool {
        matches!(self, Item::Opcode(_))
    }

    /// Returns `true` if this entry is a branch target marker.
    #[must_use]
    pub const fn is_target(&self) -> bool {
        matches!(self, Item::Target(_))
    }

    /// Returns `true` if this entry is a catch handler marker.
    #[must_use]
    pub const fn is_catch(&self) -> bool {
        matches!(self, Item::Catch(_))
    }

    /// Returns `true` if this entry is a try-region delimiter of the given kind.
    #[must_use]
    pub fn is_try(&self, kind: TryKind) -> bool {
        matches!(self, Item::Try(marker) if marker.kind == kind)
    }
}

impl fmt::Display for Item {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Item::Opcode(insn) => write!(f, "{insn}"),
            Item::Target(target) => match target.case_key {
                Some(key) => write!(f, "TARGET multi {key} (src {})", target.src),
                None => write!(f, "TARGET (src {})", target.src),
            },
            Item::Try(marker) => match marker.kind {
                TryKind::Start => write!(f, "TRY_START (catch {})", marker.catch_start),
                TryKind::End => write!(f, "TRY_END (catch {})", marker.catch_start),
            },
            Item::Catch(marker) => {
                write!(f, "CATCH")?;
                if let Some(ty) = marker.catch_type {
                    write!(f, " {ty}")?;
                }
                if let Some(next) = marker.next {
                    write!(f, " next {next}")?;
                }
                Ok(())
            }
            Item::Position(pos) => write!(f, "POSITION line {}", pos.line),
        }
    }
}
