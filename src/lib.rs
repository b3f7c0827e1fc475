// Copyright 2025-2026 Johann Kempter
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//
// SPDX-License-Identifier: Apache-2.0

#![doc(html_no_source)]
#![deny(missing_docs)]

//! # dexflow
//!
//! The control flow layer of a register-based bytecode optimizer. `dexflow`
//! consumes a linear instruction stream — opcodes interleaved with branch
//! targets, try/catch region markers, and source positions — and recovers a
//! graph of basic blocks connected by typed edges, the substrate on which
//! analyses and transformations operate.
//!
//! # Architecture
//!
//! - **IR Layer** ([`crate::ir`]): the linear instruction list — an arena-backed
//!   doubly linked container with stable handles — and the reduced instruction
//!   model the control flow layer consumes.
//! - **Graph Layer** ([`crate::cfg`]): block-boundary recovery, typed edges
//!   (goto / branch / throw / ghost), mutation with cascading fix-ups,
//!   simplification, SCC-based exit analysis, immediate dominators, and
//!   linearization back into a fresh stream.
//!
//! # Operating Modes
//!
//! The same graph structure supports two modes with identical query semantics:
//!
//! - a **read-only view** that points into an externally owned stream, for
//!   analyses that must not copy the method body;
//! - an **editable form** that owns every entry, carries jumps and exception
//!   regions purely as edges, and re-derives targets, fall-through gotos, and
//!   try/catch markers when linearized.
//!
//! # Usage Examples
//!
//! ```rust
//! use dexflow::prelude::*;
//!
//! // const v0, 1; const v1, 2; add v2, v0, v1; return v2
//! let mut ir = IrList::new();
//! ir.push_back(Item::Opcode(
//!     Instruction::new(Opcode::Const).with_dest(Register::new(0)).with_literal(1),
//! ));
//! ir.push_back(Item::Opcode(
//!     Instruction::new(Opcode::Const).with_dest(Register::new(1)).with_literal(2),
//! ));
//! ir.push_back(Item::Opcode(
//!     Instruction::new(Opcode::Add)
//!         .with_dest(Register::new(2))
//!         .with_src(Register::new(0))
//!         .with_src(Register::new(1)),
//! ));
//! ir.push_back(Item::Opcode(
//!     Instruction::new(Opcode::Return).with_src(Register::new(2)),
//! ));
//!
//! let mut cfg = ControlFlowGraph::from_ir(ir, 3)?;
//! assert_eq!(cfg.num_blocks(), 1);
//! assert_eq!(cfg.registers_size(), 3);
//!
//! cfg.calculate_exit_block();
//! assert_eq!(cfg.exit_block(), Some(cfg.entry_block()));
//!
//! // ... transform the graph, then turn it back into a stream:
//! let out = cfg.linearize();
//! assert_eq!(out.len(), 4);
//! # Ok::<(), dexflow::Error>(())
//! ```
//!
//! # Error Handling
//!
//! Construction returns [`Result`]: an empty stream is [`Error::Empty`], a
//! structurally broken one is [`Error::Malformed`]. Once a graph exists, its
//! invariants are absolute — a violated invariant or an unmet mutation
//! precondition panics with the offending block id and a dump of the graph.
//! There is no partial-success path.
//!
//! # Thread Safety
//!
//! The graph is a single-threaded data structure. No operation suspends or
//! blocks; handles ([`BlockId`], [`EdgeId`], [`ir::ItemId`]) are plain indices
//! that stay valid until their referent is deleted and are never reused.

#[macro_use]
pub(crate) mod error;

pub mod cfg;
pub mod ir;


pub mod prelude;

pub use cfg::{
    Block, BlockId, Branchingness, ControlFlowGraph, DominatorInfo, Dominators, Edge, EdgeId,
    EdgeKind, EdgeType,
};
pub use error::Error;
pub use ir::{Instruction, IrList, Item, Opcode, Register};

/// The result type used throughout this crate.
pub type Result<T> = std::result::Result<T, Error>;
