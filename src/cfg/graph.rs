//! The control flow graph structure and its query surface.
//!
//! [`ControlFlowGraph`] owns blocks keyed by id and edges in an arena, plus — for
//! editable graphs — every IR entry of the method body. Mutation lives in the
//! sibling modules; this module provides storage, accessors, instruction-level
//! queries, the structural [`sanity_check`](ControlFlowGraph::sanity_check), and
//! the diagnostic dumps.

use std::collections::BTreeMap;
use std::fmt::{self, Write as _};

use rustc_hash::FxHashSet;

use crate::cfg::{Block, BlockBody, BlockId, Branchingness, Edge, EdgeId, EdgeKind, EdgeType};
use crate::ir::{IrList, Item, ItemArena, ItemId, ItemIter};

/// Where the IR entries of a graph live.
pub(crate) enum IrSource<'a> {
    /// Read-only view: the list stays externally owned.
    Borrowed(&'a IrList),
    /// Editable: the graph took the arena; blocks own segments of it.
    Owned(ItemArena),
}

/// A control flow graph over a register-based linear IR.
///
/// The graph comes in two operating modes with identical query semantics:
///
/// - a **read-only view** ([`view`](Self::view)) whose blocks address half-open
///   ranges of the externally owned [`IrList`];
/// - an **editable form** ([`from_ir`](Self::from_ir)) that takes ownership of
///   every entry, carries jump information purely in its edges (no goto opcodes,
///   no target or try/catch markers survive construction), supports mutation, and
///   can be [`linearize`](Self::linearize)d back into a fresh list.
///
/// # Lifetime Parameter
///
/// `'a` is the borrow of the external list for views. Editable graphs own their
/// entries and are `ControlFlowGraph<'static>`.
///
/// # Examples
///
/// ```rust
/// use dexflow::{ControlFlowGraph, Instruction, IrList, Item, Opcode, Register};
///
/// let mut ir = IrList::new();
/// ir.push_back(Item::Opcode(
///     Instruction::new(Opcode::Const).with_dest(Register::new(0)).with_literal(1),
/// ));
/// ir.push_back(Item::Opcode(
///     Instruction::new(Opcode::Return).with_src(Register::new(0)),
/// ));
///
/// let cfg = ControlFlowGraph::from_ir(ir, 1)?;
/// assert_eq!(cfg.num_blocks(), 1);
/// assert_eq!(cfg.entry_block(), cfg.blocks().next().unwrap().id());
/// # Ok::<(), dexflow::Error>(())
/// ```
pub struct ControlFlowGraph<'a> {
    pub(crate) ir: IrSource<'a>,
    pub(crate) blocks: BTreeMap<BlockId, Block>,
    pub(crate) edges: Vec<Option<Edge>>,
    pub(crate) entry: BlockId,
    pub(crate) exit: Option<BlockId>,
    pub(crate) registers_size: u16,
    pub(crate) editable: bool,
    next_block: u32,
}

impl<'a> ControlFlowGraph<'a> {
    pub(crate) fn with_source(ir: IrSource<'a>, registers_size: u16, editable: bool) -> Self {
        ControlFlowGraph {
            ir,
            blocks: BTreeMap::new(),
            edges: Vec::new(),
            entry: BlockId::new(0),
            exit: None,
            registers_size,
            editable,
            next_block: 0,
        }
    }

    /// Returns `true` if this graph owns its entries and supports mutation.
    #[must_use]
    pub const fn editable(&self) -> bool {
        self.editable
    }

    /// Returns the register width: highest used register index plus one, wide
    /// registers counting as two.
    #[must_use]
    pub const fn registers_size(&self) -> u16 {
        self.registers_size
    }

    /// Overrides the stored register width.
    pub fn set_registers_size(&mut self, registers_size: u16) {
        self.registers_size = registers_size;
    }

    /// Returns the entry block.
    #[must_use]
    pub const fn entry_block(&self) -> BlockId {
        self.entry
    }

    /// Returns the exit block computed by
    /// [`calculate_exit_block`](Self::calculate_exit_block), if any.
    #[must_use]
    pub const fn exit_block(&self) -> Option<BlockId> {
        self.exit
    }

    /// Returns the number of blocks.
    #[must_use]
    pub fn num_blocks(&self) -> usize {
        self.blocks.len()
    }

    /// Returns the number of live edges.
    #[must_use]
    pub fn num_edges(&self) -> usize {
        self.edges.iter().filter(|slot| slot.is_some()).count()
    }

    /// Iterates over all blocks in id order.
    pub fn blocks(&self) -> impl Iterator<Item = &Block> {
        self.blocks.values()
    }

    /// Collects all block ids in id order.
    #[must_use]
    pub fn block_ids(&self) -> Vec<BlockId> {
        self.blocks.keys().copied().collect()
    }

    /// Returns the block with the given id, or `None` if it was removed.
    #[must_use]
    pub fn block(&self, id: BlockId) -> Option<&Block> {
        self.blocks.get(&id)
    }

    /// Returns the edge behind a handle, or `None` if it was removed.
    #[must_use]
    pub fn edge(&self, id: EdgeId) -> Option<&Edge> {
        self.edges.get(id.index()).and_then(|slot| slot.as_ref())
    }

    pub(crate) fn block_ref(&self, id: BlockId) -> &Block {
        match self.blocks.get(&id) {
            Some(block) => block,
            None => panic!("block {id} is not in the graph\n{self}"),
        }
    }

    pub(crate) fn block_mut(&mut self, id: BlockId) -> &mut Block {
        match self.blocks.get_mut(&id) {
            Some(block) => block,
            None => panic!("block {id} is not in the graph"),
        }
    }

    pub(crate) fn edge_ref(&self, id: EdgeId) -> &Edge {
        match self.edges.get(id.index()).and_then(|slot| slot.as_ref()) {
            Some(edge) => edge,
            None => panic!("edge {id} is not in the graph\n{self}"),
        }
    }

    pub(crate) fn edge_mut(&mut self, id: EdgeId) -> &mut Edge {
        match self.edges.get_mut(id.index()).and_then(|slot| slot.as_mut()) {
            Some(edge) => edge,
            None => panic!("edge {id} is not in the graph"),
        }
    }

    pub(crate) fn arena(&self) -> &ItemArena {
        match &self.ir {
            IrSource::Borrowed(ir) => ir.arena(),
            IrSource::Owned(arena) => arena,
        }
    }

    pub(crate) fn arena_mut(&mut self) -> &mut ItemArena {
        match &mut self.ir {
            IrSource::Owned(arena) => arena,
            IrSource::Borrowed(_) => panic!("cannot mutate the entries of a read-only view"),
        }
    }

    pub(crate) fn take_arena(self) -> ItemArena {
        match self.ir {
            IrSource::Owned(arena) => arena,
            IrSource::Borrowed(_) => panic!("cannot take the entries of a read-only view"),
        }
    }

    pub(crate) fn new_block(&mut self, body: BlockBody) -> BlockId {
        let id = BlockId(self.next_block);
        self.next_block += 1;
        self.blocks.insert(id, Block::new(id, body));
        id
    }

    /// Creates a new, empty block and returns its id.
    ///
    /// Ids are assigned monotonically and never reused. Editable graphs only: the
    /// block owns an (initially empty) entry segment. The caller is responsible
    /// for filling and connecting it — the non-empty-block invariant is only
    /// re-checked at the next [`sanity_check`](Self::sanity_check) via the
    /// structural conditions.
    pub fn create_block(&mut self) -> BlockId {
        assert!(self.editable, "create_block requires an editable graph");
        self.new_block(BlockBody::Owned(Default::default()))
    }

    /// Allocates and links a new edge; returns its handle.
    ///
    /// The edge is appended to `src`'s successor list and `target`'s predecessor
    /// list, maintaining the bidirectional invariant.
    pub fn add_edge(&mut self, src: BlockId, target: BlockId, kind: EdgeKind) -> EdgeId {
        let id = EdgeId::new(self.edges.len());
        self.edges.push(Some(Edge::new(src, target, kind)));
        self.block_mut(src).succs.push(id);
        self.block_mut(target).preds.push(id);
        id
    }

    /// Splits `self` into the item arena and the block map for edits that need
    /// both halves mutably (list surgery inside a block).
    pub(crate) fn edit(&mut self) -> (&mut ItemArena, &mut BTreeMap<BlockId, Block>) {
        match &mut self.ir {
            IrSource::Owned(arena) => (arena, &mut self.blocks),
            IrSource::Borrowed(_) => panic!("cannot mutate the entries of a read-only view"),
        }
    }

    pub(crate) fn remove_item(&mut self, block: BlockId, id: ItemId) -> Item {
        let (arena, blocks) = self.edit();
        blocks
            .get_mut(&block)
            .expect("block is in the graph")
            .owned_mut()
            .remove(arena, id)
    }

    pub(crate) fn push_front_item(&mut self, block: BlockId, item: Item) -> ItemId {
        let (arena, blocks) = self.edit();
        blocks
            .get_mut(&block)
            .expect("block is in the graph")
            .owned_mut()
            .push_front(arena, item)
    }

    pub(crate) fn push_back_item(&mut self, block: BlockId, item: Item) -> ItemId {
        let (arena, blocks) = self.edit();
        blocks
            .get_mut(&block)
            .expect("block is in the graph")
            .owned_mut()
            .push_back(arena, item)
    }

    pub(crate) fn insert_before_item(&mut self, block: BlockId, at: ItemId, item: Item) -> ItemId {
        let (arena, blocks) = self.edit();
        blocks
            .get_mut(&block)
            .expect("block is in the graph")
            .owned_mut()
            .insert_before(arena, at, item)
    }

    pub(crate) fn insert_after_item(&mut self, block: BlockId, at: ItemId, item: Item) -> ItemId {
        let (arena, blocks) = self.edit();
        blocks
            .get_mut(&block)
            .expect("block is in the graph")
            .owned_mut()
            .insert_after(arena, at, item)
    }

    /// Returns the last entry of a block, of any type.
    pub(crate) fn last_item(&self, block: BlockId) -> Option<ItemId> {
        self.block_items(block).last().map(|(id, _)| id)
    }

    // ------------------------------------------------------------------------
    // Edge queries
    // ------------------------------------------------------------------------

    /// Returns the first incoming edge satisfying `predicate`.
    pub fn get_pred_edge_if(
        &self,
        block: BlockId,
        predicate: impl Fn(&Edge) -> bool,
    ) -> Option<EdgeId> {
        self.block_ref(block)
            .preds
            .iter()
            .copied()
            .find(|&e| predicate(self.edge_ref(e)))
    }

    /// Returns the first outgoing edge satisfying `predicate`.
    pub fn get_succ_edge_if(
        &self,
        block: BlockId,
        predicate: impl Fn(&Edge) -> bool,
    ) -> Option<EdgeId> {
        self.block_ref(block)
            .succs
            .iter()
            .copied()
            .find(|&e| predicate(self.edge_ref(e)))
    }

    /// Collects every incoming edge satisfying `predicate`.
    pub fn get_pred_edges_if(
        &self,
        block: BlockId,
        predicate: impl Fn(&Edge) -> bool,
    ) -> Vec<EdgeId> {
        self.block_ref(block)
            .preds
            .iter()
            .copied()
            .filter(|&e| predicate(self.edge_ref(e)))
            .collect()
    }

    /// Collects every outgoing edge satisfying `predicate`.
    pub fn get_succ_edges_if(
        &self,
        block: BlockId,
        predicate: impl Fn(&Edge) -> bool,
    ) -> Vec<EdgeId> {
        self.block_ref(block)
            .succs
            .iter()
            .copied()
            .filter(|&e| predicate(self.edge_ref(e)))
            .collect()
    }

    /// Returns the first incoming edge of the given type.
    #[must_use]
    pub fn get_pred_edge_of_type(&self, block: BlockId, ty: EdgeType) -> Option<EdgeId> {
        self.get_pred_edge_if(block, |e| e.ty() == ty)
    }

    /// Returns the first outgoing edge of the given type.
    #[must_use]
    pub fn get_succ_edge_of_type(&self, block: BlockId, ty: EdgeType) -> Option<EdgeId> {
        self.get_succ_edge_if(block, |e| e.ty() == ty)
    }

    /// Collects every incoming edge of the given type.
    #[must_use]
    pub fn get_pred_edges_of_type(&self, block: BlockId, ty: EdgeType) -> Vec<EdgeId> {
        self.get_pred_edges_if(block, |e| e.ty() == ty)
    }

    /// Collects every outgoing edge of the given type.
    #[must_use]
    pub fn get_succ_edges_of_type(&self, block: BlockId, ty: EdgeType) -> Vec<EdgeId> {
        self.get_succ_edges_if(block, |e| e.ty() == ty)
    }

    /// Returns `true` if `block` has `other` as a predecessor, optionally
    /// restricted to a single edge type.
    #[must_use]
    pub fn has_pred(&self, block: BlockId, other: BlockId, ty: Option<EdgeType>) -> bool {
        self.get_pred_edge_if(block, |e| e.src() == other && ty.is_none_or(|t| e.ty() == t))
            .is_some()
    }

    /// Returns `true` if `block` has `other` as a successor, optionally
    /// restricted to a single edge type.
    #[must_use]
    pub fn has_succ(&self, block: BlockId, other: BlockId, ty: Option<EdgeType>) -> bool {
        self.get_succ_edge_if(block, |e| {
            e.target() == other && ty.is_none_or(|t| e.ty() == t)
        })
        .is_some()
    }

    // ------------------------------------------------------------------------
    // Instruction-level queries
    // ------------------------------------------------------------------------

    /// Iterates over the entries of a block in order.
    pub fn block_items(&self, block: BlockId) -> ItemIter<'_> {
        self.body_items(&self.block_ref(block).body)
    }

    pub(crate) fn body_items(&self, body: &BlockBody) -> ItemIter<'_> {
        match body {
            BlockBody::Owned(list) => list.iter(self.arena()),
            BlockBody::Range { begin, end } => ItemIter::range(self.arena(), *begin, *end),
        }
    }

    /// Collects the entry handles of a block, for walks that mutate as they go.
    #[must_use]
    pub fn block_item_ids(&self, block: BlockId) -> Vec<ItemId> {
        self.block_items(block).map(|(id, _)| id).collect()
    }

    /// Returns the entry behind a handle.
    ///
    /// # Panics
    ///
    /// Panics if the handle was disposed.
    #[must_use]
    pub fn item(&self, id: ItemId) -> &Item {
        match self.arena().get(id) {
            Some(item) => item,
            None => panic!("item {id} was disposed"),
        }
    }

    /// Returns `true` if the block holds no entries at all.
    #[must_use]
    pub fn is_block_empty(&self, block: BlockId) -> bool {
        self.block_items(block).next().is_none()
    }

    /// Returns the first real instruction of a block.
    #[must_use]
    pub fn first_insn(&self, block: BlockId) -> Option<ItemId> {
        self.block_items(block)
            .find(|(_, item)| item.is_opcode())
            .map(|(id, _)| id)
    }

    /// Returns the last real instruction of a block.
    #[must_use]
    pub fn last_insn(&self, block: BlockId) -> Option<ItemId> {
        let mut last = None;
        for (id, item) in self.block_items(block) {
            if item.is_opcode() {
                last = Some(id);
            }
        }
        last
    }

    /// Returns the conditional branch or switch terminating a block, if any.
    #[must_use]
    pub fn get_conditional_branch(&self, block: BlockId) -> Option<ItemId> {
        let mut found = None;
        for (id, item) in self.block_items(block) {
            if let Some(insn) = item.insn() {
                if insn.opcode.is_conditional_branch() || insn.opcode.is_switch() {
                    found = Some(id);
                }
            }
        }
        found
    }

    /// Returns `true` if the block's first instruction is a `move-result` or
    /// `move-result-pseudo`.
    #[must_use]
    pub fn starts_with_move_result(&self, block: BlockId) -> bool {
        self.first_insn(block).is_some_and(|id| {
            let insn = self.item(id).insn().expect("first_insn returned an opcode");
            insn.opcode.is_move_result() || insn.opcode.is_move_result_pseudo()
        })
    }

    /// Returns `true` if the block is an exception handler (has an incoming
    /// throw edge).
    #[must_use]
    pub fn is_catch(&self, block: BlockId) -> bool {
        self.get_pred_edge_of_type(block, EdgeType::Throw).is_some()
    }

    /// Returns the sorted throw-edge signature of a block: `(catch type, handler
    /// block)` pairs in handler priority order.
    pub(crate) fn throw_signature(&self, block: BlockId) -> Vec<(Option<crate::ir::TypeRef>, BlockId)> {
        let mut throws = self.get_succ_edges_of_type(block, EdgeType::Throw);
        throws.sort_by_key(|&e| self.edge_ref(e).kind().throw_index());
        throws
            .iter()
            .map(|&e| {
                let edge = self.edge_ref(e);
                (edge.kind().catch_type(), edge.target())
            })
            .collect()
    }

    /// Returns `true` if two blocks belong to the same try region: their throw
    /// edges name the same handlers with the same catch types, in index order.
    #[must_use]
    pub fn same_try(&self, b1: BlockId, b2: BlockId) -> bool {
        self.throw_signature(b1) == self.throw_signature(b2)
    }

    /// Returns `true` if the block's last instruction can leave it exceptionally.
    pub(crate) fn ends_with_may_throw(&self, block: BlockId) -> bool {
        self.last_insn(block).is_some_and(|id| {
            self.item(id)
                .insn()
                .expect("last_insn returned an opcode")
                .can_throw()
        })
    }

    /// Returns `true` if no instruction of the block can throw.
    pub(crate) fn cannot_throw(&self, block: BlockId) -> bool {
        !self
            .block_items(block)
            .any(|(_, item)| item.insn().is_some_and(crate::ir::Instruction::can_throw))
    }

    /// Derives the terminal behavior of a block from its last opcode and its
    /// outgoing edge types. Editable graphs only.
    #[must_use]
    pub fn branchingness(&self, block: BlockId) -> Branchingness {
        assert!(self.editable, "branchingness requires an editable graph");
        let succs = self.block_ref(block).succs();
        let only_ghost = succs.len() == 1
            && self.get_succ_edge_of_type(block, EdgeType::Ghost).is_some();

        if succs.is_empty() || only_ghost {
            if let Some(last) = self.last_insn(block) {
                let op = self.item(last).insn().expect("opcode").opcode;
                if op.is_return() {
                    return Branchingness::Return;
                } else if op.is_throw() {
                    return Branchingness::Throw;
                }
            }
            return Branchingness::None;
        }

        if self.get_succ_edge_of_type(block, EdgeType::Throw).is_some() {
            return Branchingness::Throw;
        }

        if self.get_succ_edge_of_type(block, EdgeType::Branch).is_some() {
            let last = self.last_insn(block);
            cfg_assert!(self, last.is_some(), "branching block {block} has no instruction");
            let op = self.item(last.unwrap()).insn().expect("opcode").opcode;
            cfg_assert!(
                self,
                op.is_conditional_branch() || op.is_switch(),
                "block {block} has branch edges but ends in {op:?}"
            );
            return if op.is_switch() {
                Branchingness::Switch
            } else {
                Branchingness::If
            };
        }

        if self.get_succ_edge_of_type(block, EdgeType::Goto).is_some() {
            return Branchingness::Goto;
        }
        Branchingness::None
    }

    /// Counts the real (non-internal) instructions of a block.
    #[must_use]
    pub fn num_opcodes(&self, block: BlockId) -> u32 {
        self.block_items(block)
            .filter(|(_, item)| {
                item.insn()
                    .is_some_and(|insn| !insn.opcode.is_internal())
            })
            .count() as u32
    }

    /// Counts the real (non-internal) instructions of the whole graph.
    #[must_use]
    pub fn num_opcodes_total(&self) -> u32 {
        self.blocks.keys().map(|&b| self.num_opcodes(b)).sum()
    }

    /// Returns the leading parameter-loading instructions of the method.
    ///
    /// Walks from the entry block across instruction-free blocks (following their
    /// single goto edge) to the first block with instructions, then collects its
    /// leading run of parameter loads.
    #[must_use]
    pub fn param_instructions(&self) -> Vec<ItemId> {
        let mut block = self.entry;
        while self.num_opcodes(block) == 0 {
            let succs = self.block_ref(block).succs();
            cfg_assert!(
                self,
                succs.len() == 1,
                "instruction-free block {block} on the way to the parameters must have one successor"
            );
            let edge = self.edge_ref(succs[0]);
            cfg_assert!(
                self,
                edge.ty() == EdgeType::Goto,
                "instruction-free block {block} must leave through a goto edge"
            );
            block = edge.target();
        }

        let mut params = Vec::new();
        for (id, item) in self.block_items(block) {
            match item.insn() {
                Some(insn) if insn.opcode.is_load_param() => params.push(id),
                _ => break,
            }
        }
        params
    }

    /// Locates the `move-result(-pseudo)` paired with the instruction at `item`.
    ///
    /// The pair lives either directly after the instruction in the same block, or
    /// at the head of the block's unique goto successor (which happens when the
    /// instruction ends a try region).
    #[must_use]
    pub fn move_result_of(&self, block: BlockId, item: ItemId) -> Option<(BlockId, ItemId)> {
        let mut items = self.block_items(block).skip_while(|&(id, _)| id != item);
        items.next()?;
        let next_insn = items.find(|(_, it)| it.is_opcode());
        if let Some((next_id, next_item)) = next_insn {
            let op = next_item.insn().expect("opcode").opcode;
            if op.is_move_result() || op.is_move_result_pseudo() {
                return Some((block, next_id));
            }
        }
        let goto_edge = self.get_succ_edge_of_type(block, EdgeType::Goto)?;
        let next_block = self.edge_ref(goto_edge).target();
        if self.starts_with_move_result(next_block) {
            return Some((next_block, self.first_insn(next_block)?));
        }
        None
    }

    // ------------------------------------------------------------------------
    // Register width
    // ------------------------------------------------------------------------

    /// Rescans every instruction and stores the register width: highest used
    /// register index plus one, counting wide registers as two.
    pub fn recompute_registers_size(&mut self) {
        self.registers_size = self.computed_registers_size();
    }

    fn computed_registers_size(&self) -> u16 {
        let mut num_regs: u16 = 0;
        let mut check = |reg: crate::ir::Register| {
            let highest_in_use = reg.highest();
            if highest_in_use >= num_regs {
                // +1 because registers start at v0
                num_regs = highest_in_use + 1;
            }
        };
        for block in self.blocks.values() {
            for (_, item) in self.body_items(&block.body) {
                if let Some(insn) = item.insn() {
                    if let Some(dest) = insn.dest {
                        check(dest);
                    }
                    for &src in &insn.srcs {
                        check(src);
                    }
                }
            }
        }
        num_regs
    }

    fn check_registers_size(&self) {
        let used = self.computed_registers_size();
        cfg_assert!(
            self,
            used == self.registers_size,
            "used regs {} != stored registers size {}",
            used,
            self.registers_size
        );
    }

    // ------------------------------------------------------------------------
    // Reachability
    // ------------------------------------------------------------------------

    /// Collects every block reachable from the entry along successor edges.
    pub(crate) fn reachable_from_entry(&self) -> FxHashSet<BlockId> {
        let mut visited = FxHashSet::default();
        let mut stack = vec![self.entry];
        while let Some(block) = stack.pop() {
            if !visited.insert(block) {
                continue;
            }
            for &e in self.block_ref(block).succs() {
                stack.push(self.edge_ref(e).target());
            }
        }
        visited
    }

    // ------------------------------------------------------------------------
    // Structural checks
    // ------------------------------------------------------------------------

    /// Verifies every structural invariant of the graph; panics with the
    /// offending block id and a dump on violation.
    ///
    /// For editable graphs this includes: no leftover target markers, no goto
    /// opcodes, terminator/edge agreement (a conditional or switch has at least
    /// two successors, a return has only ghost successors, a reachable block that
    /// does not end the method has at least one successor), register width
    /// agreement. Both modes check exit-block emptiness of successors, exact
    /// bidirectional edge membership, duplicate-free successor lists, and
    /// dangling source-position parents.
    pub fn sanity_check(&self) {
        if self.editable {
            for (&id, block) in &self.blocks {
                for (_, item) in self.body_items(&block.body) {
                    cfg_assert!(
                        self,
                        !item.is_target(),
                        "failed to remove all targets. block {id}"
                    );
                    if let Some(insn) = item.insn() {
                        cfg_assert!(
                            self,
                            !insn.opcode.is_goto(),
                            "failed to remove all gotos. block {id}"
                        );
                    }
                }

                if let Some(last) = self.last_insn(id) {
                    let op = self.item(last).insn().expect("opcode").opcode;
                    let num_preds = block.preds().len();
                    let num_succs = block.succs().len();
                    if op.is_conditional_branch() || op.is_switch() {
                        cfg_assert!(
                            self,
                            num_succs > 1,
                            "block {id} ends in {op:?} but has {num_succs} successors"
                        );
                    } else if op.is_return() {
                        // Only a ghost edge to a synthesized exit may follow a return.
                        let real_succs = self.get_succ_edges_if(id, |e| e.ty() != EdgeType::Ghost);
                        cfg_assert!(
                            self,
                            real_succs.is_empty(),
                            "block {id} ends in a return but has outgoing edges"
                        );
                    } else if op.is_throw() {
                        // A throw may end the method or reach a handler; nothing to check.
                    } else if num_preds > 0 {
                        cfg_assert!(
                            self,
                            num_succs > 0,
                            "control flow falls off the end of block {id}"
                        );
                    }
                }
            }
        }

        if let Some(exit) = self.exit {
            cfg_assert!(
                self,
                self.block_ref(exit).succs().is_empty(),
                "exit block {exit} has outgoing edges"
            );
        }

        for (&id, block) in &self.blocks {
            for &e in block.succs() {
                let edge = self.edge_ref(e);
                cfg_assert!(self, edge.src() == id, "edge {e} disagrees about its source");
                let reverse = self.block_ref(edge.target()).preds();
                cfg_assert!(
                    self,
                    reverse.iter().filter(|&&p| p == e).count() == 1,
                    "edge {id} -> {} is not mirrored exactly once",
                    edge.target()
                );
            }
            for &e in block.preds() {
                let edge = self.edge_ref(e);
                cfg_assert!(self, edge.target() == id, "edge {e} disagrees about its target");
                let forward = self.block_ref(edge.src()).succs();
                cfg_assert!(
                    self,
                    forward.iter().filter(|&&s| s == e).count() == 1,
                    "edge {} -> {id} is not mirrored exactly once",
                    edge.src()
                );
            }

            // No two successor edges may agree on target, type, and payload.
            for (i, &e1) in block.succs().iter().enumerate() {
                for &e2 in &block.succs()[i + 1..] {
                    let (a, b) = (self.edge_ref(e1), self.edge_ref(e2));
                    cfg_assert!(
                        self,
                        a.target() != b.target() || a.kind() != b.kind(),
                        "block {id} has duplicate successor edges to {}",
                        a.target()
                    );
                }
            }
        }

        if self.editable {
            self.check_registers_size();
        }
        self.no_dangling_positions();
    }

    /// Asserts that no source position references a parent position that is not
    /// contained in any block.
    fn no_dangling_positions(&self) {
        let mut positions: FxHashSet<ItemId> = FxHashSet::default();
        for block in self.blocks.values() {
            for (id, item) in self.body_items(&block.body) {
                if matches!(item, Item::Position(_)) {
                    positions.insert(id);
                }
            }
        }
        for (&id, block) in &self.blocks {
            for (_, item) in self.body_items(&block.body) {
                if let Item::Position(pos) = item {
                    if let Some(parent) = pos.parent {
                        cfg_assert!(
                            self,
                            positions.contains(&parent),
                            "dangling position parent {parent} in block {id}"
                        );
                    }
                }
            }
        }
    }

    // ------------------------------------------------------------------------
    // Dumps
    // ------------------------------------------------------------------------

    /// Generates a DOT format representation of this control flow graph.
    ///
    /// Node ids are block ids; one line per edge. The output can be rendered with
    /// Graphviz tools like `dot`.
    #[must_use]
    pub fn to_dot(&self) -> String {
        let mut dot = String::new();
        dot.push_str("digraph {\n");
        for (&id, block) in &self.blocks {
            for &e in block.succs() {
                let _ = writeln!(dot, "{} -> {}", id.index(), self.edge_ref(e).target().index());
            }
        }
        dot.push_str("}\n");
        dot
    }
}

impl ControlFlowGraph<'static> {
    /// Returns a structurally identical copy of this editable graph with its own
    /// entries, blocks, and edges.
    ///
    /// All handles are arena indices, so the copy preserves every id.
    #[must_use]
    pub fn deep_copy(&self) -> ControlFlowGraph<'static> {
        assert!(self.editable, "deep_copy requires an editable graph");
        let arena = match &self.ir {
            IrSource::Owned(arena) => arena.clone(),
            IrSource::Borrowed(_) => unreachable!("editable graphs own their arena"),
        };
        ControlFlowGraph {
            ir: IrSource::Owned(arena),
            blocks: self.blocks.clone(),
            edges: self.edges.clone(),
            entry: self.entry,
            exit: self.exit,
            registers_size: self.registers_size,
            editable: true,
            next_block: self.next_block,
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::cfg::{Branchingness, ControlFlowGraph, EdgeType};
    use crate::ir::{Instruction, IrList, Opcode, Register};
    use crate::test::{ir, op};

    #[test]
    fn test_same_try_compares_throw_signatures() {
        let cfg = ControlFlowGraph::from_ir(ir::two_divs_one_handler(), 4).unwrap();
        let divs: Vec<_> = cfg
            .block_ids()
            .into_iter()
            .filter(|&b| {
                cfg.block_items(b)
                    .any(|(_, item)| item.insn().is_some_and(|i| i.opcode == Opcode::Div))
            })
            .collect();
        assert_eq!(divs.len(), 2);

        // Both divisions sit in the same region; the entry block does not.
        assert!(cfg.same_try(divs[0], divs[1]));
        assert!(!cfg.same_try(cfg.entry_block(), divs[0]));
    }

    #[test]
    fn test_move_result_of_in_same_block() {
        let cfg = ControlFlowGraph::from_ir(ir::check_cast_pair(), 2).unwrap();
        let block = cfg.entry_block();
        let cast = cfg.first_insn(block).unwrap();

        let (found_block, found) = cfg.move_result_of(block, cast).unwrap();
        assert_eq!(found_block, block);
        assert!(cfg
            .item(found)
            .insn()
            .is_some_and(|i| i.opcode.is_move_result_pseudo()));
    }

    #[test]
    fn test_move_result_of_across_goto_edge() {
        // Inside a try region, the pseudo lands at the head of the goto successor.
        let cfg = ControlFlowGraph::from_ir(ir::check_cast_in_try(), 2).unwrap();
        let cast_block = cfg
            .block_ids()
            .into_iter()
            .find(|&b| {
                cfg.block_items(b)
                    .any(|(_, item)| item.insn().is_some_and(|i| i.opcode == Opcode::CheckCast))
            })
            .unwrap();
        let cast = cfg.last_insn(cast_block).unwrap();

        let (found_block, found) = cfg.move_result_of(cast_block, cast).unwrap();
        assert_ne!(found_block, cast_block);
        assert!(cfg.starts_with_move_result(found_block));
        assert_eq!(cfg.first_insn(found_block), Some(found));
    }

    #[test]
    fn test_param_instructions() {
        let mut list = IrList::new();
        list.push_back(op(Instruction::new(Opcode::LoadParam).with_dest(Register::new(0))));
        list.push_back(op(Instruction::new(Opcode::LoadParam).with_dest(Register::new(1))));
        list.push_back(op(Instruction::new(Opcode::Add)
            .with_dest(Register::new(2))
            .with_src(Register::new(0))
            .with_src(Register::new(1))));
        list.push_back(op(Instruction::new(Opcode::Return).with_src(Register::new(2))));

        let cfg = ControlFlowGraph::from_ir(list, 3).unwrap();
        let params = cfg.param_instructions();
        assert_eq!(params.len(), 2);
        for id in params {
            assert!(cfg.item(id).insn().is_some_and(|i| i.opcode.is_load_param()));
        }
    }

    #[test]
    fn test_num_opcodes_excludes_internal() {
        let cfg = ControlFlowGraph::from_ir(ir::check_cast_pair(), 2).unwrap();
        // check-cast and return-void count; the move-result-pseudo does not.
        assert_eq!(cfg.num_opcodes(cfg.entry_block()), 2);
        assert_eq!(cfg.num_opcodes_total(), 2);
    }

    #[test]
    fn test_branchingness_throw() {
        let mut list = IrList::new();
        list.push_back(op(Instruction::new(Opcode::Const)
            .with_dest(Register::new(0))
            .with_literal(0)));
        list.push_back(op(Instruction::new(Opcode::Throw).with_src(Register::new(0))));
        let cfg = ControlFlowGraph::from_ir(list, 1).unwrap();
        assert_eq!(cfg.branchingness(cfg.entry_block()), Branchingness::Throw);
    }

    #[test]
    fn test_has_pred_and_succ() {
        let cfg = ControlFlowGraph::from_ir(ir::if_else(), 3).unwrap();
        let b0 = cfg.entry_block();
        let goto = cfg.get_succ_edge_of_type(b0, EdgeType::Goto).unwrap();
        let next = cfg.edge(goto).unwrap().target();

        assert!(cfg.has_succ(b0, next, None));
        assert!(cfg.has_succ(b0, next, Some(EdgeType::Goto)));
        assert!(!cfg.has_succ(b0, next, Some(EdgeType::Throw)));
        assert!(cfg.has_pred(next, b0, Some(EdgeType::Goto)));
        assert!(!cfg.has_pred(b0, next, None));
    }

    #[test]
    fn test_dot_of_single_block_has_no_edges() {
        let cfg = ControlFlowGraph::from_ir(ir::straight_line(), 3).unwrap();
        assert_eq!(cfg.to_dot(), "digraph {\n}\n");
    }
}

impl fmt::Display for ControlFlowGraph<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "CFG ({}, {} blocks, entry {}, exit {}):",
            if self.editable { "editable" } else { "view" },
            self.blocks.len(),
            self.entry,
            match self.exit {
                Some(exit) => exit.to_string(),
                None => "-".to_string(),
            }
        )?;
        for (&id, block) in &self.blocks {
            write!(f, " Block {id}: preds [")?;
            for (i, &e) in block.preds().iter().enumerate() {
                let edge = self.edge_ref(e);
                if i > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{} ({})", edge.src(), edge.kind())?;
            }
            write!(f, "] succs [")?;
            for (i, &e) in block.succs().iter().enumerate() {
                let edge = self.edge_ref(e);
                if i > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{} ({})", edge.target(), edge.kind())?;
            }
            writeln!(f, "]")?;
            for (item_id, item) in self.body_items(&block.body) {
                writeln!(f, "   {item_id}: {item}")?;
            }
        }
        Ok(())
    }
}
