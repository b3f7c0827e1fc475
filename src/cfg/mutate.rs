//! Mutation of editable control flow graphs.
//!
//! Every operation here preserves the bidirectional edge invariant: an edge is
//! always registered exactly once with its source's successor list and once with
//! its target's predecessor list. Walks that mutate the very edge vectors they
//! traverse copy them first.

use crate::cfg::{BlockId, ControlFlowGraph, Edge, EdgeId, EdgeKind, EdgeType};
use crate::ir::{Item, ItemId};

impl<'a> ControlFlowGraph<'a> {
    // ------------------------------------------------------------------------
    // Edge removal
    // ------------------------------------------------------------------------

    /// Removes and frees a single edge.
    pub fn remove_edge(&mut self, e: EdgeId) {
        self.unlink_edge(e, true);
        self.free_edge(e);
    }

    /// Removes and frees every edge from `source` to `target` matching
    /// `predicate`.
    pub fn remove_edge_if(
        &mut self,
        source: BlockId,
        target: BlockId,
        predicate: impl Fn(&Edge) -> bool,
    ) {
        let removed = self.unlink_edge_between_if(source, target, &predicate, true);
        self.free_edges(&removed);
    }

    /// Removes and frees every outgoing edge of `block` matching `predicate`.
    pub fn remove_succ_edge_if(&mut self, block: BlockId, predicate: impl Fn(&Edge) -> bool) {
        let removed = self.unlink_succ_edge_if(block, &predicate, true);
        self.free_edges(&removed);
    }

    /// Removes and frees every incoming edge of `block` matching `predicate`.
    pub fn remove_pred_edge_if(&mut self, block: BlockId, predicate: impl Fn(&Edge) -> bool) {
        let removed = self.unlink_pred_edge_if(block, &predicate, true);
        self.free_edges(&removed);
    }

    /// Removes and frees every outgoing edge of `block`.
    pub fn remove_succ_edges(&mut self, block: BlockId) {
        self.remove_succ_edge_if(block, |_| true);
    }

    /// Removes and frees every incoming edge of `block`.
    pub fn remove_pred_edges(&mut self, block: BlockId) {
        self.remove_pred_edge_if(block, |_| true);
    }

    /// Unlinks one edge from both endpoint lists without freeing it.
    fn unlink_edge(&mut self, e: EdgeId, cleanup: bool) {
        let (src, target) = {
            let edge = self.edge_ref(e);
            (edge.src(), edge.target())
        };
        self.block_mut(src).succs.retain(|&s| s != e);
        self.block_mut(target).preds.retain(|&p| p != e);
        if cleanup {
            self.cleanup_deleted_edges(&[e]);
        }
    }

    pub(crate) fn unlink_edge_between_if(
        &mut self,
        source: BlockId,
        target: BlockId,
        predicate: &dyn Fn(&Edge) -> bool,
        cleanup: bool,
    ) -> Vec<EdgeId> {
        self.unlink_succ_edge_if(
            source,
            &|edge| edge.target() == target && predicate(edge),
            cleanup,
        )
    }

    pub(crate) fn unlink_succ_edge_if(
        &mut self,
        block: BlockId,
        predicate: &dyn Fn(&Edge) -> bool,
        cleanup: bool,
    ) -> Vec<EdgeId> {
        let succs = self.block_ref(block).succs.clone();
        let mut to_remove = Vec::new();
        let mut target_blocks = Vec::new();
        for e in succs {
            let edge = self.edge_ref(e);
            if predicate(edge) {
                target_blocks.push(edge.target());
                to_remove.push(e);
            }
        }
        self.block_mut(block).succs.retain(|e| !to_remove.contains(e));
        for &target in &target_blocks {
            self.block_mut(target).preds.retain(|e| !to_remove.contains(e));
        }
        if cleanup {
            self.cleanup_deleted_edges(&to_remove);
        }
        to_remove
    }

    pub(crate) fn unlink_pred_edge_if(
        &mut self,
        block: BlockId,
        predicate: &dyn Fn(&Edge) -> bool,
        cleanup: bool,
    ) -> Vec<EdgeId> {
        let preds = self.block_ref(block).preds.clone();
        let mut to_remove = Vec::new();
        let mut source_blocks = Vec::new();
        for e in preds {
            let edge = self.edge_ref(e);
            if predicate(edge) {
                source_blocks.push(edge.src());
                to_remove.push(e);
            }
        }
        self.block_mut(block).preds.retain(|e| !to_remove.contains(e));
        for &source in &source_blocks {
            self.block_mut(source).succs.retain(|e| !to_remove.contains(e));
        }
        if cleanup {
            self.cleanup_deleted_edges(&to_remove);
        }
        to_remove
    }

    /// After successor edges disappeared, a conditional branch or switch left
    /// with a single outgoing edge is no branch anymore: the terminator is
    /// deleted and the surviving edge becomes a plain goto.
    fn cleanup_deleted_edges(&mut self, edges: &[EdgeId]) {
        if !self.editable {
            // Views never delete instructions; the only view-mode edge removal
            // (unreachable successor pruning) empties the list outright, which
            // makes this a no-op there anyway.
            return;
        }
        for &e in edges {
            let pred_block = self.edge_ref(e).src();
            let Some(last_id) = self.last_insn(pred_block) else {
                continue;
            };
            let op = self.item(last_id).insn().expect("opcode").opcode;
            let remaining = self.block_ref(pred_block).succs().len();
            if (op.is_conditional_branch() || op.is_switch()) && remaining == 1 {
                self.remove_item(pred_block, last_id);
                let surviving = self.block_ref(pred_block).succs()[0];
                self.edge_mut(surviving).kind = EdgeKind::Goto;
            }
        }
    }

    pub(crate) fn free_edge(&mut self, e: EdgeId) {
        self.edges[e.index()] = None;
    }

    pub(crate) fn free_edges(&mut self, edges: &[EdgeId]) {
        for &e in edges {
            self.free_edge(e);
        }
    }

    // ------------------------------------------------------------------------
    // Edge redirection
    // ------------------------------------------------------------------------

    /// Re-points an edge at a new target block, keeping its kind and payload.
    pub fn set_edge_target(&mut self, e: EdgeId, new_target: BlockId) {
        self.move_edge(e, None, Some(new_target));
    }

    /// Re-roots an edge at a new source block, keeping its kind and payload.
    pub fn set_edge_source(&mut self, e: EdgeId, new_source: BlockId) {
        self.move_edge(e, Some(new_source), None);
    }

    /// Moves an edge out of the lists of its old endpoints and into the lists of
    /// the new ones, without running edge cleanup.
    fn move_edge(&mut self, e: EdgeId, new_source: Option<BlockId>, new_target: Option<BlockId>) {
        self.unlink_edge(e, false);
        let edge = self.edge_mut(e);
        if let Some(src) = new_source {
            edge.src = src;
        }
        if let Some(target) = new_target {
            edge.target = target;
        }
        let (src, target) = (edge.src, edge.target);
        self.block_mut(src).succs.push(e);
        self.block_mut(target).preds.push(e);
    }

    // ------------------------------------------------------------------------
    // Block mutation
    // ------------------------------------------------------------------------

    /// Deletes a block: unlinks all adjacent edges, disposes its entries, and
    /// drops it from the graph. Removing the entry block promotes its sole
    /// successor to be the new entry.
    pub fn remove_block(&mut self, block: BlockId) {
        assert!(self.editable, "remove_block requires an editable graph");
        if block == self.entry {
            cfg_assert!(
                self,
                self.block_ref(block).succs().len() == 1,
                "removing entry block {block} without a unique successor"
            );
            let succ = self.edge_ref(self.block_ref(block).succs()[0]).target();
            self.entry = succ;
        }
        self.remove_pred_edges(block);
        self.remove_succ_edges(block);

        let items = self.block_item_ids(block);
        let (arena, blocks) = self.edit();
        let list = blocks
            .get_mut(&block)
            .expect("block is in the graph")
            .owned_mut();
        for id in items {
            list.remove(arena, id);
        }
        self.blocks.remove(&block);
    }

    /// Redirects every predecessor edge of `old_block` onto `new_block`, then
    /// deletes `old_block`.
    pub fn replace_block(&mut self, old_block: BlockId, new_block: BlockId) {
        assert!(self.editable, "replace_block requires an editable graph");
        // Copy before redirecting; set_edge_target edits the list being walked.
        let to_redirect = self.block_ref(old_block).preds.clone();
        for e in to_redirect {
            self.set_edge_target(e, new_block);
        }
        self.remove_block(old_block);
    }

    /// Fuses `succ` into `pred`.
    ///
    /// Precondition: the single goto edge from `pred` to `succ` is `pred`'s only
    /// outgoing edge and `succ`'s only incoming edge. `succ`'s entries are
    /// appended to `pred`, `succ`'s outgoing edges are re-rooted at `pred`, and
    /// `succ` disappears.
    pub fn merge_blocks(&mut self, pred: BlockId, succ: BlockId) {
        assert!(self.editable, "merge_blocks requires an editable graph");
        {
            let pred_succs = self.block_ref(pred).succs();
            cfg_assert!(
                self,
                pred_succs.len() == 1,
                "merge_blocks: {pred} must have exactly one successor"
            );
            let forward = self.edge_ref(pred_succs[0]);
            cfg_assert!(
                self,
                forward.target() == succ && forward.ty() == EdgeType::Goto,
                "merge_blocks: {pred} must reach {succ} through a single goto"
            );
            let succ_preds = self.block_ref(succ).preds();
            cfg_assert!(
                self,
                succ_preds.len() == 1 && succ_preds[0] == pred_succs[0],
                "merge_blocks: {succ} must have exactly the edge from {pred}"
            );
        }

        // Remove the edge between them.
        let removed = self.unlink_edge_between_if(pred, succ, &|_| true, false);
        self.free_edges(&removed);

        // Move succ's entries onto the tail of pred.
        {
            let (arena, blocks) = self.edit();
            let mut succ_list = std::mem::take(
                blocks
                    .get_mut(&succ)
                    .expect("block is in the graph")
                    .owned_mut(),
            );
            blocks
                .get_mut(&pred)
                .expect("block is in the graph")
                .owned_mut()
                .splice_back(arena, &mut succ_list);
        }

        // Move succ's outgoing edges onto pred. Copy first; re-rooting edits the
        // edge vectors.
        let outgoing = self.block_ref(succ).succs.clone();
        for e in outgoing {
            self.set_edge_source(e, pred);
        }

        self.blocks.remove(&succ);
    }

    // ------------------------------------------------------------------------
    // Instruction removal
    // ------------------------------------------------------------------------

    /// Deletes the instruction at `item` in `block`, with the cascading fix-ups
    /// the graph invariants demand:
    ///
    /// - a conditional branch or switch takes its branch edges with it (a lone
    ///   surviving goto/throw pair can remain);
    /// - an instruction paired with a `move-result-pseudo` takes the pseudo with
    ///   it, whether it sits in the same block or at the head of the unique goto
    ///   successor;
    /// - the last potentially-throwing instruction of a block takes the block's
    ///   throw edges with it.
    ///
    /// Unconditional gotos cannot be removed: editable graphs carry them as
    /// edges, not instructions.
    pub fn remove_opcode(&mut self, block: BlockId, item: ItemId) {
        assert!(self.editable, "remove_opcode requires an editable graph");
        let insn = match self.item(item) {
            Item::Opcode(insn) => insn.clone(),
            other => panic!("remove_opcode on non-instruction entry {item}: {other}"),
        };
        let op = insn.opcode;
        cfg_assert!(self, !op.is_goto(), "there are no goto instructions in the graph");

        let last = self.last_insn(block);
        cfg_assert!(
            self,
            last.is_some(),
            "cannot remove an instruction from empty block {block}"
        );
        let last_id = last.unwrap();

        if op.is_conditional_branch() || op.is_switch() {
            // Remove all outgoing branch edges, leaving behind at most a goto
            // and throw edges. No cleanup: the instruction dies below anyway.
            let removed = self.unlink_succ_edge_if(block, &|e| e.ty() == EdgeType::Branch, false);
            self.free_edges(&removed);
        } else if op.has_move_result_pseudo() {
            if item == last_id {
                // The pseudo lives at the head of the next runtime block, behind
                // the goto edge (this block ended a try region).
                let goto_edge = self.get_succ_edge_of_type(block, EdgeType::Goto);
                cfg_assert!(
                    self,
                    goto_edge.is_some(),
                    "block {block} ends a result-producing instruction without a goto edge"
                );
                let mrp_block = self.edge_ref(goto_edge.unwrap()).target();
                let first = self.first_insn(mrp_block);
                cfg_assert!(
                    self,
                    first.is_some_and(|id| self
                        .item(id)
                        .insn()
                        .is_some_and(|i| i.opcode.is_move_result_pseudo())),
                    "{block} -> {mrp_block} does not lead to a move-result-pseudo"
                );
                // A block headed by a move-result-pseudo pairs with exactly one
                // primary instruction; more than one incoming edge is malformed.
                cfg_assert!(
                    self,
                    self.block_ref(mrp_block).preds().len() == 1,
                    "multiple edges to a move-result-pseudo in {mrp_block}"
                );
                self.remove_item(mrp_block, first.unwrap());
            } else {
                // The pseudo sits right after its primary in the same block.
                let mrp = self
                    .block_items(block)
                    .skip_while(|&(id, _)| id != item)
                    .skip(1)
                    .find(|(_, it)| it.is_opcode())
                    .map(|(id, _)| id);
                cfg_assert!(
                    self,
                    mrp.is_some_and(|id| self
                        .item(id)
                        .insn()
                        .is_some_and(|i| i.opcode.is_move_result_pseudo())),
                    "instruction at {item} in {block} is not followed by its move-result-pseudo"
                );
                self.remove_item(block, mrp.unwrap());
            }
        }

        if item == last_id && (op.may_throw() || op.is_throw()) {
            // The block no longer throws; its throw edges must go.
            let removed = self.unlink_succ_edge_if(block, &|e| e.ty() == EdgeType::Throw, true);
            self.free_edges(&removed);
        }

        self.remove_item(block, item);
    }
}

#[cfg(test)]
mod tests {
    use crate::cfg::{ControlFlowGraph, EdgeType};
    use crate::ir::Opcode;
    use crate::test::ir;

    #[test]
    fn test_remove_conditional_branch_leaves_goto() {
        let mut cfg = ControlFlowGraph::from_ir(ir::if_else(), 3).unwrap();
        let b0 = cfg.entry_block();
        let branch = cfg.get_conditional_branch(b0).unwrap();

        cfg.remove_opcode(b0, branch);

        // Both the branch edge and the instruction are gone; the fall-through
        // goto edge is the lone survivor.
        assert!(cfg.get_succ_edge_of_type(b0, EdgeType::Branch).is_none());
        assert_eq!(cfg.block(b0).unwrap().succs().len(), 1);
        assert!(cfg.get_succ_edge_of_type(b0, EdgeType::Goto).is_some());
        cfg.sanity_check();
    }

    #[test]
    fn test_edge_cleanup_turns_branch_into_goto() {
        let mut cfg = ControlFlowGraph::from_ir(ir::if_else(), 3).unwrap();
        let b0 = cfg.entry_block();

        // Delete the taken edge; the conditional branch degenerates and cleanup
        // must delete the instruction and retype the survivor as a goto.
        let taken = cfg.get_succ_edge_of_type(b0, EdgeType::Branch).unwrap();
        cfg.remove_edge(taken);

        assert!(cfg.get_conditional_branch(b0).is_none());
        let succs = cfg.block(b0).unwrap().succs().to_vec();
        assert_eq!(succs.len(), 1);
        assert_eq!(cfg.edge(succs[0]).unwrap().ty(), EdgeType::Goto);
        cfg.sanity_check();
    }

    #[test]
    fn test_remove_last_throwing_instruction_drops_throw_edges() {
        let mut cfg = ControlFlowGraph::from_ir(ir::try_catch_div(), 3).unwrap();
        let div_block = cfg
            .block_ids()
            .into_iter()
            .find(|&b| {
                cfg.block_items(b)
                    .any(|(_, item)| item.insn().is_some_and(|i| i.opcode == Opcode::Div))
            })
            .unwrap();
        let div = cfg.last_insn(div_block).unwrap();
        assert!(cfg.get_succ_edge_of_type(div_block, EdgeType::Throw).is_some());

        cfg.remove_opcode(div_block, div);

        assert!(cfg.get_succ_edge_of_type(div_block, EdgeType::Throw).is_none());
        cfg.sanity_check();
    }

    #[test]
    fn test_set_edge_target_redirects_both_lists() {
        let mut cfg = ControlFlowGraph::from_ir(ir::if_else(), 3).unwrap();
        let b0 = cfg.entry_block();
        let goto = cfg.get_succ_edge_of_type(b0, EdgeType::Goto).unwrap();
        let old_target = cfg.edge(goto).unwrap().target();
        let branch = cfg.get_succ_edge_of_type(b0, EdgeType::Branch).unwrap();
        let new_target = cfg.edge(branch).unwrap().target();

        cfg.set_edge_target(goto, new_target);

        assert!(!cfg.block(old_target).unwrap().preds().contains(&goto));
        assert!(cfg.block(new_target).unwrap().preds().contains(&goto));
        assert_eq!(cfg.edge(goto).unwrap().target(), new_target);
    }

    #[test]
    fn test_merge_blocks() {
        let mut cfg = ControlFlowGraph::from_ir(ir::straight_line_split(), 3).unwrap();
        // The helper builds two blocks joined by a lone goto edge.
        assert_eq!(cfg.num_blocks(), 2);
        let pred = cfg.entry_block();
        let goto = cfg.get_succ_edge_of_type(pred, EdgeType::Goto).unwrap();
        let succ = cfg.edge(goto).unwrap().target();
        let total = cfg.num_opcodes_total();

        cfg.merge_blocks(pred, succ);

        assert_eq!(cfg.num_blocks(), 1);
        assert_eq!(cfg.num_opcodes_total(), total);
        assert!(cfg.block(pred).unwrap().succs().is_empty());
        cfg.sanity_check();
    }

    #[test]
    fn test_remove_entry_block_promotes_successor() {
        let mut cfg = ControlFlowGraph::from_ir(ir::straight_line_split(), 3).unwrap();
        let old_entry = cfg.entry_block();
        let goto = cfg.get_succ_edge_of_type(old_entry, EdgeType::Goto).unwrap();
        let succ = cfg.edge(goto).unwrap().target();

        cfg.remove_block(old_entry);

        assert_eq!(cfg.entry_block(), succ);
        assert!(cfg.block(old_entry).is_none());
        assert!(cfg.block(succ).unwrap().preds().is_empty());
    }

    #[test]
    fn test_replace_block() {
        let mut cfg = ControlFlowGraph::from_ir(ir::if_else(), 3).unwrap();
        let b0 = cfg.entry_block();
        let branch = cfg.get_succ_edge_of_type(b0, EdgeType::Branch).unwrap();
        let goto = cfg.get_succ_edge_of_type(b0, EdgeType::Goto).unwrap();
        let taken = cfg.edge(branch).unwrap().target();
        let fallthrough = cfg.edge(goto).unwrap().target();

        // Route everything that entered the taken arm into the other arm.
        cfg.replace_block(taken, fallthrough);

        assert!(cfg.block(taken).is_none());
        assert_eq!(cfg.edge(branch).unwrap().target(), fallthrough);
        assert!(cfg.block(fallthrough).unwrap().preds().contains(&branch));
    }

    #[test]
    fn test_remove_primary_takes_same_block_pseudo() {
        let mut cfg = ControlFlowGraph::from_ir(ir::check_cast_pair(), 2).unwrap();
        let block = cfg.entry_block();
        let primary = cfg
            .block_items(block)
            .find(|(_, item)| item.insn().is_some_and(|i| i.opcode == Opcode::CheckCast))
            .map(|(id, _)| id)
            .unwrap();
        let before = cfg.num_opcodes(block);

        cfg.remove_opcode(block, primary);

        // Both the check-cast and its pseudo are gone.
        assert_eq!(cfg.num_opcodes(block) + 1, before);
        assert!(!cfg
            .block_items(block)
            .any(|(_, item)| item
                .insn()
                .is_some_and(|i| i.opcode.is_move_result_pseudo())));
        cfg.sanity_check();
    }
}
