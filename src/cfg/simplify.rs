//! Cleanup passes run after construction and before linearization.

use rustc_hash::FxHashSet;
use tracing::debug;

use crate::cfg::ControlFlowGraph;
use crate::ir::{Item, ItemId};

impl ControlFlowGraph<'_> {
    /// Brings the graph into its canonical form: drops unreachable blocks, drops
    /// empty blocks, and recomputes the register width. Editable only.
    pub fn simplify(&mut self) {
        assert!(self.editable, "simplify requires an editable graph");
        self.remove_unreachable_blocks();
        self.remove_empty_blocks();
        self.recompute_registers_size();
    }

    /// Deletes every block unreachable from the entry; returns the number of
    /// real instructions that disappeared with them.
    ///
    /// Source positions inside deleted blocks may be parents of surviving
    /// positions; those parent pointers are nulled so nothing dangles.
    pub fn remove_unreachable_blocks(&mut self) -> u32 {
        let mut num_insns_removed = 0;
        self.remove_unreachable_succ_edges();

        let mut deleted_positions: FxHashSet<ItemId> = FxHashSet::default();
        for block in self.block_ids() {
            if block == self.entry || !self.block_ref(block).preds().is_empty() {
                continue;
            }
            for (id, item) in self.block_items(block) {
                if matches!(item, Item::Position(_)) {
                    deleted_positions.insert(id);
                }
            }
            num_insns_removed += self.num_opcodes(block);
            debug!("removing unreachable block {block}");

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

        // Nothing may keep pointing at a deleted position.
        if !deleted_positions.is_empty() {
            for block in self.block_ids() {
                let dangling: Vec<ItemId> = self
                    .block_items(block)
                    .filter(|(_, item)| {
                        matches!(item, Item::Position(pos)
                            if pos.parent.is_some_and(|p| deleted_positions.contains(&p)))
                    })
                    .map(|(id, _)| id)
                    .collect();
                for id in dangling {
                    if let Some(Item::Position(pos)) = self.arena_mut().get_mut(id) {
                        pos.parent = None;
                    }
                }
            }
        }
        num_insns_removed
    }

    /// Deletes blocks that hold no entries, rerouting their predecessors to
    /// their single successor.
    ///
    /// The exit block is exempt, and so is an empty block that loops to itself:
    /// that is an infinite loop, not dead structure.
    pub fn remove_empty_blocks(&mut self) {
        for block in self.block_ids() {
            if !self.is_block_empty(block) || Some(block) == self.exit {
                continue;
            }

            let succs = self.block_ref(block).succs().to_vec();
            if !succs.is_empty() {
                cfg_assert!(
                    self,
                    succs.len() == 1,
                    "too many successors for empty block {block}"
                );
                let succ = self.edge_ref(succs[0]).target();
                if succ == block {
                    // The block follows itself: an infinite loop.
                    continue;
                }

                // Drop the goto edge to the successor, then point every
                // predecessor directly at it. Copy the list first: redirection
                // edits the vectors being walked.
                let removed = self.unlink_edge_between_if(block, succ, &|_| true, false);
                self.free_edges(&removed);
                let need_redirect = self.block_ref(block).preds.clone();
                for e in need_redirect {
                    self.set_edge_target(e, succ);
                }

                if block == self.entry {
                    self.entry = succ;
                }
                debug!("removing empty block {block}");
            }
            self.blocks.remove(&block);
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::cfg::{ControlFlowGraph, EdgeType};
    use crate::ir::{Instruction, IrList, Item, Opcode, Register, SourcePosition};
    use crate::test::{ir, op, target};

    #[test]
    fn test_empty_block_on_goto_edge_is_removed() {
        // A -> B -> C where B holds only a goto: after construction B is empty
        // and must collapse into a direct A -> C edge.
        let mut list = IrList::new();
        list.push_back(op(Instruction::new(Opcode::Const)
            .with_dest(Register::new(0))
            .with_literal(1)));
        let goto_b = list.push_back(op(Instruction::new(Opcode::Goto)));
        let b_head = list.push_back(target(goto_b));
        let goto_c = list.insert_after(b_head, op(Instruction::new(Opcode::Goto)));
        list.push_back(target(goto_c));
        list.push_back(op(Instruction::new(Opcode::Return).with_src(Register::new(0))));

        let cfg = ControlFlowGraph::from_ir(list, 1).unwrap();

        // Only the const block and the return block survive.
        assert_eq!(cfg.num_blocks(), 2);
        let a = cfg.entry_block();
        let goto = cfg.get_succ_edge_of_type(a, EdgeType::Goto).unwrap();
        let c = cfg.edge(goto).unwrap().target();
        assert!(cfg
            .block_items(c)
            .any(|(_, item)| item.insn().is_some_and(|i| i.opcode.is_return())));
    }

    #[test]
    fn test_unreachable_blocks_are_removed() {
        // Code after an unconditional jump that nothing targets is unreachable.
        let mut list = IrList::new();
        list.push_back(op(Instruction::new(Opcode::Const)
            .with_dest(Register::new(0))
            .with_literal(1)));
        let goto = list.push_back(op(Instruction::new(Opcode::Goto)));
        list.push_back(op(Instruction::new(Opcode::Const)
            .with_dest(Register::new(5))
            .with_literal(9)));
        list.push_back(target(goto));
        list.push_back(op(Instruction::new(Opcode::ReturnVoid)));

        let cfg = ControlFlowGraph::from_ir(list, 1).unwrap();

        assert_eq!(cfg.num_blocks(), 2);
        // The dead const never contributes to the register width.
        assert_eq!(cfg.registers_size(), 1);
    }

    #[test]
    fn test_deleted_position_parents_are_nulled() {
        // An unreachable block holds a position that a surviving position uses
        // as its parent; removal must null the parent pointer.
        let mut list = IrList::new();
        let goto = list.push_back(op(Instruction::new(Opcode::Goto)));
        let dead_pos = list.push_back(Item::Position(SourcePosition {
            line: 10,
            parent: None,
        }));
        list.push_back(op(Instruction::new(Opcode::Nop)));
        list.push_back(target(goto));
        list.push_back(Item::Position(SourcePosition {
            line: 20,
            parent: Some(dead_pos),
        }));
        list.push_back(op(Instruction::new(Opcode::ReturnVoid)));

        let cfg = ControlFlowGraph::from_ir(list, 0).unwrap();

        let mut surviving_positions = 0;
        for block in cfg.block_ids() {
            for (_, item) in cfg.block_items(block) {
                if let Item::Position(pos) = item {
                    surviving_positions += 1;
                    assert_eq!(pos.parent, None);
                }
            }
        }
        assert_eq!(surviving_positions, 1);
    }

    #[test]
    fn test_simplify_keeps_self_loop() {
        let mut cfg = ControlFlowGraph::from_ir(ir::self_loop(), 0).unwrap();
        let b0 = cfg.entry_block();
        cfg.simplify();
        assert_eq!(cfg.num_blocks(), 1);
        assert!(cfg.has_succ(b0, b0, Some(EdgeType::Goto)));
    }

    #[test]
    fn test_recompute_registers_size_is_idempotent() {
        let mut cfg = ControlFlowGraph::from_ir(ir::straight_line(), 3).unwrap();
        assert_eq!(cfg.registers_size(), 3);
        cfg.recompute_registers_size();
        assert_eq!(cfg.registers_size(), 3);
        cfg.recompute_registers_size();
        assert_eq!(cfg.registers_size(), 3);
    }

    #[test]
    fn test_wide_registers_count_twice() {
        let mut list = IrList::new();
        list.push_back(op(Instruction::new(Opcode::ConstWide)
            .with_dest(Register::wide(2))
            .with_literal(1)));
        list.push_back(op(Instruction::new(Opcode::ReturnVoid)));
        let cfg = ControlFlowGraph::from_ir(list, 4).unwrap();
        // v2:wide occupies v2 and v3.
        assert_eq!(cfg.registers_size(), 4);
    }
}
