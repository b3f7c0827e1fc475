//! Linearization: turning an editable graph back into a valid instruction stream.
//!
//! The inverse of construction. Blocks are laid out in a forward order that never
//! separates an instruction from its `move-result(-pseudo)`, branch edges become
//! target markers, goto edges that do not fall through become synthetic goto
//! opcodes, and try regions are re-derived from throw edges — merging adjacent
//! regions with identical handler lists and sharing catch chains so no duplicate
//! region markers are emitted.

use rustc_hash::{FxHashMap, FxHashSet};
use tracing::trace;

use crate::cfg::{BlockId, ControlFlowGraph, EdgeId, EdgeType};
use crate::ir::{
    BranchTarget, CatchMarker, Instruction, IrList, Item, ItemId, ItemList, Opcode, TryKind,
    TryMarker,
};

impl ControlFlowGraph<'static> {
    /// Consumes the graph and produces a fresh linear IR with equivalent
    /// semantics.
    ///
    /// The graph is simplified and checked first; the emitted stream contains
    /// branch targets, fall-through gotos where the layout requires them, and
    /// re-derived try/catch markers.
    #[must_use]
    pub fn linearize(mut self) -> IrList {
        assert!(self.editable, "linearize requires an editable graph");
        trace!("before linearize:\n{self}");
        self.simplify();
        self.sanity_check();

        let ordering = self.order();
        self.insert_branches_and_targets(&ordering);
        self.insert_try_catch_markers(&ordering);

        let mut result = ItemList::default();
        {
            let (arena, blocks) = self.edit();
            for &block in &ordering {
                let list = blocks
                    .get_mut(&block)
                    .expect("ordered block is in the graph")
                    .owned_mut();
                result.splice_back(arena, list);
            }
        }
        IrList::from_parts(self.take_arena(), result)
    }

    /// Produces the emission order: every block exactly once, with each block
    /// that begins with a `move-result(-pseudo)` placed immediately after the
    /// goto predecessor that produces its value — nothing may come between an
    /// instruction and its result capture. The remaining choices follow block id
    /// order.
    fn order(&self) -> Vec<BlockId> {
        let mut ordering = Vec::with_capacity(self.num_blocks());
        let mut finished: FxHashSet<BlockId> = FxHashSet::default();

        for &block in self.blocks.keys() {
            if finished.contains(&block) {
                continue;
            }
            cfg_assert!(
                self,
                !self.starts_with_move_result(block),
                "{block} starts with a move result but no predecessor pulled it in"
            );
            ordering.push(block);
            finished.insert(block);

            // Chains of blocks that all start with move-results stay glued to
            // their producers.
            let mut goto_edge = self.get_succ_edge_of_type(block, EdgeType::Goto);
            while let Some(e) = goto_edge {
                let goto_block = self.edge_ref(e).target();
                cfg_assert!(
                    self,
                    self.blocks.contains_key(&goto_block),
                    "bogus block reference {} -> {goto_block}",
                    self.edge_ref(e).src()
                );
                if self.starts_with_move_result(goto_block) && !finished.contains(&goto_block) {
                    ordering.push(goto_block);
                    finished.insert(goto_block);
                    goto_edge = self.get_succ_edge_of_type(goto_block, EdgeType::Goto);
                } else {
                    goto_edge = None;
                }
            }
        }
        cfg_assert!(
            self,
            ordering.len() == self.blocks.len(),
            "ordering covered {} of {} blocks",
            ordering.len(),
            self.blocks.len()
        );
        ordering
    }

    /// Materializes branch information as entries again: a target marker at the
    /// head of every branch-edge target, and a synthetic goto plus target for
    /// every goto edge whose target does not come next in the layout.
    fn insert_branches_and_targets(&mut self, ordering: &[BlockId]) {
        for (i, &block) in ordering.iter().enumerate() {
            let succs = self.block_ref(block).succs.clone();
            for e in succs {
                match self.edge_ref(e).ty() {
                    EdgeType::Branch => {
                        let branch_it = self.get_conditional_branch(block);
                        cfg_assert!(
                            self,
                            branch_it.is_some(),
                            "block {block} has branch edges but no conditional branch"
                        );
                        let edge = self.edge_ref(e);
                        let case_key = edge.kind().case_key();
                        let target_block = edge.target();
                        self.push_front_item(
                            target_block,
                            Item::Target(BranchTarget {
                                src: branch_it.unwrap(),
                                case_key,
                            }),
                        );
                    }
                    EdgeType::Goto => {
                        let target_block = self.edge_ref(e).target();
                        if ordering.get(i + 1) == Some(&target_block) {
                            // Falls through; no goto needed.
                            continue;
                        }
                        let goto_item =
                            self.push_back_item(block, Item::Opcode(Instruction::new(Opcode::Goto)));
                        self.push_front_item(
                            target_block,
                            Item::Target(BranchTarget {
                                src: goto_item,
                                case_key: None,
                            }),
                        );
                    }
                    EdgeType::Throw | EdgeType::Ghost => {}
                }
            }
        }
    }

    /// Re-derives try regions from throw edges and emits their markers.
    ///
    /// Walking the layout, each block's handler chain is materialized (or shared)
    /// by [`create_catch`](Self::create_catch). A block without throws that
    /// cannot throw and is not itself a handler extends the active region, which
    /// merges adjacent regions with identical handler lists. At every region
    /// change the outgoing region gets its try-end and the incoming one its
    /// try-start.
    fn insert_try_catch_markers(&mut self, ordering: &[BlockId]) {
        let mut catch_to_containing_block: FxHashMap<ItemId, BlockId> = FxHashMap::default();
        let mut prev: Option<BlockId> = None;
        let mut active_catch: Option<ItemId> = None;

        for &block in ordering {
            let new_catch = self.create_catch(block, &mut catch_to_containing_block);

            if new_catch.is_none() && self.cannot_throw(block) && !self.is_catch(block) {
                // Merge blocks that cannot throw into the previous try region to
                // generate fewer regions. Handler blocks of the region are
                // excluded: a region must never enclose its own catch.
                prev = Some(block);
                continue;
            }

            if active_catch != new_catch {
                // When regions change between two blocks, the try-end comes
                // first in the stream, then the try-start. The start is inserted
                // first because insertion at a shared point lands in reverse.
                if let Some(catch) = new_catch {
                    self.insert_try_marker_between(
                        prev,
                        TryMarker {
                            kind: TryKind::Start,
                            catch_start: catch,
                        },
                        block,
                    );
                }
                if let Some(catch) = active_catch {
                    self.insert_try_marker_between(
                        prev,
                        TryMarker {
                            kind: TryKind::End,
                            catch_start: catch,
                        },
                        block,
                    );
                }
                active_catch = new_catch;
            }
            prev = Some(block);
        }

        if let Some(catch) = active_catch {
            // The last region is still open; close it at the very end.
            let last = *ordering.last().expect("ordering is non-empty");
            self.push_back_item(
                last,
                Item::Try(TryMarker {
                    kind: TryKind::End,
                    catch_start: catch,
                }),
            );
        }
    }

    /// Places a try marker at the seam between `prev` and `block`.
    ///
    /// A marker never lands between an instruction and its
    /// `move-result-pseudo`: if `block` begins with one, the marker goes right
    /// after it. A try-start at the entry block goes after the parameter
    /// loads; any other try-start goes at the block head, and a try-end at the
    /// tail of `prev`.
    fn insert_try_marker_between(&mut self, prev: Option<BlockId>, marker: TryMarker, block: BlockId) {
        let first_insn = self.first_insn(block);
        let first_is_pseudo = first_insn.is_some_and(|id| {
            self.item(id)
                .insn()
                .is_some_and(|insn| insn.opcode.is_move_result_pseudo())
        });

        if first_is_pseudo {
            self.insert_after_item(block, first_insn.unwrap(), Item::Try(marker));
        } else if marker.kind == TryKind::Start {
            if prev.is_none() && block == self.entry {
                // Parameter loading instructions come before a try-start.
                let mut at = None;
                for (id, item) in self.block_items(block) {
                    match item.insn() {
                        Some(insn) if insn.opcode.is_load_param() => continue,
                        _ => {
                            at = Some(id);
                            break;
                        }
                    }
                }
                match at {
                    Some(id) => self.insert_before_item(block, id, Item::Try(marker)),
                    None => self.push_back_item(block, Item::Try(marker)),
                };
            } else {
                self.push_front_item(block, Item::Try(marker));
            }
        } else {
            self.push_back_item(
                prev.expect("a try-end closes a region some earlier block opened"),
                Item::Try(marker),
            );
        }
    }

    /// Materializes the catch chain for a block's throw edges and returns its
    /// head, or `None` for a block that cannot reach a handler.
    ///
    /// Chains are shared: if a handler block already carries a catch entry whose
    /// chain is equivalent to the remaining throws, that entry is reused instead
    /// of prepending a duplicate. The sharing is what guarantees that identical
    /// handler lists across adjacent blocks collapse into one try region.
    fn create_catch(
        &mut self,
        block: BlockId,
        catch_to_containing_block: &mut FxHashMap<ItemId, BlockId>,
    ) -> Option<ItemId> {
        let mut throws = self.get_succ_edges_of_type(block, EdgeType::Throw);
        if throws.is_empty() {
            return None;
        }
        throws.sort_by_key(|&e| self.edge_ref(e).kind().throw_index());
        self.add_catch(&throws, catch_to_containing_block)
    }

    /// Recurses through the sorted throw edges, reusing or prepending catch
    /// entries at the edge targets and linking their `next` pointers in index
    /// order.
    fn add_catch(
        &mut self,
        throws: &[EdgeId],
        catch_to_containing_block: &mut FxHashMap<ItemId, BlockId>,
    ) -> Option<ItemId> {
        let Some((&edge, rest)) = throws.split_first() else {
            return None;
        };
        let catch_block = self.edge_ref(edge).target();

        // Is there already a catch here whose chain is equivalent to what we
        // would create?
        for id in self.block_item_ids(catch_block) {
            if matches!(self.item(id), Item::Catch(_))
                && self.catch_chain_equivalent(id, throws, catch_to_containing_block)
            {
                return Some(id);
            }
        }

        let catch_type = self.edge_ref(edge).kind().catch_type();
        let new_catch = self.push_front_item(
            catch_block,
            Item::Catch(CatchMarker {
                catch_type,
                next: None,
            }),
        );
        catch_to_containing_block.insert(new_catch, catch_block);

        let next = self.add_catch(rest, catch_to_containing_block);
        if let Some(Item::Catch(marker)) = self.arena_mut().get_mut(new_catch) {
            marker.next = next;
        }
        Some(new_catch)
    }

    /// Follows the catch chain starting at `first` and checks it against the
    /// remaining throw edges: same catch types, same handler blocks, same order,
    /// same length.
    fn catch_chain_equivalent(
        &self,
        first: ItemId,
        throws: &[EdgeId],
        catch_to_containing_block: &FxHashMap<ItemId, BlockId>,
    ) -> bool {
        let mut entry = Some(first);
        let mut remaining = throws.iter();
        while let Some(id) = entry {
            let marker = match self.item(id) {
                Item::Catch(marker) => *marker,
                other => panic!("catch chain reaches non-catch entry {id}: {other}\n{self}"),
            };
            let Some(&e) = remaining.next() else {
                return false;
            };
            let edge = self.edge_ref(e);
            let Some(&containing) = catch_to_containing_block.get(&id) else {
                panic!("catch entry {id} was not emitted by this linearization\n{self}");
            };
            if marker.catch_type != edge.kind().catch_type() || containing != edge.target() {
                return false;
            }
            entry = marker.next;
        }
        remaining.next().is_none()
    }
}

#[cfg(test)]
mod tests {
    use crate::cfg::ControlFlowGraph;
    use crate::ir::{Item, Opcode, TryKind};
    use crate::test::ir;

    fn opcodes(list: &crate::ir::IrList) -> Vec<Opcode> {
        list.iter()
            .filter_map(|(_, item)| item.insn().map(|insn| insn.opcode))
            .collect()
    }

    #[test]
    fn test_straight_line_roundtrips_verbatim() {
        let cfg = ControlFlowGraph::from_ir(ir::straight_line(), 3).unwrap();
        let out = cfg.linearize();
        assert_eq!(
            opcodes(&out),
            vec![Opcode::Const, Opcode::Const, Opcode::Add, Opcode::Return]
        );
    }

    #[test]
    fn test_if_else_elides_fallthrough_goto() {
        let cfg = ControlFlowGraph::from_ir(ir::if_else(), 3).unwrap();
        let out = cfg.linearize();

        // One goto survives (the arm that skips over the other arm); the edge
        // whose target follows directly in layout order emits nothing.
        let gotos = opcodes(&out)
            .into_iter()
            .filter(|op| op.is_goto())
            .count();
        assert_eq!(gotos, 1);

        // Exactly two targets: the conditional branch's and the goto's.
        let targets = out.iter().filter(|(_, item)| item.is_target()).count();
        assert_eq!(targets, 2);
    }

    #[test]
    fn test_branch_targets_reference_their_branch() {
        let cfg = ControlFlowGraph::from_ir(ir::if_else(), 3).unwrap();
        let out = cfg.linearize();

        for (_, item) in out.iter() {
            if let Item::Target(target) = item {
                let src = out.get(target.src).expect("target source is live");
                assert!(src.insn().is_some_and(|insn| insn.opcode.is_branch()));
            }
        }
    }

    #[test]
    fn test_try_markers_are_recreated() {
        let cfg = ControlFlowGraph::from_ir(ir::try_catch_div(), 3).unwrap();
        let out = cfg.linearize();

        let mut starts = 0;
        let mut ends = 0;
        let mut catches = 0;
        let mut saw_div_between = false;
        let mut inside = false;
        for (_, item) in out.iter() {
            match item {
                Item::Try(marker) if marker.kind == TryKind::Start => {
                    starts += 1;
                    inside = true;
                }
                Item::Try(marker) if marker.kind == TryKind::End => {
                    ends += 1;
                    inside = false;
                }
                Item::Catch(marker) => {
                    catches += 1;
                    assert_eq!(marker.catch_type, Some(ir::ARITHMETIC_EXCEPTION));
                }
                Item::Opcode(insn) if insn.opcode == Opcode::Div => {
                    saw_div_between = inside;
                }
                _ => {}
            }
        }
        assert_eq!(starts, 1);
        assert_eq!(ends, 1);
        assert_eq!(catches, 1);
        assert!(saw_div_between, "the division must sit inside the try region");
    }

    #[test]
    fn test_switch_case_keys_are_restored() {
        let cfg = ControlFlowGraph::from_ir(ir::switch_two_cases(), 1).unwrap();
        let out = cfg.linearize();

        let mut keys: Vec<i32> = out
            .iter()
            .filter_map(|(_, item)| match item {
                Item::Target(target) => target.case_key,
                _ => None,
            })
            .collect();
        keys.sort_unstable();
        assert_eq!(keys, vec![0, 1]);
    }

    #[test]
    fn test_adjacent_blocks_share_one_try_region() {
        // Two consecutive throwing blocks with the same handler: one region,
        // not two.
        let cfg = ControlFlowGraph::from_ir(ir::two_divs_one_handler(), 4).unwrap();
        let out = cfg.linearize();

        let starts = out
            .iter()
            .filter(|(_, item)| item.is_try(TryKind::Start))
            .count();
        let ends = out
            .iter()
            .filter(|(_, item)| item.is_try(TryKind::End))
            .count();
        let catches = out.iter().filter(|(_, item)| item.is_catch()).count();
        assert_eq!(starts, 1);
        assert_eq!(ends, 1);
        assert_eq!(catches, 1);
    }

    #[test]
    fn test_move_result_pseudo_stays_adjacent() {
        let cfg = ControlFlowGraph::from_ir(ir::check_cast_in_try(), 2).unwrap();
        let out = cfg.linearize();

        // Wherever the check-cast ended up, the very next opcode entry must be
        // its move-result-pseudo, and no marker may sit between them.
        let items: Vec<&Item> = out.iter().map(|(_, item)| item).collect();
        let cast_pos = items
            .iter()
            .position(|item| item.insn().is_some_and(|i| i.opcode == Opcode::CheckCast))
            .expect("check-cast survives");
        assert!(items[cast_pos + 1]
            .insn()
            .is_some_and(|i| i.opcode.is_move_result_pseudo()));
    }
}
