//! Construction of control flow graphs from the linear IR.
//!
//! Building happens in phases: a single pass over the stream finds block
//! boundaries and records where branch targets and catch chains live; the blocks
//! are then connected with typed edges; try regions become throw edges; and the
//! editable form finally drops every marker whose information now lives on the
//! edges, simplifies itself, and verifies its invariants.

use rustc_hash::FxHashMap;
use tracing::trace;

use crate::cfg::{BlockBody, BlockId, ControlFlowGraph, EdgeKind, IrSource};
use crate::ir::{CaseKey, IrList, Item, ItemId, ItemList, TryKind};
use crate::Result;

/// Everything the boundary walk records for the later phases.
#[derive(Default)]
struct BuildState {
    /// Branch instruction entry -> blocks holding its targets, in stream order.
    branch_to_targets: FxHashMap<ItemId, Vec<BlockId>>,
    /// Try-end markers with their containing block, in stream order.
    try_ends: Vec<(ItemId, BlockId)>,
    /// Catch marker entry -> block containing it.
    try_catches: FxHashMap<ItemId, BlockId>,
    /// Per block, the entry after its last one (`None` = end of stream).
    boundaries: Vec<(BlockId, Option<ItemId>)>,
}

impl ControlFlowGraph<'static> {
    /// Builds an editable control flow graph, taking ownership of the IR.
    ///
    /// The returned graph owns every entry; jump information is carried entirely
    /// by edges (goto opcodes and target/try/catch markers are consumed), the
    /// graph is simplified, and its register width is recomputed.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Empty`](crate::Error::Empty) for an empty list and
    /// [`Error::Malformed`](crate::Error::Malformed) for structurally broken
    /// input (a try-start away from its block head, a target with no matching
    /// branch, a try-end without a reachable region start).
    pub fn from_ir(ir: IrList, registers_size: u16) -> Result<Self> {
        if ir.is_empty() {
            return Err(crate::Error::Empty);
        }
        let (arena, items) = ir.into_parts();
        let mut cfg = ControlFlowGraph::with_source(IrSource::Owned(arena), registers_size, true);
        let state = cfg.find_block_boundaries(items.front())?;
        cfg.fill_blocks(items, &state);
        cfg.connect_blocks(&state)?;
        cfg.add_catch_edges(&state)?;
        cfg.remove_try_catch_markers();
        trace!("before simplify:\n{cfg}");
        cfg.simplify();
        trace!("after simplify:\n{cfg}");
        cfg.sanity_check();
        Ok(cfg)
    }
}

impl<'a> ControlFlowGraph<'a> {
    /// Builds a read-only view whose blocks address ranges of `ir`.
    ///
    /// The view exposes the same block and edge structure as the editable form,
    /// except that markers stay in place and switch case keys stay on their
    /// target entries instead of migrating onto edges.
    ///
    /// # Errors
    ///
    /// Same conditions as [`from_ir`](ControlFlowGraph::from_ir).
    pub fn view(ir: &'a IrList, registers_size: u16) -> Result<Self> {
        if ir.is_empty() {
            return Err(crate::Error::Empty);
        }
        let mut cfg = ControlFlowGraph::with_source(IrSource::Borrowed(ir), registers_size, false);
        let state = cfg.find_block_boundaries(ir.front())?;
        cfg.connect_blocks(&state)?;
        cfg.add_catch_edges(&state)?;
        cfg.remove_unreachable_succ_edges();
        cfg.sanity_check();
        Ok(cfg)
    }

    /// Returns `true` if `it` must be the last entry of its block.
    fn end_of_block(&self, it: ItemId, next: Option<ItemId>, in_try: bool) -> bool {
        let Some(next_id) = next else {
            return true;
        };
        let item = self.item(it);
        let next_item = self.item(next_id);

        // End the block before the first target in a contiguous sequence of targets.
        if next_item.is_target() && !item.is_target() {
            return true;
        }

        // End the block before the first catch marker in a contiguous sequence of
        // catch markers.
        if next_item.is_catch() && !item.is_catch() {
            return true;
        }

        // End the block before a try-start and after a try-end.
        if next_item.is_try(TryKind::Start) || item.is_try(TryKind::End) {
            return true;
        }

        if in_try && item.insn().is_some_and(|insn| insn.opcode.may_throw()) {
            return true;
        }
        let Some(insn) = item.insn() else {
            return false;
        };
        insn.opcode.is_branch() || insn.opcode.is_return() || insn.opcode.is_throw()
    }

    /// Walks the stream once, creating blocks at every boundary and recording
    /// targets, try-ends, and catch markers along the way.
    fn find_block_boundaries(&mut self, head: Option<ItemId>) -> Result<BuildState> {
        let mut state = BuildState::default();
        let mut block_first = head;
        let mut block = self.new_boundary_block(block_first);
        self.entry = block;

        let mut in_try = false;
        let mut it = head;
        while let Some(current) = it {
            let next = self.arena().next(current);

            match self.item(current) {
                Item::Try(marker) => match marker.kind {
                    TryKind::Start => {
                        // Try-starts only make sense at the head of a block.
                        if Some(current) != block_first {
                            return Err(malformed_error!(
                                "try-start at {current} is not at the head of block {block}"
                            ));
                        }
                        in_try = true;
                    }
                    TryKind::End => {
                        state.try_ends.push((current, block));
                        in_try = false;
                    }
                },
                Item::Catch(_) => {
                    state.try_catches.insert(current, block);
                }
                Item::Target(target) => {
                    state.branch_to_targets.entry(target.src).or_default().push(block);
                }
                _ => {}
            }

            if !self.end_of_block(current, next, in_try) {
                it = next;
                continue;
            }

            // End the current block. Editable bodies are filled by splicing once
            // all boundaries are known; view bodies get their range closed here.
            state.boundaries.push((block, next));
            if !self.editable {
                if let BlockBody::Range { end, .. } = &mut self.block_mut(block).body {
                    *end = next;
                }
            }

            if next.is_none() {
                break;
            }

            // Start a new block at the next entry.
            block_first = next;
            block = self.new_boundary_block(block_first);
            it = next;
        }
        trace!("build: boundaries found, {} blocks", state.boundaries.len());
        Ok(state)
    }

    fn new_boundary_block(&mut self, first: Option<ItemId>) -> BlockId {
        if self.editable {
            self.new_block(BlockBody::Owned(ItemList::default()))
        } else {
            self.new_block(BlockBody::Range {
                begin: first,
                end: None,
            })
        }
    }

    /// Moves the entries out of the root chain into the blocks, based on the
    /// recorded boundaries. Editable only; the graph owns the entries afterwards.
    fn fill_blocks(&mut self, mut root: ItemList, state: &BuildState) {
        assert!(self.editable);
        for &(block, end) in &state.boundaries {
            let (arena, blocks) = self.edit();
            let segment = root.split_before(arena, end);
            blocks
                .get_mut(&block)
                .expect("boundary block is in the graph")
                .body = BlockBody::Owned(segment);
            cfg_assert!(self, !self.is_block_empty(block), "block {block} is empty");
        }
        trace!("build: splicing finished");
    }

    /// Links the blocks together with typed edges. In editable mode this also
    /// deletes goto opcodes and target markers, migrating switch case keys onto
    /// the edges.
    fn connect_blocks(&mut self, state: &BuildState) -> Result<()> {
        let ids = self.block_ids();
        for (i, &b) in ids.iter().enumerate() {
            // Set an outgoing edge if the last entry falls through.
            let mut fallthrough = true;
            let last = self.last_item(b);
            let last_op = last.and_then(|id| self.item(id).insn().map(|insn| insn.opcode));

            if let (Some(last_id), Some(op)) = (last, last_op) {
                if op.is_branch() {
                    fallthrough = !op.is_goto();
                    let target_blocks = state
                        .branch_to_targets
                        .get(&last_id)
                        .cloned()
                        .unwrap_or_default();

                    for target_block in target_blocks {
                        if self.editable {
                            // The branch information moves onto the edges; the
                            // target entries are no longer needed.
                            let case_key =
                                self.remove_first_matching_target(target_block, last_id)?;
                            if let Some(key) = case_key {
                                self.add_edge(
                                    b,
                                    target_block,
                                    EdgeKind::Branch {
                                        case_key: Some(key),
                                    },
                                );
                                continue;
                            }
                        }
                        let kind = if op.is_goto() {
                            EdgeKind::Goto
                        } else {
                            EdgeKind::Branch { case_key: None }
                        };
                        self.add_edge(b, target_block, kind);
                    }

                    if self.editable && op.is_goto() {
                        // The edges fully encode unconditional jumps.
                        self.remove_item(b, last_id);
                    }
                } else if op.is_return() || op.is_throw() {
                    fallthrough = false;
                }
            }

            if fallthrough && i + 1 < ids.len() {
                trace!("adding fallthrough goto {b} -> {}", ids[i + 1]);
                self.add_edge(b, ids[i + 1], EdgeKind::Goto);
            }
        }
        trace!("build: edges added");
        Ok(())
    }

    /// Removes the first target entry of `block` that references `branch`,
    /// returning its case key when it was a switch case.
    ///
    /// Multiple switch cases can share one target block; any matching entry
    /// serves, since the entries only differ in their case key and the keys are
    /// consumed one call at a time, in stream order.
    fn remove_first_matching_target(
        &mut self,
        block: BlockId,
        branch: ItemId,
    ) -> Result<Option<CaseKey>> {
        for id in self.block_item_ids(block) {
            let Item::Target(target) = self.item(id) else {
                continue;
            };
            if target.src != branch {
                continue;
            }
            let case_key = target.case_key;
            if case_key.is_some() {
                let is_switch = self
                    .item(branch)
                    .insn()
                    .is_some_and(|insn| insn.opcode.is_switch());
                if !is_switch {
                    return Err(malformed_error!(
                        "multi-target in block {block} references a non-switch branch"
                    ));
                }
            }
            self.remove_item(block, id);
            return Ok(case_key);
        }
        Err(malformed_error!(
            "block {block} has no targets matching the branch at {branch}"
        ))
    }

    /// Installs one throw edge per catch handler for every potentially-throwing
    /// block of every try region.
    ///
    /// Each try-end is walked backwards in block-id order until the block opening
    /// the region is found; a try region always consists of consecutively
    /// numbered blocks because regions are contiguous in the stream and blocks
    /// are created in stream order.
    fn add_catch_edges(&mut self, state: &BuildState) -> Result<()> {
        for &(try_end, try_end_block) in &state.try_ends {
            let catch_start = match self.item(try_end) {
                Item::Try(marker) => marker.catch_start,
                _ => unreachable!("try_ends holds try markers"),
            };

            let mut bid = try_end_block.index();
            loop {
                let block = BlockId::new(bid);
                if self.ends_with_may_throw(block) {
                    let mut index = 0u32;
                    let mut entry = Some(catch_start);
                    while let Some(catch_id) = entry {
                        let marker = match self.item(catch_id) {
                            Item::Catch(marker) => *marker,
                            _ => {
                                return Err(malformed_error!(
                                    "catch chain of try-end at {try_end} reaches non-catch entry {catch_id}"
                                ))
                            }
                        };
                        let Some(&catch_block) = state.try_catches.get(&catch_id) else {
                            return Err(malformed_error!(
                                "catch entry {catch_id} is not inside any block"
                            ));
                        };
                        // One throw edge per handler, in chain order.
                        self.add_edge(
                            block,
                            catch_block,
                            EdgeKind::Throw {
                                catch_type: marker.catch_type,
                                index,
                            },
                        );
                        index += 1;
                        entry = marker.next;
                    }
                }

                let first_try = self.block_items(block).next().and_then(|(_, item)| match item {
                    Item::Try(marker) => Some(*marker),
                    _ => None,
                });
                if let Some(marker) = first_try {
                    if marker.kind == TryKind::Start {
                        if marker.catch_start != catch_start {
                            return Err(malformed_error!(
                                "try-start of block {block} belongs to a different region than the try-end at {try_end}"
                            ));
                        }
                        break;
                    }
                }
                if bid == 0 {
                    return Err(malformed_error!("no beginning of try region found"));
                }
                bid -= 1;
            }
        }
        trace!("build: catch edges added");
        Ok(())
    }

    /// Deletes every try and catch marker. Editable only: the markers' information
    /// now lives on throw edges, and blocks may be reordered freely afterwards.
    fn remove_try_catch_markers(&mut self) {
        assert!(self.editable);
        for block in self.block_ids() {
            let doomed: Vec<ItemId> = self
                .block_items(block)
                .filter(|(_, item)| matches!(item, Item::Try(_) | Item::Catch(_)))
                .map(|(id, _)| id)
                .collect();
            for id in doomed {
                self.remove_item(block, id);
            }
        }
    }

    /// Removes the successor edges of every block unreachable from the entry.
    pub(crate) fn remove_unreachable_succ_edges(&mut self) {
        let visited = self.reachable_from_entry();
        for block in self.block_ids() {
            if visited.contains(&block) {
                continue;
            }
            trace!("build: removing succ edges from unreachable block {block}");
            self.remove_succ_edges(block);
        }
    }
}
