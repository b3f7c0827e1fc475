//! Exit-block analysis.
//!
//! Finding the exits of a method is not as simple as collecting return and throw
//! blocks: an infinite loop is a valid way to end bytecode too. The analysis
//! therefore finds strongly connected components and treats every SCC that no
//! edge leaves as an exit; the traversal head of such an SCC stands in for it.
//! When more than one candidate exists, a synthetic ghost block gives analyses a
//! single well-defined exit.

use rustc_hash::FxHashMap;

use crate::cfg::{BlockBody, BlockId, Branchingness, ControlFlowGraph, EdgeKind, EdgeType};

/// Sentinel depth-first number for blocks whose SCC is already complete.
const VISITED: u32 = u32::MAX;

/// One in-flight node of the iterative SCC traversal.
struct Frame {
    block: BlockId,
    succs: Vec<BlockId>,
    next_succ: usize,
    /// Lowest depth-first number reachable from this subtree.
    head: u32,
    /// Whether any vertex of the SCC being built has an edge leaving it.
    has_exit: bool,
}

impl ControlFlowGraph<'_> {
    /// Computes (or recomputes) the exit block.
    ///
    /// Every SCC without a leaving edge contributes its traversal head as an exit
    /// candidate. A single candidate becomes the exit block directly; multiple
    /// candidates are tied together through a fresh ghost block that each
    /// candidate reaches by a ghost edge. The ghost block never has outgoing
    /// edges.
    ///
    /// Recomputing on a graph that already synthesized a ghost exit first removes
    /// the ghost. A read-only view with a computed exit keeps it as is.
    pub fn calculate_exit_block(&mut self) {
        if let Some(exit) = self.exit {
            if !self.editable {
                return;
            }
            if self.get_pred_edge_of_type(exit, EdgeType::Ghost).is_some() {
                // Clear the old ghost before recomputing the exit of a graph
                // with multiple exit points.
                self.remove_block(exit);
                self.exit = None;
            }
        }

        let exit_blocks = self.find_exit_candidates();
        if exit_blocks.len() == 1 {
            self.exit = Some(exit_blocks[0]);
        } else {
            let ghost = if self.editable {
                self.create_block()
            } else {
                self.new_block(BlockBody::Range {
                    begin: None,
                    end: None,
                })
            };
            for block in exit_blocks {
                self.add_edge(block, ghost, EdgeKind::Ghost);
            }
            self.exit = Some(ghost);
        }
    }

    /// Returns the blocks where the method actually ends.
    ///
    /// With `include_infinite_loops`, [`calculate_exit_block`](Self::calculate_exit_block)
    /// must have run: the result is either the ghost block's predecessors (every
    /// exit candidate, infinite loop heads included) or the single exit itself.
    /// Without it, the result is every block whose branchingness is a return or a
    /// throw.
    #[must_use]
    pub fn real_exit_blocks(&self, include_infinite_loops: bool) -> Vec<BlockId> {
        let mut result = Vec::new();
        if let (Some(exit), true) = (self.exit, include_infinite_loops) {
            let ghosts = self.get_pred_edges_of_type(exit, EdgeType::Ghost);
            if !ghosts.is_empty() {
                // The exit is a ghost; the real exit points are its sources.
                for e in ghosts {
                    result.push(self.edge_ref(e).src());
                }
            } else {
                // A single exit point; no ghost block was needed.
                result.push(exit);
            }
        } else {
            cfg_assert!(
                self,
                !include_infinite_loops,
                "call calculate_exit_block first"
            );
            for &block in self.blocks.keys() {
                let b = self.branchingness(block);
                if b == Branchingness::Return || b == Branchingness::Throw {
                    result.push(block);
                }
            }
        }
        result
    }

    /// Tarjan's SCC algorithm with an explicit frame stack, threading a
    /// `has_exit` flag through the traversal to detect SCCs no edge leaves.
    ///
    /// Depth-first numbers double as state: 0 is unvisited, [`VISITED`] marks a
    /// block whose SCC is complete. An edge into a completed SCC is an exit for
    /// the SCC being built; an edge within the current SCC is not. When an SCC
    /// without exits completes, its head becomes an exit candidate and the SCC
    /// counts as having an exit from then on, since control that enters it ends
    /// there.
    fn find_exit_candidates(&self) -> Vec<BlockId> {
        let mut dfns: FxHashMap<BlockId, u32> = FxHashMap::default();
        let mut next_dfn: u32 = 0;
        let mut scc_stack: Vec<BlockId> = Vec::new();
        let mut frames: Vec<Frame> = Vec::new();
        let mut exit_blocks: Vec<BlockId> = Vec::new();

        self.push_frame(&mut frames, &mut scc_stack, &mut dfns, &mut next_dfn, self.entry);

        while !frames.is_empty() {
            let mut descend: Option<BlockId> = None;
            let mut exhausted = false;
            {
                let top = frames.last_mut().expect("loop condition");
                if top.next_succ < top.succs.len() {
                    let succ = top.succs[top.next_succ];
                    top.next_succ += 1;
                    let succ_dfn = dfns.get(&succ).copied().unwrap_or(0);
                    if succ_dfn == 0 {
                        descend = Some(succ);
                    } else {
                        top.has_exit |= succ_dfn == VISITED;
                        top.head = top.head.min(succ_dfn);
                    }
                } else {
                    exhausted = true;
                }
            }

            if let Some(succ) = descend {
                self.push_frame(&mut frames, &mut scc_stack, &mut dfns, &mut next_dfn, succ);
                continue;
            }
            if !exhausted {
                continue;
            }

            let frame = frames.pop().expect("loop condition");
            let mut has_exit = frame.has_exit;
            if frame.head == dfns[&frame.block] {
                // frame.block heads a now-complete SCC.
                if !has_exit {
                    exit_blocks.push(frame.block);
                    has_exit = true;
                }
                loop {
                    let top = scc_stack.pop().expect("the SCC stack holds the component");
                    dfns.insert(top, VISITED);
                    if top == frame.block {
                        break;
                    }
                }
            }
            if let Some(parent) = frames.last_mut() {
                parent.head = parent.head.min(frame.head);
                parent.has_exit |= has_exit;
            }
        }

        exit_blocks
    }

    fn push_frame(
        &self,
        frames: &mut Vec<Frame>,
        scc_stack: &mut Vec<BlockId>,
        dfns: &mut FxHashMap<BlockId, u32>,
        next_dfn: &mut u32,
        block: BlockId,
    ) {
        *next_dfn += 1;
        dfns.insert(block, *next_dfn);
        scc_stack.push(block);
        let succs = self
            .block_ref(block)
            .succs()
            .iter()
            .map(|&e| self.edge_ref(e).target())
            .collect();
        frames.push(Frame {
            block,
            succs,
            next_succ: 0,
            head: *next_dfn,
            has_exit: false,
        });
    }
}
