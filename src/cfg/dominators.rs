//! Immediate-dominator computation.
//!
//! Uses the iterative algorithm of Cooper, Harvey, and Kennedy ("A Simple, Fast
//! Dominance Algorithm"): a postorder over the blocks reachable from the entry,
//! then repeated intersection of predecessor dominators in reverse postorder
//! until a fixed point. Blocks unreachable from the entry are not represented in
//! the result.

use rustc_hash::{FxHashMap, FxHashSet};

use crate::cfg::{BlockId, ControlFlowGraph};

/// Dominator information for one block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DominatorInfo {
    /// The immediate dominator. The entry block dominates itself.
    pub dom: BlockId,
    /// The block's index in the postorder used by the computation.
    pub postorder: usize,
}

/// The result of [`ControlFlowGraph::immediate_dominators`].
///
/// # Examples
///
/// ```rust,ignore
/// let doms = cfg.immediate_dominators();
/// let entry = cfg.entry_block();
/// assert_eq!(doms.immediate_dominator(entry), Some(entry));
/// assert!(doms.dominates(entry, some_block));
/// ```
#[derive(Debug, Clone)]
pub struct Dominators {
    entry: BlockId,
    info: FxHashMap<BlockId, DominatorInfo>,
}

impl Dominators {
    /// Returns the full dominator record of a block, or `None` if the block is
    /// unreachable from the entry.
    #[must_use]
    pub fn get(&self, block: BlockId) -> Option<&DominatorInfo> {
        self.info.get(&block)
    }

    /// Returns the immediate dominator of a block, or `None` if the block is
    /// unreachable from the entry. The entry block's immediate dominator is
    /// itself.
    #[must_use]
    pub fn immediate_dominator(&self, block: BlockId) -> Option<BlockId> {
        self.info.get(&block).map(|info| info.dom)
    }

    /// Returns the block's index in the postorder underlying the computation.
    #[must_use]
    pub fn postorder_index(&self, block: BlockId) -> Option<usize> {
        self.info.get(&block).map(|info| info.postorder)
    }

    /// Checks whether `a` dominates `b`: every path from the entry to `b` passes
    /// through `a`. A block dominates itself. Unreachable blocks dominate
    /// nothing and are dominated by nothing.
    #[must_use]
    pub fn dominates(&self, a: BlockId, b: BlockId) -> bool {
        let mut current = b;
        loop {
            if current == a {
                return true;
            }
            if current == self.entry {
                return false;
            }
            match self.info.get(&current) {
                Some(info) => current = info.dom,
                None => return false,
            }
        }
    }
}

impl ControlFlowGraph<'_> {
    /// Computes immediate dominators for every block reachable from the entry.
    #[must_use]
    pub fn immediate_dominators(&self) -> Dominators {
        let postorder_blocks = self.postorder_sort();
        let mut postorder_index: FxHashMap<BlockId, usize> = FxHashMap::default();
        for (i, &block) in postorder_blocks.iter().enumerate() {
            postorder_index.insert(block, i);
        }

        // The entry dominates itself; everything else starts unprocessed.
        let mut idom: FxHashMap<BlockId, BlockId> = FxHashMap::default();
        idom.insert(self.entry, self.entry);

        let mut changed = true;
        while changed {
            changed = false;
            // Traverse blocks in reverse postorder.
            for &block in postorder_blocks.iter().rev() {
                if block == self.entry {
                    continue;
                }
                // Predecessors that were processed already and are reachable.
                let preds: Vec<BlockId> = self
                    .block_ref(block)
                    .preds()
                    .iter()
                    .map(|&e| self.edge_ref(e).src())
                    .filter(|pred| idom.contains_key(pred))
                    .collect();
                let Some(&first) = preds.first() else {
                    continue;
                };
                let mut new_idom = first;
                for &pred in &preds[1..] {
                    new_idom = Self::idom_intersect(&idom, &postorder_index, new_idom, pred);
                }
                if idom.get(&block) != Some(&new_idom) {
                    idom.insert(block, new_idom);
                    changed = true;
                }
            }
        }

        let info = idom
            .into_iter()
            .map(|(block, dom)| {
                (
                    block,
                    DominatorInfo {
                        dom,
                        postorder: postorder_index[&block],
                    },
                )
            })
            .collect();
        Dominators {
            entry: self.entry,
            info,
        }
    }

    /// Walks both fingers up the dominator tree until they meet, comparing by
    /// postorder index.
    fn idom_intersect(
        idom: &FxHashMap<BlockId, BlockId>,
        postorder_index: &FxHashMap<BlockId, usize>,
        block1: BlockId,
        block2: BlockId,
    ) -> BlockId {
        let mut finger1 = block1;
        let mut finger2 = block2;
        while finger1 != finger2 {
            while postorder_index[&finger1] < postorder_index[&finger2] {
                finger1 = idom[&finger1];
            }
            while postorder_index[&finger2] < postorder_index[&finger1] {
                finger2 = idom[&finger2];
            }
        }
        finger1
    }

    /// Produces a postorder over the blocks reachable from the entry, iteratively.
    pub(crate) fn postorder_sort(&self) -> Vec<BlockId> {
        let mut postorder = Vec::with_capacity(self.num_blocks());
        let mut stack = vec![self.entry];
        let mut visited: FxHashSet<BlockId> = FxHashSet::default();
        while let Some(&curr) = stack.last() {
            visited.insert(curr);
            let mut all_succs_visited = true;
            for &e in self.block_ref(curr).succs() {
                let target = self.edge_ref(e).target();
                if !visited.contains(&target) {
                    stack.push(target);
                    all_succs_visited = false;
                    break;
                }
            }
            if all_succs_visited {
                postorder.push(curr);
                stack.pop();
            }
        }
        postorder
    }
}
