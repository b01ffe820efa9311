//! Dominator tree over a function's CFG, computed by the classic iterative
//! dataflow fixed point (each block's dominator set is the intersection of
//! its predecessors' dominator sets, plus itself) — the same shape as the
//! available-expressions dataflow in `optimizer::availability`, just over
//! `Dominates` instead of `Available`.

use fixedbitset::FixedBitSet;
use std::collections::HashMap;

use crate::types::{BlockId, Function};

/// `dominators[b]` is the set of blocks (as indices into `order`) that
/// dominate `b`, including `b` itself.
pub struct DominatorTree {
    order: Vec<BlockId>,
    index: HashMap<BlockId, usize>,
    dominators: Vec<FixedBitSet>,
}

impl DominatorTree {
    pub fn compute(function: &Function) -> DominatorTree {
        let order = function.block_ids();
        let n = order.len();
        let index: HashMap<BlockId, usize> = order.iter().enumerate().map(|(i, b)| (*b, i)).collect();
        let entry_idx = index[&function.entry];

        let mut dominators: Vec<FixedBitSet> = (0..n)
            .map(|i| {
                let mut set = FixedBitSet::with_capacity(n);
                if i == entry_idx {
                    set.insert(entry_idx);
                } else {
                    set.insert_range(..);
                }
                set
            })
            .collect();

        let preds: Vec<Vec<usize>> = order
            .iter()
            .map(|b| {
                function
                    .predecessors(*b)
                    .into_iter()
                    .filter_map(|p| index.get(&p).copied())
                    .collect()
            })
            .collect();

        let mut iterations = 0u32;
        loop {
            iterations += 1;
            let mut changed = false;
            for i in 0..n {
                if i == entry_idx {
                    continue;
                }
                if preds[i].is_empty() {
                    continue;
                }
                let mut new_set = dominators[preds[i][0]].clone();
                for &p in &preds[i][1..] {
                    new_set.intersect_with(&dominators[p]);
                }
                new_set.insert(i);
                if new_set != dominators[i] {
                    dominators[i] = new_set;
                    changed = true;
                }
            }
            if !changed {
                break;
            }
        }
        tracing::trace!(iterations, blocks = n, "dominator fixed point converged");

        DominatorTree {
            order,
            index,
            dominators,
        }
    }

    /// Does `a` dominate `b` (every path from the entry to `b` passes
    /// through `a`)? A block dominates itself.
    pub fn block_dominates(&self, a: BlockId, b: BlockId) -> bool {
        let (Some(&ai), Some(&bi)) = (self.index.get(&a), self.index.get(&b)) else {
            return false;
        };
        self.dominators[bi].contains(ai)
    }

    /// Does the instruction defining a value in `def_block` dominate
    /// `block`? This is block-level dominance, including the trivial
    /// same-block case (a block dominates itself) — matching LLVM's
    /// `dominates(Instruction*, BasicBlock*)`, which a freshly inserted
    /// join on a self-loop predecessor relies on: the join registers
    /// itself as a candidate for its own block before recursion reaches
    /// that same predecessor.
    pub fn instruction_dominates_block(&self, def_block: BlockId, block: BlockId) -> bool {
        self.block_dominates(def_block, block)
    }

    pub fn blocks(&self) -> &[BlockId] {
        &self.order
    }
}
