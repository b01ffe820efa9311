//! The available-expressions dataflow: a classic forward "all paths"
//! analysis over the per-block `Gen`/`NotKilled` bitsets built by
//! `local_cse` and `killset`.

use std::collections::HashMap;

use fixedbitset::FixedBitSet;
use ir::{BlockId, Function};

pub struct Availability {
    pub avail_in: HashMap<BlockId, FixedBitSet>,
    pub avail_out: HashMap<BlockId, FixedBitSet>,
}

impl Availability {
    /// Meet is intersection over predecessors; transfer is
    /// `AvailOUT[B] = (AvailIN[B] & NotKilled[B]) | Gen[B]`. The entry
    /// block's `AvailIN` is fixed at all-zero (nothing available before
    /// the function starts); every other block starts at all-ones, the
    /// identity for intersection, standing in for a virtual predecessor
    /// whose `AvailOUT` is empty.
    pub fn compute(
        function: &Function,
        n: usize,
        gen: &HashMap<BlockId, FixedBitSet>,
        not_killed: &HashMap<BlockId, FixedBitSet>,
    ) -> Availability {
        let all_ones = || {
            let mut bits = FixedBitSet::with_capacity(n);
            bits.insert_range(..);
            bits
        };

        let mut avail_in: HashMap<BlockId, FixedBitSet> =
            function.block_ids().into_iter().map(|b| (b, all_ones())).collect();
        let mut avail_out: HashMap<BlockId, FixedBitSet> =
            function.block_ids().into_iter().map(|b| (b, all_ones())).collect();
        avail_in.insert(function.entry, FixedBitSet::with_capacity(n));

        let mut changed = true;
        let mut iterations = 0u32;
        while changed {
            changed = false;
            iterations += 1;
            for block in function.block_ids() {
                if block != function.entry {
                    let mut incoming = all_ones();
                    for pred in function.predecessors(block) {
                        incoming.intersect_with(&avail_out[&pred]);
                    }
                    avail_in.insert(block, incoming);
                }

                let mut new_out = avail_in[&block].clone();
                new_out.intersect_with(&not_killed[&block]);
                new_out.union_with(&gen[&block]);

                if new_out != avail_out[&block] {
                    avail_out.insert(block, new_out);
                    changed = true;
                }
            }
        }
        tracing::trace!(iterations, blocks = n, "available-expressions dataflow converged");

        Availability { avail_in, avail_out }
    }
}
