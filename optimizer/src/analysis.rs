//! Ties the per-block local passes together into one function-wide
//! analysis: local CSE first (so every block's `Available` list reflects
//! in-block collapsing), then value numbers, `ExprResults`, `Gen`,
//! `NotKilled`, and the available-expressions dataflow. Rebuilt from
//! scratch at the top of every outer driver iteration.

use std::collections::HashMap;

use fixedbitset::FixedBitSet;
use ir::{BlockId, Function, VarId};

use crate::availability::Availability;
use crate::expression::Expression;
use crate::killset::calculate_kill_set;
use crate::local_cse::run_local_cse;

pub struct Analysis {
    pub vn: HashMap<Expression, usize>,
    pub results: HashMap<Expression, Vec<VarId>>,
    pub gen: HashMap<BlockId, FixedBitSet>,
    pub not_killed: HashMap<BlockId, FixedBitSet>,
    pub avail_in: HashMap<BlockId, FixedBitSet>,
    pub avail_out: HashMap<BlockId, FixedBitSet>,
    next_var: usize,
    pub local_cse_removed: usize,
}

impl Analysis {
    pub fn run(function: &mut Function) -> Analysis {
        let mut vn: HashMap<Expression, usize> = HashMap::new();
        let mut results: HashMap<Expression, Vec<VarId>> = HashMap::new();
        let mut per_block_available: HashMap<BlockId, Vec<Expression>> = HashMap::new();
        let mut local_cse_removed = 0usize;

        for block in function.block_ids() {
            let local = run_local_cse(function, block);
            local_cse_removed += local.removed;
            for expr in &local.available {
                if !vn.contains_key(expr) {
                    vn.insert(expr.clone(), vn.len());
                }
                results.entry(expr.clone()).or_default().push(expr.defining_value);
            }
            per_block_available.insert(block, local.available);
        }

        let n = vn.len();
        let mut gen: HashMap<BlockId, FixedBitSet> = HashMap::new();
        for (block, available) in &per_block_available {
            let mut bits = FixedBitSet::with_capacity(n);
            for expr in available {
                bits.insert(vn[expr]);
            }
            gen.insert(*block, bits);
        }

        let mut not_killed: HashMap<BlockId, FixedBitSet> = HashMap::new();
        for block in function.block_ids() {
            not_killed.insert(block, calculate_kill_set(function, block, &vn, &results, n));
        }

        let Availability { avail_in, avail_out } = Availability::compute(function, n, &gen, &not_killed);

        tracing::debug!(
            local_cse_removed,
            distinct_expressions = n,
            "global analysis rebuilt"
        );

        let next_var = function.max_var_id() + 1;
        Analysis {
            vn,
            results,
            gen,
            not_killed,
            avail_in,
            avail_out,
            next_var,
            local_cse_removed,
        }
    }

    /// Mint a fresh `VarId` unused anywhere in the function being
    /// rewritten — for a newly synthesized join.
    pub fn fresh_var(&mut self) -> VarId {
        let v = VarId(self.next_var);
        self.next_var += 1;
        v
    }

    pub fn value_number(&self, expr: &Expression) -> Option<usize> {
        self.vn.get(expr).copied()
    }

    pub fn remove_result(&mut self, expr: &Expression, var: VarId) {
        if let Some(defs) = self.results.get_mut(expr) {
            defs.retain(|v| *v != var);
        }
    }
}
