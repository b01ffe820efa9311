//! Per-block kill-set calculation: `NotKilled[B]`, the complement of
//! "killed in B", so the dataflow transfer function in `availability` can
//! stay a pure bitwise AND.

use std::collections::{HashMap, HashSet};

use fixedbitset::FixedBitSet;
use ir::{BlockId, Function, Instruction, Operand, VarId};

use crate::expression::Expression;

/// `NotKilled[block]`: bit `vn` is set iff no store in `block`
/// transitively invalidates the expression with that value number.
///
/// Starts all-ones (nothing killed). Seeds `killed_values` with every
/// address stored to in `block`, then iterates to a fixed point: any
/// known expression with an operand in `killed_values` is killed, and
/// every instruction currently computing it is added to `killed_values`
/// in turn — a store to `@x` kills `load @x`, which kills anything that
/// reads that load's result. `killed_values` only grows, so this always
/// terminates.
pub fn calculate_kill_set(
    function: &Function,
    block: BlockId,
    vn: &HashMap<Expression, usize>,
    results: &HashMap<Expression, Vec<VarId>>,
    n: usize,
) -> FixedBitSet {
    let mut killed_values: HashSet<Operand> = HashSet::new();
    for inst in &function.block(block).instructions {
        if let Instruction::Store { address, .. } = inst {
            killed_values.insert(address.clone());
        }
    }

    let mut not_killed = FixedBitSet::with_capacity(n);
    not_killed.insert_range(..);

    let mut changed = true;
    while changed {
        changed = false;
        for (expr, &v) in vn.iter() {
            if !not_killed.contains(v) {
                continue;
            }
            if expr.operands.iter().any(|o| killed_values.contains(o)) {
                not_killed.set(v, false);
                changed = true;
                if let Some(defs) = results.get(expr) {
                    for def in defs {
                        killed_values.insert(Operand::Var(*def));
                    }
                }
            }
        }
    }
    not_killed
}

#[cfg(test)]
mod tests {
    use super::*;
    use ir::{BasicBlock, Terminator};
    use model::{BinaryOp, Type};

    #[test]
    fn store_clears_only_expressions_rooted_at_the_stored_address() {
        let addr = Operand::Global("x".into());
        let load = Instruction::Load {
            dest: VarId(1),
            result_type: Type::Int,
            address: addr.clone(),
        };
        let unrelated = Instruction::Binary {
            dest: VarId(2),
            op: BinaryOp::Add,
            result_type: Type::Int,
            left: Operand::Var(VarId(100)),
            right: Operand::Var(VarId(200)),
        };
        let function = Function {
            name: "f".into(),
            return_type: Type::Int,
            params: vec![],
            entry: BlockId(0),
            blocks: vec![BasicBlock {
                id: BlockId(0),
                instructions: vec![
                    load.clone(),
                    Instruction::Store {
                        address: addr,
                        value: Operand::Constant(0),
                    },
                ],
                terminator: Terminator::Return(None),
            }],
        };

        let load_expr = Expression::from_instruction(&load).unwrap();
        let unrelated_expr = Expression::from_instruction(&unrelated).unwrap();
        let vn: HashMap<Expression, usize> = [(load_expr.clone(), 0), (unrelated_expr.clone(), 1)].into_iter().collect();
        let results: HashMap<Expression, Vec<VarId>> =
            [(load_expr.clone(), vec![VarId(1)]), (unrelated_expr.clone(), vec![VarId(2)])]
                .into_iter()
                .collect();

        let not_killed = calculate_kill_set(&function, BlockId(0), &vn, &results, 2);
        assert!(!not_killed.contains(0), "the load rooted at @x must be killed");
        assert!(not_killed.contains(1), "an unrelated add must survive");
    }
}
