//! Single-block common subexpression elimination: `LocalCse` — the base
//! case the wider dataflow pass builds on. Replaces each re-occurring
//! expression in a block with the first occurrence's result and forgets
//! entries a store invalidates, so the surviving list (`Gen[B]` for the
//! caller) never contains anything killed before the block's end.

use ir::{BlockId, Function, Instruction, Operand, VarId};

use crate::expression::Expression;

/// What survived to the end of the block, in discovery order, plus how
/// many redundant instructions were deleted.
pub struct LocalCseResult {
    pub available: Vec<Expression>,
    pub removed: usize,
}

/// Run local CSE over one block, mutating `function` in place.
pub fn run_local_cse(function: &mut Function, block: BlockId) -> LocalCseResult {
    let instructions = function.block(block).instructions.clone();

    let mut available: Vec<Expression> = Vec::new();
    let mut substitutions: Vec<(VarId, VarId)> = Vec::new();
    let mut to_delete: Vec<VarId> = Vec::new();

    for inst in &instructions {
        if let Some(expr) = Expression::from_instruction(inst) {
            if let Some(earlier) = available.iter().find(|e| **e == expr) {
                substitutions.push((expr.defining_value, earlier.defining_value));
                to_delete.push(expr.defining_value);
            } else {
                available.push(expr);
            }
        } else if let Instruction::Store { address, .. } = inst {
            kill(&mut available, address.clone());
        }
    }

    for (old, new) in &substitutions {
        function.replace_all_uses_with(*old, *new);
    }
    for var in &to_delete {
        function.erase_instruction(block, *var);
    }

    LocalCseResult {
        removed: to_delete.len(),
        available,
    }
}

/// A single forward sweep over `available`: anything whose operand chain
/// transitively reaches `address` is no longer available. Correct in one
/// pass because `available` is in definition order — a newly killable
/// expression was always defined after its killer, hence appears later.
fn kill(available: &mut Vec<Expression>, address: Operand) {
    let mut killed_operands: Vec<Operand> = vec![address];
    available.retain(|expr| {
        let is_killed = expr.operands.iter().any(|o| killed_operands.contains(o));
        if is_killed {
            killed_operands.push(Operand::Var(expr.defining_value));
        }
        !is_killed
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use ir::{BasicBlock, Terminator};
    use model::{BinaryOp, Type};

    fn function_with(instructions: Vec<Instruction>) -> Function {
        Function {
            name: "f".into(),
            return_type: Type::Int,
            params: vec![],
            entry: BlockId(0),
            blocks: vec![BasicBlock {
                id: BlockId(0),
                instructions,
                terminator: Terminator::Return(None),
            }],
        }
    }

    #[test]
    fn duplicate_in_block_collapses_to_one() {
        let mut f = function_with(vec![
            Instruction::Binary {
                dest: VarId(1),
                op: BinaryOp::Add,
                result_type: Type::Int,
                left: Operand::Var(VarId(100)),
                right: Operand::Var(VarId(200)),
            },
            Instruction::Binary {
                dest: VarId(2),
                op: BinaryOp::Add,
                result_type: Type::Int,
                left: Operand::Var(VarId(100)),
                right: Operand::Var(VarId(200)),
            },
        ]);
        let result = run_local_cse(&mut f, BlockId(0));
        assert_eq!(result.removed, 1);
        assert_eq!(result.available.len(), 1);
        assert_eq!(f.blocks[0].instructions.len(), 1);
    }

    #[test]
    fn store_kills_a_subsequent_load_of_the_same_address() {
        let addr = Operand::Global("x".into());
        let mut f = function_with(vec![
            Instruction::Load {
                dest: VarId(1),
                result_type: Type::Int,
                address: addr.clone(),
            },
            Instruction::Store {
                address: addr.clone(),
                value: Operand::Constant(1),
            },
            Instruction::Load {
                dest: VarId(2),
                result_type: Type::Int,
                address: addr,
            },
        ]);
        let result = run_local_cse(&mut f, BlockId(0));
        assert_eq!(result.removed, 0, "both loads must survive, no cross-store collapse");
        assert_eq!(result.available.len(), 1, "only the load after the store remains 'available'");
    }

    #[test]
    fn kill_is_transitive_through_a_dependent_expression() {
        // t1 = load @x; t2 = t1 + 1; store v -> @x
        // storing to @x kills t1, which in turn kills t2 (t2 reads t1).
        let addr = Operand::Global("x".into());
        let mut f = function_with(vec![
            Instruction::Load {
                dest: VarId(1),
                result_type: Type::Int,
                address: addr.clone(),
            },
            Instruction::Binary {
                dest: VarId(2),
                op: BinaryOp::Add,
                result_type: Type::Int,
                left: Operand::Var(VarId(1)),
                right: Operand::Constant(1),
            },
            Instruction::Store {
                address: addr,
                value: Operand::Constant(0),
            },
        ]);
        let result = run_local_cse(&mut f, BlockId(0));
        assert!(result.available.is_empty(), "both the load and its dependent add are killed");
    }
}
