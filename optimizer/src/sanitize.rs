//! Final cleanup pass: once rewriting has rerouted every redundant use,
//! some `Load`s and `Phi`s it left behind (either never redundant to
//! begin with, or redundant but already dead after substitution) have no
//! remaining readers. A single sweep removes them.

use ir::{Function, Instruction};

/// Removes every dead `Load`/`Phi` in `function`. Returns the count
/// removed. Iterates to a fixed point within one call since deleting one
/// dead phi can make another phi (feeding only it) dead in turn.
pub fn sanitize(function: &mut Function) -> usize {
    let mut total_removed = 0;
    loop {
        let mut dead = Vec::new();
        for block in function.block_ids() {
            for inst in &function.block(block).instructions {
                let is_candidate = matches!(inst, Instruction::Load { .. } | Instruction::Phi { .. });
                if is_candidate {
                    let dest = inst.dest().expect("Load and Phi always define a value");
                    if !function.is_used(dest) {
                        dead.push((block, dest));
                    }
                }
            }
        }
        if dead.is_empty() {
            break;
        }
        total_removed += dead.len();
        for (block, var) in dead {
            function.erase_instruction(block, var);
        }
    }
    total_removed
}

#[cfg(test)]
mod tests {
    use super::*;
    use ir::{BasicBlock, BlockId, FunctionBuilder, Operand, Terminator, VarId};
    use model::Type;

    #[test]
    fn a_dead_load_with_no_readers_is_removed() {
        let mut b = FunctionBuilder::new("f", Type::Int);
        let block = b.new_block();
        let dest = b.fresh_var();
        b.push(
            block,
            Instruction::Load {
                dest,
                result_type: Type::Int,
                address: Operand::Global("x".into()),
            },
        )
        .unwrap();
        b.terminate(block, Terminator::Return(None)).unwrap();
        let mut function = b.finish().unwrap();

        let removed = sanitize(&mut function);
        assert_eq!(removed, 1);
        assert!(function.block(block).instructions.is_empty());
    }

    #[test]
    fn a_chain_of_phis_is_removed_transitively() {
        let mut function = function_for_chain();
        let removed = sanitize(&mut function);
        assert_eq!(removed, 2);
        assert!(function.block(BlockId(0)).instructions.is_empty());
    }

    /// `Phi(2)` feeds only `Phi(1)`; `Phi(1)` has no reader at all. The
    /// first sweep collects `Phi(1)` (unused), and only once it is gone
    /// does `Phi(2)` lose its sole reader and get collected on the
    /// second sweep — a true chain, not a cycle.
    fn function_for_chain() -> ir::Function {
        ir::Function {
            name: "f".into(),
            return_type: Type::Int,
            params: vec![],
            entry: BlockId(0),
            blocks: vec![BasicBlock {
                id: BlockId(0),
                instructions: vec![
                    Instruction::Phi {
                        dest: VarId(1),
                        result_type: Type::Int,
                        incoming: vec![(BlockId(0), Operand::Var(VarId(2)))],
                    },
                    Instruction::Phi {
                        dest: VarId(2),
                        result_type: Type::Int,
                        incoming: vec![(BlockId(0), Operand::Constant(0))],
                    },
                ],
                terminator: Terminator::Return(None),
            }],
        }
    }
}
