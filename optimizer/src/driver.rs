//! Drives one function to a fixed point: rebuild the analysis, rewrite
//! what it reveals, sanitize, repeat until a full pass finds nothing left
//! to do.

use ir::{DominatorTree, Function};

use crate::analysis::Analysis;
use crate::rewrite::rewrite_pass;
use crate::sanitize::sanitize;

/// Runs common subexpression elimination on `function` to a fixed point.
/// Returns `true` iff the function was changed at all.
pub fn run_on_function(function: &mut Function) -> bool {
    let mut changed_overall = false;
    let mut iteration = 0u32;

    loop {
        iteration += 1;
        let mut analysis = Analysis::run(function);
        let dom = DominatorTree::compute(function);
        let rewrote = rewrite_pass(function, &mut analysis, &dom);
        let sanitized = sanitize(function);

        tracing::debug!(
            iteration,
            local_cse_removed = analysis.local_cse_removed,
            sanitized,
            rewrote,
            "cse pass iteration complete"
        );

        if !rewrote && sanitized == 0 && analysis.local_cse_removed == 0 {
            break;
        }
        changed_overall = true;
        if !rewrote && sanitized == 0 {
            break;
        }
    }

    changed_overall
}

#[cfg(test)]
mod tests {
    use super::*;
    use ir::{FunctionBuilder, Instruction, Operand, Terminator};
    use model::{BinaryOp, Type};

    #[test]
    fn converges_on_a_function_with_nothing_to_do() {
        let mut b = FunctionBuilder::new("f", Type::Int);
        let p = b.add_param(Type::Int);
        let block = b.new_block();
        b.terminate(block, Terminator::Return(Some(Operand::Var(p)))).unwrap();
        let mut function = b.finish().unwrap();

        assert!(!run_on_function(&mut function));
    }

    #[test]
    fn removes_a_within_block_duplicate_end_to_end() {
        let mut b = FunctionBuilder::new("f", Type::Int);
        let a = b.add_param(Type::Int);
        let c = b.add_param(Type::Int);
        let block = b.new_block();
        let t1 = b.fresh_var();
        let t2 = b.fresh_var();
        b.push(
            block,
            Instruction::Binary {
                dest: t1,
                op: BinaryOp::Add,
                result_type: Type::Int,
                left: Operand::Var(a),
                right: Operand::Var(c),
            },
        )
        .unwrap();
        b.push(
            block,
            Instruction::Binary {
                dest: t2,
                op: BinaryOp::Add,
                result_type: Type::Int,
                left: Operand::Var(a),
                right: Operand::Var(c),
            },
        )
        .unwrap();
        b.terminate(block, Terminator::Return(Some(Operand::Var(t2)))).unwrap();
        let mut function = b.finish().unwrap();

        let changed = run_on_function(&mut function);
        assert!(changed);
        assert_eq!(function.block(block).instructions.len(), 1);
        assert_eq!(function.block(block).terminator, Terminator::Return(Some(Operand::Var(t1))));
    }

    #[test]
    fn driver_iteration_trace_runs_under_a_subscriber() {
        tracing_subscriber::fmt().with_test_writer().try_init().ok();
        let mut b = FunctionBuilder::new("f", Type::Int);
        let p = b.add_param(Type::Int);
        let block = b.new_block();
        b.terminate(block, Terminator::Return(Some(Operand::Var(p)))).unwrap();
        let mut function = b.finish().unwrap();

        assert!(!run_on_function(&mut function));
    }
}
