//! The rewrite walk: for each redundant expression-producing instruction,
//! resolve a dominating replacement (inserting join instructions when no
//! single definition dominates) and queue it for deletion.

use std::collections::HashSet;

use ir::{BlockId, DominatorTree, Function, Instruction, Operand, VarId};

use crate::analysis::Analysis;
use crate::expression::{is_expression, Expression};

/// Walk every block once, collecting substitutions and deletions, then
/// apply them all at once and hand off to the sanitizer. Returns `true`
/// iff at least one instruction was removed.
pub fn rewrite_pass(function: &mut Function, analysis: &mut Analysis, dom: &DominatorTree) -> bool {
    let mut substitutions: Vec<(VarId, VarId)> = Vec::new();
    let mut to_delete: Vec<(BlockId, VarId)> = Vec::new();

    for block in function.block_ids() {
        let instructions = function.block(block).instructions.clone();
        for inst in &instructions {
            if !is_expression(inst) || is_killed_in_bb(function, block, inst) {
                continue;
            }
            let expr = Expression::from_instruction(inst).expect("is_expression confirmed this builds");

            if let Some(vn) = analysis.value_number(&expr) {
                if analysis.avail_in[&block].contains(vn) {
                    let replacement = find_replacement(&expr, block, true, function, analysis, dom);
                    substitutions.push((expr.defining_value, replacement));
                    to_delete.push((block, expr.defining_value));
                    analysis.remove_result(&expr, expr.defining_value);
                    continue;
                }
            }

            if has_phi_operand(function, &expr) {
                if let Some(replacement) = find_composite_join(&expr, block, function, analysis, dom) {
                    substitutions.push((expr.defining_value, replacement));
                    to_delete.push((block, expr.defining_value));
                    analysis.remove_result(&expr, expr.defining_value);
                }
            }
        }
    }

    for (old, new) in &substitutions {
        function.replace_all_uses_with(*old, *new);
    }
    for (block, var) in &to_delete {
        function.erase_instruction(*block, *var);
    }

    !to_delete.is_empty()
}

/// Does `inst`'s operand chain get invalidated somewhere between the top
/// of `block` and `inst` itself? If so, `AvailIN[block]` alone cannot
/// certify redundancy — a store between the block's start and `inst`
/// may have overwritten something `inst` depends on.
fn is_killed_in_bb(function: &Function, block: BlockId, inst: &Instruction) -> bool {
    let dest = inst.dest().expect("expression instructions always define a value");
    let blk = function.block(block);
    let idx = blk.index_of(dest).expect("inst belongs to this block");

    let mut live: Vec<Operand> = inst.operands();
    for earlier in blk.instructions[..idx].iter().rev() {
        if let Some(result) = earlier.dest() {
            if live.contains(&Operand::Var(result)) {
                for operand in earlier.operands() {
                    if !live.contains(&operand) {
                        live.push(operand);
                    }
                }
            }
        }
        if let Instruction::Store { address, .. } = earlier {
            if live.contains(address) {
                return true;
            }
        }
    }
    false
}

/// Inductive/recursive resolver: returns a value equivalent to `expr`
/// that either already dominates `block`, or is a freshly synthesized
/// join at the top of `block`.
fn find_replacement(
    expr: &Expression,
    block: BlockId,
    initial: bool,
    function: &mut Function,
    analysis: &mut Analysis,
    dom: &DominatorTree,
) -> VarId {
    let vn = analysis
        .value_number(expr)
        .expect("find_replacement is only called for expressions with a value number");

    if !initial && analysis.gen[&block].contains(vn) {
        if let Some(defs) = analysis.results.get(expr) {
            if let Some(&candidate) = defs.iter().find(|v| function.defining_block(**v) == Some(block)) {
                return candidate;
            }
        }
    }

    if let Some(defs) = analysis.results.get(expr).cloned() {
        for other in &defs {
            let other_block = function
                .defining_block(*other)
                .expect("an ExprResults member must still be defined somewhere");
            if dom.instruction_dominates_block(other_block, block)
                && !is_killed_on_path(vn, other_block, block, function, analysis)
            {
                return *other;
            }
        }
    }

    let phi_dest = analysis.fresh_var();
    function.insert_phi_at_top(block, phi_dest, expr.result_type.clone());
    analysis.results.entry(expr.clone()).or_default().push(phi_dest);
    tracing::trace!(?phi_dest, ?block, "synthesized join for redundant expression");

    for pred in function.predecessors(block) {
        let incoming = find_replacement(expr, pred, false, function, analysis, dom);
        if incoming != phi_dest {
            function.append_incoming(block, phi_dest, pred, Operand::Var(incoming));
        }
    }
    phi_dest
}

/// DFS from `src` toward `dest`: is `vn` killed on at least one simple
/// path? `initial` suppresses counting `src`'s own kill bit on the first
/// step, so the source definition never counts as killing itself.
fn is_killed_on_path(vn: usize, src: BlockId, dest: BlockId, function: &Function, analysis: &Analysis) -> bool {
    let mut visited = HashSet::new();
    is_killed_on_path_inner(vn, src, dest, function, analysis, &mut visited, false, true)
}

fn is_killed_on_path_inner(
    vn: usize,
    src: BlockId,
    dest: BlockId,
    function: &Function,
    analysis: &Analysis,
    visited: &mut HashSet<BlockId>,
    is_killed: bool,
    initial: bool,
) -> bool {
    if src == dest {
        return is_killed;
    }
    visited.insert(src);
    let mut killed_on_any_path = false;
    for succ in function.successors(src) {
        if !visited.contains(&succ) {
            let next_killed = is_killed || (!initial && !analysis.not_killed[&src].contains(vn));
            killed_on_any_path |=
                is_killed_on_path_inner(vn, succ, dest, function, analysis, visited, next_killed, false);
        }
    }
    killed_on_any_path
}

fn has_phi_operand(function: &Function, expr: &Expression) -> bool {
    expr.operands
        .iter()
        .any(|o| matches!(o, Operand::Var(v) if is_phi_var(function, *v)))
}

fn is_phi_var(function: &Function, var: VarId) -> bool {
    let Some(block) = function.defining_block(var) else {
        return false;
    };
    let blk = function.block(block);
    let idx = blk.index_of(var).expect("defining_block found it");
    matches!(blk.instructions[idx], Instruction::Phi { .. })
}

fn phi_incoming_for(function: &Function, phi_var: VarId, pred: BlockId) -> Option<Operand> {
    let block = function.defining_block(phi_var)?;
    let blk = function.block(block);
    let idx = blk.index_of(phi_var)?;
    match &blk.instructions[idx] {
        Instruction::Phi { incoming, .. } => incoming.iter().find(|(b, _)| *b == pred).map(|(_, v)| v.clone()),
        _ => None,
    }
}

/// Recovers redundancy the dataflow missed because `expr`'s operands
/// differ by predecessor through an existing join: substitutes each
/// join operand for its per-predecessor incoming value and checks
/// whether the resulting per-predecessor expression was available at
/// that predecessor's exit. One level only — a join operand that is
/// itself fed by another join is not peeled further.
fn find_composite_join(
    expr: &Expression,
    block: BlockId,
    function: &mut Function,
    analysis: &mut Analysis,
    dom: &DominatorTree,
) -> Option<VarId> {
    let predecessors = function.predecessors(block);
    if predecessors.is_empty() {
        return None;
    }

    let mut per_predecessor = Vec::with_capacity(predecessors.len());
    for &pred in &predecessors {
        let mut new_operands = Vec::with_capacity(expr.operands.len());
        for operand in &expr.operands {
            if let Operand::Var(v) = operand {
                if is_phi_var(function, *v) {
                    new_operands.push(phi_incoming_for(function, *v, pred)?);
                    continue;
                }
            }
            new_operands.push(operand.clone());
        }
        let mut expr_p = expr.clone();
        expr_p.swap_operands(new_operands);
        let vn = analysis.value_number(&expr_p)?;
        if !analysis.avail_out[&pred].contains(vn) {
            return None;
        }
        per_predecessor.push((pred, expr_p));
    }

    let phi_dest = analysis.fresh_var();
    function.insert_phi_at_top(block, phi_dest, expr.result_type.clone());
    tracing::trace!(?phi_dest, ?block, "synthesized composite join");

    for (pred, expr_p) in &per_predecessor {
        let incoming = find_replacement(expr_p, *pred, false, function, analysis, dom);
        if incoming != phi_dest {
            function.append_incoming(block, phi_dest, *pred, Operand::Var(incoming));
        }
    }
    Some(phi_dest)
}
