//! `Expression`: an immutable, canonicalized view of one side-effect-free
//! instruction. Two instructions are the "same" expression exactly when
//! their `Expression` forms compare equal — this is where commutativity
//! and compare-swap canonicalization live, grounded in the same idea as
//! the old per-opcode `ExprKey` encoding, generalized to a shared shape
//! across all seven eligible instruction kinds instead of one key struct
//! per opcode family.

use std::hash::{Hash, Hasher};

use ir::{Instruction, Operand, VarId};
use model::{BinaryOp, CastKind, Predicate, Type, UnaryOp};

/// The opcode family an `Expression` was built from, carrying the
/// specific operator/predicate/cast kind so two expressions with
/// different operators are never mistaken for each other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExprKind {
    ArithmeticBinary(BinaryOp),
    Compare(Predicate),
    ArithmeticUnary(UnaryOp),
    Cast(CastKind),
    Load,
    AddressComputation,
    Select,
}

/// A canonicalized expression. `defining_value` names the instruction
/// that currently computes it but takes no part in equality or hashing —
/// two different instructions computing the same value are the same
/// `Expression`.
#[derive(Debug, Clone)]
pub struct Expression {
    pub kind: ExprKind,
    pub result_type: Type,
    pub operands: Vec<Operand>,
    pub defining_value: VarId,
}

impl PartialEq for Expression {
    fn eq(&self, other: &Self) -> bool {
        self.kind == other.kind && self.result_type == other.result_type && self.operands == other.operands
    }
}

impl Eq for Expression {}

impl Hash for Expression {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.kind.hash(state);
        self.result_type.hash(state);
        self.operands.hash(state);
    }
}

/// `true` iff `inst`'s kind is one of the seven expression-eligible
/// kinds. Stores, calls, branches, allocations, and joins are never
/// expressions, though stores still participate in kill computation and
/// joins can still appear as an expression's operand.
pub fn is_expression(inst: &Instruction) -> bool {
    matches!(
        inst,
        Instruction::Binary { .. }
            | Instruction::Compare { .. }
            | Instruction::Unary { .. }
            | Instruction::Cast { .. }
            | Instruction::Load { .. }
            | Instruction::GetElementPtr { .. }
            | Instruction::Select { .. }
    )
}

impl Expression {
    /// Builds the canonical form of `inst`, or `None` if it is not an
    /// expression-eligible instruction.
    pub fn from_instruction(inst: &Instruction) -> Option<Expression> {
        let expr = match inst {
            Instruction::Binary {
                dest,
                op,
                result_type,
                left,
                right,
            } => {
                let mut operands = vec![left.clone(), right.clone()];
                if op.is_commutative() {
                    operands.sort();
                }
                Expression {
                    kind: ExprKind::ArithmeticBinary(*op),
                    result_type: result_type.clone(),
                    operands,
                    defining_value: *dest,
                }
            }
            Instruction::Compare {
                dest,
                predicate,
                result_type,
                left,
                right,
            } => {
                let swapped = predicate.swapped();
                let (predicate, operands) = if swapped < *predicate {
                    (swapped, vec![right.clone(), left.clone()])
                } else {
                    (*predicate, vec![left.clone(), right.clone()])
                };
                Expression {
                    kind: ExprKind::Compare(predicate),
                    result_type: result_type.clone(),
                    operands,
                    defining_value: *dest,
                }
            }
            Instruction::Unary {
                dest,
                op,
                result_type,
                operand,
            } => Expression {
                kind: ExprKind::ArithmeticUnary(*op),
                result_type: result_type.clone(),
                operands: vec![operand.clone()],
                defining_value: *dest,
            },
            Instruction::Cast {
                dest,
                kind,
                result_type,
                operand,
            } => Expression {
                kind: ExprKind::Cast(*kind),
                result_type: result_type.clone(),
                operands: vec![operand.clone()],
                defining_value: *dest,
            },
            Instruction::Load {
                dest,
                result_type,
                address,
            } => Expression {
                kind: ExprKind::Load,
                result_type: result_type.clone(),
                operands: vec![address.clone()],
                defining_value: *dest,
            },
            Instruction::GetElementPtr {
                dest,
                result_type,
                base,
                index,
            } => Expression {
                kind: ExprKind::AddressComputation,
                result_type: result_type.clone(),
                operands: vec![base.clone(), index.clone()],
                defining_value: *dest,
            },
            Instruction::Select {
                dest,
                result_type,
                condition,
                if_true,
                if_false,
            } => Expression {
                kind: ExprKind::Select,
                result_type: result_type.clone(),
                operands: vec![condition.clone(), if_true.clone(), if_false.clone()],
                defining_value: *dest,
            },
            _ => return None,
        };
        Some(expr)
    }

    /// Replace this expression's operands, re-canonicalizing the
    /// commutative two-operand case. Used by composite-join synthesis
    /// when substituting a join operand for its per-predecessor incoming
    /// value.
    pub fn swap_operands(&mut self, new_operands: Vec<Operand>) {
        self.operands = new_operands;
        if let ExprKind::ArithmeticBinary(op) = self.kind {
            if op.is_commutative() && self.operands.len() == 2 {
                self.operands.sort();
            }
        }
    }
}
