//! The host IR's instruction and control-flow vocabulary: `VarId`/`BlockId`
//! handles, `Operand`, `Instruction`, `Terminator`, `BasicBlock`, `Function`.
//!
//! Binary/unary/load/store/phi variants with `VarId`/`BlockId` as bare
//! `usize` newtypes, extended with `Compare`, `Cast`, and `Select`
//! expression kinds and a `Predicate`-bearing compare instead of folding
//! compares into `Binary`.

use model::{BinaryOp, CastKind, Predicate, Type, UnaryOp};

/// A defined SSA value. Two instructions share a value only by sharing a
/// `VarId` — there is no structural equality between distinct ids.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VarId(pub usize);

/// A basic block identifier, stable for the lifetime of a `Function`.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlockId(pub usize);

/// An operand: a use of either a compile-time constant, a named global, or
/// another instruction's result.
///
/// The derived `Ord` is the "value handle identity" order used when
/// canonicalizing commutative operand order: constants sort before
/// globals sort before locals, and within a variant by the inner id. This
/// stands in for LLVM's pointer-identity ordering of `Value*`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Operand {
    Constant(i64),
    Global(String),
    Var(VarId),
}

/// One instruction in a basic block.
///
/// The first seven variants are the expression-eligible kinds
/// (arithmetic binary, compare, arithmetic unary, cast, load,
/// address-computation, select). `Phi`, `Store`, `Alloca`, `Call`, and
/// `IndirectCall` are never expressions: a `Phi` is the join itself that
/// GCSE inserts and consumes, `Store`/`Call`/`IndirectCall` have side
/// effects or unknown side effects, and `Alloca` names a memory location
/// rather than computing a value.
#[derive(Debug, Clone, PartialEq)]
pub enum Instruction {
    Binary {
        dest: VarId,
        op: BinaryOp,
        result_type: Type,
        left: Operand,
        right: Operand,
    },
    Compare {
        dest: VarId,
        predicate: Predicate,
        result_type: Type,
        left: Operand,
        right: Operand,
    },
    Unary {
        dest: VarId,
        op: UnaryOp,
        result_type: Type,
        operand: Operand,
    },
    Cast {
        dest: VarId,
        kind: CastKind,
        result_type: Type,
        operand: Operand,
    },
    Load {
        dest: VarId,
        result_type: Type,
        address: Operand,
    },
    GetElementPtr {
        dest: VarId,
        result_type: Type,
        base: Operand,
        index: Operand,
    },
    Select {
        dest: VarId,
        result_type: Type,
        condition: Operand,
        if_true: Operand,
        if_false: Operand,
    },
    /// The join instruction the rewriter synthesizes at merge points. `incoming`
    /// pairs a predecessor block with the value arriving from it.
    Phi {
        dest: VarId,
        result_type: Type,
        incoming: Vec<(BlockId, Operand)>,
    },
    Store {
        address: Operand,
        value: Operand,
    },
    Alloca {
        dest: VarId,
        allocated_type: Type,
    },
    Call {
        dest: Option<VarId>,
        callee: String,
        args: Vec<Operand>,
    },
    IndirectCall {
        dest: Option<VarId>,
        callee: Operand,
        args: Vec<Operand>,
    },
}

impl Instruction {
    /// The value this instruction defines, if any.
    pub fn dest(&self) -> Option<VarId> {
        match self {
            Instruction::Binary { dest, .. }
            | Instruction::Compare { dest, .. }
            | Instruction::Unary { dest, .. }
            | Instruction::Cast { dest, .. }
            | Instruction::Load { dest, .. }
            | Instruction::GetElementPtr { dest, .. }
            | Instruction::Select { dest, .. }
            | Instruction::Phi { dest, .. }
            | Instruction::Alloca { dest, .. } => Some(*dest),
            Instruction::Call { dest, .. } | Instruction::IndirectCall { dest, .. } => *dest,
            Instruction::Store { .. } => None,
        }
    }

    pub fn is_phi(&self) -> bool {
        matches!(self, Instruction::Phi { .. })
    }

    pub fn is_store(&self) -> bool {
        matches!(self, Instruction::Store { .. })
    }

    pub fn is_alloca(&self) -> bool {
        matches!(self, Instruction::Alloca { .. })
    }

    /// Every operand this instruction reads, in operand order — constants
    /// and globals included, not just `Var` uses.
    pub fn operands(&self) -> Vec<Operand> {
        let operands: Vec<&Operand> = match self {
            Instruction::Binary { left, right, .. } | Instruction::Compare { left, right, .. } => {
                vec![left, right]
            }
            Instruction::Unary { operand, .. } | Instruction::Cast { operand, .. } => vec![operand],
            Instruction::Load { address, .. } => vec![address],
            Instruction::GetElementPtr { base, index, .. } => vec![base, index],
            Instruction::Select {
                condition,
                if_true,
                if_false,
                ..
            } => vec![condition, if_true, if_false],
            Instruction::Phi { incoming, .. } => incoming.iter().map(|(_, v)| v).collect(),
            Instruction::Store { address, value } => vec![address, value],
            Instruction::Alloca { .. } => vec![],
            Instruction::Call { args, .. } | Instruction::IndirectCall { args, .. } => args.iter().collect(),
        };
        operands.into_iter().cloned().collect()
    }

    /// Every `Operand::Var` this instruction reads, in operand order.
    pub fn used_vars(&self) -> Vec<VarId> {
        self.operands()
            .into_iter()
            .filter_map(|o| match o {
                Operand::Var(v) => Some(v),
                _ => None,
            })
            .collect()
    }

    /// Rewrite every use of `old` to `new` in place.
    pub fn replace_uses(&mut self, old: VarId, new: VarId) {
        let replace = |o: &mut Operand| {
            if *o == Operand::Var(old) {
                *o = Operand::Var(new);
            }
        };
        match self {
            Instruction::Binary { left, right, .. } | Instruction::Compare { left, right, .. } => {
                replace(left);
                replace(right);
            }
            Instruction::Unary { operand, .. } | Instruction::Cast { operand, .. } => replace(operand),
            Instruction::Load { address, .. } => replace(address),
            Instruction::GetElementPtr { base, index, .. } => {
                replace(base);
                replace(index);
            }
            Instruction::Select {
                condition,
                if_true,
                if_false,
                ..
            } => {
                replace(condition);
                replace(if_true);
                replace(if_false);
            }
            Instruction::Phi { incoming, .. } => {
                for (_, v) in incoming.iter_mut() {
                    replace(v);
                }
            }
            Instruction::Store { address, value } => {
                replace(address);
                replace(value);
            }
            Instruction::Alloca { .. } => {}
            Instruction::Call { args, .. } | Instruction::IndirectCall { args, .. } => {
                for a in args.iter_mut() {
                    replace(a);
                }
            }
        }
    }
}

/// A block-ending control transfer.
#[derive(Debug, Clone, PartialEq)]
pub enum Terminator {
    Branch(BlockId),
    CondBranch {
        condition: Operand,
        if_true: BlockId,
        if_false: BlockId,
    },
    Return(Option<Operand>),
    Unreachable,
}

impl Terminator {
    pub fn successors(&self) -> Vec<BlockId> {
        match self {
            Terminator::Branch(b) => vec![*b],
            Terminator::CondBranch { if_true, if_false, .. } => vec![*if_true, *if_false],
            Terminator::Return(_) | Terminator::Unreachable => vec![],
        }
    }

    fn replace_uses(&mut self, old: VarId, new: VarId) {
        if let Terminator::CondBranch { condition, .. } = self {
            if *condition == Operand::Var(old) {
                *condition = Operand::Var(new);
            }
        }
        if let Terminator::Return(Some(v)) = self {
            if *v == Operand::Var(old) {
                *v = Operand::Var(new);
            }
        }
    }
}

/// A maximal straight-line sequence of instructions ending in one
/// terminator.
#[derive(Debug, Clone)]
pub struct BasicBlock {
    pub id: BlockId,
    pub instructions: Vec<Instruction>,
    pub terminator: Terminator,
}

impl BasicBlock {
    /// Index of the instruction defining `var`, within this block only.
    pub fn index_of(&self, var: VarId) -> Option<usize> {
        self.instructions.iter().position(|i| i.dest() == Some(var))
    }
}

/// One function's worth of IR: blocks, parameters, and an entry point.
#[derive(Debug, Clone)]
pub struct Function {
    pub name: String,
    pub return_type: Type,
    pub params: Vec<(Type, VarId)>,
    pub blocks: Vec<BasicBlock>,
    pub entry: BlockId,
}

impl Function {
    pub fn block(&self, id: BlockId) -> &BasicBlock {
        self.blocks
            .iter()
            .find(|b| b.id == id)
            .unwrap_or_else(|| panic!("no such block {id:?} in function {}", self.name))
    }

    pub fn block_mut(&mut self, id: BlockId) -> &mut BasicBlock {
        self.blocks
            .iter_mut()
            .find(|b| b.id == id)
            .unwrap_or_else(|| panic!("no such block {id:?}"))
    }

    pub fn block_ids(&self) -> Vec<BlockId> {
        self.blocks.iter().map(|b| b.id).collect()
    }

    pub fn successors(&self, id: BlockId) -> Vec<BlockId> {
        self.block(id).terminator.successors()
    }

    pub fn predecessors(&self, id: BlockId) -> Vec<BlockId> {
        self.blocks
            .iter()
            .filter(|b| b.terminator.successors().contains(&id))
            .map(|b| b.id)
            .collect()
    }

    /// The block that defines `var`, if it is defined anywhere in this
    /// function.
    pub fn defining_block(&self, var: VarId) -> Option<BlockId> {
        self.blocks
            .iter()
            .find(|b| b.index_of(var).is_some())
            .map(|b| b.id)
    }

    /// The largest `VarId` in use anywhere in the function (params,
    /// defs, or uses). Callers minting fresh ids — join synthesis during
    /// rewriting — start one past this.
    pub fn max_var_id(&self) -> usize {
        let mut max = 0;
        for (_, v) in &self.params {
            max = max.max(v.0);
        }
        for block in &self.blocks {
            for inst in &block.instructions {
                if let Some(d) = inst.dest() {
                    max = max.max(d.0);
                }
                for o in inst.operands() {
                    if let Operand::Var(v) = o {
                        max = max.max(v.0);
                    }
                }
            }
        }
        max
    }

    /// `true` if any instruction or terminator in the function still
    /// reads `var`.
    pub fn is_used(&self, var: VarId) -> bool {
        self.blocks.iter().any(|b| {
            b.instructions.iter().any(|i| i.used_vars().contains(&var))
                || matches!(&b.terminator,
                    Terminator::CondBranch { condition, .. } if *condition == Operand::Var(var))
                || matches!(&b.terminator, Terminator::Return(Some(v)) if *v == Operand::Var(var))
        })
    }

    /// Rewrite every use of `old` to `new`, function-wide. Does not touch
    /// the defining instruction itself.
    pub fn replace_all_uses_with(&mut self, old: VarId, new: VarId) {
        for block in self.blocks.iter_mut() {
            for inst in block.instructions.iter_mut() {
                if inst.dest() != Some(old) {
                    inst.replace_uses(old, new);
                }
            }
            block.terminator.replace_uses(old, new);
        }
    }

    /// Remove the instruction defining `var` from `block`, if present.
    pub fn erase_instruction(&mut self, block: BlockId, var: VarId) {
        let b = self.block_mut(block);
        if let Some(idx) = b.index_of(var) {
            b.instructions.remove(idx);
        }
    }

    /// Insert a fresh, empty `Phi` (no incoming pairs yet) at the top of
    /// `block`, ahead of any existing instruction.
    pub fn insert_phi_at_top(&mut self, block: BlockId, dest: VarId, result_type: Type) {
        let b = self.block_mut(block);
        b.instructions.insert(
            0,
            Instruction::Phi {
                dest,
                result_type,
                incoming: Vec::new(),
            },
        );
    }

    /// Append one `(predecessor, value)` pair to the `Phi` defining
    /// `phi_dest` in `block`.
    pub fn append_incoming(&mut self, block: BlockId, phi_dest: VarId, predecessor: BlockId, value: Operand) {
        let b = self.block_mut(block);
        let idx = b
            .index_of(phi_dest)
            .unwrap_or_else(|| panic!("{phi_dest:?} is not a phi in {block:?}"));
        if let Instruction::Phi { incoming, .. } = &mut b.instructions[idx] {
            incoming.push((predecessor, value));
        } else {
            panic!("{phi_dest:?} is not a phi in {block:?}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leaf(id: usize, dest: usize) -> BasicBlock {
        BasicBlock {
            id: BlockId(id),
            instructions: vec![Instruction::Alloca {
                dest: VarId(dest),
                allocated_type: Type::Int,
            }],
            terminator: Terminator::Return(None),
        }
    }

    #[test]
    fn operand_order_is_constant_then_global_then_var() {
        let mut ops = vec![
            Operand::Var(VarId(3)),
            Operand::Constant(5),
            Operand::Global("g".into()),
        ];
        ops.sort();
        assert_eq!(
            ops,
            vec![Operand::Constant(5), Operand::Global("g".into()), Operand::Var(VarId(3))]
        );
    }

    #[test]
    fn replace_all_uses_with_skips_the_defining_instruction() {
        let mut f = Function {
            name: "f".into(),
            return_type: Type::Int,
            params: vec![],
            blocks: vec![leaf(0, 1)],
            entry: BlockId(0),
        };
        f.blocks[0].instructions.push(Instruction::Unary {
            dest: VarId(2),
            op: UnaryOp::Negate,
            result_type: Type::Int,
            operand: Operand::Var(VarId(1)),
        });
        f.replace_all_uses_with(VarId(1), VarId(9));
        assert_eq!(
            f.blocks[0].instructions[1],
            Instruction::Unary {
                dest: VarId(2),
                op: UnaryOp::Negate,
                result_type: Type::Int,
                operand: Operand::Var(VarId(9)),
            }
        );
    }

    #[test]
    fn phi_insertion_and_incoming() {
        let mut f = Function {
            name: "f".into(),
            return_type: Type::Int,
            params: vec![],
            blocks: vec![leaf(0, 1)],
            entry: BlockId(0),
        };
        f.insert_phi_at_top(BlockId(0), VarId(10), Type::Int);
        f.append_incoming(BlockId(0), VarId(10), BlockId(1), Operand::Var(VarId(1)));
        match &f.blocks[0].instructions[0] {
            Instruction::Phi { incoming, .. } => assert_eq!(incoming, &vec![(BlockId(1), Operand::Var(VarId(1)))]),
            other => panic!("expected phi, got {other:?}"),
        }
    }
}
