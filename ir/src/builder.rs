//! Programmatic construction of `Function`s.
//!
//! Parsing and lowering from an AST happen elsewhere, upstream of this
//! crate. We only need a way to build fixtures for tests and for callers
//! who already have IR in hand, so `FunctionBuilder` is a thin, fallible
//! assembly API in the same `Result<T, String>` idiom the surrounding
//! lowering code uses.

use std::collections::HashMap;

use model::Type;

use crate::types::{BasicBlock, BlockId, Function, Instruction, Terminator, VarId};

pub struct FunctionBuilder {
    name: String,
    return_type: Type,
    params: Vec<(Type, VarId)>,
    blocks: HashMap<BlockId, BasicBlock>,
    order: Vec<BlockId>,
    entry: Option<BlockId>,
    next_var: usize,
    next_block: usize,
}

impl FunctionBuilder {
    pub fn new(name: impl Into<String>, return_type: Type) -> Self {
        FunctionBuilder {
            name: name.into(),
            return_type,
            params: Vec::new(),
            blocks: HashMap::new(),
            order: Vec::new(),
            entry: None,
            next_var: 0,
            next_block: 0,
        }
    }

    pub fn fresh_var(&mut self) -> VarId {
        let v = VarId(self.next_var);
        self.next_var += 1;
        v
    }

    pub fn add_param(&mut self, ty: Type) -> VarId {
        let v = self.fresh_var();
        self.params.push((ty, v));
        v
    }

    /// Create a new, empty, unterminated block. The first block created
    /// becomes the entry unless `set_entry` is called explicitly.
    pub fn new_block(&mut self) -> BlockId {
        let id = BlockId(self.next_block);
        self.next_block += 1;
        self.blocks.insert(
            id,
            BasicBlock {
                id,
                instructions: Vec::new(),
                terminator: Terminator::Unreachable,
            },
        );
        self.order.push(id);
        if self.entry.is_none() {
            self.entry = Some(id);
        }
        id
    }

    pub fn set_entry(&mut self, block: BlockId) -> Result<(), String> {
        if !self.blocks.contains_key(&block) {
            return Err(format!("set_entry: no such block {block:?}"));
        }
        self.entry = Some(block);
        Ok(())
    }

    pub fn push(&mut self, block: BlockId, inst: Instruction) -> Result<(), String> {
        self.blocks
            .get_mut(&block)
            .ok_or_else(|| format!("push: no such block {block:?}"))?
            .instructions
            .push(inst);
        Ok(())
    }

    pub fn terminate(&mut self, block: BlockId, terminator: Terminator) -> Result<(), String> {
        for successor in terminator.successors() {
            if !self.blocks.contains_key(&successor) {
                return Err(format!("terminate: undefined successor block {successor:?}"));
            }
        }
        self.blocks
            .get_mut(&block)
            .ok_or_else(|| format!("terminate: no such block {block:?}"))?
            .terminator = terminator;
        Ok(())
    }

    /// Assemble the built blocks into a `Function`. Fails if no entry was
    /// ever established or if a block was left with no terminator set.
    pub fn finish(self) -> Result<Function, String> {
        let entry = self.entry.ok_or("finish: function has no blocks")?;
        let mut blocks = Vec::with_capacity(self.order.len());
        for id in &self.order {
            let block = self.blocks.get(id).expect("order and blocks stay in sync");
            if matches!(block.terminator, Terminator::Unreachable) && !block.instructions.is_empty() {
                return Err(format!("finish: block {id:?} was never terminated"));
            }
            blocks.push(block.clone());
        }
        Ok(Function {
            name: self.name,
            return_type: self.return_type,
            params: self.params,
            blocks,
            entry,
        })
    }
}
