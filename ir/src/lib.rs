//! The host IR adapter: instruction/block/function types, a dominator
//! tree, and a programmatic builder. This stands in for the surrounding
//! compiler framework that would normally provide these IR types —
//! parsing, semantic analysis, and lowering from an AST are someone
//! else's problem; this crate only needs to hand the optimizer a CFG to
//! work on.

pub mod builder;
pub mod dominators;
pub mod types;

pub use builder::FunctionBuilder;
pub use dominators::DominatorTree;
pub use types::{BasicBlock, BlockId, Function, Instruction, Operand, Terminator, VarId};
