//! Global common subexpression elimination over a single-function, SSA
//! control-flow graph: local in-block collapsing, a kill-aware
//! available-expressions dataflow, dominance-guided rewriting with join
//! synthesis at merge points, and a final dead-instruction sweep.
//!
//! `run_on_function` is the only entry point most callers need.

mod analysis;
mod availability;
mod driver;
mod expression;
mod killset;
mod local_cse;
mod rewrite;
mod sanitize;

pub use driver::run_on_function;
