//! Compiled match patterns.
//!
//! A template's `match` attribute is compiled once, during precompilation, into
//! an [`Expr`] tree that the matcher walks *backwards*: the outermost node tests
//! the candidate itself, and each nested sub-pattern tests one ancestor further
//! up.
//!
//! ```text
//! "a/b[@x]"  ──▶  Filter
//!                  ├─ base: Select(b)          tests the node
//!                  │         └─ Select(a)      tests node.parent
//!                  └─ predicate: @x            evaluated at the node
//! ```
//!
//! The same grammar is used inside predicates, where paths are read forwards
//! by the scalar evaluator (see `scalar.rs`).
//!
//! - `expr.rs`: the `Expr` tree and its structural depth (the specificity
//!   metric used by rule selection).
//! - `lexer.rs`: regex-driven tokenizer.
//! - `compiler.rs`: recursive-descent parser producing `Expr`s.

#[path = "pattern/compiler.rs"]
mod compiler;
#[path = "pattern/expr.rs"]
mod expr;
#[path = "pattern/lexer.rs"]
mod lexer;

pub use compiler::XPathPatternCompiler;
pub use expr::{CompareOp, Expr};

use crate::error::Result;

/// Turns pattern text into a compiled [`Expr`].
///
/// Only PATTERN-kind rules go through the compiler; the `/` and `*` sentinels
/// are recognised by the rule table itself.
pub trait PatternCompiler: Send + Sync {
    fn compile(&self, text: &str) -> Result<Expr>;
}
