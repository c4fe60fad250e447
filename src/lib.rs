//! Template-rule dispatch for tree-structured documents.
//!
//! A stylesheet's templates are compiled once into a [`RuleTable`]; for every
//! (node, mode) pair the table picks the most specific matching template, and
//! the [`Scheduler`] decides whether each instruction of the winning body runs
//! inline or on the [`WorkerPool`].
//!
//! ```
//! use std::sync::Arc;
//! use templar::{Document, Options, Stylesheet, apply_with};
//!
//! let mut sheet = Document::new();
//! let top = sheet.append_element(sheet.root(), "xsl:stylesheet");
//! for pattern in ["/", "a", "a/b"] {
//!     let template = sheet.append_element(top, "xsl:template");
//!     sheet.set_attribute(template, "match", pattern);
//!     sheet.append_element(template, "xsl:apply-templates");
//! }
//! let sheet = Arc::new(Stylesheet::compile(sheet).unwrap());
//!
//! let mut source = Document::new();
//! source.path_chain(&["a", "b"]);
//!
//! let run = apply_with(sheet, Arc::new(source), &Options { threads: 2, ..Options::default() }).unwrap();
//! assert_eq!(run.selections[2].pattern.as_deref(), Some("a/b"));
//! ```

#[macro_use]
mod macros;
mod api;
mod config;
mod document;
mod engine;
mod error;
mod pattern;
mod pool;
mod scalar;
mod task;

pub use api::{RunResult, Selection, Stylesheet, apply, apply_with};
pub use config::{Options, PARALLEL_VAR, TASK_MODE_VAR, THREADS_VAR};
pub use document::{Children, Document, NodeId, NodeKind};
pub use engine::{Body, MatchKind, Matcher, Rule, RuleId, RuleTable, is_template_element, precompile};
pub use error::{Error, Result};
pub use pattern::{CompareOp, Expr, PatternCompiler, XPathPatternCompiler};
pub use pool::{Job, Placement, ReentrancyGuard, WaitPermit, WorkerPool};
pub use scalar::{Scalar, ScalarEvaluator, XPathEvaluator};
pub use task::{
    BranchContext, ForkCompletion, ForkCounter, Instruction, InstructionSet, NullRecorder, Scheduler, TaskEvent,
    TaskGraph, TaskKind, TaskMode, TaskRecorder,
};
