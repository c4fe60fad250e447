//! Template rule dispatch engine.
//!
//! This module is the *static* half of a transformation: it turns the templates
//! of a stylesheet into an indexed [`RuleTable`] once, before any transformation
//! starts, and then answers "which template applies to this node in this mode?"
//! from any number of threads.
//!
//! ```text
//! stylesheet ── precompile (precompile.rs)
//!                  │  one register() per <template>
//!                  v
//!              RuleTable (rule_table.rs)
//!                  - alternation splitting, (pattern, mode) overrides
//!                  - per-mode index: root / candidates / fallback
//!                  │
//! (node, mode) ────┼─ select()
//!                  │     └─ Matcher::matches (matcher.rs)
//!                  │           backward walk over node + ancestors
//!                  v
//!          Option<&Rule>  (highest structural depth wins)
//! ```
//!
//! ## Responsibilities by module
//!
//! - `rule_table.rs`: registration, override semantics, specificity-ranked
//!   selection and name-addressed lookup.
//! - `matcher.rs`: the backward structural matcher over compiled patterns.
//! - `precompile.rs`: the single-threaded pass that collects templates from a
//!   stylesheet document.
//!
//! ## Invariants
//!
//! - `RuleId` indexes `RuleTable::rules`; every per-mode index refers into it and
//!   stays valid because rules are never removed.
//! - After precompilation the table is never mutated, so it can be shared
//!   behind an `Arc` without locks.

#[path = "engine/matcher.rs"]
mod matcher;
#[path = "engine/precompile.rs"]
mod precompile;
#[path = "engine/rule_table.rs"]
mod rule_table;

#[cfg(test)]
#[path = "engine/tests.rs"]
mod tests;

pub use matcher::Matcher;
pub use precompile::{is_template_element, precompile};
pub use rule_table::{Body, MatchKind, Rule, RuleId, RuleTable};
