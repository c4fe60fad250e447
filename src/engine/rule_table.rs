//! Rule registration and selection.
//!
//! Templates are registered once, in stylesheet order, and the table keeps that
//! order: it decides both which of several equally specific rules wins and which
//! `*` rule acts as the fallback for a mode.
//!
//! ```text
//! rules:  [ "/"  "a"  "b"  "a/b"  "*" ]      insertion order, never reordered
//!            │    │    │     │     │
//! mode ∅:  root  candidates ───┘  fallback
//! ```
//!
//! ## Registration
//!
//! - No pattern: the body is stored under its name (replacing any previous
//!   body for that name).
//! - A pattern containing `[` is registered as one rule, unsplit.
//! - Otherwise top-level `|` alternatives are registered separately with the
//!   same body.
//! - `/` and `*` are the ROOT and ALWAYS sentinels; anything else is compiled.
//! - Registering an existing `(pattern, mode)` pair replaces the body in place,
//!   so the rule keeps its position.
//!
//! ## Selection
//!
//! Only rules of the requested mode are considered. The root node is only ever
//! matched by a ROOT rule. Any other node goes to the PATTERN rule with the
//! greatest compiled depth (earliest registered on ties) and, failing that, to
//! the first ALWAYS rule.

use super::matcher::Matcher;
use crate::document::{Document, NodeId};
use crate::error::{Error, Result};
use crate::pattern::{Expr, PatternCompiler};
use std::collections::HashMap;
use tracing::{debug, trace};

/// Rule identifier (index into the rules vector).
pub type RuleId = usize;

/// How a rule is matched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MatchKind {
    /// `/`: the document root only.
    Root,
    /// `*`: fallback for any non-root node.
    Always,
    /// A compiled pattern.
    Pattern,
    /// Name-addressed; never matched against nodes.
    None,
}

/// The instructions executed when a rule wins.
///
/// A template without content still yields a (empty) body so that callers can
/// tell "matched, nothing to do" from "no rule".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Body {
    /// First instruction of a sibling run in the stylesheet document.
    Nodes(NodeId),
    Empty,
}

impl Body {
    /// The children of `template`, or [`Body::Empty`] if it has none.
    pub fn children_of(doc: &Document, template: NodeId) -> Body {
        doc.first_child(template).map_or(Body::Empty, Body::Nodes)
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Body::Empty)
    }

    /// Instruction nodes of this body in document order.
    pub fn instructions<'d>(&self, doc: &'d Document) -> impl Iterator<Item = NodeId> + 'd {
        let first = match self {
            Body::Nodes(id) => Some(*id),
            Body::Empty => None,
        };
        std::iter::successors(first, move |&id| doc.next_sibling(id))
    }
}

/// One compiled template entry.
#[derive(Debug, Clone)]
pub struct Rule {
    pub name: Option<String>,
    /// Normalized (trimmed) pattern text.
    pub pattern: Option<String>,
    pub mode: Option<String>,
    pub body: Body,
    pub kind: MatchKind,
    pub expr: Option<Expr>,
    /// Structural depth of `expr` (0 for sentinels and named rules).
    pub depth: usize,
    /// Declared priority. Recorded but not used by selection.
    pub priority: f64,
}

/// Per-mode selection index. Ids refer into `RuleTable::rules`.
#[derive(Debug, Default, Clone)]
struct ModeIndex {
    root: Option<RuleId>,
    candidates: Vec<RuleId>,
    fallback: Option<RuleId>,
}

/// Compiled template rules, indexed by mode.
#[derive(Debug, Default, Clone)]
pub struct RuleTable {
    rules: Vec<Rule>,
    keys: HashMap<(String, Option<String>), RuleId>,
    modes: Vec<(Option<String>, ModeIndex)>,
    named: HashMap<String, Rule>,
}

impl RuleTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of pattern, root and fallback rules.
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty() && self.named.is_empty()
    }

    /// Number of name-addressed rules.
    pub fn named_len(&self) -> usize {
        self.named.len()
    }

    /// Pattern, root and fallback rules in registration order.
    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    /// Register a template body under a name and/or a match pattern.
    pub fn register(
        &mut self,
        compiler: &dyn PatternCompiler,
        body: Body,
        name: Option<&str>,
        pattern: Option<&str>,
        mode: Option<&str>,
    ) -> Result<()> {
        self.register_with_priority(compiler, body, name, pattern, mode, 0.0)
    }

    pub(crate) fn register_with_priority(
        &mut self,
        compiler: &dyn PatternCompiler,
        body: Body,
        name: Option<&str>,
        pattern: Option<&str>,
        mode: Option<&str>,
        priority: f64,
    ) -> Result<()> {
        let Some(pattern) = pattern else {
            let name = name.ok_or(Error::AnonymousRule)?;
            if self.named.contains_key(name) {
                debug!(name, "replacing named template");
            }
            let rule = Rule {
                name: Some(name.to_string()),
                pattern: None,
                mode: mode.map(str::to_string),
                body,
                kind: MatchKind::None,
                expr: None,
                depth: 0,
                priority,
            };
            self.named.insert(name.to_string(), rule);
            return Ok(());
        };

        for alternative in split_alternatives(pattern.trim()) {
            self.add_match(compiler, body, alternative.trim(), mode, priority)?;
        }
        Ok(())
    }

    fn add_match(
        &mut self,
        compiler: &dyn PatternCompiler,
        body: Body,
        pattern: &str,
        mode: Option<&str>,
        priority: f64,
    ) -> Result<RuleId> {
        let key = (pattern.to_string(), mode.map(str::to_string));
        if let Some(&id) = self.keys.get(&key) {
            debug!(id, pattern, ?mode, "found existing template, replacing body");
            self.rules[id].body = body;
            return Ok(id);
        }

        let (kind, expr) = match pattern {
            "/" => (MatchKind::Root, None),
            "*" => (MatchKind::Always, None),
            _ => (MatchKind::Pattern, Some(compiler.compile(pattern)?)),
        };
        let depth = expr.as_ref().map_or(0, Expr::depth);

        let id = self.rules.len();
        self.rules.push(Rule {
            name: None,
            pattern: Some(pattern.to_string()),
            mode: key.1.clone(),
            body,
            kind,
            expr,
            depth,
            priority,
        });
        self.keys.insert(key, id);

        let index = self.mode_index_mut(mode);
        match kind {
            MatchKind::Root => {
                index.root.get_or_insert(id);
            }
            MatchKind::Always => {
                index.fallback.get_or_insert(id);
            }
            MatchKind::Pattern => index.candidates.push(id),
            MatchKind::None => {}
        }
        let compiled = self.rules[id].expr.as_ref().map(tracing::field::display);
        trace!(id, pattern, compiled, ?mode, ?kind, depth, "registered template");
        Ok(id)
    }

    fn mode_index(&self, mode: Option<&str>) -> Option<&ModeIndex> {
        self.modes.iter().find(|(m, _)| m.as_deref() == mode).map(|(_, index)| index)
    }

    fn mode_index_mut(&mut self, mode: Option<&str>) -> &mut ModeIndex {
        let pos = match self.modes.iter().position(|(m, _)| m.as_deref() == mode) {
            Some(pos) => pos,
            None => {
                self.modes.push((mode.map(str::to_string), ModeIndex::default()));
                self.modes.len() - 1
            }
        };
        &mut self.modes[pos].1
    }

    /// Select the rule that applies to `node` in `mode`.
    pub fn select(&self, matcher: &Matcher<'_>, node: NodeId, mode: Option<&str>) -> Option<&Rule> {
        let index = self.mode_index(mode)?;

        if matcher.document().is_root(node) {
            return index.root.map(|id| &self.rules[id]);
        }

        let mut best: Option<&Rule> = None;
        for &id in &index.candidates {
            let rule = &self.rules[id];
            if best.is_some_and(|b| rule.depth <= b.depth) {
                continue;
            }
            if matcher.matches(Some(node), rule.expr.as_ref()) {
                best = Some(rule);
            }
        }

        if let Some(rule) = best {
            trace!(%node, pattern = rule.pattern.as_deref(), depth = rule.depth, "selected template");
            return Some(rule);
        }
        index.fallback.map(|id| &self.rules[id])
    }

    /// Body of the template registered under `name`.
    pub fn lookup_by_name(&self, name: Option<&str>) -> Option<Body> {
        self.named.get(name?).map(|rule| rule.body)
    }
}

/// Split a trimmed pattern into its top-level `|` alternatives.
///
/// Patterns with a predicate bracket are never split; they go to the compiler
/// whole.
fn split_alternatives(pattern: &str) -> Vec<&str> {
    if pattern.contains('[') {
        return vec![pattern];
    }

    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    for (idx, ch) in pattern.char_indices() {
        match ch {
            '(' => depth += 1,
            ')' => depth = depth.saturating_sub(1),
            '|' if depth == 0 => {
                parts.push(&pattern[start..idx]);
                start = idx + 1;
            }
            _ => {}
        }
    }
    parts.push(&pattern[start..]);
    parts
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pattern::XPathPatternCompiler;

    #[test]
    fn split_respects_brackets_and_parens() {
        assert_eq!(split_alternatives("a|b"), vec!["a", "b"]);
        assert_eq!(split_alternatives("a | b/c"), vec!["a ", " b/c"]);
        assert_eq!(split_alternatives("a[1]|b"), vec!["a[1]|b"]);
        assert_eq!(split_alternatives("(a|b)/c|d"), vec!["(a|b)/c", "d"]);
        assert_eq!(split_alternatives("a"), vec!["a"]);
    }

    #[test]
    fn sentinels_get_their_own_kinds() {
        let mut table = RuleTable::new();
        table.register(&XPathPatternCompiler, Body::Empty, None, Some(" / "), None).unwrap();
        table.register(&XPathPatternCompiler, Body::Empty, None, Some("*"), None).unwrap();
        table.register(&XPathPatternCompiler, Body::Empty, None, Some("a/b"), None).unwrap();

        let kinds: Vec<MatchKind> = table.rules().iter().map(|r| r.kind).collect();
        assert_eq!(kinds, vec![MatchKind::Root, MatchKind::Always, MatchKind::Pattern]);
        assert_eq!(table.rules()[0].pattern.as_deref(), Some("/"));
        assert_eq!(table.rules()[2].depth, 2);
    }

    #[test]
    fn named_rules_replace_by_name() {
        let mut doc = Document::new();
        let first = doc.append_element(doc.root(), "first");
        let second = doc.append_element(doc.root(), "second");

        let mut table = RuleTable::new();
        table.register(&XPathPatternCompiler, Body::Nodes(first), Some("n"), None, None).unwrap();
        table.register(&XPathPatternCompiler, Body::Nodes(second), Some("n"), None, None).unwrap();

        assert_eq!(table.named_len(), 1);
        assert_eq!(table.len(), 0);
        assert_eq!(table.lookup_by_name(Some("n")), Some(Body::Nodes(second)));
        assert_eq!(table.lookup_by_name(Some("other")), None);
        assert_eq!(table.lookup_by_name(None), None);
    }

    #[test]
    fn anonymous_rule_is_rejected() {
        let mut table = RuleTable::new();
        let err = table.register(&XPathPatternCompiler, Body::Empty, None, None, None).unwrap_err();
        assert!(matches!(err, Error::AnonymousRule));
    }

    #[test]
    fn compile_errors_propagate() {
        let mut table = RuleTable::new();
        let err = table.register(&XPathPatternCompiler, Body::Empty, None, Some("a[@x"), None).unwrap_err();
        assert!(matches!(err, Error::Compile { .. }));
    }

    #[test]
    fn body_instructions_follow_siblings() {
        let mut doc = Document::new();
        let template = doc.append_element(doc.root(), "template");
        let one = doc.append_element(template, "value-of");
        let two = doc.append_element(template, "apply-templates");
        let empty = doc.append_element(doc.root(), "template");

        let body = Body::children_of(&doc, template);
        assert_eq!(body.instructions(&doc).collect::<Vec<_>>(), vec![one, two]);
        assert!(Body::children_of(&doc, empty).is_empty());
        assert_eq!(Body::Empty.instructions(&doc).count(), 0);
    }
}
