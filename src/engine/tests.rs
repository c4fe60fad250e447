use super::*;
use crate::document::{Document, NodeId};
use crate::pattern::XPathPatternCompiler;
use crate::scalar::XPathEvaluator;

/// Stylesheet document holding one marker element per body, so bodies can be
/// told apart by identity.
struct Bodies {
    doc: Document,
}

impl Bodies {
    fn new() -> Self {
        Bodies { doc: Document::new() }
    }

    fn make(&mut self, label: &str) -> Body {
        let root = self.doc.root();
        Body::Nodes(self.doc.append_element(root, label))
    }
}

fn register(table: &mut RuleTable, body: Body, pattern: &str, mode: Option<&str>) {
    table.register(&XPathPatternCompiler, body, None, Some(pattern), mode).unwrap();
}

fn select_pattern<'t>(table: &'t RuleTable, doc: &Document, node: NodeId, mode: Option<&str>) -> Option<&'t str> {
    let matcher = Matcher::new(doc, &XPathEvaluator);
    table.select(&matcher, node, mode).and_then(|rule| rule.pattern.as_deref())
}

#[test]
fn deeper_pattern_wins_over_registration_order() {
    let mut bodies = Bodies::new();
    let mut table = RuleTable::new();
    register(&mut table, bodies.make("root"), "/", None);
    register(&mut table, bodies.make("a"), "a", None);
    register(&mut table, bodies.make("ab"), "a/b", None);
    register(&mut table, bodies.make("b"), "b", None);

    let mut doc = Document::new();
    let b = doc.path_chain(&["a", "b"]);
    let a = doc.parent(b).unwrap();

    assert_eq!(select_pattern(&table, &doc, b, None), Some("a/b"));
    assert_eq!(select_pattern(&table, &doc, a, None), Some("a"));
    assert_eq!(select_pattern(&table, &doc, doc.root(), None), Some("/"));
}

#[test]
fn equal_depth_prefers_earlier_registration() {
    let mut bodies = Bodies::new();
    let first = bodies.make("first");
    let mut table = RuleTable::new();
    register(&mut table, first, "b", None);
    register(&mut table, bodies.make("second"), "node()", None);

    let mut doc = Document::new();
    let b = doc.path_chain(&["a", "b"]);
    let matcher = Matcher::new(&doc, &XPathEvaluator);
    let rule = table.select(&matcher, b, None).unwrap();
    assert_eq!(rule.body, first);
    assert_eq!(rule.depth, 1);
}

#[test]
fn alternation_registers_each_branch_with_the_same_body() {
    let mut bodies = Bodies::new();
    let shared = bodies.make("shared");
    let mut split = RuleTable::new();
    register(&mut split, shared, " a | b ", Some("m"));

    let mut separate = RuleTable::new();
    register(&mut separate, shared, "a", Some("m"));
    register(&mut separate, shared, "b", Some("m"));

    let summary = |table: &RuleTable| {
        table.rules().iter().map(|r| (r.pattern.clone(), r.mode.clone(), r.body, r.kind)).collect::<Vec<_>>()
    };
    assert_eq!(summary(&split), summary(&separate));
    assert_eq!(split.len(), 2);
}

#[test]
fn bracketed_alternation_stays_whole() {
    let mut bodies = Bodies::new();
    let mut table = RuleTable::new();
    register(&mut table, bodies.make("x"), "a[1]|b", None);
    assert_eq!(table.len(), 1);
    assert_eq!(table.rules()[0].pattern.as_deref(), Some("a[1]|b"));
    assert_eq!(table.rules()[0].kind, MatchKind::Pattern);
}

#[test]
fn reregistration_replaces_body_in_place() {
    let mut bodies = Bodies::new();
    let old = bodies.make("old");
    let new = bodies.make("new");
    let other = bodies.make("other");
    let mut table = RuleTable::new();
    register(&mut table, old, "b", None);
    register(&mut table, other, "node()", None);
    register(&mut table, new, "b", None);

    assert_eq!(table.len(), 2);
    assert_eq!(table.rules()[0].body, new);

    // Position is kept, so the replaced rule still beats the equal-depth one.
    let mut doc = Document::new();
    let b = doc.path_chain(&["b"]);
    let matcher = Matcher::new(&doc, &XPathEvaluator);
    assert_eq!(table.select(&matcher, b, None).map(|r| r.body), Some(new));

    // Same text in a different mode is a different rule.
    register(&mut table, old, "b", Some("m"));
    assert_eq!(table.len(), 3);
}

#[test]
fn root_rule_only_applies_to_the_root() {
    let mut bodies = Bodies::new();
    let mut table = RuleTable::new();
    register(&mut table, bodies.make("root"), "/", None);
    register(&mut table, bodies.make("any"), "*", None);
    register(&mut table, bodies.make("node"), "node()", None);

    let mut doc = Document::new();
    let a = doc.path_chain(&["a"]);
    assert_eq!(select_pattern(&table, &doc, doc.root(), None), Some("/"));
    assert_eq!(select_pattern(&table, &doc, a, None), Some("node()"));
}

#[test]
fn fallback_never_applies_to_the_root() {
    let mut bodies = Bodies::new();
    let mut table = RuleTable::new();
    register(&mut table, bodies.make("any"), "*", Some("m"));
    register(&mut table, bodies.make("root"), "/", None);

    let mut doc = Document::new();
    let a = doc.path_chain(&["a"]);
    assert_eq!(select_pattern(&table, &doc, doc.root(), Some("m")), None);
    assert_eq!(select_pattern(&table, &doc, a, Some("m")), Some("*"));
}

#[test]
fn fallback_override_keeps_a_single_fallback() {
    let mut bodies = Bodies::new();
    let second = bodies.make("second");
    let mut table = RuleTable::new();
    register(&mut table, bodies.make("first"), "*", None);
    register(&mut table, bodies.make("c"), "c", None);
    register(&mut table, second, "x | *", None);

    assert_eq!(table.len(), 3);
    assert_eq!(table.rules()[0].body, second);

    let mut doc = Document::new();
    let a = doc.path_chain(&["a"]);
    let matcher = Matcher::new(&doc, &XPathEvaluator);
    let rule = table.select(&matcher, a, None).unwrap();
    assert_eq!((rule.kind, rule.body), (MatchKind::Always, second));
}

#[test]
fn modes_partition_the_rule_set() {
    let mut bodies = Bodies::new();
    let mut table = RuleTable::new();
    register(&mut table, bodies.make("plain"), "a", None);
    register(&mut table, bodies.make("toc"), "a/b", Some("toc"));

    let mut doc = Document::new();
    let b = doc.path_chain(&["a", "b"]);
    let a = doc.parent(b).unwrap();
    assert_eq!(select_pattern(&table, &doc, a, None), Some("a"));
    assert_eq!(select_pattern(&table, &doc, a, Some("toc")), None);
    assert_eq!(select_pattern(&table, &doc, b, Some("toc")), Some("a/b"));
    assert_eq!(select_pattern(&table, &doc, b, None), None);
    assert_eq!(select_pattern(&table, &doc, b, Some("unknown")), None);
}

#[test]
fn predicates_and_type_tests_take_part_in_selection() {
    let mut bodies = Bodies::new();
    let mut table = RuleTable::new();
    register(&mut table, bodies.make("item"), "item", None);
    register(&mut table, bodies.make("hot"), "item[@hot = 'yes']", None);
    register(&mut table, bodies.make("text"), "text()", None);

    let mut doc = Document::new();
    let list = doc.append_element(doc.root(), "list");
    let cold = doc.append_element(list, "item");
    let hot = doc.append_element(list, "item");
    doc.set_attribute(hot, "hot", "yes");
    let text = doc.append_text(cold, "x");

    assert_eq!(select_pattern(&table, &doc, cold, None), Some("item"));
    assert_eq!(select_pattern(&table, &doc, hot, None), Some("item[@hot = 'yes']"));
    assert_eq!(select_pattern(&table, &doc, text, None), Some("text()"));
    assert_eq!(select_pattern(&table, &doc, list, None), None);
}

#[test]
fn longer_type_test_paths_are_more_specific() {
    let mut bodies = Bodies::new();
    let mut table = RuleTable::new();
    register(&mut table, bodies.make("short"), "b/text()", None);
    register(&mut table, bodies.make("long"), "a/b/text()", None);
    register(&mut table, bodies.make("any"), "b/node()", None);

    let mut doc = Document::new();
    let b = doc.path_chain(&["a", "b"]);
    let text = doc.append_text(b, "x");
    let other = doc.append_element(doc.root(), "b");
    let stray = doc.append_text(other, "y");

    assert_eq!(select_pattern(&table, &doc, text, None), Some("a/b/text()"));
    assert_eq!(select_pattern(&table, &doc, stray, None), Some("b/text()"));
    let depths: Vec<usize> = table.rules().iter().map(|rule| rule.depth).collect();
    assert_eq!(depths, [3, 4, 3]);
}

#[test]
fn named_lookup_is_independent_of_patterns() {
    let mut bodies = Bodies::new();
    let first = bodies.make("first");
    let second = bodies.make("second");
    let mut table = RuleTable::new();
    table.register(&XPathPatternCompiler, first, Some("footer"), None, None).unwrap();
    table.register(&XPathPatternCompiler, second, Some("footer"), None, None).unwrap();

    assert_eq!(table.lookup_by_name(Some("footer")), Some(second));
    assert_eq!(table.lookup_by_name(None), None);
    assert!(table.rules().is_empty());
}

#[test]
fn precompiled_stylesheet_selects_like_manual_registration() {
    let mut sheet = Document::new();
    let top = sheet.append_element(sheet.root(), "xsl:stylesheet");
    for pattern in ["/", "a", "a/b"] {
        let template = sheet.append_element(top, "xsl:template");
        sheet.set_attribute(template, "match", pattern);
        sheet.append_element(template, "apply-templates");
    }

    let table = precompile(&sheet, &XPathPatternCompiler).unwrap();
    let mut doc = Document::new();
    let b = doc.path_chain(&["a", "b"]);
    assert_eq!(select_pattern(&table, &doc, b, None), Some("a/b"));
    assert_eq!(select_pattern(&table, &doc, doc.root(), None), Some("/"));
    assert!(table.rules().iter().all(|r| !r.body.is_empty()));
}
