use crate::config::Options;
use crate::document::{Document, NodeId, NodeKind};
use crate::engine::{self, Body, MatchKind, Matcher, Rule, RuleTable};
use crate::error::{Error, Result};
use crate::pattern::{PatternCompiler, XPathPatternCompiler};
use crate::scalar::{ScalarEvaluator, XPathEvaluator};
use crate::task::{BranchContext, Instruction, InstructionSet, Scheduler, TaskEvent, TaskGraph};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};
use tracing::debug;

/// A stylesheet with its templates compiled into a [`RuleTable`].
///
/// Immutable once built; share it behind an `Arc` between runs and threads.
#[derive(Debug)]
pub struct Stylesheet {
    document: Document,
    rules: RuleTable,
    /// Time spent in precompilation.
    pub compile_time: Duration,
}

impl Stylesheet {
    /// Compile `document` with the built-in XPath pattern compiler.
    pub fn compile(document: Document) -> Result<Self> {
        Self::compile_with(document, &XPathPatternCompiler)
    }

    pub fn compile_with(document: Document, compiler: &dyn PatternCompiler) -> Result<Self> {
        let start = Instant::now();
        let rules = engine::precompile(&document, compiler)?;
        Ok(Stylesheet { document, rules, compile_time: start.elapsed() })
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    pub fn rules(&self) -> &RuleTable {
        &self.rules
    }

    /// The template that applies to `node` of `source` in `mode`.
    pub fn select(&self, source: &Document, node: NodeId, mode: Option<&str>) -> Option<&Rule> {
        self.select_with(source, node, mode, &XPathEvaluator)
    }

    pub fn select_with(
        &self,
        source: &Document,
        node: NodeId,
        mode: Option<&str>,
        evaluator: &dyn ScalarEvaluator,
    ) -> Option<&Rule> {
        self.rules.select(&Matcher::new(source, evaluator), node, mode)
    }

    /// Body of the template called `name`.
    pub fn lookup(&self, name: &str) -> Option<Body> {
        self.rules.lookup_by_name(Some(name))
    }
}

/// The rule chosen for one visited node.
#[derive(Debug, Clone, PartialEq)]
pub struct Selection {
    pub node: NodeId,
    /// Location of the node, e.g. `/a/b`.
    pub path: String,
    pub mode: Option<String>,
    /// Pattern text of the winning rule; `None` when no rule matched.
    pub pattern: Option<String>,
    pub kind: Option<MatchKind>,
    pub depth: usize,
}

/// Result from [`apply`] and [`apply_with`].
#[derive(Debug, Clone)]
pub struct RunResult {
    /// One entry per visited node, in node order.
    pub selections: Vec<Selection>,
    /// Scheduling decisions in recording order.
    pub events: Vec<TaskEvent>,
    pub serial: usize,
    pub parallel: usize,
    /// Total elapsed time for the run.
    pub elapsed: Duration,
}

/// Walk `source` from its root with default [`Options`].
pub fn apply(stylesheet: Arc<Stylesheet>, source: Arc<Document>) -> Result<RunResult> {
    apply_with(stylesheet, source, &Options::default())
}

/// Walk `source` from its root, selecting a template for every visited node
/// and scheduling each template instruction through a [`Scheduler`] built from
/// `options`.
///
/// `apply-templates` instructions continue the walk with the node's children
/// (in the mode named by their `mode` attribute); other instructions are only
/// scheduled. Nodes without a matching template have their children processed
/// in the same mode.
pub fn apply_with(stylesheet: Arc<Stylesheet>, source: Arc<Document>, options: &Options) -> Result<RunResult> {
    let start = Instant::now();
    let graph = Arc::new(TaskGraph::new());
    let scheduler = Scheduler::new(options.threads, options.parallel, graph.clone());
    debug!(threads = options.threads, parallel = ?scheduler.parallel(), mode = ?options.mode, "starting run");
    let walk = Arc::new(Walk { stylesheet, source, scheduler, selections: Mutex::default(), failure: Mutex::default() });

    let mut ctx = BranchContext::new(options.task_mode);
    let root = walk.source.root();
    let mode = options.mode.clone();
    let task = Arc::clone(&walk);
    walk.scheduler.run_and_wait(&mut ctx, move |branch| {
        if let Err(err) = task.visit(root, mode, branch) {
            task.fail(err);
        }
    })?;
    // Without a reserved root the walk ran inline and its forks are not
    // counted; drain them before reading the results.
    if let Some(pool) = walk.scheduler.pool() {
        pool.wait_idle()?;
    }

    if let Some(err) = walk.failure.lock().unwrap_or_else(PoisonError::into_inner).take() {
        return Err(err);
    }

    let mut selections = std::mem::take(&mut *walk.selections.lock().unwrap_or_else(PoisonError::into_inner));
    selections.sort_by_key(|s| s.node.index());
    let result = RunResult {
        selections,
        events: graph.events(),
        serial: graph.serial_count(),
        parallel: graph.parallel_count(),
        elapsed: start.elapsed(),
    };
    debug!(visited = result.selections.len(), serial = result.serial, parallel = result.parallel, "run finished");
    Ok(result)
}

struct Walk {
    stylesheet: Arc<Stylesheet>,
    source: Arc<Document>,
    scheduler: Scheduler,
    selections: Mutex<Vec<Selection>>,
    failure: Mutex<Option<Error>>,
}

impl Walk {
    fn visit(self: &Arc<Self>, node: NodeId, mode: Option<String>, ctx: BranchContext) -> Result<()> {
        let rule = self.stylesheet.select(&self.source, node, mode.as_deref());
        self.record(node, mode.as_deref(), rule);

        let Some(rule) = rule else {
            // No template: carry on with the children.
            self.apply_children(node, mode, &ctx);
            return Ok(());
        };

        let sheet = self.stylesheet.document();
        for item in rule.body.instructions(sheet).filter(|&item| sheet.kind(item) == NodeKind::Element) {
            let instruction = Instruction::from_node(sheet, item);
            let mut branch = ctx.child();
            if instruction.kind == InstructionSet::APPLY_TEMPLATES {
                let walk = Arc::clone(self);
                let next_mode = sheet.attribute(item, "mode").map(str::to_string);
                self.scheduler.dispatch(&instruction, &mut branch, move |branch| {
                    walk.apply_children(node, next_mode, &branch);
                })?;
            } else {
                self.scheduler.dispatch(&instruction, &mut branch, |_| {})?;
            }
        }
        Ok(())
    }

    fn apply_children(self: &Arc<Self>, node: NodeId, mode: Option<String>, ctx: &BranchContext) {
        for child in self.source.children(node) {
            if let Err(err) = self.visit(child, mode.clone(), ctx.child()) {
                self.fail(err);
            }
        }
    }

    fn record(&self, node: NodeId, mode: Option<&str>, rule: Option<&Rule>) {
        let selection = Selection {
            node,
            path: node_path(&self.source, node),
            mode: mode.map(str::to_string),
            pattern: rule.and_then(|r| r.pattern.clone()),
            kind: rule.map(|r| r.kind),
            depth: rule.map_or(0, |r| r.depth),
        };
        self.selections.lock().unwrap_or_else(PoisonError::into_inner).push(selection);
    }

    fn fail(&self, err: Error) {
        let mut failure = self.failure.lock().unwrap_or_else(PoisonError::into_inner);
        if failure.is_none() {
            *failure = Some(err);
        }
    }
}

fn node_path(doc: &Document, node: NodeId) -> String {
    if doc.is_root(node) {
        return "/".to_string();
    }
    let mut steps = Vec::new();
    let mut cur = Some(node);
    while let Some(id) = cur.filter(|&id| !doc.is_root(id)) {
        steps.push(match doc.kind(id) {
            NodeKind::Text => "text()".to_string(),
            _ => doc.name(id).unwrap_or_default().to_string(),
        });
        cur = doc.parent(id);
    }
    steps.reverse();
    format!("/{}", steps.join("/"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::{TaskKind, TaskMode};

    fn stylesheet(templates: &[(&str, Option<&str>, &[(&str, Option<&str>)])]) -> Arc<Stylesheet> {
        let mut doc = Document::new();
        let top = doc.append_element(doc.root(), "xsl:stylesheet");
        for (pattern, mode, body) in templates {
            let template = doc.append_element(top, "xsl:template");
            doc.set_attribute(template, "match", pattern);
            if let Some(mode) = mode {
                doc.set_attribute(template, "mode", mode);
            }
            for (name, fork) in body.iter() {
                let instruction = doc.append_element(template, name);
                if let Some(fork) = fork {
                    doc.set_attribute(instruction, "fork", fork);
                }
            }
        }
        Arc::new(Stylesheet::compile(doc).unwrap())
    }

    fn source() -> Arc<Document> {
        let mut doc = Document::new();
        let a = doc.append_element(doc.root(), "a");
        doc.append_element(a, "b");
        doc.append_element(a, "b");
        Arc::new(doc)
    }

    fn patterns(result: &RunResult) -> Vec<(String, Option<String>)> {
        result.selections.iter().map(|s| (s.path.clone(), s.pattern.clone())).collect()
    }

    #[test]
    fn node_paths() {
        let mut doc = Document::new();
        let b = doc.path_chain(&["a", "b"]);
        let t = doc.append_text(b, "x");
        assert_eq!(node_path(&doc, doc.root()), "/");
        assert_eq!(node_path(&doc, b), "/a/b");
        assert_eq!(node_path(&doc, t), "/a/b/text()");
    }

    #[test]
    fn walk_selects_the_most_specific_rule_per_node() {
        let apply = &[("xsl:apply-templates", None)][..];
        let sheet = stylesheet(&[("/", None, apply), ("a", None, apply), ("a/b", None, &[("xsl:value-of", None)])]);
        for threads in [0, 1, 4] {
            let options = Options { threads, ..Options::default() };
            let result = apply_with(Arc::clone(&sheet), source(), &options).unwrap();
            assert_eq!(
                patterns(&result),
                vec![
                    ("/".to_string(), Some("/".to_string())),
                    ("/a".to_string(), Some("a".to_string())),
                    ("/a/b".to_string(), Some("a/b".to_string())),
                    ("/a/b".to_string(), Some("a/b".to_string())),
                ],
                "threads = {threads}"
            );
        }
    }

    #[test]
    fn unmatched_nodes_fall_through_to_children() {
        let sheet = stylesheet(&[("b", None, &[])]);
        let result = apply_with(sheet, source(), &Options { threads: 2, ..Options::default() }).unwrap();
        let found: Vec<Option<&str>> = result.selections.iter().map(|s| s.pattern.as_deref()).collect();
        assert_eq!(found, vec![None, None, Some("b"), Some("b")]);
        assert_eq!(result.serial, 0);
        assert_eq!(result.parallel, 1);
    }

    #[test]
    fn modes_switch_through_apply_templates() {
        let mut doc = Document::new();
        let top = doc.append_element(doc.root(), "xsl:stylesheet");
        let root = doc.append_element(top, "xsl:template");
        doc.set_attribute(root, "match", "/");
        let apply = doc.append_element(root, "xsl:apply-templates");
        doc.set_attribute(apply, "mode", "toc");
        let toc = doc.append_element(top, "xsl:template");
        doc.set_attribute(toc, "match", "a");
        doc.set_attribute(toc, "mode", "toc");
        let sheet = Arc::new(Stylesheet::compile(doc).unwrap());

        let result = apply_with(sheet, source(), &Options { threads: 2, ..Options::default() }).unwrap();
        assert_eq!(result.selections.len(), 2);
        assert_eq!(result.selections[1].mode.as_deref(), Some("toc"));
        assert_eq!(result.selections[1].pattern.as_deref(), Some("a"));
    }

    #[test]
    fn scheduling_follows_task_mode() {
        let apply = &[("xsl:apply-templates", None)][..];
        let sheet = stylesheet(&[("/", None, apply), ("a", None, apply), ("b", None, &[("xsl:value-of", Some("no"))])]);

        let single = Options { threads: 2, task_mode: TaskMode::Single, ..Options::default() };
        let result = apply_with(Arc::clone(&sheet), source(), &single).unwrap();
        assert_eq!(result.parallel, 1);
        assert_eq!(result.serial, 0);
        assert_eq!(result.events[0].instruction, None);

        let deny = Options { threads: 2, task_mode: TaskMode::Deny, ..Options::default() };
        let result = apply_with(Arc::clone(&sheet), source(), &deny).unwrap();
        assert_eq!(result.serial, 4);
        assert!(result.events.iter().skip(1).all(|e| e.kind == TaskKind::Serial));

        let default = Options { threads: 2, ..Options::default() };
        let result = apply_with(sheet, source(), &default).unwrap();
        assert_eq!(result.parallel, 3);
        assert_eq!(result.serial, 2);
        assert_eq!(result.selections.len(), 4);
    }

    #[test]
    fn stylesheet_lookup_and_select() {
        let mut doc = Document::new();
        let top = doc.append_element(doc.root(), "stylesheet");
        let named = doc.append_element(top, "template");
        doc.set_attribute(named, "name", "footer");
        let body = doc.append_element(named, "value-of");
        let matched = doc.append_element(top, "template");
        doc.set_attribute(matched, "match", "b");
        let sheet = Stylesheet::compile(doc).unwrap();

        assert_eq!(sheet.lookup("footer"), Some(Body::Nodes(body)));
        assert_eq!(sheet.lookup("header"), None);

        let src = source();
        let b = src.descendants(src.root())[2];
        assert_eq!(sheet.select(&src, b, None).and_then(|r| r.pattern.as_deref()), Some("b"));
        assert!(sheet.select(&src, src.root(), None).is_none());
    }

    #[test]
    fn compile_errors_surface() {
        let mut doc = Document::new();
        let template = doc.append_element(doc.root(), "template");
        doc.set_attribute(template, "match", "a[");
        assert!(matches!(Stylesheet::compile(doc), Err(Error::Compile { .. })));
    }
}
