//! Scalar evaluation of predicate and comparison expressions.
//!
//! The matcher never interprets values itself. Whenever a pattern needs a
//! value (a comparison operand, a filter predicate, the operand of `not`) it
//! asks a [`ScalarEvaluator`], which turns an [`Expr`] into a [`Scalar`] at a
//! given node and knows how to compare, equate and truth-test scalars.
//!
//! [`XPathEvaluator`] is the built-in implementation. It covers the XPath 1.0
//! subset that appears in template predicates: forward relative paths, `@attr`,
//! literals, a handful of core functions, and numeric position predicates.

use crate::document::{Document, NodeId, NodeKind};
use crate::pattern::{CompareOp, Expr};
use std::cmp::Ordering;

/// A value produced by evaluating an expression at a node.
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    Number(f64),
    Str(String),
    Bool(bool),
    Nodes(Vec<NodeId>),
}

/// Evaluates expressions to scalars and compares them.
pub trait ScalarEvaluator: Send + Sync {
    /// Evaluate `expr` with `node` as the context node.
    fn evaluate(&self, doc: &Document, expr: &Expr, node: NodeId) -> Scalar;

    /// Three-way comparison. `None` when the operands are unordered (NaN).
    fn compare(&self, doc: &Document, lhs: &Scalar, rhs: &Scalar) -> Option<Ordering>;

    /// Equality test; `negate` turns it into the `!=` test.
    fn equals(&self, doc: &Document, lhs: &Scalar, rhs: &Scalar, negate: bool) -> bool;

    fn truthy(&self, value: &Scalar) -> bool;

    /// Whether `predicate` holds for `node` inside a filter.
    fn predicate_holds(&self, doc: &Document, predicate: &Expr, node: NodeId) -> bool {
        let value = self.evaluate(doc, predicate, node);
        self.truthy(&value)
    }
}

/// Built-in evaluator for the XPath pattern subset.
#[derive(Debug, Default, Clone, Copy)]
pub struct XPathEvaluator;

impl XPathEvaluator {
    /// Evaluate a path-shaped expression forwards from `node`.
    fn select_nodes(&self, doc: &Document, expr: &Expr, node: NodeId) -> Vec<NodeId> {
        let base = |parent: &Option<Box<Expr>>| match parent {
            Some(p) => self.select_nodes(doc, p, node),
            None => vec![node],
        };

        match expr {
            Expr::Root => vec![doc.root()],
            Expr::Context => vec![node],
            Expr::SelfNode(parent) => base(parent),
            Expr::Select { name, parent } => base(parent)
                .into_iter()
                .flat_map(|n| doc.children(n))
                .filter(|&c| doc.kind(c) == NodeKind::Element && doc.name(c) == Some(name.as_str()))
                .collect(),
            Expr::All(parent) => base(parent)
                .into_iter()
                .flat_map(|n| doc.children(n))
                .filter(|&c| doc.kind(c) == NodeKind::Element)
                .collect(),
            Expr::Filter { base, predicate } => self
                .select_nodes(doc, base, node)
                .into_iter()
                .filter(|&n| self.predicate_holds(doc, predicate, n))
                .collect(),
            Expr::Union(alts) => {
                let mut out: Vec<NodeId> = alts.iter().flat_map(|a| self.select_nodes(doc, a, node)).collect();
                out.sort_unstable();
                out.dedup();
                out
            }
            other => match self.evaluate(doc, other, node) {
                Scalar::Nodes(nodes) => nodes,
                _ => Vec::new(),
            },
        }
    }

    fn call(&self, doc: &Document, name: &str, args: &[Expr], node: NodeId) -> Scalar {
        let arg_nodes = |idx: usize| match args.get(idx) {
            Some(arg) => self.select_nodes(doc, arg, node),
            None => vec![node],
        };
        let arg_string = |idx: usize| match args.get(idx) {
            Some(arg) => self.string_of(doc, &self.evaluate(doc, arg, node)),
            None => doc.string_value(node),
        };

        match name {
            "text" => Scalar::Nodes(
                arg_nodes(0).into_iter().flat_map(|n| doc.children(n)).filter(|&c| doc.kind(c) == NodeKind::Text).collect(),
            ),
            "node" => Scalar::Nodes(arg_nodes(0).into_iter().flat_map(|n| doc.children(n)).collect()),
            "position" => Scalar::Number(doc.position(node) as f64),
            "last" => Scalar::Number(doc.sibling_count(node) as f64),
            "count" => Scalar::Number(arg_nodes(0).len() as f64),
            "name" => Scalar::Str(arg_nodes(0).first().and_then(|&n| doc.name(n)).unwrap_or("").to_string()),
            "string" => Scalar::Str(arg_string(0)),
            "number" => Scalar::Number(parse_number(&arg_string(0))),
            "true" => Scalar::Bool(true),
            "false" => Scalar::Bool(false),
            "contains" => Scalar::Bool(arg_string(0).contains(arg_string(1).as_str())),
            "starts-with" => Scalar::Bool(arg_string(0).starts_with(arg_string(1).as_str())),
            _ => Scalar::Nodes(Vec::new()),
        }
    }

    fn string_of(&self, doc: &Document, value: &Scalar) -> String {
        match value {
            Scalar::Str(s) => s.clone(),
            Scalar::Number(n) => format_number(*n),
            Scalar::Bool(b) => b.to_string(),
            Scalar::Nodes(nodes) => nodes.first().map(|&n| doc.string_value(n)).unwrap_or_default(),
        }
    }

    fn number_of(&self, doc: &Document, value: &Scalar) -> f64 {
        match value {
            Scalar::Number(n) => *n,
            Scalar::Bool(b) => f64::from(u8::from(*b)),
            other => parse_number(&self.string_of(doc, other)),
        }
    }

    fn compare_op(&self, doc: &Document, op: CompareOp, lhs: &Scalar, rhs: &Scalar) -> bool {
        match op {
            CompareOp::Eq => self.equals(doc, lhs, rhs, false),
            CompareOp::Ne => self.equals(doc, lhs, rhs, true),
            CompareOp::Lt => self.compare(doc, lhs, rhs) == Some(Ordering::Less),
            CompareOp::Le => matches!(self.compare(doc, lhs, rhs), Some(Ordering::Less | Ordering::Equal)),
            CompareOp::Gt => self.compare(doc, lhs, rhs) == Some(Ordering::Greater),
            CompareOp::Ge => matches!(self.compare(doc, lhs, rhs), Some(Ordering::Greater | Ordering::Equal)),
        }
    }

    fn atoms_equal(&self, doc: &Document, lhs: &Scalar, rhs: &Scalar) -> bool {
        match (lhs, rhs) {
            (Scalar::Bool(_), _) | (_, Scalar::Bool(_)) => self.truthy(lhs) == self.truthy(rhs),
            (Scalar::Number(_), _) | (_, Scalar::Number(_)) => self.number_of(doc, lhs) == self.number_of(doc, rhs),
            _ => self.string_of(doc, lhs) == self.string_of(doc, rhs),
        }
    }
}

impl ScalarEvaluator for XPathEvaluator {
    fn evaluate(&self, doc: &Document, expr: &Expr, node: NodeId) -> Scalar {
        match expr {
            Expr::Literal(s) => Scalar::Str(s.clone()),
            Expr::Number(n) => Scalar::Number(*n),
            Expr::Attribute(name) => match doc.attribute(node, name) {
                Some(value) => Scalar::Str(value.to_string()),
                None => Scalar::Nodes(Vec::new()),
            },
            Expr::Call { name, args } => self.call(doc, name, args, node),
            Expr::Compare { op, lhs, rhs } => {
                let lhs = self.evaluate(doc, lhs, node);
                let rhs = self.evaluate(doc, rhs, node);
                Scalar::Bool(self.compare_op(doc, *op, &lhs, &rhs))
            }
            Expr::Not(inner) => Scalar::Bool(!self.truthy(&self.evaluate(doc, inner, node))),
            Expr::Or(items) => Scalar::Bool(items.iter().any(|e| self.truthy(&self.evaluate(doc, e, node)))),
            Expr::And(items) => Scalar::Bool(items.iter().all(|e| self.truthy(&self.evaluate(doc, e, node)))),
            path => Scalar::Nodes(self.select_nodes(doc, path, node)),
        }
    }

    fn compare(&self, doc: &Document, lhs: &Scalar, rhs: &Scalar) -> Option<Ordering> {
        self.number_of(doc, lhs).partial_cmp(&self.number_of(doc, rhs))
    }

    fn equals(&self, doc: &Document, lhs: &Scalar, rhs: &Scalar, negate: bool) -> bool {
        // Node-sets compare existentially over their members' string values.
        match (lhs, rhs) {
            (Scalar::Nodes(l), Scalar::Nodes(r)) => l.iter().any(|&a| {
                let a = Scalar::Str(doc.string_value(a));
                r.iter().any(|&b| self.atoms_equal(doc, &a, &Scalar::Str(doc.string_value(b))) != negate)
            }),
            (Scalar::Nodes(nodes), Scalar::Bool(_)) | (Scalar::Bool(_), Scalar::Nodes(nodes)) => {
                let other = if matches!(lhs, Scalar::Bool(_)) { lhs } else { rhs };
                (self.truthy(other) == !nodes.is_empty()) != negate
            }
            (Scalar::Nodes(nodes), atom) | (atom, Scalar::Nodes(nodes)) => {
                nodes.iter().any(|&n| self.atoms_equal(doc, &Scalar::Str(doc.string_value(n)), atom) != negate)
            }
            _ => self.atoms_equal(doc, lhs, rhs) != negate,
        }
    }

    fn truthy(&self, value: &Scalar) -> bool {
        match value {
            Scalar::Number(n) => *n != 0.0 && !n.is_nan(),
            Scalar::Str(s) => !s.is_empty(),
            Scalar::Bool(b) => *b,
            Scalar::Nodes(nodes) => !nodes.is_empty(),
        }
    }

    /// Numeric predicates select by position; everything else is a truth test.
    fn predicate_holds(&self, doc: &Document, predicate: &Expr, node: NodeId) -> bool {
        match self.evaluate(doc, predicate, node) {
            Scalar::Number(n) => doc.position(node) as f64 == n,
            value => self.truthy(&value),
        }
    }
}

fn parse_number(s: &str) -> f64 {
    s.trim().parse().unwrap_or(f64::NAN)
}

fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.is_finite() { format!("{}", n as i64) } else { n.to_string() }
}
