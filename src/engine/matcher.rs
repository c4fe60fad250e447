//! Backward structural matching.
//!
//! A compiled pattern is tested *from the candidate node upwards*: a name test
//! consumes the node and hands the rest of the pattern to its parent, so the
//! recursion depth is bounded by the pattern, not by the document.
//!
//! ```text
//! pattern a/b      node <b> (parent <a>, grandparent root)
//!
//! Select(b) @ <b>   name ok ──▶ Select(a) @ <a>   name ok ──▶ None @ root  ✓
//! ```
//!
//! Value-producing sub-expressions (comparison operands, filter predicates, the
//! operand of `not`) are handed to the [`ScalarEvaluator`].

use crate::document::{Document, NodeId, NodeKind};
use crate::pattern::{CompareOp, Expr};
use crate::scalar::ScalarEvaluator;
use std::cmp::Ordering;

/// Matches compiled patterns against nodes of one document.
#[derive(Clone, Copy)]
pub struct Matcher<'a> {
    doc: &'a Document,
    evaluator: &'a dyn ScalarEvaluator,
}

impl std::fmt::Debug for Matcher<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Matcher").field("nodes", &self.doc.len()).field("evaluator", &"<evaluator>").finish()
    }
}

impl<'a> Matcher<'a> {
    pub fn new(doc: &'a Document, evaluator: &'a dyn ScalarEvaluator) -> Self {
        Matcher { doc, evaluator }
    }

    pub fn document(&self) -> &'a Document {
        self.doc
    }

    /// Whether `node` satisfies `pattern`.
    ///
    /// A missing node never matches. A missing pattern (no constraint) matches
    /// any present node.
    pub fn matches(&self, node: Option<NodeId>, pattern: Option<&Expr>) -> bool {
        let Some(node) = node else {
            return false;
        };
        let Some(pattern) = pattern else {
            return true;
        };
        let doc = self.doc;

        match pattern {
            Expr::Root => doc.is_root(node),
            Expr::Select { name, parent } => {
                doc.name(node) == Some(name.as_str()) && self.matches(doc.parent(node), parent.as_deref())
            }
            Expr::Context => true,
            Expr::SelfNode(inner) => self.matches(Some(node), inner.as_deref()),
            Expr::Filter { base, predicate } => {
                self.matches(Some(node), Some(base)) && self.evaluator.predicate_holds(doc, predicate, node)
            }
            Expr::Union(alts) => {
                // The node and every following sibling are candidates.
                let mut cur = Some(node);
                while let Some(candidate) = cur {
                    if alts.iter().any(|alt| self.matches(Some(candidate), Some(alt))) {
                        return true;
                    }
                    cur = doc.next_sibling(candidate);
                }
                false
            }
            Expr::All(inner) => self.matches(doc.parent(node), inner.as_deref()),
            Expr::Call { name, .. } => match name.as_str() {
                "text" => doc.kind(node) == NodeKind::Text,
                "node" => true,
                _ => false,
            },
            Expr::Compare { op, lhs, rhs } => {
                let lhs = self.evaluator.evaluate(doc, lhs, node);
                let rhs = self.evaluator.evaluate(doc, rhs, node);
                match op {
                    CompareOp::Eq => self.evaluator.equals(doc, &lhs, &rhs, false),
                    CompareOp::Ne => self.evaluator.equals(doc, &lhs, &rhs, true),
                    CompareOp::Lt => self.evaluator.compare(doc, &lhs, &rhs) == Some(Ordering::Less),
                    CompareOp::Le => {
                        matches!(self.evaluator.compare(doc, &lhs, &rhs), Some(Ordering::Less | Ordering::Equal))
                    }
                    CompareOp::Gt => self.evaluator.compare(doc, &lhs, &rhs) == Some(Ordering::Greater),
                    CompareOp::Ge => {
                        matches!(self.evaluator.compare(doc, &lhs, &rhs), Some(Ordering::Greater | Ordering::Equal))
                    }
                }
            }
            Expr::Not(inner) => !self.evaluator.truthy(&self.evaluator.evaluate(doc, inner, node)),
            Expr::Or(alts) => alts.iter().any(|alt| self.matches(Some(node), Some(alt))),
            Expr::And(alts) => alts.iter().all(|alt| self.matches(Some(node), Some(alt))),
            Expr::Literal(_) | Expr::Number(_) | Expr::Attribute(_) => false,
        }
    }
}
