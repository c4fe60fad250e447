//! Collect templates from a stylesheet document into a [`RuleTable`].
//!
//! The stylesheet is walked depth-first in document order and every element
//! named `template` (with or without an `xsl:` prefix) becomes one
//! registration. The pass runs on a single thread before any transformation
//! starts.

use super::rule_table::{Body, RuleTable};
use crate::document::{Document, NodeId, NodeKind};
use crate::error::Result;
use crate::pattern::PatternCompiler;
use tracing::{debug, warn};

/// Whether `node` is a template declaration.
pub fn is_template_element(doc: &Document, node: NodeId) -> bool {
    doc.kind(node) == NodeKind::Element && matches!(doc.name(node), Some("template" | "xsl:template"))
}

/// Build the rule table for `stylesheet`.
pub fn precompile(stylesheet: &Document, compiler: &dyn PatternCompiler) -> Result<RuleTable> {
    let mut table = RuleTable::new();
    let templates = stylesheet.descendants(stylesheet.root());
    for node in templates.into_iter().filter(|&node| is_template_element(stylesheet, node)) {
        let name = stylesheet.attribute(node, "name");
        let pattern = stylesheet.attribute(node, "match");
        let mode = stylesheet.attribute(node, "mode");
        let priority = match stylesheet.attribute(node, "priority") {
            Some(raw) => raw.trim().parse::<f64>().unwrap_or_else(|_| {
                warn!(%node, priority = raw, "ignoring malformed template priority");
                0.0
            }),
            None => 0.0,
        };
        let body = Body::children_of(stylesheet, node);

        // A template with both attributes is registered by pattern only.
        let name = if pattern.is_some() { None } else { name };
        if name.is_none() && pattern.is_none() {
            warn!(%node, "skipping template without name or match");
            continue;
        }
        table.register_with_priority(compiler, body, name, pattern, mode, priority)?;
    }

    debug!(rules = table.len(), named = table.named_len(), "precompiled stylesheet");
    Ok(table)
}
