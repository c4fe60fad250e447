//! Arena-backed document tree.
//!
//! Nodes live in a single `Vec` and refer to each other through [`NodeId`]
//! handles, so parent/child/sibling links never form ownership cycles and every
//! direction of navigation is O(1). A `Document` is immutable once built and is
//! shared across worker threads behind an `Arc`.
//!
//! ```text
//! root (Document)
//!  └─ a (Element)            parent ▲   next_sibling ▶
//!      ├─ b (Element) ─▶ c (Element)
//!      └─ "text" (Text)
//! ```

use std::fmt;

/// Stable handle of a node inside its [`Document`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u32);

impl NodeId {
    /// Raw arena index.
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    Document,
    Element,
    Text,
}

#[derive(Debug, Clone)]
struct NodeData {
    kind: NodeKind,
    name: Option<String>,
    value: Option<String>,
    attributes: Vec<(String, String)>,
    parent: Option<NodeId>,
    first_child: Option<NodeId>,
    last_child: Option<NodeId>,
    prev_sibling: Option<NodeId>,
    next_sibling: Option<NodeId>,
}

impl NodeData {
    fn new(kind: NodeKind, name: Option<String>, value: Option<String>) -> Self {
        NodeData {
            kind,
            name,
            value,
            attributes: Vec::new(),
            parent: None,
            first_child: None,
            last_child: None,
            prev_sibling: None,
            next_sibling: None,
        }
    }
}

/// A tree of element and text nodes under a single document root.
#[derive(Debug, Clone)]
pub struct Document {
    nodes: Vec<NodeData>,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    /// Create a document containing only its root node.
    pub fn new() -> Self {
        Document { nodes: vec![NodeData::new(NodeKind::Document, None, None)] }
    }

    /// The designated document root.
    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    pub fn is_root(&self, id: NodeId) -> bool {
        id == self.root()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.len() == 1
    }

    /// Append a new element as the last child of `parent`.
    pub fn append_element(&mut self, parent: NodeId, name: &str) -> NodeId {
        self.append(parent, NodeData::new(NodeKind::Element, Some(name.to_string()), None))
    }

    /// Append a new text node as the last child of `parent`.
    pub fn append_text(&mut self, parent: NodeId, text: &str) -> NodeId {
        self.append(parent, NodeData::new(NodeKind::Text, None, Some(text.to_string())))
    }

    fn append(&mut self, parent: NodeId, mut data: NodeData) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        let prev = self.nodes[parent.index()].last_child;
        data.parent = Some(parent);
        data.prev_sibling = prev;
        self.nodes.push(data);

        match prev {
            Some(prev) => self.nodes[prev.index()].next_sibling = Some(id),
            None => self.nodes[parent.index()].first_child = Some(id),
        }
        self.nodes[parent.index()].last_child = Some(id);
        id
    }

    /// Set (or replace) an attribute on an element.
    pub fn set_attribute(&mut self, node: NodeId, name: &str, value: &str) {
        let attrs = &mut self.nodes[node.index()].attributes;
        match attrs.iter_mut().find(|(n, _)| n == name) {
            Some(slot) => slot.1 = value.to_string(),
            None => attrs.push((name.to_string(), value.to_string())),
        }
    }

    /// Build a chain of nested elements under the root and return the deepest.
    ///
    /// `path_chain(&["a", "b"])` yields `root/a/b` and returns `b`. An empty
    /// slice returns the root.
    pub fn path_chain(&mut self, names: &[&str]) -> NodeId {
        names.iter().fold(self.root(), |parent, name| self.append_element(parent, name))
    }

    pub fn kind(&self, id: NodeId) -> NodeKind {
        self.nodes[id.index()].kind
    }

    pub fn name(&self, id: NodeId) -> Option<&str> {
        self.nodes[id.index()].name.as_deref()
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id.index()].parent
    }

    pub fn first_child(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id.index()].first_child
    }

    pub fn next_sibling(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id.index()].next_sibling
    }

    pub fn prev_sibling(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id.index()].prev_sibling
    }

    pub fn attribute(&self, id: NodeId, name: &str) -> Option<&str> {
        self.nodes[id.index()].attributes.iter().find(|(n, _)| n == name).map(|(_, v)| v.as_str())
    }

    /// Iterate the direct children of `id` in document order.
    pub fn children(&self, id: NodeId) -> Children<'_> {
        Children { doc: self, next: self.first_child(id) }
    }

    /// Concatenated text of `id` and all its descendants.
    pub fn string_value(&self, id: NodeId) -> String {
        let data = &self.nodes[id.index()];
        if data.kind == NodeKind::Text {
            return data.value.clone().unwrap_or_default();
        }
        let mut out = String::new();
        self.collect_text(id, &mut out);
        out
    }

    fn collect_text(&self, id: NodeId, out: &mut String) {
        for child in self.children(id) {
            match self.kind(child) {
                NodeKind::Text => out.push_str(self.nodes[child.index()].value.as_deref().unwrap_or("")),
                _ => self.collect_text(child, out),
            }
        }
    }

    /// 1-based position of `id` among its siblings of the same kind and name.
    pub fn position(&self, id: NodeId) -> usize {
        let kind = self.kind(id);
        let name = self.name(id);
        let mut pos = 1;
        let mut cur = self.prev_sibling(id);
        while let Some(sib) = cur {
            if self.kind(sib) == kind && self.name(sib) == name {
                pos += 1;
            }
            cur = self.prev_sibling(sib);
        }
        pos
    }

    /// Number of siblings (including `id`) sharing its kind and name.
    pub fn sibling_count(&self, id: NodeId) -> usize {
        let Some(parent) = self.parent(id) else {
            return 1;
        };
        let kind = self.kind(id);
        let name = self.name(id);
        self.children(parent).filter(|&c| self.kind(c) == kind && self.name(c) == name).count()
    }

    /// All nodes in document order (pre-order, starting at the root).
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(cur) = stack.pop() {
            out.push(cur);
            let kids: Vec<NodeId> = self.children(cur).collect();
            stack.extend(kids.into_iter().rev());
        }
        out
    }
}

/// Iterator over the children of a node.
pub struct Children<'a> {
    doc: &'a Document,
    next: Option<NodeId>,
}

impl Iterator for Children<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let cur = self.next?;
        self.next = self.doc.next_sibling(cur);
        Some(cur)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn links_are_maintained_on_append() {
        let mut doc = Document::new();
        let root = doc.root();
        let a = doc.append_element(root, "a");
        let b = doc.append_element(a, "b");
        let c = doc.append_element(a, "c");
        let t = doc.append_text(c, "hi");

        assert_eq!(doc.parent(b), Some(a));
        assert_eq!(doc.next_sibling(b), Some(c));
        assert_eq!(doc.prev_sibling(c), Some(b));
        assert_eq!(doc.children(a).collect::<Vec<_>>(), vec![b, c]);
        assert_eq!(doc.kind(t), NodeKind::Text);
        assert_eq!(doc.string_value(a), "hi");
        assert!(doc.is_root(root));
        assert_eq!(doc.parent(root), None);
    }

    #[test]
    fn position_counts_same_named_siblings() {
        let mut doc = Document::new();
        let root = doc.root();
        let list = doc.append_element(root, "list");
        let first = doc.append_element(list, "item");
        doc.append_element(list, "other");
        let second = doc.append_element(list, "item");

        assert_eq!(doc.position(first), 1);
        assert_eq!(doc.position(second), 2);
        assert_eq!(doc.sibling_count(second), 2);
    }

    #[test]
    fn path_chain_nests_under_root() {
        let mut doc = Document::new();
        let leaf = doc.path_chain(&["a", "b", "c"]);
        let b = doc.parent(leaf).unwrap();
        let a = doc.parent(b).unwrap();
        assert_eq!(doc.name(a), Some("a"));
        assert_eq!(doc.parent(a), Some(doc.root()));
        assert_eq!(doc.descendants(doc.root()).len(), 4);
    }

    #[test]
    fn set_attribute_replaces_existing_value() {
        let mut doc = Document::new();
        let a = doc.append_element(doc.root(), "a");
        doc.set_attribute(a, "fork", "no");
        doc.set_attribute(a, "fork", "yes");
        assert_eq!(doc.attribute(a, "fork"), Some("yes"));
        assert_eq!(doc.attribute(a, "mode"), None);
    }
}
