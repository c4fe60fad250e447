//! Per-branch scheduling state and instruction descriptors.

use super::fork::ForkCounter;
use crate::document::{Document, NodeId};
use crate::error::{Error, Result};
use std::str::FromStr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Concurrency policy of a branch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TaskMode {
    /// Never fork anywhere below.
    Single,
    /// Fork eligible instructions.
    #[default]
    Default,
    /// Fork only where an instruction says `fork="yes"`.
    Deny,
}

impl TaskMode {
    pub fn as_str(self) -> &'static str {
        match self {
            TaskMode::Single => "single",
            TaskMode::Default => "default",
            TaskMode::Deny => "deny",
        }
    }
}

impl FromStr for TaskMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "single" => Ok(TaskMode::Single),
            "default" => Ok(TaskMode::Default),
            "deny" => Ok(TaskMode::Deny),
            _ => Err(Error::Config { key: "task mode", value: s.to_string() }),
        }
    }
}

static NEXT_BRANCH: AtomicU64 = AtomicU64::new(1);

/// Scheduling state carried by the call stack processing one subtree.
///
/// The mode is inherited by [`child`](Self::child) contexts. The fork counter,
/// when present, is shared with every context derived while it is attached.
#[derive(Debug, Clone)]
pub struct BranchContext {
    pub id: u64,
    pub parent: Option<u64>,
    pub mode: TaskMode,
    pub fork: Option<Arc<ForkCounter>>,
}

impl BranchContext {
    pub fn new(mode: TaskMode) -> Self {
        BranchContext { id: NEXT_BRANCH.fetch_add(1, Ordering::Relaxed), parent: None, mode, fork: None }
    }

    /// A context for work spawned from this one.
    pub fn child(&self) -> Self {
        BranchContext {
            id: NEXT_BRANCH.fetch_add(1, Ordering::Relaxed),
            parent: Some(self.id),
            mode: self.mode,
            fork: self.fork.clone(),
        }
    }
}

bitflags::bitflags! {
    /// Instruction kinds, used for the set of instructions that fork by default.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct InstructionSet: u16 {
        const APPLY_TEMPLATES = 1 << 0;
        const CALL_TEMPLATE   = 1 << 1;
        const FOR_EACH        = 1 << 2;
        const VALUE_OF        = 1 << 3;
        const COPY_OF         = 1 << 4;
        const ELEMENT         = 1 << 5;
        const ATTRIBUTE       = 1 << 6;
        const IF              = 1 << 7;
        const CHOOSE          = 1 << 8;
        const VARIABLE        = 1 << 9;
        const COPY            = 1 << 10;
        const TEXT            = 1 << 11;
    }
}

const INSTRUCTION_NAMES: &[(&str, InstructionSet)] = &[
    ("apply-templates", InstructionSet::APPLY_TEMPLATES),
    ("call-template", InstructionSet::CALL_TEMPLATE),
    ("for-each", InstructionSet::FOR_EACH),
    ("value-of", InstructionSet::VALUE_OF),
    ("copy-of", InstructionSet::COPY_OF),
    ("element", InstructionSet::ELEMENT),
    ("attribute", InstructionSet::ATTRIBUTE),
    ("if", InstructionSet::IF),
    ("choose", InstructionSet::CHOOSE),
    ("variable", InstructionSet::VARIABLE),
    ("copy", InstructionSet::COPY),
    ("text", InstructionSet::TEXT),
];

impl InstructionSet {
    /// The kind for an instruction element name (`xsl:` prefix optional).
    /// Unknown names map to the empty set.
    pub fn from_instruction_name(name: &str) -> Self {
        let local = name.strip_prefix("xsl:").unwrap_or(name);
        INSTRUCTION_NAMES.iter().find(|(n, _)| *n == local).map_or(InstructionSet::empty(), |(_, kind)| *kind)
    }

    /// Parse a comma-separated list of instruction names.
    pub fn parse_list(list: &str) -> Result<Self> {
        list.split(',').map(str::trim).filter(|name| !name.is_empty()).try_fold(Self::empty(), |set, name| {
            match Self::from_instruction_name(name) {
                kind if kind.is_empty() => Err(Error::Config { key: "parallel instructions", value: name.to_string() }),
                kind => Ok(set | kind),
            }
        })
    }

    /// Instruction names in this set, in declaration order.
    pub fn names(self) -> Vec<&'static str> {
        INSTRUCTION_NAMES.iter().filter(|(_, kind)| self.contains(*kind)).map(|(name, _)| *name).collect()
    }
}

impl Default for InstructionSet {
    fn default() -> Self {
        InstructionSet::APPLY_TEMPLATES | InstructionSet::CALL_TEMPLATE | InstructionSet::FOR_EACH
    }
}

/// One stylesheet instruction as seen by the scheduler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instruction {
    pub node: NodeId,
    pub name: String,
    pub kind: InstructionSet,
    /// Raw `fork` attribute.
    pub fork: Option<String>,
}

impl Instruction {
    pub fn new(node: NodeId, name: &str, fork: Option<&str>) -> Self {
        let kind = InstructionSet::from_instruction_name(name);
        Instruction { node, name: name.to_string(), kind, fork: fork.map(str::to_string) }
    }

    /// Describe the instruction element `node` of `stylesheet`.
    pub fn from_node(stylesheet: &Document, node: NodeId) -> Self {
        Self::new(node, stylesheet.name(node).unwrap_or_default(), stylesheet.attribute(node, "fork"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn task_mode_parses_case_insensitively() {
        assert_eq!("DENY".parse::<TaskMode>().unwrap(), TaskMode::Deny);
        assert_eq!(" single ".parse::<TaskMode>().unwrap(), TaskMode::Single);
        assert!(matches!("fast".parse::<TaskMode>(), Err(Error::Config { .. })));
    }

    #[test]
    fn children_inherit_mode_and_counter() {
        let mut ctx = BranchContext::new(TaskMode::Deny);
        ctx.fork = Some(Arc::new(ForkCounter::new(1)));
        let child = ctx.child();
        assert_eq!(child.parent, Some(ctx.id));
        assert_ne!(child.id, ctx.id);
        assert_eq!(child.mode, TaskMode::Deny);
        assert!(Arc::ptr_eq(child.fork.as_ref().unwrap(), ctx.fork.as_ref().unwrap()));
    }

    #[test]
    fn instruction_kinds() {
        assert_eq!(InstructionSet::from_instruction_name("xsl:for-each"), InstructionSet::FOR_EACH);
        assert_eq!(InstructionSet::from_instruction_name("apply-templates"), InstructionSet::APPLY_TEMPLATES);
        assert!(InstructionSet::from_instruction_name("xsl:sort").is_empty());
        // Flag names stay addressable through the generated lookup.
        assert_eq!(InstructionSet::from_name("FOR_EACH"), Some(InstructionSet::FOR_EACH));

        let set = InstructionSet::parse_list("value-of, xsl:if,").unwrap();
        assert_eq!(set, InstructionSet::VALUE_OF | InstructionSet::IF);
        assert_eq!(set.names(), vec!["value-of", "if"]);
        assert!(InstructionSet::parse_list("value-of,sort").is_err());
        assert_eq!(InstructionSet::parse_list("").unwrap(), InstructionSet::empty());
    }

    #[test]
    fn instruction_from_stylesheet_node() {
        let mut doc = Document::new();
        let node = doc.append_element(doc.root(), "xsl:apply-templates");
        doc.set_attribute(node, "fork", "no");
        let instruction = Instruction::from_node(&doc, node);
        assert_eq!(instruction.kind, InstructionSet::APPLY_TEMPLATES);
        assert_eq!(instruction.fork.as_deref(), Some("no"));
    }
}
