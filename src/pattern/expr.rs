use std::fmt;

/// Relational and equality operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl CompareOp {
    pub fn symbol(self) -> &'static str {
        match self {
            CompareOp::Eq => "=",
            CompareOp::Ne => "!=",
            CompareOp::Lt => "<",
            CompareOp::Le => "<=",
            CompareOp::Gt => ">",
            CompareOp::Ge => ">=",
        }
    }
}

/// A compiled pattern or predicate expression.
///
/// In pattern position the tree reads backwards: `Select { name, parent }`
/// tests a node's name and hands `parent` to the node's parent. Inside a
/// predicate the scalar evaluator reads the same shapes as forward paths.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// The document root (`/`).
    Root,
    /// Name test on the current node; `parent` constrains the ancestor chain.
    Select { name: String, parent: Option<Box<Expr>> },
    /// Any node (a leading `.`).
    Context,
    /// A `.` step after other steps: re-tests the same node.
    SelfNode(Option<Box<Expr>>),
    /// `base[predicate]`.
    Filter { base: Box<Expr>, predicate: Box<Expr> },
    /// `a | b`, matched against the node and its following siblings.
    Union(Vec<Expr>),
    /// A `*` step: one ancestor level of any name.
    All(Option<Box<Expr>>),
    /// Function call or node-type test (`text()`, `node()`, `position()`...).
    Call { name: String, args: Vec<Expr> },
    Compare { op: CompareOp, lhs: Box<Expr>, rhs: Box<Expr> },
    Not(Box<Expr>),
    Or(Vec<Expr>),
    And(Vec<Expr>),
    Literal(String),
    Number(f64),
    /// `@name`
    Attribute(String),
}

impl Expr {
    /// Next expression along the primary chain, if any.
    fn primary(&self) -> Option<&Expr> {
        match self {
            Expr::Select { parent, .. } => parent.as_deref(),
            Expr::SelfNode(inner) | Expr::All(inner) => inner.as_deref(),
            Expr::Filter { base, .. } => Some(base),
            Expr::Union(alts) | Expr::Or(alts) | Expr::And(alts) => alts.first(),
            Expr::Call { args, .. } => args.first(),
            Expr::Compare { lhs, .. } => Some(lhs),
            Expr::Not(inner) => Some(inner),
            Expr::Root | Expr::Context | Expr::Literal(_) | Expr::Number(_) | Expr::Attribute(_) => None,
        }
    }

    /// Structural depth: the number of expressions along the primary chain.
    ///
    /// ```text
    /// a        Select(a)                      -> 1
    /// a/b      Select(b) -> Select(a)         -> 2
    /// /a/b     Select(b) -> Select(a) -> Root -> 3
    /// a[@x]    Filter -> Select(a)            -> 2
    /// ```
    pub fn depth(&self) -> usize {
        let mut depth = 0;
        let mut cur = Some(self);
        while let Some(expr) = cur {
            depth += 1;
            cur = expr.primary();
        }
        depth
    }

    pub(crate) fn boxed(self) -> Box<Expr> {
        Box::new(self)
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Root => write!(f, "/"),
            Expr::Select { name, parent: None } => write!(f, "{name}"),
            Expr::Select { name, parent: Some(p) } => match p.as_ref() {
                Expr::Root => write!(f, "/{name}"),
                p => write!(f, "{p}/{name}"),
            },
            Expr::Context => write!(f, "."),
            Expr::SelfNode(None) => write!(f, "."),
            Expr::SelfNode(Some(p)) => write!(f, "{p}/."),
            Expr::Filter { base, predicate } => write!(f, "{base}[{predicate}]"),
            Expr::Union(alts) => write_joined(f, alts, " | "),
            Expr::All(None) => write!(f, "*"),
            Expr::All(Some(p)) => write!(f, "{p}/*"),
            Expr::Call { name, args } => {
                write!(f, "{name}(")?;
                write_joined(f, args, ", ")?;
                write!(f, ")")
            }
            Expr::Compare { op, lhs, rhs } => write!(f, "{lhs} {} {rhs}", op.symbol()),
            Expr::Not(inner) => write!(f, "not({inner})"),
            Expr::Or(alts) => write_joined(f, alts, " or "),
            Expr::And(alts) => write_joined(f, alts, " and "),
            Expr::Literal(s) => write!(f, "'{s}'"),
            Expr::Number(n) => write!(f, "{n}"),
            Expr::Attribute(name) => write!(f, "@{name}"),
        }
    }
}

fn write_joined(f: &mut fmt::Formatter<'_>, items: &[Expr], sep: &str) -> fmt::Result {
    for (idx, item) in items.iter().enumerate() {
        if idx > 0 {
            f.write_str(sep)?;
        }
        write!(f, "{item}")?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn select(name: &str, parent: Option<Expr>) -> Expr {
        Expr::Select { name: name.to_string(), parent: parent.map(Expr::boxed) }
    }

    #[test]
    fn depth_follows_parent_chain() {
        assert_eq!(select("a", None).depth(), 1);
        assert_eq!(select("b", Some(select("a", None))).depth(), 2);
        assert_eq!(select("b", Some(select("a", Some(Expr::Root)))).depth(), 3);
    }

    #[test]
    fn depth_ignores_predicate_side() {
        let filtered = Expr::Filter {
            base: select("a", None).boxed(),
            predicate: Expr::Compare {
                op: CompareOp::Eq,
                lhs: Expr::Attribute("x".into()).boxed(),
                rhs: Expr::Literal("1".into()).boxed(),
            }
            .boxed(),
        };
        assert_eq!(filtered.depth(), 2);
    }

    #[test]
    fn display_reads_back_as_a_pattern() {
        let absolute = select("b", Some(select("a", Some(Expr::Root))));
        assert_eq!(absolute.to_string(), "/a/b");
        let filtered = Expr::Filter {
            base: Expr::All(Some(select("a", None).boxed())).boxed(),
            predicate: Expr::Compare {
                op: CompareOp::Ne,
                lhs: Expr::Attribute("x".into()).boxed(),
                rhs: Expr::Literal("1".into()).boxed(),
            }
            .boxed(),
        };
        assert_eq!(filtered.to_string(), "a/*[@x != '1']");
        let call = Expr::Call { name: "not".into(), args: vec![Expr::Number(2.0), Expr::Context] };
        assert_eq!(call.to_string(), "not(2, .)");
        assert_eq!(Expr::Union(vec![select("a", None), select("c", None)]).to_string(), "a | c");
    }

    #[test]
    fn depth_of_union_uses_first_alternative() {
        let union = Expr::Union(vec![select("b", Some(select("a", None))), select("c", None)]);
        assert_eq!(union.depth(), 3);
    }
}
