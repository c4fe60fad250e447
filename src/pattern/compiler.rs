//! Recursive-descent pattern compiler.
//!
//! Grammar (lowest precedence first):
//!
//! ```text
//! or       := and ('or' and)*
//! and      := equality ('and' equality)*
//! equality := relation (('=' | '!=') relation)*
//! relation := union (('<' | '<=' | '>' | '>=') union)*
//! union    := path ('|' path)*
//! path     := literal | number | '@' name | '(' or ')' | call | location
//! location := ('/' | '//')? step ('/' step)*
//! step     := (name | '*' | '.' | 'text()' | 'node()') ('[' or ']')*
//! ```
//!
//! Location paths are built backwards: each step wraps the steps before it as
//! its `parent` chain. A `text()`/`node()` step in pattern position becomes
//! `And[All(previous steps), type test]`: the chain climbs to the parent while
//! the type test applies to the node. The chain comes first so it stays on the
//! primary path and counts toward specificity. Inside predicates it is a plain
//! call whose argument is the previous steps.

use super::PatternCompiler;
use super::expr::{CompareOp, Expr};
use super::lexer::{Token, tokenize};
use crate::error::{Error, Result};

const FUNCTIONS: &[&str] =
    &["position", "last", "count", "name", "string", "not", "true", "false", "contains", "starts-with", "number"];

/// Built-in compiler for the XPath pattern subset used by templates.
#[derive(Debug, Default, Clone, Copy)]
pub struct XPathPatternCompiler;

impl PatternCompiler for XPathPatternCompiler {
    fn compile(&self, text: &str) -> Result<Expr> {
        if text.trim().is_empty() {
            return Err(Error::compile(text, "empty pattern"));
        }
        let tokens = tokenize(text)?;
        let mut parser = Parser { text, tokens, pos: 0, predicate_depth: 0 };
        let expr = parser.parse_or()?;
        if let Some(tok) = parser.peek() {
            return Err(Error::compile(text, format!("unexpected token {tok:?}")));
        }
        Ok(expr)
    }
}

struct Parser<'t> {
    text: &'t str,
    tokens: Vec<Token>,
    pos: usize,
    predicate_depth: usize,
}

impl Parser<'_> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn peek_at(&self, offset: usize) -> Option<&Token> {
        self.tokens.get(self.pos + offset)
    }

    fn advance(&mut self) -> Option<Token> {
        let tok = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        tok
    }

    fn error(&self, reason: impl Into<String>) -> Error {
        Error::compile(self.text, reason)
    }

    fn expect(&mut self, want: Token) -> Result<()> {
        match self.advance() {
            Some(tok) if tok == want => Ok(()),
            Some(tok) => Err(self.error(format!("expected {want:?}, found {tok:?}"))),
            None => Err(self.error(format!("expected {want:?}, found end of pattern"))),
        }
    }

    fn at_keyword(&self, keyword: &str) -> bool {
        matches!(self.peek(), Some(Token::Name(n)) if n == keyword)
    }

    fn parse_or(&mut self) -> Result<Expr> {
        let mut items = vec![self.parse_and()?];
        while self.at_keyword("or") {
            self.advance();
            items.push(self.parse_and()?);
        }
        Ok(if items.len() == 1 { items.remove(0) } else { Expr::Or(items) })
    }

    fn parse_and(&mut self) -> Result<Expr> {
        let mut items = vec![self.parse_equality()?];
        while self.at_keyword("and") {
            self.advance();
            items.push(self.parse_equality()?);
        }
        Ok(if items.len() == 1 { items.remove(0) } else { Expr::And(items) })
    }

    fn parse_equality(&mut self) -> Result<Expr> {
        let mut lhs = self.parse_relation()?;
        while let Some(Token::Op(op @ (CompareOp::Eq | CompareOp::Ne))) = self.peek() {
            let op = *op;
            self.advance();
            let rhs = self.parse_relation()?;
            lhs = Expr::Compare { op, lhs: lhs.boxed(), rhs: rhs.boxed() };
        }
        Ok(lhs)
    }

    fn parse_relation(&mut self) -> Result<Expr> {
        let mut lhs = self.parse_union()?;
        while let Some(Token::Op(op @ (CompareOp::Lt | CompareOp::Le | CompareOp::Gt | CompareOp::Ge))) = self.peek() {
            let op = *op;
            self.advance();
            let rhs = self.parse_union()?;
            lhs = Expr::Compare { op, lhs: lhs.boxed(), rhs: rhs.boxed() };
        }
        Ok(lhs)
    }

    fn parse_union(&mut self) -> Result<Expr> {
        let mut items = vec![self.parse_path()?];
        while self.peek() == Some(&Token::Pipe) {
            self.advance();
            items.push(self.parse_path()?);
        }
        Ok(if items.len() == 1 { items.remove(0) } else { Expr::Union(items) })
    }

    fn parse_path(&mut self) -> Result<Expr> {
        match self.peek() {
            Some(Token::Literal(s)) => {
                let s = s.clone();
                self.advance();
                Ok(Expr::Literal(s))
            }
            Some(Token::Number(n)) => {
                let n = *n;
                self.advance();
                Ok(Expr::Number(n))
            }
            Some(Token::At) => {
                self.advance();
                match self.advance() {
                    Some(Token::Name(name)) => Ok(Expr::Attribute(name)),
                    _ => Err(self.error("expected attribute name after `@`")),
                }
            }
            Some(Token::LParen) => {
                self.advance();
                let inner = self.parse_or()?;
                self.expect(Token::RParen)?;
                Ok(inner)
            }
            Some(Token::Name(name)) if self.peek_at(1) == Some(&Token::LParen) && !is_node_test(name) => {
                self.parse_call()
            }
            Some(Token::Slash | Token::DoubleSlash | Token::Name(_) | Token::Star | Token::Dot) => {
                self.parse_location()
            }
            Some(tok) => Err(self.error(format!("unexpected token {tok:?}"))),
            None => Err(self.error("unexpected end of pattern")),
        }
    }

    fn parse_call(&mut self) -> Result<Expr> {
        let Some(Token::Name(name)) = self.advance() else {
            return Err(self.error("expected function name"));
        };
        if !FUNCTIONS.contains(&name.as_str()) {
            return Err(self.error(format!("unknown function `{name}()`")));
        }
        self.expect(Token::LParen)?;

        let mut args = Vec::new();
        if self.peek() != Some(&Token::RParen) {
            args.push(self.parse_or()?);
            while self.peek() == Some(&Token::Comma) {
                self.advance();
                args.push(self.parse_or()?);
            }
        }
        self.expect(Token::RParen)?;

        if name == "not" {
            return match <[Expr; 1]>::try_from(args) {
                Ok([arg]) => Ok(Expr::Not(arg.boxed())),
                Err(_) => Err(self.error("not() takes exactly one argument")),
            };
        }
        Ok(Expr::Call { name, args })
    }

    fn parse_location(&mut self) -> Result<Expr> {
        let mut chain: Option<Expr> = None;

        match self.peek() {
            Some(Token::Slash) => {
                self.advance();
                if !self.at_step_start() {
                    return Ok(Expr::Root);
                }
                chain = Some(Expr::Root);
            }
            Some(Token::DoubleSlash) => {
                if self.predicate_depth > 0 {
                    return Err(self.error("`//` is not supported inside predicates"));
                }
                // A leading `//` in a pattern constrains nothing.
                self.advance();
            }
            _ => {}
        }

        loop {
            chain = Some(self.parse_step(chain)?);
            match self.peek() {
                Some(Token::Slash) => {
                    self.advance();
                }
                Some(Token::DoubleSlash) => return Err(self.error("interior `//` is not supported")),
                _ => break,
            }
        }

        chain.ok_or_else(|| self.error("empty location path"))
    }

    fn at_step_start(&self) -> bool {
        matches!(self.peek(), Some(Token::Name(_) | Token::Star | Token::Dot))
    }

    fn parse_step(&mut self, prev: Option<Expr>) -> Result<Expr> {
        let mut step = match self.advance() {
            Some(Token::Name(name)) if is_node_test(&name) && self.peek() == Some(&Token::LParen) => {
                self.advance();
                self.expect(Token::RParen)?;
                let test = Expr::Call { name: name.clone(), args: Vec::new() };
                match (prev, self.predicate_depth) {
                    (None, _) => test,
                    (Some(prev), 0) => Expr::And(vec![Expr::All(Some(prev.boxed())), test]),
                    (Some(prev), _) => Expr::Call { name, args: vec![prev] },
                }
            }
            Some(Token::Name(name)) => Expr::Select { name, parent: prev.map(Expr::boxed) },
            Some(Token::Star) => Expr::All(prev.map(Expr::boxed)),
            Some(Token::Dot) => match prev {
                None => Expr::Context,
                Some(prev) => Expr::SelfNode(Some(prev.boxed())),
            },
            Some(tok) => return Err(self.error(format!("expected a location step, found {tok:?}"))),
            None => return Err(self.error("expected a location step")),
        };

        while self.peek() == Some(&Token::LBracket) {
            self.advance();
            self.predicate_depth += 1;
            let predicate = self.parse_or();
            self.predicate_depth -= 1;
            let predicate = predicate?;
            self.expect(Token::RBracket)?;
            step = Expr::Filter { base: step.boxed(), predicate: predicate.boxed() };
        }
        Ok(step)
    }
}

fn is_node_test(name: &str) -> bool {
    name == "text" || name == "node"
}
