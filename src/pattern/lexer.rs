//! Pattern tokenizer.
//!
//! A single anchored regex is applied at the current offset; whitespace is
//! skipped and everything else becomes a [`Token`]. Keywords (`and`, `or`) are
//! lexed as names and disambiguated by the parser from their position.

use super::expr::CompareOp;
use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Token {
    Name(String),
    Literal(String),
    Number(f64),
    Slash,
    DoubleSlash,
    Pipe,
    LBracket,
    RBracket,
    LParen,
    RParen,
    At,
    Comma,
    Star,
    Dot,
    Op(CompareOp),
}

pub(crate) fn tokenize(text: &str) -> Result<Vec<Token>> {
    let re = regex!(
        r#"^(?:\s+|'[^']*'|"[^"]*"|\d+(?:\.\d*)?|\.\d+|//|!=|<=|>=|[/|\[\]()@,=<>*.]|[A-Za-z_][\w.\-]*(?::[A-Za-z_][\w.\-]*)?)"#
    );

    let mut tokens = Vec::new();
    let mut pos = 0;
    while pos < text.len() {
        let Some(m) = re.find(&text[pos..]) else {
            return Err(Error::compile(text, format!("unexpected character at offset {pos}")));
        };
        let lexeme = m.as_str();
        pos += lexeme.len();

        let token = match lexeme {
            "//" => Token::DoubleSlash,
            "/" => Token::Slash,
            "|" => Token::Pipe,
            "[" => Token::LBracket,
            "]" => Token::RBracket,
            "(" => Token::LParen,
            ")" => Token::RParen,
            "@" => Token::At,
            "," => Token::Comma,
            "*" => Token::Star,
            "." => Token::Dot,
            "=" => Token::Op(CompareOp::Eq),
            "!=" => Token::Op(CompareOp::Ne),
            "<" => Token::Op(CompareOp::Lt),
            "<=" => Token::Op(CompareOp::Le),
            ">" => Token::Op(CompareOp::Gt),
            ">=" => Token::Op(CompareOp::Ge),
            _ => match lexeme.as_bytes()[0] {
                b if b.is_ascii_whitespace() => continue,
                b'\'' | b'"' => Token::Literal(lexeme[1..lexeme.len() - 1].to_string()),
                b if b.is_ascii_digit() || b == b'.' => Token::Number(
                    lexeme.parse().map_err(|_| Error::compile(text, format!("bad number `{lexeme}`")))?,
                ),
                _ => Token::Name(lexeme.to_string()),
            },
        };
        tokens.push(token);
    }
    Ok(tokens)
}
