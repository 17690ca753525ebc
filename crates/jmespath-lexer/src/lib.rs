// Allow unwrap in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]

//! Lexical analysis for JMESPath expressions.
//!
//! Tokenization uses logos. The token set is closed: identifiers (raw and
//! quoted), numbers, JSON literals, the structural punctuation of the
//! grammar, comparison operators, and function heads (`name(` lexes as a
//! single token carrying the name; the call's closing paren is a separate
//! token).
//!
//! End-of-input is not a lexed token; the compiler's token stream reports it
//! as the absence of a next token.
//!
//! # Examples
//!
//! ```
//! use jmespath_lexer::{tokenize, Token};
//!
//! let tokens = tokenize("foo[*].bar").unwrap();
//! assert!(matches!(tokens[0].0, Token::Identifier(_)));
//! ```

use jmespath_foundation::{Comparator, Span, Value};
use logos::Logos;
use std::fmt;

/// JMESPath token.
///
/// Payload-carrying variants hold decoded values: quoted identifiers and
/// literals are unescaped during lexing, function heads carry the bare name.
#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t\r\n]+")]
pub enum Token {
    /// Identifier, raw (`foo`) or quoted (`"foo bar"` with JSON escapes)
    #[regex(r"[a-zA-Z_][a-zA-Z0-9_]*", |lex| lex.slice().to_string())]
    #[regex(r#""([^"\\]|\\.)*""#, |lex| serde_json::from_str::<String>(lex.slice()).ok())]
    Identifier(String),

    /// Function head: an identifier immediately followed by `(`.
    ///
    /// The opening paren is part of this token; the argument list ends at a
    /// matching `RParen`.
    #[regex(r"[a-zA-Z_][a-zA-Z0-9_]*\(", |lex| {
        let s = lex.slice();
        s[..s.len() - 1].to_string()
    })]
    Function(String),

    /// Integer, optionally negative (array index or slice bound)
    #[regex(r"-?[0-9]+", |lex| lex.slice().parse::<i64>().ok())]
    Number(i64),

    /// JSON literal.
    ///
    /// Backtick form carries any JSON document (escaped backticks are
    /// unescaped first; content that is not valid JSON lexes as a bare
    /// string, the historical elided-quotes behavior). Raw strings `'...'`
    /// lex to string values.
    #[regex(r"`([^`\\]|\\.)*`", decode_json_literal)]
    #[regex(r"'([^'\\]|\\.)*'", decode_raw_string)]
    Literal(Value),

    /// Comparison operator `== != > >= < <=`
    #[token("==", |_| Comparator::Eq)]
    #[token("!=", |_| Comparator::Ne)]
    #[token(">=", |_| Comparator::Gte)]
    #[token(">", |_| Comparator::Gt)]
    #[token("<=", |_| Comparator::Lte)]
    #[token("<", |_| Comparator::Lt)]
    Operator(Comparator),

    /// Or operator `||`
    #[token("||")]
    Or,

    /// Pipe `|`
    #[token("|")]
    Pipe,

    /// Filter opener `[?`
    #[token("[?")]
    Filter,

    /// Flatten `[]`
    #[token("[]")]
    Merge,

    /// Current node `@`
    #[token("@")]
    At,

    /// Sub-expression separator `.`
    #[token(".")]
    Dot,

    /// Projection `*`
    #[token("*")]
    Star,

    /// Delimiter `[`
    #[token("[")]
    LBracket,

    /// Delimiter `]`
    #[token("]")]
    RBracket,

    /// Delimiter `{`
    #[token("{")]
    LBrace,

    /// Delimiter `}`
    #[token("}")]
    RBrace,

    /// Delimiter `(` (grouping; call opens arrive as part of `Function`)
    #[token("(")]
    LParen,

    /// Delimiter `)`
    #[token(")")]
    RParen,

    /// Slice separator `:`
    #[token(":")]
    Colon,

    /// List separator `,`
    #[token(",")]
    Comma,
}

/// Decode a backtick literal: unescape backticks, then parse as JSON,
/// falling back to a bare string.
fn decode_json_literal(lex: &mut logos::Lexer<Token>) -> Value {
    let s = lex.slice();
    let content = s[1..s.len() - 1].replace("\\`", "`");
    let trimmed = content.trim();
    Value::from_json(trimmed).unwrap_or_else(|_| Value::String(content))
}

/// Decode a raw string literal: only `\'` and `\\` are escapes, every other
/// backslash is kept verbatim.
fn decode_raw_string(lex: &mut logos::Lexer<Token>) -> Value {
    let s = lex.slice();
    let content = &s[1..s.len() - 1];
    let mut result = String::with_capacity(content.len());
    let mut chars = content.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next() {
                Some('\'') => result.push('\''),
                Some('\\') => result.push('\\'),
                Some(other) => {
                    result.push('\\');
                    result.push(other);
                }
                None => result.push('\\'),
            }
        } else {
            result.push(c);
        }
    }
    Value::String(result)
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Identifier(name) => write!(f, "{}", name),
            Token::Function(name) => write!(f, "{}(", name),
            Token::Number(n) => write!(f, "{}", n),
            Token::Literal(v) => write!(f, "`{}`", v),
            Token::Operator(op) => write!(f, "{}", op),
            Token::Or => write!(f, "||"),
            Token::Pipe => write!(f, "|"),
            Token::Filter => write!(f, "[?"),
            Token::Merge => write!(f, "[]"),
            Token::At => write!(f, "@"),
            Token::Dot => write!(f, "."),
            Token::Star => write!(f, "*"),
            Token::LBracket => write!(f, "["),
            Token::RBracket => write!(f, "]"),
            Token::LBrace => write!(f, "{{"),
            Token::RBrace => write!(f, "}}"),
            Token::LParen => write!(f, "("),
            Token::RParen => write!(f, ")"),
            Token::Colon => write!(f, ":"),
            Token::Comma => write!(f, ","),
        }
    }
}

/// Error raised when the input contains a fragment no token matches.
#[derive(Debug, Clone, PartialEq)]
pub struct LexError {
    /// Location of the offending fragment
    pub span: Span,
    /// The fragment itself
    pub fragment: String,
}

impl fmt::Display for LexError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "unrecognized character sequence {:?} at offset {}",
            self.fragment, self.span.start
        )
    }
}

impl std::error::Error for LexError {}

/// Tokenize an expression into `(Token, Span)` pairs.
///
/// Spans are byte offsets into `source`. Whitespace is skipped; any
/// unrecognized fragment fails the whole tokenization.
pub fn tokenize(source: &str) -> Result<Vec<(Token, Span)>, LexError> {
    let mut tokens = Vec::new();
    let mut lexer = Token::lexer(source);
    while let Some(result) = lexer.next() {
        let span: Span = lexer.span().into();
        match result {
            Ok(token) => tokens.push((token, span)),
            Err(()) => {
                return Err(LexError {
                    span,
                    fragment: lexer.slice().to_string(),
                })
            }
        }
    }
    Ok(tokens)
}
