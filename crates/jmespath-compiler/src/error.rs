//! Syntax error types.

use jmespath_foundation::Span;
use jmespath_lexer::{LexError, Token};
use std::fmt;

/// Compilation failure with source location and context.
///
/// No partial program accompanies an error; compilation is all-or-nothing.
#[derive(Debug, Clone, PartialEq)]
pub struct SyntaxError {
    /// Kind of syntax error
    pub kind: SyntaxErrorKind,
    /// Source location where the error occurred (byte offsets)
    pub span: Span,
    /// Human-readable error message naming the offending token and the
    /// expected alternatives
    pub message: String,
}

/// Category of syntax error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyntaxErrorKind {
    /// A token appeared where a different one was required.
    UnexpectedToken,

    /// Input ended while a construct was incomplete.
    UnexpectedEof,

    /// Tokens are present but violate the grammar structurally
    /// (e.g. a slice with more than two colons).
    InvalidSyntax,

    /// The source contained a fragment no token matches.
    Lex,

    /// Anything else; reserved for internal invariant reports.
    Other,
}

impl SyntaxError {
    /// Create an "expected this exact token" error.
    pub fn expected_token(expected: &Token, found: Option<&Token>, span: Span) -> Self {
        let message = match found {
            Some(token) => format!("expected '{}', found '{}'", expected, token),
            None => format!("expected '{}', found end of input", expected),
        };
        Self {
            kind: if found.is_none() {
                SyntaxErrorKind::UnexpectedEof
            } else {
                SyntaxErrorKind::UnexpectedToken
            },
            span,
            message,
        }
    }

    /// Create an "unexpected token" error with an expected-set description.
    pub fn unexpected_token(found: Option<&Token>, context: &str, span: Span) -> Self {
        let message = match found {
            Some(token) => format!("unexpected '{}' {}", token, context),
            None => format!("unexpected end of input {}", context),
        };
        Self {
            kind: if found.is_none() {
                SyntaxErrorKind::UnexpectedEof
            } else {
                SyntaxErrorKind::UnexpectedToken
            },
            span,
            message,
        }
    }

    /// Create an "invalid syntax" error.
    pub fn invalid_syntax(message: impl Into<String>, span: Span) -> Self {
        Self {
            kind: SyntaxErrorKind::InvalidSyntax,
            span,
            message: message.into(),
        }
    }

    /// Create a generic error.
    pub fn other(message: impl Into<String>, span: Span) -> Self {
        Self {
            kind: SyntaxErrorKind::Other,
            span,
            message: message.into(),
        }
    }
}

impl From<LexError> for SyntaxError {
    fn from(err: LexError) -> Self {
        Self {
            kind: SyntaxErrorKind::Lex,
            span: err.span,
            message: err.to_string(),
        }
    }
}

impl fmt::Display for SyntaxError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} at offset {}", self.message, self.span.start)
    }
}

impl std::error::Error for SyntaxError {}
