//! Token stream wrapper for the hand-written parser.

use crate::error::SyntaxError;
use jmespath_foundation::Span;
use jmespath_lexer::Token;

/// Token stream with lookahead and position tracking.
///
/// The end of input is reported as `None` from `peek`/`advance`; the span
/// past the last token covers the end of the source so errors there still
/// point somewhere useful.
pub struct TokenStream {
    tokens: Vec<(Token, Span)>,
    pos: usize,
    end: u32,
}

impl TokenStream {
    /// Create a new token stream over `tokens` from a source of
    /// `source_len` bytes.
    pub fn new(tokens: Vec<(Token, Span)>, source_len: usize) -> Self {
        Self {
            tokens,
            pos: 0,
            end: source_len as u32,
        }
    }

    /// Peek at the current token without consuming it.
    pub fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|(token, _)| token)
    }

    /// Peek at the nth token ahead without consuming.
    pub fn peek_at(&self, n: usize) -> Option<&Token> {
        self.tokens.get(self.pos + n).map(|(token, _)| token)
    }

    /// Consume and return the current token with its span.
    pub fn advance(&mut self) -> Option<(Token, Span)> {
        let entry = self.tokens.get(self.pos).cloned();
        if entry.is_some() {
            self.pos += 1;
        }
        entry
    }

    /// Span of the current token, or of the end of input.
    pub fn current_span(&self) -> Span {
        self.tokens
            .get(self.pos)
            .map(|(_, span)| *span)
            .unwrap_or(Span::at(self.end))
    }

    /// Consume the current token, requiring it to equal `expected`.
    pub fn expect(&mut self, expected: Token) -> Result<(), SyntaxError> {
        let span = self.current_span();
        match self.advance() {
            Some((token, _)) if token == expected => Ok(()),
            Some((token, _)) => Err(SyntaxError::expected_token(&expected, Some(&token), span)),
            None => Err(SyntaxError::expected_token(&expected, None, span)),
        }
    }
}
