//! Pratt parser/compiler from tokens to bytecode.
//!
//! One pass over the token stream emits the flat instruction sequence
//! directly; there is no intermediate tree. Every token type has a single
//! handler used in both prefix and infix position, dispatched from
//! [`Compiler::parse_expression`]'s precedence-climbing loop.
//!
//! # Speculative pushes
//!
//! Before a nested sub-expression the compiler emits a speculative
//! `PushCurrent` so navigation code inside it has the focus on the stack.
//! Sub-expressions that consume that snapshot (identifiers, indexes,
//! projections, `@`) mark their parse frame `pushed`; those that push their
//! own value (literals, function calls) leave it unmarked and the
//! speculative push is overwritten with `Nop` — a gap the VM skips, so
//! already-patched jump targets stay valid.
//!
//! # Forward jumps
//!
//! Loop and guard instructions are emitted with a placeholder target and
//! patched once the construct's end is known; `Program::new` verifies every
//! target before the program is frozen.

use crate::error::SyntaxError;
use crate::stream::TokenStream;
use jmespath_foundation::{Comparator, Span, Value};
use jmespath_lexer::{tokenize, Token};
use jmespath_vm::{Instruction, Program, ProjectionKind};
use tracing::trace;

/// Container type the current sub-expression is nested inside.
///
/// Drives bracket disambiguation (`[0]` is an index everywhere but under an
/// object context) and the multi-select hash value restrictions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Context {
    None,
    Object,
    Array,
}

/// Parse-state frame for one nested sub-expression.
struct ParseState {
    context: Context,
    /// Set when the sub-expression emitted code that consumes the
    /// speculative focus snapshot pushed just before it.
    pushed: bool,
    /// Set once the sub-expression pushed a value of its own (a literal or
    /// a function result). Navigation after that point consumes the
    /// provided value, not the snapshot, so it must not mark `pushed`.
    provided: bool,
}

impl ParseState {
    fn new(context: Context) -> Self {
        Self {
            context,
            pushed: false,
            provided: false,
        }
    }
}

/// Binding precedence; lower binds tighter. The parse loop continues while
/// the next token's precedence is at most the requested bound.
fn precedence(token: &Token) -> u8 {
    match token {
        Token::Or | Token::Merge => 1,
        Token::Pipe => 2,
        // Structural closers never continue a parse loop; see `is_stop`.
        Token::RBracket | Token::RBrace | Token::RParen | Token::Comma | Token::Colon => 1,
        _ => 0,
    }
}

/// Tokens that always end the current expression regardless of precedence.
fn is_stop(token: &Token) -> bool {
    matches!(
        token,
        Token::RBracket | Token::RBrace | Token::RParen | Token::Comma | Token::Colon
    )
}

/// Compile an expression into a bytecode program.
///
/// # Errors
///
/// Returns a [`SyntaxError`] carrying the byte offset, the offending token,
/// and the expected alternatives. No partial program is produced.
pub fn compile(source: &str) -> Result<Program, SyntaxError> {
    let tokens = tokenize(source)?;
    trace!(tokens = tokens.len(), "compiling expression");

    let mut compiler = Compiler::new(tokens, source.len());
    compiler.emit(Instruction::PushCurrent);
    while compiler.stream.peek().is_some() {
        compiler.parse_expression(2)?;
    }
    compiler.emit(Instruction::Stop);

    // The whole program never consumed the entry snapshot: elide it.
    if !compiler.frames.first().map(|f| f.pushed).unwrap_or(true) {
        compiler.instructions[0] = Instruction::Nop;
    }

    trace!(instructions = compiler.instructions.len(), "compiled program");
    Program::new(compiler.instructions)
        .map_err(|err| SyntaxError::other(err.to_string(), Span::at(0)))
}

struct Compiler {
    stream: TokenStream,
    instructions: Vec<Instruction>,
    frames: Vec<ParseState>,
}

impl Compiler {
    fn new(tokens: Vec<(Token, Span)>, source_len: usize) -> Self {
        Self {
            stream: TokenStream::new(tokens, source_len),
            instructions: Vec::new(),
            frames: vec![ParseState::new(Context::None)],
        }
    }

    // === Emission helpers ===

    fn emit(&mut self, instruction: Instruction) -> usize {
        self.instructions.push(instruction);
        self.instructions.len() - 1
    }

    fn here(&self) -> usize {
        self.instructions.len()
    }

    /// Resolve the forward jump emitted at `at`.
    fn patch(&mut self, at: usize, target: usize) {
        match self.instructions.get_mut(at) {
            Some(
                Instruction::Each { target: slot, .. }
                | Instruction::Jump(slot)
                | Instruction::JumpIfTrue(slot)
                | Instruction::JumpIfFalse(slot),
            ) => *slot = target,
            other => debug_assert!(false, "patched a non-jump instruction: {:?}", other),
        }
    }

    // === Frame helpers ===

    fn context(&self) -> Context {
        self.frames.last().map(|f| f.context).unwrap_or(Context::None)
    }

    fn set_context(&mut self, context: Context) {
        if let Some(frame) = self.frames.last_mut() {
            frame.context = context;
        }
    }

    fn mark_pushed(&mut self) {
        if let Some(frame) = self.frames.last_mut() {
            if !frame.provided {
                frame.pushed = true;
            }
        }
    }

    fn mark_provided(&mut self) {
        if let Some(frame) = self.frames.last_mut() {
            frame.provided = true;
        }
    }

    /// Dispatch exactly one token's handler in its own frame (the
    /// right-hand side of `.`). Anything the handler itself does not
    /// consume — a following index, projection, or chain — belongs to the
    /// enclosing expression and its context, so `a.b[0]` indexes an array
    /// even though `b` was selected under an object context.
    fn parse_single(&mut self, context: Context) -> Result<(), SyntaxError> {
        self.frames.push(ParseState::new(context));
        let result = match self.stream.advance() {
            Some((token, span)) => self.dispatch(token, span),
            None => Ok(()),
        };
        self.frames.pop();
        result
    }

    /// Parse a sub-expression behind a speculative `PushCurrent`, eliding
    /// the push when the sub-expression does not consume it.
    fn parse_guarded(&mut self, rbp: u8, context: Context) -> Result<(), SyntaxError> {
        let push_at = self.emit(Instruction::PushCurrent);
        self.frames.push(ParseState::new(context));
        let result = self.parse_expression(rbp);
        let pushed = self.frames.pop().map(|f| f.pushed).unwrap_or(false);
        result?;
        if !pushed {
            self.instructions[push_at] = Instruction::Nop;
        }
        Ok(())
    }

    // === Pratt loop ===

    /// Parse a full expression: the first token must be able to start one.
    fn parse_expression(&mut self, rbp: u8) -> Result<(), SyntaxError> {
        if let Some(token @ (Token::Dot | Token::Or | Token::Pipe | Token::Operator(_))) =
            self.stream.peek()
        {
            return Err(SyntaxError::unexpected_token(
                Some(token),
                "at start of expression",
                self.stream.current_span(),
            ));
        }
        self.parse_continuation(rbp)
    }

    /// The precedence-climbing loop proper. Also the entry for projection
    /// bodies, which legitimately begin with infix-position tokens (the
    /// element to navigate is already on the stack).
    fn parse_continuation(&mut self, rbp: u8) -> Result<(), SyntaxError> {
        let Some((token, span)) = self.stream.advance() else {
            // End of input is a valid empty expression.
            return Ok(());
        };
        self.dispatch(token, span)?;

        while let Some(next) = self.stream.peek() {
            if is_stop(next) || precedence(next) > rbp {
                break;
            }
            let Some((token, span)) = self.stream.advance() else {
                break;
            };
            self.dispatch(token, span)?;
        }
        Ok(())
    }

    /// A projection body or filter transform: parse a continuation unless
    /// the next token already ends the construct.
    fn parse_optional_body(&mut self, rbp: u8) -> Result<(), SyntaxError> {
        match self.stream.peek() {
            None => Ok(()),
            Some(token) if is_stop(token) || precedence(token) > rbp => Ok(()),
            Some(_) => self.parse_continuation(rbp),
        }
    }

    /// Single handler table: every token type routes here in both prefix
    /// and infix position.
    fn dispatch(&mut self, token: Token, span: Span) -> Result<(), SyntaxError> {
        match token {
            Token::Identifier(name) => self.parse_identifier(name, span),
            Token::Number(n) => self.parse_number(n, span),
            Token::Literal(value) => {
                self.emit(Instruction::Push(value));
                self.mark_provided();
                Ok(())
            }
            Token::At => {
                // Identity: the focus snapshot is already the answer.
                self.mark_pushed();
                Ok(())
            }
            Token::Dot => self.parse_dot(span),
            Token::Star => self.parse_star(),
            Token::Or => self.parse_or(),
            Token::Pipe => self.parse_pipe(),
            Token::Operator(op) => self.parse_operator(op, span),
            Token::Function(name) => self.parse_function(name),
            Token::LBracket => self.parse_lbracket(span),
            Token::LBrace => self.parse_lbrace(span),
            Token::Filter => self.parse_filter(),
            Token::Merge => self.parse_merge(),
            Token::LParen => self.parse_group(),
            Token::RBracket | Token::RBrace | Token::RParen | Token::Comma | Token::Colon => Err(
                SyntaxError::unexpected_token(Some(&token), "at start of expression", span),
            ),
        }
    }

    // === Token handlers ===

    fn parse_identifier(&mut self, name: String, _span: Span) -> Result<(), SyntaxError> {
        self.emit(Instruction::Field(name));
        self.mark_pushed();

        match self.stream.peek() {
            None
            | Some(
                Token::Merge
                | Token::LBrace
                | Token::LBracket
                | Token::RBrace
                | Token::RBracket
                | Token::Comma
                | Token::Dot
                | Token::Or
                | Token::Operator(_)
                | Token::RParen
                | Token::Pipe
                | Token::Filter,
            ) => Ok(()),
            other => Err(SyntaxError::unexpected_token(
                other,
                "after identifier",
                self.stream.current_span(),
            )),
        }
    }

    fn parse_number(&mut self, n: i64, _span: Span) -> Result<(), SyntaxError> {
        self.emit(Instruction::Index(n));
        self.mark_pushed();

        match self.stream.peek() {
            None
            | Some(
                Token::RBrace
                | Token::RBracket
                | Token::RParen
                | Token::Comma
                | Token::Or
                | Token::Operator(_)
                | Token::Pipe,
            ) => Ok(()),
            other => Err(SyntaxError::unexpected_token(
                other,
                "after number",
                self.stream.current_span(),
            )),
        }
    }

    fn parse_dot(&mut self, _span: Span) -> Result<(), SyntaxError> {
        match self.stream.peek() {
            Some(
                Token::Identifier(_)
                | Token::Number(_)
                | Token::Star
                | Token::LBrace
                | Token::LBracket
                | Token::Filter,
            ) => self.parse_single(Context::Object),
            other => Err(SyntaxError::unexpected_token(
                other,
                "after '.'",
                self.stream.current_span(),
            )),
        }
    }

    /// Projection loop: `Each` head, per-iteration mark, body, collect
    /// through the focus register, back jump.
    fn parse_star(&mut self) -> Result<(), SyntaxError> {
        let kind = match self.context() {
            Context::None => ProjectionKind::Loose,
            Context::Object => ProjectionKind::Object,
            Context::Array => ProjectionKind::Array,
        };
        let each_at = self.emit(Instruction::Each { target: 0, kind });
        self.emit(Instruction::MarkCurrent);
        // The body navigates elements, not the projected container, so it
        // gets a fresh array-context frame whatever the projection kind.
        self.frames.push(ParseState::new(Context::Array));
        let body = self.parse_optional_body(0);
        self.frames.pop();
        body?;
        self.emit(Instruction::PopCurrent);
        self.emit(Instruction::Jump(each_at));
        let end = self.here();
        self.patch(each_at, end);
        self.mark_pushed();
        Ok(())
    }

    /// `e1 || e2`: keep a truthy lhs, otherwise drop it and evaluate the
    /// rhs against the unchanged focus.
    fn parse_or(&mut self) -> Result<(), SyntaxError> {
        self.emit(Instruction::Truthy);
        let skip_at = self.emit(Instruction::JumpIfTrue(0));
        self.emit(Instruction::Pop);
        self.parse_guarded(0, Context::None)?;
        let end = self.here();
        self.patch(skip_at, end);
        Ok(())
    }

    /// `e1 | e2`: rebase the focus on the lhs result and reseed the stack
    /// for the rhs, which the enclosing loop keeps parsing.
    fn parse_pipe(&mut self) -> Result<(), SyntaxError> {
        self.emit(Instruction::PopCurrent);
        self.emit(Instruction::PushCurrent);
        Ok(())
    }

    fn parse_operator(&mut self, op: Comparator, _span: Span) -> Result<(), SyntaxError> {
        if self.stream.peek().is_none() {
            return Err(SyntaxError::unexpected_token(
                None,
                "after comparison operator",
                self.stream.current_span(),
            ));
        }
        self.parse_guarded(0, Context::None)?;
        self.emit(Instruction::Cmp(op));
        Ok(())
    }

    fn parse_function(&mut self, name: String) -> Result<(), SyntaxError> {
        let mut argc = 0usize;
        loop {
            match self.stream.peek() {
                Some(Token::RParen) => break,
                None => break, // expect below reports the missing paren
                Some(_) => {
                    self.parse_guarded(1, Context::None)?;
                    argc += 1;
                    match self.stream.peek() {
                        Some(Token::Comma) => {
                            self.stream.advance();
                        }
                        Some(Token::RParen) | None => {}
                        other => {
                            return Err(SyntaxError::unexpected_token(
                                other,
                                "in function arguments",
                                self.stream.current_span(),
                            ))
                        }
                    }
                }
            }
        }
        self.stream.expect(Token::RParen)?;
        self.emit(Instruction::Call { name, argc });
        self.mark_provided();
        Ok(())
    }

    fn parse_lbracket(&mut self, span: Span) -> Result<(), SyntaxError> {
        self.mark_pushed();
        let context = self.context();

        match self.stream.peek() {
            Some(Token::Number(_) | Token::Colon) => {
                if context == Context::Object {
                    return Err(SyntaxError::invalid_syntax(
                        "cannot index object by number",
                        span,
                    ));
                }
                self.parse_index_expression()
            }
            Some(Token::Star) if context != Context::Object => {
                self.stream.advance();
                if self.stream.peek() != Some(&Token::RBracket) {
                    return Err(SyntaxError::expected_token(
                        &Token::RBracket,
                        self.stream.peek(),
                        self.stream.current_span(),
                    ));
                }
                self.stream.advance();
                // The projection body parses under an array context.
                self.set_context(Context::Array);
                let result = self.parse_star();
                self.set_context(context);
                result
            }
            Some(
                Token::Identifier(_)
                | Token::Star
                | Token::LBracket
                | Token::RBracket
                | Token::Literal(_)
                | Token::Function(_)
                | Token::Filter,
            ) => self.parse_multi_list(),
            other => Err(SyntaxError::unexpected_token(
                other,
                "after '['",
                self.stream.current_span(),
            )),
        }
    }

    /// `[a]`, `[a:b]`, `[a:b:c]` with every field optional.
    fn parse_index_expression(&mut self) -> Result<(), SyntaxError> {
        let mut parts: Vec<Option<i64>> = vec![None];
        loop {
            let span = self.stream.current_span();
            match self.stream.peek() {
                Some(Token::Number(n)) => {
                    let n = *n;
                    if parts.last().map(Option::is_some).unwrap_or(false) {
                        return Err(SyntaxError::unexpected_token(
                            self.stream.peek(),
                            "in index expression",
                            span,
                        ));
                    }
                    if let Some(slot) = parts.last_mut() {
                        *slot = Some(n);
                    }
                    self.stream.advance();
                }
                Some(Token::Colon) => {
                    parts.push(None);
                    if parts.len() > 3 {
                        return Err(SyntaxError::invalid_syntax("invalid slice", span));
                    }
                    self.stream.advance();
                }
                Some(Token::RBracket) => {
                    self.stream.advance();
                    break;
                }
                other => {
                    return Err(SyntaxError::unexpected_token(
                        other,
                        "in index expression",
                        span,
                    ))
                }
            }
        }

        if parts.len() == 1 {
            match parts[0] {
                Some(n) => {
                    self.emit(Instruction::Index(n));
                    Ok(())
                }
                None => Err(SyntaxError::invalid_syntax(
                    "empty index expression",
                    self.stream.current_span(),
                )),
            }
        } else {
            let step = parts.get(2).copied().flatten();
            if step == Some(0) {
                return Err(SyntaxError::invalid_syntax(
                    "invalid slice",
                    self.stream.current_span(),
                ));
            }
            self.emit(Instruction::Slice {
                start: parts[0],
                stop: parts[1],
                step,
            });
            Ok(())
        }
    }

    /// Multi-select list `[e1, e2, …]`.
    fn parse_multi_list(&mut self) -> Result<(), SyntaxError> {
        let guard_at = self.prepare_multi_branch(Value::Array(Vec::new()));
        loop {
            match self.stream.peek() {
                Some(Token::RBracket) => {
                    self.stream.advance();
                    break;
                }
                None => {
                    return Err(SyntaxError::expected_token(
                        &Token::RBracket,
                        None,
                        self.stream.current_span(),
                    ))
                }
                Some(_) => {
                    self.parse_guarded(1, Context::None)?;
                    self.emit(Instruction::StoreKey(None));
                    match self.stream.peek() {
                        Some(Token::Comma) => {
                            self.stream.advance();
                        }
                        Some(Token::RBracket) | None => {}
                        other => {
                            return Err(SyntaxError::unexpected_token(
                                other,
                                "in multi-select list",
                                self.stream.current_span(),
                            ))
                        }
                    }
                }
            }
        }
        self.finish_multi_branch(guard_at);
        Ok(())
    }

    /// Multi-select hash `{k1: e1, k2: e2, …}`.
    fn parse_lbrace(&mut self, _span: Span) -> Result<(), SyntaxError> {
        self.mark_pushed();
        let context = self.context();
        let guard_at = self.prepare_multi_branch(Value::Object(Default::default()));
        loop {
            match self.stream.peek() {
                Some(Token::RBrace) => {
                    self.stream.advance();
                    break;
                }
                _ => {
                    let key_span = self.stream.current_span();
                    let key = match self.stream.advance() {
                        Some((Token::Identifier(name), _)) => name,
                        Some((token, _)) => {
                            return Err(SyntaxError::unexpected_token(
                                Some(&token),
                                "as multi-select hash key",
                                key_span,
                            ))
                        }
                        None => {
                            return Err(SyntaxError::expected_token(
                                &Token::RBrace,
                                None,
                                key_span,
                            ))
                        }
                    };
                    self.stream.expect(Token::Colon)?;

                    // Context-restricted value start set.
                    let bad_start = match self.stream.peek() {
                        Some(Token::Identifier(_)) => context == Context::Array,
                        Some(Token::Number(_)) => context == Context::Object,
                        _ => false,
                    };
                    if bad_start {
                        return Err(SyntaxError::unexpected_token(
                            self.stream.peek(),
                            "as multi-select hash value here",
                            self.stream.current_span(),
                        ));
                    }

                    self.parse_guarded(1, context)?;
                    self.emit(Instruction::StoreKey(Some(key)));
                    match self.stream.peek() {
                        Some(Token::Comma) => {
                            self.stream.advance();
                        }
                        Some(Token::RBrace) | None => {}
                        other => {
                            return Err(SyntaxError::unexpected_token(
                                other,
                                "in multi-select hash",
                                self.stream.current_span(),
                            ))
                        }
                    }
                }
            }
        }
        self.finish_multi_branch(guard_at);
        Ok(())
    }

    /// Guard and container setup shared by both multi-select forms: falsy
    /// input (null in particular) skips the whole construct and passes
    /// through; otherwise the focus is rebased on the input and an empty
    /// container pushed for `StoreKey` to fill.
    fn prepare_multi_branch(&mut self, empty: Value) -> usize {
        self.emit(Instruction::Truthy);
        let guard_at = self.emit(Instruction::JumpIfFalse(0));
        self.emit(Instruction::MarkCurrent);
        self.emit(Instruction::PopCurrent);
        self.emit(Instruction::Push(empty));
        guard_at
    }

    /// Restore the focus saved by `prepare_multi_branch` and land the
    /// guard's skip jump past it.
    fn finish_multi_branch(&mut self, guard_at: usize) {
        self.emit(Instruction::PopMark);
        let end = self.here();
        self.patch(guard_at, end);
    }

    /// `[? predicate ] transform` — a projection whose body keeps matching
    /// elements (transformed) and rejects the rest through a null result.
    fn parse_filter(&mut self) -> Result<(), SyntaxError> {
        self.mark_pushed();
        let each_at = self.emit(Instruction::Each {
            target: 0,
            kind: ProjectionKind::Loose,
        });
        self.emit(Instruction::MarkCurrent);
        self.parse_guarded(1, Context::None)?;
        self.stream.expect(Token::RBracket)?;

        let accept_at = self.emit(Instruction::JumpIfTrue(0));
        // Rejected: drop the element copy, route null through the focus.
        self.emit(Instruction::Pop);
        self.emit(Instruction::Push(Value::Null));
        self.emit(Instruction::PopCurrent);
        self.emit(Instruction::Jump(each_at));

        let accepted = self.here();
        self.patch(accept_at, accepted);
        self.frames.push(ParseState::new(Context::Array));
        let transform = self.parse_optional_body(0);
        self.frames.pop();
        transform?;
        self.emit(Instruction::PopCurrent);
        self.emit(Instruction::Jump(each_at));
        let end = self.here();
        self.patch(each_at, end);
        Ok(())
    }

    /// `[]` — flatten one level, then project whatever follows.
    fn parse_merge(&mut self) -> Result<(), SyntaxError> {
        self.emit(Instruction::Merge);
        self.mark_pushed();
        let continues = matches!(
            self.stream.peek(),
            Some(token) if !is_stop(token) && precedence(token) == 0
        );
        if continues {
            self.frames.push(ParseState::new(Context::Array));
            let result = self.parse_star();
            self.frames.pop();
            result?;
        }
        Ok(())
    }

    /// `( expr )` — grouping, transparent to the surrounding frame.
    fn parse_group(&mut self) -> Result<(), SyntaxError> {
        self.parse_expression(2)?;
        self.stream.expect(Token::RParen)
    }
}
