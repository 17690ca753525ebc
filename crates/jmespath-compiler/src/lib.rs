// Allow unwrap in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]

//! Compilation of JMESPath expressions to bytecode.
//!
//! The compiler is a single-pass Pratt parser over the lexer's token
//! stream; it emits the flat instruction sequence directly, patching
//! forward jumps as constructs close. Output is a frozen
//! [`jmespath_vm::Program`].

mod compiler;
mod error;
mod stream;

pub use compiler::compile;
pub use error::{SyntaxError, SyntaxErrorKind};
pub use stream::TokenStream;
