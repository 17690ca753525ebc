// Allow unwrap in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]

//! JMESPath expression engine.
//!
//! Expressions compile to a flat bytecode [`Program`] which a small stack
//! VM evaluates against a JSON-shaped [`Value`]:
//!
//! ```
//! use jmespath::{search, Value};
//!
//! let data = Value::from_json(r#"{"a": {"b": {"c": 42}}}"#).unwrap();
//! assert_eq!(search("a.b.c", &data).unwrap(), Value::from(42i64));
//! ```
//!
//! Compile once, evaluate many times — a [`Program`] is immutable and can
//! be shared across threads:
//!
//! ```
//! use jmespath::{compile, evaluate, Value};
//!
//! let program = compile("foo[*].bar").unwrap();
//! let data = Value::from_json(r#"{"foo": [{"bar": 1}, {"bar": 2}]}"#).unwrap();
//! assert_eq!(evaluate(&program, &data).unwrap(), Value::from_json("[1,2]").unwrap());
//! ```

pub use jmespath_compiler::{compile, SyntaxError, SyntaxErrorKind};
pub use jmespath_foundation::{Comparator, Number, Span, Value};
pub use jmespath_vm::{
    evaluate, evaluate_with, FunctionRegistry, FunctionSpec, Instruction, MismatchPolicy,
    ParamSpec, Program, RuntimeError, ValueType,
};

use tracing::debug;

/// Any failure from [`search`].
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum Error {
    /// The expression did not compile
    #[error(transparent)]
    Syntax(#[from] SyntaxError),

    /// The expression failed while evaluating
    #[error(transparent)]
    Runtime(#[from] RuntimeError),
}

/// Compile `expression` and evaluate it against `data` in one step.
///
/// # Errors
///
/// Returns [`Error::Syntax`] when the expression does not parse and
/// [`Error::Runtime`] when a function call fails during evaluation.
pub fn search(expression: &str, data: &Value) -> Result<Value, Error> {
    debug!(expression, "searching");
    let program = compile(expression)?;
    Ok(evaluate(&program, data)?)
}
