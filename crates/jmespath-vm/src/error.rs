//! Runtime errors raised during evaluation.

/// Evaluation failure.
///
/// Path navigation never errors (type mismatches yield null); runtime
/// errors come from function dispatch and from structural defects a frozen
/// program cannot normally exhibit.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RuntimeError {
    /// Value stack popped while empty
    #[error("value stack underflow")]
    StackUnderflow,

    /// Mark stack popped while empty
    #[error("mark stack underflow")]
    MarkUnderflow,

    /// Jumped or ran past the end of the program
    #[error("instruction pointer {ip} out of range (program length {len})")]
    IpOutOfRange { ip: usize, len: usize },

    /// Store instruction found no container at the stack top
    #[error("store target is not {expected}")]
    BadStoreTarget { expected: &'static str },

    /// Call named a function the registry does not know
    #[error("unknown function \"{name}\"")]
    UnknownFunction { name: String },

    /// Call arity outside the function's declared bounds
    #[error("function \"{name}\" expects {expected} argument(s), got {got}")]
    ArityMismatch {
        name: String,
        expected: String,
        got: usize,
    },

    /// Argument type outside the parameter's declared types, with the
    /// raising mismatch policy
    #[error(
        "function \"{name}\" argument {index} expects {expected}, got {actual}"
    )]
    InvalidType {
        name: String,
        index: usize,
        expected: String,
        actual: &'static str,
    },
}
