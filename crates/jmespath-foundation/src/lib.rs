// Allow unwrap in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]

//! Shared vocabulary for the JMESPath engine.
//!
//! This crate holds the types every other crate in the workspace speaks:
//!
//! - `Value` — the JSON-shaped runtime value
//! - `Span` — byte-range source location
//! - `Comparator` — the ordering/equality operators shared by the lexer
//!   tokens and the VM's comparison instruction

pub mod span;
pub mod value;

pub use span::Span;
pub use value::{Number, Value};

use serde::{Deserialize, Serialize};
use std::fmt;

/// Comparison operator.
///
/// Carried as the payload of an operator token and as the immediate of the
/// VM's comparison instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Comparator {
    /// `==`
    Eq,
    /// `!=`
    Ne,
    /// `>`
    Gt,
    /// `>=`
    Gte,
    /// `<`
    Lt,
    /// `<=`
    Lte,
}

impl fmt::Display for Comparator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Comparator::Eq => "==",
            Comparator::Ne => "!=",
            Comparator::Gt => ">",
            Comparator::Gte => ">=",
            Comparator::Lt => "<",
            Comparator::Lte => "<=",
        };
        write!(f, "{}", s)
    }
}
