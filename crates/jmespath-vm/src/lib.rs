// Allow unwrap in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]

//! Bytecode model and virtual machine for the JMESPath engine.
//!
//! A compiled expression is a [`Program`]: a flat, validated sequence of
//! [`Instruction`]s. [`evaluate`] runs a program against a JSON-shaped value
//! on a small stack machine with a focus register; function calls dispatch
//! through a [`FunctionRegistry`].
//!
//! Programs are immutable after construction and can be shared across
//! threads; every evaluation builds its own machine state.

pub mod error;
pub mod functions;
pub mod machine;
pub mod opcode;
pub mod program;

pub use error::RuntimeError;
pub use functions::{
    FunctionImpl, FunctionRegistry, FunctionSpec, MismatchPolicy, ParamSpec, ValueType,
};
pub use machine::{evaluate, evaluate_with};
pub use opcode::{Instruction, ProjectionKind};
pub use program::{InvalidProgram, Program};
