//! Instruction definitions for the bytecode VM.
//!
//! Instructions are data: a tagged variant with small immediates. Jump
//! operands are zero-based indices into the owning program's instruction
//! sequence, patched by the compiler before the program is frozen.

use jmespath_foundation::{Comparator, Value};
use serde::{Deserialize, Serialize};

/// What a projection loop iterates and how it treats null body results.
///
/// Explicit projections keep null results (projecting `bar` over
/// `[{"bar":1},{"baz":2}]` yields `[1,null]`); filters and context-free
/// stars drop them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProjectionKind {
    /// `[*]` — arrays only, null results kept
    Array,
    /// `.*` — object values only, null results kept
    Object,
    /// Filters and bare `*` — arrays or object values, null results dropped
    Loose,
}

/// A single bytecode instruction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Instruction {
    /// Gap left by an elided instruction; executes as a no-op.
    Nop,
    /// Push the focus register onto the value stack.
    PushCurrent,
    /// Pop the value stack into the focus register.
    PopCurrent,
    /// Push the focus register onto the mark stack.
    MarkCurrent,
    /// Pop the mark stack into the focus register.
    PopMark,
    /// Discard the value-stack top.
    Pop,
    /// Push a literal value.
    Push(Value),
    /// Pop a value, push its member under the given key (null when the
    /// value is not an object or the key is absent).
    Field(String),
    /// Pop a value, push the element at the given index (negative counts
    /// from the end; null when not an array or out of range).
    Index(i64),
    /// Pop a value, push the slice of it (null when not an array).
    ///
    /// Missing bounds take Python defaults for the step's direction.
    Slice {
        start: Option<i64>,
        stop: Option<i64>,
        step: Option<i64>,
    },
    /// Pop a value and store it into the container at the new stack top:
    /// append when the key is absent (array), insert otherwise (object).
    StoreKey(Option<String>),
    /// Pop a value; arrays are flattened one level, null stays null, any
    /// other value passes through.
    Merge,
    /// Push the truthiness of the value-stack top (not popped).
    Truthy,
    /// Projection loop head; see the machine module for the protocol.
    Each {
        /// Instruction index to resume at once the loop finishes (or the
        /// input turns out not to be projectable).
        target: usize,
        kind: ProjectionKind,
    },
    /// Unconditional jump.
    Jump(usize),
    /// Pop a value, jump when it is truthy.
    JumpIfTrue(usize),
    /// Pop a value, jump when it is falsy.
    JumpIfFalse(usize),
    /// Pop rhs then lhs, push the comparison result. Equality is
    /// structural; ordering compares numbers only and pushes null for any
    /// other operand type.
    Cmp(Comparator),
    /// Pop `argc` arguments (leftmost deepest) and dispatch through the
    /// function registry, pushing the result.
    Call { name: String, argc: usize },
    /// Halt. The result is the value-stack top when non-empty, otherwise
    /// the focus register.
    Stop,
}

impl Instruction {
    /// The jump operand of this instruction, if it has one.
    pub fn jump_target(&self) -> Option<usize> {
        match self {
            Instruction::Each { target, .. }
            | Instruction::Jump(target)
            | Instruction::JumpIfTrue(target)
            | Instruction::JumpIfFalse(target) => Some(*target),
            _ => None,
        }
    }
}
