//! The stack machine that interprets compiled programs.
//!
//! # Execution model
//!
//! - `current` — the focus register: the value `@` refers to, rebased by
//!   pipes and projection iterations
//! - value stack — intermediate values; navigation instructions pop their
//!   input from the top and push their output
//! - mark stack — saved focus snapshots, balanced across projections and
//!   multi-selects
//! - projection stack — live `Each` loops
//!
//! # Projection protocol
//!
//! `Each` is both loop head and loop bookkeeper. On first arrival it pops
//! the collection off the value stack; non-projectable input pushes null
//! and jumps to the loop's exit target. Otherwise it saves the enclosing
//! focus on the mark stack and starts iterating: each pass sets `current`
//! to the element and pushes it for the body. The body ends with
//! `PopCurrent` + a back jump, so on re-arrival the body's result is in
//! `current`; `Each` collects it (dropping nulls for
//! [`ProjectionKind::Loose`]), drops the iteration's mark, and either
//! advances or finishes by restoring the enclosing focus and pushing the
//! collected array.

use crate::error::RuntimeError;
use crate::functions::FunctionRegistry;
use crate::opcode::{Instruction, ProjectionKind};
use crate::program::Program;
use jmespath_foundation::{Comparator, Value};
use tracing::trace;

/// Evaluate a program against a value using the standard function library.
///
/// # Errors
///
/// Returns a [`RuntimeError`] only for function-call failures (unknown
/// name, arity, raising type mismatch); path navigation over mismatched
/// types yields null instead.
pub fn evaluate(program: &Program, data: &Value) -> Result<Value, RuntimeError> {
    evaluate_with(program, data, FunctionRegistry::standard())
}

/// Evaluate a program with a caller-supplied function registry.
pub fn evaluate_with(
    program: &Program,
    data: &Value,
    registry: &FunctionRegistry,
) -> Result<Value, RuntimeError> {
    trace!(instructions = program.len(), "evaluating program");
    Machine::new(program, registry).run(data.clone())
}

/// One live projection loop.
struct Projection {
    /// Instruction index of the owning `Each`
    each_ip: usize,
    items: std::vec::IntoIter<Value>,
    results: Vec<Value>,
    kind: ProjectionKind,
}

/// Per-evaluation machine state.
struct Machine<'a> {
    program: &'a Program,
    registry: &'a FunctionRegistry,
    current: Value,
    values: Vec<Value>,
    marks: Vec<Value>,
    projections: Vec<Projection>,
}

impl<'a> Machine<'a> {
    fn new(program: &'a Program, registry: &'a FunctionRegistry) -> Self {
        Self {
            program,
            registry,
            current: Value::Null,
            values: Vec::new(),
            marks: Vec::new(),
            projections: Vec::new(),
        }
    }

    fn run(mut self, data: Value) -> Result<Value, RuntimeError> {
        self.current = data;
        let mut ip = 0usize;

        loop {
            let instruction = self.program.get(ip).ok_or(RuntimeError::IpOutOfRange {
                ip,
                len: self.program.len(),
            })?;

            match instruction {
                Instruction::Nop => ip += 1,
                Instruction::PushCurrent => {
                    self.values.push(self.current.clone());
                    ip += 1;
                }
                Instruction::PopCurrent => {
                    self.current = self.pop()?;
                    ip += 1;
                }
                Instruction::MarkCurrent => {
                    self.marks.push(self.current.clone());
                    ip += 1;
                }
                Instruction::PopMark => {
                    self.current = self.marks.pop().ok_or(RuntimeError::MarkUnderflow)?;
                    ip += 1;
                }
                Instruction::Pop => {
                    self.pop()?;
                    ip += 1;
                }
                Instruction::Push(value) => {
                    self.values.push(value.clone());
                    ip += 1;
                }
                Instruction::Field(name) => {
                    let value = self.pop()?;
                    self.values.push(field(value, name));
                    ip += 1;
                }
                Instruction::Index(index) => {
                    let value = self.pop()?;
                    self.values.push(array_index(value, *index));
                    ip += 1;
                }
                Instruction::Slice { start, stop, step } => {
                    let value = self.pop()?;
                    self.values.push(slice(value, *start, *stop, *step));
                    ip += 1;
                }
                Instruction::StoreKey(key) => {
                    let value = self.pop()?;
                    self.store_key(key.as_deref(), value)?;
                    ip += 1;
                }
                Instruction::Merge => {
                    let value = self.pop()?;
                    self.values.push(merge(value));
                    ip += 1;
                }
                Instruction::Truthy => {
                    let truthy = self.peek()?.is_truthy();
                    self.values.push(Value::Bool(truthy));
                    ip += 1;
                }
                Instruction::Each { target, kind } => {
                    ip = self.each(ip, *target, *kind)?;
                }
                Instruction::Jump(target) => ip = *target,
                Instruction::JumpIfTrue(target) => {
                    ip = if self.pop()?.is_truthy() { *target } else { ip + 1 };
                }
                Instruction::JumpIfFalse(target) => {
                    ip = if self.pop()?.is_truthy() { ip + 1 } else { *target };
                }
                Instruction::Cmp(comparator) => {
                    let rhs = self.pop()?;
                    let lhs = self.pop()?;
                    self.values.push(compare(*comparator, &lhs, &rhs));
                    ip += 1;
                }
                Instruction::Call { name, argc } => {
                    if self.values.len() < *argc {
                        return Err(RuntimeError::StackUnderflow);
                    }
                    let args = self.values.split_off(self.values.len() - argc);
                    let result = self.registry.call(name, &args)?;
                    self.values.push(result);
                    ip += 1;
                }
                Instruction::Stop => {
                    return Ok(self
                        .values
                        .pop()
                        .unwrap_or_else(|| std::mem::take(&mut self.current)));
                }
            }
        }
    }

    fn pop(&mut self) -> Result<Value, RuntimeError> {
        self.values.pop().ok_or(RuntimeError::StackUnderflow)
    }

    fn peek(&self) -> Result<&Value, RuntimeError> {
        self.values.last().ok_or(RuntimeError::StackUnderflow)
    }

    fn store_key(&mut self, key: Option<&str>, value: Value) -> Result<(), RuntimeError> {
        match (key, self.values.last_mut()) {
            (None, Some(Value::Array(items))) => {
                items.push(value);
                Ok(())
            }
            (None, _) => Err(RuntimeError::BadStoreTarget { expected: "an array" }),
            (Some(key), Some(Value::Object(map))) => {
                map.insert(key.to_string(), value);
                Ok(())
            }
            (Some(_), _) => Err(RuntimeError::BadStoreTarget {
                expected: "an object",
            }),
        }
    }

    /// Projection loop head; returns the next instruction pointer.
    fn each(
        &mut self,
        ip: usize,
        target: usize,
        kind: ProjectionKind,
    ) -> Result<usize, RuntimeError> {
        let active = self
            .projections
            .last()
            .map(|frame| frame.each_ip == ip)
            .unwrap_or(false);

        if !active {
            // First arrival: pop the collection and start iterating.
            let input = self.pop()?;
            let Some(items) = projectable_items(kind, input) else {
                self.values.push(Value::Null);
                return Ok(target);
            };
            if items.is_empty() {
                self.values.push(Value::Array(Vec::new()));
                return Ok(target);
            }
            self.marks.push(self.current.clone());
            let mut iter = items.into_iter();
            if let Some(element) = iter.next() {
                self.current = element.clone();
                self.values.push(element);
            }
            self.projections.push(Projection {
                each_ip: ip,
                items: iter,
                results: Vec::new(),
                kind,
            });
            return Ok(ip + 1);
        }

        // Re-arrival from the loop's back jump: collect the body result and
        // drop the iteration's mark, then advance or finish.
        let result = std::mem::take(&mut self.current);
        self.marks.pop().ok_or(RuntimeError::MarkUnderflow)?;
        if let Some(frame) = self.projections.last_mut() {
            if !(frame.kind == ProjectionKind::Loose && result.is_null()) {
                frame.results.push(result);
            }
            if let Some(element) = frame.items.next() {
                self.current = element.clone();
                self.values.push(element);
                return Ok(ip + 1);
            }
        }
        let finished = self
            .projections
            .pop()
            .ok_or(RuntimeError::MarkUnderflow)?;
        self.current = self.marks.pop().ok_or(RuntimeError::MarkUnderflow)?;
        self.values.push(Value::Array(finished.results));
        Ok(target)
    }
}

/// The collection a projection iterates, or `None` when the input is not
/// projectable under `kind`.
fn projectable_items(kind: ProjectionKind, input: Value) -> Option<Vec<Value>> {
    match (kind, input) {
        (ProjectionKind::Array, Value::Array(items)) => Some(items),
        (ProjectionKind::Object, Value::Object(map)) => {
            Some(map.into_iter().map(|(_, value)| value).collect())
        }
        (ProjectionKind::Loose, Value::Array(items)) => Some(items),
        (ProjectionKind::Loose, Value::Object(map)) => {
            Some(map.into_iter().map(|(_, value)| value).collect())
        }
        _ => None,
    }
}

fn field(value: Value, name: &str) -> Value {
    match value {
        Value::Object(mut map) => map.swap_remove(name).unwrap_or(Value::Null),
        _ => Value::Null,
    }
}

fn array_index(value: Value, index: i64) -> Value {
    match value {
        Value::Array(mut items) => {
            let len = items.len() as i64;
            let resolved = if index < 0 { index + len } else { index };
            if (0..len).contains(&resolved) {
                items.swap_remove(resolved as usize)
            } else {
                Value::Null
            }
        }
        _ => Value::Null,
    }
}

/// Python slice semantics: missing bounds default by step direction,
/// negative bounds count from the end, everything clamps.
fn slice(value: Value, start: Option<i64>, stop: Option<i64>, step: Option<i64>) -> Value {
    let Value::Array(items) = value else {
        return Value::Null;
    };
    let step = step.unwrap_or(1);
    if step == 0 {
        return Value::Null;
    }
    let len = items.len() as i64;

    let resolve = |bound: i64, lower: i64, upper: i64| -> i64 {
        let adjusted = if bound < 0 { bound + len } else { bound };
        adjusted.clamp(lower, upper)
    };

    let mut collected = Vec::new();
    if step > 0 {
        let begin = start.map(|b| resolve(b, 0, len)).unwrap_or(0);
        let end = stop.map(|b| resolve(b, 0, len)).unwrap_or(len);
        let mut i = begin;
        while i < end {
            collected.push(items[i as usize].clone());
            i += step;
        }
    } else {
        let begin = start.map(|b| resolve(b, -1, len - 1)).unwrap_or(len - 1);
        let end = stop.map(|b| resolve(b, -1, len - 1)).unwrap_or(-1);
        let mut i = begin;
        while i > end {
            collected.push(items[i as usize].clone());
            i += step;
        }
    }
    Value::Array(collected)
}

fn merge(value: Value) -> Value {
    match value {
        Value::Array(items) => {
            let mut flat = Vec::with_capacity(items.len());
            for item in items {
                match item {
                    Value::Array(inner) => flat.extend(inner),
                    other => flat.push(other),
                }
            }
            Value::Array(flat)
        }
        other => other,
    }
}

fn compare(comparator: Comparator, lhs: &Value, rhs: &Value) -> Value {
    match comparator {
        Comparator::Eq => Value::Bool(lhs == rhs),
        Comparator::Ne => Value::Bool(lhs != rhs),
        Comparator::Gt | Comparator::Gte | Comparator::Lt | Comparator::Lte => {
            match (lhs.as_f64(), rhs.as_f64()) {
                (Some(a), Some(b)) => Value::Bool(match comparator {
                    Comparator::Gt => a > b,
                    Comparator::Gte => a >= b,
                    Comparator::Lt => a < b,
                    _ => a <= b,
                }),
                _ => Value::Null,
            }
        }
    }
}
