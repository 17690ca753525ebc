//! Function registry and the standard function library.
//!
//! The VM calls out of `Call` instructions through a [`FunctionRegistry`]:
//! name → arity bounds, per-parameter type lists with a mismatch policy,
//! and the callable itself. Arity violations always raise; argument type
//! mismatches either null out the call or raise, per the parameter's
//! declared policy.
//!
//! The standard registry is built once and shared; callers may also build
//! their own registry and evaluate with it.

use crate::error::RuntimeError;
use jmespath_foundation::{Number, Value};
use std::collections::HashMap;
use std::sync::OnceLock;

/// Value type a parameter accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueType {
    Any,
    Number,
    String,
    Boolean,
    Array,
    Object,
    Null,
}

impl ValueType {
    /// Whether `value` satisfies this type.
    pub fn matches(self, value: &Value) -> bool {
        match self {
            ValueType::Any => true,
            ValueType::Number => matches!(value, Value::Number(_)),
            ValueType::String => matches!(value, Value::String(_)),
            ValueType::Boolean => matches!(value, Value::Bool(_)),
            ValueType::Array => matches!(value, Value::Array(_)),
            ValueType::Object => matches!(value, Value::Object(_)),
            ValueType::Null => matches!(value, Value::Null),
        }
    }

    fn name(self) -> &'static str {
        match self {
            ValueType::Any => "any",
            ValueType::Number => "number",
            ValueType::String => "string",
            ValueType::Boolean => "boolean",
            ValueType::Array => "array",
            ValueType::Object => "object",
            ValueType::Null => "null",
        }
    }
}

/// What to do when an argument misses its parameter's type list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MismatchPolicy {
    /// The call yields null instead of running
    Null,
    /// The call raises [`RuntimeError::InvalidType`]
    Raise,
}

/// One declared parameter: accepted types and the mismatch policy.
///
/// When a function takes more arguments than it declares parameters
/// (variadic tail), the last parameter covers the rest.
#[derive(Debug, Clone, Copy)]
pub struct ParamSpec {
    pub types: &'static [ValueType],
    pub on_mismatch: MismatchPolicy,
}

/// Callable signature for registered functions.
pub type FunctionImpl = fn(&[Value]) -> Result<Value, RuntimeError>;

/// A registered function: arity bounds, parameter specs, implementation.
#[derive(Debug, Clone)]
pub struct FunctionSpec {
    pub name: String,
    /// Minimum argument count (inclusive)
    pub min_args: usize,
    /// Maximum argument count (inclusive); `None` means unbounded
    pub max_args: Option<usize>,
    pub params: &'static [ParamSpec],
    pub run: FunctionImpl,
}

impl FunctionSpec {
    fn arity_description(&self) -> String {
        match self.max_args {
            Some(max) if max == self.min_args => format!("exactly {}", max),
            Some(max) => format!("between {} and {}", self.min_args, max),
            None => format!("at least {}", self.min_args),
        }
    }
}

/// Lookup table from function name to spec.
#[derive(Debug, Clone, Default)]
pub struct FunctionRegistry {
    functions: HashMap<String, FunctionSpec>,
}

impl FunctionRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// The shared standard library registry.
    pub fn standard() -> &'static FunctionRegistry {
        static STANDARD: OnceLock<FunctionRegistry> = OnceLock::new();
        STANDARD.get_or_init(build_standard)
    }

    /// Register a function, replacing any previous spec under its name.
    pub fn register(&mut self, spec: FunctionSpec) {
        self.functions.insert(spec.name.clone(), spec);
    }

    /// Look up a function by name.
    pub fn lookup(&self, name: &str) -> Option<&FunctionSpec> {
        self.functions.get(name)
    }

    /// Dispatch a call: arity check, per-argument type check, run.
    ///
    /// # Errors
    ///
    /// Unknown names and arity violations raise; type mismatches follow the
    /// parameter's [`MismatchPolicy`].
    pub fn call(&self, name: &str, args: &[Value]) -> Result<Value, RuntimeError> {
        let spec = self.lookup(name).ok_or_else(|| RuntimeError::UnknownFunction {
            name: name.to_string(),
        })?;

        let arity_ok = args.len() >= spec.min_args
            && spec.max_args.map_or(true, |max| args.len() <= max);
        if !arity_ok {
            return Err(RuntimeError::ArityMismatch {
                name: name.to_string(),
                expected: spec.arity_description(),
                got: args.len(),
            });
        }

        for (index, arg) in args.iter().enumerate() {
            let Some(param) = spec.params.get(index).or_else(|| spec.params.last()) else {
                continue;
            };
            if !param.types.iter().any(|ty| ty.matches(arg)) {
                match param.on_mismatch {
                    MismatchPolicy::Null => return Ok(Value::Null),
                    MismatchPolicy::Raise => {
                        return Err(RuntimeError::InvalidType {
                            name: name.to_string(),
                            index,
                            expected: expected_description(param.types),
                            actual: arg.type_name(),
                        })
                    }
                }
            }
        }

        (spec.run)(args)
    }

}

fn expected_description(types: &[ValueType]) -> String {
    types
        .iter()
        .map(|ty| ty.name())
        .collect::<Vec<_>>()
        .join(" or ")
}

/// Element-level type failure inside a typed array argument.
fn element_type_error(name: &str, index: usize, expected: &str, actual: &Value) -> RuntimeError {
    RuntimeError::InvalidType {
        name: name.to_string(),
        index,
        expected: expected.to_string(),
        actual: actual.type_name(),
    }
}

/// A raising parameter accepting the given types.
const fn strict(types: &'static [ValueType]) -> ParamSpec {
    ParamSpec {
        types,
        on_mismatch: MismatchPolicy::Raise,
    }
}

/// Master table of the standard function library.
fn build_standard() -> FunctionRegistry {
    const ANY: &[ParamSpec] = &[strict(&[ValueType::Any])];
    const NUMBER: &[ParamSpec] = &[strict(&[ValueType::Number])];
    const ARRAY: &[ParamSpec] = &[strict(&[ValueType::Array])];
    const OBJECT: &[ParamSpec] = &[strict(&[ValueType::Object])];
    const SEQUENCE: &[ParamSpec] = &[strict(&[ValueType::String, ValueType::Array])];
    const COUNTABLE: &[ParamSpec] = &[strict(&[
        ValueType::String,
        ValueType::Array,
        ValueType::Object,
    ])];
    const HAYSTACK_NEEDLE: &[ParamSpec] = &[
        strict(&[ValueType::String, ValueType::Array]),
        strict(&[ValueType::Any]),
    ];
    const STRING_PAIR: &[ParamSpec] = &[
        strict(&[ValueType::String]),
        strict(&[ValueType::String]),
    ];
    const GLUE_ARRAY: &[ParamSpec] = &[
        strict(&[ValueType::String]),
        strict(&[ValueType::Array]),
    ];
    const TO_NUMBER: &[ParamSpec] = &[ParamSpec {
        types: &[ValueType::Any],
        on_mismatch: MismatchPolicy::Null,
    }];

    macro_rules! f {
        ($registry:ident, $name:literal, $min:literal, $max:expr, $params:expr, $run:expr) => {
            $registry.register(FunctionSpec {
                name: $name.to_string(),
                min_args: $min,
                max_args: $max,
                params: $params,
                run: $run,
            });
        };
    }

    let mut registry = FunctionRegistry::new();
    f!(registry, "abs", 1, Some(1), NUMBER, fn_abs);
    f!(registry, "avg", 1, Some(1), ARRAY, fn_avg);
    f!(registry, "ceil", 1, Some(1), NUMBER, fn_ceil);
    f!(registry, "contains", 2, Some(2), HAYSTACK_NEEDLE, fn_contains);
    f!(registry, "ends_with", 2, Some(2), STRING_PAIR, fn_ends_with);
    f!(registry, "floor", 1, Some(1), NUMBER, fn_floor);
    f!(registry, "join", 2, Some(2), GLUE_ARRAY, fn_join);
    f!(registry, "keys", 1, Some(1), OBJECT, fn_keys);
    f!(registry, "length", 1, Some(1), COUNTABLE, fn_length);
    f!(registry, "max", 1, Some(1), ARRAY, fn_max);
    f!(registry, "merge", 1, None, OBJECT, fn_merge);
    f!(registry, "min", 1, Some(1), ARRAY, fn_min);
    f!(registry, "not_null", 1, None, ANY, fn_not_null);
    f!(registry, "reverse", 1, Some(1), SEQUENCE, fn_reverse);
    f!(registry, "sort", 1, Some(1), ARRAY, fn_sort);
    f!(registry, "starts_with", 2, Some(2), STRING_PAIR, fn_starts_with);
    f!(registry, "sum", 1, Some(1), ARRAY, fn_sum);
    f!(registry, "to_number", 1, Some(1), TO_NUMBER, fn_to_number);
    f!(registry, "to_string", 1, Some(1), ANY, fn_to_string);
    f!(registry, "type", 1, Some(1), ANY, fn_type);
    f!(registry, "values", 1, Some(1), OBJECT, fn_values);
    registry
}

/// Collect an array argument's elements as floats, or fail on the first
/// non-number element.
fn numeric_elements(name: &str, arg: &Value) -> Result<Vec<f64>, RuntimeError> {
    let items = arg.as_array().map(Vec::as_slice).unwrap_or(&[]);
    items
        .iter()
        .map(|item| {
            item.as_f64()
                .ok_or_else(|| element_type_error(name, 0, "array of numbers", item))
        })
        .collect()
}

fn fn_abs(args: &[Value]) -> Result<Value, RuntimeError> {
    let value = match args[0].as_number() {
        Some(Number::Int(n)) => Value::from(n.saturating_abs()),
        Some(Number::Float(x)) => Value::from(x.abs()),
        None => Value::Null,
    };
    Ok(value)
}

fn fn_avg(args: &[Value]) -> Result<Value, RuntimeError> {
    let numbers = numeric_elements("avg", &args[0])?;
    if numbers.is_empty() {
        return Ok(Value::Null);
    }
    let total: f64 = numbers.iter().sum();
    Ok(Value::from(total / numbers.len() as f64))
}

fn fn_ceil(args: &[Value]) -> Result<Value, RuntimeError> {
    let value = match args[0].as_number() {
        Some(Number::Int(n)) => Value::from(n),
        Some(Number::Float(x)) => Value::from(x.ceil() as i64),
        None => Value::Null,
    };
    Ok(value)
}

fn fn_floor(args: &[Value]) -> Result<Value, RuntimeError> {
    let value = match args[0].as_number() {
        Some(Number::Int(n)) => Value::from(n),
        Some(Number::Float(x)) => Value::from(x.floor() as i64),
        None => Value::Null,
    };
    Ok(value)
}

fn fn_contains(args: &[Value]) -> Result<Value, RuntimeError> {
    match (&args[0], &args[1]) {
        (Value::Array(items), needle) => Ok(Value::Bool(items.contains(needle))),
        (Value::String(haystack), Value::String(needle)) => {
            Ok(Value::Bool(haystack.contains(needle.as_str())))
        }
        (Value::String(_), needle) => Err(element_type_error("contains", 1, "string", needle)),
        _ => Ok(Value::Null),
    }
}

fn fn_ends_with(args: &[Value]) -> Result<Value, RuntimeError> {
    match (&args[0], &args[1]) {
        (Value::String(subject), Value::String(suffix)) => {
            Ok(Value::Bool(subject.ends_with(suffix.as_str())))
        }
        _ => Ok(Value::Null),
    }
}

fn fn_starts_with(args: &[Value]) -> Result<Value, RuntimeError> {
    match (&args[0], &args[1]) {
        (Value::String(subject), Value::String(prefix)) => {
            Ok(Value::Bool(subject.starts_with(prefix.as_str())))
        }
        _ => Ok(Value::Null),
    }
}

fn fn_join(args: &[Value]) -> Result<Value, RuntimeError> {
    let glue = args[0].as_str().unwrap_or_default();
    let items = args[1].as_array().map(Vec::as_slice).unwrap_or(&[]);
    let parts: Result<Vec<&str>, RuntimeError> = items
        .iter()
        .map(|item| {
            item.as_str()
                .ok_or_else(|| element_type_error("join", 1, "array of strings", item))
        })
        .collect();
    Ok(Value::from(parts?.join(glue)))
}

fn fn_keys(args: &[Value]) -> Result<Value, RuntimeError> {
    let keys = args[0]
        .as_object()
        .map(|map| map.keys().map(|key| Value::from(key.clone())).collect())
        .unwrap_or_default();
    Ok(Value::Array(keys))
}

fn fn_values(args: &[Value]) -> Result<Value, RuntimeError> {
    let values = args[0]
        .as_object()
        .map(|map| map.values().cloned().collect())
        .unwrap_or_default();
    Ok(Value::Array(values))
}

fn fn_length(args: &[Value]) -> Result<Value, RuntimeError> {
    let count = match &args[0] {
        Value::String(s) => s.chars().count(),
        Value::Array(items) => items.len(),
        Value::Object(map) => map.len(),
        _ => return Ok(Value::Null),
    };
    Ok(Value::from(count as i64))
}

/// Shared extremum scan for `max`/`min`: homogeneous number or string
/// arrays only.
fn extremum(name: &str, arg: &Value, want_max: bool) -> Result<Value, RuntimeError> {
    let items = arg.as_array().map(Vec::as_slice).unwrap_or(&[]);
    let Some(first) = items.first() else {
        return Ok(Value::Null);
    };

    match first {
        Value::Number(_) => {
            let mut best = first;
            for item in &items[1..] {
                let (Some(a), Some(b)) = (item.as_f64(), best.as_f64()) else {
                    return Err(element_type_error(name, 0, "array of numbers", item));
                };
                if (want_max && a > b) || (!want_max && a < b) {
                    best = item;
                }
            }
            Ok(best.clone())
        }
        Value::String(_) => {
            let mut best = first;
            for item in &items[1..] {
                let (Some(a), Some(b)) = (item.as_str(), best.as_str()) else {
                    return Err(element_type_error(name, 0, "array of strings", item));
                };
                if (want_max && a > b) || (!want_max && a < b) {
                    best = item;
                }
            }
            Ok(best.clone())
        }
        other => Err(element_type_error(
            name,
            0,
            "array of numbers or array of strings",
            other,
        )),
    }
}

fn fn_max(args: &[Value]) -> Result<Value, RuntimeError> {
    extremum("max", &args[0], true)
}

fn fn_min(args: &[Value]) -> Result<Value, RuntimeError> {
    extremum("min", &args[0], false)
}

fn fn_merge(args: &[Value]) -> Result<Value, RuntimeError> {
    let mut merged = indexmap::IndexMap::new();
    for arg in args {
        if let Some(map) = arg.as_object() {
            for (key, value) in map {
                merged.insert(key.clone(), value.clone());
            }
        }
    }
    Ok(Value::Object(merged))
}

fn fn_not_null(args: &[Value]) -> Result<Value, RuntimeError> {
    Ok(args
        .iter()
        .find(|arg| !arg.is_null())
        .cloned()
        .unwrap_or(Value::Null))
}

fn fn_reverse(args: &[Value]) -> Result<Value, RuntimeError> {
    let value = match &args[0] {
        Value::String(s) => Value::from(s.chars().rev().collect::<String>()),
        Value::Array(items) => {
            let mut reversed = items.clone();
            reversed.reverse();
            Value::Array(reversed)
        }
        _ => Value::Null,
    };
    Ok(value)
}

fn fn_sort(args: &[Value]) -> Result<Value, RuntimeError> {
    let items = args[0].as_array().map(Vec::as_slice).unwrap_or(&[]);
    let Some(first) = items.first() else {
        return Ok(Value::Array(Vec::new()));
    };

    let mut sorted = items.to_vec();
    match first {
        Value::Number(_) => {
            for item in items {
                if item.as_f64().is_none() {
                    return Err(element_type_error("sort", 0, "array of numbers", item));
                }
            }
            sorted.sort_by(|a, b| {
                let (a, b) = (a.as_f64().unwrap_or(0.0), b.as_f64().unwrap_or(0.0));
                a.partial_cmp(&b).unwrap_or(std::cmp::Ordering::Equal)
            });
        }
        Value::String(_) => {
            for item in items {
                if item.as_str().is_none() {
                    return Err(element_type_error("sort", 0, "array of strings", item));
                }
            }
            sorted.sort_by(|a, b| a.as_str().unwrap_or("").cmp(b.as_str().unwrap_or("")));
        }
        other => {
            return Err(element_type_error(
                "sort",
                0,
                "array of numbers or array of strings",
                other,
            ))
        }
    }
    Ok(Value::Array(sorted))
}

fn fn_sum(args: &[Value]) -> Result<Value, RuntimeError> {
    let items = args[0].as_array().map(Vec::as_slice).unwrap_or(&[]);
    let mut int_total: i64 = 0;
    let mut float_total = 0.0;
    let mut all_ints = true;
    for item in items {
        match item.as_number() {
            Some(Number::Int(n)) => int_total = int_total.saturating_add(n),
            Some(Number::Float(x)) => {
                all_ints = false;
                float_total += x;
            }
            None => return Err(element_type_error("sum", 0, "array of numbers", item)),
        }
    }
    if all_ints {
        Ok(Value::from(int_total))
    } else {
        Ok(Value::from(float_total + int_total as f64))
    }
}

fn fn_to_number(args: &[Value]) -> Result<Value, RuntimeError> {
    let value = match &args[0] {
        Value::Number(n) => Value::Number(*n),
        Value::String(s) => {
            let trimmed = s.trim();
            if let Ok(n) = trimmed.parse::<i64>() {
                Value::from(n)
            } else if let Ok(x) = trimmed.parse::<f64>() {
                Value::from(x)
            } else {
                Value::Null
            }
        }
        _ => Value::Null,
    };
    Ok(value)
}

fn fn_to_string(args: &[Value]) -> Result<Value, RuntimeError> {
    let value = match &args[0] {
        Value::String(s) => Value::from(s.clone()),
        other => Value::from(other.to_json()),
    };
    Ok(value)
}

fn fn_type(args: &[Value]) -> Result<Value, RuntimeError> {
    Ok(Value::from(args[0].type_name()))
}
