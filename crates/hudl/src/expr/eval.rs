// Copyright 2024-2026 The hudl authors
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Expression evaluator over the typed value space.
//!
//! Identifiers resolve through the activation's frame stack, top first.
//! Message field access consults the schema so absent fields yield their
//! declared defaults while `has()` still sees them as unset. Dynamic maps
//! degrade to key lookup returning null on miss.

use std::fmt;

use indexmap::IndexMap;
use regex::Regex;
use time::format_description::well_known::Rfc3339;
use time::{Duration, OffsetDateTime};

use crate::expr::parse::{BinaryOp, ExprAst, UnaryOp};
use crate::schema::Schema;
use crate::value::Value;

/// A soft evaluation failure.
///
/// Carried up to the interpreter, which records it in the error sink and
/// substitutes an `ERROR` marker in output.
#[derive(Debug, Clone, PartialEq)]
pub struct EvalError {
    /// Human-readable description.
    pub message: String,
}

impl EvalError {
    fn new(message: impl Into<String>) -> Self {
        Self { message: message.into() }
    }
}

impl fmt::Display for EvalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

/// One frame of the variable stack.
#[derive(Debug, Clone)]
pub enum Frame {
    /// The input message (or the case-subject receiver); identifiers resolve
    /// to its fields.
    Message(Value),
    /// Plain variable bindings (loop variables, indices).
    Vars(IndexMap<String, Value>),
}

/// The variable stack plus the schema, borrowed for one evaluation.
pub struct Activation<'a> {
    frames: Vec<Frame>,
    schema: &'a Schema,
}

impl<'a> Activation<'a> {
    /// Creates an activation whose root frame is the input value (skipped
    /// when the input is null).
    pub fn new(input: &Value, schema: &'a Schema) -> Self {
        let mut frames = Vec::new();
        if !matches!(input, Value::Null) {
            frames.push(Frame::Message(input.clone()));
        }
        Self { frames, schema }
    }

    /// The schema in scope.
    pub fn schema(&self) -> &'a Schema {
        self.schema
    }

    /// Pushes a frame; used for loop scopes and case receivers.
    pub fn push(&mut self, frame: Frame) {
        self.frames.push(frame);
    }

    /// Pops the top frame.
    pub fn pop(&mut self) {
        self.frames.pop();
    }

    /// Resolves an identifier through the stack, top first.
    fn lookup(&self, name: &str) -> Option<Result<Value, EvalError>> {
        for frame in self.frames.iter().rev() {
            match frame {
                Frame::Vars(vars) => {
                    if let Some(value) = vars.get(name) {
                        return Some(Ok(value.clone()));
                    }
                }
                Frame::Message(value) => match value {
                    Value::Message { type_name, fields } => {
                        if let Some(value) = fields.get(name) {
                            return Some(Ok(value.clone()));
                        }
                        if let Some(message) = self.schema.message(type_name) {
                            if let Some(field) = message.field(name) {
                                return Some(Ok(self.schema.default_for(field)));
                            }
                        }
                    }
                    Value::Map(map) => {
                        if let Some(value) = map.get(name) {
                            return Some(Ok(value.clone()));
                        }
                    }
                    _ => {}
                },
            }
        }
        None
    }

    /// True when an identifier or field chain is explicitly set, for `has()`.
    fn is_present(&self, name: &str) -> bool {
        for frame in self.frames.iter().rev() {
            match frame {
                Frame::Vars(vars) => {
                    if vars.contains_key(name) {
                        return true;
                    }
                }
                Frame::Message(Value::Message { fields, .. }) => {
                    if fields.contains_key(name) {
                        return true;
                    }
                }
                Frame::Message(Value::Map(map)) => {
                    if map.contains_key(name) {
                        return true;
                    }
                }
                Frame::Message(_) => {}
            }
        }
        false
    }
}

/// Evaluates a parsed expression against an activation.
pub fn evaluate(ast: &ExprAst, activation: &Activation) -> Result<Value, EvalError> {
    match ast {
        ExprAst::Int(n) => Ok(Value::Int(*n)),
        ExprAst::Float(f) => Ok(Value::Float(*f)),
        ExprAst::Str(s) => Ok(Value::Str(s.clone())),
        ExprAst::Bool(b) => Ok(Value::Bool(*b)),
        ExprAst::Null => Ok(Value::Null),
        ExprAst::Ident(name) => activation
            .lookup(name)
            .unwrap_or_else(|| Err(EvalError::new(format!("unknown identifier {name:?}")))),
        ExprAst::Member { base, field } => {
            let receiver = evaluate(base, activation)?;
            field_access(&receiver, field, activation.schema())
        }
        ExprAst::Index { base, index } => {
            let receiver = evaluate(base, activation)?;
            let key = evaluate(index, activation)?;
            index_access(&receiver, &key)
        }
        ExprAst::Call { function, args } => call_builtin(function, args, activation),
        ExprAst::Method { base, method, args } => call_method(base, method, args, activation),
        ExprAst::Unary { op, operand } => {
            let value = evaluate(operand, activation)?;
            match op {
                UnaryOp::Not => Ok(Value::Bool(!value.is_truthy())),
                UnaryOp::Neg => match value {
                    Value::Int(n) => Ok(Value::Int(-n)),
                    Value::Float(f) => Ok(Value::Float(-f)),
                    other => Err(EvalError::new(format!(
                        "cannot negate {}",
                        other.type_name()
                    ))),
                },
            }
        }
        ExprAst::Binary { op, left, right } => eval_binary(*op, left, right, activation),
        ExprAst::List(items) => {
            let values = items
                .iter()
                .map(|item| evaluate(item, activation))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Value::List(values))
        }
        ExprAst::MapLit(entries) => {
            let mut map = IndexMap::new();
            for (key_expr, value_expr) in entries {
                let key = evaluate(key_expr, activation)?.render_string();
                let value = evaluate(value_expr, activation)?;
                map.insert(key, value);
            }
            Ok(Value::Map(map))
        }
    }
}

/// Field access with schema-aware defaults.
fn field_access(receiver: &Value, field: &str, schema: &Schema) -> Result<Value, EvalError> {
    match receiver {
        Value::Message { type_name, fields } => {
            if let Some(value) = fields.get(field) {
                return Ok(value.clone());
            }
            match schema.message(type_name).and_then(|m| m.field(field)) {
                Some(def) => Ok(schema.default_for(def)),
                None => Err(EvalError::new(format!(
                    "message {type_name:?} has no field {field:?}"
                ))),
            }
        }
        // Dynamic map: degrade to key lookup, null on miss.
        Value::Map(map) => Ok(map.get(field).cloned().unwrap_or(Value::Null)),
        Value::Null => Err(EvalError::new(format!(
            "field access .{field} on null"
        ))),
        other => Err(EvalError::new(format!(
            "field access .{field} on {}",
            other.type_name()
        ))),
    }
}

fn index_access(receiver: &Value, key: &Value) -> Result<Value, EvalError> {
    match (receiver, key) {
        (Value::List(items), Value::Int(n)) => {
            let idx = usize::try_from(*n)
                .map_err(|_| EvalError::new(format!("negative index {n}")))?;
            items
                .get(idx)
                .cloned()
                .ok_or_else(|| EvalError::new(format!("index {n} out of bounds")))
        }
        (Value::Map(map), key) => Ok(map.get(&key.render_string()).cloned().unwrap_or(Value::Null)),
        (Value::Message { fields, .. }, Value::Str(name)) => {
            Ok(fields.get(name).cloned().unwrap_or(Value::Null))
        }
        (Value::Str(s), Value::Int(n)) => {
            let idx = usize::try_from(*n)
                .map_err(|_| EvalError::new(format!("negative index {n}")))?;
            s.chars()
                .nth(idx)
                .map(|c| Value::Str(c.to_string()))
                .ok_or_else(|| EvalError::new(format!("index {n} out of bounds")))
        }
        (receiver, key) => Err(EvalError::new(format!(
            "cannot index {} with {}",
            receiver.type_name(),
            key.type_name()
        ))),
    }
}

fn eval_binary(
    op: BinaryOp,
    left: &ExprAst,
    right: &ExprAst,
    activation: &Activation,
) -> Result<Value, EvalError> {
    // Short-circuit forms first.
    match op {
        BinaryOp::And => {
            let lhs = evaluate(left, activation)?;
            if !lhs.is_truthy() {
                return Ok(Value::Bool(false));
            }
            return Ok(Value::Bool(evaluate(right, activation)?.is_truthy()));
        }
        BinaryOp::Or => {
            let lhs = evaluate(left, activation)?;
            if lhs.is_truthy() {
                return Ok(Value::Bool(true));
            }
            return Ok(Value::Bool(evaluate(right, activation)?.is_truthy()));
        }
        _ => {}
    }

    let lhs = evaluate(left, activation)?;
    let rhs = evaluate(right, activation)?;

    match op {
        BinaryOp::Eq => Ok(Value::Bool(values_equal(&lhs, &rhs))),
        BinaryOp::Ne => Ok(Value::Bool(!values_equal(&lhs, &rhs))),
        BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => {
            let ordering = compare(&lhs, &rhs)?;
            Ok(Value::Bool(match op {
                BinaryOp::Lt => ordering.is_lt(),
                BinaryOp::Le => ordering.is_le(),
                BinaryOp::Gt => ordering.is_gt(),
                _ => ordering.is_ge(),
            }))
        }
        BinaryOp::Add => add_values(lhs, rhs),
        BinaryOp::Sub => numeric_op(lhs, rhs, "-", |a, b| a.checked_sub(b), |a, b| a - b),
        BinaryOp::Mul => numeric_op(lhs, rhs, "*", |a, b| a.checked_mul(b), |a, b| a * b),
        BinaryOp::Div => match (&lhs, &rhs) {
            (_, Value::Int(0)) => Err(EvalError::new("division by zero")),
            (Value::Float(_), _) | (_, Value::Float(_)) => {
                let (a, b) = float_pair(&lhs, &rhs)?;
                if b == 0.0 {
                    Err(EvalError::new("division by zero"))
                } else {
                    Ok(Value::Float(a / b))
                }
            }
            _ => numeric_op(lhs, rhs, "/", |a, b| a.checked_div(b), |a, b| a / b),
        },
        BinaryOp::Mod => match (&lhs, &rhs) {
            (Value::Int(a), Value::Int(b)) => {
                if *b == 0 {
                    Err(EvalError::new("modulo by zero"))
                } else {
                    Ok(Value::Int(a % b))
                }
            }
            _ => Err(EvalError::new("% expects integers")),
        },
        BinaryOp::In => membership(&lhs, &rhs),
        BinaryOp::And | BinaryOp::Or => unreachable!("handled above"),
    }
}

fn values_equal(lhs: &Value, rhs: &Value) -> bool {
    match (lhs, rhs) {
        (Value::Int(a), Value::Float(b)) | (Value::Float(b), Value::Int(a)) => *a as f64 == *b,
        (Value::Enum { number, .. }, Value::Int(n))
        | (Value::Int(n), Value::Enum { number, .. }) => i64::from(*number) == *n,
        (Value::Enum { symbol, .. }, Value::Str(s))
        | (Value::Str(s), Value::Enum { symbol, .. }) => symbol == s,
        _ => lhs == rhs,
    }
}

fn compare(lhs: &Value, rhs: &Value) -> Result<std::cmp::Ordering, EvalError> {
    match (lhs, rhs) {
        (Value::Str(a), Value::Str(b)) => Ok(a.cmp(b)),
        (Value::Bool(a), Value::Bool(b)) => Ok(a.cmp(b)),
        (Value::Timestamp(a), Value::Timestamp(b)) => Ok(a.cmp(b)),
        (Value::Duration(a), Value::Duration(b)) => Ok(a.cmp(b)),
        _ => {
            let (a, b) = float_pair(lhs, rhs)?;
            a.partial_cmp(&b)
                .ok_or_else(|| EvalError::new("values are not comparable"))
        }
    }
}

fn float_pair(lhs: &Value, rhs: &Value) -> Result<(f64, f64), EvalError> {
    let coerce = |v: &Value| -> Option<f64> {
        match v {
            Value::Enum { number, .. } => Some(f64::from(*number)),
            other => other.as_f64(),
        }
    };
    match (coerce(lhs), coerce(rhs)) {
        (Some(a), Some(b)) => Ok((a, b)),
        _ => Err(EvalError::new(format!(
            "cannot compare {} and {}",
            lhs.type_name(),
            rhs.type_name()
        ))),
    }
}

fn add_values(lhs: Value, rhs: Value) -> Result<Value, EvalError> {
    match (lhs, rhs) {
        (Value::Str(a), b) => Ok(Value::Str(a + &b.render_string())),
        (a, Value::Str(b)) => Ok(Value::Str(a.render_string() + &b)),
        (Value::List(mut a), Value::List(b)) => {
            a.extend(b);
            Ok(Value::List(a))
        }
        (lhs, rhs) => numeric_op(lhs, rhs, "+", |a, b| a.checked_add(b), |a, b| a + b),
    }
}

fn numeric_op(
    lhs: Value,
    rhs: Value,
    symbol: &str,
    int_op: impl Fn(i64, i64) -> Option<i64>,
    float_op: impl Fn(f64, f64) -> f64,
) -> Result<Value, EvalError> {
    match (&lhs, &rhs) {
        (Value::Int(a), Value::Int(b)) => int_op(*a, *b)
            .map(Value::Int)
            .ok_or_else(|| EvalError::new(format!("integer overflow in {symbol}"))),
        _ => {
            let (a, b) = float_pair(&lhs, &rhs).map_err(|_| {
                EvalError::new(format!(
                    "operator {symbol} expects numbers, got {} and {}",
                    lhs.type_name(),
                    rhs.type_name()
                ))
            })?;
            Ok(Value::Float(float_op(a, b)))
        }
    }
}

fn membership(needle: &Value, haystack: &Value) -> Result<Value, EvalError> {
    match haystack {
        Value::List(items) => Ok(Value::Bool(items.iter().any(|v| values_equal(v, needle)))),
        Value::Map(map) => Ok(Value::Bool(map.contains_key(&needle.render_string()))),
        Value::Str(s) => match needle {
            Value::Str(sub) => Ok(Value::Bool(s.contains(sub.as_str()))),
            other => Err(EvalError::new(format!(
                "cannot search a string for {}",
                other.type_name()
            ))),
        },
        other => Err(EvalError::new(format!(
            "`in` expects a list, map or string, got {}",
            other.type_name()
        ))),
    }
}

// --- Builtins --------------------------------------------------------------

fn call_builtin(
    function: &str,
    args: &[ExprAst],
    activation: &Activation,
) -> Result<Value, EvalError> {
    match function {
        "has" => {
            let [selector] = args else {
                return Err(EvalError::new("has() takes exactly one argument"));
            };
            eval_has(selector, activation)
        }
        "size" => {
            let value = single_arg("size", args, activation)?;
            value
                .size()
                .map(|n| Value::Int(n as i64))
                .ok_or_else(|| EvalError::new(format!("size() of {}", value.type_name())))
        }
        "type" => {
            let value = single_arg("type", args, activation)?;
            Ok(Value::Str(value.type_name().to_string()))
        }
        "int" => {
            let value = single_arg("int", args, activation)?;
            match value {
                Value::Int(n) => Ok(Value::Int(n)),
                Value::Float(f) => Ok(Value::Int(f as i64)),
                Value::Bool(b) => Ok(Value::Int(i64::from(b))),
                Value::Enum { number, .. } => Ok(Value::Int(i64::from(number))),
                Value::Str(s) => s
                    .trim()
                    .parse()
                    .map(Value::Int)
                    .map_err(|_| EvalError::new(format!("int() cannot parse {s:?}"))),
                other => Err(EvalError::new(format!("int() of {}", other.type_name()))),
            }
        }
        "string" => {
            let value = single_arg("string", args, activation)?;
            Ok(Value::Str(value.render_string()))
        }
        "timestamp" => {
            let value = single_arg("timestamp", args, activation)?;
            match value {
                Value::Str(s) => OffsetDateTime::parse(&s, &Rfc3339)
                    .map(Value::Timestamp)
                    .map_err(|_| EvalError::new(format!("timestamp() cannot parse {s:?}"))),
                Value::Int(secs) => OffsetDateTime::from_unix_timestamp(secs)
                    .map(Value::Timestamp)
                    .map_err(|_| EvalError::new(format!("timestamp() out of range: {secs}"))),
                other => Err(EvalError::new(format!(
                    "timestamp() of {}",
                    other.type_name()
                ))),
            }
        }
        "duration" => {
            let value = single_arg("duration", args, activation)?;
            match value {
                Value::Str(s) => parse_duration(&s)
                    .map(Value::Duration)
                    .ok_or_else(|| EvalError::new(format!("duration() cannot parse {s:?}"))),
                Value::Int(secs) => Ok(Value::Duration(Duration::seconds(secs))),
                other => Err(EvalError::new(format!(
                    "duration() of {}",
                    other.type_name()
                ))),
            }
        }
        "raw" => {
            let value = single_arg("raw", args, activation)?;
            match value {
                Value::Html(html) => Ok(Value::Html(html)),
                other => Ok(Value::Html(other.render_string())),
            }
        }
        other => Err(EvalError::new(format!("unknown function {other:?}"))),
    }
}

fn single_arg(
    name: &str,
    args: &[ExprAst],
    activation: &Activation,
) -> Result<Value, EvalError> {
    let [arg] = args else {
        return Err(EvalError::new(format!("{name}() takes exactly one argument")));
    };
    evaluate(arg, activation)
}

/// `has()` is a presence test over the argument's *shape*, not its value:
/// the final selection step is checked against explicitly-set fields.
fn eval_has(selector: &ExprAst, activation: &Activation) -> Result<Value, EvalError> {
    match selector {
        ExprAst::Ident(name) => Ok(Value::Bool(activation.is_present(name))),
        ExprAst::Member { base, field } => {
            let Ok(receiver) = evaluate(base, activation) else {
                return Ok(Value::Bool(false));
            };
            Ok(Value::Bool(match receiver {
                Value::Message { fields, .. } => fields.contains_key(field),
                Value::Map(map) => map.contains_key(field),
                _ => false,
            }))
        }
        _ => Err(EvalError::new("has() expects a field selection")),
    }
}

fn call_method(
    base: &ExprAst,
    method: &str,
    args: &[ExprAst],
    activation: &Activation,
) -> Result<Value, EvalError> {
    if method.is_empty() {
        return Err(EvalError::new("value is not callable"));
    }
    match method {
        "matches" => {
            let receiver = evaluate(base, activation)?;
            let Value::Str(text) = receiver else {
                return Err(EvalError::new(format!(
                    "matches() on {}",
                    receiver.type_name()
                )));
            };
            let pattern = single_arg("matches", args, activation)?;
            let Value::Str(pattern) = pattern else {
                return Err(EvalError::new("matches() expects a string pattern"));
            };
            let regex = Regex::new(&pattern)
                .map_err(|e| EvalError::new(format!("invalid pattern: {e}")))?;
            Ok(Value::Bool(regex.is_match(&text)))
        }
        "filter" | "map" => comprehension(method, base, args, activation),
        "size" => {
            let receiver = evaluate(base, activation)?;
            receiver
                .size()
                .map(|n| Value::Int(n as i64))
                .ok_or_else(|| EvalError::new(format!("size() of {}", receiver.type_name())))
        }
        other => Err(EvalError::new(format!("unknown method {other:?}"))),
    }
}

/// List comprehensions `xs.filter(x, pred)` / `xs.map(x, expr)`: the first
/// argument is the binding name, the second is evaluated once per element.
fn comprehension(
    method: &str,
    base: &ExprAst,
    args: &[ExprAst],
    activation: &Activation,
) -> Result<Value, EvalError> {
    let [binding, body] = args else {
        return Err(EvalError::new(format!(
            "{method}() takes a binding and an expression"
        )));
    };
    let ExprAst::Ident(var) = binding else {
        return Err(EvalError::new(format!(
            "{method}() binding must be an identifier"
        )));
    };

    let receiver = evaluate(base, activation)?;
    let items = match receiver {
        Value::List(items) => items,
        Value::Map(map) => map.into_keys().map(Value::Str).collect(),
        other => {
            return Err(EvalError::new(format!(
                "{method}() on {}",
                other.type_name()
            )))
        }
    };

    // A nested activation shadows outer bindings with the loop variable.
    let mut scoped = Activation { frames: activation.frames.clone(), schema: activation.schema };
    let mut out = Vec::new();
    for item in items {
        let mut vars = IndexMap::new();
        vars.insert(var.clone(), item.clone());
        scoped.push(Frame::Vars(vars));
        let result = evaluate(body, &scoped);
        scoped.pop();
        let result = result?;
        match method {
            "filter" => {
                if result.is_truthy() {
                    out.push(item);
                }
            }
            _ => out.push(result),
        }
    }
    Ok(Value::List(out))
}

/// Parses compact duration forms: `5s`, `300ms`, `1m30s`, `2h`.
fn parse_duration(text: &str) -> Option<Duration> {
    let mut total = Duration::ZERO;
    let mut digits = String::new();
    let mut chars = text.chars().peekable();
    let mut any = false;

    while let Some(ch) = chars.next() {
        if ch.is_ascii_digit() || ch == '.' {
            digits.push(ch);
            continue;
        }
        let amount: f64 = digits.parse().ok()?;
        digits.clear();
        let unit = match ch {
            'h' => 3600.0,
            'm' if chars.peek() == Some(&'s') => {
                chars.next();
                0.001
            }
            'm' => 60.0,
            's' => 1.0,
            _ => return None,
        };
        total += Duration::seconds_f64(amount * unit);
        any = true;
    }

    if !digits.is_empty() || !any {
        return None;
    }
    Some(total)
}
