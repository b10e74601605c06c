// Copyright 2024-2026 The hudl authors
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! The typed value space shared by wire decoding and expression evaluation.
//!
//! A [`Value`] is the runtime representation of anything a template can
//! touch: decoded message fields, loop bindings, expression results. Message
//! values keep only the fields that were explicitly present on the wire;
//! schema defaults are applied at field-access time so that `has()` can
//! still distinguish set from unset.

use indexmap::IndexMap;
use time::format_description::well_known::Rfc3339;
use time::{Duration, OffsetDateTime};

/// A dynamically typed runtime value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Absent / unset.
    Null,
    /// Boolean.
    Bool(bool),
    /// 64-bit signed integer. Unsigned wire values are widened into this.
    Int(i64),
    /// 64-bit float.
    Float(f64),
    /// UTF-8 string.
    Str(String),
    /// Raw bytes.
    Bytes(Vec<u8>),
    /// Ordered list.
    List(Vec<Value>),
    /// String-keyed map in insertion order.
    Map(IndexMap<String, Value>),
    /// Point in time.
    Timestamp(OffsetDateTime),
    /// Span of time.
    Duration(Duration),
    /// Enum value with its symbolic name when known.
    Enum {
        /// The enum type name.
        enum_name: String,
        /// Symbolic entry name; empty when the number has no known entry.
        symbol: String,
        /// The numeric value.
        number: i32,
    },
    /// A decoded message: explicitly-present fields only, in schema order.
    Message {
        /// The message type name.
        type_name: String,
        /// Present fields.
        fields: IndexMap<String, Value>,
    },
    /// Pre-escaped HTML produced by `raw()`; inserted verbatim.
    Html(String),
}

impl Value {
    /// Truthiness: `true`, nonzero numbers, non-empty strings/lists/maps.
    /// Null is always falsy; messages are truthy.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::Int(n) => *n != 0,
            Value::Float(f) => *f != 0.0,
            Value::Str(s) => !s.is_empty(),
            Value::Bytes(b) => !b.is_empty(),
            Value::List(items) => !items.is_empty(),
            Value::Map(map) => !map.is_empty(),
            Value::Timestamp(_) => true,
            Value::Duration(d) => !d.is_zero(),
            Value::Enum { number, .. } => *number != 0,
            Value::Message { .. } => true,
            Value::Html(s) => !s.is_empty(),
        }
    }

    /// The value's type name, as reported by the `type()` builtin.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "string",
            Value::Bytes(_) => "bytes",
            Value::List(_) => "list",
            Value::Map(_) => "map",
            Value::Timestamp(_) => "timestamp",
            Value::Duration(_) => "duration",
            Value::Enum { .. } => "enum",
            Value::Message { .. } => "message",
            Value::Html(_) => "html",
        }
    }

    /// Stringification used for text interpolation and attribute values.
    pub fn render_string(&self) -> String {
        match self {
            Value::Null => String::new(),
            Value::Bool(b) => b.to_string(),
            Value::Int(n) => n.to_string(),
            Value::Float(f) => format_float(*f),
            Value::Str(s) => s.clone(),
            Value::Bytes(b) => String::from_utf8_lossy(b).into_owned(),
            Value::List(items) => items
                .iter()
                .map(Value::render_string)
                .collect::<Vec<_>>()
                .join(", "),
            Value::Map(map) => map
                .iter()
                .map(|(k, v)| format!("{}: {}", k, v.render_string()))
                .collect::<Vec<_>>()
                .join(", "),
            Value::Timestamp(ts) => ts
                .format(&Rfc3339)
                .unwrap_or_else(|_| ts.unix_timestamp().to_string()),
            Value::Duration(d) => format!("{}s", d.as_seconds_f64()),
            Value::Enum { symbol, number, .. } => {
                if symbol.is_empty() {
                    number.to_string()
                } else {
                    symbol.clone()
                }
            }
            Value::Message { fields, .. } => fields
                .iter()
                .map(|(k, v)| format!("{}: {}", k, v.render_string()))
                .collect::<Vec<_>>()
                .join(", "),
            Value::Html(s) => s.clone(),
        }
    }

    /// Length as reported by the `size()` builtin, when the value has one.
    pub fn size(&self) -> Option<usize> {
        match self {
            Value::Str(s) => Some(s.chars().count()),
            Value::Bytes(b) => Some(b.len()),
            Value::List(items) => Some(items.len()),
            Value::Map(map) => Some(map.len()),
            _ => None,
        }
    }

    /// Numeric comparison across int/float; `None` for non-numbers.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(n) => Some(*n as f64),
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }
}

/// Formats a float the way templates expect: integral values lose the
/// trailing `.0`, everything else uses the shortest round-trip form.
fn format_float(f: f64) -> String {
    if f.fract() == 0.0 && f.is_finite() && f.abs() < 1e15 {
        format!("{}", f as i64)
    } else {
        format!("{}", f)
    }
}
