// Copyright 2024-2026 The hudl authors
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Text-form support for preview data files (`*.preview.txtpb`).
//!
//! Preview files hold mock component inputs in the IDL's text form. This
//! module parses that form into [`Value`] messages guided by the schema, and
//! synthesizes a default skeleton for a message the first time a preview is
//! requested.

use indexmap::IndexMap;
use pest::iterators::Pair;
use pest::Parser;

use crate::error::{HudlError, Result};
use crate::schema::parse::{ProtoParser, Rule};
use crate::schema::{FieldDef, FieldType, MessageDef, ScalarType, Schema};
use crate::value::Value;

/// Parses text-form input into a message value.
///
/// Unknown field names, scalar/message mismatches and malformed literals are
/// decode errors; absent fields follow the schema's defaults at access time,
/// exactly like wire-decoded messages.
pub fn parse_text(text: &str, message: &MessageDef, schema: &Schema) -> Result<Value> {
    let pairs = ProtoParser::parse(Rule::textpb_file, text).map_err(|e| {
        let offset = match e.location {
            pest::error::InputLocation::Pos(p) => p,
            pest::error::InputLocation::Span((s, _)) => s,
        };
        HudlError::DecodeError {
            offset,
            message: format!("invalid preview text: {}", e.variant.message()),
        }
    })?;

    let file = pairs.into_iter().next().expect("textpb_file rule");
    let fields = file
        .into_inner()
        .filter(|p| p.as_rule() == Rule::textpb_field)
        .collect::<Vec<_>>();
    build_message(&fields, message, schema)
}

fn build_message(
    pairs: &[Pair<Rule>],
    message: &MessageDef,
    schema: &Schema,
) -> Result<Value> {
    let mut fields: IndexMap<String, Value> = IndexMap::new();

    for pair in pairs {
        let offset = pair.as_span().start();
        let mut inner = pair.clone().into_inner();
        let name = inner.next().expect("field name").as_str().to_string();
        let value_pair = inner.next().expect("field value");

        let field = message.field(&name).ok_or_else(|| HudlError::DecodeError {
            offset,
            message: format!("unknown field {:?} in message {:?}", name, message.name),
        })?;

        let value = build_field_value(&value_pair, field, schema, offset)?;
        if field.repeated {
            match fields.entry(name).or_insert_with(|| Value::List(Vec::new())) {
                Value::List(items) => items.push(value),
                _ => unreachable!("repeated field accumulates into a list"),
            }
        } else if let FieldType::Map(..) = field.ty {
            merge_map_entry(&mut fields, &name, value, offset)?;
        } else {
            fields.insert(name, value);
        }
    }

    Ok(Value::Message { type_name: message.name.clone(), fields })
}

fn merge_map_entry(
    fields: &mut IndexMap<String, Value>,
    name: &str,
    entry: Value,
    offset: usize,
) -> Result<()> {
    let (key, value) = match entry {
        Value::Message { mut fields, .. } => {
            let key = fields
                .shift_remove("key")
                .map(|k| k.render_string())
                .unwrap_or_default();
            let value = fields.shift_remove("value").unwrap_or(Value::Null);
            (key, value)
        }
        _ => {
            return Err(HudlError::DecodeError {
                offset,
                message: format!("map field {name:?} expects `{{ key: … value: … }}` entries"),
            })
        }
    };
    match fields
        .entry(name.to_string())
        .or_insert_with(|| Value::Map(IndexMap::new()))
    {
        Value::Map(map) => {
            map.insert(key, value);
        }
        _ => unreachable!("map field accumulates into a map"),
    }
    Ok(())
}

fn build_field_value(
    pair: &Pair<Rule>,
    field: &FieldDef,
    schema: &Schema,
    offset: usize,
) -> Result<Value> {
    match pair.as_rule() {
        Rule::textpb_block => {
            let inner: Vec<_> = pair.clone().into_inner().collect();
            match &field.ty {
                FieldType::Named(name) => {
                    let nested = schema.message(name).ok_or_else(|| HudlError::DecodeError {
                        offset,
                        message: format!("unknown message type {name:?}"),
                    })?;
                    build_message(&inner, nested, schema)
                }
                FieldType::Map(key_ty, value_ty) => {
                    // Map entries are written as synthetic { key value } messages.
                    let entry_def = map_entry_def(field, *key_ty, value_ty);
                    build_message(&inner, &entry_def, schema)
                }
                _ => Err(HudlError::DecodeError {
                    offset,
                    message: format!("field {:?} is not a message", field.name),
                }),
            }
        }
        Rule::quoted => {
            let text = pair
                .clone()
                .into_inner()
                .next()
                .map(|p| p.as_str().to_string())
                .unwrap_or_default();
            match &field.ty {
                FieldType::Scalar(ScalarType::Bytes) => Ok(Value::Bytes(text.into_bytes())),
                _ => Ok(Value::Str(text)),
            }
        }
        Rule::textpb_number => {
            let text = pair.as_str();
            match &field.ty {
                FieldType::Scalar(ScalarType::Double) | FieldType::Scalar(ScalarType::Float) => {
                    text.parse::<f64>().map(Value::Float).map_err(|_| {
                        HudlError::DecodeError {
                            offset,
                            message: format!("invalid float literal {text:?}"),
                        }
                    })
                }
                FieldType::Named(name) if schema.enum_def(name).is_some() => {
                    let number = text.parse::<i32>().map_err(|_| HudlError::DecodeError {
                        offset,
                        message: format!("invalid enum number {text:?}"),
                    })?;
                    Ok(schema.enum_value(name, number))
                }
                _ => text.parse::<i64>().map(Value::Int).map_err(|_| {
                    HudlError::DecodeError {
                        offset,
                        message: format!("invalid integer literal {text:?}"),
                    }
                }),
            }
        }
        Rule::ident => {
            let word = pair.as_str();
            match word {
                "true" => Ok(Value::Bool(true)),
                "false" => Ok(Value::Bool(false)),
                _ => match &field.ty {
                    FieldType::Named(name) => {
                        let def = schema.enum_def(name).ok_or_else(|| HudlError::DecodeError {
                            offset,
                            message: format!("{word:?} is not a value of {name:?}"),
                        })?;
                        let number = def.number(word).ok_or_else(|| HudlError::DecodeError {
                            offset,
                            message: format!("unknown enum symbol {word:?} for {name:?}"),
                        })?;
                        Ok(schema.enum_value(name, number))
                    }
                    _ => Err(HudlError::DecodeError {
                        offset,
                        message: format!("unexpected bare word {word:?}"),
                    }),
                },
            }
        }
        rule => unreachable!("unexpected text value rule {rule:?}"),
    }
}

fn map_entry_def(field: &FieldDef, key_ty: ScalarType, value_ty: &FieldType) -> MessageDef {
    MessageDef {
        name: format!("{}Entry", field.name),
        fields: vec![
            FieldDef {
                name: "key".to_string(),
                tag: 1,
                ty: FieldType::Scalar(key_ty),
                repeated: false,
            },
            FieldDef {
                name: "value".to_string(),
                tag: 2,
                ty: value_ty.clone(),
                repeated: false,
            },
        ],
    }
}

/// Synthesizes a default preview skeleton for a message: every scalar field
/// with its zero value, enums by their zero symbol, nested messages as empty
/// blocks. Repeated and map fields are listed as comments so the shape stays
/// visible without asserting any entries.
pub fn default_text(message: &MessageDef, schema: &Schema) -> String {
    let mut out = String::new();
    write_default_fields(&mut out, message, schema, 0);
    out
}

fn write_default_fields(out: &mut String, message: &MessageDef, schema: &Schema, depth: usize) {
    let indent = "  ".repeat(depth);
    for field in &message.fields {
        if field.repeated {
            out.push_str(&format!("# {}: repeated {}\n", field.name, type_label(&field.ty)));
            continue;
        }
        match &field.ty {
            FieldType::Scalar(scalar) => {
                let literal = match scalar {
                    ScalarType::String => "\"\"".to_string(),
                    ScalarType::Bytes => "\"\"".to_string(),
                    ScalarType::Bool => "false".to_string(),
                    ScalarType::Double | ScalarType::Float => "0.0".to_string(),
                    _ => "0".to_string(),
                };
                out.push_str(&format!("{indent}{}: {literal}\n", field.name));
            }
            FieldType::Named(name) => {
                if let Some(def) = schema.enum_def(name) {
                    let symbol = def.symbol(0).unwrap_or("0");
                    out.push_str(&format!("{indent}{}: {symbol}\n", field.name));
                } else if let Some(nested) = schema.message(name) {
                    out.push_str(&format!("{indent}{} {{\n", field.name));
                    write_default_fields(out, nested, schema, depth + 1);
                    out.push_str(&format!("{indent}}}\n"));
                }
            }
            FieldType::Map(..) => {
                out.push_str(&format!("# {}: map entries as {{ key: … value: … }}\n", field.name));
            }
        }
    }
}

fn type_label(ty: &FieldType) -> String {
    match ty {
        FieldType::Scalar(s) => format!("{s:?}").to_lowercase(),
        FieldType::Named(n) => n.clone(),
        FieldType::Map(..) => "map".to_string(),
    }
}
