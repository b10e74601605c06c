// Copyright 2024-2026 The hudl authors
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Parser for the embedded IDL subset.
//!
//! Schema payloads are extracted from `/** … */` blocks by the node parser;
//! this module parses each payload with the pest grammar in
//! `grammar/proto.pest` and folds all blocks of a document into one
//! [`Schema`]. Error locations are mapped back to document coordinates via
//! the block's span.

use pest::iterators::Pair;
use pest::Parser;
use pest_derive::Parser;

use crate::ast::SchemaBlock;
use crate::error::{HudlError, Result};
use crate::schema::{EnumDef, FieldDef, FieldType, MessageDef, ScalarType, Schema};

/// Pest parser for the IDL subset and the preview text form.
#[derive(Parser)]
#[grammar = "grammar/proto.pest"]
pub struct ProtoParser;

/// Parses all schema blocks of a document into one merged schema.
///
/// Later blocks may reference definitions of earlier ones; duplicate
/// definitions are a schema error.
pub fn parse_schema_blocks<'a>(
    blocks: impl IntoIterator<Item = &'a SchemaBlock>,
) -> Result<Schema> {
    let mut schema = Schema::default();
    for block in blocks {
        parse_into(&mut schema, block)?;
    }
    Ok(schema)
}

fn parse_into(schema: &mut Schema, block: &SchemaBlock) -> Result<()> {
    let pairs = ProtoParser::parse(Rule::proto_file, &block.text).map_err(|e| {
        let (line, column) = match e.line_col {
            pest::error::LineColLocation::Pos(pos) => pos,
            pest::error::LineColLocation::Span(start, _) => start,
        };
        HudlError::SchemaError {
            message: e.variant.message().to_string(),
            line: block.span.line + line.saturating_sub(1),
            column,
            file: None,
        }
    })?;

    let file = pairs.into_iter().next().expect("proto_file rule");
    for decl in file.into_inner() {
        match decl.as_rule() {
            Rule::syntax_decl => {
                let declared = quoted_text(decl.into_inner().next().expect("syntax string"));
                if declared != "proto3" {
                    return Err(HudlError::schema(
                        format!("unsupported syntax {declared:?}, expected \"proto3\""),
                        block.span,
                    ));
                }
            }
            Rule::import_decl => {
                let path = quoted_text(decl.into_inner().next().expect("import path"));
                if !schema.imports.contains(&path) {
                    schema.imports.push(path);
                }
            }
            Rule::message_decl => {
                let message = build_message(decl)?;
                if schema.messages.contains_key(&message.name) {
                    return Err(HudlError::schema(
                        format!("duplicate message {:?}", message.name),
                        block.span,
                    ));
                }
                schema.messages.insert(message.name.clone(), message);
            }
            Rule::enum_decl => {
                let enum_def = build_enum(decl);
                if schema.enums.contains_key(&enum_def.name) {
                    return Err(HudlError::schema(
                        format!("duplicate enum {:?}", enum_def.name),
                        block.span,
                    ));
                }
                schema.enums.insert(enum_def.name.clone(), enum_def);
            }
            Rule::EOI => {}
            rule => unreachable!("unexpected schema declaration {rule:?}"),
        }
    }
    Ok(())
}

fn build_message(decl: Pair<Rule>) -> Result<MessageDef> {
    let mut inner = decl.into_inner();
    let name = inner.next().expect("message name").as_str().to_string();
    let mut fields = Vec::new();

    for field in inner {
        let mut parts = field.into_inner().peekable();
        let repeated = parts
            .peek()
            .is_some_and(|p| p.as_rule() == Rule::kw_repeated);
        if repeated {
            parts.next();
        }
        let ty_pair = parts.next().expect("field type");
        let field_name = parts.next().expect("field name").as_str().to_string();
        let tag: u32 = parts
            .next()
            .expect("field tag")
            .as_str()
            .parse()
            .map_err(|_| HudlError::SchemaError {
                message: format!("invalid tag number for field {field_name:?}"),
                line: 0,
                column: 0,
                file: None,
            })?;

        fields.push(FieldDef {
            name: field_name,
            tag,
            ty: build_field_type(ty_pair),
            repeated,
        });
    }

    Ok(MessageDef { name, fields })
}

fn build_field_type(pair: Pair<Rule>) -> FieldType {
    let inner = pair.into_inner().next().expect("field type inner");
    match inner.as_rule() {
        Rule::map_type => {
            let mut parts = inner.into_inner();
            let key_name = parts.next().expect("map key").as_str();
            let value_name = parts.next().expect("map value").as_str();
            let key = ScalarType::from_name(key_name).unwrap_or(ScalarType::String);
            let value = match ScalarType::from_name(value_name) {
                Some(scalar) => FieldType::Scalar(scalar),
                None => FieldType::Named(value_name.to_string()),
            };
            FieldType::Map(key, Box::new(value))
        }
        Rule::dotted_ident => match ScalarType::from_name(inner.as_str()) {
            Some(scalar) => FieldType::Scalar(scalar),
            None => FieldType::Named(inner.as_str().to_string()),
        },
        rule => unreachable!("unexpected field type rule {rule:?}"),
    }
}

fn build_enum(decl: Pair<Rule>) -> EnumDef {
    let mut inner = decl.into_inner();
    let name = inner.next().expect("enum name").as_str().to_string();
    let entries = inner
        .map(|entry| {
            let mut parts = entry.into_inner();
            let symbol = parts.next().expect("enum symbol").as_str().to_string();
            let number = parts
                .next()
                .expect("enum number")
                .as_str()
                .parse()
                .unwrap_or(0);
            (symbol, number)
        })
        .collect();
    EnumDef { name, entries }
}

fn quoted_text(pair: Pair<Rule>) -> String {
    pair.into_inner()
        .next()
        .map(|inner| inner.as_str().to_string())
        .unwrap_or_default()
}
