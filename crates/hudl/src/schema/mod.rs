// Copyright 2024-2026 The hudl authors
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Schema model built from embedded `/** … */` IDL blocks.
//!
//! A [`Schema`] maps message and enum names to their definitions and is the
//! single source of truth for wire decoding, expression field access and
//! preview-data synthesis. Schemas are immutable after a document is built
//! and rebuilt wholesale when schema blocks change.
//!
//! Import statements (`import "path";`) name neighbor documents; the
//! document set resolves them and merges the imported definitions, with
//! memoization so cycles are tolerated.

mod parse;
pub mod textpb;

pub use parse::parse_schema_blocks;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::value::Value;

/// The message/enum definitions visible to one document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Schema {
    /// Message definitions by name, in declaration order.
    pub messages: IndexMap<String, MessageDef>,
    /// Enum definitions by name, in declaration order.
    pub enums: IndexMap<String, EnumDef>,
    /// Declared import paths, relative to the document's location.
    pub imports: Vec<String>,
}

/// A message definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageDef {
    /// The message name.
    pub name: String,
    /// Fields in declaration order.
    pub fields: Vec<FieldDef>,
}

impl MessageDef {
    /// Looks up a field by name.
    pub fn field(&self, name: &str) -> Option<&FieldDef> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Looks up a field by tag number.
    pub fn field_by_tag(&self, tag: u32) -> Option<&FieldDef> {
        self.fields.iter().find(|f| f.tag == tag)
    }
}

/// One field of a message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDef {
    /// Field name.
    pub name: String,
    /// Wire tag number.
    pub tag: u32,
    /// Declared type.
    pub ty: FieldType,
    /// True for `repeated` fields.
    pub repeated: bool,
}

/// A declared field type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FieldType {
    /// A scalar type.
    Scalar(ScalarType),
    /// A message or enum reference, resolved against the schema at use.
    Named(String),
    /// `map<key, value>`.
    Map(ScalarType, Box<FieldType>),
}

/// Scalar types of the IDL subset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScalarType {
    /// 64-bit float.
    Double,
    /// 32-bit float.
    Float,
    /// Varint-encoded signed 32-bit.
    Int32,
    /// Varint-encoded signed 64-bit.
    Int64,
    /// Varint-encoded unsigned 32-bit.
    Uint32,
    /// Varint-encoded unsigned 64-bit.
    Uint64,
    /// ZigZag varint 32-bit.
    Sint32,
    /// ZigZag varint 64-bit.
    Sint64,
    /// Fixed 4-byte unsigned.
    Fixed32,
    /// Fixed 8-byte unsigned.
    Fixed64,
    /// Fixed 4-byte signed.
    Sfixed32,
    /// Fixed 8-byte signed.
    Sfixed64,
    /// Varint-encoded boolean.
    Bool,
    /// Length-delimited UTF-8.
    String,
    /// Length-delimited bytes.
    Bytes,
}

impl ScalarType {
    /// Resolves a scalar type name, `None` for message/enum names.
    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "double" => ScalarType::Double,
            "float" => ScalarType::Float,
            "int32" => ScalarType::Int32,
            "int64" => ScalarType::Int64,
            "uint32" => ScalarType::Uint32,
            "uint64" => ScalarType::Uint64,
            "sint32" => ScalarType::Sint32,
            "sint64" => ScalarType::Sint64,
            "fixed32" => ScalarType::Fixed32,
            "fixed64" => ScalarType::Fixed64,
            "sfixed32" => ScalarType::Sfixed32,
            "sfixed64" => ScalarType::Sfixed64,
            "bool" => ScalarType::Bool,
            "string" => ScalarType::String,
            "bytes" => ScalarType::Bytes,
            _ => return None,
        })
    }

    /// The IDL's well-known default for this scalar.
    pub fn default_value(&self) -> Value {
        match self {
            ScalarType::Double | ScalarType::Float => Value::Float(0.0),
            ScalarType::Bool => Value::Bool(false),
            ScalarType::String => Value::Str(String::new()),
            ScalarType::Bytes => Value::Bytes(Vec::new()),
            _ => Value::Int(0),
        }
    }
}

/// An enum definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnumDef {
    /// The enum name.
    pub name: String,
    /// Entries in declaration order.
    pub entries: Vec<(String, i32)>,
}

impl EnumDef {
    /// The symbolic name for a numeric value, when one is declared.
    pub fn symbol(&self, number: i32) -> Option<&str> {
        self.entries
            .iter()
            .find(|(_, n)| *n == number)
            .map(|(s, _)| s.as_str())
    }

    /// The numeric value of a symbolic name.
    pub fn number(&self, symbol: &str) -> Option<i32> {
        self.entries
            .iter()
            .find(|(s, _)| s == symbol)
            .map(|(_, n)| *n)
    }
}

impl Schema {
    /// Looks up a message definition.
    pub fn message(&self, name: &str) -> Option<&MessageDef> {
        self.messages.get(name)
    }

    /// Looks up an enum definition.
    pub fn enum_def(&self, name: &str) -> Option<&EnumDef> {
        self.enums.get(name)
    }

    /// Finds the enum declaring a symbol, for bare-identifier case patterns.
    pub fn enum_for_symbol(&self, symbol: &str) -> Option<(&EnumDef, i32)> {
        self.enums
            .values()
            .find_map(|e| e.number(symbol).map(|n| (e, n)))
    }

    /// Merges definitions from an imported schema. Local definitions win on
    /// name collisions.
    pub fn merge_from(&mut self, other: &Schema) {
        for (name, msg) in &other.messages {
            self.messages
                .entry(name.clone())
                .or_insert_with(|| msg.clone());
        }
        for (name, en) in &other.enums {
            self.enums.entry(name.clone()).or_insert_with(|| en.clone());
        }
    }

    /// Builds an enum value from a number, attaching the symbol when known.
    pub fn enum_value(&self, enum_name: &str, number: i32) -> Value {
        let symbol = self
            .enum_def(enum_name)
            .and_then(|e| e.symbol(number))
            .unwrap_or("")
            .to_string();
        Value::Enum { enum_name: enum_name.to_string(), symbol, number }
    }

    /// The default value for an absent field, per the IDL's rules: scalar
    /// zero values, empty lists for repeated fields, empty maps for map
    /// fields, the zero entry for enums and null for messages.
    pub fn default_for(&self, field: &FieldDef) -> Value {
        if field.repeated {
            return Value::List(Vec::new());
        }
        match &field.ty {
            FieldType::Scalar(scalar) => scalar.default_value(),
            FieldType::Map(..) => Value::Map(IndexMap::new()),
            FieldType::Named(name) => {
                if self.enums.contains_key(name) {
                    self.enum_value(name, 0)
                } else {
                    Value::Null
                }
            }
        }
    }

    /// Checks that every named type reference resolves. Returns the names
    /// that do not.
    pub fn unresolved_references(&self) -> Vec<String> {
        let mut missing = Vec::new();
        for msg in self.messages.values() {
            for field in &msg.fields {
                let named = match &field.ty {
                    FieldType::Named(name) => Some(name),
                    FieldType::Map(_, value_ty) => match value_ty.as_ref() {
                        FieldType::Named(name) => Some(name),
                        _ => None,
                    },
                    _ => None,
                };
                if let Some(name) = named {
                    if !self.messages.contains_key(name) && !self.enums.contains_key(name) {
                        missing.push(name.clone());
                    }
                }
            }
        }
        missing.sort();
        missing.dedup();
        missing
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schema_with_enum() -> Schema {
        let mut schema = Schema::default();
        schema.enums.insert(
            "S".to_string(),
            EnumDef {
                name: "S".to_string(),
                entries: vec![("S_ACTIVE".to_string(), 0), ("S_PENDING".to_string(), 1)],
            },
        );
        schema
    }

    #[test]
    fn enum_lookup_round_trips() {
        let schema = schema_with_enum();
        let def = schema.enum_def("S").unwrap();
        assert_eq!(def.symbol(1), Some("S_PENDING"));
        assert_eq!(def.number("S_ACTIVE"), Some(0));
        assert_eq!(schema.enum_for_symbol("S_PENDING").unwrap().1, 1);
    }

    #[test]
    fn defaults_follow_idl_rules() {
        let schema = schema_with_enum();
        let string_field = FieldDef {
            name: "s".to_string(),
            tag: 1,
            ty: FieldType::Scalar(ScalarType::String),
            repeated: false,
        };
        assert_eq!(schema.default_for(&string_field), Value::Str(String::new()));

        let repeated = FieldDef { repeated: true, ..string_field.clone() };
        assert_eq!(schema.default_for(&repeated), Value::List(vec![]));

        let enum_field = FieldDef {
            name: "e".to_string(),
            tag: 2,
            ty: FieldType::Named("S".to_string()),
            repeated: false,
        };
        match schema.default_for(&enum_field) {
            Value::Enum { symbol, number, .. } => {
                assert_eq!(symbol, "S_ACTIVE");
                assert_eq!(number, 0);
            }
            other => panic!("expected enum default, got {other:?}"),
        }

        let msg_field = FieldDef {
            name: "m".to_string(),
            tag: 3,
            ty: FieldType::Named("Missing".to_string()),
            repeated: false,
        };
        assert_eq!(schema.default_for(&msg_field), Value::Null);
    }

    #[test]
    fn merge_prefers_local_definitions() {
        let mut local = schema_with_enum();
        let mut imported = Schema::default();
        imported.enums.insert(
            "S".to_string(),
            EnumDef { name: "S".to_string(), entries: vec![("OTHER".to_string(), 0)] },
        );
        imported.messages.insert(
            "M".to_string(),
            MessageDef { name: "M".to_string(), fields: vec![] },
        );
        local.merge_from(&imported);
        assert_eq!(local.enum_def("S").unwrap().entries[0].0, "S_ACTIVE");
        assert!(local.message("M").is_some());
    }
}
