// Copyright 2024-2026 The hudl authors
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Wire-format decoder: binary input bytes to typed values, guided by the
//! schema.
//!
//! The decoder understands the standard varint / fixed-width /
//! length-delimited encodings, dispatches on the declared field type,
//! skips unknown fields, and leaves absent fields out of the resulting
//! message so field access can apply schema defaults (and `has()` can tell
//! set from unset). Map fields accumulate into an insertion-ordered map;
//! the interpreter's `each` exposes them as `{key, value}` entries.

use indexmap::IndexMap;

use crate::error::{HudlError, Result};
use crate::schema::{FieldDef, FieldType, MessageDef, ScalarType, Schema};
use crate::value::Value;

const WIRE_VARINT: u64 = 0;
const WIRE_FIXED64: u64 = 1;
const WIRE_LEN: u64 = 2;
const WIRE_FIXED32: u64 = 5;

/// Decodes wire-format bytes into a value of the named message type.
pub fn decode_message(bytes: &[u8], message_name: &str, schema: &Schema) -> Result<Value> {
    let message = schema
        .message(message_name)
        .ok_or_else(|| HudlError::DecodeError {
            offset: 0,
            message: format!("unknown message type {message_name:?}"),
        })?;
    let mut reader = Reader { buf: bytes, pos: 0, base: 0 };
    decode_fields(&mut reader, message, schema)
}

struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
    /// Offset of `buf[0]` in the original input, for error reporting from
    /// nested length-delimited regions.
    base: usize,
}

impl<'a> Reader<'a> {
    fn offset(&self) -> usize {
        self.base + self.pos
    }

    fn is_empty(&self) -> bool {
        self.pos >= self.buf.len()
    }

    fn error(&self, message: impl Into<String>) -> HudlError {
        HudlError::DecodeError { offset: self.offset(), message: message.into() }
    }

    fn varint(&mut self) -> Result<u64> {
        let mut value: u64 = 0;
        let mut shift = 0u32;
        loop {
            let byte = *self
                .buf
                .get(self.pos)
                .ok_or_else(|| self.error("truncated varint"))?;
            self.pos += 1;
            if shift >= 64 {
                return Err(self.error("varint overflows 64 bits"));
            }
            value |= u64::from(byte & 0x7f) << shift;
            if byte & 0x80 == 0 {
                return Ok(value);
            }
            shift += 7;
        }
    }

    fn fixed32(&mut self) -> Result<u32> {
        let end = self.pos + 4;
        let slice = self
            .buf
            .get(self.pos..end)
            .ok_or_else(|| self.error("truncated fixed32"))?;
        self.pos = end;
        Ok(u32::from_le_bytes(slice.try_into().expect("4-byte slice")))
    }

    fn fixed64(&mut self) -> Result<u64> {
        let end = self.pos + 8;
        let slice = self
            .buf
            .get(self.pos..end)
            .ok_or_else(|| self.error("truncated fixed64"))?;
        self.pos = end;
        Ok(u64::from_le_bytes(slice.try_into().expect("8-byte slice")))
    }

    fn delimited(&mut self) -> Result<Reader<'a>> {
        let len = self.varint()? as usize;
        let end = self
            .pos
            .checked_add(len)
            .filter(|end| *end <= self.buf.len())
            .ok_or_else(|| self.error("length-delimited field exceeds input"))?;
        let region = Reader {
            buf: &self.buf[self.pos..end],
            pos: 0,
            base: self.offset(),
        };
        self.pos = end;
        Ok(region)
    }

    fn skip(&mut self, wire_type: u64) -> Result<()> {
        match wire_type {
            WIRE_VARINT => {
                self.varint()?;
            }
            WIRE_FIXED64 => {
                self.fixed64()?;
            }
            WIRE_LEN => {
                self.delimited()?;
            }
            WIRE_FIXED32 => {
                self.fixed32()?;
            }
            other => return Err(self.error(format!("unsupported wire type {other}"))),
        }
        Ok(())
    }
}

fn decode_fields(reader: &mut Reader, message: &MessageDef, schema: &Schema) -> Result<Value> {
    let mut fields: IndexMap<String, Value> = IndexMap::new();

    while !reader.is_empty() {
        let key = reader.varint()?;
        let tag = (key >> 3) as u32;
        let wire_type = key & 7;

        let Some(field) = message.field_by_tag(tag) else {
            reader.skip(wire_type)?;
            continue;
        };

        decode_field(reader, field, wire_type, schema, &mut fields)?;
    }

    // Keep schema declaration order so message stringification is stable.
    fields.sort_by(|a, _, b, _| {
        let pos = |name: &str| message.fields.iter().position(|f| f.name == name);
        pos(a).cmp(&pos(b))
    });

    Ok(Value::Message { type_name: message.name.clone(), fields })
}

fn decode_field(
    reader: &mut Reader,
    field: &FieldDef,
    wire_type: u64,
    schema: &Schema,
    fields: &mut IndexMap<String, Value>,
) -> Result<()> {
    match &field.ty {
        FieldType::Map(key_ty, value_ty) => {
            if wire_type != WIRE_LEN {
                return Err(reader.error(format!(
                    "map field {:?} expects length-delimited encoding",
                    field.name
                )));
            }
            let mut entry = reader.delimited()?;
            let (key, value) = decode_map_entry(&mut entry, *key_ty, value_ty, schema)?;
            match fields
                .entry(field.name.clone())
                .or_insert_with(|| Value::Map(IndexMap::new()))
            {
                Value::Map(map) => {
                    map.insert(key, value);
                }
                _ => unreachable!("map field accumulates into a map"),
            }
            Ok(())
        }
        ty => {
            let packable = is_packable(ty);
            if field.repeated && wire_type == WIRE_LEN && packable {
                // Packed repeated scalars.
                let mut packed = reader.delimited()?;
                while !packed.is_empty() {
                    let value = decode_single(&mut packed, ty, natural_wire_type(ty), schema)?;
                    push_repeated(fields, field, value);
                }
                Ok(())
            } else {
                let value = decode_single(reader, ty, wire_type, schema)?;
                if field.repeated {
                    push_repeated(fields, field, value);
                } else {
                    fields.insert(field.name.clone(), value);
                }
                Ok(())
            }
        }
    }
}

fn push_repeated(fields: &mut IndexMap<String, Value>, field: &FieldDef, value: Value) {
    match fields
        .entry(field.name.clone())
        .or_insert_with(|| Value::List(Vec::new()))
    {
        Value::List(items) => items.push(value),
        _ => unreachable!("repeated field accumulates into a list"),
    }
}

fn is_packable(ty: &FieldType) -> bool {
    match ty {
        FieldType::Scalar(scalar) => !matches!(scalar, ScalarType::String | ScalarType::Bytes),
        FieldType::Named(_) => false,
        FieldType::Map(..) => false,
    }
}

fn natural_wire_type(ty: &FieldType) -> u64 {
    match ty {
        FieldType::Scalar(scalar) => match scalar {
            ScalarType::Fixed32 | ScalarType::Sfixed32 | ScalarType::Float => WIRE_FIXED32,
            ScalarType::Fixed64 | ScalarType::Sfixed64 | ScalarType::Double => WIRE_FIXED64,
            ScalarType::String | ScalarType::Bytes => WIRE_LEN,
            _ => WIRE_VARINT,
        },
        FieldType::Named(_) => WIRE_LEN,
        FieldType::Map(..) => WIRE_LEN,
    }
}

fn decode_single(
    reader: &mut Reader,
    ty: &FieldType,
    wire_type: u64,
    schema: &Schema,
) -> Result<Value> {
    match ty {
        FieldType::Scalar(scalar) => decode_scalar(reader, *scalar, wire_type),
        FieldType::Named(name) => {
            if schema.enum_def(name).is_some() {
                if wire_type != WIRE_VARINT {
                    return Err(reader.error(format!("enum {name:?} expects varint encoding")));
                }
                let number = reader.varint()? as i64 as i32;
                Ok(schema.enum_value(name, number))
            } else if let Some(message) = schema.message(name) {
                if wire_type != WIRE_LEN {
                    return Err(reader.error(format!(
                        "message {name:?} expects length-delimited encoding"
                    )));
                }
                let mut region = reader.delimited()?;
                decode_fields(&mut region, message, schema)
            } else {
                Err(reader.error(format!("unknown type {name:?}")))
            }
        }
        FieldType::Map(..) => unreachable!("maps are handled per-entry"),
    }
}

fn decode_scalar(reader: &mut Reader, scalar: ScalarType, wire_type: u64) -> Result<Value> {
    let expected = natural_wire_type(&FieldType::Scalar(scalar));
    if wire_type != expected {
        return Err(reader.error(format!(
            "field declared {scalar:?} but encoded with wire type {wire_type}"
        )));
    }
    Ok(match scalar {
        ScalarType::Int32 | ScalarType::Int64 => Value::Int(reader.varint()? as i64),
        ScalarType::Uint32 | ScalarType::Uint64 => Value::Int(reader.varint()? as i64),
        ScalarType::Sint32 | ScalarType::Sint64 => {
            let n = reader.varint()?;
            Value::Int(((n >> 1) as i64) ^ -((n & 1) as i64))
        }
        ScalarType::Bool => Value::Bool(reader.varint()? != 0),
        ScalarType::Fixed32 => Value::Int(i64::from(reader.fixed32()?)),
        ScalarType::Sfixed32 => Value::Int(i64::from(reader.fixed32()? as i32)),
        ScalarType::Fixed64 => Value::Int(reader.fixed64()? as i64),
        ScalarType::Sfixed64 => Value::Int(reader.fixed64()? as i64),
        ScalarType::Float => Value::Float(f64::from(f32::from_bits(reader.fixed32()?))),
        ScalarType::Double => Value::Float(f64::from_bits(reader.fixed64()?)),
        ScalarType::String => {
            let region = reader.delimited()?;
            let text = std::str::from_utf8(region.buf)
                .map_err(|_| HudlError::DecodeError {
                    offset: region.base,
                    message: "string field is not valid UTF-8".to_string(),
                })?
                .to_string();
            Value::Str(text)
        }
        ScalarType::Bytes => {
            let region = reader.delimited()?;
            Value::Bytes(region.buf.to_vec())
        }
    })
}

fn decode_map_entry(
    entry: &mut Reader,
    key_ty: ScalarType,
    value_ty: &FieldType,
    schema: &Schema,
) -> Result<(String, Value)> {
    let mut key = key_ty.default_value();
    let mut value: Option<Value> = None;

    while !entry.is_empty() {
        let field_key = entry.varint()?;
        let tag = field_key >> 3;
        let wire_type = field_key & 7;
        match tag {
            1 => key = decode_scalar(entry, key_ty, wire_type)?,
            2 => value = Some(decode_single(entry, value_ty, wire_type, schema)?),
            _ => entry.skip(wire_type)?,
        }
    }

    let value = match value {
        Some(v) => v,
        None => match value_ty {
            FieldType::Scalar(scalar) => scalar.default_value(),
            _ => Value::Null,
        },
    };
    Ok((key.render_string(), value))
}
