//! Payload codec: field values <-> little-endian payload bytes.
//!
//! Values are held in declared order; bytes are laid out in wire order. The
//! schema's order map converts between the two.

use crate::core::message::FieldValue;
use crate::core::schema::{FieldSchema, FieldType, MessageSchema};
use crate::error::{ProtocolError, Result};

/// Serialize `values` (declared order) into a full-size payload.
pub fn encode_payload(schema: &MessageSchema, values: &[FieldValue]) -> Result<Vec<u8>> {
    if values.len() != schema.fields().len() {
        return Err(ProtocolError::Schema(format!(
            "{} expects {} values, got {}",
            schema.name(),
            schema.fields().len(),
            values.len()
        )));
    }
    let mut out = Vec::with_capacity(schema.payload_len());
    for &declared in schema.wire_order() {
        let field = &schema.fields()[declared];
        let value = values[declared].clone().coerce(field)?;
        encode_field(field, &value, &mut out);
    }
    Ok(out)
}

fn encode_field(field: &FieldSchema, value: &FieldValue, out: &mut Vec<u8>) {
    match value {
        FieldValue::Text(s) => {
            let width = field.encoded_len();
            let bytes = s.as_bytes();
            out.extend_from_slice(&bytes[..bytes.len().min(width)]);
            out.resize(out.len() + width.saturating_sub(bytes.len()), 0);
        }
        FieldValue::Array(items) => {
            for item in items {
                encode_scalar(item, out);
            }
        }
        scalar => encode_scalar(scalar, out),
    }
}

fn encode_scalar(value: &FieldValue, out: &mut Vec<u8>) {
    match *value {
        FieldValue::U8(v) => out.push(v),
        FieldValue::I8(v) => out.extend_from_slice(&v.to_le_bytes()),
        FieldValue::U16(v) => out.extend_from_slice(&v.to_le_bytes()),
        FieldValue::I16(v) => out.extend_from_slice(&v.to_le_bytes()),
        FieldValue::U32(v) => out.extend_from_slice(&v.to_le_bytes()),
        FieldValue::I32(v) => out.extend_from_slice(&v.to_le_bytes()),
        FieldValue::U64(v) => out.extend_from_slice(&v.to_le_bytes()),
        FieldValue::I64(v) => out.extend_from_slice(&v.to_le_bytes()),
        FieldValue::F32(v) => out.extend_from_slice(&v.to_le_bytes()),
        FieldValue::F64(v) => out.extend_from_slice(&v.to_le_bytes()),
        // coerce() never yields nested text or arrays inside an array
        FieldValue::Text(_) | FieldValue::Array(_) => {}
    }
}

/// Decode a payload of at least `schema.payload_len()` bytes into values in
/// declared order. Extra trailing bytes are ignored.
pub fn decode_payload(schema: &MessageSchema, payload: &[u8]) -> Result<Vec<FieldValue>> {
    if payload.len() < schema.payload_len() {
        return Err(ProtocolError::PayloadTooShort {
            message: schema.name().to_string(),
            actual: payload.len(),
            required: schema.payload_len(),
        });
    }
    let fields = schema.fields();
    let mut values: Vec<Option<FieldValue>> = vec![None; fields.len()];
    for (pos, &declared) in schema.wire_order().iter().enumerate() {
        let field = &fields[declared];
        let start = schema.wire_offsets()[pos];
        let bytes = &payload[start..start + schema.encoded_lengths()[pos]];
        values[declared] = Some(decode_field(field, bytes));
    }
    Ok(values
        .into_iter()
        .zip(fields)
        .map(|(v, f)| v.unwrap_or_else(|| FieldValue::default_for(f)))
        .collect())
}

fn decode_field(field: &FieldSchema, bytes: &[u8]) -> FieldValue {
    if field.is_text() {
        return FieldValue::Text(decode_text(bytes));
    }
    let size = field.field_type.size();
    if field.is_array() {
        FieldValue::Array(
            bytes
                .chunks_exact(size)
                .map(|chunk| decode_scalar(field.field_type, chunk))
                .collect(),
        )
    } else {
        decode_scalar(field.field_type, bytes)
    }
}

fn decode_scalar(ty: FieldType, b: &[u8]) -> FieldValue {
    match ty {
        FieldType::U8 => FieldValue::U8(b[0]),
        FieldType::I8 => FieldValue::I8(b[0] as i8),
        FieldType::U16 => FieldValue::U16(u16::from_le_bytes([b[0], b[1]])),
        FieldType::I16 => FieldValue::I16(i16::from_le_bytes([b[0], b[1]])),
        FieldType::U32 => FieldValue::U32(u32::from_le_bytes([b[0], b[1], b[2], b[3]])),
        FieldType::I32 => FieldValue::I32(i32::from_le_bytes([b[0], b[1], b[2], b[3]])),
        FieldType::F32 => FieldValue::F32(f32::from_le_bytes([b[0], b[1], b[2], b[3]])),
        FieldType::U64 => FieldValue::U64(u64::from_le_bytes(eight(b))),
        FieldType::I64 => FieldValue::I64(i64::from_le_bytes(eight(b))),
        FieldType::F64 => FieldValue::F64(f64::from_le_bytes(eight(b))),
        FieldType::Char => FieldValue::Text(decode_text(&b[..1])),
    }
}

fn eight(b: &[u8]) -> [u8; 8] {
    let mut out = [0u8; 8];
    out.copy_from_slice(&b[..8]);
    out
}

/// NUL-terminated text; invalid UTF-8 is replaced rather than rejected.
pub fn decode_text(bytes: &[u8]) -> String {
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    String::from_utf8_lossy(&bytes[..end]).into_owned()
}
