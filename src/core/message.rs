//! # Message Instances
//!
//! A [`MessageInstance`] is one typed message plus the provenance of the frame
//! it travelled in: header, payload bytes, checksum, signing outcome and the raw
//! frame. Outbound instances are built by the caller and completed by the
//! packer; inbound instances are produced by the decoder and not mutated again.
//!
//! Messages the registry does not know, and bytes that never formed a valid
//! frame, still become instances (`UNKNOWN_<id>` and `BAD_DATA`), so the event
//! stream never silently drops input.

use crate::core::header::Header;
use crate::core::schema::{FieldSchema, FieldType, MessageSchema};
use crate::error::{ProtocolError, Result};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Pseudo message id of bad-data placeholders
pub const MSG_ID_BAD_DATA: i64 = -1;
/// Pseudo message id of unknown-message placeholders
pub const MSG_ID_UNKNOWN: i64 = -2;

/// A single field value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FieldValue {
    U8(u8),
    I8(i8),
    U16(u16),
    I16(i16),
    U32(u32),
    I32(i32),
    U64(u64),
    I64(i64),
    F32(f32),
    F64(f64),
    Text(String),
    Array(Vec<FieldValue>),
}

impl FieldValue {
    /// Zero value of a field: 0, empty text, or a zero-filled array.
    pub fn default_for(field: &FieldSchema) -> Self {
        if field.is_text() {
            return FieldValue::Text(String::new());
        }
        let zero = Self::zero(field.field_type);
        if field.is_array() {
            FieldValue::Array(vec![zero; field.array_length])
        } else {
            zero
        }
    }

    fn zero(ty: FieldType) -> Self {
        match ty {
            FieldType::Char => FieldValue::Text(String::new()),
            FieldType::U8 => FieldValue::U8(0),
            FieldType::I8 => FieldValue::I8(0),
            FieldType::U16 => FieldValue::U16(0),
            FieldType::I16 => FieldValue::I16(0),
            FieldType::U32 => FieldValue::U32(0),
            FieldType::I32 => FieldValue::I32(0),
            FieldType::U64 => FieldValue::U64(0),
            FieldType::I64 => FieldValue::I64(0),
            FieldType::F32 => FieldValue::F32(0.0),
            FieldType::F64 => FieldValue::F64(0.0),
        }
    }

    /// Integer view, when the value is an integer variant.
    pub fn as_i128(&self) -> Option<i128> {
        match *self {
            FieldValue::U8(v) => Some(v as i128),
            FieldValue::I8(v) => Some(v as i128),
            FieldValue::U16(v) => Some(v as i128),
            FieldValue::I16(v) => Some(v as i128),
            FieldValue::U32(v) => Some(v as i128),
            FieldValue::I32(v) => Some(v as i128),
            FieldValue::U64(v) => Some(v as i128),
            FieldValue::I64(v) => Some(v as i128),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match *self {
            FieldValue::F32(v) => Some(v as f64),
            FieldValue::F64(v) => Some(v),
            _ => self.as_i128().map(|v| v as f64),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Coerce into the exact variant `field` stores, checking the width.
    pub fn coerce(self, field: &FieldSchema) -> Result<Self> {
        if field.is_text() {
            return match self {
                FieldValue::Text(s) if s.len() <= field.array_length.max(1) => {
                    Ok(FieldValue::Text(s))
                }
                FieldValue::Text(_) => Err(out_of_range(field)),
                _ => Err(type_error(field)),
            };
        }
        if field.is_array() {
            return match self {
                FieldValue::Array(items) if items.len() <= field.array_length => {
                    let mut out = items
                        .into_iter()
                        .map(|v| v.coerce_scalar(field))
                        .collect::<Result<Vec<_>>>()?;
                    out.resize(field.array_length, Self::zero(field.field_type));
                    Ok(FieldValue::Array(out))
                }
                FieldValue::Array(_) => Err(out_of_range(field)),
                _ => Err(type_error(field)),
            };
        }
        self.coerce_scalar(field)
    }

    fn coerce_scalar(self, field: &FieldSchema) -> Result<Self> {
        let ty = field.field_type;
        if ty.is_float() {
            let v = self.as_f64().ok_or_else(|| type_error(field))?;
            return Ok(match ty {
                FieldType::F32 => FieldValue::F32(v as f32),
                _ => FieldValue::F64(v),
            });
        }
        let v = self.as_i128().ok_or_else(|| type_error(field))?;
        let fits = |min: i128, max: i128| {
            if (min..=max).contains(&v) {
                Ok(v)
            } else {
                Err(out_of_range(field))
            }
        };
        Ok(match ty {
            FieldType::U8 => FieldValue::U8(fits(0, u8::MAX as i128)? as u8),
            FieldType::I8 => FieldValue::I8(fits(i8::MIN as i128, i8::MAX as i128)? as i8),
            FieldType::U16 => FieldValue::U16(fits(0, u16::MAX as i128)? as u16),
            FieldType::I16 => FieldValue::I16(fits(i16::MIN as i128, i16::MAX as i128)? as i16),
            FieldType::U32 => FieldValue::U32(fits(0, u32::MAX as i128)? as u32),
            FieldType::I32 => FieldValue::I32(fits(i32::MIN as i128, i32::MAX as i128)? as i32),
            FieldType::U64 => FieldValue::U64(fits(0, u64::MAX as i128)? as u64),
            FieldType::I64 => FieldValue::I64(fits(i64::MIN as i128, i64::MAX as i128)? as i64),
            FieldType::Char | FieldType::F32 | FieldType::F64 => return Err(type_error(field)),
        })
    }
}

fn type_error(field: &FieldSchema) -> ProtocolError {
    ProtocolError::FieldType {
        field: field.name.clone(),
        expected: describe(field),
    }
}

fn out_of_range(field: &FieldSchema) -> ProtocolError {
    ProtocolError::FieldOutOfRange {
        field: field.name.clone(),
        expected: describe(field),
    }
}

fn describe(field: &FieldSchema) -> String {
    if field.is_array() {
        format!("{}[{}]", field.field_type.c_type(), field.array_length)
    } else {
        field.field_type.c_type().to_string()
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::U8(v) => write!(f, "{v}"),
            FieldValue::I8(v) => write!(f, "{v}"),
            FieldValue::U16(v) => write!(f, "{v}"),
            FieldValue::I16(v) => write!(f, "{v}"),
            FieldValue::U32(v) => write!(f, "{v}"),
            FieldValue::I32(v) => write!(f, "{v}"),
            FieldValue::U64(v) => write!(f, "{v}"),
            FieldValue::I64(v) => write!(f, "{v}"),
            FieldValue::F32(v) => write!(f, "{v}"),
            FieldValue::F64(v) => write!(f, "{v}"),
            FieldValue::Text(s) => f.write_str(s),
            FieldValue::Array(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
        }
    }
}

macro_rules! impl_from_scalar {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(impl From<$ty> for FieldValue {
            fn from(v: $ty) -> Self {
                FieldValue::$variant(v)
            }
        })*
    };
}

impl_from_scalar!(
    u8 => U8, i8 => I8, u16 => U16, i16 => I16, u32 => U32, i32 => I32,
    u64 => U64, i64 => I64, f32 => F32, f64 => F64, String => Text,
);

impl From<&str> for FieldValue {
    fn from(v: &str) -> Self {
        FieldValue::Text(v.to_string())
    }
}

impl<T: Into<FieldValue>> From<Vec<T>> for FieldValue {
    fn from(v: Vec<T>) -> Self {
        FieldValue::Array(v.into_iter().map(Into::into).collect())
    }
}

/// What kind of message an instance holds.
#[derive(Debug, Clone)]
pub enum MessageKind {
    Known(Arc<MessageSchema>),
    /// Well-formed frame whose id is not in the registry
    Unknown { msg_id: u32 },
    /// Bytes that could not be decoded
    BadData { reason: String },
}

/// Typed message plus frame provenance.
#[derive(Debug, Clone)]
pub struct MessageInstance {
    kind: MessageKind,
    names: Vec<String>,
    values: Vec<FieldValue>,
    header: Header,
    payload: Bytes,
    crc: Option<u16>,
    signed: bool,
    link_id: Option<u8>,
    frame: Bytes,
}

impl MessageInstance {
    /// New outbound message with every field at its zero value.
    pub fn new(schema: Arc<MessageSchema>) -> Self {
        let names = schema.fields().iter().map(|f| f.name.clone()).collect();
        let values = schema.fields().iter().map(FieldValue::default_for).collect();
        let header = Header::new(schema.id());
        Self {
            kind: MessageKind::Known(schema),
            names,
            values,
            header,
            payload: Bytes::new(),
            crc: None,
            signed: false,
            link_id: None,
            frame: Bytes::new(),
        }
    }

    /// Placeholder for a frame with an unregistered message id.
    pub fn unknown(header: Header, frame: Bytes) -> Self {
        Self {
            kind: MessageKind::Unknown {
                msg_id: header.msg_id,
            },
            names: vec!["data".into()],
            values: vec![bytes_value(&frame)],
            header,
            payload: Bytes::new(),
            crc: None,
            signed: false,
            link_id: None,
            frame,
        }
    }

    /// Placeholder for undecodable bytes.
    pub fn bad_data(data: Bytes, reason: impl Into<String>) -> Self {
        let reason = reason.into();
        Self {
            kind: MessageKind::BadData {
                reason: reason.clone(),
            },
            names: vec!["data".into(), "reason".into()],
            values: vec![bytes_value(&data), FieldValue::Text(reason)],
            header: Header::default(),
            payload: Bytes::new(),
            crc: None,
            signed: false,
            link_id: None,
            frame: data,
        }
    }

    /// Set a field, coercing the value into the declared type.
    pub fn set(&mut self, name: &str, value: impl Into<FieldValue>) -> Result<()> {
        let schema = match &self.kind {
            MessageKind::Known(schema) => schema,
            _ => {
                return Err(ProtocolError::UnknownField {
                    message: self.name(),
                    field: name.to_string(),
                })
            }
        };
        let index = schema
            .field_index(name)
            .ok_or_else(|| ProtocolError::UnknownField {
                message: schema.name().to_string(),
                field: name.to_string(),
            })?;
        self.values[index] = value.into().coerce(&schema.fields()[index])?;
        Ok(())
    }

    /// Builder form of [`set`](Self::set).
    pub fn with(mut self, name: &str, value: impl Into<FieldValue>) -> Result<Self> {
        self.set(name, value)?;
        Ok(self)
    }

    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.names
            .iter()
            .position(|n| n == name)
            .map(|i| &self.values[i])
    }

    /// Field names and values in declared order.
    pub fn fields(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.names.iter().map(String::as_str).zip(self.values.iter())
    }

    pub(crate) fn values(&self) -> &[FieldValue] {
        &self.values
    }

    pub fn kind(&self) -> &MessageKind {
        &self.kind
    }

    pub fn schema(&self) -> Option<&Arc<MessageSchema>> {
        match &self.kind {
            MessageKind::Known(schema) => Some(schema),
            _ => None,
        }
    }

    pub fn is_bad_data(&self) -> bool {
        matches!(self.kind, MessageKind::BadData { .. })
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self.kind, MessageKind::Unknown { .. })
    }

    /// Type name: schema name, `UNKNOWN_<id>` or `BAD_DATA`.
    pub fn name(&self) -> String {
        match &self.kind {
            MessageKind::Known(schema) => schema.name().to_string(),
            MessageKind::Unknown { msg_id } => format!("UNKNOWN_{msg_id}"),
            MessageKind::BadData { .. } => "BAD_DATA".to_string(),
        }
    }

    /// Message id, with the negative pseudo ids for placeholders.
    pub fn msg_id(&self) -> i64 {
        match &self.kind {
            MessageKind::Known(schema) => schema.id() as i64,
            MessageKind::Unknown { .. } => MSG_ID_UNKNOWN,
            MessageKind::BadData { .. } => MSG_ID_BAD_DATA,
        }
    }

    pub fn header(&self) -> &Header {
        &self.header
    }

    pub fn seq(&self) -> u8 {
        self.header.seq
    }

    pub fn system_id(&self) -> u8 {
        self.header.system_id
    }

    pub fn component_id(&self) -> u8 {
        self.header.component_id
    }

    pub fn payload(&self) -> &Bytes {
        &self.payload
    }

    pub fn crc(&self) -> Option<u16> {
        self.crc
    }

    pub fn is_signed(&self) -> bool {
        self.signed
    }

    pub fn link_id(&self) -> Option<u8> {
        self.link_id
    }

    /// The complete frame as sent or received.
    pub fn frame(&self) -> &Bytes {
        &self.frame
    }

    pub fn bad_data_reason(&self) -> Option<&str> {
        match &self.kind {
            MessageKind::BadData { reason } => Some(reason),
            _ => None,
        }
    }

    /// Value of the schema's instance field, for multi-instance sensors.
    pub fn instance_value(&self) -> Option<&FieldValue> {
        let field = self.schema()?.instance_field()?;
        self.get(&field.name)
    }

    pub(crate) fn from_decoded(
        schema: Arc<MessageSchema>,
        values: Vec<FieldValue>,
        provenance: Provenance,
    ) -> Self {
        let names = schema.fields().iter().map(|f| f.name.clone()).collect();
        let mut msg = Self {
            kind: MessageKind::Known(schema),
            names,
            values,
            header: Header::default(),
            payload: Bytes::new(),
            crc: None,
            signed: false,
            link_id: None,
            frame: Bytes::new(),
        };
        msg.record(provenance);
        msg
    }

    /// Fill in the record of what went over the wire.
    pub(crate) fn record(&mut self, provenance: Provenance) {
        self.header = provenance.header;
        self.payload = provenance.payload;
        self.crc = Some(provenance.crc);
        self.signed = provenance.link_id.is_some();
        self.link_id = provenance.link_id;
        self.frame = provenance.frame;
    }
}

/// Wire facts attached to a message by the packer or decoder.
#[derive(Debug, Clone)]
pub(crate) struct Provenance {
    pub header: Header,
    pub payload: Bytes,
    pub crc: u16,
    pub link_id: Option<u8>,
    pub frame: Bytes,
}

fn bytes_value(data: &[u8]) -> FieldValue {
    FieldValue::Array(data.iter().copied().map(FieldValue::U8).collect())
}

/// Equal when type, sequence, source ids and all fields match. The checksum
/// and raw buffers are not compared.
impl PartialEq for MessageInstance {
    fn eq(&self, other: &Self) -> bool {
        self.name() == other.name()
            && self.seq() == other.seq()
            && self.system_id() == other.system_id()
            && self.component_id() == other.component_id()
            && self.names == other.names
            && self.values == other.values
    }
}

impl fmt::Display for MessageInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            MessageKind::BadData { reason } => {
                write!(f, "BAD_DATA {{{reason}, data:{}}}", hex_list(&self.frame))
            }
            MessageKind::Unknown { .. } => {
                write!(f, "{} {{data:{}}}", self.name(), hex_list(&self.frame))
            }
            MessageKind::Known(schema) => {
                write!(f, "{} {{", schema.name())?;
                for (i, (name, value)) in self.fields().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{name} : {value}")?;
                }
                f.write_str("}")
            }
        }
    }
}

fn hex_list(data: &[u8]) -> String {
    let items: Vec<String> = data.iter().map(|b| format!("{b:x}")).collect();
    format!("[{}]", items.join(", "))
}
