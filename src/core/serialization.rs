//! # Message Export Formats
//!
//! Decoded messages can be exported for logging, replay tooling or bridging to
//! other systems. A [`MessageRecord`] is the format-neutral snapshot of one
//! message; [`MultiFormat`] writes it as bincode (default), JSON or MessagePack.
//!
//! ## Usage
//! ```ignore
//! use mavlink_engine::core::serialization::{MultiFormat, SerializationFormat};
//!
//! let record = message.to_record();
//! let bytes = record.serialize_with_header(SerializationFormat::MessagePack)?;
//! let (back, format) = MessageRecord::deserialize_with_header(&bytes)?;
//! ```

use crate::core::message::{FieldValue, MessageInstance};
use serde::{Deserialize, Serialize};

/// Supported serialization formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SerializationFormat {
    /// Binary compact format (default, fastest)
    #[default]
    Bincode,
    /// Human-readable JSON format (debugging, interop)
    Json,
    /// Compact binary format (MessagePack)
    MessagePack,
}

impl SerializationFormat {
    /// Get the format identifier byte
    pub fn format_byte(self) -> u8 {
        match self {
            SerializationFormat::Bincode => 0x01,
            SerializationFormat::Json => 0x02,
            SerializationFormat::MessagePack => 0x03,
        }
    }

    /// Detect format from identifier byte
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0x01 => Some(SerializationFormat::Bincode),
            0x02 => Some(SerializationFormat::Json),
            0x03 => Some(SerializationFormat::MessagePack),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            SerializationFormat::Bincode => "Bincode",
            SerializationFormat::Json => "JSON",
            SerializationFormat::MessagePack => "MessagePack",
        }
    }
}

/// Trait for types that support multiple serialization formats
pub trait MultiFormat: Serialize + for<'de> Deserialize<'de> + Sized {
    fn serialize_format(&self, format: SerializationFormat) -> crate::error::Result<Vec<u8>> {
        match format {
            SerializationFormat::Bincode => bincode::serialize(self)
                .map_err(|e| crate::error::ProtocolError::SerializeError(e.to_string())),
            SerializationFormat::Json => serde_json::to_vec(self)
                .map_err(|e| crate::error::ProtocolError::SerializeError(e.to_string())),
            SerializationFormat::MessagePack => rmp_serde::to_vec(self)
                .map_err(|e| crate::error::ProtocolError::SerializeError(e.to_string())),
        }
    }

    /// Serialize to bytes prefixed with the format byte
    fn serialize_with_header(&self, format: SerializationFormat) -> crate::error::Result<Vec<u8>> {
        let mut data = vec![format.format_byte()];
        let mut payload = self.serialize_format(format)?;
        data.append(&mut payload);
        Ok(data)
    }

    fn deserialize_format(data: &[u8], format: SerializationFormat) -> crate::error::Result<Self> {
        match format {
            SerializationFormat::Bincode => bincode::deserialize(data)
                .map_err(|e| crate::error::ProtocolError::DeserializeError(e.to_string())),
            SerializationFormat::Json => serde_json::from_slice(data)
                .map_err(|e| crate::error::ProtocolError::DeserializeError(e.to_string())),
            SerializationFormat::MessagePack => rmp_serde::from_slice(data)
                .map_err(|e| crate::error::ProtocolError::DeserializeError(e.to_string())),
        }
    }

    /// Deserialize from bytes prefixed with the format byte
    fn deserialize_with_header(data: &[u8]) -> crate::error::Result<(Self, SerializationFormat)> {
        if data.is_empty() {
            return Err(crate::error::ProtocolError::DeserializeError(
                "Empty data".to_string(),
            ));
        }

        let format = SerializationFormat::from_byte(data[0]).ok_or_else(|| {
            crate::error::ProtocolError::DeserializeError(format!(
                "Unknown format byte: {}",
                data[0]
            ))
        })?;

        let value = Self::deserialize_format(&data[1..], format)?;
        Ok((value, format))
    }
}

/// Format-neutral snapshot of one message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageRecord {
    pub message_type: String,
    pub msg_id: i64,
    pub seq: u8,
    pub system_id: u8,
    pub component_id: u8,
    pub signed: bool,
    pub fields: Vec<RecordField>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordField {
    pub name: String,
    pub value: FieldValue,
}

impl MultiFormat for MessageRecord {}

impl MessageRecord {
    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.fields.iter().find(|f| f.name == name).map(|f| &f.value)
    }
}

impl MessageInstance {
    pub fn to_record(&self) -> MessageRecord {
        MessageRecord {
            message_type: self.name(),
            msg_id: self.msg_id(),
            seq: self.seq(),
            system_id: self.system_id(),
            component_id: self.component_id(),
            signed: self.is_signed(),
            fields: self
                .fields()
                .map(|(name, value)| RecordField {
                    name: name.to_string(),
                    value: value.clone(),
                })
                .collect(),
        }
    }

    /// Flat dictionary: `{"mavpackettype": NAME, field: value, ...}`.
    pub fn to_dict(&self) -> serde_json::Map<String, serde_json::Value> {
        let mut map = serde_json::Map::new();
        map.insert(
            "mavpackettype".to_string(),
            serde_json::Value::String(self.name()),
        );
        for (name, value) in self.fields() {
            map.insert(name.to_string(), plain_json(value));
        }
        map
    }

    pub fn to_json(&self) -> String {
        serde_json::Value::Object(self.to_dict()).to_string()
    }
}

fn plain_json(value: &FieldValue) -> serde_json::Value {
    use serde_json::Value;
    match value {
        FieldValue::U8(v) => Value::from(*v),
        FieldValue::I8(v) => Value::from(*v),
        FieldValue::U16(v) => Value::from(*v),
        FieldValue::I16(v) => Value::from(*v),
        FieldValue::U32(v) => Value::from(*v),
        FieldValue::I32(v) => Value::from(*v),
        FieldValue::U64(v) => Value::from(*v),
        FieldValue::I64(v) => Value::from(*v),
        FieldValue::F32(v) => Value::from(*v as f64),
        FieldValue::F64(v) => Value::from(*v),
        FieldValue::Text(s) => Value::String(s.clone()),
        FieldValue::Array(items) => Value::Array(items.iter().map(plain_json).collect()),
    }
}
