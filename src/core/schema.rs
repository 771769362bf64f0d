//! # Message Schemas
//!
//! One immutable [`MessageSchema`] per message type, held in a read-only
//! [`SchemaRegistry`] built once at startup by whatever loads the protocol
//! definitions.
//!
//! ## Field Ordering
//! Fields have two orders. The *declared* order is the order the definition
//! lists them in; the *wire* order sorts the base fields by element size
//! (largest first, stable) and appends extension fields unchanged. The schema
//! keeps the permutation explicitly:
//!
//! - `wire_order[p]` is the declared index of the field at wire position `p`
//! - `order_map[i]` is the wire position of declared field `i`
//! - `encoded_lengths[p]` is the byte length of the field at wire position `p`
//!
//! ## Example
//! ```rust
//! use mavlink_engine::core::schema::{FieldType, MessageSchema};
//!
//! let schema = MessageSchema::builder(22, "PARAM_VALUE")
//!     .crc_extra(220)
//!     .array("param_id", FieldType::Char, 16)
//!     .field("param_value", FieldType::F32)
//!     .field("param_type", FieldType::U8)
//!     .field("param_count", FieldType::U16)
//!     .field("param_index", FieldType::U16)
//!     .build()
//!     .unwrap();
//! assert_eq!(schema.payload_len(), 25);
//! assert_eq!(schema.wire_field_names(), vec![
//!     "param_value", "param_count", "param_index", "param_id", "param_type"
//! ]);
//! ```

use crate::error::{ProtocolError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

/// Primitive field types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FieldType {
    Char,
    U8,
    I8,
    U16,
    I16,
    U32,
    I32,
    U64,
    I64,
    F32,
    F64,
}

impl FieldType {
    /// Size of one element in bytes
    pub fn size(self) -> usize {
        match self {
            FieldType::Char | FieldType::U8 | FieldType::I8 => 1,
            FieldType::U16 | FieldType::I16 => 2,
            FieldType::U32 | FieldType::I32 | FieldType::F32 => 4,
            FieldType::U64 | FieldType::I64 | FieldType::F64 => 8,
        }
    }

    /// Parse the C type names used in protocol definitions.
    pub fn from_c_type(name: &str) -> Option<Self> {
        let ty = match name {
            "char" => FieldType::Char,
            "uint8_t" | "uint8_t_mavlink_version" => FieldType::U8,
            "int8_t" => FieldType::I8,
            "uint16_t" => FieldType::U16,
            "int16_t" => FieldType::I16,
            "uint32_t" => FieldType::U32,
            "int32_t" => FieldType::I32,
            "uint64_t" => FieldType::U64,
            "int64_t" => FieldType::I64,
            "float" => FieldType::F32,
            "double" => FieldType::F64,
            _ => return None,
        };
        Some(ty)
    }

    pub fn c_type(self) -> &'static str {
        match self {
            FieldType::Char => "char",
            FieldType::U8 => "uint8_t",
            FieldType::I8 => "int8_t",
            FieldType::U16 => "uint16_t",
            FieldType::I16 => "int16_t",
            FieldType::U32 => "uint32_t",
            FieldType::I32 => "int32_t",
            FieldType::U64 => "uint64_t",
            FieldType::I64 => "int64_t",
            FieldType::F32 => "float",
            FieldType::F64 => "double",
        }
    }

    /// Numeric type code used by parameter and log messages.
    pub fn type_code(self) -> u8 {
        match self {
            FieldType::Char => 0,
            FieldType::U8 => 1,
            FieldType::I8 => 2,
            FieldType::U16 => 3,
            FieldType::I16 => 4,
            FieldType::U32 => 5,
            FieldType::I32 => 6,
            FieldType::U64 => 7,
            FieldType::I64 => 8,
            FieldType::F32 => 9,
            FieldType::F64 => 10,
        }
    }

    pub fn is_integer(self) -> bool {
        !matches!(self, FieldType::Char | FieldType::F32 | FieldType::F64)
    }

    pub fn is_float(self) -> bool {
        matches!(self, FieldType::F32 | FieldType::F64)
    }
}

/// One field of a message definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSchema {
    pub name: String,
    pub field_type: FieldType,
    /// Element count; 0 means scalar
    #[serde(default)]
    pub array_length: usize,
    #[serde(default)]
    pub enum_name: Option<String>,
    #[serde(default)]
    pub units: Option<String>,
    #[serde(default)]
    pub display: Option<String>,
    /// Marks the field that tells apart multiple sensors sharing a message type
    #[serde(default)]
    pub instance: bool,
}

impl FieldSchema {
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
            array_length: 0,
            enum_name: None,
            units: None,
            display: None,
            instance: false,
        }
    }

    pub fn array(name: impl Into<String>, field_type: FieldType, length: usize) -> Self {
        Self {
            array_length: length,
            ..Self::new(name, field_type)
        }
    }

    pub fn is_array(&self) -> bool {
        self.array_length > 0
    }

    /// Bytes this field occupies on the wire.
    pub fn encoded_len(&self) -> usize {
        self.field_type.size() * self.array_length.max(1)
    }

    /// Text fields are char arrays, decoded as NUL-terminated strings.
    pub fn is_text(&self) -> bool {
        self.field_type == FieldType::Char
    }
}

/// Immutable per-message-type layout and metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageSchema {
    id: u32,
    name: String,
    crc_extra: u8,
    fields: Vec<FieldSchema>,
    extensions_start: Option<usize>,
    wire_order: Vec<usize>,
    order_map: Vec<usize>,
    encoded_lengths: Vec<usize>,
    wire_offsets: Vec<usize>,
    payload_len: usize,
    base_payload_len: usize,
    instance_field: Option<usize>,
}

impl MessageSchema {
    pub fn builder(id: u32, name: impl Into<String>) -> MessageSchemaBuilder {
        MessageSchemaBuilder {
            id,
            name: name.into(),
            crc_extra: 0,
            fields: Vec::new(),
            extensions_start: None,
            wire_order: None,
        }
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Per-message checksum seed
    pub fn crc_extra(&self) -> u8 {
        self.crc_extra
    }

    /// Fields in declared order
    pub fn fields(&self) -> &[FieldSchema] {
        &self.fields
    }

    pub fn field_names(&self) -> Vec<&str> {
        self.fields.iter().map(|f| f.name.as_str()).collect()
    }

    pub fn wire_field_names(&self) -> Vec<&str> {
        self.wire_order
            .iter()
            .map(|&i| self.fields[i].name.as_str())
            .collect()
    }

    pub fn field_index(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }

    pub fn field(&self, name: &str) -> Option<&FieldSchema> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Declared index where extension fields begin, if any
    pub fn extensions_start(&self) -> Option<usize> {
        self.extensions_start
    }

    pub fn is_extension(&self, declared_index: usize) -> bool {
        self.extensions_start
            .is_some_and(|start| declared_index >= start)
    }

    pub fn wire_order(&self) -> &[usize] {
        &self.wire_order
    }

    pub fn order_map(&self) -> &[usize] {
        &self.order_map
    }

    pub fn encoded_lengths(&self) -> &[usize] {
        &self.encoded_lengths
    }

    /// Byte offset of each wire position within the payload.
    pub fn wire_offsets(&self) -> &[usize] {
        &self.wire_offsets
    }

    /// Full payload size including extension fields.
    pub fn payload_len(&self) -> usize {
        self.payload_len
    }

    /// Payload size of the base (non-extension) fields.
    pub fn base_payload_len(&self) -> usize {
        self.base_payload_len
    }

    pub fn instance_field(&self) -> Option<&FieldSchema> {
        self.instance_field.map(|i| &self.fields[i])
    }

    /// Byte offset of the instance field within the wire payload.
    pub fn instance_offset(&self) -> Option<usize> {
        self.instance_field
            .map(|i| self.wire_offsets[self.order_map[i]])
    }
}

pub struct MessageSchemaBuilder {
    id: u32,
    name: String,
    crc_extra: u8,
    fields: Vec<FieldSchema>,
    extensions_start: Option<usize>,
    wire_order: Option<Vec<usize>>,
}

impl MessageSchemaBuilder {
    pub fn crc_extra(mut self, crc_extra: u8) -> Self {
        self.crc_extra = crc_extra;
        self
    }

    pub fn field(self, name: impl Into<String>, field_type: FieldType) -> Self {
        self.push(FieldSchema::new(name, field_type))
    }

    pub fn array(self, name: impl Into<String>, field_type: FieldType, length: usize) -> Self {
        self.push(FieldSchema::array(name, field_type, length))
    }

    /// Mark the most recently added field as the instance field.
    pub fn instance(mut self) -> Self {
        if let Some(last) = self.fields.last_mut() {
            last.instance = true;
        }
        self
    }

    /// Every field added after this call is an extension field.
    pub fn extensions(mut self) -> Self {
        self.extensions_start.get_or_insert(self.fields.len());
        self
    }

    pub fn push(mut self, field: FieldSchema) -> Self {
        self.fields.push(field);
        self
    }

    /// Use an explicit wire order (declared indices in wire sequence) instead
    /// of deriving one.
    pub fn with_wire_order(mut self, wire_order: Vec<usize>) -> Self {
        self.wire_order = Some(wire_order);
        self
    }

    pub fn build(self) -> Result<MessageSchema> {
        let n = self.fields.len();
        if n == 0 {
            return Err(ProtocolError::Schema(format!("{} has no fields", self.name)));
        }
        let mut seen = std::collections::HashSet::new();
        for f in &self.fields {
            if !seen.insert(f.name.as_str()) {
                return Err(ProtocolError::Schema(format!(
                    "{} declares field '{}' twice",
                    self.name, f.name
                )));
            }
        }
        let extensions_start = self.extensions_start.filter(|&start| start < n);
        let base_len = extensions_start.unwrap_or(n);

        let wire_order = match self.wire_order {
            Some(order) => {
                let mut check = order.clone();
                check.sort_unstable();
                if check != (0..n).collect::<Vec<_>>() {
                    return Err(ProtocolError::Schema(format!(
                        "{} wire order is not a permutation of {n} fields",
                        self.name
                    )));
                }
                order
            }
            None => {
                let mut base: Vec<usize> = (0..base_len).collect();
                // sort_by_key is stable
                base.sort_by_key(|&i| std::cmp::Reverse(self.fields[i].field_type.size()));
                base.extend(base_len..n);
                base
            }
        };

        let mut order_map = vec![0; n];
        for (pos, &declared) in wire_order.iter().enumerate() {
            order_map[declared] = pos;
        }
        let encoded_lengths: Vec<usize> = wire_order
            .iter()
            .map(|&i| self.fields[i].encoded_len())
            .collect();
        let mut wire_offsets = Vec::with_capacity(n);
        let mut offset = 0;
        for len in &encoded_lengths {
            wire_offsets.push(offset);
            offset += len;
        }
        let payload_len = offset;
        if payload_len > u8::MAX as usize {
            return Err(ProtocolError::Schema(format!(
                "{} payload of {payload_len} bytes exceeds 255",
                self.name
            )));
        }
        let base_payload_len = self.fields[..base_len]
            .iter()
            .map(FieldSchema::encoded_len)
            .sum();
        let instance_field = self.fields.iter().position(|f| f.instance);

        Ok(MessageSchema {
            id: self.id,
            name: self.name,
            crc_extra: self.crc_extra,
            fields: self.fields,
            extensions_start,
            wire_order,
            order_map,
            encoded_lengths,
            wire_offsets,
            payload_len,
            base_payload_len,
            instance_field,
        })
    }
}

/// Read-only id -> schema map, shared between sessions.
#[derive(Debug, Default)]
pub struct SchemaRegistry {
    by_id: HashMap<u32, Arc<MessageSchema>>,
    by_name: HashMap<String, u32>,
}

impl SchemaRegistry {
    pub fn from_schemas<I>(schemas: I) -> Result<Self>
    where
        I: IntoIterator<Item = MessageSchema>,
    {
        let mut registry = Self::default();
        for schema in schemas {
            if registry.by_id.contains_key(&schema.id) {
                return Err(ProtocolError::Schema(format!(
                    "duplicate message id {} ({})",
                    schema.id, schema.name
                )));
            }
            registry.by_name.insert(schema.name.clone(), schema.id);
            registry.by_id.insert(schema.id, Arc::new(schema));
        }
        Ok(registry)
    }

    pub fn lookup(&self, id: u32) -> Option<&Arc<MessageSchema>> {
        self.by_id.get(&id)
    }

    pub fn lookup_by_name(&self, name: &str) -> Option<&Arc<MessageSchema>> {
        self.by_name.get(name).and_then(|id| self.by_id.get(id))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<MessageSchema>> {
        self.by_id.values()
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }
}
