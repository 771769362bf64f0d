//! # mavlink-engine
//!
//! Runtime message engine for the MAVLink telemetry and command protocol.
//!
//! Turns typed messages into wire frames and reassembles frames from an
//! arbitrarily chunked byte stream, validating checksums and signatures on
//! the way. Both protocol versions are supported side by side: V1 with 6 byte
//! headers and 8-bit message ids, V2 with 10 byte headers, 24-bit ids,
//! trailing-zero payload trimming and optional SHA-256 frame signing.
//!
//! ## Layout
//! - [`core`]: checksum, headers, schemas, message instances, payload codec
//! - [`protocol`]: stream parser, decoder, session, signing, dispatcher
//! - [`transport`]: byte sinks, connections and the tokio codec
//! - [`config`]: TOML / environment configuration
//! - [`utils`]: logging setup, metrics, signing replay table
//!
//! Message layouts come from outside the engine: build a [`SchemaRegistry`]
//! once at startup from generated definitions and share it between sessions.
//!
//! ## Example
//! ```rust
//! use mavlink_engine::{FieldType, MessageInstance, MessageSchema, SchemaRegistry, Session};
//! use std::sync::Arc;
//!
//! let heartbeat = MessageSchema::builder(0, "HEARTBEAT")
//!     .crc_extra(50)
//!     .field("type", FieldType::U8)
//!     .field("autopilot", FieldType::U8)
//!     .field("base_mode", FieldType::U8)
//!     .field("custom_mode", FieldType::U32)
//!     .field("system_status", FieldType::U8)
//!     .field("mavlink_version", FieldType::U8)
//!     .build()?;
//! let registry = Arc::new(SchemaRegistry::from_schemas([heartbeat])?);
//!
//! let mut vehicle = Session::new(registry.clone(), 1, 1);
//! let schema = registry.lookup_by_name("HEARTBEAT").cloned().ok_or(
//!     mavlink_engine::ProtocolError::UnexpectedMessage,
//! )?;
//! let mut msg = MessageInstance::new(schema).with("type", 2u8)?.with("mavlink_version", 3u8)?;
//! let frame = vehicle.pack(&mut msg, false)?;
//!
//! let mut ground = Session::new(registry, 255, 190);
//! let received = ground.parse_buffer(&frame)?;
//! assert_eq!(received, vec![msg]);
//! # Ok::<(), mavlink_engine::ProtocolError>(())
//! ```

pub mod config;
pub mod core;
pub mod error;
pub mod protocol;
pub mod transport;
pub mod utils;

pub use crate::config::{EngineConfig, LinkConfig, ParseMode, SigningConfig};
pub use crate::core::header::{Header, WireVersion};
pub use crate::core::message::{FieldValue, MessageInstance, MessageKind};
pub use crate::core::schema::{FieldSchema, FieldType, MessageSchema, SchemaRegistry};
pub use crate::error::{ProtocolError, Result};
pub use crate::protocol::dispatcher::Dispatcher;
pub use crate::protocol::session::Session;
pub use crate::protocol::signing::{SecretKey, SigningState};
pub use crate::protocol::StreamDecoder;
pub use crate::transport::codec::MavlinkCodec;
pub use crate::transport::{Connection, IoTransport, Transport};
