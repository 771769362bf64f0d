//! # Core Protocol Components
//!
//! Byte-level building blocks: checksum, frame header, message schemas, the
//! typed message model and the payload codec.
//!
//! ## Components
//! - **Checksum**: X25 accumulator with the per-message seed byte
//! - **Header**: V1 (6 byte) and V2 (10 byte) frame headers
//! - **Schema**: immutable per-message layouts and the read-only registry
//! - **Message**: typed field values plus frame provenance
//! - **Payload**: wire-order little-endian field encoding
//! - **Serialization**: export of decoded messages (bincode, JSON, MessagePack)
//!
//! ## Wire Format
//! ```text
//! V1: [0xFE][len][seq][sys][comp][id8]                      [payload][crc16 LE]
//! V2: [0xFD][len][incompat][compat][seq][sys][comp][id24 LE][payload][crc16 LE][signature(13)?]
//! ```
//!
//! ## Security
//! - Payload length is bounded by the one-byte length field (255 bytes)
//! - Checksums carry a per-message seed so layouts of different messages
//!   cannot be confused for one another

pub mod checksum;
pub mod header;
pub mod message;
pub mod payload;
pub mod schema;
pub mod serialization;
