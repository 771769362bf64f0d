//! # Error Types
//!
//! Error handling for the message engine.
//!
//! This module defines every error variant the engine can raise, from byte-level
//! framing failures to caller-side construction mistakes.
//!
//! ## Error Categories
//! - **Frame errors**: malformed header, length mismatch, checksum mismatch,
//!   invalid signature, bad prefix byte. These are fatal to one frame only.
//! - **Construction errors**: unknown field, wrong field type, value out of the
//!   declared width, message id too large for the selected wire version.
//! - **Environment errors**: I/O, configuration, serialization.
//!
//! An unknown message id is *not* an error: the decoder produces an
//! `UNKNOWN_<id>` placeholder instead.
//!
//! ## Example Usage
//! ```rust
//! use mavlink_engine::error::{ProtocolError, Result};
//! use mavlink_engine::core::header::Header;
//! use tracing::warn;
//!
//! fn header_of(frame: &[u8]) -> Result<Header> {
//!     Header::decode(frame)
//! }
//!
//! match header_of(&[0xFE, 0x01]) {
//!     Err(e @ ProtocolError::MalformedHeader(_)) => warn!(error = %e, "short header"),
//!     other => panic!("unexpected: {other:?}"),
//! }
//! ```

use serde::{Deserialize, Serialize};
use std::io;
use thiserror::Error;

/// Error message constants to reduce allocations in error paths.
pub mod constants {
    /// Dispatcher-related error messages
    pub const ERR_DISPATCHER_WRITE_LOCK: &str = "Failed to acquire write lock on dispatcher";
    pub const ERR_DISPATCHER_READ_LOCK: &str = "Failed to acquire read lock on dispatcher";

    /// Header errors
    pub const ERR_SHORT_HEADER: &str = "Not enough bytes for header";
    pub const ERR_BAD_MAGIC: &str = "Unknown protocol marker";

    /// Signing errors
    pub const ERR_BAD_DIGEST: &str = "Signature digest mismatch";
    pub const ERR_REPLAYED_TIMESTAMP: &str = "Timestamp not newer than last accepted for stream";
    pub const ERR_STALE_NEW_STREAM: &str = "New stream timestamp too far behind local clock";
    pub const ERR_UNSIGNED_REJECTED: &str = "Unsigned frame rejected by signing policy";
    pub const ERR_SIGNED_WITHOUT_KEY: &str = "Signed frame received but no secret key configured";
    pub const ERR_SHORT_SIGNATURE: &str = "Frame too short to carry a signature block";

    /// Time errors
    pub const ERR_SYSTEM_TIME: &str = "System time error: clock is before the protocol epoch";
}

/// ProtocolError is the primary error type for all engine operations
#[derive(Error, Debug, Serialize, Deserialize)]
pub enum ProtocolError {
    #[error("I/O error: {0}")]
    #[serde(skip_serializing, skip_deserializing)]
    Io(#[from] io::Error),

    #[error("Serialize error: {0}")]
    SerializeError(String),

    #[error("Deserialize error: {0}")]
    DeserializeError(String),

    #[error("Malformed header: {0}")]
    MalformedHeader(String),

    #[error("Invalid message length for msgId={msg_id}: header says {expected}, frame carries {actual}")]
    LengthMismatch {
        msg_id: u32,
        expected: usize,
        actual: usize,
    },

    #[error("Invalid CRC in msgId={msg_id}: 0x{received:04x} should be 0x{computed:04x}")]
    ChecksumMismatch {
        msg_id: u32,
        received: u16,
        computed: u16,
    },

    #[error("Invalid signature: {0}")]
    SignatureInvalid(String),

    #[error("Invalid prefix byte 0x{0:02x}")]
    BadPrefix(u8),

    #[error("Invalid incompat flags 0x{0:02x}")]
    InvalidIncompatFlags(u8),

    #[error("Payload for {message} is {actual} bytes, needs {required}")]
    PayloadTooShort {
        message: String,
        actual: usize,
        required: usize,
    },

    #[error("Payload of {0} bytes exceeds 255")]
    PayloadTooLong(usize),

    #[error("Message {message} has no field named '{field}'")]
    UnknownField { message: String, field: String },

    #[error("Field '{field}' expects {expected}")]
    FieldType { field: String, expected: String },

    #[error("Value for field '{field}' does not fit {expected}")]
    FieldOutOfRange { field: String, expected: String },

    #[error("Message id {id} cannot be encoded in a {version} header")]
    MessageIdOutOfRange { id: u32, version: String },

    #[error("Signing is enabled but no secret key is configured")]
    MissingSecretKey,

    #[error("Schema error: {0}")]
    Schema(String),

    #[error("Unexpected message type")]
    UnexpectedMessage,

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Custom error: {0}")]
    Custom(String),
}

impl ProtocolError {
    /// True for errors scoped to one received frame or one stray byte.
    ///
    /// Robust parsing turns these into bad-data placeholders; everything else
    /// is a caller or environment problem and is always propagated.
    pub fn is_frame_error(&self) -> bool {
        matches!(
            self,
            ProtocolError::MalformedHeader(_)
                | ProtocolError::LengthMismatch { .. }
                | ProtocolError::ChecksumMismatch { .. }
                | ProtocolError::SignatureInvalid(_)
                | ProtocolError::BadPrefix(_)
                | ProtocolError::InvalidIncompatFlags(_)
                | ProtocolError::PayloadTooShort { .. }
        )
    }
}

/// Type alias for Results using ProtocolError
pub type Result<T> = std::result::Result<T, ProtocolError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_errors_are_classified() {
        assert!(ProtocolError::BadPrefix(0).is_frame_error());
        assert!(ProtocolError::SignatureInvalid("x".into()).is_frame_error());
        assert!(ProtocolError::ChecksumMismatch {
            msg_id: 1,
            received: 1,
            computed: 2
        }
        .is_frame_error());
        assert!(!ProtocolError::MissingSecretKey.is_frame_error());
        assert!(!ProtocolError::UnexpectedMessage.is_frame_error());
    }

    #[test]
    fn checksum_message_is_hex() {
        let err = ProtocolError::ChecksumMismatch {
            msg_id: 22,
            received: 0x00ab,
            computed: 0x1234,
        };
        assert_eq!(
            err.to_string(),
            "Invalid CRC in msgId=22: 0x00ab should be 0x1234"
        );
    }
}
