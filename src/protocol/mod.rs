//! # Protocol Engine
//!
//! Stateful side of the engine: frame splitting, decoding, packing, signing
//! and routing of decoded messages.
//!
//! ## Components
//! - **Parser**: resynchronizing splitter from byte stream to candidate frames
//! - **Decode**: frame validation and field decoding
//! - **Session**: per-connection state; packing and the parse entry points
//! - **Signing**: SHA-256 frame signatures with per-stream replay protection
//! - **Dispatcher**: routes decoded messages to handlers by type name
//!
//! ## Inbound flow
//! ```text
//! bytes -> StreamParser -> decode_frame -> MessageInstance -> callback / Dispatcher
//! ```

use crate::core::message::MessageInstance;
use crate::error::Result;

pub mod decode;
pub mod dispatcher;
pub mod parser;
pub mod session;
pub mod signing;

/// Incremental decoder over an arbitrarily chunked byte stream.
///
/// Implementations keep partial frames between calls. Every outcome is
/// returned, errors included, so two decoders fed the same bytes can be
/// compared outcome by outcome.
pub trait StreamDecoder {
    fn decode_stream(&mut self, bytes: &[u8]) -> Vec<Result<MessageInstance>>;
}
