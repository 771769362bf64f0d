//! # Session
//!
//! One [`Session`] per connection or peer. It owns everything that mutates
//! while traffic flows: the outgoing sequence number, the stream parser, the
//! signing state and the traffic counters. The schema registry is the only
//! thing shared between sessions, and it is read-only.
//!
//! A session is not internally synchronized. Drive it from one task or
//! thread at a time; independent sessions may run concurrently.
//!
//! ## Parsing modes
//! - **Strict**: malformed frames are returned as errors. A run of bad prefix
//!   bytes raises a single error, then is skipped silently until a valid marker
//!   appears.
//! - **Robust**: malformed frames and stray bytes become `BAD_DATA` messages,
//!   so the stream never blocks on garbage.
//!
//! ## Example
//! ```rust
//! use mavlink_engine::core::schema::{FieldType, MessageSchema, SchemaRegistry};
//! use mavlink_engine::core::header::WireVersion;
//! use mavlink_engine::core::message::MessageInstance;
//! use mavlink_engine::protocol::session::Session;
//! use std::sync::Arc;
//!
//! let schema = MessageSchema::builder(0, "SIMPLE")
//!     .crc_extra(50)
//!     .field("value", FieldType::U8)
//!     .build()?;
//! let registry = Arc::new(SchemaRegistry::from_schemas([schema])?);
//!
//! let mut tx = Session::new(registry.clone(), 1, 1);
//! tx.set_wire_version(WireVersion::V1);
//! let mut msg = MessageInstance::new(registry.lookup(0).unwrap().clone()).with("value", 42u8)?;
//! let frame = tx.pack(&mut msg, false)?;
//! assert_eq!(&frame[..], &[0xFE, 0x01, 0x00, 0x01, 0x01, 0x00, 0x2A, 0x77, 0x37]);
//!
//! let mut rx = Session::new(registry, 255, 0);
//! let decoded = rx.parse_buffer(&frame)?;
//! assert_eq!(decoded[0].to_string(), "SIMPLE {value : 42}");
//! # Ok::<(), mavlink_engine::error::ProtocolError>(())
//! ```

use crate::config::{EngineConfig, LinkConfig, ParseMode};
use crate::core::checksum::frame_checksum;
use crate::core::header::{Header, WireVersion, CHECKSUM_LEN, IFLAG_SIGNED};
use crate::core::message::{MessageInstance, Provenance};
use crate::core::payload::encode_payload;
use crate::core::schema::SchemaRegistry;
use crate::error::{ProtocolError, Result};
use crate::protocol::decode::{decode_frame, DecodeContext};
use crate::protocol::parser::{ParseStep, StreamParser};
use crate::protocol::signing::{signing_timestamp_now, SigningState};
use crate::protocol::StreamDecoder;
use crate::transport::Transport;
use crate::utils::metrics::Metrics;
use bytes::Bytes;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Sink for delivered or sent messages.
pub type MessageCallback = dyn FnMut(&MessageInstance) + Send + 'static;

/// Per-connection protocol state.
pub struct Session {
    registry: Arc<SchemaRegistry>,
    config: LinkConfig,
    seq: u8,
    parser: StreamParser,
    signing: SigningState,
    metrics: Arc<Metrics>,
    callback: Option<Box<MessageCallback>>,
    send_callback: Option<Box<MessageCallback>>,
}

impl Session {
    /// Session with default link settings and the given source identity.
    pub fn new(registry: Arc<SchemaRegistry>, system_id: u8, component_id: u8) -> Self {
        Self::with_config(
            registry,
            LinkConfig {
                system_id,
                component_id,
                ..LinkConfig::default()
            },
        )
    }

    /// Session with explicit link settings; signing stays disabled.
    pub fn with_config(registry: Arc<SchemaRegistry>, config: LinkConfig) -> Self {
        if config.ignore_checksum {
            warn!(
                system_id = config.system_id,
                "Session created with checksum verification disabled"
            );
        }
        let signing = SigningState::with_stream_capacity(config.max_stream_keys);
        Self {
            registry,
            config,
            seq: 0,
            parser: StreamParser::new(),
            signing,
            metrics: Arc::new(Metrics::new()),
            callback: None,
            send_callback: None,
        }
    }

    /// Session built from a full engine configuration, signing included.
    pub fn from_config(registry: Arc<SchemaRegistry>, config: &EngineConfig) -> Result<Self> {
        let mut session = Self::with_config(registry, config.link.clone());
        if let Some(key) = config.signing.key()? {
            let timestamp = match config.signing.initial_timestamp {
                Some(ts) => ts,
                None => signing_timestamp_now()?,
            };
            session
                .signing
                .enable(key, config.signing.link_id, config.signing.sign_outgoing);
            session.signing.set_timestamp(timestamp);
        } else if config.signing.sign_outgoing {
            return Err(ProtocolError::MissingSecretKey);
        }
        info!(
            system_id = session.config.system_id,
            component_id = session.config.component_id,
            wire_version = %session.config.wire_version,
            parse_mode = ?session.config.parse_mode,
            signing = session.signing.secret_key().is_some(),
            "Session created"
        );
        Ok(session)
    }

    // ---- outbound ----------------------------------------------------------

    /// Encode `msg` into a frame, stamping this session's sequence number and
    /// identity. On success the message records what was sent, the sequence
    /// number advances and the send counters are updated.
    #[instrument(level = "debug", skip_all, fields(msg = %msg.name(), force_v1 = force_v1))]
    pub fn pack(&mut self, msg: &mut MessageInstance, force_v1: bool) -> Result<Bytes> {
        let schema = msg.schema().cloned().ok_or(ProtocolError::UnexpectedMessage)?;
        let version = if force_v1 {
            WireVersion::V1
        } else {
            self.config.wire_version
        };

        let mut payload = encode_payload(&schema, msg.values())?;
        if version == WireVersion::V2 {
            let keep = payload.iter().rposition(|&b| b != 0).map_or(1, |i| i + 1);
            payload.truncate(keep.max(1));
        }
        let payload_len =
            u8::try_from(payload.len()).map_err(|_| ProtocolError::PayloadTooLong(payload.len()))?;

        let sign = version == WireVersion::V2 && self.signing.sign_outgoing();
        if sign && self.signing.secret_key().is_none() {
            return Err(ProtocolError::MissingSecretKey);
        }

        let header = Header {
            version,
            payload_len,
            incompat_flags: if sign { IFLAG_SIGNED } else { 0 },
            compat_flags: 0,
            seq: self.seq,
            system_id: self.config.system_id,
            component_id: self.config.component_id,
            msg_id: schema.id(),
        };
        let header_len = version.header_len();
        let mut frame = header.encode(false)?;
        frame.extend_from_slice(&payload);
        let crc = frame_checksum(&frame[1..], schema.crc_extra());
        frame.extend_from_slice(&crc.to_le_bytes());

        let link_id = if sign {
            self.signing.sign(&mut frame)?;
            Some(self.signing.link_id())
        } else {
            None
        };

        let frame = Bytes::from(frame);
        msg.record(Provenance {
            header,
            payload: frame.slice(header_len..header_len + payload.len()),
            crc,
            link_id,
            frame: frame.clone(),
        });

        self.seq = self.seq.wrapping_add(1);
        self.metrics.packet_sent(frame.len() as u64);
        debug!(seq = header.seq, len = frame.len(), signed = sign, "Packed frame");
        Ok(frame)
    }

    /// Pack `msg`, write it to `transport` and notify the send callback.
    ///
    /// The sequence number is spent at pack time. If the write fails the
    /// frame is counted in `send_errors` and the callback is not called.
    pub fn send<T>(
        &mut self,
        msg: &mut MessageInstance,
        transport: &mut T,
        force_v1: bool,
    ) -> Result<()>
    where
        T: Transport + ?Sized,
    {
        let frame = self.pack(msg, force_v1)?;
        if let Err(e) = transport.write(&frame) {
            self.metrics.send_error();
            warn!(error = %e, seq = msg.seq(), "Transport write failed");
            return Err(e);
        }
        if let Some(callback) = self.send_callback.as_mut() {
            callback(msg);
        }
        Ok(())
    }

    // ---- inbound -----------------------------------------------------------

    /// Add bytes and return at most one message. Further complete frames stay
    /// buffered; call again with an empty slice to drain them.
    pub fn parse_char(&mut self, bytes: &[u8]) -> Result<Option<MessageInstance>> {
        self.push_input(bytes);
        self.next_message()
    }

    /// Add bytes and return every message that became complete. Stops at the
    /// first error; the bytes after it stay buffered for the next call.
    pub fn parse_buffer(&mut self, bytes: &[u8]) -> Result<Vec<MessageInstance>> {
        self.push_input(bytes);
        let mut messages = Vec::new();
        while let Some(msg) = self.next_message()? {
            messages.push(msg);
        }
        Ok(messages)
    }

    /// Add bytes and return every outcome, errors included, without stopping.
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<Result<MessageInstance>> {
        self.push_input(bytes);
        let mut outcomes = Vec::new();
        loop {
            match self.next_message() {
                Ok(Some(msg)) => outcomes.push(Ok(msg)),
                Ok(None) => break,
                Err(e) => outcomes.push(Err(e)),
            }
        }
        outcomes
    }

    /// Bytes the parser wants before it can make progress; at least 1.
    pub fn bytes_needed(&self) -> usize {
        self.parser.bytes_needed()
    }

    /// Discard buffered input.
    pub fn reset_parser(&mut self) {
        self.parser.reset();
    }

    fn push_input(&mut self, bytes: &[u8]) {
        self.parser.push(bytes);
        self.metrics.bytes_received(bytes.len() as u64);
    }

    fn next_message(&mut self) -> Result<Option<MessageInstance>> {
        let robust = self.config.parse_mode == ParseMode::Robust;
        loop {
            let msg = match self.parser.next_step() {
                ParseStep::NeedMore => return Ok(None),
                ParseStep::BadPrefix { byte, first_in_run } => {
                    if robust {
                        self.metrics.receive_error();
                        self.metrics.bad_data();
                        MessageInstance::bad_data(Bytes::copy_from_slice(&[byte]), "Bad prefix")
                    } else if first_in_run {
                        self.metrics.receive_error();
                        warn!(byte, "Invalid prefix byte, resynchronizing");
                        return Err(ProtocolError::BadPrefix(byte));
                    } else {
                        continue;
                    }
                }
                ParseStep::Frame(frame) => self.decode(frame, robust)?,
            };
            self.metrics.packet_received();
            if let Some(callback) = self.callback.as_mut() {
                callback(&msg);
            }
            return Ok(Some(msg));
        }
    }

    fn decode(&mut self, frame: Bytes, robust: bool) -> Result<MessageInstance> {
        let mut ctx = DecodeContext {
            registry: &self.registry,
            signing: &mut self.signing,
            ignore_checksum: self.config.ignore_checksum,
        };
        match decode_frame(frame.clone(), &mut ctx) {
            Ok(msg) => {
                if msg.is_unknown() {
                    self.metrics.unknown_message();
                }
                Ok(msg)
            }
            Err(e) => {
                self.metrics.receive_error();
                match &e {
                    ProtocolError::ChecksumMismatch { .. } => {
                        self.metrics.checksum_failure();
                        warn!(error = %e, "Dropping frame");
                    }
                    ProtocolError::SignatureInvalid(_) => self.metrics.signature_failure(),
                    _ => debug!(error = %e, "Dropping frame"),
                }
                if robust && e.is_frame_error() {
                    self.metrics.bad_data();
                    Ok(MessageInstance::bad_data(frame, e.to_string()))
                } else {
                    Err(e)
                }
            }
        }
    }

    // ---- callbacks ---------------------------------------------------------

    /// Called with every message the parser delivers, placeholders included.
    pub fn set_callback<F>(&mut self, callback: F)
    where
        F: FnMut(&MessageInstance) + Send + 'static,
    {
        self.callback = Some(Box::new(callback));
    }

    pub fn clear_callback(&mut self) {
        self.callback = None;
    }

    /// Called with every message after it has been written by [`send`](Self::send).
    pub fn set_send_callback<F>(&mut self, callback: F)
    where
        F: FnMut(&MessageInstance) + Send + 'static,
    {
        self.send_callback = Some(Box::new(callback));
    }

    pub fn clear_send_callback(&mut self) {
        self.send_callback = None;
    }

    // ---- accessors ---------------------------------------------------------

    pub fn set_robust_parsing(&mut self, robust: bool) {
        self.config.parse_mode = if robust {
            ParseMode::Robust
        } else {
            ParseMode::Strict
        };
    }

    pub fn robust_parsing(&self) -> bool {
        self.config.parse_mode == ParseMode::Robust
    }

    /// Sequence number the next packed frame will carry.
    pub fn seq(&self) -> u8 {
        self.seq
    }

    pub fn set_seq(&mut self, seq: u8) {
        self.seq = seq;
    }

    pub fn system_id(&self) -> u8 {
        self.config.system_id
    }

    pub fn component_id(&self) -> u8 {
        self.config.component_id
    }

    pub fn set_identity(&mut self, system_id: u8, component_id: u8) {
        self.config.system_id = system_id;
        self.config.component_id = component_id;
    }

    pub fn wire_version(&self) -> WireVersion {
        self.config.wire_version
    }

    pub fn set_wire_version(&mut self, version: WireVersion) {
        self.config.wire_version = version;
    }

    pub fn set_ignore_checksum(&mut self, ignore: bool) {
        if ignore {
            warn!("Checksum verification disabled");
        }
        self.config.ignore_checksum = ignore;
    }

    pub fn config(&self) -> &LinkConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<SchemaRegistry> {
        &self.registry
    }

    pub fn signing(&self) -> &SigningState {
        &self.signing
    }

    pub fn signing_mut(&mut self) -> &mut SigningState {
        &mut self.signing
    }

    /// Shared handle to this session's counters.
    pub fn metrics(&self) -> Arc<Metrics> {
        Arc::clone(&self.metrics)
    }

    /// Smallest frame overhead for the current wire version, unsigned.
    pub fn frame_overhead(&self) -> usize {
        self.config.wire_version.header_len() + CHECKSUM_LEN
    }
}

impl StreamDecoder for Session {
    fn decode_stream(&mut self, bytes: &[u8]) -> Vec<Result<MessageInstance>> {
        self.feed(bytes)
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("config", &self.config)
            .field("seq", &self.seq)
            .field("parser", &self.parser)
            .field("signing", &self.signing)
            .field("has_callback", &self.callback.is_some())
            .field("has_send_callback", &self.send_callback.is_some())
            .finish()
    }
}
