//! Frame signing and verification.
//!
//! A signed V2 frame ends with a 13 byte block:
//!
//! ```text
//! [link_id:u8][timestamp:u48 LE][sha256(secret_key || frame_before_digest)[..6]]
//! ```
//!
//! Timestamps count 10 microsecond ticks since 2015-01-01T00:00:00Z. Each
//! stream (link id, source system, source component) must present strictly
//! increasing timestamps; a stream seen for the first time may lag our own
//! clock by at most one minute.
//!
//! Signing state is per session and only ever touched by that session's
//! thread of control.

use crate::core::header::SIGNATURE_BLOCK_LEN;
use crate::error::{constants, ProtocolError, Result};
use crate::utils::replay_cache::{StreamKey, StreamTimestamps};
use sha2::{Digest, Sha256};
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tracing::{debug, warn};
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Bytes of the truncated digest
pub const SIGNATURE_DIGEST_LEN: usize = 6;

/// Bytes of the on-wire timestamp
pub const SIGNATURE_TIMESTAMP_LEN: usize = 6;

/// How far behind our clock a new stream may start: one minute of 10us ticks
pub const NEW_STREAM_TOLERANCE: u64 = 6_000_000;

/// Unix time of the signing epoch, 2015-01-01T00:00:00Z
pub const SIGNING_EPOCH_UNIX_SECS: u64 = 1_420_070_400;

const TIMESTAMP_MASK: u64 = (1 << 48) - 1;

/// Policy hook consulted for frames that are unsigned or fail verification.
/// Receives the message id; returning `true` accepts the frame.
pub type AllowUnsignedFn = dyn Fn(u32) -> bool + Send + Sync + 'static;

/// 32 byte signing secret, wiped from memory on drop.
#[derive(Clone, Zeroize, ZeroizeOnDrop, PartialEq, Eq)]
pub struct SecretKey([u8; 32]);

impl SecretKey {
    pub fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Parse 64 hex characters.
    pub fn from_hex(text: &str) -> Result<Self> {
        let mut bytes = [0u8; 32];
        hex::decode_to_slice(text.trim(), &mut bytes).map_err(|e| {
            ProtocolError::ConfigError(format!("Invalid signing key (need 64 hex chars): {e}"))
        })?;
        Ok(Self(bytes))
    }

    /// SHA-256 of a passphrase, the usual ground station convention.
    pub fn from_passphrase(passphrase: &str) -> Self {
        Self(Sha256::digest(passphrase.as_bytes()).into())
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecretKey(..)")
    }
}

/// Current wall clock as a signing timestamp.
pub fn signing_timestamp_now() -> Result<u64> {
    let since_unix = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|_| ProtocolError::Custom(constants::ERR_SYSTEM_TIME.into()))?;
    let since_epoch = since_unix
        .checked_sub(Duration::from_secs(SIGNING_EPOCH_UNIX_SECS))
        .ok_or_else(|| ProtocolError::Custom(constants::ERR_SYSTEM_TIME.into()))?;
    Ok((since_epoch.as_micros() / 10) as u64 & TIMESTAMP_MASK)
}

/// Signing counters, as seen by one session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SigningCounters {
    /// Frames that carried a signature block
    pub signed_seen: u64,
    pub good: u64,
    pub bad: u64,
    /// Frames let through by the unsigned policy
    pub accepted_unsigned: u64,
    pub rejected: u64,
}

/// Result of signature checks on one incoming frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignatureOutcome {
    /// Signature verified; carries the frame's link id
    Verified { link_id: u8 },
    /// Accepted without a verified signature
    Unsigned,
}

impl SignatureOutcome {
    pub fn link_id(self) -> Option<u8> {
        match self {
            SignatureOutcome::Verified { link_id } => Some(link_id),
            SignatureOutcome::Unsigned => None,
        }
    }
}

/// Per-session signing state.
pub struct SigningState {
    secret_key: Option<SecretKey>,
    timestamp: u64,
    link_id: u8,
    sign_outgoing: bool,
    allow_unsigned: Option<Arc<AllowUnsignedFn>>,
    streams: StreamTimestamps,
    counters: SigningCounters,
}

impl SigningState {
    /// Disabled signing: no key, timestamp 0.
    pub fn new() -> Self {
        Self::with_stream_capacity(StreamTimestamps::DEFAULT_MAX_ENTRIES)
    }

    pub fn with_stream_capacity(max_streams: usize) -> Self {
        Self {
            secret_key: None,
            timestamp: 0,
            link_id: 0,
            sign_outgoing: false,
            allow_unsigned: None,
            streams: StreamTimestamps::with_capacity(max_streams),
            counters: SigningCounters::default(),
        }
    }

    /// Enable signing with `key`, signing outgoing frames on `link_id`.
    pub fn enable(&mut self, key: SecretKey, link_id: u8, sign_outgoing: bool) {
        self.secret_key = Some(key);
        self.link_id = link_id;
        self.sign_outgoing = sign_outgoing;
    }

    pub fn set_secret_key(&mut self, key: Option<SecretKey>) {
        self.secret_key = key;
    }

    pub fn secret_key(&self) -> Option<&SecretKey> {
        self.secret_key.as_ref()
    }

    pub fn set_sign_outgoing(&mut self, sign: bool) {
        self.sign_outgoing = sign;
    }

    pub fn sign_outgoing(&self) -> bool {
        self.sign_outgoing
    }

    pub fn set_link_id(&mut self, link_id: u8) {
        self.link_id = link_id;
    }

    pub fn link_id(&self) -> u8 {
        self.link_id
    }

    pub fn set_timestamp(&mut self, timestamp: u64) {
        self.timestamp = timestamp & TIMESTAMP_MASK;
    }

    pub fn timestamp(&self) -> u64 {
        self.timestamp
    }

    /// Install the accept-unsigned escape hatch.
    pub fn set_allow_unsigned<F>(&mut self, policy: F)
    where
        F: Fn(u32) -> bool + Send + Sync + 'static,
    {
        self.allow_unsigned = Some(Arc::new(policy));
    }

    pub fn clear_allow_unsigned(&mut self) {
        self.allow_unsigned = None;
    }

    pub fn counters(&self) -> SigningCounters {
        self.counters
    }

    pub fn streams(&self) -> &StreamTimestamps {
        &self.streams
    }

    /// Append a signature block to `frame` (header + payload + checksum) and
    /// advance the outgoing timestamp.
    pub fn sign(&mut self, frame: &mut Vec<u8>) -> Result<()> {
        let key = self
            .secret_key
            .as_ref()
            .ok_or(ProtocolError::MissingSecretKey)?;

        frame.push(self.link_id);
        frame.extend_from_slice(&self.timestamp.to_le_bytes()[..SIGNATURE_TIMESTAMP_LEN]);
        let digest = signature_digest(key, frame);
        frame.extend_from_slice(&digest);

        self.timestamp = (self.timestamp + 1) & TIMESTAMP_MASK;
        Ok(())
    }

    /// Verify the signature block at the tail of `frame`, applying replay
    /// protection for the sender's stream. Returns whether it was accepted.
    pub fn verify(&mut self, frame: &[u8], system_id: u8, component_id: u8) -> bool {
        match self.check_signature(frame, system_id, component_id) {
            Ok(()) => true,
            Err(reason) => {
                debug!(system_id, component_id, reason, "Signature rejected");
                false
            }
        }
    }

    fn check_signature(
        &mut self,
        frame: &[u8],
        system_id: u8,
        component_id: u8,
    ) -> std::result::Result<(), &'static str> {
        let key = self
            .secret_key
            .as_ref()
            .ok_or(constants::ERR_SIGNED_WITHOUT_KEY)?;
        if frame.len() < SIGNATURE_BLOCK_LEN {
            return Err(constants::ERR_SHORT_SIGNATURE);
        }

        let block = &frame[frame.len() - SIGNATURE_BLOCK_LEN..];
        let link_id = block[0];
        let mut ts = [0u8; 8];
        ts[..SIGNATURE_TIMESTAMP_LEN].copy_from_slice(&block[1..1 + SIGNATURE_TIMESTAMP_LEN]);
        let timestamp = u64::from_le_bytes(ts);

        let stream = StreamKey::new(link_id, system_id, component_id);
        match self.streams.get(&stream) {
            Some(last) if timestamp <= last => return Err(constants::ERR_REPLAYED_TIMESTAMP),
            Some(_) => {}
            None => {
                if timestamp + NEW_STREAM_TOLERANCE < self.timestamp {
                    return Err(constants::ERR_STALE_NEW_STREAM);
                }
            }
        }

        let signed_part = &frame[..frame.len() - SIGNATURE_DIGEST_LEN];
        let expected = signature_digest(key, signed_part);
        if expected[..] != frame[frame.len() - SIGNATURE_DIGEST_LEN..] {
            return Err(constants::ERR_BAD_DIGEST);
        }

        self.streams.record(stream, timestamp);
        self.timestamp = self.timestamp.max(timestamp);
        Ok(())
    }

    /// Apply the full incoming-frame policy: verify signed frames, consult the
    /// unsigned policy for everything that did not verify, and count outcomes.
    pub fn check_incoming(
        &mut self,
        frame: &[u8],
        signed: bool,
        msg_id: u32,
        system_id: u8,
        component_id: u8,
    ) -> Result<SignatureOutcome> {
        if signed {
            self.counters.signed_seen += 1;
        }

        if self.secret_key.is_some() && signed {
            return match self.check_signature(frame, system_id, component_id) {
                Ok(()) => {
                    self.counters.good += 1;
                    Ok(SignatureOutcome::Verified {
                        link_id: frame[frame.len() - SIGNATURE_BLOCK_LEN],
                    })
                }
                Err(reason) => {
                    self.counters.bad += 1;
                    self.ask_policy(msg_id, reason)
                }
            };
        }

        if self.secret_key.is_some() {
            return self.ask_policy(msg_id, constants::ERR_UNSIGNED_REJECTED);
        }

        if signed {
            return self.ask_policy(msg_id, constants::ERR_SIGNED_WITHOUT_KEY);
        }

        Ok(SignatureOutcome::Unsigned)
    }

    fn ask_policy(&mut self, msg_id: u32, reason: &str) -> Result<SignatureOutcome> {
        let accepted = self
            .allow_unsigned
            .as_ref()
            .is_some_and(|policy| policy(msg_id));
        if accepted {
            self.counters.accepted_unsigned += 1;
            Ok(SignatureOutcome::Unsigned)
        } else {
            self.counters.rejected += 1;
            warn!(msg_id, reason, "Frame failed signing policy");
            Err(ProtocolError::SignatureInvalid(reason.to_string()))
        }
    }
}

impl Default for SigningState {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for SigningState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SigningState")
            .field("has_key", &self.secret_key.is_some())
            .field("timestamp", &self.timestamp)
            .field("link_id", &self.link_id)
            .field("sign_outgoing", &self.sign_outgoing)
            .field("has_allow_unsigned", &self.allow_unsigned.is_some())
            .field("streams", &self.streams.len())
            .field("counters", &self.counters)
            .finish()
    }
}

fn signature_digest(key: &SecretKey, signed_part: &[u8]) -> [u8; SIGNATURE_DIGEST_LEN] {
    let mut hasher = Sha256::new();
    hasher.update(key.as_bytes());
    hasher.update(signed_part);
    let full = hasher.finalize();
    let mut out = [0u8; SIGNATURE_DIGEST_LEN];
    out.copy_from_slice(&full[..SIGNATURE_DIGEST_LEN]);
    out
}
