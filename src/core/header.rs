//! Frame header model.
//!
//! ```text
//! V1: [0xFE][len][seq][sysid][compid][msgid]                                  6 bytes
//! V2: [0xFD][len][incompat][compat][seq][sysid][compid][msgid lo16 LE][msgid hi8] 10 bytes
//! ```

use crate::error::{constants, ProtocolError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Protocol marker for version 1 frames
pub const MAGIC_V1: u8 = 0xFE;
/// Protocol marker for version 2 frames
pub const MAGIC_V2: u8 = 0xFD;

pub const HEADER_LEN_V1: usize = 6;
pub const HEADER_LEN_V2: usize = 10;
pub const CHECKSUM_LEN: usize = 2;
pub const SIGNATURE_BLOCK_LEN: usize = 13;

/// Incompatible flag: frame carries a signature block
pub const IFLAG_SIGNED: u8 = 0x01;

/// Largest message id representable in a V2 header
pub const MAX_MSG_ID_V2: u32 = 0x00FF_FFFF;

/// Wire protocol version, selected by the leading magic byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum WireVersion {
    V1,
    #[default]
    V2,
}

impl WireVersion {
    pub fn magic(self) -> u8 {
        match self {
            WireVersion::V1 => MAGIC_V1,
            WireVersion::V2 => MAGIC_V2,
        }
    }

    pub fn header_len(self) -> usize {
        match self {
            WireVersion::V1 => HEADER_LEN_V1,
            WireVersion::V2 => HEADER_LEN_V2,
        }
    }

    pub fn from_magic(byte: u8) -> Option<Self> {
        match byte {
            MAGIC_V1 => Some(WireVersion::V1),
            MAGIC_V2 => Some(WireVersion::V2),
            _ => None,
        }
    }
}

impl fmt::Display for WireVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WireVersion::V1 => f.write_str("MAVLink1"),
            WireVersion::V2 => f.write_str("MAVLink2"),
        }
    }
}

/// Decoded frame header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Header {
    pub version: WireVersion,
    pub payload_len: u8,
    pub incompat_flags: u8,
    pub compat_flags: u8,
    pub seq: u8,
    pub system_id: u8,
    pub component_id: u8,
    pub msg_id: u32,
}

impl Header {
    /// Header for an outgoing message; session fields are stamped at pack time.
    pub fn new(msg_id: u32) -> Self {
        Self {
            msg_id,
            ..Self::default()
        }
    }

    pub fn is_signed(&self) -> bool {
        self.version == WireVersion::V2 && self.incompat_flags & IFLAG_SIGNED != 0
    }

    /// Length of the signature block this header announces.
    pub fn signature_len(&self) -> usize {
        if self.is_signed() {
            SIGNATURE_BLOCK_LEN
        } else {
            0
        }
    }

    /// Total frame length implied by this header.
    pub fn frame_len(&self) -> usize {
        self.version.header_len() + self.payload_len as usize + CHECKSUM_LEN + self.signature_len()
    }

    /// Encode to wire bytes. `force_v1` emits a legacy header regardless of
    /// `self.version`; flags are dropped since V1 cannot carry them.
    pub fn encode(&self, force_v1: bool) -> Result<Vec<u8>> {
        let version = if force_v1 {
            WireVersion::V1
        } else {
            self.version
        };
        match version {
            WireVersion::V1 => {
                let id = u8::try_from(self.msg_id).map_err(|_| {
                    ProtocolError::MessageIdOutOfRange {
                        id: self.msg_id,
                        version: version.to_string(),
                    }
                })?;
                Ok(vec![
                    MAGIC_V1,
                    self.payload_len,
                    self.seq,
                    self.system_id,
                    self.component_id,
                    id,
                ])
            }
            WireVersion::V2 => {
                if self.msg_id > MAX_MSG_ID_V2 {
                    return Err(ProtocolError::MessageIdOutOfRange {
                        id: self.msg_id,
                        version: version.to_string(),
                    });
                }
                let mut out = Vec::with_capacity(HEADER_LEN_V2);
                out.extend_from_slice(&[
                    MAGIC_V2,
                    self.payload_len,
                    self.incompat_flags,
                    self.compat_flags,
                    self.seq,
                    self.system_id,
                    self.component_id,
                ]);
                out.extend_from_slice(&((self.msg_id & 0xFFFF) as u16).to_le_bytes());
                out.push((self.msg_id >> 16) as u8);
                Ok(out)
            }
        }
    }

    /// Decode the header at the start of `bytes`. Trailing bytes are ignored.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let magic = *bytes
            .first()
            .ok_or_else(|| ProtocolError::MalformedHeader(constants::ERR_SHORT_HEADER.into()))?;
        let version = WireVersion::from_magic(magic).ok_or_else(|| {
            ProtocolError::MalformedHeader(format!("{} 0x{magic:02x}", constants::ERR_BAD_MAGIC))
        })?;
        if bytes.len() < version.header_len() {
            return Err(ProtocolError::MalformedHeader(format!(
                "{}: {} of {}",
                constants::ERR_SHORT_HEADER,
                bytes.len(),
                version.header_len()
            )));
        }

        let header = match version {
            WireVersion::V1 => Header {
                version,
                payload_len: bytes[1],
                incompat_flags: 0,
                compat_flags: 0,
                seq: bytes[2],
                system_id: bytes[3],
                component_id: bytes[4],
                msg_id: bytes[5] as u32,
            },
            WireVersion::V2 => Header {
                version,
                payload_len: bytes[1],
                incompat_flags: bytes[2],
                compat_flags: bytes[3],
                seq: bytes[4],
                system_id: bytes[5],
                component_id: bytes[6],
                msg_id: u16::from_le_bytes([bytes[7], bytes[8]]) as u32 | (bytes[9] as u32) << 16,
            },
        };
        Ok(header)
    }
}
