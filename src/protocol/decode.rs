//! Candidate frame -> [`MessageInstance`].
//!
//! The checks run in a fixed order and the first failure wins:
//!
//! 1. header and incompatible flags
//! 2. declared payload length against the frame size
//! 3. registry lookup (unknown ids become placeholders, not errors)
//! 4. checksum, seeded with the schema's `crc_extra`
//! 5. signature policy
//! 6. payload zero-padding and field decoding

use crate::core::checksum::frame_checksum;
use crate::core::header::{Header, WireVersion, CHECKSUM_LEN, IFLAG_SIGNED};
use crate::core::message::{MessageInstance, Provenance};
use crate::core::payload::decode_payload;
use crate::core::schema::SchemaRegistry;
use crate::error::{ProtocolError, Result};
use crate::protocol::signing::SigningState;
use bytes::Bytes;
use std::borrow::Cow;
use tracing::{debug, instrument, warn};

/// Everything `decode_frame` needs from the owning session.
pub struct DecodeContext<'a> {
    pub registry: &'a SchemaRegistry,
    pub signing: &'a mut SigningState,
    /// Accept frames with a wrong checksum. Diagnostic use only.
    pub ignore_checksum: bool,
}

/// Decode one complete frame as cut by the stream parser.
#[instrument(level = "trace", skip_all, fields(len = frame.len()))]
pub fn decode_frame(frame: Bytes, ctx: &mut DecodeContext<'_>) -> Result<MessageInstance> {
    let registry = ctx.registry;
    let header = Header::decode(&frame)?;
    if header.version == WireVersion::V2 && header.incompat_flags & !IFLAG_SIGNED != 0 {
        return Err(ProtocolError::InvalidIncompatFlags(header.incompat_flags));
    }

    let header_len = header.version.header_len();
    let sig_len = header.signature_len();
    let actual = frame
        .len()
        .checked_sub(header_len + CHECKSUM_LEN + sig_len)
        .ok_or(ProtocolError::LengthMismatch {
            msg_id: header.msg_id,
            expected: header.payload_len as usize,
            actual: 0,
        })?;
    if actual != header.payload_len as usize {
        return Err(ProtocolError::LengthMismatch {
            msg_id: header.msg_id,
            expected: header.payload_len as usize,
            actual,
        });
    }

    let Some(schema) = registry.lookup(header.msg_id) else {
        debug!(msg_id = header.msg_id, "Unknown message id");
        return Ok(MessageInstance::unknown(header, frame));
    };

    let payload_end = header_len + actual;
    let received = u16::from_le_bytes([frame[payload_end], frame[payload_end + 1]]);
    let computed = frame_checksum(&frame[1..payload_end], schema.crc_extra());
    if received != computed {
        if !ctx.ignore_checksum {
            return Err(ProtocolError::ChecksumMismatch {
                msg_id: header.msg_id,
                received,
                computed,
            });
        }
        warn!(msg_id = header.msg_id, received, computed, "Accepting frame with bad checksum");
    }

    let outcome = ctx.signing.check_incoming(
        &frame,
        header.is_signed(),
        header.msg_id,
        header.system_id,
        header.component_id,
    )?;

    let wire_payload = frame.slice(header_len..payload_end);
    let required = schema.payload_len();
    let padded: Cow<'_, [u8]> = if wire_payload.len() < required {
        let mut owned = wire_payload.to_vec();
        owned.resize(required, 0);
        Cow::Owned(owned)
    } else {
        Cow::Borrowed(&wire_payload[..required])
    };
    let values = decode_payload(schema, &padded)?;

    debug!(
        msg_id = header.msg_id,
        name = schema.name(),
        seq = header.seq,
        signed = outcome.link_id().is_some(),
        "Decoded frame"
    );

    Ok(MessageInstance::from_decoded(
        schema.clone(),
        values,
        Provenance {
            header,
            payload: wire_payload,
            crc: received,
            link_id: outcome.link_id(),
            frame,
        },
    ))
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::core::message::FieldValue;
    use crate::core::schema::{FieldType, MessageSchema};
    use crate::protocol::signing::SecretKey;

    const V1_FRAME: [u8; 9] = [0xFE, 0x01, 0x00, 0x01, 0x01, 0x00, 0x2A, 0x77, 0x37];

    fn registry() -> SchemaRegistry {
        SchemaRegistry::from_schemas([
            MessageSchema::builder(0, "SIMPLE")
                .crc_extra(50)
                .field("value", FieldType::U8)
                .build()
                .unwrap(),
            MessageSchema::builder(30, "WIDE")
                .crc_extra(39)
                .field("a", FieldType::U32)
                .field("b", FieldType::U16)
                .field("c", FieldType::U8)
                .build()
                .unwrap(),
        ])
        .unwrap()
    }

    fn decode(
        frame: &[u8],
        signing: &mut SigningState,
        ignore_checksum: bool,
    ) -> Result<MessageInstance> {
        let registry = registry();
        let mut ctx = DecodeContext {
            registry: &registry,
            signing,
            ignore_checksum,
        };
        decode_frame(Bytes::copy_from_slice(frame), &mut ctx)
    }

    #[test]
    fn decodes_reference_v1_frame() {
        let msg = decode(&V1_FRAME, &mut SigningState::new(), false).unwrap();
        assert_eq!(msg.name(), "SIMPLE");
        assert_eq!(msg.get("value"), Some(&FieldValue::U8(42)));
        assert_eq!(msg.crc(), Some(0x3777));
        assert_eq!(msg.system_id(), 1);
        assert_eq!(msg.payload().as_ref(), &[0x2A]);
        assert!(!msg.is_signed());
    }

    #[test]
    fn checksum_mismatch_unless_ignored() {
        let mut frame = V1_FRAME;
        frame[6] = 0x2B;
        assert!(matches!(
            decode(&frame, &mut SigningState::new(), false),
            Err(ProtocolError::ChecksumMismatch { msg_id: 0, received: 0x3777, .. })
        ));
        let msg = decode(&frame, &mut SigningState::new(), true).unwrap();
        assert_eq!(msg.get("value"), Some(&FieldValue::U8(43)));
    }

    #[test]
    fn length_mismatch() {
        let mut frame = V1_FRAME.to_vec();
        frame.push(0);
        assert!(matches!(
            decode(&frame, &mut SigningState::new(), false),
            Err(ProtocolError::LengthMismatch { expected: 1, actual: 2, .. })
        ));
    }

    #[test]
    fn unknown_id_is_a_placeholder() {
        // the checksum is never looked at for unknown ids
        let frame = [0xFD, 1, 0, 0, 5, 1, 1, 0x0F, 0x27, 0x00, 0xAA, 0x00, 0x00];
        let msg = decode(&frame, &mut SigningState::new(), false).unwrap();
        assert!(msg.is_unknown());
        assert_eq!(msg.name(), "UNKNOWN_9999");
        assert_eq!(msg.header().seq, 5);
    }

    #[test]
    fn unsupported_incompat_flags() {
        let frame = [0xFD, 1, 0x02, 0, 0, 1, 1, 0, 0, 0, 0x2A, 0, 0];
        assert!(matches!(
            decode(&frame, &mut SigningState::new(), false),
            Err(ProtocolError::InvalidIncompatFlags(0x02))
        ));
    }

    #[test]
    fn trimmed_v2_payload_is_zero_padded() {
        // WIDE wire order is a, b, c; payload trimmed to a's first byte
        let mut frame = vec![0xFD, 1, 0, 0, 0, 1, 1, 30, 0, 0, 0x05];
        let crc = frame_checksum(&frame[1..], 39);
        frame.extend_from_slice(&crc.to_le_bytes());
        let msg = decode(&frame, &mut SigningState::new(), false).unwrap();
        assert_eq!(msg.get("a"), Some(&FieldValue::U32(5)));
        assert_eq!(msg.get("b"), Some(&FieldValue::U16(0)));
        assert_eq!(msg.get("c"), Some(&FieldValue::U8(0)));
        assert_eq!(msg.payload().len(), 1);
    }

    #[test]
    fn keyed_session_rejects_unsigned_frames() {
        let mut signing = SigningState::new();
        signing.enable(SecretKey::new([1; 32]), 0, false);
        assert!(matches!(
            decode(&V1_FRAME, &mut signing, false),
            Err(ProtocolError::SignatureInvalid(_))
        ));
        signing.set_allow_unsigned(|_| true);
        assert!(decode(&V1_FRAME, &mut signing, false).is_ok());
    }
}
