//! Property-based tests using proptest
//!
//! These tests validate framing invariants across a wide range of randomly
//! generated field values, identities and stream corruptions.

#![allow(clippy::expect_used, clippy::unwrap_used)]

mod common;

use common::{
    command_long, heartbeat, message, registry, sample_messages, simple_registry, REFERENCE_V1_FRAME,
};
use mavlink_engine::core::checksum::frame_checksum;
use mavlink_engine::core::header::HEADER_LEN_V2;
use mavlink_engine::{ProtocolError, Session};
use proptest::prelude::*;

// Property: decode(pack(m)) == m for every wire version and identity
proptest! {
    #[test]
    fn prop_heartbeat_roundtrip(
        custom_mode in any::<u32>(),
        base_mode in any::<u8>(),
        system_id in any::<u8>(),
        component_id in any::<u8>(),
        seq in any::<u8>(),
        force_v1 in any::<bool>(),
    ) {
        let registry = registry();
        let mut tx = Session::new(registry.clone(), system_id, component_id);
        tx.set_seq(seq);
        let mut msg = heartbeat(&registry, custom_mode).with("base_mode", base_mode).unwrap();
        let frame = tx.pack(&mut msg, force_v1).expect("pack should not fail");

        let mut rx = Session::new(registry, 255, 0);
        let decoded = rx.parse_buffer(&frame).expect("decode should not fail");
        prop_assert_eq!(decoded.len(), 1);
        prop_assert_eq!(&decoded[0], &msg);
        prop_assert_eq!(decoded[0].crc(), msg.crc());
        prop_assert_eq!(decoded[0].seq(), seq);
    }
}

proptest! {
    #[test]
    fn prop_command_long_roundtrip(
        command in any::<u16>(),
        param1 in -1.0e6f32..1.0e6f32,
        confirmation in any::<u8>(),
    ) {
        let registry = registry();
        let mut tx = Session::new(registry.clone(), 1, 1);
        let mut msg = command_long(&registry, command, param1)
            .with("confirmation", confirmation)
            .unwrap();
        let frame = tx.pack(&mut msg, false).unwrap();

        let mut rx = Session::new(registry, 255, 0);
        let decoded = rx.parse_buffer(&frame).unwrap();
        prop_assert_eq!(&decoded[0], &msg);
    }
}

// Property: a trimmed V2 payload decodes exactly like its zero-padded form
proptest! {
    #[test]
    fn prop_trimmed_equals_untrimmed(
        time_boot_ms in any::<u32>(),
        press_abs in -2000.0f32..2000.0f32,
    ) {
        let registry = registry();
        let schema = registry.lookup_by_name("SCALED_PRESSURE").unwrap().clone();
        let mut tx = Session::new(registry.clone(), 1, 1);
        let mut msg = message(&registry, "SCALED_PRESSURE")
            .with("time_boot_ms", time_boot_ms)
            .unwrap()
            .with("press_abs", press_abs)
            .unwrap();
        let trimmed = tx.pack(&mut msg, false).unwrap();

        let payload_len = trimmed[1] as usize;
        let mut untrimmed = trimmed[..HEADER_LEN_V2 + payload_len].to_vec();
        untrimmed.resize(HEADER_LEN_V2 + schema.payload_len(), 0);
        untrimmed[1] = schema.payload_len() as u8;
        let crc = frame_checksum(&untrimmed[1..], schema.crc_extra());
        untrimmed.extend_from_slice(&crc.to_le_bytes());

        let mut rx = Session::new(registry, 255, 0);
        let a = rx.parse_buffer(&trimmed).unwrap();
        let b = rx.parse_buffer(&untrimmed).unwrap();
        prop_assert_eq!(&a[0], &b[0]);
        prop_assert_eq!(&a[0], &msg);
    }
}

// Property: any single flipped payload bit is caught by the checksum
proptest! {
    #[test]
    fn prop_payload_bit_flip_rejected(
        custom_mode in 1u32..,
        bit in 0usize..64,
    ) {
        let registry = registry();
        let mut tx = Session::new(registry.clone(), 1, 1);
        let mut frame = tx.pack(&mut heartbeat(&registry, custom_mode), false).unwrap().to_vec();
        let payload_len = frame[1] as usize;
        let bit = bit % (payload_len * 8);
        frame[HEADER_LEN_V2 + bit / 8] ^= 1 << (bit % 8);

        let mut rx = Session::new(registry, 255, 0);
        let result = rx.parse_buffer(&frame);
        let is_checksum_error = matches!(result, Err(ProtocolError::ChecksumMismatch { .. }));
        prop_assert!(is_checksum_error, "expected a checksum mismatch, got {:?}", result);
        prop_assert_eq!(rx.metrics().snapshot().checksum_failures, 1);
    }
}

// Property: N garbage bytes then one frame -> N placeholders, N errors, 1 message
proptest! {
    #[test]
    fn prop_resync_after_garbage(garbage in prop::collection::vec(0u8..0xFD, 0..200)) {
        let mut rx = Session::new(simple_registry(), 255, 0);
        rx.set_robust_parsing(true);
        let mut wire = garbage.clone();
        wire.extend_from_slice(&REFERENCE_V1_FRAME);

        let decoded = rx.parse_buffer(&wire).unwrap();
        let bad = decoded.iter().filter(|m| m.is_bad_data()).count();
        let good: Vec<_> = decoded.iter().filter(|m| !m.is_bad_data()).collect();
        prop_assert_eq!(bad, garbage.len());
        prop_assert_eq!(good.len(), 1);
        prop_assert_eq!(rx.metrics().snapshot().receive_errors, garbage.len() as u64);
    }
}

// Property: how the stream is chunked never changes what comes out
proptest! {
    #[test]
    fn prop_chunking_is_irrelevant(cuts in prop::collection::vec(1usize..40, 1..20)) {
        let registry = registry();
        let mut tx = Session::new(registry.clone(), 1, 1);
        let mut wire = Vec::new();
        for mut msg in sample_messages(&registry) {
            wire.extend_from_slice(&tx.pack(&mut msg, false).unwrap());
        }

        let mut whole = Session::new(registry.clone(), 255, 0);
        let expected = whole.parse_buffer(&wire).unwrap();

        let mut chunked = Session::new(registry, 255, 0);
        let mut got = Vec::new();
        let mut rest = &wire[..];
        let mut cuts = cuts.into_iter().cycle();
        while !rest.is_empty() {
            let n = cuts.next().unwrap_or(1).min(rest.len());
            got.extend(chunked.parse_buffer(&rest[..n]).unwrap());
            rest = &rest[n..];
        }
        prop_assert_eq!(got, expected);
    }
}

// Property: arbitrary input never panics and never wedges a robust parser
proptest! {
    #[test]
    fn prop_arbitrary_bytes_never_panic(noise in prop::collection::vec(any::<u8>(), 0..512)) {
        let mut rx = Session::new(simple_registry(), 255, 0);
        rx.set_robust_parsing(true);
        let _ = rx.feed(&noise);
        rx.reset_parser();

        let decoded = rx.parse_buffer(&REFERENCE_V1_FRAME).unwrap();
        prop_assert_eq!(decoded.len(), 1);
    }
}
