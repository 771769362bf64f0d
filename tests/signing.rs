//! Integration tests for frame signing and replay protection.

#![allow(clippy::expect_used, clippy::unwrap_used, clippy::panic)]

mod common;

use common::{heartbeat, message, registry};
use mavlink_engine::core::header::SIGNATURE_BLOCK_LEN;
use mavlink_engine::protocol::signing::{signing_timestamp_now, NEW_STREAM_TOLERANCE};
use mavlink_engine::{LinkConfig, ProtocolError, SchemaRegistry, SecretKey, Session};
use std::sync::Arc;

const KEY: [u8; 32] = [0x5A; 32];

fn signer(registry: &Arc<SchemaRegistry>, system_id: u8, link_id: u8, timestamp: u64) -> Session {
    let mut session = Session::new(registry.clone(), system_id, 1);
    session.signing_mut().enable(SecretKey::new(KEY), link_id, true);
    session.signing_mut().set_timestamp(timestamp);
    session
}

fn verifier(registry: &Arc<SchemaRegistry>, timestamp: u64) -> Session {
    let mut session = Session::new(registry.clone(), 255, 190);
    session.signing_mut().enable(SecretKey::new(KEY), 0, false);
    session.signing_mut().set_timestamp(timestamp);
    session
}

#[test]
fn test_signature_block_layout() {
    let registry = registry();
    let mut tx = signer(&registry, 1, 7, 0x0000_1234_5678_9ABC);
    let mut msg = heartbeat(&registry, 1);
    let frame = tx.pack(&mut msg, false).unwrap();

    let payload_len = frame[1] as usize;
    assert_eq!(frame.len(), 10 + payload_len + 2 + SIGNATURE_BLOCK_LEN);
    assert_eq!(frame[2], 0x01);
    let block = &frame[frame.len() - SIGNATURE_BLOCK_LEN..];
    assert_eq!(block[0], 7);
    assert_eq!(&block[1..7], &[0xBC, 0x9A, 0x78, 0x56, 0x34, 0x12]);
    assert!(msg.is_signed());
    assert_eq!(msg.link_id(), Some(7));
    assert_eq!(tx.signing().timestamp(), 0x0000_1234_5678_9ABD);
}

#[test]
fn test_replay_rejected_across_parse_calls() {
    let registry = registry();
    let mut tx = signer(&registry, 1, 0, 10_000);
    let mut rx = verifier(&registry, 0);

    let first = tx.pack(&mut heartbeat(&registry, 1), false).unwrap();
    let second = tx.pack(&mut heartbeat(&registry, 2), false).unwrap();

    assert_eq!(rx.parse_buffer(&first).unwrap().len(), 1);
    assert_eq!(rx.parse_buffer(&second).unwrap().len(), 1);
    // both replays are now older than the stream's last timestamp
    match rx.parse_buffer(&first) {
        Err(ProtocolError::SignatureInvalid(reason)) => assert!(reason.contains("not newer")),
        other => panic!("replay should be rejected, got {other:?}"),
    }
    assert!(matches!(
        rx.parse_buffer(&second),
        Err(ProtocolError::SignatureInvalid(_))
    ));

    let counters = rx.signing().counters();
    assert_eq!(counters.signed_seen, 4);
    assert_eq!(counters.good, 2);
    assert_eq!(counters.bad, 2);
    assert_eq!(counters.rejected, 2);
    assert_eq!(rx.metrics().snapshot().signature_failures, 2);
}

#[test]
fn test_replay_becomes_bad_data_in_robust_mode() {
    let registry = registry();
    let mut tx = signer(&registry, 1, 0, 10_000);
    let mut rx = verifier(&registry, 0);
    rx.set_robust_parsing(true);

    let frame = tx.pack(&mut heartbeat(&registry, 1), false).unwrap();
    let mut wire = frame.to_vec();
    wire.extend_from_slice(&frame);
    let decoded = rx.parse_buffer(&wire).unwrap();

    assert_eq!(decoded.len(), 2);
    assert!(!decoded[0].is_bad_data());
    assert!(decoded[1].is_bad_data());
    assert_eq!(decoded[1].frame().len(), frame.len());
}

#[test]
fn test_streams_tracked_independently() {
    let registry = registry();
    let mut a = signer(&registry, 1, 0, 50_000);
    let mut b = signer(&registry, 2, 0, 20_000);
    let mut c = signer(&registry, 1, 1, 30_000);
    let mut rx = verifier(&registry, 0);

    for tx in [&mut a, &mut b, &mut c] {
        let frame = tx.pack(&mut heartbeat(&registry, 0), false).unwrap();
        assert!(rx.parse_buffer(&frame).is_ok());
    }
    // an older timestamp on one stream says nothing about another
    assert_eq!(rx.signing().streams().len(), 3);
    assert_eq!(rx.signing().timestamp(), 50_000);
}

#[test]
fn test_new_stream_tolerance_window() {
    let registry = registry();
    let local = 100_000_000;

    let mut rx = verifier(&registry, local);
    let mut inside = signer(&registry, 1, 0, local - NEW_STREAM_TOLERANCE);
    let frame = inside.pack(&mut heartbeat(&registry, 0), false).unwrap();
    assert!(rx.parse_buffer(&frame).is_ok());

    let mut outside = signer(&registry, 2, 0, local - NEW_STREAM_TOLERANCE - 1);
    let frame = outside.pack(&mut heartbeat(&registry, 0), false).unwrap();
    assert!(rx.parse_buffer(&frame).is_err());
    // a rejected frame records nothing for its stream
    assert_eq!(rx.signing().streams().len(), 1);
}

#[test]
fn test_clock_catch_up() {
    let registry = registry();
    let mut tx = signer(&registry, 1, 0, 9_000_000);
    let mut rx = verifier(&registry, 1_000);
    let frame = tx.pack(&mut heartbeat(&registry, 0), false).unwrap();
    rx.parse_buffer(&frame).unwrap();
    assert_eq!(rx.signing().timestamp(), 9_000_000);

    // a lagging peer never pulls the clock backwards
    let mut slow = signer(&registry, 2, 0, 8_999_000);
    let frame = slow.pack(&mut heartbeat(&registry, 0), false).unwrap();
    rx.parse_buffer(&frame).unwrap();
    assert_eq!(rx.signing().timestamp(), 9_000_000);
}

#[test]
fn test_any_tampering_is_detected() {
    let registry = registry();
    let mut tx = signer(&registry, 1, 0, 1_000);
    let frame = tx.pack(&mut heartbeat(&registry, 42), false).unwrap();
    let sig_start = frame.len() - SIGNATURE_BLOCK_LEN;

    // link id, timestamp and digest bytes
    for index in sig_start..frame.len() {
        let mut tampered = frame.to_vec();
        tampered[index] ^= 0x40;
        let mut rx = verifier(&registry, 0);
        assert!(
            matches!(rx.parse_buffer(&tampered), Err(ProtocolError::SignatureInvalid(_))),
            "byte {index} of the signature block"
        );
    }
}

#[test]
fn test_wrong_key() {
    let registry = registry();
    let mut tx = signer(&registry, 1, 0, 1_000);
    let frame = tx.pack(&mut heartbeat(&registry, 0), false).unwrap();

    let mut rx = Session::new(registry.clone(), 255, 0);
    rx.signing_mut().enable(SecretKey::from_passphrase("not the key"), 0, false);
    assert!(matches!(
        rx.parse_buffer(&frame),
        Err(ProtocolError::SignatureInvalid(_))
    ));
    assert_eq!(rx.signing().counters().bad, 1);
}

#[test]
fn test_unsigned_policy() {
    let registry = registry();
    let mut plain = Session::new(registry.clone(), 1, 1);
    let heartbeat_frame = plain.pack(&mut heartbeat(&registry, 0), false).unwrap();
    let command_frame = plain.pack(&mut message(&registry, "COMMAND_LONG"), false).unwrap();

    let mut rx = verifier(&registry, 0);
    assert!(rx.parse_buffer(&heartbeat_frame).is_err());

    rx.signing_mut().set_allow_unsigned(|msg_id| msg_id == 0);
    assert_eq!(rx.parse_buffer(&heartbeat_frame).unwrap().len(), 1);
    assert!(rx.parse_buffer(&command_frame).is_err());

    rx.signing_mut().clear_allow_unsigned();
    assert!(rx.parse_buffer(&heartbeat_frame).is_err());

    let counters = rx.signing().counters();
    assert_eq!(counters.signed_seen, 0);
    assert_eq!(counters.accepted_unsigned, 1);
    assert_eq!(counters.rejected, 3);
}

#[test]
fn test_signed_frame_without_local_key() {
    let registry = registry();
    let mut tx = signer(&registry, 1, 0, 1_000);
    let frame = tx.pack(&mut heartbeat(&registry, 0), false).unwrap();

    let mut rx = Session::new(registry, 255, 0);
    assert!(matches!(
        rx.parse_buffer(&frame),
        Err(ProtocolError::SignatureInvalid(_))
    ));

    // the policy may still let it through, unverified
    rx.signing_mut().set_allow_unsigned(|_| true);
    let decoded = rx.parse_buffer(&frame).unwrap();
    assert!(!decoded[0].is_signed());
}

#[test]
fn test_forced_v1_is_never_signed() {
    let registry = registry();
    let mut tx = signer(&registry, 1, 0, 1_000);
    let mut msg = heartbeat(&registry, 0);
    let frame = tx.pack(&mut msg, true).unwrap();
    assert_eq!(frame[0], 0xFE);
    assert!(!msg.is_signed());
    assert_eq!(tx.signing().timestamp(), 1_000);
}

#[test]
fn test_sign_outgoing_without_key_fails_cleanly() {
    let registry = registry();
    let mut tx = Session::new(registry.clone(), 1, 1);
    tx.signing_mut().set_sign_outgoing(true);
    assert!(matches!(
        tx.pack(&mut heartbeat(&registry, 0), false),
        Err(ProtocolError::MissingSecretKey)
    ));
    assert_eq!(tx.seq(), 0);
    assert_eq!(tx.metrics().snapshot().packets_sent, 0);
}

#[test]
fn test_evicted_stream_reenters_through_window() {
    let registry = registry();
    let mut rx = Session::with_config(
        registry.clone(),
        LinkConfig {
            max_stream_keys: 1,
            ..LinkConfig::default()
        },
    );
    rx.signing_mut().enable(SecretKey::new(KEY), 0, false);
    rx.signing_mut().set_timestamp(1_000);

    let mut a = signer(&registry, 1, 0, 2_000);
    let mut b = signer(&registry, 2, 0, 3_000);
    let frame_a = a.pack(&mut heartbeat(&registry, 0), false).unwrap();
    let frame_b = b.pack(&mut heartbeat(&registry, 0), false).unwrap();

    rx.parse_buffer(&frame_a).unwrap();
    assert!(rx.parse_buffer(&frame_a).is_err());
    rx.parse_buffer(&frame_b).unwrap();
    assert_eq!(rx.signing().streams().len(), 1);

    // stream A was evicted; its old frame is judged as a new stream again
    assert!(rx.parse_buffer(&frame_a).is_ok());
}

#[test]
fn test_wall_clock_timestamp_is_plausible() {
    let now = signing_timestamp_now().unwrap();
    // later than 2024-01-01 in 10 microsecond ticks since 2015-01-01
    assert!(now > 283_996_800 * 100_000);
    assert!(now < 1 << 48);
}
