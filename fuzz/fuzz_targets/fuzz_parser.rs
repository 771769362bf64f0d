#![no_main]

use libfuzzer_sys::fuzz_target;
use mavlink_engine::{FieldType, MessageSchema, SchemaRegistry, SecretKey, Session};
use std::sync::Arc;

fuzz_target!(|data: &[u8]| {
    // Feed arbitrary bytes through strict, robust and signing sessions:
    // no panics, no stalls, every byte accounted for.
    let Ok(schema) = MessageSchema::builder(0, "HEARTBEAT")
        .crc_extra(50)
        .field("type", FieldType::U8)
        .field("autopilot", FieldType::U8)
        .field("base_mode", FieldType::U8)
        .field("custom_mode", FieldType::U32)
        .field("system_status", FieldType::U8)
        .field("mavlink_version", FieldType::U8)
        .build()
    else {
        return;
    };
    let Ok(registry) = SchemaRegistry::from_schemas([schema]) else {
        return;
    };
    let registry = Arc::new(registry);

    let mut strict = Session::new(registry.clone(), 255, 0);
    let mut robust = Session::new(registry.clone(), 255, 0);
    robust.set_robust_parsing(true);
    let mut signed = Session::new(registry, 255, 0);
    signed.signing_mut().enable(SecretKey::new([1; 32]), 0, false);

    let split = data.first().map_or(0, |&b| b as usize % (data.len() + 1));
    for part in [&data[..split], &data[split..]] {
        let _ = strict.feed(part);
        let _ = signed.feed(part);
        for outcome in robust.feed(part) {
            assert!(outcome.is_ok(), "robust parsing returned an error");
        }
    }
});
