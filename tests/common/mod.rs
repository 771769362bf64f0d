//! Shared fixtures for the integration tests.

#![allow(dead_code, clippy::unwrap_used, clippy::expect_used)]

use mavlink_engine::{FieldType, MessageInstance, MessageSchema, SchemaRegistry};
use std::sync::Arc;

/// `SIMPLE {value : 42}` from system 1 component 1, sequence 0, V1.
pub const REFERENCE_V1_FRAME: [u8; 9] = [0xFE, 0x01, 0x00, 0x01, 0x01, 0x00, 0x2A, 0x77, 0x37];

/// Registry holding the single-byte `SIMPLE` message (id 0, seed 50).
pub fn simple_registry() -> Arc<SchemaRegistry> {
    let simple = MessageSchema::builder(0, "SIMPLE")
        .crc_extra(50)
        .field("value", FieldType::U8)
        .build()
        .expect("SIMPLE schema");
    Arc::new(SchemaRegistry::from_schemas([simple]).expect("registry"))
}

/// A small common dialect covering scalars, text, arrays, extensions, an
/// instance field and an id that only fits a V2 header.
pub fn registry() -> Arc<SchemaRegistry> {
    let schemas = [
        MessageSchema::builder(0, "HEARTBEAT")
            .crc_extra(50)
            .field("type", FieldType::U8)
            .field("autopilot", FieldType::U8)
            .field("base_mode", FieldType::U8)
            .field("custom_mode", FieldType::U32)
            .field("system_status", FieldType::U8)
            .field("mavlink_version", FieldType::U8),
        MessageSchema::builder(22, "PARAM_VALUE")
            .crc_extra(220)
            .array("param_id", FieldType::Char, 16)
            .field("param_value", FieldType::F32)
            .field("param_type", FieldType::U8)
            .field("param_count", FieldType::U16)
            .field("param_index", FieldType::U16),
        MessageSchema::builder(24, "GPS_RAW_INT")
            .crc_extra(24)
            .field("time_usec", FieldType::U64)
            .field("fix_type", FieldType::U8)
            .field("lat", FieldType::I32)
            .field("lon", FieldType::I32)
            .field("alt", FieldType::I32)
            .field("eph", FieldType::U16)
            .field("epv", FieldType::U16)
            .field("vel", FieldType::U16)
            .field("cog", FieldType::U16)
            .field("satellites_visible", FieldType::U8)
            .extensions()
            .field("alt_ellipsoid", FieldType::I32)
            .field("h_acc", FieldType::U32)
            .field("v_acc", FieldType::U32)
            .field("vel_acc", FieldType::U32)
            .field("hdg_acc", FieldType::U32)
            .field("yaw", FieldType::U16),
        MessageSchema::builder(29, "SCALED_PRESSURE")
            .crc_extra(115)
            .field("time_boot_ms", FieldType::U32)
            .field("press_abs", FieldType::F32)
            .field("press_diff", FieldType::F32)
            .field("temperature", FieldType::I16)
            .extensions()
            .field("temperature_press_diff", FieldType::I16),
        MessageSchema::builder(76, "COMMAND_LONG")
            .crc_extra(152)
            .field("target_system", FieldType::U8)
            .field("target_component", FieldType::U8)
            .field("command", FieldType::U16)
            .field("confirmation", FieldType::U8)
            .field("param1", FieldType::F32)
            .field("param2", FieldType::F32)
            .field("param3", FieldType::F32)
            .field("param4", FieldType::F32)
            .field("param5", FieldType::F32)
            .field("param6", FieldType::F32)
            .field("param7", FieldType::F32),
        MessageSchema::builder(132, "DISTANCE_SENSOR")
            .crc_extra(85)
            .field("time_boot_ms", FieldType::U32)
            .field("min_distance", FieldType::U16)
            .field("max_distance", FieldType::U16)
            .field("current_distance", FieldType::U16)
            .field("type", FieldType::U8)
            .field("id", FieldType::U8)
            .instance()
            .field("orientation", FieldType::U8)
            .field("covariance", FieldType::U8)
            .extensions()
            .field("horizontal_fov", FieldType::F32)
            .field("vertical_fov", FieldType::F32)
            .array("quaternion", FieldType::F32, 4)
            .field("signal_quality", FieldType::U8),
        MessageSchema::builder(253, "STATUSTEXT")
            .crc_extra(83)
            .field("severity", FieldType::U8)
            .array("text", FieldType::Char, 50)
            .extensions()
            .field("id", FieldType::U16)
            .field("chunk_seq", FieldType::U8),
        MessageSchema::builder(300, "PROTOCOL_VERSION")
            .crc_extra(217)
            .field("version", FieldType::U16)
            .field("min_version", FieldType::U16)
            .field("max_version", FieldType::U16)
            .array("spec_version_hash", FieldType::U8, 8)
            .array("library_version_hash", FieldType::U8, 8),
    ];
    let schemas = schemas
        .into_iter()
        .map(|builder| builder.build().expect("fixture schema"));
    Arc::new(SchemaRegistry::from_schemas(schemas).expect("registry"))
}

/// Fresh instance of the named message with all fields at zero.
pub fn message(registry: &SchemaRegistry, name: &str) -> MessageInstance {
    let schema = registry
        .lookup_by_name(name)
        .unwrap_or_else(|| panic!("{name} not in fixture registry"));
    MessageInstance::new(schema.clone())
}

pub fn heartbeat(registry: &SchemaRegistry, custom_mode: u32) -> MessageInstance {
    message(registry, "HEARTBEAT")
        .with("type", 2u8)
        .unwrap()
        .with("autopilot", 3u8)
        .unwrap()
        .with("custom_mode", custom_mode)
        .unwrap()
        .with("system_status", 4u8)
        .unwrap()
        .with("mavlink_version", 3u8)
        .unwrap()
}

pub fn distance_sensor(registry: &SchemaRegistry, id: u8, current_cm: u16) -> MessageInstance {
    message(registry, "DISTANCE_SENSOR")
        .with("time_boot_ms", 123_456u32)
        .unwrap()
        .with("min_distance", 20u16)
        .unwrap()
        .with("max_distance", 700u16)
        .unwrap()
        .with("current_distance", current_cm)
        .unwrap()
        .with("id", id)
        .unwrap()
        .with("orientation", 25u8)
        .unwrap()
}

pub fn param_value(registry: &SchemaRegistry, name: &str, value: f32, index: u16) -> MessageInstance {
    message(registry, "PARAM_VALUE")
        .with("param_id", name)
        .unwrap()
        .with("param_value", value)
        .unwrap()
        .with("param_type", 9u8)
        .unwrap()
        .with("param_count", 1024u16)
        .unwrap()
        .with("param_index", index)
        .unwrap()
}

pub fn command_long(registry: &SchemaRegistry, command: u16, param1: f32) -> MessageInstance {
    message(registry, "COMMAND_LONG")
        .with("target_system", 1u8)
        .unwrap()
        .with("target_component", 1u8)
        .unwrap()
        .with("command", command)
        .unwrap()
        .with("param1", param1)
        .unwrap()
        .with("param7", -3.5f32)
        .unwrap()
}

/// One message of every fixture type with non-trivial field values.
pub fn sample_messages(registry: &SchemaRegistry) -> Vec<MessageInstance> {
    vec![
        heartbeat(registry, 0x0102_0304),
        param_value(registry, "SYSID_THISMAV", 1.0, 17),
        message(registry, "GPS_RAW_INT")
            .with("time_usec", 1_700_000_000_000_000u64)
            .unwrap()
            .with("fix_type", 3u8)
            .unwrap()
            .with("lat", 473_977_420i32)
            .unwrap()
            .with("lon", 85_455_940i32)
            .unwrap()
            .with("alt", -12_000i32)
            .unwrap()
            .with("satellites_visible", 14u8)
            .unwrap()
            .with("yaw", 35_999u16)
            .unwrap(),
        message(registry, "SCALED_PRESSURE")
            .with("time_boot_ms", 99u32)
            .unwrap()
            .with("press_abs", 1013.25f32)
            .unwrap()
            .with("temperature", -1250i16)
            .unwrap(),
        command_long(registry, 400, 1.0),
        distance_sensor(registry, 2, 153),
        message(registry, "STATUSTEXT")
            .with("severity", 6u8)
            .unwrap()
            .with("text", "EKF3 IMU0 is using GPS")
            .unwrap(),
        message(registry, "PROTOCOL_VERSION")
            .with("version", 200u16)
            .unwrap()
            .with("spec_version_hash", vec![1u8, 2, 3, 4, 5, 6, 7, 8])
            .unwrap(),
    ]
}
