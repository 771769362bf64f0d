//! # Utility Modules
//!
//! Supporting utilities shared by the protocol layer.
//!
//! ## Components
//! - **Replay Cache**: bounded per-stream timestamp table for signature replay protection
//! - **Metrics**: per-session atomic traffic and error counters
//! - **Logging**: `tracing-subscriber` setup driven by the logging configuration

pub mod logging;
pub mod metrics;
pub mod replay_cache;

pub use replay_cache::{StreamKey, StreamTimestamps};
