//! Session Metrics
//!
//! Cumulative traffic and error counters for one session.
//!
//! Uses atomic counters so an observer holding the `Arc<Metrics>` can take
//! snapshots from another thread while the session keeps mutating them.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tracing::info;

/// Per-session metrics collector
#[derive(Debug)]
pub struct Metrics {
    /// Total frames packed. A frame counts once packed, whether or not the
    /// transport write that follows succeeds.
    pub packets_sent: AtomicU64,
    /// Total bytes packed
    pub bytes_sent: AtomicU64,
    /// Packed frames the transport failed to write
    pub send_errors: AtomicU64,
    /// Total messages produced by the parser, placeholders included
    pub packets_received: AtomicU64,
    /// Total bytes fed to the parser
    pub bytes_received: AtomicU64,
    /// Bad prefix bytes and rejected frames
    pub receive_errors: AtomicU64,
    /// Bad-data placeholders emitted in robust mode
    pub bad_data: AtomicU64,
    /// Well-formed frames with an unregistered id
    pub unknown_messages: AtomicU64,
    /// Frames rejected for a checksum mismatch
    pub checksum_failures: AtomicU64,
    /// Frames rejected by signature verification
    pub signature_failures: AtomicU64,
    start_time: Instant,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            packets_sent: AtomicU64::new(0),
            bytes_sent: AtomicU64::new(0),
            send_errors: AtomicU64::new(0),
            packets_received: AtomicU64::new(0),
            bytes_received: AtomicU64::new(0),
            receive_errors: AtomicU64::new(0),
            bad_data: AtomicU64::new(0),
            unknown_messages: AtomicU64::new(0),
            checksum_failures: AtomicU64::new(0),
            signature_failures: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    /// Record a frame sent
    pub fn packet_sent(&self, byte_count: u64) {
        self.packets_sent.fetch_add(1, Ordering::Relaxed);
        self.bytes_sent.fetch_add(byte_count, Ordering::Relaxed);
    }

    pub fn send_error(&self) {
        self.send_errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Record raw bytes arriving from the transport
    pub fn bytes_received(&self, byte_count: u64) {
        self.bytes_received.fetch_add(byte_count, Ordering::Relaxed);
    }

    /// Record a message (or placeholder) delivered by the parser
    pub fn packet_received(&self) {
        self.packets_received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn receive_error(&self) {
        self.receive_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn bad_data(&self) {
        self.bad_data.fetch_add(1, Ordering::Relaxed);
    }

    pub fn unknown_message(&self) {
        self.unknown_messages.fetch_add(1, Ordering::Relaxed);
    }

    pub fn checksum_failure(&self) {
        self.checksum_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn signature_failure(&self) {
        self.signature_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Get current metrics snapshot
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            packets_sent: self.packets_sent.load(Ordering::Relaxed),
            bytes_sent: self.bytes_sent.load(Ordering::Relaxed),
            send_errors: self.send_errors.load(Ordering::Relaxed),
            packets_received: self.packets_received.load(Ordering::Relaxed),
            bytes_received: self.bytes_received.load(Ordering::Relaxed),
            receive_errors: self.receive_errors.load(Ordering::Relaxed),
            bad_data: self.bad_data.load(Ordering::Relaxed),
            unknown_messages: self.unknown_messages.load(Ordering::Relaxed),
            checksum_failures: self.checksum_failures.load(Ordering::Relaxed),
            signature_failures: self.signature_failures.load(Ordering::Relaxed),
            uptime_seconds: self.start_time.elapsed().as_secs(),
        }
    }

    /// Log current metrics
    pub fn log_metrics(&self) {
        let snapshot = self.snapshot();
        info!(
            packets_sent = snapshot.packets_sent,
            bytes_sent = snapshot.bytes_sent,
            send_errors = snapshot.send_errors,
            packets_received = snapshot.packets_received,
            bytes_received = snapshot.bytes_received,
            receive_errors = snapshot.receive_errors,
            bad_data = snapshot.bad_data,
            unknown_messages = snapshot.unknown_messages,
            checksum_failures = snapshot.checksum_failures,
            signature_failures = snapshot.signature_failures,
            uptime_seconds = snapshot.uptime_seconds,
            "Session metrics snapshot"
        );
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of metrics at a point in time
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub packets_sent: u64,
    pub bytes_sent: u64,
    pub send_errors: u64,
    pub packets_received: u64,
    pub bytes_received: u64,
    pub receive_errors: u64,
    pub bad_data: u64,
    pub unknown_messages: u64,
    pub checksum_failures: u64,
    pub signature_failures: u64,
    pub uptime_seconds: u64,
}
