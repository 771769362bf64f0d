//! Resynchronizing frame splitter.
//!
//! [`StreamParser`] accumulates arbitrarily chunked input and cuts it into
//! candidate frames. It only looks at the first three bytes of a frame
//! (magic, payload length, incompatible flags) to learn how long the frame is;
//! everything else is left to [`decode_frame`](super::decode::decode_frame).
//!
//! Slicing is zero-copy: each frame is split off the front of the internal
//! `BytesMut` and frozen.

use crate::core::header::{
    WireVersion, CHECKSUM_LEN, HEADER_LEN_V1, IFLAG_SIGNED, SIGNATURE_BLOCK_LEN,
};
use bytes::{Bytes, BytesMut};

/// Smallest possible frame: V1 header, empty payload, checksum
pub const MIN_FRAME_LEN: usize = HEADER_LEN_V1 + CHECKSUM_LEN;

/// Capacity above which an emptied buffer is reallocated instead of reused
const RETAINED_CAPACITY: usize = 4096;

/// One step of progress through the buffered input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseStep {
    /// Nothing more can be produced until more bytes arrive
    NeedMore,
    /// A byte that cannot start a frame was consumed. `first_in_run` is false
    /// while still inside the same contiguous run of bad bytes.
    BadPrefix { byte: u8, first_in_run: bool },
    /// A complete candidate frame, exactly as long as its header announces
    Frame(Bytes),
}

/// Frame splitter state: buffer, expected-length hint and the bad-run flag.
#[derive(Debug)]
pub struct StreamParser {
    buf: BytesMut,
    expected_length: usize,
    have_prefix_error: bool,
}

impl StreamParser {
    pub fn new() -> Self {
        Self {
            buf: BytesMut::new(),
            expected_length: MIN_FRAME_LEN,
            have_prefix_error: false,
        }
    }

    /// Append newly received bytes.
    pub fn push(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Bytes buffered but not yet consumed.
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    /// How many more bytes the next stage needs; at least 1.
    pub fn bytes_needed(&self) -> usize {
        self.expected_length.saturating_sub(self.buf.len()).max(1)
    }

    /// Drop all buffered input and forget any bad-prefix run.
    pub fn reset(&mut self) {
        self.buf = BytesMut::new();
        self.expected_length = MIN_FRAME_LEN;
        self.have_prefix_error = false;
    }

    /// Advance over the buffered input by at most one frame or one bad byte.
    pub fn next_step(&mut self) -> ParseStep {
        let Some(&first) = self.buf.first() else {
            return ParseStep::NeedMore;
        };

        let Some(version) = WireVersion::from_magic(first) else {
            let _ = self.buf.split_to(1);
            self.expected_length = MIN_FRAME_LEN;
            let first_in_run = !self.have_prefix_error;
            self.have_prefix_error = true;
            self.release_if_drained();
            return ParseStep::BadPrefix {
                byte: first,
                first_in_run,
            };
        };
        self.have_prefix_error = false;

        if self.buf.len() >= 3 {
            let payload_len = self.buf[1] as usize;
            let signed = version == WireVersion::V2 && self.buf[2] & IFLAG_SIGNED != 0;
            self.expected_length = version.header_len()
                + payload_len
                + CHECKSUM_LEN
                + if signed { SIGNATURE_BLOCK_LEN } else { 0 };
        }

        if self.buf.len() >= 3 && self.buf.len() >= self.expected_length {
            let frame = self.buf.split_to(self.expected_length).freeze();
            self.expected_length = MIN_FRAME_LEN;
            self.release_if_drained();
            return ParseStep::Frame(frame);
        }

        ParseStep::NeedMore
    }

    fn release_if_drained(&mut self) {
        if self.buf.is_empty() && self.buf.capacity() > RETAINED_CAPACITY {
            self.buf = BytesMut::new();
        }
    }
}

impl Default for StreamParser {
    fn default() -> Self {
        Self::new()
    }
}
