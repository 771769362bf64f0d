//! X25 frame checksum.
//!
//! The register starts at 0xFFFF, is reflected, and has no final XOR, which is
//! the CRC-16/MCRF4XX parameter set. Frame checksums cover every byte after
//! the magic marker through the end of the payload, followed by one extra
//! per-message seed byte (`crc_extra`).

use crc::{Crc, Digest, CRC_16_MCRF4XX};

static X25: Crc<u16> = Crc::<u16>::new(&CRC_16_MCRF4XX);

/// Stateful X25 accumulator.
#[derive(Clone)]
pub struct X25Crc {
    digest: Digest<'static, u16>,
}

impl X25Crc {
    pub fn new() -> Self {
        Self {
            digest: X25.digest(),
        }
    }

    pub fn accumulate(&mut self, bytes: &[u8]) {
        self.digest.update(bytes);
    }

    /// Accumulate `bytes`, then the seed byte as if it followed them.
    pub fn accumulate_with_seed(&mut self, bytes: &[u8], seed: u8) {
        self.digest.update(bytes);
        self.digest.update(&[seed]);
    }

    /// Current register value. The accumulator stays usable afterwards.
    pub fn value(&self) -> u16 {
        self.digest.clone().finalize()
    }
}

impl Default for X25Crc {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for X25Crc {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "X25Crc(0x{:04x})", self.value())
    }
}

/// Checksum of a frame: `covered` is header-without-magic plus payload.
#[inline]
pub fn frame_checksum(covered: &[u8], seed: u8) -> u16 {
    let mut crc = X25Crc::new();
    crc.accumulate_with_seed(covered, seed);
    crc.value()
}
