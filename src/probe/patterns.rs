//! Bit patterns for data-integrity verification.
//!
//! The set deliberately includes all-zero, all-one, alternating, and
//! walking patterns so stuck, shorted, and crossed data lines all show up
//! as mismatches somewhere in the sweep.

/// Probe patterns, applied 32 bits at a time.
pub const PROBE_PATTERNS: [u32; 12] = [
    0xAA5555AA, 0x55AAAA55, 0x12345678, 0x87654321,
    0xDEADBEEF, 0xCAFEBABE, 0x00000000, 0xFFFFFFFF,
    0x0F0F0F0F, 0xF0F0F0F0, 0x33333333, 0xCCCCCCCC,
];

/// Fill `buf` with `pattern` repeated in little-endian 32-bit words.
pub fn fill(buf: &mut [u8], pattern: u32) {
    let bytes = pattern.to_le_bytes();
    for (i, b) in buf.iter_mut().enumerate() {
        *b = bytes[i % 4];
    }
}

/// True if `buf` holds exactly `pattern` repeated.
pub fn matches(buf: &[u8], pattern: u32) -> bool {
    let bytes = pattern.to_le_bytes();
    buf.iter().enumerate().all(|(i, b)| *b == bytes[i % 4])
}

/// Classify an observed word against the written (`a`) and DMA'd (`b`)
/// patterns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Observation {
    /// Saw the DMA value — coherent.
    Fresh,
    /// Saw the stale cached value.
    Stale,
    /// Saw neither — corruption, higher severity than staleness.
    Corrupt,
}

pub fn classify(observed: u32, a: u32, b: u32) -> Observation {
    if observed == b {
        Observation::Fresh
    } else if observed == a {
        Observation::Stale
    } else {
        Observation::Corrupt
    }
}
