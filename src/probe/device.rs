//! Probe-side device abstraction.
//!
//! The harness drives the NIC's loopback engine through this trait; it is
//! the only hardware the engine touches. Implementations must bound their
//! own hardware polling — a well-behaved impl returns
//! [`ProbeError::Timeout`] rather than spinning forever, and the harness
//! additionally brackets every sub-test with a wall-clock deadline so even
//! a late return is recorded conservatively.

use crate::error::ProbeError;

/// Device loopback operations used during coherency probing.
///
/// Bus addresses refer to the scratch region handed to the harness. Both
/// operations are synchronous: they return once the device has completed
/// the transfer (or failed).
pub trait ProbeDevice {
    /// Instruct the device to DMA-read `out.len()` bytes at `bus_addr`
    /// and deposit the bytes *it observed* into `out` (via its loopback
    /// FIFO). This is how the harness learns what the device actually saw,
    /// independent of what the CPU thinks memory holds.
    fn dma_read(&mut self, bus_addr: u64, out: &mut [u8]) -> Result<(), ProbeError>;

    /// Instruct the device to DMA-write `data` into memory at `bus_addr`.
    fn dma_write(&mut self, bus_addr: u64, data: &[u8]) -> Result<(), ProbeError>;
}
