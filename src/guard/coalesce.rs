//! Whole-cache flush coalescing.
//!
//! A full flush per small packet would dominate the hot path on `FullFlush`
//! systems. When the driver processes transfers in batches it can opt in
//! to coalescing: the guard counts deferred operations and the driver
//! drains them with one flush at the batch boundary. Opt-in only — with
//! coalescing off, every transfer gets its own flush and the per-transfer
//! ordering guarantee needs no caller discipline.

use core::sync::atomic::{AtomicBool, AtomicU32, Ordering};

/// Default number of operations deferred before a flush is forced.
pub const DEFAULT_FLUSH_THRESHOLD: u32 = 8;
pub const MIN_FLUSH_THRESHOLD: u32 = 1;
pub const MAX_FLUSH_THRESHOLD: u32 = 32;

/// Deferred-flush bookkeeping. All state is atomic; usable from interrupt
/// context.
pub struct FlushCoalescer {
    enabled: AtomicBool,
    pending: AtomicU32,
    threshold: AtomicU32,
}

impl FlushCoalescer {
    pub const fn new() -> Self {
        Self {
            enabled: AtomicBool::new(false),
            pending: AtomicU32::new(0),
            threshold: AtomicU32::new(DEFAULT_FLUSH_THRESHOLD),
        }
    }

    pub fn enable(&self) {
        self.enabled.store(true, Ordering::Release);
    }

    pub fn disable(&self) {
        self.enabled.store(false, Ordering::Release);
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    /// Clamp and set the deferral threshold.
    pub fn set_threshold(&self, threshold: u32) {
        let t = threshold.clamp(MIN_FLUSH_THRESHOLD, MAX_FLUSH_THRESHOLD);
        self.threshold.store(t, Ordering::Release);
    }

    /// Record one deferred operation. Returns true when the threshold is
    /// reached and the caller must flush now.
    pub fn defer(&self) -> bool {
        let pending = self.pending.fetch_add(1, Ordering::AcqRel) + 1;
        pending >= self.threshold.load(Ordering::Acquire)
    }

    /// Number of operations deferred since the last drain.
    pub fn pending(&self) -> u32 {
        self.pending.load(Ordering::Acquire)
    }

    /// Mark all deferred operations as drained.
    pub fn drain(&self) {
        self.pending.store(0, Ordering::Release);
    }
}

impl Default for FlushCoalescer {
    fn default() -> Self {
        Self::new()
    }
}
