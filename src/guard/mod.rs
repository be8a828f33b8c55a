//! Transfer guard.
//!
//! Wraps every DMA transfer with the selected tier's cache operation.
//! `post_transfer` is the only engine operation invoked from interrupt
//! context: both entry points take `&self`, never allocate, never block,
//! and complete in tier-dependent bounded time. Dispatch is a tagged
//! variant selected once at initialization — no runtime re-selection, no
//! fallible dynamic lookup on the hot path.
//!
//! Ordering is the guard's job, not the caller's: `pre_transfer` ends with
//! a full barrier, so by the time it returns every CPU write to the buffer
//! is visible to the device; `post_transfer` likewise completes before the
//! caller can observe its return, strictly before the CPU consumes a
//! received buffer.

pub mod backend;
pub mod coalesce;

pub use backend::{CacheBackend, X86CacheBackend};
pub use coalesce::FlushCoalescer;

use core::sync::atomic::{AtomicU64, Ordering};

use crate::dma::DmaBuffer;
use crate::policy::CacheTier;

/// Per-guard operation counters. Diagnostics only.
#[derive(Debug, Default)]
pub struct GuardStats {
    pub pre_ops: AtomicU64,
    pub post_ops: AtomicU64,
    pub line_flushes: AtomicU64,
    pub full_flushes: AtomicU64,
    pub deferred: AtomicU64,
}

/// Tier-parameterized cache guard around DMA transfers.
pub struct TransferGuard<B: CacheBackend> {
    tier: CacheTier,
    line_size: u16,
    backend: B,
    coalescer: FlushCoalescer,
    stats: GuardStats,
}

impl<B: CacheBackend> TransferGuard<B> {
    /// Build a guard for the selected tier.
    ///
    /// Does not touch hardware; the one-time `GlobalPolicyOverride`
    /// application happens in engine initialization where the consent is
    /// logged next to it.
    pub fn new(tier: CacheTier, line_size: u16, backend: B) -> Self {
        Self {
            tier,
            line_size,
            backend,
            coalescer: FlushCoalescer::new(),
            stats: GuardStats::default(),
        }
    }

    #[inline]
    pub fn tier(&self) -> CacheTier {
        self.tier
    }

    pub fn stats(&self) -> &GuardStats {
        &self.stats
    }

    /// Access the backend (platform hooks, extra diagnostics).
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Opt in to whole-cache flush coalescing (`FullFlush` tier only; a
    /// no-op otherwise). The caller takes on the batching contract: it
    /// must call [`flush_pending`](Self::flush_pending) at every batch
    /// boundary — after queueing a TX batch, before consuming an RX batch.
    pub fn enable_coalescing(&self, threshold: u32) {
        if self.tier == CacheTier::FullFlush {
            self.coalescer.set_threshold(threshold);
            self.coalescer.enable();
        }
    }

    /// Pre-transfer operation: make the buffer's bytes safe to hand to the
    /// device. Call before signaling the device, for both directions.
    pub fn pre_transfer(&self, buffer: &DmaBuffer) {
        debug_assert!(self.tier.dma_permitted(), "DMA transfer under Disabled tier");
        self.stats.pre_ops.fetch_add(1, Ordering::Relaxed);

        match self.tier {
            CacheTier::SurgicalFlush => {
                self.backend
                    .flush_lines(buffer.cpu_ptr(), buffer.size(), self.line_size);
                self.stats.line_flushes.fetch_add(1, Ordering::Relaxed);
            }
            CacheTier::FullFlush => self.full_flush_or_defer(),
            CacheTier::SoftwareBarrier => {
                self.backend
                    .touch_lines(buffer.cpu_ptr(), buffer.size(), self.line_size);
            }
            CacheTier::NoneNeeded | CacheTier::GlobalPolicyOverride | CacheTier::Disabled => {}
        }

        // All prior CPU writes visible before the doorbell, on every tier.
        self.backend.memory_barrier();
    }

    /// Post-transfer operation: make the device's bytes safe for the CPU
    /// to read. Call after completion, before consuming the buffer.
    /// Interrupt-safe.
    pub fn post_transfer(&self, buffer: &DmaBuffer) {
        debug_assert!(self.tier.dma_permitted(), "DMA transfer under Disabled tier");
        self.stats.post_ops.fetch_add(1, Ordering::Relaxed);

        self.backend.memory_barrier();

        match self.tier {
            CacheTier::SurgicalFlush => {
                // CLFLUSH both writes back and invalidates; post-side use
                // discards any line refetched during the transfer.
                self.backend
                    .flush_lines(buffer.cpu_ptr(), buffer.size(), self.line_size);
                self.stats.line_flushes.fetch_add(1, Ordering::Relaxed);
            }
            CacheTier::FullFlush => self.full_flush_or_defer(),
            CacheTier::SoftwareBarrier => {
                self.backend
                    .touch_lines(buffer.cpu_ptr(), buffer.size(), self.line_size);
            }
            CacheTier::NoneNeeded | CacheTier::GlobalPolicyOverride | CacheTier::Disabled => {}
        }
    }

    /// Drain deferred whole-cache flushes. Required at every batch
    /// boundary while coalescing is enabled; harmless otherwise.
    pub fn flush_pending(&self) {
        if self.coalescer.pending() > 0 {
            self.coalescer.drain();
            self.backend.full_flush();
            self.stats.full_flushes.fetch_add(1, Ordering::Relaxed);
        }
    }

    fn full_flush_or_defer(&self) {
        if self.coalescer.is_enabled() {
            self.stats.deferred.fetch_add(1, Ordering::Relaxed);
            if self.coalescer.defer() {
                self.coalescer.drain();
                self.backend.full_flush();
                self.stats.full_flushes.fetch_add(1, Ordering::Relaxed);
            }
        } else {
            self.backend.full_flush();
            self.stats.full_flushes.fetch_add(1, Ordering::Relaxed);
        }
    }
}
