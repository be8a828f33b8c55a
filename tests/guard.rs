//! Transfer guard dispatch and flush coalescing.

mod common;

use common::{RecordingBackend, TestRam};
use dma_coherency::{
    BufferPool, CacheTier, DmaBuffer, MemoryClass, PoolId, TransferGuard,
};

fn test_buffer(ram: &mut TestRam) -> (BufferPool, DmaBuffer) {
    let region = ram.region(MemoryClass::DmaCapable);
    let mut pool = BufferPool::new(PoolId(0), region, 16, 16 * 1024 * 1024).unwrap();
    let buf = pool.allocate(1536, 16).unwrap();
    (pool, buf)
}

#[test]
fn surgical_tier_flushes_lines_both_sides() {
    let mut ram = TestRam::new(8 * 1024, 0x4000);
    let (_pool, buf) = test_buffer(&mut ram);
    let guard = TransferGuard::new(CacheTier::SurgicalFlush, 32, RecordingBackend::default());

    guard.pre_transfer(&buf);
    guard.post_transfer(&buf);

    let b = guard.stats();
    assert_eq!(b.line_flushes.load(core::sync::atomic::Ordering::Relaxed), 2);
    assert_eq!(b.full_flushes.load(core::sync::atomic::Ordering::Relaxed), 0);
}

#[test]
fn every_tier_issues_memory_barriers() {
    let mut ram = TestRam::new(8 * 1024, 0x4000);
    let (_pool, buf) = test_buffer(&mut ram);

    for tier in [
        CacheTier::SurgicalFlush,
        CacheTier::FullFlush,
        CacheTier::SoftwareBarrier,
        CacheTier::GlobalPolicyOverride,
        CacheTier::NoneNeeded,
    ] {
        let guard = TransferGuard::new(tier, 32, RecordingBackend::default());
        guard.pre_transfer(&buf);
        guard.post_transfer(&buf);
        // One barrier before the doorbell, one after completion.
        assert_eq!(guard.backend().barriers.get(), 2, "tier {}", tier);
    }
}

#[test]
fn software_barrier_tier_touches_lines_instead_of_flushing() {
    let mut ram = TestRam::new(8 * 1024, 0x4000);
    let (_pool, buf) = test_buffer(&mut ram);
    let guard = TransferGuard::new(CacheTier::SoftwareBarrier, 16, RecordingBackend::default());

    guard.pre_transfer(&buf);
    guard.post_transfer(&buf);

    assert_eq!(guard.backend().touches.get(), 2);
    assert_eq!(guard.backend().full_flushes.get(), 0);
    assert_eq!(guard.backend().line_flushes.get(), 0);
}

#[test]
fn none_needed_tier_does_no_cache_work() {
    let mut ram = TestRam::new(8 * 1024, 0x4000);
    let (_pool, buf) = test_buffer(&mut ram);
    let guard = TransferGuard::new(CacheTier::NoneNeeded, 64, RecordingBackend::default());

    guard.pre_transfer(&buf);
    guard.post_transfer(&buf);

    assert_eq!(guard.backend().line_flushes.get(), 0);
    assert_eq!(guard.backend().full_flushes.get(), 0);
    assert_eq!(guard.backend().touches.get(), 0);
}

#[test]
fn full_flush_without_coalescing_flushes_every_operation() {
    let mut ram = TestRam::new(8 * 1024, 0x4000);
    let (_pool, buf) = test_buffer(&mut ram);
    let guard = TransferGuard::new(CacheTier::FullFlush, 16, RecordingBackend::default());

    guard.pre_transfer(&buf);
    guard.post_transfer(&buf);
    guard.pre_transfer(&buf);

    assert_eq!(guard.backend().full_flushes.get(), 3);
}

#[test]
fn coalescing_defers_until_threshold_then_flushes_once() {
    let mut ram = TestRam::new(8 * 1024, 0x4000);
    let (_pool, buf) = test_buffer(&mut ram);
    let guard = TransferGuard::new(CacheTier::FullFlush, 16, RecordingBackend::default());
    guard.enable_coalescing(4);

    guard.pre_transfer(&buf);
    guard.pre_transfer(&buf);
    guard.pre_transfer(&buf);
    assert_eq!(guard.backend().full_flushes.get(), 0);

    guard.pre_transfer(&buf);
    assert_eq!(guard.backend().full_flushes.get(), 1);
}

#[test]
fn flush_pending_drains_a_partial_batch() {
    let mut ram = TestRam::new(8 * 1024, 0x4000);
    let (_pool, buf) = test_buffer(&mut ram);
    let guard = TransferGuard::new(CacheTier::FullFlush, 16, RecordingBackend::default());
    guard.enable_coalescing(8);

    guard.pre_transfer(&buf);
    guard.post_transfer(&buf);
    assert_eq!(guard.backend().full_flushes.get(), 0);

    guard.flush_pending();
    assert_eq!(guard.backend().full_flushes.get(), 1);

    // Nothing pending: a second drain is a no-op.
    guard.flush_pending();
    assert_eq!(guard.backend().full_flushes.get(), 1);
}

#[test]
fn coalescing_is_ignored_on_other_tiers() {
    let mut ram = TestRam::new(8 * 1024, 0x4000);
    let (_pool, buf) = test_buffer(&mut ram);
    let guard = TransferGuard::new(CacheTier::SurgicalFlush, 32, RecordingBackend::default());
    guard.enable_coalescing(4);

    guard.pre_transfer(&buf);
    assert_eq!(guard.backend().line_flushes.get(), 1);
    guard.flush_pending();
    assert_eq!(guard.backend().full_flushes.get(), 0);
}
