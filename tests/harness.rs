//! Three-stage harness behavior against a controllable loopback device.

mod common;

use common::{MockNic, TestRam, TestTimer};
use dma_coherency::{
    BusMasterResult, CoherencyHarness, CoherencyResult, CpuCaps, CpuClass, DmaRegion, MemoryClass,
    ProbeError, SnoopingResult, PROBE_BUFFER_SIZE,
};

fn writeback_caps() -> CpuCaps {
    CpuCaps::CACHE_ENABLED | CpuCaps::WRITE_BACK | CpuCaps::SURGICAL_FLUSH | CpuCaps::FULL_FLUSH
}

fn run(
    nic: &mut MockNic,
    timer: &TestTimer,
    scratch: DmaRegion,
    caps: CpuCaps,
) -> dma_coherency::CoherencyProfile {
    CoherencyHarness::new(nic, timer, scratch, caps, CpuClass::Pentium).run()
}

// Stage 1 ops per run: one dma_read and one dma_write per pattern.
const STAGE1_WRITES: usize = 12;

#[test]
fn coherent_device_full_snooping() {
    let mut ram = TestRam::new(PROBE_BUFFER_SIZE, 0x8000);
    let mut nic = MockNic::new(&mut ram);
    let timer = TestTimer::new();
    let scratch = ram.region(MemoryClass::DmaCapable);

    let profile = run(&mut nic, &timer, scratch, writeback_caps());

    assert_eq!(profile.bus_master, BusMasterResult::Functional);
    assert_eq!(profile.coherency, CoherencyResult::Ok);
    assert_eq!(profile.snooping, SnoopingResult::Full);
    assert!(!profile.corruption_detected);
    assert!(profile.elapsed_us > 0);
}

#[test]
fn stale_cache_is_a_coherency_problem() {
    let mut ram = TestRam::new(PROBE_BUFFER_SIZE, 0x8000);
    let mut nic = MockNic::new(&mut ram);
    // Stage 1 completes coherently, then device writes stop reaching
    // CPU-visible memory.
    nic.coherent_writes_before_stale = Some(STAGE1_WRITES);
    let timer = TestTimer::new();
    let scratch = ram.region(MemoryClass::DmaCapable);

    let profile = run(&mut nic, &timer, scratch, writeback_caps());

    assert_eq!(profile.bus_master, BusMasterResult::Functional);
    assert_eq!(profile.coherency, CoherencyResult::Problem);
    assert!(!profile.corruption_detected);
    // Stage 3 never runs after a failed Stage 2.
    assert_eq!(profile.snooping, SnoopingResult::Unknown);
}

#[test]
fn neither_old_nor_new_data_is_corruption() {
    let mut ram = TestRam::new(PROBE_BUFFER_SIZE, 0x8000);
    let mut nic = MockNic::new(&mut ram);
    nic.coherent_writes_before_stale = Some(STAGE1_WRITES);
    nic.corrupt_instead_of_stale = true;
    let timer = TestTimer::new();
    let scratch = ram.region(MemoryClass::DmaCapable);

    let profile = run(&mut nic, &timer, scratch, writeback_caps());

    assert_eq!(profile.coherency, CoherencyResult::Problem);
    assert!(profile.corruption_detected);
}

#[test]
fn wrong_bytes_mean_broken_bus_master() {
    let mut ram = TestRam::new(PROBE_BUFFER_SIZE, 0x8000);
    let mut nic = MockNic::new(&mut ram);
    nic.echo_corrupt = true;
    let timer = TestTimer::new();
    let scratch = ram.region(MemoryClass::DmaCapable);

    let profile = run(&mut nic, &timer, scratch, writeback_caps());

    assert_eq!(profile.bus_master, BusMasterResult::Broken);
    // Later stages never ran.
    assert_eq!(profile.coherency, CoherencyResult::Unknown);
    assert_eq!(profile.snooping, SnoopingResult::Unknown);
}

#[test]
fn device_timeouts_without_any_success_are_broken() {
    let mut ram = TestRam::new(PROBE_BUFFER_SIZE, 0x8000);
    let mut nic = MockNic::new(&mut ram);
    nic.fail_from_op = Some((0, ProbeError::Timeout));
    let timer = TestTimer::new();
    let scratch = ram.region(MemoryClass::DmaCapable);

    let profile = run(&mut nic, &timer, scratch, writeback_caps());

    assert_eq!(profile.bus_master, BusMasterResult::Broken);
}

#[test]
fn budget_exhaustion_mid_stage_is_partial() {
    let mut ram = TestRam::new(PROBE_BUFFER_SIZE, 0x8000);
    let mut nic = MockNic::new(&mut ram);
    // Each timer read burns 40 ms of the 100 ms Stage 1 budget: a couple
    // of patterns complete cleanly, then the deadline trips.
    let timer = TestTimer::with_step(40_000);
    let scratch = ram.region(MemoryClass::DmaCapable);

    let profile = run(&mut nic, &timer, scratch, writeback_caps());

    assert_eq!(profile.bus_master, BusMasterResult::Partial);
}

#[test]
fn stage2_device_failure_is_unknown_not_problem() {
    let mut ram = TestRam::new(PROBE_BUFFER_SIZE, 0x8000);
    let mut nic = MockNic::new(&mut ram);
    // Stage 1 needs 24 clean operations; the first Stage 2 write fails.
    nic.fail_from_op = Some((24, ProbeError::Timeout));
    let timer = TestTimer::new();
    let scratch = ram.region(MemoryClass::DmaCapable);

    let profile = run(&mut nic, &timer, scratch, writeback_caps());

    assert_eq!(profile.bus_master, BusMasterResult::Functional);
    assert_eq!(profile.coherency, CoherencyResult::Unknown);
}

#[test]
fn stage3_device_failure_is_unknown() {
    let mut ram = TestRam::new(PROBE_BUFFER_SIZE, 0x8000);
    let mut nic = MockNic::new(&mut ram);
    // Stages 1 and 2 need 36 clean operations; Stage 3's first does not
    // complete.
    nic.fail_from_op = Some((36, ProbeError::NotReady));
    let timer = TestTimer::new();
    let scratch = ram.region(MemoryClass::DmaCapable);

    let profile = run(&mut nic, &timer, scratch, writeback_caps());

    assert_eq!(profile.coherency, CoherencyResult::Ok);
    assert_eq!(profile.snooping, SnoopingResult::Unknown);
}

#[test]
fn slow_post_dma_reads_demote_snooping() {
    let mut ram = TestRam::new(PROBE_BUFFER_SIZE, 0x8000);
    let mut nic = MockNic::new(&mut ram);
    // 20 µs per timer read: every timed re-read looks like a memory-speed
    // miss, but the dirty-line sub-test still passes on a coherent device.
    let timer = TestTimer::with_step(20);
    let scratch = ram.region(MemoryClass::DmaCapable);

    let profile = run(&mut nic, &timer, scratch, writeback_caps());

    assert_eq!(profile.bus_master, BusMasterResult::Functional);
    assert_eq!(profile.coherency, CoherencyResult::Ok);
    assert_eq!(profile.snooping, SnoopingResult::Partial);
}

#[test]
fn write_through_cache_skips_stages_two_and_three() {
    let mut ram = TestRam::new(PROBE_BUFFER_SIZE, 0x8000);
    let mut nic = MockNic::new(&mut ram);
    let timer = TestTimer::new();
    let scratch = ram.region(MemoryClass::DmaCapable);

    let caps = CpuCaps::CACHE_ENABLED | CpuCaps::FULL_FLUSH;
    let profile = run(&mut nic, &timer, scratch, caps);

    assert_eq!(profile.coherency, CoherencyResult::Ok);
    assert_eq!(profile.snooping, SnoopingResult::Unknown);
    assert!(!profile.write_back);
    // Only Stage 1 talked to the device.
    assert_eq!(nic.writes_seen, STAGE1_WRITES);
}

#[test]
fn undersized_scratch_records_broken() {
    let mut ram = TestRam::new(512, 0x8000);
    let mut nic = MockNic::new(&mut ram);
    let timer = TestTimer::new();
    let scratch = ram.region(MemoryClass::DmaCapable);

    let profile = run(&mut nic, &timer, scratch, writeback_caps());

    assert_eq!(profile.bus_master, BusMasterResult::Broken);
    assert_eq!(nic.writes_seen, 0);
}

#[test]
fn staging_scratch_is_rejected() {
    let mut ram = TestRam::new(PROBE_BUFFER_SIZE, 0x8000);
    let mut nic = MockNic::new(&mut ram);
    let timer = TestTimer::new();
    let scratch = ram.region(MemoryClass::StagingOnly);

    let profile = run(&mut nic, &timer, scratch, writeback_caps());

    assert_eq!(profile.bus_master, BusMasterResult::Broken);
    assert_eq!(nic.writes_seen, 0);
}

#[test]
fn marginal_snooping_is_not_consultable_after_problem() {
    let mut ram = TestRam::new(PROBE_BUFFER_SIZE, 0x8000);
    let mut nic = MockNic::new(&mut ram);
    nic.coherent_writes_before_stale = Some(STAGE1_WRITES);
    let timer = TestTimer::new();
    let scratch = ram.region(MemoryClass::DmaCapable);

    let profile = run(&mut nic, &timer, scratch, writeback_caps());

    assert_eq!(profile.consultable_snooping(), SnoopingResult::Unknown);
}
