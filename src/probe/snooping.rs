//! Stage 3: hardware snooping detection.
//!
//! Stage 2 proving coherency *held* does not say why. If the chipset
//! snoops bus-master traffic, no per-transfer cache work is ever needed;
//! if the result was marginal luck, trusting it would be a silent
//! corruption bug waiting for traffic patterns the probe didn't produce.
//! Four independent sub-tests each vote; only a majority earns `Full`.

use log::{debug, info, warn};

use super::patterns;
use super::{force_cache_load_at, read_word_at, write_at, ProbeDevice};
use crate::dma::DmaRegion;
use crate::error::ProbeError;
use crate::probe::profile::SnoopingResult;
use crate::time::{Deadline, Timer};

/// A snooped line refill must come back in cache-hit time. Reads slower
/// than this after a DMA write mean the line was served from memory the
/// long way (or not invalidated at all).
const SNOOP_FAST_READ_US: u64 = 10;

/// Run Stage 3. Caller guarantees Stage 2 returned `Ok` on a writeback
/// cache.
pub fn run_stage3<D: ProbeDevice, T: Timer + ?Sized>(
    device: &mut D,
    timer: &T,
    scratch: &DmaRegion,
    line_size: u16,
    budget_ms: u64,
) -> SnoopingResult {
    info!("stage 3: probing hardware snooping");

    let deadline = Deadline::after_ms(timer, budget_ms);
    let line = line_size as usize;

    // Disjoint windows so one sub-test's lines never alias another's.
    let sub_tests: [(&str, usize, usize); 3] = [
        ("single-line", 0, line),
        ("multi-line", 1024, line * 4),
        ("invalidation-timing", 2048, 1024),
    ];

    let mut votes = 0usize;
    let mut total = 0usize;

    for (name, offset, len) in sub_tests {
        if deadline.expired(timer) {
            warn!("stage 3: budget exhausted, recording unknown");
            return SnoopingResult::Unknown;
        }
        total += 1;
        match snoop_update_test(device, timer, scratch, offset, len) {
            Ok(true) => {
                votes += 1;
                debug!("stage 3: {} snooping detected", name);
            }
            Ok(false) => debug!("stage 3: {} no snooping", name),
            Err(e) => {
                warn!("stage 3: {} incomplete ({}), recording unknown", name, e);
                return SnoopingResult::Unknown;
            }
        }
    }

    // Write-back extraction: CPU-dirty lines must be visible to a device
    // read without an explicit flush.
    total += 1;
    if deadline.expired(timer) {
        warn!("stage 3: budget exhausted, recording unknown");
        return SnoopingResult::Unknown;
    }
    match dirty_line_test(device, scratch, 3072, line * 4) {
        Ok(true) => {
            votes += 1;
            debug!("stage 3: write-back snooping detected");
        }
        Ok(false) => debug!("stage 3: no write-back snooping"),
        Err(e) => {
            warn!("stage 3: write-back sub-test incomplete ({})", e);
            return SnoopingResult::Unknown;
        }
    }

    let result = if votes * 2 > total {
        SnoopingResult::Full
    } else if votes > 0 {
        SnoopingResult::Partial
    } else {
        SnoopingResult::None
    };
    info!("stage 3: snooping {} ({}/{} sub-tests)", result, votes, total);
    result
}

/// Cache a known pattern, have the device DMA-write its complement, then
/// time the CPU's re-read. Snooping means the new value arrives in
/// cache-hit time.
fn snoop_update_test<D: ProbeDevice, T: Timer + ?Sized>(
    device: &mut D,
    timer: &T,
    scratch: &DmaRegion,
    offset: usize,
    len: usize,
) -> Result<bool, ProbeError> {
    let a: u32 = 0xA5C3_5A3C;
    let b: u32 = !a;

    let mut src = [0u8; 1024];
    let window = &mut src[..len.min(1024)];

    patterns::fill(window, a);
    write_at(scratch, offset, window);
    force_cache_load_at(scratch, offset, window.len());

    patterns::fill(window, b);
    device.dma_write(scratch.bus_at(offset), window)?;

    let t0 = timer.now();
    let observed = read_word_at(scratch, offset);
    let read_us = timer.ticks_to_us(timer.now().since(t0));

    #[cfg(feature = "trace-probe")]
    log::trace!(
        "stage 3: +{:#x} observed {:#010x} in {} us",
        offset,
        observed,
        read_us
    );

    Ok(observed == b && read_us <= SNOOP_FAST_READ_US)
}

/// Dirty lines in cache, then ask the device what memory holds. With
/// write-back snooping the device observes the CPU's data without a flush.
fn dirty_line_test<D: ProbeDevice>(
    device: &mut D,
    scratch: &DmaRegion,
    offset: usize,
    len: usize,
) -> Result<bool, ProbeError> {
    let c: u32 = 0xD1A7_BEEF;

    let mut src = [0u8; 256];
    let window_len = len.min(256);
    patterns::fill(&mut src[..window_len], c);
    write_at(scratch, offset, &src[..window_len]);

    let mut echo = [0u8; 256];
    device.dma_read(scratch.bus_at(offset), &mut echo[..window_len])?;

    Ok(patterns::matches(&echo[..window_len], c))
}
