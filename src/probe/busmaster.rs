//! Stage 1: bus-master functionality.
//!
//! Proves the device can move correct bytes in both directions before any
//! cache question is asked. A data mismatch here means DMA is unusable on
//! this machine, full stop — no amount of cache management fixes a chipset
//! that corrupts bus-master transfers.

use log::{debug, error, info, warn};

use super::patterns::{self, PROBE_PATTERNS};
use super::{read_window, write_window, ProbeDevice, PROBE_WINDOW};
use crate::dma::DmaRegion;
use crate::error::ProbeError;
use crate::probe::profile::BusMasterResult;
use crate::time::{Deadline, Timer};

/// Run Stage 1 against the scratch region.
///
/// Every pattern is exercised in both directions: the device echoes back
/// what it DMA-read after the CPU wrote, and the CPU verifies what the
/// device DMA-wrote. All trials matching → `Functional`. Any byte-level
/// mismatch → `Broken`, immediately. Trials lost to timeouts alongside
/// clean ones → `Partial` (non-functional for tier selection, but the
/// distinction matters in the field diagnostics).
pub fn run_stage1<D: ProbeDevice, T: Timer + ?Sized>(
    device: &mut D,
    timer: &T,
    scratch: &DmaRegion,
    budget_ms: u64,
) -> BusMasterResult {
    info!("stage 1: probing bus-master functionality");

    let deadline = Deadline::after_ms(timer, budget_ms);
    let bus = scratch.bus_base();
    let total = PROBE_PATTERNS.len() * 2;
    let mut successes = 0usize;
    let mut incomplete = 0usize;

    let mut echo = [0u8; PROBE_WINDOW];
    let mut src = [0u8; PROBE_WINDOW];

    for &pattern in PROBE_PATTERNS.iter() {
        if deadline.expired(timer) {
            // Everything not yet attempted counts as incomplete, not just
            // the trial the deadline landed on.
            incomplete = total - successes;
            warn!(
                "stage 1: budget exhausted after {} trials, {} recorded as timeouts",
                successes, incomplete
            );
            break;
        }

        // CPU writes, device DMA-reads and echoes.
        patterns::fill(&mut src, pattern);
        write_window(scratch, &src);
        match device.dma_read(bus, &mut echo) {
            Ok(()) => {
                if patterns::matches(&echo, pattern) {
                    successes += 1;
                } else {
                    error!(
                        "stage 1: device observed wrong data for pattern {:#010x}",
                        pattern
                    );
                    return BusMasterResult::Broken;
                }
            }
            Err(e) => {
                debug!("stage 1: dma_read incomplete ({}) for {:#010x}", e, pattern);
                incomplete += 1;
                if matches!(e, ProbeError::Io) {
                    return BusMasterResult::Broken;
                }
            }
        }

        // Device DMA-writes the complement, CPU verifies.
        let inverse = !pattern;
        patterns::fill(&mut src, inverse);
        match device.dma_write(bus, &src) {
            Ok(()) => {
                read_window(scratch, &mut echo);
                if patterns::matches(&echo, inverse) {
                    successes += 1;
                } else {
                    error!(
                        "stage 1: CPU observed wrong data after device write {:#010x}",
                        inverse
                    );
                    return BusMasterResult::Broken;
                }
            }
            Err(e) => {
                debug!("stage 1: dma_write incomplete ({}) for {:#010x}", e, inverse);
                incomplete += 1;
                if matches!(e, ProbeError::Io) {
                    return BusMasterResult::Broken;
                }
            }
        }
    }

    if successes == total {
        info!("stage 1: bus master functional ({} trials)", total);
        BusMasterResult::Functional
    } else if successes > 0 {
        warn!(
            "stage 1: bus master partial ({}/{} trials, {} incomplete)",
            successes, total, incomplete
        );
        BusMasterResult::Partial
    } else {
        error!("stage 1: bus master broken (no trial completed)");
        BusMasterResult::Broken
    }
}
