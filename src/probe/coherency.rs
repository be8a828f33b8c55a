//! Stage 2: cache coherency.
//!
//! The question: with a writeback cache holding a line, does a device DMA
//! write to that line reach the CPU's next read? If the CPU observes the
//! stale cached value, every received packet on this machine would be at
//! risk of silent corruption — that is the failure mode this stage exists
//! to catch before traffic flows.

use log::{debug, error, info, warn};

use super::patterns::{self, Observation, PROBE_PATTERNS};
use super::{force_cache_load, read_word, write_window, ProbeDevice, PROBE_WINDOW};
use crate::dma::DmaRegion;
use crate::probe::profile::CoherencyResult;
use crate::time::{Deadline, Timer};

/// Number of word offsets sampled per pattern after the device write.
const SAMPLE_POINTS: usize = 8;

pub struct Stage2Outcome {
    pub result: CoherencyResult,
    pub corruption: bool,
}

/// Run Stage 2. Caller guarantees Stage 1 was `Functional` and the cache
/// is in writeback mode (a write-through cache is trivially coherent and
/// this stage is skipped).
pub fn run_stage2<D: ProbeDevice, T: Timer + ?Sized>(
    device: &mut D,
    timer: &T,
    scratch: &DmaRegion,
    budget_ms: u64,
) -> Stage2Outcome {
    info!("stage 2: probing cache coherency under DMA");

    let deadline = Deadline::after_ms(timer, budget_ms);
    let bus = scratch.bus_base();

    let mut stale = 0usize;
    let mut corrupt = 0usize;
    let mut timed_out = false;
    let mut src = [0u8; PROBE_WINDOW];

    for &pattern_a in PROBE_PATTERNS.iter() {
        if deadline.expired(timer) {
            warn!("stage 2: budget exhausted");
            timed_out = true;
            break;
        }

        let pattern_b = !pattern_a;

        // Write A, then pull it into the cache with reads. In writeback
        // mode the line is now valid (and possibly dirty) in cache.
        patterns::fill(&mut src, pattern_a);
        write_window(scratch, &src);
        force_cache_load(scratch, PROBE_WINDOW);

        // Device writes the complement underneath the cache.
        patterns::fill(&mut src, pattern_b);
        if let Err(e) = device.dma_write(bus, &src) {
            debug!("stage 2: dma_write incomplete ({})", e);
            timed_out = true;
            break;
        }

        // What does the CPU see now?
        for i in 0..SAMPLE_POINTS {
            let offset = i * (PROBE_WINDOW / SAMPLE_POINTS);
            let observed = read_word(scratch, offset);
            #[cfg(feature = "trace-probe")]
            log::trace!("stage 2: +{:#x} observed {:#010x}", offset, observed);
            match patterns::classify(observed, pattern_a, pattern_b) {
                Observation::Fresh => {}
                Observation::Stale => {
                    stale += 1;
                    debug!(
                        "stage 2: stale read at +{:#x} (saw {:#010x}, expected {:#010x})",
                        offset, observed, pattern_b
                    );
                }
                Observation::Corrupt => {
                    corrupt += 1;
                    error!(
                        "stage 2: corrupt read at +{:#x} ({:#010x} is neither {:#010x} nor {:#010x})",
                        offset, observed, pattern_a, pattern_b
                    );
                }
            }
        }
    }

    // Corruption outranks staleness, and both outrank a timeout: a
    // positively observed problem is never downgraded to Unknown.
    let result = if stale > 0 || corrupt > 0 {
        warn!(
            "stage 2: coherency problem ({} stale, {} corrupt observations)",
            stale, corrupt
        );
        CoherencyResult::Problem
    } else if timed_out {
        warn!("stage 2: incomplete, recording unknown");
        CoherencyResult::Unknown
    } else {
        info!("stage 2: coherency ok (all device writes observed)");
        CoherencyResult::Ok
    };

    Stage2Outcome {
        result,
        corruption: corrupt > 0,
    }
}
