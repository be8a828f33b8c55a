//! Empirical coherency profile.
//!
//! Produced once per boot by the harness, immutable thereafter. Everything
//! downstream — tier selection, the transfer guard, the diagnostic record —
//! reads this and nothing else about cache behavior.

use core::fmt;

/// Stage 1 outcome: does bus-master DMA move correct bytes at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusMasterResult {
    /// Every round-trip matched exactly, both directions.
    Functional,
    /// Some trials completed correctly but others timed out. Treated as
    /// non-functional for tier selection.
    Partial,
    /// A data mismatch (or total failure). Terminal: no further stage runs.
    Broken,
}

/// Stage 2 outcome: does a writeback cache hide device writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoherencyResult {
    /// CPU observed every device write.
    Ok,
    /// Stale or corrupt data observed; cache management is required.
    Problem,
    /// Test could not complete (timeout, no scratch). Resolved
    /// conservatively, never escalated to a failure.
    Unknown,
}

/// Stage 3 outcome: does the chipset snoop bus-master traffic.
///
/// Only meaningful when `coherency == Ok` and the cache is writeback; it
/// is never used to excuse a detected `Problem`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnoopingResult {
    /// Majority of sub-tests detected snooping.
    Full,
    /// Some sub-tests detected snooping. Not trusted.
    Partial,
    /// No snooping detected.
    None,
    /// Sub-tests could not complete, or the stage did not run.
    Unknown,
}

impl fmt::Display for BusMasterResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Functional => "functional",
            Self::Partial => "partial",
            Self::Broken => "broken",
        })
    }
}

impl fmt::Display for CoherencyResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Ok => "ok",
            Self::Problem => "problem",
            Self::Unknown => "unknown",
        })
    }
}

impl fmt::Display for SnoopingResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Full => "full",
            Self::Partial => "partial",
            Self::None => "none",
            Self::Unknown => "unknown",
        })
    }
}

/// The three stage results plus the cache policy observed at test time.
///
/// `confidence` is stamped by the tier-selection policy during
/// initialization; it is informational and never feeds back into any
/// decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CoherencyProfile {
    pub bus_master: BusMasterResult,
    pub coherency: CoherencyResult,
    pub snooping: SnoopingResult,
    pub cache_enabled: bool,
    pub write_back: bool,
    pub confidence: u8,
    /// Stage 2 saw a value that was neither the written nor the DMA'd
    /// pattern. Diagnostics only; already folded into `coherency`.
    pub corruption_detected: bool,
    /// Wall-clock microseconds the harness spent across all stages.
    /// Diagnostics only.
    pub elapsed_us: u64,
}

impl CoherencyProfile {
    /// Starting point before any stage has run.
    pub const fn unknown(cache_enabled: bool, write_back: bool) -> Self {
        Self {
            bus_master: BusMasterResult::Broken,
            coherency: CoherencyResult::Unknown,
            snooping: SnoopingResult::Unknown,
            cache_enabled,
            write_back,
            confidence: 0,
            corruption_detected: false,
            elapsed_us: 0,
        }
    }

    /// Snooping result gated by the consultation invariant: anything other
    /// than a clean Stage 2 yields `Unknown` here regardless of what
    /// Stage 3 recorded.
    pub fn consultable_snooping(&self) -> SnoopingResult {
        if self.coherency == CoherencyResult::Ok && self.write_back {
            self.snooping
        } else {
            SnoopingResult::Unknown
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snooping_not_consultable_on_problem() {
        let mut p = CoherencyProfile::unknown(true, true);
        p.coherency = CoherencyResult::Problem;
        p.snooping = SnoopingResult::Full;
        assert_eq!(p.consultable_snooping(), SnoopingResult::Unknown);

        p.coherency = CoherencyResult::Ok;
        assert_eq!(p.consultable_snooping(), SnoopingResult::Full);
    }
}
