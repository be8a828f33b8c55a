//! Tier selection policy.
//!
//! A pure function from `(profile, cpu_caps, consent)` to
//! `(tier, confidence)`. Nothing here touches hardware or global state;
//! determinism is a tested property. The one hard rule that overrides
//! every performance consideration: global state is never silently
//! degraded — `GlobalPolicyOverride` requires explicit consent, and a
//! marginal coherency result is never trusted.

pub mod tier;

pub use tier::CacheTier;

use log::info;

use crate::caps::{CpuCaps, OverrideConsent};
use crate::probe::{BusMasterResult, CoherencyProfile, CoherencyResult, SnoopingResult};

/// Confidence penalties. Informational only — confidence never alters the
/// tier decision.
const PENALTY_BUS_PARTIAL: u8 = 40;
const PENALTY_COHERENCY_PROBLEM: u8 = 10;
const PENALTY_COHERENCY_UNKNOWN: u8 = 25;
const PENALTY_SNOOPING_PARTIAL: u8 = 10;
const PENALTY_SNOOPING_UNKNOWN: u8 = 15;
const PENALTY_NO_FLUSH_INSTRUCTION: u8 = 10;
const PENALTY_CORRUPTION: u8 = 20;

/// Outcome of tier selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TierDecision {
    pub tier: CacheTier,
    /// 0-100. Diagnostics only.
    pub confidence: u8,
}

/// Select the cache-management tier for this boot.
///
/// Decision order:
/// 1. Bus master not `Functional` → `Disabled`.
/// 2. Coherency `Problem` or `Unknown` → cheapest management the CPU
///    supports: `SurgicalFlush` > `FullFlush` > `SoftwareBarrier`.
///    `GlobalPolicyOverride` is never chosen here automatically — only
///    when the CPU supports neither flush instruction *and* consent was
///    explicitly granted for a dedicated deployment.
/// 3. Coherency `Ok`: write-through/disabled cache or verified full
///    snooping → `NoneNeeded`; anything marginal falls back to step 2.
pub fn select_tier(
    profile: &CoherencyProfile,
    caps: &CpuCaps,
    consent: OverrideConsent,
) -> TierDecision {
    let mut confidence: u8 = 100;

    if profile.bus_master != BusMasterResult::Functional {
        if profile.bus_master == BusMasterResult::Partial {
            confidence = confidence.saturating_sub(PENALTY_BUS_PARTIAL);
        }
        return TierDecision {
            tier: CacheTier::Disabled,
            confidence,
        };
    }

    match profile.coherency {
        CoherencyResult::Problem => {
            confidence = confidence.saturating_sub(PENALTY_COHERENCY_PROBLEM);
            if profile.corruption_detected {
                confidence = confidence.saturating_sub(PENALTY_CORRUPTION);
            }
        }
        CoherencyResult::Unknown => {
            confidence = confidence.saturating_sub(PENALTY_COHERENCY_UNKNOWN);
        }
        CoherencyResult::Ok => {}
    }

    let tier = match profile.coherency {
        CoherencyResult::Problem | CoherencyResult::Unknown => {
            managed_tier(caps, consent, &mut confidence)
        }
        CoherencyResult::Ok => {
            if !profile.write_back {
                // Write-through or disabled cache: coherent by design.
                CacheTier::NoneNeeded
            } else {
                match profile.consultable_snooping() {
                    SnoopingResult::Full => CacheTier::NoneNeeded,
                    SnoopingResult::Partial => {
                        confidence = confidence.saturating_sub(PENALTY_SNOOPING_PARTIAL);
                        managed_tier(caps, consent, &mut confidence)
                    }
                    SnoopingResult::None | SnoopingResult::Unknown => {
                        confidence = confidence.saturating_sub(PENALTY_SNOOPING_UNKNOWN);
                        managed_tier(caps, consent, &mut confidence)
                    }
                }
            }
        }
    };

    TierDecision { tier, confidence }
}

/// Cheapest cache-management tier the CPU supports. The override tier is
/// reachable only through the consent gate, and only when no flush
/// instruction exists at all.
fn managed_tier(caps: &CpuCaps, consent: OverrideConsent, confidence: &mut u8) -> CacheTier {
    if caps.has_surgical_flush() {
        CacheTier::SurgicalFlush
    } else if caps.has_full_flush() {
        CacheTier::FullFlush
    } else if consent.permits_override() {
        CacheTier::GlobalPolicyOverride
    } else {
        *confidence = confidence.saturating_sub(PENALTY_NO_FLUSH_INSTRUCTION);
        CacheTier::SoftwareBarrier
    }
}

/// Log the decision once at initialization. Separate from `select_tier`
/// so the selection itself stays pure.
pub fn report_decision(decision: &TierDecision, consent: OverrideConsent) {
    if decision.tier == CacheTier::GlobalPolicyOverride {
        // The consent that unlocked this tier is recorded alongside the
        // decision, per the consent-gate contract.
        info!(
            "tier selected: {} (confidence {}%) with explicit user consent (dedicated={})",
            decision.tier, decision.confidence, consent.dedicated
        );
    } else {
        info!(
            "tier selected: {} (confidence {}%)",
            decision.tier, decision.confidence
        );
    }
}
