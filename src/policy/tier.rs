//! Cache-management tiers.
//!
//! A closed set of strategies, one of which is selected once per boot.
//! Changing tiers at runtime is not a supported operation; re-selection
//! requires a fresh [`crate::CoherencyProfile`].

use core::fmt;

/// The cache-management strategy active for the life of the driver.
///
/// Ordered roughly cheapest-correct first. `GlobalPolicyOverride` is
/// gated behind explicit, separately-recorded user consent and is never a
/// silent default.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheTier {
    /// Per-address-range line flush (CLFLUSH analog). Finest granularity,
    /// near-zero per-packet cost.
    SurgicalFlush,
    /// Whole-cache writeback+invalidate (WBINVD analog). Coarse but
    /// always correct; expensive, so callers batch it.
    FullFlush,
    /// Ordering/settling technique with strictly local effect; no
    /// hardware flush instruction required.
    SoftwareBarrier,
    /// Process-wide cache-policy mutation. Consent-gated; applied once at
    /// initialization, no per-transfer work.
    GlobalPolicyOverride,
    /// Write-through cache or verified hardware snooping; nothing to do.
    NoneNeeded,
    /// Bus mastering non-functional; the caller must use a non-DMA
    /// transfer path. A supported degraded mode, not an error.
    Disabled,
}

impl CacheTier {
    /// True if DMA transfers may be performed at all under this tier.
    #[inline]
    pub fn dma_permitted(self) -> bool {
        self != CacheTier::Disabled
    }

    /// True if the tier does per-transfer cache work.
    #[inline]
    pub fn per_transfer_work(self) -> bool {
        matches!(
            self,
            CacheTier::SurgicalFlush | CacheTier::FullFlush | CacheTier::SoftwareBarrier
        )
    }
}

impl fmt::Display for CacheTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::SurgicalFlush => "surgical-flush",
            Self::FullFlush => "full-flush",
            Self::SoftwareBarrier => "software-barrier",
            Self::GlobalPolicyOverride => "global-policy-override",
            Self::NoneNeeded => "none-needed",
            Self::Disabled => "disabled",
        })
    }
}
