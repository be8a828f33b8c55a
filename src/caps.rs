//! Consumed capability and policy reports.
//!
//! These are inputs from the CPU feature probe and platform policy probe
//! collaborators. The engine never detects features itself; it consumes
//! these reports and does not second-guess them — the one thing it refuses
//! to trust is the chipset's *coherency* claims, which is what the harness
//! exists to verify.

use bitflags::bitflags;

bitflags! {
    /// CPU cache-management capability report.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct CpuCaps: u8 {
        /// Per-line flush instruction available (CLFLUSH analog).
        const SURGICAL_FLUSH = 1 << 0;
        /// Whole-cache writeback+invalidate available (WBINVD analog).
        const FULL_FLUSH = 1 << 1;
        /// Cache currently enabled.
        const CACHE_ENABLED = 1 << 2;
        /// Cache currently in writeback mode (meaningless if disabled).
        const WRITE_BACK = 1 << 3;
    }
}

impl CpuCaps {
    #[inline]
    pub fn has_surgical_flush(&self) -> bool {
        self.contains(Self::SURGICAL_FLUSH)
    }

    #[inline]
    pub fn has_full_flush(&self) -> bool {
        self.contains(Self::FULL_FLUSH)
    }

    #[inline]
    pub fn cache_enabled(&self) -> bool {
        self.contains(Self::CACHE_ENABLED)
    }

    /// True only when the cache is enabled *and* in writeback mode.
    #[inline]
    pub fn write_back(&self) -> bool {
        self.contains(Self::CACHE_ENABLED) && self.contains(Self::WRITE_BACK)
    }
}

/// CPU generation, as reported by the feature probe.
///
/// Drives the static minimum-alignment table and the diagnostic record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum CpuClass {
    /// 386-class: no cache management instructions at all.
    Cpu386,
    /// 486-class: WBINVD only, 16-byte lines.
    Cpu486,
    /// Pentium-class: WBINVD, 32-byte lines.
    Pentium,
    /// P6 and later: WBINVD, possibly CLFLUSH, 32-byte lines.
    P6,
    /// Anything newer: CLFLUSH expected, 64-byte lines.
    Modern,
}

impl CpuClass {
    /// Minimum DMA buffer alignment for this CPU class.
    ///
    /// Buffers must never share a cache line with unrelated data when line
    /// flushes or invalidates are in play, so the floor is the cache line
    /// size of the generation.
    pub const fn min_alignment(self) -> usize {
        match self {
            CpuClass::Cpu386 => 4,
            CpuClass::Cpu486 => 16,
            CpuClass::Pentium => 32,
            CpuClass::P6 => 32,
            CpuClass::Modern => 64,
        }
    }

    /// Cache line size in bytes for this CPU class.
    pub const fn cache_line_size(self) -> u16 {
        match self {
            CpuClass::Cpu386 => 16,
            CpuClass::Cpu486 => 16,
            CpuClass::Pentium => 32,
            CpuClass::P6 => 32,
            CpuClass::Modern => 64,
        }
    }

    /// Short name for diagnostic records.
    pub const fn name(self) -> &'static str {
        match self {
            CpuClass::Cpu386 => "386",
            CpuClass::Cpu486 => "486",
            CpuClass::Pentium => "pentium",
            CpuClass::P6 => "p6",
            CpuClass::Modern => "modern",
        }
    }
}

/// Platform addressing policy report.
///
/// If `direct_physical_dma_safe` is false (e.g. an address-translation
/// layer such as VDS must be used), the engine short-circuits to
/// `Disabled` without running any hardware test — probing with raw
/// physical addresses on such a platform is itself unsafe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlatformPolicy {
    pub direct_physical_dma_safe: bool,
    pub requires_external_translation: bool,
}

impl PlatformPolicy {
    /// Identity-mapped platform, physical DMA allowed.
    pub const fn direct() -> Self {
        Self {
            direct_physical_dma_safe: true,
            requires_external_translation: false,
        }
    }

    /// Translation layer present; physical DMA forbidden.
    pub const fn translated() -> Self {
        Self {
            direct_physical_dma_safe: false,
            requires_external_translation: true,
        }
    }
}

/// Explicit consent for the `GlobalPolicyOverride` tier.
///
/// Obtained once, out of band, through a separately-logged confirmation
/// step. Never inferred. Both flags must be set for the override tier to
/// become eligible; a declined consent is not an error — the policy
/// silently substitutes `SoftwareBarrier`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OverrideConsent {
    /// User explicitly confirmed the system-wide cache-policy change.
    pub granted: bool,
    /// Caller indicated a dedicated, single-purpose deployment.
    pub dedicated: bool,
}

impl OverrideConsent {
    pub const fn declined() -> Self {
        Self {
            granted: false,
            dedicated: false,
        }
    }

    pub const fn granted_dedicated() -> Self {
        Self {
            granted: true,
            dedicated: true,
        }
    }

    /// True only when the override tier may be considered at all.
    #[inline]
    pub fn permits_override(&self) -> bool {
        self.granted && self.dedicated
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_back_requires_enabled_cache() {
        let wb_only = CpuCaps::WRITE_BACK;
        assert!(!wb_only.write_back());

        let enabled_wb = CpuCaps::CACHE_ENABLED | CpuCaps::WRITE_BACK;
        assert!(enabled_wb.write_back());
    }

    #[test]
    fn min_alignment_is_power_of_two() {
        for class in [
            CpuClass::Cpu386,
            CpuClass::Cpu486,
            CpuClass::Pentium,
            CpuClass::P6,
            CpuClass::Modern,
        ] {
            assert!(class.min_alignment().is_power_of_two());
            assert!(class.min_alignment() <= class.cache_line_size() as usize * 4);
        }
    }

    #[test]
    fn consent_requires_both_flags() {
        assert!(!OverrideConsent::declined().permits_override());
        assert!(!OverrideConsent { granted: true, dedicated: false }.permits_override());
        assert!(!OverrideConsent { granted: false, dedicated: true }.permits_override());
        assert!(OverrideConsent::granted_dedicated().permits_override());
    }
}
