//! Diagnostic record export.
//!
//! One flat record per boot, suitable for append-only field logging.
//! Purely observational: nothing reads it back into the decision process.
//! Stability contract is field-additive only — downstream parsers key on
//! field names, not position.

use core::fmt;

use crate::caps::CpuClass;
use crate::policy::CacheTier;
use crate::probe::{BusMasterResult, CoherencyResult, SnoopingResult};

/// PCI-style chipset identity, supplied by the bus-enumeration
/// collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChipsetId {
    pub vendor: u16,
    pub device: u16,
}

impl fmt::Display for ChipsetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04x}:{:04x}", self.vendor, self.device)
    }
}

/// Flat per-boot record of what was measured and what was decided.
#[derive(Debug, Clone, Copy)]
pub struct DiagnosticRecord {
    pub chipset: ChipsetId,
    pub cpu_class: CpuClass,
    pub bus_master: BusMasterResult,
    pub coherency: CoherencyResult,
    pub snooping: SnoopingResult,
    pub tier: CacheTier,
    pub confidence: u8,
    pub cache_enabled: bool,
    pub write_back: bool,
}

impl fmt::Display for DiagnosticRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "chipset={} cpu={} bus={} coherency={} snooping={} tier={} confidence={} cache={}",
            self.chipset,
            self.cpu_class.name(),
            self.bus_master,
            self.coherency,
            self.snooping,
            self.tier,
            self.confidence,
            if !self.cache_enabled {
                "off"
            } else if self.write_back {
                "wb"
            } else {
                "wt"
            },
        )
    }
}
