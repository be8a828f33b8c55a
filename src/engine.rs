//! Top-level engine surface.
//!
//! Owns everything the hardware driver needs: the boot-lifetime profile
//! and tier (write-once at initialization, read-many, no synchronization
//! needed), the transfer guard, and the pool table behind an
//! interrupt-masking lock (`allocate` runs in the foreground loop,
//! `release` may run from interrupt completion).
//!
//! Re-selecting a tier at runtime is not supported: tear the engine down
//! and initialize again with a fresh probe if the user explicitly asks
//! for a re-test.

use log::{info, warn};

use crate::caps::{CpuCaps, CpuClass, OverrideConsent, PlatformPolicy};
use crate::diag::{ChipsetId, DiagnosticRecord};
use crate::dma::region::ISA_ADDRESS_LIMIT;
use crate::dma::{BufferPool, DmaBuffer, DmaRegion, MemoryClass, PoolId, PoolStats, MAX_POOLS};
use crate::error::{AllocError, AllocResult, PoolError};
use crate::guard::{CacheBackend, TransferGuard};
use crate::policy::{self, CacheTier, TierDecision};
use crate::probe::{CoherencyHarness, CoherencyProfile, HarnessBudget, ProbeDevice};
use crate::sync::IrqSpinLock;
use crate::time::Timer;

/// Initialization inputs that are reports, not measurements: everything
/// here comes from collaborators (CPU probe, platform probe, user dialog)
/// and is consumed as-is.
#[derive(Debug, Clone, Copy)]
pub struct EngineConfig {
    pub caps: CpuCaps,
    pub cpu_class: CpuClass,
    pub platform: PlatformPolicy,
    pub consent: OverrideConsent,
    /// Device physical reach; pools of DMA-capable memory must sit below
    /// this. Defaults to the ISA 16 MiB limit.
    pub addressable_limit: u64,
    pub budget: HarnessBudget,
}

impl EngineConfig {
    pub fn new(
        caps: CpuCaps,
        cpu_class: CpuClass,
        platform: PlatformPolicy,
        consent: OverrideConsent,
    ) -> Self {
        Self {
            caps,
            cpu_class,
            platform,
            consent,
            addressable_limit: ISA_ADDRESS_LIMIT,
            budget: HarnessBudget::default(),
        }
    }
}

struct PoolTable {
    pools: [Option<BufferPool>; MAX_POOLS],
}

/// The DMA coherency and buffer management engine.
pub struct Engine<B: CacheBackend> {
    profile: CoherencyProfile,
    decision: TierDecision,
    guard: TransferGuard<B>,
    pools: IrqSpinLock<PoolTable>,
    cpu_class: CpuClass,
    addressable_limit: u64,
}

impl<B: CacheBackend> Engine<B> {
    /// Run the coherency harness once and build the engine around the
    /// resulting tier. This is the only place hardware behavior is
    /// measured; everything after is table lookups.
    ///
    /// `scratch` must be a DMA-capable region of at least
    /// [`crate::probe::PROBE_BUFFER_SIZE`] bytes; without one the harness
    /// records bus-master broken and the engine comes up `Disabled`.
    pub fn initialize<D: ProbeDevice, T: Timer + ?Sized>(
        device: &mut D,
        timer: &T,
        scratch: DmaRegion,
        config: EngineConfig,
        backend: B,
    ) -> Self {
        let (profile, decision) = if !config.platform.direct_physical_dma_safe {
            // Probing with raw physical addresses on a translated platform
            // is itself unsafe, so nothing runs: DMA is off for the
            // session and the profile records that no stage completed.
            warn!("platform forbids direct physical DMA; skipping harness, DMA disabled");
            let decision = TierDecision {
                tier: CacheTier::Disabled,
                confidence: 100,
            };
            let mut profile =
                CoherencyProfile::unknown(config.caps.cache_enabled(), config.caps.write_back());
            profile.confidence = decision.confidence;
            (profile, decision)
        } else {
            let harness = CoherencyHarness::new(
                device,
                timer,
                scratch,
                config.caps,
                config.cpu_class,
            )
            .with_budget(config.budget);
            let mut profile = harness.run();
            let decision = policy::select_tier(&profile, &config.caps, config.consent);
            profile.confidence = decision.confidence;
            (profile, decision)
        };

        policy::report_decision(&decision, config.consent);
        if decision.tier == CacheTier::Disabled {
            warn!("bus-master DMA unavailable; driver must use the non-DMA transfer path");
        }
        if decision.tier == CacheTier::GlobalPolicyOverride {
            // One-time, consent-logged global mutation; per-transfer ops
            // under this tier are no-ops.
            info!("applying consented global cache-policy override");
            backend.apply_global_policy();
        }

        let guard = TransferGuard::new(
            decision.tier,
            config.cpu_class.cache_line_size(),
            backend,
        );

        Self {
            profile,
            decision,
            guard,
            pools: IrqSpinLock::new(PoolTable {
                pools: core::array::from_fn(|_| None),
            }),
            cpu_class: config.cpu_class,
            addressable_limit: config.addressable_limit,
        }
    }

    /// The tier selected for this boot.
    #[inline]
    pub fn tier(&self) -> CacheTier {
        self.decision.tier
    }

    /// The boot-lifetime coherency profile.
    #[inline]
    pub fn profile(&self) -> &CoherencyProfile {
        &self.profile
    }

    #[inline]
    pub fn confidence(&self) -> u8 {
        self.decision.confidence
    }

    /// Access the transfer guard directly (coalescing control, stats).
    #[inline]
    pub fn guard(&self) -> &TransferGuard<B> {
        &self.guard
    }

    /// Register a pool over `region`. The CPU-class minimum alignment and
    /// the device addressable limit are applied here, once.
    pub fn add_pool(&self, id: PoolId, region: DmaRegion) -> Result<(), PoolError> {
        let idx = id.0 as usize;
        if idx >= MAX_POOLS {
            return Err(PoolError::InvalidPoolId);
        }
        let pool = BufferPool::new(
            id,
            region,
            self.cpu_class.min_alignment(),
            self.addressable_limit,
        )?;

        let mut table = self.pools.lock();
        if table.pools[idx].is_some() {
            return Err(PoolError::AlreadyRegistered);
        }
        table.pools[idx] = Some(pool);
        Ok(())
    }

    /// Allocate a DMA-safe buffer from a pool.
    ///
    /// DMA-capable pools refuse to serve while the tier is `Disabled`
    /// (their buffers exist to be handed to a device that must not get
    /// any); staging pools serve regardless.
    pub fn allocate(&self, size: usize, alignment: usize, id: PoolId) -> AllocResult<DmaBuffer> {
        let mut table = self.pools.lock();
        let pool = table
            .pools
            .get_mut(id.0 as usize)
            .and_then(|p| p.as_mut())
            .ok_or(AllocError::UnknownPool)?;

        if pool.class() == MemoryClass::DmaCapable && !self.decision.tier.dma_permitted() {
            return Err(AllocError::DmaDisabled);
        }

        pool.allocate(size, alignment)
    }

    /// Return a buffer to its pool. Callable from interrupt completion;
    /// the critical section is a single free-list update.
    pub fn release(&self, buffer: DmaBuffer) {
        let id = buffer.pool_id();
        let mut table = self.pools.lock();
        match table.pools.get_mut(id.0 as usize).and_then(|p| p.as_mut()) {
            Some(pool) => pool.release(buffer),
            None => {
                // A handle for an unregistered pool cannot be minted
                // through safe code.
                debug_assert!(false, "release to unregistered pool {}", id.0);
            }
        }
    }

    /// Tier-appropriate pre-transfer cache operation.
    #[inline]
    pub fn pre_transfer(&self, buffer: &DmaBuffer) {
        self.guard.pre_transfer(buffer);
    }

    /// Tier-appropriate post-transfer cache operation. Interrupt-safe.
    #[inline]
    pub fn post_transfer(&self, buffer: &DmaBuffer) {
        self.guard.post_transfer(buffer);
    }

    pub fn pool_stats(&self, id: PoolId) -> Option<PoolStats> {
        let table = self.pools.lock();
        table
            .pools
            .get(id.0 as usize)
            .and_then(|p| p.as_ref())
            .map(|p| p.stats())
    }

    /// Flat record for append-only field logging.
    pub fn diagnostic_record(&self, chipset: ChipsetId) -> DiagnosticRecord {
        DiagnosticRecord {
            chipset,
            cpu_class: self.cpu_class,
            bus_master: self.profile.bus_master,
            coherency: self.profile.coherency,
            snooping: self.profile.snooping,
            tier: self.decision.tier,
            confidence: self.decision.confidence,
            cache_enabled: self.profile.cache_enabled,
            write_back: self.profile.write_back,
        }
    }
}
