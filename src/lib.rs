//! DMA Coherency & Safe Buffer Management Engine
//!
//! Bare-metal bus-master drivers on ISA-era and embedded platforms cannot
//! trust chipset documentation about cache snooping, and have no OS-provided
//! coherent allocator. This crate determines, empirically and once per boot,
//! whether bus-master DMA through a writeback cache is actually safe on the
//! running hardware, selects the cheapest correct cache-management strategy,
//! and hands out physically-constrained buffers that are guaranteed safe for
//! device DMA.
//!
//! # Architecture
//!
//! ```text
//! Feature probe (CPU caps)  ───┐
//! Platform policy (VDS etc.) ──┤
//!                              ▼
//!                  CoherencyHarness (runs once at init)
//!                              │ CoherencyProfile
//!                              ▼
//!                  select_tier() ── pure, deterministic
//!                              │ CacheTier
//!              ┌───────────────┴───────────────┐
//!              ▼                               ▼
//!        TransferGuard                   BufferPool(s)
//!   (pre/post every transfer)     (aligned, boundary-safe blocks)
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use dma_coherency::{Engine, EngineConfig, OverrideConsent, PlatformPolicy};
//!
//! let config = EngineConfig::new(caps, cpu_class, PlatformPolicy::direct(),
//!     OverrideConsent::declined());
//! let engine = Engine::initialize(&mut probe_dev, &timer, scratch_region,
//!     config, backend);
//!
//! engine.add_pool(PoolId(0), dma_region)?;
//! let buf = engine.allocate(1536, 16, PoolId(0))?;
//! engine.pre_transfer(&buf);
//! // ... device transfer ...
//! engine.post_transfer(&buf);
//! engine.release(buf);
//! ```
//!
//! # Degraded mode
//!
//! A broken bus master is not an error: the engine reports
//! [`CacheTier::Disabled`] and the driver falls back to programmed I/O for
//! the life of the session. There is no panic path in this crate outside of
//! misuse assertions.

#![no_std]

pub mod caps;
pub mod diag;
pub mod dma;
pub mod engine;
pub mod error;
pub mod guard;
pub mod policy;
pub mod probe;
pub mod sync;
pub mod time;

pub use caps::{CpuCaps, CpuClass, OverrideConsent, PlatformPolicy};
pub use diag::{ChipsetId, DiagnosticRecord};
pub use dma::{BufferPool, DmaBuffer, DmaRegion, MemoryClass, PoolId, PoolStats};
pub use engine::{Engine, EngineConfig};
pub use error::{AllocError, PoolError, ProbeError};
pub use guard::{CacheBackend, TransferGuard, X86CacheBackend};
pub use policy::{select_tier, CacheTier, TierDecision};
pub use probe::{
    BusMasterResult, CoherencyHarness, CoherencyProfile, CoherencyResult, HarnessBudget,
    ProbeDevice, SnoopingResult, PROBE_BUFFER_SIZE,
};
pub use time::{Deadline, Ticks, Timer};
