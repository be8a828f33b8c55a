//! Engine error types.
//!
//! Hand-rolled enums with `Display` impls; no allocation, no backtraces.
//! Allocation errors are returned synchronously and never retried
//! internally — callers decide fallback policy.

use core::fmt;

/// Result alias for buffer allocation.
pub type AllocResult<T> = core::result::Result<T, AllocError>;

/// Errors returned by `allocate()`.
///
/// None of these are retried by the allocator, and none are ever silently
/// downgraded to an unsafe buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AllocError {
    /// Alignment is not a power of two, or below the CPU-class minimum.
    InvalidAlignment,
    /// Requested size exceeds the pool's capacity, or (for DMA-capable
    /// pools) one addressing window.
    SizeExceedsPool,
    /// No free block satisfies the request and the backing region is
    /// exhausted.
    PoolExhausted,
    /// No pool registered under the given id.
    UnknownPool,
    /// The pool is DMA-only and the active tier is `Disabled`.
    DmaDisabled,
}

impl fmt::Display for AllocError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidAlignment => write!(f, "invalid buffer alignment"),
            Self::SizeExceedsPool => write!(f, "requested size exceeds pool capacity"),
            Self::PoolExhausted => write!(f, "pool exhausted"),
            Self::UnknownPool => write!(f, "unknown pool id"),
            Self::DmaDisabled => write!(f, "bus-master DMA disabled on this system"),
        }
    }
}

/// Errors from pool construction and registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolError {
    /// Backing region pointer is null or too small to carve one block.
    InvalidRegion,
    /// Pool id already registered.
    AlreadyRegistered,
    /// Pool id out of range.
    InvalidPoolId,
}

impl fmt::Display for PoolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidRegion => write!(f, "invalid backing region"),
            Self::AlreadyRegistered => write!(f, "pool id already registered"),
            Self::InvalidPoolId => write!(f, "pool id out of range"),
        }
    }
}

/// Errors reported by a [`crate::probe::ProbeDevice`] during harness
/// sub-tests.
///
/// A timing-out or unready device never aborts initialization: the harness
/// resolves it locally toward the conservative result (`Unknown`, or
/// `Broken` for Stage 1).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeError {
    /// Sub-test did not complete within its deadline.
    Timeout,
    /// Device refused the operation (reset pending, link down, ...).
    NotReady,
    /// Transfer started but the device signalled an error.
    Io,
}

impl fmt::Display for ProbeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Timeout => write!(f, "probe timed out"),
            Self::NotReady => write!(f, "probe device not ready"),
            Self::Io => write!(f, "probe transfer error"),
        }
    }
}
