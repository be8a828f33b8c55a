//! DMA buffer management.
//!
//! Ownership-tracked, physically-constrained buffers for bus-master
//! devices. Pools carve blocks out of a single backing region, padding
//! past 64 KiB addressing-window boundaries so no returned buffer ever
//! straddles one, and recycle released blocks through a free list so the
//! hot path never touches an underlying memory manager.

pub mod buffer;
pub mod ownership;
pub mod pool;
pub mod region;

pub use buffer::DmaBuffer;
pub use ownership::BufferOwnership;
pub use pool::{BufferPool, PoolStats, MAX_BLOCKS};
pub use region::{DmaRegion, MemoryClass, BOUNDARY_WINDOW};

/// Logical pool identifier (per device, per direction, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PoolId(pub u8);

/// Maximum number of registered pools.
pub const MAX_POOLS: usize = 8;

/// Align a value up to the given power-of-two alignment.
#[inline]
pub const fn align_up(val: usize, align: usize) -> usize {
    (val + align - 1) & !(align - 1)
}

/// Align a value down to the given power-of-two alignment.
#[inline]
pub const fn align_down(val: usize, align: usize) -> usize {
    val & !(align - 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn align_helpers() {
        assert_eq!(align_up(0, 16), 0);
        assert_eq!(align_up(1, 16), 16);
        assert_eq!(align_up(16, 16), 16);
        assert_eq!(align_down(31, 16), 16);
    }
}
