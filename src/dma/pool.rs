//! Buffer pool: carve-once, recycle-forever block management.
//!
//! Each pool owns one backing region. Blocks are carved on first demand,
//! padded past addressing-window boundaries where a naive placement would
//! cross one, and returned to a free list on release — the underlying
//! region is never handed back, so steady-state allocate/release cycles
//! cost a table scan and nothing else.

use log::{debug, warn};

use super::buffer::DmaBuffer;
use super::region::{self, DmaRegion, MemoryClass, BOUNDARY_WINDOW};
use super::{align_up, PoolId};
use crate::error::{AllocError, AllocResult, PoolError};

/// Maximum number of distinct blocks a pool tracks.
pub const MAX_BLOCKS: usize = 64;

#[derive(Debug, Clone, Copy)]
struct Block {
    /// Byte offset of the block within the backing region.
    offset: usize,
    /// Usable block size (padding sacrificed during carving is *not*
    /// part of any block).
    size: usize,
    free: bool,
}

impl Block {
    const fn empty() -> Self {
        Self {
            offset: 0,
            size: 0,
            free: false,
        }
    }
}

/// Pool counters, exported for diagnostics only.
#[derive(Debug, Clone, Copy, Default)]
pub struct PoolStats {
    pub allocations: u64,
    pub releases: u64,
    /// Allocations served from the free list without carving.
    pub reuse_hits: u64,
    /// Times carving had to skip past a window boundary.
    pub boundary_pads: u64,
    /// Total bytes sacrificed to alignment and boundary padding.
    pub padding_bytes: u64,
    pub exhaustions: u64,
}

/// Fixed-capacity DMA buffer pool over a single backing region.
pub struct BufferPool {
    id: PoolId,
    region: DmaRegion,
    /// CPU-class floor for request alignment.
    min_alignment: usize,
    /// Addressing-window constraint; `None` for staging-only memory.
    window: Option<u64>,
    blocks: [Block; MAX_BLOCKS],
    block_count: usize,
    /// Next never-carved offset in the region.
    carve_cursor: usize,
    stats: PoolStats,
}

impl BufferPool {
    /// Build a pool over `region`.
    ///
    /// DMA-capable regions must lie entirely below `addressable_limit`
    /// (the device's physical reach, e.g. 16 MiB for ISA bus masters);
    /// the check happens once here, not per allocation.
    pub fn new(
        id: PoolId,
        region: DmaRegion,
        min_alignment: usize,
        addressable_limit: u64,
    ) -> Result<Self, PoolError> {
        if !region.is_valid() || region.size() < min_alignment {
            return Err(PoolError::InvalidRegion);
        }
        if region.class() == MemoryClass::DmaCapable && !region.within_limit(addressable_limit) {
            warn!(
                "pool {}: region {:#x}+{:#x} exceeds device addressable limit {:#x}",
                id.0,
                region.bus_base(),
                region.size(),
                addressable_limit
            );
            return Err(PoolError::InvalidRegion);
        }

        let window = match region.class() {
            MemoryClass::DmaCapable => Some(BOUNDARY_WINDOW),
            MemoryClass::StagingOnly => None,
        };

        debug!(
            "pool {}: {:?} region, {} bytes at bus {:#x}, min align {}",
            id.0,
            region.class(),
            region.size(),
            region.bus_base(),
            min_alignment
        );

        Ok(Self {
            id,
            region,
            min_alignment,
            window,
            blocks: [Block::empty(); MAX_BLOCKS],
            block_count: 0,
            carve_cursor: 0,
            stats: PoolStats::default(),
        })
    }

    #[inline]
    pub fn id(&self) -> PoolId {
        self.id
    }

    #[inline]
    pub fn class(&self) -> MemoryClass {
        self.region.class()
    }

    /// Total backing capacity in bytes.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.region.size()
    }

    /// Buffers currently handed out.
    pub fn in_use(&self) -> usize {
        self.blocks[..self.block_count]
            .iter()
            .filter(|b| !b.free)
            .count()
    }

    pub fn stats(&self) -> PoolStats {
        self.stats
    }

    /// Allocate a buffer of `size` bytes at `alignment`.
    ///
    /// The returned buffer's start and end (inclusive) bus addresses lie
    /// within one addressing window (for DMA-capable pools), and the whole
    /// buffer is within the device's reach. Padding consumed to achieve
    /// that is sacrificed backing space, never usable bytes.
    pub fn allocate(&mut self, size: usize, alignment: usize) -> AllocResult<DmaBuffer> {
        if !alignment.is_power_of_two() || alignment < self.min_alignment {
            return Err(AllocError::InvalidAlignment);
        }
        if size == 0 || size > self.region.size() {
            return Err(AllocError::SizeExceedsPool);
        }
        // A buffer larger than one window can never be non-crossing.
        if let Some(window) = self.window {
            if size as u64 > window {
                return Err(AllocError::SizeExceedsPool);
            }
        }

        if let Some(idx) = self.find_free_block(size, alignment) {
            self.blocks[idx].free = false;
            self.stats.allocations += 1;
            self.stats.reuse_hits += 1;
            return Ok(self.make_handle(idx, size, alignment));
        }

        let idx = self.carve_block(size, alignment)?;
        self.stats.allocations += 1;
        Ok(self.make_handle(idx, size, alignment))
    }

    /// Return a buffer to the free list. The handle is consumed; the
    /// backing block becomes reusable.
    ///
    /// # Panics
    /// Panics if the buffer belongs to a different pool or is not
    /// driver-owned (releasing a device-owned buffer would hand the device
    /// a block the pool believes is free).
    pub fn release(&mut self, buffer: DmaBuffer) {
        assert!(buffer.pool_id() == self.id, "buffer released to wrong pool");
        assert!(
            buffer.ownership().can_access(),
            "cannot release a buffer the device still owns"
        );

        let idx = buffer.block_index() as usize;
        assert!(idx < self.block_count, "invalid block index");
        debug_assert!(!self.blocks[idx].free, "double release");

        self.blocks[idx].free = true;
        self.stats.releases += 1;
    }

    /// First free block that satisfies size, alignment, and the
    /// non-crossing invariant at its fixed offset.
    fn find_free_block(&self, size: usize, alignment: usize) -> Option<usize> {
        for (i, b) in self.blocks[..self.block_count].iter().enumerate() {
            if !b.free || b.size < size {
                continue;
            }
            let bus = self.region.bus_at(b.offset);
            if bus % alignment as u64 != 0 {
                continue;
            }
            if self.window.is_some() && region::crosses_window(bus, size) {
                continue;
            }
            return Some(i);
        }
        None
    }

    /// Carve a fresh block from the region, padding as needed.
    fn carve_block(&mut self, size: usize, alignment: usize) -> AllocResult<usize> {
        if self.block_count >= MAX_BLOCKS {
            self.stats.exhaustions += 1;
            return Err(AllocError::PoolExhausted);
        }

        let bus_base = self.region.bus_base();
        let mut bus = align_up(
            (bus_base + self.carve_cursor as u64) as usize,
            alignment,
        ) as u64;

        if self.window.is_some() && region::crosses_window(bus, size) {
            // Skip to the next window boundary; boundaries are 64 KiB
            // multiples, so re-align only for alignments above that.
            bus = align_up(region::next_window_boundary(bus) as usize, alignment) as u64;
            self.stats.boundary_pads += 1;
            // Allocation may run with the driver interrupt masked, so no
            // logger call here; `boundary_pads` carries the event.
            #[cfg(feature = "trace-probe")]
            log::debug!(
                "pool {}: padded past window boundary to bus {:#x}",
                self.id.0, bus
            );
        }

        let offset = (bus - bus_base) as usize;
        let end = match offset.checked_add(size) {
            Some(e) if e <= self.region.size() => e,
            _ => {
                self.stats.exhaustions += 1;
                return Err(AllocError::PoolExhausted);
            }
        };

        self.stats.padding_bytes += (offset - self.carve_cursor) as u64;

        let idx = self.block_count;
        self.blocks[idx] = Block {
            offset,
            size,
            free: false,
        };
        self.block_count += 1;
        self.carve_cursor = end;
        Ok(idx)
    }

    fn make_handle(&self, idx: usize, size: usize, alignment: usize) -> DmaBuffer {
        let b = &self.blocks[idx];
        let bus = self.region.bus_at(b.offset);
        let boundary_safe = !region::crosses_window(bus, size);
        debug_assert!(
            self.window.is_none() || boundary_safe,
            "allocator invariant: DMA pool produced a window-crossing buffer"
        );
        // Safety: the block offset/size were validated against the region
        // at carve time and the block is exclusively reserved.
        unsafe {
            DmaBuffer::new(
                self.region.cpu_at(b.offset),
                bus,
                size,
                alignment,
                boundary_safe,
                self.id,
                idx as u16,
            )
        }
    }
}
