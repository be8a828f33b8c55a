//! Backing region definition and physical-addressing constraints.
//!
//! A region is one contiguous range of memory with both a CPU pointer and
//! a device-visible bus address. Every pool sits on exactly one region; a
//! DMA pool never mixes in memory of a different class.

use core::fmt;

/// Fixed-size physical addressing window. A buffer whose start and end
/// (inclusive) fall in different windows is unsafe for ISA-era bus-master
/// hardware.
pub const BOUNDARY_WINDOW: u64 = 64 * 1024;

/// Classic ISA 24-bit addressable limit (16 MiB).
pub const ISA_ADDRESS_LIMIT: u64 = 16 * 1024 * 1024;

/// What a region's memory may be used for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoryClass {
    /// Directly physically addressable by the device. Buffers handed to
    /// hardware come exclusively from regions of this class.
    DmaCapable,
    /// Fast and plentiful but not device-addressable (XMS-style). Usable
    /// only as a copy-staging area, never as a DMA target.
    StagingOnly,
}

/// A contiguous memory region backing one buffer pool.
///
/// # Safety contract
/// Constructed unsafely: the caller guarantees `cpu_ptr` is valid for
/// `size` bytes for the life of the program and that `bus_addr` is the
/// device-visible address of the same bytes.
#[derive(Clone, Copy)]
pub struct DmaRegion {
    cpu_ptr: *mut u8,
    bus_addr: u64,
    size: usize,
    class: MemoryClass,
}

impl DmaRegion {
    /// Create a new region.
    ///
    /// # Safety
    /// - `cpu_ptr` must point to valid memory of at least `size` bytes
    /// - `bus_addr` must be the corresponding device-visible address
    /// - the memory must remain valid and exclusively owned by the engine
    pub const unsafe fn new(
        cpu_ptr: *mut u8,
        bus_addr: u64,
        size: usize,
        class: MemoryClass,
    ) -> Self {
        Self {
            cpu_ptr,
            bus_addr,
            size,
            class,
        }
    }

    #[inline]
    pub const fn cpu_base(&self) -> *mut u8 {
        self.cpu_ptr
    }

    #[inline]
    pub const fn bus_base(&self) -> u64 {
        self.bus_addr
    }

    #[inline]
    pub const fn size(&self) -> usize {
        self.size
    }

    #[inline]
    pub const fn class(&self) -> MemoryClass {
        self.class
    }

    /// CPU pointer at a byte offset.
    ///
    /// # Safety
    /// Offset must be within region bounds.
    #[inline]
    pub unsafe fn cpu_at(&self, offset: usize) -> *mut u8 {
        self.cpu_ptr.add(offset)
    }

    /// Bus address at a byte offset.
    #[inline]
    pub const fn bus_at(&self, offset: usize) -> u64 {
        self.bus_addr + offset as u64
    }

    /// Non-null, non-empty.
    pub fn is_valid(&self) -> bool {
        !self.cpu_ptr.is_null() && self.size > 0
    }

    /// Whole region within the device's addressable range.
    pub fn within_limit(&self, limit: u64) -> bool {
        self.bus_addr
            .checked_add(self.size as u64)
            .map(|end| end <= limit)
            .unwrap_or(false)
    }
}

// Safety: the region is a passive address descriptor; access discipline is
// enforced by the pool and buffer ownership states.
unsafe impl Send for DmaRegion {}
unsafe impl Sync for DmaRegion {}

impl fmt::Debug for DmaRegion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DmaRegion")
            .field("cpu_ptr", &self.cpu_ptr)
            .field("bus_addr", &format_args!("{:#x}", self.bus_addr))
            .field("size", &format_args!("{:#x}", self.size))
            .field("class", &self.class)
            .finish()
    }
}

/// True if `[bus_addr, bus_addr + len - 1]` spans two addressing windows.
#[inline]
pub fn crosses_window(bus_addr: u64, len: usize) -> bool {
    if len == 0 {
        return false;
    }
    let start_window = bus_addr / BOUNDARY_WINDOW;
    let end_window = (bus_addr + len as u64 - 1) / BOUNDARY_WINDOW;
    start_window != end_window
}

/// Next window boundary at or after `bus_addr`.
#[inline]
pub fn next_window_boundary(bus_addr: u64) -> u64 {
    (bus_addr / BOUNDARY_WINDOW + 1) * BOUNDARY_WINDOW
}
