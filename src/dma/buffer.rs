//! DMA buffer handle.
//!
//! Move-only: the pool transfers the handle to the driver on `allocate`
//! and takes it back on `release`, so double-release and use-after-release
//! are unrepresentable. Ownership transitions to and from the device are
//! tracked explicitly; CPU access asserts the driver actually owns the
//! bytes.

use super::ownership::BufferOwnership;
use super::PoolId;

/// One physically-constrained allocation.
///
/// `boundary_safe` is computed once by the allocator and never re-checked
/// per use — `pre_transfer`/`post_transfer` run in interrupt context and
/// operate on pre-validated state only.
pub struct DmaBuffer {
    cpu_ptr: *mut u8,
    bus_addr: u64,
    size: usize,
    alignment: usize,
    boundary_safe: bool,
    ownership: BufferOwnership,
    pool: PoolId,
    block: u16,
}

impl DmaBuffer {
    /// Assemble a handle for a freshly-carved or recycled block.
    ///
    /// # Safety
    /// - `cpu_ptr`/`bus_addr` must describe `size` valid bytes inside the
    ///   pool's backing region
    /// - `block` must be the owning pool's block index for those bytes
    pub(crate) unsafe fn new(
        cpu_ptr: *mut u8,
        bus_addr: u64,
        size: usize,
        alignment: usize,
        boundary_safe: bool,
        pool: PoolId,
        block: u16,
    ) -> Self {
        Self {
            cpu_ptr,
            bus_addr,
            size,
            alignment,
            boundary_safe,
            ownership: BufferOwnership::DriverOwned,
            pool,
            block,
        }
    }

    /// Buffer contents.
    ///
    /// # Panics
    /// Panics if the buffer is not DriverOwned.
    pub fn as_slice(&self) -> &[u8] {
        assert!(
            self.ownership.can_access(),
            "BUG: CPU access to buffer not owned by driver (state: {:?})",
            self.ownership
        );
        unsafe { core::slice::from_raw_parts(self.cpu_ptr, self.size) }
    }

    /// Mutable buffer contents.
    ///
    /// # Panics
    /// Panics if the buffer is not DriverOwned.
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        assert!(
            self.ownership.can_access(),
            "BUG: CPU access to buffer not owned by driver (state: {:?})",
            self.ownership
        );
        unsafe { core::slice::from_raw_parts_mut(self.cpu_ptr, self.size) }
    }

    /// First `len` bytes, mutable.
    ///
    /// # Panics
    /// Panics if not DriverOwned or `len > size`.
    pub fn as_mut_slice_len(&mut self, len: usize) -> &mut [u8] {
        assert!(len <= self.size, "requested length exceeds buffer size");
        &mut self.as_mut_slice()[..len]
    }

    /// Device-visible bus address.
    #[inline]
    pub fn bus_addr(&self) -> u64 {
        self.bus_addr
    }

    /// CPU pointer. Dereference only while DriverOwned.
    #[inline]
    pub fn cpu_ptr(&self) -> *mut u8 {
        self.cpu_ptr
    }

    #[inline]
    pub fn size(&self) -> usize {
        self.size
    }

    #[inline]
    pub fn alignment(&self) -> usize {
        self.alignment
    }

    /// True if start and end lie in one addressing window. Computed at
    /// allocation time.
    #[inline]
    pub fn boundary_safe(&self) -> bool {
        self.boundary_safe
    }

    #[inline]
    pub fn ownership(&self) -> BufferOwnership {
        self.ownership
    }

    #[inline]
    pub fn pool_id(&self) -> PoolId {
        self.pool
    }

    #[inline]
    pub(crate) fn block_index(&self) -> u16 {
        self.block
    }

    /// Hand the buffer to the device (DriverOwned -> DeviceOwned).
    ///
    /// Call after `pre_transfer` and immediately before ringing the device
    /// doorbell.
    pub fn submit(&mut self) {
        debug_assert!(
            self.ownership == BufferOwnership::DriverOwned,
            "buffer must be driver-owned before device transfer"
        );
        self.ownership = BufferOwnership::DeviceOwned;
    }

    /// Reclaim the buffer from the device (DeviceOwned -> DriverOwned).
    ///
    /// Call once the device has signalled completion, before
    /// `post_transfer`.
    pub fn complete(&mut self) {
        debug_assert!(
            self.ownership == BufferOwnership::DeviceOwned,
            "buffer must be device-owned before reclaim"
        );
        self.ownership = BufferOwnership::DriverOwned;
    }
}

// Safety: the raw pointer is only dereferenced under the DriverOwned
// assertion; handles move between foreground and interrupt context but are
// never aliased.
unsafe impl Send for DmaBuffer {}

impl core::fmt::Debug for DmaBuffer {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("DmaBuffer")
            .field("bus_addr", &format_args!("{:#x}", self.bus_addr))
            .field("size", &self.size)
            .field("alignment", &self.alignment)
            .field("boundary_safe", &self.boundary_safe)
            .field("ownership", &self.ownership)
            .field("pool", &self.pool)
            .finish()
    }
}
