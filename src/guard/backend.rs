//! Cache maintenance primitives.
//!
//! The guard dispatches onto these raw operations; the trait exists so the
//! engine runs on hosted test targets and non-x86 ports. All operations
//! are non-allocating and bounded — they are called from interrupt
//! context.

/// Raw cache operations for one platform.
pub trait CacheBackend {
    /// Write back and invalidate the lines covering `[ptr, ptr+len)`.
    /// CLFLUSH analog; near-zero cost for packet-sized ranges.
    fn flush_lines(&self, ptr: *const u8, len: usize, line_size: u16);

    /// Write back and invalidate the entire cache. WBINVD analog;
    /// privileged and expensive — callers batch it.
    fn full_flush(&self);

    /// Full ordering barrier: all prior stores globally visible before any
    /// later access.
    fn memory_barrier(&self);

    /// Software settling: touch the lines covering `[ptr, ptr+len)` with
    /// serialized reads. Strictly local effect; the fallback when no flush
    /// instruction exists.
    fn touch_lines(&self, ptr: *const u8, len: usize, line_size: u16);

    /// Switch the global cache policy to a DMA-safe mode (cache off or
    /// write-through, whichever the platform supports). Called exactly
    /// once, at initialization, only under the `GlobalPolicyOverride`
    /// tier after explicit consent.
    fn apply_global_policy(&self);
}

/// x86 implementation via inline assembly.
///
/// `full_flush` and `apply_global_policy` require ring 0; this crate runs
/// in bare-metal drivers where that holds.
#[derive(Debug, Default, Clone, Copy)]
pub struct X86CacheBackend;

/// CR0 cache-control bits. CD=0/NW=1 is architecturally invalid and the
/// CR0 write raises #GP(0) on 486 and later, so the policy mask must
/// always carry both bits.
#[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
const CR0_CACHE_DISABLE: usize = 1 << 30;
#[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
const CR0_NOT_WRITE_THROUGH: usize = 1 << 29;

#[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
impl CacheBackend for X86CacheBackend {
    fn flush_lines(&self, ptr: *const u8, len: usize, line_size: u16) {
        if len == 0 {
            return;
        }
        let line = line_size as usize;
        unsafe {
            let mut addr = (ptr as usize) & !(line - 1);
            let end = ptr as usize + len;
            while addr < end {
                core::arch::asm!(
                    "clflush [{0}]",
                    in(reg) addr,
                    options(nostack, preserves_flags)
                );
                addr += line;
            }
            core::arch::asm!("mfence", options(nostack, preserves_flags));
        }
    }

    fn full_flush(&self) {
        unsafe {
            core::arch::asm!("wbinvd", options(nostack, preserves_flags));
        }
    }

    fn memory_barrier(&self) {
        unsafe {
            core::arch::asm!("mfence", options(nostack, preserves_flags));
        }
    }

    fn touch_lines(&self, ptr: *const u8, len: usize, line_size: u16) {
        let line = (line_size as usize).max(1);
        let mut off = 0;
        while off < len {
            unsafe {
                core::ptr::read_volatile(ptr.add(off));
            }
            off += line;
        }
        self.memory_barrier();
    }

    fn apply_global_policy(&self) {
        // Flush, then CD+NW together: with both set the cache no longer
        // allocates or holds dirty lines, so device DMA is safe without
        // per-transfer work. Setting NW alone is an invalid CR0 state.
        unsafe {
            core::arch::asm!("wbinvd", options(nostack, preserves_flags));
            core::arch::asm!(
                "mov {tmp}, cr0",
                "or {tmp}, {bits}",
                "mov cr0, {tmp}",
                tmp = out(reg) _,
                bits = in(reg) CR0_CACHE_DISABLE | CR0_NOT_WRITE_THROUGH,
                options(nostack)
            );
        }
    }
}


/// Fence-only fallback so the crate builds on non-x86 targets; real ports
/// supply their own backend.
#[cfg(not(any(target_arch = "x86", target_arch = "x86_64")))]
impl CacheBackend for X86CacheBackend {
    fn flush_lines(&self, _ptr: *const u8, _len: usize, _line_size: u16) {
        core::sync::atomic::fence(core::sync::atomic::Ordering::SeqCst);
    }

    fn full_flush(&self) {
        core::sync::atomic::fence(core::sync::atomic::Ordering::SeqCst);
    }

    fn memory_barrier(&self) {
        core::sync::atomic::fence(core::sync::atomic::Ordering::SeqCst);
    }

    fn touch_lines(&self, ptr: *const u8, len: usize, line_size: u16) {
        let line = (line_size as usize).max(1);
        let mut off = 0;
        while off < len {
            unsafe {
                core::ptr::read_volatile(ptr.add(off));
            }
            off += line;
        }
        self.memory_barrier();
    }

    fn apply_global_policy(&self) {}
}
