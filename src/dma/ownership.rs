//! Buffer ownership state machine.
//!
//! ```text
//!     FREE ──alloc()──> DRIVER_OWNED ──submit()──> DEVICE_OWNED
//!       ▲                     │                         │
//!       └────release()────────┴─────complete()──────────┘
//! ```
//!
//! INVARIANT: CPU access to a DEVICE_OWNED buffer races the device and is
//! instant undefined behavior. The accessors on `DmaBuffer` assert
//! DRIVER_OWNED before producing a slice.

/// Who may touch the buffer right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferOwnership {
    /// In the pool, not handed out.
    Free,
    /// Owned by the driver; CPU access allowed.
    DriverOwned,
    /// Submitted to the device; no CPU access until completion.
    DeviceOwned,
}

impl BufferOwnership {
    #[inline]
    pub fn is_free(self) -> bool {
        self == BufferOwnership::Free
    }

    /// CPU-side access permitted.
    #[inline]
    pub fn can_access(self) -> bool {
        self == BufferOwnership::DriverOwned
    }

    #[inline]
    pub fn is_device_owned(self) -> bool {
        self == BufferOwnership::DeviceOwned
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn access_only_when_driver_owned() {
        assert!(!BufferOwnership::Free.can_access());
        assert!(BufferOwnership::DriverOwned.can_access());
        assert!(!BufferOwnership::DeviceOwned.can_access());
    }
}
