//! Timestamp source abstraction.
//!
//! The harness needs wall-clock deadlines for hardware-facing sub-tests and
//! microsecond-resolution deltas for the timing-based snooping probes. On
//! x86 this is the TSC; the trait keeps the engine testable on hosted
//! targets.

/// Opaque monotonic tick count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub struct Ticks(pub u64);

impl Ticks {
    #[inline]
    pub const fn raw(self) -> u64 {
        self.0
    }

    /// Ticks elapsed since `earlier`, saturating on non-monotonic input.
    #[inline]
    pub fn since(self, earlier: Ticks) -> u64 {
        self.0.saturating_sub(earlier.0)
    }
}

/// Monotonic timestamp source.
///
/// Reads must be cheap (tens of cycles) — Stage 3 brackets individual
/// cache-line accesses with them.
pub trait Timer {
    /// Current tick count.
    fn now(&self) -> Ticks;

    /// Tick frequency in Hz.
    fn ticks_per_second(&self) -> u64;

    /// Convert a millisecond budget into ticks.
    #[inline]
    fn ms_to_ticks(&self, ms: u64) -> u64 {
        (self.ticks_per_second() / 1000).max(1) * ms
    }

    /// Convert an elapsed tick delta to microseconds.
    #[inline]
    fn ticks_to_us(&self, ticks: u64) -> u64 {
        let per_us = (self.ticks_per_second() / 1_000_000).max(1);
        ticks / per_us
    }
}

/// A deadline derived from a [`Timer`].
///
/// Sub-tests poll this; missing a deadline is recorded as `Unknown`, never
/// silently skipped.
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    expires: Ticks,
}

impl Deadline {
    pub fn after_ms<T: Timer + ?Sized>(timer: &T, ms: u64) -> Self {
        Self {
            expires: Ticks(timer.now().0.saturating_add(timer.ms_to_ticks(ms))),
        }
    }

    #[inline]
    pub fn expired<T: Timer + ?Sized>(&self, timer: &T) -> bool {
        timer.now() >= self.expires
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::cell::Cell;

    struct FakeTimer {
        now: Cell<u64>,
    }

    impl Timer for FakeTimer {
        fn now(&self) -> Ticks {
            Ticks(self.now.get())
        }
        fn ticks_per_second(&self) -> u64 {
            1_000_000
        }
    }

    #[test]
    fn deadline_expires() {
        let t = FakeTimer { now: Cell::new(0) };
        let d = Deadline::after_ms(&t, 5);
        assert!(!d.expired(&t));
        t.now.set(5_000);
        assert!(d.expired(&t));
    }

    #[test]
    fn since_saturates() {
        assert_eq!(Ticks(5).since(Ticks(10)), 0);
        assert_eq!(Ticks(10).since(Ticks(4)), 6);
    }
}
