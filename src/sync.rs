//! Synchronization primitives.
//!
//! Single-core, interrupt-driven model: the pool free-lists are mutated
//! from both foreground (`allocate`) and interrupt completion (`release`),
//! so the critical section must mask the one interrupt source rather than
//! take a blocking lock. The crate is platform-agnostic, so the actual
//! mask/restore operations are injected once at startup as function
//! pointers; until then they are no-ops (correct on hosted test targets).

use core::cell::UnsafeCell;
use core::ops::{Deref, DerefMut};
use core::sync::atomic::{AtomicBool, Ordering};

/// Disable the driver's interrupt source. Returns the prior enable state.
pub type IrqDisableFn = fn() -> bool;
/// Restore the interrupt enable state captured by the matching disable.
pub type IrqRestoreFn = fn(was_enabled: bool);

fn noop_disable() -> bool {
    false
}

fn noop_restore(_was_enabled: bool) {}

struct IrqHooks {
    disable: IrqDisableFn,
    restore: IrqRestoreFn,
}

static IRQ_HOOKS: spin::Once<IrqHooks> = spin::Once::new();

/// Install platform interrupt mask hooks. First call wins; later calls are
/// ignored. Call before any pool is shared with interrupt context.
pub fn install_irq_hooks(disable: IrqDisableFn, restore: IrqRestoreFn) {
    IRQ_HOOKS.call_once(|| IrqHooks { disable, restore });
}

#[inline]
fn irq_disable() -> bool {
    match IRQ_HOOKS.get() {
        Some(h) => (h.disable)(),
        None => noop_disable(),
    }
}

#[inline]
fn irq_restore(was_enabled: bool) {
    match IRQ_HOOKS.get() {
        Some(h) => (h.restore)(was_enabled),
        None => noop_restore(was_enabled),
    }
}

/// Interrupt-masking spinlock.
///
/// Masks the driver interrupt while held so an interrupt-context `release`
/// cannot interleave with a foreground `allocate` on the same free list.
/// On a single core the atomic never actually spins; it exists to catch
/// reentrancy bugs and to keep the type sound if a second core appears.
pub struct IrqSpinLock<T> {
    locked: AtomicBool,
    data: UnsafeCell<T>,
}

// Safety: exclusive access is enforced through the lock.
unsafe impl<T: Send> Send for IrqSpinLock<T> {}
unsafe impl<T: Send> Sync for IrqSpinLock<T> {}

impl<T> IrqSpinLock<T> {
    pub const fn new(data: T) -> Self {
        Self {
            locked: AtomicBool::new(false),
            data: UnsafeCell::new(data),
        }
    }

    /// Acquire the lock; the guard restores interrupt state on drop.
    pub fn lock(&self) -> IrqSpinLockGuard<'_, T> {
        let interrupts_were_enabled = irq_disable();

        while self
            .locked
            .compare_exchange_weak(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_err()
        {
            core::hint::spin_loop();
        }

        IrqSpinLockGuard {
            lock: self,
            interrupts_were_enabled,
        }
    }

    /// Check if the lock is currently held.
    pub fn is_locked(&self) -> bool {
        self.locked.load(Ordering::Relaxed)
    }

    /// Consume the lock, returning the inner value.
    pub fn into_inner(self) -> T {
        self.data.into_inner()
    }
}

/// Guard returned by `IrqSpinLock::lock()`.
pub struct IrqSpinLockGuard<'a, T> {
    lock: &'a IrqSpinLock<T>,
    interrupts_were_enabled: bool,
}

impl<T> Deref for IrqSpinLockGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        unsafe { &*self.lock.data.get() }
    }
}

impl<T> DerefMut for IrqSpinLockGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        unsafe { &mut *self.lock.data.get() }
    }
}

impl<T> Drop for IrqSpinLockGuard<'_, T> {
    fn drop(&mut self) {
        self.lock.locked.store(false, Ordering::Release);
        irq_restore(self.interrupts_were_enabled);
    }
}
