use core::mem::ManuallyDrop;
use core::ops::{Deref, DerefMut};

use crate::irq::{InterruptControl, IrqState};

/// Mutex that disables interrupts while held.
///
/// Used for state touched from both normal and interrupt context.  Locking
/// saves the interrupt state and masks delivery *before* spinning on the lock,
/// so an interrupt handler can never observe a half-updated value or deadlock
/// against the code it interrupted.  The guard releases in reverse order:
/// lock first, then the saved interrupt state.
///
/// The interrupt controller is passed per call rather than stored, so the same
/// mutex type works for the real CPU and for the recording fakes in tests.
pub struct IrqMutex<T> {
    inner: spin::Mutex<T>,
}

pub struct IrqMutexGuard<'a, T, C: InterruptControl + ?Sized> {
    guard: ManuallyDrop<spin::MutexGuard<'a, T>>,
    irq: &'a C,
    saved: IrqState,
}

impl<T> IrqMutex<T> {
    #[inline]
    pub const fn new(data: T) -> Self {
        Self {
            inner: spin::Mutex::new(data),
        }
    }

    /// Check if the lock is currently held.
    #[inline]
    pub fn is_locked(&self) -> bool {
        self.inner.is_locked()
    }

    #[inline]
    pub fn lock<'a, C: InterruptControl + ?Sized>(&'a self, irq: &'a C) -> IrqMutexGuard<'a, T, C> {
        let saved = irq.irq_save();
        let guard = self.inner.lock();
        IrqMutexGuard {
            guard: ManuallyDrop::new(guard),
            irq,
            saved,
        }
    }

    #[inline]
    pub fn try_lock<'a, C: InterruptControl + ?Sized>(
        &'a self,
        irq: &'a C,
    ) -> Option<IrqMutexGuard<'a, T, C>> {
        let saved = irq.irq_save();
        match self.inner.try_lock() {
            Some(guard) => Some(IrqMutexGuard {
                guard: ManuallyDrop::new(guard),
                irq,
                saved,
            }),
            None => {
                irq.irq_restore(saved);
                None
            }
        }
    }
}

impl<T, C: InterruptControl + ?Sized> Deref for IrqMutexGuard<'_, T, C> {
    type Target = T;

    #[inline]
    fn deref(&self) -> &T {
        &self.guard
    }
}

impl<T, C: InterruptControl + ?Sized> DerefMut for IrqMutexGuard<'_, T, C> {
    #[inline]
    fn deref_mut(&mut self) -> &mut T {
        &mut self.guard
    }
}

impl<T, C: InterruptControl + ?Sized> Drop for IrqMutexGuard<'_, T, C> {
    #[inline]
    fn drop(&mut self) {
        // SAFETY: the guard is dropped exactly once, here, and never touched again.
        unsafe { ManuallyDrop::drop(&mut self.guard) };
        self.irq.irq_restore(self.saved);
    }
}
