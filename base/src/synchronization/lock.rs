//! Non-recursive mutual exclusion with held-state assertions.
//!
//! [`Lock`] guards no data of its own; it brackets critical sections. With
//! DCHECK on it records the owning thread so that recursive acquisition,
//! release by a non-owner, and [`Lock::assert_acquired`] can be checked.

use core::fmt;
use core::marker::PhantomData;
#[cfg(any(debug_assertions, feature = "dcheck-always-on"))]
use core::sync::atomic::{AtomicU64, Ordering};

use crate::error::{LockError, Result};
#[cfg(any(debug_assertions, feature = "dcheck-always-on"))]
use crate::threading::PlatformThread;

use super::lock_impl::LockImpl;

/// No owner.
#[cfg(any(debug_assertions, feature = "dcheck-always-on"))]
const NO_OWNER: u64 = 0;

pub struct Lock {
    lock: LockImpl,
    #[cfg(any(debug_assertions, feature = "dcheck-always-on"))]
    owning_thread: AtomicU64,
}

impl Lock {
    pub const fn new() -> Self {
        Lock {
            lock: LockImpl::new(),
            #[cfg(any(debug_assertions, feature = "dcheck-always-on"))]
            owning_thread: AtomicU64::new(NO_OWNER),
        }
    }

    /// Blocks until the lock is held by the calling thread. The caller must
    /// not already hold it.
    pub fn acquire(&self) {
        self.check_not_held_by_current_thread();
        self.lock.lock();
        self.check_unheld_and_mark();
    }

    /// Takes the lock if it is free; returns whether it was taken. The
    /// caller must not already hold it.
    pub fn try_acquire(&self) -> bool {
        self.check_not_held_by_current_thread();
        let acquired = self.lock.try_lock();
        if acquired {
            self.check_unheld_and_mark();
        }
        acquired
    }

    /// Releases the lock. The caller must hold it.
    pub fn release(&self) {
        self.check_held_and_unmark();
        // SAFETY: held by this thread, checked above when DCHECK is on.
        unsafe { self.lock.unlock() };
    }

    /// Asserts that the calling thread holds the lock. No-op when DCHECK is
    /// off.
    pub fn assert_acquired(&self) {
        #[cfg(any(debug_assertions, feature = "dcheck-always-on"))]
        dcheck_eq!(
            self.owning_thread.load(Ordering::Relaxed),
            PlatformThread::current_ref().as_u64()
        );
    }

    /// Whether acquiring threads of different priorities is safe from
    /// priority inversion. The spinning implementation gives no such
    /// guarantee.
    pub const fn handles_multiple_thread_priorities() -> bool {
        false
    }

    #[cfg(any(debug_assertions, feature = "dcheck-always-on"))]
    fn check_not_held_by_current_thread(&self) {
        dcheck!(
            self.owning_thread.load(Ordering::Relaxed) != PlatformThread::current_ref().as_u64(),
            "Lock acquired recursively by the thread that holds it"
        );
    }

    #[cfg(any(debug_assertions, feature = "dcheck-always-on"))]
    fn check_unheld_and_mark(&self) {
        let previous = self
            .owning_thread
            .swap(PlatformThread::current_ref().as_u64(), Ordering::Relaxed);
        dcheck_eq!(previous, NO_OWNER);
    }

    #[cfg(any(debug_assertions, feature = "dcheck-always-on"))]
    fn check_held_and_unmark(&self) {
        let previous = self.owning_thread.swap(NO_OWNER, Ordering::Relaxed);
        dcheck!(
            previous == PlatformThread::current_ref().as_u64(),
            "Lock released by a thread that does not hold it"
        );
    }

    #[cfg(not(any(debug_assertions, feature = "dcheck-always-on")))]
    fn check_not_held_by_current_thread(&self) {}

    #[cfg(not(any(debug_assertions, feature = "dcheck-always-on")))]
    fn check_unheld_and_mark(&self) {}

    #[cfg(not(any(debug_assertions, feature = "dcheck-always-on")))]
    fn check_held_and_unmark(&self) {}
}

impl Default for Lock {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Lock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Lock")
            .field("locked", &self.lock.is_locked())
            .finish()
    }
}

/// Holds a [`Lock`] for its lifetime.
#[must_use = "the lock is released as soon as the AutoLock is dropped"]
pub struct AutoLock<'a> {
    lock: &'a Lock,
    // Must be released by the acquiring thread.
    _not_send: PhantomData<*const ()>,
}

impl<'a> AutoLock<'a> {
    /// Acquires `lock`, blocking as needed.
    pub fn new(lock: &'a Lock) -> Self {
        lock.acquire();
        AutoLock {
            lock,
            _not_send: PhantomData,
        }
    }

    /// Takes over a lock the caller already holds.
    pub fn already_acquired(lock: &'a Lock) -> Self {
        lock.assert_acquired();
        AutoLock {
            lock,
            _not_send: PhantomData,
        }
    }

    /// Acquires `lock` only if it is free.
    pub fn try_new(lock: &'a Lock) -> Result<Self> {
        if lock.try_acquire() {
            Ok(AutoLock {
                lock,
                _not_send: PhantomData,
            })
        } else {
            Err(LockError::WouldBlock.into())
        }
    }
}

impl Drop for AutoLock<'_> {
    fn drop(&mut self) {
        self.lock.assert_acquired();
        self.lock.release();
    }
}

/// Releases a held [`Lock`] for its lifetime and re-acquires it on drop.
#[must_use = "the lock is re-acquired as soon as the AutoUnlock is dropped"]
pub struct AutoUnlock<'a> {
    lock: &'a Lock,
    _not_send: PhantomData<*const ()>,
}

impl<'a> AutoUnlock<'a> {
    pub fn new(lock: &'a Lock) -> Self {
        lock.assert_acquired();
        lock.release();
        AutoUnlock {
            lock,
            _not_send: PhantomData,
        }
    }
}

impl Drop for AutoUnlock<'_> {
    fn drop(&mut self) {
        self.lock.acquire();
    }
}
