//! Platform lock behind [`Lock`](super::Lock).
//!
//! A test-and-set spin lock that yields the thread while contended. It has
//! no owner tracking of its own and is not recursive.

use core::mem;

use spin::mutex::SpinMutex;
use spin::relax::Yield;

pub struct LockImpl {
    lock: SpinMutex<(), Yield>,
}

impl LockImpl {
    pub const fn new() -> Self {
        LockImpl {
            lock: SpinMutex::new(()),
        }
    }

    /// Takes the lock if it is free. Never blocks.
    pub fn try_lock(&self) -> bool {
        match self.lock.try_lock() {
            Some(guard) => {
                // Held until `unlock`.
                mem::forget(guard);
                true
            }
            None => false,
        }
    }

    /// Blocks until the lock is taken.
    pub fn lock(&self) {
        if self.try_lock() {
            return;
        }
        #[cfg(feature = "trace-locks")]
        log::trace!("[base] lock {:p} contended", self);
        mem::forget(self.lock.lock());
    }

    /// # Safety
    ///
    /// The calling thread must hold the lock.
    pub unsafe fn unlock(&self) {
        self.lock.force_unlock();
    }

    pub fn is_locked(&self) -> bool {
        self.lock.is_locked()
    }
}

impl Default for LockImpl {
    fn default() -> Self {
        Self::new()
    }
}
