//! Low-level atomic reference count.
//!
//! Increments are relaxed. Decrements are acquire-release so the thread
//! that observes the count reaching zero also observes every write made by
//! previous owners before they released, which makes destroying the payload
//! race-free.

use core::sync::atomic::{AtomicU32, Ordering};

/// Atomic reference count used by the thread-safe ref-counted base.
#[derive(Debug)]
pub struct AtomicRefCount {
    ref_count: AtomicU32,
}

impl AtomicRefCount {
    pub const fn new(initial: u32) -> Self {
        AtomicRefCount {
            ref_count: AtomicU32::new(initial),
        }
    }

    /// Increment by one.
    #[inline]
    pub fn increment(&self) {
        self.increment_by(1);
    }

    /// Increment by `increment`, which must be positive. Returns the
    /// previous value.
    #[inline]
    pub fn increment_by(&self, increment: u32) -> u32 {
        self.ref_count.fetch_add(increment, Ordering::Relaxed)
    }

    /// Decrement by one. Returns `false` if the count dropped to zero and
    /// `true` otherwise.
    #[inline]
    pub fn decrement(&self) -> bool {
        self.ref_count.fetch_sub(1, Ordering::AcqRel) != 1
    }

    /// Whether the count is exactly one. An acquire load, so the caller may
    /// treat the object as exclusively owned afterwards.
    #[inline]
    pub fn is_one(&self) -> bool {
        self.ref_count.load(Ordering::Acquire) == 1
    }

    /// Whether the count is zero. An acquire load.
    #[inline]
    pub fn is_zero(&self) -> bool {
        self.ref_count.load(Ordering::Acquire) == 0
    }

    /// Current value, for diagnostics only.
    #[inline]
    pub fn subtle_ref_count_for_debug(&self) -> u32 {
        self.ref_count.load(Ordering::Relaxed)
    }
}

impl Default for AtomicRefCount {
    fn default() -> Self {
        Self::new(0)
    }
}
