//! Thread identity for the current OS thread.
//!
//! `std::thread::ThreadId` is opaque, so lock-owner bookkeeping uses its own
//! small integer handed out the first time a thread asks for it.

use core::num::NonZeroU64;
use core::sync::atomic::{AtomicU64, Ordering};
use core::time::Duration;
use std::cell::Cell;

/// Opaque reference to a thread, comparable across threads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PlatformThreadRef(NonZeroU64);

impl PlatformThreadRef {
    /// Raw value, never zero. Used where an atomic slot stores "no thread"
    /// as zero.
    pub fn as_u64(self) -> u64 {
        self.0.get()
    }

    pub(crate) fn from_u64(raw: u64) -> Option<Self> {
        NonZeroU64::new(raw).map(PlatformThreadRef)
    }
}

static NEXT_THREAD_REF: AtomicU64 = AtomicU64::new(1);

thread_local! {
    static CURRENT_THREAD_REF: Cell<Option<PlatformThreadRef>> = const { Cell::new(None) };
}

/// Namespace for current-thread queries.
pub struct PlatformThread;

impl PlatformThread {
    /// Reference to the calling thread. Stable for the thread's lifetime and
    /// never reused by another thread.
    pub fn current_ref() -> PlatformThreadRef {
        CURRENT_THREAD_REF.with(|slot| match slot.get() {
            Some(thread_ref) => thread_ref,
            None => {
                let raw = NEXT_THREAD_REF.fetch_add(1, Ordering::Relaxed);
                let thread_ref = PlatformThreadRef::from_u64(raw)
                    .unwrap_or_else(|| crate::notreached!("thread reference counter wrapped"));
                slot.set(Some(thread_ref));
                thread_ref
            }
        })
    }

    /// Yield the rest of the current time slice.
    pub fn yield_current_thread() {
        std::thread::yield_now();
    }

    /// Sleep for `duration`.
    pub fn sleep(duration: Duration) {
        std::thread::sleep(duration);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn current_ref_is_stable() {
        assert_eq!(PlatformThread::current_ref(), PlatformThread::current_ref());
    }

    #[test]
    fn threads_get_distinct_refs() {
        let here = PlatformThread::current_ref();
        let there = thread::spawn(PlatformThread::current_ref).join().unwrap();
        assert_ne!(here, there);
        assert_ne!(there.as_u64(), 0);
    }
}
