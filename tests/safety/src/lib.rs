//! KPIO Base Library Safety Verification
//!
//! End-to-end checks of the ownership and synchronization guarantees the
//! base library gives its users: payloads are destroyed exactly once,
//! callbacks run at most once and only while their receiver lives, and locks
//! exclude.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;

use kpio_base::functional::{
    bind_once, bind_repeating, bind_weak_repeating, OnceCallback, OnceClosure, RepeatingCallback,
    ScopedClosureRunner,
};
use kpio_base::memory::{
    make_ref_counted, RefCounted, RefCountedBase, RefCountedThreadSafeBase, ScopedRefPtr,
    StartRefCount,
};
use kpio_base::synchronization::{AutoLock, AutoUnlock, Lock};
use spin::Mutex;

/// Safety check result
#[derive(Debug, Clone)]
pub enum SafetyResult {
    /// Check passed
    Pass,
    /// Check failed with error
    Fail(String),
}

impl SafetyResult {
    pub fn passed(&self) -> bool {
        matches!(self, SafetyResult::Pass)
    }
}

/// Safety check trait
pub trait SafetyCheck {
    fn name(&self) -> &str;
    fn run(&mut self) -> SafetyResult;
}

struct Counted {
    ref_count: RefCountedBase,
    destroyed: Arc<AtomicUsize>,
}

unsafe impl RefCounted for Counted {
    type Base = RefCountedBase;

    fn ref_count_base(&self) -> &RefCountedBase {
        &self.ref_count
    }
}

impl Drop for Counted {
    fn drop(&mut self) {
        self.destroyed.fetch_add(1, Ordering::SeqCst);
    }
}

impl Counted {
    fn new(destroyed: &Arc<AtomicUsize>) -> Self {
        Counted {
            ref_count: RefCountedBase::new(StartRefCount::FromZero),
            destroyed: Arc::clone(destroyed),
        }
    }
}

struct SharedCounted {
    ref_count: RefCountedThreadSafeBase,
    destroyed: Arc<AtomicUsize>,
}

unsafe impl RefCounted for SharedCounted {
    type Base = RefCountedThreadSafeBase;
    const REF_COUNT_PREFERENCE: StartRefCount = StartRefCount::FromOne;

    fn ref_count_base(&self) -> &RefCountedThreadSafeBase {
        &self.ref_count
    }
}

impl Drop for SharedCounted {
    fn drop(&mut self) {
        self.destroyed.fetch_add(1, Ordering::SeqCst);
    }
}

/// Two handles over one payload: destroyed once, after the second drop
pub struct RefCountLifecycleTest;

impl SafetyCheck for RefCountLifecycleTest {
    fn name(&self) -> &str {
        "refcount_lifecycle"
    }

    fn run(&mut self) -> SafetyResult {
        let destroyed = Arc::new(AtomicUsize::new(0));
        let a = make_ref_counted(Counted::new(&destroyed));
        if !a.has_one_ref() {
            return SafetyResult::Fail(String::from("Fresh handle should hold the only reference"));
        }

        let b = a.clone();
        if a != b || b.has_one_ref() {
            return SafetyResult::Fail(String::from("Copy should share the payload"));
        }

        drop(a);
        if destroyed.load(Ordering::SeqCst) != 0 || !b.has_one_ref() {
            return SafetyResult::Fail(String::from("Payload destroyed while still referenced"));
        }

        drop(b);
        if destroyed.load(Ordering::SeqCst) != 1 {
            return SafetyResult::Fail(String::from("Payload should be destroyed exactly once"));
        }
        SafetyResult::Pass
    }
}

/// Adopted thread-safe payload released from many threads
pub struct SharedRefCountTest;

impl SafetyCheck for SharedRefCountTest {
    fn name(&self) -> &str {
        "shared_refcount"
    }

    fn run(&mut self) -> SafetyResult {
        let destroyed = Arc::new(AtomicUsize::new(0));
        let handle = make_ref_counted(SharedCounted {
            ref_count: RefCountedThreadSafeBase::for_type::<SharedCounted>(),
            destroyed: Arc::clone(&destroyed),
        });

        let workers: Vec<_> = (0..8)
            .map(|_| {
                let mine = handle.clone();
                thread::spawn(move || {
                    for _ in 0..1000 {
                        drop(mine.clone());
                    }
                })
            })
            .collect();
        drop(handle);

        for worker in workers {
            if worker.join().is_err() {
                return SafetyResult::Fail(String::from("Worker panicked"));
            }
        }
        match destroyed.load(Ordering::SeqCst) {
            1 => SafetyResult::Pass,
            n => SafetyResult::Fail(format!("Destroyed {} times", n)),
        }
    }
}

/// Sole reference to a single-threaded payload handed to another thread
pub struct UniqueHandoffTest;

impl SafetyCheck for UniqueHandoffTest {
    fn name(&self) -> &str {
        "unique_handoff"
    }

    fn run(&mut self) -> SafetyResult {
        let destroyed = Arc::new(AtomicUsize::new(0));
        let handle = make_ref_counted(Counted::new(&destroyed));
        let unique = match handle.into_unique() {
            Ok(unique) => unique,
            Err(_) => return SafetyResult::Fail(String::from("Sole handle refused handoff")),
        };

        let joined = thread::spawn(move || {
            let shared = unique.into_shared();
            let copy = shared.clone();
            drop(shared);
            copy.has_one_ref()
        })
        .join();

        match joined {
            Ok(true) if destroyed.load(Ordering::SeqCst) == 1 => SafetyResult::Pass,
            Ok(_) => SafetyResult::Fail(String::from("Handoff lost or leaked a reference")),
            Err(_) => SafetyResult::Fail(String::from("Receiving thread panicked")),
        }
    }
}

/// Once callback: bound and unbound arguments, consumed by running
pub struct OnceCallbackTest;

impl SafetyCheck for OnceCallbackTest {
    fn name(&self) -> &str {
        "once_callback"
    }

    fn run(&mut self) -> SafetyResult {
        fn add(a: i32, b: i32) -> i32 {
            a + b
        }

        let mut pending: OnceCallback<(i32,), i32> = bind_once(add, (3,));
        let cb = pending.take();
        if !pending.is_null() {
            return SafetyResult::Fail(String::from("Moved-from callback should be null"));
        }
        if cb.run((4,)) != 7 {
            return SafetyResult::Fail(String::from("add(3, 4) should be 7"));
        }

        let destroyed = Arc::new(AtomicUsize::new(0));
        let payload = make_ref_counted(SharedCounted {
            ref_count: RefCountedThreadSafeBase::for_type::<SharedCounted>(),
            destroyed: Arc::clone(&destroyed),
        });
        let unrun: OnceClosure = bind_once(drop::<ScopedRefPtr<SharedCounted>>, (payload,));
        drop(unrun);
        if destroyed.load(Ordering::SeqCst) != 1 {
            return SafetyResult::Fail(String::from("Unrun callback leaked its bound state"));
        }
        SafetyResult::Pass
    }
}

/// Repeating callback shared across threads, and weak receivers
pub struct RepeatingCallbackTest;

impl SafetyCheck for RepeatingCallbackTest {
    fn name(&self) -> &str {
        "repeating_callback"
    }

    fn run(&mut self) -> SafetyResult {
        let log = Arc::new(Mutex::new(Vec::new()));
        let cb: RepeatingCallback<(u32,)> = bind_repeating(
            |log: Arc<Mutex<Vec<u32>>>, value: u32| log.lock().push(value),
            (Arc::clone(&log),),
        );

        let workers: Vec<_> = (0..4u32)
            .map(|t| {
                let cb = cb.clone();
                thread::spawn(move || {
                    for i in 0..25 {
                        cb.run((t * 100 + i,));
                    }
                })
            })
            .collect();
        for worker in workers {
            if worker.join().is_err() {
                return SafetyResult::Fail(String::from("Worker panicked"));
            }
        }
        if log.lock().len() != 100 {
            return SafetyResult::Fail(String::from("Lost callback runs"));
        }

        let receiver = Arc::new(Mutex::new(0u32));
        let weak: RepeatingCallback<(u32,)> = bind_weak_repeating(
            |target: Arc<Mutex<u32>>, n: u32| *target.lock() += n,
            Arc::downgrade(&receiver),
        );
        weak.run((2,));
        let seen = *receiver.lock();
        drop(receiver);
        if seen != 2 || !weak.is_cancelled() {
            return SafetyResult::Fail(String::from(
                "Weak callback should cancel with its receiver",
            ));
        }
        weak.run((5,));
        SafetyResult::Pass
    }
}

/// Scoped closure runs exactly once unless released
pub struct ScopedClosureTest;

impl SafetyCheck for ScopedClosureTest {
    fn name(&self) -> &str {
        "scoped_closure"
    }

    fn run(&mut self) -> SafetyResult {
        let runs = Arc::new(AtomicUsize::new(0));
        let closure = |runs: &Arc<AtomicUsize>| -> OnceClosure {
            bind_once(
                |runs: Arc<AtomicUsize>| {
                    runs.fetch_add(1, Ordering::SeqCst);
                },
                (Arc::clone(runs),),
            )
        };

        drop(ScopedClosureRunner::new(closure(&runs)));
        let released = ScopedClosureRunner::new(closure(&runs)).release();
        drop(released);

        match runs.load(Ordering::SeqCst) {
            1 => SafetyResult::Pass,
            n => SafetyResult::Fail(format!("Closure ran {} times", n)),
        }
    }
}

/// Lock exclusion and scoped release
pub struct LockSafetyTest;

impl SafetyCheck for LockSafetyTest {
    fn name(&self) -> &str {
        "lock_safety"
    }

    fn run(&mut self) -> SafetyResult {
        let lock = Arc::new(Lock::new());
        let counter = Arc::new(AtomicUsize::new(0));

        let workers: Vec<_> = (0..4)
            .map(|_| {
                let lock = Arc::clone(&lock);
                let counter = Arc::clone(&counter);
                thread::spawn(move || {
                    for _ in 0..250 {
                        let _guard = AutoLock::new(&lock);
                        let value = counter.load(Ordering::Relaxed);
                        counter.store(value + 1, Ordering::Relaxed);
                    }
                })
            })
            .collect();
        for worker in workers {
            if worker.join().is_err() {
                return SafetyResult::Fail(String::from("Worker panicked"));
            }
        }
        if counter.load(Ordering::SeqCst) != 1000 {
            return SafetyResult::Fail(String::from("Counter mismatch"));
        }

        let _guard = AutoLock::new(&lock);
        let other_got_in = {
            let _unlocked = AutoUnlock::new(&lock);
            let other = Arc::clone(&lock);
            thread::spawn(move || {
                let taken = other.try_acquire();
                if taken {
                    other.release();
                }
                taken
            })
            .join()
            .unwrap_or(false)
        };
        if !other_got_in {
            return SafetyResult::Fail(String::from("AutoUnlock should release the lock"));
        }
        SafetyResult::Pass
    }
}

/// Run all safety tests
pub fn run_all_tests() -> Vec<(String, SafetyResult)> {
    let mut results = Vec::new();

    let mut tests: Vec<Box<dyn SafetyCheck>> = vec![
        Box::new(RefCountLifecycleTest),
        Box::new(SharedRefCountTest),
        Box::new(UniqueHandoffTest),
        Box::new(OnceCallbackTest),
        Box::new(RepeatingCallbackTest),
        Box::new(ScopedClosureTest),
        Box::new(LockSafetyTest),
    ];

    for test in tests.iter_mut() {
        let result = test.run();
        if !result.passed() {
            log::warn!("[KPIO Safety] {} failed: {:?}", test.name(), result);
        }
        results.push((String::from(test.name()), result));
    }

    results
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_checks_pass() {
        for (name, result) in run_all_tests() {
            assert!(result.passed(), "{} failed: {:?}", name, result);
        }
    }
}
