//! Property 3: Adopt policy
//!
//! A start-from-one payload taken over through the adopting path never trips
//! the adoption check. Taking its first reference any other way trips the
//! check exactly once per object.

use kpio_base::memory::{
    adopt_ref, make_ref_counted, wrap_ref_counted, RefCounted, RefCountedThreadSafeBase,
    StartRefCount,
};
use proptest::prelude::*;
use std::panic::{self, AssertUnwindSafe};

struct Adoptable {
    ref_count: RefCountedThreadSafeBase,
}

unsafe impl RefCounted for Adoptable {
    type Base = RefCountedThreadSafeBase;
    const REF_COUNT_PREFERENCE: StartRefCount = StartRefCount::FromOne;

    fn ref_count_base(&self) -> &RefCountedThreadSafeBase {
        &self.ref_count
    }
}

impl Adoptable {
    fn new() -> Self {
        Adoptable {
            ref_count: RefCountedThreadSafeBase::for_type::<Self>(),
        }
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Adopted objects accept further references.
    #[test]
    fn adopting_path_never_trips(objects in 1usize..16, copies in 0usize..8) {
        for i in 0..objects {
            let handle = if i % 2 == 0 {
                make_ref_counted(Adoptable::new())
            } else {
                let raw = Box::into_raw(Box::new(Adoptable::new()));
                unsafe { adopt_ref(raw) }
            };
            prop_assert!(handle.has_one_ref());
            let extra: Vec<_> = (0..copies).map(|_| handle.clone()).collect();
            prop_assert_eq!(handle.has_one_ref(), extra.is_empty());
        }
    }
}

#[cfg(debug_assertions)]
proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    /// Wrapping without adoption fails once per object.
    #[test]
    fn non_adopting_path_trips_once_per_object(objects in 1usize..8) {
        let mut trips = 0;
        for _ in 0..objects {
            // Leaked on purpose: the object is never validly owned.
            let raw = Box::into_raw(Box::new(Adoptable::new()));
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| unsafe {
                drop(wrap_ref_counted(raw));
            }));
            if outcome.is_err() {
                trips += 1;
            }
        }
        prop_assert_eq!(trips, objects);
    }
}
