//! Small callbacks and callback adapters.

use core::ptr::NonNull;

use super::bind_state::{erase_invoke, BindState, BindStateBase, PolymorphicInvoke};
use super::callback::{OnceCallback, OnceClosure, RepeatingCallback};

unsafe fn invoke_nothing<A>(_: NonNull<BindStateBase>, _: A) {}

/// A non-null callback that ignores its arguments.
pub fn do_nothing<A>() -> RepeatingCallback<A, ()> {
    let invoke: PolymorphicInvoke<A, ()> = invoke_nothing::<A>;
    RepeatingCallback::from_bind_state(BindState::create(erase_invoke(invoke), None, (), ()))
}

unsafe fn invoke_ignoring_result<A, R>(base: NonNull<BindStateBase>, args: A) {
    let (callback, ()) = BindState::<OnceCallback<A, R>, ()>::from_base(base).take_bound();
    let _ = callback.run(args);
}

/// Wraps `callback` so that its result is dropped. A null callback stays
/// null.
pub fn ignore_result<A, R>(callback: OnceCallback<A, R>) -> OnceCallback<A, ()> {
    if callback.is_null() {
        return OnceCallback::null();
    }
    let invoke: PolymorphicInvoke<A, ()> = invoke_ignoring_result::<A, R>;
    OnceCallback::from_bind_state(BindState::create(erase_invoke(invoke), None, callback, ()))
}

/// Runs a closure when it goes out of scope, unless the closure was
/// released first.
#[derive(Debug, Default)]
pub struct ScopedClosureRunner {
    closure: OnceClosure,
}

impl ScopedClosureRunner {
    pub fn new(closure: OnceClosure) -> Self {
        ScopedClosureRunner { closure }
    }

    /// Whether a closure is pending.
    pub fn is_set(&self) -> bool {
        !self.closure.is_null()
    }

    /// Runs the pending closure now, if any.
    pub fn run_and_reset(&mut self) {
        let closure = self.closure.take();
        if !closure.is_null() {
            closure.run(());
        }
    }

    /// Replaces the pending closure without running the old one.
    pub fn replace_closure(&mut self, closure: OnceClosure) {
        self.closure = closure;
    }

    /// Hands the pending closure back to the caller; nothing runs on drop.
    #[must_use]
    pub fn release(&mut self) -> OnceClosure {
        self.closure.take()
    }
}

impl Drop for ScopedClosureRunner {
    fn drop(&mut self) {
        self.run_and_reset();
    }
}
