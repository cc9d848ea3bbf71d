//! Callback handles.
//!
//! A callback is a reference to a bind state plus a copy of its invoke
//! thunk. The handle's type names only the unbound argument tuple `A` and
//! the result `R`; what was bound is erased. [`OnceCallback`] runs at most
//! once and is consumed by running. [`RepeatingCallback`] can be cloned and
//! run any number of times.
//!
//! Two handles are equal when they share a bind state. Handles that bound
//! equal values separately are not.

use core::fmt;
use core::marker::PhantomData;
use core::ptr::NonNull;

use crate::error::{CallbackError, Result};
use crate::memory::ScopedRefPtr;

use super::bind_state::{recover_invoke, BindStateBase, InvokeFuncStorage};

/// Type-independent part of every callback.
pub struct CallbackBase {
    bind_state: ScopedRefPtr<BindStateBase>,
    // Copied out of the bind state so running skips one indirection.
    polymorphic_invoke: Option<InvokeFuncStorage>,
}

impl CallbackBase {
    const fn null() -> Self {
        CallbackBase {
            bind_state: ScopedRefPtr::null(),
            polymorphic_invoke: None,
        }
    }

    fn new(bind_state: ScopedRefPtr<BindStateBase>) -> Self {
        let polymorphic_invoke = bind_state.get().map(BindStateBase::polymorphic_invoke);
        CallbackBase {
            bind_state,
            polymorphic_invoke,
        }
    }

    /// True when no bind state is referenced.
    pub fn is_null(&self) -> bool {
        self.bind_state.is_null()
    }

    /// Drops the reference to the bind state; the handle becomes null.
    pub fn reset(&mut self) {
        self.polymorphic_invoke = None;
        self.bind_state.reset();
    }

    /// Whether the bind state refuses to run. Must not be called on a null
    /// callback.
    pub fn is_cancelled(&self) -> bool {
        match self.bind_state.get() {
            Some(state) => state.is_cancelled(),
            None => notreached!("is_cancelled() on a null callback"),
        }
    }

    /// Identity comparison of the bind states.
    pub fn equals_core(&self, other: &CallbackBase) -> bool {
        ScopedRefPtr::ptr_eq(&self.bind_state, &other.bind_state)
    }

    fn take(&mut self) -> Self {
        CallbackBase {
            bind_state: self.bind_state.take(),
            polymorphic_invoke: self.polymorphic_invoke.take(),
        }
    }

    fn share(&self) -> Self {
        CallbackBase {
            bind_state: self.bind_state.clone(),
            polymorphic_invoke: self.polymorphic_invoke,
        }
    }

    /// # Safety
    ///
    /// The bind state must have been created with a thunk for `A` and `R`.
    unsafe fn invoke<A, R>(&self, args: A) -> R {
        let state = NonNull::new(self.bind_state.as_ptr() as *mut BindStateBase);
        match (self.polymorphic_invoke, state) {
            (Some(storage), Some(state)) => recover_invoke::<A, R>(storage)(state, args),
            _ => notreached!("run() on a null callback"),
        }
    }
}

impl fmt::Debug for CallbackBase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallbackBase")
            .field("bind_state", &self.bind_state.as_ptr())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// OnceCallback
// ---------------------------------------------------------------------------

/// A move-only callback taking unbound arguments `A` (a tuple) and
/// returning `R`. Running consumes it.
pub struct OnceCallback<A = (), R = ()> {
    base: CallbackBase,
    _signature: PhantomData<fn(A) -> R>,
}

/// A once callback with no unbound arguments and no result.
pub type OnceClosure = OnceCallback<()>;

impl<A, R> OnceCallback<A, R> {
    /// A callback that refers to nothing.
    pub const fn null() -> Self {
        OnceCallback {
            base: CallbackBase::null(),
            _signature: PhantomData,
        }
    }

    /// Wraps a bind state whose thunk takes `A` and returns `R`.
    pub(crate) fn from_bind_state(bind_state: ScopedRefPtr<BindStateBase>) -> Self {
        OnceCallback {
            base: CallbackBase::new(bind_state),
            _signature: PhantomData,
        }
    }

    pub fn is_null(&self) -> bool {
        self.base.is_null()
    }

    pub fn reset(&mut self) {
        self.base.reset();
    }

    pub fn is_cancelled(&self) -> bool {
        self.base.is_cancelled()
    }

    /// Moves the callback out, leaving a null one behind.
    pub fn take(&mut self) -> Self {
        OnceCallback {
            base: self.base.take(),
            _signature: PhantomData,
        }
    }

    /// Runs the callback with the unbound arguments and releases its bind
    /// state. Running a null callback is a contract violation.
    pub fn run(self, args: A) -> R {
        let base = self.base;
        if base.is_null() {
            notreached!("run() on a null OnceCallback");
        }
        // SAFETY: the signature parameters are fixed by the binder that
        // created the bind state.
        unsafe { base.invoke(args) }
    }

    /// Like [`run`](Self::run), but reports a null or cancelled callback
    /// instead of running it.
    pub fn try_run(self, args: A) -> Result<R> {
        if self.is_null() {
            return Err(CallbackError::Null.into());
        }
        if self.is_cancelled() {
            return Err(CallbackError::Cancelled.into());
        }
        Ok(self.run(args))
    }
}

impl<A, R> Default for OnceCallback<A, R> {
    fn default() -> Self {
        Self::null()
    }
}

impl<A, R> PartialEq for OnceCallback<A, R> {
    fn eq(&self, other: &Self) -> bool {
        self.base.equals_core(&other.base)
    }
}

impl<A, R> Eq for OnceCallback<A, R> {}

impl<A, R> fmt::Debug for OnceCallback<A, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OnceCallback")
            .field("bind_state", &self.base.bind_state.as_ptr())
            .finish()
    }
}

/// A repeating callback runs fine as a once callback; the bind state stays
/// shared with any remaining copies.
impl<A, R> From<RepeatingCallback<A, R>> for OnceCallback<A, R> {
    fn from(callback: RepeatingCallback<A, R>) -> Self {
        OnceCallback {
            base: callback.base,
            _signature: PhantomData,
        }
    }
}

// ---------------------------------------------------------------------------
// RepeatingCallback
// ---------------------------------------------------------------------------

/// A copyable callback taking unbound arguments `A` (a tuple) and returning
/// `R`. Copies share one bind state.
pub struct RepeatingCallback<A = (), R = ()> {
    base: CallbackBase,
    _signature: PhantomData<fn(A) -> R>,
}

/// A repeating callback with no unbound arguments and no result.
pub type RepeatingClosure = RepeatingCallback<()>;

impl<A, R> RepeatingCallback<A, R> {
    pub const fn null() -> Self {
        RepeatingCallback {
            base: CallbackBase::null(),
            _signature: PhantomData,
        }
    }

    pub(crate) fn from_bind_state(bind_state: ScopedRefPtr<BindStateBase>) -> Self {
        RepeatingCallback {
            base: CallbackBase::new(bind_state),
            _signature: PhantomData,
        }
    }

    pub fn is_null(&self) -> bool {
        self.base.is_null()
    }

    pub fn reset(&mut self) {
        self.base.reset();
    }

    pub fn is_cancelled(&self) -> bool {
        self.base.is_cancelled()
    }

    /// Runs the callback. Bound arguments are cloned for each run.
    pub fn run(&self, args: A) -> R {
        if self.base.is_null() {
            notreached!("run() on a null RepeatingCallback");
        }
        // SAFETY: see `OnceCallback::run`.
        unsafe { self.base.invoke(args) }
    }

    pub fn try_run(&self, args: A) -> Result<R> {
        if self.is_null() {
            return Err(CallbackError::Null.into());
        }
        if self.is_cancelled() {
            return Err(CallbackError::Cancelled.into());
        }
        Ok(self.run(args))
    }
}

impl<A, R> Clone for RepeatingCallback<A, R> {
    fn clone(&self) -> Self {
        RepeatingCallback {
            base: self.base.share(),
            _signature: PhantomData,
        }
    }
}

impl<A, R> Default for RepeatingCallback<A, R> {
    fn default() -> Self {
        Self::null()
    }
}

impl<A, R> PartialEq for RepeatingCallback<A, R> {
    fn eq(&self, other: &Self) -> bool {
        self.base.equals_core(&other.base)
    }
}

impl<A, R> Eq for RepeatingCallback<A, R> {}

impl<A, R> fmt::Debug for RepeatingCallback<A, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RepeatingCallback")
            .field("bind_state", &self.base.bind_state.as_ptr())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BaseError;
    use crate::functional::{bind_once, bind_repeating};

    fn add(a: i32, b: i32) -> i32 {
        a + b
    }

    #[test]
    fn null_callbacks() {
        let once: OnceClosure = OnceCallback::null();
        let repeating: RepeatingClosure = RepeatingCallback::default();
        assert!(once.is_null());
        assert!(repeating.is_null());
        assert_eq!(once, OnceClosure::null());
        assert_eq!(repeating, RepeatingClosure::null());
    }

    #[test]
    fn take_leaves_null_behind() {
        let mut cb: OnceCallback<(i32,), i32> = bind_once(add, (3,));
        let taken = cb.take();
        assert!(cb.is_null());
        assert!(!taken.is_null());
        assert_eq!(taken.run((4,)), 7);
    }

    #[test]
    fn reset_releases_state() {
        let mut cb: RepeatingCallback<(i32,), i32> = bind_repeating(add, (1,));
        let copy = cb.clone();
        cb.reset();
        assert!(cb.is_null());
        assert_eq!(copy.run((1,)), 2);
    }

    #[test]
    fn equality_is_identity() {
        let a: RepeatingCallback<(i32,), i32> = bind_repeating(add, (3,));
        let b: RepeatingCallback<(i32,), i32> = bind_repeating(add, (3,));
        let a2 = a.clone();
        assert_eq!(a, a2);
        assert_ne!(a, b);
        assert_ne!(a, RepeatingCallback::null());
    }

    #[test]
    fn repeating_converts_to_once_and_shares_state() {
        let repeating: RepeatingCallback<(i32,), i32> = bind_repeating(add, (10,));
        let once: OnceCallback<(i32,), i32> = repeating.clone().into();
        assert_eq!(once.run((5,)), 15);
        assert_eq!(repeating.run((6,)), 16);
    }

    #[test]
    fn try_run_reports_null() {
        let once: OnceCallback<(), u8> = OnceCallback::null();
        assert_eq!(
            once.try_run(()).err(),
            Some(BaseError::Callback(CallbackError::Null))
        );
        let repeating: RepeatingCallback<(), u8> = RepeatingCallback::null();
        assert_eq!(
            repeating.try_run(()).err(),
            Some(BaseError::Callback(CallbackError::Null))
        );
    }

    #[test]
    fn try_run_runs_live_callback() {
        let cb: OnceCallback<(i32,), i32> = bind_once(add, (2,));
        assert_eq!(cb.try_run((2,)), Ok(4));
    }

    #[test]
    #[should_panic(expected = "run() on a null OnceCallback")]
    fn running_null_once_callback_panics() {
        let cb: OnceClosure = OnceCallback::null();
        cb.run(());
    }

    #[test]
    #[should_panic(expected = "run() on a null RepeatingCallback")]
    fn running_null_repeating_callback_panics() {
        let cb: RepeatingClosure = RepeatingCallback::null();
        cb.run(());
    }

    #[test]
    #[should_panic(expected = "is_cancelled() on a null callback")]
    fn cancellation_query_on_null_once_callback_panics() {
        let cb: OnceClosure = OnceCallback::null();
        cb.is_cancelled();
    }

    #[test]
    #[should_panic(expected = "is_cancelled() on a null callback")]
    fn cancellation_query_on_null_repeating_callback_panics() {
        let cb: RepeatingClosure = RepeatingCallback::null();
        cb.is_cancelled();
    }

    #[test]
    fn callbacks_are_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<OnceCallback<(String,), Vec<u8>>>();
        assert_send_sync::<RepeatingCallback<(i32, i32), i32>>();
    }
}
