//! Type-erased storage for a functor and its bound arguments.
//!
//! Every bind allocates one `BindState<F, B>`. Callbacks only ever see its
//! header, [`BindStateBase`], which carries the reference count and three
//! function pointers that know the concrete type: one to invoke, one to
//! destroy, one to answer whether the call has been cancelled. This keeps
//! the callback type independent of what was bound without a vtable per
//! instantiation.

use core::cell::UnsafeCell;
use core::mem;
use core::ptr::NonNull;
use std::sync::{Arc, Weak};

use crate::memory::{
    adopt_ref, RefCountBase, RefCounted, RefCountedThreadSafeBase, ScopedRefPtr, StartRefCount,
};

use super::functor_traits::{OnceFunctor, RepeatingFunctor};

/// Storage for an invoke thunk of any signature.
///
/// Function pointers may be transmuted between function pointer types, so
/// the thunk is stored as `unsafe fn()` and cast back to its real signature
/// by the typed callback that knows it.
pub(crate) type InvokeFuncStorage = unsafe fn();

/// Real signature of an invoke thunk for unbound arguments `A` and result `R`.
pub(crate) type PolymorphicInvoke<A, R> = unsafe fn(NonNull<BindStateBase>, A) -> R;

/// Erases the signature of an invoke thunk.
pub(crate) fn erase_invoke<A, R>(invoke: PolymorphicInvoke<A, R>) -> InvokeFuncStorage {
    // SAFETY: function pointer to function pointer; only ever called after
    // `recover_invoke` with the same `A` and `R`.
    unsafe { mem::transmute::<PolymorphicInvoke<A, R>, InvokeFuncStorage>(invoke) }
}

/// Restores the signature of a thunk erased by [`erase_invoke`].
///
/// # Safety
///
/// `storage` must come from `erase_invoke::<A, R>`.
pub(crate) unsafe fn recover_invoke<A, R>(storage: InvokeFuncStorage) -> PolymorphicInvoke<A, R> {
    mem::transmute::<InvokeFuncStorage, PolymorphicInvoke<A, R>>(storage)
}

fn return_false(_: &BindStateBase) -> bool {
    false
}

/// Opaque header of every bind state.
#[repr(C)]
pub struct BindStateBase {
    ref_count: RefCountedThreadSafeBase,
    polymorphic_invoke: InvokeFuncStorage,
    destructor: unsafe fn(NonNull<BindStateBase>),
    is_cancelled: fn(&BindStateBase) -> bool,
}

// Bind states skip the first increment: the callback that allocates one
// adopts it.
unsafe impl RefCounted for BindStateBase {
    type Base = RefCountedThreadSafeBase;
    const REF_COUNT_PREFERENCE: StartRefCount = StartRefCount::FromOne;

    fn ref_count_base(&self) -> &RefCountedThreadSafeBase {
        &self.ref_count
    }

    unsafe fn destruct(this: NonNull<Self>) {
        let destructor = this.as_ref().destructor;
        destructor(this);
    }
}

impl BindStateBase {
    pub(crate) fn polymorphic_invoke(&self) -> InvokeFuncStorage {
        self.polymorphic_invoke
    }

    pub(crate) fn is_cancelled(&self) -> bool {
        (self.is_cancelled)(self)
    }

    pub(crate) fn has_one_ref(&self) -> bool {
        self.ref_count.has_one_ref()
    }
}

/// Concrete bind state: functor `F` with bound arguments `B`.
#[repr(C)]
pub(crate) struct BindState<F, B> {
    // Must stay first: the header is reached by casting the allocation.
    base: BindStateBase,
    // Taken out by the once invoker; only ever borrowed by the others.
    bound: UnsafeCell<Option<(F, B)>>,
}

impl<F, B> BindState<F, B> {
    /// Allocates a bind state and returns the first reference to it.
    pub(crate) fn create(
        polymorphic_invoke: InvokeFuncStorage,
        is_cancelled: Option<fn(&BindStateBase) -> bool>,
        functor: F,
        bound: B,
    ) -> ScopedRefPtr<BindStateBase> {
        let state = Box::new(BindState {
            base: BindStateBase {
                ref_count: RefCountedThreadSafeBase::for_type::<BindStateBase>(),
                polymorphic_invoke,
                destructor: Self::destroy,
                is_cancelled: is_cancelled.unwrap_or(return_false),
            },
            bound: UnsafeCell::new(Some((functor, bound))),
        });
        // SAFETY: `BindState` is `repr(C)` with the header first, and the
        // header's `destruct` frees it as a `Box<Self>` again.
        unsafe { adopt_ref(Box::into_raw(state) as *mut BindStateBase) }
    }

    unsafe fn destroy(base: NonNull<BindStateBase>) {
        drop(Box::from_raw(base.as_ptr() as *mut Self));
    }

    /// # Safety
    ///
    /// `base` must be the header of a live `BindState<F, B>`.
    pub(crate) unsafe fn from_base<'a>(base: NonNull<BindStateBase>) -> &'a Self {
        &*(base.as_ptr() as *const Self)
    }

    /// Moves the functor and bound arguments out.
    ///
    /// # Safety
    ///
    /// The caller holds the only reference to the state.
    pub(crate) unsafe fn take_bound(&self) -> (F, B) {
        dcheck!(self.base.has_one_ref(), "once invocation of a shared bind state");
        match (*self.bound.get()).take() {
            Some(bound) => bound,
            None => notreached!("once callback invoked twice"),
        }
    }

    /// # Safety
    ///
    /// Nobody takes the bound state while the reference lives.
    unsafe fn bound_ref(&self) -> &(F, B) {
        match &*self.bound.get() {
            Some(bound) => bound,
            None => notreached!("bind state was already consumed"),
        }
    }
}

// ---------------------------------------------------------------------------
// Invoke thunks
// ---------------------------------------------------------------------------

/// Runs a once-bound functor, consuming its bound arguments.
pub(crate) unsafe fn invoke_once<F, B, A, R>(base: NonNull<BindStateBase>, unbound: A) -> R
where
    F: OnceFunctor<B, A, Output = R>,
{
    let (functor, bound) = BindState::<F, B>::from_base(base).take_bound();
    functor.call_once(bound, unbound)
}

/// Runs a repeating functor with a copy of its bound arguments.
pub(crate) unsafe fn invoke_repeating<F, B, A, R>(base: NonNull<BindStateBase>, unbound: A) -> R
where
    F: RepeatingFunctor<B, A, Output = R>,
    B: Clone,
{
    let (functor, bound) = BindState::<F, B>::from_base(base).bound_ref();
    functor.call(bound.clone(), unbound)
}

/// Runs a once-bound functor if its weak receiver is still alive.
pub(crate) unsafe fn invoke_weak_once<F, T, A>(base: NonNull<BindStateBase>, unbound: A)
where
    F: OnceFunctor<(Arc<T>,), A, Output = ()>,
{
    let (functor, (receiver,)) = BindState::<F, (Weak<T>,)>::from_base(base).take_bound();
    if let Some(receiver) = receiver.upgrade() {
        functor.call_once((receiver,), unbound);
    }
}

/// Runs a repeating functor if its weak receiver is still alive.
pub(crate) unsafe fn invoke_weak_repeating<F, T, A>(base: NonNull<BindStateBase>, unbound: A)
where
    F: RepeatingFunctor<(Arc<T>,), A, Output = ()>,
{
    let (functor, (receiver,)) = BindState::<F, (Weak<T>,)>::from_base(base).bound_ref();
    if let Some(receiver) = receiver.upgrade() {
        functor.call((receiver,), unbound);
    }
}

/// Cancellation predicate for weak-receiver bind states.
pub(crate) fn weak_receiver_is_cancelled<F, T>(base: &BindStateBase) -> bool {
    // SAFETY: only installed on `BindState<F, (Weak<T>,)>`; readers never
    // overlap the once invoker, which requires the sole reference.
    unsafe {
        let state = BindState::<F, (Weak<T>,)>::from_base(NonNull::from(base));
        match &*state.bound.get() {
            Some((_, (receiver,))) => receiver.strong_count() == 0,
            None => true,
        }
    }
}
