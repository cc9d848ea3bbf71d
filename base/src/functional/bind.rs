//! Binding functors and leading arguments into callbacks.
//!
//! Bound arguments are a tuple moved into the bind state at bind time; the
//! remaining parameters become the callback's unbound tuple `A`:
//!
//! ```
//! use kpio_base::functional::{bind_once, OnceCallback};
//!
//! fn add(a: i32, b: i32) -> i32 {
//!     a + b
//! }
//!
//! let cb: OnceCallback<(i32,), i32> = bind_once(add, (3,));
//! assert_eq!(cb.run((4,)), 7);
//! ```
//!
//! A once callback hands its bound values to the functor by move, so
//! move-only values may be bound. A repeating callback clones them for each
//! run. Everything bound must be `Send`, and for repeating callbacks `Sync`
//! as well, so that the resulting callback can run on any thread.

use std::sync::{Arc, Weak};

use super::bind_state::{
    erase_invoke, invoke_once, invoke_repeating, invoke_weak_once, invoke_weak_repeating,
    weak_receiver_is_cancelled, BindState, PolymorphicInvoke,
};
use super::callback::{OnceCallback, RepeatingCallback};
use super::functor_traits::{OnceFunctor, RepeatingFunctor};

/// Binds `functor` to the leading arguments `bound` and returns a callback
/// that runs at most once.
pub fn bind_once<F, B, A, R>(functor: F, bound: B) -> OnceCallback<A, R>
where
    F: OnceFunctor<B, A, Output = R> + Send + 'static,
    B: Send + 'static,
{
    let invoke: PolymorphicInvoke<A, R> = invoke_once::<F, B, A, R>;
    OnceCallback::from_bind_state(BindState::create(erase_invoke(invoke), None, functor, bound))
}

/// Binds `functor` to the leading arguments `bound` and returns a callback
/// that can be copied and run repeatedly.
pub fn bind_repeating<F, B, A, R>(functor: F, bound: B) -> RepeatingCallback<A, R>
where
    F: RepeatingFunctor<B, A, Output = R> + Send + Sync + 'static,
    B: Clone + Send + Sync + 'static,
{
    let invoke: PolymorphicInvoke<A, R> = invoke_repeating::<F, B, A, R>;
    RepeatingCallback::from_bind_state(BindState::create(
        erase_invoke(invoke),
        None,
        functor,
        bound,
    ))
}

/// Binds `functor` to a weakly held receiver. The receiver is upgraded and
/// passed as the first argument when the callback runs; once it is gone the
/// callback reports itself cancelled and running it does nothing.
pub fn bind_weak_once<F, T, A>(functor: F, receiver: Weak<T>) -> OnceCallback<A, ()>
where
    F: OnceFunctor<(Arc<T>,), A, Output = ()> + Send + 'static,
    T: Send + Sync + 'static,
{
    let invoke: PolymorphicInvoke<A, ()> = invoke_weak_once::<F, T, A>;
    OnceCallback::from_bind_state(BindState::create(
        erase_invoke(invoke),
        Some(weak_receiver_is_cancelled::<F, T>),
        functor,
        (receiver,),
    ))
}

/// Repeating counterpart of [`bind_weak_once`].
pub fn bind_weak_repeating<F, T, A>(functor: F, receiver: Weak<T>) -> RepeatingCallback<A, ()>
where
    F: RepeatingFunctor<(Arc<T>,), A, Output = ()> + Send + Sync + 'static,
    T: Send + Sync + 'static,
{
    let invoke: PolymorphicInvoke<A, ()> = invoke_weak_repeating::<F, T, A>;
    RepeatingCallback::from_bind_state(BindState::create(
        erase_invoke(invoke),
        Some(weak_receiver_is_cancelled::<F, T>),
        functor,
        (receiver,),
    ))
}
