//! Deferred calls: bind a functor and some of its arguments now, run it
//! later, possibly on another thread.

pub mod bind;
pub mod bind_state;
pub mod callback;
pub mod callback_helpers;
pub mod functor_traits;

pub use bind::{bind_once, bind_repeating, bind_weak_once, bind_weak_repeating};
pub use bind_state::BindStateBase;
pub use callback::{CallbackBase, OnceCallback, OnceClosure, RepeatingCallback, RepeatingClosure};
pub use callback_helpers::{do_nothing, ignore_result, ScopedClosureRunner};
pub use functor_traits::{OnceFunctor, RepeatingFunctor};
