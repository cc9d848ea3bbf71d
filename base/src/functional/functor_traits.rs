//! Arity adapters between a functor and its bound/unbound argument tuples.
//!
//! A bind splits a functor's parameters in two: a leading tuple captured at
//! bind time and a trailing tuple supplied at run time. These traits are
//! implemented for every `FnOnce`/`Fn` whose parameter list is the
//! concatenation of the two tuples, for up to four parameters on each side.

/// Functor callable once with `bound` followed by `unbound` arguments.
pub trait OnceFunctor<Bound, Unbound> {
    type Output;

    fn call_once(self, bound: Bound, unbound: Unbound) -> Self::Output;
}

/// Functor callable any number of times with `bound` followed by `unbound`
/// arguments.
pub trait RepeatingFunctor<Bound, Unbound> {
    type Output;

    fn call(&self, bound: Bound, unbound: Unbound) -> Self::Output;
}

macro_rules! impl_functor {
    ([$($b:ident),*] [$($u:ident),*]) => {
        impl<Func, R, $($b,)* $($u,)*> OnceFunctor<($($b,)*), ($($u,)*)> for Func
        where
            Func: FnOnce($($b,)* $($u,)*) -> R,
        {
            type Output = R;

            #[allow(non_snake_case, clippy::unused_unit)]
            #[inline]
            fn call_once(self, ($($b,)*): ($($b,)*), ($($u,)*): ($($u,)*)) -> R {
                self($($b,)* $($u,)*)
            }
        }

        impl<Func, R, $($b,)* $($u,)*> RepeatingFunctor<($($b,)*), ($($u,)*)> for Func
        where
            Func: Fn($($b,)* $($u,)*) -> R,
        {
            type Output = R;

            #[allow(non_snake_case, clippy::unused_unit)]
            #[inline]
            fn call(&self, ($($b,)*): ($($b,)*), ($($u,)*): ($($u,)*)) -> R {
                self($($b,)* $($u,)*)
            }
        }
    };
}

impl_functor!([] []);
impl_functor!([] [U1]);
impl_functor!([] [U1, U2]);
impl_functor!([] [U1, U2, U3]);
impl_functor!([] [U1, U2, U3, U4]);
impl_functor!([B1] []);
impl_functor!([B1] [U1]);
impl_functor!([B1] [U1, U2]);
impl_functor!([B1] [U1, U2, U3]);
impl_functor!([B1] [U1, U2, U3, U4]);
impl_functor!([B1, B2] []);
impl_functor!([B1, B2] [U1]);
impl_functor!([B1, B2] [U1, U2]);
impl_functor!([B1, B2] [U1, U2, U3]);
impl_functor!([B1, B2] [U1, U2, U3, U4]);
impl_functor!([B1, B2, B3] []);
impl_functor!([B1, B2, B3] [U1]);
impl_functor!([B1, B2, B3] [U1, U2]);
impl_functor!([B1, B2, B3] [U1, U2, U3]);
impl_functor!([B1, B2, B3] [U1, U2, U3, U4]);
impl_functor!([B1, B2, B3, B4] []);
impl_functor!([B1, B2, B3, B4] [U1]);
impl_functor!([B1, B2, B3, B4] [U1, U2]);
impl_functor!([B1, B2, B3, B4] [U1, U2, U3]);
impl_functor!([B1, B2, B3, B4] [U1, U2, U3, U4]);
