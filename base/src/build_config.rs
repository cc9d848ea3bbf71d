//! Build configuration and contract checks.
//!
//! DCHECK bookkeeping (sequence affinity, adoption, lock ownership) is
//! compiled in when `debug_assertions` is set or the `dcheck-always-on`
//! feature is enabled. Release builds without the feature carry none of it.

/// Whether DCHECK contract checks are compiled into this build.
pub const DCHECK_IS_ON: bool = cfg!(any(debug_assertions, feature = "dcheck-always-on"));

/// Reports a contract violation and aborts the current thread of execution.
///
/// Violations are programmer errors, never recoverable failures, so this
/// logs at error level and panics.
#[cold]
#[inline(never)]
#[track_caller]
pub fn contract_violation(args: core::fmt::Arguments<'_>) -> ! {
    let location = core::panic::Location::caller();
    log::error!("[base] Check failed at {}: {}", location, args);
    panic!("Check failed: {}", args);
}

/// Asserts a contract when DCHECK is on. The condition is not evaluated
/// otherwise.
#[macro_export]
macro_rules! dcheck {
    ($cond:expr $(,)?) => {
        $crate::dcheck!($cond, "{}", stringify!($cond))
    };
    ($cond:expr, $($arg:tt)+) => {
        if $crate::build_config::DCHECK_IS_ON && !($cond) {
            $crate::build_config::contract_violation(format_args!($($arg)+));
        }
    };
}

/// Asserts `left == right` when DCHECK is on.
#[macro_export]
macro_rules! dcheck_eq {
    ($left:expr, $right:expr $(,)?) => {
        if $crate::build_config::DCHECK_IS_ON {
            match (&$left, &$right) {
                (l, r) if l != r => $crate::build_config::contract_violation(format_args!(
                    "{} == {} ({:?} vs. {:?})",
                    stringify!($left),
                    stringify!($right),
                    l,
                    r
                )),
                _ => {}
            }
        }
    };
}

/// Marks a path that callers must never reach, in every build.
#[macro_export]
macro_rules! notreached {
    ($($arg:tt)+) => {
        $crate::build_config::contract_violation(format_args!($($arg)+))
    };
}
