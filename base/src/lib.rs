//! KPIO Base Library
//!
//! Foundation primitives shared by the rest of the system: intrusive
//! reference counting, type-erased deferred calls, and a non-recursive lock
//! with held-state assertions.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │   functional: bind_once / bind_repeating    │
//! │   OnceCallback / RepeatingCallback          │
//! ├─────────────────────────────────────────────┤
//! │   memory: ScopedRefPtr / UniqueRef          │
//! │   RefCountedBase / RefCountedThreadSafeBase │
//! ├──────────────────────┬──────────────────────┤
//! │  atomic / sequence   │  synchronization     │
//! └──────────────────────┴──────────────────────┘
//! ```
//!
//! # Modules
//!
//! - `build_config`: DCHECK configuration and the `dcheck!` family
//! - `memory`: ref-counted object model and owning handles
//! - `functional`: bind states, callbacks, binders and helpers
//! - `synchronization`: `Lock`, `AutoLock`, `AutoUnlock`
//! - `sequence`: sequence tokens and `SequenceChecker`
//! - `threading`: current-thread identity
//! - `atomic`: reference and sequence counters
//!
//! # Contract checks
//!
//! Misuse (running a null callback, adopting twice, re-acquiring a held
//! lock) is a programmer error. With DCHECK on (debug builds or the
//! `dcheck-always-on` feature) it is logged and panics; otherwise it is not
//! checked.

#[macro_use]
pub mod build_config;

pub mod atomic;
pub mod error;
pub mod functional;
pub mod memory;
pub mod sequence;
pub mod synchronization;
pub mod threading;

// Re-exports for convenience
pub use error::{BaseError, CallbackError, LockError, Result};
pub use functional::{
    bind_once, bind_repeating, bind_weak_once, bind_weak_repeating, OnceCallback, OnceClosure,
    RepeatingCallback, RepeatingClosure,
};
pub use memory::{adopt_ref, make_ref_counted, RefCounted, ScopedRefPtr};
pub use synchronization::{AutoLock, AutoUnlock, Lock};

/// Library version
pub const VERSION: &str = "0.1.0";
