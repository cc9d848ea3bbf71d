//! Synchronization primitives.

pub mod lock;
pub mod lock_impl;

pub use lock::{AutoLock, AutoUnlock, Lock};
pub use lock_impl::LockImpl;
