//! Threading helpers.

pub mod platform_thread;

pub use platform_thread::{PlatformThread, PlatformThreadRef};
