//! Base library error types
//!
//! Contract violations are not errors: they go through `dcheck!`. The types
//! here cover the checked entry points whose failure a caller may act on.

/// Base library error type
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum BaseError {
    /// Callback error
    #[error("callback error: {0}")]
    Callback(#[from] CallbackError),
    /// Lock error
    #[error("lock error: {0}")]
    Lock(#[from] LockError),
}

/// Callback error kinds
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallbackError {
    #[error("callback is null")]
    Null,
    #[error("callback was cancelled")]
    Cancelled,
}

/// Lock error kinds
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockError {
    #[error("lock is held by another thread")]
    WouldBlock,
}

/// Result type for checked base operations
pub type Result<T> = core::result::Result<T, BaseError>;
