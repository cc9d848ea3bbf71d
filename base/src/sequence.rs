//! Sequence identity and sequence-affinity checks.
//!
//! A sequence is a logical thread of execution. Every OS thread implicitly
//! runs its own sequence; code that multiplexes several logical sequences on
//! one thread (a task runner, a test harness) installs an explicit token for
//! the duration of each task with [`ScopedSetSequenceTokenForCurrentThread`].

use core::marker::PhantomData;
use std::cell::Cell;

use crate::atomic::AtomicSequenceNumber;

static SEQUENCE_TOKEN_GENERATOR: AtomicSequenceNumber = AtomicSequenceNumber::new();

thread_local! {
    /// Token installed by the innermost live scope guard, if any.
    static SCOPED_SEQUENCE_TOKEN: Cell<Option<SequenceToken>> = const { Cell::new(None) };
    /// Implicit token for the OS thread itself, assigned lazily.
    static THREAD_SEQUENCE_TOKEN: Cell<Option<SequenceToken>> = const { Cell::new(None) };
}

/// Identifies one sequence. Tokens are never reused within a process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SequenceToken(u32);

impl SequenceToken {
    /// Creates a new, unique token.
    pub fn create() -> Self {
        SequenceToken(SEQUENCE_TOKEN_GENERATOR.get_next())
    }

    /// Token of the sequence the calling code runs on: the innermost scoped
    /// token if one is installed, otherwise the thread's implicit token.
    pub fn get_for_current_thread() -> Self {
        if let Some(token) = SCOPED_SEQUENCE_TOKEN.with(Cell::get) {
            return token;
        }
        THREAD_SEQUENCE_TOKEN.with(|slot| match slot.get() {
            Some(token) => token,
            None => {
                let token = SequenceToken::create();
                slot.set(Some(token));
                token
            }
        })
    }
}

/// Makes `token` the current sequence of this thread until dropped.
///
/// Guards nest and must be dropped in LIFO order; the previous token is
/// restored on drop.
#[derive(Debug)]
pub struct ScopedSetSequenceTokenForCurrentThread {
    token: SequenceToken,
    previous: Option<SequenceToken>,
    // Bound to the thread whose TLS slot it modified.
    _not_send: PhantomData<*const ()>,
}

impl ScopedSetSequenceTokenForCurrentThread {
    pub fn new(token: SequenceToken) -> Self {
        let previous = SCOPED_SEQUENCE_TOKEN.with(|slot| slot.replace(Some(token)));
        ScopedSetSequenceTokenForCurrentThread {
            token,
            previous,
            _not_send: PhantomData,
        }
    }
}

impl Drop for ScopedSetSequenceTokenForCurrentThread {
    fn drop(&mut self) {
        let current = SCOPED_SEQUENCE_TOKEN.with(|slot| slot.replace(self.previous));
        dcheck!(
            current == Some(self.token),
            "nested sequence token scopes must be dropped in LIFO order"
        );
    }
}

/// Verifies that calls happen on one sequence.
///
/// Binds to the first sequence it is checked on; `detach` makes it rebind
/// on the next check. Compiles to nothing and always passes when DCHECK is
/// off.
#[derive(Debug, Default)]
pub struct SequenceChecker {
    #[cfg(any(debug_assertions, feature = "dcheck-always-on"))]
    bound: Cell<Option<SequenceToken>>,
}

impl SequenceChecker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the caller is on the bound sequence. Binds to the caller's
    /// sequence when detached.
    #[cfg(any(debug_assertions, feature = "dcheck-always-on"))]
    pub fn called_on_valid_sequence(&self) -> bool {
        let current = SequenceToken::get_for_current_thread();
        match self.bound.get() {
            Some(bound) => bound == current,
            None => {
                self.bound.set(Some(current));
                true
            }
        }
    }

    #[cfg(not(any(debug_assertions, feature = "dcheck-always-on")))]
    pub fn called_on_valid_sequence(&self) -> bool {
        true
    }

    /// Unbinds; the next check binds to whichever sequence makes it.
    pub fn detach(&self) {
        #[cfg(any(debug_assertions, feature = "dcheck-always-on"))]
        self.bound.set(None);
    }
}
