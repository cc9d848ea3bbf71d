//! Intrusive reference counting.
//!
//! A ref-counted payload embeds one of two bases and implements
//! [`RefCounted`] to tell [`ScopedRefPtr`](super::ScopedRefPtr) where the
//! base lives and how to destroy the payload:
//!
//! ```
//! use kpio_base::memory::{make_ref_counted, RefCounted, RefCountedBase, StartRefCount};
//!
//! struct Document {
//!     ref_count: RefCountedBase,
//!     title: String,
//! }
//!
//! unsafe impl RefCounted for Document {
//!     type Base = RefCountedBase;
//!
//!     fn ref_count_base(&self) -> &RefCountedBase {
//!         &self.ref_count
//!     }
//! }
//!
//! let doc = make_ref_counted(Document {
//!     ref_count: RefCountedBase::new(StartRefCount::FromZero),
//!     title: "untitled".into(),
//! });
//! let alias = doc.clone();
//! assert_eq!(alias.title, "untitled");
//! ```
//!
//! [`RefCountedBase`] is a plain counter. Once an object has more than one
//! reference, every count change must come from the same sequence; the
//! object may move to another sequence only while it has a single reference.
//! With DCHECK on this is verified at runtime. [`RefCountedThreadSafeBase`]
//! uses an atomic counter and may be shared freely.
//!
//! The count starts from zero unless the payload opts into
//! [`StartRefCount::FromOne`] through `REF_COUNT_PREFERENCE`. Such objects
//! skip the first increment, and their first reference must be taken with
//! [`adopt_ref`](super::adopt_ref) or
//! [`make_ref_counted`](super::make_ref_counted).

use core::marker::PhantomData;
use core::ptr::NonNull;
use std::cell::Cell;

#[cfg(any(debug_assertions, feature = "dcheck-always-on"))]
use core::sync::atomic::{AtomicU8, Ordering};

use crate::atomic::AtomicRefCount;
use crate::sequence::SequenceChecker;

/// Initial reference count policy, fixed at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartRefCount {
    FromZero,
    FromOne,
}

bitflags::bitflags! {
    /// DCHECK-only lifecycle state of a ref-count base.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    struct DebugFlags: u8 {
        /// Created with a count of one and not adopted yet.
        const NEEDS_ADOPT_REF = 1 << 0;
        /// The count reached zero; the payload is being destroyed.
        const IN_DTOR = 1 << 1;
    }
}

const NEEDS_ADOPTION_MESSAGE: &str =
    "This RefCounted object is created with non-zero reference count. \
     The first reference to such a object has to be made by adopt_ref or make_ref_counted.";

/// Operations shared by both count bases.
pub trait RefCountBase {
    /// Adds one reference.
    fn add_ref(&self);

    /// Drops one reference. Returns `true` when the count reached zero and
    /// the caller must destroy the payload.
    fn release(&self) -> bool;

    /// Whether the count is exactly one.
    fn has_one_ref(&self) -> bool;

    /// Marks a start-from-one object as adopted by its first owner.
    #[doc(hidden)]
    fn adopted(&self);
}

/// A payload with an embedded reference count.
///
/// # Safety
///
/// `ref_count_base` must return the same embedded base for the whole life of
/// the object, and that base must have been created with
/// `Self::REF_COUNT_PREFERENCE`. `destruct` must release the storage the
/// object was allocated with; the default reclaims a `Box`, which is what
/// [`make_ref_counted`](super::make_ref_counted) allocates.
pub unsafe trait RefCounted {
    type Base: RefCountBase;

    const REF_COUNT_PREFERENCE: StartRefCount = StartRefCount::FromZero;

    fn ref_count_base(&self) -> &Self::Base;

    /// Destroys an object whose count reached zero.
    ///
    /// # Safety
    ///
    /// Called exactly once, by the owner whose `release` returned `true`.
    unsafe fn destruct(this: NonNull<Self>)
    where
        Self: Sized,
    {
        drop(Box::from_raw(this.as_ptr()));
    }
}

thread_local! {
    static CROSS_THREAD_REF_COUNT_ACCESS_ALLOW_COUNT: Cell<usize> = const { Cell::new(0) };
}

fn cross_thread_ref_count_access_allowed() -> bool {
    CROSS_THREAD_REF_COUNT_ACCESS_ALLOW_COUNT.with(Cell::get) > 0
}

/// Disables the sequence check of [`RefCountedBase`] on this thread while in
/// scope.
///
/// For pre-existing code that serialises access across sequences by other
/// means. New code should use [`RefCountedThreadSafeBase`] or hand the only
/// reference over instead.
#[derive(Debug)]
pub struct ScopedAllowCrossThreadRefCountAccess {
    _not_send: PhantomData<*const ()>,
}

impl ScopedAllowCrossThreadRefCountAccess {
    pub fn new() -> Self {
        CROSS_THREAD_REF_COUNT_ACCESS_ALLOW_COUNT.with(|count| count.set(count.get() + 1));
        ScopedAllowCrossThreadRefCountAccess {
            _not_send: PhantomData,
        }
    }
}

impl Default for ScopedAllowCrossThreadRefCountAccess {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for ScopedAllowCrossThreadRefCountAccess {
    fn drop(&mut self) {
        CROSS_THREAD_REF_COUNT_ACCESS_ALLOW_COUNT.with(|count| count.set(count.get() - 1));
    }
}

// ---------------------------------------------------------------------------
// RefCountedBase
// ---------------------------------------------------------------------------

/// Non-atomic reference count with sequence-affinity checks.
#[derive(Debug)]
pub struct RefCountedBase {
    ref_count: Cell<u32>,
    #[cfg(any(debug_assertions, feature = "dcheck-always-on"))]
    flags: Cell<DebugFlags>,
    #[cfg(any(debug_assertions, feature = "dcheck-always-on"))]
    sequence_checker: SequenceChecker,
}

impl RefCountedBase {
    pub fn new(preference: StartRefCount) -> Self {
        let initial = match preference {
            StartRefCount::FromZero => 0,
            StartRefCount::FromOne => 1,
        };
        RefCountedBase {
            ref_count: Cell::new(initial),
            #[cfg(any(debug_assertions, feature = "dcheck-always-on"))]
            flags: Cell::new(if preference == StartRefCount::FromOne {
                DebugFlags::NEEDS_ADOPT_REF
            } else {
                DebugFlags::empty()
            }),
            #[cfg(any(debug_assertions, feature = "dcheck-always-on"))]
            sequence_checker: SequenceChecker::new(),
        }
    }

    /// Base for a payload of type `T`, honouring its count preference.
    pub fn for_type<T: RefCounted<Base = Self>>() -> Self {
        Self::new(T::REF_COUNT_PREFERENCE)
    }

    /// Whether it is safe to read or write the owning object from the
    /// calling sequence.
    ///
    /// Unlike a separate [`SequenceChecker`], this never fails while there
    /// is a single reference, so a singly referenced object may be passed
    /// between sequences. It traps when the sending side keeps a reference.
    pub fn is_on_valid_sequence(&self) -> bool {
        #[cfg(any(debug_assertions, feature = "dcheck-always-on"))]
        {
            self.ref_count.get() <= 1 || self.called_on_valid_sequence()
        }
        #[cfg(not(any(debug_assertions, feature = "dcheck-always-on")))]
        {
            true
        }
    }

    #[cfg(any(debug_assertions, feature = "dcheck-always-on"))]
    fn called_on_valid_sequence(&self) -> bool {
        cross_thread_ref_count_access_allowed() || self.sequence_checker.called_on_valid_sequence()
    }

    #[cfg(any(debug_assertions, feature = "dcheck-always-on"))]
    fn has_flag(&self, flag: DebugFlags) -> bool {
        self.flags.get().contains(flag)
    }

    #[cfg(any(debug_assertions, feature = "dcheck-always-on"))]
    fn set_flag(&self, flag: DebugFlags, value: bool) {
        let mut flags = self.flags.get();
        flags.set(flag, value);
        self.flags.set(flags);
    }
}

impl RefCountBase for RefCountedBase {
    fn add_ref(&self) {
        #[cfg(any(debug_assertions, feature = "dcheck-always-on"))]
        {
            dcheck!(!self.has_flag(DebugFlags::IN_DTOR), "add_ref on an object being destroyed");
            dcheck!(!self.has_flag(DebugFlags::NEEDS_ADOPT_REF), "{}", NEEDS_ADOPTION_MESSAGE);
            if self.ref_count.get() >= 1 {
                dcheck!(
                    self.called_on_valid_sequence(),
                    "RefCounted object shared across sequences"
                );
            }
        }

        match self.ref_count.get().checked_add(1) {
            Some(count) => self.ref_count.set(count),
            None => notreached!("reference count overflow"),
        }
    }

    fn release(&self) -> bool {
        #[cfg(any(debug_assertions, feature = "dcheck-always-on"))]
        dcheck!(!self.has_flag(DebugFlags::IN_DTOR), "release on an object being destroyed");
        dcheck!(self.ref_count.get() > 0, "release without a matching add_ref");

        let count = self.ref_count.get().wrapping_sub(1);
        self.ref_count.set(count);

        #[cfg(any(debug_assertions, feature = "dcheck-always-on"))]
        {
            if count == 0 {
                self.set_flag(DebugFlags::IN_DTOR, true);
            }
            if count >= 1 {
                dcheck!(
                    self.called_on_valid_sequence(),
                    "RefCounted object shared across sequences"
                );
            }
            if count == 1 {
                self.sequence_checker.detach();
            }
        }

        count == 0
    }

    fn has_one_ref(&self) -> bool {
        self.ref_count.get() == 1
    }

    fn adopted(&self) {
        #[cfg(any(debug_assertions, feature = "dcheck-always-on"))]
        {
            dcheck!(
                self.has_flag(DebugFlags::NEEDS_ADOPT_REF),
                "object adopted twice or does not start from one"
            );
            self.set_flag(DebugFlags::NEEDS_ADOPT_REF, false);
        }
    }
}

impl Drop for RefCountedBase {
    fn drop(&mut self) {
        #[cfg(any(debug_assertions, feature = "dcheck-always-on"))]
        if !std::thread::panicking() {
            dcheck!(
                self.has_flag(DebugFlags::IN_DTOR) || self.ref_count.get() == 0,
                "RefCounted object deleted without calling release()"
            );
        }
    }
}

// ---------------------------------------------------------------------------
// RefCountedThreadSafeBase
// ---------------------------------------------------------------------------

/// Atomic reference count; may be shared across threads.
#[derive(Debug)]
pub struct RefCountedThreadSafeBase {
    ref_count: AtomicRefCount,
    #[cfg(any(debug_assertions, feature = "dcheck-always-on"))]
    flags: AtomicU8,
}

impl RefCountedThreadSafeBase {
    pub const fn new(preference: StartRefCount) -> Self {
        let initial = match preference {
            StartRefCount::FromZero => 0,
            StartRefCount::FromOne => 1,
        };
        RefCountedThreadSafeBase {
            ref_count: AtomicRefCount::new(initial),
            #[cfg(any(debug_assertions, feature = "dcheck-always-on"))]
            flags: AtomicU8::new(match preference {
                StartRefCount::FromZero => 0,
                StartRefCount::FromOne => DebugFlags::NEEDS_ADOPT_REF.bits(),
            }),
        }
    }

    /// Base for a payload of type `T`, honouring its count preference.
    pub fn for_type<T: RefCounted<Base = Self>>() -> Self {
        Self::new(T::REF_COUNT_PREFERENCE)
    }

    #[cfg(any(debug_assertions, feature = "dcheck-always-on"))]
    fn has_flag(&self, flag: DebugFlags) -> bool {
        DebugFlags::from_bits_truncate(self.flags.load(Ordering::Relaxed)).contains(flag)
    }
}

impl RefCountBase for RefCountedThreadSafeBase {
    #[inline]
    fn add_ref(&self) {
        #[cfg(any(debug_assertions, feature = "dcheck-always-on"))]
        {
            dcheck!(!self.has_flag(DebugFlags::IN_DTOR), "add_ref on an object being destroyed");
            dcheck!(!self.has_flag(DebugFlags::NEEDS_ADOPT_REF), "{}", NEEDS_ADOPTION_MESSAGE);
        }
        self.ref_count.increment();
    }

    #[inline]
    fn release(&self) -> bool {
        #[cfg(any(debug_assertions, feature = "dcheck-always-on"))]
        {
            dcheck!(!self.has_flag(DebugFlags::IN_DTOR), "release on an object being destroyed");
            dcheck!(!self.ref_count.is_zero(), "release without a matching add_ref");
        }
        if !self.ref_count.decrement() {
            #[cfg(any(debug_assertions, feature = "dcheck-always-on"))]
            self.flags
                .fetch_or(DebugFlags::IN_DTOR.bits(), Ordering::Relaxed);
            return true;
        }
        false
    }

    #[inline]
    fn has_one_ref(&self) -> bool {
        self.ref_count.is_one()
    }

    fn adopted(&self) {
        #[cfg(any(debug_assertions, feature = "dcheck-always-on"))]
        {
            let previous = self
                .flags
                .fetch_and(!DebugFlags::NEEDS_ADOPT_REF.bits(), Ordering::Relaxed);
            dcheck!(
                DebugFlags::from_bits_truncate(previous).contains(DebugFlags::NEEDS_ADOPT_REF),
                "object adopted twice or does not start from one"
            );
        }
    }
}

impl Drop for RefCountedThreadSafeBase {
    fn drop(&mut self) {
        #[cfg(any(debug_assertions, feature = "dcheck-always-on"))]
        if !std::thread::panicking() {
            dcheck!(
                self.has_flag(DebugFlags::IN_DTOR) || self.ref_count.is_zero(),
                "RefCountedThreadSafe object deleted without calling release()"
            );
        }
    }
}

// ---------------------------------------------------------------------------
// RefCountedData
// ---------------------------------------------------------------------------

/// Thread-safe ref-counted wrapper for plain data, so it can be held by a
/// [`ScopedRefPtr`](super::ScopedRefPtr).
#[derive(Debug)]
pub struct RefCountedData<T> {
    ref_count: RefCountedThreadSafeBase,
    pub data: T,
}

impl<T> RefCountedData<T> {
    pub fn new(data: T) -> Self {
        RefCountedData {
            ref_count: RefCountedThreadSafeBase::new(StartRefCount::FromZero),
            data,
        }
    }
}

impl<T: Default> Default for RefCountedData<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

unsafe impl<T> RefCounted for RefCountedData<T> {
    type Base = RefCountedThreadSafeBase;

    fn ref_count_base(&self) -> &RefCountedThreadSafeBase {
        &self.ref_count
    }
}
