//! Owning handle over an intrusively ref-counted payload.

use core::fmt;
use core::hash::{Hash, Hasher};
use core::marker::PhantomData;
use core::ops::{Deref, DerefMut};
use core::ptr::{self, NonNull};

use super::ref_counted::{RefCountBase, RefCounted, StartRefCount};

macro_rules! refcount_trace {
    ($($arg:tt)*) => {
        #[cfg(feature = "trace-refcount")]
        log::trace!($($arg)*);
    };
}

/// A nullable owning reference to a [`RefCounted`] payload.
///
/// Each non-null handle accounts for exactly one reference. Cloning adds a
/// reference, dropping or [`reset`](Self::reset) releases it, and the payload
/// is destroyed when the last reference goes away. Taking the handle out with
/// [`take`](Self::take) leaves a null handle behind without touching the
/// count.
///
/// Two handles compare equal when they point at the same payload.
pub struct ScopedRefPtr<T: RefCounted> {
    ptr: Option<NonNull<T>>,
    _marker: PhantomData<T>,
}

// The count of a payload that is `Sync` is itself thread-safe.
unsafe impl<T: RefCounted + Send + Sync> Send for ScopedRefPtr<T> {}
unsafe impl<T: RefCounted + Send + Sync> Sync for ScopedRefPtr<T> {}

impl<T: RefCounted> ScopedRefPtr<T> {
    /// A handle that refers to nothing.
    pub const fn null() -> Self {
        ScopedRefPtr {
            ptr: None,
            _marker: PhantomData,
        }
    }

    /// Takes over a reference that is already accounted for in the count.
    ///
    /// # Safety
    ///
    /// `ptr` must be null or point to a live payload whose count includes a
    /// reference that nothing else will release.
    unsafe fn from_owned_reference(ptr: *mut T) -> Self {
        ScopedRefPtr {
            ptr: NonNull::new(ptr),
            _marker: PhantomData,
        }
    }

    pub fn is_null(&self) -> bool {
        self.ptr.is_none()
    }

    pub fn get(&self) -> Option<&T> {
        // SAFETY: a non-null handle keeps the payload alive.
        self.ptr.map(|p| unsafe { &*p.as_ptr() })
    }

    pub fn as_ptr(&self) -> *const T {
        self.ptr.map_or(ptr::null(), |p| p.as_ptr() as *const T)
    }

    /// Whether this handle holds the only reference to its payload. False
    /// for a null handle.
    pub fn has_one_ref(&self) -> bool {
        self.get()
            .map_or(false, |payload| payload.ref_count_base().has_one_ref())
    }

    /// Mutable access while this handle holds the only reference.
    pub fn get_mut(&mut self) -> Option<&mut T> {
        if self.has_one_ref() {
            // SAFETY: no other handle can observe the payload.
            self.ptr.map(|p| unsafe { &mut *p.as_ptr() })
        } else {
            None
        }
    }

    /// Releases the reference and leaves the handle null.
    pub fn reset(&mut self) {
        drop(self.take());
    }

    /// Moves the reference out, leaving this handle null. The count is
    /// unchanged.
    pub fn take(&mut self) -> Self {
        ScopedRefPtr {
            ptr: self.ptr.take(),
            _marker: PhantomData,
        }
    }

    pub fn swap(&mut self, other: &mut Self) {
        core::mem::swap(&mut self.ptr, &mut other.ptr);
    }

    /// Gives up the reference without releasing it. The caller becomes
    /// responsible for it, e.g. by passing the pointer back to
    /// [`adopt_ref`]-style code later.
    pub fn into_raw(mut self) -> *mut T {
        self.ptr.take().map_or(ptr::null_mut(), NonNull::as_ptr)
    }

    /// Reclaims a reference leaked by [`into_raw`](Self::into_raw).
    ///
    /// # Safety
    ///
    /// `ptr` must come from `into_raw` on a handle of the same type, and may
    /// be reclaimed only once.
    pub unsafe fn from_raw(ptr: *mut T) -> Self {
        Self::from_owned_reference(ptr)
    }

    /// Converts a sole reference into a [`UniqueRef`]. Returns the handle
    /// back when it is null or shared.
    pub fn into_unique(mut self) -> Result<UniqueRef<T>, Self> {
        if !self.has_one_ref() {
            return Err(self);
        }
        match self.ptr.take() {
            Some(ptr) => Ok(UniqueRef { ptr }),
            None => Err(self),
        }
    }

    pub fn ptr_eq(this: &Self, other: &Self) -> bool {
        this.ptr == other.ptr
    }
}

impl<T: RefCounted> Clone for ScopedRefPtr<T> {
    fn clone(&self) -> Self {
        if let Some(payload) = self.get() {
            payload.ref_count_base().add_ref();
            refcount_trace!("[base] add_ref {:p}", self.as_ptr());
        }
        ScopedRefPtr {
            ptr: self.ptr,
            _marker: PhantomData,
        }
    }
}

impl<T: RefCounted> Drop for ScopedRefPtr<T> {
    fn drop(&mut self) {
        if let Some(ptr) = self.ptr.take() {
            // SAFETY: this handle owns one reference to a live payload.
            let last = unsafe { ptr.as_ref() }.ref_count_base().release();
            refcount_trace!("[base] release {:p} (last: {})", ptr.as_ptr(), last);
            if last {
                // SAFETY: the count reached zero exactly once, here.
                unsafe { T::destruct(ptr) };
            }
        }
    }
}

impl<T: RefCounted> Deref for ScopedRefPtr<T> {
    type Target = T;

    fn deref(&self) -> &T {
        match self.get() {
            Some(payload) => payload,
            None => notreached!("dereferenced a null ScopedRefPtr"),
        }
    }
}

impl<T: RefCounted> Default for ScopedRefPtr<T> {
    fn default() -> Self {
        Self::null()
    }
}

impl<T: RefCounted> PartialEq for ScopedRefPtr<T> {
    fn eq(&self, other: &Self) -> bool {
        Self::ptr_eq(self, other)
    }
}

impl<T: RefCounted> Eq for ScopedRefPtr<T> {}

impl<T: RefCounted> Hash for ScopedRefPtr<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.as_ptr().hash(state);
    }
}

impl<T: RefCounted> fmt::Debug for ScopedRefPtr<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ScopedRefPtr").field(&self.as_ptr()).finish()
    }
}

impl<T: RefCounted> fmt::Pointer for ScopedRefPtr<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Pointer::fmt(&self.as_ptr(), f)
    }
}

// ---------------------------------------------------------------------------
// UniqueRef
// ---------------------------------------------------------------------------

/// The only reference to a ref-counted payload.
///
/// Holding the sole reference is what allows a payload with a non-atomic
/// count to move to another thread, so `UniqueRef<T>` is `Send` whenever the
/// payload is, even though `ScopedRefPtr<T>` of the same payload is not.
pub struct UniqueRef<T: RefCounted> {
    ptr: NonNull<T>,
}

unsafe impl<T: RefCounted + Send> Send for UniqueRef<T> {}

impl<T: RefCounted> UniqueRef<T> {
    /// Turns back into a shareable handle. The count is unchanged.
    pub fn into_shared(self) -> ScopedRefPtr<T> {
        let ptr = self.ptr;
        core::mem::forget(self);
        ScopedRefPtr {
            ptr: Some(ptr),
            _marker: PhantomData,
        }
    }
}

impl<T: RefCounted> Deref for UniqueRef<T> {
    type Target = T;

    fn deref(&self) -> &T {
        // SAFETY: the sole reference keeps the payload alive.
        unsafe { self.ptr.as_ref() }
    }
}

impl<T: RefCounted> DerefMut for UniqueRef<T> {
    fn deref_mut(&mut self) -> &mut T {
        // SAFETY: nothing else references the payload.
        unsafe { self.ptr.as_mut() }
    }
}

impl<T: RefCounted> Drop for UniqueRef<T> {
    fn drop(&mut self) {
        drop(ScopedRefPtr::<T> {
            ptr: Some(self.ptr),
            _marker: PhantomData,
        });
    }
}

impl<T: RefCounted + fmt::Debug> fmt::Debug for UniqueRef<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("UniqueRef").field(&**self).finish()
    }
}

// ---------------------------------------------------------------------------
// Construction helpers
// ---------------------------------------------------------------------------

/// Takes the first reference to a freshly created start-from-one payload
/// without incrementing its count.
///
/// # Safety
///
/// `ptr` must point to a live payload, allocated the way `T::destruct`
/// expects, that no handle owns yet.
pub unsafe fn adopt_ref<T: RefCounted>(ptr: *mut T) -> ScopedRefPtr<T> {
    dcheck!(!ptr.is_null(), "adopt_ref of a null pointer");
    dcheck!(
        T::REF_COUNT_PREFERENCE == StartRefCount::FromOne,
        "Use adopt_ref only if the reference count starts from one."
    );
    if let Some(payload) = ptr.as_ref() {
        dcheck!(payload.ref_count_base().has_one_ref());
        payload.ref_count_base().adopted();
    }
    ScopedRefPtr::from_owned_reference(ptr)
}

/// Wraps a raw payload pointer in a new owning handle, adding a reference.
/// A null `ptr` gives a null handle.
///
/// # Safety
///
/// `ptr` must be null or point to a live payload allocated the way
/// `T::destruct` expects.
pub unsafe fn wrap_ref_counted<T: RefCounted>(ptr: *mut T) -> ScopedRefPtr<T> {
    if let Some(payload) = ptr.as_ref() {
        payload.ref_count_base().add_ref();
    }
    ScopedRefPtr::from_owned_reference(ptr)
}

/// Moves `value` to the heap and returns the first handle to it, for
/// either count policy.
pub fn make_ref_counted<T: RefCounted>(value: T) -> ScopedRefPtr<T> {
    let ptr = Box::into_raw(Box::new(value));
    // SAFETY: `ptr` is a fresh Box allocation owned by nobody else.
    unsafe {
        match T::REF_COUNT_PREFERENCE {
            StartRefCount::FromOne => adopt_ref(ptr),
            StartRefCount::FromZero => wrap_ref_counted(ptr),
        }
    }
}
