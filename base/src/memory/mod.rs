//! Reference-counted object model.

pub mod ref_counted;
pub mod scoped_refptr;

pub use ref_counted::{
    RefCountBase, RefCounted, RefCountedBase, RefCountedData, RefCountedThreadSafeBase,
    ScopedAllowCrossThreadRefCountAccess, StartRefCount,
};
pub use scoped_refptr::{adopt_ref, make_ref_counted, wrap_ref_counted, ScopedRefPtr, UniqueRef};
