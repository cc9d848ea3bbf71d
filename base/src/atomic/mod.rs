//! Atomic counters.

pub mod atomic_ref_count;
pub mod atomic_sequence_num;

pub use atomic_ref_count::AtomicRefCount;
pub use atomic_sequence_num::AtomicSequenceNumber;
