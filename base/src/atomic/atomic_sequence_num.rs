use core::sync::atomic::{AtomicU32, Ordering};

/// Hands out increasing sequence numbers, starting at zero, to any thread.
///
/// Typically declared as a `static` to generate process-wide identifiers.
#[derive(Debug)]
pub struct AtomicSequenceNumber {
    seq: AtomicU32,
}

impl AtomicSequenceNumber {
    pub const fn new() -> Self {
        AtomicSequenceNumber {
            seq: AtomicU32::new(0),
        }
    }

    /// Returns the next number in the sequence. Free of data races.
    #[inline]
    pub fn get_next(&self) -> u32 {
        self.seq.fetch_add(1, Ordering::Relaxed)
    }
}

impl Default for AtomicSequenceNumber {
    fn default() -> Self {
        Self::new()
    }
}
