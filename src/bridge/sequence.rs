//! Sequence number allocation for outbound requests.

use std::sync::atomic::{AtomicU64, Ordering};

/// Thread-safe monotonically increasing counter used to tag outgoing
/// requests. The first allocated value is 1; values are strictly increasing
/// across all callers, which is what allows correlation despite concurrent
/// issuance. Wraparound is out of scope at u64 width.
#[derive(Debug, Default)]
pub struct SequenceAllocator {
    next: AtomicU64,
}

impl SequenceAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate the next sequence number.
    pub fn next(&self) -> u64 {
        self.next.fetch_add(1, Ordering::Relaxed) + 1
    }
}
