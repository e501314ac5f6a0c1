//! Process-wide monotonic identifiers.
//!
//! Unlike a prefixed UUID, every ID here is a plain 64-bit integer handed
//! out by a single shared counter. Scoring and bucketing (connection
//! tuples, egress IDs) key directly off these, so they need to be cheap
//! to compare and hash, not globally unique across processes.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::OnceLock;

/// A process-wide unique, strictly increasing non-zero identifier.
pub type Id = u64;

/// Monotonic counter. `0` is never handed out, so it can double as an
/// "unset" sentinel in callers that want one.
pub struct IdAllocator {
    next: AtomicU64,
}

impl IdAllocator {
    pub fn new() -> Self {
        IdAllocator {
            next: AtomicU64::new(1),
        }
    }

    /// Returns a strictly greater value on each call across all callers.
    pub fn next(&self) -> Id {
        self.next.fetch_add(1, Ordering::Relaxed)
    }
}

impl Default for IdAllocator {
    fn default() -> Self {
        Self::new()
    }
}

fn global() -> &'static IdAllocator {
    static GLOBAL: OnceLock<IdAllocator> = OnceLock::new();
    GLOBAL.get_or_init(IdAllocator::new)
}

/// Allocate the next ID from the process-wide allocator.
pub fn next_id() -> Id {
    global().next()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn ids_strictly_increase() {
        let alloc = IdAllocator::new();
        let a = alloc.next();
        let b = alloc.next();
        let c = alloc.next();
        assert!(a < b);
        assert!(b < c);
    }

    #[test]
    fn never_hands_out_zero() {
        let alloc = IdAllocator::new();
        assert_ne!(alloc.next(), 0);
    }

    #[test]
    fn concurrent_callers_get_unique_ids() {
        let alloc = Arc::new(IdAllocator::new());
        let mut handles = Vec::new();
        for _ in 0..8 {
            let alloc = alloc.clone();
            handles.push(thread::spawn(move || {
                (0..1000).map(|_| alloc.next()).collect::<Vec<_>>()
            }));
        }
        let mut seen = HashSet::new();
        for h in handles {
            for id in h.join().unwrap() {
                assert!(seen.insert(id), "id {id} handed out twice");
            }
        }
        assert_eq!(seen.len(), 8 * 1000);
    }

    #[test]
    fn global_allocator_is_monotonic() {
        let a = next_id();
        let b = next_id();
        assert!(b > a);
    }
}
