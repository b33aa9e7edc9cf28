//! Round-robin placement.
//!
//! A single atomic cursor that wraps in place over the current member
//! count, so the stored value never grows unbounded and stays meaningful
//! as members join and leave. Lock-free and safe for concurrent use.

use std::sync::atomic::{AtomicUsize, Ordering};

/// Lock-free round-robin selection over `count` member slots.
pub struct RoundRobin {
    cursor: AtomicUsize,
}

impl RoundRobin {
    pub fn new() -> Self {
        Self {
            cursor: AtomicUsize::new(0),
        }
    }

    /// Claim the next slot, wrapping around `count`.
    ///
    /// Returns `None` when there are no members. The claimed slot is
    /// reduced modulo `count` again on the way out, so a cursor left
    /// over from a larger member set still lands in range.
    pub fn pick(&self, count: usize) -> Option<usize> {
        if count == 0 {
            return None;
        }
        let slot = self
            .cursor
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |cursor| {
                Some((cursor + 1) % count)
            })
            .unwrap_or(0);
        Some(slot % count)
    }
}

impl Default for RoundRobin {
    fn default() -> Self {
        Self::new()
    }
}
