//! Byte and item statistics.
//!
//! Every section keeps its own [`AtomicStatus`] and the cache keeps one more
//! for the whole. Mutations update both while the structural lock is held,
//! but the counters themselves are plain relaxed atomics so readers never
//! take that lock. A reader may observe a section and the cache total a few
//! updates apart; once no operation is in flight they agree.
//!
//! The four counters are loaded one at a time, so a snapshot taken during a
//! remove can pair an old locked count with a new total. `snapshot` clamps
//! the locked counters to the totals it read.

use crate::config::Limits;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Point-in-time copy of a status block.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Status {
    /// Bytes charged by all cached items.
    pub bytes: usize,
    /// Number of cached items.
    pub items: usize,
    /// Bytes charged by items with a positive lock count.
    pub locked_bytes: usize,
    /// Number of items with a positive lock count.
    pub locked_items: usize,
}

impl Status {
    /// Bytes held by items that eviction may select.
    pub fn unlocked_bytes(&self) -> usize {
        self.bytes.saturating_sub(self.locked_bytes)
    }

    /// Number of items that eviction may select.
    pub fn unlocked_items(&self) -> usize {
        self.items.saturating_sub(self.locked_items)
    }

    /// Component-wise sum, for aggregating sections.
    pub fn merge(&self, other: &Status) -> Status {
        Status {
            bytes: self.bytes + other.bytes,
            items: self.items + other.items,
            locked_bytes: self.locked_bytes + other.locked_bytes,
            locked_items: self.locked_items + other.locked_items,
        }
    }
}

/// Lock-free status counters.
#[derive(Debug, Default)]
pub(crate) struct AtomicStatus {
    bytes: AtomicUsize,
    items: AtomicUsize,
    locked_bytes: AtomicUsize,
    locked_items: AtomicUsize,
}

impl AtomicStatus {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub(crate) fn record_add(&self, size: usize) {
        self.bytes.fetch_add(size, Ordering::Relaxed);
        self.items.fetch_add(1, Ordering::Relaxed);
    }

    /// Account for an item leaving. `was_locked` releases its locked share
    /// first.
    #[inline]
    pub(crate) fn record_remove(&self, size: usize, was_locked: bool) {
        if was_locked {
            self.record_unlock(size);
        }
        self.items.fetch_sub(1, Ordering::Relaxed);
        self.bytes.fetch_sub(size, Ordering::Relaxed);
    }

    /// Move an item's bytes into locked accounting.
    #[inline]
    pub(crate) fn record_lock(&self, size: usize) {
        self.locked_items.fetch_add(1, Ordering::Relaxed);
        self.locked_bytes.fetch_add(size, Ordering::Relaxed);
    }

    /// Move an item's bytes back into unlocked accounting.
    #[inline]
    pub(crate) fn record_unlock(&self, size: usize) {
        self.locked_bytes.fetch_sub(size, Ordering::Relaxed);
        self.locked_items.fetch_sub(1, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self) -> Status {
        let locked_bytes = self.locked_bytes.load(Ordering::Relaxed);
        let locked_items = self.locked_items.load(Ordering::Relaxed);
        let bytes = self.bytes.load(Ordering::Relaxed);
        let items = self.items.load(Ordering::Relaxed);
        Status {
            bytes,
            items,
            locked_bytes: locked_bytes.min(bytes),
            locked_items: locked_items.min(items),
        }
    }
}

/// Limits readable without the structural lock.
#[derive(Debug)]
pub(crate) struct AtomicLimits {
    max_bytes: AtomicUsize,
    max_items: AtomicUsize,
    min_bytes: AtomicUsize,
    min_items: AtomicUsize,
}

impl AtomicLimits {
    pub(crate) fn new(limits: Limits) -> Self {
        Self {
            max_bytes: AtomicUsize::new(limits.max_bytes),
            max_items: AtomicUsize::new(limits.max_items),
            min_bytes: AtomicUsize::new(limits.min_bytes),
            min_items: AtomicUsize::new(limits.min_items),
        }
    }

    pub(crate) fn load(&self) -> Limits {
        Limits {
            max_bytes: self.max_bytes.load(Ordering::Relaxed),
            max_items: self.max_items.load(Ordering::Relaxed),
            min_bytes: self.min_bytes.load(Ordering::Relaxed),
            min_items: self.min_items.load(Ordering::Relaxed),
        }
    }

    pub(crate) fn store(&self, limits: Limits) {
        self.max_bytes.store(limits.max_bytes, Ordering::Relaxed);
        self.max_items.store(limits.max_items, Ordering::Relaxed);
        self.min_bytes.store(limits.min_bytes, Ordering::Relaxed);
        self.min_items.store(limits.min_items, Ordering::Relaxed);
    }

    pub(crate) fn set_max_bytes(&self, bytes: usize) {
        self.max_bytes.store(bytes, Ordering::Relaxed);
    }

    pub(crate) fn set_max_items(&self, items: usize) {
        self.max_items.store(items, Ordering::Relaxed);
    }
}
