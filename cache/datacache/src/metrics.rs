//! Process-wide cache metrics.
//!
//! These aggregate over every `DataCache` in the process. Per-cache and
//! per-section numbers come from `Status` snapshots instead.

use crate::client::DiscardReason;
use metriken::{Counter, Gauge, metric};

/// Items added.
#[metric(name = "datacache_add")]
pub static ADD: Counter = Counter::new();

/// `find` calls that located an item.
#[metric(name = "datacache_hit")]
pub static HIT: Counter = Counter::new();

/// `find` calls that came back empty.
#[metric(name = "datacache_miss")]
pub static MISS: Counter = Counter::new();

/// Items evicted from the LRU end to make room.
#[metric(name = "datacache_evict_aged")]
pub static EVICT_AGED: Counter = Counter::new();

/// Items evicted by a flush.
#[metric(name = "datacache_evict_flushed")]
pub static EVICT_FLUSHED: Counter = Counter::new();

/// Items removed explicitly.
#[metric(name = "datacache_evict_removed")]
pub static EVICT_REMOVED: Counter = Counter::new();

/// Items pinned by frame locking.
#[metric(name = "datacache_frame_pin")]
pub static FRAME_PIN: Counter = Counter::new();

/// Bytes currently charged across all caches.
#[metric(name = "datacache_bytes")]
pub static BYTES: Gauge = Gauge::new();

/// Items currently cached across all caches.
#[metric(name = "datacache_items")]
pub static ITEMS: Gauge = Gauge::new();

#[inline]
pub(crate) fn record_add(size: usize) {
    ADD.increment();
    ITEMS.increment();
    BYTES.add(size as i64);
}

#[inline]
pub(crate) fn record_discard(reason: DiscardReason, size: usize) {
    match reason {
        DiscardReason::Aged => EVICT_AGED.increment(),
        DiscardReason::Flushed => EVICT_FLUSHED.increment(),
        DiscardReason::Removed => EVICT_REMOVED.increment(),
    };
    ITEMS.decrement();
    BYTES.sub(size as i64);
}
