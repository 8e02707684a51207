//! Budget, eviction and accounting tests.
//!
//! These drive the public API only: sections with their own limits under one
//! cache-wide budget, checking which items survive and what the clients are
//! told.

use datacache::{
    AddFlags, CacheClient, ClientTag, DataCache, DiscardReason, Limits, Notification,
    RemoveFlags, ReportDetail, Section, SectionConfig, SectionOptions, Status,
};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::thread;

/// A client whose items are plain byte counts, recording every callback.
#[derive(Default)]
struct Ledger {
    destroyed: AtomicUsize,
    notices: Mutex<Vec<(DiscardReason, u64)>>,
}

impl Ledger {
    fn destroyed(&self) -> usize {
        self.destroyed.load(Ordering::Relaxed)
    }

    fn notices(&self) -> Vec<(DiscardReason, u64)> {
        self.notices.lock().clone()
    }
}

impl CacheClient for Ledger {
    type Item = usize;
    type Data = usize;

    fn create(&self, _tag: ClientTag, size: usize) -> Option<usize> {
        Some(size)
    }

    fn estimated_size(&self, size: &usize) -> usize {
        *size
    }

    fn destroy(&self, _tag: ClientTag, _item: &usize) {
        self.destroyed.fetch_add(1, Ordering::Relaxed);
    }

    fn notify(&self, notification: Notification<'_, usize>) {
        self.notices
            .lock()
            .push((notification.reason, notification.tag.as_raw()));
    }

    fn item_name(&self, tag: ClientTag, item: &usize) -> Option<String> {
        Some(format!("item-{}-{}", tag.as_raw(), item))
    }
}

const A: ClientTag = ClientTag::new(0xA);
const B: ClientTag = ClientTag::new(0xB);
const C: ClientTag = ClientTag::new(0xC);

fn limited(cache: &DataCache, name: &str, limits: Limits) -> Section<Ledger> {
    cache
        .add_section_with(
            name,
            Ledger::default(),
            SectionConfig::new().with_limits(limits),
        )
        .expect("add section")
}

fn sum_sections(cache: &DataCache) -> Status {
    cache
        .sections()
        .iter()
        .fold(Status::default(), |acc, info| acc.merge(&info.status))
}

// =============================================================================
// Section budget
// =============================================================================

#[test]
fn test_third_add_evicts_oldest() {
    let cache = DataCache::new();
    let section = limited(&cache, "ModelData", Limits::bytes(1000));

    section.add(A, 400, 400).expect("add A");
    section.add(B, 400, 400).expect("add B");
    section.add(C, 400, 400).expect("add C");

    assert!(section.find(A).is_none());
    assert!(section.find(B).is_some());
    assert!(section.find(C).is_some());
    assert_eq!(section.status().bytes, 800);
    assert_eq!(section.client().notices(), vec![(DiscardReason::Aged, 0xA)]);
    assert_eq!(section.client().destroyed(), 1);
}

#[test]
fn test_touched_item_survives_eviction() {
    let cache = DataCache::new();
    let section = limited(&cache, "ModelData", Limits::bytes(1000));

    let a = section.add(A, 400, 400).expect("add A");
    section.add(B, 400, 400).expect("add B");
    section.get(a).expect("get A");
    section.add(C, 400, 400).expect("add C");

    assert!(section.is_present(a));
    assert!(section.find(B).is_none());
}

#[test]
fn test_item_budget() {
    let cache = DataCache::new();
    let section = limited(&cache, "AnimBlock", Limits::items(2));

    for raw in 0..5 {
        section.add(ClientTag::new(raw), 1, 1).expect("add");
    }

    assert_eq!(section.status().items, 2);
    assert!(section.find(ClientTag::new(3)).is_some());
    assert!(section.find(ClientTag::new(4)).is_some());
}

#[test]
fn test_locked_items_force_overcommit() {
    let cache = DataCache::new();
    let section = limited(&cache, "ModelData", Limits::bytes(1000));

    let a = section.add_ex(A, 600, 600, AddFlags::LOCK).expect("add A");
    let b = section.add(B, 600, 600).expect("add B");

    // A is locked, so B goes over budget rather than failing
    assert!(section.is_present(a));
    assert!(section.is_present(b));
    assert_eq!(section.status().bytes, 1200);

    // B is evictable, but A alone leaves no room for 500 more
    assert!(!section.ensure_capacity(500, 1));
    assert!(section.is_present(a));
    assert!(!section.is_present(b));

    assert_eq!(section.unlock(a), Some(0));
    assert!(section.ensure_capacity(500, 1));
    assert!(!section.is_present(a));
}

#[test]
fn test_purge_frees_in_lru_order() {
    let cache = DataCache::new();
    let section = limited(&cache, "ModelData", Limits::unlimited());

    let handles: Vec<_> = (0..5)
        .map(|raw| section.add(ClientTag::new(raw), 100, 100).expect("add"))
        .collect();
    section.lock(handles[1]).expect("lock");

    assert_eq!(section.purge(250), 300);
    assert!(!section.is_present(handles[0]));
    assert!(section.is_present(handles[1]));
    assert!(!section.is_present(handles[2]));
    assert!(!section.is_present(handles[3]));
    assert!(section.is_present(handles[4]));

    // only locked and one unlocked item remain
    assert_eq!(section.purge(usize::MAX), 100);
    assert_eq!(section.purge(usize::MAX), 0);
    assert!(section.is_present(handles[1]));
}

// =============================================================================
// Flush
// =============================================================================

#[test]
fn test_flush_keeps_locked_until_forced() {
    let cache = DataCache::new();
    let section = limited(&cache, "ModelData", Limits::unlimited());

    let a = section.add(A, 10, 10).expect("add A");
    section.add(B, 10, 10).expect("add B");
    section.lock(a).expect("lock A");

    assert_eq!(section.flush(true, true), 1);
    assert!(section.is_present(a));
    assert_eq!(section.client().destroyed(), 1);

    assert_eq!(section.flush(false, true), 1);
    assert!(!section.is_present(a));
    assert_eq!(section.client().destroyed(), 2);
    assert_eq!(
        section.client().notices(),
        vec![(DiscardReason::Flushed, 0xB), (DiscardReason::Flushed, 0xA)]
    );
    assert_eq!(section.status(), Status::default());
    assert_eq!(cache.status(), Status::default());
}

#[test]
fn test_silent_flush_still_destroys() {
    let cache = DataCache::new();
    let section = limited(&cache, "ModelData", Limits::unlimited());
    section.add(A, 10, 10).expect("add");

    assert_eq!(section.flush(true, false), 1);
    assert!(section.client().notices().is_empty());
    assert_eq!(section.client().destroyed(), 1);
}

#[test]
fn test_global_flush_respects_no_force_flush() {
    let cache = DataCache::new();
    let meshes = cache
        .add_section_with(
            "ModelMesh",
            Ledger::default(),
            SectionConfig::new().with_options(SectionOptions::NO_FORCE_FLUSH),
        )
        .expect("add section");
    let data = limited(&cache, "ModelData", Limits::unlimited());

    meshes.add(A, 10, 10).expect("add");
    data.add(B, 10, 10).expect("add");

    assert_eq!(cache.flush(false, true), 1);
    assert!(meshes.find(A).is_some());
    assert!(data.find(B).is_none());

    // a targeted flush still works
    assert_eq!(meshes.flush(false, true), 1);
    assert_eq!(cache.status().items, 0);
}

// =============================================================================
// Cache-wide budget
// =============================================================================

#[test]
fn test_global_budget_evicts_across_sections() {
    let cache = DataCache::with_limits(Limits::items(4));
    let left = limited(&cache, "left", Limits::items(10));
    let right = limited(&cache, "right", Limits::items(10));

    for raw in 0..3 {
        left.add(ClientTag::new(raw), 100, 100).expect("add");
    }
    right.add(ClientTag::new(10), 50, 50).expect("add");
    assert_eq!(cache.status().items, 4);

    // both sections are far below their own limits
    right.add(ClientTag::new(11), 50, 50).expect("add");

    assert_eq!(cache.status().items, 4);
    assert_eq!(left.status().items, 2);
    assert_eq!(right.status().items, 2);
    // the section with the most evictable bytes lost its oldest item
    assert!(left.find(ClientTag::new(0)).is_none());
    assert_eq!(left.client().notices(), vec![(DiscardReason::Aged, 0)]);
}

#[test]
fn test_global_budget_honours_minimums() {
    let cache = DataCache::with_limits(Limits::bytes(1000));
    let protected = limited(
        &cache,
        "protected",
        Limits::unlimited().with_minimums(800, 0),
    );
    let other = limited(&cache, "other", Limits::unlimited());

    protected.add(A, 800, 800).expect("add");
    other.add(B, 100, 100).expect("add");
    other.add(C, 200, 200).expect("add");

    assert!(protected.find(A).is_some());
    assert!(other.find(B).is_none());
    assert!(other.find(C).is_some());
    assert_eq!(cache.status().bytes, 1000);
}

#[test]
fn test_set_size_shrinks_cache() {
    let cache = DataCache::new();
    let section = limited(&cache, "ModelData", Limits::unlimited());
    for raw in 0..10 {
        section.add(ClientTag::new(raw), 100, 100).expect("add");
    }

    cache.set_size(450);
    assert_eq!(cache.limits().max_bytes, 450);
    assert_eq!(cache.status().bytes, 400);
    assert!(section.find(ClientTag::new(5)).is_none());
    assert!(section.find(ClientTag::new(6)).is_some());

    cache.set_max_items(2);
    assert_eq!(cache.status().items, 2);
}

#[test]
fn test_status_sums_across_sections() {
    let cache = DataCache::with_limits(Limits::bytes(2000));
    let one = limited(&cache, "one", Limits::bytes(700));
    let two = limited(&cache, "two", Limits::items(3));

    let mut locked = Vec::new();
    for raw in 0..8 {
        let tag = ClientTag::new(raw);
        let h1 = one.add(tag, 150, 150).expect("add");
        let h2 = two.add(tag, 200, 200).expect("add");
        if raw % 3 == 0 {
            one.lock(h1).expect("lock");
            locked.push(h2);
        }

        let status = cache.status();
        assert_eq!(sum_sections(&cache), status);
        assert!(status.locked_bytes <= status.bytes);
        assert!(status.locked_items <= status.items);
    }

    for handle in locked {
        // may already be gone; stale handles are simply rejected
        if two.lock(handle).is_some() {
            assert_eq!(two.unlock(handle), Some(0));
        }
    }

    one.flush(false, false);
    assert_eq!(sum_sections(&cache), cache.status());
    assert_eq!(cache.status(), two.status());
}

#[test]
fn test_status_readers_never_see_more_locked_than_cached() {
    let cache = DataCache::new();
    let section = limited(&cache, "ModelData", Limits::unlimited());
    let done = AtomicBool::new(false);

    thread::scope(|scope| {
        let reader = scope.spawn(|| {
            while !done.load(Ordering::Acquire) {
                for status in [cache.status(), section.status()] {
                    assert!(status.locked_bytes <= status.bytes, "{status:?}");
                    assert!(status.locked_items <= status.items, "{status:?}");
                }
            }
        });

        for raw in 0..20_000u64 {
            let handle = section
                .add_ex(ClientTag::new(raw), 64, 64, AddFlags::LOCK)
                .expect("add");
            section
                .remove_ex(handle, RemoveFlags::FORCE)
                .expect("forced remove");
        }
        done.store(true, Ordering::Release);
        reader.join().expect("reader");
    });

    assert_eq!(cache.status(), Status::default());
}

#[test]
fn test_global_purge_and_report() {
    let cache = DataCache::new();
    let one = limited(&cache, "one", Limits::unlimited());
    let two = limited(&cache, "two", Limits::unlimited());

    one.add(A, 100, 100).expect("add");
    let b = two.add(B, 100, 100).expect("add");
    two.lock(b).expect("lock");

    let report = cache.report(ReportDetail::Detail);
    assert_eq!(report.status.bytes, 200);
    let two_report = report.section("two").expect("section two");
    assert_eq!(two_report.items.len(), 1);
    assert_eq!(two_report.items[0].lock_count, 1);
    assert_eq!(two_report.items[0].name.as_deref(), Some("item-11-100"));

    let text = cache.output_report(ReportDetail::Summary).to_string();
    assert!(text.contains("[one]"));
    assert!(!text.contains("item-10-100"));

    assert_eq!(cache.purge(1000), 100);
    assert_eq!(cache.status().bytes, 100);
    assert!(two.is_present(b));
}
