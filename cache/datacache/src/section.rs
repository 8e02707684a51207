//! Typed access to one section of a cache.
//!
//! A [`Section`] is what a client holds: it adds, finds, locks and evicts the
//! client's own items and hands payloads back as `Arc<C::Item>`. Sections are
//! cheap to clone. Once the section is removed from its cache every clone
//! reports misses, `false` or [`CacheError::SectionRemoved`].
//!
//! # Frame locking
//!
//! ```no_run
//! # use datacache::{CacheClient, ClientTag, DataCache};
//! # struct Meshes;
//! # impl CacheClient for Meshes {
//! #     type Item = Vec<u8>;
//! #     type Data = Vec<u8>;
//! #     fn create(&self, _: ClientTag, data: Vec<u8>) -> Option<Vec<u8>> { Some(data) }
//! #     fn estimated_size(&self, data: &Vec<u8>) -> usize { data.len() }
//! # }
//! let cache = DataCache::new();
//! let meshes = cache.add_section("ModelMesh", Meshes).unwrap();
//! let handle = meshes.add(ClientTag::new(1), vec![0; 64], 64).unwrap();
//!
//! {
//!     let _frame = meshes.frame_scope();
//!     // pinned until the scope ends, without a matching unlock
//!     let mesh = meshes.get(handle).unwrap();
//!     assert_eq!(mesh.len(), 64);
//!     assert_eq!(meshes.lock_count(handle), Some(1));
//! }
//!
//! assert_eq!(meshes.lock_count(handle), Some(0));
//! ```

use crate::client::{CacheClient, ClientTag, Payload};
use crate::config::{Limits, SectionOptions};
use crate::error::{CacheError, CacheResult};
use crate::frame;
use crate::handle::Handle;
use crate::manager::{SectionShared, Shared};
use crate::report::{Report, ReportDetail};
use crate::status::Status;
use bitflags::bitflags;
use std::fmt;
use std::sync::Arc;
use tracing::warn;

bitflags! {
    /// Options for [`Section::add_ex`] and [`Section::create`].
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct AddFlags: u32 {
        /// Return the new item already locked once.
        const LOCK = 1 << 0;
    }
}

bitflags! {
    /// Options for [`Section::remove_ex`].
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct RemoveFlags: u32 {
        /// Remove even if the item is locked. For teardown paths only.
        const FORCE = 1 << 0;
        /// Skip the discard notification; `destroy` is still called.
        const SILENT = 1 << 1;
    }
}

/// A client's view of its partition of a [`DataCache`](crate::DataCache).
pub struct Section<C: CacheClient> {
    cache: Arc<Shared>,
    shared: Arc<SectionShared>,
    client: Arc<C>,
}

impl<C: CacheClient> Clone for Section<C> {
    fn clone(&self) -> Self {
        Self {
            cache: self.cache.clone(),
            shared: self.shared.clone(),
            client: self.client.clone(),
        }
    }
}

impl<C: CacheClient> fmt::Debug for Section<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Section")
            .field("name", &self.shared.name)
            .field("status", &self.status())
            .finish()
    }
}

fn downcast<C: CacheClient>(payload: Payload) -> Option<Arc<C::Item>> {
    payload.downcast::<C::Item>().ok()
}

impl<C: CacheClient> Section<C> {
    pub(crate) fn new(cache: Arc<Shared>, shared: Arc<SectionShared>, client: Arc<C>) -> Self {
        Self {
            cache,
            shared,
            client,
        }
    }

    /// Section name.
    pub fn name(&self) -> &str {
        &self.shared.name
    }

    /// The client supplied when the section was added.
    pub fn client(&self) -> &C {
        &self.client
    }

    /// Add an item. Items past the section or cache budget are evicted first;
    /// if everything left is locked the add still succeeds and the budget is
    /// exceeded until locks are released.
    pub fn add(&self, tag: ClientTag, item: C::Item, size: usize) -> CacheResult<Handle> {
        self.add_ex(tag, item, size, AddFlags::empty())
    }

    /// [`Section::add`] with flags.
    pub fn add_ex(
        &self,
        tag: ClientTag,
        item: C::Item,
        size: usize,
        flags: AddFlags,
    ) -> CacheResult<Handle> {
        self.cache.add(
            &self.shared,
            tag,
            Arc::new(item),
            size,
            flags.contains(AddFlags::LOCK),
        )
    }

    /// Build an item through the client factory and add it. Room is made
    /// before the factory runs, so a failed create leaves nothing half done
    /// beyond the eviction itself.
    pub fn create(&self, tag: ClientTag, data: C::Data, flags: AddFlags) -> CacheResult<Handle> {
        let size = self.client.estimated_size(&data);
        self.ensure_capacity(size, 1);
        let item = self
            .client
            .create(tag, data)
            .ok_or(CacheError::CreateFailed)?;
        self.add_ex(tag, item, size, flags)
    }

    /// Return the cached item for `tag`, building it through the client
    /// factory on a miss. The factory runs outside the cache lock; if another
    /// thread cached the tag meanwhile, that item wins and the one just built
    /// is passed to `destroy`. `AddFlags::LOCK` locks whichever item is
    /// returned.
    pub fn find_or_create(
        &self,
        tag: ClientTag,
        data: C::Data,
        flags: AddFlags,
    ) -> CacheResult<Handle> {
        let lock = flags.contains(AddFlags::LOCK);
        if let Some(handle) = self.cache.find_existing(&self.shared, tag, lock) {
            return Ok(handle);
        }

        let size = self.client.estimated_size(&data);
        self.ensure_capacity(size, 1);
        let item = Arc::new(
            self.client
                .create(tag, data)
                .ok_or(CacheError::CreateFailed)?,
        );
        let (handle, inserted) =
            self.cache
                .add_or_existing(&self.shared, tag, item.clone(), size, lock)?;
        if !inserted {
            self.client.destroy(tag, &item);
        }
        Ok(handle)
    }

    /// Look up an item by tag. `None` is a miss, not an error.
    pub fn find(&self, tag: ClientTag) -> Option<Handle> {
        self.cache.find(&self.shared, tag)
    }

    /// Remove an unlocked item, destroying it. Returns the payload, which
    /// stays alive as long as the returned `Arc` does.
    pub fn remove(&self, handle: Handle) -> CacheResult<Arc<C::Item>> {
        self.remove_ex(handle, RemoveFlags::empty())
    }

    /// [`Section::remove`] with flags.
    pub fn remove_ex(&self, handle: Handle, flags: RemoveFlags) -> CacheResult<Arc<C::Item>> {
        let payload = self.cache.remove(
            &self.shared,
            handle,
            flags.contains(RemoveFlags::FORCE),
            !flags.contains(RemoveFlags::SILENT),
        )?;
        downcast::<C>(payload).ok_or(CacheError::InvalidHandle)
    }

    /// Whether the handle still refers to an item of this section.
    pub fn is_present(&self, handle: Handle) -> bool {
        self.cache.is_present(&self.shared, handle)
    }

    /// Lock an item against eviction and promote it to most recently used.
    /// `None` means the handle is stale: the item was evicted or removed.
    pub fn lock(&self, handle: Handle) -> Option<Arc<C::Item>> {
        downcast::<C>(self.cache.lock_item(&self.shared, handle)?)
    }

    /// Release one lock. Returns the remaining lock count, or `None` for a
    /// stale handle.
    pub fn unlock(&self, handle: Handle) -> Option<u32> {
        self.cache.unlock_item(&self.shared, handle)
    }

    /// Fetch an item and promote it to most recently used. While this thread
    /// is frame locking the section, the item is also pinned until the frame
    /// ends.
    pub fn get(&self, handle: Handle) -> Option<Arc<C::Item>> {
        downcast::<C>(self.cache.get(&self.shared, handle, true)?)
    }

    /// Fetch an item without promoting or pinning it. For introspection;
    /// the result is not protected from eviction.
    pub fn get_no_touch(&self, handle: Handle) -> Option<Arc<C::Item>> {
        downcast::<C>(self.cache.get(&self.shared, handle, false)?)
    }

    /// Pin an item in this thread's open frame and fetch it. Outside a frame
    /// this is the same as [`Section::get`].
    pub fn frame_lock(&self, handle: Handle) -> Option<Arc<C::Item>> {
        self.get(handle)
    }

    /// Enter a level of frame locking on this thread. Returns the new depth.
    pub fn begin_frame_locking(&self) -> u32 {
        frame::begin(&self.cache, self.shared.id, self.shared.uid)
    }

    /// Leave a level of frame locking. When the outermost level closes every
    /// item pinned during the frame loses its pin. Returns the remaining
    /// depth.
    pub fn end_frame_locking(&self) -> u32 {
        match frame::end(self.shared.uid) {
            Some((depth, pins)) => {
                if !pins.is_empty() {
                    self.cache
                        .release_frame_pins(self.shared.id, self.shared.uid, pins);
                }
                depth
            }
            None => {
                warn!(section = %self.shared.name, "end_frame_locking without begin");
                0
            }
        }
    }

    /// Whether this thread is frame locking the section.
    pub fn is_frame_locking(&self) -> bool {
        frame::depth(self.shared.uid) > 0
    }

    /// End every open frame level on this thread, releasing its pins.
    /// Returns the depth that was open, for [`Section::restore_frame_lock`].
    pub fn break_frame_lock(&self) -> u32 {
        let levels = frame::depth(self.shared.uid);
        while self.is_frame_locking() && self.end_frame_locking() > 0 {}
        levels
    }

    /// Reopen frame locking to the depth [`Section::break_frame_lock`]
    /// returned.
    pub fn restore_frame_lock(&self, levels: u32) {
        for _ in 0..levels {
            self.begin_frame_locking();
        }
    }

    /// Begin frame locking and end it when the guard drops.
    pub fn frame_scope(&self) -> FrameScope<'_, C> {
        self.begin_frame_locking();
        FrameScope { section: self }
    }

    /// Current lock count, or `None` for a stale handle.
    pub fn lock_count(&self, handle: Handle) -> Option<u32> {
        self.cache.lock_count(&self.shared, handle)
    }

    /// Drop every lock on an item, including frame pins held by this thread.
    /// Returns whether the item was locked.
    pub fn break_lock(&self, handle: Handle) -> bool {
        self.cache.break_lock(&self.shared, handle)
    }

    /// Promote an item to most recently used.
    pub fn touch(&self, handle: Handle) -> bool {
        self.cache.touch(&self.shared, handle)
    }

    /// Demote an item to least recently used, making it the next eviction
    /// candidate.
    pub fn age(&self, handle: Handle) -> bool {
        self.cache.age(&self.shared, handle)
    }

    /// Discard the section's items. With `unlocked_only` locked items
    /// survive. Returns the number discarded.
    pub fn flush(&self, unlocked_only: bool, notify: bool) -> usize {
        self.cache
            .flush_section(&self.shared, unlocked_only, notify)
    }

    /// Evict unlocked items from the LRU end until `bytes` are freed or none
    /// remain. Returns the bytes actually freed.
    pub fn purge(&self, bytes: usize) -> usize {
        self.cache.purge_section(&self.shared, bytes)
    }

    /// Evict until `bytes` and `items` more would fit both the section and
    /// cache budgets. Returns `false` if locked items prevent that.
    pub fn ensure_capacity(&self, bytes: usize, items: usize) -> bool {
        self.cache.ensure_capacity(&self.shared, bytes, items)
    }

    /// Replace the section budget, evicting down to it.
    pub fn set_limits(&self, limits: Limits) {
        self.cache.set_section_limits(&self.shared, limits);
    }

    /// Section budget.
    pub fn limits(&self) -> Limits {
        self.shared.limits.load()
    }

    /// Replace the option flags.
    pub fn set_options(&self, options: SectionOptions) {
        self.shared.set_options(options);
    }

    /// Option flags.
    pub fn options(&self) -> SectionOptions {
        self.shared.options()
    }

    /// Section counters, read without the structural lock.
    pub fn status(&self) -> Status {
        self.shared.status.snapshot()
    }

    /// Counter bumped whenever an item's last lock is released. Clients that
    /// keep raw references derived from unlocked items revalidate them when
    /// it changes.
    pub fn unlock_generation(&self) -> u64 {
        self.shared.unlock_generation()
    }

    /// Report on this section alone.
    pub fn report(&self, detail: ReportDetail) -> Report {
        self.cache.report(Some(&self.shared), detail)
    }
}

/// Guard returned by [`Section::frame_scope`].
#[must_use = "frame locking ends as soon as the scope is dropped"]
pub struct FrameScope<'a, C: CacheClient> {
    section: &'a Section<C>,
}

impl<C: CacheClient> Drop for FrameScope<'_, C> {
    fn drop(&mut self) {
        self.section.end_frame_locking();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{DiscardReason, Notification};
    use crate::config::{DuplicatePolicy, SectionConfig};
    use crate::DataCache;
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct Blobs {
        destroyed: AtomicUsize,
        notices: Mutex<Vec<(DiscardReason, u64)>>,
        fail_create: bool,
    }

    impl CacheClient for Blobs {
        type Item = Vec<u8>;
        type Data = usize;

        fn create(&self, _tag: ClientTag, data: usize) -> Option<Vec<u8>> {
            (!self.fail_create).then(|| vec![0; data])
        }

        fn estimated_size(&self, data: &usize) -> usize {
            *data
        }

        fn destroy(&self, _tag: ClientTag, _item: &Vec<u8>) {
            self.destroyed.fetch_add(1, Ordering::Relaxed);
        }

        fn notify(&self, notification: Notification<'_, Vec<u8>>) {
            self.notices
                .lock()
                .push((notification.reason, notification.tag.as_raw()));
        }
    }

    fn section() -> (DataCache, Section<Blobs>) {
        let cache = DataCache::new();
        let section = cache.add_section("blobs", Blobs::default()).expect("add");
        (cache, section)
    }

    fn tag(raw: u64) -> ClientTag {
        ClientTag::new(raw)
    }

    #[test]
    fn test_add_find_remove() {
        let (_cache, section) = section();
        let handle = section.add(tag(1), vec![1, 2, 3], 3).expect("add");
        assert_eq!(section.find(tag(1)), Some(handle));
        assert_eq!(section.lock_count(handle), Some(0));

        let item = section.remove(handle).expect("remove");
        assert_eq!(*item, vec![1, 2, 3]);
        assert_eq!(section.find(tag(1)), None);
        assert!(!section.is_present(handle));
        assert_eq!(section.client().destroyed.load(Ordering::Relaxed), 1);
        assert_eq!(
            *section.client().notices.lock(),
            vec![(DiscardReason::Removed, 1)]
        );
    }

    #[test]
    fn test_duplicate_rejected() {
        let (_cache, section) = section();
        section.add(tag(1), vec![], 1).expect("add");
        assert_eq!(
            section.add(tag(1), vec![], 1),
            Err(CacheError::DuplicateTag(tag(1)))
        );
        assert_eq!(section.status().items, 1);
    }

    #[test]
    fn test_duplicate_replaced() {
        let cache = DataCache::new();
        let section = cache
            .add_section_with(
                "blobs",
                Blobs::default(),
                SectionConfig::new().with_duplicates(DuplicatePolicy::Replace),
            )
            .expect("add");

        let first = section.add(tag(1), vec![1], 1).expect("add");
        let second = section.add(tag(1), vec![2], 1).expect("replace");
        assert_ne!(first, second);
        assert!(!section.is_present(first));
        assert_eq!(section.find(tag(1)), Some(second));
        assert_eq!(section.status().items, 1);

        section.lock(second).expect("lock");
        assert_eq!(section.add(tag(1), vec![3], 1), Err(CacheError::Locked));
    }

    #[test]
    fn test_remove_locked_requires_force() {
        let (_cache, section) = section();
        let handle = section.add(tag(1), vec![], 10).expect("add");
        section.lock(handle).expect("lock");

        assert_eq!(section.remove(handle), Err(CacheError::Locked));
        assert!(section.is_present(handle));

        section
            .remove_ex(handle, RemoveFlags::FORCE | RemoveFlags::SILENT)
            .expect("forced remove");
        assert!(!section.is_present(handle));
        assert!(section.client().notices.lock().is_empty());
        assert_eq!(section.client().destroyed.load(Ordering::Relaxed), 1);
        assert_eq!(section.status(), Status::default());
        assert_eq!(section.remove(handle), Err(CacheError::InvalidHandle));
    }

    #[test]
    fn test_lock_unlock_accounting() {
        let (cache, section) = section();
        let handle = section.add(tag(1), vec![], 100).expect("add");
        let generation = section.unlock_generation();

        section.lock(handle).expect("lock");
        section.lock(handle).expect("lock");
        assert_eq!(section.status().locked_bytes, 100);
        assert_eq!(section.status().locked_items, 1);
        assert_eq!(cache.status().locked_bytes, 100);

        assert_eq!(section.unlock(handle), Some(1));
        assert_eq!(section.unlock_generation(), generation);
        assert_eq!(section.unlock(handle), Some(0));
        assert_eq!(section.unlock_generation(), generation + 1);
        assert_eq!(section.status().locked_bytes, 0);

        // extra unlock is tolerated
        assert_eq!(section.unlock(handle), Some(0));
    }

    #[test]
    fn test_add_locked() {
        let (_cache, section) = section();
        let handle = section
            .add_ex(tag(1), vec![], 50, AddFlags::LOCK)
            .expect("add");
        assert_eq!(section.lock_count(handle), Some(1));
        assert_eq!(section.status().locked_bytes, 50);
        assert_eq!(section.flush(true, true), 0);
    }

    #[test]
    fn test_break_lock() {
        let (_cache, section) = section();
        let handle = section.add(tag(1), vec![], 50).expect("add");
        section.lock(handle).expect("lock");
        section.lock(handle).expect("lock");

        assert!(section.break_lock(handle));
        assert_eq!(section.lock_count(handle), Some(0));
        assert_eq!(section.status().locked_items, 0);
        assert!(!section.break_lock(handle));
    }

    #[test]
    fn test_create_uses_factory() {
        let (_cache, section) = section();
        let handle = section.create(tag(9), 32, AddFlags::LOCK).expect("create");
        assert_eq!(section.get(handle).map(|item| item.len()), Some(32));
        assert_eq!(section.status().bytes, 32);
        assert_eq!(section.lock_count(handle), Some(1));
    }

    #[test]
    fn test_find_or_create_reuses_cached_item() {
        let (_cache, section) = section();
        let created = section
            .find_or_create(tag(4), 16, AddFlags::empty())
            .expect("create");
        let found = section
            .find_or_create(tag(4), 64, AddFlags::LOCK)
            .expect("find");
        assert_eq!(found, created);
        assert_eq!(section.lock_count(found), Some(1));
        assert_eq!(section.status().items, 1);
        assert_eq!(section.status().bytes, 16);
        assert_eq!(section.client().destroyed.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn test_create_failure() {
        let cache = DataCache::new();
        let section = cache
            .add_section(
                "blobs",
                Blobs {
                    fail_create: true,
                    ..Default::default()
                },
            )
            .expect("add");
        assert_eq!(
            section.create(tag(1), 8, AddFlags::empty()),
            Err(CacheError::CreateFailed)
        );
        assert_eq!(section.status().items, 0);
    }

    #[test]
    fn test_get_no_touch_keeps_lru_order() {
        let cache = DataCache::new();
        let section = cache
            .add_section_with(
                "blobs",
                Blobs::default(),
                SectionConfig::new().with_limits(Limits::items(2)),
            )
            .expect("add");

        let a = section.add(tag(1), vec![], 1).expect("add");
        let b = section.add(tag(2), vec![], 1).expect("add");
        section.get_no_touch(a).expect("get");
        section.add(tag(3), vec![], 1).expect("add");
        assert!(!section.is_present(a));
        assert!(section.is_present(b));

        section.get(b).expect("get");
        section.add(tag(4), vec![], 1).expect("add");
        assert!(section.is_present(b));
        assert!(section.find(tag(3)).is_none());
    }

    #[test]
    fn test_touch_and_age() {
        let (_cache, section) = section();
        let a = section.add(tag(1), vec![], 10).expect("add");
        let b = section.add(tag(2), vec![], 10).expect("add");

        assert!(section.age(b));
        assert_eq!(section.purge(1), 10);
        assert!(!section.is_present(b));

        let c = section.add(tag(3), vec![], 10).expect("add");
        assert!(section.touch(a));
        assert_eq!(section.purge(1), 10);
        assert!(section.is_present(a));
        assert!(!section.is_present(c));
        assert!(!section.touch(c));
    }

    #[test]
    fn test_purge_skips_locked() {
        let (_cache, section) = section();
        let a = section.add(tag(1), vec![], 100).expect("add");
        section.add(tag(2), vec![], 100).expect("add");
        section.add(tag(3), vec![], 100).expect("add");
        section.lock(a).expect("lock");

        assert_eq!(section.purge(1000), 200);
        assert!(section.is_present(a));
        assert_eq!(section.status().items, 1);
        assert_eq!(
            *section.client().notices.lock(),
            vec![(DiscardReason::Aged, 2), (DiscardReason::Aged, 3)]
        );
    }

    #[test]
    fn test_ensure_capacity_reports_locked_shortfall() {
        let cache = DataCache::new();
        let section = cache
            .add_section_with(
                "blobs",
                Blobs::default(),
                SectionConfig::new().with_limits(Limits::bytes(100)),
            )
            .expect("add");
        let a = section.add(tag(1), vec![], 60).expect("add");
        assert!(section.ensure_capacity(40, 1));
        assert!(section.ensure_capacity(50, 1));
        assert!(!section.is_present(a));

        let b = section.add_ex(tag(2), vec![], 60, AddFlags::LOCK).expect("add");
        assert!(!section.ensure_capacity(50, 1));
        assert!(section.is_present(b));
    }

    #[test]
    fn test_set_limits_evicts() {
        let (_cache, section) = section();
        for raw in 0..4 {
            section.add(tag(raw), vec![], 10).expect("add");
        }
        section.set_limits(Limits::items(2));
        assert_eq!(section.status().items, 2);
        assert!(section.find(tag(0)).is_none());
        assert!(section.find(tag(3)).is_some());
    }

    #[test]
    fn test_frame_scope_pins_once() {
        let (_cache, section) = section();
        let handle = section.add(tag(1), vec![], 10).expect("add");

        {
            let _frame = section.frame_scope();
            assert!(section.is_frame_locking());
            section.get(handle).expect("get");
            section.get(handle).expect("get");
            assert_eq!(section.lock_count(handle), Some(1));
            assert_eq!(section.purge(100), 0);
        }

        assert!(!section.is_frame_locking());
        assert_eq!(section.lock_count(handle), Some(0));
        assert_eq!(section.status().locked_items, 0);
    }

    #[test]
    fn test_nested_frames_release_at_outermost() {
        let (_cache, section) = section();
        let handle = section.add(tag(1), vec![], 10).expect("add");

        assert_eq!(section.begin_frame_locking(), 1);
        assert_eq!(section.begin_frame_locking(), 2);
        section.frame_lock(handle).expect("frame lock");
        assert_eq!(section.end_frame_locking(), 1);
        assert_eq!(section.lock_count(handle), Some(1));
        assert_eq!(section.end_frame_locking(), 0);
        assert_eq!(section.lock_count(handle), Some(0));

        // unbalanced end is a no-op
        assert_eq!(section.end_frame_locking(), 0);
    }

    #[test]
    fn test_break_and_restore_frame_lock() {
        let (_cache, section) = section();
        let handle = section.add(tag(1), vec![], 10).expect("add");

        section.begin_frame_locking();
        section.begin_frame_locking();
        section.get(handle).expect("get");

        assert_eq!(section.break_frame_lock(), 2);
        assert!(!section.is_frame_locking());
        assert_eq!(section.lock_count(handle), Some(0));

        section.restore_frame_lock(2);
        assert!(section.is_frame_locking());
        section.get(handle).expect("get");
        assert_eq!(section.lock_count(handle), Some(1));
        assert_eq!(section.end_frame_locking(), 1);
        assert_eq!(section.end_frame_locking(), 0);
        assert_eq!(section.lock_count(handle), Some(0));
    }

    #[test]
    fn test_frame_pin_survives_explicit_unlock_balance() {
        let (_cache, section) = section();
        let handle = section.add(tag(1), vec![], 10).expect("add");

        let _frame = section.frame_scope();
        section.lock(handle).expect("lock");
        section.get(handle).expect("get");
        assert_eq!(section.lock_count(handle), Some(2));
        assert_eq!(section.unlock(handle), Some(1));
    }

    #[test]
    fn test_frame_pin_on_removed_item_is_skipped() {
        let (_cache, section) = section();
        let handle = section.add(tag(1), vec![], 10).expect("add");

        section.begin_frame_locking();
        section.get(handle).expect("get");
        section.remove_ex(handle, RemoveFlags::FORCE).expect("remove");
        let replacement = section.add(tag(2), vec![], 10).expect("add");
        assert_eq!(section.end_frame_locking(), 0);

        assert_eq!(section.lock_count(replacement), Some(0));
        assert_eq!(section.status().locked_items, 0);
    }

    #[test]
    fn test_removed_section() {
        let (cache, section) = section();
        let handle = section.add(tag(1), vec![], 10).expect("add");
        assert!(cache.remove_section("blobs", false));

        assert_eq!(
            section.add(tag(2), vec![], 1),
            Err(CacheError::SectionRemoved)
        );
        assert!(section.find(tag(1)).is_none());
        assert!(section.lock(handle).is_none());
        assert!(!section.ensure_capacity(0, 0));
        assert_eq!(section.flush(false, false), 0);
        assert_eq!(section.client().destroyed.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn test_section_report() {
        let (cache, section) = section();
        section.add(tag(1), vec![], 10).expect("add");
        cache
            .add_section("other", Blobs::default())
            .expect("add")
            .add(tag(2), vec![], 20)
            .expect("add");

        let report = section.report(ReportDetail::DetailLru);
        assert_eq!(report.sections.len(), 1);
        assert_eq!(report.status.bytes, 10);
        assert_eq!(report.sections[0].items.len(), 1);
        assert_eq!(report.sections[0].items[0].tag, tag(1));
    }
}
