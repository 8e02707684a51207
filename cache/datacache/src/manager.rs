//! The cache manager.
//!
//! A [`DataCache`] owns one handle table, one global LRU and the registry of
//! sections. All structural state sits behind a single `parking_lot::Mutex`;
//! byte and item counters sit beside it as atomics so `status` never waits on
//! that lock.
//!
//! Two budgets apply to every add. The section's own limits evict from that
//! section's LRU end. The cache-wide limits evict from whichever section has
//! the most evictable bytes, leaving alone sections at or below their
//! protected minimums.
//!
//! Client callbacks (destroy, notify, item names) never run under the lock.
//! Mutations collect [`Discard`]s while holding it and dispatch them after the
//! guard drops, so a client may call straight back into the cache.

use crate::client::{
    CacheClient, ClientAdapter, ClientTag, Discard, DiscardReason, ErasedClient, Payload,
    dispatch_all,
};
use crate::config::{
    CacheConfig, DuplicatePolicy, IndexKind, Limits, SectionConfig, SectionOptions,
};
use crate::error::{CacheError, CacheResult};
use crate::frame::Pin;
use crate::handle::Handle;
use crate::index::{self, LookupIndex};
use crate::metrics;
use crate::report::{ItemReport, Report, ReportDetail, SectionReport};
use crate::section::Section;
use crate::status::{AtomicLimits, AtomicStatus, Status};
use crate::table::{Entry, HandleTable, Scan, SectionId};
use ahash::AHashMap;
use parking_lot::Mutex;
use std::any::Any;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use tracing::{debug, info, trace, warn};

/// Section uids are never reused, so state keyed by uid (frame locks, stale
/// `Section` values) cannot reach a section registered later in the same
/// registry slot.
static NEXT_SECTION_UID: AtomicU64 = AtomicU64::new(1);

/// State of one section shared between the registry and its `Section`
/// values. Everything here is readable without the structural lock.
pub(crate) struct SectionShared {
    pub(crate) name: String,
    pub(crate) id: SectionId,
    pub(crate) uid: u64,
    pub(crate) status: AtomicStatus,
    pub(crate) limits: AtomicLimits,
    pub(crate) duplicates: DuplicatePolicy,
    pub(crate) index: IndexKind,
    options: AtomicU32,
    unlock_generation: AtomicU64,
}

impl SectionShared {
    fn new(name: &str, id: SectionId, config: &SectionConfig) -> Self {
        Self {
            name: name.to_string(),
            id,
            uid: NEXT_SECTION_UID.fetch_add(1, Ordering::Relaxed),
            status: AtomicStatus::new(),
            limits: AtomicLimits::new(config.limits),
            duplicates: config.duplicates,
            index: config.index,
            options: AtomicU32::new(config.options().bits()),
            unlock_generation: AtomicU64::new(0),
        }
    }

    pub(crate) fn options(&self) -> SectionOptions {
        SectionOptions::from_bits_truncate(self.options.load(Ordering::Relaxed))
    }

    pub(crate) fn set_options(&self, options: SectionOptions) {
        self.options.store(options.bits(), Ordering::Relaxed);
    }

    pub(crate) fn unlock_generation(&self) -> u64 {
        self.unlock_generation.load(Ordering::Acquire)
    }

    fn bump_unlock_generation(&self) {
        self.unlock_generation.fetch_add(1, Ordering::Release);
    }
}

pub(crate) struct SectionEntry {
    shared: Arc<SectionShared>,
    client: Arc<dyn ErasedClient>,
    /// The concrete `Arc<C>`, recovered by `find_section`.
    typed_client: Arc<dyn Any + Send + Sync>,
    index: Box<dyn LookupIndex>,
}

pub(crate) struct Inner {
    table: HandleTable,
    sections: Vec<Option<SectionEntry>>,
    names: AHashMap<String, SectionId>,
}

impl Inner {
    fn entry(&self, section: &SectionShared) -> Option<&SectionEntry> {
        self.sections
            .get(section.id as usize)?
            .as_ref()
            .filter(|entry| entry.shared.uid == section.uid)
    }

    fn entry_mut(&mut self, section: &SectionShared) -> Option<&mut SectionEntry> {
        self.sections
            .get_mut(section.id as usize)?
            .as_mut()
            .filter(|entry| entry.shared.uid == section.uid)
    }

    fn item(&self, section: &SectionShared, handle: Handle) -> Option<&Entry> {
        self.entry(section)?;
        self.table
            .get(handle)
            .filter(|entry| entry.section == section.id)
    }

    fn item_mut(&mut self, section: &SectionShared, handle: Handle) -> Option<&mut Entry> {
        self.entry(section)?;
        self.table
            .get_mut(handle)
            .filter(|entry| entry.section == section.id)
    }

    fn find(&self, section: &SectionShared, tag: ClientTag) -> Option<Handle> {
        self.entry(section)?.index.find(&self.table, tag)
    }

    /// The section cross-section eviction should shrink next: the one with the
    /// most unlocked bytes among those still above their minimums.
    fn largest_evictable(&self) -> Option<SectionId> {
        self.sections
            .iter()
            .flatten()
            .filter_map(|entry| {
                let status = entry.shared.status.snapshot();
                let limits = entry.shared.limits.load();
                let protected = (limits.min_bytes > 0 && status.bytes <= limits.min_bytes)
                    || (limits.min_items > 0 && status.items <= limits.min_items);
                (!protected && status.unlocked_items() > 0)
                    .then_some((status.unlocked_bytes(), entry.shared.id))
            })
            .max_by_key(|(bytes, _)| *bytes)
            .map(|(_, id)| id)
    }
}

pub(crate) struct Shared {
    inner: Mutex<Inner>,
    status: AtomicStatus,
    limits: AtomicLimits,
    configs: BTreeMap<String, SectionConfig>,
}

impl Shared {
    /// Account for an entry that has left the table and queue its callbacks.
    fn retire(
        &self,
        inner: &mut Inner,
        handle: Handle,
        entry: Entry,
        reason: DiscardReason,
        notify: bool,
    ) -> Option<Discard> {
        let locked = entry.is_locked();
        self.status.record_remove(entry.size, locked);
        metrics::record_discard(reason, entry.size);

        let section = inner.sections.get_mut(entry.section as usize)?.as_mut()?;
        section.index.on_remove(entry.tag, handle);
        section.shared.status.record_remove(entry.size, locked);

        trace!(
            section = %section.shared.name,
            handle = %handle,
            tag = %entry.tag,
            size = entry.size,
            reason = %reason,
            "discard"
        );

        Some(Discard {
            client: section.client.clone(),
            reason,
            notify,
            tag: entry.tag,
            payload: entry.payload,
        })
    }

    fn retire_all(
        &self,
        inner: &mut Inner,
        evicted: Vec<(Handle, Entry)>,
        reason: DiscardReason,
        notify: bool,
        discards: &mut Vec<Discard>,
    ) {
        for (handle, entry) in evicted {
            discards.extend(self.retire(inner, handle, entry, reason, notify));
        }
    }

    /// Evict from the section and then from the cache until `bytes` and
    /// `items` more would fit in both budgets. Returns whether they fit.
    fn make_room(
        &self,
        inner: &mut Inner,
        section: &SectionShared,
        bytes: usize,
        items: usize,
        discards: &mut Vec<Discard>,
    ) -> bool {
        let limits = section.limits.load();
        let mut status = section.status.snapshot();
        let fits = |status: &Status| {
            limits.fits(
                status.bytes.saturating_add(bytes),
                status.items.saturating_add(items),
            )
        };

        if !fits(&status) {
            let evicted = inner.table.scan_lru(|_, entry| {
                if fits(&status) {
                    return Scan::Stop;
                }
                if entry.section != section.id || entry.is_locked() {
                    return Scan::Skip;
                }
                status.bytes -= entry.size;
                status.items -= 1;
                if fits(&status) {
                    Scan::EvictAndStop
                } else {
                    Scan::Evict
                }
            });
            if !evicted.is_empty() {
                debug!(
                    section = %section.name,
                    items = evicted.len(),
                    "evicted to fit section budget"
                );
            }
            self.retire_all(inner, evicted, DiscardReason::Aged, true, discards);
        }

        let section_fits = fits(&section.status.snapshot());
        let cache_fits = self.enforce_budget(inner, bytes, items, discards);
        section_fits && cache_fits
    }

    /// Evict across sections until `bytes` and `items` more fit the cache-wide
    /// budget. Returns whether they fit.
    fn enforce_budget(
        &self,
        inner: &mut Inner,
        bytes: usize,
        items: usize,
        discards: &mut Vec<Discard>,
    ) -> bool {
        let limits = self.limits.load();
        let mut evicted_items = 0;

        let fits = loop {
            let status = self.status.snapshot();
            if limits.fits(
                status.bytes.saturating_add(bytes),
                status.items.saturating_add(items),
            ) {
                break true;
            }

            let Some(victim) = inner.largest_evictable() else {
                break false;
            };
            let evicted = inner.table.scan_lru(|_, entry| {
                if entry.section == victim && !entry.is_locked() {
                    Scan::EvictAndStop
                } else {
                    Scan::Skip
                }
            });
            if evicted.is_empty() {
                break false;
            }
            evicted_items += evicted.len();
            self.retire_all(inner, evicted, DiscardReason::Aged, true, discards);
        };

        if evicted_items > 0 {
            debug!(items = evicted_items, "evicted to fit cache budget");
        }
        fits
    }

    pub(crate) fn add(
        &self,
        section: &SectionShared,
        tag: ClientTag,
        payload: Payload,
        size: usize,
        lock: bool,
    ) -> CacheResult<Handle> {
        let mut discards = Vec::new();
        let result = {
            let mut inner = self.inner.lock();
            self.add_locked(&mut inner, section, tag, payload, size, lock, &mut discards)
        };
        dispatch_all(discards);
        result
    }

    #[allow(clippy::too_many_arguments)]
    fn add_locked(
        &self,
        inner: &mut Inner,
        section: &SectionShared,
        tag: ClientTag,
        payload: Payload,
        size: usize,
        lock: bool,
        discards: &mut Vec<Discard>,
    ) -> CacheResult<Handle> {
        if inner.entry(section).is_none() {
            return Err(CacheError::SectionRemoved);
        }

        if let Some(existing) = inner.find(section, tag) {
            match section.duplicates {
                DuplicatePolicy::Reject => return Err(CacheError::DuplicateTag(tag)),
                DuplicatePolicy::Replace => {
                    if inner.table.get(existing).is_some_and(Entry::is_locked) {
                        return Err(CacheError::Locked);
                    }
                    if let Some(old) = inner.table.remove(existing) {
                        discards.extend(self.retire(
                            inner,
                            existing,
                            old,
                            DiscardReason::Removed,
                            true,
                        ));
                    }
                }
            }
        }

        self.make_room(inner, section, size, 1, discards);

        let handle = inner
            .table
            .insert(Entry {
                payload,
                size,
                section: section.id,
                tag,
                lock_count: u32::from(lock),
                pin_epoch: 0,
            })
            .ok_or(CacheError::TableFull)?;

        section.status.record_add(size);
        self.status.record_add(size);
        if lock {
            section.status.record_lock(size);
            self.status.record_lock(size);
        }
        metrics::record_add(size);

        if let Some(entry) = inner.entry_mut(section) {
            entry.index.on_add(tag, handle);
            debug_assert_eq!(entry.index.len(), section.status.snapshot().items);
        }
        debug_assert_eq!(inner.table.len(), self.status.snapshot().items);

        Ok(handle)
    }

    pub(crate) fn find(&self, section: &SectionShared, tag: ClientTag) -> Option<Handle> {
        let found = self.inner.lock().find(section, tag);
        if found.is_some() {
            metrics::HIT.increment();
        } else {
            metrics::MISS.increment();
        }
        found
    }

    pub(crate) fn remove(
        &self,
        section: &SectionShared,
        handle: Handle,
        force: bool,
        notify: bool,
    ) -> CacheResult<Payload> {
        let mut discards = Vec::new();
        let result = {
            let mut inner = self.inner.lock();
            let locks = inner
                .item(section, handle)
                .map(|entry| entry.lock_count)
                .ok_or(CacheError::InvalidHandle)?;
            if locks > 0 && !force {
                warn!(section = %section.name, handle = %handle, locks, "refusing to remove locked item");
                return Err(CacheError::Locked);
            }

            let entry = inner
                .table
                .remove(handle)
                .ok_or(CacheError::InvalidHandle)?;
            let payload = entry.payload.clone();
            discards.extend(self.retire(
                &mut inner,
                handle,
                entry,
                DiscardReason::Removed,
                notify,
            ));
            Ok(payload)
        };
        dispatch_all(discards);
        result
    }

    pub(crate) fn is_present(&self, section: &SectionShared, handle: Handle) -> bool {
        self.inner.lock().item(section, handle).is_some()
    }

    pub(crate) fn lock_item(&self, section: &SectionShared, handle: Handle) -> Option<Payload> {
        let mut inner = self.inner.lock();
        self.acquire(&mut inner, section, handle)
    }

    fn acquire(
        &self,
        inner: &mut Inner,
        section: &SectionShared,
        handle: Handle,
    ) -> Option<Payload> {
        let entry = inner.item_mut(section, handle)?;
        entry.lock_count += 1;
        let first = entry.lock_count == 1;
        let size = entry.size;
        let payload = entry.payload.clone();

        inner.table.touch(handle);
        if first {
            section.status.record_lock(size);
            self.status.record_lock(size);
        }
        Some(payload)
    }

    /// `find`, taking a lock on a hit when `lock` is set.
    pub(crate) fn find_existing(
        &self,
        section: &SectionShared,
        tag: ClientTag,
        lock: bool,
    ) -> Option<Handle> {
        let mut inner = self.inner.lock();
        let found = inner.find(section, tag);
        if let Some(handle) = found {
            metrics::HIT.increment();
            if lock {
                self.acquire(&mut inner, section, handle);
            }
        } else {
            metrics::MISS.increment();
        }
        found
    }

    /// Add unless the tag is already cached, deciding both under one hold of
    /// the lock. Returns the handle and whether `payload` was inserted; when
    /// it was not, the existing item is locked if `lock` is set.
    pub(crate) fn add_or_existing(
        &self,
        section: &SectionShared,
        tag: ClientTag,
        payload: Payload,
        size: usize,
        lock: bool,
    ) -> CacheResult<(Handle, bool)> {
        let mut discards = Vec::new();
        let result = {
            let mut inner = self.inner.lock();
            match inner.find(section, tag) {
                Some(existing) => {
                    if lock {
                        self.acquire(&mut inner, section, existing);
                    }
                    Ok((existing, false))
                }
                None => self
                    .add_locked(&mut inner, section, tag, payload, size, lock, &mut discards)
                    .map(|handle| (handle, true)),
            }
        };
        dispatch_all(discards);
        result
    }

    pub(crate) fn unlock_item(&self, section: &SectionShared, handle: Handle) -> Option<u32> {
        let mut inner = self.inner.lock();
        self.release_lock(&mut inner, section, handle, true)
    }

    fn release_lock(
        &self,
        inner: &mut Inner,
        section: &SectionShared,
        handle: Handle,
        strict: bool,
    ) -> Option<u32> {
        let entry = inner.item_mut(section, handle)?;
        if entry.lock_count == 0 {
            if strict {
                warn!(section = %section.name, handle = %handle, "unlock of unlocked item");
            }
            return Some(0);
        }

        entry.lock_count -= 1;
        if entry.lock_count == 0 {
            section.status.record_unlock(entry.size);
            self.status.record_unlock(entry.size);
            section.bump_unlock_generation();
        }
        Some(entry.lock_count)
    }

    /// Look up an item's payload, optionally promoting it and pinning it in
    /// the calling thread's open frame.
    pub(crate) fn get(
        &self,
        section: &SectionShared,
        handle: Handle,
        touch: bool,
    ) -> Option<Payload> {
        let mut inner = self.inner.lock();
        let entry = inner.item_mut(section, handle)?;
        let payload = entry.payload.clone();

        if touch {
            if crate::frame::try_pin(section.uid, handle, entry.pin_epoch) {
                entry.lock_count += 1;
                if entry.lock_count == 1 {
                    section.status.record_lock(entry.size);
                    self.status.record_lock(entry.size);
                }
                metrics::FRAME_PIN.increment();
            }
            inner.table.touch(handle);
        }
        Some(payload)
    }

    /// Drop one lock from every handle a closed frame pinned. Handles whose
    /// items are already gone, or whose locks were broken since the pin, are
    /// skipped.
    pub(crate) fn release_frame_pins(
        &self,
        section: SectionId,
        uid: u64,
        pins: impl IntoIterator<Item = Pin>,
    ) {
        let mut inner = self.inner.lock();
        let Some(shared) = inner
            .sections
            .get(section as usize)
            .and_then(Option::as_ref)
            .filter(|entry| entry.shared.uid == uid)
            .map(|entry| entry.shared.clone())
        else {
            return;
        };

        for (handle, epoch) in pins {
            let current = inner
                .item(&shared, handle)
                .is_some_and(|entry| entry.pin_epoch == epoch);
            if current {
                self.release_lock(&mut inner, &shared, handle, false);
            }
        }
    }

    pub(crate) fn lock_count(&self, section: &SectionShared, handle: Handle) -> Option<u32> {
        self.inner
            .lock()
            .item(section, handle)
            .map(|entry| entry.lock_count)
    }

    /// Clear every lock on an item. Returns whether it was locked.
    pub(crate) fn break_lock(&self, section: &SectionShared, handle: Handle) -> bool {
        let mut inner = self.inner.lock();
        let Some(entry) = inner.item_mut(section, handle) else {
            return false;
        };
        if entry.lock_count == 0 {
            return false;
        }

        entry.lock_count = 0;
        entry.pin_epoch = entry.pin_epoch.wrapping_add(1);
        section.status.record_unlock(entry.size);
        self.status.record_unlock(entry.size);
        section.bump_unlock_generation();
        crate::frame::forget(section.uid, handle);
        true
    }

    pub(crate) fn touch(&self, section: &SectionShared, handle: Handle) -> bool {
        let mut inner = self.inner.lock();
        inner.item(section, handle).is_some() && inner.table.touch(handle)
    }

    pub(crate) fn age(&self, section: &SectionShared, handle: Handle) -> bool {
        let mut inner = self.inner.lock();
        inner.item(section, handle).is_some() && inner.table.age(handle)
    }

    pub(crate) fn flush_section(
        &self,
        section: &SectionShared,
        unlocked_only: bool,
        notify: bool,
    ) -> usize {
        let mut discards = Vec::new();
        {
            let mut inner = self.inner.lock();
            if inner.entry(section).is_none() {
                return 0;
            }
            let evicted = inner.table.scan_lru(|_, entry| {
                if entry.section == section.id && !(unlocked_only && entry.is_locked()) {
                    Scan::Evict
                } else {
                    Scan::Skip
                }
            });
            self.retire_all(&mut inner, evicted, DiscardReason::Flushed, notify, &mut discards);
        }

        let flushed = discards.len();
        debug!(section = %section.name, items = flushed, unlocked_only, "flushed section");
        dispatch_all(discards);
        flushed
    }

    pub(crate) fn purge_section(&self, section: &SectionShared, bytes: usize) -> usize {
        if bytes == 0 {
            return 0;
        }

        let mut discards = Vec::new();
        let mut freed = 0;
        {
            let mut inner = self.inner.lock();
            if inner.entry(section).is_none() {
                return 0;
            }
            let evicted = inner.table.scan_lru(|_, entry| {
                if entry.section != section.id || entry.is_locked() {
                    return Scan::Skip;
                }
                freed += entry.size;
                if freed >= bytes {
                    Scan::EvictAndStop
                } else {
                    Scan::Evict
                }
            });
            self.retire_all(&mut inner, evicted, DiscardReason::Aged, true, &mut discards);
        }

        debug!(section = %section.name, requested = bytes, freed, "purged section");
        dispatch_all(discards);
        freed
    }

    pub(crate) fn ensure_capacity(
        &self,
        section: &SectionShared,
        bytes: usize,
        items: usize,
    ) -> bool {
        let mut discards = Vec::new();
        let fits = {
            let mut inner = self.inner.lock();
            inner.entry(section).is_some()
                && self.make_room(&mut inner, section, bytes, items, &mut discards)
        };
        dispatch_all(discards);
        fits
    }

    pub(crate) fn set_section_limits(&self, section: &SectionShared, limits: Limits) {
        section.limits.store(limits);
        self.ensure_capacity(section, 0, 0);
    }

    pub(crate) fn report(&self, only: Option<&SectionShared>, detail: ReportDetail) -> Report {
        let mut sections = Vec::new();
        let mut pending = Vec::new();

        {
            let inner = self.inner.lock();
            let mut positions = vec![None; inner.sections.len()];

            for entry in inner.sections.iter().flatten() {
                if only.is_some_and(|s| s.uid != entry.shared.uid) {
                    continue;
                }
                positions[entry.shared.id as usize] = Some(sections.len());
                sections.push(SectionReport {
                    name: entry.shared.name.clone(),
                    status: entry.shared.status.snapshot(),
                    limits: entry.shared.limits.load(),
                    options: entry.shared.options(),
                    index: entry.shared.index,
                    index_overhead: entry.index.overhead(),
                    items: Vec::new(),
                });
            }

            let items: Box<dyn Iterator<Item = (Handle, &Entry)> + '_> = match detail {
                ReportDetail::Summary => Box::new(std::iter::empty()),
                ReportDetail::Detail => Box::new(inner.table.iter_slots()),
                ReportDetail::DetailLru => Box::new(inner.table.iter_lru()),
            };
            for (handle, entry) in items {
                let Some(pos) = positions.get(entry.section as usize).copied().flatten() else {
                    continue;
                };
                let Some(client) = inner.sections[entry.section as usize]
                    .as_ref()
                    .map(|s| s.client.clone())
                else {
                    continue;
                };
                pending.push((pos, sections[pos].items.len(), client, entry.payload.clone()));
                sections[pos].items.push(ItemReport {
                    handle,
                    tag: entry.tag,
                    size: entry.size,
                    lock_count: entry.lock_count,
                    name: None,
                });
            }
        }

        for (section, item, client, payload) in pending {
            let report = &mut sections[section].items[item];
            report.name = client.describe(report.tag, &payload);
        }

        let (status, limits) = match only {
            Some(section) => (section.status.snapshot(), section.limits.load()),
            None => (self.status.snapshot(), self.limits.load()),
        };

        Report {
            detail,
            status,
            limits,
            sections,
        }
    }
}

/// Summary of a registered section, as returned by [`DataCache::sections`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SectionInfo {
    /// Section name.
    pub name: String,
    /// Counters.
    pub status: Status,
    /// Budget.
    pub limits: Limits,
    /// Option flags.
    pub options: SectionOptions,
}

/// A byte-budgeted cache of client resources, partitioned into sections.
///
/// `DataCache` is a cheap handle; clones share the same cache.
#[derive(Clone)]
pub struct DataCache {
    shared: Arc<Shared>,
}

impl DataCache {
    /// Create a cache with no cache-wide budget.
    pub fn new() -> Self {
        Self::from_config(&CacheConfig::default())
    }

    /// Create a cache with the given cache-wide budget.
    pub fn with_limits(limits: Limits) -> Self {
        let cache = Self::new();
        cache.shared.limits.store(limits);
        cache
    }

    /// Create a cache from configuration. Section settings in `config` are
    /// applied when sections of those names are added.
    pub fn from_config(config: &CacheConfig) -> Self {
        let inner = Inner {
            table: HandleTable::with_capacity(config.initial_capacity),
            sections: Vec::new(),
            names: AHashMap::new(),
        };

        Self {
            shared: Arc::new(Shared {
                inner: Mutex::new(inner),
                status: AtomicStatus::new(),
                limits: AtomicLimits::new(config.limits()),
                configs: config.sections.clone(),
            }),
        }
    }

    /// Register a section, using the settings configured for `name` (or the
    /// defaults if there are none).
    pub fn add_section<C: CacheClient>(&self, name: &str, client: C) -> CacheResult<Section<C>> {
        let config = self.shared.configs.get(name).cloned().unwrap_or_default();
        self.add_section_with(name, client, config)
    }

    /// Register a section with explicit settings.
    pub fn add_section_with<C: CacheClient>(
        &self,
        name: &str,
        client: C,
        config: SectionConfig,
    ) -> CacheResult<Section<C>> {
        let mut inner = self.shared.inner.lock();
        if inner.names.contains_key(name) {
            return Err(CacheError::DuplicateSection(name.to_string()));
        }

        let id = inner
            .sections
            .iter()
            .position(Option::is_none)
            .unwrap_or(inner.sections.len()) as SectionId;
        let shared = Arc::new(SectionShared::new(name, id, &config));
        let client = Arc::new(client);
        let entry = SectionEntry {
            shared: shared.clone(),
            client: Arc::new(ClientAdapter(client.clone())),
            typed_client: client.clone(),
            index: index::build(config.index),
        };

        if (id as usize) < inner.sections.len() {
            inner.sections[id as usize] = Some(entry);
        } else {
            inner.sections.push(Some(entry));
        }
        inner.names.insert(name.to_string(), id);

        debug!(
            section = name,
            id,
            max_bytes = config.limits.max_bytes,
            max_items = config.limits.max_items,
            index = ?config.index,
            "added section"
        );

        Ok(Section::new(self.shared.clone(), shared, client))
    }

    /// Unregister a section, discarding every item it holds regardless of
    /// locks. Returns `false` if no section has that name.
    pub fn remove_section(&self, name: &str, notify: bool) -> bool {
        let mut discards = Vec::new();
        {
            let mut inner = self.shared.inner.lock();
            let Some(id) = inner.names.get(name).copied() else {
                return false;
            };

            let evicted = inner
                .table
                .scan_lru(|_, entry| if entry.section == id { Scan::Evict } else { Scan::Skip });
            self.shared
                .retire_all(&mut inner, evicted, DiscardReason::Flushed, notify, &mut discards);

            inner.names.remove(name);
            inner.sections[id as usize] = None;
        }

        debug!(section = name, items = discards.len(), "removed section");
        dispatch_all(discards);
        true
    }

    /// Look up a registered section. Returns `None` if there is no section of
    /// that name or its client is not a `C`.
    pub fn find_section<C: CacheClient>(&self, name: &str) -> Option<Section<C>> {
        let inner = self.shared.inner.lock();
        let id = *inner.names.get(name)?;
        let entry = inner.sections.get(id as usize)?.as_ref()?;
        let client = entry.typed_client.clone().downcast::<C>().ok()?;
        Some(Section::new(
            self.shared.clone(),
            entry.shared.clone(),
            client,
        ))
    }

    /// Registered sections in registry order.
    pub fn sections(&self) -> Vec<SectionInfo> {
        let inner = self.shared.inner.lock();
        inner
            .sections
            .iter()
            .flatten()
            .map(|entry| SectionInfo {
                name: entry.shared.name.clone(),
                status: entry.shared.status.snapshot(),
                limits: entry.shared.limits.load(),
                options: entry.shared.options(),
            })
            .collect()
    }

    /// Set the cache-wide byte ceiling, evicting until it is met.
    pub fn set_size(&self, max_bytes: usize) {
        self.shared.limits.set_max_bytes(max_bytes);
        self.enforce_budget();
    }

    /// Set the cache-wide item ceiling, evicting until it is met.
    pub fn set_max_items(&self, max_items: usize) {
        self.shared.limits.set_max_items(max_items);
        self.enforce_budget();
    }

    /// Replace the cache-wide budget, evicting until it is met.
    pub fn set_limits(&self, limits: Limits) {
        self.shared.limits.store(limits);
        self.enforce_budget();
    }

    fn enforce_budget(&self) -> bool {
        let mut discards = Vec::new();
        let fits = {
            let mut inner = self.shared.inner.lock();
            self.shared.enforce_budget(&mut inner, 0, 0, &mut discards)
        };
        dispatch_all(discards);
        fits
    }

    /// The cache-wide budget.
    pub fn limits(&self) -> Limits {
        self.shared.limits.load()
    }

    /// Apply option flags to every registered section.
    pub fn set_options(&self, options: SectionOptions) {
        let inner = self.shared.inner.lock();
        for entry in inner.sections.iter().flatten() {
            entry.shared.set_options(options);
        }
    }

    /// Evict unlocked items in global LRU order, from any section, until
    /// `bytes` are freed or nothing evictable remains. Returns bytes freed.
    pub fn purge(&self, bytes: usize) -> usize {
        if bytes == 0 {
            return 0;
        }

        let mut discards = Vec::new();
        let mut freed = 0;
        {
            let mut inner = self.shared.inner.lock();
            let evicted = inner.table.scan_lru(|_, entry| {
                if entry.is_locked() {
                    return Scan::Skip;
                }
                freed += entry.size;
                if freed >= bytes {
                    Scan::EvictAndStop
                } else {
                    Scan::Evict
                }
            });
            self.shared
                .retire_all(&mut inner, evicted, DiscardReason::Aged, true, &mut discards);
        }

        debug!(requested = bytes, freed, "purged cache");
        dispatch_all(discards);
        freed
    }

    /// Flush every section not marked `NO_FORCE_FLUSH`. Returns items
    /// discarded.
    pub fn flush(&self, unlocked_only: bool, notify: bool) -> usize {
        let mut discards = Vec::new();
        {
            let mut inner = self.shared.inner.lock();
            let flushable: Vec<bool> = inner
                .sections
                .iter()
                .map(|entry| {
                    entry.as_ref().is_some_and(|entry| {
                        !entry.shared.options().contains(SectionOptions::NO_FORCE_FLUSH)
                    })
                })
                .collect();

            let evicted = inner.table.scan_lru(|_, entry| {
                let eligible = flushable
                    .get(entry.section as usize)
                    .copied()
                    .unwrap_or(false);
                if eligible && !(unlocked_only && entry.is_locked()) {
                    Scan::Evict
                } else {
                    Scan::Skip
                }
            });
            self.shared
                .retire_all(&mut inner, evicted, DiscardReason::Flushed, notify, &mut discards);
        }

        let flushed = discards.len();
        debug!(items = flushed, unlocked_only, "flushed cache");
        dispatch_all(discards);
        flushed
    }

    /// Cache-wide counters, read without the structural lock.
    pub fn status(&self) -> Status {
        self.shared.status.snapshot()
    }

    /// Build a report of the whole cache.
    pub fn report(&self, detail: ReportDetail) -> Report {
        self.shared.report(None, detail)
    }

    /// Build a report of the whole cache and log it at info level.
    pub fn output_report(&self, detail: ReportDetail) -> Report {
        let report = self.report(detail);
        info!("{report}");
        report
    }
}

impl Default for DataCache {
    fn default() -> Self {
        Self::new()
    }
}
