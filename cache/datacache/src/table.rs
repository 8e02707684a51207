//! Handle table: generational slot storage plus the global LRU order.
//!
//! Slots live in a `Vec` and are recycled through an index free list, so a
//! slot's position never moves while it is occupied. Occupied slots are also
//! threaded onto one doubly-linked LRU list that spans every section:
//!
//! ```text
//! lru (oldest, evicted first) <-> ... <-> mru (most recently touched)
//! ```
//!
//! The table has no locking of its own; it lives inside the cache's
//! structural mutex.

use crate::client::{ClientTag, Payload};
use crate::handle::Handle;

/// Sentinel index for "no slot".
const NIL: u32 = u32::MAX;

/// Registry index of the section owning an item.
pub(crate) type SectionId = u32;

/// Metadata and payload for one cached item.
pub(crate) struct Entry {
    pub(crate) payload: Payload,
    pub(crate) size: usize,
    pub(crate) section: SectionId,
    pub(crate) tag: ClientTag,
    pub(crate) lock_count: u32,
    /// Bumped when every lock is broken; frame pins taken under an older
    /// epoch no longer hold a lock and must not release one.
    pub(crate) pin_epoch: u32,
}

impl Entry {
    #[inline]
    pub(crate) fn is_locked(&self) -> bool {
        self.lock_count > 0
    }
}

struct Slot {
    generation: u32,
    entry: Option<Entry>,
    /// Toward the LRU end. Free-list link when vacant.
    older: u32,
    /// Toward the MRU end.
    newer: u32,
}

impl Slot {
    fn vacant(next_free: u32) -> Self {
        Self {
            generation: 0,
            entry: None,
            older: next_free,
            newer: NIL,
        }
    }
}

/// Decision returned by the visitor passed to [`HandleTable::scan_lru`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Scan {
    /// Leave the item and continue toward the MRU end.
    Skip,
    /// Remove the item and continue.
    Evict,
    /// Remove the item and stop.
    EvictAndStop,
    /// Stop without touching the item.
    Stop,
}

pub(crate) struct HandleTable {
    slots: Vec<Slot>,
    free_head: u32,
    lru: u32,
    mru: u32,
    len: usize,
}

impl HandleTable {
    /// Create a table with `capacity` slots preallocated. The table grows
    /// past it on demand.
    pub(crate) fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.min(Handle::MAX_SLOT as usize);
        let mut slots = Vec::with_capacity(capacity);
        for i in 0..capacity {
            let next = if i + 1 < capacity { (i + 1) as u32 } else { NIL };
            slots.push(Slot::vacant(next));
        }

        Self {
            slots,
            free_head: if capacity > 0 { 0 } else { NIL },
            lru: NIL,
            mru: NIL,
            len: 0,
        }
    }

    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.len
    }

    #[cfg(test)]
    pub(crate) fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Store an entry at the MRU end. Returns `None` when every addressable
    /// slot is occupied.
    pub(crate) fn insert(&mut self, entry: Entry) -> Option<Handle> {
        let idx = if self.free_head != NIL {
            let idx = self.free_head;
            self.free_head = self.slots[idx as usize].older;
            idx
        } else {
            if self.slots.len() > Handle::MAX_SLOT as usize {
                return None;
            }
            self.slots.push(Slot::vacant(NIL));
            (self.slots.len() - 1) as u32
        };

        let slot = &mut self.slots[idx as usize];
        slot.entry = Some(entry);
        let handle = Handle::new(idx, slot.generation);
        self.link_mru(idx);
        self.len += 1;
        Some(handle)
    }

    /// Slot index for a handle that refers to a live entry.
    #[inline]
    fn resolve(&self, handle: Handle) -> Option<u32> {
        if handle.is_invalid() {
            return None;
        }
        let idx = handle.slot_index();
        let slot = self.slots.get(idx as usize)?;
        (slot.generation == handle.generation() && slot.entry.is_some()).then_some(idx)
    }

    pub(crate) fn get(&self, handle: Handle) -> Option<&Entry> {
        let idx = self.resolve(handle)?;
        self.slots[idx as usize].entry.as_ref()
    }

    pub(crate) fn get_mut(&mut self, handle: Handle) -> Option<&mut Entry> {
        let idx = self.resolve(handle)?;
        self.slots[idx as usize].entry.as_mut()
    }

    /// Remove an entry. The slot's generation is bumped, so `handle` and any
    /// copy of it stop resolving.
    pub(crate) fn remove(&mut self, handle: Handle) -> Option<Entry> {
        let idx = self.resolve(handle)?;
        self.remove_at(idx)
    }

    fn remove_at(&mut self, idx: u32) -> Option<Entry> {
        let entry = self.slots[idx as usize].entry.take()?;
        self.unlink(idx);
        let free_head = self.free_head;
        let slot = &mut self.slots[idx as usize];
        slot.generation = slot.generation.wrapping_add(1);
        slot.older = free_head;
        slot.newer = NIL;
        self.free_head = idx;
        self.len -= 1;
        Some(entry)
    }

    /// Move an entry to the MRU end.
    pub(crate) fn touch(&mut self, handle: Handle) -> bool {
        let Some(idx) = self.resolve(handle) else {
            return false;
        };
        if self.mru != idx {
            self.unlink(idx);
            self.link_mru(idx);
        }
        true
    }

    /// Move an entry to the LRU end, making it the next eviction candidate.
    pub(crate) fn age(&mut self, handle: Handle) -> bool {
        let Some(idx) = self.resolve(handle) else {
            return false;
        };
        if self.lru != idx {
            self.unlink(idx);
            self.link_lru(idx);
        }
        true
    }

    /// Walk from the LRU end toward the MRU end, letting `visit` decide what
    /// to do with each entry. Evicted entries are returned in eviction order.
    pub(crate) fn scan_lru<F>(&mut self, mut visit: F) -> Vec<(Handle, Entry)>
    where
        F: FnMut(Handle, &Entry) -> Scan,
    {
        let mut evicted = Vec::new();
        let mut cursor = self.lru;

        while cursor != NIL {
            let slot = &self.slots[cursor as usize];
            let next = slot.newer;
            let handle = Handle::new(cursor, slot.generation);
            let Some(entry) = slot.entry.as_ref() else {
                break;
            };

            let decision = visit(handle, entry);
            if matches!(decision, Scan::Evict | Scan::EvictAndStop)
                && let Some(entry) = self.remove_at(cursor)
            {
                evicted.push((handle, entry));
            }
            if matches!(decision, Scan::Stop | Scan::EvictAndStop) {
                break;
            }

            cursor = next;
        }

        evicted
    }

    /// Iterate from the LRU end toward the MRU end.
    pub(crate) fn iter_lru(&self) -> LruIter<'_> {
        LruIter {
            table: self,
            cursor: self.lru,
            forward: true,
        }
    }

    /// Iterate live entries in slot order.
    pub(crate) fn iter_slots(&self) -> impl Iterator<Item = (Handle, &Entry)> {
        self.slots.iter().enumerate().filter_map(|(idx, slot)| {
            let entry = slot.entry.as_ref()?;
            Some((Handle::new(idx as u32, slot.generation), entry))
        })
    }

    /// Iterate from the MRU end toward the LRU end.
    #[cfg(test)]
    pub(crate) fn iter_mru(&self) -> LruIter<'_> {
        LruIter {
            table: self,
            cursor: self.mru,
            forward: false,
        }
    }

    fn link_mru(&mut self, idx: u32) {
        let old_mru = self.mru;
        {
            let slot = &mut self.slots[idx as usize];
            slot.older = old_mru;
            slot.newer = NIL;
        }
        if old_mru != NIL {
            self.slots[old_mru as usize].newer = idx;
        } else {
            self.lru = idx;
        }
        self.mru = idx;
    }

    fn link_lru(&mut self, idx: u32) {
        let old_lru = self.lru;
        {
            let slot = &mut self.slots[idx as usize];
            slot.older = NIL;
            slot.newer = old_lru;
        }
        if old_lru != NIL {
            self.slots[old_lru as usize].older = idx;
        } else {
            self.mru = idx;
        }
        self.lru = idx;
    }

    fn unlink(&mut self, idx: u32) {
        let (older, newer) = {
            let slot = &self.slots[idx as usize];
            (slot.older, slot.newer)
        };

        if older != NIL {
            self.slots[older as usize].newer = newer;
        } else {
            self.lru = newer;
        }

        if newer != NIL {
            self.slots[newer as usize].older = older;
        } else {
            self.mru = older;
        }

        let slot = &mut self.slots[idx as usize];
        slot.older = NIL;
        slot.newer = NIL;
    }
}

/// Iterator over live entries in LRU order.
pub(crate) struct LruIter<'a> {
    table: &'a HandleTable,
    cursor: u32,
    forward: bool,
}

impl<'a> Iterator for LruIter<'a> {
    type Item = (Handle, &'a Entry);

    fn next(&mut self) -> Option<Self::Item> {
        if self.cursor == NIL {
            return None;
        }
        let slot = &self.table.slots[self.cursor as usize];
        let handle = Handle::new(self.cursor, slot.generation);
        self.cursor = if self.forward { slot.newer } else { slot.older };
        slot.entry.as_ref().map(|entry| (handle, entry))
    }
}
