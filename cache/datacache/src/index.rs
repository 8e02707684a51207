//! Tag lookup for sections.
//!
//! Every section owns one [`LookupIndex`], chosen by its `IndexKind` when the
//! section is created. The cache calls `on_add` and `on_remove` under the
//! structural lock whenever an item of the section enters or leaves the
//! handle table, so `find` never observes a stale mapping.

use crate::client::ClientTag;
use crate::config::IndexKind;
use crate::handle::Handle;
use crate::table::HandleTable;
use ahash::AHashMap;

pub(crate) trait LookupIndex: Send {
    fn on_add(&mut self, tag: ClientTag, handle: Handle);

    fn on_remove(&mut self, tag: ClientTag, handle: Handle);

    fn find(&self, table: &HandleTable, tag: ClientTag) -> Option<Handle>;

    fn len(&self) -> usize;

    /// Bytes of index bookkeeping, for reports.
    fn overhead(&self) -> usize;
}

pub(crate) fn build(kind: IndexKind) -> Box<dyn LookupIndex> {
    match kind {
        IndexKind::Scan => Box::new(LinearScan::default()),
        IndexKind::FastFind => Box::new(FastFind::default()),
    }
}

/// Keeps the section's handles in a flat list and compares tags one by one.
#[derive(Default)]
pub(crate) struct LinearScan {
    handles: Vec<Handle>,
}

impl LookupIndex for LinearScan {
    fn on_add(&mut self, _tag: ClientTag, handle: Handle) {
        self.handles.push(handle);
    }

    fn on_remove(&mut self, _tag: ClientTag, handle: Handle) {
        if let Some(pos) = self.handles.iter().position(|h| *h == handle) {
            self.handles.swap_remove(pos);
        }
    }

    fn find(&self, table: &HandleTable, tag: ClientTag) -> Option<Handle> {
        self.handles
            .iter()
            .copied()
            .find(|h| table.get(*h).is_some_and(|entry| entry.tag == tag))
    }

    fn len(&self) -> usize {
        self.handles.len()
    }

    fn overhead(&self) -> usize {
        self.handles.capacity() * std::mem::size_of::<Handle>()
    }
}

/// Hash index from tag to handle.
#[derive(Default)]
pub(crate) struct FastFind {
    map: AHashMap<ClientTag, Handle>,
}

impl LookupIndex for FastFind {
    fn on_add(&mut self, tag: ClientTag, handle: Handle) {
        self.map.insert(tag, handle);
    }

    fn on_remove(&mut self, tag: ClientTag, handle: Handle) {
        // a replaced tag may already map to a newer handle
        if self.map.get(&tag) == Some(&handle) {
            self.map.remove(&tag);
        }
    }

    fn find(&self, _table: &HandleTable, tag: ClientTag) -> Option<Handle> {
        self.map.get(&tag).copied()
    }

    fn len(&self) -> usize {
        self.map.len()
    }

    fn overhead(&self) -> usize {
        self.map.capacity() * (std::mem::size_of::<ClientTag>() + std::mem::size_of::<Handle>())
    }
}
