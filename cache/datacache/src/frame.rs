//! Per-thread frame locking.
//!
//! While a thread has frame locking active on a section, every `get` it makes
//! on that section pins the item (one extra lock) for the rest of the frame.
//! The pins are recorded here, in thread-local state keyed by the section's
//! unique id, and released together when the outermost
//! `end_frame_locking` returns. No other thread ever reads or writes this
//! state, so unwinding a frame needs no coordination beyond the structural
//! lock taken to drop the pins.
//!
//! An item is pinned at most once per thread per frame no matter how often it
//! is fetched. Each pin remembers the item's pin epoch; `break_lock` bumps the
//! epoch, so pins recorded before the break (on any thread) are skipped when
//! their frame ends instead of releasing someone else's lock. If a thread
//! exits while a frame is still open, the state's destructor releases
//! whatever it had pinned.

use crate::handle::Handle;
use crate::manager::Shared;
use crate::table::SectionId;
use ahash::AHashMap;
use std::cell::RefCell;
use std::sync::{Arc, Weak};

thread_local! {
    static FRAMES: RefCell<AHashMap<u64, FrameState>> = RefCell::new(AHashMap::new());
}

/// A pinned handle and the item's pin epoch when it was pinned.
pub(crate) type Pin = (Handle, u32);

struct FrameState {
    depth: u32,
    pinned: AHashMap<Handle, u32>,
    owner: Weak<Shared>,
    section: SectionId,
    uid: u64,
}

impl Drop for FrameState {
    fn drop(&mut self) {
        if self.pinned.is_empty() {
            return;
        }
        if let Some(owner) = self.owner.upgrade() {
            let pinned = std::mem::take(&mut self.pinned);
            owner.release_frame_pins(self.section, self.uid, pinned);
        }
    }
}

/// Enter one level of frame locking. Returns the new depth.
pub(crate) fn begin(owner: &Arc<Shared>, section: SectionId, uid: u64) -> u32 {
    FRAMES
        .try_with(|frames| {
            let mut frames = frames.borrow_mut();
            let state = frames.entry(uid).or_insert_with(|| FrameState {
                depth: 0,
                pinned: AHashMap::new(),
                owner: Arc::downgrade(owner),
                section,
                uid,
            });
            state.depth += 1;
            state.depth
        })
        .unwrap_or(0)
}

/// Leave one level. Returns the remaining depth and, when the outermost level
/// closed, the pins that must now be dropped. `None` if the thread was not
/// frame locking this section.
pub(crate) fn end(uid: u64) -> Option<(u32, Vec<Pin>)> {
    FRAMES
        .try_with(|frames| {
            let mut frames = frames.borrow_mut();
            let state = frames.get_mut(&uid)?;
            if state.depth > 1 {
                state.depth -= 1;
                return Some((state.depth, Vec::new()));
            }

            let mut state = frames.remove(&uid)?;
            let pinned = std::mem::take(&mut state.pinned);
            Some((0, pinned.into_iter().collect()))
        })
        .ok()
        .flatten()
}

/// Current nesting depth on this thread, zero if not frame locking.
pub(crate) fn depth(uid: u64) -> u32 {
    FRAMES
        .try_with(|frames| frames.borrow().get(&uid).map_or(0, |state| state.depth))
        .unwrap_or(0)
}

/// Record a pin of `handle` under the item's current `epoch` in the open
/// frame. Returns `true` when the caller must take the extra lock: the first
/// time per frame, or again after the item's locks were broken.
pub(crate) fn try_pin(uid: u64, handle: Handle, epoch: u32) -> bool {
    FRAMES
        .try_with(|frames| {
            frames
                .borrow_mut()
                .get_mut(&uid)
                .is_some_and(|state| state.pinned.insert(handle, epoch) != Some(epoch))
        })
        .unwrap_or(false)
}

/// Forget a pin without releasing it, after the item's locks were broken or
/// the item was removed on this thread.
pub(crate) fn forget(uid: u64, handle: Handle) {
    let _ = FRAMES.try_with(|frames| {
        if let Some(state) = frames.borrow_mut().get_mut(&uid) {
            state.pinned.remove(&handle);
        }
    });
}
