//! Opaque handles for cached items.
//!
//! A `Handle` packs a slot index and the slot's generation into a single
//! 64-bit token. The handle table bumps a slot's generation every time the
//! slot is vacated, so a handle kept past a remove or an eviction no longer
//! matches and is rejected instead of aliasing whatever item reuses the slot.
//!
//! # Layout
//!
//! ```text
//! | generation (32 bits) | slot_index (32 bits) |
//! |     bits 63-32       |      bits 31-0       |
//! ```

use std::fmt;

/// Opaque token referencing a slot in the handle table.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Handle(u64);

impl Handle {
    const SLOT_BITS: u64 = 32;
    const SLOT_MASK: u64 = (1 << Self::SLOT_BITS) - 1;
    const GEN_SHIFT: u64 = Self::SLOT_BITS;

    /// Sentinel that never refers to an item.
    pub const INVALID: Self = Self(u64::MAX);

    /// Largest slot index a handle can carry. `u32::MAX` is reserved so that
    /// no live handle can equal [`Handle::INVALID`].
    pub(crate) const MAX_SLOT: u32 = u32::MAX - 1;

    #[inline]
    pub(crate) fn new(slot_index: u32, generation: u32) -> Self {
        debug_assert!(slot_index <= Self::MAX_SLOT, "slot index out of range");
        Self((slot_index as u64) | ((generation as u64) << Self::GEN_SHIFT))
    }

    /// Rebuild a handle from its raw value.
    #[inline]
    pub fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// Get the raw 64-bit value.
    #[inline]
    pub fn as_raw(&self) -> u64 {
        self.0
    }

    /// Check if this is the invalid sentinel.
    ///
    /// A handle that is not the sentinel may still be stale; only the cache
    /// can tell, via `is_present` or a failed `lock`/`get`.
    #[inline]
    pub fn is_invalid(&self) -> bool {
        *self == Self::INVALID
    }

    #[inline]
    pub(crate) fn slot_index(&self) -> u32 {
        (self.0 & Self::SLOT_MASK) as u32
    }

    #[inline]
    pub(crate) fn generation(&self) -> u32 {
        (self.0 >> Self::GEN_SHIFT) as u32
    }
}

impl Default for Handle {
    fn default() -> Self {
        Self::INVALID
    }
}

impl fmt::Debug for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_invalid() {
            write!(f, "Handle::INVALID")
        } else {
            write!(f, "Handle({}@{})", self.slot_index(), self.generation())
        }
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_invalid() {
            write!(f, "invalid")
        } else {
            write!(f, "{}@{}", self.slot_index(), self.generation())
        }
    }
}
