//! The collaborator side of a section.
//!
//! A section never decides how a resource is built or torn down. Its owner
//! supplies a [`CacheClient`]: a factory, a size estimator, a destructor and
//! a discard notifier. The cache stores payloads type-erased in the shared
//! handle table; [`ClientAdapter`] recovers the concrete type when a payload
//! has to be handed back to its client.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// Type-erased payload as stored in the handle table.
pub(crate) type Payload = Arc<dyn Any + Send + Sync>;

/// Client-chosen identifier for an item, meaningful only to the section that
/// owns it. Used as the lookup key by `find`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct ClientTag(u64);

impl ClientTag {
    const DISCRIMINATOR_BITS: u64 = 8;
    const DISCRIMINATOR_MASK: u64 = (1 << Self::DISCRIMINATOR_BITS) - 1;

    /// Largest id accepted by [`ClientTag::compose`].
    pub const MAX_ID: u64 = u64::MAX >> Self::DISCRIMINATOR_BITS;

    /// Create a tag from a raw value.
    #[inline]
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Build a composite tag from a client id and a small type
    /// discriminator, for clients that cache several kinds of data per
    /// object under one section.
    ///
    /// Ids wider than [`ClientTag::MAX_ID`] are truncated.
    #[inline]
    pub const fn compose(id: u64, discriminator: u8) -> Self {
        Self(((id & Self::MAX_ID) << Self::DISCRIMINATOR_BITS) | discriminator as u64)
    }

    /// Id part of a composite tag.
    #[inline]
    pub const fn id(&self) -> u64 {
        self.0 >> Self::DISCRIMINATOR_BITS
    }

    /// Discriminator part of a composite tag.
    #[inline]
    pub const fn discriminator(&self) -> u8 {
        (self.0 & Self::DISCRIMINATOR_MASK) as u8
    }

    /// Get the raw value.
    #[inline]
    pub const fn as_raw(&self) -> u64 {
        self.0
    }
}

impl From<u64> for ClientTag {
    fn from(raw: u64) -> Self {
        Self(raw)
    }
}

impl fmt::Debug for ClientTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ClientTag({:#x})", self.0)
    }
}

impl fmt::Display for ClientTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Why an item left the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DiscardReason {
    /// Evicted from the LRU end to make room (purge, budget enforcement).
    Aged,
    /// Evicted by a flush of its section or of the whole cache.
    Flushed,
    /// Removed explicitly by its owner, or replaced by a duplicate add.
    Removed,
}

impl DiscardReason {
    pub(crate) fn as_str(&self) -> &'static str {
        match self {
            Self::Aged => "aged",
            Self::Flushed => "flushed",
            Self::Removed => "removed",
        }
    }
}

impl fmt::Display for DiscardReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Delivered to [`CacheClient::notify`] just before an item is destroyed.
#[derive(Debug)]
pub struct Notification<'a, T> {
    /// Why the item is going away.
    pub reason: DiscardReason,
    /// The item's tag.
    pub tag: ClientTag,
    /// The item itself.
    pub item: &'a T,
}

/// Callback interface supplied by a section's owner.
///
/// Callbacks are invoked after the cache has released its structural lock,
/// so they may call back into the cache.
pub trait CacheClient: Send + Sync + 'static {
    /// The cached resource.
    type Item: Send + Sync + 'static;

    /// Input from which the factory builds an item.
    type Data;

    /// Build a resource from its source data. Returning `None` aborts the
    /// add.
    fn create(&self, tag: ClientTag, data: Self::Data) -> Option<Self::Item>;

    /// Bytes the item built from `data` will be charged against budgets.
    fn estimated_size(&self, data: &Self::Data) -> usize;

    /// Release hook, called exactly once per item when it leaves the cache.
    /// The payload's memory is freed when the last `Arc` to it drops.
    fn destroy(&self, _tag: ClientTag, _item: &Self::Item) {}

    /// Discard notification, called before `destroy` unless the discarding
    /// operation asked for silence. Clients use it to drop any raw
    /// references they kept to the item.
    fn notify(&self, _notification: Notification<'_, Self::Item>) {}

    /// Human-readable name for reports.
    fn item_name(&self, _tag: ClientTag, _item: &Self::Item) -> Option<String> {
        None
    }
}

/// Object-safe view of a client, used where the concrete item type is not
/// known (cross-section eviction, reports).
pub(crate) trait ErasedClient: Send + Sync {
    fn discard(&self, reason: DiscardReason, notify: bool, tag: ClientTag, payload: &Payload);

    fn describe(&self, tag: ClientTag, payload: &Payload) -> Option<String>;
}

pub(crate) struct ClientAdapter<C>(pub(crate) Arc<C>);

impl<C: CacheClient> ErasedClient for ClientAdapter<C> {
    fn discard(&self, reason: DiscardReason, notify: bool, tag: ClientTag, payload: &Payload) {
        let Some(item) = (**payload).downcast_ref::<C::Item>() else {
            return;
        };
        if notify {
            self.0.notify(Notification { reason, tag, item });
        }
        self.0.destroy(tag, item);
    }

    fn describe(&self, tag: ClientTag, payload: &Payload) -> Option<String> {
        let item = (**payload).downcast_ref::<C::Item>()?;
        self.0.item_name(tag, item)
    }
}

/// An item that has left the handle table and still owes its client the
/// discard callbacks. Built under the structural lock, dispatched after it
/// is released.
pub(crate) struct Discard {
    pub(crate) client: Arc<dyn ErasedClient>,
    pub(crate) reason: DiscardReason,
    pub(crate) notify: bool,
    pub(crate) tag: ClientTag,
    pub(crate) payload: Payload,
}

impl Discard {
    pub(crate) fn dispatch(self) {
        self.client
            .discard(self.reason, self.notify, self.tag, &self.payload);
    }
}

/// Run the callbacks for a batch of discards.
pub(crate) fn dispatch_all(discards: Vec<Discard>) {
    for discard in discards {
        discard.dispatch();
    }
}
