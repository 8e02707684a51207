//! datacache: a byte-budgeted resource cache partitioned into sections.
//!
//! Clients register a named [`Section`] with a [`CacheClient`] that knows how
//! to build, size, destroy and name their resources. They then add, find and
//! lock items through opaque [`Handle`]s; the cache evicts unlocked items in
//! least-recently-used order whenever a section or the cache as a whole runs
//! over budget.
//!
//! - **Handles**: generational slot indices; a handle kept past its item's
//!   removal is detected as stale instead of aliasing a newer item
//! - **Sections**: independent byte/item budgets, lock accounting, optional
//!   hash index for O(1) `find`
//! - **Manager**: one handle table and one LRU shared by every section, plus
//!   a cache-wide budget enforced across sections
//! - **Frame locking**: per-thread pinning released automatically when the
//!   thread's outermost frame ends
//!
//! # Architecture
//!
//! ```text
//!   Section<A>   Section<B>   Section<C>      (typed client views)
//!        \            |            /
//!         +-----------+-----------+
//!                     |
//!              +------v------+          status / limits
//!              |  DataCache  |------->  (atomics, no lock)
//!              +------+------+
//!                     | Mutex
//!       +-------------+--------------+
//!       |             |              |
//!  +----v-----+  +----v-----+  +-----v------+
//!  |  handle  |  | section  |  |  lookup    |
//!  |  table + |  | registry |  |  indexes   |
//!  |  LRU     |  |          |  | (scan/hash)|
//!  +----------+  +----------+  +------------+
//!
//!  thread-local frame state: section uid -> pinned handles
//! ```
//!
//! # Example
//!
//! ```
//! use datacache::{CacheClient, ClientTag, DataCache, Limits, SectionConfig};
//!
//! struct Textures;
//!
//! impl CacheClient for Textures {
//!     type Item = Vec<u8>;
//!     type Data = usize;
//!
//!     fn create(&self, _tag: ClientTag, len: usize) -> Option<Vec<u8>> {
//!         Some(vec![0; len])
//!     }
//!
//!     fn estimated_size(&self, len: &usize) -> usize {
//!         *len
//!     }
//! }
//!
//! let cache = DataCache::new();
//! let textures = cache
//!     .add_section_with(
//!         "textures",
//!         Textures,
//!         SectionConfig::new().with_limits(Limits::bytes(1000)).fast_find(),
//!     )
//!     .unwrap();
//!
//! let a = textures.add(ClientTag::new(1), vec![0; 400], 400).unwrap();
//! textures.add(ClientTag::new(2), vec![0; 400], 400).unwrap();
//! textures.add(ClientTag::new(3), vec![0; 400], 400).unwrap();
//!
//! // the oldest item made room for the third
//! assert!(textures.lock(a).is_none());
//! assert!(textures.find(ClientTag::new(1)).is_none());
//! assert_eq!(textures.status().bytes, 800);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

mod client;
mod config;
mod error;
mod frame;
mod handle;
mod index;
mod manager;
pub mod metrics;
mod report;
mod section;
mod status;
mod table;

pub use client::{CacheClient, ClientTag, DiscardReason, Notification};
pub use config::{
    CacheConfig, ConfigError, DuplicatePolicy, IndexKind, Limits, SectionConfig, SectionOptions,
    parse_size,
};
pub use error::{CacheError, CacheResult};
pub use handle::Handle;
pub use manager::{DataCache, SectionInfo};
pub use report::{ItemReport, Report, ReportDetail, SectionReport};
pub use section::{AddFlags, FrameScope, RemoveFlags, Section};
pub use status::Status;
