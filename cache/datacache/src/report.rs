//! Read-only reports of cache contents.
//!
//! Building a report never changes LRU order. Item names are resolved through
//! `CacheClient::item_name` after the structural lock is released.

use crate::client::ClientTag;
use crate::config::{IndexKind, Limits, SectionOptions};
use crate::handle::Handle;
use crate::status::Status;
use std::fmt;

/// How much a report lists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReportDetail {
    /// Totals only.
    #[default]
    Summary,
    /// Totals plus every item, in handle order.
    Detail,
    /// Totals plus every item, oldest (next to be evicted) first.
    DetailLru,
}

/// One cached item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemReport {
    /// The item's handle.
    pub handle: Handle,
    /// The item's tag.
    pub tag: ClientTag,
    /// Bytes charged.
    pub size: usize,
    /// Current lock count.
    pub lock_count: u32,
    /// Name supplied by the client, if any.
    pub name: Option<String>,
}

/// One section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SectionReport {
    /// Section name.
    pub name: String,
    /// Counters at the time of the report.
    pub status: Status,
    /// Budget.
    pub limits: Limits,
    /// Option flags.
    pub options: SectionOptions,
    /// Lookup strategy.
    pub index: IndexKind,
    /// Bytes used by the lookup index itself.
    pub index_overhead: usize,
    /// Items, empty for summary reports.
    pub items: Vec<ItemReport>,
}

/// A cache report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Report {
    /// Detail level the report was built with.
    pub detail: ReportDetail,
    /// Cache-wide counters.
    pub status: Status,
    /// Cache-wide budget.
    pub limits: Limits,
    /// Per-section reports, in registration order.
    pub sections: Vec<SectionReport>,
}

impl Report {
    /// Find a section's report by name.
    pub fn section(&self, name: &str) -> Option<&SectionReport> {
        self.sections.iter().find(|s| s.name == name)
    }
}

struct Limit(usize);

impl fmt::Display for Limit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0 == usize::MAX {
            f.write_str("unlimited")
        } else {
            write!(f, "{}", self.0)
        }
    }
}

fn write_status(f: &mut fmt::Formatter<'_>, status: &Status, limits: &Limits) -> fmt::Result {
    write!(
        f,
        "{} items / {} bytes (locked {} items / {} bytes), max {} items / {} bytes",
        status.items,
        status.bytes,
        status.locked_items,
        status.locked_bytes,
        Limit(limits.max_items),
        Limit(limits.max_bytes),
    )
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("datacache: ")?;
        write_status(f, &self.status, &self.limits)?;
        writeln!(f)?;

        for section in &self.sections {
            write!(f, "  [{}] ", section.name)?;
            write_status(f, &section.status, &section.limits)?;
            if section.index == IndexKind::FastFind {
                write!(f, ", fast-find index {} bytes", section.index_overhead)?;
            }
            if section.options.contains(SectionOptions::NO_FORCE_FLUSH) {
                f.write_str(", no-force-flush")?;
            }
            writeln!(f)?;

            for item in &section.items {
                write!(
                    f,
                    "    {:>12} tag {:<20} {:>10} bytes  locks {}",
                    item.handle, item.tag, item.size, item.lock_count
                )?;
                if let Some(name) = &item.name {
                    write!(f, "  {name}")?;
                }
                writeln!(f)?;
            }
        }

        Ok(())
    }
}
