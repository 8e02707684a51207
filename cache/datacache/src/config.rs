//! Configuration for the cache and its sections.
//!
//! Everything here can be built in code or loaded from TOML:
//!
//! ```toml
//! max_bytes = "256MB"
//! initial_capacity = 4096
//!
//! [section.ModelMesh]
//! max_bytes = "64MB"
//! index = "fast-find"
//! no_force_flush = true
//!
//! [section.AnimBlock]
//! max_items = 512
//! duplicates = "replace"
//! ```

use bitflags::bitflags;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;

/// Byte and item budget for a section or for the whole cache.
///
/// Maximums bound what a section may hold before adding evicts from its LRU
/// end. Minimums protect a section from being shrunk by cross-section
/// eviction when the cache-wide budget is exceeded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct Limits {
    /// Maximum bytes (e.g. "64MB" or 67108864).
    #[serde(default = "unlimited", deserialize_with = "deserialize_size")]
    pub max_bytes: usize,
    /// Maximum number of items.
    #[serde(default = "unlimited")]
    pub max_items: usize,
    /// Bytes protected from cross-section eviction.
    #[serde(default, deserialize_with = "deserialize_size")]
    pub min_bytes: usize,
    /// Items protected from cross-section eviction.
    #[serde(default)]
    pub min_items: usize,
}

fn unlimited() -> usize {
    usize::MAX
}

impl Limits {
    /// No maximums, no minimums.
    pub const fn unlimited() -> Self {
        Self {
            max_bytes: usize::MAX,
            max_items: usize::MAX,
            min_bytes: 0,
            min_items: 0,
        }
    }

    /// Limit bytes only.
    pub const fn bytes(max_bytes: usize) -> Self {
        Self {
            max_bytes,
            ..Self::unlimited()
        }
    }

    /// Limit items only.
    pub const fn items(max_items: usize) -> Self {
        Self {
            max_items,
            ..Self::unlimited()
        }
    }

    /// Set the maximum bytes.
    pub fn with_max_bytes(mut self, bytes: usize) -> Self {
        self.max_bytes = bytes;
        self
    }

    /// Set the maximum items.
    pub fn with_max_items(mut self, items: usize) -> Self {
        self.max_items = items;
        self
    }

    /// Set the protected minimums.
    pub fn with_minimums(mut self, min_bytes: usize, min_items: usize) -> Self {
        self.min_bytes = min_bytes;
        self.min_items = min_items;
        self
    }

    /// Whether holding `bytes` and `items` stays within the maximums.
    #[inline]
    pub fn fits(&self, bytes: usize, items: usize) -> bool {
        bytes <= self.max_bytes && items <= self.max_items
    }
}

impl Default for Limits {
    fn default() -> Self {
        Self::unlimited()
    }
}

bitflags! {
    /// Per-section behavior switches.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct SectionOptions: u32 {
        /// A cache-wide flush skips this section. Only a flush of the
        /// section itself evicts its items. Meant for data whose loss
        /// mid-frame would be far more expensive than its memory.
        const NO_FORCE_FLUSH = 1 << 0;
    }
}

/// What `add` does when the tag is already cached in the section.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DuplicatePolicy {
    /// Fail with `CacheError::DuplicateTag`; callers `find` first.
    #[default]
    Reject,
    /// Remove the cached item (if it is unlocked) and add the new one.
    Replace,
}

/// How a section resolves `find`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum IndexKind {
    /// Linear scan over the section's items.
    #[default]
    Scan,
    /// Hash index from tag to handle.
    FastFind,
}

/// Settings fixed when a section is created.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SectionConfig {
    /// Byte and item budget.
    #[serde(flatten)]
    pub limits: Limits,
    /// Lookup strategy.
    #[serde(default)]
    pub index: IndexKind,
    /// Duplicate-add policy.
    #[serde(default)]
    pub duplicates: DuplicatePolicy,
    /// Exempt from cache-wide flushes.
    #[serde(default)]
    pub no_force_flush: bool,
}

impl SectionConfig {
    /// Default configuration: unlimited, scanned, duplicates rejected.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the budget.
    pub fn with_limits(mut self, limits: Limits) -> Self {
        self.limits = limits;
        self
    }

    /// Use a hash index for `find`.
    pub fn fast_find(mut self) -> Self {
        self.index = IndexKind::FastFind;
        self
    }

    /// Set the duplicate-add policy.
    pub fn with_duplicates(mut self, policy: DuplicatePolicy) -> Self {
        self.duplicates = policy;
        self
    }

    /// Set the option flags.
    pub fn with_options(mut self, options: SectionOptions) -> Self {
        self.no_force_flush = options.contains(SectionOptions::NO_FORCE_FLUSH);
        self
    }

    /// Option flags described by this configuration.
    pub fn options(&self) -> SectionOptions {
        let mut options = SectionOptions::empty();
        options.set(SectionOptions::NO_FORCE_FLUSH, self.no_force_flush);
        options
    }
}

/// Cache-wide configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CacheConfig {
    /// Cache-wide byte ceiling, enforced on top of section budgets.
    #[serde(default = "unlimited", deserialize_with = "deserialize_size")]
    pub max_bytes: usize,
    /// Cache-wide item ceiling.
    #[serde(default = "unlimited")]
    pub max_items: usize,
    /// Handle table slots to preallocate.
    #[serde(default = "default_initial_capacity")]
    pub initial_capacity: usize,
    /// Per-section configuration by section name.
    #[serde(default, rename = "section")]
    pub sections: BTreeMap<String, SectionConfig>,
}

fn default_initial_capacity() -> usize {
    1024
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_bytes: unlimited(),
            max_items: unlimited(),
            initial_capacity: default_initial_capacity(),
            sections: BTreeMap::new(),
        }
    }
}

impl CacheConfig {
    /// Load a configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content =
            std::fs::read_to_string(path.as_ref()).map_err(|e| ConfigError::Io(e.to_string()))?;
        Self::from_toml(&content)
    }

    /// Parse a configuration from TOML text.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Configuration for the named section, or the default if the file does
    /// not mention it.
    pub fn section(&self, name: &str) -> SectionConfig {
        self.sections.get(name).cloned().unwrap_or_default()
    }

    /// The cache-wide budget as [`Limits`].
    pub fn limits(&self) -> Limits {
        Limits {
            max_bytes: self.max_bytes,
            max_items: self.max_items,
            min_bytes: 0,
            min_items: 0,
        }
    }
}

/// Errors raised while loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("failed to read config: {0}")]
    Io(String),
    /// The file is not valid configuration.
    #[error("failed to parse config: {0}")]
    Parse(String),
}

fn deserialize_size<'de, D>(deserializer: D) -> Result<usize, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::de::Error;

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum SizeValue {
        Number(usize),
        String(String),
    }

    match SizeValue::deserialize(deserializer)? {
        SizeValue::Number(n) => Ok(n),
        SizeValue::String(s) => parse_size(&s).map_err(D::Error::custom),
    }
}

/// Parse a size string like "64MB", "4GB", "512KB" into bytes.
///
/// "unlimited" maps to `usize::MAX`.
pub fn parse_size(s: &str) -> Result<usize, String> {
    let s = s.trim();
    if s.is_empty() {
        return Err("empty size string".to_string());
    }
    if s.eq_ignore_ascii_case("unlimited") {
        return Ok(usize::MAX);
    }

    let (num_str, suffix) = match s.find(|c: char| c.is_alphabetic()) {
        Some(idx) => (&s[..idx], s[idx..].to_uppercase()),
        None => (s, String::new()),
    };

    let num: usize = num_str
        .trim()
        .parse()
        .map_err(|_| format!("invalid number: {}", num_str))?;

    let multiplier: usize = match suffix.as_str() {
        "" | "B" => 1,
        "K" | "KB" | "KIB" => 1024,
        "M" | "MB" | "MIB" => 1024 * 1024,
        "G" | "GB" | "GIB" => 1024 * 1024 * 1024,
        _ => return Err(format!("unknown size suffix: {}", suffix)),
    };

    num.checked_mul(multiplier)
        .ok_or_else(|| "size overflow".to_string())
}
