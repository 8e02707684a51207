//! Configuration for the frame-driven workload driver.

use datacache::{CacheConfig, ReportDetail, parse_size};
use serde::Deserialize;
use std::time::Duration;

/// Top-level configuration.
#[derive(Deserialize)]
pub struct Config {
    pub general: GeneralConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    pub workload: WorkloadConfig,
}

/// General driver settings.
#[derive(Deserialize)]
pub struct GeneralConfig {
    /// How long to run the measurement phase.
    #[serde(deserialize_with = "deserialize_duration")]
    pub duration: Duration,
    /// How long to run frames before recording metrics.
    #[serde(default, deserialize_with = "deserialize_duration")]
    pub warmup: Duration,
    /// Number of worker threads.
    pub threads: usize,
    /// Log level used when RUST_LOG is not set.
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Detail of the cache report printed at the end.
    #[serde(default)]
    pub report: ReportLevel,
}

/// Workload shape.
#[derive(Deserialize)]
pub struct WorkloadConfig {
    /// Base RNG seed; worker `n` uses `seed + n`.
    #[serde(default = "default_seed")]
    pub seed: u64,
    /// Tags requested per frame, spread across the sections.
    pub lookups_per_frame: usize,
    /// Sections to drive. Budgets come from `[cache.section.<name>]`.
    #[serde(rename = "section")]
    pub sections: Vec<SectionWorkload>,
}

/// One section's share of the workload.
#[derive(Deserialize)]
pub struct SectionWorkload {
    pub name: String,
    /// Number of distinct tags.
    pub keyspace: u64,
    /// Relative share of lookups.
    #[serde(default = "default_weight")]
    pub weight: u32,
    /// Smallest item created on a miss.
    #[serde(deserialize_with = "deserialize_size")]
    pub min_size: usize,
    /// Largest item created on a miss.
    #[serde(deserialize_with = "deserialize_size")]
    pub max_size: usize,
}

/// Report detail, as spelled in the config file.
#[derive(Deserialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum ReportLevel {
    None,
    #[default]
    Summary,
    Detail,
    DetailLru,
}

impl ReportLevel {
    pub fn detail(self) -> Option<ReportDetail> {
        match self {
            ReportLevel::None => None,
            ReportLevel::Summary => Some(ReportDetail::Summary),
            ReportLevel::Detail => Some(ReportDetail::Detail),
            ReportLevel::DetailLru => Some(ReportDetail::DetailLru),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_seed() -> u64 {
    42
}

fn default_weight() -> u32 {
    1
}

impl Config {
    pub fn load(path: &std::path::Path) -> Result<Self, Box<dyn std::error::Error>> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), String> {
        if self.general.threads == 0 {
            return Err("threads must be at least 1".to_string());
        }
        if self.workload.sections.is_empty() {
            return Err("workload needs at least one [[workload.section]]".to_string());
        }
        if self.workload.sections.iter().all(|s| s.weight == 0) {
            return Err("section weights must not all be zero".to_string());
        }
        for section in &self.workload.sections {
            if section.keyspace == 0 {
                return Err(format!("section '{}': keyspace must be nonzero", section.name));
            }
            if section.min_size > section.max_size {
                return Err(format!(
                    "section '{}': min_size {} exceeds max_size {}",
                    section.name, section.min_size, section.max_size,
                ));
            }
        }
        Ok(())
    }
}

/// Deserialize a duration from a human-readable string (e.g., "60s", "5m").
fn deserialize_duration<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    humantime::parse_duration(&s).map_err(serde::de::Error::custom)
}

fn deserialize_size<'de, D>(deserializer: D) -> Result<usize, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    parse_size(&s).map_err(serde::de::Error::custom)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
        [general]
        duration = "5s"
        threads = 2

        [cache]
        max_bytes = "8MB"

        [cache.section.ModelMesh]
        max_bytes = "4MB"
        index = "fast-find"

        [workload]
        lookups_per_frame = 16

        [[workload.section]]
        name = "ModelMesh"
        keyspace = 1000
        min_size = "1KB"
        max_size = "4KB"
    "#;

    #[test]
    fn test_parse_sample() {
        let config: Config = toml::from_str(SAMPLE).expect("parse");
        config.validate().expect("valid");

        assert_eq!(config.general.duration, Duration::from_secs(5));
        assert_eq!(config.general.warmup, Duration::ZERO);
        assert_eq!(config.general.log_level, "info");
        assert!(config.general.report == ReportLevel::Summary);
        assert_eq!(config.cache.max_bytes, 8 * 1024 * 1024);
        assert_eq!(
            config.cache.section("ModelMesh").index,
            datacache::IndexKind::FastFind
        );

        let mesh = &config.workload.sections[0];
        assert_eq!(mesh.weight, 1);
        assert_eq!(mesh.min_size, 1024);
        assert_eq!(mesh.max_size, 4096);
    }

    #[test]
    fn test_rejects_inverted_sizes() {
        let text = SAMPLE.replace("min_size = \"1KB\"", "min_size = \"8KB\"");
        let config: Config = toml::from_str(&text).expect("parse");
        assert!(config.validate().is_err());
    }
}
