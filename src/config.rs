//! Pipeline configuration
//!
//! Source-priority ranking, source abbreviations, numeric bucket
//! boundaries and existence-check settings are explicit configuration
//! structures, passed into the consolidation engine and the statistics
//! aggregator at construction time. Defaults cover the three supported
//! catalogs; a JSON file can override any of it.

use crate::error::{PipelineError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

/// The catalogs this pipeline knows how to collect from.
pub const AVAILABLE_SOURCES: &[&str] = &[
    "nasa_exoplanet_archive",
    "exoplanet_eu",
    "open_exoplanet",
];

/// Deterministic conflict-resolution policy for the merge.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MergePolicy {
    /// Higher value outranks lower. Unknown sources rank 0.
    pub source_priorities: HashMap<String, u32>,
}

impl MergePolicy {
    pub fn priority(&self, source: &str) -> u32 {
        self.source_priorities.get(source).copied().unwrap_or(0)
    }

    /// Whether an incoming value beats the currently held one.
    ///
    /// Strictly higher priority always wins; on a true priority tie the
    /// most recently ingested value (the incoming one) wins.
    pub fn incoming_wins(&self, incoming_source: &str, current_source: &str) -> bool {
        self.priority(incoming_source) >= self.priority(current_source)
    }
}

impl Default for MergePolicy {
    fn default() -> Self {
        let mut source_priorities = HashMap::new();
        source_priorities.insert("nasa_exoplanet_archive".to_string(), 3);
        source_priorities.insert("exoplanet_eu".to_string(), 2);
        source_priorities.insert("open_exoplanet".to_string(), 1);
        Self { source_priorities }
    }
}

/// One half-open bucket `[lo, hi)`; an unset bound is open-ended.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bucket {
    pub label: String,
    pub lo: Option<f64>,
    pub hi: Option<f64>,
}

impl Bucket {
    pub fn new(label: &str, lo: Option<f64>, hi: Option<f64>) -> Self {
        Self {
            label: label.to_string(),
            lo,
            hi,
        }
    }

    pub fn contains(&self, value: f64) -> bool {
        self.lo.map_or(true, |lo| value >= lo) && self.hi.map_or(true, |hi| value < hi)
    }
}

/// Explicit bucket boundaries per numeric statistics dimension.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatisticsConfig {
    pub mass_buckets: Vec<Bucket>,
    pub radius_buckets: Vec<Bucket>,
    pub insolation_buckets: Vec<Bucket>,
    pub temperature_buckets: Vec<Bucket>,
    pub density_buckets: Vec<Bucket>,
    pub eccentricity_buckets: Vec<Bucket>,
}

impl Default for StatisticsConfig {
    fn default() -> Self {
        Self {
            // Earth masses
            mass_buckets: vec![
                Bucket::new("a. < 1", None, Some(1.0)),
                Bucket::new("b. 1 - 10", Some(1.0), Some(10.0)),
                Bucket::new("c. 10 - 100", Some(10.0), Some(100.0)),
                Bucket::new("d. 100 - 1000", Some(100.0), Some(1000.0)),
                Bucket::new("e. >= 1000", Some(1000.0), None),
            ],
            // Earth radii
            radius_buckets: vec![
                Bucket::new("a. < 1", None, Some(1.0)),
                Bucket::new("b. 1 - 2", Some(1.0), Some(2.0)),
                Bucket::new("c. 2 - 4", Some(2.0), Some(4.0)),
                Bucket::new("d. 4 - 10", Some(4.0), Some(10.0)),
                Bucket::new("e. >= 10", Some(10.0), None),
            ],
            // Earth flux
            insolation_buckets: vec![
                Bucket::new("a. < 0.25", None, Some(0.25)),
                Bucket::new("b. 0.25 - 1", Some(0.25), Some(1.0)),
                Bucket::new("c. 1 - 4", Some(1.0), Some(4.0)),
                Bucket::new("d. 4 - 100", Some(4.0), Some(100.0)),
                Bucket::new("e. >= 100", Some(100.0), None),
            ],
            // Kelvin
            temperature_buckets: vec![
                Bucket::new("a. < 200", None, Some(200.0)),
                Bucket::new("b. 200 - 400", Some(200.0), Some(400.0)),
                Bucket::new("c. 400 - 1000", Some(400.0), Some(1000.0)),
                Bucket::new("d. 1000 - 2000", Some(1000.0), Some(2000.0)),
                Bucket::new("e. >= 2000", Some(2000.0), None),
            ],
            // g/cm3
            density_buckets: vec![
                Bucket::new("a. gaseous (< 2)", None, Some(2.0)),
                Bucket::new("b. icy (2 - 4)", Some(2.0), Some(4.0)),
                Bucket::new("c. rocky (4 - 8)", Some(4.0), Some(8.0)),
                Bucket::new("d. dense (>= 8)", Some(8.0), None),
            ],
            eccentricity_buckets: vec![
                Bucket::new("a. circular (< 0.05)", None, Some(0.05)),
                Bucket::new("b. low (0.05 - 0.2)", Some(0.05), Some(0.2)),
                Bucket::new("c. moderate (0.2 - 0.5)", Some(0.2), Some(0.5)),
                Bucket::new("d. high (>= 0.5)", Some(0.5), None),
            ],
        }
    }
}

/// Settings for the external article-existence collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExistenceConfig {
    /// Wiki language subdomain, e.g. "en" or "fr".
    pub language: String,
    pub user_agent: String,
    /// Bounded worker pool size for concurrent lookups.
    pub concurrency: usize,
    /// Per-name lookup timeout in seconds.
    pub lookup_timeout_secs: u64,
}

impl Default for ExistenceConfig {
    fn default() -> Self {
        Self {
            language: "en".to_string(),
            user_agent: "exowiki/0.1 (catalog consolidation bot)".to_string(),
            concurrency: 8,
            lookup_timeout_secs: 10,
        }
    }
}

/// Top-level pipeline configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default)]
    pub merge: MergePolicy,
    #[serde(default)]
    pub statistics: StatisticsConfig,
    #[serde(default)]
    pub existence: ExistenceConfig,
    /// Short source tags used when stamping artifact filenames.
    #[serde(default = "default_abbreviations")]
    pub source_abbreviations: HashMap<String, String>,
}

fn default_abbreviations() -> HashMap<String, String> {
    let mut map = HashMap::new();
    map.insert("nasa_exoplanet_archive".to_string(), "nea".to_string());
    map.insert("exoplanet_eu".to_string(), "eu".to_string());
    map.insert("open_exoplanet".to_string(), "oec".to_string());
    map
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            merge: MergePolicy::default(),
            statistics: StatisticsConfig::default(),
            existence: ExistenceConfig::default(),
            source_abbreviations: default_abbreviations(),
        }
    }
}

impl PipelineConfig {
    /// Load configuration from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            PipelineError::RowValidation(format!("Failed to read {}: {}", path.display(), e))
        })?;
        let config: PipelineConfig = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Sorted, underscore-joined abbreviations of the given sources.
    ///
    /// Sources are sorted before mapping so artifact names are stable
    /// regardless of collection order; unknown sources keep their name.
    pub fn source_file_stem(&self, sources: &[String]) -> String {
        let mut sorted: Vec<&String> = sources.iter().collect();
        sorted.sort();
        sorted
            .iter()
            .map(|s| {
                self.source_abbreviations
                    .get(*s)
                    .cloned()
                    .unwrap_or_else(|| (*s).clone())
            })
            .collect::<Vec<_>>()
            .join("_")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_priority_ranking() {
        let policy = MergePolicy::default();
        assert!(policy.priority("nasa_exoplanet_archive") > policy.priority("exoplanet_eu"));
        assert_eq!(policy.priority("unknown_catalog"), 0);
        assert!(policy.incoming_wins("nasa_exoplanet_archive", "exoplanet_eu"));
        assert!(!policy.incoming_wins("exoplanet_eu", "nasa_exoplanet_archive"));
        // true priority tie: recency wins
        assert!(policy.incoming_wins("exoplanet_eu", "exoplanet_eu"));
    }

    #[test]
    fn test_bucket_half_open_ranges() {
        let bucket = Bucket::new("1 - 10", Some(1.0), Some(10.0));
        assert!(bucket.contains(1.0));
        assert!(bucket.contains(9.999));
        assert!(!bucket.contains(10.0));
        assert!(!bucket.contains(0.5));

        let open = Bucket::new(">= 1000", Some(1000.0), None);
        assert!(open.contains(1e9));
    }

    #[test]
    fn test_source_file_stem_sorted_and_abbreviated() {
        let config = PipelineConfig::default();
        let sources = vec![
            "open_exoplanet".to_string(),
            "nasa_exoplanet_archive".to_string(),
            "exoplanet_eu".to_string(),
        ];
        // sorted by full source name, then abbreviated
        assert_eq!(config.source_file_stem(&sources), "eu_nea_oec");
    }
}
