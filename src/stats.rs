//! Statistics aggregator
//!
//! Buckets the canonical collection into categorical and numeric
//! histograms. An entity missing a field is excluded from that dimension's
//! total, and every dimension's bucket counts must sum back to that total;
//! the sum check is enforced, not assumed.

use crate::config::{Bucket, StatisticsConfig};
use crate::entity::{Exoplanet, Star};
use crate::error::{PipelineError, Result};
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::info;

/// Histograms over the canonical exoplanet collection.
#[derive(Debug, Clone, Serialize)]
pub struct ExoplanetStatistics {
    pub total: usize,
    pub discovery_methods: BTreeMap<String, usize>,
    pub discovery_years: BTreeMap<String, usize>,
    pub mass_ranges: BTreeMap<String, usize>,
    pub radius_ranges: BTreeMap<String, usize>,
    pub insolation_ranges: BTreeMap<String, usize>,
    pub temperature_ranges: BTreeMap<String, usize>,
    pub density_categories: BTreeMap<String, usize>,
    pub eccentricity_ranges: BTreeMap<String, usize>,
}

/// Histograms over the canonical star collection.
#[derive(Debug, Clone, Serialize)]
pub struct StarStatistics {
    pub total: usize,
    pub spectral_types: BTreeMap<String, usize>,
    pub discovery_years: BTreeMap<String, usize>,
}

/// Full statistics artifact for one run.
#[derive(Debug, Clone, Serialize)]
pub struct RunStatistics {
    pub exoplanet: ExoplanetStatistics,
    pub star: StarStatistics,
}

/// Bucket the values of one numeric dimension.
///
/// Returns the histogram after checking that every sampled value landed in
/// exactly one bucket; a gap or overlap in the configured boundaries is a
/// statistics-invariant violation.
fn bucket_dimension(
    dimension: &str,
    values: impl Iterator<Item = f64>,
    buckets: &[Bucket],
) -> Result<BTreeMap<String, usize>> {
    let mut counts: BTreeMap<String, usize> = BTreeMap::new();
    let mut sampled = 0usize;

    for value in values {
        sampled += 1;
        let matching: Vec<&Bucket> = buckets.iter().filter(|b| b.contains(value)).collect();
        match matching.as_slice() {
            [bucket] => {
                *counts.entry(bucket.label.clone()).or_insert(0) += 1;
            }
            [] => {
                return Err(PipelineError::StatsInvariant(format!(
                    "value {} of dimension '{}' falls in no configured bucket",
                    value, dimension
                )));
            }
            _ => {
                return Err(PipelineError::StatsInvariant(format!(
                    "value {} of dimension '{}' falls in {} overlapping buckets",
                    value, dimension, matching.len()
                )));
            }
        }
    }

    let bucketed: usize = counts.values().sum();
    if bucketed != sampled {
        return Err(PipelineError::StatsInvariant(format!(
            "dimension '{}': bucket counts sum to {} but {} entities carry the field",
            dimension, bucketed, sampled
        )));
    }
    Ok(counts)
}

fn count_categories(values: impl Iterator<Item = String>) -> BTreeMap<String, usize> {
    let mut counts: BTreeMap<String, usize> = BTreeMap::new();
    for value in values {
        *counts.entry(value).or_insert(0) += 1;
    }
    counts
}

/// Generate the exoplanet histograms under the configured boundaries.
pub fn generate_exoplanet_statistics(
    planets: &[&Exoplanet],
    config: &StatisticsConfig,
) -> Result<ExoplanetStatistics> {
    let discovery_methods = count_categories(
        planets
            .iter()
            .filter_map(|p| p.disc_method.clone()),
    );
    let discovery_years = count_categories(
        planets
            .iter()
            .filter_map(|p| p.disc_year.map(|y| y.to_string())),
    );

    Ok(ExoplanetStatistics {
        total: planets.len(),
        discovery_methods,
        discovery_years,
        mass_ranges: bucket_dimension(
            "mass",
            planets.iter().filter_map(|p| p.pl_masse.as_ref().map(|m| m.value)),
            &config.mass_buckets,
        )?,
        radius_ranges: bucket_dimension(
            "radius",
            planets.iter().filter_map(|p| p.pl_rade.as_ref().map(|m| m.value)),
            &config.radius_buckets,
        )?,
        insolation_ranges: bucket_dimension(
            "insolation",
            planets.iter().filter_map(|p| p.pl_insol.as_ref().map(|m| m.value)),
            &config.insolation_buckets,
        )?,
        temperature_ranges: bucket_dimension(
            "equilibrium temperature",
            planets.iter().filter_map(|p| p.pl_eqt.as_ref().map(|m| m.value)),
            &config.temperature_buckets,
        )?,
        density_categories: bucket_dimension(
            "density",
            planets.iter().filter_map(|p| p.pl_dens.as_ref().map(|m| m.value)),
            &config.density_buckets,
        )?,
        eccentricity_ranges: bucket_dimension(
            "eccentricity",
            planets.iter().filter_map(|p| p.pl_orbeccen.as_ref().map(|m| m.value)),
            &config.eccentricity_buckets,
        )?,
    })
}

/// Generate the star histograms.
///
/// Spectral types are counted by their leading class letter (an "M2.5 V"
/// star counts under "M").
pub fn generate_star_statistics(stars: &[&Star]) -> Result<StarStatistics> {
    let spectral_types = count_categories(stars.iter().filter_map(|s| {
        s.st_spectype
            .as_ref()
            .and_then(|t| t.trim().chars().next())
            .map(|c| c.to_ascii_uppercase().to_string())
    }));
    let discovery_years = count_categories(
        stars
            .iter()
            .filter_map(|s| s.disc_year.map(|y| y.to_string())),
    );

    Ok(StarStatistics {
        total: stars.len(),
        spectral_types,
        discovery_years,
    })
}

/// Log one statistics category with percentages computed at display time.
fn log_category(title: &str, counts: &BTreeMap<String, usize>, total: usize) {
    info!("  {}:", title);
    for (label, count) in counts {
        let percentage = if total > 0 {
            *count as f64 / total as f64 * 100.0
        } else {
            0.0
        };
        info!("    - {}: {} ({:.1}%)", label, count, percentage);
    }
}

/// Log the full run statistics.
pub fn log_statistics(stats: &RunStatistics) {
    info!("Exoplanet statistics:");
    info!("  Total: {}", stats.exoplanet.total);
    log_category("By discovery method", &stats.exoplanet.discovery_methods, stats.exoplanet.total);
    log_category("By discovery year", &stats.exoplanet.discovery_years, stats.exoplanet.total);
    log_category("By mass range (Earth masses)", &stats.exoplanet.mass_ranges, stats.exoplanet.total);
    log_category("By radius range (Earth radii)", &stats.exoplanet.radius_ranges, stats.exoplanet.total);
    log_category("By insolation range (Earth flux)", &stats.exoplanet.insolation_ranges, stats.exoplanet.total);
    log_category("By temperature range (K)", &stats.exoplanet.temperature_ranges, stats.exoplanet.total);
    log_category("By density category", &stats.exoplanet.density_categories, stats.exoplanet.total);
    log_category("By eccentricity range", &stats.exoplanet.eccentricity_ranges, stats.exoplanet.total);

    info!("Star statistics:");
    info!("  Total: {}", stats.star.total);
    log_category("By spectral type", &stats.star.spectral_types, stats.star.total);
    log_category("By discovery year", &stats.star.discovery_years, stats.star.total);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::measurement::Measurement;

    fn planet(name: &str, mass: Option<f64>, method: Option<&str>) -> Exoplanet {
        Exoplanet {
            pl_name: name.to_string(),
            disc_method: method.map(str::to_string),
            pl_masse: mass.map(|v| Measurement::exact(v, "nea").unwrap()),
            ..Default::default()
        }
    }

    #[test]
    fn test_missing_field_excluded_from_dimension_total() {
        let a = planet("A b", Some(0.5), Some("Transit"));
        let b = planet("B b", Some(50.0), Some("Transit"));
        let c = planet("C b", None, Some("Imaging"));
        let planets = vec![&a, &b, &c];

        let stats =
            generate_exoplanet_statistics(&planets, &StatisticsConfig::default()).unwrap();
        assert_eq!(stats.total, 3);
        // only two planets carry a mass
        let mass_total: usize = stats.mass_ranges.values().sum();
        assert_eq!(mass_total, 2);
        assert_eq!(stats.mass_ranges.get("a. < 1"), Some(&1));
        assert_eq!(stats.mass_ranges.get("c. 10 - 100"), Some(&1));
    }

    #[test]
    fn test_bucket_sums_equal_field_totals() {
        let a = planet("A b", Some(1.0), None);
        let b = planet("B b", Some(10.0), None);
        let c = planet("C b", Some(1000.0), None);
        let planets = vec![&a, &b, &c];

        let stats =
            generate_exoplanet_statistics(&planets, &StatisticsConfig::default()).unwrap();
        // all three carry a mass, none carries a radius or eccentricity
        assert_eq!(stats.mass_ranges.values().sum::<usize>(), 3);
        assert_eq!(stats.radius_ranges.values().sum::<usize>(), 0);
        assert_eq!(stats.eccentricity_ranges.values().sum::<usize>(), 0);
    }

    #[test]
    fn test_bucket_gap_is_invariant_violation() {
        let gapped = StatisticsConfig {
            mass_buckets: vec![crate::config::Bucket::new("< 1", None, Some(1.0))],
            ..StatisticsConfig::default()
        };
        let a = planet("A b", Some(5.0), None);
        let planets = vec![&a];
        let err = generate_exoplanet_statistics(&planets, &gapped).unwrap_err();
        assert!(matches!(err, PipelineError::StatsInvariant(_)));
    }

    #[test]
    fn test_spectral_class_leading_letter() {
        let star = Star {
            st_name: "K2-18".to_string(),
            st_spectype: Some("M2.5 V".to_string()),
            ..Default::default()
        };
        let dwarf = Star {
            st_name: "TRAPPIST-1".to_string(),
            st_spectype: Some("m8".to_string()),
            ..Default::default()
        };
        let stars = vec![&star, &dwarf];
        let stats = generate_star_statistics(&stars).unwrap();
        assert_eq!(stats.spectral_types.get("M"), Some(&2));
    }
}
