//! Consolidation engine
//!
//! Ingests per-source batches of entity records, resolves identity by
//! canonical name, merges fields under the deterministic conflict policy
//! and owns the canonical collection. No field is silently dropped: every
//! overwrite is recorded in per-field provenance so the losing value stays
//! recoverable for audit.

use crate::config::MergePolicy;
use crate::entity::{canonical_key, Exoplanet, Star};
use crate::error::{PipelineError, Result};
use crate::ingest::{decode_exoplanet, decode_star};
use crate::measurement::{Measurement, Precision};
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt::Display;
use tracing::{debug, warn};

/// A value that lost a merge, kept for audit.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DiscardedValue {
    pub source: String,
    pub rendered: String,
}

/// Which source won a field, who else contributed, and what was discarded.
#[derive(Debug, Clone, Default, Serialize)]
pub struct FieldProvenance {
    pub winner: String,
    /// Extra sources that contributed items to a list-typed field.
    pub contributors: Vec<String>,
    pub discarded: Vec<DiscardedValue>,
}

/// Per-field provenance for one canonical entity.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Provenance {
    fields: BTreeMap<String, FieldProvenance>,
}

impl Provenance {
    pub fn winner(&self, field: &str) -> Option<&str> {
        self.fields.get(field).map(|p| p.winner.as_str())
    }

    pub fn set_winner(&mut self, field: &str, source: &str) {
        self.fields
            .entry(field.to_string())
            .or_default()
            .winner = source.to_string();
    }

    pub fn add_contributor(&mut self, field: &str, source: &str) {
        let entry = self.fields.entry(field.to_string()).or_default();
        if entry.winner != source && !entry.contributors.iter().any(|s| s == source) {
            entry.contributors.push(source.to_string());
        }
    }

    /// Record a losing value. Deduplicated so replaying a batch does not
    /// grow the audit trail.
    pub fn record_discard(&mut self, field: &str, source: &str, rendered: String) {
        let entry = self.fields.entry(field.to_string()).or_default();
        let discarded = DiscardedValue {
            source: source.to_string(),
            rendered,
        };
        if !entry.discarded.contains(&discarded) {
            entry.discarded.push(discarded);
        }
    }

    pub fn field(&self, field: &str) -> Option<&FieldProvenance> {
        self.fields.get(field)
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &FieldProvenance)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }
}

/// One canonical entity plus the provenance of every merged field.
#[derive(Debug, Clone, Serialize)]
pub struct CanonicalRecord<E> {
    pub entity: E,
    pub provenance: Provenance,
}

/// Counts for one ingested batch.
#[derive(Debug, Clone, Serialize)]
pub struct IngestReport {
    pub source: String,
    pub accepted: usize,
    pub rejected: usize,
}

/// Counts for one merge pass.
#[derive(Debug, Clone, Default, Serialize)]
pub struct MergeReport {
    pub inserted: usize,
    pub merged: usize,
    pub planets_total: usize,
    pub stars_total: usize,
}

struct Staged<E> {
    source: String,
    entity: E,
}

/// Owns the canonical collection and applies the field merge policy.
pub struct ConsolidationEngine {
    policy: MergePolicy,
    planets: BTreeMap<String, CanonicalRecord<Exoplanet>>,
    stars: BTreeMap<String, CanonicalRecord<Star>>,
    staged_planets: Vec<Staged<Exoplanet>>,
    staged_stars: Vec<Staged<Star>>,
}

impl ConsolidationEngine {
    pub fn new(policy: MergePolicy) -> Self {
        Self {
            policy,
            planets: BTreeMap::new(),
            stars: BTreeMap::new(),
            staged_planets: Vec::new(),
            staged_stars: Vec::new(),
        }
    }

    /// Decode and stage planet rows from one source.
    ///
    /// A malformed row is skipped, counted and logged; it never aborts the
    /// batch.
    pub fn ingest_exoplanets(&mut self, source: &str, rows: &[Value]) -> IngestReport {
        let mut report = IngestReport {
            source: source.to_string(),
            accepted: 0,
            rejected: 0,
        };
        for row in rows {
            match decode_exoplanet(source, row) {
                Ok(planet) => {
                    self.staged_planets.push(Staged {
                        source: source.to_string(),
                        entity: planet,
                    });
                    report.accepted += 1;
                }
                Err(e) => {
                    report.rejected += 1;
                    warn!("Skipping malformed planet row from {}: {}", source, e);
                }
            }
        }
        report
    }

    /// Decode and stage star rows from one source.
    pub fn ingest_stars(&mut self, source: &str, rows: &[Value]) -> IngestReport {
        let mut report = IngestReport {
            source: source.to_string(),
            accepted: 0,
            rejected: 0,
        };
        for row in rows {
            match decode_star(source, row) {
                Ok(star) => {
                    self.staged_stars.push(Staged {
                        source: source.to_string(),
                        entity: star,
                    });
                    report.accepted += 1;
                }
                Err(e) => {
                    report.rejected += 1;
                    warn!("Skipping malformed star row from {}: {}", source, e);
                }
            }
        }
        report
    }

    /// Merge every staged entity into the canonical collection.
    ///
    /// Idempotent: replaying an identical batch from the same source leaves
    /// the collection unchanged. Verifies the merge invariants afterwards
    /// and fails the run on violation.
    pub fn merge_into_canonical(&mut self) -> Result<MergeReport> {
        let mut report = MergeReport::default();

        for staged in std::mem::take(&mut self.staged_planets) {
            let key = canonical_key(staged.entity.canonical_name());
            match self.planets.get_mut(&key) {
                None => {
                    let record = insert_record(staged.entity, &staged.source, Exoplanet::present_fields);
                    self.planets.insert(key, record);
                    report.inserted += 1;
                }
                Some(record) => {
                    merge_exoplanet(record, staged.entity, &staged.source, &self.policy);
                    report.merged += 1;
                }
            }
        }

        for staged in std::mem::take(&mut self.staged_stars) {
            let key = canonical_key(staged.entity.canonical_name());
            match self.stars.get_mut(&key) {
                None => {
                    let record = insert_record(staged.entity, &staged.source, Star::present_fields);
                    self.stars.insert(key, record);
                    report.inserted += 1;
                }
                Some(record) => {
                    merge_star(record, staged.entity, &staged.source, &self.policy);
                    report.merged += 1;
                }
            }
        }

        report.planets_total = self.planets.len();
        report.stars_total = self.stars.len();
        self.verify_invariants()?;
        debug!(
            "Merge pass: {} inserted, {} merged, {} planets / {} stars canonical",
            report.inserted, report.merged, report.planets_total, report.stars_total
        );
        Ok(report)
    }

    /// Check the structural merge invariants.
    ///
    /// A violation indicates a logic defect, not bad input, so it is fatal
    /// for the run.
    pub fn verify_invariants(&self) -> Result<()> {
        for (key, record) in &self.planets {
            if canonical_key(record.entity.canonical_name()) != *key {
                return Err(PipelineError::MergeInvariant(format!(
                    "planet '{}' stored under mismatched key '{}'",
                    record.entity.pl_name, key
                )));
            }
            for field in record.entity.present_fields() {
                if record.provenance.winner(field).is_none() {
                    return Err(PipelineError::MergeInvariant(format!(
                        "planet '{}' field '{}' has no provenance",
                        record.entity.pl_name, field
                    )));
                }
            }
        }
        for (key, record) in &self.stars {
            if canonical_key(record.entity.canonical_name()) != *key {
                return Err(PipelineError::MergeInvariant(format!(
                    "star '{}' stored under mismatched key '{}'",
                    record.entity.st_name, key
                )));
            }
            for field in record.entity.present_fields() {
                if record.provenance.winner(field).is_none() {
                    return Err(PipelineError::MergeInvariant(format!(
                        "star '{}' field '{}' has no provenance",
                        record.entity.st_name, field
                    )));
                }
            }
        }
        Ok(())
    }

    /// Canonical planet records in canonical-name order.
    pub fn planets(&self) -> impl Iterator<Item = &CanonicalRecord<Exoplanet>> {
        self.planets.values()
    }

    /// Canonical star records in canonical-name order.
    pub fn stars(&self) -> impl Iterator<Item = &CanonicalRecord<Star>> {
        self.stars.values()
    }

    pub fn planet(&self, name: &str) -> Option<&CanonicalRecord<Exoplanet>> {
        self.planets.get(&canonical_key(name))
    }

    pub fn star(&self, name: &str) -> Option<&CanonicalRecord<Star>> {
        self.stars.get(&canonical_key(name))
    }

    pub fn planet_count(&self) -> usize {
        self.planets.len()
    }

    pub fn star_count(&self) -> usize {
        self.stars.len()
    }

    /// Index of canonical planets grouped by host-star key.
    pub fn planets_by_host(&self) -> BTreeMap<String, Vec<&Exoplanet>> {
        let mut index: BTreeMap<String, Vec<&Exoplanet>> = BTreeMap::new();
        for record in self.planets.values() {
            if let Some(host) = &record.entity.st_name {
                index
                    .entry(canonical_key(host))
                    .or_default()
                    .push(&record.entity);
            }
        }
        index
    }

    /// Fill a star's missing discovery year from the earliest of its
    /// catalogued planets.
    pub fn derive_star_discovery_years(&mut self) {
        let earliest: BTreeMap<String, i32> = {
            let mut map: BTreeMap<String, i32> = BTreeMap::new();
            for record in self.planets.values() {
                if let (Some(host), Some(year)) =
                    (&record.entity.st_name, record.entity.disc_year)
                {
                    let key = canonical_key(host);
                    map.entry(key)
                        .and_modify(|y| *y = (*y).min(year))
                        .or_insert(year);
                }
            }
            map
        };

        for (key, record) in self.stars.iter_mut() {
            if record.entity.disc_year.is_none() {
                if let Some(year) = earliest.get(key) {
                    record.entity.disc_year = Some(*year);
                    record.provenance.set_winner("disc_year", "derived");
                }
            }
        }
    }
}

/// Build a fresh canonical record with full provenance for every present
/// field.
fn insert_record<E>(
    entity: E,
    source: &str,
    present_fields: impl Fn(&E) -> Vec<&'static str>,
) -> CanonicalRecord<E> {
    let mut provenance = Provenance::default();
    for field in present_fields(&entity) {
        provenance.set_winner(field, source);
    }
    CanonicalRecord { entity, provenance }
}

/// Rule 1 and 2 of the field merge policy for scalar fields.
fn merge_scalar<T: PartialEq + Display>(
    field: &str,
    current: &mut Option<T>,
    incoming: Option<T>,
    incoming_source: &str,
    provenance: &mut Provenance,
    policy: &MergePolicy,
) {
    match (current.as_ref(), incoming) {
        (_, None) => {}
        (None, Some(value)) => {
            *current = Some(value);
            provenance.set_winner(field, incoming_source);
        }
        (Some(held), Some(value)) => {
            if *held == value {
                return;
            }
            let held_source = provenance.winner(field).unwrap_or("").to_string();
            if policy.incoming_wins(incoming_source, &held_source) {
                provenance.record_discard(field, &held_source, held.to_string());
                *current = Some(value);
                provenance.set_winner(field, incoming_source);
            } else {
                provenance.record_discard(field, incoming_source, value.to_string());
            }
        }
    }
}

/// Identity-field variant of rule 2: the canonical name is always present
/// on both sides, only its display form can differ.
fn merge_name(
    field: &str,
    current: &mut String,
    incoming: String,
    incoming_source: &str,
    provenance: &mut Provenance,
    policy: &MergePolicy,
) {
    if *current == incoming {
        return;
    }
    let held_source = provenance.winner(field).unwrap_or("").to_string();
    if policy.incoming_wins(incoming_source, &held_source) {
        provenance.record_discard(field, &held_source, current.clone());
        *current = incoming;
        provenance.set_winner(field, incoming_source);
    } else {
        provenance.record_discard(field, incoming_source, incoming);
    }
}

/// Rule 3: precision decides between two measurements, falling back to the
/// priority ranking on a precision tie.
fn merge_measurement(
    field: &str,
    current: &mut Option<Measurement>,
    incoming: Option<Measurement>,
    incoming_source: &str,
    provenance: &mut Provenance,
    policy: &MergePolicy,
) {
    match (current.as_ref(), incoming) {
        (_, None) => {}
        (None, Some(value)) => {
            *current = Some(value);
            provenance.set_winner(field, incoming_source);
        }
        (Some(held), Some(value)) => {
            if held.same_record(&value) {
                return;
            }
            let held_source = provenance.winner(field).unwrap_or("").to_string();
            let take = match value.compare_precision(held) {
                Precision::MorePrecise => true,
                Precision::LessPrecise => false,
                Precision::Tie => policy.incoming_wins(incoming_source, &held_source),
            };
            if take {
                provenance.record_discard(field, &held_source, held.to_string());
                *current = Some(value);
                provenance.set_winner(field, incoming_source);
            } else {
                provenance.record_discard(field, incoming_source, value.to_string());
            }
        }
    }
}

/// Rule 4: list fields union rather than overwrite, preserving first-seen
/// order.
fn merge_list(
    field: &str,
    current: &mut Vec<String>,
    incoming: Vec<String>,
    incoming_source: &str,
    provenance: &mut Provenance,
) {
    if incoming.is_empty() {
        return;
    }
    if current.is_empty() {
        provenance.set_winner(field, incoming_source);
    } else {
        provenance.add_contributor(field, incoming_source);
    }
    for item in incoming {
        if !current.contains(&item) {
            current.push(item);
        }
    }
}

fn merge_exoplanet(
    record: &mut CanonicalRecord<Exoplanet>,
    incoming: Exoplanet,
    source: &str,
    policy: &MergePolicy,
) {
    let held = &mut record.entity;
    let prov = &mut record.provenance;

    merge_name("pl_name", &mut held.pl_name, incoming.pl_name, source, prov, policy);
    merge_scalar("st_name", &mut held.st_name, incoming.st_name, source, prov, policy);
    merge_list("alt_names", &mut held.alt_names, incoming.alt_names, source, prov);
    merge_scalar("disc_method", &mut held.disc_method, incoming.disc_method, source, prov, policy);
    merge_scalar("disc_year", &mut held.disc_year, incoming.disc_year, source, prov, policy);
    merge_scalar("disc_facility", &mut held.disc_facility, incoming.disc_facility, source, prov, policy);
    merge_measurement("pl_masse", &mut held.pl_masse, incoming.pl_masse, source, prov, policy);
    merge_measurement("pl_rade", &mut held.pl_rade, incoming.pl_rade, source, prov, policy);
    merge_measurement("pl_orbper", &mut held.pl_orbper, incoming.pl_orbper, source, prov, policy);
    merge_measurement("pl_orbsmax", &mut held.pl_orbsmax, incoming.pl_orbsmax, source, prov, policy);
    merge_measurement("pl_orbeccen", &mut held.pl_orbeccen, incoming.pl_orbeccen, source, prov, policy);
    merge_measurement("pl_eqt", &mut held.pl_eqt, incoming.pl_eqt, source, prov, policy);
    merge_measurement("pl_dens", &mut held.pl_dens, incoming.pl_dens, source, prov, policy);
    merge_measurement("pl_insol", &mut held.pl_insol, incoming.pl_insol, source, prov, policy);
}

fn merge_star(
    record: &mut CanonicalRecord<Star>,
    incoming: Star,
    source: &str,
    policy: &MergePolicy,
) {
    let held = &mut record.entity;
    let prov = &mut record.provenance;

    merge_name("st_name", &mut held.st_name, incoming.st_name, source, prov, policy);
    merge_list("alt_names", &mut held.alt_names, incoming.alt_names, source, prov);
    merge_scalar("st_spectype", &mut held.st_spectype, incoming.st_spectype, source, prov, policy);
    merge_measurement("sy_dist", &mut held.sy_dist, incoming.sy_dist, source, prov, policy);
    merge_measurement("st_mass", &mut held.st_mass, incoming.st_mass, source, prov, policy);
    merge_measurement("st_rad", &mut held.st_rad, incoming.st_rad, source, prov, policy);
    merge_measurement("st_teff", &mut held.st_teff, incoming.st_teff, source, prov, policy);
    merge_measurement("st_met", &mut held.st_met, incoming.st_met, source, prov, policy);
    merge_measurement("st_age", &mut held.st_age, incoming.st_age, source, prov, policy);
    merge_scalar("disc_year", &mut held.disc_year, incoming.disc_year, source, prov, policy);
    merge_scalar("sy_pnum", &mut held.sy_pnum, incoming.sy_pnum, source, prov, policy);
}
