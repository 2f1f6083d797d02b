//! Export and report writers
//!
//! Serializes the canonical collection and the run statistics to flat
//! files. Exports are deterministic: rows sorted by canonical name,
//! columns in schema order, so repeated exports of an unchanged collection
//! are byte-identical.
//!
//! Measurement and list fields use a fixed, versioned tagged encoding
//! (`m1|...`, `l1|...`) parsed back by a dedicated decoder; no free-form
//! evaluation of exported values anywhere.

use crate::consolidate::CanonicalRecord;
use crate::entity::{Exoplanet, Star};
use crate::error::{PipelineError, Result};
use crate::measurement::Measurement;
use crate::stats::RunStatistics;
use itertools::Itertools;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::info;

const MEASUREMENT_TAG: &str = "m1";
const LIST_TAG: &str = "l1";

/// A decoded exported field value.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Empty,
    Text(String),
    List(Vec<String>),
    Measurement(Measurement),
}

fn escape_segment(s: &str) -> String {
    s.replace('\\', "\\\\").replace('|', "\\|")
}

/// Split a tagged value on unescaped `|` separators.
fn split_segments(s: &str) -> Vec<String> {
    let mut segments = Vec::new();
    let mut current = String::new();
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => {
                if let Some(next) = chars.next() {
                    current.push(next);
                }
            }
            '|' => {
                segments.push(std::mem::take(&mut current));
            }
            _ => current.push(c),
        }
    }
    segments.push(current);
    segments
}

/// Encode a measurement as `m1|value|upper|lower|source`.
///
/// A missing bound is an empty segment.
pub fn encode_measurement(m: &Measurement) -> String {
    format!(
        "{}|{}|{}|{}|{}",
        MEASUREMENT_TAG,
        m.value,
        m.upper_error.map(|v| v.to_string()).unwrap_or_default(),
        m.lower_error.map(|v| v.to_string()).unwrap_or_default(),
        escape_segment(&m.source)
    )
}

/// Encode a list as `l1|item|item|...`; the empty list encodes as an empty
/// cell.
pub fn encode_list(items: &[String]) -> String {
    if items.is_empty() {
        return String::new();
    }
    let body = items.iter().map(|i| escape_segment(i)).join("|");
    format!("{}|{}", LIST_TAG, body)
}

/// Decode one exported cell back into a typed field value.
///
/// Only multi-segment cells can carry a tag; anything else is text, with
/// its escapes undone.
pub fn decode_field(cell: &str) -> Result<FieldValue> {
    if cell.is_empty() {
        return Ok(FieldValue::Empty);
    }
    let segments = split_segments(cell);
    match segments[0].as_str() {
        MEASUREMENT_TAG if segments.len() > 1 => {
            if segments.len() != 5 {
                return Err(PipelineError::RowValidation(format!(
                    "malformed measurement encoding '{}': expected 5 segments, got {}",
                    cell,
                    segments.len()
                )));
            }
            let value: f64 = segments[1].parse().map_err(|_| {
                PipelineError::RowValidation(format!(
                    "malformed measurement value in '{}'",
                    cell
                ))
            })?;
            let upper = parse_optional_bound(&segments[2], cell)?;
            let lower = parse_optional_bound(&segments[3], cell)?;
            let m = Measurement::new(value, upper, lower, segments[4].clone())?;
            Ok(FieldValue::Measurement(m))
        }
        LIST_TAG if segments.len() > 1 => Ok(FieldValue::List(segments[1..].to_vec())),
        _ => Ok(FieldValue::Text(segments.join("|"))),
    }
}

fn parse_optional_bound(segment: &str, cell: &str) -> Result<Option<f64>> {
    if segment.is_empty() {
        return Ok(None);
    }
    segment.parse::<f64>().map(Some).map_err(|_| {
        PipelineError::RowValidation(format!("malformed error bound in '{}'", cell))
    })
}

fn measurement_cell(m: &Option<Measurement>) -> String {
    m.as_ref().map(encode_measurement).unwrap_or_default()
}

/// Escaped so a text value starting with a tag prefix stays text on
/// re-read.
fn text_cell(s: &str) -> String {
    escape_segment(s)
}

fn scalar_cell<T: ToString>(v: &Option<T>) -> String {
    v.as_ref()
        .map(|x| text_cell(&x.to_string()))
        .unwrap_or_default()
}

fn exoplanet_row(planet: &Exoplanet) -> Vec<String> {
    vec![
        text_cell(&planet.pl_name),
        scalar_cell(&planet.st_name),
        encode_list(&planet.alt_names),
        scalar_cell(&planet.disc_method),
        scalar_cell(&planet.disc_year),
        scalar_cell(&planet.disc_facility),
        measurement_cell(&planet.pl_masse),
        measurement_cell(&planet.pl_rade),
        measurement_cell(&planet.pl_orbper),
        measurement_cell(&planet.pl_orbsmax),
        measurement_cell(&planet.pl_orbeccen),
        measurement_cell(&planet.pl_eqt),
        measurement_cell(&planet.pl_dens),
        measurement_cell(&planet.pl_insol),
    ]
}

fn star_row(star: &Star) -> Vec<String> {
    vec![
        text_cell(&star.st_name),
        encode_list(&star.alt_names),
        scalar_cell(&star.st_spectype),
        measurement_cell(&star.sy_dist),
        measurement_cell(&star.st_mass),
        measurement_cell(&star.st_rad),
        measurement_cell(&star.st_teff),
        measurement_cell(&star.st_met),
        measurement_cell(&star.st_age),
        scalar_cell(&star.disc_year),
        scalar_cell(&star.sy_pnum),
    ]
}

/// Export canonical planets as CSV, one row per entity.
pub fn export_exoplanets_csv<'a>(
    records: impl Iterator<Item = &'a CanonicalRecord<Exoplanet>>,
    path: &Path,
) -> Result<usize> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut writer = csv::WriterBuilder::new().from_path(path)?;
    writer.write_record(Exoplanet::FIELDS)?;
    let mut rows = 0usize;
    for record in records {
        writer.write_record(exoplanet_row(&record.entity))?;
        rows += 1;
    }
    writer.flush()?;
    info!("Exported {} planets to {}", rows, path.display());
    Ok(rows)
}

/// Export canonical stars as CSV, one row per entity.
pub fn export_stars_csv<'a>(
    records: impl Iterator<Item = &'a CanonicalRecord<Star>>,
    path: &Path,
) -> Result<usize> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut writer = csv::WriterBuilder::new().from_path(path)?;
    writer.write_record(Star::FIELDS)?;
    let mut rows = 0usize;
    for record in records {
        writer.write_record(star_row(&record.entity))?;
        rows += 1;
    }
    writer.flush()?;
    info!("Exported {} stars to {}", rows, path.display());
    Ok(rows)
}

/// Export the run statistics as key-sorted pretty JSON. Counts only;
/// percentages are computed by readers, never persisted.
pub fn export_statistics_json(stats: &RunStatistics, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(stats)?;
    std::fs::write(path, json)?;
    info!("Statistics written to {}", path.display());
    Ok(())
}

/// Replace filesystem-hostile characters in a canonical name.
pub fn sanitize_file_name(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect()
}

/// Persist drafts as one `<canonical name>.wiki` file per entity under
/// `<dir>/<status>/<kind>/`.
pub fn persist_drafts(
    drafts: &BTreeMap<String, String>,
    dir: &Path,
    status: &str,
    kind: &str,
) -> Result<usize> {
    let target = dir.join(status).join(kind);
    std::fs::create_dir_all(&target)?;
    for (name, draft) in drafts {
        let file = target.join(format!("{}.wiki", sanitize_file_name(name)));
        std::fs::write(file, draft)?;
    }
    info!(
        "Persisted {} {} drafts under {}",
        drafts.len(),
        kind,
        target.display()
    );
    Ok(drafts.len())
}
