//! Source collectors
//!
//! A collector fetches one catalog's raw rows: a list of planet rows and
//! optionally a list of star rows. Collectors sit outside the core: a
//! failing collector costs one source, never the run.

use anyhow::{Context, Result};
use async_trait::async_trait;
use csv::ReaderBuilder;
use serde_json::{Map, Value};
use std::path::PathBuf;

/// A per-source batch collector.
///
/// Returns planet rows plus optional star rows; each row is a JSON object
/// keyed by catalog column name.
#[async_trait]
pub trait SourceCollector: Send + Sync {
    async fn collect_entities_from_source(&self) -> Result<(Vec<Value>, Option<Vec<Value>>)>;

    /// Unique source name used for priorities, provenance and filenames.
    fn source_id(&self) -> &str;
}

/// Collector backed by cached catalog CSV files on disk.
pub struct CsvFileCollector {
    source_id: String,
    planets_path: PathBuf,
    stars_path: Option<PathBuf>,
}

impl CsvFileCollector {
    pub fn new(source_id: String, planets_path: PathBuf, stars_path: Option<PathBuf>) -> Self {
        Self {
            source_id,
            planets_path,
            stars_path,
        }
    }
}

#[async_trait]
impl SourceCollector for CsvFileCollector {
    async fn collect_entities_from_source(&self) -> Result<(Vec<Value>, Option<Vec<Value>>)> {
        let planets_text = std::fs::read_to_string(&self.planets_path)
            .with_context(|| format!("Failed to read {}", self.planets_path.display()))?;
        let planets = parse_csv_records(&planets_text)?;

        let stars = match &self.stars_path {
            Some(path) => {
                let text = std::fs::read_to_string(path)
                    .with_context(|| format!("Failed to read {}", path.display()))?;
                Some(parse_csv_records(&text)?)
            }
            None => None,
        };

        Ok((planets, stars))
    }

    fn source_id(&self) -> &str {
        &self.source_id
    }
}

/// Parse CSV text into JSON records, one object per row.
pub fn parse_csv_records(csv_text: &str) -> Result<Vec<Value>> {
    let mut rdr = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(csv_text.as_bytes());

    let headers = rdr
        .headers()
        .context("Failed to read CSV headers")?
        .iter()
        .map(|h| h.trim().to_string())
        .collect::<Vec<_>>();

    let mut out = Vec::new();
    for result in rdr.records() {
        let record = result.context("Failed to read CSV record")?;
        let mut obj = Map::new();

        for (idx, header) in headers.iter().enumerate() {
            let cell = record.get(idx).unwrap_or("");
            obj.insert(header.clone(), coerce_cell(cell));
        }

        out.push(Value::Object(obj));
    }

    Ok(out)
}

/// Coerce a CSV cell to the narrowest JSON value it parses as.
fn coerce_cell(s: &str) -> Value {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        return Value::Null;
    }

    if trimmed.eq_ignore_ascii_case("true") {
        return Value::Bool(true);
    }
    if trimmed.eq_ignore_ascii_case("false") {
        return Value::Bool(false);
    }

    if let Ok(i) = trimmed.parse::<i64>() {
        return Value::Number(i.into());
    }

    if let Ok(f) = trimmed.parse::<f64>() {
        if let Some(n) = serde_json::Number::from_f64(f) {
            return Value::Number(n);
        }
    }

    Value::String(trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_csv_coerces_cells() {
        let csv_text = "pl_name,disc_year,pl_masse,flag\nK2-18 b,2015,8.63,true\n";
        let rows = parse_csv_records(csv_text).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["pl_name"], Value::String("K2-18 b".to_string()));
        assert_eq!(rows[0]["disc_year"], Value::Number(2015.into()));
        assert_eq!(rows[0]["pl_masse"].as_f64(), Some(8.63));
        assert_eq!(rows[0]["flag"], Value::Bool(true));
    }

    #[test]
    fn test_parse_csv_empty_cell_is_null() {
        let csv_text = "pl_name,pl_masse\nK2-18 b,\n";
        let rows = parse_csv_records(csv_text).unwrap();
        assert_eq!(rows[0]["pl_masse"], Value::Null);
    }
}
