//! Row decoding
//!
//! Turns one raw JSON row into a typed entity. All failures here are
//! per-row validation errors: the caller counts and skips the row, the
//! batch continues.
//!
//! Error-bound columns follow the NASA-archive convention: `<field>err1`
//! is the positive upper bound and `<field>err2` the lower bound, reported
//! as a negative number. The lower bound's magnitude is taken, so catalogs
//! that report it positive decode the same way.

use crate::entity::{Exoplanet, Star};
use crate::error::{PipelineError, Result};
use crate::measurement::Measurement;
use serde_json::Value;

/// Decode a raw planet row from the given source.
pub fn decode_exoplanet(source: &str, row: &Value) -> Result<Exoplanet> {
    let pl_name = require_str(row, "pl_name")?;

    Ok(Exoplanet {
        pl_name,
        st_name: get_str(row, &["st_name", "hostname"]),
        alt_names: get_name_list(row, "alt_names"),
        disc_method: get_str(row, &["disc_method", "discoverymethod"]),
        disc_year: get_i32(row, "disc_year")?,
        disc_facility: get_str(row, &["disc_facility"]),
        pl_masse: get_measurement(row, source, "pl_masse")?,
        pl_rade: get_measurement(row, source, "pl_rade")?,
        pl_orbper: get_measurement(row, source, "pl_orbper")?,
        pl_orbsmax: get_measurement(row, source, "pl_orbsmax")?,
        pl_orbeccen: get_measurement(row, source, "pl_orbeccen")?,
        pl_eqt: get_measurement(row, source, "pl_eqt")?,
        pl_dens: get_measurement(row, source, "pl_dens")?,
        pl_insol: get_measurement(row, source, "pl_insol")?,
    })
}

/// Decode a raw star row from the given source.
pub fn decode_star(source: &str, row: &Value) -> Result<Star> {
    let st_name = require_str_any(row, &["st_name", "hostname"])?;

    Ok(Star {
        st_name,
        alt_names: get_name_list(row, "alt_names"),
        st_spectype: get_str(row, &["st_spectype"]),
        sy_dist: get_measurement(row, source, "sy_dist")?,
        st_mass: get_measurement(row, source, "st_mass")?,
        st_rad: get_measurement(row, source, "st_rad")?,
        st_teff: get_measurement(row, source, "st_teff")?,
        st_met: get_measurement(row, source, "st_met")?,
        st_age: get_measurement(row, source, "st_age")?,
        disc_year: get_i32(row, "disc_year")?,
        sy_pnum: get_i32(row, "sy_pnum")?,
    })
}

fn require_str(row: &Value, key: &str) -> Result<String> {
    get_str(row, &[key]).ok_or_else(|| {
        PipelineError::RowValidation(format!("missing or empty required field '{}'", key))
    })
}

fn require_str_any(row: &Value, keys: &[&str]) -> Result<String> {
    get_str(row, keys).ok_or_else(|| {
        PipelineError::RowValidation(format!(
            "missing or empty required field '{}'",
            keys.join("' or '")
        ))
    })
}

/// First non-empty string value among the candidate keys.
fn get_str(row: &Value, keys: &[&str]) -> Option<String> {
    for key in keys {
        if let Some(v) = row.get(key) {
            match v {
                Value::String(s) => {
                    let trimmed = s.trim();
                    if !trimmed.is_empty() {
                        return Some(trimmed.to_string());
                    }
                }
                Value::Number(n) => return Some(n.to_string()),
                _ => {}
            }
        }
    }
    None
}

fn get_f64(row: &Value, key: &str) -> Result<Option<f64>> {
    let Some(v) = row.get(key) else {
        return Ok(None);
    };
    let parsed = match v {
        Value::Null => return Ok(None),
        Value::Number(n) => n.as_f64(),
        Value::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                return Ok(None);
            }
            trimmed.parse::<f64>().ok()
        }
        _ => None,
    };
    match parsed {
        Some(f) if f.is_finite() => Ok(Some(f)),
        Some(f) => Err(PipelineError::RowValidation(format!(
            "field '{}' is not finite: {}",
            key, f
        ))),
        None => Err(PipelineError::RowValidation(format!(
            "field '{}' is not numeric: {}",
            key, v
        ))),
    }
}

fn get_i32(row: &Value, key: &str) -> Result<Option<i32>> {
    match get_f64(row, key)? {
        Some(f) => {
            let rounded = f.round();
            if (rounded - f).abs() > f64::EPSILON || rounded < i32::MIN as f64 || rounded > i32::MAX as f64
            {
                return Err(PipelineError::RowValidation(format!(
                    "field '{}' is not a valid integer: {}",
                    key, f
                )));
            }
            Ok(Some(rounded as i32))
        }
        None => Ok(None),
    }
}

/// Assemble a measurement from `<key>`, `<key>err1` and `<key>err2`.
///
/// Error columns without a value column are ignored; a present value with
/// bad bounds is a row-validation error.
fn get_measurement(row: &Value, source: &str, key: &str) -> Result<Option<Measurement>> {
    let Some(value) = get_f64(row, key)? else {
        return Ok(None);
    };
    let upper = get_f64(row, &format!("{}err1", key))?;
    let lower = get_f64(row, &format!("{}err2", key))?.map(f64::abs);
    Measurement::new(value, upper, lower, source).map(Some)
}

/// Split an alternate-name cell on `;` or `,` into trimmed names.
fn get_name_list(row: &Value, key: &str) -> Vec<String> {
    let Some(raw) = get_str(row, &[key]) else {
        return Vec::new();
    };
    raw.split(|c| c == ';' || c == ',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decode_exoplanet_full_row() {
        let row = json!({
            "pl_name": "K2-18 b",
            "hostname": "K2-18",
            "discoverymethod": "Transit",
            "disc_year": 2015,
            "pl_masse": 8.63,
            "pl_masseerr1": 1.35,
            "pl_masseerr2": -1.35,
            "alt_names": "EPIC 201912552 b; K2-18b"
        });
        let planet = decode_exoplanet("nasa_exoplanet_archive", &row).unwrap();
        assert_eq!(planet.pl_name, "K2-18 b");
        assert_eq!(planet.st_name.as_deref(), Some("K2-18"));
        assert_eq!(planet.disc_method.as_deref(), Some("Transit"));
        assert_eq!(planet.disc_year, Some(2015));
        let mass = planet.pl_masse.unwrap();
        assert_eq!(mass.value, 8.63);
        assert_eq!(mass.upper_error, Some(1.35));
        assert_eq!(mass.lower_error, Some(1.35));
        assert_eq!(mass.source, "nasa_exoplanet_archive");
        assert_eq!(planet.alt_names, vec!["EPIC 201912552 b", "K2-18b"]);
    }

    #[test]
    fn test_decode_rejects_missing_name() {
        let row = json!({ "pl_masse": 1.0 });
        assert!(decode_exoplanet("nea", &row).is_err());

        let blank = json!({ "pl_name": "   " });
        assert!(decode_exoplanet("nea", &blank).is_err());
    }

    #[test]
    fn test_decode_rejects_non_numeric_measurement() {
        let row = json!({ "pl_name": "X b", "pl_masse": "heavy" });
        assert!(decode_exoplanet("nea", &row).is_err());
    }

    #[test]
    fn test_lower_bound_magnitude_taken() {
        // some catalogs report err2 positive instead of negative
        let row = json!({ "pl_name": "X b", "pl_rade": 2.0, "pl_radeerr2": 0.3 });
        let planet = decode_exoplanet("eu", &row).unwrap();
        assert_eq!(planet.pl_rade.unwrap().lower_error, Some(0.3));
    }

    #[test]
    fn test_decode_star_uses_hostname_alias() {
        let row = json!({ "hostname": "K2-18", "st_teff": 3457.0, "sy_pnum": 2 });
        let star = decode_star("nea", &row).unwrap();
        assert_eq!(star.st_name, "K2-18");
        assert_eq!(star.st_teff.unwrap().value, 3457.0);
        assert_eq!(star.sy_pnum, Some(2));
    }
}
