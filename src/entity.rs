//! Entity records
//!
//! Typed records for exoplanets and their host stars. Every entity carries
//! a canonical name that serves as its identity key across catalogs; a
//! planet additionally carries a lookup reference to its host star's
//! canonical name (not ownership).

use crate::measurement::Measurement;
use serde::{Deserialize, Serialize};

/// An exoplanet as reported by one source, or as consolidated across all.
///
/// Masses and radii are in Earth units, the orbital period in days, the
/// semi-major axis in AU, the equilibrium temperature in K, the density in
/// g/cm3 and the insolation flux in Earth flux.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Exoplanet {
    /// Canonical name, the identity key.
    pub pl_name: String,
    /// Host star canonical name (lookup key only).
    pub st_name: Option<String>,
    #[serde(default)]
    pub alt_names: Vec<String>,
    pub disc_method: Option<String>,
    pub disc_year: Option<i32>,
    pub disc_facility: Option<String>,
    pub pl_masse: Option<Measurement>,
    pub pl_rade: Option<Measurement>,
    pub pl_orbper: Option<Measurement>,
    pub pl_orbsmax: Option<Measurement>,
    pub pl_orbeccen: Option<Measurement>,
    pub pl_eqt: Option<Measurement>,
    pub pl_dens: Option<Measurement>,
    pub pl_insol: Option<Measurement>,
}

/// A host star as reported by one source, or as consolidated across all.
///
/// Mass and radius are in solar units, the distance in parsecs, the
/// effective temperature in K and the age in Gyr.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Star {
    /// Canonical name, the identity key.
    pub st_name: String,
    #[serde(default)]
    pub alt_names: Vec<String>,
    pub st_spectype: Option<String>,
    pub sy_dist: Option<Measurement>,
    pub st_mass: Option<Measurement>,
    pub st_rad: Option<Measurement>,
    pub st_teff: Option<Measurement>,
    pub st_met: Option<Measurement>,
    pub st_age: Option<Measurement>,
    /// Year the star's first planet was discovered.
    pub disc_year: Option<i32>,
    /// Catalogued planet count for the system.
    pub sy_pnum: Option<i32>,
}

impl Exoplanet {
    /// Schema field order, also the export column order.
    pub const FIELDS: &'static [&'static str] = &[
        "pl_name",
        "st_name",
        "alt_names",
        "disc_method",
        "disc_year",
        "disc_facility",
        "pl_masse",
        "pl_rade",
        "pl_orbper",
        "pl_orbsmax",
        "pl_orbeccen",
        "pl_eqt",
        "pl_dens",
        "pl_insol",
    ];

    pub fn canonical_name(&self) -> &str {
        &self.pl_name
    }

    /// Names of the fields that currently hold a value.
    pub fn present_fields(&self) -> Vec<&'static str> {
        let mut out = vec!["pl_name"];
        if self.st_name.is_some() {
            out.push("st_name");
        }
        if !self.alt_names.is_empty() {
            out.push("alt_names");
        }
        if self.disc_method.is_some() {
            out.push("disc_method");
        }
        if self.disc_year.is_some() {
            out.push("disc_year");
        }
        if self.disc_facility.is_some() {
            out.push("disc_facility");
        }
        if self.pl_masse.is_some() {
            out.push("pl_masse");
        }
        if self.pl_rade.is_some() {
            out.push("pl_rade");
        }
        if self.pl_orbper.is_some() {
            out.push("pl_orbper");
        }
        if self.pl_orbsmax.is_some() {
            out.push("pl_orbsmax");
        }
        if self.pl_orbeccen.is_some() {
            out.push("pl_orbeccen");
        }
        if self.pl_eqt.is_some() {
            out.push("pl_eqt");
        }
        if self.pl_dens.is_some() {
            out.push("pl_dens");
        }
        if self.pl_insol.is_some() {
            out.push("pl_insol");
        }
        out
    }
}

impl Star {
    /// Schema field order, also the export column order.
    pub const FIELDS: &'static [&'static str] = &[
        "st_name",
        "alt_names",
        "st_spectype",
        "sy_dist",
        "st_mass",
        "st_rad",
        "st_teff",
        "st_met",
        "st_age",
        "disc_year",
        "sy_pnum",
    ];

    pub fn canonical_name(&self) -> &str {
        &self.st_name
    }

    /// Names of the fields that currently hold a value.
    pub fn present_fields(&self) -> Vec<&'static str> {
        let mut out = vec!["st_name"];
        if !self.alt_names.is_empty() {
            out.push("alt_names");
        }
        if self.st_spectype.is_some() {
            out.push("st_spectype");
        }
        if self.sy_dist.is_some() {
            out.push("sy_dist");
        }
        if self.st_mass.is_some() {
            out.push("st_mass");
        }
        if self.st_rad.is_some() {
            out.push("st_rad");
        }
        if self.st_teff.is_some() {
            out.push("st_teff");
        }
        if self.st_met.is_some() {
            out.push("st_met");
        }
        if self.st_age.is_some() {
            out.push("st_age");
        }
        if self.disc_year.is_some() {
            out.push("disc_year");
        }
        if self.sy_pnum.is_some() {
            out.push("sy_pnum");
        }
        out
    }
}

/// Normalize a reported object name into its identity key.
///
/// Two records whose names normalize to the same key denote the same
/// physical object: surrounding whitespace is trimmed, internal whitespace
/// runs collapse to a single space, and comparison is case-insensitive.
pub fn canonical_key(name: &str) -> String {
    name.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}
