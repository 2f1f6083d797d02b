//! Article draft synthesizer
//!
//! Renders one canonical entity, given its sibling entities in the same
//! planetary system, into a wiki-style article draft: infobox fields plus
//! prose sections plus a system table. Pure and deterministic, no I/O:
//! equal inputs produce byte-identical output. Missing optional fields are
//! omitted from their section, never rendered as placeholders.

use crate::entity::{canonical_key, Exoplanet, Star};
use crate::measurement::Measurement;
use std::cmp::Ordering;
use std::fmt::Write;

/// Synthesize an article draft for one exoplanet.
///
/// `siblings` is the set of planets sharing the target's host star. The
/// system table always includes the target itself, whether or not the
/// caller filtered it out, and is sorted by semi-major axis ascending.
pub fn synthesize_exoplanet(planet: &Exoplanet, siblings: &[&Exoplanet]) -> String {
    let mut out = String::new();

    out.push_str("{{Infobox planet\n");
    infobox_line(&mut out, "name", Some(planet.pl_name.as_str()));
    infobox_line(&mut out, "star", planet.st_name.as_deref());
    infobox_line(&mut out, "discovery_method", planet.disc_method.as_deref());
    infobox_value(&mut out, "discovered", planet.disc_year.map(|y| y.to_string()));
    infobox_line(&mut out, "discovery_site", planet.disc_facility.as_deref());
    infobox_measurement(&mut out, "mass", &planet.pl_masse, "Earth mass");
    infobox_measurement(&mut out, "radius", &planet.pl_rade, "Earth radius");
    infobox_measurement(&mut out, "period", &planet.pl_orbper, "d");
    infobox_measurement(&mut out, "semimajor", &planet.pl_orbsmax, "AU");
    infobox_measurement(&mut out, "eccentricity", &planet.pl_orbeccen, "");
    infobox_measurement(&mut out, "temperature", &planet.pl_eqt, "K");
    infobox_measurement(&mut out, "density", &planet.pl_dens, "g/cm3");
    infobox_measurement(&mut out, "insolation", &planet.pl_insol, "Earth flux");
    out.push_str("}}\n\n");

    out.push_str(&exoplanet_intro(planet));
    out.push_str("\n\n");

    let physical = exoplanet_physical_section(planet);
    if !physical.is_empty() {
        out.push_str("== Physical characteristics ==\n");
        out.push_str(&physical);
        out.push('\n');
    }

    let orbit = exoplanet_orbit_section(planet);
    if !orbit.is_empty() {
        out.push_str("== Orbit ==\n");
        out.push_str(&orbit);
        out.push('\n');
    }

    if let Some(host) = &planet.st_name {
        out.push_str("== Planetary system ==\n");
        out.push_str(&system_table(host, &with_target(planet, siblings)));
    }

    out
}

/// Synthesize an article draft for one host star and its planets.
pub fn synthesize_star(star: &Star, planets: &[&Exoplanet]) -> String {
    let mut out = String::new();

    out.push_str("{{Infobox star\n");
    infobox_line(&mut out, "name", Some(star.st_name.as_str()));
    infobox_line(&mut out, "spectral_type", star.st_spectype.as_deref());
    infobox_measurement(&mut out, "distance", &star.sy_dist, "pc");
    infobox_measurement(&mut out, "mass", &star.st_mass, "solar mass");
    infobox_measurement(&mut out, "radius", &star.st_rad, "solar radius");
    infobox_measurement(&mut out, "temperature", &star.st_teff, "K");
    infobox_measurement(&mut out, "metallicity", &star.st_met, "[Fe/H]");
    infobox_measurement(&mut out, "age", &star.st_age, "Gyr");
    infobox_value(&mut out, "discovered", star.disc_year.map(|y| y.to_string()));
    infobox_value(&mut out, "planets", star.sy_pnum.map(|n| n.to_string()));
    out.push_str("}}\n\n");

    let mut intro = format!("'''{}''' is a star", star.st_name);
    if let Some(spectype) = &star.st_spectype {
        write!(intro, " of spectral type {}", spectype).unwrap();
    }
    if let Some(dist) = &star.sy_dist {
        write!(intro, " located {} pc away", format_measurement(dist)).unwrap();
    }
    match planets.len() {
        0 => {}
        1 => intro.push_str(", known to host one exoplanet"),
        n => {
            write!(intro, ", known to host {} exoplanets", n).unwrap();
        }
    }
    intro.push('.');
    out.push_str(&intro);
    out.push_str("\n\n");

    if !planets.is_empty() {
        out.push_str("== Planetary system ==\n");
        let mut sorted: Vec<&Exoplanet> = planets.to_vec();
        sort_by_orbit(&mut sorted);
        out.push_str(&planet_table(&sorted));
    }

    out
}

fn exoplanet_intro(planet: &Exoplanet) -> String {
    let mut intro = format!("'''{}''' is an exoplanet", planet.pl_name);
    if let Some(host) = &planet.st_name {
        write!(intro, " orbiting the star {}", host).unwrap();
    }
    if let Some(year) = planet.disc_year {
        write!(intro, ", discovered in {}", year).unwrap();
        if let Some(method) = &planet.disc_method {
            write!(intro, " by the {} method", method.to_lowercase()).unwrap();
        }
    } else if let Some(method) = &planet.disc_method {
        write!(intro, ", discovered by the {} method", method.to_lowercase()).unwrap();
    }
    intro.push('.');
    intro
}

fn exoplanet_physical_section(planet: &Exoplanet) -> String {
    let mut out = String::new();
    if let Some(mass) = &planet.pl_masse {
        writeln!(
            out,
            "The planet has a mass of {} Earth masses.",
            format_measurement(mass)
        )
        .unwrap();
    }
    if let Some(radius) = &planet.pl_rade {
        writeln!(
            out,
            "Its radius measures {} Earth radii.",
            format_measurement(radius)
        )
        .unwrap();
    }
    if let Some(density) = &planet.pl_dens {
        writeln!(
            out,
            "Its bulk density is {} g/cm3.",
            format_measurement(density)
        )
        .unwrap();
    }
    if let Some(temperature) = &planet.pl_eqt {
        writeln!(
            out,
            "Its equilibrium temperature is estimated at {} K.",
            format_measurement(temperature)
        )
        .unwrap();
    }
    if let Some(insolation) = &planet.pl_insol {
        writeln!(
            out,
            "It receives {} times the insolation flux of Earth.",
            format_measurement(insolation)
        )
        .unwrap();
    }
    out
}

fn exoplanet_orbit_section(planet: &Exoplanet) -> String {
    let mut out = String::new();
    if let Some(period) = &planet.pl_orbper {
        writeln!(
            out,
            "The planet completes an orbit every {} days.",
            format_measurement(period)
        )
        .unwrap();
    }
    if let Some(smax) = &planet.pl_orbsmax {
        writeln!(
            out,
            "Its semi-major axis is {} AU.",
            format_measurement(smax)
        )
        .unwrap();
    }
    if let Some(ecc) = &planet.pl_orbeccen {
        writeln!(
            out,
            "The orbital eccentricity is {}.",
            format_measurement(ecc)
        )
        .unwrap();
    }
    out
}

/// Sibling set with the target guaranteed present exactly once.
fn with_target<'a>(planet: &'a Exoplanet, siblings: &[&'a Exoplanet]) -> Vec<&'a Exoplanet> {
    let target_key = canonical_key(&planet.pl_name);
    let mut members: Vec<&Exoplanet> = siblings.to_vec();
    if !members
        .iter()
        .any(|p| canonical_key(&p.pl_name) == target_key)
    {
        members.push(planet);
    }
    members
}

/// Sort planets by semi-major axis ascending; planets without one sort
/// last, by name.
fn sort_by_orbit(planets: &mut [&Exoplanet]) {
    planets.sort_by(|a, b| {
        match (
            a.pl_orbsmax.as_ref().map(|m| m.value),
            b.pl_orbsmax.as_ref().map(|m| m.value),
        ) {
            (Some(x), Some(y)) => x
                .partial_cmp(&y)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.pl_name.cmp(&b.pl_name)),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => a.pl_name.cmp(&b.pl_name),
        }
    });
}

fn system_table(host: &str, members: &[&Exoplanet]) -> String {
    let mut sorted: Vec<&Exoplanet> = members.to_vec();
    sort_by_orbit(&mut sorted);

    let mut out = format!("The planetary system of {} comprises:\n", host);
    out.push_str(&planet_table(&sorted));
    out
}

fn planet_table(sorted: &[&Exoplanet]) -> String {
    let mut out = String::new();
    out.push_str("{| class=\"wikitable\"\n");
    out.push_str(
        "! Planet !! Mass (Earth) !! Radius (Earth) !! Semi-major axis (AU) !! Period (d) !! Eccentricity\n",
    );
    for planet in sorted {
        out.push_str("|-\n");
        writeln!(
            out,
            "| {} || {} || {} || {} || {} || {}",
            planet.pl_name,
            cell(&planet.pl_masse),
            cell(&planet.pl_rade),
            cell(&planet.pl_orbsmax),
            cell(&planet.pl_orbper),
            cell(&planet.pl_orbeccen),
        )
        .unwrap();
    }
    out.push_str("|}\n");
    out
}

fn cell(measurement: &Option<Measurement>) -> String {
    measurement
        .as_ref()
        .map(format_measurement)
        .unwrap_or_default()
}

fn format_measurement(m: &Measurement) -> String {
    m.to_string()
}

fn infobox_line(out: &mut String, key: &str, value: Option<&str>) {
    if let Some(v) = value {
        writeln!(out, "| {} = {}", key, v).unwrap();
    }
}

fn infobox_value(out: &mut String, key: &str, value: Option<String>) {
    infobox_line(out, key, value.as_deref());
}

fn infobox_measurement(out: &mut String, key: &str, value: &Option<Measurement>, unit: &str) {
    if let Some(m) = value {
        if unit.is_empty() {
            writeln!(out, "| {} = {}", key, format_measurement(m)).unwrap();
        } else {
            writeln!(out, "| {} = {} {}", key, format_measurement(m), unit).unwrap();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::measurement::Measurement;

    fn planet(name: &str, host: &str, smax: Option<f64>) -> Exoplanet {
        Exoplanet {
            pl_name: name.to_string(),
            st_name: Some(host.to_string()),
            pl_orbsmax: smax.map(|v| Measurement::exact(v, "nea").unwrap()),
            ..Default::default()
        }
    }

    #[test]
    fn test_draft_is_deterministic() {
        let target = Exoplanet {
            pl_name: "K2-18 b".to_string(),
            st_name: Some("K2-18".to_string()),
            disc_method: Some("Transit".to_string()),
            disc_year: Some(2015),
            pl_masse: Some(Measurement::new(8.63, Some(1.35), Some(1.35), "nea").unwrap()),
            ..Default::default()
        };
        let sibling = planet("K2-18 c", "K2-18", Some(0.06));
        let siblings = vec![&sibling];

        let first = synthesize_exoplanet(&target, &siblings);
        let second = synthesize_exoplanet(&target, &siblings);
        assert_eq!(first, second);
    }

    #[test]
    fn test_system_table_includes_target_sorted_by_distance() {
        let target = planet("X d", "X", Some(0.3));
        let inner = planet("X b", "X", Some(0.05));
        let outer = planet("X c", "X", Some(1.2));
        // caller did not filter the target out; it must not be duplicated
        let siblings = vec![&inner, &outer, &target];

        let draft = synthesize_exoplanet(&target, &siblings);
        let b = draft.find("| X b ||").unwrap();
        let d = draft.find("| X d ||").unwrap();
        let c = draft.find("| X c ||").unwrap();
        assert!(b < d && d < c, "rows not sorted by semi-major axis");
        assert_eq!(draft.matches("| X d ||").count(), 1);

        // target absent from the sibling list: still in the table
        let filtered = vec![&inner, &outer];
        let draft = synthesize_exoplanet(&target, &filtered);
        assert_eq!(draft.matches("| X d ||").count(), 1);
    }

    #[test]
    fn test_planets_without_distance_sort_last_by_name() {
        let target = planet("X b", "X", Some(0.1));
        let far = planet("X z", "X", None);
        let near = planet("X a", "X", None);
        let siblings = vec![&far, &near];

        let draft = synthesize_exoplanet(&target, &siblings);
        let b = draft.find("| X b ||").unwrap();
        let a = draft.find("| X a ||").unwrap();
        let z = draft.find("| X z ||").unwrap();
        assert!(b < a && a < z);
    }

    #[test]
    fn test_missing_fields_omitted() {
        let bare = Exoplanet {
            pl_name: "Lonely b".to_string(),
            ..Default::default()
        };
        let draft = synthesize_exoplanet(&bare, &[]);
        assert!(draft.contains("| name = Lonely b"));
        assert!(!draft.contains("| mass ="));
        assert!(!draft.contains("== Physical characteristics =="));
        // no host star: no system section
        assert!(!draft.contains("== Planetary system =="));
        assert!(!draft.contains("unknown"));
    }

    #[test]
    fn test_measurement_rendering_in_prose() {
        let target = Exoplanet {
            pl_name: "X b".to_string(),
            pl_masse: Some(Measurement::new(8.63, Some(1.35), Some(1.35), "nea").unwrap()),
            pl_rade: Some(Measurement::new(2.61, Some(0.09), Some(0.08), "eu").unwrap()),
            ..Default::default()
        };
        let draft = synthesize_exoplanet(&target, &[]);
        assert!(draft.contains("a mass of 8.63 (±1.35) Earth masses"));
        assert!(draft.contains("radius measures 2.61 (+0.09/-0.08) Earth radii"));
    }

    #[test]
    fn test_star_draft_lists_planets() {
        let star = Star {
            st_name: "K2-18".to_string(),
            st_spectype: Some("M2.5 V".to_string()),
            ..Default::default()
        };
        let b = planet("K2-18 b", "K2-18", Some(0.14));
        let c = planet("K2-18 c", "K2-18", Some(0.06));
        let draft = synthesize_star(&star, &[&b, &c]);
        assert!(draft.contains("'''K2-18''' is a star of spectral type M2.5 V"));
        assert!(draft.contains("known to host 2 exoplanets"));
        let inner = draft.find("| K2-18 c ||").unwrap();
        let outer = draft.find("| K2-18 b ||").unwrap();
        assert!(inner < outer);
    }
}
