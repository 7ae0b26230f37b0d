#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Normalized geocoding queries for case records.
//!
//! Case tables carry addresses as loose components typed in by hand:
//! - Placeholders: `"UNKNOWN"`, `"n/a"`, `"same"`
//! - Unit noise: `"123 Main St Apt #4B"`
//! - Stray punctuation and state suffixes: `"12 Oak St, NH 03301"`
//! - Missing incident cities with a usable residence city
//!
//! [`build_address`] turns one record's components for one
//! [`AddressContext`] into a single uppercase query string.

pub mod clean;

use case_enrich_case_models::{AddressContext, CaseRecord};

pub use clean::clean_street;

/// A normalized query address plus whether its city was borrowed from
/// the residence city.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuiltAddress {
    /// Uppercase, trimmed query string. May be empty but never absent.
    pub address: String,
    /// `true` only for incident addresses whose city came from
    /// `residence_city`.
    pub city_was_substituted: bool,
}

/// Builds the normalized query address for `record` in `context`.
///
/// Slots are street, city, and zip (with state before zip for
/// [`AddressContext::Death`]). Each slot contributes exactly one separating
/// space, so an empty middle slot leaves a double space; only the outer
/// whitespace is trimmed.
#[must_use]
pub fn build_address(record: &CaseRecord, context: AddressContext) -> BuiltAddress {
    match context {
        AddressContext::Incident => {
            let street = clean_street(record.incident_street.as_deref());
            let (city, city_was_substituted) = resolve_incident_city(record);
            let zip = raw_component(record.incident_zip.as_deref());

            BuiltAddress {
                address: assemble(&[&street, &city, &zip]),
                city_was_substituted,
            }
        }
        AddressContext::Death => {
            let street = clean_street(record.death_street.as_deref());
            let city = record.death_city.as_deref().map(title_trim).unwrap_or_default();
            let state = record.death_state.as_deref().map(title_trim).unwrap_or_default();
            let zip = raw_component(record.death_zip.as_deref());

            BuiltAddress {
                address: assemble(&[&street, &city, &state, &zip]),
                city_was_substituted: false,
            }
        }
    }
}

/// Picks the incident city, falling back to the residence city.
///
/// Returns the title-cased city and whether the fallback was used. A
/// present `incident_city` always wins, even when it is blank.
#[must_use]
pub fn resolve_incident_city(record: &CaseRecord) -> (String, bool) {
    if let Some(city) = record.incident_city.as_deref() {
        return (title_trim(city), false);
    }
    if let Some(city) = record.residence_city.as_deref() {
        return (title_trim(city), true);
    }
    (String::new(), false)
}

/// Title-cases a string: a letter is uppercased when it follows a
/// non-letter (or starts the string) and lowercased otherwise.
///
/// `"o'fallon"` becomes `"O'Fallon"` and `"st. louis"` becomes
/// `"St. Louis"`.
#[must_use]
pub fn title_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut prev_is_letter = false;

    for ch in s.chars() {
        if ch.is_alphabetic() {
            if prev_is_letter {
                out.extend(ch.to_lowercase());
            } else {
                out.extend(ch.to_uppercase());
            }
            prev_is_letter = true;
        } else {
            out.push(ch);
            prev_is_letter = false;
        }
    }

    out
}

fn title_trim(s: &str) -> String {
    title_case(s).trim().to_string()
}

fn raw_component(value: Option<&str>) -> String {
    value.map(str::trim).unwrap_or_default().to_string()
}

fn assemble(slots: &[&str]) -> String {
    slots.join(" ").to_uppercase().trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn incident(street: Option<&str>, city: Option<&str>, residence: Option<&str>) -> CaseRecord {
        CaseRecord {
            incident_street: street.map(String::from),
            incident_city: city.map(String::from),
            residence_city: residence.map(String::from),
            incident_zip: Some("65201".to_string()),
            ..CaseRecord::new("ME2021-00042")
        }
    }

    #[test]
    fn substitutes_residence_city_for_missing_incident_city() {
        let record = incident(Some("123 Main St Apt #4B"), None, Some("columbia"));
        let built = build_address(&record, AddressContext::Incident);
        assert_eq!(built.address, "123 MAIN ST COLUMBIA 65201");
        assert!(built.city_was_substituted);
    }

    #[test]
    fn present_incident_city_is_never_substituted() {
        let record = incident(Some("9 Elm St"), Some("  jefferson city "), Some("columbia"));
        let built = build_address(&record, AddressContext::Incident);
        assert_eq!(built.address, "9 ELM ST JEFFERSON CITY 65201");
        assert!(!built.city_was_substituted);
    }

    #[test]
    fn residence_city_is_title_cased_and_trimmed() {
        let record = incident(None, None, Some("  sT. lOUIS  "));
        let (city, substituted) = resolve_incident_city(&record);
        assert_eq!(city, "St. Louis");
        assert!(substituted);
    }

    #[test]
    fn no_city_at_all_leaves_empty_slot() {
        let record = incident(Some("9 Elm St"), None, None);
        let built = build_address(&record, AddressContext::Incident);
        assert_eq!(built.address, "9 ELM ST  65201");
        assert!(!built.city_was_substituted);
    }

    #[test]
    fn empty_leading_slots_are_trimmed() {
        let record = CaseRecord {
            incident_city: Some("Columbia".to_string()),
            ..CaseRecord::new("ME2021-00043")
        };
        let built = build_address(&record, AddressContext::Incident);
        assert_eq!(built.address, "COLUMBIA");
    }

    #[test]
    fn fully_empty_record_builds_empty_address() {
        let record = CaseRecord::new("ME2021-00044");
        assert_eq!(build_address(&record, AddressContext::Incident).address, "");
        assert_eq!(build_address(&record, AddressContext::Death).address, "");
    }

    #[test]
    fn placeholder_street_is_dropped() {
        let record = incident(Some("UNKNOWN"), Some("Columbia"), None);
        let built = build_address(&record, AddressContext::Incident);
        assert_eq!(built.address, "COLUMBIA 65201");
    }

    #[test]
    fn death_address_includes_state_and_never_substitutes() {
        let record = CaseRecord {
            death_street: Some("1 Hospital Dr".to_string()),
            death_city: None,
            death_state: Some("mo".to_string()),
            death_zip: Some("65212".to_string()),
            residence_city: Some("Columbia".to_string()),
            ..CaseRecord::new("ME2021-00045")
        };
        let built = build_address(&record, AddressContext::Death);
        assert_eq!(built.address, "1 HOSPITAL DR  MO 65212");
        assert!(!built.city_was_substituted);
    }

    #[test]
    fn death_address_full() {
        let record = CaseRecord {
            death_street: Some("1 Hospital Dr.".to_string()),
            death_city: Some("columbia".to_string()),
            death_state: Some("Missouri".to_string()),
            death_zip: Some("65212".to_string()),
            ..CaseRecord::new("ME2021-00046")
        };
        assert_eq!(
            build_address(&record, AddressContext::Death).address,
            "1 HOSPITAL DR. COLUMBIA MISSOURI 65212"
        );
    }

    #[test]
    fn building_is_deterministic() {
        let record = incident(Some("123 Main St Apt #4B"), None, Some("columbia"));
        assert_eq!(
            build_address(&record, AddressContext::Incident),
            build_address(&record, AddressContext::Incident)
        );
    }

    #[test]
    fn title_case_follows_non_letters() {
        assert_eq!(title_case("o'fallon"), "O'Fallon");
        assert_eq!(title_case("KANSAS CITY"), "Kansas City");
        assert_eq!(title_case("lee's summit"), "Lee'S Summit");
        assert_eq!(title_case(""), "");
    }
}
