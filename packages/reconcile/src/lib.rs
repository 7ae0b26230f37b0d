#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Geocode reconciliation.
//!
//! Left-joins geocoded results (keyed by case number) onto the full case
//! set and derives the composite columns:
//!
//! - `recovered` is set when the geocoded result carries a score. A result
//!   with coordinates but no score does not count.
//! - `final_latitude` / `final_longitude` prefer the raw coordinate and fall
//!   back to the geocoded one, each axis on its own. A row can end up with
//!   a raw latitude and a geocoded longitude.

use std::collections::{BTreeMap, BTreeSet};

use case_enrich_case_models::fallback::prefer;
use case_enrich_case_models::{CaseRecord, GeocodeResult, LookupStatus};

/// One case's geocoding columns after reconciliation.
#[derive(Debug, Clone, PartialEq)]
pub struct ReconciledLocation {
    pub case_number: String,
    /// The joined geocode result, or an all-null
    /// [`LookupStatus::NotRequested`] result when the case was not in the
    /// geocoded subset.
    pub geocoded: GeocodeResult,
    pub recovered: bool,
    pub final_latitude: Option<f64>,
    pub final_longitude: Option<f64>,
}

/// Joins `geocoded` onto `cases`, returning one row per case in input
/// order.
#[must_use]
pub fn reconcile(
    geocoded: &BTreeMap<String, GeocodeResult>,
    cases: &[CaseRecord],
) -> Vec<ReconciledLocation> {
    let known: BTreeSet<&str> = cases.iter().map(|c| c.case_number.as_str()).collect();
    let unmatched_keys = geocoded
        .keys()
        .filter(|key| !known.contains(key.as_str()))
        .count();
    if unmatched_keys > 0 {
        log::debug!("Ignoring {unmatched_keys} geocoded results with no matching case");
    }

    let rows: Vec<ReconciledLocation> = cases
        .iter()
        .map(|case| {
            let result = geocoded
                .get(&case.case_number)
                .cloned()
                .unwrap_or_else(|| GeocodeResult::empty(LookupStatus::NotRequested));
            reconcile_one(case, result)
        })
        .collect();

    let recovered = rows.iter().filter(|r| r.recovered).count();
    log::info!(
        "Reconciled {} cases: {recovered} recovered from geocoding",
        rows.len()
    );

    rows
}

/// Derives the composite columns for a single case.
#[must_use]
pub fn reconcile_one(case: &CaseRecord, geocoded: GeocodeResult) -> ReconciledLocation {
    ReconciledLocation {
        case_number: case.case_number.clone(),
        recovered: geocoded.is_scored(),
        final_latitude: prefer([case.latitude, geocoded.latitude]),
        final_longitude: prefer([case.longitude, geocoded.longitude]),
        geocoded,
    }
}
