//! Input column names and output cell formatting.
//!
//! Output cells follow the conventions downstream consumers already read:
//! booleans as `True`/`False`, the recovered flag as `1`/`0`, and nulls as
//! empty cells.

use case_enrich_case_models::AddressContext;
use case_enrich_classify::{DrugClass, TextSource};
use strum::IntoEnumIterator as _;

pub const CASE_NUMBER: &str = "casenumber";
pub const LATITUDE: &str = "latitude";
pub const LONGITUDE: &str = "longitude";
pub const INCIDENT_STREET: &str = "incident_street";
pub const INCIDENT_CITY: &str = "incident_city";
pub const INCIDENT_ZIP: &str = "incident_zip";
pub const RESIDENCE_CITY: &str = "residence_city";
pub const DEATH_STREET: &str = "death_street";
pub const DEATH_CITY: &str = "death_city";
pub const DEATH_STATE: &str = "death_state";
pub const DEATH_ZIP: &str = "death_zip";
pub const PRIMARY_CAUSE: &str = "primarycause";
/// Every column whose name starts with this is a secondary narrative.
pub const SECONDARY_PREFIX: &str = "secondary";

pub const INCIDENT_ADDRESS_SUB: &str = "incident_address_sub";
pub const GEOCODED_LATITUDE: &str = "geocoded_latitude";
pub const GEOCODED_LONGITUDE: &str = "geocoded_longitude";
pub const GEOCODED_SCORE: &str = "geocoded_score";
pub const GEOCODED_ADDRESS: &str = "geocoded_address";
pub const GEOCODE_STATUS: &str = "geocode_status";
pub const RECOVERED: &str = "recovered";
pub const FINAL_LATITUDE: &str = "final_latitude";
pub const FINAL_LONGITUDE: &str = "final_longitude";
pub const SECONDARY_COMBINED: &str = "secondary_combined";

/// Cell values read as null, matching the default missing-value markers
/// of the tools that produced the input tables.
const MISSING_MARKERS: &[&str] = &[
    "", "#N/A", "#N/A N/A", "#NA", "-1.#IND", "-1.#QNAN", "-NaN", "-nan", "1.#IND", "1.#QNAN",
    "<NA>", "N/A", "NA", "NULL", "NaN", "None", "n/a", "nan", "null",
];

/// Whether a raw cell means "no value".
#[must_use]
pub fn is_missing(cell: &str) -> bool {
    let cell = cell.trim();
    MISSING_MARKERS.iter().any(|marker| *marker == cell)
}

/// Output column for one class/source flag, e.g. `heroin_secondary`.
#[must_use]
pub fn flag_column(class: DrugClass, source: TextSource) -> String {
    format!("{class}_{source}")
}

/// Whether the case table loader reads `name` from the input.
#[must_use]
pub fn is_input_column(name: &str) -> bool {
    [
        CASE_NUMBER,
        LATITUDE,
        LONGITUDE,
        INCIDENT_STREET,
        INCIDENT_CITY,
        INCIDENT_ZIP,
        RESIDENCE_CITY,
        DEATH_STREET,
        DEATH_CITY,
        DEATH_STATE,
        DEATH_ZIP,
        PRIMARY_CAUSE,
    ]
    .iter()
    .any(|column| *column == name)
        || name.starts_with(SECONDARY_PREFIX)
}

/// Every column the stages emit, excluding composite rules.
#[must_use]
pub fn generated_columns() -> Vec<String> {
    let mut columns: Vec<String> = AddressContext::all()
        .iter()
        .map(|context| context.address_column().to_string())
        .collect();
    columns.extend(
        [
            INCIDENT_ADDRESS_SUB,
            GEOCODED_LATITUDE,
            GEOCODED_LONGITUDE,
            GEOCODED_SCORE,
            GEOCODED_ADDRESS,
            GEOCODE_STATUS,
            RECOVERED,
            FINAL_LATITUDE,
            FINAL_LONGITUDE,
            SECONDARY_COMBINED,
        ]
        .map(str::to_string),
    );
    for class in DrugClass::iter() {
        for source in TextSource::iter() {
            columns.push(flag_column(class, source));
        }
    }
    columns
}

#[must_use]
pub const fn format_bool(value: bool) -> &'static str {
    if value { "True" } else { "False" }
}

#[must_use]
pub const fn format_indicator(value: bool) -> &'static str {
    if value { "1" } else { "0" }
}

/// Formats a float the way a float column is written: always with a
/// fractional part (`100.0`, `38.95`).
#[must_use]
pub fn format_float(value: Option<f64>) -> String {
    value.map_or_else(String::new, |v| format!("{v:?}"))
}

#[must_use]
pub fn format_text(value: Option<&str>) -> String {
    value.unwrap_or_default().to_string()
}
