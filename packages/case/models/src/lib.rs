#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Case record types shared across the case enrichment toolchain.
//!
//! A [`CaseRecord`] is one row of the medical examiner case table, with
//! every optional cell already resolved to `None` when absent. The
//! geocoding and classification pipelines both read these records; neither
//! mutates them.

pub mod fallback;

use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// One incident/death case, keyed by [`CaseRecord::case_number`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CaseRecord {
    /// Unique case identifier. Stable across every pipeline stage and used
    /// as the join key when geocoded results are reconciled.
    pub case_number: String,
    /// Raw latitude from the source table, if present and numeric.
    pub latitude: Option<f64>,
    /// Raw longitude from the source table, if present and numeric.
    pub longitude: Option<f64>,
    pub incident_street: Option<String>,
    pub incident_city: Option<String>,
    pub incident_zip: Option<String>,
    /// City of residence. Stands in for a missing incident city.
    pub residence_city: Option<String>,
    pub death_street: Option<String>,
    pub death_city: Option<String>,
    pub death_state: Option<String>,
    pub death_zip: Option<String>,
    /// Primary cause-of-death narrative.
    pub primary_cause: Option<String>,
    /// Every `secondary*` narrative cell, in table column order.
    pub secondary_causes: Vec<Option<String>>,
}

impl CaseRecord {
    /// Creates an otherwise-empty record with the given case number.
    #[must_use]
    pub fn new(case_number: impl Into<String>) -> Self {
        Self {
            case_number: case_number.into(),
            ..Self::default()
        }
    }

    /// Whether the raw coordinates are incomplete (either axis missing).
    ///
    /// Only these records are sent to the geocoding provider.
    #[must_use]
    pub const fn needs_geocoding(&self) -> bool {
        self.latitude.is_none() || self.longitude.is_none()
    }
}

/// Which set of address fields an address is built from.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum AddressContext {
    /// Where the fatal incident happened (`incident_*` columns).
    Incident,
    /// Where the death was pronounced (`death_*` columns).
    Death,
}

impl AddressContext {
    /// Returns all variants of this enum.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[Self::Incident, Self::Death]
    }

    /// Name of the output column holding addresses built for this context.
    #[must_use]
    pub const fn address_column(self) -> &'static str {
        match self {
            Self::Incident => "incident_address",
            Self::Death => "death_address",
        }
    }
}

impl std::str::FromStr for AddressContext {
    type Err = InvalidContextError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "incident" => Ok(Self::Incident),
            "death" => Ok(Self::Death),
            _ => Err(InvalidContextError {
                value: s.to_string(),
            }),
        }
    }
}

/// Error returned when an address context name is neither `incident` nor
/// `death`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid address context '{value}': expected 'incident' or 'death'")]
pub struct InvalidContextError {
    /// The context name that was provided.
    pub value: String,
}

/// Why a geocode result holds what it holds.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum LookupStatus {
    /// The provider returned at least one candidate; the top one is used.
    Matched,
    /// The provider answered with zero candidates.
    NoCandidates,
    /// No lookup was attempted (blank address or an `unknown` marker).
    Skipped,
    /// Transport error or malformed provider response.
    Failed,
    /// The provider did not answer within the configured timeout.
    TimedOut,
    /// The record was never part of the geocoded subset.
    NotRequested,
}

/// Best-candidate geocode for one normalized address.
///
/// Every field is `None` unless the status is [`LookupStatus::Matched`].
/// Even then `score` may be absent, which matters: the `recovered` flag
/// follows the score, not the coordinates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeocodeResult {
    pub matched_address: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub score: Option<f64>,
    pub status: LookupStatus,
}

impl GeocodeResult {
    /// An all-null result tagged with `status`.
    #[must_use]
    pub const fn empty(status: LookupStatus) -> Self {
        Self {
            matched_address: None,
            latitude: None,
            longitude: None,
            score: None,
            status,
        }
    }

    /// Whether the provider supplied a confidence score.
    #[must_use]
    pub const fn is_scored(&self) -> bool {
        self.score.is_some()
    }
}
