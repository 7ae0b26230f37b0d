#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Geocoding for normalized case addresses.
//!
//! Resolves query strings to latitude/longitude through a
//! [`GeocodeProvider`]. The only provider is the `ArcGIS` World Geocoding
//! Service ([`arcgis`]): single-line `findAddressCandidates` lookups
//! restricted to a fixed [`BoundingBox`] and authenticated with an API key.
//!
//! The [`runner`] drives a provider over a whole batch: it deduplicates
//! addresses, skips ones that cannot be geocoded, bounds concurrency,
//! applies a per-call timeout, and turns every failure into a tagged
//! null result so one bad address never sinks the run.

pub mod arcgis;
pub mod progress;
pub mod runner;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One ranked candidate returned by a provider.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    /// The provider's canonical form of the matched address.
    pub matched_address: String,
    /// Latitude (WGS84).
    pub y: f64,
    /// Longitude (WGS84).
    pub x: f64,
    /// Match confidence, 0–100. Some providers omit it.
    pub score: Option<f64>,
}

/// Errors from geocoding operations.
#[derive(Debug, Error)]
pub enum GeocodeError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Response parsing failed.
    #[error("Parse error: {message}")]
    Parse {
        /// Description of the parsing failure.
        message: String,
    },

    /// The provider answered with an error object (bad token, invalid
    /// extent, quota exhausted).
    #[error("Provider error {code}: {message}")]
    Provider {
        /// Provider-specific error code.
        code: i64,
        /// Provider-supplied message.
        message: String,
    },

    /// Rate limit exceeded.
    #[error("Rate limit exceeded")]
    RateLimited,
}

/// A geocoding backend.
///
/// Implementations return candidates ranked best-first; an empty list
/// means "no match", which is distinct from an `Err`.
#[async_trait]
pub trait GeocodeProvider: Send + Sync {
    /// Short identifier used in log messages (e.g., `"arcgis"`).
    fn id(&self) -> &str;

    /// Looks up one single-line address inside `bounds`.
    ///
    /// # Errors
    ///
    /// Returns [`GeocodeError`] if the request fails or the response
    /// cannot be understood.
    async fn lookup(
        &self,
        query: &str,
        bounds: &BoundingBox,
    ) -> Result<Vec<Candidate>, GeocodeError>;
}

/// Geographic rectangle that restricts candidate matches.
///
/// Corners are stored ordered (`xmin <= xmax`, `ymin <= ymax`) regardless
/// of how they were written in configuration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "BoundingBoxSpec")]
pub struct BoundingBox {
    pub xmin: f64,
    pub ymin: f64,
    pub xmax: f64,
    pub ymax: f64,
    /// Spatial reference well-known ID.
    pub wkid: u32,
}

/// Corners exactly as written in configuration.
#[derive(Debug, Clone, Copy, Deserialize)]
struct BoundingBoxSpec {
    xmin: f64,
    ymin: f64,
    xmax: f64,
    ymax: f64,
    #[serde(default = "default_wkid")]
    wkid: u32,
}

const fn default_wkid() -> u32 {
    4326
}

impl From<BoundingBoxSpec> for BoundingBox {
    fn from(spec: BoundingBoxSpec) -> Self {
        Self::new(spec.xmin, spec.ymin, spec.xmax, spec.ymax, spec.wkid)
    }
}

impl BoundingBox {
    /// Creates a bounding box, swapping corners as needed.
    #[must_use]
    pub fn new(x1: f64, y1: f64, x2: f64, y2: f64, wkid: u32) -> Self {
        Self {
            xmin: x1.min(x2),
            ymin: y1.min(y2),
            xmax: x1.max(x2),
            ymax: y1.max(y2),
            wkid,
        }
    }

    /// The box as an Esri JSON envelope.
    #[must_use]
    pub fn to_envelope(&self) -> serde_json::Value {
        serde_json::json!({
            "xmin": self.xmin,
            "ymin": self.ymin,
            "xmax": self.xmax,
            "ymax": self.ymax,
            "spatialReference": { "wkid": self.wkid },
        })
    }
}

/// Provider settings loaded from the `[geocoder]` configuration table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeocoderConfig {
    /// Geocode service root (the `findAddressCandidates` operation is
    /// appended).
    pub base_url: String,
    /// Preferred location type (`"rooftop"` or `"street"`).
    #[serde(default = "default_location_type")]
    pub location_type: String,
    /// Per-lookup timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Number of lookups in flight at once. `1` runs sequentially.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    /// Candidate search area.
    pub bounding_box: BoundingBox,
}

fn default_location_type() -> String {
    "rooftop".to_string()
}

const fn default_timeout_secs() -> u64 {
    30
}

const fn default_concurrency() -> usize {
    1
}
