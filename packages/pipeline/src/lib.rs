#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Case table enrichment.
//!
//! Two independent stages run over a [`CaseTable`]:
//!
//! 1. **Geocoding** ([`geocode`]) builds normalized addresses, looks up
//!    the rows missing coordinates, and reconciles the results into final
//!    coordinates.
//! 2. **Classification** ([`classify`]) flags every row against the drug
//!    class taxonomy and derives composite columns.
//!
//! Both append columns to the same table, so running them back to back
//! merges their output on the case number. Each `run_*` entry point reads
//! the input, runs its stages, and writes the output atomically.

pub mod classify;
pub mod columns;
pub mod config;
pub mod geocode;
pub mod table;

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use case_enrich_geocoder::GeocodeProvider;
use case_enrich_geocoder::arcgis::ArcGisGeocoder;
use case_enrich_geocoder::progress::ProgressCallback;
use thiserror::Error;

pub use classify::{ClassifySummary, classify_stage};
pub use config::{ConfigError, EnrichConfig};
pub use geocode::{GeocodeStageOptions, GeocodeSummary, geocode_stage};
pub use table::CaseTable;

/// Errors from loading, enriching, or writing a case table.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Failed to build the HTTP client.
    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    /// A required input column is absent from the header.
    #[error("input is missing required column '{column}'")]
    MissingColumn { column: &'static str },

    /// A row has no case number.
    #[error("row on line {line} has no case number")]
    MissingCaseNumber { line: usize },

    /// The same case number appears on more than one row.
    #[error("duplicate case number '{case_number}'")]
    DuplicateCase { case_number: String },

    /// A stage produced the wrong number of values for a column.
    #[error("column '{column}' has {actual} values for {expected} rows")]
    ColumnLength {
        column: String,
        expected: usize,
        actual: usize,
    },
}

/// Progress bars for the stages that report progress.
#[derive(Clone, Default)]
pub struct StageProgress {
    pub geocode: Option<Arc<dyn ProgressCallback>>,
    pub classify: Option<Arc<dyn ProgressCallback>>,
}

/// Builds the `ArcGIS` provider from configuration.
///
/// # Errors
///
/// Returns [`PipelineError::Http`] if the HTTP client cannot be built.
pub fn arcgis_provider(config: &EnrichConfig) -> Result<ArcGisGeocoder, PipelineError> {
    if config.api_key.is_none() {
        log::warn!(
            "{} is not set; sending ArcGIS requests without a token",
            config::API_KEY_ENV
        );
    }

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.geocoder.timeout_secs))
        .user_agent(concat!("case_enrich/", env!("CARGO_PKG_VERSION")))
        .build()?;

    Ok(ArcGisGeocoder::new(
        client,
        &config.geocoder,
        config.api_key.clone(),
    ))
}

/// Reads `input`, runs the geocoding stage, and writes `output`.
///
/// # Errors
///
/// Returns [`PipelineError`] if the input is invalid or the output cannot
/// be written.
pub async fn run_geocode(
    input: &Path,
    output: &Path,
    provider: &dyn GeocodeProvider,
    options: &GeocodeStageOptions,
    progress: &StageProgress,
) -> Result<GeocodeSummary, PipelineError> {
    let mut table = CaseTable::read(input)?;
    let summary = geocode_stage(&mut table, provider, options, progress.geocode.as_ref()).await?;
    table.write(output)?;
    Ok(summary)
}

/// Reads `input`, runs the classification stage, and writes `output`.
///
/// # Errors
///
/// Returns [`PipelineError`] if the input is invalid or the output cannot
/// be written.
pub fn run_classify(
    input: &Path,
    output: &Path,
    config: &EnrichConfig,
    progress: &StageProgress,
) -> Result<ClassifySummary, PipelineError> {
    let mut table = CaseTable::read(input)?;
    let summary = classify_stage(
        &mut table,
        &config.taxonomy,
        &config.composites,
        progress.classify.as_ref(),
    )?;
    table.write(output)?;
    Ok(summary)
}

/// Runs geocoding then classification over one table and writes a single
/// merged output.
///
/// # Errors
///
/// Returns [`PipelineError`] if the input is invalid or the output cannot
/// be written.
pub async fn run_all(
    input: &Path,
    output: &Path,
    config: &EnrichConfig,
    provider: &dyn GeocodeProvider,
    options: &GeocodeStageOptions,
    progress: &StageProgress,
) -> Result<(GeocodeSummary, ClassifySummary), PipelineError> {
    let mut table = CaseTable::read(input)?;
    let geocoded = geocode_stage(&mut table, provider, options, progress.geocode.as_ref()).await?;
    let classified = classify_stage(
        &mut table,
        &config.taxonomy,
        &config.composites,
        progress.classify.as_ref(),
    )?;
    table.write(output)?;
    Ok((geocoded, classified))
}
