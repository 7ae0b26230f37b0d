//! Subcommand implementations shared by the flag-driven and interactive
//! front ends.

use std::path::{Path, PathBuf};
use std::time::Instant;

use case_enrich_case_models::AddressContext;
use case_enrich_cli_utils::{IndicatifProgress, MultiProgress};
use case_enrich_geocoder::runner::GeocodeOptions;
use case_enrich_pipeline::{
    EnrichConfig, GeocodeStageOptions, StageProgress, arcgis_provider, run_all, run_classify,
    run_geocode,
};

/// Geocoding knobs that can be overridden per run.
#[derive(Debug, Clone)]
pub struct GeocodeRequest {
    pub context: AddressContext,
    pub limit: Option<usize>,
    /// Overrides `geocoder.concurrency` from the config.
    pub concurrency: Option<usize>,
}

fn stage_options(config: &EnrichConfig, request: &GeocodeRequest) -> GeocodeStageOptions {
    let mut geocode = GeocodeOptions::from(&config.geocoder);
    if let Some(concurrency) = request.concurrency {
        geocode.concurrency = concurrency;
    }
    GeocodeStageOptions {
        context: request.context,
        limit: request.limit,
        geocode,
    }
}

/// Default output path: `<input stem>_enriched.csv` next to the input.
pub fn default_output(input: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .map_or_else(|| "cases".into(), |s| s.to_string_lossy().into_owned());
    input.with_file_name(format!("{stem}_enriched.csv"))
}

/// Runs the geocoding pipeline.
///
/// # Errors
///
/// Returns an error naming the stage if the run fails.
pub async fn geocode(
    multi: &MultiProgress,
    config: &EnrichConfig,
    input: &Path,
    output: &Path,
    request: &GeocodeRequest,
) -> Result<(), Box<dyn std::error::Error>> {
    let start = Instant::now();
    let provider = arcgis_provider(config)?;
    let progress = StageProgress {
        geocode: Some(IndicatifProgress::lookups_bar(multi, "Geocoding")),
        classify: None,
    };

    let summary = run_geocode(
        input,
        output,
        &provider,
        &stage_options(config, request),
        &progress,
    )
    .await
    .map_err(|e| format!("geocode stage failed: {e}"))?;

    log::info!(
        "Geocoding done in {:.1}s: {} rows, {} missing coordinates, {} looked up, {} matched, {} recovered",
        start.elapsed().as_secs_f64(),
        summary.rows,
        summary.eligible,
        summary.queried,
        summary.matched,
        summary.recovered,
    );
    Ok(())
}

/// Runs the classification pipeline.
///
/// # Errors
///
/// Returns an error naming the stage if the run fails.
pub fn classify(
    multi: &MultiProgress,
    config: &EnrichConfig,
    input: &Path,
    output: &Path,
) -> Result<(), Box<dyn std::error::Error>> {
    let start = Instant::now();
    let progress = StageProgress {
        geocode: None,
        classify: Some(IndicatifProgress::records_bar(multi, "Classifying")),
    };

    let summary = run_classify(input, output, config, &progress)
        .map_err(|e| format!("classify stage failed: {e}"))?;

    log::info!(
        "Classification done in {:.1}s: {} rows, {} with a drug class",
        start.elapsed().as_secs_f64(),
        summary.rows,
        summary.flagged_rows,
    );
    Ok(())
}

/// Runs both pipelines over one table.
///
/// # Errors
///
/// Returns an error if the run fails.
pub async fn run(
    multi: &MultiProgress,
    config: &EnrichConfig,
    input: &Path,
    output: &Path,
    request: &GeocodeRequest,
) -> Result<(), Box<dyn std::error::Error>> {
    let start = Instant::now();
    let provider = arcgis_provider(config)?;
    let progress = StageProgress {
        geocode: Some(IndicatifProgress::lookups_bar(multi, "Geocoding")),
        classify: Some(IndicatifProgress::records_bar(multi, "Classifying")),
    };

    let (geocoded, classified) = run_all(
        input,
        output,
        config,
        &provider,
        &stage_options(config, request),
        &progress,
    )
    .await
    .map_err(|e| format!("enrichment failed: {e}"))?;

    log::info!(
        "Enrichment done in {:.1}s: {} rows, {} recovered, {} with a drug class",
        start.elapsed().as_secs_f64(),
        geocoded.rows,
        geocoded.recovered,
        classified.flagged_rows,
    );
    Ok(())
}

/// Prints every class with its search terms, then the composite rules.
pub fn print_taxonomy(config: &EnrichConfig) {
    println!("{:<22} TERMS", "CLASS");
    println!("{}", "-".repeat(60));
    for (class, terms) in config.taxonomy.iter() {
        let name: &str = class.as_ref();
        println!("{name:<22} {}", terms.join(", "));
    }

    if !config.composites.is_empty() {
        println!();
        println!("{:<22} SOURCES", "COMPOSITE");
        println!("{}", "-".repeat(60));
        for rule in &config.composites {
            let sources: Vec<String> = rule.sources().iter().map(ToString::to_string).collect();
            println!("{:<22} {}", rule.name(), sources.join(" | "));
        }
    }
}
