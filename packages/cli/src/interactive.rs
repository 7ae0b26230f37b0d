//! Interactive menu for the case enrichment toolchain.
//!
//! Provides a menu-driven interface using `dialoguer` for running the
//! pipelines without memorizing CLI flags.

use std::path::PathBuf;

use case_enrich_case_models::AddressContext;
use case_enrich_cli_utils::MultiProgress;
use case_enrich_pipeline::EnrichConfig;
use dialoguer::{Input, Select};

use crate::commands::{self, GeocodeRequest};

/// Top-level actions available in the interactive menu.
enum Action {
    Run,
    Geocode,
    Classify,
    Taxonomy,
}

impl Action {
    const ALL: &[Self] = &[Self::Run, Self::Geocode, Self::Classify, Self::Taxonomy];

    #[must_use]
    const fn label(&self) -> &'static str {
        match self {
            Self::Run => "Geocode and classify",
            Self::Geocode => "Geocode missing coordinates",
            Self::Classify => "Classify cause-of-death narratives",
            Self::Taxonomy => "List drug classes",
        }
    }
}

/// Prompts for an action and its paths, then runs it.
///
/// # Errors
///
/// Returns an error if a prompt fails or the selected run fails.
#[allow(clippy::future_not_send)]
pub async fn run(
    multi: &MultiProgress,
    config: &EnrichConfig,
) -> Result<(), Box<dyn std::error::Error>> {
    println!("Case Enrichment Toolchain");
    println!();

    let labels: Vec<&str> = Action::ALL.iter().map(Action::label).collect();

    let idx = Select::new()
        .with_prompt("What would you like to do?")
        .items(&labels)
        .default(0)
        .interact()?;

    let action = &Action::ALL[idx];
    if matches!(action, Action::Taxonomy) {
        commands::print_taxonomy(config);
        return Ok(());
    }

    let input: String = Input::new()
        .with_prompt("Input case table (CSV)")
        .interact_text()?;
    let input = PathBuf::from(input.trim());

    let output: String = Input::new()
        .with_prompt("Output CSV")
        .default(commands::default_output(&input).display().to_string())
        .interact_text()?;
    let output = PathBuf::from(output.trim());

    match action {
        Action::Run => {
            let request = prompt_geocode_request()?;
            commands::run(multi, config, &input, &output, &request).await?;
        }
        Action::Geocode => {
            let request = prompt_geocode_request()?;
            commands::geocode(multi, config, &input, &output, &request).await?;
        }
        Action::Classify => commands::classify(multi, config, &input, &output)?,
        Action::Taxonomy => {}
    }

    Ok(())
}

fn prompt_geocode_request() -> Result<GeocodeRequest, Box<dyn std::error::Error>> {
    let contexts = AddressContext::all();
    let context_labels: Vec<&str> = contexts.iter().map(AsRef::as_ref).collect();
    let context_idx = Select::new()
        .with_prompt("Address to geocode")
        .items(&context_labels)
        .default(0)
        .interact()?;

    Ok(GeocodeRequest {
        context: contexts[context_idx],
        limit: prompt_optional_usize("Row limit (empty for no limit)")?,
        concurrency: None,
    })
}

fn prompt_optional_usize(prompt: &str) -> Result<Option<usize>, Box<dyn std::error::Error>> {
    let input: String = Input::new()
        .with_prompt(prompt)
        .allow_empty(true)
        .interact_text()?;

    if input.trim().is_empty() {
        Ok(None)
    } else {
        Ok(Some(input.trim().parse()?))
    }
}
