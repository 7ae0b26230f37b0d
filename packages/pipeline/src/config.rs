//! Enrichment configuration.
//!
//! The default configuration is embedded at compile time from
//! `config/default.toml`. A file passed on the command line replaces it
//! entirely; there is no merging. Credentials never live in the file and
//! are read from the environment instead.

use std::path::{Path, PathBuf};

use case_enrich_classify::{ClassifyError, CompositeRule, Taxonomy, validate_composites};
use case_enrich_geocoder::GeocoderConfig;
use serde::Deserialize;
use thiserror::Error;

use crate::columns;

/// Embedded default configuration.
const DEFAULT_CONFIG: &str = include_str!("../config/default.toml");

/// Environment variable holding the `ArcGIS` API key.
pub const API_KEY_ENV: &str = "ARCGIS_API_KEY";

/// Errors from loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("failed to read config {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The TOML is malformed, or a taxonomy/composite entry failed
    /// validation while deserializing.
    #[error("invalid config: {0}")]
    Toml(#[from] toml::de::Error),

    #[error(transparent)]
    Classify(#[from] ClassifyError),

    /// A composite rule would overwrite an input or generated column.
    #[error("composite '{0}' collides with an input or generated column")]
    ColumnCollision(String),
}

/// Everything the enrichment stages need, loaded once at startup.
#[derive(Clone, Deserialize)]
pub struct EnrichConfig {
    pub geocoder: GeocoderConfig,
    pub taxonomy: Taxonomy,
    #[serde(default)]
    pub composites: Vec<CompositeRule>,
    /// `ArcGIS` API key, from [`API_KEY_ENV`].
    #[serde(skip)]
    pub api_key: Option<String>,
}

impl std::fmt::Debug for EnrichConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EnrichConfig")
            .field("geocoder", &self.geocoder)
            .field("taxonomy", &self.taxonomy)
            .field("composites", &self.composites)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl EnrichConfig {
    /// Loads `path`, or the embedded default when `None`, then reads the
    /// API key from the environment.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file cannot be read or fails
    /// validation.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let config = match path {
            Some(path) => {
                log::info!("Loading config from {}", path.display());
                let contents =
                    std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
                        path: path.to_path_buf(),
                        source,
                    })?;
                Self::from_toml_str(&contents)?
            }
            None => Self::from_toml_str(DEFAULT_CONFIG)?,
        };

        Ok(config.with_api_key(std::env::var(API_KEY_ENV).ok()))
    }

    /// Parses and validates a TOML document. No environment is read.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the TOML is malformed, the taxonomy is
    /// incomplete, or a composite rule is invalid.
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(contents)?;

        validate_composites(&config.composites)?;
        let generated = columns::generated_columns();
        if let Some(rule) = config.composites.iter().find(|rule| {
            columns::is_input_column(rule.name())
                || generated.iter().any(|column| column == rule.name())
        }) {
            return Err(ConfigError::ColumnCollision(rule.name().to_string()));
        }

        Ok(config)
    }

    /// Sets the API key. Blank keys are treated as absent.
    #[must_use]
    pub fn with_api_key(mut self, api_key: Option<String>) -> Self {
        self.api_key = api_key.filter(|key| !key.trim().is_empty());
        self
    }
}
