//! `ArcGIS` World Geocoding Service client.
//!
//! Sends single-line queries to the `findAddressCandidates` operation,
//! restricted to a search extent and biased toward rooftop locations.
//! Requests carry the API key as a `token` parameter when one is
//! configured.
//!
//! See <https://developers.arcgis.com/rest/geocode/api-reference/geocoding-find-address-candidates.htm>

use async_trait::async_trait;

use crate::{BoundingBox, Candidate, GeocodeError, GeocodeProvider, GeocoderConfig};

/// Maximum number of candidates requested per lookup. Only the first is
/// used, the rest help when debugging poor matches.
const MAX_LOCATIONS: u32 = 5;

/// A configured `ArcGIS` geocoder.
#[derive(Debug, Clone)]
pub struct ArcGisGeocoder {
    client: reqwest::Client,
    base_url: String,
    location_type: String,
    api_key: Option<String>,
}

impl ArcGisGeocoder {
    /// Creates a client from the `[geocoder]` configuration.
    #[must_use]
    pub fn new(client: reqwest::Client, config: &GeocoderConfig, api_key: Option<String>) -> Self {
        Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            location_type: config.location_type.clone(),
            api_key,
        }
    }
}

#[async_trait]
impl GeocodeProvider for ArcGisGeocoder {
    fn id(&self) -> &str {
        "arcgis"
    }

    async fn lookup(
        &self,
        query: &str,
        bounds: &BoundingBox,
    ) -> Result<Vec<Candidate>, GeocodeError> {
        let url = format!("{}/findAddressCandidates", self.base_url);

        let mut params: Vec<(&str, String)> = vec![
            ("SingleLine", query.to_string()),
            ("searchExtent", bounds.to_envelope().to_string()),
            ("locationType", self.location_type.clone()),
            ("outFields", "Match_addr,Addr_type".to_string()),
            ("maxLocations", MAX_LOCATIONS.to_string()),
            ("f", "json".to_string()),
        ];
        if let Some(key) = &self.api_key {
            params.push(("token", key.clone()));
        }

        let resp = self.client.get(&url).query(&params).send().await?;

        if resp.status() == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(GeocodeError::RateLimited);
        }

        if !resp.status().is_success() {
            return Err(GeocodeError::Parse {
                message: format!("ArcGIS returned status {}", resp.status()),
            });
        }

        let body: serde_json::Value = resp.json().await?;
        parse_response(&body)
    }
}

/// Parses a `findAddressCandidates` JSON response.
///
/// `ArcGIS` reports most failures (invalid token, bad extent) with HTTP
/// 200 and an `error` object, so that is checked before `candidates`.
fn parse_response(body: &serde_json::Value) -> Result<Vec<Candidate>, GeocodeError> {
    if let Some(error) = body.get("error") {
        return Err(GeocodeError::Provider {
            code: error["code"].as_i64().unwrap_or_default(),
            message: error["message"]
                .as_str()
                .unwrap_or("unknown ArcGIS error")
                .to_string(),
        });
    }

    let candidates = body
        .get("candidates")
        .and_then(serde_json::Value::as_array)
        .ok_or_else(|| GeocodeError::Parse {
            message: "ArcGIS response missing 'candidates' array".to_string(),
        })?;

    candidates.iter().map(parse_candidate).collect()
}

fn parse_candidate(candidate: &serde_json::Value) -> Result<Candidate, GeocodeError> {
    let x = candidate
        .pointer("/location/x")
        .and_then(serde_json::Value::as_f64)
        .ok_or_else(|| GeocodeError::Parse {
            message: "Candidate missing location.x".to_string(),
        })?;
    let y = candidate
        .pointer("/location/y")
        .and_then(serde_json::Value::as_f64)
        .ok_or_else(|| GeocodeError::Parse {
            message: "Candidate missing location.y".to_string(),
        })?;

    let matched_address = candidate["address"]
        .as_str()
        .or_else(|| candidate.pointer("/attributes/Match_addr")?.as_str())
        .unwrap_or_default()
        .to_string();

    Ok(Candidate {
        matched_address,
        y,
        x,
        score: candidate["score"].as_f64(),
    })
}
