//! Batch geocoding over a set of case addresses.
//!
//! Addresses are deduplicated before lookup, so a query shared by many
//! cases costs one provider call. Every case comes back with exactly one
//! [`GeocodeResult`]; provider trouble never escapes as an error.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use case_enrich_case_models::{GeocodeResult, LookupStatus};
use futures::stream::{self, StreamExt as _};

use crate::progress::ProgressCallback;
use crate::{BoundingBox, Candidate, GeocodeProvider, GeocoderConfig};

/// A normalized address waiting to be geocoded for one case.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddressQuery {
    pub case_number: String,
    pub address: String,
}

/// Runtime knobs for [`geocode_addresses`].
#[derive(Debug, Clone)]
pub struct GeocodeOptions {
    pub bounds: BoundingBox,
    pub timeout: Duration,
    /// Lookups in flight at once; values below 1 are treated as 1.
    pub concurrency: usize,
}

impl From<&GeocoderConfig> for GeocodeOptions {
    fn from(config: &GeocoderConfig) -> Self {
        Self {
            bounds: config.bounding_box,
            timeout: Duration::from_secs(config.timeout_secs),
            concurrency: config.concurrency,
        }
    }
}

/// Whether an address should be sent to the provider at all.
///
/// Blank addresses and anything containing the literal `unknown` are
/// skipped. The match is case-sensitive.
#[must_use]
pub fn needs_lookup(address: &str) -> bool {
    !address.trim().is_empty() && !address.contains("unknown")
}

/// Geocodes every query and returns one result per case number.
///
/// Skipped addresses get a [`LookupStatus::Skipped`] result without a
/// provider call. Provider errors and timeouts are logged and recorded as
/// [`LookupStatus::Failed`] / [`LookupStatus::TimedOut`].
pub async fn geocode_addresses(
    provider: &dyn GeocodeProvider,
    queries: &[AddressQuery],
    options: &GeocodeOptions,
    progress: Option<&Arc<dyn ProgressCallback>>,
) -> BTreeMap<String, GeocodeResult> {
    let mut results: BTreeMap<String, GeocodeResult> = BTreeMap::new();
    let mut groups: BTreeMap<&str, Vec<&str>> = BTreeMap::new();

    for query in queries {
        if needs_lookup(&query.address) {
            groups
                .entry(query.address.as_str())
                .or_default()
                .push(query.case_number.as_str());
        } else {
            results.insert(
                query.case_number.clone(),
                GeocodeResult::empty(LookupStatus::Skipped),
            );
        }
    }

    if let Some(p) = progress {
        p.set_total(queries.len() as u64);
        p.inc(results.len() as u64);
    }

    log::info!(
        "Geocoding {} distinct addresses for {} cases via {} ({} skipped, concurrency={})",
        groups.len(),
        queries.len(),
        provider.id(),
        results.len(),
        options.concurrency.max(1),
    );

    let looked_up: Vec<(Vec<&str>, GeocodeResult)> =
        stream::iter(groups.into_iter().map(|(address, cases)| async move {
            let result = lookup_one(provider, address, options).await;
            if let Some(p) = progress {
                p.inc(cases.len() as u64);
            }
            (cases, result)
        }))
        .buffer_unordered(options.concurrency.max(1))
        .collect()
        .await;

    let mut matched = 0usize;
    for (cases, result) in looked_up {
        if result.status == LookupStatus::Matched {
            matched += 1;
        }
        for case_number in cases {
            results.insert(case_number.to_string(), result.clone());
        }
    }

    log::info!("Geocoding complete: {matched} addresses matched");

    results
}

async fn lookup_one(
    provider: &dyn GeocodeProvider,
    address: &str,
    options: &GeocodeOptions,
) -> GeocodeResult {
    match tokio::time::timeout(options.timeout, provider.lookup(address, &options.bounds)).await {
        Ok(Ok(candidates)) => best_candidate(candidates).unwrap_or_else(|| {
            log::debug!("{}: no match for '{address}'", provider.id());
            GeocodeResult::empty(LookupStatus::NoCandidates)
        }),
        Ok(Err(e)) => {
            log::warn!("{} error for '{address}': {e}", provider.id());
            GeocodeResult::empty(LookupStatus::Failed)
        }
        Err(_) => {
            log::warn!(
                "{} timed out after {:?} for '{address}'",
                provider.id(),
                options.timeout
            );
            GeocodeResult::empty(LookupStatus::TimedOut)
        }
    }
}

/// Converts the top-ranked candidate into a matched result.
fn best_candidate(candidates: Vec<Candidate>) -> Option<GeocodeResult> {
    let best = candidates.into_iter().next()?;
    Some(GeocodeResult {
        matched_address: Some(best.matched_address),
        latitude: Some(best.y),
        longitude: Some(best.x),
        score: best.score,
        status: LookupStatus::Matched,
    })
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;
    use crate::GeocodeError;

    /// In-memory provider keyed by exact query string.
    struct FakeProvider {
        answers: BTreeMap<&'static str, Vec<Candidate>>,
        failing: Vec<&'static str>,
        slow: Vec<&'static str>,
        calls: Mutex<Vec<String>>,
    }

    impl FakeProvider {
        fn new() -> Self {
            Self {
                answers: BTreeMap::new(),
                failing: Vec::new(),
                slow: Vec::new(),
                calls: Mutex::new(Vec::new()),
            }
        }

        fn answer(mut self, query: &'static str, candidates: Vec<Candidate>) -> Self {
            self.answers.insert(query, candidates);
            self
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl GeocodeProvider for FakeProvider {
        fn id(&self) -> &str {
            "fake"
        }

        async fn lookup(
            &self,
            query: &str,
            _bounds: &BoundingBox,
        ) -> Result<Vec<Candidate>, GeocodeError> {
            self.calls.lock().unwrap().push(query.to_string());
            if self.slow.iter().any(|q| *q == query) {
                tokio::time::sleep(Duration::from_secs(5)).await;
            }
            if self.failing.iter().any(|q| *q == query) {
                return Err(GeocodeError::Parse {
                    message: "garbled body".to_string(),
                });
            }
            Ok(self.answers.get(query).cloned().unwrap_or_default())
        }
    }

    fn candidate(y: f64, x: f64, score: Option<f64>) -> Candidate {
        Candidate {
            matched_address: "MATCHED".to_string(),
            y,
            x,
            score,
        }
    }

    fn query(case_number: &str, address: &str) -> AddressQuery {
        AddressQuery {
            case_number: case_number.to_string(),
            address: address.to_string(),
        }
    }

    fn options() -> GeocodeOptions {
        GeocodeOptions {
            bounds: BoundingBox::new(-91.6, 36.96, -87.38, 42.57, 4326),
            timeout: Duration::from_millis(200),
            concurrency: 4,
        }
    }

    #[test]
    fn skips_blank_and_unknown() {
        assert!(!needs_lookup(""));
        assert!(!needs_lookup("   "));
        assert!(!needs_lookup("unknown COLUMBIA 65201"));
        assert!(needs_lookup("UNKNOWN COLUMBIA 65201"));
        assert!(needs_lookup("123 MAIN ST COLUMBIA 65201"));
    }

    #[tokio::test]
    async fn uses_top_candidate() {
        let provider = FakeProvider::new().answer(
            "123 MAIN ST COLUMBIA 65201",
            vec![
                candidate(38.90, -92.33, Some(91.0)),
                candidate(38.00, -92.00, Some(60.0)),
            ],
        );
        let results = geocode_addresses(
            &provider,
            &[query("A", "123 MAIN ST COLUMBIA 65201")],
            &options(),
            None,
        )
        .await;

        let result = &results["A"];
        assert_eq!(result.status, LookupStatus::Matched);
        assert_eq!(result.latitude, Some(38.90));
        assert_eq!(result.longitude, Some(-92.33));
        assert_eq!(result.score, Some(91.0));
        assert_eq!(result.matched_address.as_deref(), Some("MATCHED"));
    }

    #[tokio::test]
    async fn deduplicates_shared_addresses() {
        let provider = FakeProvider::new()
            .answer("9 ELM ST COLUMBIA", vec![candidate(38.9, -92.3, Some(99.0))]);
        let results = geocode_addresses(
            &provider,
            &[
                query("A", "9 ELM ST COLUMBIA"),
                query("B", "9 ELM ST COLUMBIA"),
                query("C", "9 ELM ST COLUMBIA"),
            ],
            &options(),
            None,
        )
        .await;

        assert_eq!(provider.calls().len(), 1);
        assert_eq!(results.len(), 3);
        assert!(results.values().all(|r| r.status == LookupStatus::Matched));
    }

    #[tokio::test]
    async fn skipped_addresses_never_reach_provider() {
        let provider = FakeProvider::new();
        let results = geocode_addresses(
            &provider,
            &[query("A", ""), query("B", "unknown")],
            &options(),
            None,
        )
        .await;

        assert!(provider.calls().is_empty());
        assert_eq!(results["A"], GeocodeResult::empty(LookupStatus::Skipped));
        assert_eq!(results["B"], GeocodeResult::empty(LookupStatus::Skipped));
    }

    #[tokio::test]
    async fn zero_candidates_is_no_match() {
        let provider = FakeProvider::new();
        let results =
            geocode_addresses(&provider, &[query("A", "NOWHERE")], &options(), None).await;
        assert_eq!(
            results["A"],
            GeocodeResult::empty(LookupStatus::NoCandidates)
        );
    }

    #[tokio::test]
    async fn provider_error_is_tagged_failed_and_batch_continues() {
        let mut provider = FakeProvider::new()
            .answer("GOOD", vec![candidate(38.9, -92.3, Some(95.0))]);
        provider.failing.push("BAD");

        let results = geocode_addresses(
            &provider,
            &[query("A", "BAD"), query("B", "GOOD")],
            &options(),
            None,
        )
        .await;

        assert_eq!(results["A"], GeocodeResult::empty(LookupStatus::Failed));
        assert_eq!(results["B"].status, LookupStatus::Matched);
    }

    #[tokio::test]
    async fn timeout_is_distinguishable_from_no_match() {
        let mut provider = FakeProvider::new();
        provider.slow.push("SLOW");

        let results =
            geocode_addresses(&provider, &[query("A", "SLOW")], &options(), None).await;

        assert_eq!(results["A"], GeocodeResult::empty(LookupStatus::TimedOut));
    }

    #[tokio::test]
    async fn unscored_candidate_keeps_coordinates() {
        let provider =
            FakeProvider::new().answer("65201", vec![candidate(38.9, -92.3, None)]);
        let results =
            geocode_addresses(&provider, &[query("A", "65201")], &options(), None).await;

        assert_eq!(results["A"].status, LookupStatus::Matched);
        assert_eq!(results["A"].latitude, Some(38.9));
        assert!(!results["A"].is_scored());
    }
}
